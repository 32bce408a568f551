// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local document store.
//!
//! Documents and listeners live behind one mutex, so a write and the
//! notification of its result are a single step: concurrent increments
//! never lose updates and listeners observe writes in commit order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use super::{DocumentPath, DocumentSnapshot, DocumentStore, FieldWrite, FieldWrites, Fields, Subscription};
use crate::error::PlatformResult;

#[derive(Default)]
struct Inner {
    documents: HashMap<DocumentPath, Fields>,
    listeners: HashMap<DocumentPath, Vec<mpsc::UnboundedSender<DocumentSnapshot>>>,
}

impl Inner {
    fn snapshot(&self, path: &DocumentPath) -> DocumentSnapshot {
        DocumentSnapshot {
            path: path.clone(),
            data: self.documents.get(path).cloned(),
        }
    }

    fn notify(&mut self, path: &DocumentPath) {
        let snapshot = self.snapshot(path);
        if let Some(listeners) = self.listeners.get_mut(path) {
            listeners.retain(|tx| tx.send(snapshot.clone()).is_ok());
            if listeners.is_empty() {
                self.listeners.remove(path);
            }
        }
    }
}

/// Document store held in process memory.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open subscriptions on `path`.
    ///
    /// Closed subscriptions are pruned on the next write or subscribe to
    /// the path.
    pub async fn listener_count(&self, path: &DocumentPath) -> usize {
        self.inner
            .lock()
            .await
            .listeners
            .get(path)
            .map(|l| l.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

fn apply(fields: &mut Fields, name: String, write: FieldWrite) {
    let value = match write {
        FieldWrite::Set(value) => value,
        FieldWrite::Increment(delta) => {
            let current = fields.get(&name).and_then(Value::as_i64).unwrap_or(0);
            Value::from(current.saturating_add(delta))
        }
        FieldWrite::ServerTimestamp => {
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
        }
    };
    fields.insert(name, value);
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> PlatformResult<DocumentSnapshot> {
        Ok(self.inner.lock().await.snapshot(path))
    }

    async fn set_merge(&self, path: &DocumentPath, writes: FieldWrites) -> PlatformResult<()> {
        let mut inner = self.inner.lock().await;
        let fields = inner.documents.entry(path.clone()).or_default();
        for (name, write) in writes {
            apply(fields, name, write);
        }
        inner.notify(path);
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> PlatformResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().await;
        // The receiver is still held here, so the first send cannot fail.
        let _ = tx.send(inner.snapshot(path));
        let listeners = inner.listeners.entry(path.clone()).or_default();
        listeners.retain(|tx| !tx.is_closed());
        listeners.push(tx);
        Ok(Subscription::new(rx, None))
    }
}
