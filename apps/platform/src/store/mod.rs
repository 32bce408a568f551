// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Document Store Capabilities
//!
//! A schema-less store of JSON documents addressed by `collection/id`.
//! Supports merge writes with field transforms (atomic increment, server
//! timestamp) and live subscriptions that push a snapshot on every change.

mod firestore;
mod memory;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::DropGuard;

use crate::error::PlatformResult;

pub use firestore::{FirestoreDocumentStore, FIRESTORE_URL};
pub use memory::MemoryDocumentStore;

/// Field map of a document.
pub type Fields = serde_json::Map<String, Value>;

/// Address of a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Document state at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub path: DocumentPath,
    /// `None` when the document does not exist.
    pub data: Option<Fields>,
}

impl DocumentSnapshot {
    pub fn missing(path: DocumentPath) -> Self {
        Self { path, data: None }
    }

    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.as_ref().and_then(|d| d.get(field))
    }

    /// Integer value of `field`, if present and integral.
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }
}

/// One field mutation of a merge write.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldWrite {
    /// Replace the field with a value.
    Set(Value),
    /// Add to the field atomically. Missing or non-integer fields count as 0.
    Increment(i64),
    /// Set the field to the store's clock at commit time.
    ServerTimestamp,
}

impl From<Value> for FieldWrite {
    fn from(value: Value) -> Self {
        FieldWrite::Set(value)
    }
}

/// Ordered field writes of one `set_merge` call.
pub type FieldWrites = BTreeMap<String, FieldWrite>;

/// Live stream of snapshots for one document.
///
/// The first snapshot is the state at subscription time. Dropping the
/// subscription, or calling [`Subscription::unsubscribe`], stops delivery.
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<DocumentSnapshot>,
    _guard: Option<DropGuard>,
}

impl Subscription {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<DocumentSnapshot>, guard: Option<DropGuard>) -> Self {
        Self {
            receiver,
            _guard: guard,
        }
    }

    /// Next snapshot, or `None` once the store closed the subscription.
    pub async fn next(&mut self) -> Option<DocumentSnapshot> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(self) {}
}

/// A document database supporting merge writes and live subscriptions.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocumentPath) -> PlatformResult<DocumentSnapshot>;

    /// Apply `writes` to the document, creating it if absent.
    ///
    /// Fields not named in `writes` are untouched. All writes of one call
    /// are applied atomically.
    async fn set_merge(&self, path: &DocumentPath, writes: FieldWrites) -> PlatformResult<()>;

    async fn subscribe(&self, path: &DocumentPath) -> PlatformResult<Subscription>;

    async fn atomic_increment(&self, path: &DocumentPath, field: &str, delta: i64) -> PlatformResult<()> {
        let mut writes = FieldWrites::new();
        writes.insert(field.to_string(), FieldWrite::Increment(delta));
        self.set_merge(path, writes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn path_renders_as_collection_slash_id() {
        assert_eq!(DocumentPath::new("users", "abc").to_string(), "users/abc");
    }

    #[test]
    fn snapshot_accessors() {
        let mut data = Fields::new();
        data.insert("clickCount".into(), json!(4));
        data.insert("uid".into(), json!("abc"));
        let snap = DocumentSnapshot {
            path: DocumentPath::new("users", "abc"),
            data: Some(data),
        };

        assert!(snap.exists());
        assert_eq!(snap.get_i64("clickCount"), Some(4));
        assert_eq!(snap.get_i64("uid"), None);
        assert!(!DocumentSnapshot::missing(DocumentPath::new("users", "x")).exists());
    }
}
