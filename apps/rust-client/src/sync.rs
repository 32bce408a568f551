// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Counter Record Sync
//!
//! Keeps a local copy of the signed-in user's click count in step with the
//! `users/{uid}` document.
//!
//! On every sign-in the record is created if missing and a live
//! subscription is opened; on sign-out (or a switch to another user) the
//! subscription is torn down and the local count goes back to 0. At most
//! one subscription is live at any time.

use std::sync::Arc;

use serde_json::json;
use tiny_counter_platform::{DocumentPath, DocumentStore, FieldWrite, FieldWrites, Identity};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::session::SessionState;

/// Counter field of the user record.
pub const FIELD: &str = "clickCount";

pub struct CounterSync {
    store: Arc<dyn DocumentStore>,
    collection: String,
    count: watch::Sender<i64>,
}

impl CounterSync {
    pub fn new(store: Arc<dyn DocumentStore>, collection: impl Into<String>) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            store,
            collection: collection.into(),
            count,
        }
    }

    fn path(&self, uid: &str) -> DocumentPath {
        DocumentPath::new(self.collection.clone(), uid)
    }

    /// Create the user's record with a zero count if it does not exist.
    pub async fn ensure_record(&self, identity: &Identity) -> Result<(), ClientError> {
        let path = self.path(&identity.uid);
        if self.store.get(&path).await?.exists() {
            return Ok(());
        }

        let mut writes = FieldWrites::new();
        writes.insert("uid".into(), FieldWrite::Set(json!(identity.uid)));
        writes.insert(FIELD.into(), FieldWrite::Set(json!(0)));
        writes.insert("createdAt".into(), FieldWrite::ServerTimestamp);
        self.store.set_merge(&path, writes).await?;

        tracing::debug!(%path, "Created user record");
        Ok(())
    }

    /// Add one click to the user's record.
    ///
    /// The local count is not touched; it follows once the subscription
    /// delivers the new snapshot.
    pub async fn increment(&self, uid: &str) -> Result<(), ClientError> {
        let mut writes = FieldWrites::new();
        writes.insert("uid".into(), FieldWrite::Set(json!(uid)));
        writes.insert(FIELD.into(), FieldWrite::Increment(1));
        writes.insert("lastClickedAt".into(), FieldWrite::ServerTimestamp);
        self.store.set_merge(&self.path(uid), writes).await?;
        Ok(())
    }

    pub fn count(&self) -> i64 {
        *self.count.borrow()
    }

    pub fn watch_count(&self) -> watch::Receiver<i64> {
        self.count.subscribe()
    }

    /// Follow `sessions` until the returned task is shut down.
    pub fn attach(self: Arc<Self>, mut sessions: watch::Receiver<SessionState>) -> SyncTask {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut active: Option<ActiveSync> = None;
            let mut state = sessions.borrow_and_update().clone();

            loop {
                match state {
                    // Keep whatever is live until the attempt settles.
                    SessionState::Authenticating => {}
                    SessionState::SignedIn(identity) => {
                        let same_user = active.as_ref().is_some_and(|a| a.uid == identity.uid);
                        if !same_user {
                            if let Some(previous) = active.take() {
                                self.stop(previous).await;
                            }
                            active = Some(self.start(identity));
                        }
                    }
                    SessionState::SignedOut => {
                        if let Some(previous) = active.take() {
                            self.stop(previous).await;
                        }
                    }
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    changed = sessions.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                state = sessions.borrow_and_update().clone();
            }

            if let Some(previous) = active.take() {
                self.stop(previous).await;
            }
        });

        SyncTask {
            cancel,
            handle: Some(handle),
        }
    }

    fn start(self: &Arc<Self>, identity: Identity) -> ActiveSync {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let sync = Arc::clone(self);
        let uid = identity.uid.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                result = sync.follow(&identity) => {
                    if let Err(e) = result {
                        tracing::warn!(uid = %identity.uid, error = %e, "Counter sync stopped");
                    }
                }
            }
        });

        ActiveSync { uid, cancel, handle }
    }

    async fn follow(&self, identity: &Identity) -> Result<(), ClientError> {
        self.ensure_record(identity).await?;

        let mut subscription = self.store.subscribe(&self.path(&identity.uid)).await?;
        while let Some(snapshot) = subscription.next().await {
            self.count.send_replace(snapshot.get_i64(FIELD).unwrap_or(0));
        }
        Ok(())
    }

    async fn stop(&self, active: ActiveSync) {
        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            tracing::warn!(uid = %active.uid, error = %e, "Counter sync task failed");
        }
        self.count.send_replace(0);
    }
}

struct ActiveSync {
    uid: String,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Handle to a running [`CounterSync::attach`] listener.
///
/// Dropping it stops the listener without waiting.
pub struct SyncTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl SyncTask {
    /// Stop listening and wait for the live subscription to close.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for SyncTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
