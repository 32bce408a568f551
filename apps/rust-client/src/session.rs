// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Auth Session Manager
//!
//! Wraps the identity service and holds the one in-memory session.
//!
//! ```text
//! SignedOut ──register/login──▶ Authenticating ──ok──▶ SignedIn
//!     ▲                              │                    │
//!     └────────────── error ─────────┘                    │
//!     └──────── logout / refresh rejected ────────────────┘
//! ```
//!
//! State changes are published on a `watch` channel; token refreshes are
//! not state changes.

use std::sync::Arc;

use async_trait::async_trait;
use tiny_counter_platform::{
    validate_credentials, AccessTokenSource, AuthTokens, Identity, IdentityService, PlatformError,
    PlatformResult, SignedIn,
};
use tokio::sync::{watch, Mutex};

use crate::error::ClientError;

/// ID tokens are refreshed when they expire within this window.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    SignedOut,
    Authenticating,
    SignedIn(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

pub struct SessionManager {
    identity: Arc<dyn IdentityService>,
    state: watch::Sender<SessionState>,
    tokens: Mutex<Option<AuthTokens>>,
}

impl SessionManager {
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        let (state, _) = watch::channel(SessionState::SignedOut);
        Self {
            identity,
            state,
            tokens: Mutex::new(None),
        }
    }

    /// Listen for session changes (the current state is marked seen).
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Identity of the signed-in user.
    pub fn current(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        validate_credentials(email, password).map_err(PlatformError::from)?;
        self.authenticate(self.identity.sign_up(email, password)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        validate_credentials(email, password).map_err(PlatformError::from)?;
        self.authenticate(self.identity.sign_in(email, password)).await
    }

    async fn authenticate(
        &self,
        call: impl std::future::Future<Output = PlatformResult<SignedIn>>,
    ) -> Result<Identity, ClientError> {
        let previous = self.state.send_replace(SessionState::Authenticating);

        match call.await {
            Ok(signed_in) => {
                *self.tokens.lock().await = Some(signed_in.tokens);
                tracing::info!(uid = %signed_in.identity.uid, "Signed in");
                self.state
                    .send_replace(SessionState::SignedIn(signed_in.identity.clone()));
                Ok(signed_in.identity)
            }
            Err(e) => {
                // A failed attempt while signed in leaves the old session alone.
                let restored = match previous {
                    SessionState::SignedIn(identity) => SessionState::SignedIn(identity),
                    _ => SessionState::SignedOut,
                };
                self.state.send_replace(restored);
                Err(e.into())
            }
        }
    }

    pub async fn logout(&self) -> Result<(), ClientError> {
        *self.tokens.lock().await = None;
        if self.state.send_replace(SessionState::SignedOut) != SessionState::SignedOut {
            tracing::info!("Signed out");
        }
        Ok(())
    }

    /// Current ID token, refreshed first if it is about to expire.
    ///
    /// A refresh rejected by the identity service ends the session.
    pub async fn get_token(&self) -> Result<String, ClientError> {
        let mut tokens = self.tokens.lock().await;
        let current = tokens.as_ref().ok_or(ClientError::NotSignedIn)?;

        if !current.expires_within(chrono::Duration::minutes(REFRESH_MARGIN_MINUTES)) {
            return Ok(current.id_token.clone());
        }

        match self.identity.refresh(&current.refresh_token).await {
            Ok(fresh) => {
                let id_token = fresh.id_token.clone();
                *tokens = Some(fresh);
                Ok(id_token)
            }
            Err(e) if e.is_authentication() => {
                tracing::warn!(error = %e, "Session invalidated");
                *tokens = None;
                self.state.send_replace(SessionState::SignedOut);
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl AccessTokenSource for SessionManager {
    async fn access_token(&self) -> PlatformResult<Option<String>> {
        self.get_token().await.map(Some).map_err(PlatformError::from)
    }
}
