// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process identity service.
//!
//! Issues opaque UUID tokens instead of signed JWTs. Used by the `memory`
//! platform mode and as the identity fake in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    validate_credentials, AuthTokens, Identity, IdentityDirectory, IdentityService, SignedIn,
    TokenVerifier,
};
use crate::error::{PlatformError, PlatformResult, ValidationError};

/// Lifetime of issued id tokens.
const TOKEN_LIFETIME_SECS: i64 = 3600;

struct Account {
    uid: String,
    email: String,
    salt: String,
    password_digest: String,
}

struct IssuedToken {
    uid: String,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    /// Accounts keyed by lower-cased email.
    accounts: HashMap<String, Account>,
    id_tokens: HashMap<String, IssuedToken>,
    refresh_tokens: HashMap<String, String>,
}

impl Inner {
    fn identity(&self, uid: &str) -> Option<Identity> {
        self.accounts
            .values()
            .find(|a| a.uid == uid)
            .map(|a| Identity {
                uid: a.uid.clone(),
                email: Some(a.email.clone()),
            })
    }

    fn issue(&mut self, uid: &str) -> AuthTokens {
        let now = Utc::now();
        self.id_tokens.retain(|_, t| t.expires_at > now);

        let id_token = Uuid::new_v4().to_string();
        let refresh_token = Uuid::new_v4().to_string();
        let expires_at = now + Duration::seconds(TOKEN_LIFETIME_SECS);

        self.id_tokens.insert(
            id_token.clone(),
            IssuedToken {
                uid: uid.to_string(),
                expires_at,
            },
        );
        self.refresh_tokens
            .insert(refresh_token.clone(), uid.to_string());

        AuthTokens {
            id_token,
            refresh_token,
            expires_at,
        }
    }
}

/// Identity service backed by process memory.
#[derive(Clone, Default)]
pub struct MemoryIdentityService {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke every id and refresh token of `uid`.
    ///
    /// Models a session invalidated outside the application (password
    /// change, account disabled from the console).
    pub async fn invalidate_sessions(&self, uid: &str) {
        let mut inner = self.inner.write().await;
        inner.id_tokens.retain(|_, t| t.uid != uid);
        inner.refresh_tokens.retain(|_, owner| owner != uid);
    }

    /// Force the id token to be expired. Test helper for refresh paths.
    pub async fn expire_token(&self, id_token: &str) {
        let mut inner = self.inner.write().await;
        if let Some(token) = inner.id_tokens.get_mut(id_token) {
            token.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[async_trait]
impl IdentityService for MemoryIdentityService {
    async fn sign_up(&self, email: &str, password: &str) -> PlatformResult<SignedIn> {
        validate_credentials(email, password)?;
        let email = email.trim().to_string();
        let key = email.to_lowercase();

        let mut inner = self.inner.write().await;
        if inner.accounts.contains_key(&key) {
            return Err(ValidationError::EmailExists.into());
        }

        let salt = Uuid::new_v4().to_string();
        let account = Account {
            uid: Uuid::new_v4().simple().to_string(),
            password_digest: digest(&salt, password),
            salt,
            email: email.clone(),
        };
        let uid = account.uid.clone();
        inner.accounts.insert(key, account);
        let tokens = inner.issue(&uid);

        tracing::debug!(uid = %uid, "Created account");
        Ok(SignedIn {
            identity: Identity {
                uid,
                email: Some(email),
            },
            tokens,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<SignedIn> {
        let key = email.trim().to_lowercase();
        let mut inner = self.inner.write().await;

        let (uid, email) = match inner.accounts.get(&key) {
            Some(a) if digest(&a.salt, password) == a.password_digest => {
                (a.uid.clone(), a.email.clone())
            }
            _ => {
                return Err(PlatformError::Authentication(
                    "invalid login credentials".to_string(),
                ))
            }
        };

        let tokens = inner.issue(&uid);
        Ok(SignedIn {
            identity: Identity {
                uid,
                email: Some(email),
            },
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> PlatformResult<AuthTokens> {
        let mut inner = self.inner.write().await;
        // Refresh tokens are single use; the reply carries the next one.
        let uid = inner
            .refresh_tokens
            .remove(refresh_token)
            .ok_or_else(|| PlatformError::Authentication("invalid refresh token".to_string()))?;
        Ok(inner.issue(&uid))
    }
}

#[async_trait]
impl TokenVerifier for MemoryIdentityService {
    async fn verify_token(&self, credential: &str) -> PlatformResult<Identity> {
        let inner = self.inner.read().await;
        let token = inner
            .id_tokens
            .get(credential)
            .ok_or_else(|| PlatformError::Authentication("unknown token".to_string()))?;

        if token.expires_at <= Utc::now() {
            return Err(PlatformError::Authentication("token expired".to_string()));
        }

        inner
            .identity(&token.uid)
            .ok_or_else(|| PlatformError::Authentication("user no longer exists".to_string()))
    }
}

#[async_trait]
impl IdentityDirectory for MemoryIdentityService {
    async fn get_user(&self, uid: &str) -> PlatformResult<Identity> {
        self.inner
            .read()
            .await
            .identity(uid)
            .ok_or_else(|| PlatformError::NotFound(format!("user {uid}")))
    }
}
