// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Capabilities
//!
//! The identity service issues and verifies user credentials. Three roles
//! are split into separate traits because each side only needs part of it:
//!
//! - [`TokenVerifier`] - server: bearer credential → verified [`Identity`]
//! - [`IdentityDirectory`] - server: canonical user record by id
//! - [`IdentityService`] - client: sign-up, sign-in and token refresh

mod memory;
mod toolkit;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PlatformResult, ValidationError};

pub use memory::MemoryIdentityService;
pub use toolkit::{IdentityToolkit, IDENTITY_TOOLKIT_URL, SECURE_TOKEN_URL};

/// Shortest password accepted at sign-up.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A user as known to the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Opaque, stable user id assigned by the identity service.
    pub uid: String,
    /// Email address, if the account has one.
    pub email: Option<String>,
}

/// Credentials issued on sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    /// Short-lived bearer credential presented to the API and the store.
    pub id_token: String,
    /// Long-lived credential used to obtain a new `id_token`.
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthTokens {
    /// Whether the id token expires within `margin` from now.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        self.expires_at - margin <= Utc::now()
    }
}

/// Result of a successful sign-up or sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub identity: Identity,
    pub tokens: AuthTokens,
}

/// Verifies a bearer credential.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify_token(&self, credential: &str) -> PlatformResult<Identity>;
}

/// Looks up the canonical identity record for a user id.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_user(&self, uid: &str) -> PlatformResult<Identity>;
}

/// Account operations used by the client.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> PlatformResult<SignedIn>;

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<SignedIn>;

    /// Exchange a refresh token for a fresh id token.
    async fn refresh(&self, refresh_token: &str) -> PlatformResult<AuthTokens>;
}

/// Check email shape and password policy before any remote call.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty() && !domain.contains('@'),
        None => false,
    };
    if !valid_email {
        return Err(ValidationError::InvalidEmail);
    }
    if password.is_empty() {
        return Err(ValidationError::MissingPassword);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::WeakPassword {
            min_length: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_email() {
        assert_eq!(
            validate_credentials("not-an-email", "secret1"),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(
            validate_credentials("a@b@c", "secret1"),
            Err(ValidationError::InvalidEmail)
        );
        assert_eq!(validate_credentials("@b", "secret1"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn enforces_minimum_password_length() {
        assert_eq!(
            validate_credentials("a@b.c", "12345"),
            Err(ValidationError::WeakPassword { min_length: 6 })
        );
        assert_eq!(validate_credentials("a@b.c", ""), Err(ValidationError::MissingPassword));
        assert!(validate_credentials("a@b.c", "123456").is_ok());
    }

    #[test]
    fn expiry_margin() {
        let tokens = AuthTokens {
            id_token: "t".into(),
            refresh_token: "r".into(),
            expires_at: Utc::now() + chrono::Duration::minutes(3),
        };
        assert!(tokens.expires_within(chrono::Duration::minutes(5)));
        assert!(!tokens.expires_within(chrono::Duration::minutes(1)));
    }
}
