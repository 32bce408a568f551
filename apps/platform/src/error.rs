// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy shared by every platform adapter.

use thiserror::Error;

/// Result type for platform operations.
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors returned by identity and document store adapters.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// Missing, invalid, expired or revoked credential.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Credentials rejected by policy before an account operation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Requested user or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform answered with an error we do not classify further.
    #[error("upstream error (HTTP {status}): {message}")]
    Upstream { status: u16, message: String },

    /// Network failure talking to the platform.
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform answered with a body we could not interpret.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl PlatformError {
    pub fn is_authentication(&self) -> bool {
        matches!(self, PlatformError::Authentication(_))
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            PlatformError::Decode(e.to_string())
        } else {
            PlatformError::Transport(e.to_string())
        }
    }
}

/// Sign-up and sign-in policy violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("email address is badly formatted")]
    InvalidEmail,

    #[error("password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("password is required")]
    MissingPassword,

    #[error("an account already exists for this email address")]
    EmailExists,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_convert() {
        let err: PlatformError = ValidationError::WeakPassword { min_length: 6 }.into();
        assert!(matches!(
            err,
            PlatformError::Validation(ValidationError::WeakPassword { min_length: 6 })
        ));
        assert_eq!(err.to_string(), "password must be at least 6 characters");
    }

    #[test]
    fn only_authentication_is_authentication() {
        assert!(PlatformError::Authentication("expired".into()).is_authentication());
        assert!(!PlatformError::Transport("reset".into()).is_authentication());
    }
}
