// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for authenticated users.
//!
//! Use the `Auth` extractor in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity.uid is the verified user id
//! }
//! ```
//!
//! The extractor runs before the handler body, so a rejected request never
//! reaches the identity directory or the document store.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use tiny_counter_platform::Identity;

use super::AuthError;
use crate::state::AppState;

/// Extractor for authenticated users.
pub struct Auth(pub Identity);

/// Bearer credential of an `Authorization: Bearer <token>` header.
///
/// Anything else (absent header, non-ASCII value, another scheme, empty
/// token) yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;

        match state.verifier.verify_token(token).await {
            Ok(identity) => Ok(Auth(identity)),
            Err(e) => {
                tracing::warn!(error = %e, "Token verification failed");
                Err(AuthError::InvalidToken(e.to_string()))
            }
        }
    }
}
