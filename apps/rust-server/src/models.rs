// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Response bodies of the protected endpoints. All types derive `ToSchema`
//! for the OpenAPI document.

use serde::{Deserialize, Serialize};
use tiny_counter_platform::Identity;
use utoipa::ToSchema;

/// Body of `GET /api/echo` and `GET /api/me`.
///
/// `email` is always present and `null` when the account has none.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IdentityResponse {
    /// Verified user id.
    pub uid: String,
    /// Email address of the account.
    pub email: Option<String>,
}

impl From<Identity> for IdentityResponse {
    fn from(identity: Identity) -> Self {
        Self {
            uid: identity.uid,
            email: identity.email,
        }
    }
}

/// Body of `POST /api/increment`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct IncrementResponse {
    pub ok: bool,
}

/// Body of every 4xx/5xx response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}
