// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity endpoints.

use axum::{extract::State, Json};
use tiny_counter_platform::PlatformError;

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{ErrorResponse, IdentityResponse};
use crate::state::AppState;

/// Echo the identity carried by the verified token.
///
/// No directory or store access.
#[utoipa::path(
    get,
    path = "/api/echo",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Identity from token claims", body = IdentityResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
    )
)]
pub async fn echo(Auth(identity): Auth) -> Json<IdentityResponse> {
    Json(identity.into())
}

/// Get the canonical identity record of the caller.
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Identity",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Identity from the user directory", body = IdentityResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Account no longer exists", body = ErrorResponse),
        (status = 502, description = "Identity service unavailable", body = ErrorResponse),
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Result<Json<IdentityResponse>, ApiError> {
    let record = state
        .directory
        .get_user(&identity.uid)
        .await
        .map_err(|e| match e {
            PlatformError::NotFound(_) => ApiError::not_found("User not found"),
            e => {
                tracing::warn!(uid = %identity.uid, error = %e, "Identity lookup failed");
                ApiError::bad_gateway("Identity lookup failed")
            }
        })?;

    Ok(Json(IdentityResponse {
        uid: identity.uid,
        email: record.email,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_counter_platform::{Identity, IdentityService, MemoryIdentityService};

    #[tokio::test]
    async fn echo_returns_token_identity() {
        let identity = Identity {
            uid: "abc".into(),
            email: None,
        };
        let Json(body) = echo(Auth(identity)).await;
        assert_eq!(body.uid, "abc");
        assert_eq!(body.email, None);
    }

    #[tokio::test]
    async fn me_reads_directory_record() {
        let service = MemoryIdentityService::new();
        let state = AppState::with_memory_identity(service.clone());
        let signed_in = service.sign_up("ada@example.com", "hunter22").await.unwrap();

        let token_identity = Identity {
            uid: signed_in.identity.uid.clone(),
            email: None,
        };
        let Json(body) = me(State(state), Auth(token_identity)).await.unwrap();
        assert_eq!(body.uid, signed_in.identity.uid);
        assert_eq!(body.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn me_maps_unknown_user_to_404() {
        let identity = Identity {
            uid: "ghost".into(),
            email: None,
        };
        let err = me(State(AppState::in_memory()), Auth(identity))
            .await
            .unwrap_err();
        assert_eq!(err.status, axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.message, "User not found");
    }
}
