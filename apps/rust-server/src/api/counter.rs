// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Counter endpoint.

use axum::{extract::State, Json};
use serde_json::Value;
use tiny_counter_platform::{DocumentPath, FieldWrite, FieldWrites};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::models::{ErrorResponse, IncrementResponse};
use crate::state::AppState;

/// Add one to the caller's counter record, creating it if absent.
///
/// The record is addressed by the verified uid only. Atomicity under
/// concurrent callers comes from the store's increment transform.
#[utoipa::path(
    post,
    path = "/api/increment",
    tag = "Counter",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Counter incremented", body = IncrementResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 500, description = "Store write failed", body = ErrorResponse),
    )
)]
pub async fn increment(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Result<Json<IncrementResponse>, ApiError> {
    let path = DocumentPath::new(&state.counter.collection, &identity.uid);

    let mut writes = FieldWrites::new();
    writes.insert("uid".to_string(), FieldWrite::Set(Value::String(identity.uid.clone())));
    writes.insert(state.counter.field.clone(), FieldWrite::Increment(1));

    state.store.set_merge(&path, writes).await.map_err(|e| {
        tracing::error!(path = %path, error = %e, "Counter increment failed");
        ApiError::internal("Failed to update counter")
    })?;

    tracing::debug!(path = %path, field = %state.counter.field, "Counter incremented");
    Ok(Json(IncrementResponse { ok: true }))
}
