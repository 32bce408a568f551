// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Calls to the protected HTTP API, authorized with the session's ID token.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ClientError;
use crate::session::SessionManager;

/// Caller identity as reported by `/api/echo` and `/api/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncrementReply {
    ok: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: String,
}

pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    session: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base: Url, session: Arc<SessionManager>) -> Self {
        Self { http, base, session }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base.as_str().trim_end_matches('/'), path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        let token = self.session.get_token().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ErrorReply>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
        };
        tracing::debug!(status = status.as_u16(), %message, "API call rejected");
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// `GET /api/echo`: the uid the server extracted from the token.
    pub async fn echo(&self) -> Result<String, ClientError> {
        let reply: UserInfo = self.send(self.http.get(self.url("/api/echo"))).await?.json().await?;
        Ok(reply.uid)
    }

    /// `GET /api/me`: the caller's account record.
    pub async fn me(&self) -> Result<UserInfo, ClientError> {
        Ok(self.send(self.http.get(self.url("/api/me"))).await?.json().await?)
    }

    /// `POST /api/increment`: bump the caller's server-side counter.
    pub async fn increment(&self) -> Result<bool, ClientError> {
        let reply: IncrementReply = self
            .send(self.http.post(self.url("/api/increment")))
            .await?
            .json()
            .await?;
        Ok(reply.ok)
    }
}
