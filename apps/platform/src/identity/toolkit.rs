// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase Identity Toolkit REST client.
//!
//! - Account operations (`accounts:signUp`, `accounts:signInWithPassword`)
//!   and token refresh are authorized by the project's web API key.
//! - Canonical user lookup (`projects/{id}/accounts:lookup`) is an admin
//!   operation authorized by an OAuth access token.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use super::{validate_credentials, AuthTokens, Identity, IdentityDirectory, IdentityService, SignedIn};
use crate::credentials::AccessTokenSource;
use crate::error::{PlatformError, PlatformResult, ValidationError};

pub const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
pub const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Identity Toolkit client.
#[derive(Clone)]
pub struct IdentityToolkit {
    client: reqwest::Client,
    api_key: String,
    project_id: String,
    identity_url: String,
    secure_token_url: String,
    access_tokens: Option<Arc<dyn AccessTokenSource>>,
}

impl IdentityToolkit {
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            project_id: project_id.into(),
            identity_url: IDENTITY_TOOLKIT_URL.to_string(),
            secure_token_url: SECURE_TOKEN_URL.to_string(),
            access_tokens: None,
        }
    }

    /// Route every call to the Auth emulator at `host` (e.g. `localhost:9099`).
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.identity_url = format!("http://{host}/identitytoolkit.googleapis.com/v1");
        self.secure_token_url = format!("http://{host}/securetoken.googleapis.com/v1");
        self
    }

    /// Credentials for admin calls ([`IdentityDirectory::get_user`]).
    pub fn with_access_tokens(mut self, source: Arc<dyn AccessTokenSource>) -> Self {
        self.access_tokens = Some(source);
        self
    }

    async fn post<B: Serialize, R: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        body: &B,
    ) -> PlatformResult<R> {
        let response = request.json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorEnvelope>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| status.to_string());
            return Err(map_error(status, &message));
        }
        Ok(response.json().await?)
    }

    async fn password_call(&self, method: &str, email: &str, password: &str) -> PlatformResult<SignedIn> {
        let request = self
            .client
            .post(format!("{}/accounts:{method}", self.identity_url))
            .query(&[("key", &self.api_key)]);
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: PasswordResponse = self.post(request, &body).await?;

        Ok(SignedIn {
            identity: Identity {
                uid: response.local_id,
                email: response.email,
            },
            tokens: tokens(response.id_token, response.refresh_token, &response.expires_in)?,
        })
    }
}

fn tokens(id_token: String, refresh_token: String, expires_in: &str) -> PlatformResult<AuthTokens> {
    let seconds: i64 = expires_in
        .parse()
        .map_err(|_| PlatformError::Decode(format!("expires_in is not a number: {expires_in}")))?;
    let expires_at = TimeDelta::try_seconds(seconds)
        .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        .ok_or_else(|| PlatformError::Decode(format!("expires_in out of range: {expires_in}")))?;
    Ok(AuthTokens {
        id_token,
        refresh_token,
        expires_at,
    })
}

/// Map an Identity Toolkit error message onto the error taxonomy.
///
/// Messages look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be
/// at least 6 characters`.
fn map_error(status: StatusCode, message: &str) -> PlatformError {
    let code = message.split(':').next().unwrap_or_default().trim();
    match code {
        "EMAIL_EXISTS" => ValidationError::EmailExists.into(),
        "INVALID_EMAIL" => ValidationError::InvalidEmail.into(),
        "MISSING_PASSWORD" => ValidationError::MissingPassword.into(),
        "WEAK_PASSWORD" => ValidationError::WeakPassword {
            min_length: super::MIN_PASSWORD_LENGTH,
        }
        .into(),
        "INVALID_LOGIN_CREDENTIALS" | "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "USER_DISABLED"
        | "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "INVALID_ID_TOKEN" => {
            PlatformError::Authentication(code.to_lowercase())
        }
        "USER_NOT_FOUND" => PlatformError::NotFound("user".to_string()),
        _ => PlatformError::Upstream {
            status: status.as_u16(),
            message: message.to_string(),
        },
    }
}

#[async_trait]
impl IdentityService for IdentityToolkit {
    async fn sign_up(&self, email: &str, password: &str) -> PlatformResult<SignedIn> {
        validate_credentials(email, password)?;
        self.password_call("signUp", email.trim(), password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> PlatformResult<SignedIn> {
        self.password_call("signInWithPassword", email.trim(), password)
            .await
    }

    async fn refresh(&self, refresh_token: &str) -> PlatformResult<AuthTokens> {
        let request = self
            .client
            .post(format!("{}/token", self.secure_token_url))
            .query(&[("key", &self.api_key)]);
        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        });
        let response: RefreshResponse = self.post(request, &body).await?;
        tokens(response.id_token, response.refresh_token, &response.expires_in)
    }
}

#[async_trait]
impl IdentityDirectory for IdentityToolkit {
    async fn get_user(&self, uid: &str) -> PlatformResult<Identity> {
        let mut request = self.client.post(format!(
            "{}/projects/{}/accounts:lookup",
            self.identity_url, self.project_id
        ));
        if let Some(source) = &self.access_tokens {
            if let Some(token) = source.access_token().await? {
                request = request.bearer_auth(token);
            }
        }

        let response: LookupResponse = self.post(request, &json!({ "localId": [uid] })).await?;
        response
            .users
            .into_iter()
            .find(|u| u.local_id == uid)
            .map(|u| Identity {
                uid: u.local_id,
                email: u.email,
            })
            .ok_or_else(|| PlatformError::NotFound(format!("user {uid}")))
    }
}
