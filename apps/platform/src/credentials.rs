// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer credentials for outbound platform calls.
//!
//! On Cloud Run the server acts as its default service account: access
//! tokens come from the instance metadata server and are cached until shortly
//! before they expire. Emulators accept a fixed token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{PlatformError, PlatformResult};

/// Default metadata server token endpoint.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before their advertised expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies the `Authorization: Bearer` credential for REST calls.
///
/// `Ok(None)` means the call is made without credentials.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> PlatformResult<Option<String>>;
}

/// A fixed credential (or none), used against emulators and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenSource(pub Option<String>);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> PlatformResult<Option<String>> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    valid_until: Instant,
}

/// Access tokens for the instance's default service account.
#[derive(Clone)]
pub struct MetadataServerTokenSource {
    url: String,
    client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedToken>>>,
}

impl MetadataServerTokenSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, METADATA_TOKEN_URL)
    }

    pub fn with_url(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    async fn fetch(&self) -> PlatformResult<MetadataToken> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PlatformError::Upstream {
                status: response.status().as_u16(),
                message: "metadata server refused token request".to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AccessTokenSource for MetadataServerTokenSource {
    async fn access_token(&self) -> PlatformResult<Option<String>> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if Instant::now() < entry.valid_until {
                    return Ok(Some(entry.token.clone()));
                }
            }
        }

        let fresh = self.fetch().await?;
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        tracing::debug!(expires_in = fresh.expires_in, "Fetched service account access token");

        let mut cache = self.cache.write().await;
        *cache = Some(CachedToken {
            token: fresh.access_token.clone(),
            valid_until: Instant::now() + lifetime,
        });
        Ok(Some(fresh.access_token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_its_token() {
        let source = StaticTokenSource::new("owner");
        assert_eq!(source.access_token().await.unwrap().as_deref(), Some("owner"));
        assert!(StaticTokenSource::anonymous().access_token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn metadata_source_reports_transport_failure() {
        let source = MetadataServerTokenSource::with_url(reqwest::Client::new(), "http://127.0.0.1:1/token");
        let err = source.access_token().await.unwrap_err();
        assert!(matches!(err, PlatformError::Transport(_)));
    }
}
