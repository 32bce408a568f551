// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWKS (JSON Web Key Set) fetching and caching.
//!
//! ## Security
//!
//! - Keys are fetched from Google's securetoken endpoint over HTTPS
//! - The cache lifetime follows the response's `Cache-Control: max-age`,
//!   falling back to a fixed TTL
//! - A token whose `kid` is unknown forces one refetch, so rotated keys are
//!   picked up before the cache expires

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet};
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use tokio::sync::RwLock;

/// Public keys for Firebase ID tokens.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// JWKS failures. Always surfaced to clients as an invalid token.
#[derive(Debug, thiserror::Error)]
pub enum JwksError {
    #[error("failed to fetch JWKS: {0}")]
    Fetch(String),
    #[error("no key with id {0}")]
    NoMatchingKey(String),
    #[error("unusable key: {0}")]
    UnusableKey(String),
}

/// JWKS cache entry.
struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self) -> bool {
        self.fetched_at.elapsed() < self.ttl
    }
}

/// JWKS manager with caching.
#[derive(Clone)]
pub struct JwksManager {
    /// JWKS URL
    jwks_url: String,
    /// Used when the response carries no `max-age`
    default_ttl: Duration,
    /// Cached JWKS
    cache: Arc<RwLock<Option<CacheEntry>>>,
    /// HTTP client
    client: reqwest::Client,
}

impl JwksManager {
    /// Create a new JWKS manager.
    pub fn new(client: reqwest::Client, jwks_url: impl Into<String>) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            default_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client,
        }
    }

    /// Manager for the Firebase securetoken keys.
    pub fn firebase(client: reqwest::Client) -> Self {
        Self::new(client, FIREBASE_JWKS_URL)
    }

    /// Create with custom fallback cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Get the JWKS URL.
    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Fetch JWKS (with caching).
    async fn get_jwks(&self) -> Result<JwkSet, JwksError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.as_ref().filter(|e| e.is_fresh()) {
                return Ok(entry.jwks.clone());
            }
        }

        self.refresh().await
    }

    /// Fetch JWKS from the endpoint.
    async fn fetch_jwks(&self) -> Result<(JwkSet, Duration), JwksError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(JwksError::Fetch(format!(
                "HTTP {} from JWKS endpoint",
                response.status()
            )));
        }

        let ttl = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(max_age)
            .unwrap_or(self.default_ttl);

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| JwksError::Fetch(e.to_string()))?;

        Ok((jwks, ttl))
    }

    /// Get the decoding key for the given key ID.
    pub async fn get_decoding_key(&self, kid: &str) -> Result<DecodingKey, JwksError> {
        let jwks = self.get_jwks().await?;
        if let Some(jwk) = jwks.find(kid) {
            return jwk_to_decoding_key(jwk);
        }

        // Keys rotate; one refetch before giving up.
        let jwks = self.refresh().await?;
        let jwk = jwks
            .find(kid)
            .ok_or_else(|| JwksError::NoMatchingKey(kid.to_string()))?;
        jwk_to_decoding_key(jwk)
    }

    /// Force refresh the JWKS cache.
    pub async fn refresh(&self) -> Result<JwkSet, JwksError> {
        let (jwks, ttl) = self.fetch_jwks().await?;
        tracing::debug!(keys = jwks.keys.len(), ttl_secs = ttl.as_secs(), "Refreshed JWKS");

        let mut cache = self.cache.write().await;
        *cache = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
            ttl,
        });
        Ok(jwks)
    }

    /// Check if JWKS is currently cached and valid.
    pub async fn is_cached(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(CacheEntry::is_fresh)
    }
}

/// `max-age` directive of a `Cache-Control` header.
fn max_age(header: &str) -> Option<Duration> {
    header
        .split(',')
        .filter_map(|directive| directive.trim().strip_prefix("max-age="))
        .find_map(|secs| secs.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Convert a JWK to a DecodingKey. Firebase only publishes RSA keys.
fn jwk_to_decoding_key(jwk: &Jwk) -> Result<DecodingKey, JwksError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
            .map_err(|e| JwksError::UnusableKey(format!("Failed to create RSA key: {e}"))),
        _ => Err(JwksError::UnusableKey(
            "Unsupported key type in JWKS".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firebase_manager_points_at_securetoken_keys() {
        let manager = JwksManager::firebase(reqwest::Client::new());
        assert_eq!(manager.jwks_url(), FIREBASE_JWKS_URL);
    }

    #[test]
    fn custom_cache_ttl() {
        let manager = JwksManager::new(reqwest::Client::new(), "https://example.com/jwks.json")
            .with_cache_ttl(Duration::from_secs(60));
        assert_eq!(manager.default_ttl, Duration::from_secs(60));
    }

    #[test]
    fn parses_max_age() {
        assert_eq!(
            max_age("public, max-age=19845, must-revalidate, no-transform"),
            Some(Duration::from_secs(19845))
        );
        assert_eq!(max_age("no-cache"), None);
    }

    #[tokio::test]
    async fn cache_initially_empty() {
        let manager = JwksManager::new(reqwest::Client::new(), "https://example.com/jwks.json");
        assert!(!manager.is_cached().await);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_fetch_error() {
        let manager = JwksManager::new(reqwest::Client::new(), "http://127.0.0.1:1/jwks.json");
        let err = manager.get_decoding_key("kid").await.unwrap_err();
        assert!(matches!(err, JwksError::Fetch(_)));
    }
}
