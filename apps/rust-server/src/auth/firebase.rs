// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase ID token verification.
//!
//! Production tokens are RS256-signed and checked against the securetoken
//! JWKS. The Auth emulator issues unsigned tokens (`alg: none`); with an
//! emulator configured only the claims are checked, the same way the
//! Firebase Admin SDK behaves.

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use tiny_counter_platform::{Identity, PlatformError, PlatformResult, TokenVerifier};

use super::claims::FirebaseClaims;
use super::jwks::JwksManager;

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Issuer prefix of Firebase ID tokens.
const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

#[derive(Clone)]
enum Keys {
    Jwks(Arc<JwksManager>),
    /// Signatures are not checked.
    Emulator,
}

/// Verifies Firebase ID tokens for one project.
#[derive(Clone)]
pub struct FirebaseTokenVerifier {
    project_id: String,
    keys: Keys,
}

impl FirebaseTokenVerifier {
    pub fn new(project_id: impl Into<String>, jwks: Arc<JwksManager>) -> Self {
        Self {
            project_id: project_id.into(),
            keys: Keys::Jwks(jwks),
        }
    }

    /// Verifier for tokens minted by the Firebase Auth emulator.
    pub fn emulator(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            keys: Keys::Emulator,
        }
    }

    /// Key set in use, `None` in emulator mode.
    pub fn jwks(&self) -> Option<&Arc<JwksManager>> {
        match &self.keys {
            Keys::Jwks(jwks) => Some(jwks),
            Keys::Emulator => None,
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_issuer(&[format!("{ISSUER_PREFIX}{}", self.project_id)]);
        validation.set_audience(&[&self.project_id]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud", "sub"]);
        validation
    }

    async fn verify_signed(&self, jwks: &JwksManager, credential: &str) -> PlatformResult<FirebaseClaims> {
        let header = decode_header(credential).map_err(|_| rejected("malformed token"))?;
        if header.alg != Algorithm::RS256 {
            return Err(rejected(format!("unexpected algorithm {:?}", header.alg)));
        }
        let kid = header.kid.ok_or_else(|| rejected("token has no kid"))?;

        let key = jwks
            .get_decoding_key(&kid)
            .await
            .map_err(|e| rejected(e.to_string()))?;

        let token_data = decode::<FirebaseClaims>(credential, &key, &self.validation()).map_err(
            |e| match e.kind() {
                ErrorKind::ExpiredSignature => rejected("token expired"),
                ErrorKind::InvalidSignature => rejected("invalid signature"),
                ErrorKind::InvalidIssuer => rejected("invalid issuer"),
                ErrorKind::InvalidAudience => rejected("invalid audience"),
                ErrorKind::ImmatureSignature => rejected("token not yet valid"),
                _ => rejected("malformed token"),
            },
        )?;

        let claims = token_data.claims;
        claims
            .check(chrono::Utc::now().timestamp(), CLOCK_SKEW_LEEWAY as i64)
            .map_err(rejected)?;
        Ok(claims)
    }

    fn verify_unsigned(&self, credential: &str) -> PlatformResult<FirebaseClaims> {
        let mut parts = credential.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(rejected("malformed token"));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| rejected("malformed token"))?;
        let claims: FirebaseClaims =
            serde_json::from_slice(&bytes).map_err(|_| rejected("malformed token"))?;

        claims
            .check_unsigned(
                &self.project_id,
                chrono::Utc::now().timestamp(),
                CLOCK_SKEW_LEEWAY as i64,
            )
            .map_err(rejected)?;
        Ok(claims)
    }
}

fn rejected(reason: impl Into<String>) -> PlatformError {
    PlatformError::Authentication(reason.into())
}

#[async_trait]
impl TokenVerifier for FirebaseTokenVerifier {
    async fn verify_token(&self, credential: &str) -> PlatformResult<Identity> {
        let claims = match &self.keys {
            Keys::Jwks(jwks) => self.verify_signed(jwks, credential).await?,
            Keys::Emulator => self.verify_unsigned(credential)?,
        };
        Ok(claims.into())
    }
}
