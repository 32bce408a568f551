// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firebase ID token claims.

use serde::Deserialize;
use tiny_counter_platform::Identity;

/// Longest `sub` Firebase will issue.
const MAX_SUBJECT_LEN: usize = 128;

/// Claims of a Firebase ID token.
///
/// Signature, `exp`, `iat`, `iss` and `aud` are checked by `jsonwebtoken`;
/// [`FirebaseClaims::check`] covers the Firebase-specific rules.
/// See: https://firebase.google.com/docs/auth/admin/verify-id-tokens
#[derive(Debug, Clone, Deserialize)]
pub struct FirebaseClaims {
    /// Subject - the Firebase user id
    pub sub: String,

    /// Issued at timestamp
    pub iat: i64,

    /// Expiration timestamp
    pub exp: i64,

    /// When the user authenticated
    #[serde(default)]
    pub auth_time: Option<i64>,

    /// Issuer (`https://securetoken.google.com/<project>`)
    pub iss: String,

    /// Audience (the project id)
    pub aud: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub email_verified: Option<bool>,
}

impl FirebaseClaims {
    /// Firebase-specific checks on top of the standard JWT validation.
    pub fn check(&self, now: i64, leeway: i64) -> Result<(), &'static str> {
        if self.sub.is_empty() {
            return Err("empty subject");
        }
        if self.sub.len() > MAX_SUBJECT_LEN {
            return Err("subject too long");
        }
        match self.auth_time {
            Some(auth_time) if auth_time <= now + leeway => Ok(()),
            Some(_) => Err("auth_time is in the future"),
            None => Err("missing auth_time"),
        }
    }
}

impl FirebaseClaims {
    /// Issuer, audience and lifetime checks for tokens whose signature is
    /// not verified (Auth emulator tokens).
    pub fn check_unsigned(&self, project_id: &str, now: i64, leeway: i64) -> Result<(), &'static str> {
        if self.iss != format!("https://securetoken.google.com/{project_id}") {
            return Err("invalid issuer");
        }
        if self.aud != project_id {
            return Err("invalid audience");
        }
        if self.exp <= now - leeway {
            return Err("token expired");
        }
        if self.iat > now + leeway {
            return Err("token not yet valid");
        }
        self.check(now, leeway)
    }
}

impl From<FirebaseClaims> for Identity {
    fn from(claims: FirebaseClaims) -> Self {
        Identity {
            uid: claims.sub,
            email: claims.email,
        }
    }
}
