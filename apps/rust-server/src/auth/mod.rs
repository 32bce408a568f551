// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Bearer-token authentication for the protected `/api` routes.
//!
//! ## Auth Flow
//!
//! 1. The client signs in with Firebase Auth and obtains an ID token
//! 2. The client sends `Authorization: Bearer <ID token>`
//! 3. The server:
//!    - rejects requests without a well-formed header (`Missing token`)
//!    - verifies the token through the configured [`TokenVerifier`]
//!      (`Invalid token` on any failure)
//!    - hands the verified [`Identity`] to the handler
//!
//! ## Firebase Verification
//!
//! - RS256 signature against Google's securetoken JWKS (HTTPS, cached)
//! - Issuer `https://securetoken.google.com/<project>`, audience `<project>`
//! - Clock skew tolerance is 60 seconds
//! - With the Auth emulator configured, unsigned emulator tokens are
//!   accepted and only their claims are checked
//!
//! [`TokenVerifier`]: tiny_counter_platform::TokenVerifier
//! [`Identity`]: tiny_counter_platform::Identity

pub mod claims;
pub mod error;
pub mod extractor;
pub mod firebase;
pub mod jwks;
#[cfg(test)]
pub(crate) mod test_support;

pub use claims::FirebaseClaims;
pub use error::AuthError;
pub use extractor::{bearer_token, Auth};
pub use firebase::FirebaseTokenVerifier;
pub use jwks::JwksManager;
