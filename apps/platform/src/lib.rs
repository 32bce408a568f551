// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tiny Counter - Platform Capabilities
//!
//! The application delegates identity and persistence to an external
//! platform (Firebase in production). This crate describes that platform as
//! a small set of capability traits so the server and the client can run
//! against the hosted service or against an in-process substitute.
//!
//! ## Modules
//!
//! - `identity` - token verification, canonical user lookup, sign-up/sign-in
//! - `store` - per-user documents with merge writes, atomic increments and
//!   live subscriptions
//! - `credentials` - bearer credentials for outbound REST calls
//! - `error` - shared error taxonomy

pub mod credentials;
pub mod error;
pub mod identity;
pub mod store;

pub use credentials::{AccessTokenSource, MetadataServerTokenSource, StaticTokenSource};
pub use error::{PlatformError, PlatformResult, ValidationError};
pub use identity::{
    validate_credentials, AuthTokens, Identity, IdentityDirectory, IdentityService,
    IdentityToolkit, MemoryIdentityService, SignedIn, TokenVerifier, MIN_PASSWORD_LENGTH,
};
pub use store::{
    DocumentPath, DocumentSnapshot, DocumentStore, FieldWrite, FieldWrites, Fields,
    FirestoreDocumentStore, MemoryDocumentStore, Subscription,
};
