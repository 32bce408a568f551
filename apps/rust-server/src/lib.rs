// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tiny Counter - Authenticated API Service
//!
//! Verifies bearer tokens issued by the identity service and exposes the
//! protected identity and counter endpoints.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer token extraction and Firebase ID token verification
//! - `config` - Environment configuration
//! - `state` - Platform handles shared by all requests

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
