// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Tiny Counter - Client
//!
//! The client half of the application, independent of any particular UI
//! toolkit:
//!
//! - `session` - sign-up, sign-in, sign-out and ID token retrieval
//! - `sync` - mirrors the signed-in user's counter record into local state
//! - `api` - calls to the protected HTTP API
//! - `shell` - presentation state (auth form vs. dashboard) and actions

pub mod api;
pub mod config;
pub mod error;
pub mod session;
pub mod shell;
pub mod sync;

pub use error::ClientError;
pub use session::{SessionManager, SessionState};
pub use shell::{Shell, View};
pub use sync::{CounterSync, SyncTask};
