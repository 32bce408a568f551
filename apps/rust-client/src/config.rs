// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Configuration
//!
//! | Variable | When | Description | Default |
//! |----------|------|-------------|---------|
//! | `TINY_COUNTER_API_BASE` | build time | Base URL of the API service | `http://localhost:8080` |
//! | `PLATFORM` | run time | `firebase` or `memory` | `firebase` |
//! | `FIREBASE_API_KEY` | run time | Web API key | Required for `firebase` |
//! | `FIREBASE_PROJECT_ID` | run time | Firebase project | Required for `firebase` |
//! | `FIRESTORE_EMULATOR_HOST` | run time | Firestore emulator `host:port` | Optional |
//! | `FIREBASE_AUTH_EMULATOR_HOST` | run time | Auth emulator `host:port` | Optional |
//! | `USERS_COLLECTION` | run time | Collection holding counter records | `users` |

use std::env;

use thiserror::Error;
use url::Url;

/// API base URL baked in at build time.
pub const API_BASE: Option<&str> = option_env!("TINY_COUNTER_API_BASE");

pub const DEFAULT_API_BASE: &str = "http://localhost:8080";
pub const DEFAULT_USERS_COLLECTION: &str = "users";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API base {0:?} is not an http(s) URL")]
    InvalidApiBase(String),

    #[error("{0} must be set for the firebase platform")]
    Missing(&'static str),

    #[error("unknown platform {0:?} (expected \"firebase\" or \"memory\")")]
    UnknownPlatform(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientPlatform {
    Firebase {
        api_key: String,
        project_id: String,
        firestore_emulator_host: Option<String>,
        auth_emulator_host: Option<String>,
    },
    /// In-process identity service and store.
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base: Url,
    pub platform: ClientPlatform,
    pub collection: String,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(API_BASE, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        api_base: Option<&str>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let raw = api_base.unwrap_or(DEFAULT_API_BASE);
        let api_base = Url::parse(raw)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| ConfigError::InvalidApiBase(raw.to_string()))?;

        let platform = match var("PLATFORM").as_deref() {
            None | Some("firebase") => ClientPlatform::Firebase {
                api_key: var("FIREBASE_API_KEY").ok_or(ConfigError::Missing("FIREBASE_API_KEY"))?,
                project_id: var("FIREBASE_PROJECT_ID")
                    .ok_or(ConfigError::Missing("FIREBASE_PROJECT_ID"))?,
                firestore_emulator_host: var("FIRESTORE_EMULATOR_HOST"),
                auth_emulator_host: var("FIREBASE_AUTH_EMULATOR_HOST"),
            },
            Some("memory") => ClientPlatform::Memory,
            Some(other) => return Err(ConfigError::UnknownPlatform(other.to_string())),
        };

        Ok(Self {
            api_base,
            platform,
            collection: var("USERS_COLLECTION").unwrap_or_else(|| DEFAULT_USERS_COLLECTION.to_string()),
        })
    }
}
