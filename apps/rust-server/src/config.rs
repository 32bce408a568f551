// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the typed [`ServerConfig`]
//! loaded once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `PLATFORM` | `firebase` or `memory` | `firebase` |
//! | `FIREBASE_PROJECT_ID` | Firebase project (falls back to `GOOGLE_CLOUD_PROJECT`) | Required for `firebase` |
//! | `FIREBASE_API_KEY` | Web API key (Auth emulator only) | Optional |
//! | `FIRESTORE_EMULATOR_HOST` | Firestore emulator `host:port` | Optional |
//! | `FIREBASE_AUTH_EMULATOR_HOST` | Auth emulator `host:port`; user lookup goes there and unsigned emulator tokens are accepted | Optional |
//! | `USERS_COLLECTION` | Collection holding counter records | `users` |
//! | `COUNTER_FIELD` | Field incremented by `POST /api/increment` | `clicks` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const PLATFORM_ENV: &str = "PLATFORM";
pub const FIREBASE_PROJECT_ID_ENV: &str = "FIREBASE_PROJECT_ID";
pub const GOOGLE_CLOUD_PROJECT_ENV: &str = "GOOGLE_CLOUD_PROJECT";
pub const FIREBASE_API_KEY_ENV: &str = "FIREBASE_API_KEY";
pub const FIRESTORE_EMULATOR_HOST_ENV: &str = "FIRESTORE_EMULATOR_HOST";
pub const FIREBASE_AUTH_EMULATOR_HOST_ENV: &str = "FIREBASE_AUTH_EMULATOR_HOST";
pub const USERS_COLLECTION_ENV: &str = "USERS_COLLECTION";
pub const COUNTER_FIELD_ENV: &str = "COUNTER_FIELD";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_USERS_COLLECTION: &str = "users";

/// Counter field written by the increment endpoint.
///
/// The web client reads `clickCount`; the deployed backend has always
/// written `clicks`. Both names are kept as-is and the server field is
/// configurable.
pub const DEFAULT_COUNTER_FIELD: &str = "clicks";

pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a port number, got {value:?}")]
    InvalidPort { name: &'static str, value: String },

    #[error("{value:?} is not a valid bind address")]
    InvalidAddress { value: String },

    #[error("unknown platform {0:?} (expected \"firebase\" or \"memory\")")]
    UnknownPlatform(String),

    #[error("{FIREBASE_PROJECT_ID_ENV} or {GOOGLE_CLOUD_PROJECT_ENV} must be set for the firebase platform")]
    MissingProjectId,

    #[error("{USERS_COLLECTION_ENV} must be a single collection name, got {0:?}")]
    InvalidCollection(String),
}

/// Which implementation of the external platform to run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformConfig {
    /// Firebase Auth + Firestore.
    Firebase(FirebaseConfig),
    /// In-process identity service and store (local development).
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub project_id: String,
    pub api_key: Option<String>,
    pub firestore_emulator_host: Option<String>,
    pub auth_emulator_host: Option<String>,
}

/// Where counter records live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    pub collection: String,
    pub field: String,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_USERS_COLLECTION.to_string(),
            field: DEFAULT_COUNTER_FIELD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub platform: PlatformConfig,
    pub counter: CounterConfig,
    pub log_format: LogFormat,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = var(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match var(PORT_ENV) {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                name: PORT_ENV,
                value,
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|_| ConfigError::InvalidAddress {
                value: format!("{host}:{port}"),
            })?;

        let platform = match var(PLATFORM_ENV).as_deref().map(str::trim) {
            None | Some("firebase") => PlatformConfig::Firebase(FirebaseConfig {
                project_id: var(FIREBASE_PROJECT_ID_ENV)
                    .or_else(|| var(GOOGLE_CLOUD_PROJECT_ENV))
                    .ok_or(ConfigError::MissingProjectId)?,
                api_key: var(FIREBASE_API_KEY_ENV),
                firestore_emulator_host: var(FIRESTORE_EMULATOR_HOST_ENV),
                auth_emulator_host: var(FIREBASE_AUTH_EMULATOR_HOST_ENV),
            }),
            Some("memory") => PlatformConfig::Memory,
            Some(other) => return Err(ConfigError::UnknownPlatform(other.to_string())),
        };

        let counter = CounterConfig {
            collection: var(USERS_COLLECTION_ENV)
                .unwrap_or_else(|| DEFAULT_USERS_COLLECTION.to_string()),
            field: var(COUNTER_FIELD_ENV).unwrap_or_else(|| DEFAULT_COUNTER_FIELD.to_string()),
        };
        if counter.collection.contains('/') {
            return Err(ConfigError::InvalidCollection(counter.collection));
        }

        let log_format = match var(LOG_FORMAT_ENV).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind_addr,
            platform,
            counter,
            log_format,
        })
    }
}
