// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use thiserror::Error;
use tiny_counter_platform::PlatformError;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Identity service or document store failure.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The API could not be reached or answered garbage.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("not signed in")]
    NotSignedIn,
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        ClientError::Transport(e.to_string())
    }
}

impl From<ClientError> for PlatformError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Platform(inner) => inner,
            ClientError::NotSignedIn => PlatformError::Authentication("not signed in".to_string()),
            ClientError::Api { status, message } => PlatformError::Upstream { status, message },
            ClientError::Transport(msg) => PlatformError::Transport(msg),
        }
    }
}
