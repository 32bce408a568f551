// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;
use std::time::Duration;

use tiny_counter_platform::{
    AccessTokenSource, DocumentStore, FirestoreDocumentStore, IdentityDirectory, IdentityToolkit,
    MemoryDocumentStore, MemoryIdentityService, MetadataServerTokenSource, StaticTokenSource,
    TokenVerifier,
};

use crate::auth::{FirebaseTokenVerifier, JwksManager};
use crate::config::{CounterConfig, FirebaseConfig, PlatformConfig, ServerConfig};

/// Outbound HTTP timeout for platform calls.
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Token accepted by the Firebase emulators in place of real credentials.
const EMULATOR_TOKEN: &str = "owner";

/// Handles to the external platform, shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<dyn TokenVerifier>,
    pub directory: Arc<dyn IdentityDirectory>,
    pub store: Arc<dyn DocumentStore>,
    pub counter: CounterConfig,
    /// Present when tokens are verified against a JWKS (readiness check).
    pub jwks: Option<Arc<JwksManager>>,
}

impl AppState {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        directory: Arc<dyn IdentityDirectory>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            verifier,
            directory,
            store,
            counter: CounterConfig::default(),
            jwks: None,
        }
    }

    pub fn with_counter(mut self, counter: CounterConfig) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_jwks(mut self, jwks: Arc<JwksManager>) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Fully in-process state with a fresh identity service and store.
    pub fn in_memory() -> Self {
        Self::with_memory_identity(MemoryIdentityService::new())
    }

    /// In-process state sharing `identity` with the caller (tests, demos).
    pub fn with_memory_identity(identity: MemoryIdentityService) -> Self {
        let identity = Arc::new(identity);
        Self::new(
            identity.clone(),
            identity,
            Arc::new(MemoryDocumentStore::new()),
        )
    }

    /// Build the state described by the server configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let state = match &config.platform {
            PlatformConfig::Memory => Self::in_memory(),
            PlatformConfig::Firebase(firebase) => Self::firebase(firebase)?,
        };
        Ok(state.with_counter(config.counter.clone()))
    }

    fn firebase(config: &FirebaseConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

        // The Auth emulator mints unsigned tokens; there is no JWKS to check.
        let jwks = match config.auth_emulator_host {
            Some(_) => None,
            None => Some(Arc::new(JwksManager::firebase(client.clone()))),
        };
        let verifier = match &jwks {
            Some(jwks) => FirebaseTokenVerifier::new(&config.project_id, jwks.clone()),
            None => FirebaseTokenVerifier::emulator(&config.project_id),
        };

        let service_account: Arc<dyn AccessTokenSource> =
            Arc::new(MetadataServerTokenSource::new(client.clone()));
        let emulator: Arc<dyn AccessTokenSource> = Arc::new(StaticTokenSource::new(EMULATOR_TOKEN));

        let mut toolkit = IdentityToolkit::new(
            client.clone(),
            config.api_key.clone().unwrap_or_default(),
            &config.project_id,
        );
        toolkit = match &config.auth_emulator_host {
            Some(host) => toolkit.with_emulator(host).with_access_tokens(emulator.clone()),
            None => toolkit.with_access_tokens(service_account.clone()),
        };

        let store = match &config.firestore_emulator_host {
            Some(host) => FirestoreDocumentStore::new(client, &config.project_id, emulator).with_emulator(host),
            None => FirestoreDocumentStore::new(client, &config.project_id, service_account),
        };

        let state = Self::new(Arc::new(verifier), Arc::new(toolkit), Arc::new(store));
        Ok(match jwks {
            Some(jwks) => state.with_jwks(jwks),
            None => state,
        })
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}
