// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Terminal front end: reads commands from stdin and prints the current view.

use std::process::ExitCode;
use std::sync::Arc;

use tiny_counter_client::api::ApiClient;
use tiny_counter_client::config::{ClientConfig, ClientPlatform};
use tiny_counter_client::{ClientError, CounterSync, SessionManager, Shell};
use tiny_counter_platform::{
    AccessTokenSource, DocumentStore, FirestoreDocumentStore, IdentityService, IdentityToolkit,
    MemoryDocumentStore, MemoryIdentityService,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "commands: email <addr> | password <pw> | login | register | logout | inc | me | show | quit";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_platform(
    config: &ClientConfig,
    http: &reqwest::Client,
) -> (Arc<SessionManager>, Arc<dyn DocumentStore>) {
    match &config.platform {
        ClientPlatform::Memory => {
            let identity: Arc<dyn IdentityService> = Arc::new(MemoryIdentityService::new());
            let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
            (Arc::new(SessionManager::new(identity)), store)
        }
        ClientPlatform::Firebase {
            api_key,
            project_id,
            firestore_emulator_host,
            auth_emulator_host,
        } => {
            let mut toolkit = IdentityToolkit::new(http.clone(), api_key.clone(), project_id.clone());
            if let Some(host) = auth_emulator_host {
                toolkit = toolkit.with_emulator(host);
            }
            let session = Arc::new(SessionManager::new(Arc::new(toolkit)));

            // Firestore rules see the signed-in user through their ID token.
            let credentials: Arc<dyn AccessTokenSource> = session.clone();
            let mut store = FirestoreDocumentStore::new(http.clone(), project_id.clone(), credentials);
            if let Some(host) = firestore_emulator_host {
                store = store.with_emulator(host);
            }
            (session, Arc::new(store))
        }
    }
}

async fn run(shell: &mut Shell, command: &str, arg: &str) -> Result<(), ClientError> {
    match command {
        "email" => shell.set_email(arg),
        "password" => shell.set_password(arg),
        "login" => shell.submit_login().await?,
        "register" => shell.submit_register().await?,
        "logout" => shell.logout().await?,
        "inc" | "+1" => shell.increment().await?,
        "me" => shell.call_api().await?,
        "show" | "" => {}
        _ => println!("{HELP}"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let http = match reqwest::Client::builder().build() {
        Ok(http) => http,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client");
            return ExitCode::FAILURE;
        }
    };

    let (session, store) = build_platform(&config, &http);
    let sync = Arc::new(CounterSync::new(store, config.collection.clone()));
    let task = sync.clone().attach(session.subscribe());
    let api = ApiClient::new(http, config.api_base.clone(), session.clone());
    let mut shell = Shell::new(session, sync, api);

    tracing::info!(api_base = %config.api_base, "Client started");
    println!("{HELP}");
    println!("{}", shell.view());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };

        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        if command == "quit" || command == "exit" {
            break;
        }

        if let Err(e) = run(&mut shell, command, arg.trim()).await {
            tracing::warn!(command, error = %e, "Action failed");
            println!("error: {e}");
        }
        println!("{}", shell.view());
    }

    task.shutdown().await;
    ExitCode::SUCCESS
}
