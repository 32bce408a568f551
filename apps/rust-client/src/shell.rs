// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # UI Shell
//!
//! Presentation state for a single-screen client: an email/password form
//! while signed out, a counter dashboard while signed in. Rendering is left
//! to the front end; [`View`] is what it draws.
//!
//! One action runs at a time. While it does, every control is reported as
//! busy and its label switches to the in-progress wording.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::session::SessionManager;
use crate::sync::CounterSync;

/// What the front end should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    SignedOut {
        email: String,
        busy: bool,
    },
    SignedIn {
        email: Option<String>,
        count: i64,
        busy: bool,
        api_response: Option<String>,
    },
}

pub struct Shell {
    session: Arc<SessionManager>,
    sync: Arc<CounterSync>,
    api: ApiClient,
    email: String,
    password: String,
    busy: Arc<AtomicBool>,
    api_response: Option<String>,
}

/// Clears the busy flag when the action ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Shell {
    pub fn new(session: Arc<SessionManager>, sync: Arc<CounterSync>, api: ApiClient) -> Self {
        Self {
            session,
            sync,
            api,
            email: String::new(),
            password: String::new(),
            busy: Arc::new(AtomicBool::new(false)),
            api_response: None,
        }
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.email = email.into();
    }

    pub fn set_password(&mut self, password: impl Into<String>) {
        self.password = password.into();
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn begin(&self) -> BusyGuard {
        self.busy.store(true, Ordering::SeqCst);
        BusyGuard(self.busy.clone())
    }

    pub async fn submit_login(&mut self) -> Result<(), ClientError> {
        let _busy = self.begin();
        self.session.login(self.email.trim(), &self.password).await?;
        self.password.clear();
        Ok(())
    }

    pub async fn submit_register(&mut self) -> Result<(), ClientError> {
        let _busy = self.begin();
        self.session.register(self.email.trim(), &self.password).await?;
        self.password.clear();
        Ok(())
    }

    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let _busy = self.begin();
        self.api_response = None;
        self.session.logout().await
    }

    /// Add one click. Does nothing while signed out.
    pub async fn increment(&mut self) -> Result<(), ClientError> {
        let Some(identity) = self.session.current() else {
            return Ok(());
        };
        let _busy = self.begin();
        self.sync.increment(&identity.uid).await
    }

    /// Call `/api/me` and keep the pretty-printed reply for display.
    /// Does nothing while signed out.
    pub async fn call_api(&mut self) -> Result<(), ClientError> {
        if self.session.current().is_none() {
            return Ok(());
        }
        let _busy = self.begin();
        let reply = self.api.me().await?;
        self.api_response = Some(
            serde_json::to_string_pretty(&reply)
                .map_err(|e| ClientError::Transport(e.to_string()))?,
        );
        Ok(())
    }

    pub fn view(&self) -> View {
        let busy = self.is_busy();
        match self.session.current() {
            None => View::SignedOut {
                email: self.email.clone(),
                busy,
            },
            Some(identity) => View::SignedIn {
                email: identity.email,
                count: self.sync.count(),
                busy,
                api_response: self.api_response.clone(),
            },
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::SignedOut { email, busy } => {
                writeln!(f, "Tiny Counter")?;
                writeln!(f, "  Email: {email}")?;
                let (sign_in, create) = if *busy {
                    ("Signing in…", "Creating…")
                } else {
                    ("Sign in", "Create account")
                };
                write!(f, "  [{sign_in}] [{create}]")
            }
            View::SignedIn {
                email,
                count,
                busy,
                api_response,
            } => {
                writeln!(f, "Signed in as {}", email.as_deref().unwrap_or("(no email)"))?;
                writeln!(f, "  Your clicks: {count}")?;
                let (plus, call) = if *busy {
                    ("Saving…", "Calling…")
                } else {
                    ("+1", "Call /api/me")
                };
                write!(f, "  [{plus}] [{call}] [Sign out]")?;
                if let Some(response) = api_response {
                    write!(f, "\n{response}")?;
                }
                Ok(())
            }
        }
    }
}
