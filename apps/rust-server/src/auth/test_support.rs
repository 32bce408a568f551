// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signed test tokens and a loopback JWKS endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{extract::State, routing::get, Json, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const PROJECT: &str = "tiny-app";

const PRIVATE_KEY_PEM: &str = include_str!("testdata/rsa_private.pem");

/// Modulus of the test key (base64url, no padding).
const MODULUS: &str = "zS_U0PwXuapdoO4J4-lE1N7xJZxfSx7OefUyWVf764CKMCYso8ldalLQbdtkd2aZMBEIvHgDNwPWFF4lxBu_PMicnbPMy2vM8rLObyW-JcIZb1D6-q3qQORg0bZ_NymuaiRrz97j37d8xyDpQLqHtKuM3Onh5dx6f9EcR0XXIh0HSuGb1q1Lm-eWJ_IcmNhbKYcFQPqVsrDis2-ASJ4GLHgbOnI42pfxFiDiHLrgF17IdBI2_PKWcOOqQ9kAXGZMFlWUxoFVKE7MtPuMsleZBuWBd_I34ktSIBhEt6AIArmF7U9wZODDZ5hnjp_ir0iuy5CdLJg1ZXHUWBOH0For5Q";
const EXPONENT: &str = "AQAB";

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims of a fresh token for `sub` in the test project.
pub fn claims(sub: &str) -> Value {
    let now = now();
    json!({
        "sub": sub,
        "iat": now - 10,
        "exp": now + 3600,
        "auth_time": now - 60,
        "iss": format!("https://securetoken.google.com/{PROJECT}"),
        "aud": PROJECT,
        "email": "ada@example.com",
        "email_verified": false,
    })
}

/// RS256-sign `claims` with the test key under `kid`.
pub fn sign(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Token shaped like the Auth emulator's: `alg: none`, empty signature.
pub fn emulator_token(claims: &Value) -> String {
    format!(
        "{}.{}.",
        URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    )
}

/// JWKS endpoint publishing the test key under a mutable set of key ids.
#[derive(Clone, Default)]
pub struct JwksServer {
    kids: Arc<Mutex<Vec<String>>>,
    hits: Arc<AtomicUsize>,
}

impl JwksServer {
    pub fn publish(&self, kid: &str) {
        self.kids.lock().unwrap().push(kid.to_string());
    }

    /// Number of JWKS fetches served.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    /// Serve on an ephemeral loopback port; returns the JWKS URL.
    pub async fn start(&self) -> String {
        async fn keys(State(server): State<JwksServer>) -> ([(&'static str, &'static str); 1], Json<Value>) {
            server.hits.fetch_add(1, Ordering::SeqCst);
            let keys: Vec<Value> = server
                .kids
                .lock()
                .unwrap()
                .iter()
                .map(|kid| json!({ "kty": "RSA", "alg": "RS256", "use": "sig", "kid": kid, "n": MODULUS, "e": EXPONENT }))
                .collect();
            ([("cache-control", "public, max-age=3600")], Json(json!({ "keys": keys })))
        }

        let app = Router::new().route("/jwks.json", get(keys)).with_state(self.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/jwks.json")
    }
}
