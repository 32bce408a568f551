// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{ErrorResponse, IdentityResponse, IncrementResponse},
    state::AppState,
};

pub mod counter;
pub mod health;
pub mod identity;

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/echo", get(identity::echo))
        .route("/me", get(identity::me))
        .route("/increment", post(counter::increment));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::very_permissive())
        .layer(TraceLayer::new_for_http())
}

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        identity::echo,
        identity::me,
        counter::increment,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(schemas(IdentityResponse, IncrementResponse, ErrorResponse)),
    modifiers(&BearerAuth),
    tags(
        (name = "Identity", description = "Verified caller identity"),
        (name = "Counter", description = "Per-user click counter"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tiny_counter_platform::{DocumentPath, IdentityService, MemoryIdentityService};
    use tower::ServiceExt;

    const PROTECTED: [(Method, &str); 3] = [
        (Method::GET, "/api/echo"),
        (Method::GET, "/api/me"),
        (Method::POST, "/api/increment"),
    ];

    async fn send(app: &Router, method: Method, uri: &str, auth: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(value) = auth {
            request = request.header("Authorization", value);
        }
        let response = app
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn app_with_user() -> (Router, AppState, String, String) {
        let identity = MemoryIdentityService::new();
        let state = AppState::with_memory_identity(identity.clone());
        let signed_in = identity.sign_up("ada@example.com", "hunter22").await.unwrap();
        (
            router(state.clone()),
            state,
            signed_in.identity.uid,
            format!("Bearer {}", signed_in.tokens.id_token),
        )
    }

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let app = router(AppState::default());
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn missing_header_is_rejected_everywhere() {
        let (app, ..) = app_with_user().await;
        for (method, uri) in PROTECTED {
            let (status, body) = send(&app, method, uri, None).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body, json!({ "error": "Missing token" }), "{uri}");
        }
    }

    #[tokio::test]
    async fn malformed_header_counts_as_missing() {
        let (app, ..) = app_with_user().await;
        for header in ["Basic abc", "Bearer ", "Token abc"] {
            let (status, body) = send(&app, Method::GET, "/api/echo", Some(header)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({ "error": "Missing token" }));
        }
    }

    #[tokio::test]
    async fn invalid_token_is_rejected_everywhere() {
        let (app, state, uid, _) = app_with_user().await;
        for (method, uri) in PROTECTED {
            let (status, body) = send(&app, method, uri, Some("Bearer forged")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body, json!({ "error": "Invalid token" }), "{uri}");
        }

        // Rejected before any store access.
        let snap = state.store.get(&DocumentPath::new("users", uid)).await.unwrap();
        assert!(!snap.exists());
    }

    #[tokio::test]
    async fn echo_and_me_agree_on_uid() {
        let (app, _, uid, auth) = app_with_user().await;

        let (status, echo) = send(&app, Method::GET, "/api/echo", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        let (status, me) = send(&app, Method::GET, "/api/me", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(echo["uid"], json!(uid));
        assert_eq!(me["uid"], echo["uid"]);
        assert_eq!(me["email"], json!("ada@example.com"));
    }

    #[tokio::test]
    async fn sequential_increments_count_exactly() {
        let (app, state, uid, auth) = app_with_user().await;
        let path = DocumentPath::new("users", &uid);

        let (status, body) = send(&app, Method::POST, "/api/increment", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        let snap = state.store.get(&path).await.unwrap();
        assert_eq!(snap.get("uid"), Some(&json!(uid)));
        assert_eq!(snap.get_i64("clicks"), Some(1));

        for _ in 0..4 {
            send(&app, Method::POST, "/api/increment", Some(&auth)).await;
        }
        assert_eq!(state.store.get(&path).await.unwrap().get_i64("clicks"), Some(5));
    }

    #[tokio::test]
    async fn concurrent_increments_are_all_applied() {
        let (app, state, uid, auth) = app_with_user().await;

        let mut tasks = Vec::new();
        for _ in 0..25 {
            let app = app.clone();
            let auth = auth.clone();
            tasks.push(tokio::spawn(async move {
                send(&app, Method::POST, "/api/increment", Some(&auth)).await.0
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::OK);
        }

        let snap = state.store.get(&DocumentPath::new("users", uid)).await.unwrap();
        assert_eq!(snap.get_i64("clicks"), Some(25));
    }

    #[tokio::test]
    async fn counter_field_follows_configuration() {
        let identity = MemoryIdentityService::new();
        let state = AppState::with_memory_identity(identity.clone()).with_counter(crate::config::CounterConfig {
            collection: "users".into(),
            field: "clickCount".into(),
        });
        let signed_in = identity.sign_up("ada@example.com", "hunter22").await.unwrap();
        let app = router(state.clone());

        let auth = format!("Bearer {}", signed_in.tokens.id_token);
        send(&app, Method::POST, "/api/increment", Some(&auth)).await;

        let snap = state
            .store
            .get(&DocumentPath::new("users", signed_in.identity.uid))
            .await
            .unwrap();
        assert_eq!(snap.get_i64("clickCount"), Some(1));
        assert_eq!(snap.get("clicks"), None);
    }

    #[tokio::test]
    async fn emulator_tokens_reach_every_route() {
        use crate::auth::test_support::{claims, emulator_token, PROJECT};
        use crate::auth::FirebaseTokenVerifier;
        use std::sync::Arc;
        use tiny_counter_platform::MemoryDocumentStore;

        let state = AppState::new(
            Arc::new(FirebaseTokenVerifier::emulator(PROJECT)),
            Arc::new(MemoryIdentityService::new()),
            Arc::new(MemoryDocumentStore::new()),
        );
        let app = router(state.clone());
        let auth = format!("Bearer {}", emulator_token(&claims("emu-user")));

        let (status, body) = send(&app, Method::GET, "/api/echo", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["uid"], json!("emu-user"));

        let (status, body) = send(&app, Method::POST, "/api/increment", Some(&auth)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "ok": true }));
        let snap = state.store.get(&DocumentPath::new("users", "emu-user")).await.unwrap();
        assert_eq!(snap.get_i64("clicks"), Some(1));

        // The memory directory has no such account.
        let (status, _) = send(&app, Method::GET, "/api/me", Some(&auth)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let mut foreign = claims("emu-user");
        foreign["aud"] = json!("other-app");
        let forged = format!("Bearer {}", emulator_token(&foreign));
        let (status, body) = send(&app, Method::GET, "/api/echo", Some(&forged)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "Invalid token" }));
    }

    #[tokio::test]
    async fn health_and_openapi_are_public() {
        let app = router(AppState::default());

        let (status, body) = send(&app, Method::GET, "/health/live", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));

        let (status, doc) = send(&app, Method::GET, "/api-doc/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/api/increment"].is_object());
    }
}
