// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Firestore REST adapter.
//!
//! ## Mapping
//!
//! - `get` → `GET {name}` (404 → missing snapshot)
//! - `set_merge` → `documents:commit` with one `update` write carrying an
//!   `updateMask` for plain fields and `updateTransforms` for increments and
//!   server timestamps, so the whole call commits atomically
//! - `subscribe` → polling task that emits whenever `updateTime` or
//!   existence changes; the REST surface has no streaming listen

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{DocumentPath, DocumentSnapshot, DocumentStore, FieldWrite, FieldWrites, Fields, Subscription};
use crate::credentials::AccessTokenSource;
use crate::error::{PlatformError, PlatformResult};

pub const FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

const DEFAULT_DATABASE: &str = "(default)";

/// Default interval between subscription polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestDocument {
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    update_time: Option<String>,
}

/// Firestore document store over the REST API.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: reqwest::Client,
    base_url: String,
    project_id: String,
    database: String,
    credentials: Arc<dyn AccessTokenSource>,
    poll_interval: Duration,
}

impl FirestoreDocumentStore {
    pub fn new(
        client: reqwest::Client,
        project_id: impl Into<String>,
        credentials: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            client,
            base_url: FIRESTORE_URL.to_string(),
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_string(),
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Talk to the Firestore emulator at `host` (e.g. `localhost:8081`).
    pub fn with_emulator(mut self, host: &str) -> Self {
        self.base_url = format!("http://{host}/v1");
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn database_name(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database)
    }

    fn document_name(&self, path: &DocumentPath) -> String {
        format!("{}/documents/{}/{}", self.database_name(), path.collection, path.id)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> PlatformResult<reqwest::RequestBuilder> {
        Ok(match self.credentials.access_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    /// Read the document together with its `updateTime`.
    async fn fetch(&self, path: &DocumentPath) -> PlatformResult<(DocumentSnapshot, Option<String>)> {
        let url = format!("{}/{}", self.base_url, self.document_name(path));
        let response = self.authorize(self.client.get(url)).await?.send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok((DocumentSnapshot::missing(path.clone()), None)),
            status if status.is_success() => {
                let document: RestDocument = response.json().await?;
                let snapshot = DocumentSnapshot {
                    path: path.clone(),
                    data: Some(decode_fields(document.fields)?),
                };
                Ok((snapshot, document.update_time))
            }
            status => Err(status_error(status, response.text().await.unwrap_or_default())),
        }
    }

    fn commit_body(&self, path: &DocumentPath, writes: FieldWrites) -> Value {
        let mut fields = Map::new();
        let mut mask = Vec::new();
        let mut transforms = Vec::new();

        for (name, write) in writes {
            let field_path = quote_field_path(&name);
            match write {
                FieldWrite::Set(value) => {
                    fields.insert(name, encode_value(&value));
                    mask.push(Value::String(field_path));
                }
                FieldWrite::Increment(delta) => transforms.push(json!({
                    "fieldPath": field_path,
                    "increment": { "integerValue": delta.to_string() },
                })),
                FieldWrite::ServerTimestamp => transforms.push(json!({
                    "fieldPath": field_path,
                    "setToServerValue": "REQUEST_TIME",
                })),
            }
        }

        json!({
            "writes": [{
                "update": {
                    "name": self.document_name(path),
                    "fields": fields,
                },
                "updateMask": { "fieldPaths": mask },
                "updateTransforms": transforms,
            }]
        })
    }
}

fn status_error(status: StatusCode, body: String) -> PlatformError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PlatformError::Authentication(body),
        _ => PlatformError::Upstream {
            status: status.as_u16(),
            message: body,
        },
    }
}

/// Backtick-quote field names that are not plain identifiers.
fn quote_field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Convert a JSON value into a Firestore typed value.
fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => json!({ "integerValue": i.to_string() }),
            (None, Some(u)) => json!({ "integerValue": u.to_string() }),
            _ => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), encode_value(v)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

fn decode_fields(fields: Map<String, Value>) -> PlatformResult<Fields> {
    fields
        .into_iter()
        .map(|(name, value)| decode_value(value).map(|v| (name, v)))
        .collect()
}

/// Convert a Firestore typed value into plain JSON.
///
/// Timestamps, references and bytes become strings.
fn decode_value(value: Value) -> PlatformResult<Value> {
    let Value::Object(mut typed) = value else {
        return Err(PlatformError::Decode("field value is not an object".to_string()));
    };
    let Some((kind, inner)) = typed.iter_mut().next().map(|(k, v)| (k.clone(), v.take())) else {
        return Err(PlatformError::Decode("empty field value".to_string()));
    };

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" | "doubleValue" | "timestampValue" | "stringValue" | "bytesValue"
        | "referenceValue" | "geoPointValue" => Ok(inner),
        "integerValue" => match &inner {
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| PlatformError::Decode(format!("bad integerValue {s}"))),
            Value::Number(_) => Ok(inner),
            _ => Err(PlatformError::Decode("bad integerValue".to_string())),
        },
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            values
                .into_iter()
                .map(decode_value)
                .collect::<PlatformResult<Vec<_>>>()
                .map(Value::Array)
        }
        "mapValue" => {
            let fields = match inner.get("fields") {
                Some(Value::Object(map)) => map.clone(),
                _ => Map::new(),
            };
            decode_fields(fields).map(Value::Object)
        }
        other => Err(PlatformError::Decode(format!("unsupported value type {other}"))),
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn get(&self, path: &DocumentPath) -> PlatformResult<DocumentSnapshot> {
        self.fetch(path).await.map(|(snapshot, _)| snapshot)
    }

    async fn set_merge(&self, path: &DocumentPath, writes: FieldWrites) -> PlatformResult<()> {
        let url = format!("{}/{}/documents:commit", self.base_url, self.database_name());
        let body = self.commit_body(path, writes);
        let response = self
            .authorize(self.client.post(url))
            .await?
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, response.text().await.unwrap_or_default()));
        }
        Ok(())
    }

    async fn subscribe(&self, path: &DocumentPath) -> PlatformResult<Subscription> {
        // Fail fast on the first read so callers see auth/transport errors.
        let (initial, mut last_update) = self.fetch(path).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(initial);

        let cancel = CancellationToken::new();
        let stopped = cancel.clone();
        let store = self.clone();
        let path = path.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(store.poll_interval) => {},
                    _ = stopped.cancelled() => return,
                }

                match store.fetch(&path).await {
                    Ok((snapshot, update_time)) if update_time != last_update => {
                        last_update = update_time;
                        if tx.send(snapshot).is_err() {
                            return;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "Document poll failed");
                    }
                }
            }
        });

        Ok(Subscription::new(rx, Some(cancel.drop_guard())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::StaticTokenSource;

    fn store() -> FirestoreDocumentStore {
        FirestoreDocumentStore::new(
            reqwest::Client::new(),
            "demo-project",
            Arc::new(StaticTokenSource::new("owner")),
        )
    }

    #[test]
    fn commit_body_splits_sets_and_transforms() {
        let mut writes = FieldWrites::new();
        writes.insert("uid".into(), FieldWrite::Set(json!("abc")));
        writes.insert("clicks".into(), FieldWrite::Increment(1));
        writes.insert("lastClickedAt".into(), FieldWrite::ServerTimestamp);

        let body = store().commit_body(&DocumentPath::new("users", "abc"), writes);
        let write = &body["writes"][0];

        assert_eq!(
            write["update"]["name"],
            "projects/demo-project/databases/(default)/documents/users/abc"
        );
        assert_eq!(write["update"]["fields"]["uid"], json!({ "stringValue": "abc" }));
        assert_eq!(write["updateMask"]["fieldPaths"], json!(["uid"]));
        assert_eq!(
            write["updateTransforms"],
            json!([
                { "fieldPath": "clicks", "increment": { "integerValue": "1" } },
                { "fieldPath": "lastClickedAt", "setToServerValue": "REQUEST_TIME" },
            ])
        );
    }

    #[test]
    fn decodes_typed_document_fields() {
        let raw = json!({
            "uid": { "stringValue": "abc" },
            "clickCount": { "integerValue": "7" },
            "createdAt": { "timestampValue": "2026-01-02T03:04:05.000001Z" },
            "tags": { "arrayValue": {} },
            "meta": { "mapValue": { "fields": { "ok": { "booleanValue": true } } } },
        });
        let Value::Object(map) = raw else { unreachable!() };

        let fields = decode_fields(map).unwrap();
        assert_eq!(fields["uid"], json!("abc"));
        assert_eq!(fields["clickCount"], json!(7));
        assert_eq!(fields["createdAt"], json!("2026-01-02T03:04:05.000001Z"));
        assert_eq!(fields["tags"], json!([]));
        assert_eq!(fields["meta"], json!({ "ok": true }));
    }

    #[test]
    fn encodes_numbers_by_kind() {
        assert_eq!(encode_value(&json!(3)), json!({ "integerValue": "3" }));
        assert_eq!(encode_value(&json!(1.5)), json!({ "doubleValue": 1.5 }));
        assert_eq!(encode_value(&Value::Null), json!({ "nullValue": null }));
    }

    #[test]
    fn unusual_field_names_are_quoted() {
        assert_eq!(quote_field_path("clickCount"), "clickCount");
        assert_eq!(quote_field_path("click-count"), "`click-count`");
        assert_eq!(quote_field_path("1st"), "`1st`");
    }

    #[test]
    fn emulator_base_url() {
        let store = store().with_emulator("localhost:8081");
        assert_eq!(store.base_url, "http://localhost:8081/v1");
    }

    #[tokio::test]
    async fn unreachable_store_is_a_transport_error() {
        let store = store().with_emulator("127.0.0.1:1");
        let err = store.get(&DocumentPath::new("users", "abc")).await.unwrap_err();
        assert!(matches!(err, PlatformError::Transport(_)));
    }

    mod against_mock {
        use super::*;
        use std::sync::Mutex;

        use axum::{
            body::Bytes,
            extract::State,
            http::{header::AUTHORIZATION, HeaderMap, Method, Uri},
            response::{IntoResponse, Response},
            Json, Router,
        };

        const DOCUMENT: &str = "/v1/projects/demo-project/databases/(default)/documents/users/abc";
        const COMMIT: &str = "/v1/projects/demo-project/databases/(default)/documents:commit";

        #[derive(Default)]
        struct Mock {
            /// Typed fields and `updateTime` of `users/abc`.
            document: Option<(Value, String)>,
            commits: Vec<Value>,
            authorization: Vec<Option<String>>,
            reject: Option<StatusCode>,
            reads: usize,
        }

        type Shared = Arc<Mutex<Mock>>;

        async fn handle(
            State(mock): State<Shared>,
            method: Method,
            uri: Uri,
            headers: HeaderMap,
            body: Bytes,
        ) -> Response {
            let mut mock = mock.lock().unwrap();
            mock.authorization.push(
                headers
                    .get(AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            );
            if let Some(status) = mock.reject {
                return (status, "permission denied").into_response();
            }

            if method == Method::POST && uri.path() == COMMIT {
                mock.commits.push(serde_json::from_slice(&body).unwrap_or(Value::Null));
                return Json(json!({ "commitTime": "2026-01-01T00:00:00Z" })).into_response();
            }
            if method != Method::GET || uri.path() != DOCUMENT {
                return StatusCode::BAD_REQUEST.into_response();
            }

            mock.reads += 1;
            match &mock.document {
                Some((fields, update_time)) => Json(json!({
                    "name": DOCUMENT.trim_start_matches("/v1/"),
                    "fields": fields,
                    "updateTime": update_time,
                }))
                .into_response(),
                None => (
                    StatusCode::NOT_FOUND,
                    Json(json!({ "error": { "code": 404, "status": "NOT_FOUND" } })),
                )
                    .into_response(),
            }
        }

        async fn mock_store() -> (FirestoreDocumentStore, Shared) {
            let mock = Shared::default();
            let app = Router::new().fallback(handle).with_state(mock.clone());
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let store = store()
                .with_emulator(&addr.to_string())
                .with_poll_interval(Duration::from_millis(10));
            (store, mock)
        }

        fn put(mock: &Shared, count: i64, update_time: &str) {
            mock.lock().unwrap().document = Some((
                json!({ "clickCount": { "integerValue": count.to_string() } }),
                update_time.to_string(),
            ));
        }

        fn path() -> DocumentPath {
            DocumentPath::new("users", "abc")
        }

        #[tokio::test]
        async fn missing_document_reads_as_absent() {
            let (store, mock) = mock_store().await;
            let snapshot = store.get(&path()).await.unwrap();
            assert!(!snapshot.exists());
            assert_eq!(
                mock.lock().unwrap().authorization,
                vec![Some("Bearer owner".to_string())]
            );
        }

        #[tokio::test]
        async fn existing_document_is_decoded() {
            let (store, mock) = mock_store().await;
            put(&mock, 3, "t1");
            let snapshot = store.get(&path()).await.unwrap();
            assert_eq!(snapshot.get_i64("clickCount"), Some(3));
        }

        #[tokio::test]
        async fn set_merge_commits_one_write() {
            let (store, mock) = mock_store().await;
            let mut writes = FieldWrites::new();
            writes.insert("uid".into(), FieldWrite::Set(json!("abc")));
            writes.insert("clicks".into(), FieldWrite::Increment(1));
            store.set_merge(&path(), writes).await.unwrap();

            let mock = mock.lock().unwrap();
            assert_eq!(mock.commits.len(), 1);
            let write = &mock.commits[0]["writes"][0];
            assert_eq!(write["updateMask"]["fieldPaths"], json!(["uid"]));
            assert_eq!(write["updateTransforms"][0]["fieldPath"], "clicks");
            assert_eq!(mock.authorization, vec![Some("Bearer owner".to_string())]);
        }

        #[tokio::test]
        async fn denied_writes_are_authentication_failures() {
            let (store, mock) = mock_store().await;
            for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
                mock.lock().unwrap().reject = Some(status);
                let err = store.set_merge(&path(), FieldWrites::new()).await.unwrap_err();
                assert!(err.is_authentication(), "{status}");
            }

            mock.lock().unwrap().reject = Some(StatusCode::INTERNAL_SERVER_ERROR);
            match store.set_merge(&path(), FieldWrites::new()).await.unwrap_err() {
                PlatformError::Upstream { status, .. } => assert_eq!(status, 500),
                other => panic!("unexpected {other:?}"),
            }
        }

        #[tokio::test]
        async fn subscription_emits_only_on_change() {
            let (store, mock) = mock_store().await;
            put(&mock, 1, "t1");

            let mut subscription = store.subscribe(&path()).await.unwrap();
            let first = subscription.next().await.unwrap();
            assert_eq!(first.get_i64("clickCount"), Some(1));

            // Several polls of an unchanged document produce nothing.
            let quiet = tokio::time::timeout(Duration::from_millis(80), subscription.next()).await;
            assert!(quiet.is_err());
            assert!(mock.lock().unwrap().reads > 2);

            put(&mock, 2, "t2");
            let changed = tokio::time::timeout(Duration::from_secs(2), subscription.next())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(changed.get_i64("clickCount"), Some(2));

            mock.lock().unwrap().document = None;
            let deleted = tokio::time::timeout(Duration::from_secs(2), subscription.next())
                .await
                .unwrap()
                .unwrap();
            assert!(!deleted.exists());
        }

        #[tokio::test]
        async fn dropped_subscription_stops_polling() {
            let (store, mock) = mock_store().await;
            put(&mock, 1, "t1");

            let subscription = store.subscribe(&path()).await.unwrap();
            tokio::time::sleep(Duration::from_millis(30)).await;
            drop(subscription);

            // Allow one in-flight poll to finish.
            tokio::time::sleep(Duration::from_millis(20)).await;
            let after_drop = mock.lock().unwrap().reads;
            tokio::time::sleep(Duration::from_millis(80)).await;
            assert_eq!(mock.lock().unwrap().reads, after_drop);
        }

        #[tokio::test]
        async fn denied_subscription_fails_up_front() {
            let (store, mock) = mock_store().await;
            mock.lock().unwrap().reject = Some(StatusCode::FORBIDDEN);
            let err = store.subscribe(&path()).await.err().unwrap();
            assert!(err.is_authentication());
        }
    }
}
