#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use edudash_client::cli::AppContext;
use edudash_client::{ClientConfig, RouteTable, Storage};

pub const TOKEN: &str = "stub-token-2701";
pub const EMAIL: &str = "officer@example.com";
pub const PASSWORD: &str = "secret";

/// In-process stand-in for the dashboard backend.
///
/// Unknown `/api/...` paths echo back what arrived (path, query, credential)
/// so tests can see exactly what the interceptor did to a request.
pub struct StubBackend {
    pub base_url: String,
    expired_hits: Arc<AtomicUsize>,
}

impl StubBackend {
    pub async fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind stub backend")?;

        let expired_hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/me", get(me))
            .route("/api/scope/districts", get(districts))
            .route("/api/scope/districts/:code/blocks", get(blocks))
            .route("/api/scope/blocks/:code/schools", get(schools))
            .route("/api/slow", get(slow))
            .route("/api/expired", get(expired))
            .fallback(echo)
            .with_state(expired_hits.clone());

        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            expired_hits,
        })
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::for_backend(self.base_url.as_str())
    }

    /// How many requests reached the always-401 endpoint
    pub fn expired_hits(&self) -> usize {
        self.expired_hits.load(Ordering::SeqCst)
    }
}

pub fn context(config: ClientConfig, storage: Arc<dyn Storage>) -> Result<AppContext> {
    Ok(AppContext::with_storage(config, storage, RouteTable::defaults())?)
}

/// Fresh directory under the system temp dir; not created until first write
pub fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("edudash-test-{}", uuid::Uuid::new_v4().simple()))
}

fn stub_user() -> Value {
    json!({
        "id": 7,
        "email": EMAIL,
        "full_name": "Pune District Officer",
        "role": "district_officer",
        "district_code": "2701",
        "is_active": true,
    })
}

fn unauthorized(detail: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "detail": detail }))).into_response()
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["email"] == EMAIL && body["password"] == PASSWORD {
        Json(json!({
            "access_token": TOKEN,
            "token_type": "bearer",
            "user": stub_user(),
        }))
        .into_response()
    } else {
        unauthorized("Incorrect email or password")
    }
}

async fn me(headers: HeaderMap) -> Response {
    if bearer(&headers) == Some(format!("Bearer {}", TOKEN).as_str()) {
        Json(stub_user()).into_response()
    } else {
        unauthorized("Could not validate credentials")
    }
}

async fn districts() -> Json<Value> {
    Json(json!([
        { "district_code": "2701", "district_name": "Pune" },
        { "district_code": 2702, "district_name": "Nashik" },
    ]))
}

async fn blocks(Path(code): Path<String>) -> Json<Value> {
    match code.as_str() {
        "2701" => Json(json!([
            { "block_code": "270101", "block_name": "Haveli" },
            { "block_code": "270102", "block_name": "Mulshi" },
        ])),
        _ => Json(json!([])),
    }
}

async fn schools(Path(code): Path<String>, Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let all = match code.as_str() {
        "270101" => vec![
            ("27010100101", "ZP School Wagholi"),
            ("27010100202", "ZP School Lohegaon"),
        ],
        _ => Vec::new(),
    };
    let needle = params.get("q").map(|q| q.to_lowercase());
    let limit = params
        .get("limit")
        .and_then(|l| l.parse::<usize>().ok())
        .unwrap_or(500);
    let rows: Vec<Value> = all
        .into_iter()
        .filter(|(_, name)| match &needle {
            Some(q) => name.to_lowercase().contains(q),
            None => true,
        })
        .take(limit)
        .map(|(udise, name)| json!({ "udise_code": udise, "school_name": name }))
        .collect();
    Json(Value::Array(rows))
}

async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(3)).await;
    Json(json!({ "slow": true }))
}

async fn expired(State(hits): State<Arc<AtomicUsize>>) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    unauthorized("Token has expired")
}

async fn echo(uri: Uri, headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "path": uri.path(),
        "query": query,
        "authorization": bearer(&headers),
        "skip_scope": headers.get("x-skip-scope").and_then(|v| v.to_str().ok()),
    }))
}
