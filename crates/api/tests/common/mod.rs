use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tempfile::TempDir;
use tower::ServiceExt;

use crm_api::config::ServerConfig;
use crm_api::router::build_app_router;
use crm_api::state::AppState;
use crm_mango::{MangoApi, MangoConfig, RecordingStorageConfig};
use crm_sync::{SyncConfig, SyncService};

pub const API_KEY: &str = "test-key";
pub const API_SALT: &str = "test-salt";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

pub fn test_mango_config(api_url: &str) -> MangoConfig {
    MangoConfig {
        api_url: api_url.to_string(),
        api_key: API_KEY.to_string(),
        api_salt: API_SALT.to_string(),
        request_timeout: Duration::from_secs(5),
        recording_timeout: Duration::from_secs(5),
        result_poll_attempts: 2,
        result_poll_delay: Duration::from_millis(1),
    }
}

/// Router plus the temporary recordings directory it serves.
pub struct TestApp {
    pub router: Router,
    pub recordings: TempDir,
}

/// Build the full application router against `pool`, talking to a Mango
/// stand-in at `mango_url`.
pub fn build_test_app(pool: PgPool, mango_url: &str) -> TestApp {
    let recordings = tempfile::tempdir().unwrap();
    let storage = RecordingStorageConfig {
        dir: recordings.path().to_path_buf(),
        public_prefix: "/recordings".to_string(),
    };
    let mango = test_mango_config(mango_url);
    let api = Arc::new(MangoApi::new(mango.clone()).unwrap());
    let sync = Arc::new(SyncService::new(
        pool.clone(),
        api,
        storage.clone(),
        SyncConfig {
            lookback: Duration::from_secs(3600),
            interval: None,
        },
    ));

    let config = test_config();
    let state = AppState {
        pool,
        mango: Arc::new(mango),
        recordings: Arc::new(storage),
        sync,
    };

    TestApp {
        router: build_app_router(state, &config),
        recordings,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_empty(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::post(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_form(app: Router, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
    let body = fields
        .iter()
        .map(|(k, v)| format!("{}={}", url_encode(k), url_encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn url_encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
