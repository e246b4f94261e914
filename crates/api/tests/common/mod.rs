#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use gpuplan_core::catalog::ModelCatalog;
use gpuplan_core::gpu::GpuTable;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use gpuplan_api::config::ServerConfig;
use gpuplan_api::router::build_app_router;
use gpuplan_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        gpu_table_path: None,
    }
}

/// Build the full application router over the seeded catalog and the
/// built-in GPU table, with the production middleware stack.
pub fn build_test_app() -> Router {
    build_test_app_with_state().0
}

/// Like [`build_test_app`] but also returns the state so tests can inspect
/// the catalog directly.
pub fn build_test_app_with_state() -> (Router, AppState) {
    let config = test_config();
    let state = AppState::new(
        config.clone(),
        ModelCatalog::with_seed_models(),
        Arc::new(GpuTable::builtin()),
    );
    (build_app_router(state.clone(), &config), state)
}

pub async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn put_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(body)).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
