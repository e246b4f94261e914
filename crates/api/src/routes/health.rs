//! Liveness endpoint, mounted at the root rather than under `/api/v1`.

use std::collections::BTreeSet;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CatalogStatus {
    pub models: usize,
    pub families: usize,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Package version of the running binary.
    pub version: &'static str,
    pub catalog: CatalogStatus,
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let catalog = state.catalog.read().await;
    let families: BTreeSet<String> = catalog.list().into_iter().map(|m| m.family).collect();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        catalog: CatalogStatus {
            models: catalog.len(),
            families: families.len(),
        },
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
