//! Route definitions for inference estimation.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::inference;
use crate::state::AppState;

/// Inference routes mounted at `/inference`.
///
/// ```text
/// POST /estimate          -> estimate_inference
/// GET  /backends          -> inference_backends
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/estimate", post(inference::estimate_inference))
        .route("/backends", get(inference::inference_backends))
}
