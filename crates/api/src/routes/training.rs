//! Route definitions for training estimation.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::training;
use crate::state::AppState;

/// Training routes mounted at `/training`.
///
/// ```text
/// POST /estimate          -> estimate_training
/// GET  /configs           -> training_configs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/estimate", post(training::estimate_training))
        .route("/configs", get(training::training_configs))
}
