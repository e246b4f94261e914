pub mod health;
pub mod inference;
pub mod models;
pub mod training;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /training/estimate          estimate (POST)
/// /training/configs           option lists (GET)
///
/// /inference/estimate         estimate (POST)
/// /inference/backends         option lists (GET)
///
/// /models                     list (GET, ?family=&size=), register (POST)
/// /models/{id}                get, replace (PUT), remove (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/training", training::router())
        .nest("/inference", inference::router())
        .nest("/models", models::router())
}
