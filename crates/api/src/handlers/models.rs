//! Handlers for browsing and managing the model catalog.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use gpuplan_core::catalog::{ModelDescriptor, ModelSummary, SizeCategory};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ModelFilter {
    pub family: Option<String>,
    pub size: Option<SizeCategory>,
}

// ---------------------------------------------------------------------------
// Read endpoints
// ---------------------------------------------------------------------------

/// GET /api/v1/models
///
/// List catalog models, optionally filtered by `family` and/or `size`.
pub async fn list_models(
    State(state): State<AppState>,
    Query(filter): Query<ModelFilter>,
) -> AppResult<impl IntoResponse> {
    let catalog = state.catalog.read().await;

    let models: Vec<ModelSummary> = match (filter.family.as_deref(), filter.size) {
        (Some(family), size) => catalog
            .list_by_family(family)
            .into_iter()
            .filter(|m| size.map_or(true, |s| m.size_category() == s))
            .map(ModelDescriptor::summary)
            .collect(),
        (None, Some(size)) => catalog
            .list_by_size(size)
            .into_iter()
            .map(ModelDescriptor::summary)
            .collect(),
        (None, None) => catalog.list(),
    };

    Ok(Json(DataResponse { data: models }))
}

/// GET /api/v1/models/{id}
pub async fn get_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let catalog = state.catalog.read().await;
    let model = catalog.lookup(&model_id)?.clone();

    Ok(Json(DataResponse { data: model }))
}

// ---------------------------------------------------------------------------
// Write endpoints
// ---------------------------------------------------------------------------

/// POST /api/v1/models
///
/// Register a new model. Returns 409 if the id is taken.
pub async fn create_model(
    State(state): State<AppState>,
    Json(descriptor): Json<ModelDescriptor>,
) -> AppResult<impl IntoResponse> {
    state.catalog.write().await.register(descriptor.clone())?;

    tracing::info!(
        model_id = %descriptor.id,
        family = %descriptor.family,
        parameters = descriptor.parameters,
        "Model registered",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: descriptor })))
}

/// PUT /api/v1/models/{id}
///
/// Replace the descriptor stored under `id`. The body may omit its id
/// (empty string) but must not name a different model.
pub async fn update_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    Json(descriptor): Json<ModelDescriptor>,
) -> AppResult<impl IntoResponse> {
    if !descriptor.id.is_empty() && descriptor.id != model_id {
        return Err(AppError::BadRequest(format!(
            "Body id '{}' does not match path id '{model_id}'",
            descriptor.id
        )));
    }

    let updated = {
        let mut catalog = state.catalog.write().await;
        catalog.update(&model_id, descriptor)?;
        catalog.lookup(&model_id)?.clone()
    };

    tracing::info!(model_id = %model_id, "Model updated");

    Ok(Json(DataResponse { data: updated }))
}

/// DELETE /api/v1/models/{id}
pub async fn delete_model(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let removed = state.catalog.write().await.remove(&model_id)?;

    tracing::info!(model_id = %removed.id, "Model removed");

    Ok(StatusCode::NO_CONTENT)
}
