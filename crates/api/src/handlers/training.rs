//! Handlers for training estimation endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use gpuplan_core::estimate::TrainingEstimate;
use gpuplan_core::training::{TrainingConfig, TrainingEstimator};
use gpuplan_core::validation::validate_training_config;
use serde::Serialize;

use crate::error::AppResult;
use crate::options::TRAINING_OPTIONS;
use crate::render::{render_advisories, Recommendations};
use crate::response::DataResponse;
use crate::state::AppState;

/// Estimate plus the advisories rendered as text.
#[derive(Debug, Serialize)]
pub struct TrainingEstimateResponse {
    #[serde(flatten)]
    pub estimate: TrainingEstimate,
    pub recommendations: Recommendations,
}

/// POST /api/v1/training/estimate
pub async fn estimate_training(
    State(state): State<AppState>,
    Json(config): Json<TrainingConfig>,
) -> AppResult<impl IntoResponse> {
    validate_training_config(&config)?;

    let estimate = {
        let catalog = state.catalog.read().await;
        TrainingEstimator::new(&catalog, state.gpus.as_ref()).estimate(&config)?
    };

    tracing::info!(
        model_id = %estimate.model.id,
        method = ?estimate.training_method,
        data_parallel = config.data_parallel,
        total_memory_gb = estimate.resources.total_memory_gb,
        memory_per_gpu_gb = estimate.memory_per_gpu_gb,
        min_gpu_count = estimate.resources.min_gpu_count,
        "Training estimate computed",
    );

    let recommendations = render_advisories(&estimate.advisories);
    Ok(Json(DataResponse {
        data: TrainingEstimateResponse {
            estimate,
            recommendations,
        },
    }))
}

/// GET /api/v1/training/configs
pub async fn training_configs() -> impl IntoResponse {
    Json(DataResponse {
        data: &TRAINING_OPTIONS,
    })
}
