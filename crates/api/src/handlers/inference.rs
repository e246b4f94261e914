//! Handlers for inference estimation endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use gpuplan_core::estimate::InferenceEstimate;
use gpuplan_core::inference::{InferenceConfig, InferenceEstimator};
use gpuplan_core::validation::validate_inference_config;
use serde::Serialize;

use crate::error::AppResult;
use crate::options::INFERENCE_OPTIONS;
use crate::render::{render_advisories, Recommendations};
use crate::response::DataResponse;
use crate::state::AppState;

/// Estimate plus the advisories rendered as text.
#[derive(Debug, Serialize)]
pub struct InferenceEstimateResponse {
    #[serde(flatten)]
    pub estimate: InferenceEstimate,
    pub recommendations: Recommendations,
}

/// POST /api/v1/inference/estimate
pub async fn estimate_inference(
    State(state): State<AppState>,
    Json(config): Json<InferenceConfig>,
) -> AppResult<impl IntoResponse> {
    validate_inference_config(&config)?;

    let estimate = {
        let catalog = state.catalog.read().await;
        InferenceEstimator::new(&catalog, state.gpus.as_ref()).estimate(&config)?
    };

    tracing::info!(
        model_id = %estimate.model.id,
        backend = ?estimate.backend,
        quantization = ?estimate.quantization,
        total_memory_gb = estimate.resources.total_memory_gb,
        kv_cache_memory_gb = estimate.kv_cache_memory_gb,
        max_concurrent_requests = estimate.max_concurrent_requests,
        "Inference estimate computed",
    );

    let recommendations = render_advisories(&estimate.advisories);
    Ok(Json(DataResponse {
        data: InferenceEstimateResponse {
            estimate,
            recommendations,
        },
    }))
}

/// GET /api/v1/inference/backends
pub async fn inference_backends() -> impl IntoResponse {
    Json(DataResponse {
        data: &INFERENCE_OPTIONS,
    })
}
