//! Result types produced by the estimators.
//!
//! Every memory figure is GiB and never negative.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::advisory::Advisories;
use crate::catalog::ModelSummary;
use crate::gpu::GpuInfo;
use crate::inference::{InferenceBackend, Quantization};
use crate::training::TrainingMethod;

/// Fields shared by training and inference estimates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceEstimate {
    pub total_memory_gb: f64,
    pub model_memory_gb: f64,
    pub activation_memory_gb: f64,
    pub optimizer_memory_gb: Option<f64>,
    pub gradient_memory_gb: Option<f64>,
    pub framework_overhead_gb: f64,
    pub recommended_gpus: Vec<GpuInfo>,
    pub min_gpu_count: u32,
    pub optimal_gpu_count: u32,
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// Per-component memory of a single training replica.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingMemoryBreakdown {
    pub model_weights_gb: f64,
    pub activations_gb: f64,
    pub optimizer_states_gb: f64,
    pub gradients_gb: f64,
    pub framework_overhead_gb: f64,
    pub trainable_parameters: u64,
    pub lora_parameters: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingEstimate {
    #[serde(flatten)]
    pub resources: ResourceEstimate,
    pub model: ModelSummary,
    pub training_method: TrainingMethod,
    pub effective_batch_size: u64,
    pub memory_per_gpu_gb: f64,
    pub memory_breakdown: TrainingMemoryBreakdown,
    pub estimated_tokens_per_second: f64,
    pub advisories: Advisories,
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceMemoryBreakdown {
    pub model_weights_gb: f64,
    pub kv_cache_gb: f64,
    pub activations_gb: f64,
    pub framework_overhead_gb: f64,
}

/// How the deployment behaves when more devices are added.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScalabilityProjection {
    /// Estimated tokens/second keyed by device count.
    pub throughput_by_gpu_count: BTreeMap<u32, f64>,
    pub weights_per_gpu_gb: f64,
    pub kv_cache_scaling: String,
    pub recommended_max_concurrent_users: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceEstimate {
    #[serde(flatten)]
    pub resources: ResourceEstimate,
    pub model: ModelSummary,
    pub backend: InferenceBackend,
    pub quantization: Quantization,
    pub kv_cache_memory_gb: f64,
    pub max_concurrent_requests: u32,
    pub estimated_throughput: f64,
    pub estimated_latency_p50_ms: f64,
    pub estimated_latency_p99_ms: f64,
    pub memory_breakdown: InferenceMemoryBreakdown,
    pub advisories: Advisories,
    pub scalability_analysis: ScalabilityProjection,
}
