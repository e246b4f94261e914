//! Memory, concurrency and latency estimation for model serving.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::advisory::{Advisories, Finding};
use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::CoreError;
use crate::estimate::{
    InferenceEstimate, InferenceMemoryBreakdown, ResourceEstimate, ScalabilityProjection,
};
use crate::gpu::{GpuRecommender, UsageContext, DEFAULT_RECOMMENDATION_COUNT};
use crate::memory::{
    activation_bytes, bytes_to_gib, min_device_count, weight_memory_gib,
    REFERENCE_DEVICE_MEMORY_GB,
};

use super::config::{InferenceBackend, InferenceConfig, ModelSource, Quantization};

/// Share of the training-time activation footprint held during a forward pass.
const INFERENCE_ACTIVATION_FACTOR: f64 = 0.6;

/// Device memory set aside for the runtime before KV blocks are allocated.
const RESERVED_DEVICE_MEMORY_GB: f64 = 10.0;
const MAX_CONCURRENT_REQUESTS: u32 = 100;
const USERS_PER_CONCURRENT_SLOT: u32 = 10;

const BASE_THROUGHPUT: f64 = 10_000.0;
const BATCHING_EFFICIENCY: f64 = 0.8;

const BASE_LATENCY_MS: f64 = 50.0;
const MIN_LATENCY_MS: f64 = 10.0;
const P99_OVER_P50: f64 = 2.5;
const REFERENCE_PROMPT_TOKENS: f64 = 2048.0;

/// Throughput multiplier when the deployment spans N devices.
const DEVICE_SCALING: [(u32, f64); 4] = [(1, 1.0), (2, 1.8), (4, 3.2), (8, 5.6)];

const QUANTIZATION_ADVISORY_PARAMS: u64 = 10_000_000_000;
const BACKEND_ADVISORY_PARAMS: u64 = 7_000_000_000;

/// Sizes a serving deployment against a catalog and a hardware table.
pub struct InferenceEstimator<'a> {
    catalog: &'a ModelCatalog,
    gpus: &'a dyn GpuRecommender,
}

impl<'a> InferenceEstimator<'a> {
    pub fn new(catalog: &'a ModelCatalog, gpus: &'a dyn GpuRecommender) -> Self {
        Self { catalog, gpus }
    }

    pub fn estimate(&self, config: &InferenceConfig) -> Result<InferenceEstimate, CoreError> {
        debug_assert!(config.tensor_parallel >= 1, "tensor_parallel must be at least 1");
        debug_assert!(config.pipeline_parallel >= 1);
        debug_assert!(config.max_batch_size >= 1);

        let model = self.resolve(config.model_source()?)?;
        let head_dim = model.head_dim()?;

        // Capacity planning sizes against the unquantized weights.
        let unquantized_weights_gb = weight_memory_gib(&model, config.precision);
        let weights_gb = unquantized_weights_gb * config.quantization.compression_ratio();
        let kv_cache_gb = kv_cache_gib(&model, config, head_dim);
        let activations_gb = activation_memory_gib(&model, config);

        let raw_gb = weights_gb + kv_cache_gb + activations_gb;
        let total_memory_gb = raw_gb * config.backend.memory_multiplier();
        let framework_overhead_gb = total_memory_gb - raw_gb;
        let min_gpu_count = min_device_count(total_memory_gb);
        let memory_per_gpu_gb = total_memory_gb / f64::from(config.tensor_parallel);

        let max_concurrent_requests = concurrent_request_capacity(
            unquantized_weights_gb,
            kv_cache_gb,
            config.max_batch_size,
        );
        let estimated_throughput = throughput(&model, config);
        let (p50, p99) = latency_ms(&model, config);

        let recommended_gpus = self.gpus.recommend(
            memory_per_gpu_gb,
            DEFAULT_RECOMMENDATION_COUNT,
            UsageContext::Inference,
        );

        let advisories = advise(
            &model,
            config,
            &Observed {
                total_gb: total_memory_gb,
                per_gpu_gb: memory_per_gpu_gb,
                min_gpu_count,
                throughput: estimated_throughput,
                p50_ms: p50,
            },
        );

        let scalability_analysis = ScalabilityProjection {
            throughput_by_gpu_count: DEVICE_SCALING
                .iter()
                .map(|&(devices, factor)| (devices, estimated_throughput * factor))
                .collect::<BTreeMap<_, _>>(),
            weights_per_gpu_gb: unquantized_weights_gb / f64::from(config.tensor_parallel),
            kv_cache_scaling: "linear".to_string(),
            recommended_max_concurrent_users: concurrent_request_capacity(
                unquantized_weights_gb,
                0.0,
                config.max_batch_size,
            ) * USERS_PER_CONCURRENT_SLOT,
        };

        Ok(InferenceEstimate {
            resources: ResourceEstimate {
                total_memory_gb,
                model_memory_gb: weights_gb,
                activation_memory_gb: activations_gb,
                optimizer_memory_gb: None,
                gradient_memory_gb: None,
                framework_overhead_gb,
                recommended_gpus,
                min_gpu_count,
                optimal_gpu_count: config
                    .tensor_parallel
                    .saturating_mul(config.pipeline_parallel),
            },
            model: model.summary(),
            backend: config.backend,
            quantization: config.quantization,
            kv_cache_memory_gb: kv_cache_gb,
            max_concurrent_requests,
            estimated_throughput,
            estimated_latency_p50_ms: p50,
            estimated_latency_p99_ms: p99,
            memory_breakdown: InferenceMemoryBreakdown {
                model_weights_gb: weights_gb,
                kv_cache_gb,
                activations_gb,
                framework_overhead_gb,
            },
            advisories,
            scalability_analysis,
        })
    }

    fn resolve<'b>(
        &'b self,
        source: ModelSource<'b>,
    ) -> Result<Cow<'b, ModelDescriptor>, CoreError> {
        match source {
            ModelSource::Catalog(id) => self.catalog.lookup(id).map(Cow::Borrowed),
            ModelSource::Custom(descriptor) => {
                descriptor.validate()?;
                Ok(Cow::Borrowed(descriptor))
            }
        }
    }
}

/// Keys and values for every layer, head and token of every sequence.
fn kv_cache_gib(model: &ModelDescriptor, config: &InferenceConfig, head_dim: u32) -> f64 {
    let elements = 2.0
        * f64::from(config.max_batch_size)
        * f64::from(config.total_sequence_length())
        * f64::from(model.num_layers)
        * f64::from(model.num_heads)
        * f64::from(head_dim);
    bytes_to_gib(elements * config.kv_byte_width())
}

fn activation_memory_gib(model: &ModelDescriptor, config: &InferenceConfig) -> f64 {
    let bytes = activation_bytes(
        model,
        config.max_batch_size,
        config.total_sequence_length(),
        config.precision.byte_width(),
    );
    bytes_to_gib(bytes * INFERENCE_ACTIVATION_FACTOR)
}

/// Requests whose KV cache fits next to the weights on one reference device.
fn concurrent_request_capacity(weights_gb: f64, kv_cache_gb: f64, batch_size: u32) -> u32 {
    if kv_cache_gb <= 0.0 {
        return batch_size.min(MAX_CONCURRENT_REQUESTS);
    }
    let available = REFERENCE_DEVICE_MEMORY_GB - weights_gb - RESERVED_DEVICE_MEMORY_GB;
    let per_request = kv_cache_gb / f64::from(batch_size);
    let fitting = (available / per_request).floor().max(1.0) as u32;
    fitting.min(MAX_CONCURRENT_REQUESTS)
}

fn quantization_speedup(quantization: Quantization) -> f64 {
    match quantization {
        Quantization::None => 1.0,
        Quantization::Int8 => 1.2,
        Quantization::Int4 | Quantization::Gptq | Quantization::Awq => 1.5,
    }
}

fn throughput(model: &ModelDescriptor, config: &InferenceConfig) -> f64 {
    let size_factor = match model.parameters {
        p if p > 70_000_000_000 => 0.1,
        p if p > 13_000_000_000 => 0.4,
        p if p > 7_000_000_000 => 0.7,
        _ => 1.0,
    };
    BASE_THROUGHPUT
        * size_factor
        * quantization_speedup(config.quantization)
        * f64::from(config.max_batch_size)
        * BATCHING_EFFICIENCY
}

/// Returns `(p50, p99)` in milliseconds.
fn latency_ms(model: &ModelDescriptor, config: &InferenceConfig) -> (f64, f64) {
    let size_factor = match model.parameters {
        p if p > 70_000_000_000 => 10.0,
        p if p > 30_000_000_000 => 5.0,
        p if p > 13_000_000_000 => 2.5,
        p if p > 7_000_000_000 => 1.5,
        _ => 1.0,
    };
    let prompt_factor = f64::from(config.max_sequence_length) / REFERENCE_PROMPT_TOKENS;
    let batch_factor = 1.0 + f64::from(config.max_batch_size - 1) * 0.1;
    let quantization_factor = match config.quantization {
        Quantization::None => 1.0,
        Quantization::Int8 => 0.85,
        Quantization::Int4 | Quantization::Gptq | Quantization::Awq => 0.7,
    };
    let backend_factor = match config.backend {
        InferenceBackend::Vllm => 0.8,
        InferenceBackend::Transformers => 1.0,
    };

    let p50 = BASE_LATENCY_MS
        * size_factor
        * prompt_factor
        * batch_factor
        * quantization_factor
        * backend_factor;
    (
        p50.max(MIN_LATENCY_MS),
        (p50 * P99_OVER_P50).max(MIN_LATENCY_MS),
    )
}

/// Figures the advisories are checked against.
struct Observed {
    total_gb: f64,
    per_gpu_gb: f64,
    min_gpu_count: u32,
    throughput: f64,
    p50_ms: f64,
}

fn advise(model: &ModelDescriptor, config: &InferenceConfig, observed: &Observed) -> Advisories {
    let mut advisories = Advisories::new();

    if config.quantization == Quantization::None
        && model.parameters > QUANTIZATION_ADVISORY_PARAMS
    {
        advisories.push(Finding::UnquantizedLargeModel {
            parameters: model.parameters,
        });
    }

    if config.backend == InferenceBackend::Transformers
        && model.parameters > BACKEND_ADVISORY_PARAMS
    {
        advisories.push(Finding::GenericRuntimeForLargeModel {
            parameters: model.parameters,
        });
    }

    if observed.total_gb > REFERENCE_DEVICE_MEMORY_GB && config.tensor_parallel == 1 {
        advisories.push(Finding::SingleDeviceOverCapacity {
            total_gb: observed.total_gb,
        });
    }

    if let Some(limit) = config.max_gpu_count {
        if observed.min_gpu_count > limit {
            advisories.push(Finding::ExceedsDeviceCountLimit {
                required: observed.min_gpu_count,
                limit,
            });
        }
    }
    if let Some(limit_gb) = config.gpu_memory_limit_gb {
        if observed.per_gpu_gb > limit_gb {
            advisories.push(Finding::ExceedsDeviceMemoryLimit {
                per_device_gb: observed.per_gpu_gb,
                limit_gb,
            });
        }
    }

    if let Some(target) = config.target_throughput {
        if observed.throughput < target {
            advisories.push(Finding::ThroughputBelowTarget {
                estimated: observed.throughput,
                target,
            });
        }
    }
    if let Some(target_ms) = config.target_latency_ms {
        if observed.p50_ms > target_ms {
            advisories.push(Finding::LatencyAboveTarget {
                estimated_ms: observed.p50_ms,
                target_ms,
            });
        }
    }

    advisories
}
