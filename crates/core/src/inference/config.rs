//! Serving workload description.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::catalog::ModelDescriptor;
use crate::error::CoreError;
use crate::memory::Precision;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceBackend {
    /// Paged-attention serving engine.
    #[default]
    Vllm,
    /// Generic transformer runtime.
    Transformers,
}

impl InferenceBackend {
    /// Multiplier applied to the raw memory sum for runtime bookkeeping.
    pub fn memory_multiplier(self) -> f64 {
        match self {
            Self::Vllm => 1.2,
            Self::Transformers => 1.1,
        }
    }
}

/// Weight quantization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantization {
    #[default]
    None,
    Int8,
    Int4,
    Gptq,
    Awq,
}

impl Quantization {
    /// Fraction of full-precision weight memory kept after quantization.
    pub fn compression_ratio(self) -> f64 {
        match self {
            Self::None => 1.0,
            Self::Int8 => 0.5,
            Self::Int4 | Self::Gptq | Self::Awq => 0.25,
        }
    }

    pub fn is_four_bit(self) -> bool {
        matches!(self, Self::Int4 | Self::Gptq | Self::Awq)
    }
}

/// Storage type override for the KV cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvCacheDtype {
    Fp32,
    Fp16,
    Bf16,
    Fp8,
    Int8,
}

impl KvCacheDtype {
    pub fn byte_width(self) -> f64 {
        match self {
            Self::Fp32 => 4.0,
            Self::Fp16 | Self::Bf16 => 2.0,
            Self::Fp8 | Self::Int8 => 1.0,
        }
    }
}

/// Quantized KV cache. Takes precedence over [`KvCacheDtype`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KvCacheQuantization {
    Int8,
    Int4,
}

impl KvCacheQuantization {
    pub fn byte_width(self) -> f64 {
        match self {
            Self::Int8 => 1.0,
            Self::Int4 => 0.5,
        }
    }
}

/// Where the served model's architecture comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelSource<'a> {
    Catalog(&'a str),
    Custom(&'a ModelDescriptor),
}

fn default_one() -> u32 {
    1
}

fn default_max_new_tokens() -> u32 {
    512
}

/// A deployment to size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_inference_schema", skip_on_field_errors = false))]
pub struct InferenceConfig {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub custom_model: Option<ModelDescriptor>,

    #[serde(default)]
    pub backend: InferenceBackend,
    #[serde(default)]
    pub precision: Precision,
    #[serde(default)]
    pub quantization: Quantization,

    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 512))]
    pub max_batch_size: u32,
    /// Longest prompt accepted, in tokens.
    #[validate(range(min = 128, max = 32768))]
    pub max_sequence_length: u32,
    #[serde(default = "default_max_new_tokens")]
    #[validate(range(min = 1, max = 4096))]
    pub max_new_tokens: u32,

    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 512))]
    pub tensor_parallel: u32,
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 512))]
    pub pipeline_parallel: u32,

    #[serde(default)]
    pub kv_cache_dtype: Option<KvCacheDtype>,
    #[serde(default)]
    pub kv_cache_quantization: Option<KvCacheQuantization>,

    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub target_throughput: Option<f64>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub target_latency_ms: Option<f64>,

    #[serde(default)]
    #[validate(range(min = 1, max = 512))]
    pub max_gpu_count: Option<u32>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub gpu_memory_limit_gb: Option<f64>,
}

impl InferenceConfig {
    pub fn for_model(model_id: impl Into<String>, backend: InferenceBackend) -> Self {
        Self {
            model_id: Some(model_id.into()),
            custom_model: None,
            backend,
            precision: Precision::default(),
            quantization: Quantization::default(),
            max_batch_size: 1,
            max_sequence_length: 2048,
            max_new_tokens: default_max_new_tokens(),
            tensor_parallel: 1,
            pipeline_parallel: 1,
            kv_cache_dtype: None,
            kv_cache_quantization: None,
            target_throughput: None,
            target_latency_ms: None,
            max_gpu_count: None,
            gpu_memory_limit_gb: None,
        }
    }

    pub fn model_source(&self) -> Result<ModelSource<'_>, CoreError> {
        let id = self.model_id.as_deref().filter(|id| !id.is_empty());
        match (id, &self.custom_model) {
            (Some(id), None) => Ok(ModelSource::Catalog(id)),
            (None, Some(custom)) => Ok(ModelSource::Custom(custom)),
            (None, None) => Err(CoreError::Configuration(
                "One of model_id or custom_model is required".to_string(),
            )),
            (Some(_), Some(_)) => Err(CoreError::Configuration(
                "model_id and custom_model are mutually exclusive".to_string(),
            )),
        }
    }

    /// Bytes per cached key/value element after overrides.
    pub fn kv_byte_width(&self) -> f64 {
        if let Some(quantization) = self.kv_cache_quantization {
            return quantization.byte_width();
        }
        match self.kv_cache_dtype {
            Some(dtype) => dtype.byte_width(),
            None => self.precision.byte_width() as f64,
        }
    }

    /// Prompt plus generated tokens.
    pub fn total_sequence_length(&self) -> u32 {
        self.max_sequence_length + self.max_new_tokens
    }
}

fn validate_inference_schema(config: &InferenceConfig) -> Result<(), ValidationError> {
    if config.model_source().is_err() {
        let mut err = ValidationError::new("model_source");
        err.message = Some("exactly one of model_id or custom_model is required".into());
        return Err(err);
    }
    Ok(())
}
