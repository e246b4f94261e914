//! Serving deployment sizing.

mod config;
mod estimator;

pub use config::{
    InferenceBackend, InferenceConfig, KvCacheDtype, KvCacheQuantization, ModelSource,
    Quantization,
};
pub use estimator::InferenceEstimator;
