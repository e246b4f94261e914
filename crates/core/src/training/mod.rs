//! Fine-tuning workload sizing.

mod architecture;
mod config;
mod estimator;

pub use architecture::{adapted_module_count, lora_parameter_count, synthesize_descriptor};
pub use config::{
    AccelerationMethod, LoraConfig, ModelSource, Optimizer, TrainingConfig, TrainingMethod,
    ZeroStage, DEFAULT_LORA_TARGET,
};
pub use estimator::TrainingEstimator;
