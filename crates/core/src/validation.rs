//! Request-shape validation for inbound workload configs.
//!
//! Estimators assume these checks have passed; they only re-check the model
//! source because that decides which code path runs.

use validator::Validate;

use crate::error::CoreError;
use crate::inference::InferenceConfig;
use crate::training::TrainingConfig;

/// Range and cross-field checks for a training request.
pub fn validate_training_config(config: &TrainingConfig) -> Result<(), CoreError> {
    config.validate()?;
    if let Some(custom) = &config.custom_model {
        custom.validate()?;
    }
    Ok(())
}

/// Range and cross-field checks for a serving request.
pub fn validate_inference_config(config: &InferenceConfig) -> Result<(), CoreError> {
    config.validate()?;
    if let Some(custom) = &config.custom_model {
        custom.validate()?;
    }
    Ok(())
}
