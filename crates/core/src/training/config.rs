//! Training workload description.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::catalog::ModelDescriptor;
use crate::error::CoreError;
use crate::memory::Precision;

/// Adapter target used when none is given.
pub const DEFAULT_LORA_TARGET: &str = "all-linear";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMethod {
    FullFinetuning,
    Lora,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    #[default]
    Adamw,
    Adam,
    Sgd,
}

impl Optimizer {
    /// Optimizer state slots kept per trainable parameter.
    pub fn state_multiplier(self) -> f64 {
        match self {
            Self::Adamw | Self::Adam => 2.0,
            Self::Sgd => 1.0,
        }
    }

    pub fn is_adam_family(self) -> bool {
        matches!(self, Self::Adamw | Self::Adam)
    }
}

/// ZeRO sharding stage. Stage 0 is equivalent to no sharding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroStage {
    Stage0,
    Stage1,
    Stage2,
    Stage3,
}

impl ZeroStage {
    pub fn shards_optimizer(self) -> bool {
        self >= Self::Stage1
    }

    pub fn shards_gradients(self) -> bool {
        self >= Self::Stage2
    }

    pub fn shards_weights(self) -> bool {
        self == Self::Stage3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccelerationMethod {
    #[default]
    None,
    #[serde(rename = "flash_attention_2")]
    FlashAttention2,
    Unsloth,
}

/// Low-rank adapter hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LoraConfig {
    #[serde(default = "default_rank")]
    #[validate(range(min = 1, max = 512))]
    pub rank: u32,
    #[serde(default = "default_alpha")]
    #[validate(range(min = 1, max = 1024))]
    pub alpha: u32,
    #[serde(default = "default_dropout")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub dropout: f64,
    /// `"all-linear"` or a comma-separated list of module names.
    #[serde(default = "default_target_modules")]
    pub target_modules: Option<String>,
}

fn default_rank() -> u32 {
    8
}

fn default_alpha() -> u32 {
    16
}

fn default_dropout() -> f64 {
    0.1
}

fn default_target_modules() -> Option<String> {
    Some(DEFAULT_LORA_TARGET.to_string())
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            rank: default_rank(),
            alpha: default_alpha(),
            dropout: default_dropout(),
            target_modules: default_target_modules(),
        }
    }
}

/// Where the model architecture for an estimate comes from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelSource<'a> {
    Catalog(&'a str),
    /// Parameter count in billions; architecture is synthesized.
    Parameters(f64),
    Custom(&'a ModelDescriptor),
}

fn default_one() -> u32 {
    1
}

fn default_learning_rate() -> f64 {
    1e-4
}

fn default_weight_decay() -> f64 {
    0.01
}

/// A fine-tuning workload to size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_training_schema", skip_on_field_errors = false))]
pub struct TrainingConfig {
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0.1, max = 1000.0))]
    pub parameters_billion: Option<f64>,
    #[serde(default)]
    pub custom_model: Option<ModelDescriptor>,

    pub training_method: TrainingMethod,
    #[serde(default)]
    pub precision: Precision,
    #[validate(range(min = 1, max = 1024))]
    pub batch_size: u32,
    #[validate(range(min = 128, max = 32768))]
    pub sequence_length: u32,
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 1024))]
    pub gradient_accumulation_steps: u32,

    #[serde(default)]
    pub optimizer: Optimizer,
    #[serde(default = "default_learning_rate")]
    #[validate(range(exclusive_min = 0.0))]
    pub learning_rate: f64,
    #[serde(default = "default_weight_decay")]
    #[validate(range(min = 0.0))]
    pub weight_decay: f64,

    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 512))]
    pub data_parallel: u32,
    /// Carried for completeness; tensor and pipeline degrees do not change
    /// the training estimate.
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 512))]
    pub tensor_parallel: u32,
    #[serde(default = "default_one")]
    #[validate(range(min = 1, max = 512))]
    pub pipeline_parallel: u32,
    #[serde(default)]
    pub deepspeed_stage: Option<ZeroStage>,

    #[serde(default)]
    #[validate(nested)]
    pub lora_config: Option<LoraConfig>,

    #[serde(default)]
    pub gradient_checkpointing: bool,
    #[serde(default)]
    pub acceleration_method: AccelerationMethod,
}

impl TrainingConfig {
    /// Minimal LoRA-free config for a catalog model, mostly for tests and
    /// programmatic callers.
    pub fn for_model(model_id: impl Into<String>, method: TrainingMethod) -> Self {
        Self {
            model_id: Some(model_id.into()),
            parameters_billion: None,
            custom_model: None,
            training_method: method,
            precision: Precision::default(),
            batch_size: 1,
            sequence_length: 2048,
            gradient_accumulation_steps: 1,
            optimizer: Optimizer::default(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            data_parallel: 1,
            tensor_parallel: 1,
            pipeline_parallel: 1,
            deepspeed_stage: None,
            lora_config: None,
            gradient_checkpointing: false,
            acceleration_method: AccelerationMethod::None,
        }
    }

    /// The single model source. Zero or several sources is a configuration
    /// error.
    pub fn model_source(&self) -> Result<ModelSource<'_>, CoreError> {
        let mut sources = Vec::with_capacity(1);
        if let Some(id) = self.model_id.as_deref().filter(|id| !id.is_empty()) {
            sources.push(ModelSource::Catalog(id));
        }
        if let Some(billions) = self.parameters_billion {
            sources.push(ModelSource::Parameters(billions));
        }
        if let Some(custom) = &self.custom_model {
            sources.push(ModelSource::Custom(custom));
        }

        match sources.as_slice() {
            [source] => Ok(*source),
            [] => Err(CoreError::Configuration(
                "One of model_id, parameters_billion or custom_model is required".to_string(),
            )),
            _ => Err(CoreError::Configuration(
                "Only one of model_id, parameters_billion or custom_model may be given"
                    .to_string(),
            )),
        }
    }

    /// Adapter settings in effect, falling back to defaults for LoRA runs.
    pub fn effective_lora(&self) -> Option<LoraConfig> {
        match self.training_method {
            TrainingMethod::Lora => Some(self.lora_config.clone().unwrap_or_default()),
            TrainingMethod::FullFinetuning => None,
        }
    }

    /// Sharding stage that actually shards something.
    pub fn active_zero_stage(&self) -> Option<ZeroStage> {
        self.deepspeed_stage.filter(|s| *s != ZeroStage::Stage0)
    }
}

fn validate_training_schema(config: &TrainingConfig) -> Result<(), ValidationError> {
    if config.model_source().is_err() {
        let mut err = ValidationError::new("model_source");
        err.message =
            Some("exactly one of model_id, parameters_billion or custom_model is required".into());
        return Err(err);
    }
    if config.acceleration_method == AccelerationMethod::Unsloth && config.data_parallel > 1 {
        let mut err = ValidationError::new("unsloth_single_device");
        err.message = Some("unsloth only supports single-device training".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let config: TrainingConfig = serde_json::from_str(
            r#"{"model_id": "llama-7b", "training_method": "lora",
                "batch_size": 4, "sequence_length": 1024}"#,
        )
        .unwrap();
        assert_eq!(config.optimizer, Optimizer::Adamw);
        assert_eq!(config.precision, Precision::Fp16);
        assert_eq!(config.data_parallel, 1);
        assert_eq!(config.gradient_accumulation_steps, 1);
        assert_eq!(config.acceleration_method, AccelerationMethod::None);
        assert_eq!(config.lora_config, None);
        assert_eq!(config.effective_lora(), Some(LoraConfig::default()));
    }

    #[test]
    fn wire_names_are_snake_case() {
        let json = serde_json::to_value(AccelerationMethod::FlashAttention2).unwrap();
        assert_eq!(json, "flash_attention_2");
        let json = serde_json::to_value(TrainingMethod::FullFinetuning).unwrap();
        assert_eq!(json, "full_finetuning");
        let stage: ZeroStage = serde_json::from_str(r#""stage3""#).unwrap();
        assert_eq!(stage, ZeroStage::Stage3);
    }

    #[test]
    fn partial_lora_config_fills_defaults() {
        let lora: LoraConfig = serde_json::from_str(r#"{"rank": 16}"#).unwrap();
        assert_eq!(lora.rank, 16);
        assert_eq!(lora.alpha, 16);
        assert_eq!(lora.target_modules.as_deref(), Some("all-linear"));

        let lora: LoraConfig = serde_json::from_str(r#"{"target_modules": null}"#).unwrap();
        assert_eq!(lora.target_modules, None);
    }

    #[test]
    fn model_source_requires_exactly_one() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::Lora);
        assert_matches!(config.model_source(), Ok(ModelSource::Catalog("llama-7b")));

        config.parameters_billion = Some(7.0);
        assert_matches!(config.model_source(), Err(CoreError::Configuration(_)));

        config.model_id = None;
        assert_matches!(config.model_source(), Ok(ModelSource::Parameters(b)) if b == 7.0);

        config.parameters_billion = None;
        assert_matches!(config.model_source(), Err(CoreError::Configuration(_)));
    }

    #[test]
    fn stage_zero_is_not_active_sharding() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::FullFinetuning);
        config.deepspeed_stage = Some(ZeroStage::Stage0);
        assert_eq!(config.active_zero_stage(), None);
        config.deepspeed_stage = Some(ZeroStage::Stage2);
        assert_eq!(config.active_zero_stage(), Some(ZeroStage::Stage2));
        assert!(ZeroStage::Stage2.shards_gradients());
        assert!(!ZeroStage::Stage2.shards_weights());
    }
}
