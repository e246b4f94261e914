//! Memory and throughput estimation for fine-tuning runs.

use crate::advisory::{Advisories, Finding};
use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::CoreError;
use crate::estimate::{ResourceEstimate, TrainingEstimate, TrainingMemoryBreakdown};
use crate::gpu::{GpuRecommender, UsageContext, DEFAULT_RECOMMENDATION_COUNT};
use crate::memory::{
    activation_bytes, bytes_to_gib, min_device_count, weight_memory_gib, Framework,
    REFERENCE_DEVICE_MEMORY_GB,
};

use super::architecture::{lora_parameter_count, resolve_descriptor};
use super::config::{AccelerationMethod, TrainingConfig, TrainingMethod, ZeroStage};

/// Framework whose fixed footprint is charged to every training replica.
const TRAINING_FRAMEWORK: Framework = Framework::Pytorch;

/// Fraction of activations kept when gradient checkpointing recomputes the rest.
const CHECKPOINTING_RETAINED: f64 = 0.3;

const UNSLOTH_ACTIVATION_FACTOR: f64 = 0.25;

/// Baseline tokens/second of a single reference device.
const BASE_TOKENS_PER_SECOND: f64 = 2000.0;
const MIN_TOKENS_PER_SECOND: f64 = 10.0;
const LORA_SPEEDUP: f64 = 1.5;
const DATA_PARALLEL_EFFICIENCY: f64 = 0.9;

/// Full fine-tuning above this many parameters triggers an advisory.
const FULL_FINETUNE_ADVISORY_PARAMS: u64 = 10_000_000_000;
const LARGE_BATCH_THRESHOLD: u32 = 32;

/// Sizes a training workload against a catalog and a hardware table.
pub struct TrainingEstimator<'a> {
    catalog: &'a ModelCatalog,
    gpus: &'a dyn GpuRecommender,
}

/// Raw component sizes before replication across data-parallel ranks.
struct Components {
    weights_gb: f64,
    activations_gb: f64,
    optimizer_gb: f64,
    gradients_gb: f64,
    trainable_parameters: u64,
    lora_parameters: Option<u64>,
}

impl<'a> TrainingEstimator<'a> {
    pub fn new(catalog: &'a ModelCatalog, gpus: &'a dyn GpuRecommender) -> Self {
        Self { catalog, gpus }
    }

    pub fn estimate(&self, config: &TrainingConfig) -> Result<TrainingEstimate, CoreError> {
        debug_assert!(config.data_parallel >= 1, "data_parallel must be at least 1");
        debug_assert!(config.gradient_accumulation_steps >= 1);

        let model = resolve_descriptor(self.catalog, config.model_source()?)?;
        let components = components(&model, config);

        let dp = f64::from(config.data_parallel);
        let stage = config.active_zero_stage();
        let overhead = TRAINING_FRAMEWORK.overhead_gib();

        let total_memory_gb = replicated_total(&components, stage, dp, overhead);
        let memory_per_gpu_gb = per_device(&components, stage, dp, overhead);
        let min_gpu_count = min_device_count(total_memory_gb);

        let recommended_gpus = self.gpus.recommend(
            memory_per_gpu_gb,
            DEFAULT_RECOMMENDATION_COUNT,
            UsageContext::Training,
        );

        let advisories = advise(&model, config, total_memory_gb, memory_per_gpu_gb);

        Ok(TrainingEstimate {
            resources: ResourceEstimate {
                total_memory_gb,
                model_memory_gb: components.weights_gb,
                activation_memory_gb: components.activations_gb,
                optimizer_memory_gb: Some(components.optimizer_gb),
                gradient_memory_gb: Some(components.gradients_gb),
                framework_overhead_gb: overhead,
                recommended_gpus,
                min_gpu_count,
                optimal_gpu_count: config.data_parallel,
            },
            model: model.summary(),
            training_method: config.training_method,
            effective_batch_size: u64::from(config.batch_size)
                * u64::from(config.gradient_accumulation_steps)
                * u64::from(config.data_parallel),
            memory_per_gpu_gb,
            memory_breakdown: TrainingMemoryBreakdown {
                model_weights_gb: components.weights_gb,
                activations_gb: components.activations_gb,
                optimizer_states_gb: components.optimizer_gb,
                gradients_gb: components.gradients_gb,
                framework_overhead_gb: overhead,
                trainable_parameters: components.trainable_parameters,
                lora_parameters: components.lora_parameters,
            },
            estimated_tokens_per_second: tokens_per_second(&model, config),
            advisories,
        })
    }
}

fn components(model: &ModelDescriptor, config: &TrainingConfig) -> Components {
    let width = config.precision.byte_width() as f64;
    let dp = f64::from(config.data_parallel);
    let stage = config.active_zero_stage();
    let base_weights_gb = weight_memory_gib(model, config.precision);

    let (weights_gb, trainable_parameters, lora_parameters) = match config.effective_lora() {
        Some(lora) => {
            let adapters = lora_parameter_count(model, &lora);
            let adapter_gb = bytes_to_gib(adapters as f64 * width);
            (base_weights_gb + adapter_gb, adapters, Some(adapters))
        }
        None => (base_weights_gb, model.parameters, None),
    };
    let trainable_bytes = trainable_parameters as f64 * width;

    let mut optimizer_gb = bytes_to_gib(trainable_bytes * config.optimizer.state_multiplier());
    if stage.is_some_and(ZeroStage::shards_optimizer) {
        optimizer_gb /= dp;
    }

    let mut gradients_gb = bytes_to_gib(trainable_bytes);
    if stage.is_some_and(ZeroStage::shards_gradients) {
        gradients_gb /= dp;
    }
    if config.gradient_accumulation_steps > 1 {
        let steps = f64::from(config.gradient_accumulation_steps);
        let mut accumulation = 1.0 + 0.10 * (1.0 + 0.5 * steps.ln());
        if config.optimizer.is_adam_family() {
            accumulation *= 1.15;
        }
        gradients_gb *= accumulation;
    }

    Components {
        weights_gb,
        activations_gb: activation_memory_gb(model, config),
        optimizer_gb,
        gradients_gb,
        trainable_parameters,
        lora_parameters,
    }
}

fn activation_memory_gb(model: &ModelDescriptor, config: &TrainingConfig) -> f64 {
    let mut bytes = activation_bytes(
        model,
        config.batch_size,
        config.sequence_length,
        config.precision.byte_width(),
    );
    if config.gradient_checkpointing {
        bytes *= CHECKPOINTING_RETAINED;
    }
    bytes *= match config.acceleration_method {
        AccelerationMethod::None => 1.0,
        AccelerationMethod::FlashAttention2 => flash_attention_factor(config.sequence_length),
        AccelerationMethod::Unsloth => UNSLOTH_ACTIVATION_FACTOR,
    };
    bytes_to_gib(bytes)
}

/// Longer sequences benefit more from not materializing the score matrix.
fn flash_attention_factor(sequence_length: u32) -> f64 {
    match sequence_length {
        0..=2048 => 0.85,
        2049..=8192 => 0.80,
        _ => 0.70,
    }
}

/// Memory summed over all data-parallel ranks. Sharded components already
/// carry their per-rank share.
fn replicated_total(c: &Components, stage: Option<ZeroStage>, dp: f64, overhead: f64) -> f64 {
    let weights = if stage.is_some_and(ZeroStage::shards_weights) {
        c.weights_gb / dp
    } else {
        c.weights_gb * dp
    };
    let optimizer = if stage.is_some_and(ZeroStage::shards_optimizer) {
        c.optimizer_gb
    } else {
        c.optimizer_gb * dp
    };
    let gradients = if stage.is_some_and(ZeroStage::shards_gradients) {
        c.gradients_gb
    } else {
        c.gradients_gb * dp
    };
    weights + c.activations_gb + optimizer + gradients + overhead * dp
}

/// Memory held by one rank. Each rank only processes its slice of the batch.
fn per_device(c: &Components, stage: Option<ZeroStage>, dp: f64, overhead: f64) -> f64 {
    let weights = if stage.is_some_and(ZeroStage::shards_weights) {
        c.weights_gb / dp
    } else {
        c.weights_gb
    };
    weights + c.activations_gb / dp + c.optimizer_gb + c.gradients_gb + overhead
}

fn tokens_per_second(model: &ModelDescriptor, config: &TrainingConfig) -> f64 {
    let size_factor = match model.parameters {
        p if p > 70_000_000_000 => 0.05,
        p if p > 30_000_000_000 => 0.15,
        p if p > 13_000_000_000 => 0.3,
        p if p > 7_000_000_000 => 0.5,
        _ => 0.8,
    };
    let method_factor = match config.training_method {
        TrainingMethod::Lora => LORA_SPEEDUP,
        TrainingMethod::FullFinetuning => 1.0,
    };
    let seq_factor = f64::from(config.sequence_length.min(2048)) / 2048.0;
    let batch_factor = f64::from(config.batch_size.min(32)) / 8.0;
    let dp = f64::from(config.data_parallel);
    let parallel_factor = DATA_PARALLEL_EFFICIENCY.powf(dp - 1.0) * dp;

    let speed =
        BASE_TOKENS_PER_SECOND * size_factor * method_factor * seq_factor * batch_factor
            * parallel_factor;
    speed.max(MIN_TOKENS_PER_SECOND)
}

fn advise(
    model: &ModelDescriptor,
    config: &TrainingConfig,
    total_gb: f64,
    per_device_gb: f64,
) -> Advisories {
    let mut advisories = Advisories::new();

    if per_device_gb > REFERENCE_DEVICE_MEMORY_GB {
        advisories.push(Finding::PerDeviceMemoryExceedsDevice { per_device_gb });
    } else if total_gb > REFERENCE_DEVICE_MEMORY_GB && config.data_parallel == 1 {
        advisories.push(Finding::TotalMemoryExceedsSingleDevice { total_gb });
    }

    if config.data_parallel > 1 {
        advisories.push(match config.active_zero_stage() {
            None => Finding::ShardingDisabled { per_device_gb },
            Some(stage) => Finding::ShardingEnabled {
                stage,
                per_device_gb,
            },
        });
    }

    if config.training_method == TrainingMethod::FullFinetuning
        && model.parameters > FULL_FINETUNE_ADVISORY_PARAMS
    {
        advisories.push(Finding::FullFineTuneOnLargeModel {
            parameters: model.parameters,
        });
    }

    if config.batch_size > LARGE_BATCH_THRESHOLD {
        advisories.push(Finding::LargeBatch {
            batch_size: config.batch_size,
        });
    }

    advisories
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::advisory::AdvisoryCategory;
    use crate::gpu::GpuTable;
    use crate::training::config::LoraConfig;

    fn lora_scenario() -> TrainingConfig {
        TrainingConfig {
            batch_size: 8,
            sequence_length: 2048,
            gradient_accumulation_steps: 4,
            gradient_checkpointing: true,
            lora_config: Some(LoraConfig::default()),
            ..TrainingConfig::for_model("llama-7b", TrainingMethod::Lora)
        }
    }

    fn estimate(config: &TrainingConfig) -> Result<TrainingEstimate, CoreError> {
        let catalog = ModelCatalog::with_seed_models();
        let gpus = GpuTable::builtin();
        TrainingEstimator::new(&catalog, &gpus).estimate(config)
    }

    #[test]
    fn llama_7b_lora_fits_one_device() {
        let est = estimate(&lora_scenario()).unwrap();

        assert_eq!(est.resources.min_gpu_count, 1);
        assert_eq!(est.resources.optimal_gpu_count, 1);
        assert_eq!(est.effective_batch_size, 32);
        assert_eq!(est.memory_breakdown.lora_parameters, Some(14_680_064));
        assert_eq!(est.memory_breakdown.trainable_parameters, 14_680_064);
        // 68 GiB of raw activations, 30% retained.
        assert!((est.resources.activation_memory_gb - 20.4).abs() < 1e-9);
        assert!(est.resources.total_memory_gb < 80.0);
        assert_eq!(est.resources.framework_overhead_gb, 1.0);
        assert_eq!(est.resources.recommended_gpus.len(), 5);
        assert!(est
            .resources
            .recommended_gpus
            .iter()
            .all(|g| g.memory_gb >= est.memory_per_gpu_gb));
        assert!(est.advisories.is_empty());
    }

    #[test]
    fn single_rank_per_device_equals_total() {
        let est = estimate(&lora_scenario()).unwrap();
        assert!((est.memory_per_gpu_gb - est.resources.total_memory_gb).abs() < 1e-9);
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let config = lora_scenario();
        assert_eq!(estimate(&config).unwrap(), estimate(&config).unwrap());
    }

    #[test]
    fn sharding_monotonically_reduces_per_device_memory() {
        let mut config = TrainingConfig::for_model("llama2-13b", TrainingMethod::FullFinetuning);
        config.data_parallel = 4;
        config.batch_size = 4;

        let stages = [
            None,
            Some(ZeroStage::Stage1),
            Some(ZeroStage::Stage2),
            Some(ZeroStage::Stage3),
        ];
        let per_device: Vec<f64> = stages
            .into_iter()
            .map(|stage| {
                config.deepspeed_stage = stage;
                estimate(&config).unwrap().memory_per_gpu_gb
            })
            .collect();

        for pair in per_device.windows(2) {
            assert!(pair[1] < pair[0], "{per_device:?}");
        }
    }

    #[test]
    fn sharding_changes_replicated_total() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::FullFinetuning);
        config.data_parallel = 4;

        // Weights 13.04, AdamW state 26.08, gradients 13.04, activations 8.5 GiB.
        let expected = [
            (None, 221.116),
            (Some(ZeroStage::Stage1), 123.327),
            (Some(ZeroStage::Stage2), 74.433),
            (Some(ZeroStage::Stage3), 25.539),
        ];
        for (stage, total) in expected {
            config.deepspeed_stage = stage;
            let est = estimate(&config).unwrap();
            assert!(
                (est.resources.total_memory_gb - total).abs() < 1e-3,
                "{stage:?}: {}",
                est.resources.total_memory_gb
            );

            let weights = if stage == Some(ZeroStage::Stage3) {
                est.resources.model_memory_gb / 4.0
            } else {
                est.resources.model_memory_gb * 4.0
            };
            let optimizer = est.resources.optimizer_memory_gb.unwrap();
            let gradients = est.resources.gradient_memory_gb.unwrap();
            let optimizer_total = if stage.is_some() { optimizer } else { optimizer * 4.0 };
            let gradients_total = if stage >= Some(ZeroStage::Stage2) {
                gradients
            } else {
                gradients * 4.0
            };
            let from_components = weights
                + est.resources.activation_memory_gb
                + optimizer_total
                + gradients_total
                + est.resources.framework_overhead_gb * 4.0;
            assert!((est.resources.total_memory_gb - from_components).abs() < 1e-9);
        }
    }

    #[test]
    fn oversized_accumulation_does_not_overflow() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::Lora);
        config.batch_size = 1024;
        config.gradient_accumulation_steps = 4_194_304;
        config.data_parallel = u32::MAX;

        let est = estimate(&config).unwrap();
        assert_eq!(
            est.effective_batch_size,
            1024 * 4_194_304 * u64::from(u32::MAX)
        );
        assert_eq!(est.resources.optimal_gpu_count, u32::MAX);
        assert_eq!(est.estimated_tokens_per_second, 10.0);
    }

    #[test]
    fn stage_zero_matches_no_sharding() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::FullFinetuning);
        config.data_parallel = 2;
        let unsharded = estimate(&config).unwrap();
        config.deepspeed_stage = Some(ZeroStage::Stage0);
        let stage0 = estimate(&config).unwrap();
        assert_eq!(unsharded.memory_per_gpu_gb, stage0.memory_per_gpu_gb);
        assert_eq!(unsharded.resources.total_memory_gb, stage0.resources.total_memory_gb);
        assert_matches!(
            stage0.advisories.get(AdvisoryCategory::DeepspeedOptimization),
            [Finding::ShardingDisabled { .. }]
        );
    }

    #[test]
    fn full_finetune_counts_every_parameter() {
        let config = TrainingConfig::for_model("llama-7b", TrainingMethod::FullFinetuning);
        let est = estimate(&config).unwrap();
        assert_eq!(est.memory_breakdown.trainable_parameters, 7_000_000_000);
        assert_eq!(est.memory_breakdown.lora_parameters, None);
        // AdamW keeps two slots per parameter.
        let optimizer = est.resources.optimizer_memory_gb.unwrap();
        let gradients = est.resources.gradient_memory_gb.unwrap();
        assert!((optimizer - 2.0 * gradients).abs() < 1e-9);
    }

    #[test]
    fn sgd_halves_optimizer_state() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::FullFinetuning);
        let adam = estimate(&config).unwrap().resources.optimizer_memory_gb.unwrap();
        config.optimizer = crate::training::config::Optimizer::Sgd;
        let sgd = estimate(&config).unwrap().resources.optimizer_memory_gb.unwrap();
        assert!((adam - 2.0 * sgd).abs() < 1e-9);
    }

    #[test]
    fn accumulation_inflates_gradients() {
        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::FullFinetuning);
        let base = estimate(&config).unwrap().resources.gradient_memory_gb.unwrap();
        config.gradient_accumulation_steps = 4;
        let accumulated = estimate(&config).unwrap().resources.gradient_memory_gb.unwrap();
        let expected = (1.0 + 0.10 * (1.0 + 0.5 * 4f64.ln())) * 1.15;
        assert!((accumulated / base - expected).abs() < 1e-9);
    }

    #[test]
    fn flash_attention_tiers() {
        assert_eq!(flash_attention_factor(2048), 0.85);
        assert_eq!(flash_attention_factor(2049), 0.80);
        assert_eq!(flash_attention_factor(8192), 0.80);
        assert_eq!(flash_attention_factor(16384), 0.70);

        let mut config = TrainingConfig::for_model("llama-7b", TrainingMethod::Lora);
        let plain = estimate(&config).unwrap().resources.activation_memory_gb;
        config.acceleration_method = AccelerationMethod::FlashAttention2;
        let flash = estimate(&config).unwrap().resources.activation_memory_gb;
        config.acceleration_method = AccelerationMethod::Unsloth;
        let unsloth = estimate(&config).unwrap().resources.activation_memory_gb;
        assert!((flash / plain - 0.85).abs() < 1e-9);
        assert!((unsloth / plain - 0.25).abs() < 1e-9);
    }

    #[test]
    fn synthesized_model_is_estimated() {
        let config = TrainingConfig {
            model_id: None,
            parameters_billion: Some(7.0),
            ..TrainingConfig::for_model("", TrainingMethod::FullFinetuning)
        };
        let est = estimate(&config).unwrap();
        assert_eq!(est.model.id, "custom-7.0b");
        assert_eq!(est.model.family, "custom");
    }

    #[test]
    fn throughput_scales_and_has_a_floor() {
        let config = lora_scenario();
        // 2000 * 0.8 * 1.5 * 1.0 * (8 / 8)
        assert!((estimate(&config).unwrap().estimated_tokens_per_second - 2400.0).abs() < 1e-9);

        let mut tiny = TrainingConfig::for_model("llama-70b", TrainingMethod::FullFinetuning);
        tiny.sequence_length = 128;
        // 2000 * 0.15 * (128 / 2048) * (1 / 8) is about 2.3, floored.
        assert_eq!(estimate(&tiny).unwrap().estimated_tokens_per_second, 10.0);
    }

    #[test]
    fn large_full_finetune_raises_advisories() {
        let mut config = TrainingConfig::for_model("llama-70b", TrainingMethod::FullFinetuning);
        config.batch_size = 64;
        let est = estimate(&config).unwrap();

        assert!(est.resources.min_gpu_count > 1);
        assert!(est.advisories.contains(AdvisoryCategory::MemoryOptimization));
        assert!(est.advisories.contains(AdvisoryCategory::TrainingMethod));
        assert_matches!(
            est.advisories.get(AdvisoryCategory::BatchSize),
            [Finding::LargeBatch { batch_size: 64 }]
        );
        assert!(!est.advisories.contains(AdvisoryCategory::DeepspeedOptimization));
    }

    #[test]
    fn unknown_model_is_not_found() {
        let config = TrainingConfig::for_model("llama-9000b", TrainingMethod::Lora);
        assert_matches!(
            estimate(&config),
            Err(CoreError::NotFound { entity: "Model", .. })
        );
    }

    #[test]
    fn missing_model_source_is_a_configuration_error() {
        let config = TrainingConfig {
            model_id: None,
            ..TrainingConfig::for_model("", TrainingMethod::Lora)
        };
        assert_matches!(estimate(&config), Err(CoreError::Configuration(_)));
    }
}
