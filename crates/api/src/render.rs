//! Human-readable rendering of estimator advisories.

use std::collections::BTreeMap;

use gpuplan_core::advisory::{Advisories, Finding};
use gpuplan_core::training::ZeroStage;

/// Advisory text grouped by category wire name.
pub type Recommendations = BTreeMap<&'static str, Vec<String>>;

pub fn render_advisories(advisories: &Advisories) -> Recommendations {
    advisories
        .iter()
        .map(|(category, findings)| {
            let lines = findings.iter().flat_map(render_finding).collect();
            (category.as_str(), lines)
        })
        .collect()
}

fn billions(parameters: u64) -> f64 {
    parameters as f64 / 1e9
}

fn stage_label(stage: ZeroStage) -> &'static str {
    match stage {
        ZeroStage::Stage0 => "Stage 0",
        ZeroStage::Stage1 => "Stage 1",
        ZeroStage::Stage2 => "Stage 2",
        ZeroStage::Stage3 => "Stage 3",
    }
}

pub fn render_finding(finding: &Finding) -> Vec<String> {
    match finding {
        Finding::PerDeviceMemoryExceedsDevice { per_device_gb } => vec![
            format!(
                "Each device needs {per_device_gb:.1} GB; add devices or enable DeepSpeed"
            ),
            "ZeRO Stage 3 shards model weights for deeper savings".to_string(),
            "Enable gradient_checkpointing to reduce activation memory".to_string(),
            "Consider parameter-efficient fine-tuning such as LoRA".to_string(),
        ],
        Finding::TotalMemoryExceedsSingleDevice { total_gb } => vec![
            format!("{total_gb:.1} GB will not fit one device; train on multiple GPUs"),
            "Or switch to parameter-efficient fine-tuning such as LoRA".to_string(),
            "gradient_checkpointing cuts activation memory by 30-70%".to_string(),
        ],
        Finding::ShardingDisabled { per_device_gb } => vec![
            format!(
                "Multi-GPU training without DeepSpeed needs {per_device_gb:.1} GB per device"
            ),
            "Enable DeepSpeed ZeRO to cut per-device memory".to_string(),
            "Stage 2 shards optimizer state and gradients; Stage 3 also shards weights"
                .to_string(),
        ],
        Finding::ShardingEnabled {
            stage,
            per_device_gb,
        } => vec![
            format!("DeepSpeed ZeRO {} enabled", stage_label(*stage)),
            format!("Per-device memory reduced to {per_device_gb:.1} GB"),
            "Adjust the stage to match observed memory use".to_string(),
        ],
        Finding::FullFineTuneOnLargeModel { parameters } => vec![
            format!(
                "Full fine-tuning a {:.1}B model is expensive; consider LoRA or QLoRA",
                billions(*parameters)
            ),
            "Full fine-tuning may need many GPUs".to_string(),
        ],
        Finding::LargeBatch { batch_size } => vec![
            format!(
                "Batch size {batch_size} is large; lower it and raise gradient_accumulation_steps"
            ),
            "Large batches risk running out of device memory".to_string(),
        ],
        Finding::UnquantizedLargeModel { parameters } => vec![
            format!(
                "Serving {:.1}B parameters unquantized; INT4 or GPTQ would cut weight memory",
                billions(*parameters)
            ),
            "Quantization also improves throughput and concurrency".to_string(),
        ],
        Finding::GenericRuntimeForLargeModel { parameters } => vec![
            format!(
                "vLLM serves {:.1}B-parameter models faster than Transformers",
                billions(*parameters)
            ),
            "vLLM manages KV-cache memory more efficiently at this size".to_string(),
        ],
        Finding::SingleDeviceOverCapacity { total_gb } => vec![
            format!("{total_gb:.1} GB exceeds one device; use tensor parallelism"),
            "Multi-GPU deployment raises throughput and lowers latency".to_string(),
        ],
        Finding::ExceedsDeviceCountLimit { required, limit } => vec![format!(
            "Needs at least {required} GPUs but the limit is {limit}; quantize or shorten sequences"
        )],
        Finding::ExceedsDeviceMemoryLimit {
            per_device_gb,
            limit_gb,
        } => vec![format!(
            "Each device needs {per_device_gb:.1} GB, above the {limit_gb:.1} GB limit; raise tensor_parallel or quantize"
        )],
        Finding::ThroughputBelowTarget { estimated, target } => vec![format!(
            "Estimated {estimated:.0} tokens/s is below the {target:.0} tokens/s target; add devices or quantize"
        )],
        Finding::LatencyAboveTarget {
            estimated_ms,
            target_ms,
        } => vec![format!(
            "Estimated p50 latency {estimated_ms:.0} ms exceeds the {target_ms:.0} ms target; reduce batch size or use vLLM"
        )],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_grouped_text() {
        let mut advisories = Advisories::new();
        advisories.push(Finding::LargeBatch { batch_size: 64 });
        advisories.push(Finding::ShardingEnabled {
            stage: ZeroStage::Stage3,
            per_device_gb: 21.34,
        });

        let text = render_advisories(&advisories);
        assert_eq!(text.len(), 2);
        assert!(text["batch_size"][0].contains("64"));
        assert_eq!(text["deepspeed_optimization"][0], "DeepSpeed ZeRO Stage 3 enabled");
        assert!(text["deepspeed_optimization"][1].contains("21.3"));
    }

    #[test]
    fn every_finding_renders_at_least_one_line() {
        let findings = [
            Finding::PerDeviceMemoryExceedsDevice { per_device_gb: 90.0 },
            Finding::TotalMemoryExceedsSingleDevice { total_gb: 90.0 },
            Finding::ShardingDisabled { per_device_gb: 40.0 },
            Finding::FullFineTuneOnLargeModel { parameters: 70_000_000_000 },
            Finding::UnquantizedLargeModel { parameters: 13_000_000_000 },
            Finding::GenericRuntimeForLargeModel { parameters: 13_000_000_000 },
            Finding::SingleDeviceOverCapacity { total_gb: 150.0 },
            Finding::ExceedsDeviceCountLimit { required: 4, limit: 2 },
            Finding::ExceedsDeviceMemoryLimit { per_device_gb: 30.0, limit_gb: 24.0 },
            Finding::ThroughputBelowTarget { estimated: 100.0, target: 500.0 },
            Finding::LatencyAboveTarget { estimated_ms: 400.0, target_ms: 100.0 },
        ];
        for finding in &findings {
            assert!(!render_finding(finding).is_empty(), "{finding:?}");
        }
    }
}
