//! Threshold-driven advisories attached to estimates.
//!
//! Findings carry the numbers that triggered them and nothing else. Turning
//! them into prose is the job of the presentation layer.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::training::ZeroStage;

/// Grouping key for findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryCategory {
    MemoryOptimization,
    DeepspeedOptimization,
    TrainingMethod,
    BatchSize,
    Quantization,
    Backend,
    Parallelization,
    HardwareConstraints,
    PerformanceTargets,
}

impl AdvisoryCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemoryOptimization => "memory_optimization",
            Self::DeepspeedOptimization => "deepspeed_optimization",
            Self::TrainingMethod => "training_method",
            Self::BatchSize => "batch_size",
            Self::Quantization => "quantization",
            Self::Backend => "backend",
            Self::Parallelization => "parallelization",
            Self::HardwareConstraints => "hardware_constraints",
            Self::PerformanceTargets => "performance_targets",
        }
    }
}

/// A single triggered threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    // -- training --
    PerDeviceMemoryExceedsDevice { per_device_gb: f64 },
    TotalMemoryExceedsSingleDevice { total_gb: f64 },
    ShardingDisabled { per_device_gb: f64 },
    ShardingEnabled { stage: ZeroStage, per_device_gb: f64 },
    FullFineTuneOnLargeModel { parameters: u64 },
    LargeBatch { batch_size: u32 },

    // -- inference --
    UnquantizedLargeModel { parameters: u64 },
    GenericRuntimeForLargeModel { parameters: u64 },
    SingleDeviceOverCapacity { total_gb: f64 },
    ExceedsDeviceCountLimit { required: u32, limit: u32 },
    ExceedsDeviceMemoryLimit { per_device_gb: f64, limit_gb: f64 },
    ThroughputBelowTarget { estimated: f64, target: f64 },
    LatencyAboveTarget { estimated_ms: f64, target_ms: f64 },
}

impl Finding {
    pub fn category(&self) -> AdvisoryCategory {
        match self {
            Self::PerDeviceMemoryExceedsDevice { .. }
            | Self::TotalMemoryExceedsSingleDevice { .. } => AdvisoryCategory::MemoryOptimization,
            Self::ShardingDisabled { .. } | Self::ShardingEnabled { .. } => {
                AdvisoryCategory::DeepspeedOptimization
            }
            Self::FullFineTuneOnLargeModel { .. } => AdvisoryCategory::TrainingMethod,
            Self::LargeBatch { .. } => AdvisoryCategory::BatchSize,
            Self::UnquantizedLargeModel { .. } => AdvisoryCategory::Quantization,
            Self::GenericRuntimeForLargeModel { .. } => AdvisoryCategory::Backend,
            Self::SingleDeviceOverCapacity { .. } => AdvisoryCategory::Parallelization,
            Self::ExceedsDeviceCountLimit { .. } | Self::ExceedsDeviceMemoryLimit { .. } => {
                AdvisoryCategory::HardwareConstraints
            }
            Self::ThroughputBelowTarget { .. } | Self::LatencyAboveTarget { .. } => {
                AdvisoryCategory::PerformanceTargets
            }
        }
    }
}

/// Findings grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Advisories(BTreeMap<AdvisoryCategory, Vec<Finding>>);

impl Advisories {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.0.entry(finding.category()).or_default().push(finding);
    }

    pub fn get(&self, category: AdvisoryCategory) -> &[Finding] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, category: AdvisoryCategory) -> bool {
        self.0.contains_key(&category)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (AdvisoryCategory, &[Finding])> {
        self.0.iter().map(|(c, f)| (*c, f.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_group_by_category() {
        let mut advisories = Advisories::new();
        advisories.push(Finding::ShardingDisabled { per_device_gb: 90.0 });
        advisories.push(Finding::LargeBatch { batch_size: 64 });
        advisories.push(Finding::PerDeviceMemoryExceedsDevice { per_device_gb: 90.0 });

        assert_eq!(advisories.iter().count(), 3);
        assert_eq!(advisories.get(AdvisoryCategory::BatchSize).len(), 1);
        assert!(advisories.get(AdvisoryCategory::Quantization).is_empty());
        assert!(!advisories.contains(AdvisoryCategory::Backend));
    }

    #[test]
    fn serializes_as_category_map() {
        let mut advisories = Advisories::new();
        advisories.push(Finding::LargeBatch { batch_size: 64 });
        let json = serde_json::to_value(&advisories).unwrap();
        assert_eq!(json["batch_size"][0]["kind"], "large_batch");
        assert_eq!(json["batch_size"][0]["batch_size"], 64);
    }
}
