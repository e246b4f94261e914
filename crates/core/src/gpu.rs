//! GPU hardware table and device recommendation.
//!
//! Estimators only hand over a per-device memory figure and copy the ranked
//! list into their result; they never interpret the hardware data.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Number of devices returned alongside an estimate.
pub const DEFAULT_RECOMMENDATION_COUNT: usize = 5;

/// Specification of a single GPU model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub memory_gb: f64,
    pub memory_bandwidth_gb_s: f64,
    pub compute_capability: String,
    #[serde(default)]
    pub fp16_tflops: Option<f64>,
}

impl GpuInfo {
    /// Tensor cores ship from compute capability 7.0 (Volta) onwards.
    pub fn has_tensor_cores(&self) -> bool {
        self.compute_capability
            .split_once('.')
            .and_then(|(major, _)| major.parse::<u32>().ok())
            .is_some_and(|major| major >= 7)
    }
}

/// What the recommended devices will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageContext {
    Training,
    Inference,
}

/// Source of ranked hardware suggestions for a memory requirement.
pub trait GpuRecommender: Send + Sync {
    fn recommend(
        &self,
        required_memory_gb: f64,
        max_results: usize,
        usage: UsageContext,
    ) -> Vec<GpuInfo>;
}

/// Recommender backed by a static list of GPU specifications.
#[derive(Debug, Clone)]
pub struct GpuTable {
    gpus: Vec<GpuInfo>,
}

impl GpuTable {
    pub fn new(gpus: Vec<GpuInfo>) -> Self {
        Self { gpus }
    }

    /// Parse a JSON array of [`GpuInfo`] records.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let gpus: Vec<GpuInfo> = serde_json::from_str(json)
            .map_err(|e| CoreError::Configuration(format!("Invalid GPU table: {e}")))?;
        if gpus.is_empty() {
            return Err(CoreError::Configuration(
                "GPU table must contain at least one entry".to_string(),
            ));
        }
        Ok(Self::new(gpus))
    }

    /// Datacenter and workstation cards commonly used for LLM work.
    pub fn builtin() -> Self {
        #[rustfmt::skip]
        let specs: [(&str, f64, f64, &str, f64); 12] = [
            ("NVIDIA H200", 141.0, 4800.0, "9.0", 989.5),
            ("NVIDIA H100 SXM", 80.0, 3350.0, "9.0", 989.5),
            ("NVIDIA H100 PCIe", 80.0, 2000.0, "9.0", 756.0),
            ("NVIDIA A100 80GB", 80.0, 2039.0, "8.0", 312.0),
            ("NVIDIA A100 40GB", 40.0, 1555.0, "8.0", 312.0),
            ("NVIDIA L40S", 48.0, 864.0, "8.9", 362.0),
            ("NVIDIA RTX A6000", 48.0, 768.0, "8.6", 154.8),
            ("NVIDIA RTX 4090", 24.0, 1008.0, "8.9", 165.2),
            ("NVIDIA A10", 24.0, 600.0, "8.6", 125.0),
            ("NVIDIA L4", 24.0, 300.0, "8.9", 121.0),
            ("NVIDIA V100 32GB", 32.0, 900.0, "7.0", 125.0),
            ("NVIDIA T4", 16.0, 320.0, "7.5", 65.0),
        ];

        let gpus = specs
            .into_iter()
            .map(|(name, memory_gb, bandwidth, cc, tflops)| GpuInfo {
                name: name.to_string(),
                memory_gb,
                memory_bandwidth_gb_s: bandwidth,
                compute_capability: cc.to_string(),
                fp16_tflops: Some(tflops),
            })
            .collect();
        Self::new(gpus)
    }

    pub fn gpus(&self) -> &[GpuInfo] {
        &self.gpus
    }
}

impl Default for GpuTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GpuRecommender for GpuTable {
    /// Rank devices whose memory covers the requirement, smallest sufficient
    /// card first. Ties go to bandwidth for inference (decode is bandwidth
    /// bound) and to FP16 throughput for training. When no single card fits,
    /// the largest cards are returned since the job must be split anyway.
    fn recommend(
        &self,
        required_memory_gb: f64,
        max_results: usize,
        usage: UsageContext,
    ) -> Vec<GpuInfo> {
        let tie_break = |a: &GpuInfo, b: &GpuInfo| match usage {
            UsageContext::Inference => b
                .memory_bandwidth_gb_s
                .total_cmp(&a.memory_bandwidth_gb_s),
            UsageContext::Training => b
                .fp16_tflops
                .unwrap_or(0.0)
                .total_cmp(&a.fp16_tflops.unwrap_or(0.0)),
        };

        let mut fitting: Vec<&GpuInfo> = self
            .gpus
            .iter()
            .filter(|g| g.memory_gb >= required_memory_gb)
            .collect();

        if fitting.is_empty() {
            let mut largest: Vec<&GpuInfo> = self.gpus.iter().collect();
            largest.sort_by(|a, b| match b.memory_gb.total_cmp(&a.memory_gb) {
                Ordering::Equal => tie_break(*a, *b),
                other => other,
            });
            return largest.into_iter().take(max_results).cloned().collect();
        }

        fitting.sort_by(|a, b| match a.memory_gb.total_cmp(&b.memory_gb) {
            Ordering::Equal => tie_break(*a, *b),
            other => other,
        });
        fitting.into_iter().take(max_results).cloned().collect()
    }
}
