//! Shared memory-accounting primitives used by both estimators.
//!
//! All figures are reported in GiB (2^30 bytes) even though field names say
//! `_gb`, matching the convention of the published estimates.

use serde::{Deserialize, Serialize};

use crate::catalog::ModelDescriptor;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Bytes per GiB.
pub const BYTES_PER_GIB: f64 = 1_073_741_824.0;

/// Capacity of the reference device used for device-count arithmetic.
pub const REFERENCE_DEVICE_MEMORY_GB: f64 = 80.0;

// ---------------------------------------------------------------------------
// Precision
// ---------------------------------------------------------------------------

/// Numeric precision used for weights, activations and optimizer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Fp32,
    #[default]
    Fp16,
    Bf16,
}

impl Precision {
    /// Storage width of a single element.
    pub fn byte_width(self) -> u64 {
        match self {
            Self::Fp32 => 4,
            Self::Fp16 | Self::Bf16 => 2,
        }
    }

    /// Wire tag, e.g. `"bf16"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fp32 => "fp32",
            Self::Fp16 => "fp16",
            Self::Bf16 => "bf16",
        }
    }
}

// ---------------------------------------------------------------------------
// Framework overhead
// ---------------------------------------------------------------------------

/// Runtime framework whose fixed per-device footprint is added to totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framework {
    Pytorch,
    Transformers,
    Fsdp,
    Deepspeed,
}

impl Framework {
    /// Fixed per-device overhead in GiB. Always added, never multiplied.
    pub fn overhead_gib(self) -> f64 {
        match self {
            Self::Pytorch => 1.0,
            Self::Transformers => 1.2,
            Self::Fsdp => 1.8,
            Self::Deepspeed => 2.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversions and formulas
// ---------------------------------------------------------------------------

/// Convert a byte count to GiB.
pub fn bytes_to_gib(bytes: f64) -> f64 {
    bytes / BYTES_PER_GIB
}

/// Memory needed to hold every parameter of `model` at `precision`.
pub fn weight_memory_gib(model: &ModelDescriptor, precision: Precision) -> f64 {
    bytes_to_gib(model.parameters as f64 * precision.byte_width() as f64)
}

/// Devices of reference capacity needed to hold `total_gb`, at least one.
pub fn min_device_count(total_gb: f64) -> u32 {
    ((total_gb / REFERENCE_DEVICE_MEMORY_GB).ceil() as u32).max(1)
}

/// Bytes held by per-layer hidden states plus the attention score matrices,
/// the latter being the O(seq_len^2) term that dominates at long context.
pub fn activation_bytes(
    model: &ModelDescriptor,
    batch_size: u32,
    sequence_length: u32,
    byte_width: u64,
) -> f64 {
    let batch = f64::from(batch_size);
    let seq = f64::from(sequence_length);
    let width = byte_width as f64;
    let layers = f64::from(model.num_layers);

    let hidden_states = batch * seq * f64::from(model.hidden_size) * layers * width;
    let attention_scores = batch * f64::from(model.num_heads) * seq * seq * layers * width;
    hidden_states + attention_scores
}
