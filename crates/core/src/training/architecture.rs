//! Descriptor resolution and adapter sizing for training estimates.

use std::borrow::Cow;

use crate::catalog::{ModelCatalog, ModelDescriptor};
use crate::error::CoreError;
use crate::memory::Precision;

use super::config::{LoraConfig, ModelSource, DEFAULT_LORA_TARGET};

/// Linear projections adapted by `"all-linear"` (q, k, v, o, gate, up, down).
const ALL_LINEAR_MODULES: u64 = 7;

/// Module count assumed when no usable target list is given (roughly the
/// attention projections).
const FALLBACK_MODULES: u64 = 4;

/// Architecture shape for a parameter band, keyed by inclusive upper bound in
/// billions.
struct Band {
    max_billions: f64,
    hidden_size: u32,
    num_layers: u32,
    num_heads: u32,
}

#[rustfmt::skip]
const BANDS: [Band; 6] = [
    Band { max_billions: 1.0, hidden_size: 1024, num_layers: 12, num_heads: 16 },
    Band { max_billions: 3.0, hidden_size: 2048, num_layers: 24, num_heads: 16 },
    Band { max_billions: 7.0, hidden_size: 4096, num_layers: 32, num_heads: 32 },
    Band { max_billions: 13.0, hidden_size: 5120, num_layers: 40, num_heads: 40 },
    Band { max_billions: 30.0, hidden_size: 6656, num_layers: 60, num_heads: 52 },
    Band { max_billions: 70.0, hidden_size: 8192, num_layers: 80, num_heads: 64 },
];

/// Shape used above the last band.
const LARGEST_SHAPE: (u32, u32, u32) = (12288, 96, 96);

/// Build a plausible transformer descriptor from a parameter count alone.
pub fn synthesize_descriptor(parameters_billion: f64) -> ModelDescriptor {
    let (hidden_size, num_layers, num_heads) = BANDS
        .iter()
        .find(|band| parameters_billion <= band.max_billions)
        .map(|band| (band.hidden_size, band.num_layers, band.num_heads))
        .unwrap_or(LARGEST_SHAPE);

    ModelDescriptor {
        id: format!("custom-{parameters_billion:?}b"),
        name: format!("Custom {parameters_billion:?}B"),
        family: "custom".to_string(),
        parameters: (parameters_billion * 1e9) as u64,
        hidden_size,
        num_layers,
        num_heads,
        vocab_size: 32000,
        context_length: 2048,
        architecture: "transformer".to_string(),
        precision: Precision::Fp16,
    }
}

/// Turn a model source into a descriptor, borrowing where possible.
pub fn resolve_descriptor<'a>(
    catalog: &'a ModelCatalog,
    source: ModelSource<'a>,
) -> Result<Cow<'a, ModelDescriptor>, CoreError> {
    match source {
        ModelSource::Catalog(id) => catalog.lookup(id).map(Cow::Borrowed),
        ModelSource::Parameters(billions) => Ok(Cow::Owned(synthesize_descriptor(billions))),
        ModelSource::Custom(descriptor) => {
            descriptor.validate()?;
            Ok(Cow::Borrowed(descriptor))
        }
    }
}

/// Number of linear modules per layer that receive an adapter.
pub fn adapted_module_count(target_modules: Option<&str>) -> u64 {
    match target_modules.map(str::trim) {
        Some(DEFAULT_LORA_TARGET) => ALL_LINEAR_MODULES,
        Some(list) => {
            let count = list.split(',').filter(|m| !m.trim().is_empty()).count() as u64;
            if count == 0 {
                FALLBACK_MODULES
            } else {
                count
            }
        }
        None => FALLBACK_MODULES,
    }
}

/// Trainable adapter parameters: an `A` and `B` matrix of `rank x hidden`
/// per adapted module per layer.
pub fn lora_parameter_count(model: &ModelDescriptor, lora: &LoraConfig) -> u64 {
    let modules = adapted_module_count(lora.target_modules.as_deref());
    u64::from(model.num_layers) * modules * u64::from(lora.rank) * 2 * u64::from(model.hidden_size)
}
