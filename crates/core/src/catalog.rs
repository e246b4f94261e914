//! Model catalog: architecture descriptors keyed by model id.
//!
//! The catalog is a plain owned value. Callers that share it across threads
//! wrap it in a lock (the HTTP service uses `Arc<RwLock<ModelCatalog>>`), so
//! mutation is serialized against readers without any process-wide state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::memory::Precision;

/// Entity name used in `CoreError::NotFound` for catalog misses.
pub const ENTITY_MODEL: &str = "Model";

// ---------------------------------------------------------------------------
// Size category
// ---------------------------------------------------------------------------

/// Coarse size bucket derived from the parameter count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    Xlarge,
}

impl SizeCategory {
    /// `< 1e9` small, `< 1e10` medium, `< 1e11` large, otherwise xlarge.
    pub fn from_parameters(parameters: u64) -> Self {
        if parameters < 1_000_000_000 {
            Self::Small
        } else if parameters < 10_000_000_000 {
            Self::Medium
        } else if parameters < 100_000_000_000 {
            Self::Large
        } else {
            Self::Xlarge
        }
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Architecture description of a transformer model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub family: String,
    pub parameters: u64,
    pub hidden_size: u32,
    pub num_layers: u32,
    pub num_heads: u32,
    pub vocab_size: u32,
    pub context_length: u32,
    pub architecture: String,
    #[serde(default)]
    pub precision: Precision,
}

impl ModelDescriptor {
    pub fn size_category(&self) -> SizeCategory {
        SizeCategory::from_parameters(self.parameters)
    }

    /// Per-head dimension. Requires `hidden_size` to divide evenly.
    pub fn head_dim(&self) -> Result<u32, CoreError> {
        if self.num_heads == 0 || self.hidden_size % self.num_heads != 0 {
            return Err(CoreError::Configuration(format!(
                "Model '{}': hidden_size {} is not divisible by num_heads {}",
                self.id, self.hidden_size, self.num_heads
            )));
        }
        Ok(self.hidden_size / self.num_heads)
    }

    /// Reject descriptors the estimators cannot reason about.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::Configuration(
                "Model id must not be empty".to_string(),
            ));
        }
        if self.parameters == 0 {
            return Err(CoreError::Configuration(format!(
                "Model '{}': parameter count must be greater than 0",
                self.id
            )));
        }
        if self.hidden_size == 0 || self.num_layers == 0 {
            return Err(CoreError::Configuration(format!(
                "Model '{}': hidden_size and num_layers must be greater than 0",
                self.id
            )));
        }
        self.head_dim().map(|_| ())
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            family: self.family.clone(),
            parameters: self.parameters,
            size_category: self.size_category(),
            context_length: self.context_length,
            architecture: self.architecture.clone(),
        }
    }
}

/// Listing record for catalog browsing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub family: String,
    pub parameters: u64,
    pub size_category: SizeCategory,
    pub context_length: u32,
    pub architecture: String,
}

// ---------------------------------------------------------------------------
// Seed data
// ---------------------------------------------------------------------------

struct SeedModel {
    id: &'static str,
    name: &'static str,
    family: &'static str,
    parameters: u64,
    hidden_size: u32,
    num_layers: u32,
    num_heads: u32,
    vocab_size: u32,
    context_length: u32,
    architecture: &'static str,
}

#[rustfmt::skip]
const SEED_MODELS: &[SeedModel] = &[
    SeedModel { id: "llama-7b", name: "LLaMA 7B", family: "llama", parameters: 7_000_000_000, hidden_size: 4096, num_layers: 32, num_heads: 32, vocab_size: 32_000, context_length: 2048, architecture: "llama" },
    SeedModel { id: "llama-13b", name: "LLaMA 13B", family: "llama", parameters: 13_000_000_000, hidden_size: 5120, num_layers: 40, num_heads: 40, vocab_size: 32_000, context_length: 2048, architecture: "llama" },
    SeedModel { id: "llama-70b", name: "LLaMA 70B", family: "llama", parameters: 70_000_000_000, hidden_size: 8192, num_layers: 80, num_heads: 64, vocab_size: 32_000, context_length: 2048, architecture: "llama" },
    SeedModel { id: "llama2-7b", name: "LLaMA 2 7B", family: "llama", parameters: 7_000_000_000, hidden_size: 4096, num_layers: 32, num_heads: 32, vocab_size: 32_000, context_length: 4096, architecture: "llama" },
    SeedModel { id: "llama2-13b", name: "LLaMA 2 13B", family: "llama", parameters: 13_000_000_000, hidden_size: 5120, num_layers: 40, num_heads: 40, vocab_size: 32_000, context_length: 4096, architecture: "llama" },
    SeedModel { id: "llama2-70b", name: "LLaMA 2 70B", family: "llama", parameters: 70_000_000_000, hidden_size: 8192, num_layers: 80, num_heads: 64, vocab_size: 32_000, context_length: 4096, architecture: "llama" },
    SeedModel { id: "qwen-7b", name: "Qwen 7B", family: "qwen", parameters: 7_720_000_000, hidden_size: 4096, num_layers: 32, num_heads: 32, vocab_size: 151_936, context_length: 8192, architecture: "qwen" },
    SeedModel { id: "qwen-14b", name: "Qwen 14B", family: "qwen", parameters: 14_700_000_000, hidden_size: 5120, num_layers: 40, num_heads: 40, vocab_size: 151_936, context_length: 8192, architecture: "qwen" },
    SeedModel { id: "qwen-72b", name: "Qwen 72B", family: "qwen", parameters: 72_700_000_000, hidden_size: 8192, num_layers: 80, num_heads: 64, vocab_size: 151_936, context_length: 32_768, architecture: "qwen" },
    SeedModel { id: "qwen2-7b", name: "Qwen2 7B", family: "qwen", parameters: 7_720_000_000, hidden_size: 4096, num_layers: 28, num_heads: 32, vocab_size: 151_936, context_length: 131_072, architecture: "qwen" },
    SeedModel { id: "qwen2-72b", name: "Qwen2 72B", family: "qwen", parameters: 72_700_000_000, hidden_size: 8192, num_layers: 80, num_heads: 64, vocab_size: 151_936, context_length: 131_072, architecture: "qwen" },
    SeedModel { id: "mistral-7b", name: "Mistral 7B", family: "mistral", parameters: 7_200_000_000, hidden_size: 4096, num_layers: 32, num_heads: 32, vocab_size: 32_000, context_length: 32_768, architecture: "mistral" },
    SeedModel { id: "mixtral-8x7b", name: "Mixtral 8x7B", family: "mistral", parameters: 46_700_000_000, hidden_size: 4096, num_layers: 32, num_heads: 32, vocab_size: 32_000, context_length: 32_768, architecture: "mixtral" },
    SeedModel { id: "chatglm-6b", name: "ChatGLM 6B", family: "chatglm", parameters: 6_200_000_000, hidden_size: 4096, num_layers: 28, num_heads: 32, vocab_size: 130_528, context_length: 2048, architecture: "chatglm" },
    SeedModel { id: "baichuan-7b", name: "Baichuan 7B", family: "baichuan", parameters: 7_000_000_000, hidden_size: 4096, num_layers: 32, num_heads: 32, vocab_size: 64_000, context_length: 4096, architecture: "baichuan" },
];

impl From<&SeedModel> for ModelDescriptor {
    fn from(seed: &SeedModel) -> Self {
        Self {
            id: seed.id.to_string(),
            name: seed.name.to_string(),
            family: seed.family.to_string(),
            parameters: seed.parameters,
            hidden_size: seed.hidden_size,
            num_layers: seed.num_layers,
            num_heads: seed.num_heads,
            vocab_size: seed.vocab_size,
            context_length: seed.context_length,
            architecture: seed.architecture.to_string(),
            precision: Precision::Fp16,
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Registry of model descriptors keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog holding the built-in model set.
    pub fn with_seed_models() -> Self {
        let models = SEED_MODELS
            .iter()
            .map(|seed| (seed.id.to_string(), ModelDescriptor::from(seed)))
            .collect();
        Self { models }
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.models.contains_key(id)
    }

    /// Fetch a descriptor by id.
    pub fn lookup(&self, id: &str) -> Result<&ModelDescriptor, CoreError> {
        self.models.get(id).ok_or_else(|| CoreError::NotFound {
            entity: ENTITY_MODEL,
            id: id.to_string(),
        })
    }

    /// Summaries of every model, ordered by id.
    pub fn list(&self) -> Vec<ModelSummary> {
        self.models.values().map(ModelDescriptor::summary).collect()
    }

    pub fn list_by_family(&self, family: &str) -> Vec<&ModelDescriptor> {
        self.models
            .values()
            .filter(|m| m.family == family)
            .collect()
    }

    pub fn list_by_size(&self, category: SizeCategory) -> Vec<&ModelDescriptor> {
        self.models
            .values()
            .filter(|m| m.size_category() == category)
            .collect()
    }

    /// Add a new descriptor. Fails with `Conflict` when the id is taken.
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<(), CoreError> {
        descriptor.validate()?;
        if self.models.contains_key(&descriptor.id) {
            return Err(CoreError::Conflict(format!(
                "Model id '{}' already exists",
                descriptor.id
            )));
        }
        self.models.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    /// Replace the descriptor stored under `id`.
    ///
    /// The stored copy always carries `id` as its own id, whatever the
    /// incoming descriptor says.
    pub fn update(&mut self, id: &str, mut descriptor: ModelDescriptor) -> Result<(), CoreError> {
        let slot = self.models.get_mut(id).ok_or_else(|| CoreError::NotFound {
            entity: ENTITY_MODEL,
            id: id.to_string(),
        })?;
        descriptor.id = id.to_string();
        descriptor.validate()?;
        *slot = descriptor;
        Ok(())
    }

    /// Remove and return the descriptor stored under `id`.
    pub fn remove(&mut self, id: &str) -> Result<ModelDescriptor, CoreError> {
        self.models.remove(id).ok_or_else(|| CoreError::NotFound {
            entity: ENTITY_MODEL,
            id: id.to_string(),
        })
    }
}
