//! Static option lists describing the accepted request values.
//!
//! Ids match the wire names of the corresponding `gpuplan_core` enums.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct OptionInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

const fn opt(id: &'static str, name: &'static str, description: &'static str) -> OptionInfo {
    OptionInfo {
        id,
        name,
        description,
    }
}

#[derive(Debug, Serialize)]
pub struct TrainingOptions {
    pub training_methods: &'static [OptionInfo],
    pub precision_types: &'static [OptionInfo],
    pub optimizers: &'static [OptionInfo],
    pub deepspeed_stages: &'static [OptionInfo],
    pub acceleration_methods: &'static [OptionInfo],
}

pub static TRAINING_OPTIONS: TrainingOptions = TrainingOptions {
    training_methods: &[
        opt(
            "full_finetuning",
            "Full fine-tuning",
            "Trains every parameter; best quality, highest cost",
        ),
        opt(
            "lora",
            "LoRA",
            "Trains low-rank adapters only; close to full fine-tuning at a fraction of the memory",
        ),
    ],
    precision_types: PRECISION_TYPES,
    optimizers: &[
        opt("adamw", "AdamW", "Adam with decoupled weight decay"),
        opt("sgd", "SGD", "Stochastic gradient descent"),
        opt("adam", "Adam", "Adaptive moment estimation"),
    ],
    deepspeed_stages: &[
        opt("stage0", "Stage 0", "No memory sharding"),
        opt("stage1", "Stage 1", "Shards optimizer state"),
        opt("stage2", "Stage 2", "Shards optimizer state and gradients"),
        opt("stage3", "Stage 3", "Shards optimizer state, gradients and weights"),
    ],
    acceleration_methods: &[
        opt("none", "None", "Standard attention"),
        opt(
            "flash_attention_2",
            "FlashAttention-2",
            "Fused attention kernels; saves 15-30% activation memory",
        ),
        opt("unsloth", "Unsloth", "Memory-efficient single-GPU training kernels"),
    ],
};

const PRECISION_TYPES: &[OptionInfo] = &[
    opt("fp32", "FP32", "32-bit floating point"),
    opt("fp16", "FP16", "16-bit floating point"),
    opt("bf16", "BF16", "Brain floating point 16"),
];

#[derive(Debug, Serialize)]
pub struct BackendInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

#[derive(Debug, Serialize)]
pub struct InferenceOptions {
    pub backends: &'static [BackendInfo],
    pub quantization_methods: &'static [OptionInfo],
    pub precision_types: &'static [OptionInfo],
}

pub static INFERENCE_OPTIONS: InferenceOptions = InferenceOptions {
    backends: &[
        BackendInfo {
            id: "vllm",
            name: "vLLM",
            description: "High-throughput LLM serving engine",
            features: &["High throughput", "PagedAttention", "Continuous batching"],
        },
        BackendInfo {
            id: "transformers",
            name: "Transformers",
            description: "Hugging Face Transformers",
            features: &["Broad model support", "Active community", "Easy integration"],
        },
    ],
    quantization_methods: &[
        opt("none", "None", "Original precision"),
        opt("int8", "INT8", "8-bit integer quantization"),
        opt("int4", "INT4", "4-bit integer quantization"),
        opt("gptq", "GPTQ", "Post-training quantization for generative transformers"),
        opt("awq", "AWQ", "Activation-aware weight quantization"),
    ],
    precision_types: PRECISION_TYPES,
};
