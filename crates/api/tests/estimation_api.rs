//! Integration tests for the training and inference estimation endpoints.

mod common;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use serde_json::json;

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

#[tokio::test]
async fn training_estimate_for_lora_llama_7b() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/training/estimate",
        json!({
            "model_id": "llama-7b",
            "training_method": "lora",
            "precision": "fp16",
            "batch_size": 8,
            "sequence_length": 2048,
            "gradient_accumulation_steps": 4,
            "optimizer": "adamw",
            "data_parallel": 1,
            "gradient_checkpointing": true,
            "lora_config": {"rank": 8, "alpha": 16, "target_modules": "all-linear"}
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];

    assert_eq!(data["min_gpu_count"], 1);
    assert_eq!(data["optimal_gpu_count"], 1);
    assert_eq!(data["effective_batch_size"], 32);
    assert_eq!(data["training_method"], "lora");
    assert_eq!(data["model"]["id"], "llama-7b");
    assert_eq!(data["memory_breakdown"]["lora_parameters"], 14_680_064);
    assert_eq!(data["framework_overhead_gb"], 1.0);
    assert_eq!(data["recommended_gpus"].as_array().unwrap().len(), 5);
    assert!(data["total_memory_gb"].as_f64().unwrap() < 80.0);
    assert!(data["recommendations"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn training_estimate_from_parameter_count() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/training/estimate",
        json!({
            "parameters_billion": 70.0,
            "training_method": "full_finetuning",
            "batch_size": 64,
            "sequence_length": 2048,
            "data_parallel": 8,
            "deepspeed_stage": "stage3"
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];

    assert_eq!(data["model"]["family"], "custom");
    assert_eq!(data["optimal_gpu_count"], 8);
    assert_eq!(data["effective_batch_size"], 512);
    assert_eq!(
        data["advisories"]["deepspeed_optimization"][0]["kind"],
        "sharding_enabled"
    );
    assert_eq!(
        data["recommendations"]["deepspeed_optimization"][0],
        "DeepSpeed ZeRO Stage 3 enabled"
    );
    assert!(data["recommendations"]["training_method"].is_array());
    assert!(data["recommendations"]["batch_size"].is_array());
}

#[tokio::test]
async fn training_estimate_rejects_out_of_range_batch() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/training/estimate",
        json!({
            "model_id": "llama-7b",
            "training_method": "lora",
            "batch_size": 4096,
            "sequence_length": 2048
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn training_estimate_rejects_unbounded_accumulation() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/training/estimate",
        json!({
            "model_id": "llama-7b",
            "training_method": "lora",
            "batch_size": 1024,
            "sequence_length": 2048,
            "gradient_accumulation_steps": 4_194_304
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn training_estimate_for_unknown_model_returns_404() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/training/estimate",
        json!({
            "model_id": "gpt-unknown",
            "training_method": "lora",
            "batch_size": 1,
            "sequence_length": 512
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], "Model with id gpt-unknown not found");
}

#[tokio::test]
async fn training_configs_lists_options() {
    let app = common::build_test_app();
    let response = get(app, "/api/v1/training/configs").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let methods = json["data"]["training_methods"].as_array().unwrap();
    assert_eq!(methods.len(), 2);
    assert_eq!(json["data"]["deepspeed_stages"][3]["id"], "stage3");
}

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inference_estimate_for_batched_llama_7b() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/inference/estimate",
        json!({
            "model_id": "llama-7b",
            "backend": "vllm",
            "precision": "fp16",
            "quantization": "none",
            "max_batch_size": 32,
            "max_sequence_length": 2048,
            "max_new_tokens": 1024
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];

    assert_eq!(data["kv_cache_memory_gb"], 48.0);
    assert_eq!(data["max_concurrent_requests"], 37);
    assert_eq!(data["backend"], "vllm");
    assert!(data["optimizer_memory_gb"].is_null());
    assert_eq!(data["scalability_analysis"]["kv_cache_scaling"], "linear");
    assert!(data["scalability_analysis"]["throughput_by_gpu_count"]["8"].is_number());
}

#[tokio::test]
async fn inference_estimate_reports_hardware_limits() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/inference/estimate",
        json!({
            "model_id": "qwen-72b",
            "backend": "transformers",
            "max_sequence_length": 4096,
            "max_gpu_count": 1,
            "gpu_memory_limit_gb": 24.0
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let recommendations = &json["data"]["recommendations"];

    for category in ["quantization", "backend", "parallelization", "hardware_constraints"] {
        assert!(recommendations[category].is_array(), "{category}");
    }
}

#[tokio::test]
async fn inference_estimate_requires_a_model_source() {
    let app = common::build_test_app();
    let response = post_json(
        app,
        "/api/v1/inference/estimate",
        json!({"backend": "vllm", "max_sequence_length": 2048}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn inference_backends_lists_options() {
    let app = common::build_test_app();
    let response = get(app, "/api/v1/inference/backends").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["backends"][0]["id"], "vllm");
    assert_eq!(
        json["data"]["quantization_methods"].as_array().unwrap().len(),
        5
    );
}
