//! Resource estimation engine for training and serving large language models.
//!
//! Everything in this crate is pure computation (no I/O). The HTTP service
//! in `gpuplan-api` owns the catalog handle and renders advisories to text.

pub mod advisory;
pub mod catalog;
pub mod error;
pub mod estimate;
pub mod gpu;
pub mod inference;
pub mod memory;
pub mod training;
pub mod validation;
