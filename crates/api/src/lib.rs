//! HTTP service for GPU resource estimation.
//!
//! Exposes the building blocks (config, state, error handling, routes) so
//! integration tests and the binary entrypoint share one router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod options;
pub mod render;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
