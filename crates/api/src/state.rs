use std::sync::Arc;

use gpuplan_core::catalog::ModelCatalog;
use gpuplan_core::gpu::GpuRecommender;
use tokio::sync::RwLock;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Model catalog. Writers (register/update/remove) take the write lock;
    /// estimations hold the read lock for the duration of one computation.
    pub catalog: Arc<RwLock<ModelCatalog>>,
    /// Hardware table used for device recommendations.
    pub gpus: Arc<dyn GpuRecommender>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        catalog: ModelCatalog,
        gpus: Arc<dyn GpuRecommender>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            catalog: Arc::new(RwLock::new(catalog)),
            gpus,
        }
    }
}
