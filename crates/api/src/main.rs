use std::net::SocketAddr;
use std::sync::Arc;

use gpuplan_core::catalog::ModelCatalog;
use gpuplan_core::gpu::{GpuRecommender, GpuTable};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gpuplan_api::config::ServerConfig;
use gpuplan_api::router::build_app_router;
use gpuplan_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gpuplan_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- GPU table ---
    let gpus = load_gpu_table(&config);

    // --- Model catalog ---
    let catalog = ModelCatalog::with_seed_models();
    tracing::info!(models = catalog.len(), "Model catalog seeded");

    // --- Router ---
    let state = AppState::new(config.clone(), catalog, gpus);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Use the table at `GPU_TABLE_PATH` when set, otherwise the built-in one.
///
/// An unreadable or malformed table aborts startup.
fn load_gpu_table(config: &ServerConfig) -> Arc<dyn GpuRecommender> {
    let table = match &config.gpu_table_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path).unwrap_or_else(|e| {
                panic!("Failed to read GPU table '{}': {e}", path.display())
            });
            let table = GpuTable::from_json(&raw).unwrap_or_else(|e| panic!("{e}"));
            tracing::info!(path = %path.display(), gpus = table.gpus().len(), "Loaded GPU table");
            table
        }
        None => {
            let table = GpuTable::builtin();
            tracing::info!(gpus = table.gpus().len(), "Using built-in GPU table");
            table
        }
    };
    Arc::new(table)
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
