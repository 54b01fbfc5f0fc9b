//! Harbor API Server Entry Point
//!
//! Reads configuration, opens the configured store and serves the
//! REST router until Ctrl-C.

use axum::Router;
use harbor_api::telemetry::init_tracing;
use harbor_api::{create_router, ApiConfig, ApiError, ApiResult, AppState};
use harbor_core::StoreConfig;
use harbor_storage::{open_store, HarborDbClient};

#[tokio::main]
async fn main() -> ApiResult<()> {
    let api_config = ApiConfig::from_env()?;
    init_tracing(api_config.log_format)?;

    let store_config = StoreConfig::from_env()?;
    let store = open_store(&store_config)?;
    tracing::info!(backend = ?store_config.backend, "Store opened");

    let addr = api_config.bind_addr;
    let state = AppState::new(HarborDbClient::new(store), api_config);
    let app: Router = create_router(state);

    tracing::info!(%addr, "Starting Harbor API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
