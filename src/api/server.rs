use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{decompression::RequestDecompressionLayer, trace::TraceLayer};
use tracing::{error, info};

use super::{
    services::{health, upload},
    state::AppState,
    utils::MULTIPART_OVERHEAD_BYTES,
};
use crate::config::Config;
use crate::endpoints::{EndpointRegistry, SharedServices};
use crate::observability::Metrics;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Build the application router
///
/// Callers must serve it with connect info (`SocketAddr`) so the upload
/// route can see the peer address.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .server
        .max_upload_bytes
        .as_usize()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/upload/{endpoint}", post(upload))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        // Clients may gzip the whole request body
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

pub async fn run(address: Option<SocketAddr>, config_path: Option<PathBuf>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load(config_path).map_err(|e| format!("Failed to load config: {}", e))?;

    let metrics = Arc::new(Metrics::new());
    let services = SharedServices::from_config(&config, metrics.clone())
        .map_err(|e| format!("Failed to set up notifications: {}", e))?;
    let registry = EndpointRegistry::from_config(&config, services);

    for name in registry.names() {
        if let Ok(handler) = registry.get(name) {
            info!(
                endpoint = name,
                root = %handler.store().root().display(),
                "Upload endpoint ready"
            );
        }
    }

    let address = address.unwrap_or(config.server.bind_addr);
    let state = AppState::new(config, registry, metrics);
    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "logdrop listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
