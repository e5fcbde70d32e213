//! Stream Gateway
//!
//! Main entry point: camera capture, inference fan-out, HTTP/WebSocket API
//! and Prometheus metrics.

use std::time::Duration;
use stream_gateway::{
    ai_client::InferenceClient,
    state::{AppConfig, AppState},
    web_api,
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    let config = AppConfig::default();

    // Initialize tracing
    let default_filter = format!(
        "stream_gateway={level},tower_http={level}",
        level = config.log_level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        ai_engine = %config.ai_engine_url,
        "Starting stream gateway"
    );
    tracing::info!(
        http_addr = %config.http_addr,
        metrics_addr = %config.metrics_addr,
        target_fps = config.target_fps,
        max_cameras = config.max_cameras,
        buffer_size = config.buffer_size,
        decoder = %config.decoder_path,
        "Configuration loaded"
    );

    let ai_client = match InferenceClient::connect(
        config.ai_engine_url.clone(),
        config.inference_timeout,
    )
    .await
    {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::warn!(error = %e, "AI engine not available, running in standalone mode");
            None
        }
    };

    let state = AppState::new(config, ai_client);

    let app = web_api::create_router(state.clone())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http());
    let metrics_app = web_api::create_metrics_router(state.clone());

    let http_listener = tokio::net::TcpListener::bind(&state.config.http_addr).await?;
    let metrics_listener = tokio::net::TcpListener::bind(&state.config.metrics_addr).await?;

    let shutdown = CancellationToken::new();

    let http_server = {
        let shutdown = shutdown.clone();
        tracing::info!(addr = %state.config.http_addr, "HTTP server listening");
        tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    let metrics_server = {
        let shutdown = shutdown.clone();
        tracing::info!(addr = %state.config.metrics_addr, "Metrics server listening");
        tokio::spawn(async move {
            axum::serve(metrics_listener, metrics_app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        })
    };

    state.processor.start().await;

    shutdown_signal().await;
    tracing::info!("Shutting down");

    state.processor.stop().await;
    state.cameras.shutdown().await;
    shutdown.cancel();

    for (name, server) in [("http", http_server), ("metrics", metrics_server)] {
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => tracing::error!(server = name, error = %e, "Server error"),
            Ok(Err(e)) => tracing::error!(server = name, error = %e, "Server task failed"),
            Err(_) => tracing::warn!(server = name, "Server did not drain in time"),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
