//! WebAPI - REST API Endpoints
//!
//! ## Responsibilities
//!
//! - Camera management routes
//! - Latest frame download
//! - WebSocket attachment to the RealtimeHub
//! - Health and metrics endpoints

mod routes;

pub use routes::create_router;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::models::HealthResponse;
use crate::state::AppState;
use crate::metrics::CONTENT_TYPE;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let ai_engine = match &state.ai_client {
        Some(client) => client.health_check().await,
        None => false,
    };

    let response = HealthResponse {
        status: "healthy".to_string(),
        processing: state.processor.is_running().await,
        clients: state.realtime.connection_count(),
        ai_engine,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    Json(response)
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    state
        .metrics
        .set_ws_clients(state.realtime.connection_count());
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], state.metrics.render())
}

/// Router of the metrics server
pub fn create_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics))
        .with_state(state)
}
