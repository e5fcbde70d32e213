//! API Routes

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};

use crate::capture::CameraConfig;
use crate::error::{Error, Result};
use crate::models::{ActionResponse, ApiResponse};
use crate::realtime_hub::{CameraStatusMessage, HubMessage};
use crate::state::AppState;

/// Create API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(super::health_check))
        // Cameras
        .route("/api/cameras", get(list_cameras).post(create_camera))
        .route("/api/cameras/:id", get(get_camera).delete(delete_camera))
        .route("/api/cameras/:id/start", post(start_camera))
        .route("/api/cameras/:id/stop", post(stop_camera))
        .route("/api/cameras/:id/frame.jpg", get(get_latest_frame))
        // Legacy action-first paths
        .route("/api/cameras/start/:id", post(start_camera))
        .route("/api/cameras/stop/:id", post(stop_camera))
        // WebSocket
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

// ========================================
// Cameras
// ========================================

async fn list_cameras(State(state): State<AppState>) -> impl IntoResponse {
    let cameras = state.cameras.list_cameras().await;
    Json(ApiResponse::success(cameras))
}

async fn get_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let camera = state.cameras.get_camera(&id).await?;
    Ok(Json(ApiResponse::success(camera)))
}

async fn create_camera(
    State(state): State<AppState>,
    Json(config): Json<CameraConfig>,
) -> Result<impl IntoResponse> {
    let status = state.cameras.add_camera(config).await?;
    tracing::info!(camera_id = %status.id, "Camera created via API");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(status))))
}

async fn delete_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.cameras.remove_camera(&id).await?;
    tracing::info!(camera_id = %id, "Camera deleted via API");
    Ok(Json(ApiResponse::success(ActionResponse {
        camera_id: id,
        action: "deleted".to_string(),
    })))
}

async fn start_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.cameras.start_camera(&id).await?;
    publish_status(&state, &id).await;
    Ok(Json(ApiResponse::success(ActionResponse {
        camera_id: id,
        action: "started".to_string(),
    })))
}

async fn stop_camera(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    state.cameras.stop_camera(&id).await?;
    publish_status(&state, &id).await;
    Ok(Json(ApiResponse::success(ActionResponse {
        camera_id: id,
        action: "stopped".to_string(),
    })))
}

/// GET /api/cameras/:id/frame.jpg
async fn get_latest_frame(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let frame = state
        .cameras
        .latest_frame(&id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("{} has no frame yet", id)))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
        ],
        frame,
    ))
}

async fn publish_status(state: &AppState, id: &str) {
    if let Ok(status) = state.cameras.get_camera(id).await {
        state
            .realtime
            .broadcast(HubMessage::CameraStatus(CameraStatusMessage::from(&status)))
            .await;
    }
}

// ========================================
// WebSocket Handler
// ========================================

/// WebSocket upgrade handler
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let (conn_id, mut rx) = state.realtime.register().await;
    state.metrics.set_ws_clients(state.realtime.connection_count());

    // Hub → client
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Client → hub (only close and errors matter)
    let recv_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    tracing::warn!(connection_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {}
        _ = recv_task => {}
    }

    state.realtime.unregister(&conn_id).await;
    state.metrics.set_ws_clients(state.realtime.connection_count());
}
