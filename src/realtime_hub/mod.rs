//! RealtimeHub - WebSocket distribution
//!
//! ## Responsibilities
//!
//! - WebSocket connection management
//! - Detection result broadcasting (one message per camera per tick)
//! - Camera status change notifications
//!
//! Frames themselves are not pushed; clients fetch
//! `GET /api/cameras/{id}/frame.jpg`.

use crate::ai_client::DetectionResult;
use crate::capture::CameraStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Hub message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HubMessage {
    Detection(DetectionMessage),
    CameraStatus(CameraStatusMessage),
}

impl HubMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            HubMessage::Detection(_) => "detection",
            HubMessage::CameraStatus(_) => "camera_status",
        }
    }
}

/// Inference output for one camera frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionMessage {
    pub camera_id: String,
    /// Unix millis
    pub timestamp: i64,
    pub result: DetectionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraStatusMessage {
    pub camera_id: String,
    pub active: bool,
    pub connected: bool,
    pub last_frame_at: Option<DateTime<Utc>>,
}

impl From<&CameraStatus> for CameraStatusMessage {
    fn from(status: &CameraStatus) -> Self {
        Self {
            camera_id: status.id.clone(),
            active: status.active,
            connected: status.connected,
            last_frame_at: status.last_frame_at,
        }
    }
}

/// Client connection
struct ClientConnection {
    id: Uuid,
    tx: mpsc::UnboundedSender<String>,
}

/// RealtimeHub instance
pub struct RealtimeHub {
    connections: RwLock<HashMap<Uuid, ClientConnection>>,
    connection_count: AtomicU64,
}

impl RealtimeHub {
    /// Create new RealtimeHub
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            connection_count: AtomicU64::new(0),
        }
    }

    /// Register a new client
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<String>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, ClientConnection { id, tx });
        }

        self.connection_count.fetch_add(1, Ordering::Relaxed);

        tracing::info!(connection_id = %id, "Client connected");

        (id, rx)
    }

    /// Unregister a client
    pub async fn unregister(&self, id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(id).is_some() {
            self.connection_count.fetch_sub(1, Ordering::Relaxed);
            tracing::info!(connection_id = %id, "Client disconnected");
        }
    }

    /// Broadcast message to all clients
    pub async fn broadcast(&self, message: HubMessage) {
        let json = match serde_json::to_string(&message) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize message");
                return;
            }
        };

        let connections = self.connections.read().await;
        tracing::trace!(
            message_type = %message.kind(),
            client_count = connections.len(),
            "Broadcasting message to clients"
        );

        for conn in connections.values() {
            if let Err(e) = conn.tx.send(json.clone()) {
                tracing::warn!(connection_id = %conn.id, error = %e, "Failed to send message");
            }
        }
    }

    /// Get connection count
    pub fn connection_count(&self) -> u64 {
        self.connection_count.load(Ordering::Relaxed)
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}
