//! Shared API models
//!
//! Response types used by web_api handlers.

use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// Frame processor running
    pub processing: bool,
    /// Connected WebSocket clients
    pub clients: u64,
    /// Inference engine reachable; false in standalone mode
    pub ai_engine: bool,
    pub version: String,
}

/// Generic acknowledgement for start/stop/delete
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResponse {
    pub camera_id: String,
    pub action: String,
}
