//! Capture subsystem types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::decoder::DecoderCommand;
use super::mjpeg::TrailingBytes;
use crate::frame_ring_buffer::DEFAULT_CAPACITY;

/// Synthetic frame cadence
pub const DEMO_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Camera source type
///
/// `webcam` and `rtsp` are accepted as aliases; anything unrecognised runs as
/// a demo source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum SourceType {
    Demo,
    LocalDevice,
    RemoteStream,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Demo => "demo",
            SourceType::LocalDevice => "local-device",
            SourceType::RemoteStream => "remote-stream",
        }
    }
}

impl From<String> for SourceType {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "local-device" | "local_device" | "webcam" => SourceType::LocalDevice,
            "remote-stream" | "remote_stream" | "rtsp" => SourceType::RemoteStream,
            _ => SourceType::Demo,
        }
    }
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Demo
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Camera configuration as supplied by the API layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub source_type: SourceType,
}

impl CameraConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        source_type: SourceType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            source_type,
        }
    }
}

/// Read-only status projection of a camera
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraStatus {
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub active: bool,
    pub connected: bool,
    pub last_frame_at: Option<DateTime<Utc>>,
    /// Current reconnect wait of a remote stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reconnect_delay_ms: Option<u64>,
}

/// Capture state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    Stopped,
    Starting,
    Connecting,
    Streaming,
    Stopping,
}

/// Synthetic frame parameters
#[derive(Debug, Clone)]
pub struct DemoSettings {
    pub width: u32,
    pub height: u32,
    pub interval: Duration,
    /// JPEG quality (1-100)
    pub quality: u8,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            interval: DEMO_FRAME_INTERVAL,
            quality: 80,
        }
    }
}

/// Per-camera capture settings shared by every camera of a manager
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Ring buffer capacity for new cameras
    pub buffer_capacity: usize,
    pub demo: DemoSettings,
    /// External decoder used by remote-stream cameras
    pub decoder: DecoderCommand,
    /// What happens to bytes read past an EOI marker
    pub trailing_bytes: TrailingBytes,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_CAPACITY,
            demo: DemoSettings::default(),
            decoder: DecoderCommand::ffmpeg(),
            trailing_bytes: TrailingBytes::Discard,
        }
    }
}
