//! CameraManager - Camera registry and lifecycle
//!
//! ## Responsibilities
//!
//! - Single owner of every configured camera (id → Camera)
//! - Add/remove/start/stop with typed failures for the API layer
//! - Active camera snapshot for the frame processor
//!
//! The registry lock only covers structural changes and snapshots. Camera
//! state has its own lock so capture tasks never contend with the registry.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::capture::{Camera, CameraConfig, CameraStatus, CaptureSettings, SourceType};
use crate::error::{Error, Result};

/// Default registry capacity
pub const DEFAULT_MAX_CAMERAS: usize = 16;

/// CameraManager instance
pub struct CameraManager {
    cameras: RwLock<HashMap<String, Arc<Camera>>>,
    settings: CaptureSettings,
    max_cameras: usize,
}

impl CameraManager {
    /// Create new CameraManager with default capture settings
    pub fn new() -> Self {
        Self::with_settings(CaptureSettings::default(), DEFAULT_MAX_CAMERAS)
    }

    pub fn with_settings(settings: CaptureSettings, max_cameras: usize) -> Self {
        Self {
            cameras: RwLock::new(HashMap::new()),
            settings,
            max_cameras,
        }
    }

    /// Register a camera in the inactive state
    pub async fn add_camera(&self, config: CameraConfig) -> Result<CameraStatus> {
        validate(&config)?;

        let mut cameras = self.cameras.write().await;

        if cameras.contains_key(&config.id) {
            return Err(Error::DuplicateCamera(config.id));
        }
        if cameras.len() >= self.max_cameras {
            return Err(Error::OverCapacity(format!(
                "camera limit of {} reached",
                self.max_cameras
            )));
        }

        let camera = Arc::new(Camera::new(config, &self.settings));
        let status = camera.status().await;
        cameras.insert(camera.id().to_string(), camera);

        tracing::info!(
            camera_id = %status.id,
            url = %status.url,
            source_type = %status.source_type,
            "Camera added"
        );

        Ok(status)
    }

    /// Stop (if needed) and unregister a camera
    pub async fn remove_camera(&self, id: &str) -> Result<()> {
        let mut cameras = self.cameras.write().await;
        let camera = cameras
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        camera.stop().await;
        camera.buffer().clear().await;

        tracing::info!(camera_id = %id, "Camera removed");
        Ok(())
    }

    /// Launch capture; no-op if already active
    pub async fn start_camera(&self, id: &str) -> Result<()> {
        let camera = self.camera(id).await?;
        camera.start().await;
        Ok(())
    }

    /// Signal capture to stop; no-op if already inactive
    pub async fn stop_camera(&self, id: &str) -> Result<()> {
        let camera = self.camera(id).await?;
        camera.stop().await;
        Ok(())
    }

    /// Shared handle to a camera (frame reads)
    pub async fn camera(&self, id: &str) -> Result<Arc<Camera>> {
        let cameras = self.cameras.read().await;
        cameras
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    pub async fn get_camera(&self, id: &str) -> Result<CameraStatus> {
        let camera = self.camera(id).await?;
        Ok(camera.status().await)
    }

    pub async fn list_cameras(&self) -> Vec<CameraStatus> {
        let mut statuses = Vec::new();
        for camera in self.snapshot().await {
            statuses.push(camera.status().await);
        }
        statuses
    }

    /// Cameras that are active and connected, in no particular order
    pub async fn active_cameras(&self) -> Vec<Arc<Camera>> {
        let mut active = Vec::new();
        for camera in self.snapshot().await {
            if camera.is_streaming().await {
                active.push(camera);
            }
        }
        active
    }

    /// Latest frame of a camera, if any
    pub async fn latest_frame(&self, id: &str) -> Result<Option<Bytes>> {
        let camera = self.camera(id).await?;
        Ok(camera.latest_frame().await)
    }

    pub async fn camera_count(&self) -> usize {
        self.cameras.read().await.len()
    }

    /// Stop every camera (process shutdown)
    pub async fn shutdown(&self) {
        let mut stopped = 0usize;
        for camera in self.snapshot().await {
            if camera.stop().await {
                stopped += 1;
            }
        }
        tracing::info!(stopped = stopped, "All cameras stopped");
    }

    /// Registry snapshot; the lock is released on return
    async fn snapshot(&self) -> Vec<Arc<Camera>> {
        self.cameras.read().await.values().cloned().collect()
    }
}

impl Default for CameraManager {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(config: &CameraConfig) -> Result<()> {
    if config.id.trim().is_empty() {
        return Err(Error::Validation("camera id is required".to_string()));
    }
    if config.source_type == SourceType::RemoteStream && config.url.trim().is_empty() {
        return Err(Error::Validation(format!(
            "camera {} is a remote stream but has no url",
            config.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CapturePhase, DecoderCommand, DemoSettings};
    use std::time::Duration;

    fn test_settings() -> CaptureSettings {
        CaptureSettings {
            demo: DemoSettings {
                width: 32,
                height: 24,
                ..DemoSettings::default()
            },
            ..CaptureSettings::default()
        }
    }

    fn manager() -> CameraManager {
        CameraManager::with_settings(test_settings(), 4)
    }

    fn demo(id: &str) -> CameraConfig {
        CameraConfig::new(id, format!("Camera {}", id), "", SourceType::Demo)
    }

    #[tokio::test]
    async fn test_add_then_get_is_inactive() {
        let manager = manager();
        manager.add_camera(demo("cam1")).await.unwrap();

        let status = manager.get_camera("cam1").await.unwrap();
        assert_eq!(status.id, "cam1");
        assert!(!status.active);
        assert!(!status.connected);
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let manager = manager();
        manager.add_camera(demo("cam1")).await.unwrap();

        let result = manager.add_camera(demo("cam1")).await;
        assert!(matches!(result, Err(Error::DuplicateCamera(id)) if id == "cam1"));
        assert_eq!(manager.camera_count().await, 1);
    }

    #[tokio::test]
    async fn test_validation() {
        let manager = manager();

        let empty_id = manager.add_camera(demo("  ")).await;
        assert!(matches!(empty_id, Err(Error::Validation(_))));

        let no_url = CameraConfig::new("rtsp1", "Gate", "", SourceType::RemoteStream);
        assert!(matches!(manager.add_camera(no_url).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let manager = manager();
        for i in 0..4 {
            manager.add_camera(demo(&format!("cam{}", i))).await.unwrap();
        }

        let result = manager.add_camera(demo("cam4")).await;
        assert!(matches!(result, Err(Error::OverCapacity(_))));
    }

    #[tokio::test]
    async fn test_unknown_id_fails() {
        let manager = manager();

        assert!(matches!(manager.remove_camera("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(manager.start_camera("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(manager.stop_camera("nope").await, Err(Error::NotFound(_))));
        assert!(matches!(manager.get_camera("nope").await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_active_cameras_only_streaming() {
        let manager = manager();
        manager.add_camera(demo("cam1")).await.unwrap();
        manager.add_camera(demo("cam2")).await.unwrap();

        manager.start_camera("cam1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let active = manager.active_cameras().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), "cam1");

        manager.shutdown().await;
        assert!(manager.active_cameras().await.is_empty());
    }

    #[tokio::test]
    async fn test_start_stop_settles_inactive() {
        let manager = manager();
        manager.add_camera(demo("cam1")).await.unwrap();

        manager.start_camera("cam1").await.unwrap();
        manager.stop_camera("cam1").await.unwrap();
        manager.stop_camera("cam1").await.unwrap();

        let camera = manager.camera("cam1").await.unwrap();
        let mut settled = false;
        for _ in 0..50 {
            if camera.phase().await == CapturePhase::Stopped {
                settled = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(settled);
        assert!(!manager.get_camera("cam1").await.unwrap().active);
    }

    #[tokio::test]
    async fn test_remove_active_camera_stops_task() {
        let manager = manager();
        manager.add_camera(demo("cam1")).await.unwrap();
        manager.start_camera("cam1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;

        let camera = manager.camera("cam1").await.unwrap();
        manager.remove_camera("cam1").await.unwrap();

        assert!(matches!(manager.get_camera("cam1").await, Err(Error::NotFound(_))));
        assert!(!camera.is_active().await);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(camera.phase().await, CapturePhase::Stopped);
        assert_eq!(camera.buffer().size().await, 0);
    }

    #[tokio::test]
    async fn test_missing_decoder_keeps_retrying_disconnected() {
        let settings = CaptureSettings {
            decoder: DecoderCommand::ffmpeg().with_program("/nonexistent/stream-decoder"),
            ..test_settings()
        };
        let manager = CameraManager::with_settings(settings, 4);
        manager
            .add_camera(CameraConfig::new(
                "rtsp1",
                "Gate",
                "rtsp://127.0.0.1:1/live",
                SourceType::RemoteStream,
            ))
            .await
            .unwrap();

        manager.start_camera("rtsp1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let status = manager.get_camera("rtsp1").await.unwrap();
        assert!(status.active);
        assert!(!status.connected);
        assert!(manager.active_cameras().await.is_empty());

        manager.stop_camera("rtsp1").await.unwrap();
        let camera = manager.camera("rtsp1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(camera.phase().await, CapturePhase::Stopped);
    }
}
