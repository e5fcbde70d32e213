//! Camera - one capture source bound to one frame ring buffer
//!
//! ## State machine
//!
//! `Stopped → Starting → (Connecting ⇄ Streaming) → Stopping → Stopped`
//!
//! Every `start()` opens a new run with its own generation number and
//! cancellation token. A capture task only writes camera state through its
//! [`CaptureSink`], and the sink ignores writes once its run is cancelled or
//! superseded. `connected` therefore never outlives `active`.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::source::CaptureSource;
use super::types::{CameraConfig, CameraStatus, CapturePhase, CaptureSettings, SourceType};
use crate::frame_ring_buffer::FrameRingBuffer;

struct CameraState {
    active: bool,
    connected: bool,
    last_frame_at: Option<DateTime<Utc>>,
    phase: CapturePhase,
    /// Backoff sleep in progress after a failed or lost connection
    reconnect_delay: Option<Duration>,
    generation: u64,
    cancel: CancellationToken,
}

impl CameraState {
    fn new() -> Self {
        Self {
            active: false,
            connected: false,
            last_frame_at: None,
            phase: CapturePhase::Stopped,
            reconnect_delay: None,
            generation: 0,
            cancel: CancellationToken::new(),
        }
    }
}

/// A configured camera
pub struct Camera {
    id: String,
    name: String,
    url: String,
    source_type: SourceType,
    buffer: Arc<FrameRingBuffer>,
    source: CaptureSource,
    state: RwLock<CameraState>,
}

impl Camera {
    /// Create an inactive camera with an empty buffer
    pub fn new(config: CameraConfig, settings: &CaptureSettings) -> Self {
        Self {
            source: CaptureSource::for_type(config.source_type, settings),
            buffer: Arc::new(FrameRingBuffer::new(settings.buffer_capacity)),
            id: config.id,
            name: config.name,
            url: config.url,
            source_type: config.source_type,
            state: RwLock::new(CameraState::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn buffer(&self) -> &Arc<FrameRingBuffer> {
        &self.buffer
    }

    /// Most recent captured frame
    pub async fn latest_frame(&self) -> Option<Bytes> {
        self.buffer.latest().await
    }

    pub async fn status(&self) -> CameraStatus {
        let state = self.state.read().await;
        CameraStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            url: self.url.clone(),
            source_type: self.source_type,
            active: state.active,
            connected: state.connected,
            last_frame_at: state.last_frame_at,
            reconnect_delay_ms: state.reconnect_delay.map(|d| d.as_millis() as u64),
        }
    }

    pub async fn phase(&self) -> CapturePhase {
        self.state.read().await.phase
    }

    pub async fn is_active(&self) -> bool {
        self.state.read().await.active
    }

    /// Active and receiving frames
    pub async fn is_streaming(&self) -> bool {
        let state = self.state.read().await;
        state.active && state.connected
    }

    /// Launch the capture task. Returns false if the camera was already active.
    pub async fn start(self: &Arc<Self>) -> bool {
        let sink = {
            let mut state = self.state.write().await;
            if state.active {
                tracing::debug!(camera_id = %self.id, "Camera already active");
                return false;
            }

            state.generation += 1;
            state.active = true;
            state.connected = false;
            state.phase = CapturePhase::Starting;
            state.reconnect_delay = None;
            state.cancel = CancellationToken::new();

            CaptureSink {
                camera: Arc::clone(self),
                generation: state.generation,
                cancel: state.cancel.clone(),
            }
        };

        tracing::info!(
            camera_id = %self.id,
            source_type = %self.source_type,
            generation = sink.generation,
            "Camera starting"
        );

        tokio::spawn(async move {
            sink.camera.source.run(&sink).await;
            sink.finish().await;
        });

        true
    }

    /// Signal the capture task to stop. Returns false if the camera was not active.
    ///
    /// Does not wait for the task; the decoder process (if any) is killed
    /// before the task exits.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.write().await;
        if !state.active {
            return false;
        }

        state.active = false;
        state.connected = false;
        state.phase = CapturePhase::Stopping;
        state.reconnect_delay = None;
        state.cancel.cancel();

        tracing::info!(camera_id = %self.id, "Camera stopped");
        true
    }
}

/// Write handle given to the capture task of one run
pub struct CaptureSink {
    camera: Arc<Camera>,
    generation: u64,
    cancel: CancellationToken,
}

impl CaptureSink {
    pub fn camera_id(&self) -> &str {
        &self.camera.id
    }

    pub fn url(&self) -> &str {
        &self.camera.url
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the run is stopped
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Frames are flowing
    pub async fn mark_connected(&self) -> bool {
        self.update(|state| {
            state.connected = true;
            state.phase = CapturePhase::Streaming;
            state.reconnect_delay = None;
        })
        .await
    }

    /// Link lost, about to reconnect
    pub async fn mark_disconnected(&self) -> bool {
        self.update(|state| {
            state.connected = false;
            state.phase = CapturePhase::Connecting;
        })
        .await
    }

    pub async fn set_phase(&self, phase: CapturePhase) -> bool {
        self.update(|state| state.phase = phase).await
    }

    /// About to wait `delay` before the next connection attempt
    pub async fn set_reconnect_delay(&self, delay: Duration) -> bool {
        self.update(|state| state.reconnect_delay = Some(delay)).await
    }

    /// Store a captured frame and bump `last_frame_at`
    pub async fn push_frame(&self, frame: Bytes) {
        if self.is_cancelled() {
            return;
        }

        self.camera.buffer.push(frame).await;

        let now = Utc::now();
        self.update(|state| {
            state.last_frame_at = Some(state.last_frame_at.map_or(now, |prev| prev.max(now)));
        })
        .await;
    }

    async fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut CameraState),
    {
        let mut state = self.camera.state.write().await;
        if state.generation != self.generation || self.cancel.is_cancelled() {
            return false;
        }
        f(&mut state);
        true
    }

    /// Called when the source returns, whatever the reason
    async fn finish(&self) {
        let mut state = self.camera.state.write().await;
        if state.generation != self.generation {
            return;
        }

        if state.active {
            // The source gave up on its own (configuration error)
            tracing::warn!(camera_id = %self.camera.id, "Capture ended without stop request");
            state.cancel.cancel();
        }
        state.active = false;
        state.connected = false;
        state.phase = CapturePhase::Stopped;
        state.reconnect_delay = None;

        tracing::debug!(camera_id = %self.camera.id, generation = self.generation, "Capture task exited");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::DemoSettings;
    use std::time::Duration;

    fn settings() -> CaptureSettings {
        CaptureSettings {
            demo: DemoSettings {
                width: 32,
                height: 24,
                ..DemoSettings::default()
            },
            ..CaptureSettings::default()
        }
    }

    fn demo_camera(id: &str) -> Arc<Camera> {
        Arc::new(Camera::new(
            CameraConfig::new(id, "Demo", "", SourceType::Demo),
            &settings(),
        ))
    }

    async fn wait_for_phase(camera: &Camera, phase: CapturePhase) -> bool {
        for _ in 0..100 {
            if camera.phase().await == phase {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_new_camera_is_inactive() {
        let camera = demo_camera("cam1");
        let status = camera.status().await;

        assert!(!status.active);
        assert!(!status.connected);
        assert!(status.last_frame_at.is_none());
        assert_eq!(camera.phase().await, CapturePhase::Stopped);
    }

    #[tokio::test]
    async fn test_demo_start_streams_frames() {
        let camera = demo_camera("cam1");
        assert!(camera.start().await);

        tokio::time::sleep(Duration::from_millis(350)).await;

        let status = camera.status().await;
        assert!(status.active);
        assert!(status.connected);
        assert!(status.last_frame_at.is_some());
        assert!(camera.buffer().size().await > 0);
        assert_eq!(camera.phase().await, CapturePhase::Streaming);

        camera.stop().await;
    }

    #[tokio::test]
    async fn test_double_start_does_not_double_cadence() {
        let camera = demo_camera("cam1");
        assert!(camera.start().await);
        assert!(!camera.start().await);

        tokio::time::sleep(Duration::from_millis(550)).await;
        camera.stop().await;

        // One task at 100 ms yields about six frames in 550 ms
        let frames = camera.buffer().size().await;
        assert!(frames >= 2, "too few frames: {}", frames);
        assert!(frames <= 8, "cadence doubled: {}", frames);
    }

    #[tokio::test]
    async fn test_stop_twice_is_noop() {
        let camera = demo_camera("cam1");
        camera.start().await;

        assert!(camera.stop().await);
        assert!(!camera.stop().await);

        let status = camera.status().await;
        assert!(!status.active);
        assert!(!status.connected);
        assert!(wait_for_phase(&camera, CapturePhase::Stopped).await);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let camera = demo_camera("cam1");
        assert!(!camera.stop().await);
        assert_eq!(camera.phase().await, CapturePhase::Stopped);
    }

    #[tokio::test]
    async fn test_no_frames_after_stop() {
        let camera = demo_camera("cam1");
        camera.start().await;
        tokio::time::sleep(Duration::from_millis(250)).await;
        camera.stop().await;
        assert!(wait_for_phase(&camera, CapturePhase::Stopped).await);

        let frames = camera.buffer().size().await;
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(camera.buffer().size().await, frames);
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let camera = demo_camera("cam1");
        camera.start().await;
        camera.stop().await;
        assert!(camera.start().await);

        tokio::time::sleep(Duration::from_millis(250)).await;

        // The first run exiting late must not clobber the second one
        let status = camera.status().await;
        assert!(status.active);
        assert!(status.connected);

        camera.stop().await;
    }
}
