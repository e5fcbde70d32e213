//! FrameProcessor - Inference polling loop
//!
//! ## Responsibilities
//!
//! - Fixed-rate tick (1000 / target_fps ms)
//! - Latest frame of every streaming camera → inference → hub broadcast
//! - Metrics for latency, detections, violations and errors
//!
//! Runs nothing per tick when the gateway is in standalone mode (no engine).

use crate::ai_client::InferenceClient;
use crate::camera_manager::CameraManager;
use crate::metrics::GatewayMetrics;
use crate::realtime_hub::{DetectionMessage, HubMessage, RealtimeHub};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// FrameProcessor instance
pub struct FrameProcessor {
    cameras: Arc<CameraManager>,
    ai_client: Option<Arc<InferenceClient>>,
    realtime_hub: Arc<RealtimeHub>,
    metrics: Arc<GatewayMetrics>,
    tick: Duration,
    confidence_threshold: f32,
    cancel: RwLock<Option<CancellationToken>>,
}

impl FrameProcessor {
    /// Create new FrameProcessor
    pub fn new(
        cameras: Arc<CameraManager>,
        ai_client: Option<Arc<InferenceClient>>,
        realtime_hub: Arc<RealtimeHub>,
        metrics: Arc<GatewayMetrics>,
        target_fps: u32,
        confidence_threshold: f32,
    ) -> Self {
        Self {
            cameras,
            ai_client,
            realtime_hub,
            metrics,
            tick: tick_interval(target_fps),
            confidence_threshold,
            cancel: RwLock::new(None),
        }
    }

    /// Start processing loop
    pub async fn start(&self) {
        let token = {
            let mut cancel = self.cancel.write().await;
            if cancel.is_some() {
                tracing::warn!("Frame processor already running");
                return;
            }
            let token = CancellationToken::new();
            *cancel = Some(token.clone());
            token
        };

        tracing::info!(
            tick_ms = self.tick.as_millis() as u64,
            standalone = self.ai_client.is_none(),
            "Starting frame processor"
        );

        let cameras = self.cameras.clone();
        let ai_client = self.ai_client.clone();
        let realtime_hub = self.realtime_hub.clone();
        let metrics = self.metrics.clone();
        let tick = self.tick;
        let threshold = self.confidence_threshold;

        tokio::spawn(async move {
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let active = Self::process_frames(
                    &cameras,
                    ai_client.as_deref(),
                    &realtime_hub,
                    &metrics,
                    threshold,
                )
                .await;
                metrics.set_active_cameras(active);
            }

            tracing::info!("Frame processor stopped");
        });
    }

    /// Stop processing loop
    pub async fn stop(&self) {
        if let Some(token) = self.cancel.write().await.take() {
            token.cancel();
            tracing::info!("Stopping frame processor");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.cancel.read().await.is_some()
    }

    /// One tick; returns the number of streaming cameras
    async fn process_frames(
        cameras: &CameraManager,
        ai_client: Option<&InferenceClient>,
        realtime_hub: &RealtimeHub,
        metrics: &GatewayMetrics,
        threshold: f32,
    ) -> usize {
        let active = cameras.active_cameras().await;
        let Some(ai_client) = ai_client else {
            return active.len();
        };

        for camera in &active {
            let Some(frame) = camera.latest_frame().await else {
                continue;
            };

            let started = Instant::now();
            let result = match ai_client.detect(&frame, camera.id(), threshold).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(camera_id = %camera.id(), error = %e, "Detection failed");
                    metrics.record_error("detection");
                    continue;
                }
            };

            metrics.record_inference(started.elapsed());
            metrics.record_detections(result.detections.len());

            if result.safety_check.has_violations {
                metrics.record_violation();
                tracing::warn!(
                    camera_id = %camera.id(),
                    violations = ?result.safety_check.violations,
                    "Safety violation detected"
                );
            }

            realtime_hub
                .broadcast(HubMessage::Detection(DetectionMessage {
                    camera_id: camera.id().to_string(),
                    timestamp: Utc::now().timestamp_millis(),
                    result,
                }))
                .await;
        }

        active.len()
    }
}

fn tick_interval(target_fps: u32) -> Duration {
    Duration::from_millis(1000 / u64::from(target_fps.max(1)))
}
