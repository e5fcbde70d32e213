//! Application state
//!
//! Holds all shared components and state

use crate::ai_client::InferenceClient;
use crate::camera_manager::{CameraManager, DEFAULT_MAX_CAMERAS};
use crate::capture::{CaptureSettings, DecoderCommand};
use crate::frame_processor::FrameProcessor;
use crate::frame_ring_buffer::DEFAULT_CAPACITY;
use crate::metrics::GatewayMetrics;
use crate::realtime_hub::RealtimeHub;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Inference engine address (host:port)
    pub ai_engine_url: String,
    /// API server bind address
    pub http_addr: String,
    /// Metrics server bind address
    pub metrics_addr: String,
    /// Default tracing level when RUST_LOG is unset
    pub log_level: String,
    /// Frame processor rate (>= 1)
    pub target_fps: u32,
    pub confidence_threshold: f32,
    pub max_cameras: usize,
    /// Ring buffer capacity per camera
    pub buffer_size: usize,
    /// Inference engine connect timeout (`GRPC_TIMEOUT_MS` accepted as the old name)
    pub inference_timeout: Duration,
    /// Decoder program for remote streams
    pub decoder_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

impl AppConfig {
    /// Build config from a variable lookup; missing, blank or invalid values use defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let string = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Self {
            ai_engine_url: string("AI_ENGINE_URL", "localhost:50051"),
            http_addr: bind_addr(&string("HTTP_ADDR", "0.0.0.0:8080")),
            metrics_addr: bind_addr(&string("METRICS_ADDR", "0.0.0.0:9091")),
            log_level: string("LOG_LEVEL", "info"),
            target_fps: parse_or(lookup("TARGET_FPS"), 15u32).max(1),
            confidence_threshold: parse_or(lookup("CONFIDENCE_THRESHOLD"), 0.5f32),
            max_cameras: parse_or(lookup("MAX_CAMERAS"), DEFAULT_MAX_CAMERAS),
            buffer_size: parse_or(lookup("BUFFER_SIZE"), DEFAULT_CAPACITY).max(1),
            inference_timeout: Duration::from_millis(parse_or(
                lookup("INFERENCE_TIMEOUT_MS").or_else(|| lookup("GRPC_TIMEOUT_MS")),
                5000u64,
            )),
            decoder_path: string("DECODER_PATH", "ffmpeg"),
        }
    }

    /// Capture settings for the camera manager
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            buffer_capacity: self.buffer_size,
            decoder: DecoderCommand::ffmpeg().with_program(self.decoder_path.clone()),
            ..CaptureSettings::default()
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// `:8080` → `0.0.0.0:8080`
fn bind_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// CameraManager (camera registry)
    pub cameras: Arc<CameraManager>,
    /// FrameProcessor (inference loop)
    pub processor: Arc<FrameProcessor>,
    /// InferenceClient (None in standalone mode)
    pub ai_client: Option<Arc<InferenceClient>>,
    /// RealtimeHub (WebSocket)
    pub realtime: Arc<RealtimeHub>,
    pub metrics: Arc<GatewayMetrics>,
}

impl AppState {
    /// Wire all components from config
    pub fn new(config: AppConfig, ai_client: Option<InferenceClient>) -> Self {
        let ai_client = ai_client.map(Arc::new);
        let cameras = Arc::new(CameraManager::with_settings(
            config.capture_settings(),
            config.max_cameras,
        ));
        let realtime = Arc::new(RealtimeHub::new());
        let metrics = Arc::new(GatewayMetrics::new());
        let processor = Arc::new(FrameProcessor::new(
            cameras.clone(),
            ai_client.clone(),
            realtime.clone(),
            metrics.clone(),
            config.target_fps,
            config.confidence_threshold,
        ));

        Self {
            config,
            cameras,
            processor,
            ai_client,
            realtime,
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]);

        assert_eq!(cfg.ai_engine_url, "localhost:50051");
        assert_eq!(cfg.http_addr, "0.0.0.0:8080");
        assert_eq!(cfg.metrics_addr, "0.0.0.0:9091");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.target_fps, 15);
        assert_eq!(cfg.confidence_threshold, 0.5);
        assert_eq!(cfg.max_cameras, 16);
        assert_eq!(cfg.buffer_size, 30);
        assert_eq!(cfg.inference_timeout, Duration::from_secs(5));
        assert_eq!(cfg.decoder_path, "ffmpeg");
    }

    #[test]
    fn test_overrides_and_fallbacks() {
        let cfg = config(&[
            ("HTTP_ADDR", ":9000"),
            ("TARGET_FPS", "0"),
            ("MAX_CAMERAS", "lots"),
            ("BUFFER_SIZE", " 8 "),
            ("DECODER_PATH", "/usr/local/bin/ffmpeg"),
        ]);

        assert_eq!(cfg.http_addr, "0.0.0.0:9000");
        assert_eq!(cfg.target_fps, 1);
        assert_eq!(cfg.max_cameras, 16);
        assert_eq!(cfg.buffer_size, 8);

        let settings = cfg.capture_settings();
        assert_eq!(settings.buffer_capacity, 8);
        assert_eq!(settings.decoder.program, "/usr/local/bin/ffmpeg");
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let cfg = config(&[
            ("HTTP_ADDR", ""),
            ("METRICS_ADDR", "  "),
            ("DECODER_PATH", ""),
            ("LOG_LEVEL", ""),
            ("AI_ENGINE_URL", ""),
            ("TARGET_FPS", ""),
        ]);

        assert_eq!(cfg.http_addr, "0.0.0.0:8080");
        assert_eq!(cfg.metrics_addr, "0.0.0.0:9091");
        assert_eq!(cfg.decoder_path, "ffmpeg");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.ai_engine_url, "localhost:50051");
        assert_eq!(cfg.target_fps, 15);
        assert_eq!(cfg.capture_settings().decoder.program, "ffmpeg");
    }

    #[test]
    fn test_inference_timeout_old_name() {
        let cfg = config(&[("GRPC_TIMEOUT_MS", "750")]);
        assert_eq!(cfg.inference_timeout, Duration::from_millis(750));

        let cfg = config(&[("GRPC_TIMEOUT_MS", "750"), ("INFERENCE_TIMEOUT_MS", "1200")]);
        assert_eq!(cfg.inference_timeout, Duration::from_millis(1200));

        let cfg = config(&[("GRPC_TIMEOUT_MS", "750"), ("INFERENCE_TIMEOUT_MS", "")]);
        assert_eq!(cfg.inference_timeout, Duration::from_millis(750));
    }
}
