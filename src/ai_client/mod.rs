//! InferenceClient - AI engine adapter
//!
//! ## Responsibilities
//!
//! - Reachability check of the inference engine (connect / health)
//! - Per-frame detection requests
//!
//! The engine transport is not wired yet: `detect()` answers with a fixed
//! PPE result so the rest of the pipeline (metrics, hub, dashboard) runs
//! end to end.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;

/// Inference engine client
pub struct InferenceClient {
    addr: String,
    timeout: Duration,
}

/// Detection response for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub safety_check: SafetyCheck,
    pub zone_violations: Vec<ZoneViolation>,
    pub processing_time_ms: f64,
}

/// Single detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: i32,
    pub class_name: String,
    pub confidence: f64,
    /// [x1, y1, x2, y2]
    pub bbox: Vec<i32>,
    pub track_id: i32,
}

/// PPE compliance summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyCheck {
    pub has_violations: bool,
    pub violations: Vec<String>,
    pub people_count: u32,
    pub violation_count: u32,
    pub compliant_count: u32,
    /// Percent, 0-100
    pub compliance_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneViolation {
    pub zone_id: String,
    pub zone_name: String,
    pub severity: String,
    pub person_track_id: i32,
    pub missing_ppe: Vec<String>,
}

impl InferenceClient {
    /// Connect to the engine, failing if it is unreachable within `timeout`
    pub async fn connect(addr: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Self {
            addr: normalize_addr(&addr.into()),
            timeout,
        };
        client.ping().await?;

        tracing::info!(addr = %client.addr, "Inference engine reachable");
        Ok(client)
    }

    /// Engine currently reachable
    pub async fn health_check(&self) -> bool {
        match self.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(addr = %self.addr, error = %e, "Inference engine health check failed");
                false
            }
        }
    }

    /// Run detection on one JPEG frame
    pub async fn detect(
        &self,
        frame: &[u8],
        camera_id: &str,
        confidence_threshold: f32,
    ) -> Result<DetectionResult> {
        if frame.is_empty() {
            return Err(Error::Inference(format!("empty frame from camera {}", camera_id)));
        }

        let mut result = fixed_result();
        result
            .detections
            .retain(|d| d.confidence >= f64::from(confidence_threshold));

        tracing::trace!(
            camera_id = %camera_id,
            frame_bytes = frame.len(),
            detections = result.detections.len(),
            "Detection completed"
        );

        Ok(result)
    }

    async fn ping(&self) -> Result<()> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr.as_str())).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(Error::Inference(format!("{}: {}", self.addr, e))),
            Err(_) => Err(Error::Inference(format!(
                "{}: connect timed out after {}ms",
                self.addr,
                self.timeout.as_millis()
            ))),
        }
    }
}

/// Strip a URL scheme (`grpc://host:port` → `host:port`)
fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    let addr = addr.split_once("://").map_or(addr, |(_, rest)| rest);
    addr.trim_end_matches('/').to_string()
}

fn fixed_result() -> DetectionResult {
    DetectionResult {
        detections: vec![
            Detection {
                class_id: 0,
                class_name: "Hardhat".to_string(),
                confidence: 0.92,
                bbox: vec![100, 100, 200, 200],
                track_id: 1,
            },
            Detection {
                class_id: 5,
                class_name: "Person".to_string(),
                confidence: 0.95,
                bbox: vec![80, 80, 250, 400],
                track_id: 1,
            },
        ],
        safety_check: SafetyCheck {
            has_violations: false,
            violations: Vec::new(),
            people_count: 1,
            violation_count: 0,
            compliant_count: 1,
            compliance_rate: 100.0,
        },
        zone_violations: Vec::new(),
        processing_time_ms: 12.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn listening_client() -> (TcpListener, InferenceClient) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let client = InferenceClient::connect(addr, Duration::from_secs(1))
            .await
            .unwrap();
        (listener, client)
    }

    #[test]
    fn test_normalize_addr() {
        assert_eq!(normalize_addr("localhost:50051"), "localhost:50051");
        assert_eq!(normalize_addr("grpc://ai-engine:50051/"), "ai-engine:50051");
        assert_eq!(normalize_addr(" 10.0.0.5:50051 "), "10.0.0.5:50051");
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = InferenceClient::connect(addr, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::Inference(_))));
    }

    #[tokio::test]
    async fn test_health_check_follows_engine() {
        let (listener, client) = listening_client().await;
        assert!(client.health_check().await);

        drop(listener);
        assert!(!client.health_check().await);
    }

    #[tokio::test]
    async fn test_detect_result_shape() {
        let (_listener, client) = listening_client().await;
        let result = client.detect(&[0xFF, 0xD8, 0xFF, 0xD9], "cam1", 0.5).await.unwrap();

        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.detections[1].class_name, "Person");
        assert!(!result.safety_check.has_violations);
        assert_eq!(result.safety_check.compliance_rate, 100.0);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["processing_time_ms"], 12.5);
        assert!(json["zone_violations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detect_applies_threshold() {
        let (_listener, client) = listening_client().await;
        let result = client.detect(b"jpeg", "cam1", 0.93).await.unwrap();

        assert_eq!(result.detections.len(), 1);
        assert_eq!(result.detections[0].class_name, "Person");
    }

    #[tokio::test]
    async fn test_detect_rejects_empty_frame() {
        let (_listener, client) = listening_client().await;
        assert!(matches!(
            client.detect(&[], "cam1", 0.5).await,
            Err(Error::Inference(_))
        ));
    }
}
