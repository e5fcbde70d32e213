//! Stream Gateway Library
//!
//! Video ingestion gateway of the safety monitoring platform
//!
//! ## Architecture
//!
//! 1. FrameRingBuffer - Bounded latest-frame cache per camera
//! 2. Capture - Camera state machine, demo and remote-stream sources
//! 3. CameraManager - Camera registry and lifecycle
//! 4. InferenceClient - AI engine adapter
//! 5. FrameProcessor - Fixed-rate inference loop
//! 6. RealtimeHub - WebSocket distribution
//! 7. GatewayMetrics - Prometheus counters
//! 8. WebAPI - REST/WebSocket endpoints
//!
//! ## Design Principles
//!
//! - CameraManager is the only owner of cameras
//! - One capture task per active camera, cancelled cooperatively
//! - Readers never block the capture path for longer than one buffer lock

pub mod ai_client;
pub mod camera_manager;
pub mod capture;
pub mod error;
pub mod frame_processor;
pub mod frame_ring_buffer;
pub mod metrics;
pub mod models;
pub mod realtime_hub;
pub mod state;
pub mod web_api;

pub use error::{Error, Result};
pub use state::AppState;
