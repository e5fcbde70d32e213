//! Capture - per-camera frame producers
//!
//! ## Responsibilities
//!
//! - Camera start/stop state machine with cooperative cancellation
//! - Synthetic frames for demo and local-device cameras
//! - Remote streams through an external decoder process (ffmpeg by default)
//! - MJPEG frame extraction from the decoder's stdout
//! - Reconnect with exponential backoff (1s → 30s)
//!
//! Captured frames land in the camera's [`FrameRingBuffer`](crate::frame_ring_buffer::FrameRingBuffer).

pub mod backoff;
pub mod camera;
pub mod decoder;
pub mod demo_frame;
pub mod mjpeg;
pub mod source;
pub mod types;

pub use backoff::ReconnectBackoff;
pub use camera::{Camera, CaptureSink};
pub use decoder::{DecoderCommand, DecoderProcess};
pub use mjpeg::{MjpegReader, TrailingBytes};
pub use source::CaptureSource;
pub use types::{CameraConfig, CameraStatus, CapturePhase, CaptureSettings, DemoSettings, SourceType};
