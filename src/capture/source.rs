//! Capture sources, one per camera source type
//!
//! - `Demo`: synthetic gradient frames on a fixed cadence
//! - `LocalDevice`: device capture is not implemented; runs the demo source
//! - `RemoteStream`: external decoder + MJPEG extraction with reconnect backoff

use bytes::Bytes;
use chrono::Utc;
use tokio::io::AsyncRead;
use tokio::time::MissedTickBehavior;

use super::backoff::ReconnectBackoff;
use super::camera::CaptureSink;
use super::decoder::{DecoderCommand, DecoderProcess};
use super::demo_frame::generate_demo_frame;
use super::mjpeg::{MjpegReader, TrailingBytes};
use super::types::{CapturePhase, CaptureSettings, DemoSettings, SourceType};

/// Frame producer of a camera
pub enum CaptureSource {
    Demo(DemoSource),
    LocalDevice(LocalDeviceSource),
    RemoteStream(RemoteStreamSource),
}

impl CaptureSource {
    pub fn for_type(source_type: SourceType, settings: &CaptureSettings) -> Self {
        match source_type {
            SourceType::Demo => CaptureSource::Demo(DemoSource::new(settings.demo.clone())),
            SourceType::LocalDevice => {
                CaptureSource::LocalDevice(LocalDeviceSource::new(settings.demo.clone()))
            }
            SourceType::RemoteStream => CaptureSource::RemoteStream(RemoteStreamSource::new(
                settings.decoder.clone(),
                settings.trailing_bytes,
            )),
        }
    }

    /// Capture until the sink is cancelled or the source gives up
    pub async fn run(&self, sink: &CaptureSink) {
        match self {
            CaptureSource::Demo(source) => source.run(sink).await,
            CaptureSource::LocalDevice(source) => source.run(sink).await,
            CaptureSource::RemoteStream(source) => source.run(sink).await,
        }
    }
}

// ----------------------------------------------------------------------------
// Demo
// ----------------------------------------------------------------------------

pub struct DemoSource {
    settings: DemoSettings,
}

impl DemoSource {
    pub fn new(settings: DemoSettings) -> Self {
        Self { settings }
    }

    pub async fn run(&self, sink: &CaptureSink) {
        // Synthetic frames are available immediately
        sink.mark_connected().await;

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = sink.cancelled() => break,
                _ = ticker.tick() => {
                    if let Some(frame) = self.render().await {
                        sink.push_frame(frame).await;
                    }
                }
            }
        }
    }

    async fn render(&self) -> Option<Bytes> {
        let DemoSettings {
            width,
            height,
            quality,
            ..
        } = self.settings;
        let now_ms = Utc::now().timestamp_millis();

        match tokio::task::spawn_blocking(move || generate_demo_frame(width, height, quality, now_ms)).await {
            Ok(Ok(jpeg)) => Some(Bytes::from(jpeg)),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Demo frame encoding failed");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Demo frame task failed");
                None
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Local device
// ----------------------------------------------------------------------------

pub struct LocalDeviceSource {
    fallback: DemoSource,
}

impl LocalDeviceSource {
    pub fn new(settings: DemoSettings) -> Self {
        Self {
            fallback: DemoSource::new(settings),
        }
    }

    pub async fn run(&self, sink: &CaptureSink) {
        tracing::warn!(
            camera_id = %sink.camera_id(),
            "Local device capture not implemented, using demo frames"
        );
        self.fallback.run(sink).await;
    }
}

// ----------------------------------------------------------------------------
// Remote stream
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamOutcome {
    /// Decoder output ended or failed
    Disconnected,
    /// Stop requested while reading
    Cancelled,
}

pub struct RemoteStreamSource {
    decoder: DecoderCommand,
    trailing: TrailingBytes,
}

impl RemoteStreamSource {
    pub fn new(decoder: DecoderCommand, trailing: TrailingBytes) -> Self {
        Self { decoder, trailing }
    }

    pub async fn run(&self, sink: &CaptureSink) {
        let camera_id = sink.camera_id();
        let url = sink.url();

        if url.trim().is_empty() {
            tracing::error!(camera_id = %camera_id, "Remote stream URL is empty");
            return;
        }

        let mut backoff = ReconnectBackoff::new();

        while !sink.is_cancelled() {
            sink.set_phase(CapturePhase::Connecting).await;
            tracing::info!(camera_id = %camera_id, url = %url, "Connecting to remote stream");

            match DecoderProcess::spawn(&self.decoder, camera_id, url) {
                Ok(mut process) => {
                    if sink.mark_connected().await {
                        backoff.reset();
                        tracing::info!(
                            camera_id = %camera_id,
                            pid = ?process.id(),
                            "Connected to remote stream"
                        );
                    }

                    let outcome = match process.take_stdout() {
                        Some(stdout) => self.pump_frames(stdout, sink).await,
                        None => StreamOutcome::Disconnected,
                    };

                    process.shutdown().await;

                    if outcome == StreamOutcome::Cancelled {
                        break;
                    }

                    sink.mark_disconnected().await;
                    tracing::warn!(
                        camera_id = %camera_id,
                        url = %url,
                        "Remote stream disconnected, reconnecting"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        camera_id = %camera_id,
                        program = %self.decoder.program,
                        error = %e,
                        "Failed to start decoder"
                    );
                }
            }

            let delay = backoff.next_delay();
            sink.set_reconnect_delay(delay).await;
            tracing::debug!(camera_id = %camera_id, delay_ms = delay.as_millis() as u64, "Reconnect backoff");

            tokio::select! {
                _ = sink.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(camera_id = %camera_id, "Remote stream capture finished");
    }

    /// Push frames until the decoder output ends or the run is cancelled
    async fn pump_frames<R>(&self, stdout: R, sink: &CaptureSink) -> StreamOutcome
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = MjpegReader::new(stdout, self.trailing);
        let mut frames: u64 = 0;

        let outcome = loop {
            let next = tokio::select! {
                _ = sink.cancelled() => break StreamOutcome::Cancelled,
                next = reader.next_frame() => next,
            };

            match next {
                Ok(Some(frame)) => {
                    frames += 1;
                    sink.push_frame(frame).await;
                }
                Ok(None) => {
                    tracing::debug!(camera_id = %sink.camera_id(), "Decoder output ended");
                    break StreamOutcome::Disconnected;
                }
                Err(e) => {
                    tracing::warn!(camera_id = %sink.camera_id(), error = %e, "Decoder read failed");
                    break StreamOutcome::Disconnected;
                }
            }
        };

        tracing::debug!(
            camera_id = %sink.camera_id(),
            frames = frames,
            discarded_bytes = reader.discarded_bytes(),
            "Frame extraction ended"
        );

        outcome
    }
}
