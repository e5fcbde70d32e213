//! External decoder process for remote-stream cameras
//!
//! The decoder reads the remote stream over TCP and writes concatenated JPEG
//! images to stdout. stderr is forwarded to the log line by line on its own
//! task so diagnostics never stall frame reads.
//!
//! A spawned [`DecoderProcess`] must end in [`DecoderProcess::shutdown`], which
//! kills and reaps the child. `kill_on_drop` covers the paths where the owning
//! task is torn down before it gets there.

use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Replaced by the camera URL in decoder arguments
pub const URL_PLACEHOLDER: &str = "{url}";

/// How long shutdown waits for the stderr forwarder to drain after the reap
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Program and argument template of the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl DecoderCommand {
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// ffmpeg reading RTSP over TCP and writing MJPEG to stdout
    pub fn ffmpeg() -> Self {
        Self::new(
            "ffmpeg",
            [
                "-rtsp_transport", "tcp",
                "-i", URL_PLACEHOLDER,
                "-f", "image2pipe",
                "-vcodec", "mjpeg",
                "-q:v", "5",
                "-loglevel", "error",
                "-",
            ],
        )
    }

    /// Same arguments, different executable (e.g. a pinned ffmpeg path)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn args_for(&self, url: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(URL_PLACEHOLDER, url))
            .collect()
    }
}

impl Default for DecoderCommand {
    fn default() -> Self {
        Self::ffmpeg()
    }
}

/// A running decoder
pub struct DecoderProcess {
    camera_id: String,
    child: Child,
    stdout: Option<ChildStdout>,
    stderr_task: Option<JoinHandle<usize>>,
}

impl DecoderProcess {
    /// Spawn the decoder for `url`
    pub fn spawn(command: &DecoderCommand, camera_id: &str, url: &str) -> io::Result<Self> {
        let mut child = Command::new(&command.program)
            .args(command.args_for(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "decoder stdout not captured"))?;

        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(forward_stderr(camera_id.to_string(), stderr)));

        tracing::debug!(
            camera_id = %camera_id,
            program = %command.program,
            pid = ?child.id(),
            "Decoder spawned"
        );

        Ok(Self {
            camera_id: camera_id.to_string(),
            child,
            stdout: Some(stdout),
            stderr_task,
        })
    }

    /// Frame output of the decoder; `None` once taken
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.stdout.take()
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Kill the decoder, wait for it to exit and drain its stderr.
    ///
    /// Returns the number of stderr lines forwarded to the log.
    pub async fn shutdown(mut self) -> usize {
        if let Err(e) = self.child.start_kill() {
            // Already exited; wait() below still reaps it
            tracing::trace!(camera_id = %self.camera_id, error = %e, "Decoder kill skipped");
        }

        match self.child.wait().await {
            Ok(status) => {
                tracing::debug!(camera_id = %self.camera_id, status = %status, "Decoder reaped");
            }
            Err(e) => {
                tracing::warn!(camera_id = %self.camera_id, error = %e, "Failed to reap decoder");
            }
        }

        let Some(mut task) = self.stderr_task.take() else {
            return 0;
        };

        // A grandchild may still hold the pipe open
        match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, &mut task).await {
            Ok(Ok(forwarded)) => forwarded,
            Ok(Err(e)) => {
                tracing::debug!(camera_id = %self.camera_id, error = %e, "Stderr forwarder failed");
                0
            }
            Err(_) => {
                tracing::debug!(camera_id = %self.camera_id, "Stderr still open after reap");
                task.abort();
                0
            }
        }
    }
}

async fn forward_stderr(camera_id: String, stderr: ChildStderr) -> usize {
    let mut lines = BufReader::new(stderr).lines();
    let mut forwarded = 0;
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                tracing::warn!(camera_id = %camera_id, line = %line, "Decoder stderr");
                forwarded += 1;
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(camera_id = %camera_id, error = %e, "Decoder stderr closed");
                break;
            }
        }
    }
    forwarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_ffmpeg_args_substitute_url() {
        let args = DecoderCommand::ffmpeg().args_for("rtsp://10.0.0.9/live");

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "rtsp://10.0.0.9/live");
        assert_eq!(args[0], "-rtsp_transport");
        assert_eq!(args[1], "tcp");
        assert_eq!(args.last().map(String::as_str), Some("-"));
    }

    #[tokio::test]
    async fn test_spawn_missing_program_fails() {
        let command = DecoderCommand::ffmpeg().with_program("/nonexistent/stream-decoder");
        assert!(DecoderProcess::spawn(&command, "cam1", "rtsp://x").is_err());
    }

    #[tokio::test]
    async fn test_stdout_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames.bin");
        std::fs::write(&path, b"hello").unwrap();

        let command = DecoderCommand::new("cat", [URL_PLACEHOLDER]);
        let mut process =
            DecoderProcess::spawn(&command, "cam1", path.to_str().unwrap()).unwrap();

        let mut out = Vec::new();
        process
            .take_stdout()
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert_eq!(out, b"hello");

        assert_eq!(process.shutdown().await, 0);
    }

    #[tokio::test]
    async fn test_shutdown_drains_stderr_after_exit() {
        let command = DecoderCommand::new(
            "sh",
            [
                "-c",
                "for i in 1 2 3 4 5 6 7 8; do echo \"line$i\" >&2; done; exit 1",
            ],
        );
        let mut process = DecoderProcess::spawn(&command, "cam1", "rtsp://x").unwrap();

        let mut out = Vec::new();
        process
            .take_stdout()
            .unwrap()
            .read_to_end(&mut out)
            .await
            .unwrap();
        assert!(out.is_empty());

        // Every line written before exit reaches the log, including the last
        assert_eq!(process.shutdown().await, 8);
    }
}
