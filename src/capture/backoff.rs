//! Reconnect backoff for remote-stream cameras

use std::time::Duration;

/// First reconnect delay
pub const BACKOFF_FLOOR: Duration = Duration::from_secs(1);
/// Upper bound of the reconnect delay
pub const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Doubling delay, reset whenever an attempt reaches the connected state
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    current: Duration,
    floor: Duration,
    cap: Duration,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_bounds(BACKOFF_FLOOR, BACKOFF_CAP)
    }

    pub fn with_bounds(floor: Duration, cap: Duration) -> Self {
        Self {
            current: floor,
            floor,
            cap: cap.max(floor),
        }
    }

    /// Delay to wait before the next attempt; doubles the one after it
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.cap);
        delay
    }

    /// Back to the floor after a successful connect
    pub fn reset(&mut self) {
        self.current = self.floor;
    }

    pub fn current(&self) -> Duration {
        self.current
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}
