//! FrameRingBuffer - Latest-frame cache per camera
//!
//! ## Responsibilities
//!
//! - Keep the last N encoded frames of one camera with bounded memory
//! - Overwrite the oldest frame when full (the producer never blocks)
//! - Serve `latest()` peeks to the frame processor and HTTP handlers
//!
//! One capture task writes, any number of readers peek. All index math runs
//! under the same lock that protects reads.

use bytes::Bytes;
use tokio::sync::RwLock;

/// Default number of frames kept per camera
pub const DEFAULT_CAPACITY: usize = 30;

struct RingState {
    slots: Vec<Option<Bytes>>,
    head: usize,
    tail: usize,
    size: usize,
}

impl RingState {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            head: 0,
            tail: 0,
            size: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Fixed-capacity circular frame store
pub struct FrameRingBuffer {
    state: RwLock<RingState>,
}

impl FrameRingBuffer {
    /// Create a buffer holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(RingState::new(capacity.max(1))),
        }
    }

    /// Insert a frame, evicting the oldest one when full
    pub async fn push(&self, frame: Bytes) {
        let mut state = self.state.write().await;
        let capacity = state.capacity();

        let head = state.head;
        state.slots[head] = Some(frame);
        state.head = (head + 1) % capacity;

        if state.size < capacity {
            state.size += 1;
        } else {
            state.tail = (state.tail + 1) % capacity;
        }
    }

    /// Most recently pushed frame, without removing it
    pub async fn latest(&self) -> Option<Bytes> {
        let state = self.state.read().await;
        if state.size == 0 {
            return None;
        }

        let capacity = state.capacity();
        let idx = (state.head + capacity - 1) % capacity;
        state.slots[idx].clone()
    }

    /// Remove and return the oldest frame
    pub async fn pop(&self) -> Option<Bytes> {
        let mut state = self.state.write().await;
        if state.size == 0 {
            return None;
        }

        let capacity = state.capacity();
        let tail = state.tail;
        let frame = state.slots[tail].take();
        state.tail = (tail + 1) % capacity;
        state.size -= 1;

        frame
    }

    /// Number of frames currently held
    pub async fn size(&self) -> usize {
        self.state.read().await.size
    }

    pub async fn capacity(&self) -> usize {
        self.state.read().await.capacity()
    }

    /// Drop every frame and reset indices
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        let capacity = state.capacity();
        *state = RingState::new(capacity);
    }
}

impl Default for FrameRingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
