//! MJPEG frame extraction from an unframed byte stream
//!
//! The decoder writes baseline JPEG images back-to-back with no length prefix
//! or container, so frames are recovered from their markers alone:
//!
//! 1. Skip bytes until the next two unread bytes are SOI (`FF D8`)
//! 2. Accumulate chunks of at most [`CHUNK_SIZE`] bytes after the SOI
//! 3. After every chunk, look for the first EOI (`FF D9`) past the SOI and cut
//!    the frame right after it
//!
//! Bytes of the final chunk that lie past the EOI are dropped under
//! [`TrailingBytes::Discard`] and kept as the start of the next search under
//! [`TrailingBytes::Retain`].

use bytes::Bytes;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Start-of-image marker
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// End-of-image marker
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Size of a single read from the underlying stream
const READ_BUFFER_SIZE: usize = 4096;
/// Bytes appended to the frame per EOI search
pub const CHUNK_SIZE: usize = 1024;

/// Handling of bytes that follow an EOI inside the same chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingBytes {
    /// Drop them; a frame starting inside that chunk is lost
    #[default]
    Discard,
    /// Keep them buffered for the next frame
    Retain,
}

/// Pulls complete JPEG frames out of an async byte stream
pub struct MjpegReader<R> {
    reader: R,
    pending: Vec<u8>,
    read_buf: Box<[u8]>,
    trailing: TrailingBytes,
    discarded: u64,
}

impl<R: AsyncRead + Unpin> MjpegReader<R> {
    pub fn new(reader: R, trailing: TrailingBytes) -> Self {
        Self {
            reader,
            pending: Vec::with_capacity(READ_BUFFER_SIZE),
            read_buf: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            trailing,
            discarded: 0,
        }
    }

    /// Next complete frame
    ///
    /// `Ok(None)` means the stream ended; a frame cut short by the end of the
    /// stream is dropped.
    pub async fn next_frame(&mut self) -> io::Result<Option<Bytes>> {
        if !self.seek_soi().await? {
            return Ok(None);
        }
        self.pending.drain(..SOI.len());

        let mut frame = SOI.to_vec();
        loop {
            let Some(chunk) = self.next_chunk().await? else {
                tracing::trace!(partial_len = frame.len(), "Stream ended inside a frame");
                return Ok(None);
            };

            // An EOI may straddle the previous chunk boundary
            let search_from = frame.len().saturating_sub(1).max(SOI.len());
            frame.extend_from_slice(&chunk);

            if let Some(offset) = find_marker(&frame[search_from..], &EOI) {
                let end = search_from + offset + EOI.len();
                let trailing = frame.split_off(end);
                self.handle_trailing(trailing);
                return Ok(Some(Bytes::from(frame)));
            }
        }
    }

    /// Bytes dropped after EOI markers so far
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded
    }

    /// Advance until `pending` starts with SOI. Returns false at end of stream.
    async fn seek_soi(&mut self) -> io::Result<bool> {
        loop {
            if let Some(pos) = find_marker(&self.pending, &SOI) {
                self.pending.drain(..pos);
                return Ok(true);
            }

            // A trailing 0xFF may be the first half of a marker
            let keep = usize::from(self.pending.last() == Some(&SOI[0]));
            let skip = self.pending.len() - keep;
            self.pending.drain(..skip);

            if self.fill().await? == 0 {
                return Ok(false);
            }
        }
    }

    async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.pending.is_empty() && self.fill().await? == 0 {
            return Ok(None);
        }
        let n = self.pending.len().min(CHUNK_SIZE);
        Ok(Some(self.pending.drain(..n).collect()))
    }

    async fn fill(&mut self) -> io::Result<usize> {
        let n = self.reader.read(&mut self.read_buf).await?;
        self.pending.extend_from_slice(&self.read_buf[..n]);
        Ok(n)
    }

    fn handle_trailing(&mut self, trailing: Vec<u8>) {
        if trailing.is_empty() {
            return;
        }
        match self.trailing {
            TrailingBytes::Discard => {
                self.discarded += trailing.len() as u64;
                tracing::trace!(bytes = trailing.len(), "Discarded bytes after EOI");
            }
            TrailingBytes::Retain => {
                let mut rest = trailing;
                rest.extend_from_slice(&self.pending);
                self.pending = rest;
            }
        }
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}
