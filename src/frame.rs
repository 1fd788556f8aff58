//! Camera frame container.
//!
//! A `Frame` is one immutable capture. It is owned by the verification loop for a
//! single sampling step and dropped afterwards; nothing retains frames across
//! steps. Pixel memory is zeroized on drop.

use std::time::{Duration, Instant};
use zeroize::Zeroize;

/// Immutable snapshot of one camera capture.
///
/// Deliberately not `Clone`: a frame has exactly one owner.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Per-source capture counter (1-based, as reported by the source).
    pub sequence: u64,

    captured_at: Instant,
}

impl Frame {
    /// Wrap captured pixels. Called by frame sources.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        }
    }

    /// Read-only pixel access for the oracle.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print pixel content.
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
