use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::pool::{FramePool, Slot};

/// Pixel formats the capture path produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Compressed JPEG, as streamed to browsers.
    Jpeg,
    /// Packed 8-bit RGB, 3 bytes per pixel, row-major.
    Rgb888,
}

/// What a sensor reports after filling a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedFrame {
    pub len: usize,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

/// One pool slot on loan to a consumer.
///
/// The handle is not `Clone`: exactly one consumer owns the slot between
/// acquire and release. Releasing consumes the handle; dropping an unreleased
/// handle returns the slot as well, so no code path can leak it.
pub struct FrameBuffer {
    slot: Option<Slot>,
    len: usize,
    meta: FrameMetadata,
    pool: Arc<FramePool>,
}

impl FrameBuffer {
    pub(crate) fn new(slot: Slot, len: usize, meta: FrameMetadata, pool: Arc<FramePool>) -> Self {
        Self {
            slot: Some(slot),
            len,
            meta,
            pool,
        }
    }

    /// Exactly `len()` bytes of frame data.
    pub fn data(&self) -> &[u8] {
        self.slot
            .as_ref()
            .map(|slot| &slot.data[..self.len])
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn format(&self) -> PixelFormat {
        self.meta.format
    }

    pub fn meta(&self) -> &FrameMetadata {
        &self.meta
    }

    /// Index of the pool slot backing this buffer.
    pub fn slot_index(&self) -> usize {
        self.slot.as_ref().map_or(usize::MAX, |slot| slot.index)
    }

    /// Copy the frame out so it can outlive the slot (HTTP bodies).
    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(self.data())
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            self.pool.checkin(slot);
        }
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("slot", &self.slot_index())
            .field("len", &self.len)
            .field("meta", &self.meta)
            .finish()
    }
}
