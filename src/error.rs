//! Error taxonomy shared by the capture, inference and serving paths.
//!
//! `InitError` is fatal for the current boot. Every other error is local to
//! one loop iteration: logged, backed off and retried by whichever loop hit it.

use std::time::Duration;

/// Startup failures. The device halts with a diagnostic when one occurs.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("camera init failed: {0}")]
    Camera(String),
    #[error("display init failed: {0}")]
    Display(String),
    #[error("cannot allocate {depth} frame buffers of {slot_size} bytes")]
    PoolAllocation { depth: usize, slot_size: usize },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("network init failed: {0}")]
    Network(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("no frame buffer became available within {0:?}")]
    Timeout(Duration),
    #[error("camera hardware fault: {0}")]
    HardwareFault(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("JPEG decode failed: {0}")]
    DecodeFailed(String),
    #[error("geometry mismatch: {0}")]
    Geometry(String),
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(crate::PixelFormat),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier failed with code {code}")]
    Internal { code: i32 },
    #[error("signal read out of range: offset {offset} + {len} > {total}")]
    SignalOutOfRange {
        offset: usize,
        len: usize,
        total: usize,
    },
    #[error("classifier returned no labels")]
    NoLabels,
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("display write failed: {0}")]
    Io(#[from] std::io::Error),
}
