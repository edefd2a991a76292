//! Frame source adapter: the single point of contention between the
//! streaming path and the inference path.
//!
//! Both contexts call [`FrameSource::acquire`] independently. The pool behind
//! it hands out at most `depth` buffers; when every slot is on loan, acquire
//! blocks until a peer releases one or the capture timeout fires. That block
//! is the back-pressure mechanism, not an error.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, trace};

use crate::capture::convert::{self, RawPixels, ScratchBuffer};
use crate::capture::frame::{FrameBuffer, FrameMetadata, PixelFormat};
use crate::capture::pool::{FramePool, PoolStats};
use crate::capture::sensor::CameraSensor;
use crate::{CaptureConfig, CaptureError, ConversionError, InitError};

pub struct FrameSource {
    sensor: Mutex<Box<dyn CameraSensor>>,
    pool: Arc<FramePool>,
    format: PixelFormat,
    timeout: Duration,
    sequence: AtomicU64,
}

impl FrameSource {
    /// Bring the peripheral up and allocate the buffer pool. Called once.
    pub fn initialize(
        config: &CaptureConfig,
        mut sensor: Box<dyn CameraSensor>,
    ) -> Result<Self, InitError> {
        info!(
            "Initializing frame source: {} {}x{} {:?}, {} buffers",
            sensor.name(),
            config.width,
            config.height,
            config.format,
            config.pool_depth
        );

        if config.width == 0 || config.height == 0 {
            return Err(InitError::Config(format!(
                "invalid capture size {}x{}",
                config.width, config.height
            )));
        }

        let pool = FramePool::new(config.pool_depth as usize, config.slot_size())?;
        sensor.start(config)?;

        Ok(Self {
            sensor: Mutex::new(sensor),
            pool: Arc::new(pool),
            format: config.format,
            timeout: config.capture_timeout(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Take a free buffer and have the sensor fill it.
    ///
    /// Blocks until a slot frees up or the capture timeout elapses. A sensor
    /// failure puts the slot straight back.
    #[instrument(level = "trace", skip(self))]
    pub fn acquire(&self) -> Result<FrameBuffer, CaptureError> {
        let mut slot = self.pool.checkout(self.timeout)?;
        let timestamp = Instant::now();

        let captured = {
            let mut sensor = match self.sensor.lock() {
                Ok(sensor) => sensor,
                Err(_) => {
                    self.pool.checkin(slot);
                    return Err(CaptureError::HardwareFault("sensor lock poisoned".into()));
                }
            };
            sensor.capture_into(&mut slot.data)
        };

        let captured = match captured {
            Ok(captured) if captured.len == 0 => {
                self.pool.checkin(slot);
                return Err(CaptureError::HardwareFault("sensor returned an empty frame".into()));
            }
            Ok(captured) if captured.len > slot.data.len() => {
                let slot_len = slot.data.len();
                self.pool.checkin(slot);
                return Err(CaptureError::HardwareFault(format!(
                    "sensor reported {} bytes for a {} byte slot",
                    captured.len, slot_len
                )));
            }
            Ok(captured) => captured,
            Err(e) => {
                self.pool.checkin(slot);
                metrics::counter!("edgecam_capture_failures").increment(1);
                return Err(e);
            }
        };

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(sequence, slot = slot.index, bytes = captured.len, "frame acquired");
        metrics::counter!("edgecam_frames_acquired").increment(1);

        let meta = FrameMetadata {
            sequence,
            width: captured.width,
            height: captured.height,
            format: captured.format,
            timestamp,
        };
        Ok(FrameBuffer::new(slot, captured.len, meta, self.pool.clone()))
    }

    /// Return a buffer to the pool.
    pub fn release(&self, frame: FrameBuffer) {
        trace!(slot = frame.slot_index(), "frame released");
        drop(frame);
    }

    /// Decode `frame` and fit it to `target_width` x `target_height` inside
    /// `scratch`, cropping and resampling when the geometry differs.
    pub fn convert_to_raw<'s>(
        &self,
        frame: &FrameBuffer,
        target_width: u32,
        target_height: u32,
        scratch: &'s mut ScratchBuffer,
    ) -> Result<RawPixels<'s>, ConversionError> {
        if scratch.width() != target_width || scratch.height() != target_height {
            return Err(ConversionError::Geometry(format!(
                "scratch is {}x{}, target is {}x{}",
                scratch.width(),
                scratch.height(),
                target_width,
                target_height
            )));
        }

        match frame.format() {
            PixelFormat::Jpeg => {
                let (pixels, width, height) = convert::decode_frame(frame.data(), frame.format())?;
                if (width, height) != (frame.width(), frame.height()) {
                    return Err(ConversionError::Geometry(format!(
                        "decoded {}x{}, frame reports {}x{}",
                        width,
                        height,
                        frame.width(),
                        frame.height()
                    )));
                }
                debug!(width, height, "decoded frame {}", frame.meta().sequence);
                convert::crop_and_resample(&pixels, width, height, scratch)
            }
            PixelFormat::Rgb888 => {
                convert::crop_and_resample(frame.data(), frame.width(), frame.height(), scratch)
            }
        }
    }

    /// Pixel format the sensor was started with.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pool_depth(&self) -> usize {
        self.pool.depth()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Buffers currently free in the pool.
    pub fn available(&self) -> usize {
        self.pool.available()
    }
}
