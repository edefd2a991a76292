//! Camera peripheral abstraction and the synthetic test-pattern sensor

use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::{debug, info};

use crate::capture::frame::{CapturedFrame, PixelFormat};
use crate::{CaptureConfig, CaptureError, InitError};

/// The camera driver as seen by the frame source.
///
/// `capture_into` fills one pool slot and reports how many bytes it wrote.
/// The frame source serializes calls, so implementations need no locking.
pub trait CameraSensor: Send {
    fn name(&self) -> &str;

    /// Bring the peripheral up for the configured geometry and format.
    fn start(&mut self, config: &CaptureConfig) -> Result<(), InitError>;

    fn capture_into(&mut self, buf: &mut [u8]) -> Result<CapturedFrame, CaptureError>;
}

/// Colour bars drifting across a tinted background, cycling the dominant
/// channel every `PHASE_FRAMES` frames.
pub struct SyntheticSensor {
    width: u32,
    height: u32,
    format: PixelFormat,
    quality: u8,
    interval: Duration,
    frame: u64,
    last: Option<Instant>,
    rgb: Vec<u8>,
    jpeg: Vec<u8>,
}

const PHASE_FRAMES: u64 = 75;

impl SyntheticSensor {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            format: PixelFormat::Jpeg,
            quality: 80,
            interval: Duration::ZERO,
            frame: 0,
            last: None,
            rgb: Vec::new(),
            jpeg: Vec::new(),
        }
    }

    fn render_pattern(&mut self) {
        let phase = ((self.frame / PHASE_FRAMES) % 3) as usize;
        let bar_x = (self.frame * 4) % self.width.max(1) as u64;
        let width = self.width as usize;

        for (i, px) in self.rgb.chunks_exact_mut(3).enumerate() {
            let x = (i % width) as u64;
            let y = (i / width) as u32;
            let shade = (y * 64 / self.height.max(1)) as u8;
            let mut rgb = [shade, shade, shade];
            rgb[phase] = 200u8.saturating_add(shade / 2);
            if x.abs_diff(bar_x) < 8 {
                rgb = [255, 255, 255];
            }
            px.copy_from_slice(&rgb);
        }
    }

    fn pace(&mut self) {
        if let Some(last) = self.last {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

impl Default for SyntheticSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraSensor for SyntheticSensor {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn start(&mut self, config: &CaptureConfig) -> Result<(), InitError> {
        if config.width == 0 || config.height == 0 {
            return Err(InitError::Camera(format!(
                "invalid frame size {}x{}",
                config.width, config.height
            )));
        }
        self.width = config.width;
        self.height = config.height;
        self.format = config.format;
        self.quality = config.jpeg_quality.clamp(1, 100);
        self.interval = Duration::from_millis(config.frame_interval_ms);
        self.rgb = vec![0; config.slot_size()];
        info!(
            "Synthetic sensor started: {}x{} {:?}",
            self.width, self.height, self.format
        );
        Ok(())
    }

    fn capture_into(&mut self, buf: &mut [u8]) -> Result<CapturedFrame, CaptureError> {
        if self.rgb.is_empty() {
            return Err(CaptureError::HardwareFault("sensor not started".into()));
        }
        self.pace();
        self.render_pattern();
        self.frame += 1;

        let payload = match self.format {
            PixelFormat::Rgb888 => &self.rgb,
            PixelFormat::Jpeg => {
                self.jpeg.clear();
                JpegEncoder::new_with_quality(&mut self.jpeg, self.quality)
                    .encode(&self.rgb, self.width, self.height, ExtendedColorType::Rgb8)
                    .map_err(|e| CaptureError::HardwareFault(e.to_string()))?;
                &self.jpeg
            }
        };

        if payload.len() > buf.len() {
            return Err(CaptureError::HardwareFault(format!(
                "frame of {} bytes exceeds slot of {}",
                payload.len(),
                buf.len()
            )));
        }
        buf[..payload.len()].copy_from_slice(payload);
        debug!(frame = self.frame, bytes = payload.len(), "synthetic frame");

        Ok(CapturedFrame {
            len: payload.len(),
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }
}
