//! V4L2 MJPEG capture for Linux hosts with a real camera attached

use std::path::Path;

use tracing::{info, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::frame::{CapturedFrame, PixelFormat};
use crate::capture::sensor::CameraSensor;
use crate::{CaptureConfig, CaptureError, InitError};

pub struct V4l2Sensor {
    path: String,
    stream: Option<MmapStream<'static>>,
    device: Option<Device>,
    width: u32,
    height: u32,
}

impl V4l2Sensor {
    /// `path` may be empty, in which case the first MJPEG-capable device wins.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stream: None,
            device: None,
            width: 0,
            height: 0,
        }
    }
}

/// Find the first video capture device that offers MJPEG.
pub fn auto_detect_device() -> Option<String> {
    info!("Auto-detecting capture devices...");

    for i in 0..10 {
        let path = format!("/dev/video{}", i);
        if !Path::new(&path).exists() {
            continue;
        }

        let Ok(dev) = Device::with_path(&path) else {
            continue;
        };
        let Ok(caps) = dev.query_caps() else {
            continue;
        };
        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            continue;
        }
        if let Ok(formats) = dev.enum_formats() {
            if formats.iter().any(|fmt| fmt.fourcc == FourCC::new(b"MJPG")) {
                info!("Found MJPEG device: {} - {}", path, caps.card);
                return Some(path);
            }
        }
    }

    None
}

impl CameraSensor for V4l2Sensor {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn start(&mut self, config: &CaptureConfig) -> Result<(), InitError> {
        if config.format != PixelFormat::Jpeg {
            return Err(InitError::Camera("V4L2 sensor only captures MJPEG".into()));
        }
        if self.path.is_empty() {
            self.path = auto_detect_device()
                .ok_or_else(|| InitError::Camera("no MJPEG capture device found".into()))?;
        }

        let device = Device::with_path(&self.path)
            .map_err(|e| InitError::Camera(format!("{}: {}", self.path, e)))?;
        let caps = device
            .query_caps()
            .map_err(|e| InitError::Camera(e.to_string()))?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(InitError::Camera(
                "device doesn't support video capture".into(),
            ));
        }

        let mut fmt = device
            .format()
            .map_err(|e| InitError::Camera(e.to_string()))?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");
        let fmt = device
            .set_format(&fmt)
            .map_err(|e| InitError::Camera(e.to_string()))?;
        if (fmt.width, fmt.height) != (config.width, config.height) {
            warn!(
                "Driver chose {}x{} instead of {}x{}",
                fmt.width, fmt.height, config.width, config.height
            );
        }
        self.width = fmt.width;
        self.height = fmt.height;

        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, config.pool_depth)
            .map_err(|e| InitError::Camera(e.to_string()))?;
        info!("Capture stream started with {} buffers", config.pool_depth);

        self.stream = Some(stream);
        self.device = Some(device);
        Ok(())
    }

    fn capture_into(&mut self, buf: &mut [u8]) -> Result<CapturedFrame, CaptureError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| CaptureError::HardwareFault("stream not started".into()))?;

        let (data, meta) = stream
            .next()
            .map_err(|e| CaptureError::HardwareFault(e.to_string()))?;
        let len = (meta.bytesused as usize).min(data.len());
        if len > buf.len() {
            return Err(CaptureError::HardwareFault(format!(
                "frame of {} bytes exceeds slot of {}",
                len,
                buf.len()
            )));
        }
        buf[..len].copy_from_slice(&data[..len]);

        Ok(CapturedFrame {
            len,
            width: self.width,
            height: self.height,
            format: PixelFormat::Jpeg,
        })
    }
}
