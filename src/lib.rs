pub mod capture;
pub mod display;
pub mod error;
pub mod pipeline;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use capture::frame::{FrameBuffer, PixelFormat};
pub use capture::source::FrameSource;
pub use error::{CaptureError, ClassifierError, ConversionError, DisplayError, InitError};

/// Environment prefix for configuration overrides, e.g. `EDGECAM_SERVER__BIND`.
pub const ENV_PREFIX: &str = "EDGECAM";

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub inference: InferenceConfig,
    pub display: DisplayConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
}

/// Where frames come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Synthetic,
    V4l2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub sensor: SensorKind,
    /// V4L2 device path; empty means auto-detect.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub jpeg_quality: u8,
    /// Number of frame buffers the peripheral may have outstanding.
    pub pool_depth: u32,
    pub capture_timeout_ms: u64,
    /// Minimum spacing between synthetic frames.
    pub frame_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub input_width: u32,
    pub input_height: u32,
    pub idle_delay_ms: u64,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Panel width in character cells.
    pub width: u32,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_stream_clients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub serving_core: usize,
    pub inference_core: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sensor: SensorKind::Synthetic,
            device: String::new(),
            width: 320,
            height: 240,
            format: PixelFormat::Jpeg,
            jpeg_quality: 80,
            pool_depth: 2,
            capture_timeout_ms: 5_000,
            frame_interval_ms: 40,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            input_width: 96,
            input_height: 96,
            idle_delay_ms: 5,
            backoff_ms: 100,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 40,
            title: "edgecam".into(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:80".into(),
            max_stream_clients: 1,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            serving_core: 0,
            inference_core: 1,
        }
    }
}

impl CaptureConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }

    /// Bytes reserved per pool slot. Raw frames need the full RGB plane;
    /// JPEG frames are bounded by the same size in practice.
    pub fn slot_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl InferenceConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Config {
    /// Layer defaults, an optional TOML file and `EDGECAM_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_appliance_constants() {
        let config = Config::default();
        assert_eq!(config.capture.pool_depth, 2);
        assert_eq!(config.capture.format, PixelFormat::Jpeg);
        assert_eq!(config.server.bind, "0.0.0.0:80");
        assert_eq!(config.inference.input_width, 96);
        assert_eq!(config.capture.slot_size(), 320 * 240 * 3);
    }

    #[test]
    fn load_without_file_yields_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.capture.width, 320);
        assert_eq!(config.pipeline.inference_core, 1);
    }

    #[test]
    fn file_overrides_selected_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[capture]\npool_depth = 3\nwidth = 640\n\n[server]\nbind = \"127.0.0.1:8080\""
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.capture.pool_depth, 3);
        assert_eq!(config.capture.width, 640);
        assert_eq!(config.capture.height, 240);
        assert_eq!(config.server.bind, "127.0.0.1:8080");
        assert_eq!(config.server.max_stream_clients, 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/edgecam.toml")));
        assert!(result.is_err());
    }
}
