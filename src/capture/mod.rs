pub mod convert;
pub mod frame;
pub mod pool;
pub mod sensor;
pub mod source;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use convert::{RawPixels, ScratchBuffer};
pub use frame::{CapturedFrame, FrameBuffer, PixelFormat};
pub use sensor::{CameraSensor, SyntheticSensor};
pub use source::FrameSource;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Sensor;
