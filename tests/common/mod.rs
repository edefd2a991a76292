//! Scripted stand-ins for the camera, classifier and display.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edgecam::capture::{CameraSensor, CapturedFrame, FrameSource};
use edgecam::display::{DisplaySink, DisplayStatus, Timing};
use edgecam::pipeline::{Classification, Classifier, Signal};
use edgecam::{
    CaptureConfig, CaptureError, ClassifierError, DisplayError, InferenceConfig, InitError,
    PixelFormat,
};

pub const WIDTH: u32 = 8;
pub const HEIGHT: u32 = 6;

/// What the scripted sensor does on its next capture.
#[derive(Debug, Clone)]
pub enum Shot {
    /// A solid RGB888 frame.
    Solid([u8; 3]),
    Fault,
    /// Bytes that claim to be JPEG but are not.
    CorruptJpeg,
}

/// Plays back a script of shots, then keeps producing grey frames.
#[derive(Clone, Default)]
pub struct ScriptedSensor {
    script: Arc<Mutex<VecDeque<Shot>>>,
    captures: Arc<Mutex<u64>>,
}

impl ScriptedSensor {
    pub fn new(shots: impl IntoIterator<Item = Shot>) -> Self {
        Self {
            script: Arc::new(Mutex::new(shots.into_iter().collect())),
            captures: Arc::default(),
        }
    }

    pub fn push(&self, shot: Shot) {
        self.script.lock().unwrap().push_back(shot);
    }

    pub fn captures(&self) -> u64 {
        *self.captures.lock().unwrap()
    }
}

impl CameraSensor for ScriptedSensor {
    fn name(&self) -> &str {
        "scripted"
    }

    fn start(&mut self, _config: &CaptureConfig) -> Result<(), InitError> {
        Ok(())
    }

    fn capture_into(&mut self, buf: &mut [u8]) -> Result<CapturedFrame, CaptureError> {
        *self.captures.lock().unwrap() += 1;
        let shot = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Shot::Solid([128, 128, 128]));

        match shot {
            Shot::Solid(rgb) => {
                let len = (WIDTH * HEIGHT * 3) as usize;
                for px in buf[..len].chunks_exact_mut(3) {
                    px.copy_from_slice(&rgb);
                }
                Ok(CapturedFrame {
                    len,
                    width: WIDTH,
                    height: HEIGHT,
                    format: PixelFormat::Rgb888,
                })
            }
            Shot::Fault => Err(CaptureError::HardwareFault("i2c timeout".into())),
            Shot::CorruptJpeg => {
                buf[..4].copy_from_slice(&[0xFF, 0xD8, 0x00, 0x00]);
                Ok(CapturedFrame {
                    len: 4,
                    width: WIDTH,
                    height: HEIGHT,
                    format: PixelFormat::Jpeg,
                })
            }
        }
    }
}

pub fn capture_config(pool_depth: u32) -> CaptureConfig {
    CaptureConfig {
        width: WIDTH,
        height: HEIGHT,
        format: PixelFormat::Rgb888,
        pool_depth,
        capture_timeout_ms: 5_000,
        frame_interval_ms: 0,
        ..CaptureConfig::default()
    }
}

pub fn scripted_source(
    pool_depth: u32,
    shots: impl IntoIterator<Item = Shot>,
) -> (Arc<FrameSource>, ScriptedSensor) {
    let sensor = ScriptedSensor::new(shots);
    let source = FrameSource::initialize(&capture_config(pool_depth), Box::new(sensor.clone()))
        .expect("scripted source");
    (Arc::new(source), sensor)
}

pub fn inference_config() -> InferenceConfig {
    InferenceConfig {
        input_width: 4,
        input_height: 4,
        idle_delay_ms: 0,
        backoff_ms: 0,
    }
}

/// Returns queued results, then repeats the last successful scores.
pub struct ScriptedClassifier {
    results: VecDeque<Result<Vec<(&'static str, f32)>, ClassifierError>>,
    fallback: Vec<(&'static str, f32)>,
    pub signal_lengths: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedClassifier {
    pub fn new(
        results: impl IntoIterator<Item = Result<Vec<(&'static str, f32)>, ClassifierError>>,
    ) -> Self {
        Self {
            results: results.into_iter().collect(),
            fallback: vec![("background", 0.9), ("object", 0.1)],
            signal_lengths: Arc::default(),
        }
    }

    pub fn always(scores: Vec<(&'static str, f32)>) -> Self {
        let mut classifier = Self::new([]);
        classifier.fallback = scores;
        classifier
    }
}

impl Classifier for ScriptedClassifier {
    fn classify(&mut self, signal: &Signal<'_>) -> Result<Classification, ClassifierError> {
        // Pull the whole signal the way a model would.
        let mut values = vec![0.0; signal.total_length()];
        signal.get_data(0, &mut values)?;
        self.signal_lengths.lock().unwrap().push(values.len());

        let scores = match self.results.pop_front() {
            Some(result) => result?,
            None => self.fallback.clone(),
        };
        Ok(Classification {
            scores: scores
                .into_iter()
                .map(|(label, score)| (label.to_string(), score))
                .collect(),
            timing: Timing {
                dsp: Duration::from_millis(2),
                classification: Duration::from_millis(30),
            },
        })
    }
}

/// Records every status it is asked to render. While `unplugged` is set,
/// renders fail and nothing is recorded.
#[derive(Clone, Default)]
pub struct RecordingDisplay {
    pub rendered: Arc<Mutex<Vec<DisplayStatus>>>,
    pub diagnostics: Arc<Mutex<Vec<String>>>,
    pub unplugged: Arc<AtomicBool>,
}

impl RecordingDisplay {
    pub fn unplug(&self, unplugged: bool) {
        self.unplugged.store(unplugged, Ordering::SeqCst);
    }

    pub fn renders(&self) -> usize {
        self.rendered.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<DisplayStatus> {
        self.rendered.lock().unwrap().last().cloned()
    }
}

impl DisplaySink for RecordingDisplay {
    fn render(&mut self, status: &DisplayStatus) -> Result<(), DisplayError> {
        if self.unplugged.load(Ordering::SeqCst) {
            return Err(DisplayError::Io(std::io::Error::other("panel unplugged")));
        }
        self.rendered.lock().unwrap().push(status.clone());
        Ok(())
    }

    fn show_diagnostic(&mut self, message: &str) -> Result<(), DisplayError> {
        self.diagnostics.lock().unwrap().push(message.to_string());
        Ok(())
    }
}
