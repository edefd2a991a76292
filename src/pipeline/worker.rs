//! Inference worker: the perpetual acquire → convert → classify → display
//! loop that owns the inference context.
//!
//! The loop is an explicit state machine. [`InferenceWorker::advance`] runs
//! exactly one state so tests can single-step it; [`InferenceWorker::run_cycle`]
//! runs one full cycle and reports the delay to apply; [`InferenceWorker::run`]
//! drives cycles forever.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::{FrameBuffer, FrameSource, ScratchBuffer};
use crate::display::{DisplaySink, DisplayStatus};
use crate::pipeline::classifier::{Classification, Classifier, Prediction};
use crate::pipeline::signal::Signal;
use crate::{ClassifierError, InferenceConfig};

/// Observable position in the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AcquireFrame,
    ConvertFrame,
    Classify,
    SelectTopLabel,
    UpdateDisplay,
    Idle,
    Backoff,
}

/// Stage at which a cycle was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Capture,
    Conversion,
    Classification,
}

enum State {
    AcquireFrame,
    ConvertFrame(FrameBuffer),
    Classify,
    SelectTopLabel(Classification),
    UpdateDisplay(Prediction),
    Idle(Prediction),
    Backoff(FailedStage),
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::AcquireFrame => Phase::AcquireFrame,
            State::ConvertFrame(_) => Phase::ConvertFrame,
            State::Classify => Phase::Classify,
            State::SelectTopLabel(_) => Phase::SelectTopLabel,
            State::UpdateDisplay(_) => Phase::UpdateDisplay,
            State::Idle(_) => Phase::Idle,
            State::Backoff(_) => Phase::Backoff,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Completed(Prediction),
    Failed(FailedStage),
}

/// One finished cycle and how long to wait before the next.
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    pub outcome: CycleOutcome,
    pub delay: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub cycles: u64,
    pub capture_failures: u64,
    pub conversion_failures: u64,
    pub classifier_failures: u64,
    pub display_failures: u64,
}

impl WorkerStats {
    pub fn failures(&self) -> u64 {
        self.capture_failures + self.conversion_failures + self.classifier_failures
    }
}

pub struct InferenceWorker<C, D> {
    source: Arc<FrameSource>,
    classifier: C,
    display: D,
    /// Only ever touched from the inference context.
    scratch: ScratchBuffer,
    address: String,
    idle_delay: Duration,
    backoff: Duration,
    state: State,
    shown: Option<DisplayStatus>,
    stats: WorkerStats,
}

impl<C: Classifier, D: DisplaySink> InferenceWorker<C, D> {
    /// Allocates the scratch buffer once, at the classifier's input size.
    pub fn new(
        source: Arc<FrameSource>,
        classifier: C,
        display: D,
        config: &InferenceConfig,
        address: impl Into<String>,
    ) -> Self {
        Self {
            source,
            classifier,
            display,
            scratch: ScratchBuffer::new(config.input_width, config.input_height),
            address: address.into(),
            idle_delay: config.idle_delay(),
            backoff: config.backoff(),
            state: State::AcquireFrame,
            shown: None,
            stats: WorkerStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// What the display last rendered successfully.
    pub fn display_state(&self) -> Option<&DisplayStatus> {
        self.shown.as_ref()
    }

    /// Execute the current state and return the phase that follows.
    pub fn advance(&mut self) -> Phase {
        let state = std::mem::replace(&mut self.state, State::AcquireFrame);
        self.state = match state {
            State::AcquireFrame => match self.source.acquire() {
                Ok(frame) => State::ConvertFrame(frame),
                Err(e) => {
                    self.stats.capture_failures += 1;
                    metrics::counter!("edgecam_inference_failures", "stage" => "capture")
                        .increment(1);
                    warn!("Capture failed: {}", e);
                    State::Backoff(FailedStage::Capture)
                }
            },
            State::ConvertFrame(frame) => {
                let (width, height) = (self.scratch.width(), self.scratch.height());
                let converted = self
                    .source
                    .convert_to_raw(&frame, width, height, &mut self.scratch)
                    .map(|_| ());
                self.source.release(frame);
                match converted {
                    Ok(()) => State::Classify,
                    Err(e) => {
                        self.stats.conversion_failures += 1;
                        metrics::counter!("edgecam_inference_failures", "stage" => "conversion")
                            .increment(1);
                        warn!("Frame conversion failed: {}", e);
                        State::Backoff(FailedStage::Conversion)
                    }
                }
            }
            State::Classify => {
                let signal = Signal::new(self.scratch.pixels());
                match self.classifier.classify(&signal) {
                    Ok(classification) => State::SelectTopLabel(classification),
                    Err(e) => self.classifier_failed(e),
                }
            }
            State::SelectTopLabel(classification) => {
                for (label, score) in &classification.scores {
                    debug!("  {}: {:.5}", label, score);
                }
                debug!(
                    "Timing: DSP {} ms, classification {} ms",
                    classification.timing.dsp.as_millis(),
                    classification.timing.classification.as_millis()
                );
                metrics::histogram!("edgecam_inference_dsp_us")
                    .record(classification.timing.dsp.as_micros() as f64);
                metrics::histogram!("edgecam_inference_classify_us")
                    .record(classification.timing.classification.as_micros() as f64);

                match classification.top() {
                    Some(prediction) => State::UpdateDisplay(prediction),
                    None => self.classifier_failed(ClassifierError::NoLabels),
                }
            }
            State::UpdateDisplay(prediction) => {
                let status = DisplayStatus {
                    label: prediction.label.clone(),
                    confidence: prediction.confidence,
                    address: self.address.clone(),
                    timing: prediction.timing,
                };
                match self.display.render(&status) {
                    Ok(()) => self.shown = Some(status),
                    Err(e) => {
                        self.stats.display_failures += 1;
                        warn!("Display update failed: {}", e);
                    }
                }
                self.stats.cycles += 1;
                info!(
                    "Prediction: {} ({:.2})",
                    prediction.label, prediction.confidence
                );
                State::Idle(prediction)
            }
            State::Idle(_) | State::Backoff(_) => State::AcquireFrame,
        };
        self.state.phase()
    }

    /// Advance until the cycle ends in `Idle` or `Backoff`, then rewind to
    /// `AcquireFrame` and report the outcome.
    pub fn run_cycle(&mut self) -> Cycle {
        loop {
            match self.advance() {
                Phase::Idle | Phase::Backoff => break,
                _ => continue,
            }
        }

        match std::mem::replace(&mut self.state, State::AcquireFrame) {
            State::Idle(prediction) => Cycle {
                outcome: CycleOutcome::Completed(prediction),
                delay: self.idle_delay,
            },
            State::Backoff(stage) => Cycle {
                outcome: CycleOutcome::Failed(stage),
                delay: self.backoff,
            },
            // The loop above only exits on Idle or Backoff
            other => {
                self.state = other;
                Cycle {
                    outcome: CycleOutcome::Failed(FailedStage::Capture),
                    delay: self.backoff,
                }
            }
        }
    }

    /// Run cycles until the device resets.
    pub fn run(mut self) -> ! {
        info!(
            "Inference worker running: {}x{} input, idle {:?}, backoff {:?}",
            self.scratch.width(),
            self.scratch.height(),
            self.idle_delay,
            self.backoff
        );
        loop {
            let cycle = self.run_cycle();
            std::thread::sleep(cycle.delay);
        }
    }

    fn classifier_failed(&mut self, e: ClassifierError) -> State {
        self.stats.classifier_failures += 1;
        metrics::counter!("edgecam_inference_failures", "stage" => "classification")
            .increment(1);
        warn!("Classification failed: {}", e);
        State::Backoff(FailedStage::Classification)
    }
}
