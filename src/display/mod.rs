pub mod terminal;

use std::time::Duration;

use crate::DisplayError;

pub use terminal::TerminalDisplay;

/// Per-cycle timing reported by the classifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    /// Feature extraction
    pub dsp: Duration,
    pub classification: Duration,
}

/// Everything the status surface shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayStatus {
    pub label: String,
    /// In `[0, 1]`
    pub confidence: f32,
    pub address: String,
    pub timing: Timing,
}

/// Status surface owned by the inference worker.
///
/// Every `render` fully replaces what was shown before and must complete in
/// bounded time.
pub trait DisplaySink: Send {
    fn render(&mut self, status: &DisplayStatus) -> Result<(), DisplayError>;

    /// Show a startup failure in place of the status panel.
    fn show_diagnostic(&mut self, message: &str) -> Result<(), DisplayError>;
}
