//! Text panel status display
//! Draws a fixed-size box with the latest label, confidence, address and
//! timings, replacing the previous contents on every render.

use std::io::Write;

use tracing::info;

use crate::display::{DisplaySink, DisplayStatus};
use crate::{DisplayConfig, DisplayError, InitError};

/// Clear screen and move the cursor home.
const CLEAR: &str = "\x1b[2J\x1b[H";

/// Status panel on any `Write` target (a serial console, a terminal).
pub struct TerminalDisplay<W: Write + Send> {
    out: W,
    title: String,
    width: usize,
}

impl<W: Write + Send> TerminalDisplay<W> {
    /// Open the panel and draw an empty frame to prove the target works.
    pub fn open(out: W, config: &DisplayConfig) -> Result<Self, InitError> {
        if config.width < 24 {
            return Err(InitError::Display(format!(
                "panel width {} is below the 24 column minimum",
                config.width
            )));
        }

        let mut panel = Self {
            out,
            title: config.title.clone(),
            width: config.width as usize,
        };
        panel
            .draw(&["starting..."])
            .map_err(|e| InitError::Display(e.to_string()))?;
        info!("Status display ready ({} columns)", panel.width);
        Ok(panel)
    }

    /// Consume the display, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, lines: &[&str]) -> Result<(), DisplayError> {
        let inner = self.width - 4;
        let mut panel = String::with_capacity((self.width + 1) * (lines.len() + 3));
        panel.push_str(CLEAR);

        panel.push('+');
        panel.push_str(&format!("{:-^width$}", format!(" {} ", self.title), width = self.width - 2));
        panel.push_str("+\n");
        for line in lines {
            let clipped: String = line.chars().take(inner).collect();
            panel.push_str(&format!("| {:<inner$} |\n", clipped, inner = inner));
        }
        panel.push('+');
        panel.push_str(&"-".repeat(self.width - 2));
        panel.push_str("+\n");

        self.out.write_all(panel.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> DisplaySink for TerminalDisplay<W> {
    fn render(&mut self, status: &DisplayStatus) -> Result<(), DisplayError> {
        let label = format!("{} {:.0}%", status.label, status.confidence * 100.0);
        let address = format!("http://{}", status.address);
        let timing = format!(
            "DSP {} ms  NN {} ms",
            status.timing.dsp.as_millis(),
            status.timing.classification.as_millis()
        );
        self.draw(&[&label, &address, &timing])
    }

    fn show_diagnostic(&mut self, message: &str) -> Result<(), DisplayError> {
        self.draw(&["ERROR", message])
    }
}
