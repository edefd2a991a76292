//! Classifier seam and arg-max selection

use std::time::Instant;

use crate::display::Timing;
use crate::pipeline::signal::{unpack_rgb, Signal};
use crate::ClassifierError;

/// Output of one classification, in the classifier's label order.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub scores: Vec<(String, f32)>,
    pub timing: Timing,
}

/// The winning label of a classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub label: String,
    pub confidence: f32,
    pub timing: Timing,
}

/// An externally supplied model. It reads its input through `signal` and
/// returns one score in `[0, 1]` per label.
pub trait Classifier: Send {
    fn classify(&mut self, signal: &Signal<'_>) -> Result<Classification, ClassifierError>;
}

/// Linear arg-max. Only a strictly greater score replaces the current best,
/// so ties keep the earliest label.
pub fn select_top_label(scores: &[(String, f32)]) -> Option<(usize, &str, f32)> {
    let (first_label, first_score) = scores.first()?;
    let mut best = (0, first_label.as_str(), *first_score);
    for (index, (label, score)) in scores.iter().enumerate().skip(1) {
        if *score > best.2 {
            best = (index, label.as_str(), *score);
        }
    }
    Some(best)
}

impl Classification {
    pub fn top(&self) -> Option<Prediction> {
        select_top_label(&self.scores).map(|(index, label, confidence)| Prediction {
            index,
            label: label.to_string(),
            confidence,
            timing: self.timing,
        })
    }
}

/// Scores `red`, `green` and `blue` by each channel's share of the mean
/// frame colour. Stands in for a trained model on hosts without one.
pub struct MeanColorClassifier {
    labels: [String; 3],
    chunk: Vec<f32>,
}

impl MeanColorClassifier {
    pub fn new() -> Self {
        Self {
            labels: ["red".into(), "green".into(), "blue".into()],
            chunk: Vec::new(),
        }
    }
}

impl Default for MeanColorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for MeanColorClassifier {
    fn classify(&mut self, signal: &Signal<'_>) -> Result<Classification, ClassifierError> {
        let total = signal.total_length();
        if total == 0 {
            return Err(ClassifierError::Internal { code: -1 });
        }

        // Feature extraction: pull one row at a time.
        let dsp_start = Instant::now();
        let row = signal.width().max(1) as usize;
        self.chunk.resize(row, 0.0);
        let mut sums = [0u64; 3];
        let mut offset = 0;
        while offset < total {
            let len = row.min(total - offset);
            signal.get_data(offset, &mut self.chunk[..len])?;
            for value in &self.chunk[..len] {
                let rgb = unpack_rgb(*value);
                for (sum, channel) in sums.iter_mut().zip(rgb) {
                    *sum += channel as u64;
                }
            }
            offset += len;
        }
        let dsp = dsp_start.elapsed();

        let classify_start = Instant::now();
        let sum: u64 = sums.iter().sum();
        let scores = self
            .labels
            .iter()
            .zip(sums)
            .map(|(label, channel)| {
                let score = if sum == 0 {
                    1.0 / 3.0
                } else {
                    channel as f32 / sum as f32
                };
                (label.clone(), score)
            })
            .collect();
        let classification = classify_start.elapsed();

        Ok(Classification {
            scores,
            timing: Timing {
                dsp,
                classification,
            },
        })
    }
}
