//! RMS noise gate applied before frames leave the capture stage.

use crate::audio::frame::AudioFrame;

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// Discards frames whose RMS falls below a threshold.
#[derive(Debug, Clone, Copy)]
pub struct NoiseGate {
    enabled: bool,
    threshold: f32,
}

impl NoiseGate {
    pub fn new(enabled: bool, threshold: f32) -> Self {
        Self { enabled, threshold }
    }

    /// A gate that passes everything.
    pub fn open() -> Self {
        Self::new(false, 0.0)
    }

    pub fn admits(&self, frame: &AudioFrame) -> bool {
        !self.enabled || calculate_rms(&frame.samples) >= self.threshold
    }
}
