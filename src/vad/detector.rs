//! Window-level speech/non-speech classification (spec §3, VAD Window).
//!
//! Wraps Silero VAD via `voice_activity_detector`, with an RMS-energy
//! fallback for windows that don't match the model's fixed chunk size.
//! A panic inside the model call is caught and treated as a per-window
//! inference failure (spec §4.3: "per-window inference failure degrades
//! the gate to bypass for the remainder of the session").

use std::panic::AssertUnwindSafe;

use voice_activity_detector::VoiceActivityDetector;

use crate::config::VadConfig;

/// Silero's fixed analysis chunk size at 16 kHz.
const SILERO_CHUNK_SAMPLES: usize = 512;

pub struct VadDetector {
    model: VoiceActivityDetector,
    config: VadConfig,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadResult {
    pub probability: f32,
    pub is_speech: bool,
    pub method: VadMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadMethod {
    Silero,
    Energy,
}

impl VadDetector {
    /// Loads the VAD model. Failure here is fatal at startup (spec §4.3).
    pub fn new(sample_rate: u32, config: VadConfig) -> Result<Self, String> {
        let model = VoiceActivityDetector::builder()
            .sample_rate(sample_rate)
            .chunk_size(SILERO_CHUNK_SAMPLES)
            .build()
            .map_err(|e| format!("failed to load VAD model: {e}"))?;
        Ok(Self { model, config })
    }

    /// Classifies one window. Returns `Err` only on an inference panic;
    /// the caller degrades to bypass mode on that signal.
    pub fn predict(&mut self, window: &[i16]) -> Result<VadResult, String> {
        if window.len() != SILERO_CHUNK_SAMPLES {
            return Ok(self.predict_energy(window));
        }

        let samples = window.to_vec();
        let model = &mut self.model;
        let threshold = self.config.threshold;
        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| model.predict(samples)));

        match outcome {
            Ok(probability) => Ok(VadResult {
                probability,
                is_speech: probability >= threshold,
                method: VadMethod::Silero,
            }),
            Err(_) => Err("VAD model inference panicked".to_string()),
        }
    }

    fn predict_energy(&self, window: &[i16]) -> VadResult {
        if window.is_empty() {
            return VadResult {
                probability: 0.0,
                is_speech: false,
                method: VadMethod::Energy,
            };
        }
        let sum_squares: f64 = window.iter().map(|&s| (s as f64) * (s as f64)).sum();
        let rms = (sum_squares / window.len() as f64).sqrt() / i16::MAX as f64;
        let probability = (rms as f32 / 0.15).clamp(0.0, 1.0);
        VadResult {
            probability,
            is_speech: rms as f32 > self.config.energy_fallback_threshold,
            method: VadMethod::Energy,
        }
    }

    pub fn reset(&mut self) {
        self.model.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_fallback_on_silence() {
        let config = VadConfig::default();
        let detector = VadDetector::new(16_000, config).unwrap();
        let silence = vec![0i16; 100];
        let result = detector.predict_energy(&silence);
        assert!(!result.is_speech);
        assert_eq!(result.method, VadMethod::Energy);
    }

    #[test]
    fn energy_fallback_on_loud_signal() {
        let config = VadConfig::default();
        let detector = VadDetector::new(16_000, config).unwrap();
        let loud: Vec<i16> = (0..100).map(|i| ((i as f32 * 0.3).sin() * 20000.0) as i16).collect();
        let result = detector.predict_energy(&loud);
        assert!(result.is_speech);
    }

    #[test]
    fn model_loads_for_standard_rate() {
        assert!(VadDetector::new(16_000, VadConfig::default()).is_ok());
    }
}
