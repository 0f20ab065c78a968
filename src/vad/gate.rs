//! VAD Gate (spec §4.3, C3): classifies fixed-size windows consumed from
//! the ring buffer and streams assembled speech segments incrementally,
//! padded with pre-roll and hangover.
//!
//! Unlike the teacher's `SpeechBuffer` (which accumulates a whole segment
//! before returning it), this gate emits bytes the instant they are
//! committed to the current segment — required so the chunker downstream
//! can start filling a chunk without waiting for an entire utterance.

use std::collections::VecDeque;

use crate::config::VadConfig;

use super::detector::VadDetector;

/// Default analysis window duration (spec §4.3).
pub const DEFAULT_WINDOW_MS: u64 = 30;

/// Bytes per mono s16 sample.
const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateEvent {
    None,
    SegmentStarted,
    SegmentEnded,
}

#[derive(Debug, Default)]
pub struct GateOutput {
    pub bytes: Vec<u8>,
    pub event: GateEvent,
}

impl Default for GateEvent {
    fn default() -> Self {
        GateEvent::None
    }
}

enum Phase {
    Idle,
    Active { silence_run_ms: u64 },
}

pub struct VadGate {
    config: VadConfig,
    sample_rate: u32,
    window_ms: u64,
    window_bytes: usize,
    accum: Vec<u8>,
    preroll: VecDeque<u8>,
    preroll_cap: usize,
    phase: Phase,
    detector: Option<VadDetector>,
    bypass: bool,
    degraded_reported: bool,
}

impl VadGate {
    /// `detector: None` puts the gate permanently in bypass mode — the
    /// default when `vad.enabled = false` (spec §4.3 Bypass mode).
    pub fn new(sample_rate: u32, config: VadConfig, detector: Option<VadDetector>) -> Self {
        let window_ms = DEFAULT_WINDOW_MS;
        let window_samples = (sample_rate as u64 * window_ms / 1000) as usize;
        let window_bytes = window_samples * BYTES_PER_SAMPLE;
        let preroll_cap =
            (sample_rate as u64 * config.pre_roll_ms / 1000) as usize * BYTES_PER_SAMPLE;
        let bypass = detector.is_none();
        Self {
            config,
            sample_rate,
            window_ms,
            window_bytes: window_bytes.max(BYTES_PER_SAMPLE),
            accum: Vec::with_capacity(window_bytes),
            preroll: VecDeque::with_capacity(preroll_cap),
            preroll_cap,
            phase: Phase::Idle,
            detector,
            bypass,
            degraded_reported: false,
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Feeds newly-consumed bytes through the gate. May produce zero or
    /// more outputs depending on how many full windows complete this call.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<GateOutput> {
        if self.bypass {
            return vec![GateOutput {
                bytes: bytes.to_vec(),
                event: GateEvent::None,
            }];
        }

        self.accum.extend_from_slice(bytes);
        let mut outputs = Vec::new();
        while self.accum.len() >= self.window_bytes {
            let window: Vec<u8> = self.accum.drain(..self.window_bytes).collect();
            outputs.push(self.process_window(window));
        }
        outputs
    }

    fn process_window(&mut self, window: Vec<u8>) -> GateOutput {
        let samples = bytes_to_i16(&window);
        let is_speech = match self.detector.as_mut() {
            Some(detector) => match detector.predict(&samples) {
                Ok(result) => result.is_speech,
                Err(reason) => {
                    self.bypass = true;
                    if !self.degraded_reported {
                        log::error!("VAD inference failed, degrading to bypass: {reason}");
                        self.degraded_reported = true;
                    }
                    return GateOutput {
                        bytes: window,
                        event: GateEvent::None,
                    };
                }
            },
            None => false,
        };

        match &mut self.phase {
            Phase::Idle => {
                if is_speech {
                    self.phase = Phase::Active { silence_run_ms: 0 };
                    let mut out: Vec<u8> = self.preroll.drain(..).collect();
                    out.extend_from_slice(&window);
                    GateOutput {
                        bytes: out,
                        event: GateEvent::SegmentStarted,
                    }
                } else {
                    self.push_preroll(&window);
                    GateOutput {
                        bytes: Vec::new(),
                        event: GateEvent::None,
                    }
                }
            }
            Phase::Active { silence_run_ms } => {
                if is_speech {
                    *silence_run_ms = 0;
                    GateOutput {
                        bytes: window,
                        event: GateEvent::None,
                    }
                } else {
                    *silence_run_ms += self.window_ms;
                    if *silence_run_ms >= self.config.hangover_ms {
                        self.phase = Phase::Idle;
                        GateOutput {
                            bytes: window,
                            event: GateEvent::SegmentEnded,
                        }
                    } else {
                        GateOutput {
                            bytes: window,
                            event: GateEvent::None,
                        }
                    }
                }
            }
        }
    }

    fn push_preroll(&mut self, window: &[u8]) {
        if self.preroll_cap == 0 {
            return;
        }
        for &byte in window {
            if self.preroll.len() >= self.preroll_cap {
                self.preroll.pop_front();
            }
            self.preroll.push_back(byte);
        }
    }

    /// Terminates and flushes an in-progress segment at session stop
    /// (spec §4.3 edge case). Any partial, not-yet-classified tail bytes
    /// below one window's length are discarded rather than guessed at.
    pub fn flush(&mut self) -> Option<GateOutput> {
        match self.phase {
            Phase::Active { .. } => {
                self.phase = Phase::Idle;
                Some(GateOutput {
                    bytes: Vec::new(),
                    event: GateEvent::SegmentEnded,
                })
            }
            Phase::Idle => None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silent_window(bytes: usize) -> Vec<u8> {
        vec![0u8; bytes]
    }

    fn loud_window(bytes: usize) -> Vec<u8> {
        (0..bytes / 2)
            .flat_map(|i| {
                let sample = ((i as f32 * 0.5).sin() * 20000.0) as i16;
                sample.to_le_bytes()
            })
            .collect()
    }

    fn gate_with(config: VadConfig) -> VadGate {
        let detector = VadDetector::new(16_000, config.clone()).unwrap();
        VadGate::new(16_000, config, Some(detector))
    }

    #[test]
    fn bypass_mode_forwards_unchanged() {
        let mut gate = VadGate::new(16_000, VadConfig::default(), None);
        let input = vec![1u8, 2, 3, 4];
        let outputs = gate.push(&input);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].bytes, input);
        assert_eq!(outputs[0].event, GateEvent::None);
    }

    #[test]
    fn silence_emits_nothing() {
        let mut config = VadConfig::default();
        config.hangover_ms = 90;
        let mut gate = gate_with(config);
        let window_bytes = gate.window_bytes;
        let outputs = gate.push(&silent_window(window_bytes * 5));
        assert!(outputs.iter().all(|o| o.bytes.is_empty()));
        assert!(outputs.iter().all(|o| o.event == GateEvent::None));
    }

    #[test]
    fn speech_then_silence_emits_segment_with_hangover() {
        let mut config = VadConfig::default();
        config.pre_roll_ms = 0;
        config.hangover_ms = 60; // 2 windows at 30ms
        let mut gate = gate_with(config);
        let window_bytes = gate.window_bytes;

        let started = gate.push(&loud_window(window_bytes));
        assert!(started.iter().any(|o| o.event == GateEvent::SegmentStarted));

        // Two silent windows complete the hangover and end the segment.
        let mut ended = false;
        for _ in 0..3 {
            let out = gate.push(&silent_window(window_bytes));
            if out.iter().any(|o| o.event == GateEvent::SegmentEnded) {
                ended = true;
                break;
            }
        }
        assert!(ended);
    }

    #[test]
    fn flush_terminates_in_progress_segment() {
        let mut config = VadConfig::default();
        config.pre_roll_ms = 0;
        let mut gate = gate_with(config);
        let window_bytes = gate.window_bytes;
        gate.push(&loud_window(window_bytes));
        let flushed = gate.flush();
        assert!(matches!(
            flushed,
            Some(GateOutput {
                event: GateEvent::SegmentEnded,
                ..
            })
        ));
        assert!(gate.flush().is_none());
    }
}
