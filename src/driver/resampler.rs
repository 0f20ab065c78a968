//! Linear-interpolation resampler to a fixed target sample rate.
//!
//! Spec §4.1: "resampling uses linear interpolation (no anti-aliasing
//! filter required for speech at ≥16 kHz)". This replaces the teacher's
//! `rubato`-based sinc resampler — correct for its own Whisper-rate use
//! case, but higher-order than this core's documented algorithm calls
//! for, so `rubato` is dropped from the dependency set (see DESIGN.md).

pub struct LinearResampler {
    input_rate: u32,
    output_rate: u32,
    /// Fractional read position into the *next* call's input, carried
    /// across calls so resampling a stream of successive frames stays
    /// phase-continuous instead of restarting at zero each call.
    frac_pos: f64,
    /// Last sample of the previous call, used as the virtual sample at
    /// index -1 so interpolation is continuous across the call boundary.
    prev_last: Option<i16>,
}

impl LinearResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Self {
        Self {
            input_rate,
            output_rate,
            frac_pos: 0.0,
            prev_last: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.input_rate == self.output_rate
    }

    /// Resamples a contiguous span of mono i16 samples. Call repeatedly
    /// with successive spans from the same stream to keep phase continuous.
    pub fn process(&mut self, input: &[i16]) -> Vec<i16> {
        if self.is_identity() {
            return input.to_vec();
        }
        if input.is_empty() {
            return Vec::new();
        }

        let ratio = self.input_rate as f64 / self.output_rate as f64;
        let n = input.len() as i64;
        let get = |i: i64| -> i16 {
            if i < 0 {
                self.prev_last.unwrap_or(input[0])
            } else {
                input[i as usize]
            }
        };

        let mut out = Vec::with_capacity((n as f64 / ratio).ceil() as usize + 1);
        let mut pos = self.frac_pos;
        while pos < n as f64 {
            let base = pos.floor();
            let frac = pos - base;
            let i0 = base as i64;
            let s0 = get(i0);
            let s1 = get(i0 + 1);
            let interpolated = s0 as f64 + (s1 as f64 - s0 as f64) * frac;
            out.push(interpolated.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
            pos += ratio;
        }

        self.frac_pos = pos - n as f64;
        self.prev_last = Some(input[input.len() - 1]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passthrough() {
        let mut r = LinearResampler::new(16_000, 16_000);
        assert!(r.is_identity());
        assert_eq!(r.process(&[1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn downsamples_roughly_to_expected_length() {
        let mut r = LinearResampler::new(48_000, 16_000);
        let input = vec![1000i16; 4800];
        let out = r.process(&input);
        assert!((out.len() as i64 - 1600).abs() <= 2);
    }

    #[test]
    fn upsamples_roughly_to_expected_length() {
        let mut r = LinearResampler::new(8_000, 16_000);
        let input = vec![500i16; 1000];
        let out = r.process(&input);
        assert!((out.len() as i64 - 2000).abs() <= 2);
    }

    #[test]
    fn constant_signal_resamples_to_constant() {
        let mut r = LinearResampler::new(44_100, 16_000);
        let input = vec![777i16; 4410];
        let out = r.process(&input);
        assert!(out.iter().all(|&s| (s - 777).abs() <= 1));
    }

    #[test]
    fn continuous_across_calls_matches_single_call_length() {
        let mut streaming = LinearResampler::new(48_000, 16_000);
        let mut total = 0usize;
        for _ in 0..10 {
            total += streaming.process(&vec![1234i16; 480]).len();
        }
        // 10 * 480 = 4800 input samples @ 3:1 ratio => ~1600 output samples.
        assert!((total as i64 - 1600).abs() <= 2);
    }
}
