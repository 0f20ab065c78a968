//! `Synthetic` driver variant: deterministic waveforms paced in real time,
//! for exercising the ring buffer, VAD gate, chunker, sender, and session
//! controller without audio hardware (spec §4.1, §8 P3/P7).
//!
//! The waveform is selected through `device_id`: `"silence"` (default),
//! `"sine"` / `"sine:<hz>"`, or `"noise"`. Enumeration always reports
//! exactly these three endpoints so `--list-devices` works uniformly
//! across driver variants.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use rand::Rng;

use crate::error::DeviceError;

use super::{AudioConfig, DeviceDescriptor, Driver, ErrorSlot, FrameCallback};

#[derive(Debug, Clone, Copy)]
enum Waveform {
    Silence,
    Sine { freq_hz: f32 },
    WhiteNoise,
}

fn parse_device_id(device_id: Option<&str>) -> Waveform {
    match device_id {
        None | Some("silence") => Waveform::Silence,
        Some("noise") => Waveform::WhiteNoise,
        Some(id) if id == "sine" => Waveform::Sine { freq_hz: 440.0 },
        Some(id) if id.starts_with("sine:") => {
            let freq = id[5..].parse().unwrap_or(440.0);
            Waveform::Sine { freq_hz: freq }
        }
        Some(_) => Waveform::Silence,
    }
}

pub struct Synthetic {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Default for Synthetic {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthetic {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }
}

impl Driver for Synthetic {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        Ok(vec![
            DeviceDescriptor {
                id: "silence".to_string(),
                human_name: "Synthetic silence".to_string(),
                is_default: true,
                max_input_channels: 1,
                default_sample_rate: 16_000,
            },
            DeviceDescriptor {
                id: "sine".to_string(),
                human_name: "Synthetic 440Hz sine".to_string(),
                is_default: false,
                max_input_channels: 1,
                default_sample_rate: 16_000,
            },
            DeviceDescriptor {
                id: "noise".to_string(),
                human_name: "Synthetic white noise".to_string(),
                is_default: false,
                max_input_channels: 1,
                default_sample_rate: 16_000,
            },
        ])
    }

    fn default_device(&self) -> Result<Option<DeviceDescriptor>, DeviceError> {
        Ok(self.enumerate_devices()?.into_iter().find(|d| d.is_default))
    }

    fn start(
        &mut self,
        config: AudioConfig,
        device_id: Option<&str>,
        on_frame: FrameCallback,
        _errors: ErrorSlot,
    ) -> Result<(), DeviceError> {
        // The synthetic waveform generator has no underlying device to
        // lose, so it never posts to `_errors` — the parameter exists
        // only to satisfy the common `Driver` contract.
        let waveform = parse_device_id(device_id);
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let frame_size = config.frame_size_samples.max(1);
        let sample_rate = config.sample_rate;
        let frame_duration =
            Duration::from_secs_f64(frame_size as f64 / sample_rate.max(1) as f64);

        let handle = std::thread::Builder::new()
            .name("rtstt-synthetic-driver".to_string())
            .spawn(move || {
                let mut phase: f64 = 0.0;
                let phase_step = match waveform {
                    Waveform::Sine { freq_hz } => {
                        2.0 * std::f64::consts::PI * freq_hz as f64 / sample_rate as f64
                    }
                    _ => 0.0,
                };
                let mut rng = rand::thread_rng();
                let mut frame = vec![0i16; frame_size];

                while running_thread.load(Ordering::Relaxed) {
                    let started = std::time::Instant::now();
                    match waveform {
                        Waveform::Silence => frame.iter_mut().for_each(|s| *s = 0),
                        Waveform::Sine { .. } => {
                            for s in frame.iter_mut() {
                                *s = (phase.sin() * i16::MAX as f64 * 0.5) as i16;
                                phase += phase_step;
                            }
                        }
                        Waveform::WhiteNoise => {
                            for s in frame.iter_mut() {
                                *s = rng.gen_range(i16::MIN / 4..=i16::MAX / 4);
                            }
                        }
                    }
                    on_frame(&frame);

                    let elapsed = started.elapsed();
                    if elapsed < frame_duration {
                        std::thread::sleep(frame_duration - elapsed);
                    }
                }
            })
            .map_err(|e| DeviceError::StreamStartFailed(e.to_string()))?;

        self.running = running;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn is_running(&self) -> bool {
        self.handle.is_some() && self.running.load(Ordering::Acquire)
    }
}

impl Drop for Synthetic {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn silence_produces_zero_samples() {
        let mut driver = Synthetic::new();
        let collected: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        let config = AudioConfig {
            sample_rate: 16_000,
            channels: 1,
            frame_size_samples: 160,
        };
        driver
            .start(
                config,
                Some("silence"),
                Arc::new(move |samples: &[i16]| {
                    sink.lock().unwrap().extend_from_slice(samples);
                }),
                ErrorSlot::new(),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        driver.stop();
        assert!(collected.lock().unwrap().iter().all(|&s| s == 0));
        assert!(!collected.lock().unwrap().is_empty());
    }

    #[test]
    fn stop_is_idempotent_and_joins() {
        let mut driver = Synthetic::new();
        let config = AudioConfig {
            sample_rate: 16_000,
            channels: 1,
            frame_size_samples: 160,
        };
        driver
            .start(config, Some("silence"), Arc::new(|_: &[i16]| {}), ErrorSlot::new())
            .unwrap();
        driver.stop();
        driver.stop();
        assert!(!driver.is_running());
    }

    #[test]
    fn sine_produces_nonzero_varying_samples() {
        let mut driver = Synthetic::new();
        let collected: Arc<Mutex<Vec<i16>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = collected.clone();
        let config = AudioConfig {
            sample_rate: 16_000,
            channels: 1,
            frame_size_samples: 320,
        };
        driver
            .start(
                config,
                Some("sine:440"),
                Arc::new(move |samples: &[i16]| {
                    sink.lock().unwrap().extend_from_slice(samples);
                }),
                ErrorSlot::new(),
            )
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));
        driver.stop();
        let samples = collected.lock().unwrap();
        assert!(samples.iter().any(|&s| s != 0));
        assert!(samples.iter().any(|&s| s > 0) && samples.iter().any(|&s| s < 0));
    }
}
