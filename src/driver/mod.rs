//! Device Driver abstraction (spec §4.1, C1).
//!
//! A driver opens a named input device and delivers fixed-size frames of
//! mono, signed 16-bit PCM at a configured sample rate via a callback
//! invoked on a driver-owned, real-time thread (I1: the callback never
//! allocates, never does network I/O, never blocks on synchronization).
//!
//! Three interchangeable variants exist: [`native::SystemNative`] and
//! [`portable::PortableCrossPlatform`] (both `cpal`-backed, differing only
//! in host selection) and [`synthetic::Synthetic`] (a deterministic
//! waveform generator used in tests without hardware). [`factory::build`]
//! selects one by explicit tag or auto-detection.

pub mod cpal_driver;
pub mod factory;
pub mod native;
pub mod portable;
pub mod resampler;
pub mod synthetic;

use std::sync::Arc;

use crate::error::DeviceError;

/// Identifies a capture endpoint (spec §3, Device Descriptor).
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub id: String,
    pub human_name: String,
    pub is_default: bool,
    pub max_input_channels: u16,
    pub default_sample_rate: u32,
}

/// Immutable capture configuration for the lifetime of a session (spec §3,
/// Audio Config). `frame_size_samples` is a driver-local constant chosen to
/// minimize latency; it is not required to equal the sender's chunk size.
#[derive(Debug, Clone, Copy)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_size_samples: usize,
}

impl AudioConfig {
    pub fn from_app_config(app: &crate::config::AppConfig) -> Self {
        let frame_size_samples =
            (app.sample_rate as u64 * app.frame_ms as u64 / 1000) as usize;
        Self {
            sample_rate: app.sample_rate,
            channels: app.channels,
            frame_size_samples: frame_size_samples.max(1),
        }
    }
}

/// Callback invoked on the driver's real-time thread with freshly
/// captured, mono, s16, target-rate samples. MUST NOT allocate, block, or
/// perform I/O beyond what the caller itself does (I1).
pub type FrameCallback = Arc<dyn Fn(&[i16]) + Send + Sync>;

/// Single-slot out-of-band error channel a driver posts to when a
/// runtime fault occurs inside the callback (spec §4.1 Failure modes,
/// §7: "posts them to a single-slot error channel that the controller
/// drains"). Kept distinct from [`FrameCallback`] so the hot frame path
/// never has to reason about error delivery; posting takes a brief
/// `std::sync::Mutex`, acceptable here since device faults are rare,
/// exceptional events rather than per-frame hot-path work.
#[derive(Clone)]
pub struct ErrorSlot {
    inner: Arc<std::sync::Mutex<Option<DeviceError>>>,
    notify: Arc<tokio::sync::Notify>,
}

impl Default for ErrorSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(None)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Posts an error, overwriting any unread one (the slot holds only the
    /// most recent fault; the controller is expected to react promptly).
    pub fn post(&self, err: DeviceError) {
        *self.inner.lock().unwrap() = Some(err);
        self.notify.notify_one();
    }

    /// Awaits the next posted error.
    pub async fn recv(&self) -> DeviceError {
        loop {
            if let Some(err) = self.inner.lock().unwrap().take() {
                return err;
            }
            self.notify.notified().await;
        }
    }
}

/// Capability interface common to all driver variants (spec §4.1).
///
/// A small trait object rather than an inheritance hierarchy — the
/// "Dynamic driver dispatch" re-architecture point: duck-typed subclasses
/// in the prototype become one interface with three concrete implementors
/// plus [`factory::build`].
pub trait Driver: Send {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError>;

    fn default_device(&self) -> Result<Option<DeviceDescriptor>, DeviceError>;

    /// Begins delivering frames. `on_frame` runs on a driver-owned thread
    /// that MUST be treated as real-time: it never suspends and never
    /// enters the async runtime. `errors` receives runtime faults that
    /// occur after `start` has returned successfully; the driver does not
    /// restart itself on such faults (spec §4.1).
    fn start(
        &mut self,
        config: AudioConfig,
        device_id: Option<&str>,
        on_frame: FrameCallback,
        errors: ErrorSlot,
    ) -> Result<(), DeviceError>;

    /// Stops delivery and joins the driver thread. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Downmixes interleaved multi-channel i16 samples to mono by arithmetic
/// mean (spec §9 Open Questions: downmix rule left implementation-defined;
/// mean is chosen here over left-channel-only since it uses all channels'
/// energy rather than discarding captured audio).
pub fn downmix_to_mono(interleaved: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let channels = channels as usize;
    interleaved
        .chunks(channels)
        .map(|frame| {
            let sum: i64 = frame.iter().map(|&s| s as i64).sum();
            (sum / frame.len() as i64) as i16
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo() {
        let stereo = [100i16, 0, -100, 100];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono, vec![50, 0]);
    }

    #[test]
    fn downmix_passthrough_for_mono() {
        let mono_in = [1i16, 2, 3];
        assert_eq!(downmix_to_mono(&mono_in, 1), vec![1, 2, 3]);
    }

    #[test]
    fn audio_config_computes_frame_size() {
        let mut app = crate::config::AppConfig::default();
        app.sample_rate = 16_000;
        app.frame_ms = 20;
        let cfg = AudioConfig::from_app_config(&app);
        assert_eq!(cfg.frame_size_samples, 320);
    }
}
