//! Shared `cpal`-backed implementation for [`native::SystemNative`] and
//! [`portable::PortableCrossPlatform`] (spec §4.1). The two variants
//! differ only in which `cpal::Host` they pick; the stream construction,
//! format conversion, and thread lifecycle are identical, so that logic
//! lives here once and each variant is a thin [`HostStrategy`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, StreamConfig};

use crate::error::DeviceError;

use super::resampler::LinearResampler;
use super::{downmix_to_mono, AudioConfig, DeviceDescriptor, Driver, ErrorSlot, FrameCallback};

/// How a `cpal`-backed driver variant picks its [`cpal::Host`].
pub trait HostStrategy: Send {
    fn select_host(&self) -> cpal::Host;
    fn name(&self) -> &'static str;
}

pub struct CpalDriver<S: HostStrategy> {
    strategy: S,
    stream: Option<cpal::Stream>,
    running: Arc<AtomicBool>,
}

impl<S: HostStrategy> CpalDriver<S> {
    pub fn new(strategy: S) -> Self {
        Self {
            strategy,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn host(&self) -> cpal::Host {
        self.strategy.select_host()
    }

    fn find_device(&self, device_id: Option<&str>) -> Result<cpal::Device, DeviceError> {
        let host = self.host();
        match device_id {
            Some(id) => host
                .input_devices()
                .map_err(|e| DeviceError::Unavailable.with_source(e))?
                .find(|d| d.name().ok().as_deref() == Some(id))
                .ok_or_else(|| DeviceError::NotFound(id.to_string())),
            None => host
                .default_input_device()
                .ok_or(DeviceError::Unavailable),
        }
    }
}

// Small helper since `DeviceError::Unavailable` has no payload but we want
// to keep the underlying cpal error in the log even when the taxonomy
// variant is a unit case.
trait WithSource {
    fn with_source<E: std::fmt::Display>(self, source: E) -> DeviceError;
}
impl WithSource for DeviceError {
    fn with_source<E: std::fmt::Display>(self, source: E) -> DeviceError {
        log::debug!("device enumeration failure: {source}");
        self
    }
}

impl<S: HostStrategy> Driver for CpalDriver<S> {
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceError> {
        let host = self.host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| DeviceError::Unavailable.with_source(e))?
            .filter_map(|device| {
                let name = device.name().ok()?;
                let config = device.default_input_config().ok()?;
                Some(DeviceDescriptor {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    id: name.clone(),
                    human_name: name,
                    max_input_channels: config.channels(),
                    default_sample_rate: config.sample_rate().0,
                })
            })
            .collect();
        Ok(devices)
    }

    fn default_device(&self) -> Result<Option<DeviceDescriptor>, DeviceError> {
        Ok(self.enumerate_devices()?.into_iter().find(|d| d.is_default))
    }

    fn start(
        &mut self,
        config: AudioConfig,
        device_id: Option<&str>,
        on_frame: FrameCallback,
        errors: ErrorSlot,
    ) -> Result<(), DeviceError> {
        let device = self.find_device(device_id)?;
        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::FormatUnsupported(e.to_string()))?;

        let input_channels = supported.channels();
        let input_rate = supported.sample_rate().0;
        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.into();

        let running = Arc::new(AtomicBool::new(true));
        let running_cb = running.clone();
        let target_rate = config.sample_rate;

        let stream = build_stream(
            &device,
            &stream_config,
            sample_format,
            input_channels,
            input_rate,
            target_rate,
            on_frame,
            running_cb,
            errors,
        )?;

        stream
            .play()
            .map_err(|e| DeviceError::StreamStartFailed(e.to_string()))?;

        self.stream = Some(stream);
        self.running = running;
        log::info!(
            "{} driver started: device={:?} input={}Hz/{}ch target={}Hz/mono",
            self.strategy.name(),
            device.name().unwrap_or_default(),
            input_rate,
            input_channels,
            target_rate
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        // Dropping the cpal::Stream stops and joins its internal thread.
        self.stream = None;
    }

    fn is_running(&self) -> bool {
        self.stream.is_some() && self.running.load(Ordering::Acquire)
    }
}

#[allow(clippy::too_many_arguments)]
fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    input_channels: u16,
    input_rate: u32,
    target_rate: u32,
    on_frame: FrameCallback,
    running: Arc<AtomicBool>,
    errors: ErrorSlot,
) -> Result<cpal::Stream, DeviceError> {
    match sample_format {
        SampleFormat::F32 => build_typed_stream::<f32>(
            device, config, input_channels, input_rate, target_rate, on_frame, running, errors,
        ),
        SampleFormat::I16 => build_typed_stream::<i16>(
            device, config, input_channels, input_rate, target_rate, on_frame, running, errors,
        ),
        SampleFormat::U16 => build_typed_stream::<u16>(
            device, config, input_channels, input_rate, target_rate, on_frame, running, errors,
        ),
        other => Err(DeviceError::FormatUnsupported(format!("{other:?}"))),
    }
}

#[allow(clippy::too_many_arguments)]
fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    input_channels: u16,
    input_rate: u32,
    target_rate: u32,
    on_frame: FrameCallback,
    running: Arc<AtomicBool>,
    errors: ErrorSlot,
) -> Result<cpal::Stream, DeviceError>
where
    T: cpal::SizedSample + Send + 'static,
    i16: cpal::FromSample<T>,
{
    // Resampler state lives on the callback thread only — no shared
    // mutable access from elsewhere, so a plain (not atomic) cell here
    // stays within I1 (no synchronization in the real-time path).
    let mut resampler = LinearResampler::new(input_rate, target_rate);

    let error_errors = errors.clone();
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !running.load(Ordering::Relaxed) {
                    return;
                }
                let as_i16: Vec<i16> = data.iter().map(|&s| i16::from_sample(s)).collect();
                let mono = downmix_to_mono(&as_i16, input_channels);
                let resampled = resampler.process(&mono);
                if !resampled.is_empty() {
                    on_frame(&resampled);
                }
            },
            move |err| {
                log::error!("audio stream callback error: {err}");
                error_errors.post(DeviceError::DeviceLost(err.to_string()));
            },
            None,
        )
        .map_err(|e| DeviceError::StreamBuildFailed(e.to_string()))?;

    Ok(stream)
}
