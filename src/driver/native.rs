//! `SystemNative` driver variant: wraps the platform's primary native
//! audio subsystem (WASAPI, CoreAudio, or ALSA) for lowest latency.

use cpal::traits::HostTrait;

use super::cpal_driver::{CpalDriver, HostStrategy};

struct DefaultHostStrategy;

impl HostStrategy for DefaultHostStrategy {
    fn select_host(&self) -> cpal::Host {
        cpal::default_host()
    }

    fn name(&self) -> &'static str {
        "native"
    }
}

pub type SystemNative = CpalDriver<DefaultHostStrategy>;

pub fn build() -> SystemNative {
    CpalDriver::new(DefaultHostStrategy)
}
