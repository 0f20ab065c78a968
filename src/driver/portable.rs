//! `PortableCrossPlatform` driver variant: prefers the first non-default
//! `cpal` host (e.g. JACK where available) as a portable fallback,
//! falling back to the default host when only one host exists on the
//! platform. Preferred fallback behind `SystemNative` in the auto-detect
//! order (spec §4.1).

use cpal::traits::HostTrait;

use super::cpal_driver::{CpalDriver, HostStrategy};

struct PortableHostStrategy;

impl HostStrategy for PortableHostStrategy {
    fn select_host(&self) -> cpal::Host {
        let default_id = cpal::default_host().id();
        for host_id in cpal::available_hosts() {
            if host_id != default_id {
                if let Ok(host) = cpal::host_from_id(host_id) {
                    return host;
                }
            }
        }
        cpal::default_host()
    }

    fn name(&self) -> &'static str {
        "portable"
    }
}

pub type PortableCrossPlatform = CpalDriver<PortableHostStrategy>;

pub fn build() -> PortableCrossPlatform {
    CpalDriver::new(PortableHostStrategy)
}
