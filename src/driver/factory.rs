//! Selects a [`Driver`] implementation by explicit tag or auto-detection
//! (spec §4.1: "prefer SystemNative when the host reports a compatible
//! native subsystem; else PortableCrossPlatform; else Synthetic (only
//! when explicitly requested)").

use cpal::traits::HostTrait;

use crate::config::DriverKind;
use crate::error::DeviceError;

use super::{native, portable, synthetic::Synthetic, Driver};

/// Builds a driver for the given kind. `Auto` probes whether any `cpal`
/// host reports an input device; if so it picks [`native::SystemNative`],
/// else [`portable::PortableCrossPlatform`]. `Synthetic` is never chosen
/// by `Auto` — it must be requested explicitly, so tests and demos never
/// silently fall back to fake audio.
pub fn build(kind: DriverKind) -> Result<Box<dyn Driver>, DeviceError> {
    match kind {
        DriverKind::Native => Ok(Box::new(native::build())),
        DriverKind::Portable => Ok(Box::new(portable::build())),
        DriverKind::Synthetic => Ok(Box::new(Synthetic::new())),
        DriverKind::Auto => {
            if host_has_input_device(cpal::default_host()) {
                Ok(Box::new(native::build()))
            } else if cpal::available_hosts()
                .into_iter()
                .filter_map(|id| cpal::host_from_id(id).ok())
                .any(host_has_input_device)
            {
                Ok(Box::new(portable::build()))
            } else {
                Err(DeviceError::Unavailable)
            }
        }
    }
}

fn host_has_input_device(host: cpal::Host) -> bool {
    host.default_input_device().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_is_always_buildable() {
        assert!(build(DriverKind::Synthetic).is_ok());
    }

    #[test]
    fn auto_never_silently_picks_synthetic() {
        // Whatever Auto resolves to on this machine, it must not be the
        // fake driver — Synthetic requires an explicit request.
        let result = build(DriverKind::Auto);
        if let Ok(driver) = result {
            let devices = driver.enumerate_devices().unwrap_or_default();
            assert!(devices.iter().all(|d| d.id != "silence" && d.id != "sine" && d.id != "noise"));
        }
    }
}
