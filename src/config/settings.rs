//! Configuration schema for the ingestion core.
//!
//! `AppConfig` is immutable for the lifetime of a session once `start()`
//! is called (Shared-resource policy, spec §5).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which capture backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    /// Wraps the platform's native audio subsystem for lowest latency.
    Native,
    /// Wraps a portable audio backend for compatibility.
    Portable,
    /// Deterministic synthetic waveform generator, for testing.
    Synthetic,
    /// Prefer Native, else Portable, else error (Synthetic only by request).
    Auto,
}

impl std::str::FromStr for DriverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(DriverKind::Native),
            "portable" => Ok(DriverKind::Portable),
            "synthetic" => Ok(DriverKind::Synthetic),
            "auto" => Ok(DriverKind::Auto),
            other => Err(ConfigError::UnknownDriver(other.to_string())),
        }
    }
}

impl Default for DriverKind {
    fn default() -> Self {
        DriverKind::Auto
    }
}

impl clap::ValueEnum for DriverKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            DriverKind::Native,
            DriverKind::Portable,
            DriverKind::Synthetic,
            DriverKind::Auto,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        let name = match self {
            DriverKind::Native => "native",
            DriverKind::Portable => "portable",
            DriverKind::Synthetic => "synthetic",
            DriverKind::Auto => "auto",
        };
        Some(clap::builder::PossibleValue::new(name))
    }
}

/// Voice Activity Detection gating configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// Enable VAD gating. Default is `false` (bypass mode).
    pub enabled: bool,
    /// Speech probability threshold in `[0, 1]`.
    pub threshold: f32,
    /// Pre-roll kept before the first speech window, in ms.
    pub pre_roll_ms: u64,
    /// Silence required to close a segment, in ms.
    pub hangover_ms: u64,
    /// RMS fallback threshold used when a window is too small for the model.
    pub energy_fallback_threshold: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            threshold: 0.5,
            pre_roll_ms: 300,
            hangover_ms: 500,
            energy_fallback_threshold: 0.01,
        }
    }
}

/// Reconnect backoff policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    /// `None` means infinite retries.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            max_ms: 30_000,
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// The backoff delay for the given zero-indexed retry attempt,
    /// doubling up to `max_ms` (spec §4.5: 1s, 2s, 4s, 8s, 16s, 30s cap).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let ms = self
            .initial_ms
            .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX))
            .min(self.max_ms);
        Duration::from_millis(ms)
    }

    pub fn retries_exhausted(&self, attempt: u32) -> bool {
        matches!(self.max_retries, Some(max) if attempt >= max)
    }
}

/// Top-level application configuration (spec §6 option table).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub ws_url: String,
    pub driver: DriverKind,
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
    pub buffer_seconds: f32,
    pub chunk_ms: u32,
    pub vad: VadConfig,
    pub heartbeat_ms: u64,
    pub reconnect: ReconnectConfig,
    pub stop_timeout_ms: u64,
    pub test_duration_s: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            driver: DriverKind::Auto,
            device_id: None,
            sample_rate: 16_000,
            channels: 1,
            frame_ms: 20,
            buffer_seconds: 2.0,
            chunk_ms: 2000,
            vad: VadConfig::default(),
            heartbeat_ms: 15_000,
            reconnect: ReconnectConfig::default(),
            stop_timeout_ms: 2000,
            test_duration_s: None,
        }
    }
}

impl AppConfig {
    /// Validates the configuration, returning the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.ws_url) {
            Ok(parsed) if parsed.scheme() == "ws" || parsed.scheme() == "wss" => {}
            _ => return Err(ConfigError::InvalidWsUrl(self.ws_url.clone())),
        }
        if self.channels != 1 {
            return Err(ConfigError::OutOfRange {
                field: "channels",
                value: self.channels.to_string(),
                reason: "this core always downmixes to mono",
            });
        }
        if self.sample_rate == 0 {
            return Err(ConfigError::OutOfRange {
                field: "sample_rate",
                value: self.sample_rate.to_string(),
                reason: "must be positive",
            });
        }
        if self.buffer_seconds <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "buffer_seconds",
                value: self.buffer_seconds.to_string(),
                reason: "must be positive",
            });
        }
        if self.chunk_ms == 0 {
            return Err(ConfigError::OutOfRange {
                field: "chunk_ms",
                value: self.chunk_ms.to_string(),
                reason: "must be positive",
            });
        }
        if !(0.0..=1.0).contains(&self.vad.threshold) {
            return Err(ConfigError::OutOfRange {
                field: "vad.threshold",
                value: self.vad.threshold.to_string(),
                reason: "must be in [0, 1]",
            });
        }
        if self.driver == DriverKind::Synthetic {
            // explicit request, always allowed
        }
        Ok(())
    }

    /// Ring buffer capacity in bytes: `ceil(buffer_seconds * sample_rate * 2)`.
    pub fn ring_capacity_bytes(&self) -> usize {
        (self.buffer_seconds as f64 * self.sample_rate as f64 * 2.0).ceil() as usize
    }

    /// Target chunk size in bytes at `sample_rate`, s16 mono.
    pub fn chunk_size_bytes(&self) -> usize {
        ((self.chunk_ms as u64 * self.sample_rate as u64 * 2) / 1000) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_rejects_missing_url() {
        let config = AppConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_ws_scheme() {
        let mut config = AppConfig::default();
        config.ws_url = "https://example.com/stream".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_url_even_with_ws_prefix() {
        let mut config = AppConfig::default();
        config.ws_url = "ws://".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn valid_config_passes() {
        let mut config = AppConfig::default();
        config.ws_url = "wss://example.com/stream".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ring_capacity_matches_spec_default() {
        let mut config = AppConfig::default();
        config.ws_url = "ws://localhost".to_string();
        // 2.0s * 16000Hz * 2 bytes = 64000 bytes
        assert_eq!(config.ring_capacity_bytes(), 64_000);
    }

    #[test]
    fn chunk_size_matches_spec_example() {
        let mut config = AppConfig::default();
        config.ws_url = "ws://localhost".to_string();
        // 2000ms * 16000Hz * 2 bytes / 1000 = 64000 bytes
        assert_eq!(config.chunk_size_bytes(), 64_000);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let reconnect = ReconnectConfig::default();
        assert_eq!(reconnect.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(reconnect.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(reconnect.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(reconnect.delay_for_attempt(3), Duration::from_secs(8));
        assert_eq!(reconnect.delay_for_attempt(4), Duration::from_secs(16));
        assert_eq!(reconnect.delay_for_attempt(5), Duration::from_secs(30));
        assert_eq!(reconnect.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn driver_kind_parses() {
        assert_eq!("native".parse::<DriverKind>().unwrap(), DriverKind::Native);
        assert!("bogus".parse::<DriverKind>().is_err());
    }
}
