//! Environment variable overrides (`RTSTT_<UPPER_SNAKE_CASE>`, spec §6).
//!
//! CLI flags take precedence over these; both take precedence over the
//! compiled-in `AppConfig::default()`. Applied as a layer on top of an
//! already-parsed config rather than a full deserializer, since the
//! option set is small and flat enough that a config crate would be
//! more machinery than the ~15 keys warrant.

use std::str::FromStr;

use crate::error::ConfigError;

use super::settings::{AppConfig, DriverKind};

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "value is not valid unicode".to_string(),
        )),
    }
}

/// Applies `RTSTT_*` environment overrides onto `config` in place.
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<(), ConfigError> {
    if let Some(v) = parse_env::<String>("RTSTT_WS_URL")? {
        config.ws_url = v;
    }
    if let Some(v) = parse_env::<String>("RTSTT_DRIVER")? {
        config.driver = DriverKind::from_str(&v)?;
    }
    if let Some(v) = parse_env::<String>("RTSTT_DEVICE_ID")? {
        config.device_id = Some(v);
    }
    if let Some(v) = parse_env::<u32>("RTSTT_SAMPLE_RATE")? {
        config.sample_rate = v;
    }
    if let Some(v) = parse_env::<u16>("RTSTT_CHANNELS")? {
        config.channels = v;
    }
    if let Some(v) = parse_env::<u32>("RTSTT_FRAME_MS")? {
        config.frame_ms = v;
    }
    if let Some(v) = parse_env::<f32>("RTSTT_BUFFER_SECONDS")? {
        config.buffer_seconds = v;
    }
    if let Some(v) = parse_env::<u32>("RTSTT_CHUNK_MS")? {
        config.chunk_ms = v;
    }
    if let Some(v) = parse_env::<bool>("RTSTT_VAD_ENABLED")? {
        config.vad.enabled = v;
    }
    if let Some(v) = parse_env::<f32>("RTSTT_VAD_THRESHOLD")? {
        config.vad.threshold = v;
    }
    if let Some(v) = parse_env::<u64>("RTSTT_VAD_PRE_ROLL_MS")? {
        config.vad.pre_roll_ms = v;
    }
    if let Some(v) = parse_env::<u64>("RTSTT_VAD_HANGOVER_MS")? {
        config.vad.hangover_ms = v;
    }
    if let Some(v) = parse_env::<u64>("RTSTT_HEARTBEAT_MS")? {
        config.heartbeat_ms = v;
    }
    if let Some(v) = parse_env::<u64>("RTSTT_RECONNECT_INITIAL_MS")? {
        config.reconnect.initial_ms = v;
    }
    if let Some(v) = parse_env::<u64>("RTSTT_RECONNECT_MAX_MS")? {
        config.reconnect.max_ms = v;
    }
    if let Some(v) = parse_env::<u32>("RTSTT_RECONNECT_MAX_RETRIES")? {
        config.reconnect.max_retries = Some(v);
    }
    if let Some(v) = parse_env::<u64>("RTSTT_STOP_TIMEOUT_MS")? {
        config.stop_timeout_ms = v;
    }
    if let Some(v) = parse_env::<u64>("RTSTT_TEST_DURATION_S")? {
        config.test_duration_s = Some(v);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn overrides_apply_and_validate() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RTSTT_WS_URL", "wss://override.example/stream");
        std::env::set_var("RTSTT_SAMPLE_RATE", "48000");

        let mut config = AppConfig::default();
        apply_env_overrides(&mut config).unwrap();

        assert_eq!(config.ws_url, "wss://override.example/stream");
        assert_eq!(config.sample_rate, 48_000);

        std::env::remove_var("RTSTT_WS_URL");
        std::env::remove_var("RTSTT_SAMPLE_RATE");
    }

    #[test]
    fn invalid_numeric_override_is_reported() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("RTSTT_SAMPLE_RATE", "not-a-number");

        let mut config = AppConfig::default();
        let result = apply_env_overrides(&mut config);
        assert!(result.is_err());

        std::env::remove_var("RTSTT_SAMPLE_RATE");
    }
}
