//! Typed error taxonomy for the ingestion core.
//!
//! Recoverable categories (`Device`, `Transport`, `Protocol`) drive the
//! Session Controller's state machine; `Config` and `Internal` are fatal
//! and surface directly to the CLI as a non-zero exit code.

use thiserror::Error;

/// Top-level error type returned by library operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Config-category failures: invalid URL, unknown driver, out-of-range
/// numeric. Surfaced at start; never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid ws_url {0:?}: must be ws:// or wss://")]
    InvalidWsUrl(String),

    #[error("unknown driver {0:?}: expected native, portable, synthetic, or auto")]
    UnknownDriver(String),

    #[error("{field} out of range: {value} ({reason})")]
    OutOfRange {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("environment variable {0} could not be parsed: {1}")]
    InvalidEnvVar(String, String),
}

/// Device-category failures: unavailable, permission denied, format
/// unsupported, or lost mid-session.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no input device available")]
    Unavailable,

    #[error("device {0:?} not found")]
    NotFound(String),

    #[error("requested audio format is not supported by the device: {0}")]
    FormatUnsupported(String),

    #[error("permission denied opening audio device: {0}")]
    PermissionDenied(String),

    #[error("device lost mid-session: {0}")]
    DeviceLost(String),

    #[error("failed to build capture stream: {0}")]
    StreamBuildFailed(String),

    #[error("failed to start capture stream: {0}")]
    StreamStartFailed(String),
}

/// Transport-category failures: connect refused, TLS failure, send
/// timeout, unexpected close. Recoverable; drives reconnect.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connect timed out after {0:?}")]
    ConnectTimeout(std::time::Duration),

    #[error("send timed out after {0:?}")]
    SendTimeout(std::time::Duration),

    #[error("read idle timed out after {0:?}")]
    ReadIdleTimeout(std::time::Duration),

    #[error("connection closed unexpectedly: {0}")]
    UnexpectedClose(String),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Protocol-category failures: oversized inbound message, malformed
/// frame. Counted; connection dropped and reconnected.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame too short: {0} bytes, header requires at least 12")]
    FrameTooShort(usize),

    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    #[error("payload length {0} is not a whole number of i16 samples")]
    MisalignedPayload(usize),
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_into_core_error() {
        let err: CoreError = ConfigError::UnknownDriver("xyz".into()).into();
        assert!(err.to_string().contains("xyz"));
    }

    #[test]
    fn device_error_display() {
        let err = DeviceError::NotFound("USB Mic".into());
        assert!(err.to_string().contains("USB Mic"));
    }
}
