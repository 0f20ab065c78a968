//! Application configuration: schema, validation, and environment
//! variable overrides.

pub mod env;
pub mod settings;

pub use env::apply_env_overrides;
pub use settings::{AppConfig, DriverKind, ReconnectConfig, VadConfig};
