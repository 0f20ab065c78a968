//! Real-time audio ingestion core for a speech-to-text orchestrator.
//!
//! Captures from a local input device, gates speech with a VAD, slices
//! the result into sequence-numbered chunks, and streams them over a
//! WebSocket transport with automatic reconnection. See [`session`] for
//! the top-level entry point.

pub mod buffer;
pub mod chunker;
pub mod config;
pub mod driver;
pub mod error;
pub mod sender;
pub mod session;
pub mod vad;
pub mod wire;

pub use config::AppConfig;
pub use error::{CoreError, CoreResult};
pub use session::{ControllerEvent, SessionController, SessionState, SessionStatsSnapshot};
