//! Voice Activity Detection gating (spec §4.3, C3).

pub mod detector;
pub mod gate;

pub use detector::{VadDetector, VadMethod, VadResult};
pub use gate::{GateEvent, GateOutput, VadGate};
