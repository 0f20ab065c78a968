//! The single-producer/single-consumer ring buffer decoupling the capture
//! callback from the async consumer task (spec §4.2, C2).

pub mod ring;

pub use ring::{ring_buffer, Consumer, Producer, RingStats};
