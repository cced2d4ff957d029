//! Byte storage shared between the receive interrupt and task context.

pub mod ring;

pub use ring::{ByteQueue, RingBuffer};
