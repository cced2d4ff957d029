//! Interrupt-driven transfer machinery.
//!
//! ## Components
//!
//! | Item | Context | Description |
//! |------|---------|-------------|
//! | [`Uart`] | task + ISR | One channel: lifecycle, reads, writes, interrupt entry points |
//! | [`CompletionSignal`] | task + ISR | Per-direction request state and exactly-once completion |
//! | [`TimeoutTimer`] | ISR | One-shot millisecond countdown for the pending read |
//!
//! ## Interrupt wiring
//!
//! The application forwards three events to the driver:
//!
//! - USCI_A receive interrupt → [`Uart::on_receive`]
//! - USCI_A transmit interrupt → [`Uart::on_transmit`]
//! - periodic timer tick → [`Uart::on_tick`]
//!
//! [`Uart::on_interrupt`] handles both USCI_A sources for parts with a shared
//! vector.

pub(crate) mod engine;
pub mod signal;
pub mod timer;
pub mod uart;

pub use signal::{Cause, Completion, CompletionSignal, Direction, TransferState};
pub use timer::{Timeout, TimeoutTimer};
pub use uart::Uart;
