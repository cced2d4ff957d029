//! # usci-uart
//!
//! A `no_std`, zero-allocation, interrupt-driven UART driver for USCI_A
//! serial peripherals (MSP430-class parts). Received bytes land in a
//! fixed-capacity ring from interrupt context; reads and writes complete
//! either by blocking the calling task or by invoking a handler, with an
//! optional per-read timeout.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Storage | [`buffer`] | Lock-free single-producer single-consumer byte ring |
//! | Hardware | [`hw`] | [`UartHardware`] seam and baud-rate tables |
//! | Config | [`config`] | [`UartParams`] and its modes |
//! | Engine | [`io`] | [`Uart`], completion signals, read timeout |
//! | Errors | [`error`] | [`Error`] and sticky [`LineErrors`] |
//!
//! ## Quick start
//!
//! ```ignore
//! use usci_uart::{HwAttrs, Timeout, Uart, UartParams};
//!
//! static UART: Uart<Board> = Uart::new(Board::usci_a0(), HwAttrs::DEFAULT);
//!
//! #[interrupt]
//! fn USCI_A0() {
//!     UART.on_interrupt();
//! }
//!
//! #[interrupt]
//! fn TIMER0_A0() {
//!     UART.on_tick(1);
//! }
//!
//! fn main() -> ! {
//!     UART.open(&UartParams::DEFAULT).unwrap();
//!     let mut line = [0u8; 32];
//!     loop {
//!         let done = UART.read(&mut line, Some(Timeout::Millis(500))).unwrap();
//!         UART.write(&line[..done.count]).unwrap();
//!     }
//! }
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `defmt` | no | `defmt` logging and `defmt::Format` on public types |
//!
//! ## Parameters
//!
//! - **Ring capacity:** 32 bytes by default ([`constants::DEFAULT_RING_CAPACITY`]),
//!   chosen per instance through `Uart<H, N>`
//! - **Baud rate:** 115 200 by default ([`constants::DEFAULT_BAUD_RATE`])
//! - **Task drain chunk:** 8 bytes per critical section ([`constants::DRAIN_CHUNK`])

#![no_std]

#[macro_use]
mod fmt;

pub mod constants;
pub mod error;
pub mod buffer;
pub mod hw;
pub mod config;
pub mod io;

pub use buffer::{ByteQueue, RingBuffer};
pub use config::{DataMode, Drain, Echo, Mode, ReadCallback, ReturnMode, UartParams, WriteCallback};
pub use error::{Error, LineErrors};
pub use hw::{BaudrateConfig, BitOrder, ClockSource, HwAttrs, UartHardware, DEFAULT_BAUDRATES};
pub use io::{Cause, Completion, Direction, Timeout, Uart};
