//! Hardware seam.
//!
//! The driver never touches registers itself. A board support crate
//! implements [`UartHardware`] for its USCI_A instance: the receive/transmit
//! data registers through the `embedded-hal-nb` serial traits, plus interrupt
//! enables and one-shot configuration.
//!
//! Receive errors surface through [`embedded_hal_nb::serial::Error::kind`];
//! `Overrun`, `FrameFormat`, `Parity` and `Noise` are latched as sticky
//! flags by the driver.

pub mod baudrate;

#[cfg(test)]
pub(crate) mod mock;

use embedded_hal_nb::serial;

pub use baudrate::{BaudrateConfig, DEFAULT_BAUDRATES};

/// Clock feeding the baud-rate generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Auxiliary clock, typically a 32.768 kHz crystal.
    Aclk,
    /// Sub-main clock.
    Smclk,
}

/// Bit order on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

/// Static per-instance hardware attributes.
#[derive(Debug, Clone, Copy)]
pub struct HwAttrs {
    pub clock_source: ClockSource,
    pub bit_order: BitOrder,
    /// Baud-rate table searched at open time.
    pub baudrates: &'static [BaudrateConfig],
}

impl HwAttrs {
    /// SMCLK, LSB first, [`DEFAULT_BAUDRATES`].
    pub const DEFAULT: HwAttrs = HwAttrs {
        clock_source: ClockSource::Smclk,
        bit_order: BitOrder::LsbFirst,
        baudrates: &DEFAULT_BAUDRATES,
    };
}

impl Default for HwAttrs {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A USCI_A-style serial peripheral.
///
/// `read` returns the received byte, `WouldBlock` when the receive buffer is
/// empty, or a line error. `write` loads the transmit buffer, or returns
/// `WouldBlock` while it is still occupied.
pub trait UartHardware: serial::Read<u8> + serial::Write<u8> + Send {
    /// Current frequency of the clock selected by `attrs.clock_source`.
    fn clock_hz(&self, source: ClockSource) -> u32;

    /// Program the baud-rate generator and frame format, then take the
    /// peripheral out of reset.
    fn configure(&mut self, baud: &BaudrateConfig, attrs: &HwAttrs);

    /// Enable or disable the receive interrupt source.
    fn set_rx_interrupt(&mut self, enabled: bool);

    /// Enable or disable the transmit-buffer-empty interrupt source.
    fn set_tx_interrupt(&mut self, enabled: bool);

    /// Put the peripheral back into reset.
    fn shutdown(&mut self);
}
