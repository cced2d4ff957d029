//! Open-time configuration.
//!
//! [`UartParams`] is consumed once by [`Uart::open`](crate::io::Uart::open)
//! and never changes while the channel is open. The defaults follow the
//! conventional UART driver parameters: blocking in both directions, text data
//! with echo, full-count reads, 115200 baud, no read timeout.

use crate::constants::DEFAULT_BAUD_RATE;
use crate::error::Error;
use crate::io::signal::Completion;
use crate::io::timer::Timeout;

/// Completion model for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// The calling task waits until the request completes.
    Blocking,
    /// The call returns at once; a handler runs on completion.
    Callback,
}

/// When a read counts as satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReturnMode {
    /// Only when the caller's buffer is full (or a newline ends a text read).
    Full,
    /// As soon as at least one byte was delivered.
    Partial,
}

/// Interpretation of the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataMode {
    /// Bytes pass through untouched.
    Binary,
    /// Reads map `'\r'` to `'\n'` and end at `'\n'`; writes send `"\r\n"`
    /// for every `'\n'`.
    Text,
}

/// Local echo of received bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Echo {
    Off,
    On,
}

/// Which context copies received bytes into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Drain {
    /// The reading task copies; the interrupt only signals that data arrived.
    Task,
    /// The receive interrupt copies straight into the pending request and
    /// completes it. Required for callback-mode reads.
    Interrupt,
}

/// Read completion handler. Receives the caller's buffer back together with
/// the delivered count (valid bytes are `buf[..count]`).
pub type ReadCallback = fn(&'static mut [u8], Completion);

/// Write completion handler.
pub type WriteCallback = fn(&'static [u8], Completion);

/// Channel configuration.
#[derive(Debug, Clone, Copy)]
pub struct UartParams {
    pub read_mode: Mode,
    pub write_mode: Mode,
    /// Default timeout for reads that do not pass their own.
    pub read_timeout: Timeout,
    pub read_callback: Option<ReadCallback>,
    pub write_callback: Option<WriteCallback>,
    pub read_return_mode: ReturnMode,
    pub read_data_mode: DataMode,
    pub write_data_mode: DataMode,
    pub read_echo: Echo,
    pub baud_rate: u32,
    pub drain: Drain,
    /// Run between polls while a blocking call waits (`wfi` on hardware).
    pub idle: fn(),
}

impl UartParams {
    pub const DEFAULT: UartParams = UartParams {
        read_mode: Mode::Blocking,
        write_mode: Mode::Blocking,
        read_timeout: Timeout::Forever,
        read_callback: None,
        write_callback: None,
        read_return_mode: ReturnMode::Full,
        read_data_mode: DataMode::Text,
        write_data_mode: DataMode::Text,
        read_echo: Echo::On,
        baud_rate: DEFAULT_BAUD_RATE,
        drain: Drain::Task,
        idle: core::hint::spin_loop,
    };

    /// Raw binary transfers without echo, otherwise default.
    pub const fn binary() -> Self {
        let mut params = Self::DEFAULT;
        params.read_data_mode = DataMode::Binary;
        params.write_data_mode = DataMode::Binary;
        params.read_echo = Echo::Off;
        params
    }

    /// Check the parameter set for contradictions.
    pub fn validate(&self) -> Result<(), Error> {
        if self.baud_rate == 0 {
            return Err(Error::InvalidArgument);
        }
        if self.read_mode == Mode::Callback
            && (self.read_callback.is_none() || self.drain != Drain::Interrupt)
        {
            return Err(Error::InvalidArgument);
        }
        if self.write_mode == Mode::Callback && self.write_callback.is_none() {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }
}

impl Default for UartParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn on_read(_buf: &'static mut [u8], _done: Completion) {}
    fn on_write(_buf: &'static [u8], _done: Completion) {}

    #[test]
    fn defaults_are_valid() {
        let p = UartParams::default();
        assert_eq!(p.read_mode, Mode::Blocking);
        assert_eq!(p.read_data_mode, DataMode::Text);
        assert_eq!(p.read_echo, Echo::On);
        assert_eq!(p.baud_rate, 115_200);
        assert!(p.validate().is_ok());
        assert!(UartParams::binary().validate().is_ok());
    }

    #[test]
    fn callback_read_needs_handler_and_interrupt_drain() {
        let mut p = UartParams::binary();
        p.read_mode = Mode::Callback;
        assert_eq!(p.validate(), Err(Error::InvalidArgument));

        p.read_callback = Some(on_read);
        assert_eq!(p.validate(), Err(Error::InvalidArgument));

        p.drain = Drain::Interrupt;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn callback_write_needs_handler() {
        let mut p = UartParams::binary();
        p.write_mode = Mode::Callback;
        assert_eq!(p.validate(), Err(Error::InvalidArgument));
        p.write_callback = Some(on_write);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_baud_rejected() {
        let mut p = UartParams::default();
        p.baud_rate = 0;
        assert_eq!(p.validate(), Err(Error::InvalidArgument));
    }
}
