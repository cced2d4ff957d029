//! Software stand-in for a USCI_A peripheral, used by the tests.

use embedded_hal_nb::nb;
use embedded_hal_nb::serial::{self, ErrorKind, ErrorType};

use super::{BaudrateConfig, ClockSource, HwAttrs, UartHardware};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockError(pub ErrorKind);

impl serial::Error for MockError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

const RX_DEPTH: usize = 64;
const TX_LOG: usize = 256;

/// Mock peripheral with a receive FIFO fed by the test and a log of every
/// byte written to the transmit register.
pub struct MockSerial {
    rx: [Result<u8, ErrorKind>; RX_DEPTH],
    rx_head: usize,
    rx_len: usize,
    tx: [u8; TX_LOG],
    tx_len: usize,
    /// When set, `write` reports the transmit buffer as occupied.
    pub tx_busy: bool,
    /// When set, `write` fails with this kind instead of sending.
    pub tx_fault: Option<ErrorKind>,
    pub rx_irq: bool,
    pub tx_irq: bool,
    pub configured: Option<BaudrateConfig>,
    pub shutdowns: usize,
    pub smclk_hz: u32,
    pub aclk_hz: u32,
}

impl MockSerial {
    pub const fn new() -> Self {
        MockSerial {
            rx: [Ok(0); RX_DEPTH],
            rx_head: 0,
            rx_len: 0,
            tx: [0; TX_LOG],
            tx_len: 0,
            tx_busy: false,
            tx_fault: None,
            rx_irq: false,
            tx_irq: false,
            configured: None,
            shutdowns: 0,
            smclk_hz: 8_192_000,
            aclk_hz: 32_768,
        }
    }

    fn enqueue(&mut self, entry: Result<u8, ErrorKind>) {
        assert!(self.rx_len < RX_DEPTH, "mock rx fifo overflow");
        let idx = (self.rx_head + self.rx_len) % RX_DEPTH;
        self.rx[idx] = entry;
        self.rx_len += 1;
    }

    /// Make a byte available in the receive register.
    pub fn inject(&mut self, byte: u8) {
        self.enqueue(Ok(byte));
    }

    pub fn inject_all(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.inject(b);
        }
    }

    /// Queue a line error for the next receive.
    pub fn inject_error(&mut self, kind: ErrorKind) {
        self.enqueue(Err(kind));
    }

    pub fn rx_pending(&self) -> usize {
        self.rx_len
    }

    /// Everything written to the transmit register so far.
    pub fn transmitted(&self) -> &[u8] {
        &self.tx[..self.tx_len]
    }
}

impl ErrorType for MockSerial {
    type Error = MockError;
}

impl serial::Read<u8> for MockSerial {
    fn read(&mut self) -> nb::Result<u8, MockError> {
        if self.rx_len == 0 {
            return Err(nb::Error::WouldBlock);
        }
        let entry = self.rx[self.rx_head];
        self.rx_head = (self.rx_head + 1) % RX_DEPTH;
        self.rx_len -= 1;
        entry.map_err(|kind| nb::Error::Other(MockError(kind)))
    }
}

impl serial::Write<u8> for MockSerial {
    fn write(&mut self, word: u8) -> nb::Result<(), MockError> {
        if let Some(kind) = self.tx_fault {
            return Err(nb::Error::Other(MockError(kind)));
        }
        if self.tx_busy {
            return Err(nb::Error::WouldBlock);
        }
        assert!(self.tx_len < TX_LOG, "mock tx log overflow");
        self.tx[self.tx_len] = word;
        self.tx_len += 1;
        Ok(())
    }

    fn flush(&mut self) -> nb::Result<(), MockError> {
        Ok(())
    }
}

impl UartHardware for MockSerial {
    fn clock_hz(&self, source: ClockSource) -> u32 {
        match source {
            ClockSource::Smclk => self.smclk_hz,
            ClockSource::Aclk => self.aclk_hz,
        }
    }

    fn configure(&mut self, baud: &BaudrateConfig, _attrs: &HwAttrs) {
        self.configured = Some(*baud);
    }

    fn set_rx_interrupt(&mut self, enabled: bool) {
        self.rx_irq = enabled;
    }

    fn set_tx_interrupt(&mut self, enabled: bool) {
        self.tx_irq = enabled;
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
        self.rx_irq = false;
        self.tx_irq = false;
    }
}
