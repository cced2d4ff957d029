/// Default receive ring capacity in bytes.
pub const DEFAULT_RING_CAPACITY: usize = 32;

/// Default nominal baud rate used by [`UartParams::DEFAULT`](crate::config::UartParams::DEFAULT).
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Maximum bytes moved from the ring into a caller buffer per critical section
/// on the task side.
pub const DRAIN_CHUNK: usize = 8;

/// Poll interval for [`Uart::read_polling`](crate::io::Uart::read_polling) while
/// the receive FIFO is empty.
pub const POLL_INTERVAL_US: u32 = 10;
