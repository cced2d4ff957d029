//! Driver error kinds and sticky line-error flags.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use embedded_hal_nb::serial::ErrorKind;

/// Errors returned by [`Uart`](crate::io::Uart) operations.
///
/// Argument and state errors (`Busy`, `InvalidArgument`, `NotOpen`, ...) are
/// returned by the call that caused them. Line errors (`Overrun`, `Framing`,
/// `Parity`, `Noise`) and `Overflow` are recorded by the interrupt handler and
/// reported once by the next read request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A request is already in flight on that direction.
    Busy,
    /// Empty buffer, missing callback or an inconsistent parameter set.
    InvalidArgument,
    /// The channel is not open.
    NotOpen,
    /// `open` was called on a channel that is already open.
    AlreadyOpen,
    /// Blocking call on a callback-mode direction, or the reverse.
    WrongMode,
    /// No baud-rate table entry matches the requested rate and input clock.
    UnsupportedBaudrate,
    /// The receiver lost data because the hardware FIFO was not serviced.
    Overrun,
    /// A stop bit was not detected.
    Framing,
    /// Parity check failed.
    Parity,
    /// Noise detected on the receive line.
    Noise,
    /// The receive ring was full and incoming bytes were dropped.
    Overflow,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Busy => "request already pending",
            Error::InvalidArgument => "invalid argument",
            Error::NotOpen => "channel not open",
            Error::AlreadyOpen => "channel already open",
            Error::WrongMode => "operation not allowed in the configured mode",
            Error::UnsupportedBaudrate => "no baud-rate entry for this clock",
            Error::Overrun => "receiver overrun",
            Error::Framing => "framing error",
            Error::Parity => "parity error",
            Error::Noise => "noise error",
            Error::Overflow => "receive ring overflow",
        };
        f.write_str(msg)
    }
}

/// Set of sticky receive-side error flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineErrors(u8);

impl LineErrors {
    pub const OVERRUN: LineErrors = LineErrors(1 << 0);
    pub const FRAMING: LineErrors = LineErrors(1 << 1);
    pub const PARITY: LineErrors = LineErrors(1 << 2);
    pub const NOISE: LineErrors = LineErrors(1 << 3);
    pub const OVERFLOW: LineErrors = LineErrors(1 << 4);

    /// No flags set.
    pub const fn empty() -> Self {
        LineErrors(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn contains(self, other: LineErrors) -> bool {
        self.0 & other.0 == other.0
    }

    /// Map a hardware receive error onto its flag. `Other` is reported as
    /// overrun since the data it guarded is gone either way.
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::FrameFormat => Self::FRAMING,
            ErrorKind::Parity => Self::PARITY,
            ErrorKind::Noise => Self::NOISE,
            _ => Self::OVERRUN,
        }
    }

    /// The single error a read reports for this set, most severe first.
    pub fn first_error(self) -> Option<Error> {
        if self.contains(Self::OVERRUN) {
            Some(Error::Overrun)
        } else if self.contains(Self::FRAMING) {
            Some(Error::Framing)
        } else if self.contains(Self::PARITY) {
            Some(Error::Parity)
        } else if self.contains(Self::NOISE) {
            Some(Error::Noise)
        } else if self.contains(Self::OVERFLOW) {
            Some(Error::Overflow)
        } else {
            None
        }
    }
}

impl core::ops::BitOr for LineErrors {
    type Output = LineErrors;

    fn bitor(self, rhs: Self) -> Self {
        LineErrors(self.0 | rhs.0)
    }
}

/// Interrupt-safe accumulator for [`LineErrors`].
pub(crate) struct StickyErrors(AtomicU8);

impl StickyErrors {
    pub const fn new() -> Self {
        StickyErrors(AtomicU8::new(0))
    }

    pub fn record(&self, flags: LineErrors) {
        self.0.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn peek(&self) -> LineErrors {
        LineErrors(self.0.load(Ordering::Acquire))
    }

    /// Return and clear all flags.
    pub fn take(&self) -> LineErrors {
        LineErrors(self.0.swap(0, Ordering::AcqRel))
    }
}
