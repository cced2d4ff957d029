//! Interrupt-driven UART channel.
//!
//! [`Uart`] owns one peripheral, one receive ring, one read timeout and a
//! completion signal per direction. It is meant to live in a `static` and be
//! shared between task code and three interrupt entry points:
//!
//! ```ignore
//! static UART: Uart<BoardUsciA0, 64> = Uart::new(BoardUsciA0::take(), HwAttrs::DEFAULT);
//!
//! // USCI_A0 vector
//! UART.on_interrupt();
//!
//! // 1 ms timer vector
//! UART.on_tick(1);
//!
//! // Task
//! UART.open(&UartParams::binary())?;
//! let mut line = [0u8; 16];
//! let done = UART.read(&mut line, Some(Timeout::Millis(100)))?;
//! UART.write(&line[..done.count])?;
//! ```
//!
//! ## Concurrency
//!
//! Request state lives behind a `critical_section::Mutex` and is only
//! touched inside short critical sections: every section handles at most one
//! received byte, one transmitted byte, or
//! [`DRAIN_CHUNK`](crate::constants::DRAIN_CHUNK) copied bytes.
//! Blocking calls wait outside any critical section by spinning on the
//! completion signal with `UartParams::idle`. Completion callbacks run
//! after the critical section that completed the request.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal_nb::nb;
use embedded_hal_nb::serial::Error as _;

use crate::buffer::RingBuffer;
use crate::config::{
    DataMode, Drain, Echo, Mode, ReadCallback, ReturnMode, UartParams, WriteCallback,
};
use crate::constants::{DEFAULT_RING_CAPACITY, POLL_INTERVAL_US};
use crate::error::{Error, LineErrors, StickyErrors};
use crate::hw::{BaudrateConfig, HwAttrs, UartHardware};

use super::engine::{self, ReadRules, ReadStrategy, RxEvent, RxRequest, TaskStep, TxRequest};
use super::signal::{Cause, Completion, CompletionSignal, Direction};
use super::timer::{Timeout, TimeoutTimer};

/// Per-session state, reset by `open`.
struct Session {
    open: bool,
    params: UartParams,
    drain: Drain,
    rx: Option<RxRequest>,
    tx: Option<TxRequest>,
}

impl Session {
    const fn closed() -> Self {
        Session {
            open: false,
            params: UartParams::DEFAULT,
            drain: Drain::Task,
            rx: None,
            tx: None,
        }
    }

    fn strategy(&self) -> &'static dyn ReadStrategy {
        engine::strategy(self.drain)
    }

    fn rules(&self) -> ReadRules {
        ReadRules::from_params(&self.params)
    }
}

/// A callback-mode read that completed and still has to be dispatched.
struct ReadDone {
    callback: ReadCallback,
    rx: RxRequest,
}

/// A callback-mode write that completed and still has to be dispatched.
struct WriteDone {
    callback: WriteCallback,
    tx: TxRequest,
}

enum Pump {
    More,
    Wait,
    Gone,
    Done(Option<ReadDone>),
}

/// One USCI_A channel with an `N`-byte receive ring.
pub struct Uart<H, const N: usize = DEFAULT_RING_CAPACITY> {
    hw: Mutex<RefCell<H>>,
    attrs: HwAttrs,
    ring: RingBuffer<N>,
    timer: TimeoutTimer,
    rx_signal: CompletionSignal,
    tx_signal: CompletionSignal,
    errors: StickyErrors,
    session: Mutex<RefCell<Session>>,
}

impl<H: UartHardware, const N: usize> Uart<H, N> {
    /// Wrap a peripheral. The channel starts closed.
    pub const fn new(hw: H, attrs: HwAttrs) -> Self {
        Uart {
            hw: Mutex::new(RefCell::new(hw)),
            attrs,
            ring: RingBuffer::new(),
            timer: TimeoutTimer::new(),
            rx_signal: CompletionSignal::new(Direction::Read),
            tx_signal: CompletionSignal::new(Direction::Write),
            errors: StickyErrors::new(),
            session: Mutex::new(RefCell::new(Session::closed())),
        }
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Configure the peripheral and start receiving.
    ///
    /// Resets the ring, the timer and the sticky error flags. Fails with
    /// [`Error::Busy`] while a caller from a previous session has not yet
    /// returned.
    pub fn open(&self, params: &UartParams) -> Result<(), Error> {
        params.validate()?;

        critical_section::with(|cs| {
            let mut session = self.session.borrow_ref_mut(cs);
            if session.open {
                return Err(Error::AlreadyOpen);
            }
            if !self.rx_signal.is_idle() || !self.tx_signal.is_idle() {
                return Err(Error::Busy);
            }

            let mut hw = self.hw.borrow_ref_mut(cs);
            let clock = hw.clock_hz(self.attrs.clock_source);
            let baud = BaudrateConfig::lookup(self.attrs.baudrates, params.baud_rate, clock)
                .ok_or(Error::UnsupportedBaudrate)?;

            self.ring.reset();
            self.timer.disarm();
            self.errors.take();

            hw.configure(baud, &self.attrs);
            hw.set_tx_interrupt(false);
            hw.set_rx_interrupt(true);

            *session = Session {
                open: true,
                params: *params,
                drain: params.drain,
                rx: None,
                tx: None,
            };
            debug!("uart: open, {} baud, prescaler {}", params.baud_rate, baud.prescaler);
            Ok(())
        })
    }

    /// Cancel pending requests, then stop the peripheral.
    ///
    /// Blocked callers return with [`Cause::Cancelled`]; callback-mode
    /// handlers run before this returns.
    pub fn close(&self) -> Result<(), Error> {
        let (read_done, write_done) = critical_section::with(|cs| {
            let mut session = self.session.borrow_ref_mut(cs);
            if !session.open {
                return Err(Error::NotOpen);
            }
            let mut hw = self.hw.borrow_ref_mut(cs);
            let read_done = self.finish_read(&mut session, Cause::Cancelled);
            let write_done = self.finish_write(&mut session, &mut *hw, Cause::Cancelled);

            hw.set_rx_interrupt(false);
            hw.set_tx_interrupt(false);
            hw.shutdown();
            session.open = false;
            debug!("uart: closed");
            Ok((read_done, write_done))
        })?;

        self.dispatch_read(read_done);
        self.dispatch_write(write_done);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        critical_section::with(|cs| self.session.borrow_ref(cs).open)
    }

    /// Parameters of the current session.
    pub fn params(&self) -> Option<UartParams> {
        critical_section::with(|cs| {
            let session = self.session.borrow_ref(cs);
            session.open.then_some(session.params)
        })
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// Blocking read into `buf`.
    ///
    /// Returns once the request is satisfied (see
    /// [`ReturnMode`](crate::config::ReturnMode)), the timeout expires, or
    /// the request is cancelled. The valid bytes are `buf[..count]`. `None`
    /// uses the session's `read_timeout`.
    ///
    /// A sticky line error recorded since the last read fails this call
    /// once; issue the read again to continue.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Timeout>) -> Result<Completion, Error> {
        let idle = self.begin_read(Mode::Blocking, buf.as_mut_ptr(), buf.len(), timeout)?;
        loop {
            self.pump_read();
            if let Some(done) = self.rx_signal.take() {
                trace!("uart: read done, {} bytes", done.count);
                return Ok(done);
            }
            self.rx_signal.wait(idle);
        }
    }

    /// Callback-mode read into a static buffer.
    ///
    /// On success the request is pending and the session's `read_callback`
    /// runs exactly once with the buffer and the result; that may happen
    /// before this returns if enough data was already buffered. On error the
    /// buffer is handed back.
    pub fn read_async(
        &self,
        buf: &'static mut [u8],
        timeout: Option<Timeout>,
    ) -> Result<(), (Error, &'static mut [u8])> {
        let len = buf.len();
        let ptr = buf.as_mut_ptr();
        if let Err(e) = self.begin_read(Mode::Callback, ptr, len, timeout) {
            return Err((e, buf));
        }
        // The request now owns the buffer.
        self.pump_read();
        Ok(())
    }

    /// Cancel the pending read, if any. The reader gets the bytes delivered
    /// so far with [`Cause::Cancelled`].
    pub fn cancel_read(&self) {
        let done = critical_section::with(|cs| {
            let mut session = self.session.borrow_ref_mut(cs);
            self.finish_read(&mut session, Cause::Cancelled)
        });
        self.dispatch_read(done);
    }

    fn begin_read(
        &self,
        mode: Mode,
        ptr: *mut u8,
        len: usize,
        timeout: Option<Timeout>,
    ) -> Result<fn(), Error> {
        critical_section::with(|cs| {
            let mut session = self.session.borrow_ref_mut(cs);
            if !session.open {
                return Err(Error::NotOpen);
            }
            if session.params.read_mode != mode {
                return Err(Error::WrongMode);
            }
            if len == 0 {
                return Err(Error::InvalidArgument);
            }
            if !self.rx_signal.begin() {
                return Err(Error::Busy);
            }
            if let Some(err) = self.errors.take().first_error() {
                self.rx_signal.abort();
                warn!("uart: reporting sticky line error");
                return Err(err);
            }
            let timeout = timeout.unwrap_or(session.params.read_timeout);
            if let Err(err) = self.timer.arm_for(timeout) {
                self.rx_signal.abort();
                return Err(err);
            }
            session.rx = Some(RxRequest::new(ptr, len));
            Ok(session.params.idle)
        })
    }

    /// Move buffered bytes into the pending read until it completes or the
    /// ring runs dry.
    fn pump_read(&self) {
        loop {
            let pump = critical_section::with(|cs| {
                let mut session = self.session.borrow_ref_mut(cs);
                let strategy = session.strategy();
                let rules = session.rules();
                let Some(rx) = session.rx.as_mut() else {
                    return Pump::Gone;
                };
                match engine::task_step(rx, &self.ring, rules, strategy) {
                    TaskStep::More => Pump::More,
                    TaskStep::Wait => Pump::Wait,
                    TaskStep::Satisfied => {
                        Pump::Done(self.finish_read(&mut session, Cause::Satisfied))
                    }
                    TaskStep::TimedOut => {
                        Pump::Done(self.finish_read(&mut session, Cause::TimedOut))
                    }
                }
            });
            match pump {
                Pump::More => continue,
                Pump::Wait | Pump::Gone => return,
                Pump::Done(done) => {
                    self.dispatch_read(done);
                    return;
                }
            }
        }
    }

    /// Retire the pending read with `cause`. Returns the callback to run, if
    /// the session is in callback mode.
    fn finish_read(&self, session: &mut Session, cause: Cause) -> Option<ReadDone> {
        let rx = session.rx.take()?;
        self.timer.disarm();
        if !self.rx_signal.complete(rx.delivered, cause) {
            return None;
        }
        trace!("uart: read retired, {} of {} bytes", rx.delivered, rx.len());
        match (session.params.read_mode, session.params.read_callback) {
            (Mode::Callback, Some(callback)) => Some(ReadDone { callback, rx }),
            _ => None,
        }
    }

    fn dispatch_read(&self, done: Option<ReadDone>) {
        let Some(done) = done else {
            return;
        };
        if let Some(completion) = self.rx_signal.take() {
            // SAFETY: callback-mode requests are only created by
            // `read_async` from a `&'static mut [u8]`, and the request was
            // removed from the session before completing.
            let buf = unsafe { done.rx.into_static() };
            (done.callback)(buf, completion);
        }
    }

    // ── Writes ─────────────────────────────────────────────────────────

    /// Blocking write. Returns after the last byte was handed to the
    /// transmitter, or early with [`Cause::Cancelled`].
    pub fn write(&self, buf: &[u8]) -> Result<Completion, Error> {
        let idle = self.begin_write(Mode::Blocking, buf.as_ptr(), buf.len())?;
        loop {
            if let Some(done) = self.tx_signal.take() {
                return Ok(done);
            }
            self.tx_signal.wait(idle);
        }
    }

    /// Callback-mode write. The session's `write_callback` runs exactly once
    /// when the last byte went out or the write was cancelled.
    pub fn write_async(&self, buf: &'static [u8]) -> Result<(), Error> {
        self.begin_write(Mode::Callback, buf.as_ptr(), buf.len())?;
        Ok(())
    }

    /// Cancel the pending write, if any.
    pub fn cancel_write(&self) {
        let done = critical_section::with(|cs| {
            let mut session = self.session.borrow_ref_mut(cs);
            let mut hw = self.hw.borrow_ref_mut(cs);
            self.finish_write(&mut session, &mut *hw, Cause::Cancelled)
        });
        self.dispatch_write(done);
    }

    fn begin_write(&self, mode: Mode, ptr: *const u8, len: usize) -> Result<fn(), Error> {
        critical_section::with(|cs| {
            let mut session = self.session.borrow_ref_mut(cs);
            if !session.open {
                return Err(Error::NotOpen);
            }
            if session.params.write_mode != mode {
                return Err(Error::WrongMode);
            }
            if len == 0 {
                return Err(Error::InvalidArgument);
            }
            if !self.tx_signal.begin() {
                return Err(Error::Busy);
            }
            session.tx = Some(TxRequest::new(ptr, len));
            self.hw.borrow_ref_mut(cs).set_tx_interrupt(true);
            Ok(session.params.idle)
        })
    }

    fn finish_write(&self, session: &mut Session, hw: &mut H, cause: Cause) -> Option<WriteDone> {
        let tx = session.tx.take()?;
        hw.set_tx_interrupt(false);
        if !self.tx_signal.complete(tx.sent, cause) {
            return None;
        }
        match (session.params.write_mode, session.params.write_callback) {
            (Mode::Callback, Some(callback)) => Some(WriteDone { callback, tx }),
            _ => None,
        }
    }

    fn dispatch_write(&self, done: Option<WriteDone>) {
        let Some(done) = done else {
            return;
        };
        if let Some(completion) = self.tx_signal.take() {
            // SAFETY: callback-mode writes come from `write_async`, which
            // takes a `&'static [u8]`.
            let buf = unsafe { done.tx.into_static() };
            (done.callback)(buf, completion);
        }
    }

    // ── Interrupt entry points ─────────────────────────────────────────

    /// Combined USCI_A interrupt handler: receive, then transmit.
    pub fn on_interrupt(&self) {
        self.on_receive();
        self.on_transmit();
    }

    /// Receive interrupt: buffer every byte the peripheral holds.
    pub fn on_receive(&self) {
        loop {
            let (more, done) = critical_section::with(|cs| {
                let mut hw = self.hw.borrow_ref_mut(cs);
                let byte = match hw.read() {
                    Ok(byte) => byte,
                    Err(nb::Error::WouldBlock) => return (false, None),
                    Err(nb::Error::Other(e)) => {
                        let flag = LineErrors::from_kind(e.kind());
                        warn!("uart: line error {=u8:#x}", flag.bits());
                        self.errors.record(flag);
                        return (true, None);
                    }
                };
                let mut session = self.session.borrow_ref_mut(cs);
                if !session.open {
                    return (true, None);
                }
                (true, self.receive_byte(&mut session, &mut *hw, byte))
            });
            self.dispatch_read(done);
            if !more {
                break;
            }
        }
    }

    fn receive_byte(&self, session: &mut Session, hw: &mut H, byte: u8) -> Option<ReadDone> {
        let byte = translate(&session.params, byte);

        if self.ring.push(byte).is_err() {
            self.errors.record(LineErrors::OVERFLOW);
            warn!("uart: rx ring full, byte dropped");
            return None;
        }
        echo(hw, &session.params, byte);

        let strategy = session.strategy();
        let rules = session.rules();
        let event = strategy.on_event(session.rx.as_mut()?, &self.ring, rules);
        self.apply_event(session, event)
    }

    fn apply_event(&self, session: &mut Session, event: RxEvent) -> Option<ReadDone> {
        match event {
            RxEvent::Nothing => None,
            RxEvent::Wake => {
                self.rx_signal.wake();
                None
            }
            RxEvent::Satisfied => self.finish_read(session, Cause::Satisfied),
            RxEvent::TimedOut => self.finish_read(session, Cause::TimedOut),
        }
    }

    /// Transmit interrupt: send the next byte of the pending write.
    pub fn on_transmit(&self) {
        let done = critical_section::with(|cs| {
            let mut hw = self.hw.borrow_ref_mut(cs);
            let mut session = self.session.borrow_ref_mut(cs);
            let mode = session.params.write_data_mode;

            let Some(tx) = session.tx.as_mut() else {
                hw.set_tx_interrupt(false);
                return None;
            };
            let byte = tx.next_wire_byte(mode)?;
            match hw.write(byte) {
                Ok(()) => tx.advance(mode),
                Err(nb::Error::WouldBlock) => return None,
                Err(nb::Error::Other(_)) => {
                    warn!("uart: transmit fault");
                    return self.finish_write(&mut session, &mut *hw, Cause::Error);
                }
            }
            if tx.is_done() {
                self.finish_write(&mut session, &mut *hw, Cause::Satisfied)
            } else {
                None
            }
        });
        self.dispatch_write(done);
    }

    /// Timer interrupt: advance the read timeout by `elapsed_ms`.
    pub fn on_tick(&self, elapsed_ms: u32) {
        let done = critical_section::with(|cs| {
            if !self.timer.tick(elapsed_ms) {
                return None;
            }
            let mut session = self.session.borrow_ref_mut(cs);
            let strategy = session.strategy();
            let rules = session.rules();
            let rx = session.rx.as_mut()?;
            rx.expired = true;
            trace!("uart: read timeout");
            let event = strategy.on_event(rx, &self.ring, rules);
            self.apply_event(&mut session, event)
        });
        self.dispatch_read(done);
    }

    // ── Polling I/O ────────────────────────────────────────────────────

    /// Read straight from the peripheral, bypassing the ring and the receive
    /// interrupt.
    ///
    /// Applies the session's data mode, echo and return mode, and gives up
    /// once the line has been idle for `read_timeout` since the last byte. Bytes already in the ring are not
    /// returned.
    pub fn read_polling<D: DelayNs>(&self, buf: &mut [u8], delay: &mut D) -> Result<usize, Error> {
        let params = critical_section::with(|cs| {
            let session = self.session.borrow_ref(cs);
            if !session.open {
                return Err(Error::NotOpen);
            }
            if buf.is_empty() {
                return Err(Error::InvalidArgument);
            }
            if !self.rx_signal.begin() {
                return Err(Error::Busy);
            }
            self.hw.borrow_ref_mut(cs).set_rx_interrupt(false);
            Ok(session.params)
        })?;

        let text = params.read_data_mode == DataMode::Text;
        let limit_us = match params.read_timeout {
            Timeout::Forever => None,
            Timeout::Millis(ms) => Some(u64::from(ms) * 1000),
        };
        let mut idle_us = 0u64;
        let mut delivered = 0;

        while delivered < buf.len() {
            let polled = critical_section::with(|cs| {
                let mut hw = self.hw.borrow_ref_mut(cs);
                hw.read().map(|byte| {
                    let byte = translate(&params, byte);
                    echo(&mut *hw, &params, byte);
                    byte
                })
            });
            match polled {
                Ok(byte) => {
                    buf[delivered] = byte;
                    delivered += 1;
                    idle_us = 0;
                    if (text && byte == b'\n') || params.read_return_mode == ReturnMode::Partial {
                        break;
                    }
                }
                Err(nb::Error::WouldBlock) => {
                    if limit_us.is_some_and(|limit| idle_us >= limit) {
                        break;
                    }
                    delay.delay_us(POLL_INTERVAL_US);
                    idle_us += u64::from(POLL_INTERVAL_US);
                }
                Err(nb::Error::Other(e)) => self.errors.record(LineErrors::from_kind(e.kind())),
            }
        }

        critical_section::with(|cs| {
            self.rx_signal.abort();
            let open = self.session.borrow_ref(cs).open;
            self.hw.borrow_ref_mut(cs).set_rx_interrupt(open);
        });
        Ok(delivered)
    }

    /// Write straight to the peripheral, spinning on the transmit buffer.
    ///
    /// Returns the number of caller bytes sent. A count short of `buf.len()`
    /// means the peripheral reported a transmit fault and the rest of `buf`
    /// was not sent.
    pub fn write_polling(&self, buf: &[u8]) -> Result<usize, Error> {
        let mode = critical_section::with(|cs| {
            let session = self.session.borrow_ref(cs);
            if !session.open {
                return Err(Error::NotOpen);
            }
            if buf.is_empty() {
                return Err(Error::InvalidArgument);
            }
            if !self.tx_signal.begin() {
                return Err(Error::Busy);
            }
            Ok(session.params.write_data_mode)
        })?;

        let mut tx = TxRequest::new(buf.as_ptr(), buf.len());
        while let Some(byte) = tx.next_wire_byte(mode) {
            let sent = nb::block!(critical_section::with(|cs| {
                self.hw.borrow_ref_mut(cs).write(byte)
            }));
            if sent.is_err() {
                warn!("uart: transmit fault while polling");
                break;
            }
            tx.advance(mode);
        }

        self.tx_signal.abort();
        Ok(tx.sent)
    }

    // ── Control ────────────────────────────────────────────────────────

    /// Bytes waiting in the receive ring.
    pub fn available(&self) -> usize {
        self.ring.len()
    }

    /// Oldest buffered byte, without consuming it.
    pub fn peek(&self) -> Option<u8> {
        critical_section::with(|_| self.ring.peek())
    }

    /// Sticky line-error flags recorded since the last read or
    /// [`take_errors`](Self::take_errors).
    pub fn line_errors(&self) -> LineErrors {
        self.errors.peek()
    }

    /// Return and clear the sticky line-error flags without issuing a read.
    pub fn take_errors(&self) -> LineErrors {
        self.errors.take()
    }

    /// Run `f` with exclusive access to the peripheral.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut H) -> R) -> R {
        critical_section::with(|cs| f(&mut *self.hw.borrow_ref_mut(cs)))
    }
}

/// Text-mode `'\r'` to `'\n'` mapping for one received byte.
fn translate(params: &UartParams, byte: u8) -> u8 {
    if params.read_data_mode == DataMode::Text && byte == b'\r' {
        b'\n'
    } else {
        byte
    }
}

/// Local echo of one accepted byte.
fn echo<H: UartHardware>(hw: &mut H, params: &UartParams, byte: u8) {
    if params.read_echo == Echo::Off {
        return;
    }
    // Best effort: an occupied transmit buffer drops the echo
    if params.read_data_mode == DataMode::Text && byte == b'\n' {
        let _ = hw.write(b'\r');
    }
    let _ = hw.write(byte);
}
