//! Request bookkeeping and the two receive drain strategies.
//!
//! A pending read is an [`RxRequest`]: the caller's destination buffer (as
//! raw parts, since the interrupt may write into it), how much was delivered,
//! and whether a terminator or the timeout was seen. Received bytes always go
//! through the ring first; a [`ReadStrategy`] decides who moves them on:
//!
//! | Strategy | Interrupt side | Task side |
//! |----------|----------------|-----------|
//! | [`TaskDrain`] | wakes the reader | copies until satisfied |
//! | [`IsrDrain`] | copies and completes | copies the backlog, then hands over |
//!
//! The strategy is fixed when the channel is opened. All accesses to a
//! request happen inside a critical section, so at any instant only one
//! context consumes from the ring.

use crate::buffer::ByteQueue;
use crate::config::{DataMode, Drain, ReturnMode, UartParams};
use crate::constants::DRAIN_CHUNK;

/// Completion rules derived from the open parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReadRules {
    pub return_mode: ReturnMode,
    pub data_mode: DataMode,
}

impl ReadRules {
    pub fn from_params(params: &UartParams) -> Self {
        ReadRules {
            return_mode: params.read_return_mode,
            data_mode: params.read_data_mode,
        }
    }

    pub fn satisfied(&self, rx: &RxRequest) -> bool {
        rx.delivered == rx.len
            || rx.terminated
            || (self.return_mode == ReturnMode::Partial && rx.delivered > 0)
    }
}

/// An in-flight read.
pub(crate) struct RxRequest {
    buf: *mut u8,
    len: usize,
    pub delivered: usize,
    /// A text-mode newline was delivered.
    pub terminated: bool,
    /// The read timeout fired.
    pub expired: bool,
    /// The receive interrupt owns draining.
    pub isr_owned: bool,
}

// SAFETY: the pointer targets a buffer that outlives the request (a
// `&'static mut` in callback mode, or the blocked caller's borrow in
// blocking mode) and is only dereferenced inside critical sections.
unsafe impl Send for RxRequest {}

impl RxRequest {
    pub fn new(buf: *mut u8, len: usize) -> Self {
        RxRequest {
            buf,
            len,
            delivered: 0,
            terminated: false,
            expired: false,
            isr_owned: false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Move up to `max` bytes from `queue` into the destination, stopping
    /// as soon as the request is satisfied. Returns the number moved.
    pub fn fill_from(&mut self, queue: &dyn ByteQueue, rules: ReadRules, max: usize) -> usize {
        let mut moved = 0;
        while moved < max && !rules.satisfied(self) {
            let Some(byte) = queue.pop() else {
                break;
            };
            // SAFETY: not satisfied implies `delivered < len`, and the
            // destination is valid for `len` bytes while the request lives.
            unsafe {
                self.buf.add(self.delivered).write(byte);
            }
            self.delivered += 1;
            moved += 1;
            if rules.data_mode == DataMode::Text && byte == b'\n' {
                self.terminated = true;
            }
        }
        moved
    }

    /// Rebuild the caller's buffer.
    ///
    /// # Safety
    ///
    /// The request must have been created from a `&'static mut [u8]` that
    /// nothing else references, and must no longer be reachable by the
    /// interrupt.
    pub unsafe fn into_static(self) -> &'static mut [u8] {
        core::slice::from_raw_parts_mut(self.buf, self.len)
    }
}

/// What the interrupt side asks the driver to do after handling an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxEvent {
    Nothing,
    /// Nudge the reading task.
    Wake,
    Satisfied,
    TimedOut,
}

/// Receive drain strategy, bound once per session.
pub(crate) trait ReadStrategy: Sync {
    /// Interrupt side: a byte was buffered, or the timeout expired, while
    /// `rx` is pending.
    fn on_event(&self, rx: &mut RxRequest, queue: &dyn ByteQueue, rules: ReadRules) -> RxEvent;

    /// Task side: the task emptied the ring without satisfying `rx` and is
    /// about to wait.
    fn on_idle(&self, rx: &mut RxRequest);
}

/// The task copies at its own pace; the interrupt only reports new data.
pub(crate) struct TaskDrain;

impl ReadStrategy for TaskDrain {
    fn on_event(&self, _rx: &mut RxRequest, _queue: &dyn ByteQueue, _rules: ReadRules) -> RxEvent {
        RxEvent::Wake
    }

    fn on_idle(&self, _rx: &mut RxRequest) {}
}

/// The interrupt copies into the request and completes it.
pub(crate) struct IsrDrain;

impl ReadStrategy for IsrDrain {
    fn on_event(&self, rx: &mut RxRequest, queue: &dyn ByteQueue, rules: ReadRules) -> RxEvent {
        if !rx.isr_owned {
            // The task is still moving the backlog; it will see the new state.
            return RxEvent::Wake;
        }
        rx.fill_from(queue, rules, usize::MAX);
        if rules.satisfied(rx) {
            RxEvent::Satisfied
        } else if rx.expired {
            RxEvent::TimedOut
        } else {
            RxEvent::Nothing
        }
    }

    fn on_idle(&self, rx: &mut RxRequest) {
        rx.isr_owned = true;
    }
}

pub(crate) fn strategy(drain: Drain) -> &'static dyn ReadStrategy {
    match drain {
        Drain::Task => &TaskDrain,
        Drain::Interrupt => &IsrDrain,
    }
}

/// Outcome of one bounded task-side drain step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskStep {
    /// More bytes are buffered; call again.
    More,
    /// Nothing left to copy; wait for the interrupt side.
    Wait,
    Satisfied,
    TimedOut,
}

/// Copy at most [`DRAIN_CHUNK`] bytes into `rx` and decide what happens next.
pub(crate) fn task_step(
    rx: &mut RxRequest,
    queue: &dyn ByteQueue,
    rules: ReadRules,
    strategy: &dyn ReadStrategy,
) -> TaskStep {
    rx.fill_from(queue, rules, DRAIN_CHUNK);
    if rules.satisfied(rx) {
        TaskStep::Satisfied
    } else if queue.count() > 0 {
        TaskStep::More
    } else if rx.expired {
        TaskStep::TimedOut
    } else {
        strategy.on_idle(rx);
        TaskStep::Wait
    }
}

/// An in-flight write.
pub(crate) struct TxRequest {
    buf: *const u8,
    len: usize,
    /// Caller bytes fully transmitted.
    pub sent: usize,
    /// The `'\r'` preceding the current `'\n'` already went out.
    cr_sent: bool,
}

// SAFETY: as for `RxRequest`; the source buffer outlives the request.
unsafe impl Send for TxRequest {}

impl TxRequest {
    pub fn new(buf: *const u8, len: usize) -> Self {
        TxRequest {
            buf,
            len,
            sent: 0,
            cr_sent: false,
        }
    }

    fn current(&self) -> Option<u8> {
        if self.sent == self.len {
            return None;
        }
        // SAFETY: `sent < len` and the source is valid for `len` bytes.
        Some(unsafe { self.buf.add(self.sent).read() })
    }

    /// The next byte for the wire.
    pub fn next_wire_byte(&self, mode: DataMode) -> Option<u8> {
        let byte = self.current()?;
        if mode == DataMode::Text && byte == b'\n' && !self.cr_sent {
            Some(b'\r')
        } else {
            Some(byte)
        }
    }

    /// Record that the byte from [`next_wire_byte`](Self::next_wire_byte) went out.
    pub fn advance(&mut self, mode: DataMode) {
        match self.current() {
            Some(b'\n') if mode == DataMode::Text && !self.cr_sent => self.cr_sent = true,
            Some(_) => {
                self.sent += 1;
                self.cr_sent = false;
            }
            None => {}
        }
    }

    pub fn is_done(&self) -> bool {
        self.sent == self.len
    }

    /// Rebuild the caller's buffer.
    ///
    /// # Safety
    ///
    /// The request must have been created from a `&'static [u8]`.
    pub unsafe fn into_static(self) -> &'static [u8] {
        core::slice::from_raw_parts(self.buf, self.len)
    }
}
