//! Per-direction request state and completion hand-off.
//!
//! A [`CompletionSignal`] tracks one direction (read or write) through
//! `Idle → Pending → {Satisfied, TimedOut, Cancelled, Failed} → Idle`.
//! Exactly one completer moves a pending request to a terminal state; the
//! blocked caller (blocking mode) or the callback dispatcher (callback mode)
//! then consumes the result with [`take()`](CompletionSignal::take), returning
//! the direction to `Idle`.
//!
//! Completion may be posted from interrupt context. Waiting only happens on
//! the task side, by spinning on the state with a caller-provided idle hook
//! (`wfi` on hardware).

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Transfer direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Read,
    Write,
}

/// Why a request completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cause {
    /// The request got everything it asked for.
    Satisfied,
    /// The read timeout expired first.
    TimedOut,
    /// Cancelled explicitly or by `close()`.
    Cancelled,
    /// The peripheral reported a transmit fault.
    Error,
}

/// Result of one request: how many caller bytes moved, and why it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Completion {
    pub direction: Direction,
    pub count: usize,
    pub cause: Cause,
}

/// State of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum TransferState {
    Idle = 0,
    Pending = 1,
    Satisfied = 2,
    TimedOut = 3,
    Cancelled = 4,
    Failed = 5,
}

impl TransferState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => TransferState::Pending,
            2 => TransferState::Satisfied,
            3 => TransferState::TimedOut,
            4 => TransferState::Cancelled,
            5 => TransferState::Failed,
            _ => TransferState::Idle,
        }
    }

    fn terminal(cause: Cause) -> Self {
        match cause {
            Cause::Satisfied => TransferState::Satisfied,
            Cause::TimedOut => TransferState::TimedOut,
            Cause::Cancelled => TransferState::Cancelled,
            Cause::Error => TransferState::Failed,
        }
    }

    /// The cause for a terminal state.
    pub fn cause(self) -> Option<Cause> {
        match self {
            TransferState::Satisfied => Some(Cause::Satisfied),
            TransferState::TimedOut => Some(Cause::TimedOut),
            TransferState::Cancelled => Some(Cause::Cancelled),
            TransferState::Failed => Some(Cause::Error),
            TransferState::Idle | TransferState::Pending => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.cause().is_some()
    }
}

/// Completion hand-off for one direction.
pub struct CompletionSignal {
    direction: Direction,
    state: AtomicU8,
    count: AtomicUsize,
    woken: AtomicBool,
}

impl CompletionSignal {
    pub const fn new(direction: Direction) -> Self {
        CompletionSignal {
            direction,
            state: AtomicU8::new(TransferState::Idle as u8),
            count: AtomicUsize::new(0),
            woken: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> TransferState {
        TransferState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_pending(&self) -> bool {
        self.state() == TransferState::Pending
    }

    pub fn is_idle(&self) -> bool {
        self.state() == TransferState::Idle
    }

    /// `Idle → Pending`. Returns `false` if another request is in flight or
    /// an earlier result has not been consumed yet.
    pub fn begin(&self) -> bool {
        let claimed = self
            .state
            .compare_exchange(
                TransferState::Idle as u8,
                TransferState::Pending as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if claimed {
            // A refused caller must not eat the in-flight request's wake
            self.woken.store(false, Ordering::Release);
        }
        claimed
    }

    /// `Pending → terminal`. Returns `true` for the one call that completes
    /// the request; any later call is ignored.
    ///
    /// Completers are serialized by the driver's critical sections.
    pub fn complete(&self, count: usize, cause: Cause) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.count.store(count, Ordering::Relaxed);
        // Release publishes `count` together with the terminal state
        self.state
            .store(TransferState::terminal(cause) as u8, Ordering::Release);
        true
    }

    /// Nudge a blocked caller without completing (more data is available).
    pub fn wake(&self) {
        self.woken.store(true, Ordering::Release);
    }

    /// Block until the request is terminal or [`wake()`](Self::wake) was
    /// called, running `idle` between polls.
    pub fn wait(&self, idle: fn()) {
        loop {
            if self.state().is_terminal() {
                return;
            }
            if self.woken.swap(false, Ordering::AcqRel) {
                return;
            }
            idle();
        }
    }

    /// Consume a terminal result, returning the direction to `Idle`.
    pub fn take(&self) -> Option<Completion> {
        let raw = self.state.load(Ordering::Acquire);
        let cause = TransferState::from_u8(raw).cause()?;
        let count = self.count.load(Ordering::Relaxed);
        self.state
            .compare_exchange(raw, TransferState::Idle as u8, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Completion {
            direction: self.direction,
            count,
            cause,
        })
    }

    /// Abandon a request that was begun but rejected before anyone could
    /// complete it.
    pub fn abort(&self) {
        let _ = self.state.compare_exchange(
            TransferState::Pending as u8,
            TransferState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_cycle() {
        let sig = CompletionSignal::new(Direction::Read);
        assert!(sig.is_idle());
        assert!(sig.take().is_none());

        assert!(sig.begin());
        assert!(sig.is_pending());
        assert!(!sig.begin(), "second request must be refused");

        assert!(sig.complete(5, Cause::Satisfied));
        assert_eq!(sig.state(), TransferState::Satisfied);

        let done = sig.take().unwrap();
        assert_eq!(
            done,
            Completion {
                direction: Direction::Read,
                count: 5,
                cause: Cause::Satisfied
            }
        );
        assert!(sig.is_idle());
    }

    #[test]
    fn completes_at_most_once() {
        let sig = CompletionSignal::new(Direction::Write);
        sig.begin();
        assert!(sig.complete(3, Cause::TimedOut));
        assert!(!sig.complete(9, Cause::Satisfied));
        assert!(!sig.complete(0, Cause::Cancelled));

        let done = sig.take().unwrap();
        assert_eq!(done.count, 3);
        assert_eq!(done.cause, Cause::TimedOut);
        assert!(sig.take().is_none());
    }

    #[test]
    fn complete_without_request_is_ignored() {
        let sig = CompletionSignal::new(Direction::Read);
        assert!(!sig.complete(1, Cause::Satisfied));
        assert!(sig.is_idle());
    }

    #[test]
    fn unconsumed_result_blocks_next_request() {
        let sig = CompletionSignal::new(Direction::Read);
        sig.begin();
        sig.complete(0, Cause::Cancelled);
        assert!(!sig.begin());
        sig.take();
        assert!(sig.begin());
    }

    #[test]
    fn abort_only_undoes_pending() {
        let sig = CompletionSignal::new(Direction::Read);
        sig.begin();
        sig.abort();
        assert!(sig.is_idle());

        sig.begin();
        sig.complete(2, Cause::Satisfied);
        sig.abort();
        assert_eq!(sig.state(), TransferState::Satisfied);
    }

    #[test]
    fn wait_returns_on_wake_or_completion() {
        let sig = CompletionSignal::new(Direction::Read);
        sig.begin();
        sig.wake();
        sig.wait(core::hint::spin_loop);
        assert!(sig.is_pending());

        sig.complete(1, Cause::Satisfied);
        sig.wait(core::hint::spin_loop);
        assert_eq!(sig.take().unwrap().count, 1);
    }

    #[test]
    fn waiter_released_from_another_thread() {
        extern crate std;

        let sig = CompletionSignal::new(Direction::Write);
        sig.begin();
        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(std::time::Duration::from_millis(5));
                sig.complete(4, Cause::Satisfied);
            });
            sig.wait(std::thread::yield_now);
        });
        assert_eq!(sig.take().unwrap().count, 4);
    }
}
