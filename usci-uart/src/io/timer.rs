//! One-shot read timeout.
//!
//! [`TimeoutTimer`] is a millisecond countdown advanced by
//! [`tick()`](TimeoutTimer::tick) from a periodic timer interrupt (SysTick,
//! a TimerA CCR, ...). The driver arms it when a read with a finite timeout
//! becomes pending and disarms it the instant that read completes.
//!
//! ```ignore
//! // 1 ms timer ISR
//! UART.on_tick(1);
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::Error;

/// Read timeout setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Complete on data alone.
    Forever,
    /// Force completion after this many milliseconds.
    Millis(u32),
}

/// One-shot countdown timer.
pub struct TimeoutTimer {
    remaining_ms: AtomicU32,
    armed: AtomicBool,
}

impl TimeoutTimer {
    pub const fn new() -> Self {
        TimeoutTimer {
            remaining_ms: AtomicU32::new(0),
            armed: AtomicBool::new(false),
        }
    }

    /// Start counting down from `duration_ms`.
    ///
    /// Fails with [`Error::Busy`] if already armed; disarm first. A zero
    /// duration expires on the next tick.
    pub fn arm(&self, duration_ms: u32) -> Result<(), Error> {
        if self.armed.load(Ordering::Acquire) {
            return Err(Error::Busy);
        }
        self.remaining_ms.store(duration_ms, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
        Ok(())
    }

    /// Arm for a [`Timeout`]; `Forever` leaves the timer idle.
    pub fn arm_for(&self, timeout: Timeout) -> Result<(), Error> {
        match timeout {
            Timeout::Forever => Ok(()),
            Timeout::Millis(ms) => self.arm(ms),
        }
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Advance by `elapsed_ms`. Returns `true` exactly once, on the tick that
    /// expires an armed timer; the timer is disarmed at that point.
    ///
    /// Must be called from a single context.
    pub fn tick(&self, elapsed_ms: u32) -> bool {
        if !self.armed.load(Ordering::Acquire) {
            return false;
        }
        let left = self
            .remaining_ms
            .load(Ordering::Relaxed)
            .saturating_sub(elapsed_ms);
        self.remaining_ms.store(left, Ordering::Relaxed);
        if left == 0 {
            // Only the first tick to observe expiry reports it
            return self.armed.swap(false, Ordering::AcqRel);
        }
        false
    }
}

impl Default for TimeoutTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_after_duration() {
        let timer = TimeoutTimer::new();
        timer.arm(100).unwrap();

        assert!(!timer.tick(40));
        assert!(timer.is_armed());
        assert!(!timer.tick(59));
        assert!(timer.tick(1));
        assert!(!timer.is_armed());

        // Later ticks see a disarmed timer
        assert!(!timer.tick(1));
        assert!(!timer.tick(1000));
    }

    #[test]
    fn oversized_tick_expires() {
        let timer = TimeoutTimer::new();
        timer.arm(5).unwrap();
        assert!(timer.tick(50));
    }

    #[test]
    fn rearm_requires_disarm() {
        let timer = TimeoutTimer::new();
        timer.arm(10).unwrap();
        assert_eq!(timer.arm(20), Err(Error::Busy));

        timer.disarm();
        assert!(!timer.is_armed());
        timer.arm(20).unwrap();
        assert!(!timer.tick(19));
        assert!(timer.tick(1), "re-armed with the new duration");
    }

    #[test]
    fn disarmed_timer_never_fires() {
        let timer = TimeoutTimer::new();
        timer.arm(3).unwrap();
        timer.disarm();
        assert!(!timer.tick(3));
        assert!(!timer.tick(100));
    }

    #[test]
    fn forever_does_not_arm() {
        let timer = TimeoutTimer::new();
        timer.arm_for(Timeout::Forever).unwrap();
        assert!(!timer.is_armed());
        timer.arm_for(Timeout::Millis(1)).unwrap();
        assert!(timer.is_armed());
    }
}
