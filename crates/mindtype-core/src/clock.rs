//! # Clock
//!
//! Time source for the wizard.
//!
//! The wizard reads the current instant when it stamps demographics, task
//! start/end times and the collection date, and it suspends once for the
//! high-distress advisory. Both go through [`Clock`] so the state machine
//! can be driven deterministically in tests.

use jiff::Timestamp;
use std::sync::Mutex;
use std::time::Duration;

/// Source of "now" plus the one bounded suspension the wizard performs.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;

    /// Block for `duration`. Non-cancellable.
    fn pause(&self, duration: Duration);
}

/// Wall clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock.
///
/// `pause` advances the clock instead of sleeping and records the requested
/// duration, so callers can assert that a pause happened.
#[derive(Debug)]
pub struct ManualClock {
    inner: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: Timestamp,
    pauses: Vec<Duration>,
}

impl ManualClock {
    /// Start the clock at `start`.
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            inner: Mutex::new(ManualState {
                now: start,
                pauses: Vec::new(),
            }),
        }
    }

    /// Start the clock at the Unix epoch.
    #[must_use]
    pub fn at_epoch() -> Self {
        Self::new(Timestamp::UNIX_EPOCH)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now = shift(state.now, by);
    }

    /// Every pause requested so far, in order.
    #[must_use]
    pub fn pauses(&self) -> Vec<Duration> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.pauses.clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.now
    }

    fn pause(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.pauses.push(duration);
        state.now = shift(state.now, duration);
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn pause(&self, duration: Duration) {
        (**self).pause(duration);
    }
}

/// Add a std duration to a timestamp, saturating at the maximum instant.
fn shift(ts: Timestamp, by: Duration) -> Timestamp {
    jiff::SignedDuration::try_from(by)
        .ok()
        .and_then(|d| ts.checked_add(d).ok())
        .unwrap_or(Timestamp::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::from_secs(45));
        assert_eq!(clock.now().as_second(), 45);
    }

    #[test]
    fn manual_pause_is_recorded_and_advances() {
        let clock = ManualClock::at_epoch();
        clock.pause(Duration::from_secs(3));
        assert_eq!(clock.pauses(), vec![Duration::from_secs(3)]);
        assert_eq!(clock.now().as_second(), 3);
    }

    #[test]
    fn system_clock_is_monotone_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
