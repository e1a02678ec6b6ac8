// ============================================================================
// spark-timeouts - Timer Platform
//
// Pluggable timer primitives the registry schedules through.
// ============================================================================
//
// A platform owns the actual clock. The registry never waits on anything
// itself: it asks the platform for a timer, remembers the returned handle,
// and asks the platform to cancel it later.
//
// Implementations:
// - ManualClock   - virtual time advanced by hand (tests, headless hosts)
// - TokioPlatform - tokio tasks on a LocalSet (feature "tokio")
// ============================================================================

use std::rc::Rc;
use std::time::Duration;

use crate::core::types::{IntervalFn, TimeoutFn, TimerHandle};

pub mod manual;
#[cfg(feature = "tokio")]
pub mod tokio;

pub use manual::{ManualClock, PlatformCall};
#[cfg(feature = "tokio")]
pub use self::tokio::TokioPlatform;

/// Shortest period a repeating timer may have.
///
/// A zero period would make a repeating timer due forever at the same instant.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

// =============================================================================
// TIMER PLATFORM TRAIT
// =============================================================================

/// The four timer primitives of a host platform.
///
/// Callbacks run on the thread that owns the platform, never re-entrantly
/// from inside one of these methods.
///
/// Cancellation must be idempotent: cancelling an unknown, already fired or
/// already cancelled handle does nothing.
pub trait TimerPlatform: 'static {
    /// Schedule `callback` to run once after `delay`.
    fn create_one_shot(&self, callback: TimeoutFn, delay: Duration) -> TimerHandle;

    /// Cancel a one-shot timer.
    fn cancel_one_shot(&self, handle: TimerHandle);

    /// Schedule `callback` to run every `interval`, first after one interval.
    fn create_repeating(&self, callback: IntervalFn, interval: Duration) -> TimerHandle;

    /// Cancel a repeating timer.
    fn cancel_repeating(&self, handle: TimerHandle);
}

impl<T: TimerPlatform + ?Sized> TimerPlatform for Rc<T> {
    fn create_one_shot(&self, callback: TimeoutFn, delay: Duration) -> TimerHandle {
        (**self).create_one_shot(callback, delay)
    }

    fn cancel_one_shot(&self, handle: TimerHandle) {
        (**self).cancel_one_shot(handle)
    }

    fn create_repeating(&self, callback: IntervalFn, interval: Duration) -> TimerHandle {
        (**self).create_repeating(callback, interval)
    }

    fn cancel_repeating(&self, handle: TimerHandle) {
        (**self).cancel_repeating(handle)
    }
}

/// Clamp a repeating period to [`MIN_INTERVAL`].
pub(crate) fn clamp_interval(interval: Duration) -> Duration {
    interval.max(MIN_INTERVAL)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn zero_interval_is_clamped() {
        assert_eq!(clamp_interval(Duration::ZERO), MIN_INTERVAL);
        assert_eq!(
            clamp_interval(Duration::from_millis(320)),
            Duration::from_millis(320)
        );
    }

    #[test]
    fn rc_platform_forwards_to_inner() {
        let clock = Rc::new(ManualClock::new());
        let fired = Rc::new(Cell::new(false));
        let fired_clone = fired.clone();

        let handle = clock.create_one_shot(
            Box::new(move || fired_clone.set(true)),
            Duration::from_millis(10),
        );
        assert!(clock.is_pending(handle));

        clock.advance(Duration::from_millis(10));
        assert!(fired.get());
    }
}
