// ============================================================================
// spark-timeouts - Timer Mixin
//
// Component-owned timers that are live from construction and cancelled
// before the component is destroyed.
// ============================================================================
//
// A component embeds a TimerMixin and implements WithTimers by pointing at
// it. The four timer methods then read as the component's own:
//
//   struct Toast { timers: TimerMixin<ManualClock>, ... }
//
//   impl WithTimers for Toast {
//       type Platform = ManualClock;
//       fn timers(&self) -> &TimerRegistry<ManualClock> { self.timers.registry() }
//   }
//
//   toast.set_timeout(|| ..., Duration::from_secs(3));
// ============================================================================

use std::time::Duration;

use crate::core::types::TimerHandle;
use crate::platform::TimerPlatform;
use crate::registry::TimerRegistry;

/// Timer methods for any type that owns a [`TimerRegistry`].
pub trait WithTimers {
    type Platform: TimerPlatform;

    /// The registry the timer methods forward to.
    fn timers(&self) -> &TimerRegistry<Self::Platform>;

    fn set_timeout<F>(&self, callback: F, delay: Duration) -> Option<TimerHandle>
    where
        F: FnOnce() + 'static,
    {
        self.timers().set_timeout(callback, delay)
    }

    fn set_interval<F>(&self, callback: F, interval: Duration) -> Option<TimerHandle>
    where
        F: FnMut() + 'static,
    {
        self.timers().set_interval(callback, interval)
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.timers().clear_timeout(handle)
    }

    fn clear_interval(&self, handle: TimerHandle) {
        self.timers().clear_interval(handle)
    }
}

/// A timer registry active from construction, torn down on
/// [`destroy`](Self::destroy) or drop.
pub struct TimerMixin<P: TimerPlatform> {
    registry: TimerRegistry<P>,
}

impl<P: TimerPlatform> TimerMixin<P> {
    pub fn new(platform: P) -> Self {
        Self {
            registry: TimerRegistry::activated(platform),
        }
    }

    pub fn registry(&self) -> &TimerRegistry<P> {
        &self.registry
    }

    /// Cancel every pending timer. Call right before the owner is destroyed.
    pub fn destroy(&self) {
        self.registry.teardown();
    }
}

impl<P: TimerPlatform> WithTimers for TimerMixin<P> {
    type Platform = P;

    fn timers(&self) -> &TimerRegistry<P> {
        &self.registry
    }
}

impl<P: TimerPlatform> Drop for TimerMixin<P> {
    fn drop(&mut self) {
        // Clones of the registry must not keep timers alive past the owner
        self.registry.teardown();
    }
}
