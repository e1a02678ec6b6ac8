// ============================================================================
// spark-timeouts - use_timeouts
//
// Timer functions for use during a component's setup phase.
// ============================================================================

use std::time::Duration;

use crate::core::types::TimerHandle;
use crate::lifecycle::LifecycleHooks;
use crate::platform::TimerPlatform;
use crate::registry::TimerRegistry;

/// The timer functions returned by [`use_timeouts`].
///
/// Calls made before the component mounts, or after it unmounts, do nothing
/// and return `None`.
pub struct Timeouts<P: TimerPlatform> {
    registry: TimerRegistry<P>,
}

impl<P: TimerPlatform> Clone for Timeouts<P> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<P: TimerPlatform> Timeouts<P> {
    pub fn set_timeout<F>(&self, callback: F, delay: Duration) -> Option<TimerHandle>
    where
        F: FnOnce() + 'static,
    {
        self.registry.set_timeout(callback, delay)
    }

    pub fn set_interval<F>(&self, callback: F, interval: Duration) -> Option<TimerHandle>
    where
        F: FnMut() + 'static,
    {
        self.registry.set_interval(callback, interval)
    }

    pub fn clear_timeout(&self, handle: TimerHandle) {
        self.registry.clear_timeout(handle)
    }

    pub fn clear_interval(&self, handle: TimerHandle) {
        self.registry.clear_interval(handle)
    }

    /// The registry behind these functions.
    pub fn registry(&self) -> &TimerRegistry<P> {
        &self.registry
    }
}

/// Create component-scoped timer functions.
///
/// Call during setup. Timers are accepted from the host's before-mount hook
/// on and all pending ones are cancelled in its before-unmount hook.
///
/// # Example
///
/// ```ignore
/// fn setup(hooks: &impl LifecycleHooks, clock: ManualClock) {
///     let timers = use_timeouts(hooks, clock);
///
///     hooks.on_before_mount(Box::new({
///         let timers = timers.clone();
///         move || {
///             timers.set_interval(|| println!("refresh"), Duration::from_secs(30));
///         }
///     }));
/// }
/// ```
pub fn use_timeouts<H, P>(hooks: &H, platform: P) -> Timeouts<P>
where
    H: LifecycleHooks + ?Sized,
    P: TimerPlatform,
{
    let registry = TimerRegistry::new(platform);

    hooks.on_before_mount(Box::new({
        let registry = registry.clone();
        move || registry.activate()
    }));
    hooks.on_before_unmount(Box::new({
        let registry = registry.clone();
        move || registry.teardown()
    }));

    Timeouts { registry }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RegistryState;
    use crate::lifecycle::ManualLifecycle;
    use crate::platform::ManualClock;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn inactive_until_mount() {
        let clock = ManualClock::new();
        let lifecycle = ManualLifecycle::new();
        let timers = use_timeouts(&lifecycle, clock.clone());

        assert_eq!(timers.set_timeout(|| {}, Duration::from_millis(10)), None);
        assert_eq!(timers.registry().state(), RegistryState::Idle);

        lifecycle.mount();
        assert!(timers.set_timeout(|| {}, Duration::from_millis(10)).is_some());
    }

    #[test]
    fn unmount_cancels_pending_timers() {
        let clock = ManualClock::new();
        let lifecycle = ManualLifecycle::new();
        let timers = use_timeouts(&lifecycle, clock.clone());
        let count = Rc::new(Cell::new(0));
        lifecycle.mount();

        let handle = timers
            .set_interval(
                {
                    let count = count.clone();
                    move || count.set(count.get() + 1)
                },
                Duration::from_millis(320),
            )
            .unwrap();
        clock.advance(Duration::from_millis(320));
        assert_eq!(count.get(), 1);

        lifecycle.unmount();
        clock.advance(Duration::from_secs(5));

        assert_eq!(count.get(), 1);
        assert_eq!(clock.cancel_repeating_count(handle), 1);
        assert_eq!(timers.registry().state(), RegistryState::TornDown);
        assert_eq!(timers.set_interval(|| {}, Duration::from_millis(1)), None);
    }

    #[test]
    fn timers_can_start_from_a_mount_hook() {
        let clock = ManualClock::new();
        let lifecycle = ManualLifecycle::new();
        let fired = Rc::new(Cell::new(false));

        let timers = use_timeouts(&lifecycle, clock.clone());
        lifecycle.on_before_mount(Box::new({
            let timers = timers.clone();
            let fired = fired.clone();
            move || {
                timers.set_timeout(move || fired.set(true), Duration::from_millis(50));
            }
        }));

        lifecycle.mount();
        clock.advance(Duration::from_millis(50));
        assert!(fired.get());
    }
}
