// ============================================================================
// spark-timeouts - Timer Registry
//
// Tracks every timer an owner creates and cancels the leftovers on teardown.
// ============================================================================
//
// A TimerRegistry belongs to one component instance. Its lifecycle follows
// the owner:
//
//   Idle --activate()--> Active --teardown()--> TornDown
//
// While Active, every created timer's handle is recorded together with the
// primitive that made it. Clearing a timer, or a one-shot timer firing,
// removes the handle. Teardown cancels whatever is left, each with the
// cancellation primitive matching its kind, and the registry stays inert
// from then on.
//
// Outside the Active window every operation is a silent no-op.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::core::error::TimerError;
use crate::core::types::{IntervalFn, RegistryState, TimeoutFn, TimerHandle, TimerKind};
use crate::platform::TimerPlatform;

// =============================================================================
// REGISTRY INNER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TrackedTimer {
    handle: TimerHandle,
    kind: TimerKind,
}

struct RegistryInner<P: TimerPlatform> {
    state: Cell<RegistryState>,

    /// Handles created through this registry and not cancelled yet
    timers: RefCell<Vec<TrackedTimer>>,

    platform: P,

    /// Handed to one-shot wrappers so they can deregister themselves
    self_weak: Weak<RegistryInner<P>>,
}

impl<P: TimerPlatform> RegistryInner<P> {
    fn new(platform: P, state: RegistryState) -> Rc<Self> {
        Rc::new_cyclic(|weak| Self {
            state: Cell::new(state),
            timers: RefCell::new(Vec::new()),
            platform,
            self_weak: weak.clone(),
        })
    }

    fn activate(&self) {
        match self.state.get() {
            RegistryState::Idle => {
                self.timers.borrow_mut().clear();
                self.state.set(RegistryState::Active);
                tracing::debug!("timer registry activated");
            }
            RegistryState::Active => {
                tracing::trace!("timer registry already active");
            }
            RegistryState::TornDown => {
                tracing::warn!("ignoring activation of a torn down timer registry");
            }
        }
    }

    fn ensure_active(&self) -> Result<(), TimerError> {
        match TimerError::for_state(self.state.get()) {
            Some(err) => {
                tracing::trace!(%err, "timer request ignored");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn track(&self, handle: TimerHandle, kind: TimerKind) {
        self.timers.borrow_mut().push(TrackedTimer { handle, kind });
        tracing::trace!(handle = ?handle, kind = ?kind, "timer created");
    }

    /// Remove `handle` from tracking, returning the kind it was created with.
    fn untrack(&self, handle: TimerHandle) -> Option<TimerKind> {
        let mut timers = self.timers.borrow_mut();
        let pos = timers.iter().position(|t| t.handle == handle)?;
        Some(timers.swap_remove(pos).kind)
    }

    fn set_timeout(
        &self,
        callback: TimeoutFn,
        delay: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.ensure_active()?;

        // The platform assigns the handle only after the wrapper exists
        let own_handle: Rc<Cell<Option<TimerHandle>>> = Rc::new(Cell::new(None));
        let wrapper: TimeoutFn = Box::new({
            let registry = self.self_weak.clone();
            let own_handle = own_handle.clone();
            move || {
                if let (Some(registry), Some(handle)) = (registry.upgrade(), own_handle.get()) {
                    registry.clear(handle, TimerKind::OneShot);
                }
                callback();
            }
        });

        let handle = self.platform.create_one_shot(wrapper, delay);
        own_handle.set(Some(handle));
        self.track(handle, TimerKind::OneShot);
        Ok(handle)
    }

    fn set_interval(
        &self,
        callback: IntervalFn,
        interval: Duration,
    ) -> Result<TimerHandle, TimerError> {
        self.ensure_active()?;

        let handle = self.platform.create_repeating(callback, interval);
        self.track(handle, TimerKind::Repeating);
        Ok(handle)
    }

    /// Deregister `handle` and cancel it with the primitive for `requested`.
    ///
    /// A tracked handle of the other kind is also cancelled with its own
    /// primitive so it cannot outlive the owner untracked.
    fn clear(&self, handle: TimerHandle, requested: TimerKind) {
        if !self.state.get().is_active() {
            tracing::trace!(handle = ?handle, "clear ignored, registry inactive");
            return;
        }

        let tracked = self.untrack(handle);
        self.cancel(handle, requested);

        if let Some(kind) = tracked.filter(|kind| *kind != requested) {
            tracing::debug!(
                handle = ?handle,
                kind = ?kind,
                "timer cleared with the wrong primitive, cancelling with its own"
            );
            self.cancel(handle, kind);
        }
        tracing::trace!(handle = ?handle, tracked = tracked.is_some(), "timer cleared");
    }

    fn cancel(&self, handle: TimerHandle, kind: TimerKind) {
        match kind {
            TimerKind::OneShot => self.platform.cancel_one_shot(handle),
            TimerKind::Repeating => self.platform.cancel_repeating(handle),
        }
    }

    fn teardown(&self) {
        if !self.state.get().is_active() {
            return;
        }

        // Mark first so callbacks triggered by cancellation see an inert registry
        let leftovers = std::mem::take(&mut *self.timers.borrow_mut());
        self.state.set(RegistryState::TornDown);

        for timer in &leftovers {
            self.cancel(timer.handle, timer.kind);
        }
        tracing::debug!(cancelled = leftovers.len(), "timer registry torn down");
    }
}

impl<P: TimerPlatform> Drop for RegistryInner<P> {
    fn drop(&mut self) {
        // The owner went away without an explicit teardown
        self.teardown();
    }
}

// =============================================================================
// TIMER REGISTRY (Public wrapper)
// =============================================================================

/// Timers owned by one component, cancelled together when it goes away.
///
/// Cloning shares the same registry. When the last clone is dropped while
/// active, the registry tears itself down.
///
/// A callback that owns a clone keeps the registry alive for as long as its
/// timer is pending, so an interval holding a clone never lets the registry
/// drop on its own. Capture a [`downgrade`](Self::downgrade)d handle instead.
///
/// # Example
///
/// ```ignore
/// let clock = ManualClock::new();
/// let timers = TimerRegistry::new(clock.clone());
///
/// timers.activate(); // before mount
///
/// let flash = timers.set_timeout(|| println!("hide flash"), Duration::from_millis(150));
/// let poll = timers.set_interval(|| println!("poll"), Duration::from_millis(320));
///
/// timers.teardown(); // before unmount, both timers are cancelled
/// clock.advance(Duration::from_secs(1)); // prints nothing
/// ```
pub struct TimerRegistry<P: TimerPlatform> {
    inner: Rc<RegistryInner<P>>,
}

impl<P: TimerPlatform> Clone for TimerRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: TimerPlatform> TimerRegistry<P> {
    /// An empty registry that accepts timers once [`activate`](Self::activate)d.
    pub fn new(platform: P) -> Self {
        Self {
            inner: RegistryInner::new(platform, RegistryState::Idle),
        }
    }

    /// An empty registry that is active from construction.
    pub fn activated(platform: P) -> Self {
        let registry = Self::new(platform);
        registry.activate();
        registry
    }

    /// Start accepting timers. Call when the owner initializes.
    ///
    /// Activating an active registry does nothing. A torn down registry
    /// cannot be reactivated.
    pub fn activate(&self) {
        self.inner.activate();
    }

    /// Cancel every tracked timer and stop accepting new ones, for good.
    ///
    /// Each remaining timer is cancelled exactly once, through the primitive
    /// matching the way it was created. Does nothing unless active.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn state(&self) -> RegistryState {
        self.inner.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Schedule `callback` to run once after `delay`.
    ///
    /// The timer deregisters itself right before `callback` runs. Returns
    /// `None`, and schedules nothing, unless the registry is active.
    pub fn set_timeout<F>(&self, callback: F, delay: Duration) -> Option<TimerHandle>
    where
        F: FnOnce() + 'static,
    {
        self.try_set_timeout(callback, delay).ok()
    }

    /// Like [`set_timeout`](Self::set_timeout), reporting why nothing was scheduled.
    pub fn try_set_timeout<F>(
        &self,
        callback: F,
        delay: Duration,
    ) -> Result<TimerHandle, TimerError>
    where
        F: FnOnce() + 'static,
    {
        self.inner.set_timeout(Box::new(callback), delay)
    }

    /// Schedule `callback` to run every `interval` until cleared or torn down.
    ///
    /// Returns `None`, and schedules nothing, unless the registry is active.
    pub fn set_interval<F>(&self, callback: F, interval: Duration) -> Option<TimerHandle>
    where
        F: FnMut() + 'static,
    {
        self.try_set_interval(callback, interval).ok()
    }

    /// Like [`set_interval`](Self::set_interval), reporting why nothing was scheduled.
    pub fn try_set_interval<F>(
        &self,
        callback: F,
        interval: Duration,
    ) -> Result<TimerHandle, TimerError>
    where
        F: FnMut() + 'static,
    {
        self.inner.set_interval(Box::new(callback), interval)
    }

    /// Stop tracking `handle` and cancel it as a one-shot timer.
    ///
    /// Unknown or already cleared handles are passed to the platform anyway,
    /// whose cancellation is idempotent.
    pub fn clear_timeout(&self, handle: TimerHandle) {
        self.inner.clear(handle, TimerKind::OneShot);
    }

    /// Stop tracking `handle` and cancel it as a repeating timer.
    pub fn clear_interval(&self, handle: TimerHandle) {
        self.inner.clear(handle, TimerKind::Repeating);
    }

    /// Number of timers currently tracked.
    pub fn pending_count(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Whether `handle` was created here and is not cancelled yet.
    pub fn is_tracked(&self, handle: TimerHandle) -> bool {
        self.inner.timers.borrow().iter().any(|t| t.handle == handle)
    }

    /// Snapshot of the tracked handles.
    pub fn tracked_handles(&self) -> Vec<TimerHandle> {
        self.inner.timers.borrow().iter().map(|t| t.handle).collect()
    }

    /// The platform timers are scheduled on.
    pub fn platform(&self) -> &P {
        &self.inner.platform
    }

    /// A handle that does not keep the registry alive.
    pub fn downgrade(&self) -> WeakTimerRegistry<P> {
        WeakTimerRegistry {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`TimerRegistry`], for use inside timer callbacks.
pub struct WeakTimerRegistry<P: TimerPlatform> {
    inner: Weak<RegistryInner<P>>,
}

impl<P: TimerPlatform> Clone for WeakTimerRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: TimerPlatform> WeakTimerRegistry<P> {
    /// The registry, if some owner still holds it.
    pub fn upgrade(&self) -> Option<TimerRegistry<P>> {
        self.inner.upgrade().map(|inner| TimerRegistry { inner })
    }
}

impl<P: TimerPlatform> std::fmt::Debug for TimerRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("state", &self.state())
            .field("timers", &self.inner.timers.borrow())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
