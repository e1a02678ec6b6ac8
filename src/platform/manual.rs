// ============================================================================
// spark-timeouts - Manual Clock
//
// A timer platform whose time only moves when told to.
// ============================================================================
//
// ManualClock keeps its timers in a map keyed by handle and a virtual "now".
// Time moves forward through two calls:
//
// - advance(d)               - fire everything due up to now + d, in order
// - run_only_pending_timers  - fire each timer pending right now, once
//
// Every primitive call is appended to a log so owners can assert exactly
// which cancellations happened and how often.
//
// The clock is strict about kinds: cancel_one_shot ignores repeating timers
// and cancel_repeating ignores one-shot timers. Both still log the call.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use crate::core::types::{IntervalFn, TimeoutFn, TimerHandle, TimerKind};

use super::{TimerPlatform, clamp_interval};

// =============================================================================
// CALL LOG
// =============================================================================

/// One recorded call into the platform primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    CreateOneShot { handle: TimerHandle, delay: Duration },
    CancelOneShot(TimerHandle),
    CreateRepeating { handle: TimerHandle, interval: Duration },
    CancelRepeating(TimerHandle),
}

// =============================================================================
// TIMER ENTRIES
// =============================================================================

enum Callback {
    Once(TimeoutFn),
    Repeat(IntervalFn),
}

struct ManualTimer {
    /// `None` when the deadline lies past `Duration::MAX`, so it never fires
    deadline: Option<Duration>,
    /// `Some` for repeating timers
    period: Option<Duration>,
    /// `None` while the callback is running
    callback: Option<Callback>,
}

impl ManualTimer {
    fn kind(&self) -> TimerKind {
        if self.period.is_some() {
            TimerKind::Repeating
        } else {
            TimerKind::OneShot
        }
    }
}

struct ClockInner {
    now: Cell<Duration>,
    next_handle: Cell<u64>,
    timers: RefCell<BTreeMap<TimerHandle, ManualTimer>>,
    calls: RefCell<Vec<PlatformCall>>,
}

// =============================================================================
// MANUAL CLOCK
// =============================================================================

/// Deterministic virtual-time [`TimerPlatform`].
///
/// Cloning shares the same clock.
///
/// # Example
///
/// ```ignore
/// let clock = ManualClock::new();
/// let timers = TimerRegistry::activated(clock.clone());
///
/// timers.set_timeout(|| println!("done"), Duration::from_millis(150));
/// clock.advance(Duration::from_millis(150)); // prints "done"
/// ```
#[derive(Clone)]
pub struct ManualClock {
    inner: Rc<ClockInner>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// A clock at time zero with no timers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ClockInner {
                now: Cell::new(Duration::ZERO),
                next_handle: Cell::new(1),
                timers: RefCell::new(BTreeMap::new()),
                calls: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Current virtual time, measured from clock creation.
    pub fn now(&self) -> Duration {
        self.inner.now.get()
    }

    /// Number of timers still scheduled.
    pub fn pending_count(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    /// Whether `handle` is still scheduled.
    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.inner.timers.borrow().contains_key(&handle)
    }

    /// Deadline of the earliest scheduled timer.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.inner
            .timers
            .borrow()
            .values()
            .filter_map(|t| t.deadline)
            .min()
    }

    /// Move time forward by `by`, firing every timer that becomes due.
    ///
    /// Timers fire in deadline order (creation order on ties). A repeating
    /// timer fires as many times as its period fits in the window. Timers
    /// created by a callback fire in the same call if they fall inside it.
    pub fn advance(&self, by: Duration) {
        let target = self.now().saturating_add(by);
        while let Some(handle) = self.next_due(target) {
            self.fire(handle);
        }
        // A callback may already have advanced past the target
        self.inner.now.set(target.max(self.now()));
    }

    /// Fire each timer that is pending at call time exactly once.
    ///
    /// Time jumps to each timer's deadline as it fires. Timers created while
    /// running are left for a later call.
    pub fn run_only_pending_timers(&self) {
        let mut pending: Vec<(Duration, TimerHandle)> = self
            .inner
            .timers
            .borrow()
            .iter()
            .filter(|(_, t)| t.callback.is_some())
            .filter_map(|(h, t)| Some((t.deadline?, *h)))
            .collect();
        pending.sort();

        for (_, handle) in pending {
            self.fire(handle);
        }
    }

    /// Every primitive call made so far, oldest first.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.inner.calls.borrow().clone()
    }

    /// Forget the call log.
    pub fn clear_calls(&self) {
        self.inner.calls.borrow_mut().clear();
    }

    /// How many times `cancel_one_shot(handle)` was called.
    pub fn cancel_one_shot_count(&self, handle: TimerHandle) -> usize {
        self.count_calls(|call| *call == PlatformCall::CancelOneShot(handle))
    }

    /// How many times `cancel_repeating(handle)` was called.
    pub fn cancel_repeating_count(&self, handle: TimerHandle) -> usize {
        self.count_calls(|call| *call == PlatformCall::CancelRepeating(handle))
    }

    /// Total number of cancellation calls of either kind.
    pub fn cancel_count(&self) -> usize {
        self.count_calls(|call| {
            matches!(
                call,
                PlatformCall::CancelOneShot(_) | PlatformCall::CancelRepeating(_)
            )
        })
    }

    fn count_calls(&self, pred: impl Fn(&PlatformCall) -> bool) -> usize {
        self.inner.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: PlatformCall) {
        self.inner.calls.borrow_mut().push(call);
    }

    fn next_handle(&self) -> TimerHandle {
        let raw = self.inner.next_handle.get();
        self.inner.next_handle.set(raw + 1);
        TimerHandle::from_raw(raw)
    }

    fn schedule(
        &self,
        deadline: Option<Duration>,
        period: Option<Duration>,
        callback: Callback,
    ) -> TimerHandle {
        let handle = self.next_handle();
        self.inner.timers.borrow_mut().insert(
            handle,
            ManualTimer {
                deadline,
                period,
                callback: Some(callback),
            },
        );
        handle
    }

    fn cancel(&self, handle: TimerHandle, kind: TimerKind) {
        let mut timers = self.inner.timers.borrow_mut();
        if timers.get(&handle).is_some_and(|t| t.kind() == kind) {
            timers.remove(&handle);
        }
    }

    /// Earliest timer due at or before `limit` that is not currently running.
    fn next_due(&self, limit: Duration) -> Option<TimerHandle> {
        self.inner
            .timers
            .borrow()
            .iter()
            .filter(|(_, t)| t.callback.is_some())
            .filter_map(|(h, t)| t.deadline.filter(|d| *d <= limit).map(|d| (d, *h)))
            .min()
            .map(|(_, h)| h)
    }

    /// Run one timer's callback with no borrow held across the call.
    fn fire(&self, handle: TimerHandle) {
        // Collect under the borrow, then release it before running user code
        let callback = {
            let mut timers = self.inner.timers.borrow_mut();
            let Some(timer) = timers.get_mut(&handle) else {
                return;
            };
            let Some(callback) = timer.callback.take() else {
                return;
            };
            if let Some(deadline) = timer.deadline.filter(|d| *d > self.now()) {
                self.inner.now.set(deadline);
            }
            let period = timer.period;
            match period {
                Some(period) => {
                    timer.deadline = timer.deadline.and_then(|d| d.checked_add(period));
                }
                None => {
                    timers.remove(&handle);
                }
            }
            callback
        };

        tracing::trace!(handle = ?handle, now = ?self.now(), "manual clock firing timer");

        match callback {
            Callback::Once(f) => f(),
            Callback::Repeat(mut f) => {
                f();
                // Put it back unless the callback cancelled its own timer
                if let Some(timer) = self.inner.timers.borrow_mut().get_mut(&handle) {
                    timer.callback = Some(Callback::Repeat(f));
                }
            }
        }
    }
}

impl TimerPlatform for ManualClock {
    fn create_one_shot(&self, callback: TimeoutFn, delay: Duration) -> TimerHandle {
        let handle = self.schedule(
            self.now().checked_add(delay),
            None,
            Callback::Once(callback),
        );
        self.record(PlatformCall::CreateOneShot { handle, delay });
        handle
    }

    fn cancel_one_shot(&self, handle: TimerHandle) {
        self.record(PlatformCall::CancelOneShot(handle));
        self.cancel(handle, TimerKind::OneShot);
    }

    fn create_repeating(&self, callback: IntervalFn, interval: Duration) -> TimerHandle {
        let period = clamp_interval(interval);
        let handle = self.schedule(
            self.now().checked_add(period),
            Some(period),
            Callback::Repeat(callback),
        );
        self.record(PlatformCall::CreateRepeating { handle, interval });
        handle
    }

    fn cancel_repeating(&self, handle: TimerHandle) {
        self.record(PlatformCall::CancelRepeating(handle));
        self.cancel(handle, TimerKind::Repeating);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl FnMut() + 'static) {
        let count = Rc::new(Cell::new(0));
        let count_clone = count.clone();
        (count, move || count_clone.set(count_clone.get() + 1))
    }

    #[test]
    fn one_shot_fires_once_at_deadline() {
        let clock = ManualClock::new();
        let (count, mut bump) = counter();

        let handle = clock.create_one_shot(Box::new(move || bump()), Duration::from_millis(150));

        clock.advance(Duration::from_millis(149));
        assert_eq!(count.get(), 0);
        assert!(clock.is_pending(handle));

        clock.advance(Duration::from_millis(1));
        assert_eq!(count.get(), 1);
        assert!(!clock.is_pending(handle));

        clock.advance(Duration::from_secs(10));
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn repeating_fires_every_period_within_advance() {
        let clock = ManualClock::new();
        let (count, bump) = counter();

        clock.create_repeating(Box::new(bump), Duration::from_millis(100));

        clock.advance(Duration::from_millis(350));
        assert_eq!(count.get(), 3);
        assert_eq!(clock.now(), Duration::from_millis(350));
        assert_eq!(clock.next_deadline(), Some(Duration::from_millis(400)));
    }

    #[test]
    fn run_only_pending_fires_each_timer_once() {
        let clock = ManualClock::new();
        let (ticks, tick) = counter();
        let (shots, mut shot) = counter();

        clock.create_repeating(Box::new(tick), Duration::from_millis(320));
        clock.create_one_shot(Box::new(move || shot()), Duration::from_millis(1000));

        clock.run_only_pending_timers();
        assert_eq!(ticks.get(), 1);
        assert_eq!(shots.get(), 1);
        assert_eq!(clock.now(), Duration::from_millis(1000));

        clock.run_only_pending_timers();
        assert_eq!(ticks.get(), 2);
        assert_eq!(shots.get(), 1);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let clock = ManualClock::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (label, delay) in [("c", 30), ("a", 10), ("b", 20), ("a2", 10)] {
            let order = order.clone();
            clock.create_one_shot(
                Box::new(move || order.borrow_mut().push(label)),
                Duration::from_millis(delay),
            );
        }

        clock.advance(Duration::from_millis(30));
        assert_eq!(*order.borrow(), vec!["a", "a2", "b", "c"]);
    }

    #[test]
    fn cancel_is_idempotent_and_logged() {
        let clock = ManualClock::new();
        let (count, mut bump) = counter();

        let handle = clock.create_one_shot(Box::new(move || bump()), Duration::from_millis(5));
        clock.cancel_one_shot(handle);
        clock.cancel_one_shot(handle);
        clock.cancel_one_shot(TimerHandle::from_raw(999));

        clock.advance(Duration::from_millis(10));
        assert_eq!(count.get(), 0);
        assert_eq!(clock.cancel_one_shot_count(handle), 2);
        assert_eq!(clock.cancel_count(), 3);
    }

    #[test]
    fn cancel_primitives_are_strict_about_kind() {
        let clock = ManualClock::new();
        let (count, bump) = counter();

        let handle = clock.create_repeating(Box::new(bump), Duration::from_millis(10));
        clock.cancel_one_shot(handle);
        clock.advance(Duration::from_millis(10));
        assert_eq!(count.get(), 1, "one-shot cancel must not stop a repeating timer");

        clock.cancel_repeating(handle);
        clock.advance(Duration::from_millis(50));
        assert_eq!(count.get(), 1);
        assert_eq!(clock.pending_count(), 0);
    }

    #[test]
    fn repeating_callback_can_cancel_itself() {
        let clock = ManualClock::new();
        let count = Rc::new(Cell::new(0));
        let slot: Rc<Cell<Option<TimerHandle>>> = Rc::new(Cell::new(None));

        let handle = clock.create_repeating(
            Box::new({
                let clock = clock.clone();
                let count = count.clone();
                let slot = slot.clone();
                move || {
                    count.set(count.get() + 1);
                    if count.get() == 2 {
                        if let Some(h) = slot.get() {
                            clock.cancel_repeating(h);
                        }
                    }
                }
            }),
            Duration::from_millis(10),
        );
        slot.set(Some(handle));

        clock.advance(Duration::from_millis(100));
        assert_eq!(count.get(), 2);
        assert!(!clock.is_pending(handle));
    }

    #[test]
    fn zero_interval_does_not_spin() {
        let clock = ManualClock::new();
        let (count, bump) = counter();

        clock.create_repeating(Box::new(bump), Duration::ZERO);
        clock.advance(Duration::from_millis(3));
        assert_eq!(count.get(), 3);
    }

    #[test]
    fn max_duration_timers_never_fire() {
        let clock = ManualClock::new();
        let (ticks, tick) = counter();
        let (shots, mut shot) = counter();
        clock.advance(Duration::from_millis(1));

        let once = clock.create_one_shot(Box::new(move || shot()), Duration::MAX);
        let every = clock.create_repeating(Box::new(tick), Duration::MAX);

        clock.advance(Duration::MAX);
        clock.run_only_pending_timers();
        assert_eq!(shots.get(), 0);
        assert_eq!(ticks.get(), 0);
        assert_eq!(clock.now(), Duration::MAX);
        assert!(clock.is_pending(once) && clock.is_pending(every));
        assert_eq!(clock.next_deadline(), None);
    }

    #[test]
    fn repeating_timer_stops_when_next_deadline_overflows() {
        let clock = ManualClock::new();
        let (ticks, tick) = counter();
        let period = Duration::MAX / 2 + Duration::from_secs(1);

        clock.create_repeating(Box::new(tick), period);
        clock.advance(Duration::MAX);

        assert_eq!(ticks.get(), 1);
        assert_eq!(clock.next_deadline(), None);
    }

    #[test]
    fn nested_advance_does_not_move_time_backwards() {
        let clock = ManualClock::new();
        clock.create_one_shot(
            Box::new({
                let clock = clock.clone();
                move || clock.advance(Duration::from_millis(100))
            }),
            Duration::from_millis(10),
        );

        clock.advance(Duration::from_millis(20));
        assert_eq!(clock.now(), Duration::from_millis(110));
    }

    #[test]
    fn call_log_records_requested_durations() {
        let clock = ManualClock::new();
        let one = clock.create_one_shot(Box::new(|| {}), Duration::from_millis(150));
        let rep = clock.create_repeating(Box::new(|| {}), Duration::from_millis(320));
        clock.cancel_repeating(rep);

        assert_eq!(
            clock.calls(),
            vec![
                PlatformCall::CreateOneShot { handle: one, delay: Duration::from_millis(150) },
                PlatformCall::CreateRepeating { handle: rep, interval: Duration::from_millis(320) },
                PlatformCall::CancelRepeating(rep),
            ]
        );

        clock.clear_calls();
        assert!(clock.calls().is_empty());
    }
}
