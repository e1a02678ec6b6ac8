// ============================================================================
// spark-timeouts - Tokio Platform
//
// Real timers backed by tokio tasks on the current LocalSet.
// ============================================================================
//
// Each timer is a `spawn_local` task that sleeps (one-shot) or ticks an
// interval (repeating) and then runs the callback on the LocalSet's thread.
// Cancelling aborts the task. An aborted task is never polled again, so a
// cancelled callback cannot run even if its deadline already passed.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::time::Duration;

use tokio::task::{AbortHandle, spawn_local};
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep};

use crate::core::types::{IntervalFn, TimeoutFn, TimerHandle};

use super::{TimerPlatform, clamp_interval};

/// `Instant::now() + after`, or roughly thirty years out when that overflows.
fn far_future_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

struct TokioInner {
    next_handle: Cell<u64>,
    tasks: RefCell<HashMap<TimerHandle, AbortHandle>>,
}

impl TokioInner {
    fn forget(&self, handle: TimerHandle) {
        self.tasks.borrow_mut().remove(&handle);
    }

    fn abort(&self, handle: TimerHandle) {
        if let Some(task) = self.tasks.borrow_mut().remove(&handle) {
            task.abort();
        }
    }
}

/// [`TimerPlatform`] running timers as tokio tasks.
///
/// Must be used from inside a [`tokio::task::LocalSet`]; callbacks are not
/// `Send` and run on the LocalSet's thread. Cloning shares the same task table.
///
/// Dropping the last clone does not abort running timers; cancel them first
/// (a [`TimerRegistry`](crate::registry::TimerRegistry) does this on teardown).
///
/// # Example
///
/// ```ignore
/// let local = tokio::task::LocalSet::new();
/// local.run_until(async {
///     let timers = TimerRegistry::activated(TokioPlatform::new());
///     timers.set_timeout(|| println!("later"), Duration::from_millis(150));
///     tokio::time::sleep(Duration::from_millis(200)).await;
/// }).await;
/// ```
#[derive(Clone)]
pub struct TokioPlatform {
    inner: Rc<TokioInner>,
}

impl Default for TokioPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl TokioPlatform {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TokioInner {
                next_handle: Cell::new(1),
                tasks: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Number of timers whose task is still scheduled.
    pub fn pending_count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    fn next_handle(&self) -> TimerHandle {
        let raw = self.inner.next_handle.get();
        self.inner.next_handle.set(raw + 1);
        TimerHandle::from_raw(raw)
    }

    fn downgrade(&self) -> Weak<TokioInner> {
        Rc::downgrade(&self.inner)
    }
}

impl TimerPlatform for TokioPlatform {
    fn create_one_shot(&self, callback: TimeoutFn, delay: Duration) -> TimerHandle {
        let handle = self.next_handle();
        let weak = self.downgrade();

        let task = spawn_local(async move {
            sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.forget(handle);
            }
            tracing::trace!(handle = ?handle, "tokio one-shot timer fired");
            callback();
        });

        self.inner
            .tasks
            .borrow_mut()
            .insert(handle, task.abort_handle());
        handle
    }

    fn cancel_one_shot(&self, handle: TimerHandle) {
        self.inner.abort(handle);
    }

    fn create_repeating(&self, mut callback: IntervalFn, interval: Duration) -> TimerHandle {
        let handle = self.next_handle();
        let period = clamp_interval(interval);

        let task = spawn_local(async move {
            let mut ticker = interval_at(far_future_after(period), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tracing::trace!(handle = ?handle, "tokio repeating timer ticked");
                callback();
            }
        });

        self.inner
            .tasks
            .borrow_mut()
            .insert(handle, task.abort_handle());
        handle
    }

    fn cancel_repeating(&self, handle: TimerHandle) {
        self.inner.abort(handle);
    }
}
