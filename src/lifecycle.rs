// ============================================================================
// spark-timeouts - Lifecycle Hooks
//
// The two hook points a host component exposes to helpers like use_timeouts.
// ============================================================================

use std::cell::{Cell, RefCell};

/// Hook callback run once at a lifecycle point.
pub type HookFn = Box<dyn FnOnce()>;

/// Where a host component lets helpers run code around mount and unmount.
///
/// Hosts implement this on whatever represents a component during setup.
pub trait LifecycleHooks {
    /// Run `hook` right before the component mounts.
    fn on_before_mount(&self, hook: HookFn);

    /// Run `hook` right before the component unmounts.
    fn on_before_unmount(&self, hook: HookFn);
}

// =============================================================================
// MANUAL LIFECYCLE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Mounted,
    Unmounted,
}

/// A minimal [`LifecycleHooks`] host driven by explicit calls.
///
/// Collects hooks during setup, runs the before-mount hooks from
/// [`mount`](Self::mount) and the before-unmount hooks from
/// [`unmount`](Self::unmount), in registration order. Each phase runs once.
pub struct ManualLifecycle {
    phase: Cell<Phase>,
    before_mount: RefCell<Vec<HookFn>>,
    before_unmount: RefCell<Vec<HookFn>>,
}

impl Default for ManualLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualLifecycle {
    pub fn new() -> Self {
        Self {
            phase: Cell::new(Phase::Setup),
            before_mount: RefCell::new(Vec::new()),
            before_unmount: RefCell::new(Vec::new()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    /// Run the before-mount hooks. Only the first call does anything.
    pub fn mount(&self) {
        if self.phase.get() != Phase::Setup {
            return;
        }
        run_hooks(&self.before_mount);
        self.phase.set(Phase::Mounted);
    }

    /// Run the before-unmount hooks. Only the first call after mount does anything.
    pub fn unmount(&self) {
        if self.phase.get() != Phase::Mounted {
            return;
        }
        run_hooks(&self.before_unmount);
        self.phase.set(Phase::Unmounted);
        // Mount hooks that never ran go too
        self.before_mount.borrow_mut().clear();
    }
}

fn run_hooks(hooks: &RefCell<Vec<HookFn>>) {
    // Hooks may register more hooks, so release the borrow first
    let hooks: Vec<_> = hooks.borrow_mut().drain(..).collect();
    for hook in hooks {
        hook();
    }
}

impl LifecycleHooks for ManualLifecycle {
    fn on_before_mount(&self, hook: HookFn) {
        if self.phase.get() == Phase::Setup {
            self.before_mount.borrow_mut().push(hook);
        } else {
            tracing::debug!(
                phase = ?self.phase.get(),
                "before-mount hook registered too late, dropped"
            );
        }
    }

    fn on_before_unmount(&self, hook: HookFn) {
        if self.phase.get() == Phase::Unmounted {
            tracing::debug!("before-unmount hook registered after unmount, dropped");
        } else {
            self.before_unmount.borrow_mut().push(hook);
        }
    }
}
