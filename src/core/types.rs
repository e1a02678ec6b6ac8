// ============================================================================
// spark-timeouts - Type Definitions
// Handles, timer kinds and registry states shared by every module
// ============================================================================

use std::fmt;

// =============================================================================
// TIMER HANDLE
// =============================================================================

/// Opaque identifier of a scheduled timer.
///
/// Handles are assigned by the [`TimerPlatform`](crate::platform::TimerPlatform)
/// that created the timer. The registry only compares them, it never
/// interprets the raw value.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl TimerHandle {
    /// Wrap a platform-assigned identifier.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The platform-assigned identifier.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerHandle({})", self.0)
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// TIMER KIND
// =============================================================================

/// Which platform primitive created a timer, and so which one cancels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Fires once after a delay.
    OneShot,
    /// Fires every interval until cancelled.
    Repeating,
}

// =============================================================================
// REGISTRY STATE
// =============================================================================

/// Lifecycle state of a [`TimerRegistry`](crate::registry::TimerRegistry).
///
/// Transitions only move forward: `Idle -> Active -> TornDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryState {
    /// Constructed, owner not initialized yet. Create calls are no-ops.
    #[default]
    Idle,
    /// Owner initialized. Create and cancel calls are tracked.
    Active,
    /// Owner torn down. Every call is a no-op, permanently.
    TornDown,
}

impl RegistryState {
    pub fn is_active(self) -> bool {
        self == RegistryState::Active
    }
}

// =============================================================================
// CALLBACK TYPES
// =============================================================================

/// Callback of a one-shot timer, consumed when it fires.
pub type TimeoutFn = Box<dyn FnOnce()>;

/// Callback of a repeating timer, invoked on every tick.
pub type IntervalFn = Box<dyn FnMut()>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn handle_raw_value_round_trips() {
        let handle = TimerHandle::from_raw(7);
        assert_eq!(handle.into_raw(), 7);
        assert_eq!(format!("{handle}"), "#7");
        assert_eq!(format!("{handle:?}"), "TimerHandle(7)");
    }

    #[test]
    fn handles_are_hashable_and_ordered() {
        let mut set = HashSet::new();
        set.insert(TimerHandle::from_raw(1));
        set.insert(TimerHandle::from_raw(1));
        set.insert(TimerHandle::from_raw(2));
        assert_eq!(set.len(), 2);
        assert!(TimerHandle::from_raw(1) < TimerHandle::from_raw(2));
    }

    #[test]
    fn only_active_state_is_active() {
        assert_eq!(RegistryState::default(), RegistryState::Idle);
        assert!(!RegistryState::Idle.is_active());
        assert!(RegistryState::Active.is_active());
        assert!(!RegistryState::TornDown.is_active());
    }
}
