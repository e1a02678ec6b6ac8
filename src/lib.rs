// ============================================================================
// spark-timeouts - Component-Scoped Timers for Rust
// ============================================================================
//
// Timeouts and intervals owned by a UI component. Every timer a component
// creates is tracked, and whatever is still pending when the component is
// torn down gets cancelled, so no callback ever fires against a component
// that is gone.
//
// Layers:
// - platform    - where timers actually run (ManualClock, TokioPlatform)
// - registry    - TimerRegistry, the per-component tracking list
// - lifecycle   - the host's before-mount / before-unmount hook points
// - integration - mixin (WithTimers) and composable (use_timeouts) shapes
// ============================================================================

pub mod core;
pub mod integration;
pub mod lifecycle;
pub mod platform;
pub mod registry;

// Re-export core items at crate root for ergonomic access
pub use crate::core::error::TimerError;
pub use crate::core::types::{IntervalFn, RegistryState, TimeoutFn, TimerHandle, TimerKind};

pub use integration::{TimerMixin, Timeouts, WithTimers, use_timeouts};
pub use lifecycle::{HookFn, LifecycleHooks, ManualLifecycle};
pub use platform::{MIN_INTERVAL, ManualClock, PlatformCall, TimerPlatform};
#[cfg(feature = "tokio")]
pub use platform::TokioPlatform;
pub use registry::{TimerRegistry, WeakTimerRegistry};

// =============================================================================
// TESTS
// =============================================================================
