// ============================================================================
// spark-timeouts - Integration Module
// The two ways a component picks up scoped timers: mixin and composable
// ============================================================================

pub mod composable;
pub mod mixin;

pub use composable::{Timeouts, use_timeouts};
pub use mixin::{TimerMixin, WithTimers};
