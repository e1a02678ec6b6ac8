// ============================================================================
// spark-timeouts - Core Module
// Handle and state types plus the error type
// ============================================================================

pub mod error;
pub mod types;

// Re-export commonly used items
pub use error::TimerError;
pub use types::{IntervalFn, RegistryState, TimeoutFn, TimerHandle, TimerKind};
