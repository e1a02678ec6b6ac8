// ============================================================================
// spark-timeouts - Errors
// Why a timer could not be created
// ============================================================================

use thiserror::Error;

use super::types::RegistryState;

/// Reason a `try_set_timeout` / `try_set_interval` call created nothing.
///
/// The plain `set_*` methods swallow this and return `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimerError {
    /// The owner has not been initialized yet.
    #[error("timer registry is not activated yet")]
    NotActivated,
    /// The owner has already been torn down.
    #[error("timer registry has been torn down")]
    TornDown,
}

impl TimerError {
    /// The error matching an inactive state, `None` when `state` is active.
    pub fn for_state(state: RegistryState) -> Option<Self> {
        match state {
            RegistryState::Idle => Some(TimerError::NotActivated),
            RegistryState::Active => None,
            RegistryState::TornDown => Some(TimerError::TornDown),
        }
    }
}
