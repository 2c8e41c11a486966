//! Error types for the timeline history system.
//!

use crate::state_machine::ServiceState;
use thiserror::Error;

/// Crate-wide error type
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Service already started (current state: {state})")]
    AlreadyStarted { state: ServiceState },

    #[error("Illegal state transition from {from} to {to}")]
    IllegalTransition { from: ServiceState, to: ServiceState },

    #[error("Service is not accepting events (current state: {state})")]
    NotAccepting { state: ServiceState },

    #[error("Event queue saturated: capacity {capacity} still full after {waited_ms}ms")]
    QueueSaturated { capacity: usize, waited_ms: u64 },

    #[error("Remote store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<config::ConfigError> for TimelineError {
    fn from(error: config::ConfigError) -> Self {
        TimelineError::Configuration(error.to_string())
    }
}

impl TimelineError {
    /// True for the state-conflict family (`start()` twice, backwards transitions)
    pub fn is_state_conflict(&self) -> bool {
        matches!(
            self,
            Self::AlreadyStarted { .. } | Self::IllegalTransition { .. }
        )
    }
}

/// Failures reported by a remote timeline store backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network-level failure; the call may succeed if retried
    #[error("Timeline store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete within its per-call timeout
    #[error("Timeline store {operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// The store refused the request; retrying will not help
    #[error("Timeline store rejected request: {0}")]
    Rejected(String),

    /// The store returned data that could not be decoded
    #[error("Malformed timeline entity {entity_id}: {reason}")]
    Malformed { entity_id: String, reason: String },
}

impl StoreError {
    /// Whether backoff-and-retry applies to this failure
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}

pub type TimelineResult<T> = std::result::Result<T, TimelineError>;
pub type StoreResult<T> = std::result::Result<T, StoreError>;
