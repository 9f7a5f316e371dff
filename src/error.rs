use crate::session::SessionState;
use thiserror::Error;

/// Run tracker error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    #[error("Cannot {action} while {from:?}")]
    InvalidTransition {
        from: SessionState,
        action: &'static str,
    },

    #[error("Invalid fix: {0}")]
    InvalidFix(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    pub(crate) fn lock(what: &str) -> Self {
        TrackerError::Internal(format!("Failed to acquire {} lock", what))
    }

    /// True for the synchronous caller errors of the engine (bad transition or bad fix)
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TrackerError::InvalidTransition { .. } | TrackerError::InvalidFix(_)
        )
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Storage(err.to_string())
    }
}

/// Result type for engine operations
pub type TrackResult<T> = Result<T, TrackerError>;
