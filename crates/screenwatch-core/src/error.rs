//! Common error types for screenwatch-core.

use thiserror::Error;

/// Errors reported by a platform signal source.
///
/// `AlreadyRegistered` and `NotRegistered` are benign: the observer absorbs
/// them instead of surfacing them.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("listener already registered")]
    AlreadyRegistered,
    #[error("listener not registered")]
    NotRegistered,
    #[error("signal source unavailable: {0}")]
    Unavailable(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for signal source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Observer-level errors.
#[derive(Debug, Error)]
pub enum ObserverError {
    /// Registration or unregistration failed for a non-benign reason.
    #[error("observer unavailable: {reason}")]
    ObserverUnavailable { reason: String },
}

impl From<SourceError> for ObserverError {
    fn from(err: SourceError) -> Self {
        ObserverError::ObserverUnavailable {
            reason: err.to_string(),
        }
    }
}

/// Errors surfaced to the host by the subscription bridge.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Observer(#[from] ObserverError),
}

/// Result type for bridge lifecycle operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
