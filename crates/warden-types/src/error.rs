use thiserror::Error;

use crate::session::Phase;

/// Error taxonomy exposed to callers of the moderation core.
///
/// `StoreUnavailable` is the only kind worth a caller-side retry; everything
/// else is a deterministic outcome. Expected business outcomes (duplicate
/// submissions, fraud alerts) are not errors — they live on `IngestOutcome`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The shared store was unreachable or timed out. Transient; callers may
    /// retry or degrade to "try again shortly" messaging.
    #[error("shared store unavailable: {0}")]
    StoreUnavailable(String),

    /// A phase transition that the state machine does not allow.
    #[error("invalid phase transition: {from} -> {to}")]
    InvalidPhaseTransition { from: Phase, to: Phase },

    /// No session exists for the given (tenant, group).
    #[error("no active session")]
    NotFound,

    /// The durable archive write was not acknowledged. Hot state is left
    /// intact so the close can be retried.
    #[error("archive write failed: {0}")]
    ArchiveFailed(String),

    /// A value in the store could not be interpreted.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Internal(format!("serialization: {err}"))
    }
}
