//! Unified error type for the public facade.
//!
//! Wraps the internal taxonomy into a stable caller-facing enum. Every
//! variant is distinguishable so callers can branch on validation
//! failures, conflicts, missing facts, hook refusals, and storage faults
//! without string matching.

use thiserror::Error;

/// All fact store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload rejected by a registered validator. No state changed.
    #[error("validation failed for type '{type_name}': {reason}")]
    Validation {
        /// The type whose validator rejected the payload.
        type_name: String,
        /// Field-level reason.
        reason: String,
    },

    /// Immutable singleton violation. No state changed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The targeted fact id does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A hook refused the write. The primary store has been reverted to
    /// its pre-operation state.
    #[error("hook '{hook}' failed: {source}")]
    Hook {
        /// Name of the refusing hook.
        hook: String,
        /// The hook's original error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Storage backend fault. `consistent` is `false` when a mid-operation
    /// failure left state the engine could not restore.
    #[error("storage error: {message}")]
    Storage {
        /// Backend-reported description.
        message: String,
        /// Whether the pre-operation state was re-established.
        consistent: bool,
    },

    /// Wire encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invariant violation or bug.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for fact store operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this is a validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a hook failure.
    pub fn is_hook(&self) -> bool {
        matches!(self, Error::Hook { .. })
    }

    /// Check if this error left the store in a state that could not be
    /// restored.
    pub fn is_inconsistent(&self) -> bool {
        matches!(
            self,
            Error::Storage {
                consistent: false,
                ..
            }
        )
    }
}

impl From<factstore_core::Error> for Error {
    fn from(e: factstore_core::Error) -> Self {
        use factstore_core::Error as CoreError;
        match e {
            CoreError::ValidationFailed { type_name, reason } => {
                Error::Validation { type_name, reason }
            }
            CoreError::Conflict(msg) => Error::Conflict(msg),
            CoreError::NotFound(id) => Error::NotFound(id.to_string()),
            CoreError::Hook { hook, source } => Error::Hook { hook, source },
            CoreError::Storage {
                message,
                consistent,
            } => Error::Storage {
                message,
                consistent,
            },
            CoreError::Serialization(msg) => Error::Serialization(msg),
            CoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}
