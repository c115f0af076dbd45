//! Error taxonomy for the fact store.
//!
//! Every failure mode a caller can act on is a distinct variant. The engine
//! never swallows hook or storage errors; the sole exception is hook
//! failures during session discard, which are reported through the journal
//! instead of unwinding the deletion.

use crate::types::FactId;
use thiserror::Error;

/// Boxed error type carried inside [`Error::Hook`].
pub type BoxedHookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// All fact store errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Payload rejected by a type's validator. No state change occurred.
    #[error("validation failed for type '{type_name}': {reason}")]
    ValidationFailed {
        /// The registered type whose validator rejected the payload.
        type_name: String,
        /// Field-level reason reported by the validator.
        reason: String,
    },

    /// Immutable singleton violation. No state change occurred.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Operation targeted a fact id that does not exist.
    #[error("fact not found: {0}")]
    NotFound(FactId),

    /// A hook raised during the commit critical section. The primary write
    /// has been reverted; the fact is in its pre-operation state.
    #[error("hook '{hook}' failed: {source}")]
    Hook {
        /// Name of the failing hook.
        hook: String,
        /// The original error raised by the hook.
        #[source]
        source: BoxedHookError,
    },

    /// Propagated from the storage backend. `consistent` reports whether
    /// the store's pre-operation state could be re-established.
    #[error("storage error: {message}")]
    Storage {
        /// Backend-reported failure description.
        message: String,
        /// `false` when a mid-operation failure left the store in a state
        /// the engine could not restore.
        consistent: bool,
    },

    /// Wire encoding or decoding failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invariant violation or bug. Not recoverable by retrying.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for fact store operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Storage failure before any state change was attempted.
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
            consistent: true,
        }
    }

    /// Storage failure after a partial write that could not be undone.
    pub fn storage_inconsistent(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
            consistent: false,
        }
    }

    /// Check if this is a validation failure.
    pub fn is_validation_failed(&self) -> bool {
        matches!(self, Error::ValidationFailed { .. })
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
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
