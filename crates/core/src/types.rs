//! Identifier newtypes.
//!
//! All identifiers cross the wire as opaque strings. Callers may supply
//! their own fact ids; generated ids use UUID v4.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a fact.
///
/// Stable across updates: a fact keeps its id for its entire lifetime,
/// including singleton-triggered updates where an incoming fact's id is
/// overridden with the id of the matched existing fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(String);

impl FactId {
    /// Create a fact id from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        FactId(id.into())
    }

    /// Generate a fresh random fact id (UUID v4).
    pub fn generate() -> Self {
        FactId(Uuid::new_v4().to_string())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FactId {
    fn from(s: &str) -> Self {
        FactId(s.to_string())
    }
}

impl From<String> for FactId {
    fn from(s: String) -> Self {
        FactId(s)
    }
}

impl std::fmt::Display for FactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scope binding for ephemeral (working-memory) facts.
///
/// A session is the unit of bulk discard and of journal partitioning.
/// Facts without a session binding are durable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from an existing string.
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        SessionId(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        SessionId(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a journal entry.
///
/// Used by rollback to drop consumed entries by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(Uuid);

impl TxId {
    /// Generate a fresh random entry id.
    pub fn generate() -> Self {
        TxId(Uuid::new_v4())
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
