//! Journal entry records and operation codes.
//!
//! Every successful mutation appends exactly one [`TxEntry`] to the
//! per-session journal. Entries carry full before/after snapshots so the
//! journal is a replayable history: applying `fact_after` in order
//! reproduces a fact's current state, applying `fact_before` in reverse
//! restores a prior state.

use crate::fact::Fact;
use crate::types::{FactId, SessionId, TxId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operation codes recorded in the journal and observed by hooks.
///
/// The string forms are an external contract; they appear verbatim in
/// serialized journal entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// A new durable fact was created.
    Commit,
    /// A new session-scoped fact was created.
    CommitEphemeral,
    /// An existing fact's payload changed (explicit patch or repeated
    /// singleton commit).
    Update,
    /// A fact was removed.
    Delete,
    /// A session-scoped fact became durable.
    Promote,
    /// All facts of a session were bulk-deleted.
    DiscardSession,
}

impl Operation {
    /// The wire literal for this operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Commit => "COMMIT",
            Operation::CommitEphemeral => "COMMIT_EPHEMERAL",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
            Operation::Promote => "PROMOTE",
            Operation::DiscardSession => "DISCARD_SESSION",
        }
    }

    /// Whether the operation creates or refreshes a live fact (as opposed
    /// to removing one).
    pub fn is_upsert(&self) -> bool {
        matches!(
            self,
            Operation::Commit
                | Operation::CommitEphemeral
                | Operation::Update
                | Operation::Promote
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One completed mutation in the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxEntry {
    /// Unique entry id, used by rollback to drop consumed history.
    pub uuid: TxId,

    /// Monotonically increasing sequence number, assigned by the storage
    /// backend at append time. Strictly increasing within a session.
    pub seq: u64,

    /// When the mutation completed.
    pub ts: DateTime<Utc>,

    /// The journal partition this entry belongs to. `None` is the durable
    /// (no-session) partition.
    pub session_id: Option<SessionId>,

    /// What happened.
    pub op: Operation,

    /// The fact the mutation touched. `None` only for `DISCARD_SESSION`.
    pub fact_id: Option<FactId>,

    /// Full snapshot of the fact before the mutation, when one existed.
    pub fact_before: Option<Fact>,

    /// Full snapshot of the fact after the mutation, when one remains.
    pub fact_after: Option<Fact>,

    /// Optional audit tag: who performed the mutation.
    pub actor: Option<String>,

    /// Optional audit tag: why.
    pub reason: Option<String>,
}

impl TxEntry {
    /// Build an entry with a fresh uuid and the current timestamp.
    ///
    /// `seq` starts at zero; the storage backend assigns the real value
    /// when the entry is appended.
    pub fn record(
        op: Operation,
        session_id: Option<SessionId>,
        fact_id: Option<FactId>,
        fact_before: Option<Fact>,
        fact_after: Option<Fact>,
    ) -> Self {
        TxEntry {
            uuid: TxId::generate(),
            seq: 0,
            ts: Utc::now(),
            session_id,
            op,
            fact_id,
            fact_before,
            fact_after,
            actor: None,
            reason: None,
        }
    }

    /// Attach audit tags.
    pub fn with_audit(mut self, actor: Option<String>, reason: Option<String>) -> Self {
        self.actor = actor;
        self.reason = reason;
        self
    }
}
