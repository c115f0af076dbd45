//! The per-session transaction journal.
//!
//! A logical append-only log of completed operations, implemented on top of
//! the storage backend. Each partition (one per session, plus the durable
//! no-session partition) is insertion-ordered; `seq` values are assigned by
//! the backend and strictly increase within a partition.
//!
//! The journal is both the audit trail and the undo log: rollback walks a
//! partition's tail newest-first, applies each entry's inverse, and drops
//! the consumed entries by uuid.

use factstore_core::{Fact, FactId, Operation, Result, SessionId, TxEntry, TxId};
use factstore_storage::StorageBackend;
use std::sync::Arc;

/// Append/tail/drop view over the backend's transaction log.
pub struct TransactionJournal {
    storage: Arc<dyn StorageBackend>,
}

impl TransactionJournal {
    /// Wrap a storage backend.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        TransactionJournal { storage }
    }

    /// Record a completed mutation. The backend assigns `seq`; the
    /// completed entry is returned.
    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        op: Operation,
        session_id: Option<SessionId>,
        fact_id: Option<FactId>,
        fact_before: Option<Fact>,
        fact_after: Option<Fact>,
        actor: Option<String>,
        reason: Option<String>,
    ) -> Result<TxEntry> {
        let entry = TxEntry::record(op, session_id, fact_id, fact_before, fact_after)
            .with_audit(actor, reason);
        self.storage.append_tx(entry)
    }

    /// The most recent `limit` entries of a partition, newest-first,
    /// skipping `offset`.
    pub fn tail(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TxEntry>> {
        self.storage.get_tx_log(session_id, limit, offset)
    }

    /// Remove consumed entries by uuid. Returns how many were removed.
    pub fn drop_entries(&self, uuids: &[TxId]) -> Result<usize> {
        self.storage.delete_txs(uuids)
    }
}
