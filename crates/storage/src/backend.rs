//! The storage backend trait consumed by the engine.

use factstore_core::{Fact, FactId, Result, SessionId, TxEntry, TxId, Value};

/// One payload-path equality constraint.
///
/// Paths are dot-separated and evaluated against the fact payload
/// (`"user.email"` addresses `payload.user.email`). Value comparison is
/// JSON-equivalent: integers match their floating-point representation
/// exactly, nothing else coerces.
#[derive(Debug, Clone, PartialEq)]
pub struct PathFilter {
    /// Dotted path into the payload.
    pub path: String,
    /// The value the path must equal.
    pub value: Value,
}

impl PathFilter {
    /// Build a filter for `path == value`.
    pub fn new(path: impl Into<String>, value: impl Into<Value>) -> Self {
        PathFilter {
            path: path.into(),
            value: value.into(),
        }
    }

    /// Evaluate this filter against a fact.
    pub fn matches(&self, fact: &Fact) -> bool {
        fact.payload_value(&self.path) == Some(&self.value)
    }
}

/// Opaque key-addressable document store with a per-session journal.
///
/// All methods take `&self`; implementations provide their own interior
/// synchronization. The engine shares a backend by `Arc` and never assumes
/// exclusive access for reads.
pub trait StorageBackend: Send + Sync {
    /// Load a single fact by id.
    fn load(&self, id: &FactId) -> Result<Option<Fact>>;

    /// Upsert a fact by its id field.
    fn save(&self, fact: Fact) -> Result<()>;

    /// Delete a fact. Deleting a missing id is a no-op at this layer; the
    /// engine performs existence checks where the contract requires them.
    fn delete(&self, id: &FactId) -> Result<()>;

    /// Find facts matching an optional type equality and a conjunction of
    /// payload-path equality constraints.
    fn query(&self, type_filter: Option<&str>, filters: &[PathFilter]) -> Result<Vec<Fact>>;

    /// Append a journal entry, assigning its `seq`. Returns the completed
    /// entry as stored.
    fn append_tx(&self, entry: TxEntry) -> Result<TxEntry>;

    /// Most recent journal entries for a session partition, newest-first,
    /// skipping `offset`. `None` addresses the durable (no-session)
    /// partition.
    fn get_tx_log(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TxEntry>>;

    /// Bulk-delete every fact bound to a session. Returns the deleted ids.
    fn delete_session(&self, session_id: &SessionId) -> Result<Vec<FactId>>;

    /// All facts currently bound to a session.
    fn get_session_facts(&self, session_id: &SessionId) -> Result<Vec<Fact>>;

    /// Remove specific journal entries by uuid. Returns how many were
    /// removed. Used by rollback to truncate consumed history.
    fn delete_txs(&self, uuids: &[TxId]) -> Result<usize>;

    /// Release backend resources. Operations after close fail with a
    /// storage error.
    fn close(&self) -> Result<()>;
}
