//! The memory store: fact lifecycle under a single commit protocol.
//!
//! Every mutation runs the same pipeline inside one critical section:
//!
//! ```text
//! validate -> resolve constraints -> persist -> notify hooks -> journal
//! ```
//!
//! The hook chain is a synchronous replication fence. Once storage has been
//! written, a failing hook forces the engine to restore the exact
//! pre-operation state before the error surfaces; no journal entry is
//! written for the aborted mutation. Hooks that succeeded before the
//! failing one are not explicitly reverted, they are expected to be
//! idempotent on the next successful operation.
//!
//! ## Locking
//!
//! One mutex per store. Mutations hold it across validation, the storage
//! write, the hook chain, and the journal append, so mutations are totally
//! ordered and hooks observe that order. `get` and `query` read consistent
//! storage snapshots without the lock.

use crate::journal::TransactionJournal;
use crate::registry::{model_payload, Constraint, FactModel, SchemaRegistry, Validator};
use factstore_core::{Error, Fact, FactId, Operation, Payload, Result, SessionId, TxEntry};
use factstore_hooks::MemoryHook;
use factstore_storage::{PathFilter, StorageBackend};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Type name of the synthetic fact handed to hooks on session discard.
///
/// The marker is never persisted; its `session_id` tells sinks which of
/// their own session-tagged records to drop.
pub const SESSION_DISCARD_MARKER: &str = "session.discard";

/// Options for [`MemoryStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct CommitOptions {
    /// Bind the fact to this session.
    pub session_id: Option<SessionId>,
    /// Record the creation as COMMIT_EPHEMERAL instead of COMMIT.
    pub ephemeral: bool,
    /// Audit tag: who.
    pub actor: Option<String>,
    /// Audit tag: why.
    pub reason: Option<String>,
}

impl CommitOptions {
    /// Options with a session binding.
    pub fn session(session_id: impl Into<SessionId>) -> Self {
        CommitOptions {
            session_id: Some(session_id.into()),
            ..Default::default()
        }
    }

    /// Options for an ephemeral, session-bound commit.
    pub fn ephemeral(session_id: impl Into<SessionId>) -> Self {
        CommitOptions {
            session_id: Some(session_id.into()),
            ephemeral: true,
            ..Default::default()
        }
    }

    /// Attach an actor tag.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Attach a reason tag.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Audit tags for update / delete / promote operations.
#[derive(Debug, Clone, Default)]
pub struct Audit {
    /// Who performed the mutation.
    pub actor: Option<String>,
    /// Why.
    pub reason: Option<String>,
}

impl Audit {
    /// Tags with both fields set.
    pub fn new(actor: impl Into<String>, reason: impl Into<String>) -> Self {
        Audit {
            actor: Some(actor.into()),
            reason: Some(reason.into()),
        }
    }
}

/// Point-in-time counters for one store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreMetrics {
    /// Facts created (COMMIT and COMMIT_EPHEMERAL).
    pub commits: u64,
    /// Payload updates, including singleton-redirected commits.
    pub updates: u64,
    /// Single-fact deletions.
    pub deletes: u64,
    /// Facts promoted to durable.
    pub promotions: u64,
    /// Bulk session discards.
    pub sessions_discarded: u64,
    /// Journal entries consumed by rollback.
    pub rollback_steps: u64,
    /// Mutations aborted by a refusing hook.
    pub hook_failures: u64,
}

#[derive(Default)]
struct MetricCounters {
    commits: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    promotions: AtomicU64,
    sessions_discarded: AtomicU64,
    rollback_steps: AtomicU64,
    hook_failures: AtomicU64,
}

impl MetricCounters {
    fn snapshot(&self) -> StoreMetrics {
        StoreMetrics {
            commits: self.commits.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            sessions_discarded: self.sessions_discarded.load(Ordering::Relaxed),
            rollback_steps: self.rollback_steps.load(Ordering::Relaxed),
            hook_failures: self.hook_failures.load(Ordering::Relaxed),
        }
    }
}

/// The transactional engine over a storage backend and a hook chain.
pub struct MemoryStore {
    storage: Arc<dyn StorageBackend>,
    registry: SchemaRegistry,
    journal: TransactionJournal,
    hooks: RwLock<Vec<Arc<dyn MemoryHook>>>,
    metrics: MetricCounters,
    /// Serializes mutations. Held across validation, the storage write,
    /// the hook chain, and the journal append.
    mutation_lock: Mutex<()>,
}

impl MemoryStore {
    /// Create a store over the given backend.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        MemoryStore {
            journal: TransactionJournal::new(storage.clone()),
            storage,
            registry: SchemaRegistry::new(),
            hooks: RwLock::new(Vec::new()),
            metrics: MetricCounters::default(),
            mutation_lock: Mutex::new(()),
        }
    }

    /// Counters since this store was opened.
    pub fn metrics(&self) -> StoreMetrics {
        self.metrics.snapshot()
    }

    /// The schema registry.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// The underlying storage backend.
    pub fn storage(&self) -> &Arc<dyn StorageBackend> {
        &self.storage
    }

    /// Register a typed model with an optional constraint.
    pub fn register_model<T: FactModel>(&self, constraint: Option<Constraint>) {
        self.registry.register_model::<T>(constraint);
    }

    /// Register an opaque validator with an optional constraint.
    pub fn register_validator(
        &self,
        type_name: impl Into<String>,
        validator: Validator,
        constraint: Option<Constraint>,
    ) {
        self.registry.register(type_name, validator, constraint);
    }

    /// Append a hook to the chain. Hooks run in registration order.
    pub fn add_hook(&self, hook: Arc<dyn MemoryHook>) {
        self.hooks.write().push(hook);
    }

    /// Release backend resources.
    pub fn close(&self) -> Result<()> {
        self.storage.close()
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Commit a fact: insert, or update when the fact resolves to an
    /// existing one (by singleton key or by id). Returns the resolved id.
    pub fn commit(&self, fact: Fact, opts: CommitOptions) -> Result<FactId> {
        let _guard = self.mutation_lock.lock();

        let mut fact = fact;
        fact.payload = self.registry.validate(&fact.type_name, fact.payload)?;
        if let Some(session) = &opts.session_id {
            fact.session_id = Some(session.clone());
        }

        let mut previous: Option<Fact> = None;
        let mut op = if opts.ephemeral {
            Operation::CommitEphemeral
        } else {
            Operation::Commit
        };

        // Constraint resolution: a singleton key can redirect this commit
        // onto an existing fact.
        if let Some(Constraint {
            singleton_key: Some(key),
            immutable,
        }) = self.registry.constraint(&fact.type_name)
        {
            if let Some(key_value) = fact.payload.get(&key).cloned() {
                let mut matches = self.storage.query(
                    Some(&fact.type_name),
                    &[PathFilter::new(key.clone(), key_value.clone())],
                )?;
                match matches.len() {
                    0 => {}
                    1 => {
                        if immutable {
                            return Err(Error::Conflict(format!(
                                "immutable singleton violation: {}:{:?}",
                                fact.type_name, key_value
                            )));
                        }
                        let existing = matches.remove(0);
                        fact.id = existing.id.clone();
                        previous = Some(existing);
                        op = Operation::Update;
                    }
                    n => {
                        // One live fact per (type, key value) is a hard
                        // invariant; more than one means corrupted state.
                        return Err(Error::Internal(format!(
                            "singleton invariant violated: {} live facts of type '{}' share {}={:?}",
                            n, fact.type_name, key, key_value
                        )));
                    }
                }
            }
        }

        // No singleton redirect: an id collision still means update.
        if op != Operation::Update {
            if let Some(existing) = self.storage.load(&fact.id)? {
                previous = Some(existing);
                op = Operation::Update;
            }
        }

        self.storage.save(fact.clone())?;
        self.complete_mutation(op, fact.session_id.clone(), fact, previous, opts.actor, opts.reason)
    }

    /// Commit a typed model. The payload is derived from the model and the
    /// type name from its [`FactModel`] binding.
    pub fn commit_model<T: FactModel>(&self, model: &T, opts: CommitOptions) -> Result<FactId> {
        let fact = Fact::new(T::TYPE_NAME, model_payload(model)?);
        self.commit(fact, opts)
    }

    /// Shallow-merge a patch into a fact's payload: patch keys replace
    /// existing top-level keys, unreferenced keys are preserved. The merged
    /// payload is re-validated and the timestamp refreshed.
    pub fn update(&self, fact_id: &FactId, patch: Payload, audit: Audit) -> Result<FactId> {
        let _guard = self.mutation_lock.lock();

        let existing = self
            .storage
            .load(fact_id)?
            .ok_or_else(|| Error::NotFound(fact_id.clone()))?;
        let before = existing.clone();

        let mut updated = existing;
        for (key, value) in patch {
            updated.payload.insert(key, value);
        }
        updated.payload = self
            .registry
            .validate(&updated.type_name, updated.payload)?;
        updated.touch();

        self.storage.save(updated.clone())?;
        self.complete_mutation(
            Operation::Update,
            updated.session_id.clone(),
            updated,
            Some(before),
            audit.actor,
            audit.reason,
        )
    }

    /// Remove a fact. Hooks receive the pre-deletion fact; the journal
    /// entry carries it as `fact_before`.
    ///
    /// `session_id` selects the journal partition for the entry; when
    /// `None`, the fact's own session binding decides.
    pub fn delete(
        &self,
        session_id: Option<&SessionId>,
        fact_id: &FactId,
        audit: Audit,
    ) -> Result<FactId> {
        let _guard = self.mutation_lock.lock();

        let existing = self
            .storage
            .load(fact_id)?
            .ok_or_else(|| Error::NotFound(fact_id.clone()))?;

        self.storage.delete(fact_id)?;

        if let Err(hook_err) = self.notify_hooks(Operation::Delete, fact_id, Some(&existing)) {
            return Err(self.compensate(hook_err, Some(&existing), fact_id));
        }

        let partition = session_id
            .cloned()
            .or_else(|| existing.session_id.clone());
        if let Err(journal_err) = self.journal.append(
            Operation::Delete,
            partition,
            Some(fact_id.clone()),
            Some(existing.clone()),
            None,
            audit.actor,
            audit.reason,
        ) {
            return Err(self.compensate(journal_err, Some(&existing), fact_id));
        }
        self.metrics.deletes.fetch_add(1, Ordering::Relaxed);
        Ok(fact_id.clone())
    }

    /// Make every selected fact of a session durable by clearing its
    /// session binding. Returns the promoted ids in enumeration order.
    ///
    /// Each promotion is its own journaled mutation: a hook failure stops
    /// the sweep and restores the fact in flight, but facts promoted
    /// earlier stay promoted.
    pub fn promote_session(
        &self,
        session_id: &SessionId,
        selector: Option<&dyn Fn(&Fact) -> bool>,
        audit: Audit,
    ) -> Result<Vec<FactId>> {
        let _guard = self.mutation_lock.lock();

        let candidates = self.storage.get_session_facts(session_id)?;
        let mut promoted = Vec::new();

        for fact in candidates {
            if let Some(selector) = selector {
                if !selector(&fact) {
                    continue;
                }
            }

            let before = fact.clone();
            let mut durable = fact;
            durable.session_id = None;

            self.storage.save(durable.clone())?;
            if let Err(hook_err) =
                self.notify_hooks(Operation::Promote, &durable.id, Some(&durable))
            {
                return Err(self.compensate(hook_err, Some(&before), &durable.id));
            }
            if let Err(journal_err) = self.journal.append(
                Operation::Promote,
                Some(session_id.clone()),
                Some(durable.id.clone()),
                Some(before.clone()),
                Some(durable.clone()),
                audit.actor.clone(),
                audit.reason.clone(),
            ) {
                return Err(self.compensate(journal_err, Some(&before), &durable.id));
            }
            self.metrics.promotions.fetch_add(1, Ordering::Relaxed);
            promoted.push(durable.id);
        }

        Ok(promoted)
    }

    /// Bulk-delete every fact bound to a session. Returns the count.
    ///
    /// Hooks are notified once with a synthetic marker fact carrying the
    /// session id. Hook failures here are non-transactional: the deletion
    /// stands, and the journal entry records the failure so an operator
    /// can reconcile the affected sinks. A journal-append failure is
    /// different: the discard is then undone by restoring the deleted
    /// facts, so storage never outruns the journal.
    pub fn discard_session(&self, session_id: &SessionId) -> Result<usize> {
        let _guard = self.mutation_lock.lock();

        // Snapshot before the bulk delete; the lock is held, so these are
        // exactly the facts the delete removes. Needed to restore storage
        // if the journal append fails afterwards.
        let snapshot = self.storage.get_session_facts(session_id)?;
        let deleted = self.storage.delete_session(session_id)?;
        if deleted.is_empty() {
            return Ok(0);
        }

        let marker =
            Fact::new(SESSION_DISCARD_MARKER, Payload::new()).with_session(session_id.clone());
        let mut reason = format!(
            "session {} cleared ({} facts)",
            session_id,
            deleted.len()
        );
        if let Err(hook_err) =
            self.notify_hooks(Operation::DiscardSession, &marker.id, Some(&marker))
        {
            tracing::warn!(
                session = %session_id,
                error = %hook_err,
                "session discard hook failed; sinks need reconciliation"
            );
            reason = format!("{reason}; hook failure pending retry: {hook_err}");
        }

        if let Err(journal_err) = self.journal.append(
            Operation::DiscardSession,
            Some(session_id.clone()),
            None,
            None,
            None,
            None,
            Some(reason),
        ) {
            // Storage already diverged from the journal: put the session
            // facts back before surfacing the failure.
            for fact in snapshot {
                if let Err(restore_err) = self.storage.save(fact) {
                    tracing::error!(
                        session = %session_id,
                        failure = %journal_err,
                        error = %restore_err,
                        "failed to restore discarded session facts"
                    );
                    return Err(Error::storage_inconsistent(format!(
                        "{journal_err}; restoration also failed: {restore_err}"
                    )));
                }
            }
            return Err(journal_err);
        }
        self.metrics.sessions_discarded.fetch_add(1, Ordering::Relaxed);
        Ok(deleted.len())
    }

    /// Undo the last `steps` completed mutations of a session by replaying
    /// journal entries in reverse and discarding the consumed history.
    ///
    /// Inverses notify hooks: a restored prior state as UPDATE, an undone
    /// creation as DELETE (with no fact), an undone deletion as COMMIT.
    /// DISCARD_SESSION entries are not invertible; they are consumed
    /// without effect. Rollback writes no new journal entries.
    ///
    /// `steps == 0` is a no-op; a `steps` larger than the partition
    /// consumes everything available and stops.
    pub fn rollback(&self, session_id: Option<&SessionId>, steps: usize) -> Result<()> {
        if steps == 0 {
            return Ok(());
        }
        let _guard = self.mutation_lock.lock();

        let entries = self.journal.tail(session_id, steps, 0)?;
        for entry in entries {
            self.apply_inverse(&entry)?;
            self.journal.drop_entries(&[entry.uuid])?;
            self.metrics.rollback_steps.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn apply_inverse(&self, entry: &TxEntry) -> Result<()> {
        match entry.op {
            Operation::Commit
            | Operation::CommitEphemeral
            | Operation::Update
            | Operation::Promote => {
                if let Some(before) = &entry.fact_before {
                    self.storage.save(before.clone())?;
                    self.notify_hooks(Operation::Update, &before.id, Some(before))?;
                } else if let Some(fact_id) = &entry.fact_id {
                    self.storage.delete(fact_id)?;
                    self.notify_hooks(Operation::Delete, fact_id, None)?;
                }
            }
            Operation::Delete => {
                if let Some(before) = &entry.fact_before {
                    self.storage.save(before.clone())?;
                    self.notify_hooks(Operation::Commit, &before.id, Some(before))?;
                }
            }
            // Bulk discard is non-reversible.
            Operation::DiscardSession => {}
        }
        Ok(())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Pure lookup by id. Does not take the mutation lock.
    pub fn get(&self, fact_id: &FactId) -> Result<Option<Fact>> {
        self.storage.load(fact_id)
    }

    /// Find facts by optional type equality plus a conjunction of
    /// payload-path equality filters. A session id, when supplied, is an
    /// additional top-level constraint.
    pub fn query(
        &self,
        type_filter: Option<&str>,
        filters: &[PathFilter],
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Fact>> {
        let mut facts = self.storage.query(type_filter, filters)?;
        if let Some(session) = session_id {
            facts.retain(|fact| fact.session_id.as_ref() == Some(session));
        }
        Ok(facts)
    }

    /// The most recent journal entries of a session partition,
    /// newest-first.
    pub fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TxEntry>> {
        self.journal.tail(session_id, limit, offset)
    }

    /// The state a fact had as of a journal sequence number: the posterior
    /// snapshot of the newest entry in the partition with `seq <= seq` that
    /// touched the fact. `None` when the fact did not exist at that point
    /// (never created yet, or the governing entry is its deletion).
    ///
    /// Entries consumed by rollback no longer contribute; time travel sees
    /// the same history rollback left behind.
    pub fn fact_as_of(
        &self,
        session_id: Option<&SessionId>,
        fact_id: &FactId,
        seq: u64,
    ) -> Result<Option<Fact>> {
        let entries = self.journal.tail(session_id, usize::MAX, 0)?;
        for entry in entries {
            if entry.seq <= seq && entry.fact_id.as_ref() == Some(fact_id) {
                return Ok(entry.fact_after);
            }
        }
        Ok(None)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Hook notification and journal append for an upsert-shaped mutation,
    /// with compensation when either step fails after the storage write.
    fn complete_mutation(
        &self,
        op: Operation,
        partition: Option<SessionId>,
        fact: Fact,
        previous: Option<Fact>,
        actor: Option<String>,
        reason: Option<String>,
    ) -> Result<FactId> {
        if let Err(hook_err) = self.notify_hooks(op, &fact.id, Some(&fact)) {
            return Err(self.compensate(hook_err, previous.as_ref(), &fact.id));
        }

        if let Err(journal_err) = self.journal.append(
            op,
            partition,
            Some(fact.id.clone()),
            previous.clone(),
            Some(fact.clone()),
            actor,
            reason,
        ) {
            return Err(self.compensate(journal_err, previous.as_ref(), &fact.id));
        }

        match op {
            Operation::Update => self.metrics.updates.fetch_add(1, Ordering::Relaxed),
            _ => self.metrics.commits.fetch_add(1, Ordering::Relaxed),
        };

        tracing::debug!(op = %op, fact_id = %fact.id, "mutation committed");
        Ok(fact.id)
    }

    /// Restore the pre-operation state after a failure between the storage
    /// write and a completed journal append. Returns the error to surface:
    /// the original failure when restoration worked, an inconsistent
    /// storage error when it did not.
    fn compensate(&self, failure: Error, previous: Option<&Fact>, fact_id: &FactId) -> Error {
        let restored = match previous {
            Some(prev) => self.storage.save(prev.clone()),
            None => self.storage.delete(fact_id),
        };
        match restored {
            Ok(()) => failure,
            Err(restore_err) => {
                tracing::error!(
                    fact_id = %fact_id,
                    failure = %failure,
                    error = %restore_err,
                    "failed to restore pre-operation state"
                );
                Error::storage_inconsistent(format!(
                    "{failure}; restoration also failed: {restore_err}"
                ))
            }
        }
    }

    /// Run the hook chain in registration order, wrapping the first
    /// failure.
    fn notify_hooks(&self, op: Operation, fact_id: &FactId, fact: Option<&Fact>) -> Result<()> {
        let hooks = self.hooks.read();
        for hook in hooks.iter() {
            if let Err(source) = hook.on_event(op, fact_id, fact) {
                self.metrics.hook_failures.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Hook {
                    hook: hook.name().to_string(),
                    source,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factstore_core::{TxId, Value};
    use factstore_hooks::RecordingHook;
    use factstore_storage::MemoryBackend;
    use std::sync::atomic::AtomicBool;

    fn store_with_backend() -> (MemoryStore, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        (MemoryStore::new(backend.clone()), backend)
    }

    /// Delegating backend whose journal appends can be made to fail,
    /// for exercising the compensation paths.
    struct FlakyJournalBackend {
        inner: MemoryBackend,
        fail_appends: AtomicBool,
    }

    impl FlakyJournalBackend {
        fn new() -> Self {
            FlakyJournalBackend {
                inner: MemoryBackend::new(),
                fail_appends: AtomicBool::new(false),
            }
        }

        fn break_journal(&self) {
            self.fail_appends.store(true, Ordering::SeqCst);
        }
    }

    impl StorageBackend for FlakyJournalBackend {
        fn load(&self, id: &FactId) -> Result<Option<Fact>> {
            self.inner.load(id)
        }

        fn save(&self, fact: Fact) -> Result<()> {
            self.inner.save(fact)
        }

        fn delete(&self, id: &FactId) -> Result<()> {
            self.inner.delete(id)
        }

        fn query(&self, type_filter: Option<&str>, filters: &[PathFilter]) -> Result<Vec<Fact>> {
            self.inner.query(type_filter, filters)
        }

        fn append_tx(&self, entry: TxEntry) -> Result<TxEntry> {
            if self.fail_appends.load(Ordering::SeqCst) {
                return Err(Error::storage("journal append failed"));
            }
            self.inner.append_tx(entry)
        }

        fn get_tx_log(
            &self,
            session_id: Option<&SessionId>,
            limit: usize,
            offset: usize,
        ) -> Result<Vec<TxEntry>> {
            self.inner.get_tx_log(session_id, limit, offset)
        }

        fn delete_session(&self, session_id: &SessionId) -> Result<Vec<FactId>> {
            self.inner.delete_session(session_id)
        }

        fn get_session_facts(&self, session_id: &SessionId) -> Result<Vec<Fact>> {
            self.inner.get_session_facts(session_id)
        }

        fn delete_txs(&self, uuids: &[TxId]) -> Result<usize> {
            self.inner.delete_txs(uuids)
        }

        fn close(&self) -> Result<()> {
            self.inner.close()
        }
    }

    fn store_with_flaky_journal() -> (MemoryStore, Arc<FlakyJournalBackend>) {
        let backend = Arc::new(FlakyJournalBackend::new());
        (MemoryStore::new(backend.clone()), backend)
    }

    fn payload(entries: Vec<(&str, Value)>) -> Payload {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_commit_and_get() {
        let (store, _) = store_with_backend();
        let fact = Fact::new("note", payload(vec![("text", Value::from("hi"))]));
        let id = store.commit(fact, CommitOptions::default()).unwrap();

        let loaded = store.get(&id).unwrap().unwrap();
        assert_eq!(loaded.payload_value("text"), Some(&Value::from("hi")));
        assert!(loaded.session_id.is_none());
    }

    #[test]
    fn test_commit_binds_session() {
        let (store, _) = store_with_backend();
        let id = store
            .commit(
                Fact::new("note", Payload::new()),
                CommitOptions::ephemeral("s1"),
            )
            .unwrap();
        let loaded = store.get(&id).unwrap().unwrap();
        assert_eq!(loaded.session_id, Some(SessionId::new("s1")));

        let entries = store.history(Some(&SessionId::new("s1")), 10, 0).unwrap();
        assert_eq!(entries[0].op, Operation::CommitEphemeral);
    }

    #[test]
    fn test_commit_existing_id_is_update() {
        let (store, _) = store_with_backend();
        let first = Fact::new("note", payload(vec![("v", Value::Int(1))])).with_id("n1");
        store.commit(first, CommitOptions::default()).unwrap();

        let second = Fact::new("note", payload(vec![("v", Value::Int(2))])).with_id("n1");
        store.commit(second, CommitOptions::default()).unwrap();

        let tail = store.history(None, 10, 0).unwrap();
        assert_eq!(tail[0].op, Operation::Update);
        assert_eq!(
            tail[0]
                .fact_before
                .as_ref()
                .unwrap()
                .payload_value("v"),
            Some(&Value::Int(1))
        );
    }

    #[test]
    fn test_validation_failure_leaves_no_state() {
        let (store, backend) = store_with_backend();
        store.register_validator(
            "strict",
            Arc::new(|_| Err("payload rejected".to_string())),
            None,
        );
        let err = store
            .commit(Fact::new("strict", Payload::new()), CommitOptions::default())
            .unwrap_err();
        assert!(err.is_validation_failed());
        assert_eq!(backend.fact_count(), 0);
        assert_eq!(backend.journal_len(), 0);
    }

    #[test]
    fn test_singleton_multi_match_is_internal_error() {
        let (store, backend) = store_with_backend();
        store.register_validator(
            "cfg",
            Arc::new(|p| Ok(p)),
            Some(Constraint::singleton("key")),
        );

        // Corrupt the invariant behind the engine's back.
        use factstore_storage::StorageBackend as _;
        backend
            .save(Fact::new("cfg", payload(vec![("key", Value::from("k"))])).with_id("c1"))
            .unwrap();
        backend
            .save(Fact::new("cfg", payload(vec![("key", Value::from("k"))])).with_id("c2"))
            .unwrap();

        let err = store
            .commit(
                Fact::new("cfg", payload(vec![("key", Value::from("k"))])),
                CommitOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)), "got {err:?}");
    }

    #[test]
    fn test_hook_failure_on_first_commit_leaves_no_trace() {
        let (store, backend) = store_with_backend();
        store.add_hook(Arc::new(RecordingHook::failing_on(
            "refuser",
            Operation::Commit,
        )));

        let err = store
            .commit(Fact::new("note", Payload::new()), CommitOptions::default())
            .unwrap_err();
        assert!(err.is_hook());
        assert_eq!(backend.fact_count(), 0, "primary write reverted");
        assert_eq!(backend.journal_len(), 0, "no journal entry written");
    }

    #[test]
    fn test_hooks_run_in_registration_order() {
        let (store, _) = store_with_backend();
        let first = Arc::new(RecordingHook::new("first"));
        let second = Arc::new(RecordingHook::new("second"));
        store.add_hook(first.clone());
        store.add_hook(second.clone());

        let id = store
            .commit(Fact::new("note", Payload::new()), CommitOptions::default())
            .unwrap();
        assert_eq!(first.events(), vec![(Operation::Commit, id.clone())]);
        assert_eq!(second.events(), vec![(Operation::Commit, id)]);
    }

    #[test]
    fn test_update_missing_fact_is_not_found() {
        let (store, _) = store_with_backend();
        let err = store
            .update(&FactId::new("ghost"), Payload::new(), Audit::default())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_update_shallow_merge_preserves_unreferenced_keys() {
        let (store, _) = store_with_backend();
        let id = store
            .commit(
                Fact::new(
                    "note",
                    payload(vec![("keep", Value::Int(1)), ("change", Value::Int(2))]),
                ),
                CommitOptions::default(),
            )
            .unwrap();

        store
            .update(
                &id,
                payload(vec![("change", Value::Int(20))]),
                Audit::default(),
            )
            .unwrap();

        let loaded = store.get(&id).unwrap().unwrap();
        assert_eq!(loaded.payload_value("keep"), Some(&Value::Int(1)));
        assert_eq!(loaded.payload_value("change"), Some(&Value::Int(20)));
    }

    #[test]
    fn test_delete_twice_is_not_found() {
        let (store, _) = store_with_backend();
        let id = store
            .commit(Fact::new("note", Payload::new()), CommitOptions::default())
            .unwrap();
        store.delete(None, &id, Audit::default()).unwrap();
        let err = store.delete(None, &id, Audit::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_query_session_filter() {
        let (store, _) = store_with_backend();
        store
            .commit(
                Fact::new("note", Payload::new()),
                CommitOptions::session("s1"),
            )
            .unwrap();
        store
            .commit(Fact::new("note", Payload::new()), CommitOptions::default())
            .unwrap();

        let scoped = store
            .query(Some("note"), &[], Some(&SessionId::new("s1")))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        let all = store.query(Some("note"), &[], None).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_discard_session_skips_journal_when_empty() {
        let (store, backend) = store_with_backend();
        let count = store.discard_session(&SessionId::new("empty")).unwrap();
        assert_eq!(count, 0);
        assert_eq!(backend.journal_len(), 0);
    }

    #[test]
    fn test_discard_session_survives_hook_failure() {
        let (store, _) = store_with_backend();
        store.add_hook(Arc::new(RecordingHook::failing_on(
            "refuser",
            Operation::DiscardSession,
        )));
        let session = SessionId::new("s1");
        store
            .commit(
                Fact::new("note", Payload::new()),
                CommitOptions::ephemeral(session.clone()),
            )
            .unwrap();

        // Non-transactional: the deletion stands and the call succeeds.
        let count = store.discard_session(&session).unwrap();
        assert_eq!(count, 1);

        let tail = store.history(Some(&session), 10, 0).unwrap();
        assert_eq!(tail[0].op, Operation::DiscardSession);
        assert!(tail[0]
            .reason
            .as_ref()
            .unwrap()
            .contains("hook failure pending retry"));
    }

    #[test]
    fn test_commit_journal_failure_leaves_no_trace() {
        let (store, backend) = store_with_flaky_journal();
        backend.break_journal();

        let err = store
            .commit(
                Fact::new("note", Payload::new()).with_id("n1"),
                CommitOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Storage { consistent: true, .. }), "got {err:?}");
        assert!(store.get(&FactId::new("n1")).unwrap().is_none());
    }

    #[test]
    fn test_delete_journal_failure_restores_fact() {
        let (store, backend) = store_with_flaky_journal();
        let id = store
            .commit(
                Fact::new("note", payload(vec![("v", Value::Int(1))])),
                CommitOptions::default(),
            )
            .unwrap();

        backend.break_journal();
        let err = store.delete(None, &id, Audit::default()).unwrap_err();
        assert!(matches!(err, Error::Storage { consistent: true, .. }), "got {err:?}");

        let restored = store.get(&id).unwrap().unwrap();
        assert_eq!(restored.payload_value("v"), Some(&Value::Int(1)));
        let ops: Vec<Operation> = store.history(None, 10, 0).unwrap().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![Operation::Commit], "no DELETE journaled");
    }

    #[test]
    fn test_promote_journal_failure_restores_session_binding() {
        let (store, backend) = store_with_flaky_journal();
        let session = SessionId::new("s");
        let id = store
            .commit(
                Fact::new("note", Payload::new()),
                CommitOptions::ephemeral(session.clone()),
            )
            .unwrap();

        backend.break_journal();
        let err = store
            .promote_session(&session, None, Audit::default())
            .unwrap_err();
        assert!(matches!(err, Error::Storage { consistent: true, .. }), "got {err:?}");

        assert_eq!(
            store.get(&id).unwrap().unwrap().session_id,
            Some(session.clone()),
            "still session-bound"
        );
        let ops: Vec<Operation> = store
            .history(Some(&session), 10, 0)
            .unwrap()
            .iter()
            .map(|e| e.op)
            .collect();
        assert_eq!(ops, vec![Operation::CommitEphemeral], "no PROMOTE journaled");
    }

    #[test]
    fn test_discard_journal_failure_restores_session_facts() {
        let (store, backend) = store_with_flaky_journal();
        let session = SessionId::new("s");
        let id = store
            .commit(
                Fact::new("note", payload(vec![("text", Value::from("t"))])),
                CommitOptions::ephemeral(session.clone()),
            )
            .unwrap();

        backend.break_journal();
        let err = store.discard_session(&session).unwrap_err();
        assert!(matches!(err, Error::Storage { consistent: true, .. }), "got {err:?}");

        let facts = store.query(None, &[], Some(&session)).unwrap();
        assert_eq!(facts.len(), 1, "deleted facts were restored");
        assert_eq!(facts[0].id, id);

        let ops: Vec<Operation> = store
            .history(Some(&session), 10, 0)
            .unwrap()
            .iter()
            .map(|e| e.op)
            .collect();
        assert_eq!(ops, vec![Operation::CommitEphemeral], "no DISCARD_SESSION journaled");
        assert_eq!(store.metrics().sessions_discarded, 0);
    }

    #[test]
    fn test_rollback_zero_steps_is_noop() {
        let (store, backend) = store_with_backend();
        store
            .commit(Fact::new("note", Payload::new()), CommitOptions::default())
            .unwrap();
        store.rollback(None, 0).unwrap();
        assert_eq!(backend.journal_len(), 1);
    }
}
