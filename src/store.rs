//! Main entry point: the blocking store facade.

use crate::error::{Error, Result};
use factstore_core::{Fact, FactId, Payload, SessionId, TxEntry};
use factstore_engine::{
    Audit, CommitOptions, Constraint, FactModel, MemoryStore, StoreMetrics, Validator,
};
use factstore_hooks::MemoryHook;
use factstore_storage::{MemoryBackend, PathFilter, StorageBackend};
use std::sync::Arc;

/// The fact store.
///
/// A thin handle over the transactional engine: cloning is cheap and every
/// clone talks to the same store. Mutations are serialized per store;
/// reads never block.
///
/// # Example
///
/// ```ignore
/// use factstore::prelude::*;
///
/// let store = FactStore::builder()
///     .hook(Arc::new(KeywordIndexHook::new("text")))
///     .build();
///
/// store.register_model::<UserProfile>(Some(Constraint::singleton("email")))?;
///
/// let id = store.commit(Fact::new("note", payload))?;
/// let fact = store.get(&id)?;
/// ```
#[derive(Clone)]
pub struct FactStore {
    inner: Arc<MemoryStore>,
}

impl FactStore {
    /// Open a store over the in-memory reference backend.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    /// Open a store over an arbitrary storage backend.
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        FactStore {
            inner: Arc::new(MemoryStore::new(backend)),
        }
    }

    /// Wrap an existing engine.
    pub(crate) fn from_engine(inner: Arc<MemoryStore>) -> Self {
        FactStore { inner }
    }

    /// Create a builder for backend and hook wiring.
    pub fn builder() -> FactStoreBuilder {
        FactStoreBuilder::new()
    }

    /// The underlying engine, for advanced integrations.
    pub fn engine(&self) -> &Arc<MemoryStore> {
        &self.inner
    }

    /// Switch to the cooperative (async) variant. Both variants share the
    /// same store; mutations stay serialized across them.
    pub fn into_async(self) -> crate::AsyncFactStore {
        crate::AsyncFactStore::from_engine(self.inner)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a typed payload model with an optional constraint.
    pub fn register_model<T: FactModel>(&self, constraint: Option<Constraint>) {
        self.inner.register_model::<T>(constraint);
    }

    /// Register an opaque validator with an optional constraint.
    pub fn register_validator(
        &self,
        type_name: impl Into<String>,
        validator: Validator,
        constraint: Option<Constraint>,
    ) {
        self.inner.register_validator(type_name, validator, constraint);
    }

    /// Append a hook to the chain. Hooks run in registration order inside
    /// the commit critical section.
    pub fn add_hook(&self, hook: Arc<dyn MemoryHook>) {
        self.inner.add_hook(hook);
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Commit a durable fact with default options. Returns the resolved id
    /// (the existing fact's id when a singleton key redirects the commit).
    pub fn commit(&self, fact: Fact) -> Result<FactId> {
        self.commit_with(fact, CommitOptions::default())
    }

    /// Commit with explicit session binding, ephemerality, and audit tags.
    pub fn commit_with(&self, fact: Fact, opts: CommitOptions) -> Result<FactId> {
        self.inner.commit(fact, opts).map_err(Error::from)
    }

    /// Commit a typed model under its registered type name.
    pub fn commit_model<T: FactModel>(&self, model: &T) -> Result<FactId> {
        self.commit_model_with(model, CommitOptions::default())
    }

    /// Commit a typed model with explicit options.
    pub fn commit_model_with<T: FactModel>(
        &self,
        model: &T,
        opts: CommitOptions,
    ) -> Result<FactId> {
        self.inner.commit_model(model, opts).map_err(Error::from)
    }

    /// Shallow-merge a patch into a fact's payload.
    pub fn update(&self, fact_id: &FactId, patch: Payload) -> Result<FactId> {
        self.update_with(fact_id, patch, Audit::default())
    }

    /// Update with audit tags.
    pub fn update_with(&self, fact_id: &FactId, patch: Payload, audit: Audit) -> Result<FactId> {
        self.inner.update(fact_id, patch, audit).map_err(Error::from)
    }

    /// Delete a fact. The journal entry lands in the fact's own session
    /// partition.
    pub fn delete(&self, fact_id: &FactId) -> Result<FactId> {
        self.delete_with(None, fact_id, Audit::default())
    }

    /// Delete with an explicit journal partition and audit tags.
    pub fn delete_with(
        &self,
        session_id: Option<&SessionId>,
        fact_id: &FactId,
        audit: Audit,
    ) -> Result<FactId> {
        self.inner
            .delete(session_id, fact_id, audit)
            .map_err(Error::from)
    }

    /// Promote every fact of a session to durable. Returns the promoted
    /// ids.
    pub fn promote_session(&self, session_id: &SessionId) -> Result<Vec<FactId>> {
        self.inner
            .promote_session(session_id, None, Audit::default())
            .map_err(Error::from)
    }

    /// Promote the session facts accepted by `selector`.
    pub fn promote_session_with(
        &self,
        session_id: &SessionId,
        selector: Option<&dyn Fn(&Fact) -> bool>,
        audit: Audit,
    ) -> Result<Vec<FactId>> {
        self.inner
            .promote_session(session_id, selector, audit)
            .map_err(Error::from)
    }

    /// Bulk-discard every fact bound to a session. Returns the count.
    pub fn discard_session(&self, session_id: &SessionId) -> Result<usize> {
        self.inner.discard_session(session_id).map_err(Error::from)
    }

    /// Undo the last `steps` mutations of a session partition (`None` is
    /// the durable partition) and drop the consumed journal entries.
    pub fn rollback(&self, session_id: Option<&SessionId>, steps: usize) -> Result<()> {
        self.inner.rollback(session_id, steps).map_err(Error::from)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a fact by id.
    pub fn get(&self, fact_id: &FactId) -> Result<Option<Fact>> {
        self.inner.get(fact_id).map_err(Error::from)
    }

    /// Find facts by optional type equality, payload-path filters, and
    /// optional session binding.
    pub fn query(
        &self,
        type_filter: Option<&str>,
        filters: &[PathFilter],
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Fact>> {
        self.inner
            .query(type_filter, filters, session_id)
            .map_err(Error::from)
    }

    /// Most recent journal entries for a session partition, newest-first.
    pub fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TxEntry>> {
        self.inner
            .history(session_id, limit, offset)
            .map_err(Error::from)
    }

    /// The state a fact had as of a journal sequence number, reconstructed
    /// from the transaction log. `None` when the fact did not exist at that
    /// point.
    pub fn fact_as_of(
        &self,
        session_id: Option<&SessionId>,
        fact_id: &FactId,
        seq: u64,
    ) -> Result<Option<Fact>> {
        self.inner
            .fact_as_of(session_id, fact_id, seq)
            .map_err(Error::from)
    }

    /// Mutation counters since the store was opened.
    pub fn metrics(&self) -> StoreMetrics {
        self.inner.metrics()
    }

    /// Gracefully release backend resources. The store should not be used
    /// afterwards.
    pub fn close(&self) -> Result<()> {
        self.inner.close().map_err(Error::from)
    }
}

/// Builder wiring a backend and hooks before first use.
///
/// # Example
///
/// ```ignore
/// let store = FactStore::builder()
///     .backend(Arc::new(MemoryBackend::new()))
///     .hook(Arc::new(KeywordIndexHook::new("text")))
///     .build();
/// ```
pub struct FactStoreBuilder {
    backend: Option<Arc<dyn StorageBackend>>,
    hooks: Vec<Arc<dyn MemoryHook>>,
}

impl FactStoreBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        FactStoreBuilder {
            backend: None,
            hooks: Vec::new(),
        }
    }

    /// Use a specific storage backend. Defaults to [`MemoryBackend`].
    pub fn backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Register a hook. Hooks run in the order they were added.
    pub fn hook(mut self, hook: Arc<dyn MemoryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Build the store.
    pub fn build(self) -> FactStore {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(MemoryBackend::new()));
        let store = FactStore::with_backend(backend);
        for hook in self.hooks {
            store.add_hook(hook);
        }
        store
    }
}

impl Default for FactStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
