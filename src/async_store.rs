//! Cooperative variant of the store for async callers.
//!
//! The engine's semantics live in the blocking [`MemoryStore`]; this
//! adapter moves each operation onto the tokio blocking pool so async
//! tasks suspend instead of blocking the runtime. Functional behavior is
//! identical to the blocking variant: mutations are serialized by the same
//! per-store lock and are not cancellable mid-critical-section. Dropping a
//! future while its mutation runs does not abort the mutation; it
//! completes (or fails) on the blocking pool.

use crate::error::{Error, Result};
use factstore_core::{Fact, FactId, Payload, SessionId, TxEntry};
use factstore_engine::{
    Audit, CommitOptions, Constraint, FactModel, MemoryStore, StoreMetrics, Validator,
};
use factstore_hooks::MemoryHook;
use factstore_storage::PathFilter;
use std::sync::Arc;

/// Async handle over a fact store.
///
/// Obtained from [`FactStore::into_async`](crate::FactStore::into_async)
/// or built directly over an engine. Cloning is cheap; all clones share
/// the store.
///
/// # Example
///
/// ```ignore
/// use factstore::prelude::*;
///
/// let store = FactStore::in_memory().into_async();
/// let id = store.commit(Fact::new("note", payload)).await?;
/// let fact = store.get(&id).await?;
/// ```
#[derive(Clone)]
pub struct AsyncFactStore {
    inner: Arc<MemoryStore>,
}

impl AsyncFactStore {
    /// Wrap an engine.
    pub(crate) fn from_engine(inner: Arc<MemoryStore>) -> Self {
        AsyncFactStore { inner }
    }

    /// Switch back to the blocking variant over the same store.
    pub fn into_blocking(self) -> crate::FactStore {
        crate::FactStore::from_engine(self.inner)
    }

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

    /// Append a hook to the chain.
    pub fn add_hook(&self, hook: Arc<dyn MemoryHook>) {
        self.inner.add_hook(hook);
    }

    /// Mutation counters since the store was opened.
    pub fn metrics(&self) -> StoreMetrics {
        self.inner.metrics()
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Arc<MemoryStore>) -> factstore_core::Result<T> + Send + 'static,
    {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || op(inner))
            .await
            .map_err(|join_err| Error::Internal(format!("store task failed: {join_err}")))?
            .map_err(Error::from)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Commit a durable fact with default options.
    pub async fn commit(&self, fact: Fact) -> Result<FactId> {
        self.commit_with(fact, CommitOptions::default()).await
    }

    /// Commit with explicit options.
    pub async fn commit_with(&self, fact: Fact, opts: CommitOptions) -> Result<FactId> {
        self.run(move |store| store.commit(fact, opts)).await
    }

    /// Commit a typed model under its registered type name.
    pub async fn commit_model<T>(&self, model: &T, opts: CommitOptions) -> Result<FactId>
    where
        T: FactModel,
    {
        // Serialize on the caller's task; only the store work moves to the
        // blocking pool.
        let fact = Fact::new(T::TYPE_NAME, factstore_engine::model_payload(model)?);
        self.commit_with(fact, opts).await
    }

    /// Shallow-merge a patch into a fact's payload.
    pub async fn update(&self, fact_id: &FactId, patch: Payload) -> Result<FactId> {
        self.update_with(fact_id, patch, Audit::default()).await
    }

    /// Update with audit tags.
    pub async fn update_with(
        &self,
        fact_id: &FactId,
        patch: Payload,
        audit: Audit,
    ) -> Result<FactId> {
        let fact_id = fact_id.clone();
        self.run(move |store| store.update(&fact_id, patch, audit))
            .await
    }

    /// Delete a fact.
    pub async fn delete(&self, fact_id: &FactId) -> Result<FactId> {
        self.delete_with(None, fact_id, Audit::default()).await
    }

    /// Delete with an explicit journal partition and audit tags.
    pub async fn delete_with(
        &self,
        session_id: Option<&SessionId>,
        fact_id: &FactId,
        audit: Audit,
    ) -> Result<FactId> {
        let session_id = session_id.cloned();
        let fact_id = fact_id.clone();
        self.run(move |store| store.delete(session_id.as_ref(), &fact_id, audit))
            .await
    }

    /// Promote every fact of a session to durable.
    pub async fn promote_session(&self, session_id: &SessionId) -> Result<Vec<FactId>> {
        let session_id = session_id.clone();
        self.run(move |store| store.promote_session(&session_id, None, Audit::default()))
            .await
    }

    /// Promote the session facts accepted by `selector`.
    pub async fn promote_session_with<F>(
        &self,
        session_id: &SessionId,
        selector: F,
        audit: Audit,
    ) -> Result<Vec<FactId>>
    where
        F: Fn(&Fact) -> bool + Send + 'static,
    {
        let session_id = session_id.clone();
        self.run(move |store| store.promote_session(&session_id, Some(&selector), audit))
            .await
    }

    /// Bulk-discard every fact bound to a session.
    pub async fn discard_session(&self, session_id: &SessionId) -> Result<usize> {
        let session_id = session_id.clone();
        self.run(move |store| store.discard_session(&session_id))
            .await
    }

    /// Undo the last `steps` mutations of a session partition.
    pub async fn rollback(&self, session_id: Option<&SessionId>, steps: usize) -> Result<()> {
        let session_id = session_id.cloned();
        self.run(move |store| store.rollback(session_id.as_ref(), steps))
            .await
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Look up a fact by id.
    pub async fn get(&self, fact_id: &FactId) -> Result<Option<Fact>> {
        let fact_id = fact_id.clone();
        self.run(move |store| store.get(&fact_id)).await
    }

    /// Find facts by optional type equality, payload-path filters, and
    /// optional session binding.
    pub async fn query(
        &self,
        type_filter: Option<&str>,
        filters: &[PathFilter],
        session_id: Option<&SessionId>,
    ) -> Result<Vec<Fact>> {
        let type_filter = type_filter.map(str::to_string);
        let filters = filters.to_vec();
        let session_id = session_id.cloned();
        self.run(move |store| store.query(type_filter.as_deref(), &filters, session_id.as_ref()))
            .await
    }

    /// Most recent journal entries for a session partition, newest-first.
    pub async fn history(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TxEntry>> {
        let session_id = session_id.cloned();
        self.run(move |store| store.history(session_id.as_ref(), limit, offset))
            .await
    }

    /// The state a fact had as of a journal sequence number.
    pub async fn fact_as_of(
        &self,
        session_id: Option<&SessionId>,
        fact_id: &FactId,
        seq: u64,
    ) -> Result<Option<Fact>> {
        let session_id = session_id.cloned();
        let fact_id = fact_id.clone();
        self.run(move |store| store.fact_as_of(session_id.as_ref(), &fact_id, seq))
            .await
    }

    /// Gracefully release backend resources.
    pub async fn close(&self) -> Result<()> {
        self.run(move |store| store.close()).await
    }
}
