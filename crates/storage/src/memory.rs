//! In-memory reference backend.
//!
//! ## Design
//!
//! - Facts in a `DashMap` with FxHash: lock-free reads, sharded writes.
//! - Journal partitioned per session key under a single `RwLock`; journal
//!   traffic is append-mostly and always flows through the engine's
//!   mutation lock, so partition-level sharding buys nothing here.
//! - `seq` from an `AtomicU64` owned by the backend, not the engine. The
//!   counter survives as long as the backend does; durable backends derive
//!   it from a monotonic row id instead.
//!
//! Data is lost when the backend is dropped. This is the unit-test and
//! working-memory backend, not a durability story.

use crate::backend::{PathFilter, StorageBackend};
use dashmap::DashMap;
use factstore_core::{Error, Fact, FactId, Result, SessionId, TxEntry, TxId};
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

type FxBuildHasher = BuildHasherDefault<FxHasher>;

/// Journal partition key. `None` is the durable (no-session) partition.
type PartitionKey = Option<SessionId>;

/// In-memory storage backend.
pub struct MemoryBackend {
    /// Live facts by id.
    facts: DashMap<FactId, Fact, FxBuildHasher>,
    /// Journal partitions, insertion-ordered within each partition.
    journal: RwLock<FxHashMap<PartitionKey, Vec<TxEntry>>>,
    /// Monotone sequence source for journal entries.
    seq: AtomicU64,
    /// Set by `close()`; all subsequent operations fail.
    closed: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        MemoryBackend {
            facts: DashMap::with_hasher(FxBuildHasher::default()),
            journal: RwLock::new(FxHashMap::default()),
            seq: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live facts.
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Total journal entries across all partitions.
    pub fn journal_len(&self) -> usize {
        self.journal.read().values().map(Vec::len).sum()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::storage("backend is closed"));
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, id: &FactId) -> Result<Option<Fact>> {
        self.ensure_open()?;
        Ok(self.facts.get(id).map(|entry| entry.value().clone()))
    }

    fn save(&self, fact: Fact) -> Result<()> {
        self.ensure_open()?;
        self.facts.insert(fact.id.clone(), fact);
        Ok(())
    }

    fn delete(&self, id: &FactId) -> Result<()> {
        self.ensure_open()?;
        self.facts.remove(id);
        Ok(())
    }

    fn query(&self, type_filter: Option<&str>, filters: &[PathFilter]) -> Result<Vec<Fact>> {
        self.ensure_open()?;
        let mut results = Vec::new();
        for entry in self.facts.iter() {
            let fact = entry.value();
            if let Some(type_name) = type_filter {
                if fact.type_name != type_name {
                    continue;
                }
            }
            if filters.iter().all(|f| f.matches(fact)) {
                results.push(fact.clone());
            }
        }
        Ok(results)
    }

    fn append_tx(&self, mut entry: TxEntry) -> Result<TxEntry> {
        self.ensure_open()?;
        entry.seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(seq = entry.seq, op = %entry.op, "journal append");
        let mut journal = self.journal.write();
        let partition = journal.entry(entry.session_id.clone()).or_default();
        partition.push(entry.clone());
        Ok(entry)
    }

    fn get_tx_log(
        &self,
        session_id: Option<&SessionId>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TxEntry>> {
        self.ensure_open()?;
        let journal = self.journal.read();
        let key: PartitionKey = session_id.cloned();
        let entries = match journal.get(&key) {
            Some(partition) => partition
                .iter()
                .rev()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(entries)
    }

    fn delete_session(&self, session_id: &SessionId) -> Result<Vec<FactId>> {
        self.ensure_open()?;
        let to_delete: Vec<FactId> = self
            .facts
            .iter()
            .filter(|entry| entry.value().session_id.as_ref() == Some(session_id))
            .map(|entry| entry.key().clone())
            .collect();
        for id in &to_delete {
            self.facts.remove(id);
        }
        tracing::debug!(session = %session_id, count = to_delete.len(), "session discarded");
        Ok(to_delete)
    }

    fn get_session_facts(&self, session_id: &SessionId) -> Result<Vec<Fact>> {
        self.ensure_open()?;
        Ok(self
            .facts
            .iter()
            .filter(|entry| entry.value().session_id.as_ref() == Some(session_id))
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn delete_txs(&self, uuids: &[TxId]) -> Result<usize> {
        self.ensure_open()?;
        if uuids.is_empty() {
            return Ok(0);
        }
        let mut journal = self.journal.write();
        let mut removed = 0;
        for partition in journal.values_mut() {
            let before = partition.len();
            partition.retain(|entry| !uuids.contains(&entry.uuid));
            removed += before - partition.len();
        }
        Ok(removed)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
