//! # Factstore
//!
//! Transactional fact store for AI agent memory.
//!
//! Factstore persists structured facts to a primary store while keeping
//! secondary indexes (vector databases, search engines, caches) strictly
//! consistent with it through a commit protocol: hooks run inside the
//! commit critical section and act as a synchronous replication fence. The
//! primary store never advances past a sink that refused the write.
//!
//! ## Quick Start
//!
//! ```ignore
//! use factstore::prelude::*;
//!
//! let store = FactStore::in_memory();
//!
//! // Commit a durable fact
//! let id = store.commit(Fact::new("note", payload))?;
//!
//! // Session-scoped working memory
//! let id = store.commit_with(fact, CommitOptions::ephemeral("session-1"))?;
//! store.promote_session(&"session-1".into())?;   // keep it
//! store.discard_session(&"session-1".into())?;   // or drop the rest
//!
//! // Time travel
//! store.rollback(None, 1)?;
//! ```
//!
//! ## Pieces
//!
//! - [`FactStore`] - blocking store facade
//! - [`AsyncFactStore`] - cooperative variant for async callers
//! - [`FactStoreBuilder`] - backend and hook wiring
//! - [`Error`] - the caller-facing error taxonomy

#![warn(missing_docs)]

mod async_store;
mod error;
mod store;

pub mod prelude;

pub use async_store::AsyncFactStore;
pub use error::{Error, Result};
pub use store::{FactStore, FactStoreBuilder};

// Re-export the vocabulary types callers need.
pub use factstore_core::{Fact, FactId, Operation, Payload, SessionId, TxEntry, TxId, Value};
pub use factstore_engine::{Audit, CommitOptions, Constraint, FactModel, StoreMetrics, Validator};
pub use factstore_hooks::{FnHook, KeywordIndexHook, MemoryHook, RecordingHook};
pub use factstore_storage::{MemoryBackend, PathFilter, StorageBackend};
