//! Convenience re-exports for the common case.
//!
//! ```ignore
//! use factstore::prelude::*;
//! ```

pub use crate::async_store::AsyncFactStore;
pub use crate::error::{Error, Result};
pub use crate::store::{FactStore, FactStoreBuilder};

pub use factstore_core::{Fact, FactId, Operation, Payload, SessionId, TxEntry, Value};
pub use factstore_engine::{Audit, CommitOptions, Constraint, FactModel, StoreMetrics, Validator};
pub use factstore_hooks::{FnHook, KeywordIndexHook, MemoryHook, RecordingHook};
pub use factstore_storage::{MemoryBackend, PathFilter, StorageBackend};
