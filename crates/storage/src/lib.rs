//! Storage backend abstraction for the fact store.
//!
//! The engine is storage-agnostic: it talks to an opaque key-addressable
//! document store through [`StorageBackend`]. A conforming backend:
//!
//! - serializes concurrent calls internally (the engine's single mutation
//!   lock provides external serialization for mutations, but reads may
//!   arrive concurrently),
//! - treats `save` as insert-or-replace by fact id,
//! - preserves insertion order for `append_tx` and assigns each entry a
//!   monotonically increasing `seq`,
//! - returns journal entries newest-first from `get_tx_log`.
//!
//! The reference implementation is [`MemoryBackend`]. Durable backends
//! (relational, document, key-value) implement the same trait; cross-process
//! durability is their concern, not the engine's.

mod backend;
mod memory;

pub use backend::{PathFilter, StorageBackend};
pub use memory::MemoryBackend;
