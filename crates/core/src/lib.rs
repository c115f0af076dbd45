//! Core types for the fact store.
//!
//! This crate defines the vocabulary shared by every layer of the system:
//!
//! - [`types`]: identifier newtypes ([`FactId`], [`SessionId`], [`TxId`])
//! - [`value`]: the canonical JSON-compatible [`Value`] tree and path walking
//! - [`fact`]: the [`Fact`] record and its wire representation
//! - [`tx`]: journal [`TxEntry`] records and [`Operation`] codes
//! - [`error`]: the error taxonomy surfaced to callers
//!
//! Nothing in this crate performs I/O or holds locks.

pub mod error;
pub mod fact;
pub mod tx;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use fact::Fact;
pub use tx::{Operation, TxEntry};
pub use types::{FactId, SessionId, TxId};
pub use value::{Payload, Value};
