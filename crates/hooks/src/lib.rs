//! Hook contracts for secondary sinks.
//!
//! A hook is a synchronous callback invoked inside the commit critical
//! section, used to keep secondary indexes (vector databases, search
//! engines, caches) consistent with the primary store. The engine's
//! guarantee is deliberately simple: if the hook returns, the engine will
//! complete; if the hook errors, the engine reverts the primary write.
//! The primary store never advances past a sink that refused a write.
//!
//! Hooks observe operations strictly in the order the engine emitted them,
//! with no reordering or batching, and should be idempotent per
//! `(op, fact_id)`: rollback from a later failure may cause the same id to
//! be re-notified.
//!
//! This crate provides the [`MemoryHook`] trait, a closure adapter
//! ([`FnHook`]), a test double ([`RecordingHook`]), and a reference sink
//! ([`KeywordIndexHook`]) that maintains an in-process inverted keyword
//! index.

mod keyword;
mod recording;

pub use keyword::KeywordIndexHook;
pub use recording::RecordingHook;

use factstore_core::error::BoxedHookError;
use factstore_core::{Fact, FactId, Operation};

/// Result type returned by hooks. Any error aborts the surrounding
/// mutation.
pub type HookResult = std::result::Result<(), BoxedHookError>;

/// A synchronous side-effect callback invoked inside the commit critical
/// section.
///
/// Hooks receive the final post-validation fact on COMMIT / UPDATE /
/// PROMOTE, the pre-deletion fact on DELETE, and a synthetic session
/// marker fact on DISCARD_SESSION. `fact` is `None` only when a rollback
/// undoes a creation (the fact no longer exists).
///
/// Hooks may perform I/O. They signal failure by returning an error; the
/// engine wraps it and reverts the primary write. There is no two-phase
/// prepare: sinks that need atomicity across invocations rely on the
/// engine's serialization of mutations.
pub trait MemoryHook: Send + Sync {
    /// Stable name used in error reports and logs.
    fn name(&self) -> &str;

    /// Observe one operation.
    fn on_event(&self, op: Operation, fact_id: &FactId, fact: Option<&Fact>) -> HookResult;
}

/// Adapter turning a closure into a [`MemoryHook`].
///
/// # Example
///
/// ```
/// use factstore_hooks::{FnHook, MemoryHook};
/// use factstore_core::{Fact, Operation, Payload};
///
/// let hook = FnHook::new("audit", |op, fact_id, _fact| {
///     println!("{} {}", op, fact_id);
///     Ok(())
/// });
/// let fact = Fact::new("note", Payload::new());
/// hook.on_event(Operation::Commit, &fact.id, Some(&fact)).unwrap();
/// ```
pub struct FnHook<F> {
    name: String,
    func: F,
}

impl<F> FnHook<F>
where
    F: Fn(Operation, &FactId, Option<&Fact>) -> HookResult + Send + Sync,
{
    /// Wrap a closure under the given hook name.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        FnHook {
            name: name.into(),
            func,
        }
    }
}

impl<F> MemoryHook for FnHook<F>
where
    F: Fn(Operation, &FactId, Option<&Fact>) -> HookResult + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, op: Operation, fact_id: &FactId, fact: Option<&Fact>) -> HookResult {
        (self.func)(op, fact_id, fact)
    }
}
