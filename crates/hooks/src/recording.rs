//! Recording hook for tests and diagnostics.

use crate::{HookResult, MemoryHook};
use factstore_core::{Fact, FactId, Operation};
use parking_lot::RwLock;

/// A hook that records every event it observes, optionally failing on a
/// chosen operation.
///
/// Used to assert hook ordering and to exercise the engine's compensation
/// path without a real sink.
pub struct RecordingHook {
    name: String,
    events: RwLock<Vec<(Operation, FactId)>>,
    fail_on: Option<Operation>,
}

impl RecordingHook {
    /// A hook that records everything and never fails.
    pub fn new(name: impl Into<String>) -> Self {
        RecordingHook {
            name: name.into(),
            events: RwLock::new(Vec::new()),
            fail_on: None,
        }
    }

    /// A hook that fails whenever it observes `op`. The failing event is
    /// not recorded.
    pub fn failing_on(name: impl Into<String>, op: Operation) -> Self {
        RecordingHook {
            name: name.into(),
            events: RwLock::new(Vec::new()),
            fail_on: Some(op),
        }
    }

    /// Snapshot of observed events in arrival order.
    pub fn events(&self) -> Vec<(Operation, FactId)> {
        self.events.read().clone()
    }

    /// Observed operations only, in arrival order.
    pub fn ops(&self) -> Vec<Operation> {
        self.events.read().iter().map(|(op, _)| *op).collect()
    }

    /// Number of observed events.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Whether no events were observed.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl MemoryHook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_event(&self, op: Operation, fact_id: &FactId, _fact: Option<&Fact>) -> HookResult {
        if self.fail_on == Some(op) {
            return Err(format!("{} refuses {}", self.name, op).into());
        }
        self.events.write().push((op, fact_id.clone()));
        Ok(())
    }
}
