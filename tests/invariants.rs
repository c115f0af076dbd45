//! Invariant and boundary-behavior tests.
//!
//! Quantified store laws: journal replay equals observed states, singleton
//! cardinality, exact rollback inversion, plus the edge cases around
//! rollback limits and double deletes.

use factstore::prelude::*;
use std::sync::Arc;

fn payload(entries: Vec<(&str, Value)>) -> Payload {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn passthrough() -> Validator {
    Arc::new(|p| Ok(p))
}

// ---------------------------------------------------------------------------
// Journal replay
// ---------------------------------------------------------------------------

#[test]
fn journal_fact_after_matches_observed_states() {
    let store = FactStore::in_memory();
    let mut observed = Vec::new();

    let id = store
        .commit(Fact::new("counter", payload(vec![("n", Value::Int(0))])))
        .unwrap();
    observed.push(store.get(&id).unwrap().unwrap());

    for n in 1..=3i64 {
        store
            .update(&id, payload(vec![("n", Value::Int(n))]))
            .unwrap();
        observed.push(store.get(&id).unwrap().unwrap());
    }

    // History is newest-first; replay order is the reverse.
    let mut replayed: Vec<Fact> = store
        .history(None, 100, 0)
        .unwrap()
        .into_iter()
        .filter(|e| e.fact_id.as_ref() == Some(&id))
        .filter_map(|e| e.fact_after)
        .collect();
    replayed.reverse();

    assert_eq!(replayed, observed, "fact_after sequence replays observation");
}

#[test]
fn seq_strictly_increases_within_a_session() {
    let store = FactStore::in_memory();
    let session = SessionId::new("s1");
    for _ in 0..4 {
        store
            .commit_with(
                Fact::new("note", Payload::new()),
                CommitOptions::session(session.clone()),
            )
            .unwrap();
    }
    let entries = store.history(Some(&session), 100, 0).unwrap();
    for window in entries.windows(2) {
        assert!(window[0].seq > window[1].seq, "newest-first, strictly ordered");
    }
}

// ---------------------------------------------------------------------------
// Singleton cardinality
// ---------------------------------------------------------------------------

#[test]
fn singleton_key_never_yields_two_live_facts() {
    let store = FactStore::in_memory();
    store.register_validator("user", passthrough(), Some(Constraint::singleton("email")));

    for age in [20, 25, 30, 35i64] {
        store
            .commit(Fact::new(
                "user",
                payload(vec![("email", Value::from("a@x")), ("age", Value::Int(age))]),
            ))
            .unwrap();
        let hits = store
            .query(Some("user"), &[PathFilter::new("email", "a@x")], None)
            .unwrap();
        assert_eq!(hits.len(), 1, "cardinality holds after every commit");
    }

    let fact = &store
        .query(Some("user"), &[PathFilter::new("email", "a@x")], None)
        .unwrap()[0];
    assert_eq!(
        fact.payload_value("age"),
        Some(&Value::Int(35)),
        "payload equals the last commit's payload"
    );
}

#[test]
fn singleton_without_key_value_inserts_fresh() {
    let store = FactStore::in_memory();
    store.register_validator("user", passthrough(), Some(Constraint::singleton("email")));

    // No value for the singleton key: no redirect, plain inserts.
    store
        .commit(Fact::new("user", payload(vec![("name", Value::from("a"))])))
        .unwrap();
    store
        .commit(Fact::new("user", payload(vec![("name", Value::from("b"))])))
        .unwrap();
    assert_eq!(store.query(Some("user"), &[], None).unwrap().len(), 2);
}

// ---------------------------------------------------------------------------
// Rollback inversion
// ---------------------------------------------------------------------------

#[test]
fn rollback_n_undoes_n_mutations_exactly() {
    let store = FactStore::in_memory();

    let anchor = store
        .commit(Fact::new("note", payload(vec![("v", Value::Int(0))])))
        .unwrap();
    let baseline = store.get(&anchor).unwrap().unwrap();
    let baseline_journal = store.history(None, 100, 0).unwrap().len();

    // Three mutations: update, fresh commit, delete of the fresh commit.
    store
        .update(&anchor, payload(vec![("v", Value::Int(1))]))
        .unwrap();
    let extra = store
        .commit(Fact::new("note", payload(vec![("tmp", Value::Bool(true))])))
        .unwrap();
    store.delete(&extra).unwrap();

    store.rollback(None, 3).unwrap();

    assert_eq!(store.get(&anchor).unwrap().unwrap(), baseline);
    assert!(store.get(&extra).unwrap().is_none());
    assert_eq!(
        store.history(None, 100, 0).unwrap().len(),
        baseline_journal,
        "journal shorter by exactly the rolled-back entries"
    );
}

#[test]
fn commit_then_rollback_is_a_noop() {
    let store = FactStore::in_memory();
    let id = store
        .commit(Fact::new("note", payload(vec![("x", Value::Int(1))])))
        .unwrap();
    store.rollback(None, 1).unwrap();

    assert!(store.get(&id).unwrap().is_none());
    assert!(store.history(None, 100, 0).unwrap().is_empty());
    assert!(store.query(None, &[], None).unwrap().is_empty());
}

#[test]
fn rollback_restores_singleton_previous_payload() {
    let store = FactStore::in_memory();
    store.register_validator("user", passthrough(), Some(Constraint::singleton("email")));

    let id = store
        .commit(Fact::new(
            "user",
            payload(vec![("email", Value::from("a@x")), ("age", Value::Int(20))]),
        ))
        .unwrap();
    store
        .commit(Fact::new(
            "user",
            payload(vec![("email", Value::from("a@x")), ("age", Value::Int(25))]),
        ))
        .unwrap();

    store.rollback(None, 1).unwrap();
    let fact = store.get(&id).unwrap().unwrap();
    assert_eq!(fact.payload_value("age"), Some(&Value::Int(20)));
}

#[test]
fn rollback_undoes_promotion() {
    let store = FactStore::in_memory();
    let session = SessionId::new("s");
    let id = store
        .commit_with(
            Fact::new("note", Payload::new()),
            CommitOptions::ephemeral(session.clone()),
        )
        .unwrap();
    store.promote_session(&session).unwrap();
    assert!(store.get(&id).unwrap().unwrap().session_id.is_none());

    store.rollback(Some(&session), 1).unwrap();
    assert_eq!(
        store.get(&id).unwrap().unwrap().session_id,
        Some(session),
        "promotion inverted: session binding restored"
    );
}

#[test]
fn discard_session_is_not_inverted_by_rollback() {
    let store = FactStore::in_memory();
    let session = SessionId::new("s");
    let id = store
        .commit_with(
            Fact::new("note", Payload::new()),
            CommitOptions::ephemeral(session.clone()),
        )
        .unwrap();
    store.discard_session(&session).unwrap();

    store.rollback(Some(&session), 1).unwrap();
    assert!(
        store.get(&id).unwrap().is_none(),
        "bulk discard is non-reversible; the entry is consumed without effect"
    );
    let remaining = store.history(Some(&session), 100, 0).unwrap();
    assert_eq!(remaining.len(), 1, "only the ephemeral commit entry remains");
    assert_eq!(remaining[0].op, Operation::CommitEphemeral);
}

// ---------------------------------------------------------------------------
// Boundaries
// ---------------------------------------------------------------------------

#[test]
fn rollback_zero_is_a_noop() {
    let store = FactStore::in_memory();
    let id = store.commit(Fact::new("note", Payload::new())).unwrap();
    store.rollback(None, 0).unwrap();
    assert!(store.get(&id).unwrap().is_some());
    assert_eq!(store.history(None, 100, 0).unwrap().len(), 1);
}

#[test]
fn rollback_huge_consumes_everything_and_stops() {
    let store = FactStore::in_memory();
    for _ in 0..3 {
        store.commit(Fact::new("note", Payload::new())).unwrap();
    }
    store.rollback(None, 10_000).unwrap();
    assert!(store.query(None, &[], None).unwrap().is_empty());
    assert!(store.history(None, 100, 0).unwrap().is_empty());

    // A second oversized rollback on the empty partition is still fine.
    store.rollback(None, 10_000).unwrap();
}

#[test]
fn delete_of_deleted_fact_is_not_found() {
    let store = FactStore::in_memory();
    let id = store.commit(Fact::new("note", Payload::new())).unwrap();
    store.delete(&id).unwrap();
    let err = store.delete(&id).unwrap_err();
    assert!(err.is_not_found(), "no silent success on double delete");
}

#[test]
fn first_commit_hook_failure_leaves_no_trace() {
    let store = FactStore::in_memory();
    store.add_hook(Arc::new(RecordingHook::failing_on(
        "refuser",
        Operation::Commit,
    )));

    let fact = Fact::new("note", payload(vec![("x", Value::Int(1))])).with_id("doomed");
    let err = store.commit(fact).unwrap_err();
    assert!(err.is_hook());

    assert!(store.get(&FactId::new("doomed")).unwrap().is_none());
    assert!(store.history(None, 100, 0).unwrap().is_empty());
    assert!(store.query(None, &[], None).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Storage round-trip laws
// ---------------------------------------------------------------------------

#[test]
fn save_load_is_idempotent_for_live_ids() {
    let backend = Arc::new(MemoryBackend::new());
    let store = FactStore::with_backend(backend.clone());
    let id = store
        .commit(Fact::new("note", payload(vec![("x", Value::Int(1))])))
        .unwrap();

    let loaded = backend.load(&id).unwrap().unwrap();
    backend.save(loaded.clone()).unwrap();
    assert_eq!(backend.load(&id).unwrap().unwrap(), loaded);
}

#[test]
fn wire_document_preserves_unknown_keys_through_the_store() {
    let store = FactStore::in_memory();
    let raw = r#"{
        "id": "f1",
        "type": "note",
        "payload": {"text": "hello"},
        "source": "import",
        "session_id": null,
        "ts": "2026-08-01T10:00:00.000001Z",
        "vendor_tag": "x7"
    }"#;
    let fact: Fact = serde_json::from_str(raw).unwrap();
    let id = store.commit(fact).unwrap();

    let loaded = store.get(&id).unwrap().unwrap();
    let doc = serde_json::to_value(&loaded).unwrap();
    assert_eq!(doc["vendor_tag"], "x7", "unknown keys survive save/load");
}

#[test]
fn query_filters_are_conjunctive() {
    let store = FactStore::in_memory();
    store
        .commit(Fact::new(
            "event",
            payload(vec![("kind", Value::from("login")), ("ok", Value::Bool(true))]),
        ))
        .unwrap();
    store
        .commit(Fact::new(
            "event",
            payload(vec![("kind", Value::from("login")), ("ok", Value::Bool(false))]),
        ))
        .unwrap();

    let hits = store
        .query(
            Some("event"),
            &[
                PathFilter::new("kind", "login"),
                PathFilter::new("ok", true),
            ],
            None,
        )
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].payload_value("ok"), Some(&Value::Bool(true)));
}
