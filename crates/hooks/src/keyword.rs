//! Reference sink: an in-process inverted keyword index.
//!
//! Stands in for an external vector or full-text sink in tests, demos, and
//! single-process deployments. The index mirrors the primary store through
//! the hook contract: upserts on COMMIT / COMMIT_EPHEMERAL / UPDATE /
//! PROMOTE, removal on DELETE, and bulk removal of session-tagged documents
//! on DISCARD_SESSION.
//!
//! Session discard arrives as a single synthetic marker fact, not one event
//! per deleted fact. The index therefore keeps each document's session tag
//! and resolves the affected ids from its own metadata.
//!
//! Tokenization: UAX#29 word boundaries, strip non-alphanumerics,
//! lowercase, drop tokens shorter than two characters and stopwords.

use crate::{HookResult, MemoryHook};
use factstore_core::{Fact, FactId, Operation, SessionId, Value};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeSet;
use std::collections::HashSet;
use unicode_segmentation::UnicodeSegmentation;

/// High-frequency words carrying little discriminative value.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

#[inline]
fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Tokenize text into index terms.
fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .map(|w| w.to_lowercase())
        .filter(|t| t.len() >= 2)
        .filter(|t| !is_stopword(t))
        .collect()
}

/// Per-document index record.
struct DocEntry {
    terms: Vec<String>,
    session_id: Option<SessionId>,
}

#[derive(Default)]
struct IndexState {
    /// term -> ids of facts containing it
    postings: FxHashMap<String, HashSet<FactId>>,
    /// fact id -> its indexed terms and session tag
    docs: FxHashMap<FactId, DocEntry>,
}

impl IndexState {
    fn remove_doc(&mut self, fact_id: &FactId) {
        if let Some(doc) = self.docs.remove(fact_id) {
            for term in doc.terms {
                if let Some(ids) = self.postings.get_mut(&term) {
                    ids.remove(fact_id);
                    if ids.is_empty() {
                        self.postings.remove(&term);
                    }
                }
            }
        }
    }

    fn upsert_doc(&mut self, fact_id: FactId, terms: Vec<String>, session_id: Option<SessionId>) {
        self.remove_doc(&fact_id);
        for term in &terms {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(fact_id.clone());
        }
        self.docs.insert(fact_id, DocEntry { terms, session_id });
    }
}

/// In-process inverted keyword index, fed by the hook chain.
///
/// # Example
///
/// ```
/// use factstore_hooks::{KeywordIndexHook, MemoryHook};
/// use factstore_core::{Fact, Operation, Value};
///
/// let index = KeywordIndexHook::new("text");
/// let fact = Fact::new("note", [("text", Value::from("agent memory store"))]
///     .into_iter()
///     .map(|(k, v)| (k.to_string(), v))
///     .collect());
/// index.on_event(Operation::Commit, &fact.id, Some(&fact)).unwrap();
/// assert_eq!(index.search("memory"), vec![fact.id.clone()]);
/// ```
pub struct KeywordIndexHook {
    /// Dotted payload path holding the text to index.
    text_path: String,
    /// When non-empty, only facts of these types are indexed.
    target_types: BTreeSet<String>,
    state: RwLock<IndexState>,
}

impl KeywordIndexHook {
    /// Index the text found at `text_path` in every fact's payload.
    pub fn new(text_path: impl Into<String>) -> Self {
        KeywordIndexHook {
            text_path: text_path.into(),
            target_types: BTreeSet::new(),
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Restrict indexing to the given fact types.
    pub fn with_target_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Ids of facts whose indexed text contains `term`, unordered.
    pub fn search(&self, term: &str) -> Vec<FactId> {
        let tokens = tokenize(term);
        let state = self.state.read();
        let mut hits: Option<HashSet<FactId>> = None;
        for token in tokens {
            let ids = state.postings.get(&token).cloned().unwrap_or_default();
            hits = Some(match hits {
                Some(acc) => acc.intersection(&ids).cloned().collect(),
                None => ids,
            });
        }
        let mut out: Vec<FactId> = hits.unwrap_or_default().into_iter().collect();
        out.sort();
        out
    }

    /// Number of indexed documents.
    pub fn doc_count(&self) -> usize {
        self.state.read().docs.len()
    }

    fn extract_text(&self, fact: &Fact) -> Option<String> {
        match fact.payload_value(&self.text_path) {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn is_target(&self, fact: &Fact) -> bool {
        self.target_types.is_empty() || self.target_types.contains(&fact.type_name)
    }
}

impl MemoryHook for KeywordIndexHook {
    fn name(&self) -> &str {
        "keyword-index"
    }

    fn on_event(&self, op: Operation, fact_id: &FactId, fact: Option<&Fact>) -> HookResult {
        match op {
            Operation::Delete => {
                self.state.write().remove_doc(fact_id);
                Ok(())
            }
            Operation::DiscardSession => {
                // The marker fact carries the discarded session; resolve the
                // affected ids from our own metadata.
                let Some(session) = fact.and_then(|f| f.session_id.clone()) else {
                    return Ok(());
                };
                let mut state = self.state.write();
                let doomed: Vec<FactId> = state
                    .docs
                    .iter()
                    .filter(|(_, doc)| doc.session_id.as_ref() == Some(&session))
                    .map(|(id, _)| id.clone())
                    .collect();
                for id in &doomed {
                    state.remove_doc(id);
                }
                tracing::debug!(session = %session, count = doomed.len(), "index dropped session docs");
                Ok(())
            }
            Operation::Commit
            | Operation::CommitEphemeral
            | Operation::Update
            | Operation::Promote => {
                let Some(fact) = fact else { return Ok(()) };
                if !self.is_target(fact) {
                    return Ok(());
                }
                let mut state = self.state.write();
                match self.extract_text(fact) {
                    Some(text) if !text.trim().is_empty() => {
                        let terms = tokenize(&text);
                        state.upsert_doc(fact_id.clone(), terms, fact.session_id.clone());
                    }
                    // No indexable text: make sure stale postings do not
                    // survive an update that removed the field.
                    _ => state.remove_doc(fact_id),
                }
                Ok(())
            }
        }
    }
}
