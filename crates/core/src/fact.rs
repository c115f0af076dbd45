//! The fact record and its wire representation.
//!
//! A fact is the atomic unit of agent memory: an id-addressed, typed record
//! with a structured payload. On the wire a fact is a JSON document with
//! exactly the top-level keys `id`, `type`, `payload`, `source`,
//! `session_id`, `ts`. Unknown top-level keys found in loaded documents are
//! preserved through save/load cycles for forward compatibility.

use crate::types::{FactId, SessionId};
use crate::value::{payload_path, Payload, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One atomic, typed, id-addressed record of agent memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique id, stable across updates. Generated if not supplied.
    pub id: FactId,

    /// Type name, the key into the schema registry.
    #[serde(rename = "type")]
    pub type_name: String,

    /// Structured payload, validated per type.
    pub payload: Payload,

    /// Provenance tag. Opaque to the engine.
    pub source: Option<String>,

    /// Session binding. `None` means the fact is durable; a value means the
    /// fact is session-scoped and may be bulk-discarded.
    pub session_id: Option<SessionId>,

    /// Creation timestamp, refreshed on update. ISO-8601 UTC with
    /// microsecond precision on the wire.
    #[serde(with = "iso_micros")]
    pub ts: DateTime<Utc>,

    /// Unknown top-level keys from loaded documents, carried through
    /// save/load untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Fact {
    /// Create a fact with a generated id and the current timestamp.
    pub fn new(type_name: impl Into<String>, payload: Payload) -> Self {
        Fact {
            id: FactId::generate(),
            type_name: type_name.into(),
            payload,
            source: None,
            session_id: None,
            ts: Utc::now(),
            extra: BTreeMap::new(),
        }
    }

    /// Replace the generated id with a caller-supplied one.
    pub fn with_id(mut self, id: impl Into<FactId>) -> Self {
        self.id = id.into();
        self
    }

    /// Attach a provenance tag.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Bind the fact to a session.
    pub fn with_session(mut self, session: impl Into<SessionId>) -> Self {
        self.session_id = Some(session.into());
        self
    }

    /// Whether the fact is session-scoped.
    pub fn is_session_scoped(&self) -> bool {
        self.session_id.is_some()
    }

    /// Refresh the timestamp. Called on every update.
    pub fn touch(&mut self) {
        self.ts = Utc::now();
    }

    /// Walk a dot-separated path into the payload.
    pub fn payload_value(&self, path: &str) -> Option<&Value> {
        payload_path(&self.payload, path)
    }
}

/// ISO-8601 UTC timestamps with microsecond precision.
///
/// `chrono`'s default RFC 3339 output drops the fractional part when it is
/// zero; the wire contract pins six digits so documents are byte-comparable
/// across backends.
mod iso_micros {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
