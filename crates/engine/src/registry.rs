//! Schema registry: payload validators and singleton constraints.
//!
//! The registry holds one opaque validator per registered type name plus an
//! optional constraint descriptor. Validators are capabilities, not a
//! schema framework: "given a payload, return a normalized payload or a
//! field-level reason". Code-generated structs, JSON Schema evaluators, or
//! hand-rolled predicates all fit behind the same signature.
//!
//! Typed models plug in through [`FactModel`]: a serde type carrying its
//! registered type name as an associated const. Registering a model
//! installs a validator that round-trips the payload through the type, so
//! serde defaults and field coercions become the normalization step.

use factstore_core::{Error, Payload, Result, Value};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Opaque payload validator. May coerce or default fields; the returned
/// payload is what gets persisted.
pub type Validator =
    Arc<dyn Fn(Payload) -> std::result::Result<Payload, String> + Send + Sync>;

/// Per-type constraint descriptor.
///
/// `singleton_key` names a payload field whose value, together with the
/// type, identifies at most one live fact. Re-committing under the same key
/// updates the existing fact; with `immutable` set it fails instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Payload field identifying the singleton, when set.
    pub singleton_key: Option<String>,
    /// Reject repeated commits under the same singleton key.
    pub immutable: bool,
}

impl Constraint {
    /// A mutable singleton keyed on a payload field.
    pub fn singleton(key: impl Into<String>) -> Self {
        Constraint {
            singleton_key: Some(key.into()),
            immutable: false,
        }
    }

    /// An immutable singleton: a second commit under the same key conflicts.
    pub fn immutable_singleton(key: impl Into<String>) -> Self {
        Constraint {
            singleton_key: Some(key.into()),
            immutable: true,
        }
    }
}

/// A typed payload model bound to a registered type name.
///
/// The associated const is the explicit model-to-type mapping: there is no
/// runtime introspection, the caller names the type at the type level.
///
/// # Example
///
/// ```
/// use factstore_engine::FactModel;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct UserProfile {
///     email: String,
///     #[serde(default)]
///     age: i64,
/// }
///
/// impl FactModel for UserProfile {
///     const TYPE_NAME: &'static str = "user";
/// }
/// ```
pub trait FactModel: Serialize + DeserializeOwned {
    /// The registered type name this model validates.
    const TYPE_NAME: &'static str;
}

/// Serialize a model into a fact payload.
pub fn model_payload<T: FactModel>(model: &T) -> Result<Payload> {
    let json = serde_json::to_value(model)?;
    match Value::from(json) {
        Value::Object(map) => Ok(map),
        other => Err(Error::Serialization(format!(
            "model for type '{}' must serialize to an object, got {}",
            T::TYPE_NAME,
            other.type_name()
        ))),
    }
}

struct Registered {
    validator: Validator,
    constraint: Option<Constraint>,
}

/// Mapping from type name to validator and constraint descriptor.
///
/// Re-registering a type name replaces its validator; already-persisted
/// facts are not re-validated. Unregistered types pass payloads through
/// unchanged.
#[derive(Default)]
pub struct SchemaRegistry {
    schemas: RwLock<HashMap<String, Registered>>,
}

impl SchemaRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator and optional constraint for a type name.
    pub fn register(
        &self,
        type_name: impl Into<String>,
        validator: Validator,
        constraint: Option<Constraint>,
    ) {
        self.schemas.write().insert(
            type_name.into(),
            Registered {
                validator,
                constraint,
            },
        );
    }

    /// Register a typed model; the validator round-trips payloads through
    /// `T`, applying serde defaults and coercions.
    pub fn register_model<T: FactModel>(&self, constraint: Option<Constraint>) {
        let validator: Validator = Arc::new(|payload: Payload| {
            let json = serde_json::Value::from(&Value::Object(payload));
            let model: T = serde_json::from_value(json).map_err(|e| e.to_string())?;
            let back = serde_json::to_value(&model).map_err(|e| e.to_string())?;
            match Value::from(back) {
                Value::Object(map) => Ok(map),
                other => Err(format!(
                    "model must serialize to an object, got {}",
                    other.type_name()
                )),
            }
        });
        self.register(T::TYPE_NAME, validator, constraint);
    }

    /// Validate a payload against the type's validator, returning the
    /// normalized form. Pass-through when the type is unregistered.
    pub fn validate(&self, type_name: &str, payload: Payload) -> Result<Payload> {
        let schemas = self.schemas.read();
        match schemas.get(type_name) {
            Some(registered) => {
                (registered.validator)(payload).map_err(|reason| Error::ValidationFailed {
                    type_name: type_name.to_string(),
                    reason,
                })
            }
            None => Ok(payload),
        }
    }

    /// The constraint descriptor for a type, if any.
    pub fn constraint(&self, type_name: &str) -> Option<Constraint> {
        self.schemas
            .read()
            .get(type_name)
            .and_then(|r| r.constraint.clone())
    }

    /// Whether a validator is registered for the type.
    pub fn is_registered(&self, type_name: &str) -> bool {
        self.schemas.read().contains_key(type_name)
    }
}
