//! Duck-typed state validation contract.
//!
//! A bridge never interprets its own state beyond "it is a JSON object"; all
//! shape knowledge lives behind the [`Schema`] trait so any validation
//! library can be plugged in. The shipped implementation, [`TypedSchema`],
//! validates by round-tripping through a serde type: deserialize the
//! candidate (rejecting malformed input), then re-serialize it (applying
//! `#[serde(default)]` normalization).

use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Validator for bridge state.
///
/// `safe_parse` either rejects a candidate with a structured error or returns
/// the validated, normalized value that becomes the new state. Parsing an
/// empty object yields the schema's default value, used when a bridge is
/// created without an explicit initial state.
pub trait Schema: Send + Sync {
    /// Validate and normalize a candidate state.
    fn safe_parse(&self, value: &Value) -> Result<Value, SchemaError>;

    /// Produce the schema's default value.
    fn default_value(&self) -> Result<Value, SchemaError> {
        self.safe_parse(&Value::Object(Map::new()))
    }
}

/// A single validation failure inside a candidate value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIssue {
    /// Path into the candidate ("$" for the root).
    pub path: String,
    pub message: String,
}

/// Structured rejection produced by a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaError {
    pub issues: Vec<SchemaIssue>,
}

impl SchemaError {
    /// Error with a single issue at the given path.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![SchemaIssue {
                path: path.into(),
                message: message.into(),
            }],
        }
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for issue in &self.issues {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", issue.path, issue.message)?;
            first = false;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaError {}

/// Schema backed by a serde type.
///
/// The candidate is valid iff it deserializes into `T`; the normalized state
/// is `T` serialized back to JSON. Fields marked `#[serde(default)]` act as
/// schema defaults, which also makes `default_value` work for types whose
/// fields all have defaults.
pub struct TypedSchema<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for TypedSchema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypedSchema<{}>", std::any::type_name::<T>())
    }
}

impl<T> Schema for TypedSchema<T>
where
    T: Serialize + DeserializeOwned,
{
    fn safe_parse(&self, value: &Value) -> Result<Value, SchemaError> {
        let typed: T = serde_json::from_value(value.clone())
            .map_err(|e| SchemaError::single("$", e.to_string()))?;
        serde_json::to_value(&typed).map_err(|e| SchemaError::single("$", e.to_string()))
    }
}
