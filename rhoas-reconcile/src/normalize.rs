//! Response normalization.
//!
//! Remote objects are heterogeneous across kinds, so they are kept as a
//! generic ordered mapping instead of being hand-mapped field by field.
//! Nested lists and records are preserved unchanged. Lookups into the
//! mapping go through [`Lookup`] so a missing key is a
//! [`ReconcileError::MalformedResponse`], never a silent null.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ReconcileError, Result};

/// Field holding the elements of a list response.
pub const ITEMS: &str = "items";

/// Convert a remote response into an ordered field mapping.
pub fn normalize<T: Serialize + ?Sized>(response: &T) -> Result<Map<String, Value>> {
    let value = serde_json::to_value(response)
        .map_err(|e| ReconcileError::malformed(format!("cannot encode response: {}", e)))?;
    into_object(value)
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ReconcileError::malformed(format!(
            "expected an object, got {}",
            describe(&other)
        ))),
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// One page of a paginated list response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub items: Vec<Map<String, Value>>,
    pub page: Option<u64>,
    pub size: Option<u64>,
    pub total: Option<u64>,
}

impl ListPage {
    /// A missing or null `items` field is an empty page; anything else that
    /// is not an array of objects is malformed.
    pub fn from_response<T: Serialize + ?Sized>(response: &T) -> Result<Self> {
        let mut map = normalize(response)?;
        let items = match map.remove(ITEMS) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    into_object(item).map_err(|e| {
                        ReconcileError::malformed(format!("list element {}: {}", i, e))
                    })
                })
                .collect::<Result<Vec<_>>>()?,
            Some(other) => {
                return Err(ReconcileError::malformed(format!(
                    "'{}' must be an array, got {}",
                    ITEMS,
                    describe(&other)
                )));
            }
        };

        Ok(Self {
            items,
            page: map.opt_u64("page"),
            size: map.opt_u64("size"),
            total: map.opt_u64("total"),
        })
    }
}

/// Typed accessors over a normalized mapping.
pub trait Lookup {
    fn require(&self, key: &str) -> Result<&Value>;
    fn require_str(&self, key: &str) -> Result<&str>;
    fn require_array(&self, key: &str) -> Result<&Vec<Value>>;
    fn opt_str(&self, key: &str) -> Option<&str>;
    fn opt_u64(&self, key: &str) -> Option<u64>;
}

impl Lookup for Map<String, Value> {
    fn require(&self, key: &str) -> Result<&Value> {
        match self.get(key) {
            Some(Value::Null) | None => Err(ReconcileError::malformed(format!(
                "missing field '{}'",
                key
            ))),
            Some(value) => Ok(value),
        }
    }

    fn require_str(&self, key: &str) -> Result<&str> {
        self.require(key)?.as_str().ok_or_else(|| {
            ReconcileError::malformed(format!("field '{}' is not a string", key))
        })
    }

    fn require_array(&self, key: &str) -> Result<&Vec<Value>> {
        self.require(key)?.as_array().ok_or_else(|| {
            ReconcileError::malformed(format!("field '{}' is not an array", key))
        })
    }

    fn opt_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn opt_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }
}
