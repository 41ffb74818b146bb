//! Field schemas: the configuration surface each kind is validated against.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ReconcileError, Result};
use crate::resource::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Bool,
    List,
    Map,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Bool => value.is_boolean(),
            FieldType::List => value.is_array(),
            FieldType::Map => value.is_object(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMode {
    /// Must be declared and non-empty on create.
    Required,
    Optional,
    /// Read-only, filled from the remote object.
    Computed,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Field {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: FieldType,
    pub mode: FieldMode,
    /// Writable fields that are not updatable force replacement when changed.
    pub updatable: bool,
    pub sensitive: bool,
    pub description: &'static str,
}

impl Field {
    pub const fn required(name: &'static str, ty: FieldType) -> Self {
        Self::new(name, ty, FieldMode::Required)
    }

    pub const fn optional(name: &'static str, ty: FieldType) -> Self {
        Self::new(name, ty, FieldMode::Optional)
    }

    pub const fn computed(name: &'static str, ty: FieldType) -> Self {
        Self::new(name, ty, FieldMode::Computed)
    }

    const fn new(name: &'static str, ty: FieldType, mode: FieldMode) -> Self {
        Self {
            name,
            ty,
            mode,
            updatable: false,
            sensitive: false,
            description: "",
        }
    }

    pub const fn updatable(mut self) -> Self {
        self.updatable = true;
        self
    }

    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub const fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn is_writable(&self) -> bool {
        self.mode != FieldMode::Computed
    }

    pub fn forces_replacement(&self) -> bool {
        self.is_writable() && !self.updatable
    }
}

/// Placeholder printed in place of sensitive values.
pub const REDACTED: &str = "(sensitive)";

/// Schema for one resource or data source kind.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Schema {
    pub kind: ResourceKind,
    pub type_name: &'static str,
    pub description: &'static str,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn writable(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.is_writable())
    }

    pub fn required(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.mode == FieldMode::Required)
    }

    /// Validate a declared configuration: no unknown or computed fields,
    /// every value of the declared type, every required field non-empty.
    pub fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        for (name, value) in config {
            let field = self.field(name).ok_or_else(|| {
                ReconcileError::validation(self.kind, format!("unknown field '{}'", name))
            })?;
            if !field.is_writable() {
                return Err(ReconcileError::validation(
                    self.kind,
                    format!("field '{}' is computed and cannot be set", name),
                ));
            }
            if !value.is_null() && !field.ty.accepts(value) {
                return Err(ReconcileError::validation(
                    self.kind,
                    format!("field '{}' must be of type {:?}", name, field.ty),
                ));
            }
        }

        let missing: Vec<&str> = self
            .required()
            .filter(|f| config.get(f.name).is_none_or(is_empty_value))
            .map(|f| f.name)
            .collect();
        if !missing.is_empty() {
            return Err(ReconcileError::validation(
                self.kind,
                format!("missing required field(s): {}", missing.join(", ")),
            ));
        }

        Ok(())
    }

    /// Mask every sensitive attribute that carries a value.
    pub fn redact(&self, attributes: &mut Map<String, Value>) {
        for field in self.fields.iter().filter(|f| f.sensitive) {
            if let Some(value) = attributes.get_mut(field.name) {
                if !value.is_null() {
                    *value = Value::String(REDACTED.to_string());
                }
            }
        }
    }

    /// Writable declared fields, in schema order, skipping nulls.
    pub fn writable_subset(&self, config: &Map<String, Value>) -> Map<String, Value> {
        self.writable()
            .filter_map(|f| {
                config
                    .get(f.name)
                    .filter(|v| !v.is_null())
                    .map(|v| (f.name.to_string(), v.clone()))
            })
            .collect()
    }
}

/// Null, blank strings and empty collections count as "not declared".
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}
