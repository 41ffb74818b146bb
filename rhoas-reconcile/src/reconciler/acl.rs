//! Access-control entry (`rhoas_acl`).
//!
//! ACL bindings have no remote-issued ID. A binding is identified by its
//! full set of fields, encoded as a query-string style key that the
//! admin API's filter parameters accept as-is.

use serde_json::{Map, Value};

use super::{Dependency, KindSpec, UpdateMode, record_id};
use crate::error::{ReconcileError, Result};
use crate::facade::RemoteKind;
use crate::normalize::Lookup;
use crate::resource::{Record, ResourceKind};
use crate::schema::{Field, FieldType, Schema};

static FIELDS: [Field; 7] = [
    Field::required("kafka_id", FieldType::String).describe("ID of the owning Kafka instance"),
    Field::required("resource_type", FieldType::String)
        .describe("TOPIC, GROUP, CLUSTER or TRANSACTIONAL_ID"),
    Field::required("resource_name", FieldType::String).describe("Resource name or prefix, or *"),
    Field::required("pattern_type", FieldType::String).describe("LITERAL or PREFIXED"),
    Field::required("principal", FieldType::String).describe("User:<client id> or User:*"),
    Field::required("operation", FieldType::String).describe("Operation being allowed or denied"),
    Field::required("permission", FieldType::String).describe("ALLOW or DENY"),
];

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Acl,
    type_name: "rhoas_acl",
    description: "An access-control binding inside a Kafka instance",
    fields: &FIELDS,
};

fn principal_of(record: &Record) -> Option<String> {
    record
        .attributes
        .opt_str("clientId")
        .filter(|id| !id.is_empty())
        .map(|id| format!("User:{}", id))
}

static DEPENDENCIES: [Dependency; 2] = [
    Dependency {
        field: "kafka_id",
        target: ResourceKind::Cluster,
        required: true,
        value: record_id,
    },
    Dependency {
        field: "principal",
        target: ResourceKind::ServiceAccount,
        required: false,
        value: principal_of,
    },
];

/// Declared field to wire field, in identity order.
const WIRE_FIELDS: [(&str, &str); 6] = [
    ("resource_type", "resourceType"),
    ("resource_name", "resourceName"),
    ("pattern_type", "patternType"),
    ("principal", "principal"),
    ("operation", "operation"),
    ("permission", "permission"),
];

const RESOURCE_TYPES: [&str; 4] = ["TOPIC", "GROUP", "CLUSTER", "TRANSACTIONAL_ID"];
const PATTERN_TYPES: [&str; 2] = ["LITERAL", "PREFIXED"];
const OPERATIONS: [&str; 9] = [
    "ALL",
    "READ",
    "WRITE",
    "CREATE",
    "DELETE",
    "ALTER",
    "DESCRIBE",
    "DESCRIBE_CONFIGS",
    "ALTER_CONFIGS",
];
const PERMISSIONS: [&str; 2] = ["ALLOW", "DENY"];

fn escape(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('&', "%26")
        .replace('=', "%3D")
}

fn unescape(value: &str) -> String {
    value
        .replace("%3D", "=")
        .replace("%26", "&")
        .replace("%25", "%")
}

/// Identity of a binding given its wire fields.
pub fn binding_id(binding: &Map<String, Value>) -> Option<String> {
    let parts = WIRE_FIELDS
        .iter()
        .map(|(_, wire)| {
            binding
                .opt_str(wire)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{}={}", wire, escape(v)))
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("&"))
}

/// Wire fields of a binding identity produced by [`binding_id`].
pub fn parse_binding_id(id: &str) -> Result<Map<String, Value>> {
    let mut binding = Map::new();
    for part in id.split('&') {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| ReconcileError::malformed(format!("invalid ACL identity '{}'", id)))?;
        binding.insert(key.to_string(), Value::String(unescape(value)));
    }
    for (_, wire) in WIRE_FIELDS {
        if !binding.contains_key(wire) {
            return Err(ReconcileError::malformed(format!(
                "ACL identity '{}' lacks '{}'",
                id, wire
            )));
        }
    }
    Ok(binding)
}

fn check(field: &str, value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(ReconcileError::validation(
            ResourceKind::Acl,
            format!("{} must be one of {}, got '{}'", field, allowed.join(", "), value),
        ))
    }
}

/// Capability set for ACL bindings. Bindings are immutable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AclKind;

impl KindSpec for AclKind {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Acl
    }

    fn remote_kind(&self) -> RemoteKind {
        RemoteKind::Acl
    }

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn identity_field(&self) -> &'static str {
        "id"
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Unsupported
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &DEPENDENCIES
    }

    fn parent_field(&self) -> Option<&'static str> {
        Some("kafka_id")
    }

    fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        let get = |field: &str| config.opt_str(field).unwrap_or_default();
        check("resource_type", get("resource_type"), &RESOURCE_TYPES)?;
        check("pattern_type", get("pattern_type"), &PATTERN_TYPES)?;
        check("operation", get("operation"), &OPERATIONS)?;
        check("permission", get("permission"), &PERMISSIONS)?;
        let principal = get("principal");
        if !principal.starts_with("User:") {
            return Err(ReconcileError::validation(
                ResourceKind::Acl,
                format!("principal must look like User:<client id>, got '{}'", principal),
            ));
        }
        Ok(())
    }

    fn build_create_payload(&self, config: &Map<String, Value>) -> Map<String, Value> {
        WIRE_FIELDS
            .iter()
            .filter_map(|(field, wire)| config.get(*field).map(|v| (wire.to_string(), v.clone())))
            .collect()
    }

    fn identity(&self, payload: &Map<String, Value>, _remote: &Map<String, Value>) -> Option<String> {
        binding_id(payload)
    }

    fn materialize(&self, payload: &Map<String, Value>, remote: Value) -> Value {
        match remote {
            Value::Object(map) if !map.is_empty() => Value::Object(map),
            _ => Value::Object(payload.clone()),
        }
    }

    fn observed(&self, field: &str, attributes: &Map<String, Value>) -> Option<Value> {
        let wire = WIRE_FIELDS.iter().find(|(f, _)| *f == field)?.1;
        attributes.get(wire).cloned()
    }
}
