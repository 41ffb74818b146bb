//! Kafka topic (`rhoas_topic`), managed through the instance's admin API.

use serde_json::{Map, Value, json};

use super::{Dependency, KindSpec, UpdateMode, record_id};
use crate::error::{ReconcileError, Result};
use crate::facade::RemoteKind;
use crate::normalize::Lookup;
use crate::resource::ResourceKind;
use crate::schema::{Field, FieldType, Schema};

static FIELDS: [Field; 8] = [
    Field::required("kafka_id", FieldType::String).describe("ID of the owning Kafka instance"),
    Field::required("name", FieldType::String).describe("Topic name"),
    Field::optional("partitions", FieldType::Integer)
        .updatable()
        .describe("Number of partitions; can only grow"),
    Field::optional("retention_ms", FieldType::Integer)
        .updatable()
        .describe("retention.ms"),
    Field::optional("retention_bytes", FieldType::Integer)
        .updatable()
        .describe("retention.bytes"),
    Field::optional("cleanup_policy", FieldType::String)
        .updatable()
        .describe("cleanup.policy: delete, compact or compact,delete"),
    Field::computed("isInternal", FieldType::Bool),
    Field::computed("config", FieldType::List),
];

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Topic,
    type_name: "rhoas_topic",
    description: "A topic inside a Kafka instance",
    fields: &FIELDS,
};

static DEPENDENCIES: [Dependency; 1] = [Dependency {
    field: "kafka_id",
    target: ResourceKind::Cluster,
    required: true,
    value: record_id,
}];

/// Declared field to Kafka topic config key.
const CONFIG_KEYS: [(&str, &str); 3] = [
    ("retention_ms", "retention.ms"),
    ("retention_bytes", "retention.bytes"),
    ("cleanup_policy", "cleanup.policy"),
];

const CLEANUP_POLICIES: [&str; 3] = ["delete", "compact", "compact,delete"];

const DEFAULT_PARTITIONS: i64 = 1;

fn config_entries(config: &Map<String, Value>, only: Option<&[String]>) -> Vec<Value> {
    CONFIG_KEYS
        .iter()
        .filter(|(field, _)| only.is_none_or(|fields| fields.iter().any(|f| f == *field)))
        .filter_map(|(field, key)| {
            let value = match config.get(*field)? {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some(json!({"key": key, "value": value}))
        })
        .collect()
}

fn config_value<'a>(attributes: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    attributes
        .get("config")?
        .as_array()?
        .iter()
        .find(|entry| entry.get("key").and_then(Value::as_str) == Some(key))?
        .get("value")?
        .as_str()
}

/// Capability set for topics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicKind;

impl KindSpec for TopicKind {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Topic
    }

    fn remote_kind(&self) -> RemoteKind {
        RemoteKind::Topic
    }

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn identity_field(&self) -> &'static str {
        "name"
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Partial
    }

    fn dependencies(&self) -> &'static [Dependency] {
        &DEPENDENCIES
    }

    fn parent_field(&self) -> Option<&'static str> {
        Some("kafka_id")
    }

    fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        if let Some(partitions) = config.get("partitions").and_then(Value::as_i64) {
            if partitions < 1 {
                return Err(ReconcileError::validation(
                    ResourceKind::Topic,
                    format!("partitions must be at least 1, got {}", partitions),
                ));
            }
        }
        if let Some(policy) = config.opt_str("cleanup_policy") {
            if !CLEANUP_POLICIES.contains(&policy) {
                return Err(ReconcileError::validation(
                    ResourceKind::Topic,
                    format!(
                        "cleanup_policy must be one of {}, got '{}'",
                        CLEANUP_POLICIES.join(", "),
                        policy
                    ),
                ));
            }
        }
        Ok(())
    }

    fn build_create_payload(&self, config: &Map<String, Value>) -> Map<String, Value> {
        let partitions = config
            .get("partitions")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_PARTITIONS);
        let mut payload = Map::new();
        payload.insert(
            "name".to_string(),
            config.get("name").cloned().unwrap_or(Value::Null),
        );
        payload.insert(
            "settings".to_string(),
            json!({
                "numPartitions": partitions,
                "config": config_entries(config, None),
            }),
        );
        payload
    }

    fn build_update_payload(
        &self,
        config: &Map<String, Value>,
        changed: &[String],
    ) -> Map<String, Value> {
        let mut payload = Map::new();
        if changed.iter().any(|f| f == "partitions") {
            if let Some(partitions) = config.get("partitions") {
                payload.insert("numPartitions".to_string(), partitions.clone());
            }
        }
        let entries = config_entries(config, Some(changed));
        if !entries.is_empty() {
            payload.insert("config".to_string(), Value::Array(entries));
        }
        payload
    }

    fn observed(&self, field: &str, attributes: &Map<String, Value>) -> Option<Value> {
        match field {
            "name" => attributes.get("name").cloned(),
            "partitions" => attributes
                .get("partitions")
                .and_then(Value::as_array)
                .map(|p| Value::from(p.len())),
            "cleanup_policy" => config_value(attributes, "cleanup.policy").map(Value::from),
            "retention_ms" | "retention_bytes" => {
                let key = CONFIG_KEYS.iter().find(|(f, _)| *f == field)?.1;
                config_value(attributes, key)
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(Value::from)
            }
            _ => None,
        }
    }

    fn requires_replacement(&self, field: &str, old: &Value, new: &Value) -> bool {
        // Kafka cannot remove partitions.
        match (field, old.as_i64(), new.as_i64()) {
            ("partitions", Some(old), Some(new)) => new < old,
            _ => false,
        }
    }
}
