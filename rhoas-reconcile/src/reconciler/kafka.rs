//! Kafka instance (`rhoas_kafka`).
//!
//! Instances provision asynchronously: create answers with status
//! `accepted` and the instance is usable once it reports `ready`.

use serde_json::{Map, Value};

use super::{KindSpec, Readiness, UpdateMode};
use crate::error::{ReconcileError, Result};
use crate::facade::RemoteKind;
use crate::normalize::Lookup;
use crate::resource::ResourceKind;
use crate::schema::{Field, FieldType, Schema};

static FIELDS: [Field; 17] = [
    Field::required("name", FieldType::String).describe("Name of the Kafka instance"),
    Field::required("cloud_provider", FieldType::String)
        .describe("Cloud provider hosting the instance, e.g. aws"),
    Field::required("region", FieldType::String).describe("Cloud provider region"),
    Field::optional("plan", FieldType::String).describe("Instance plan, e.g. developer.x1"),
    Field::optional("billing_model", FieldType::String).describe("Billing model, e.g. standard"),
    Field::optional("reauthentication_enabled", FieldType::Bool)
        .updatable()
        .describe("Whether connection reauthentication is enabled"),
    Field::optional("owner", FieldType::String)
        .updatable()
        .describe("User owning the instance"),
    Field::computed("id", FieldType::String).describe("Unique ID of the instance"),
    Field::computed("kind", FieldType::String),
    Field::computed("href", FieldType::String),
    Field::computed("status", FieldType::String).describe("Provisioning status"),
    Field::computed("bootstrap_server_host", FieldType::String)
        .describe("Bootstrap server host clients connect to"),
    Field::computed("admin_api_server_url", FieldType::String),
    Field::computed("created_at", FieldType::String),
    Field::computed("updated_at", FieldType::String),
    Field::computed("version", FieldType::String),
    Field::computed("failed_reason", FieldType::String),
];

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::Cluster,
    type_name: "rhoas_kafka",
    description: "A managed Kafka instance",
    fields: &FIELDS,
};

/// Capability set for Kafka instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterKind;

impl KindSpec for ClusterKind {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Cluster
    }

    fn remote_kind(&self) -> RemoteKind {
        RemoteKind::Kafka
    }

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn identity_field(&self) -> &'static str {
        "id"
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Partial
    }

    fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        let name = config.opt_str("name").unwrap_or_default();
        let valid = name.len() <= 32
            && name.starts_with(|c: char| c.is_ascii_lowercase())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !name.ends_with('-');
        if !valid {
            return Err(ReconcileError::validation(
                ResourceKind::Cluster,
                format!(
                    "name '{}' must start with a lowercase letter, contain only lowercase letters, digits and '-', and be at most 32 characters",
                    name
                ),
            ));
        }
        Ok(())
    }

    fn readiness(&self, attributes: &Map<String, Value>) -> Readiness {
        match attributes.opt_str("status") {
            Some("ready") | None => Readiness::Ready,
            Some("failed") => Readiness::Failed(
                attributes
                    .opt_str("failed_reason")
                    .unwrap_or("instance entered the failed state")
                    .to_string(),
            ),
            Some(other) => Readiness::Pending(other.to_string()),
        }
    }

    fn awaits_deletion(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_create_payload_is_writable_subset() {
        let payload = ClusterKind.build_create_payload(&map(json!({
            "name": "main",
            "cloud_provider": "aws",
            "region": "us-east-1",
            "plan": "developer.x1",
        })));
        assert_eq!(
            payload,
            map(json!({"name": "main", "cloud_provider": "aws", "region": "us-east-1", "plan": "developer.x1"}))
        );
    }

    #[test]
    fn test_update_payload_only_changed_updatable() {
        let payload = ClusterKind.build_update_payload(
            &map(json!({"name": "main", "reauthentication_enabled": false})),
            &["reauthentication_enabled".to_string()],
        );
        assert_eq!(payload, map(json!({"reauthentication_enabled": false})));
    }

    #[test]
    fn test_name_validation() {
        assert!(ClusterKind.validate(&map(json!({"name": "my-kafka-1"}))).is_ok());
        assert!(ClusterKind.validate(&map(json!({"name": "My_Kafka"}))).is_err());
        assert!(ClusterKind.validate(&map(json!({"name": "1kafka"}))).is_err());
        assert!(ClusterKind.validate(&map(json!({"name": "kafka-"}))).is_err());
    }

    #[test]
    fn test_readiness() {
        assert_eq!(
            ClusterKind.readiness(&map(json!({"status": "ready"}))),
            Readiness::Ready
        );
        assert_eq!(
            ClusterKind.readiness(&map(json!({"status": "provisioning"}))),
            Readiness::Pending("provisioning".to_string())
        );
        assert_eq!(
            ClusterKind.readiness(&map(json!({"status": "failed", "failed_reason": "capacity"}))),
            Readiness::Failed("capacity".to_string())
        );
    }
}
