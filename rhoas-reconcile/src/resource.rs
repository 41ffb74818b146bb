//! Declared resources, reconciliation records and lifecycle states.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kinds of objects the core knows how to reconcile or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Cluster,
    Topic,
    ServiceAccount,
    Acl,
    CloudProviderList,
    CloudProviderRegionList,
    ClusterList,
    ServiceAccountList,
}

impl ResourceKind {
    /// Kinds with a managed lifecycle, in dependency order.
    pub const MANAGED: [ResourceKind; 4] = [
        ResourceKind::Cluster,
        ResourceKind::ServiceAccount,
        ResourceKind::Topic,
        ResourceKind::Acl,
    ];

    /// Configuration type name, as users write it.
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "rhoas_kafka",
            ResourceKind::Topic => "rhoas_topic",
            ResourceKind::ServiceAccount => "rhoas_service_account",
            ResourceKind::Acl => "rhoas_acl",
            ResourceKind::CloudProviderList => "rhoas_cloud_providers",
            ResourceKind::CloudProviderRegionList => "rhoas_cloud_provider_regions",
            ResourceKind::ClusterList => "rhoas_kafkas",
            ResourceKind::ServiceAccountList => "rhoas_service_accounts",
        }
    }

    /// Read-only kinds have no singular remote identity and no lifecycle.
    pub fn is_read_only(&self) -> bool {
        !Self::MANAGED.contains(self)
    }

    /// Dependency tier: a resource may only reference resources of a lower tier.
    pub fn tier(&self) -> usize {
        match self {
            ResourceKind::Topic | ResourceKind::Acl => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Cluster => "cluster",
            ResourceKind::Topic => "topic",
            ResourceKind::ServiceAccount => "service_account",
            ResourceKind::Acl => "acl",
            ResourceKind::CloudProviderList => "cloud_provider_list",
            ResourceKind::CloudProviderRegionList => "cloud_provider_region_list",
            ResourceKind::ClusterList => "cluster_list",
            ResourceKind::ServiceAccountList => "service_account_list",
        };
        f.write_str(name)
    }
}

/// The user's desired state for one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredResource {
    pub kind: ResourceKind,
    /// Unique label of this declaration within the configuration.
    pub address: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Field name to the address of another declaration whose identifier fills it.
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
}

impl DeclaredResource {
    pub fn new(kind: ResourceKind, address: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.into(),
            config: Map::new(),
            refs: BTreeMap::new(),
        }
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.config.insert(field.to_string(), value.into());
        self
    }

    pub fn reference(mut self, field: &str, address: impl Into<String>) -> Self {
        self.refs.insert(field.to_string(), address.into());
        self
    }
}

/// Persisted correspondence between a declaration and its remote object.
///
/// `id` is assigned once from the remote identity and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: ResourceKind,
    pub address: String,
    pub id: String,
    /// Scope of the remote object, e.g. the Kafka instance owning a topic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Resolved configuration as last applied.
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Normalized remote fields.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Looks up records of other declarations to resolve references.
pub trait Resolve: Send + Sync {
    fn record(&self, address: &str) -> Option<&Record>;
}

impl Resolve for BTreeMap<String, Record> {
    fn record(&self, address: &str) -> Option<&Record> {
        self.get(address)
    }
}

/// Lifecycle of a managed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Absent,
    Creating,
    Present,
    Reading,
    Updating,
    Deleting,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Absent => "absent",
            Lifecycle::Creating => "creating",
            Lifecycle::Present => "present",
            Lifecycle::Reading => "reading",
            Lifecycle::Updating => "updating",
            Lifecycle::Deleting => "deleting",
        })
    }
}

impl Lifecycle {
    /// Whether `next` is a legal successor of this state.
    pub fn can_enter(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present)
                | (Creating, Absent)
                | (Present, Reading)
                | (Present, Updating)
                | (Present, Deleting)
                | (Reading, Present)
                | (Reading, Absent)
                | (Updating, Present)
                | (Updating, Absent)
                | (Deleting, Absent)
                | (Deleting, Present)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only_kinds() {
        assert!(!ResourceKind::Topic.is_read_only());
        assert!(ResourceKind::CloudProviderList.is_read_only());
        assert!(ResourceKind::ServiceAccountList.is_read_only());
        assert_eq!(ResourceKind::Acl.type_name(), "rhoas_acl");
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(Lifecycle::Absent.can_enter(Lifecycle::Creating));
        assert!(Lifecycle::Reading.can_enter(Lifecycle::Absent));
        assert!(Lifecycle::Deleting.can_enter(Lifecycle::Present));
        assert!(!Lifecycle::Absent.can_enter(Lifecycle::Updating));
        assert!(!Lifecycle::Absent.can_enter(Lifecycle::Deleting));
    }

    #[test]
    fn test_declared_builder() {
        let topic = DeclaredResource::new(ResourceKind::Topic, "orders")
            .set("name", "orders")
            .set("partitions", 3)
            .reference("kafka_id", "main");
        assert_eq!(topic.config["partitions"], 3);
        assert_eq!(topic.refs["kafka_id"], "main");
    }

    #[test]
    fn test_record_deserialize_defaults() {
        let record: Record = serde_json::from_value(serde_json::json!({
            "kind": "cluster",
            "address": "main",
            "id": "c1"
        }))
        .unwrap();
        assert!(record.parent.is_none());
        assert!(record.attributes.is_empty());
    }
}
