//! Read-only lookups of remote objects.
//!
//! A data source never owns the lifecycle of what it reads, so no
//! reconciliation record is produced. List sources follow pagination until
//! the remote reports no more items and are identified by a synthetic id.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::CallContext;
use crate::diagnostics::{Diagnostics, translate};
use crate::error::{ApiError, ReconcileError, Result};
use crate::facade::{ListFilter, RemoteFacade, RemoteKind};
use crate::identity::IdentityAllocator;
use crate::normalize::{ListPage, Lookup, normalize};
use crate::resource::ResourceKind;
use crate::schema::{Field, FieldType, Schema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    CloudProviders,
    CloudProviderRegions,
    Kafkas,
    Kafka,
    Topic,
    ServiceAccount,
    ServiceAccounts,
}

static CLOUD_PROVIDERS_FIELDS: [Field; 1] = [Field::computed("cloud_providers", FieldType::List)
    .describe("Cloud providers Kafka instances can be placed on")];

static REGIONS_FIELDS: [Field; 2] = [
    Field::required("id", FieldType::String).describe("ID of the cloud provider"),
    Field::computed("regions", FieldType::List),
];

static KAFKAS_FIELDS: [Field; 1] = [Field::computed("kafkas", FieldType::List)];

static KAFKA_FIELDS: [Field; 2] = [
    Field::optional("id", FieldType::String),
    Field::optional("name", FieldType::String).describe("Looked up when no id is given"),
];

static TOPIC_FIELDS: [Field; 2] = [
    Field::required("kafka_id", FieldType::String),
    Field::required("name", FieldType::String),
];

static SERVICE_ACCOUNT_FIELDS: [Field; 2] = [
    Field::required("id", FieldType::String),
    Field::computed("secret", FieldType::String).sensitive(),
];

static SERVICE_ACCOUNTS_FIELDS: [Field; 1] = [Field::computed("service_accounts", FieldType::List)];

static SCHEMAS: [Schema; 7] = [
    Schema {
        kind: ResourceKind::CloudProviderList,
        type_name: "rhoas_cloud_providers",
        description: "Lists the available cloud providers",
        fields: &CLOUD_PROVIDERS_FIELDS,
    },
    Schema {
        kind: ResourceKind::CloudProviderRegionList,
        type_name: "rhoas_cloud_provider_regions",
        description: "Lists the regions of a cloud provider",
        fields: &REGIONS_FIELDS,
    },
    Schema {
        kind: ResourceKind::ClusterList,
        type_name: "rhoas_kafkas",
        description: "Lists the Kafka instances visible to the caller",
        fields: &KAFKAS_FIELDS,
    },
    Schema {
        kind: ResourceKind::Cluster,
        type_name: "rhoas_kafka",
        description: "Reads one Kafka instance by id or name; every remote field is exposed",
        fields: &KAFKA_FIELDS,
    },
    Schema {
        kind: ResourceKind::Topic,
        type_name: "rhoas_topic",
        description: "Reads one topic; every remote field is exposed",
        fields: &TOPIC_FIELDS,
    },
    Schema {
        kind: ResourceKind::ServiceAccount,
        type_name: "rhoas_service_account",
        description: "Reads one service account; every remote field is exposed",
        fields: &SERVICE_ACCOUNT_FIELDS,
    },
    Schema {
        kind: ResourceKind::ServiceAccountList,
        type_name: "rhoas_service_accounts",
        description: "Lists the service accounts visible to the caller",
        fields: &SERVICE_ACCOUNTS_FIELDS,
    },
];

impl DataSource {
    pub const ALL: [DataSource; 7] = [
        DataSource::CloudProviders,
        DataSource::CloudProviderRegions,
        DataSource::Kafkas,
        DataSource::Kafka,
        DataSource::Topic,
        DataSource::ServiceAccount,
        DataSource::ServiceAccounts,
    ];

    pub fn schema(&self) -> &'static Schema {
        let index = match self {
            DataSource::CloudProviders => 0,
            DataSource::CloudProviderRegions => 1,
            DataSource::Kafkas => 2,
            DataSource::Kafka => 3,
            DataSource::Topic => 4,
            DataSource::ServiceAccount => 5,
            DataSource::ServiceAccounts => 6,
        };
        &SCHEMAS[index]
    }

    pub fn type_name(&self) -> &'static str {
        self.schema().type_name
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.type_name() == name)
    }

    pub fn remote_kind(&self) -> RemoteKind {
        match self {
            DataSource::CloudProviders => RemoteKind::CloudProvider,
            DataSource::CloudProviderRegions => RemoteKind::CloudProviderRegion,
            DataSource::Kafkas | DataSource::Kafka => RemoteKind::Kafka,
            DataSource::Topic => RemoteKind::Topic,
            DataSource::ServiceAccount | DataSource::ServiceAccounts => RemoteKind::ServiceAccount,
        }
    }

    /// Computed field receiving the items of a list source.
    pub fn list_field(&self) -> Option<&'static str> {
        match self {
            DataSource::CloudProviders => Some("cloud_providers"),
            DataSource::CloudProviderRegions => Some("regions"),
            DataSource::Kafkas => Some("kafkas"),
            DataSource::ServiceAccounts => Some("service_accounts"),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        self.list_field().is_some()
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Result of one data source read.
#[derive(Debug, Clone, Default)]
pub struct DataRead {
    /// `None` when the read failed.
    pub id: Option<String>,
    pub attributes: Map<String, Value>,
    pub diagnostics: Diagnostics,
}

impl DataRead {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

pub struct DataSourceReader {
    facade: Arc<dyn RemoteFacade>,
    identities: Arc<IdentityAllocator>,
    page_size: u32,
}

impl DataSourceReader {
    pub const DEFAULT_PAGE_SIZE: u32 = 100;

    pub fn new(facade: Arc<dyn RemoteFacade>, identities: Arc<IdentityAllocator>) -> Self {
        Self {
            facade,
            identities,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub async fn read(
        &self,
        ctx: &CallContext,
        source: DataSource,
        args: &Map<String, Value>,
    ) -> DataRead {
        match self.try_read(ctx, source, args).await {
            Ok((id, attributes)) => DataRead {
                id: Some(id),
                attributes,
                diagnostics: Diagnostics::new(),
            },
            Err(err) => {
                warn!(source = %source, error = %err, "Data source read failed");
                DataRead {
                    id: None,
                    attributes: Map::new(),
                    diagnostics: translate(&err).at(source.type_name()).into(),
                }
            }
        }
    }

    async fn try_read(
        &self,
        ctx: &CallContext,
        source: DataSource,
        args: &Map<String, Value>,
    ) -> Result<(String, Map<String, Value>)> {
        source.schema().validate(args)?;

        let mut attributes = args.clone();
        if let Some(field) = source.list_field() {
            let parent = match source {
                DataSource::CloudProviderRegions => Some(args.require_str("id")?),
                _ => None,
            };
            let items = self.list_all(ctx, source.remote_kind(), parent, None).await?;
            debug!(source = %source, count = items.len(), "Listed");
            attributes.insert(
                field.to_string(),
                Value::Array(items.into_iter().map(Value::Object).collect()),
            );
            let id = self.identities.allocate(None, true)?;
            return Ok((id, attributes));
        }

        let object = match source {
            DataSource::Kafka => match (args.opt_str("id"), args.opt_str("name")) {
                (Some(id), _) if !id.is_empty() => self.get(ctx, RemoteKind::Kafka, None, id).await?,
                (_, Some(name)) if !name.is_empty() => self.kafka_by_name(ctx, name).await?,
                _ => {
                    return Err(ReconcileError::validation(
                        ResourceKind::Cluster,
                        "either id or name must be set",
                    ));
                }
            },
            DataSource::Topic => {
                let kafka_id = args.require_str("kafka_id")?;
                let name = args.require_str("name")?;
                self.get(ctx, RemoteKind::Topic, Some(kafka_id), name).await?
            }
            DataSource::ServiceAccount => {
                let id = args.require_str("id")?;
                self.get(ctx, RemoteKind::ServiceAccount, None, id).await?
            }
            other => {
                return Err(ReconcileError::validation(
                    other.schema().kind,
                    format!("{} is not a singular data source", other),
                ));
            }
        };

        let identity_field = match source {
            DataSource::Topic => "name",
            _ => "id",
        };
        let id = self
            .identities
            .allocate(object.opt_str(identity_field), false)?;
        attributes.extend(object);
        Ok((id, attributes))
    }

    async fn get(
        &self,
        ctx: &CallContext,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> Result<Map<String, Value>> {
        let (object, _) = ctx.run("get", self.facade.get(kind, parent, id)).await??;
        normalize(&object)
    }

    async fn kafka_by_name(&self, ctx: &CallContext, name: &str) -> Result<Map<String, Value>> {
        let search = format!("name = {}", name);
        self.list_all(ctx, RemoteKind::Kafka, None, Some(&search))
            .await?
            .into_iter()
            .find(|k| k.opt_str("name") == Some(name))
            .ok_or_else(|| {
                ReconcileError::NotFound(ApiError::without_response(format!(
                    "no Kafka instance named '{}'",
                    name
                )))
            })
    }

    /// Every item of a paginated list, in remote order.
    async fn list_all(
        &self,
        ctx: &CallContext,
        kind: RemoteKind,
        parent: Option<&str>,
        search: Option<&str>,
    ) -> Result<Vec<Map<String, Value>>> {
        let mut items = Vec::new();
        let mut page = 1;
        loop {
            let mut filter = ListFilter::page(page, self.page_size);
            if let Some(search) = search {
                filter = filter.with_search(search);
            }
            let (response, _) = ctx.run("list", self.facade.list(kind, parent, &filter)).await??;
            let listed = ListPage::from_response(&response)?;
            let received = listed.items.len();
            items.extend(listed.items);

            let exhausted = match listed.total {
                Some(total) => items.len() as u64 >= total,
                None => received < self.page_size as usize,
            };
            if received == 0 || exhausted {
                return Ok(items);
            }
            page += 1;
        }
    }
}
