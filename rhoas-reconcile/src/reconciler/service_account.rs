//! Service account (`rhoas_service_account`).

use serde_json::{Map, Value};

use super::{KindSpec, UpdateMode};
use crate::error::{ReconcileError, Result};
use crate::facade::RemoteKind;
use crate::normalize::Lookup;
use crate::resource::ResourceKind;
use crate::schema::{Field, FieldType, Schema};

static FIELDS: [Field; 7] = [
    Field::required("name", FieldType::String)
        .updatable()
        .describe("Name of the service account"),
    Field::optional("description", FieldType::String)
        .updatable()
        .describe("Free-form description"),
    Field::computed("id", FieldType::String),
    Field::computed("clientId", FieldType::String).describe("Client ID used to authenticate"),
    Field::computed("secret", FieldType::String)
        .sensitive()
        .describe("Client secret; only returned when the account is created"),
    Field::computed("createdBy", FieldType::String),
    Field::computed("createdAt", FieldType::Integer),
];

pub static SCHEMA: Schema = Schema {
    kind: ResourceKind::ServiceAccount,
    type_name: "rhoas_service_account",
    description: "A service account for authenticating to Kafka instances",
    fields: &FIELDS,
};

const MAX_NAME_LEN: usize = 50;
const MAX_DESCRIPTION_LEN: usize = 255;

static RETAINED: [&str; 1] = ["secret"];

/// Capability set for service accounts. Updates replace the whole writable set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAccountKind;

impl KindSpec for ServiceAccountKind {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ServiceAccount
    }

    fn remote_kind(&self) -> RemoteKind {
        RemoteKind::ServiceAccount
    }

    fn schema(&self) -> &'static Schema {
        &SCHEMA
    }

    fn identity_field(&self) -> &'static str {
        "id"
    }

    fn update_mode(&self) -> UpdateMode {
        UpdateMode::Full
    }

    fn validate(&self, config: &Map<String, Value>) -> Result<()> {
        let name = config.opt_str("name").unwrap_or_default();
        if name.len() > MAX_NAME_LEN {
            return Err(ReconcileError::validation(
                ResourceKind::ServiceAccount,
                format!("name must be at most {} characters", MAX_NAME_LEN),
            ));
        }
        let description = config.opt_str("description").unwrap_or_default();
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(ReconcileError::validation(
                ResourceKind::ServiceAccount,
                format!("description must be at most {} characters", MAX_DESCRIPTION_LEN),
            ));
        }
        Ok(())
    }

    fn retained(&self) -> &'static [&'static str] {
        &RETAINED
    }
}
