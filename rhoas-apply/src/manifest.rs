//! Manifest files: declared resources and data source lookups.
//!
//! ```yaml
//! resources:
//!   - type: rhoas_kafka
//!     name: main
//!     config: { name: main, cloud_provider: aws, region: us-east-1 }
//!   - type: rhoas_topic
//!     name: orders
//!     config: { name: orders, partitions: 3 }
//!     refs: { kafka_id: main }
//! data:
//!   - type: rhoas_cloud_providers
//!     name: providers
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use rhoas_reconcile::{DataSource, DeclaredResource, ResourceKind};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unknown resource type '{0}'")]
    UnknownResource(String),

    #[error("unknown data source type '{0}'")]
    UnknownDataSource(String),

    #[error("data source name '{0}' is used more than once")]
    DuplicateData(String),
}

#[derive(Debug, Deserialize)]
pub struct ResourceEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct DataEntry {
    #[serde(rename = "type")]
    pub type_name: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub data: Vec<DataEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Parse YAML. JSON manifests are valid YAML too.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Declared resources. Duplicate names are left for the pass to report.
    pub fn declared(&self) -> Result<Vec<DeclaredResource>, ManifestError> {
        self.resources
            .iter()
            .map(|entry| {
                let kind = ResourceKind::MANAGED
                    .into_iter()
                    .find(|k| k.type_name() == entry.type_name)
                    .ok_or_else(|| ManifestError::UnknownResource(entry.type_name.clone()))?;
                Ok(DeclaredResource {
                    kind,
                    address: entry.name.clone(),
                    config: entry.config.clone(),
                    refs: entry.refs.clone(),
                })
            })
            .collect()
    }

    pub fn lookups(&self) -> Result<Vec<(String, DataSource, Map<String, Value>)>, ManifestError> {
        let mut seen = HashSet::new();
        self.data
            .iter()
            .map(|entry| {
                if !seen.insert(entry.name.as_str()) {
                    return Err(ManifestError::DuplicateData(entry.name.clone()));
                }
                let source = DataSource::from_type_name(&entry.type_name)
                    .ok_or_else(|| ManifestError::UnknownDataSource(entry.type_name.clone()))?;
                Ok((entry.name.clone(), source, entry.args.clone()))
            })
            .collect()
    }
}
