//! Remote client facade.
//!
//! The reconcilers never talk HTTP themselves. They consume an already
//! authenticated client through [`RemoteFacade`], which must be safe for
//! concurrent use. Every call hands back [`TransportMeta`] alongside the
//! payload so failures can be reported with the server's own error body.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::ApiError;

/// Remote endpoint families exposed by the management APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    Kafka,
    Topic,
    ServiceAccount,
    Acl,
    CloudProvider,
    CloudProviderRegion,
}

impl fmt::Display for RemoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RemoteKind::Kafka => "kafka",
            RemoteKind::Topic => "topic",
            RemoteKind::ServiceAccount => "service_account",
            RemoteKind::Acl => "acl",
            RemoteKind::CloudProvider => "cloud_provider",
            RemoteKind::CloudProviderRegion => "cloud_provider_region",
        };
        f.write_str(name)
    }
}

/// Raw response body as captured by the transport.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    Bytes(Vec<u8>),
    /// The transport received a response but failed reading its body.
    Unreadable(String),
}

/// Status and body attached to every remote call, success or failure.
#[derive(Debug, Clone)]
pub struct TransportMeta {
    pub status: u16,
    pub body: ResponseBody,
}

#[derive(Debug, Clone, Error)]
#[error("failed to read response body: {0}")]
pub struct BodyReadError(pub String);

impl TransportMeta {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: ResponseBody::Bytes(body.into()),
        }
    }

    pub fn unreadable(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            body: ResponseBody::Unreadable(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text. Invalid UTF-8 is replaced rather than rejected.
    pub fn read_body(&self) -> std::result::Result<String, BodyReadError> {
        match &self.body {
            ResponseBody::Bytes(bytes) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            ResponseBody::Unreadable(reason) => Err(BodyReadError(reason.clone())),
        }
    }
}

/// Pagination and search parameters for list calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// 1-based page number.
    pub page: u32,
    pub size: u32,
    pub search: Option<String>,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            page: 1,
            size: 100,
            search: None,
        }
    }
}

impl ListFilter {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            search: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }
}

/// Result of a facade call: the decoded object plus its transport metadata.
pub type Response<T> = std::result::Result<(T, TransportMeta), ApiError>;

/// Typed remote operations per resource kind.
///
/// `parent` scopes kinds that live inside another object: topics and ACLs
/// live inside a Kafka instance, regions inside a cloud provider.
#[async_trait]
pub trait RemoteFacade: Send + Sync {
    async fn create(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        payload: Map<String, Value>,
    ) -> Response<Value>;

    async fn get(&self, kind: RemoteKind, parent: Option<&str>, id: &str) -> Response<Value>;

    /// List objects. Implementations return a `{ "items": [...] }` shaped page,
    /// optionally carrying `page`, `size` and `total`.
    async fn list(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        filter: &ListFilter,
    ) -> Response<Value>;

    async fn update(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
        payload: Map<String, Value>,
    ) -> Response<Value>;

    async fn delete(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> std::result::Result<TransportMeta, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_body() {
        let meta = TransportMeta::new(429, "quota exceeded");
        assert_eq!(meta.read_body().unwrap(), "quota exceeded");
        assert!(!meta.is_success());

        let meta = TransportMeta::unreadable(500, "connection reset");
        let err = meta.read_body().unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_list_filter() {
        let filter = ListFilter::page(2, 10).with_search("name = orders");
        assert_eq!(filter.page, 2);
        assert_eq!(filter.search.as_deref(), Some("name = orders"));
        assert_eq!(ListFilter::default().page, 1);
    }
}
