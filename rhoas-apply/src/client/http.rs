//! HTTP implementation of the remote facade.
//!
//! Kafka instances and cloud providers live on the Kafka management API,
//! service accounts on the SSO service account API, and topics and ACLs on
//! each instance's own admin API, whose URL is looked up from the instance
//! and cached.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use rhoas_reconcile::reconciler::acl::parse_binding_id;
use rhoas_reconcile::{
    ApiError, ListFilter, Lookup, RemoteFacade, RemoteKind, Response, TransportMeta,
};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;
use tracing::debug;

use super::auth::TokenSource;
use crate::config::ProviderConfig;

pub struct HttpFacade {
    http: reqwest::Client,
    tokens: TokenSource,
    kafkas_mgmt_url: String,
    service_accounts_url: String,
    /// Kafka id to admin API base URL.
    admin_urls: RwLock<HashMap<String, String>>,
}

fn no_response(err: reqwest::Error) -> ApiError {
    ApiError::without_response(format!("request failed: {}", err))
}

fn missing_parent(kind: RemoteKind) -> ApiError {
    ApiError::without_response(format!("{} calls need a parent", kind))
}

/// Admin API query parameters for an ACL binding identity.
fn binding_query(id: &str) -> Result<Vec<(String, String)>, ApiError> {
    let binding = parse_binding_id(id).map_err(|e| ApiError::without_response(e.to_string()))?;
    Ok(binding
        .into_iter()
        .filter_map(|(k, v)| v.as_str().map(|v| (k, v.to_string())))
        .collect())
}

/// Some list endpoints answer with a bare array holding one page only,
/// so no total is known.
fn as_page(value: Value) -> Value {
    match value {
        Value::Array(items) => json!({ "items": items }),
        other => other,
    }
}

/// `first`/`max` window of the service account API for a page.
fn account_window(filter: &ListFilter) -> (u32, u32) {
    ((filter.page.max(1) - 1) * filter.size, filter.size)
}

/// Decode a fully read response.
fn decode(status: StatusCode, body: &[u8]) -> Response<Value> {
    let meta = TransportMeta::new(status.as_u16(), body.to_vec());
    if !status.is_success() {
        return Err(ApiError::new(status.to_string(), meta));
    }
    if body.is_empty() {
        return Ok((Value::Null, meta));
    }
    match serde_json::from_slice(body) {
        Ok(value) => Ok((value, meta)),
        Err(e) => Err(ApiError::undecodable(format!("invalid JSON response: {}", e), meta)),
    }
}

impl HttpFacade {
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = config.call_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        let tokens = TokenSource::new(
            http.clone(),
            config.token_url(),
            config.client_id.clone(),
            config.offline_token.clone(),
        );
        Ok(Self {
            http,
            tokens,
            kafkas_mgmt_url: config.kafkas_mgmt_url(),
            service_accounts_url: config.service_accounts_url(),
            admin_urls: RwLock::new(HashMap::new()),
        })
    }

    async fn send(&self, request: RequestBuilder) -> Response<Value> {
        let token = self.tokens.access_token().await?;
        let response = request.bearer_auth(token).send().await.map_err(no_response)?;
        let status = response.status();

        match response.bytes().await {
            Ok(body) => decode(status, &body),
            Err(e) => Err(ApiError::new(
                status.to_string(),
                TransportMeta::unreadable(status.as_u16(), e.to_string()),
            )),
        }
    }

    async fn admin_url(&self, kafka_id: &str) -> Result<String, ApiError> {
        if let Some(url) = self.admin_urls.read().await.get(kafka_id) {
            return Ok(url.clone());
        }
        let (kafka, meta) = self
            .send(
                self.http
                    .get(format!("{}/kafkas/{}", self.kafkas_mgmt_url, kafka_id)),
            )
            .await?;
        let url = kafka
            .as_object()
            .and_then(|k| k.opt_str("admin_api_server_url"))
            .filter(|u| !u.is_empty())
            .map(|u| format!("{}/api/v1", u.trim_end_matches('/')))
            .ok_or_else(|| {
                ApiError::new(
                    format!("Kafka instance {} has no admin API yet", kafka_id),
                    meta,
                )
            })?;
        debug!(kafka_id, url = %url, "Resolved admin API");
        self.admin_urls
            .write()
            .await
            .insert(kafka_id.to_string(), url.clone());
        Ok(url)
    }

    /// Collection URL for a kind, resolving the parent where needed.
    async fn collection(&self, kind: RemoteKind, parent: Option<&str>) -> Result<String, ApiError> {
        Ok(match kind {
            RemoteKind::Kafka => format!("{}/kafkas", self.kafkas_mgmt_url),
            RemoteKind::CloudProvider => format!("{}/cloud_providers", self.kafkas_mgmt_url),
            RemoteKind::CloudProviderRegion => {
                let provider = parent.ok_or_else(|| missing_parent(kind))?;
                format!("{}/cloud_providers/{}/regions", self.kafkas_mgmt_url, provider)
            }
            RemoteKind::ServiceAccount => self.service_accounts_url.clone(),
            RemoteKind::Topic => {
                let kafka = parent.ok_or_else(|| missing_parent(kind))?;
                format!("{}/topics", self.admin_url(kafka).await?)
            }
            RemoteKind::Acl => {
                let kafka = parent.ok_or_else(|| missing_parent(kind))?;
                format!("{}/acls", self.admin_url(kafka).await?)
            }
        })
    }

    /// ACLs are addressed by filter, not by path.
    async fn acl_request(
        &self,
        method: Method,
        parent: Option<&str>,
        id: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let url = self.collection(RemoteKind::Acl, parent).await?;
        Ok(self.http.request(method, url).query(&binding_query(id)?))
    }
}

#[async_trait]
impl RemoteFacade for HttpFacade {
    async fn create(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        payload: Map<String, Value>,
    ) -> Response<Value> {
        let url = self.collection(kind, parent).await?;
        let mut request = self.http.post(url).json(&payload);
        if kind == RemoteKind::Kafka {
            request = request.query(&[("async", "true")]);
        }
        self.send(request).await
    }

    async fn get(&self, kind: RemoteKind, parent: Option<&str>, id: &str) -> Response<Value> {
        if kind != RemoteKind::Acl {
            let url = self.collection(kind, parent).await?;
            return self.send(self.http.get(format!("{}/{}", url, id))).await;
        }

        let (page, meta) = self.send(self.acl_request(Method::GET, parent, id).await?).await?;
        let first = page
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned();
        match first {
            Some(binding) => Ok((binding, meta)),
            None => Err(ApiError::new(
                "ACL binding not found",
                TransportMeta::new(404, format!("no ACL binding matches {}", id)),
            )),
        }
    }

    async fn list(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        filter: &ListFilter,
    ) -> Response<Value> {
        let url = self.collection(kind, parent).await?;
        let mut request = self.http.get(url);
        request = match kind {
            RemoteKind::ServiceAccount => {
                let (first, max) = account_window(filter);
                request.query(&[("first", first), ("max", max)])
            }
            _ => request.query(&[("page", filter.page), ("size", filter.size)]),
        };
        if let Some(search) = &filter.search {
            let key = match kind {
                RemoteKind::Topic => "filter",
                _ => "search",
            };
            request = request.query(&[(key, search)]);
        }
        let (value, meta) = self.send(request).await?;
        Ok((as_page(value), meta))
    }

    async fn update(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
        payload: Map<String, Value>,
    ) -> Response<Value> {
        let url = self.collection(kind, parent).await?;
        self.send(self.http.patch(format!("{}/{}", url, id)).json(&payload))
            .await
    }

    async fn delete(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> Result<TransportMeta, ApiError> {
        let request = match kind {
            RemoteKind::Acl => self.acl_request(Method::DELETE, parent, id).await?,
            RemoteKind::Kafka => {
                let url = self.collection(kind, parent).await?;
                self.http
                    .delete(format!("{}/{}", url, id))
                    .query(&[("async", "true")])
            }
            _ => {
                let url = self.collection(kind, parent).await?;
                self.http.delete(format!("{}/{}", url, id))
            }
        };
        let (_, meta) = self.send(request).await?;
        if kind == RemoteKind::Kafka {
            self.admin_urls.write().await.remove(id);
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use rhoas_reconcile::reconciler::acl::binding_id;
    use rhoas_reconcile::{
        CallContext, DataSource, DataSourceReader, IdentityAllocator, ReconcileError, translate,
    };

    /// Service account endpoint answering every page with a bare array.
    struct BareArrayAccounts {
        accounts: Vec<Value>,
    }

    fn unsupported() -> ApiError {
        ApiError::without_response("unsupported")
    }

    #[async_trait]
    impl RemoteFacade for BareArrayAccounts {
        async fn create(
            &self,
            _: RemoteKind,
            _: Option<&str>,
            _: Map<String, Value>,
        ) -> Response<Value> {
            Err(unsupported())
        }

        async fn get(&self, _: RemoteKind, _: Option<&str>, _: &str) -> Response<Value> {
            Err(unsupported())
        }

        async fn list(
            &self,
            _: RemoteKind,
            _: Option<&str>,
            filter: &ListFilter,
        ) -> Response<Value> {
            let (first, max) = account_window(filter);
            let window: Vec<Value> = self
                .accounts
                .iter()
                .skip(first as usize)
                .take(max as usize)
                .cloned()
                .collect();
            let body = serde_json::to_vec(&window).unwrap();
            let (value, meta) = decode(StatusCode::OK, &body)?;
            Ok((as_page(value), meta))
        }

        async fn update(
            &self,
            _: RemoteKind,
            _: Option<&str>,
            _: &str,
            _: Map<String, Value>,
        ) -> Response<Value> {
            Err(unsupported())
        }

        async fn delete(
            &self,
            _: RemoteKind,
            _: Option<&str>,
            _: &str,
        ) -> Result<TransportMeta, ApiError> {
            Err(unsupported())
        }
    }

    #[test]
    fn test_bare_array_becomes_page() {
        let page = as_page(json!([{"id": "a"}, {"id": "b"}]));
        assert!(page.get("total").is_none());
        assert_eq!(page["items"][1]["id"], "b");

        let untouched = as_page(json!({"items": [], "total": 0}));
        assert_eq!(untouched["total"], 0);
    }

    #[tokio::test]
    async fn test_bare_array_pages_are_all_listed() {
        let accounts = (0..150)
            .map(|i| json!({"id": format!("sa-{}", i), "clientId": format!("srvc-acct-{}", i)}))
            .collect();
        let reader = DataSourceReader::new(
            Arc::new(BareArrayAccounts { accounts }),
            Arc::new(IdentityAllocator::new()),
        );
        let (ctx, _handle) = CallContext::new();

        let read = reader
            .read(&ctx, DataSource::ServiceAccounts, &Map::new())
            .await;
        assert!(read.diagnostics.is_empty(), "{:?}", read.diagnostics);
        let listed = read.attributes["service_accounts"].as_array().unwrap();
        assert_eq!(listed.len(), 150);
        assert_eq!(listed[149]["id"], "sa-149");
    }

    #[test]
    fn test_account_window() {
        assert_eq!(account_window(&ListFilter::page(1, 100)), (0, 100));
        assert_eq!(account_window(&ListFilter::page(3, 50)), (100, 50));
    }

    #[test]
    fn test_undecodable_success_is_malformed() {
        let err = decode(StatusCode::OK, b"not json").unwrap_err();
        assert!(err.undecodable);
        assert_eq!(err.meta.as_ref().map(|m| m.status), Some(200));

        let err = ReconcileError::from(err);
        assert!(matches!(err, ReconcileError::MalformedResponse(_)));
        assert_eq!(translate(&err).summary, "malformed remote response");
    }

    #[test]
    fn test_decode_statuses() {
        let (value, meta) = decode(StatusCode::NO_CONTENT, b"").unwrap();
        assert!(value.is_null());
        assert_eq!(meta.status, 204);

        let err = decode(StatusCode::NOT_FOUND, b"{\"reason\": \"gone\"}").unwrap_err();
        assert!(!err.undecodable);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_binding_query() {
        let binding = json!({
            "resourceType": "TOPIC",
            "resourceName": "orders",
            "patternType": "LITERAL",
            "principal": "User:srvc-acct-1",
            "operation": "READ",
            "permission": "ALLOW",
        });
        let id = binding_id(binding.as_object().unwrap()).unwrap();
        let query = binding_query(&id).unwrap();
        assert_eq!(query.len(), 6);
        assert!(query.contains(&("principal".to_string(), "User:srvc-acct-1".to_string())));
        assert!(binding_query("nonsense").is_err());
    }

    #[tokio::test]
    async fn test_parentless_topic_is_rejected() {
        let config = ProviderConfig {
            offline_token: "token".to_string(),
            auth_url: "http://127.0.0.1:9".to_string(),
            client_id: "cloud-services".to_string(),
            api_url: "http://127.0.0.1:9".to_string(),
            timeout: 1,
        };
        let facade = HttpFacade::new(&config).unwrap();
        let err = facade
            .list(RemoteKind::Topic, None, &ListFilter::default())
            .await
            .unwrap_err();
        assert!(err.meta.is_none());
        assert!(err.message.contains("parent"));
    }
}
