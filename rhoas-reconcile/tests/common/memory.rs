//! In-memory [`RemoteFacade`].
//!
//! Mimics the wire shapes of the Kafka management, admin and service
//! account APIs closely enough to drive the reconcilers end to end without
//! a network. Call counts are recorded per operation and failures can be
//! injected for the next call of a given operation.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use uuid::Uuid;

use rhoas_reconcile::reconciler::acl::binding_id;
use rhoas_reconcile::{
    ApiError, ListFilter, Lookup, RemoteFacade, RemoteKind, Response, TransportMeta,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Get,
    List,
    Update,
    Delete,
}

#[derive(Debug)]
struct Injected {
    op: Operation,
    meta: TransportMeta,
}

type Scope = (RemoteKind, Option<String>);

#[derive(Debug, Default)]
struct State {
    objects: HashMap<Scope, Vec<Map<String, Value>>>,
    calls: HashMap<Operation, usize>,
    failures: VecDeque<Injected>,
    /// Kafka id to the number of reads left before it reports `ready`.
    provisioning: HashMap<String, u32>,
    kafka_ready_after: u32,
}

/// Fake remote API holding objects in memory.
#[derive(Debug, Default)]
pub struct MemoryFacade {
    state: Mutex<State>,
    latency: std::sync::RwLock<Option<Duration>>,
}

fn identity_of(kind: RemoteKind, object: &Map<String, Value>) -> Option<String> {
    match kind {
        RemoteKind::Topic => object.opt_str("name").map(str::to_string),
        RemoteKind::Acl => binding_id(object),
        _ => object.opt_str("id").map(str::to_string),
    }
}

fn error_body(status: u16, reason: &str) -> TransportMeta {
    let body = json!({
        "kind": "Error",
        "code": format!("MGMT-{}", status),
        "reason": reason,
    });
    TransportMeta::new(status, body.to_string())
}

fn failure(status: u16, reason: &str) -> ApiError {
    ApiError::new(format!("{} {}", status, reason), error_body(status, reason))
}

fn not_found(kind: RemoteKind, id: &str) -> ApiError {
    failure(404, &format!("{} '{}' not found", kind, id))
}

fn ok(status: u16, object: Value) -> Response<Value> {
    let body = if object.is_null() {
        String::new()
    } else {
        object.to_string()
    };
    Ok((object, TransportMeta::new(status, body)))
}

fn list_kind(kind: RemoteKind) -> &'static str {
    match kind {
        RemoteKind::Kafka => "KafkaRequestList",
        RemoteKind::Topic => "TopicsList",
        RemoteKind::ServiceAccount => "ServiceAccountList",
        RemoteKind::Acl => "AclBindingList",
        RemoteKind::CloudProvider => "CloudProviderList",
        RemoteKind::CloudProviderRegion => "CloudRegionList",
    }
}

fn search_name(search: &str) -> Option<&str> {
    let (field, value) = search.split_once('=')?;
    (field.trim() == "name").then(|| value.trim().trim_matches('\''))
}

impl MemoryFacade {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kafka instances report `provisioning` for this many reads after create.
    pub async fn set_kafka_ready_after(&self, reads: u32) {
        self.state.lock().await.kafka_ready_after = reads;
    }

    /// Delay every call, e.g. to exercise cancellation.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut guard) = self.latency.write() {
            *guard = latency;
        }
    }

    /// Fail the next call of `op` with the given status and raw body.
    pub async fn fail_next(&self, op: Operation, status: u16, body: impl Into<Vec<u8>>) {
        self.state.lock().await.failures.push_back(Injected {
            op,
            meta: TransportMeta::new(status, body),
        });
    }

    /// Fail the next call of `op` with a response whose body cannot be read.
    pub async fn fail_next_unreadable(&self, op: Operation, status: u16, reason: &str) {
        self.state.lock().await.failures.push_back(Injected {
            op,
            meta: TransportMeta::unreadable(status, reason),
        });
    }

    pub async fn calls(&self, op: Operation) -> usize {
        self.state.lock().await.calls.get(&op).copied().unwrap_or(0)
    }

    pub async fn total_calls(&self) -> usize {
        self.state.lock().await.calls.values().sum()
    }

    /// Add objects directly, bypassing create semantics.
    pub async fn seed(&self, kind: RemoteKind, parent: Option<&str>, objects: Vec<Value>) {
        let mut state = self.state.lock().await;
        let scope = state
            .objects
            .entry((kind, parent.map(str::to_string)))
            .or_default();
        scope.extend(objects.into_iter().filter_map(|o| match o {
            Value::Object(map) => Some(map),
            _ => None,
        }));
    }

    /// Cloud providers `aws` and `gcp`, each with two regions.
    pub async fn seed_cloud_providers(&self) {
        self.seed(
            RemoteKind::CloudProvider,
            None,
            vec![
                json!({"kind": "CloudProvider", "id": "aws", "name": "aws", "display_name": "Amazon Web Services", "enabled": true}),
                json!({"kind": "CloudProvider", "id": "gcp", "name": "gcp", "display_name": "Google Cloud Platform", "enabled": true}),
            ],
        )
        .await;
        for (provider, regions) in [
            ("aws", ["us-east-1", "eu-west-1"]),
            ("gcp", ["us-central1", "europe-west1"]),
        ] {
            let regions = regions
                .iter()
                .map(|r| {
                    json!({
                        "kind": "CloudRegion",
                        "id": r,
                        "display_name": r,
                        "enabled": true,
                        "supported_instance_types": ["standard", "developer"],
                    })
                })
                .collect();
            self.seed(RemoteKind::CloudProviderRegion, Some(provider), regions)
                .await;
        }
    }

    /// Current remote copy of an object.
    pub async fn object(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> Option<Map<String, Value>> {
        let state = self.state.lock().await;
        state
            .objects
            .get(&(kind, parent.map(str::to_string)))?
            .iter()
            .find(|o| identity_of(kind, o).as_deref() == Some(id))
            .cloned()
    }

    pub async fn count(&self, kind: RemoteKind, parent: Option<&str>) -> usize {
        let state = self.state.lock().await;
        state
            .objects
            .get(&(kind, parent.map(str::to_string)))
            .map_or(0, Vec::len)
    }

    /// Delete an object behind the reconciler's back.
    pub async fn remove(&self, kind: RemoteKind, parent: Option<&str>, id: &str) -> bool {
        let mut state = self.state.lock().await;
        state.remove(kind, parent, id).is_some()
    }

    /// Overwrite fields of an object behind the reconciler's back.
    pub async fn modify(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
        fields: Map<String, Value>,
    ) -> bool {
        let mut state = self.state.lock().await;
        match state.find_mut(kind, parent, id) {
            Some(object) => {
                object.extend(fields);
                true
            }
            None => false,
        }
    }

    async fn begin(&self, op: Operation) -> Result<(), ApiError> {
        let latency = self.latency.read().ok().and_then(|l| *l);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state.lock().await;
        *state.calls.entry(op).or_default() += 1;
        if let Some(pos) = state.failures.iter().position(|f| f.op == op) {
            if let Some(injected) = state.failures.remove(pos) {
                let message = format!("{} injected failure", injected.meta.status);
                return Err(ApiError::new(message, injected.meta));
            }
        }
        Ok(())
    }
}

impl State {
    fn scope_mut(&mut self, kind: RemoteKind, parent: Option<&str>) -> &mut Vec<Map<String, Value>> {
        self.objects
            .entry((kind, parent.map(str::to_string)))
            .or_default()
    }

    fn find_mut(
        &mut self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> Option<&mut Map<String, Value>> {
        self.objects
            .get_mut(&(kind, parent.map(str::to_string)))?
            .iter_mut()
            .find(|o| identity_of(kind, o).as_deref() == Some(id))
    }

    fn remove(
        &mut self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> Option<Map<String, Value>> {
        let scope = self.objects.get_mut(&(kind, parent.map(str::to_string)))?;
        let pos = scope
            .iter()
            .position(|o| identity_of(kind, o).as_deref() == Some(id))?;
        Some(scope.remove(pos))
    }

    fn kafka_exists(&self, id: &str) -> bool {
        self.objects
            .get(&(RemoteKind::Kafka, None))
            .is_some_and(|s| s.iter().any(|o| o.opt_str("id") == Some(id)))
    }

    /// Topics and ACLs live inside a Kafka instance.
    fn require_parent(&self, kind: RemoteKind, parent: Option<&str>) -> Result<(), ApiError> {
        match kind {
            RemoteKind::Topic | RemoteKind::Acl => match parent {
                Some(id) if self.kafka_exists(id) => Ok(()),
                Some(id) => Err(not_found(RemoteKind::Kafka, id)),
                None => Err(failure(400, "kafka instance not specified")),
            },
            RemoteKind::CloudProviderRegion if parent.is_none() => {
                Err(failure(400, "cloud provider not specified"))
            }
            _ => Ok(()),
        }
    }

    fn create_kafka(&mut self, payload: Map<String, Value>) -> Response<Value> {
        let name = payload.opt_str("name").unwrap_or_default().to_string();
        let taken = self
            .scope_mut(RemoteKind::Kafka, None)
            .iter()
            .any(|k| k.opt_str("name") == Some(name.as_str()));
        if taken {
            return Err(failure(409, "Kafka cluster name is already used"));
        }

        let id = Uuid::new_v4().simple().to_string();
        let now = Utc::now().to_rfc3339();
        let status = if self.kafka_ready_after == 0 {
            "ready"
        } else {
            self.provisioning.insert(id.clone(), self.kafka_ready_after);
            "accepted"
        };
        let mut kafka = Map::new();
        kafka.insert("id".to_string(), json!(id));
        kafka.insert("kind".to_string(), json!("Kafka"));
        kafka.insert(
            "href".to_string(),
            json!(format!("/api/kafkas_mgmt/v1/kafkas/{}", id)),
        );
        kafka.insert("status".to_string(), json!(status));
        kafka.insert("owner".to_string(), json!("test-user"));
        kafka.insert("reauthentication_enabled".to_string(), json!(true));
        kafka.extend(payload);
        kafka.insert(
            "bootstrap_server_host".to_string(),
            json!(format!("{}-{}.kafka.example.com:443", name, &id[..8])),
        );
        kafka.insert(
            "admin_api_server_url".to_string(),
            json!(format!("https://admin-server-{}-{}.kafka.example.com", name, &id[..8])),
        );
        kafka.insert("created_at".to_string(), json!(now));
        kafka.insert("updated_at".to_string(), json!(now));
        kafka.insert("version".to_string(), json!("3.5.1"));
        self.scope_mut(RemoteKind::Kafka, None).push(kafka.clone());
        ok(202, Value::Object(kafka))
    }

    fn create_topic(&mut self, parent: Option<&str>, payload: Map<String, Value>) -> Response<Value> {
        let name = payload.opt_str("name").unwrap_or_default().to_string();
        let settings = payload.get("settings").cloned().unwrap_or(Value::Null);
        let partitions = settings
            .get("numPartitions")
            .and_then(Value::as_u64)
            .unwrap_or(1);
        let config = settings.get("config").cloned().unwrap_or(json!([]));

        let scope = self.scope_mut(RemoteKind::Topic, parent);
        if scope.iter().any(|t| t.opt_str("name") == Some(name.as_str())) {
            return Err(failure(409, "Topic already exists"));
        }
        let topic = json!({
            "name": name,
            "isInternal": false,
            "partitions": (0..partitions).map(partition).collect::<Vec<_>>(),
            "config": config,
        });
        if let Value::Object(map) = &topic {
            scope.push(map.clone());
        }
        ok(201, topic)
    }

    fn create_service_account(&mut self, payload: Map<String, Value>) -> Response<Value> {
        let id = Uuid::new_v4().to_string();
        let mut account = Map::new();
        account.insert("id".to_string(), json!(id));
        account.insert(
            "clientId".to_string(),
            json!(format!("srvc-acct-{}", Uuid::new_v4())),
        );
        account.insert("secret".to_string(), json!(Uuid::new_v4().to_string()));
        account.extend(payload);
        account.insert("createdBy".to_string(), json!("test-user"));
        account.insert("createdAt".to_string(), json!(Utc::now().timestamp_millis()));

        let created = Value::Object(account.clone());
        account.remove("secret");
        self.scope_mut(RemoteKind::ServiceAccount, None).push(account);
        ok(201, created)
    }

    fn create_acl(&mut self, parent: Option<&str>, payload: Map<String, Value>) -> Response<Value> {
        let Some(id) = binding_id(&payload) else {
            return Err(failure(400, "incomplete ACL binding"));
        };
        let scope = self.scope_mut(RemoteKind::Acl, parent);
        if !scope.iter().any(|b| binding_id(b).as_deref() == Some(id.as_str())) {
            scope.push(payload);
        }
        // The admin API answers 201 with an empty body.
        ok(201, Value::Null)
    }

    fn update_object(
        &mut self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
        payload: Map<String, Value>,
    ) -> Response<Value> {
        let object = self
            .find_mut(kind, parent, id)
            .ok_or_else(|| not_found(kind, id))?;
        match kind {
            RemoteKind::Topic => {
                if let Some(count) = payload.get("numPartitions").and_then(Value::as_u64) {
                    let current = object
                        .get("partitions")
                        .and_then(Value::as_array)
                        .map_or(0, Vec::len) as u64;
                    if count < current {
                        return Err(failure(400, "number of partitions cannot be decreased"));
                    }
                    object.insert(
                        "partitions".to_string(),
                        Value::Array((0..count).map(partition).collect()),
                    );
                }
                if let Some(Value::Array(entries)) = payload.get("config") {
                    let config = object
                        .entry("config")
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(existing) = config {
                        for entry in entries {
                            let key = entry.get("key");
                            existing.retain(|e| e.get("key") != key);
                            existing.push(entry.clone());
                        }
                    }
                }
            }
            RemoteKind::Kafka => {
                object.extend(payload);
                object.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
            }
            _ => object.extend(payload),
        }
        ok(200, Value::Object(object.clone()))
    }

    fn read_object(&mut self, kind: RemoteKind, parent: Option<&str>, id: &str) -> Response<Value> {
        let ready = match self.provisioning.get_mut(id) {
            Some(left) if kind == RemoteKind::Kafka => {
                *left = left.saturating_sub(1);
                Some(*left == 0)
            }
            _ => None,
        };
        if ready == Some(true) {
            self.provisioning.remove(id);
        }
        let object = self
            .find_mut(kind, parent, id)
            .ok_or_else(|| not_found(kind, id))?;
        match ready {
            Some(true) => {
                object.insert("status".to_string(), json!("ready"));
            }
            Some(false) => {
                object.insert("status".to_string(), json!("provisioning"));
            }
            None => {}
        }
        ok(200, Value::Object(object.clone()))
    }
}

fn partition(index: u64) -> Value {
    json!({
        "partition": index,
        "replicas": [{"id": 0}],
        "isr": [{"id": 0}],
        "leader": {"id": 0},
    })
}

#[async_trait]
impl RemoteFacade for MemoryFacade {
    async fn create(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        payload: Map<String, Value>,
    ) -> Response<Value> {
        self.begin(Operation::Create).await?;
        let mut state = self.state.lock().await;
        state.require_parent(kind, parent)?;
        match kind {
            RemoteKind::Kafka => state.create_kafka(payload),
            RemoteKind::Topic => state.create_topic(parent, payload),
            RemoteKind::ServiceAccount => state.create_service_account(payload),
            RemoteKind::Acl => state.create_acl(parent, payload),
            RemoteKind::CloudProvider | RemoteKind::CloudProviderRegion => {
                Err(failure(405, "method not allowed"))
            }
        }
    }

    async fn get(&self, kind: RemoteKind, parent: Option<&str>, id: &str) -> Response<Value> {
        self.begin(Operation::Get).await?;
        let mut state = self.state.lock().await;
        state.require_parent(kind, parent)?;
        state.read_object(kind, parent, id)
    }

    async fn list(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        filter: &ListFilter,
    ) -> Response<Value> {
        self.begin(Operation::List).await?;
        let state = self.state.lock().await;
        state.require_parent(kind, parent)?;

        let name = filter.search.as_deref().and_then(search_name);
        let matching: Vec<&Map<String, Value>> = state
            .objects
            .get(&(kind, parent.map(str::to_string)))
            .map(|scope| {
                scope
                    .iter()
                    .filter(|o| name.is_none_or(|n| o.opt_str("name") == Some(n)))
                    .collect()
            })
            .unwrap_or_default();

        let page = filter.page.max(1) as usize;
        let size = filter.size.max(1) as usize;
        let items: Vec<Value> = matching
            .iter()
            .skip((page - 1) * size)
            .take(size)
            .map(|o| Value::Object((*o).clone()))
            .collect();
        ok(
            200,
            json!({
                "kind": list_kind(kind),
                "page": page,
                "size": items.len(),
                "total": matching.len(),
                "items": items,
            }),
        )
    }

    async fn update(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
        payload: Map<String, Value>,
    ) -> Response<Value> {
        self.begin(Operation::Update).await?;
        let mut state = self.state.lock().await;
        state.require_parent(kind, parent)?;
        state.update_object(kind, parent, id, payload)
    }

    async fn delete(
        &self,
        kind: RemoteKind,
        parent: Option<&str>,
        id: &str,
    ) -> Result<TransportMeta, ApiError> {
        self.begin(Operation::Delete).await?;
        let mut state = self.state.lock().await;
        state.require_parent(kind, parent)?;
        state
            .remove(kind, parent, id)
            .ok_or_else(|| not_found(kind, id))?;
        if kind == RemoteKind::Kafka {
            state.provisioning.remove(id);
            state.objects.remove(&(RemoteKind::Topic, Some(id.to_string())));
            state.objects.remove(&(RemoteKind::Acl, Some(id.to_string())));
        }
        Ok(TransportMeta::new(204, Vec::new()))
    }
}
