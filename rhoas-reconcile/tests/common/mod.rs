//! Shared helpers for rhoas-reconcile integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rhoas_reconcile::{
    CallContext, DeclaredResource, IdentityAllocator, PassReport, ReconcilePass, Reconciler,
    ReconcilerOptions, Record, Registry, ResourceKind,
};

pub mod memory;

pub use memory::{MemoryFacade, Operation};

/// Reconcilers and a pass wired to one in-memory facade.
pub struct Harness {
    pub facade: Arc<MemoryFacade>,
    pub registry: Arc<Registry>,
    pub pass: ReconcilePass,
    pub ctx: CallContext,
}

impl Harness {
    pub fn new() -> Self {
        let facade = Arc::new(MemoryFacade::new());
        let options = ReconcilerOptions {
            poll_interval: Duration::from_millis(1),
            max_polls: 10,
        };
        let registry = Arc::new(Registry::with_options(
            facade.clone(),
            Arc::new(IdentityAllocator::new()),
            options,
        ));
        let pass = ReconcilePass::new(registry.clone());
        Self {
            facade,
            registry,
            pass,
            ctx: CallContext::background(),
        }
    }

    pub fn reconciler(&self, kind: ResourceKind) -> Arc<dyn Reconciler> {
        self.registry.get(kind).expect("managed kind")
    }

    pub async fn apply(
        &self,
        declared: &[DeclaredResource],
        prior: BTreeMap<String, Record>,
    ) -> PassReport {
        self.pass.apply(&self.ctx, declared, prior).await
    }

    /// Create one resource directly and return its record.
    pub async fn create(
        &self,
        declared: &DeclaredResource,
        resolver: &BTreeMap<String, Record>,
    ) -> Record {
        let outcome = self
            .reconciler(declared.kind)
            .create(&self.ctx, declared, resolver)
            .await;
        assert!(outcome.is_ok(), "create failed: {:?}", outcome.diagnostics);
        outcome.record.expect("record after create")
    }
}

pub fn cluster(address: &str, name: &str) -> DeclaredResource {
    DeclaredResource::new(ResourceKind::Cluster, address)
        .set("name", name)
        .set("cloud_provider", "aws")
        .set("region", "us-east-1")
}

pub fn topic(address: &str, cluster: &str, name: &str) -> DeclaredResource {
    DeclaredResource::new(ResourceKind::Topic, address)
        .set("name", name)
        .set("partitions", 1)
        .reference("kafka_id", cluster)
}

pub fn service_account(address: &str, name: &str) -> DeclaredResource {
    DeclaredResource::new(ResourceKind::ServiceAccount, address)
        .set("name", name)
        .set("description", "integration test")
}

pub fn acl(address: &str, cluster: &str, account: &str, topic: &str) -> DeclaredResource {
    DeclaredResource::new(ResourceKind::Acl, address)
        .set("resource_type", "TOPIC")
        .set("resource_name", topic)
        .set("pattern_type", "LITERAL")
        .set("operation", "READ")
        .set("permission", "ALLOW")
        .reference("kafka_id", cluster)
        .reference("principal", account)
}

pub fn records(records: impl IntoIterator<Item = Record>) -> BTreeMap<String, Record> {
    records
        .into_iter()
        .map(|r| (r.address.clone(), r))
        .collect()
}

pub fn no_records() -> BTreeMap<String, Record> {
    BTreeMap::new()
}
