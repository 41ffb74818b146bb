//! Reconcilers for the managed resource kinds.
//!
//! One generic state machine, [`ResourceReconciler`], drives Create, Read,
//! Update and Delete against the remote facade. What differs per kind
//! (payload shape, schema, identity, dependencies) is supplied by a
//! [`KindSpec`] implementation in the sibling modules.

pub mod acl;
pub mod kafka;
pub mod service_account;
pub mod topic;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::context::CallContext;
use crate::diagnostics::{Diagnostic, Diagnostics, translate};
use crate::error::{ApiError, ReconcileError, Result};
use crate::facade::{RemoteFacade, RemoteKind, TransportMeta};
use crate::identity::IdentityAllocator;
use crate::normalize::normalize;
use crate::resource::{DeclaredResource, Lifecycle, Record, ResourceKind, Resolve};
use crate::schema::{Schema, is_empty_value};

pub use acl::AclKind;
pub use kafka::ClusterKind;
pub use service_account::ServiceAccountKind;
pub use topic::TopicKind;

/// How a kind accepts changes to an existing remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Only changed fields are sent.
    Partial,
    /// The full writable set is sent on every update.
    Full,
    /// Any change forces replacement.
    Unsupported,
}

/// Readiness of a remote object that provisions asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Pending(String),
    Failed(String),
}

/// A field whose value is another declaration's identity.
#[derive(Debug, Clone, Copy)]
pub struct Dependency {
    pub field: &'static str,
    pub target: ResourceKind,
    /// Required dependencies fail when neither a literal nor a reference is declared.
    pub required: bool,
    /// Value taken from the target's record.
    pub value: fn(&Record) -> Option<String>,
}

/// Identity of the target record, for foreign keys like `kafka_id`.
pub fn record_id(record: &Record) -> Option<String> {
    Some(record.id.clone()).filter(|id| !id.is_empty())
}

/// Per-kind capability set consumed by [`ResourceReconciler`].
pub trait KindSpec: Send + Sync + 'static {
    fn kind(&self) -> ResourceKind;

    fn remote_kind(&self) -> RemoteKind;

    fn schema(&self) -> &'static Schema;

    /// Remote field carrying the object's identity.
    fn identity_field(&self) -> &'static str;

    fn update_mode(&self) -> UpdateMode;

    fn dependencies(&self) -> &'static [Dependency] {
        &[]
    }

    /// Declared field naming the remote scope of the object.
    fn parent_field(&self) -> Option<&'static str> {
        None
    }

    /// Kind-specific checks beyond the schema.
    fn validate(&self, _config: &Map<String, Value>) -> Result<()> {
        Ok(())
    }

    fn build_create_payload(&self, config: &Map<String, Value>) -> Map<String, Value> {
        let mut payload = self.schema().writable_subset(config);
        if let Some(parent) = self.parent_field() {
            payload.remove(parent);
        }
        payload
    }

    fn build_update_payload(
        &self,
        config: &Map<String, Value>,
        changed: &[String],
    ) -> Map<String, Value> {
        let schema = self.schema();
        schema
            .writable()
            .filter(|f| f.updatable)
            .filter(|f| self.update_mode() == UpdateMode::Full || changed.iter().any(|c| c == f.name))
            .filter_map(|f| config.get(f.name).map(|v| (f.name.to_string(), v.clone())))
            .collect()
    }

    /// Identity of a freshly created object.
    fn identity(&self, _payload: &Map<String, Value>, remote: &Map<String, Value>) -> Option<String> {
        remote
            .get(self.identity_field())
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Object to record after create; some endpoints answer with an empty body.
    fn materialize(&self, _payload: &Map<String, Value>, remote: Value) -> Value {
        remote
    }

    /// Current remote value of a declared field, for drift detection.
    fn observed(&self, field: &str, attributes: &Map<String, Value>) -> Option<Value> {
        attributes.get(field).cloned()
    }

    /// Changes that cannot be applied in place even though the field is updatable.
    fn requires_replacement(&self, _field: &str, _old: &Value, _new: &Value) -> bool {
        false
    }

    /// Attributes only returned once (e.g. secrets) and carried across reads.
    fn retained(&self) -> &'static [&'static str] {
        &[]
    }

    fn readiness(&self, _attributes: &Map<String, Value>) -> Readiness {
        Readiness::Ready
    }

    /// Whether delete is asynchronous and must be awaited until not-found.
    fn awaits_deletion(&self) -> bool {
        false
    }
}

/// Difference between a record and the desired configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diff {
    /// Fields that can be changed in place.
    pub changed: Vec<String>,
    /// Fields whose change forces delete and re-create.
    pub replace: Vec<String>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.replace.is_empty()
    }

    pub fn needs_replacement(&self) -> bool {
        !self.replace.is_empty()
    }
}

/// Result of one reconciler operation.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state: Lifecycle,
    /// Lifecycle states the operation passed through, ending in `state`.
    pub path: Vec<Lifecycle>,
    /// `None` means no remote object is tracked any more.
    pub record: Option<Record>,
    pub diagnostics: Diagnostics,
    pub failure: Option<ReconcileError>,
}

impl Outcome {
    pub fn present(record: Record) -> Self {
        Self {
            state: Lifecycle::Present,
            path: vec![Lifecycle::Present],
            record: Some(record),
            diagnostics: Diagnostics::new(),
            failure: None,
        }
    }

    pub fn absent() -> Self {
        Self {
            state: Lifecycle::Absent,
            path: vec![Lifecycle::Absent],
            record: None,
            diagnostics: Diagnostics::new(),
            failure: None,
        }
    }

    /// Failure of an operation; the state stays `Present` while a record is kept.
    pub fn failed(record: Option<Record>, address: &str, err: ReconcileError) -> Self {
        let state = if record.is_some() {
            Lifecycle::Present
        } else {
            Lifecycle::Absent
        };
        let diagnostic = translate(&err).at(address);
        Self {
            state,
            path: vec![state],
            record,
            diagnostics: diagnostic.into(),
            failure: Some(err),
        }
    }

    pub fn with(mut self, diagnostic: Diagnostic) -> Self {
        self.diagnostics.push(diagnostic);
        self
    }

    pub fn is_ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// Lifecycle steps taken by one operation, each checked with
/// [`Lifecycle::can_enter`].
#[derive(Debug)]
struct Walk<'a> {
    kind: ResourceKind,
    address: &'a str,
    state: Lifecycle,
    path: Vec<Lifecycle>,
}

impl<'a> Walk<'a> {
    fn start(kind: ResourceKind, address: &'a str, state: Lifecycle) -> Self {
        Self {
            kind,
            address,
            state,
            path: vec![state],
        }
    }

    fn enter(&mut self, next: Lifecycle) -> Result<()> {
        if next == self.state {
            return Ok(());
        }
        if !self.state.can_enter(next) {
            return Err(ReconcileError::InvalidTransition {
                kind: self.kind,
                from: self.state,
                to: next,
            });
        }
        debug!(kind = %self.kind, address = %self.address, from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
        self.path.push(next);
        Ok(())
    }

    /// Settle in the outcome's state and attach the path taken.
    fn finish(mut self, mut outcome: Outcome) -> Outcome {
        if let Err(err) = self.enter(outcome.state) {
            error!(kind = %self.kind, address = %self.address, error = %err, "Illegal lifecycle transition");
            outcome.diagnostics.push(translate(&err).at(self.address));
            outcome.state = self.state;
        }
        outcome.path = self.path;
        outcome
    }
}

/// Operations a pass can drive for one resource kind.
#[async_trait]
pub trait Reconciler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn schema(&self) -> &'static Schema;

    /// Validate a declaration and fill its references. Never touches the network.
    fn resolve(
        &self,
        declared: &DeclaredResource,
        resolver: &dyn Resolve,
    ) -> Result<Map<String, Value>>;

    fn diff(&self, record: &Record, desired: &Map<String, Value>) -> Diff;

    async fn create(
        &self,
        ctx: &CallContext,
        declared: &DeclaredResource,
        resolver: &dyn Resolve,
    ) -> Outcome;

    async fn read(&self, ctx: &CallContext, record: &Record) -> Outcome;

    async fn update(
        &self,
        ctx: &CallContext,
        record: &Record,
        desired: &Map<String, Value>,
        diff: &Diff,
    ) -> Outcome;

    async fn delete(&self, ctx: &CallContext, record: &Record) -> Outcome;
}

/// Polling behaviour for asynchronously provisioned objects.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerOptions {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            // About an hour at the default interval; cluster provisioning is slow.
            max_polls: 360,
        }
    }
}

/// Generic reconciler parameterized over a kind's capability set.
pub struct ResourceReconciler<K> {
    spec: K,
    facade: Arc<dyn RemoteFacade>,
    identities: Arc<IdentityAllocator>,
    options: ReconcilerOptions,
}

impl<K: KindSpec> ResourceReconciler<K> {
    pub fn new(
        spec: K,
        facade: Arc<dyn RemoteFacade>,
        identities: Arc<IdentityAllocator>,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            spec,
            facade,
            identities,
            options,
        }
    }

    fn parent_of(&self, config: &Map<String, Value>) -> Option<String> {
        self.spec
            .parent_field()
            .and_then(|f| config.get(f))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    async fn call<F>(&self, ctx: &CallContext, what: &str, call: F) -> Result<(Value, TransportMeta)>
    where
        F: std::future::Future<Output = std::result::Result<(Value, TransportMeta), ApiError>>
            + Send,
    {
        debug!(kind = %self.spec.kind(), "{}", what);
        Ok(ctx.run(what, call).await??)
    }

    async fn fetch(&self, ctx: &CallContext, record: &Record) -> Result<Map<String, Value>> {
        let (object, _) = self
            .call(
                ctx,
                "get",
                self.facade
                    .get(self.spec.remote_kind(), record.parent.as_deref(), &record.id),
            )
            .await?;
        let mut attributes = normalize(&object)?;
        for key in self.spec.retained() {
            if !attributes.contains_key(*key) {
                if let Some(value) = record.attributes.get(*key) {
                    attributes.insert((*key).to_string(), value.clone());
                }
            }
        }
        Ok(attributes)
    }

    /// Poll until the object settles. Returns the last attributes seen.
    async fn await_ready(
        &self,
        ctx: &CallContext,
        record: &Record,
    ) -> Result<(Map<String, Value>, Readiness)> {
        let mut attributes = record.attributes.clone();
        let mut readiness = self.spec.readiness(&attributes);
        let mut polls = 0;
        while let Readiness::Pending(status) = &readiness {
            if polls >= self.options.max_polls {
                break;
            }
            debug!(kind = %self.spec.kind(), id = %record.id, status = %status, "waiting for remote object");
            ctx.sleep(self.options.poll_interval).await?;
            attributes = self.fetch(ctx, record).await?;
            readiness = self.spec.readiness(&attributes);
            polls += 1;
        }
        Ok((attributes, readiness))
    }

    async fn await_deleted(&self, ctx: &CallContext, record: &Record) -> Result<()> {
        for _ in 0..self.options.max_polls {
            match self.fetch(ctx, record).await {
                Err(err) if err.is_not_found() => return Ok(()),
                Err(err) => return Err(err),
                Ok(_) => ctx.sleep(self.options.poll_interval).await?,
            }
        }
        Err(ReconcileError::Timeout(format!(
            "{} {} still exists after {} polls",
            self.spec.kind(),
            record.id,
            self.options.max_polls
        )))
    }

    /// Turn a successful create response into a record.
    fn adopt(
        &self,
        declared: &DeclaredResource,
        desired: Map<String, Value>,
        parent: Option<String>,
        payload: &Map<String, Value>,
        object: Value,
    ) -> Result<Record> {
        let object = self.spec.materialize(payload, object);
        let attributes = normalize(&object)?;
        let remote_id = self.spec.identity(payload, &attributes);
        let id = self.identities.allocate(remote_id.as_deref(), false)?;

        Ok(Record {
            kind: self.spec.kind(),
            address: declared.address.clone(),
            id,
            parent,
            config: desired,
            attributes,
        })
    }

    /// Response body with sensitive fields masked.
    fn redacted_body(&self, meta: &TransportMeta) -> String {
        let Ok(body) = meta.read_body() else {
            return "<unreadable>".to_string();
        };
        match serde_json::from_str::<Map<String, Value>>(&body) {
            Ok(mut object) => {
                self.spec.schema().redact(&mut object);
                Value::Object(object).to_string()
            }
            Err(_) => body,
        }
    }
}

#[async_trait]
impl<K: KindSpec> Reconciler for ResourceReconciler<K> {
    fn kind(&self) -> ResourceKind {
        self.spec.kind()
    }

    fn schema(&self) -> &'static Schema {
        self.spec.schema()
    }

    fn resolve(
        &self,
        declared: &DeclaredResource,
        resolver: &dyn Resolve,
    ) -> Result<Map<String, Value>> {
        let kind = self.spec.kind();
        if declared.kind != kind {
            return Err(ReconcileError::validation(
                kind,
                format!("declaration '{}' is a {}", declared.address, declared.kind),
            ));
        }

        let mut config = declared.config.clone();
        for field in declared.refs.keys() {
            if !self.spec.dependencies().iter().any(|d| d.field == field.as_str()) {
                return Err(ReconcileError::validation(
                    kind,
                    format!("field '{}' cannot reference another resource", field),
                ));
            }
        }

        for dep in self.spec.dependencies() {
            let unresolved = |target: String| ReconcileError::DependencyUnresolved {
                kind,
                field: dep.field.to_string(),
                target,
            };
            match declared.refs.get(dep.field) {
                Some(address) => {
                    let value = resolver
                        .record(address)
                        .filter(|r| r.kind == dep.target)
                        .and_then(|r| (dep.value)(r))
                        .ok_or_else(|| unresolved(format!("{} '{}'", dep.target, address)))?;
                    config.insert(dep.field.to_string(), Value::String(value));
                }
                None => {
                    let declared_literal = config.get(dep.field).is_some_and(|v| !is_empty_value(v));
                    if dep.required && !declared_literal {
                        return Err(unresolved(dep.target.to_string()));
                    }
                }
            }
        }

        self.spec.schema().validate(&config)?;
        self.spec.validate(&config)?;
        Ok(config)
    }

    fn diff(&self, record: &Record, desired: &Map<String, Value>) -> Diff {
        let mut diff = Diff::default();
        for field in self.spec.schema().writable() {
            let Some(want) = desired.get(field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let have = self
                .spec
                .observed(field.name, &record.attributes)
                .or_else(|| record.config.get(field.name).cloned())
                .unwrap_or(Value::Null);
            if &have == want {
                continue;
            }
            let parent = self.spec.parent_field() == Some(field.name);
            if parent
                || field.forces_replacement()
                || self.spec.update_mode() == UpdateMode::Unsupported
                || self.spec.requires_replacement(field.name, &have, want)
            {
                diff.replace.push(field.name.to_string());
            } else {
                diff.changed.push(field.name.to_string());
            }
        }
        diff
    }

    async fn create(
        &self,
        ctx: &CallContext,
        declared: &DeclaredResource,
        resolver: &dyn Resolve,
    ) -> Outcome {
        let kind = self.spec.kind();
        let desired = match self.resolve(declared, resolver) {
            Ok(desired) => desired,
            Err(err) => {
                warn!(kind = %kind, address = %declared.address, error = %err, "Rejected declaration");
                return Outcome::failed(None, &declared.address, err);
            }
        };

        let mut walk = Walk::start(kind, &declared.address, Lifecycle::Absent);
        if let Err(err) = walk.enter(Lifecycle::Creating) {
            return walk.finish(Outcome::failed(None, &declared.address, err));
        }

        info!(kind = %kind, address = %declared.address, "Creating");
        let parent = self.parent_of(&desired);
        let payload = self.spec.build_create_payload(&desired);
        let created = self
            .call(
                ctx,
                "create",
                self.facade
                    .create(self.spec.remote_kind(), parent.as_deref(), payload.clone()),
            )
            .await;
        let (object, meta) = match created {
            Ok(created) => created,
            Err(err) => {
                error!(kind = %kind, address = %declared.address, error = %err, "Create failed");
                return walk.finish(Outcome::failed(None, &declared.address, err));
            }
        };

        let record = match self.adopt(declared, desired, parent, &payload, object) {
            Ok(record) => record,
            Err(err) => {
                // The remote object exists but cannot be tracked.
                error!(kind = %kind, address = %declared.address, error = %err, "Created object is untracked");
                let orphan = Diagnostic::error(
                    format!("{} created but not tracked", kind),
                    format!(
                        "the remote {} was created but its identity could not be taken from the response; \
                         delete it manually before applying again. Response (status {}): {}",
                        kind,
                        meta.status,
                        self.redacted_body(&meta)
                    ),
                )
                .at(&declared.address);
                return walk.finish(Outcome::failed(None, &declared.address, err).with(orphan));
            }
        };
        info!(kind = %kind, address = %declared.address, id = %record.id, "Created");

        let outcome = match self.await_ready(ctx, &record).await {
            Ok((attributes, Readiness::Ready)) => Outcome::present(Record { attributes, ..record }),
            Ok((attributes, Readiness::Pending(status))) => {
                Outcome::present(Record { attributes, ..record }).with(
                    Diagnostic::warning(
                        format!("{} is not ready yet", kind),
                        format!("remote status is '{}'", status),
                    )
                    .at(&declared.address),
                )
            }
            Ok((attributes, Readiness::Failed(reason))) => {
                error!(kind = %kind, address = %declared.address, reason = %reason, "Provisioning failed");
                Outcome::present(Record { attributes, ..record }).with(
                    Diagnostic::error(format!("{} provisioning failed", kind), reason)
                        .at(&declared.address),
                )
            }
            // The object exists remotely; keep tracking it so it can be deleted later.
            Err(err) => Outcome::failed(Some(record), &declared.address, err),
        };
        walk.finish(outcome)
    }

    async fn read(&self, ctx: &CallContext, record: &Record) -> Outcome {
        let kind = self.spec.kind();
        let mut walk = Walk::start(kind, &record.address, Lifecycle::Present);
        if let Err(err) = walk.enter(Lifecycle::Reading) {
            return walk.finish(Outcome::failed(Some(record.clone()), &record.address, err));
        }
        debug!(kind = %kind, id = %record.id, "Reading");
        let outcome = match self.fetch(ctx, record).await {
            Ok(attributes) => Outcome::present(Record {
                attributes,
                ..record.clone()
            }),
            Err(err) if err.is_not_found() => {
                warn!(kind = %kind, id = %record.id, "Remote object disappeared");
                Outcome::absent().with(
                    Diagnostic::warning(
                        format!("{} no longer exists", kind),
                        format!(
                            "{} {} was not found remotely and is no longer tracked",
                            kind, record.id
                        ),
                    )
                    .at(&record.address),
                )
            }
            Err(err) => {
                error!(kind = %kind, id = %record.id, error = %err, "Read failed");
                Outcome::failed(Some(record.clone()), &record.address, err)
            }
        };
        walk.finish(outcome)
    }

    async fn update(
        &self,
        ctx: &CallContext,
        record: &Record,
        desired: &Map<String, Value>,
        diff: &Diff,
    ) -> Outcome {
        let kind = self.spec.kind();
        if diff.needs_replacement() {
            return Outcome::failed(
                Some(record.clone()),
                &record.address,
                ReconcileError::validation(
                    kind,
                    format!("changing {} requires replacement", diff.replace.join(", ")),
                ),
            );
        }
        if diff.changed.is_empty() {
            return Outcome::present(record.clone());
        }

        let mut walk = Walk::start(kind, &record.address, Lifecycle::Present);
        if let Err(err) = walk.enter(Lifecycle::Updating) {
            return walk.finish(Outcome::failed(Some(record.clone()), &record.address, err));
        }
        info!(kind = %kind, id = %record.id, changed = ?diff.changed, "Updating");
        let payload = self.spec.build_update_payload(desired, &diff.changed);
        let result = self
            .call(
                ctx,
                "update",
                self.facade.update(
                    self.spec.remote_kind(),
                    record.parent.as_deref(),
                    &record.id,
                    payload,
                ),
            )
            .await;

        let outcome = match result {
            Ok((object, _)) => {
                // Some endpoints answer 204; fetch the object instead.
                let attributes = match object {
                    Value::Null => self.fetch(ctx, record).await,
                    object => normalize(&object),
                };
                match attributes {
                    Ok(attributes) => Outcome::present(Record {
                        config: desired.clone(),
                        attributes,
                        ..record.clone()
                    }),
                    Err(err) => Outcome::failed(Some(record.clone()), &record.address, err),
                }
            }
            Err(err @ ReconcileError::Conflict(_)) => {
                warn!(kind = %kind, id = %record.id, "Update conflicted, re-reading");
                let refreshed = self.read(ctx, record).await;
                let mut outcome = Outcome::failed(refreshed.record, &record.address, err);
                outcome.diagnostics.extend(refreshed.diagnostics);
                outcome
            }
            Err(err) => {
                error!(kind = %kind, id = %record.id, error = %err, "Update failed");
                Outcome::failed(Some(record.clone()), &record.address, err)
            }
        };
        walk.finish(outcome)
    }

    async fn delete(&self, ctx: &CallContext, record: &Record) -> Outcome {
        let kind = self.spec.kind();
        let mut walk = Walk::start(kind, &record.address, Lifecycle::Present);
        if let Err(err) = walk.enter(Lifecycle::Deleting) {
            return walk.finish(Outcome::failed(Some(record.clone()), &record.address, err));
        }
        info!(kind = %kind, id = %record.id, "Deleting");
        let result = ctx
            .run(
                "delete",
                self.facade
                    .delete(self.spec.remote_kind(), record.parent.as_deref(), &record.id),
            )
            .await
            .and_then(|r| r.map_err(ReconcileError::from));

        let result = match result {
            Ok(_) if self.spec.awaits_deletion() => self.await_deleted(ctx, record).await,
            Ok(_) => Ok(()),
            Err(err) => Err(err),
        };

        let outcome = match result {
            Ok(()) => Outcome::absent(),
            Err(err) if err.is_not_found() => {
                debug!(kind = %kind, id = %record.id, "Already deleted");
                Outcome::absent()
            }
            Err(err) => {
                error!(kind = %kind, id = %record.id, error = %err, "Delete failed");
                let mut outcome = Outcome::failed(Some(record.clone()), &record.address, err);
                outcome.diagnostics.push(
                    Diagnostic::error(
                        format!("{} was not deleted", kind),
                        format!(
                            "{} {} still exists remotely; re-apply the configuration to retry",
                            kind, record.id
                        ),
                    )
                    .at(&record.address),
                );
                outcome
            }
        };
        walk.finish(outcome)
    }
}

/// Schemas of every managed kind, in dependency order.
pub fn schemas() -> Vec<&'static Schema> {
    ResourceKind::MANAGED
        .iter()
        .filter_map(|kind| schema_of(*kind))
        .collect()
}

fn schema_of(kind: ResourceKind) -> Option<&'static Schema> {
    match kind {
        ResourceKind::Cluster => Some(&kafka::SCHEMA),
        ResourceKind::Topic => Some(&topic::SCHEMA),
        ResourceKind::ServiceAccount => Some(&service_account::SCHEMA),
        ResourceKind::Acl => Some(&acl::SCHEMA),
        _ => None,
    }
}

/// Reconcilers for every managed kind, sharing one facade.
pub struct Registry {
    reconcilers: HashMap<ResourceKind, Arc<dyn Reconciler>>,
}

impl Registry {
    pub fn new(facade: Arc<dyn RemoteFacade>, identities: Arc<IdentityAllocator>) -> Self {
        Self::with_options(facade, identities, ReconcilerOptions::default())
    }

    pub fn with_options(
        facade: Arc<dyn RemoteFacade>,
        identities: Arc<IdentityAllocator>,
        options: ReconcilerOptions,
    ) -> Self {
        let mut reconcilers: HashMap<ResourceKind, Arc<dyn Reconciler>> = HashMap::new();
        reconcilers.insert(
            ResourceKind::Cluster,
            Arc::new(ResourceReconciler::new(
                ClusterKind,
                Arc::clone(&facade),
                Arc::clone(&identities),
                options,
            )),
        );
        reconcilers.insert(
            ResourceKind::Topic,
            Arc::new(ResourceReconciler::new(
                TopicKind,
                Arc::clone(&facade),
                Arc::clone(&identities),
                options,
            )),
        );
        reconcilers.insert(
            ResourceKind::ServiceAccount,
            Arc::new(ResourceReconciler::new(
                ServiceAccountKind,
                Arc::clone(&facade),
                Arc::clone(&identities),
                options,
            )),
        );
        reconcilers.insert(
            ResourceKind::Acl,
            Arc::new(ResourceReconciler::new(AclKind, facade, identities, options)),
        );
        Self { reconcilers }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<Arc<dyn Reconciler>> {
        self.reconcilers.get(&kind).cloned()
    }
}
