//! Reconciliation pass: brings every declared resource in line with its
//! remote object and prunes what is no longer declared.
//!
//! Resources run in dependency tiers (clusters and service accounts, then
//! topics and ACLs). Within a tier reconciliations run concurrently, up to
//! the configured limit. Pruning walks the tiers in reverse so dependents
//! go first.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use serde::Serialize;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::context::CallContext;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::reconciler::{Outcome, Reconciler, Registry};
use crate::resource::{DeclaredResource, Record};

/// What happened to one address during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    Created,
    Updated,
    Replaced,
    Deleted,
    Unchanged,
    Failed,
}

#[derive(Debug)]
struct Step {
    address: String,
    change: Change,
    outcome: Outcome,
}

/// Per-pass counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub failed: usize,
}

impl PassSummary {
    fn count(&mut self, change: Change) {
        match change {
            Change::Created => self.created += 1,
            Change::Updated => self.updated += 1,
            Change::Replaced => self.replaced += 1,
            Change::Deleted => self.deleted += 1,
            Change::Unchanged => self.unchanged += 1,
            Change::Failed => self.failed += 1,
        }
    }
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} updated, {} replaced, {} deleted, {} unchanged, {} failed",
            self.created, self.updated, self.replaced, self.deleted, self.unchanged, self.failed
        )
    }
}

/// Records to persist after a pass, plus everything it reported.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub records: BTreeMap<String, Record>,
    pub diagnostics: Diagnostics,
    pub summary: PassSummary,
}

impl PassReport {
    pub fn is_ok(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

pub struct ReconcilePass {
    registry: Arc<Registry>,
    concurrency: usize,
}

impl ReconcilePass {
    pub const DEFAULT_CONCURRENCY: usize = 4;

    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            concurrency: Self::DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Reconcile `declared` against the records of the previous pass.
    pub async fn apply(
        &self,
        ctx: &CallContext,
        declared: &[DeclaredResource],
        prior: BTreeMap<String, Record>,
    ) -> PassReport {
        let pass_id = Uuid::new_v4();
        let span = info_span!("pass", pass_id = %pass_id);
        self.run(ctx, declared, prior).instrument(span).await
    }

    /// Delete every tracked object.
    pub async fn destroy(&self, ctx: &CallContext, prior: BTreeMap<String, Record>) -> PassReport {
        self.apply(ctx, &[], prior).await
    }

    async fn run(
        &self,
        ctx: &CallContext,
        declared: &[DeclaredResource],
        prior: BTreeMap<String, Record>,
    ) -> PassReport {
        info!(
            declared = declared.len(),
            tracked = prior.len(),
            "Starting reconciliation pass"
        );
        let mut report = PassReport::default();

        let (valid, declared_addresses) = self.check_declarations(declared, &prior, &mut report);

        // 1. Refresh
        let (mut records, stale) = self.refresh(ctx, prior, &mut report).await;

        // 2. Create, update or replace, tier by tier
        let mut tiers: BTreeMap<usize, Vec<&DeclaredResource>> = BTreeMap::new();
        for decl in valid {
            tiers.entry(decl.kind.tier()).or_default().push(decl);
        }
        for (tier, decls) in tiers {
            debug!(tier, count = decls.len(), "Reconciling tier");
            let steps: Vec<Step> = {
                let resolver = &records;
                stream::iter(
                    decls
                        .into_iter()
                        .filter(|d| !stale.contains(&d.address))
                        .map(|d| self.reconcile_one(ctx, d, resolver)),
                )
                .buffer_unordered(self.concurrency)
                .collect()
                .await
            };
            Self::merge(steps, &mut records, &mut report);
        }
        for address in &stale {
            report.summary.count(Change::Failed);
            debug!(address = %address, "Skipped after failed refresh");
        }

        // 3. Prune, dependents first
        let mut orphans: BTreeMap<usize, Vec<Record>> = BTreeMap::new();
        for record in records.values() {
            if !declared_addresses.contains(&record.address) {
                orphans
                    .entry(record.kind.tier())
                    .or_default()
                    .push(record.clone());
            }
        }
        for (tier, orphans) in orphans.into_iter().rev() {
            debug!(tier, count = orphans.len(), "Pruning tier");
            let steps: Vec<Step> = stream::iter(orphans.into_iter().map(|r| self.prune_one(ctx, r)))
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            Self::merge(steps, &mut records, &mut report);
        }

        report.records = records;
        info!(
            summary = %report.summary,
            errors = report.diagnostics.errors().count(),
            warnings = report.diagnostics.warnings().count(),
            "Reconciliation pass finished"
        );
        report
    }

    /// Declarations that can be reconciled, plus every declared address.
    fn check_declarations<'a>(
        &self,
        declared: &'a [DeclaredResource],
        prior: &BTreeMap<String, Record>,
        report: &mut PassReport,
    ) -> (Vec<&'a DeclaredResource>, HashSet<String>) {
        let mut seen = HashSet::new();
        let mut duplicates = BTreeSet::new();
        for decl in declared {
            if !seen.insert(decl.address.clone()) {
                duplicates.insert(decl.address.clone());
            }
        }
        for address in &duplicates {
            report.diagnostics.push(
                Diagnostic::error(
                    "duplicate declaration",
                    format!("address '{}' is declared more than once", address),
                )
                .at(address),
            );
        }

        let mut valid = Vec::new();
        for decl in declared {
            if duplicates.contains(&decl.address) {
                continue;
            }
            if decl.kind.is_read_only() || self.registry.get(decl.kind).is_none() {
                report.diagnostics.push(
                    Diagnostic::error(
                        "unsupported resource kind",
                        format!("{} has no managed lifecycle", decl.kind.type_name()),
                    )
                    .at(&decl.address),
                );
                continue;
            }
            if let Some(record) = prior.get(&decl.address).filter(|r| r.kind != decl.kind) {
                report.diagnostics.push(
                    Diagnostic::error(
                        "address already in use",
                        format!(
                            "'{}' tracks a {}; remove it before declaring a {} there",
                            decl.address,
                            record.kind.type_name(),
                            decl.kind.type_name()
                        ),
                    )
                    .at(&decl.address),
                );
                continue;
            }
            valid.push(decl);
        }
        (valid, seen)
    }

    /// Re-read every tracked object. Returns the surviving records and the
    /// addresses whose state could not be refreshed.
    async fn refresh(
        &self,
        ctx: &CallContext,
        prior: BTreeMap<String, Record>,
        report: &mut PassReport,
    ) -> (BTreeMap<String, Record>, HashSet<String>) {
        let mut records = BTreeMap::new();
        let mut reads = Vec::new();
        for (address, record) in prior {
            match self.registry.get(record.kind) {
                Some(reconciler) => reads.push((reconciler, record)),
                None => {
                    warn!(address = %address, kind = %record.kind, "Dropping record of unmanaged kind");
                    report.diagnostics.push(
                        Diagnostic::warning(
                            "record dropped",
                            format!("{} is not a managed kind", record.kind.type_name()),
                        )
                        .at(&address),
                    );
                }
            }
        }

        let mut outcomes: Vec<(String, Outcome)> = stream::iter(reads.into_iter().map(
            |(reconciler, record)| async move {
                let outcome = reconciler.read(ctx, &record).await;
                (record.address, outcome)
            },
        ))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut stale = HashSet::new();
        for (address, outcome) in outcomes {
            if outcome.failure.is_some() && outcome.record.is_some() {
                stale.insert(address.clone());
            }
            if let Some(record) = outcome.record {
                records.insert(address, record);
            }
            report.diagnostics.extend(outcome.diagnostics);
        }
        (records, stale)
    }

    async fn reconcile_one(
        &self,
        ctx: &CallContext,
        decl: &DeclaredResource,
        resolver: &BTreeMap<String, Record>,
    ) -> Step {
        let address = decl.address.clone();
        let Some(reconciler) = self.registry.get(decl.kind) else {
            return Step {
                address,
                change: Change::Failed,
                outcome: Outcome::absent().with(
                    Diagnostic::error("unsupported resource kind", decl.kind.type_name())
                        .at(&decl.address),
                ),
            };
        };

        let Some(record) = resolver.get(&decl.address) else {
            let outcome = reconciler.create(ctx, decl, resolver).await;
            let change = if outcome.record.is_some() && outcome.is_ok() {
                Change::Created
            } else {
                Change::Failed
            };
            return Step {
                address,
                change,
                outcome,
            };
        };

        let desired = match reconciler.resolve(decl, resolver) {
            Ok(desired) => desired,
            Err(err) => {
                warn!(address = %decl.address, error = %err, "Rejected declaration");
                return Step {
                    address,
                    change: Change::Failed,
                    outcome: Outcome::failed(Some(record.clone()), &decl.address, err),
                };
            }
        };

        let diff = reconciler.diff(record, &desired);
        if diff.is_empty() {
            let record = Record {
                config: desired,
                ..record.clone()
            };
            return Step {
                address,
                change: Change::Unchanged,
                outcome: Outcome::present(record),
            };
        }

        if diff.needs_replacement() {
            return self
                .replace(ctx, reconciler.as_ref(), decl, record, resolver, &diff.replace)
                .await;
        }

        let outcome = reconciler.update(ctx, record, &desired, &diff).await;
        let change = if outcome.is_ok() {
            Change::Updated
        } else {
            Change::Failed
        };
        Step {
            address,
            change,
            outcome,
        }
    }

    async fn replace(
        &self,
        ctx: &CallContext,
        reconciler: &dyn Reconciler,
        decl: &DeclaredResource,
        record: &Record,
        resolver: &BTreeMap<String, Record>,
        fields: &[String],
    ) -> Step {
        info!(address = %decl.address, id = %record.id, fields = ?fields, "Replacing");
        let address = decl.address.clone();
        let deleted = reconciler.delete(ctx, record).await;
        if deleted.record.is_some() {
            return Step {
                address,
                change: Change::Failed,
                outcome: deleted,
            };
        }

        let mut outcome = reconciler.create(ctx, decl, resolver).await;
        let mut diagnostics = deleted.diagnostics;
        diagnostics.extend(outcome.diagnostics);
        outcome.diagnostics = diagnostics;
        let change = if outcome.record.is_some() && outcome.is_ok() {
            Change::Replaced
        } else {
            Change::Failed
        };
        Step {
            address,
            change,
            outcome,
        }
    }

    async fn prune_one(&self, ctx: &CallContext, record: Record) -> Step {
        info!(address = %record.address, kind = %record.kind, id = %record.id, "Pruning");
        let address = record.address.clone();
        let outcome = match self.registry.get(record.kind) {
            Some(reconciler) => reconciler.delete(ctx, &record).await,
            None => Outcome::present(record),
        };
        let change = if outcome.record.is_none() {
            Change::Deleted
        } else {
            Change::Failed
        };
        Step {
            address,
            change,
            outcome,
        }
    }

    fn merge(mut steps: Vec<Step>, records: &mut BTreeMap<String, Record>, report: &mut PassReport) {
        steps.sort_by(|a, b| a.address.cmp(&b.address));
        for step in steps {
            report.summary.count(step.change);
            match step.outcome.record {
                Some(record) => {
                    records.insert(step.address, record);
                }
                None => {
                    records.remove(&step.address);
                }
            }
            report.diagnostics.extend(step.outcome.diagnostics);
        }
    }
}
