//! Plan executor for applying deployment plans.
//!
//! Execution runs in two phases. Deletes go first in reverse deploy order,
//! then creates and updates in deploy order. Within a kind, calls carry at
//! most the kind's batch limit and are issued one after another. A failed
//! batch fails every item in it, and kinds that depend on a failed kind are
//! aborted instead of called. A kind whose remote state could not be read
//! counts as failed before any call is made.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

use super::diff::DiffResult;
use super::plan::{DeploymentPlan, KindPlan, Mode};
use crate::platform::PlatformApi;
use crate::resources::{Identifier, ResourceKind, ResourceRecord};

/// Options for one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecuteOptions {
    /// Run mode.
    pub mode: Mode,
    /// Drop changed resources and recreate them instead of updating in place.
    pub drop: bool,
    /// Allow deleting kinds that hold bulk data.
    pub drop_data: bool,
    /// Report what would happen without mutating calls.
    pub dry_run: bool,
}

impl ExecuteOptions {
    /// Options for `mode` with every flag off.
    #[must_use]
    pub const fn new(mode: Mode) -> Self {
        Self {
            mode,
            drop: false,
            drop_data: false,
            dry_run: false,
        }
    }
}

/// Per-kind outcome counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    /// Created resources.
    pub created: usize,
    /// Updated resources, including recreated ones.
    pub updated: usize,
    /// Deleted resources.
    pub deleted: usize,
    /// Resources already in the desired state.
    pub unchanged: usize,
    /// Resources left alone by policy or cancellation.
    pub skipped: usize,
}

impl KindCounts {
    fn add(&mut self, other: &Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
    }
}

/// A resource whose operation failed or was aborted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Resource identifier.
    pub identifier: Identifier,
    /// Error or causal message.
    pub message: String,
}

/// Result of executing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Run mode.
    pub mode: Mode,
    /// Whether no mutating call was issued.
    pub dry_run: bool,
    /// Whether execution stopped early.
    pub cancelled: bool,
    /// Outcome counts per kind.
    pub counts: BTreeMap<ResourceKind, KindCounts>,
    /// Failed resources in execution order.
    pub failures: Vec<ExecutionFailure>,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Finish time.
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    /// Returns true if any resource failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Counts summed over every kind.
    #[must_use]
    pub fn totals(&self) -> KindCounts {
        let mut totals = KindCounts::default();
        for counts in self.counts.values() {
            totals.add(counts);
        }
        totals
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteCall {
    Create,
    Update,
}

/// A delete. `recreate` deletes are followed by a create and are not counted
/// as deletions.
#[derive(Debug)]
struct DeleteOp {
    id: Identifier,
    recreate: bool,
}

#[derive(Debug)]
struct WriteOp {
    id: Identifier,
    item: Value,
    call: WriteCall,
    recreate: bool,
}

#[derive(Debug)]
struct KindOps {
    kind: ResourceKind,
    deletes: Vec<DeleteOp>,
    writes: Vec<WriteOp>,
}

/// Executor for deployment plans.
#[derive(Debug)]
pub struct PlanExecutor<'a, P: ?Sized> {
    api: &'a P,
    cancel: Arc<AtomicBool>,
}

/// Mutable state of one execution.
struct Run {
    report: ExecutionReport,
    /// Kinds with at least one failure or abort.
    failed_kinds: BTreeSet<ResourceKind>,
    /// Resources whose delete failed; their recreate is not attempted.
    failed_ids: BTreeSet<Identifier>,
}

impl Run {
    fn counts(&mut self, kind: ResourceKind) -> &mut KindCounts {
        self.report.counts.entry(kind).or_default()
    }

    fn fail(&mut self, kind: ResourceKind, id: &Identifier, message: impl Into<String>) {
        self.failed_kinds.insert(kind);
        self.report.failures.push(ExecutionFailure {
            kind,
            identifier: id.clone(),
            message: message.into(),
        });
    }
}

impl<'a, P: PlatformApi + ?Sized> PlanExecutor<'a, P> {
    /// Creates a new plan executor.
    #[must_use]
    pub fn new(api: &'a P) -> Self {
        Self {
            api,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` as the cancellation signal, checked before every batch.
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Executes a deployment plan.
    ///
    /// Never fails as a whole: every failed resource is recorded in the
    /// report.
    pub async fn execute(&self, plan: &DeploymentPlan, options: &ExecuteOptions) -> ExecutionReport {
        info!(
            "Executing {} plan with {} changes{}",
            match options.mode {
                Mode::Deploy => "deploy",
                Mode::Clean => "clean",
            },
            plan.change_count(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let mut run = Run {
            report: ExecutionReport {
                mode: options.mode,
                dry_run: options.dry_run,
                cancelled: false,
                counts: BTreeMap::new(),
                failures: Vec::new(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
            },
            failed_kinds: BTreeSet::new(),
            failed_ids: BTreeSet::new(),
        };

        let ops: Vec<KindOps> = plan
            .kinds
            .iter()
            .map(|kind_plan| Self::classify(kind_plan, options, &mut run))
            .collect();

        // Phase 1: deletes, dependents first.
        let mut failed_deletes: BTreeSet<ResourceKind> = plan
            .kinds
            .iter()
            .filter(|k| k.read_failure.is_some())
            .map(|k| k.kind)
            .collect();
        for kind_ops in ops.iter().rev().filter(|o| !o.deletes.is_empty()) {
            let kind = kind_ops.kind;
            let blocked = failed_deletes
                .iter()
                .find(|downstream| depends_on(**downstream, kind))
                .copied();
            if let Some(downstream) = blocked {
                warn!("Not deleting {kind}: {downstream} had failures");
                for op in &kind_ops.deletes {
                    run.fail(
                        kind,
                        &op.id,
                        format!("aborted: dependent {downstream} had failures"),
                    );
                    run.failed_ids.insert(op.id.clone());
                }
                failed_deletes.insert(kind);
                continue;
            }
            if !self.delete_kind(kind_ops, options, &mut run).await {
                failed_deletes.insert(kind);
            }
        }

        // Phase 2: creates and updates, dependencies first.
        for kind_ops in ops.iter().filter(|o| !o.writes.is_empty()) {
            let kind = kind_ops.kind;
            let blocked = run
                .failed_kinds
                .iter()
                .find(|upstream| **upstream != kind && depends_on(kind, **upstream))
                .copied();
            if let Some(upstream) = blocked {
                warn!("Not writing {kind}: {upstream} had failures");
                for op in &kind_ops.writes {
                    if !run.failed_ids.contains(&op.id) {
                        run.fail(kind, &op.id, format!("aborted: {upstream} had failures"));
                    }
                }
                continue;
            }
            self.write_kind(kind_ops, options, &mut run).await;
        }

        run.report.finished_at = Utc::now();
        let totals = run.report.totals();
        info!(
            "Created {}, updated {}, deleted {}, unchanged {}, skipped {}, failed {}",
            totals.created,
            totals.updated,
            totals.deleted,
            totals.unchanged,
            totals.skipped,
            run.report.failures.len()
        );
        run.report
    }

    /// Turns plan items into delete and write operations, counting the items
    /// that need no call.
    fn classify(kind_plan: &KindPlan, options: &ExecuteOptions, run: &mut Run) -> KindOps {
        let kind = kind_plan.kind;
        let mut ops = KindOps {
            kind,
            deletes: Vec::new(),
            writes: Vec::new(),
        };
        if let Some(failure) = &kind_plan.read_failure {
            error!("Skipping {kind}: {}", failure.message);
            for id in &failure.identifiers {
                run.fail(
                    kind,
                    id,
                    format!("not executed: remote state unreadable: {}", failure.message),
                );
            }
            return ops;
        }
        let may_delete = kind.deletable() && (!kind.holds_data() || options.drop_data);

        for item in &kind_plan.items {
            let local = item.local.as_ref().map(ResourceRecord::to_json);
            match (&item.diff, local) {
                (DiffResult::Unchanged, _) => run.counts(kind).unchanged += 1,
                (DiffResult::ToCreate, Some(local)) => ops.writes.push(WriteOp {
                    id: item.identifier.clone(),
                    item: local,
                    call: WriteCall::Create,
                    recreate: false,
                }),
                (DiffResult::ToUpdate(_), Some(local)) => {
                    let recreate = (options.drop || kind.recreate_on_change()) && may_delete;
                    if recreate {
                        ops.deletes.push(DeleteOp {
                            id: item.identifier.clone(),
                            recreate: true,
                        });
                    }
                    ops.writes.push(WriteOp {
                        id: item.identifier.clone(),
                        item: local,
                        call: if recreate {
                            WriteCall::Create
                        } else {
                            WriteCall::Update
                        },
                        recreate,
                    });
                }
                (DiffResult::ToDelete, _) if !kind.deletable() => {
                    warn!("{} is never deleted by this tool", item.identifier);
                    run.counts(kind).skipped += 1;
                }
                (DiffResult::ToDelete, _) if !may_delete => {
                    warn!("{} holds data; pass --drop-data to delete it", item.identifier);
                    run.counts(kind).skipped += 1;
                }
                (DiffResult::ToDelete, _) => ops.deletes.push(DeleteOp {
                    id: item.identifier.clone(),
                    recreate: false,
                }),
                (DiffResult::ToCreate | DiffResult::ToUpdate(_), None) => {
                    run.fail(kind, &item.identifier, "no local record to write");
                }
            }
        }
        ops
    }

    /// Returns false if any delete of the kind failed.
    async fn delete_kind(&self, ops: &KindOps, options: &ExecuteOptions, run: &mut Run) -> bool {
        let kind = ops.kind;
        let mut ok = true;
        for batch in ops.deletes.chunks(kind.batch_limit()) {
            if self.is_cancelled(run) {
                run.counts(kind).skipped += batch.len();
                continue;
            }
            let ids: Vec<Identifier> = batch.iter().map(|op| op.id.clone()).collect();
            let result = if options.dry_run {
                debug!("Would delete {} {kind}", ids.len());
                Ok(())
            } else {
                self.api.delete(kind, &ids).await
            };
            match result {
                Ok(()) => {
                    let deleted = batch.iter().filter(|op| !op.recreate).count();
                    run.counts(kind).deleted += deleted;
                }
                Err(e) => {
                    error!("Failed to delete {} {kind}: {e}", ids.len());
                    ok = false;
                    for id in ids {
                        run.fail(kind, &id, e.to_string());
                        run.failed_ids.insert(id);
                    }
                }
            }
        }
        ok
    }

    async fn write_kind(&self, ops: &KindOps, options: &ExecuteOptions, run: &mut Run) {
        let kind = ops.kind;
        for call in [WriteCall::Create, WriteCall::Update] {
            let pending: Vec<&WriteOp> = ops
                .writes
                .iter()
                .filter(|op| op.call == call && !run.failed_ids.contains(&op.id))
                .collect();
            for batch in pending.chunks(kind.batch_limit()) {
                if self.is_cancelled(run) {
                    run.counts(kind).skipped += batch.len();
                    continue;
                }
                let items: Vec<Value> = batch.iter().map(|op| op.item.clone()).collect();
                let result = if options.dry_run {
                    debug!("Would {call:?} {} {kind}", items.len());
                    Ok(Vec::new())
                } else {
                    match call {
                        WriteCall::Create => self.api.create(kind, &items).await,
                        WriteCall::Update => self.api.update(kind, &items).await,
                    }
                };
                match result {
                    Ok(_) => {
                        let counts = run.counts(kind);
                        for op in batch {
                            match (op.call, op.recreate) {
                                (WriteCall::Create, false) => counts.created += 1,
                                _ => counts.updated += 1,
                            }
                        }
                    }
                    Err(e) => {
                        error!("Failed to {call:?} {} {kind}: {e}", items.len());
                        for op in batch {
                            run.fail(kind, &op.id, e.to_string());
                        }
                    }
                }
            }
        }
    }

    fn is_cancelled(&self, run: &mut Run) -> bool {
        let cancelled = self.cancel.load(Ordering::SeqCst);
        if cancelled && !run.report.cancelled {
            warn!("Cancelled; remaining batches are skipped");
            run.report.cancelled = true;
        }
        cancelled
    }
}

/// Returns true if `kind` references `upstream`, directly or transitively.
fn depends_on(kind: ResourceKind, upstream: ResourceKind) -> bool {
    kind.upstream()
        .iter()
        .any(|u| *u == upstream || depends_on(*u, upstream))
}

impl std::fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let totals = self.totals();
        write!(
            f,
            "{} created, {} updated, {} deleted, {} unchanged, {} skipped, {} failed",
            totals.created,
            totals.updated,
            totals.deleted,
            totals.unchanged,
            totals.skipped,
            self.failures.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuiltResource;
    use crate::planner::plan::{PlanOptions, Planner};
    use crate::platform::memory::{Call, InMemoryPlatform};
    use crate::resources::DescriptorRegistry;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn built(kind: ResourceKind, value: serde_json::Value) -> BuiltResource {
        let record = ResourceRecord::from_json(kind, value).unwrap();
        BuiltResource {
            identifier: record.identifier(),
            dependencies: BTreeSet::new(),
            record,
            source: PathBuf::from("out.yaml"),
            module: String::from("m"),
            issues: Vec::new(),
        }
    }

    async fn run(
        platform: &InMemoryPlatform,
        resources: &[BuiltResource],
        options: ExecuteOptions,
    ) -> ExecutionReport {
        let registry = DescriptorRegistry::new();
        let plan_options = PlanOptions {
            drop: options.drop,
            include: Vec::new(),
        };
        let plan = Planner::new(platform, &registry)
            .plan(resources, options.mode, &plan_options)
            .await;
        PlanExecutor::new(platform).execute(&plan, &options).await
    }

    #[tokio::test]
    async fn test_dataset_created_before_transformation() {
        let platform = InMemoryPlatform::new();
        let resources = vec![
            built(
                ResourceKind::Transformation,
                json!({"externalId": "tr", "name": "T", "dataSetExternalId": "ds_1"}),
            ),
            built(ResourceKind::DataSet, json!({"externalId": "ds_1"})),
        ];
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;

        assert_eq!(
            platform.mutating_calls(),
            vec![
                Call::Create(ResourceKind::DataSet, vec![Identifier::data_set("ds_1")]),
                Call::Create(
                    ResourceKind::Transformation,
                    vec![Identifier::Transformation {
                        external_id: String::from("tr")
                    }]
                ),
            ]
        );
        assert_eq!(report.totals().created, 2);
        assert!(!report.has_failures());
    }

    #[tokio::test]
    async fn test_second_deploy_is_unchanged() {
        let platform = InMemoryPlatform::new();
        let resources = vec![built(ResourceKind::DataSet, json!({"externalId": "ds_1"}))];
        run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;

        assert_eq!(report.counts[&ResourceKind::DataSet].unchanged, 1);
        assert_eq!(platform.mutating_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_clean_dry_run_issues_no_deletes() {
        let platform = InMemoryPlatform::new()
            .with(ResourceKind::TimeSeries, json!({"externalId": "ts_1"}));
        let resources = vec![built(ResourceKind::TimeSeries, json!({"externalId": "ts_1"}))];
        let options = ExecuteOptions {
            drop_data: true,
            dry_run: true,
            ..ExecuteOptions::new(Mode::Clean)
        };
        let report = run(&platform, &resources, options).await;

        assert_eq!(report.counts[&ResourceKind::TimeSeries].deleted, 1);
        assert!(platform.mutating_calls().is_empty());
        assert!(platform.contains(&Identifier::TimeSeries {
            external_id: String::from("ts_1")
        }));
    }

    #[tokio::test]
    async fn test_clean_keeps_data_without_drop_data() {
        let platform = InMemoryPlatform::new()
            .with(ResourceKind::TimeSeries, json!({"externalId": "ts_1"}))
            .with(ResourceKind::Transformation, json!({"externalId": "tr", "name": "T"}));
        let resources = vec![
            built(ResourceKind::TimeSeries, json!({"externalId": "ts_1"})),
            built(ResourceKind::Transformation, json!({"externalId": "tr", "name": "T"})),
        ];
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Clean)).await;

        assert_eq!(report.counts[&ResourceKind::TimeSeries].skipped, 1);
        assert_eq!(report.counts[&ResourceKind::Transformation].deleted, 1);
        assert_eq!(
            platform.mutating_calls(),
            vec![Call::Delete(
                ResourceKind::Transformation,
                vec![Identifier::Transformation {
                    external_id: String::from("tr")
                }]
            )]
        );
    }

    #[tokio::test]
    async fn test_clean_dry_run_reports_data_kinds_as_skipped() {
        let platform = InMemoryPlatform::new()
            .with(ResourceKind::TimeSeries, json!({"externalId": "ts_1"}));
        let resources = vec![built(ResourceKind::TimeSeries, json!({"externalId": "ts_1"}))];
        let options = ExecuteOptions {
            dry_run: true,
            ..ExecuteOptions::new(Mode::Clean)
        };
        let report = run(&platform, &resources, options).await;

        let counts = report.counts[&ResourceKind::TimeSeries];
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.deleted, 0);
        assert!(report.dry_run);
        assert!(!report.has_failures());
        assert!(platform.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_data_sets_are_never_deleted() {
        let platform =
            InMemoryPlatform::new().with(ResourceKind::DataSet, json!({"externalId": "ds_1"}));
        let resources = vec![built(ResourceKind::DataSet, json!({"externalId": "ds_1"}))];
        let options = ExecuteOptions {
            drop_data: true,
            ..ExecuteOptions::new(Mode::Clean)
        };
        let report = run(&platform, &resources, options).await;

        assert_eq!(report.counts[&ResourceKind::DataSet].skipped, 1);
        assert!(platform.mutating_calls().is_empty());
    }

    #[tokio::test]
    async fn test_upstream_failure_aborts_dependents() {
        let platform = InMemoryPlatform::new().failing(ResourceKind::DataSet);
        let resources = vec![
            built(ResourceKind::DataSet, json!({"externalId": "ds_1"})),
            built(ResourceKind::RawDatabase, json!({"dbName": "db"})),
            built(
                ResourceKind::Transformation,
                json!({"externalId": "tr", "name": "T", "dataSetExternalId": "ds_1"}),
            ),
        ];
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].kind, ResourceKind::DataSet);
        assert_eq!(report.failures[1].kind, ResourceKind::Transformation);
        assert!(report.failures[1].message.contains("aborted"));
        assert_eq!(report.counts[&ResourceKind::RawDatabase].created, 1);
        assert!(!platform
            .mutating_calls()
            .iter()
            .any(|c| matches!(c, Call::Create(ResourceKind::Transformation, _))));
    }

    #[tokio::test]
    async fn test_failed_kind_leaves_siblings_running() {
        let platform = InMemoryPlatform::new().failing(ResourceKind::Container);
        let resources = vec![
            built(ResourceKind::Space, json!({"space": "sp"})),
            built(ResourceKind::Container, json!({"space": "sp", "externalId": "Pump"})),
            built(
                ResourceKind::View,
                json!({"space": "sp", "externalId": "Pump", "version": "v1"}),
            ),
            built(
                ResourceKind::DataModel,
                json!({"space": "sp", "externalId": "Plant", "version": "v1"}),
            ),
            built(ResourceKind::DataSet, json!({"externalId": "ds_1"})),
            built(ResourceKind::TimeSeries, json!({"externalId": "ts_1"})),
        ];
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;

        let created: Vec<ResourceKind> = platform
            .mutating_calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(kind, _) => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            created,
            vec![
                ResourceKind::Space,
                ResourceKind::DataSet,
                ResourceKind::Container,
                ResourceKind::TimeSeries,
            ]
        );
        let failed: Vec<(ResourceKind, bool)> = report
            .failures
            .iter()
            .map(|f| (f.kind, f.message.starts_with("aborted")))
            .collect();
        assert_eq!(
            failed,
            vec![
                (ResourceKind::Container, false),
                (ResourceKind::View, true),
                (ResourceKind::DataModel, true),
            ]
        );
        assert_eq!(report.counts[&ResourceKind::TimeSeries].created, 1);
        assert_eq!(report.counts[&ResourceKind::Space].created, 1);
    }

    #[tokio::test]
    async fn test_unreadable_kind_skips_only_its_subtree() {
        let platform = InMemoryPlatform::new().unreadable(ResourceKind::RawDatabase);
        let resources = vec![
            built(ResourceKind::RawDatabase, json!({"dbName": "db"})),
            built(ResourceKind::RawTable, json!({"dbName": "db", "tableName": "t"})),
            built(ResourceKind::DataSet, json!({"externalId": "ds_1"})),
            built(ResourceKind::TimeSeries, json!({"externalId": "ts_1"})),
        ];
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].kind, ResourceKind::RawDatabase);
        assert!(report.failures[0].message.contains("unreadable"));
        assert!(report.failures[0].message.contains("raw databases unavailable"));
        assert_eq!(report.failures[1].kind, ResourceKind::RawTable);
        assert!(report.failures[1].message.contains("aborted: raw databases"));
        assert_eq!(report.counts[&ResourceKind::DataSet].created, 1);
        assert_eq!(report.counts[&ResourceKind::TimeSeries].created, 1);
        assert!(platform.mutating_calls().iter().all(|c| matches!(
            c,
            Call::Create(ResourceKind::DataSet | ResourceKind::TimeSeries, _)
        )));
    }

    #[tokio::test]
    async fn test_unreadable_dependent_blocks_upstream_deletes() {
        let platform = InMemoryPlatform::new()
            .with(ResourceKind::RawDatabase, json!({"dbName": "db"}))
            .with(ResourceKind::RawTable, json!({"dbName": "db", "tableName": "t"}))
            .unreadable(ResourceKind::RawTable);
        let resources = vec![
            built(ResourceKind::RawDatabase, json!({"dbName": "db"})),
            built(ResourceKind::RawTable, json!({"dbName": "db", "tableName": "t"})),
        ];
        let options = ExecuteOptions {
            drop_data: true,
            ..ExecuteOptions::new(Mode::Clean)
        };
        let report = run(&platform, &resources, options).await;

        assert!(platform.mutating_calls().is_empty());
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].kind, ResourceKind::RawTable);
        assert_eq!(report.failures[1].kind, ResourceKind::RawDatabase);
        assert!(report.failures[1].message.contains("aborted"));
    }

    #[tokio::test]
    async fn test_changed_group_is_recreated_whole() {
        let platform = InMemoryPlatform::new().with(
            ResourceKind::Group,
            json!({"name": "readers", "id": 7, "capabilities": [{"datasetsAcl": {"actions": ["READ"], "scope": {"all": {}}}}]}),
        );
        let resources = vec![built(
            ResourceKind::Group,
            json!({"name": "readers", "capabilities": [
                {"datasetsAcl": {"actions": ["READ"], "scope": {"all": {}}}},
                {"timeSeriesAcl": {"actions": ["READ"], "scope": {"datasetScope": {"ids": ["ds_1"]}}}}
            ]}),
        )];
        let report = run(&platform, &resources, ExecuteOptions::new(Mode::Deploy)).await;

        let group = Identifier::Group {
            name: String::from("readers"),
        };
        assert_eq!(
            platform.mutating_calls(),
            vec![
                Call::Delete(ResourceKind::Group, vec![group.clone()]),
                Call::Create(ResourceKind::Group, vec![group]),
            ]
        );
        assert_eq!(report.counts[&ResourceKind::Group].updated, 1);
    }

    #[tokio::test]
    async fn test_changed_data_kind_updates_without_drop_data() {
        let platform = InMemoryPlatform::new().with(
            ResourceKind::TimeSeries,
            json!({"externalId": "ts_1", "name": "old"}),
        );
        let resources = vec![built(
            ResourceKind::TimeSeries,
            json!({"externalId": "ts_1", "name": "new"}),
        )];
        let options = ExecuteOptions {
            drop: true,
            ..ExecuteOptions::new(Mode::Deploy)
        };
        let report = run(&platform, &resources, options).await;

        assert!(matches!(
            platform.mutating_calls().as_slice(),
            [Call::Update(ResourceKind::TimeSeries, _)]
        ));
        assert_eq!(report.counts[&ResourceKind::TimeSeries].updated, 1);
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_remaining_batches() {
        let platform = InMemoryPlatform::new();
        let resources = vec![
            built(ResourceKind::DataSet, json!({"externalId": "ds_1"})),
            built(ResourceKind::TimeSeries, json!({"externalId": "ts_1"})),
        ];
        let registry = DescriptorRegistry::new();
        let plan = Planner::new(&platform, &registry)
            .plan(&resources, Mode::Deploy, &PlanOptions::default())
            .await;
        let flag = Arc::new(AtomicBool::new(true));
        let report = PlanExecutor::new(&platform)
            .with_cancel(flag)
            .execute(&plan, &ExecuteOptions::new(Mode::Deploy))
            .await;

        assert!(report.cancelled);
        assert_eq!(report.totals().skipped, 2);
        assert!(platform.mutating_calls().is_empty());
    }
}
