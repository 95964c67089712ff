//! Deployment plan types and construction.
//!
//! A plan is computed fresh on every run from the loaded build output and a
//! snapshot of remote state. It is grouped per kind in deploy order and is
//! never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use super::diff::{DiffEngine, DiffResult};
use crate::build::BuiltResource;
use crate::error::{ModkitError, PlanError, Result};
use crate::platform::PlatformApi;
use crate::resources::{
    DescriptorRegistry, FolderKind, Identifier, ResourceDescriptor, ResourceKind, ResourceRecord,
};

/// Maximum ids per retrieve call.
pub const READ_BATCH: usize = 1000;

/// What a run does with the local resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Create or update local resources.
    Deploy,
    /// Delete local resources from the platform.
    Clean,
}

/// Options that shape a plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Whether remote-only resources in scope are scheduled for deletion.
    pub drop: bool,
    /// Folder kinds to include; empty includes every kind.
    pub include: Vec<FolderKind>,
}

impl PlanOptions {
    /// Returns true if `kind` is selected.
    #[must_use]
    pub fn includes(&self, kind: ResourceKind) -> bool {
        self.include.is_empty() || self.include.contains(&kind.folder())
    }
}

/// One planned resource.
#[derive(Debug, Clone, Serialize)]
pub struct PlanItem {
    /// Resource identifier.
    pub identifier: Identifier,
    /// Classification.
    pub diff: DiffResult,
    /// Local record, absent for remote-only deletions.
    #[serde(skip)]
    pub local: Option<ResourceRecord>,
    /// Remote record, absent for creations.
    #[serde(skip)]
    pub remote: Option<ResourceRecord>,
    /// Build output the local record was loaded from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
}

/// Remote state of a kind that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadFailure {
    /// The read error.
    pub message: String,
    /// Local resources of the kind, none of which is planned.
    pub identifiers: Vec<Identifier>,
}

/// Planned items of one kind.
#[derive(Debug, Clone, Serialize)]
pub struct KindPlan {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Items in identifier order. Empty when `read_failure` is set.
    pub items: Vec<PlanItem>,
    /// Set when remote state of the kind could not be read. The kind and the
    /// kinds depending on it are not executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_failure: Option<ReadFailure>,
}

impl KindPlan {
    /// Number of items with the given classification.
    #[must_use]
    pub fn count(&self, matches: impl Fn(&DiffResult) -> bool) -> usize {
        self.items.iter().filter(|i| matches(&i.diff)).count()
    }
}

/// A complete deployment plan.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Run mode.
    pub mode: Mode,
    /// Per-kind plans in deploy order.
    pub kinds: Vec<KindPlan>,
}

impl DeploymentPlan {
    /// Returns true if no item needs a call and every kind was read.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.iter().all(|k| {
            k.read_failure.is_none() && k.items.iter().all(|i| !i.diff.is_change())
        })
    }

    /// Total number of items with a change.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.kinds.iter().map(|k| k.count(DiffResult::is_change)).sum()
    }
}

/// Builds plans by reading remote state through a [`PlatformApi`].
#[derive(Debug)]
pub struct Planner<'a, P: ?Sized> {
    api: &'a P,
    registry: &'a DescriptorRegistry,
}

impl<'a, P: PlatformApi + ?Sized> Planner<'a, P> {
    /// Creates a planner.
    #[must_use]
    pub const fn new(api: &'a P, registry: &'a DescriptorRegistry) -> Self {
        Self { api, registry }
    }

    /// Plans `resources` for `mode`.
    ///
    /// Remote state is read with one retrieve per kind per batch of ids, plus
    /// one list per kind when a deploy drops remote-only resources. A kind
    /// whose remote state cannot be read or interpreted is planned as a
    /// [`ReadFailure`]; the other kinds are planned as usual.
    pub async fn plan(
        &self,
        resources: &[BuiltResource],
        mode: Mode,
        options: &PlanOptions,
    ) -> DeploymentPlan {
        let mut by_kind: BTreeMap<ResourceKind, Vec<&BuiltResource>> = BTreeMap::new();
        for resource in resources {
            let kind = resource.record.kind();
            if options.includes(kind) {
                by_kind.entry(kind).or_default().push(resource);
            }
        }

        let mut kinds = Vec::new();
        for (kind, mut locals) in by_kind {
            locals.sort_by(|a, b| a.identifier.cmp(&b.identifier));
            let kind_plan = match self.plan_kind(kind, &locals, mode, options).await {
                Ok(items) => {
                    info!(
                        "Planned {} {}: {} changes",
                        items.len(),
                        kind,
                        items.iter().filter(|i| i.diff.is_change()).count()
                    );
                    KindPlan {
                        kind,
                        items,
                        read_failure: None,
                    }
                }
                Err(e) => {
                    warn!("Cannot plan {kind}: {e}");
                    KindPlan {
                        kind,
                        items: Vec::new(),
                        read_failure: Some(ReadFailure {
                            message: e.to_string(),
                            identifiers: locals.iter().map(|r| r.identifier.clone()).collect(),
                        }),
                    }
                }
            };
            kinds.push(kind_plan);
        }

        DeploymentPlan {
            created_at: Utc::now(),
            mode,
            kinds,
        }
    }

    async fn plan_kind(
        &self,
        kind: ResourceKind,
        locals: &[&BuiltResource],
        mode: Mode,
        options: &PlanOptions,
    ) -> Result<Vec<PlanItem>> {
        let descriptor = self.registry.get(kind);
        let ids: Vec<Identifier> = locals.iter().map(|r| r.identifier.clone()).collect();
        let mut remote = self.retrieve(descriptor, &ids).await?;

        let mut items = Vec::with_capacity(locals.len());
        for local in locals {
            let found = remote.remove(&local.identifier);
            let diff = match mode {
                Mode::Deploy => DiffEngine::new(self.registry).diff(local, found.as_ref()),
                Mode::Clean if found.is_some() => DiffResult::ToDelete,
                Mode::Clean => {
                    debug!("{} does not exist, nothing to clean", local.identifier);
                    continue;
                }
            };
            items.push(PlanItem {
                identifier: local.identifier.clone(),
                diff,
                local: Some(local.record.clone()),
                remote: found,
                source: Some(local.source.clone()),
            });
        }

        if mode == Mode::Deploy && options.drop {
            items.extend(self.remote_only(descriptor, locals).await?);
        }
        Ok(items)
    }

    async fn retrieve(
        &self,
        descriptor: &dyn ResourceDescriptor,
        ids: &[Identifier],
    ) -> Result<BTreeMap<Identifier, ResourceRecord>> {
        let kind = descriptor.kind();
        let mut found = BTreeMap::new();
        for chunk in ids.chunks(READ_BATCH) {
            let items = self
                .api
                .retrieve(kind, chunk)
                .await
                .map_err(|e| read_failed(kind, &e))?;
            for item in items {
                let record = parse_remote(descriptor, item)?;
                found.insert(descriptor.identifier_of(&record), record);
            }
        }
        debug!("{} of {} {} exist remotely", found.len(), ids.len(), kind);
        Ok(found)
    }

    /// Remote records of the kind that are absent locally and share a scope
    /// key with the local records.
    async fn remote_only(
        &self,
        descriptor: &dyn ResourceDescriptor,
        locals: &[&BuiltResource],
    ) -> Result<Vec<PlanItem>> {
        let kind = descriptor.kind();
        let scopes: BTreeSet<String> = locals
            .iter()
            .filter_map(|r| r.record.as_resource().scope_key())
            .collect();
        if scopes.is_empty() {
            debug!("No drop scope for {kind}");
            return Ok(Vec::new());
        }
        let local_ids: BTreeSet<&Identifier> = locals.iter().map(|r| &r.identifier).collect();

        let listed = self
            .api
            .list(kind)
            .await
            .map_err(|e| read_failed(kind, &e))?;
        let mut items = Vec::new();
        for item in listed {
            let record = parse_remote(descriptor, item)?;
            let identifier = descriptor.identifier_of(&record);
            let in_scope = record
                .as_resource()
                .scope_key()
                .is_some_and(|key| scopes.contains(&key));
            if in_scope && !local_ids.contains(&identifier) {
                debug!("{identifier} exists only remotely");
                items.push(PlanItem {
                    identifier,
                    diff: DiffResult::ToDelete,
                    local: None,
                    remote: Some(record),
                    source: None,
                });
            }
        }
        items.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(items)
    }
}

fn parse_remote(
    descriptor: &dyn ResourceDescriptor,
    item: serde_json::Value,
) -> Result<ResourceRecord> {
    descriptor.from_remote(item).map_err(|e| {
        ModkitError::Plan(PlanError::InvalidRemoteRecord {
            kind: descriptor.kind().to_string(),
            message: e.to_string(),
        })
    })
}

fn read_failed(kind: ResourceKind, err: &ModkitError) -> ModkitError {
    ModkitError::Plan(PlanError::RemoteReadFailed {
        kind: kind.to_string(),
        message: err.to_string(),
    })
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Plan ({} changes):", self.change_count())?;
        for kind in &self.kinds {
            if let Some(failure) = &kind.read_failure {
                writeln!(f, "  {} not planned: {}", kind.kind, failure.message)?;
            }
            for item in kind.items.iter().filter(|i| i.diff.is_change()) {
                writeln!(f, "  {} {}", item.diff, item.identifier)?;
            }
        }
        Ok(())
    }
}
