//! Missing-dependency validation.
//!
//! Every dependency recorded during the build must be defined by the build
//! itself, live in a platform-owned namespace, or exist on the platform.
//! Nothing found here blocks the build: deploy is the enforcement point.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::context::BuildContext;
use super::issue::{BuildIssue, IssueCode};
use crate::platform::ResourceLookup;
use crate::resources::Identifier;

/// Checks the dependency index of a build.
pub struct DependencyValidator<'a> {
    lookup: Option<&'a dyn ResourceLookup>,
}

impl std::fmt::Debug for DependencyValidator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyValidator")
            .field("live_lookup", &self.lookup.is_some())
            .finish()
    }
}

impl<'a> DependencyValidator<'a> {
    /// Creates a validator, optionally backed by a live lookup.
    #[must_use]
    pub fn new(lookup: Option<&'a dyn ResourceLookup>) -> Self {
        Self { lookup }
    }

    /// Missing identifiers mapped to every resource that requires them.
    #[must_use]
    pub fn missing(ctx: &BuildContext) -> BTreeMap<Identifier, BTreeSet<Identifier>> {
        let mut missing: BTreeMap<Identifier, BTreeSet<Identifier>> = BTreeMap::new();
        for (owner, deps) in ctx.dependencies() {
            for dep in deps {
                if ctx.contains(dep) {
                    continue;
                }
                if dep.is_platform_reserved() {
                    debug!("{owner} depends on platform-owned {dep}");
                    continue;
                }
                missing.entry(dep.clone()).or_default().insert(owner.clone());
            }
        }
        missing
    }

    /// Returns one issue per missing dependency.
    pub async fn validate(&self, ctx: &BuildContext) -> Vec<BuildIssue> {
        let missing = Self::missing(ctx);
        info!("{} dependencies not defined in the build", missing.len());

        let mut issues = Vec::new();
        for (dep, owners) in missing {
            let required_by = owners
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            let location = owners.first().and_then(|o| ctx.source_of(o)).map(ToOwned::to_owned);

            let issue = match self.lookup {
                None => BuildIssue::warning(
                    IssueCode::DEP_001,
                    format!("{dep} is not defined in the build; required by {required_by}"),
                )
                .with_suggestion("Add it to a module, or run with --verify to check the platform"),
                Some(lookup) => match lookup.exists(&dep).await {
                    Ok(true) => continue,
                    Ok(false) => BuildIssue::warning(
                        IssueCode::DEP_002,
                        format!("{dep} does not exist on the platform; required by {required_by}"),
                    )
                    .with_suggestion("Add it to a module or create it before deploying"),
                    Err(e) => BuildIssue::warning(
                        IssueCode::DEP_002,
                        format!("{dep} could not be verified ({e}); required by {required_by}"),
                    ),
                },
            };
            issues.push(match location {
                Some(path) => issue.at(path),
                None => issue,
            });
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::builder::{BuiltFile, BuiltResource};
    use crate::build::variables::VariableScope;
    use crate::error::{ModkitError, PlatformError};
    use crate::platform::MockResourceLookup;
    use crate::resources::{ResourceKind, ResourceRecord};
    use std::path::PathBuf;

    fn context(yaml_records: &[(ResourceKind, &str)]) -> BuildContext {
        let mut ctx = BuildContext::new(VariableScope::default());
        for (i, (kind, yaml)) in yaml_records.iter().enumerate() {
            let record =
                ResourceRecord::from_yaml(*kind, serde_yaml::from_str(yaml).unwrap()).unwrap();
            let source = PathBuf::from(format!("f{i}.yaml"));
            let resource = BuiltResource {
                identifier: record.identifier(),
                dependencies: record.as_resource().dependencies().into_iter().collect(),
                record,
                source: source.clone(),
                module: String::from("m"),
                issues: Vec::new(),
            };
            ctx.register(
                BuiltFile {
                    module: String::from("m"),
                    folder: kind.folder(),
                    kind: Some(*kind),
                    source,
                    folder_relative: format!("f{i}.yaml"),
                    source_hash: String::new(),
                    is_list: false,
                    resources: vec![resource],
                    issues: Vec::new(),
                },
                "modules/m",
                BTreeSet::new(),
            );
        }
        ctx
    }

    const TRANSFORMATION: &str = "externalId: tr\nname: T\ndataSetExternalId: ds_1\n";

    #[tokio::test]
    async fn test_missing_dataset_without_lookup() {
        let ctx = context(&[(ResourceKind::Transformation, TRANSFORMATION)]);
        let issues = DependencyValidator::new(None).validate(&ctx).await;

        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::DEP_001);
        assert!(issues[0].message.contains("dataset:ds_1"));
        assert!(issues[0].message.contains("transformation:tr"));
        assert_eq!(issues[0].location, Some(PathBuf::from("f0.yaml")));
    }

    #[tokio::test]
    async fn test_dependency_defined_in_build() {
        let ctx = context(&[
            (ResourceKind::Transformation, TRANSFORMATION),
            (ResourceKind::DataSet, "externalId: ds_1\n"),
        ]);
        assert!(DependencyValidator::new(None).validate(&ctx).await.is_empty());
    }

    #[tokio::test]
    async fn test_platform_reserved_is_skipped() {
        let ctx = context(&[(
            ResourceKind::DataModel,
            "space: sp\nexternalId: M\nversion: v1\nviews:\n  - {space: cdf_cdm, externalId: CogniteAsset, version: v1}\n",
        )]);
        let issues = DependencyValidator::new(None).validate(&ctx).await;
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("space:sp"));
    }

    #[tokio::test]
    async fn test_live_lookup() {
        let ctx = context(&[
            (ResourceKind::Transformation, TRANSFORMATION),
            (
                ResourceKind::TimeSeries,
                "externalId: ts\ndataSetExternalId: ds_2\n",
            ),
            (
                ResourceKind::FileMetadata,
                "externalId: f\nname: f.pdf\ndataSetExternalId: ds_3\n",
            ),
        ]);
        let mut lookup = MockResourceLookup::new();
        lookup.expect_exists().returning(|id| match id {
            Identifier::DataSet { external_id } if external_id == "ds_1" => Ok(true),
            Identifier::DataSet { external_id } if external_id == "ds_2" => Ok(false),
            _ => Err(ModkitError::Platform(PlatformError::network("timeout"))),
        });

        let issues = DependencyValidator::new(Some(&lookup)).validate(&ctx).await;
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.code == IssueCode::DEP_002));
        assert!(issues[0].message.contains("ds_2"));
        assert!(issues[1].message.contains("could not be verified"));
    }
}
