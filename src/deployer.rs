//! Orchestration of the build, deploy and clean commands.
//!
//! The deployer owns nothing between runs: every call creates a fresh
//! [`BuildContext`] or plan, so two runs never share state.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::{error, info, warn};

use crate::build::{
    BuildContext, BuildIssue, BuildLoader, BuildManifest, BuildWriter,
    DependencyValidator, IssueCode, IssueCollector, Module, ModuleDiscovery, ResourceBuilder,
    VariableResolver, VariableScope,
};
use crate::config::{variable_overrides, ConfigParser, EnvironmentConfig};
use crate::error::Result;
use crate::planner::{
    DeploymentPlan, ExecuteOptions, ExecutionReport, Mode, PlanExecutor, PlanOptions, Planner,
};
use crate::platform::{PlatformApi, PlatformLookup, ResourceLookup};
use crate::resources::{DescriptorRegistry, FolderKind};

/// Options of the build command.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Output directory.
    pub build_dir: PathBuf,
    /// Remove the output directory before writing.
    pub clean: bool,
}

/// Result of a build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildOutcome {
    /// Every issue raised, in the order raised.
    pub issues: Vec<BuildIssue>,
    /// Number of modules built.
    pub modules: usize,
    /// Number of winning resources.
    pub resources: usize,
    /// Manifest of the written output.
    pub manifest: BuildManifest,
}

/// Options of the deploy and clean commands.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Directory holding a previous build.
    pub build_dir: PathBuf,
    /// Report without mutating calls.
    pub dry_run: bool,
    /// Delete remote-only resources in scope and recreate changed ones.
    pub drop: bool,
    /// Allow deleting kinds that hold bulk data.
    pub drop_data: bool,
    /// Folder kinds to include; empty includes every kind.
    pub include: Vec<FolderKind>,
}

/// Result of a deploy or clean.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    /// Issues raised while loading the build output.
    pub issues: Vec<BuildIssue>,
    /// The executed plan, absent when loading failed.
    pub plan: Option<DeploymentPlan>,
    /// Execution report, absent when loading failed.
    pub report: Option<ExecutionReport>,
}

impl DeployOutcome {
    /// Returns true if loading raised errors or any resource failed.
    #[must_use]
    pub fn failed(&self) -> bool {
        self.issues.iter().any(BuildIssue::is_error)
            || self.report.as_ref().is_none_or(ExecutionReport::has_failures)
    }
}

/// Runs the commands for one module root and environment.
#[derive(Debug)]
pub struct Deployer {
    root: PathBuf,
    env: String,
    registry: DescriptorRegistry,
    cancel: Arc<AtomicBool>,
}

impl Deployer {
    /// Creates a deployer for `root` and environment `env`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            env: env.into(),
            registry: DescriptorRegistry::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Uses `flag` to cancel execution between batches.
    #[must_use]
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    /// Module root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads `config.<env>.yaml` from the module root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable or invalid.
    pub fn load_environment(&self) -> Result<EnvironmentConfig> {
        ConfigParser::new()
            .with_base_path(&self.root)
            .load_environment(&self.env)
    }

    /// Runs the build pipeline and writes the build directory.
    ///
    /// With `lookup`, dependencies missing from the build are checked
    /// against the platform.
    ///
    /// # Errors
    ///
    /// Returns an error for unrecoverable conditions only: a missing
    /// configuration or module root, or an unwritable build directory.
    pub async fn build(
        &self,
        options: &BuildOptions,
        lookup: Option<&dyn ResourceLookup>,
    ) -> Result<BuildOutcome> {
        let config = self.load_environment()?;
        let issues = IssueCollector::new();
        if config.environment.name != self.env {
            issues.push(
                BuildIssue::warning(
                    IssueCode::CFG_002,
                    format!(
                        "Configuration declares environment '{}' but '{}' was requested",
                        config.environment.name, self.env
                    ),
                )
                .at(self.root.join(EnvironmentConfig::file_name(&self.env)))
                .with_suggestion(format!("Set environment.name to '{}'", self.env)),
            );
        }

        let modules = ModuleDiscovery::new(&self.root, &config.environment.disabled_kinds)
            .with_selection(&config.environment.selected)
            .with_build_dir(&options.build_dir)
            .discover(&issues)?;
        info!(
            "Building {} modules ({} files) for environment {}",
            modules.len(),
            modules.iter().map(Module::file_count).sum::<usize>(),
            self.env
        );

        let scope =
            VariableScope::build(&config.variables, &variable_overrides(), &modules, &issues);
        let mut ctx = BuildContext::new(scope.clone());
        ctx.issues.extend(issues.snapshot());
        ResourceBuilder::new(&self.registry, VariableResolver::new(&scope, &self.env))
            .build_all(&modules, &mut ctx);

        let dependency_issues = DependencyValidator::new(lookup).validate(&ctx).await;
        ctx.issues.extend(dependency_issues);

        let manifest = BuildWriter::new(&options.build_dir, &self.root).write(&ctx, options.clean)?;
        let outcome = BuildOutcome {
            issues: ctx.issues.snapshot(),
            modules: modules.len(),
            resources: ctx.resources().count(),
            manifest,
        };
        if ctx.issues.has_errors() {
            warn!("Build finished with errors");
        }
        Ok(outcome)
    }

    /// Deploys the build output in `options.build_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the build output cannot be read. Remote read
    /// failures are reported per kind in the outcome.
    pub async fn deploy<P: PlatformApi + ?Sized>(
        &self,
        api: &P,
        options: &DeployOptions,
    ) -> Result<DeployOutcome> {
        self.apply(api, Mode::Deploy, options).await
    }

    /// Deletes the resources of the build output from the platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the build output cannot be read. Remote read
    /// failures are reported per kind in the outcome.
    pub async fn clean<P: PlatformApi + ?Sized>(
        &self,
        api: &P,
        options: &DeployOptions,
    ) -> Result<DeployOutcome> {
        self.apply(api, Mode::Clean, options).await
    }

    async fn apply<P: PlatformApi + ?Sized>(
        &self,
        api: &P,
        mode: Mode,
        options: &DeployOptions,
    ) -> Result<DeployOutcome> {
        let issues = IssueCollector::new();
        let resources = BuildLoader::new(&options.build_dir, &self.registry)
            .load(&issues, |name| std::env::var(name).ok())?;

        if issues.has_errors() {
            error!("The build output has errors; nothing was changed");
            return Ok(DeployOutcome {
                issues: issues.snapshot(),
                plan: None,
                report: None,
            });
        }

        let plan_options = PlanOptions {
            drop: options.drop,
            include: options.include.clone(),
        };
        let plan = Planner::new(api, &self.registry)
            .plan(&resources, mode, &plan_options)
            .await;
        let execute_options = ExecuteOptions {
            mode,
            drop: options.drop,
            drop_data: options.drop_data,
            dry_run: options.dry_run,
        };
        let report = PlanExecutor::new(api)
            .with_cancel(Arc::clone(&self.cancel))
            .execute(&plan, &execute_options)
            .await;

        Ok(DeployOutcome {
            issues: issues.snapshot(),
            plan: Some(plan),
            report: Some(report),
        })
    }
}

/// Wraps a platform as a dependency lookup for `build --verify`.
#[must_use]
pub const fn platform_lookup<P: PlatformApi + ?Sized>(api: &P) -> PlatformLookup<'_, P> {
    PlatformLookup::new(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, ModkitError};
    use crate::platform::memory::{Call, InMemoryPlatform};
    use crate::resources::{Identifier, ResourceKind};
    use serde_json::json;
    use tempfile::TempDir;
    use tokio_test::{assert_err, assert_ok};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        write(
            &root,
            "config.dev.yaml",
            "environment:\n  name: dev\n  project: demo\nvariables:\n  modules:\n    common:\n      dataset: ds_common\n",
        );
        write(
            &root,
            "modules/common/transformations/t.yaml",
            "externalId: tr\nname: T\ndataSetExternalId: '{{ dataset }}'\n",
        );
        write(
            &root,
            "modules/common/data_sets/ds.yaml",
            "externalId: '{{ dataset }}'\nname: Common\n",
        );
        dir
    }

    fn options(dir: &TempDir) -> (BuildOptions, DeployOptions) {
        let build_dir = dir.path().join("build");
        (
            BuildOptions {
                build_dir: build_dir.clone(),
                clean: true,
            },
            DeployOptions {
                build_dir,
                dry_run: false,
                drop: false,
                drop_data: false,
                include: Vec::new(),
            },
        )
    }

    #[tokio::test]
    async fn test_build_then_deploy() {
        let dir = project();
        let deployer = Deployer::new(dir.path().join("project"), "dev");
        let (build_options, deploy_options) = options(&dir);

        let outcome = assert_ok!(deployer.build(&build_options, None).await);
        assert_eq!(outcome.modules, 1);
        assert_eq!(outcome.resources, 2);
        assert!(outcome.issues.is_empty());

        let platform = InMemoryPlatform::new();
        let outcome = deployer.deploy(&platform, &deploy_options).await.unwrap();
        assert!(!outcome.failed());
        assert_eq!(
            platform.mutating_calls(),
            vec![
                Call::Create(ResourceKind::DataSet, vec![Identifier::data_set("ds_common")]),
                Call::Create(
                    ResourceKind::Transformation,
                    vec![Identifier::Transformation {
                        external_id: String::from("tr")
                    }]
                ),
            ]
        );

        let outcome = deployer.deploy(&platform, &deploy_options).await.unwrap();
        assert_eq!(outcome.report.unwrap().totals().unchanged, 2);
    }

    #[tokio::test]
    async fn test_clean_after_deploy() {
        let dir = project();
        let deployer = Deployer::new(dir.path().join("project"), "dev");
        let (build_options, deploy_options) = options(&dir);
        deployer.build(&build_options, None).await.unwrap();

        let platform = InMemoryPlatform::new();
        deployer.deploy(&platform, &deploy_options).await.unwrap();
        let outcome = deployer.clean(&platform, &deploy_options).await.unwrap();

        let report = outcome.report.unwrap();
        assert_eq!(report.counts[&ResourceKind::Transformation].deleted, 1);
        assert_eq!(report.counts[&ResourceKind::DataSet].skipped, 1);
        assert!(platform.contains(&Identifier::data_set("ds_common")));
    }

    #[tokio::test]
    async fn test_unreadable_kind_does_not_stop_deploy() {
        let dir = project();
        let root = dir.path().join("project");
        write(&root, "modules/common/raw/ingest.database.yaml", "dbName: ingest\n");
        let deployer = Deployer::new(&root, "dev");
        let (build_options, deploy_options) = options(&dir);
        deployer.build(&build_options, None).await.unwrap();

        let platform = InMemoryPlatform::new().unreadable(ResourceKind::DataSet);
        let outcome = assert_ok!(deployer.deploy(&platform, &deploy_options).await);

        assert!(outcome.failed());
        let plan = outcome.plan.unwrap();
        assert!(plan.kinds[0].read_failure.is_some());
        let report = outcome.report.unwrap();
        assert_eq!(report.counts[&ResourceKind::RawDatabase].created, 1);
        let failed: Vec<ResourceKind> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(failed, vec![ResourceKind::DataSet, ResourceKind::Transformation]);
    }

    #[tokio::test]
    async fn test_build_dir_inside_root_is_not_rediscovered() {
        let dir = project();
        let root = dir.path().join("project");
        let deployer = Deployer::new(&root, "dev");
        let build_options = BuildOptions {
            build_dir: root.join("out"),
            clean: true,
        };

        let first = deployer.build(&build_options, None).await.unwrap();
        let second = deployer.build(&build_options, None).await.unwrap();
        assert!(second.issues.is_empty());
        assert_eq!(second.modules, 1);
        assert_eq!(first.manifest, second.manifest);
    }

    #[tokio::test]
    async fn test_verify_checks_platform() {
        let dir = project();
        let root = dir.path().join("project");
        std::fs::remove_file(root.join("modules/common/data_sets/ds.yaml")).unwrap();
        let deployer = Deployer::new(&root, "dev");
        let (build_options, _) = options(&dir);

        let outcome = deployer.build(&build_options, None).await.unwrap();
        let codes: Vec<IssueCode> = outcome.issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::DEP_001]);

        let platform = InMemoryPlatform::new()
            .with(ResourceKind::DataSet, json!({"externalId": "ds_common"}));
        let lookup = platform_lookup(&platform);
        let outcome = deployer.build(&build_options, Some(&lookup)).await.unwrap();
        assert!(outcome.issues.is_empty());
    }

    #[tokio::test]
    async fn test_environment_name_mismatch_warns() {
        let dir = project();
        let root = dir.path().join("project");
        std::fs::copy(root.join("config.dev.yaml"), root.join("config.prod.yaml")).unwrap();
        let deployer = Deployer::new(&root, "prod");
        let (build_options, _) = options(&dir);

        let outcome = deployer.build(&build_options, None).await.unwrap();
        assert_eq!(outcome.issues[0].code, IssueCode::CFG_002);
    }

    #[tokio::test]
    async fn test_missing_configuration_is_fatal() {
        let dir = project();
        let deployer = Deployer::new(dir.path().join("project"), "staging");
        let (build_options, _) = options(&dir);

        let err = assert_err!(deployer.build(&build_options, None).await);
        assert!(matches!(
            err,
            ModkitError::Config(ConfigError::FileNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deploy_without_build_is_fatal() {
        let dir = project();
        let deployer = Deployer::new(dir.path().join("project"), "dev");
        let (_, deploy_options) = options(&dir);
        let platform = InMemoryPlatform::new();

        assert_err!(deployer.deploy(&platform, &deploy_options).await);
        assert!(platform.calls().is_empty());
    }
}
