//! Persisted build output.
//!
//! A build directory mirrors the resource folders: each declaration file
//! becomes `<folder>/<module>.<file>` holding its winning canonical records,
//! and `_build_manifest.yaml` records where every output came from. Nothing
//! in the output depends on the clock, so rebuilding unchanged inputs gives
//! byte-identical files.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use super::builder::{BuiltFile, BuiltResource};
use super::context::BuildContext;
use super::issue::{BuildIssue, IssueCode, IssueCollector};
use super::variables::substitute_env;
use crate::error::{BuildError, ModkitError, Result};
use crate::resources::{DescriptorRegistry, ResourceKind, ResourceRecord};

/// Manifest file name inside the build directory.
pub const MANIFEST_FILE: &str = "_build_manifest.yaml";

/// Provenance of one output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Output path relative to the build directory, `/`-separated.
    pub output: String,
    /// Source path relative to the module root, `/`-separated.
    pub source: String,
    /// Owning module name.
    pub module: String,
    /// Resource kind of every record in the file.
    pub kind: ResourceKind,
    /// SHA-256 of the source content, hex.
    pub sha256: String,
    /// Identifiers written to the file.
    pub identifiers: Vec<String>,
}

/// Index of a build directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Output files ordered by path.
    pub files: Vec<ManifestEntry>,
}

/// Writes a build context to disk.
#[derive(Debug)]
pub struct BuildWriter<'a> {
    build_dir: &'a Path,
    root: &'a Path,
}

impl<'a> BuildWriter<'a> {
    /// Creates a writer for `build_dir`, recording sources relative to `root`.
    #[must_use]
    pub const fn new(build_dir: &'a Path, root: &'a Path) -> Self {
        Self { build_dir, root }
    }

    /// Writes every file that kept at least one resource, then the manifest.
    ///
    /// With `clean`, the build directory is removed first.
    ///
    /// # Errors
    ///
    /// Returns an error if the build directory is or contains the module
    /// root, or if any file cannot be serialized or written.
    pub fn write(&self, ctx: &BuildContext, clean: bool) -> Result<BuildManifest> {
        let build_dir = resolve_path(self.build_dir);
        let root = resolve_path(self.root);
        if root.starts_with(&build_dir) {
            return Err(BuildError::InvalidBuildDir {
                path: self.build_dir.to_path_buf(),
                message: format!(
                    "the build directory must not contain the module root {}",
                    root.display()
                ),
            }
            .into());
        }
        if clean && self.build_dir.exists() {
            debug!("Removing {}", self.build_dir.display());
            fs::remove_dir_all(self.build_dir)
                .map_err(|e| ModkitError::Build(BuildError::file_access(self.build_dir, &e)))?;
        }
        create_dir(self.build_dir)?;

        let mut outputs = Vec::new();
        for file in ctx.files() {
            let Some(kind) = file.kind else { continue };
            if file.resources.is_empty() {
                continue;
            }
            let output = output_path(file);
            let content = render(file)?;
            outputs.push((
                ManifestEntry {
                    output,
                    source: self.relative_source(&file.source),
                    module: file.module.clone(),
                    kind,
                    sha256: file.source_hash.clone(),
                    identifiers: file
                        .resources
                        .iter()
                        .map(|r| r.identifier.to_string())
                        .collect(),
                },
                content,
            ));
        }
        outputs.sort_by(|a, b| a.0.output.cmp(&b.0.output));

        for (entry, content) in &outputs {
            let path = self.build_dir.join(&entry.output);
            if let Some(parent) = path.parent() {
                create_dir(parent)?;
            }
            write_file(&path, content)?;
        }

        let manifest = BuildManifest {
            files: outputs.into_iter().map(|(entry, _)| entry).collect(),
        };
        let content = serde_yaml::to_string(&manifest)
            .map_err(|e| ModkitError::internal(format!("Failed to serialize manifest: {e}")))?;
        write_file(&self.build_dir.join(MANIFEST_FILE), &content)?;

        info!(
            "Wrote {} files to {}",
            manifest.files.len(),
            self.build_dir.display()
        );
        Ok(manifest)
    }

    fn relative_source(&self, source: &Path) -> String {
        slash_path(source.strip_prefix(self.root).unwrap_or(source))
    }
}

/// Reads a build directory back into resources ready to deploy.
#[derive(Debug)]
pub struct BuildLoader<'a> {
    build_dir: &'a Path,
    registry: &'a DescriptorRegistry,
}

impl<'a> BuildLoader<'a> {
    /// Creates a loader over `build_dir`.
    #[must_use]
    pub const fn new(build_dir: &'a Path, registry: &'a DescriptorRegistry) -> Self {
        Self {
            build_dir,
            registry,
        }
    }

    /// Reads the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest is missing or malformed.
    pub fn manifest(&self) -> Result<BuildManifest> {
        let path = self.build_dir.join(MANIFEST_FILE);
        let content = fs::read_to_string(&path).map_err(|e| BuildError::InvalidBuildDir {
            path: self.build_dir.to_path_buf(),
            message: format!("cannot read {MANIFEST_FILE}: {e}; run build first"),
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            BuildError::InvalidBuildDir {
                path: self.build_dir.to_path_buf(),
                message: format!("malformed {MANIFEST_FILE}: {e}"),
            }
            .into()
        })
    }

    /// Loads every output file listed in the manifest.
    ///
    /// `${NAME}` placeholders are replaced through `env`. Records that no
    /// longer parse are reported as `RES_001` and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest or a listed file cannot be read.
    pub fn load(
        &self,
        issues: &IssueCollector,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Vec<BuiltResource>> {
        let manifest = self.manifest()?;
        let mut resources = Vec::new();
        let mut seen = BTreeSet::new();

        for entry in &manifest.files {
            let path = self.build_dir.join(&entry.output);
            let raw = fs::read_to_string(&path)
                .map_err(|e| ModkitError::Build(BuildError::file_access(&path, &e)))?;
            let (content, env_issues) = substitute_env(&raw, &path, &env);
            issues.extend(env_issues);

            let descriptor = self.registry.get(entry.kind);
            let content = descriptor.post_substitute(&content);
            let items = match serde_yaml::from_str::<Value>(&content) {
                Ok(Value::Sequence(items)) => items,
                Ok(Value::Null) => Vec::new(),
                Ok(item) => vec![item],
                Err(e) => {
                    issues.push(
                        BuildIssue::error(IssueCode::RES_001, format!("Invalid YAML: {e}")).at(&path),
                    );
                    continue;
                }
            };

            for item in items {
                let record = match descriptor.normalize(item) {
                    Ok(record) => record,
                    Err(e) => {
                        issues.push(
                            BuildIssue::error(
                                IssueCode::RES_001,
                                format!("Invalid {}: {e}", entry.kind),
                            )
                            .at(&path),
                        );
                        continue;
                    }
                };
                let identifier = descriptor.identifier_of(&record);
                if !seen.insert(identifier.clone()) {
                    warn!("{identifier} appears twice in {}", self.build_dir.display());
                    continue;
                }
                resources.push(BuiltResource {
                    dependencies: descriptor.dependencies_of(&record),
                    identifier,
                    record,
                    source: path.clone(),
                    module: entry.module.clone(),
                    issues: Vec::new(),
                });
            }
        }

        info!(
            "Loaded {} resources from {}",
            resources.len(),
            self.build_dir.display()
        );
        Ok(resources)
    }
}

/// Absolute form of `path` with symlinks, `.` and `..` resolved.
///
/// Components that do not exist yet are appended lexically to the
/// canonical form of their nearest existing ancestor.
pub(crate) fn resolve_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
        if let Ok(canonical) = resolved.canonicalize() {
            resolved = canonical;
        }
    }
    resolved
}

/// `<folder>/<module>.<path below the folder, with `/` as `.`>`.
fn output_path(file: &BuiltFile) -> String {
    format!(
        "{}/{}.{}",
        file.folder,
        file.module,
        file.folder_relative.replace('/', ".")
    )
}

fn render(file: &BuiltFile) -> Result<String> {
    let records: Vec<&ResourceRecord> = file.resources.iter().map(|r| &r.record).collect();
    let rendered = if file.is_list {
        serde_yaml::to_string(&records)
    } else {
        serde_yaml::to_string(records[0])
    };
    rendered.map_err(|e| {
        ModkitError::internal(format!(
            "Failed to serialize {}: {e}",
            file.source.display()
        ))
    })
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| ModkitError::Build(BuildError::file_access(path, &e)))
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).map_err(|e| ModkitError::Build(BuildError::file_access(path, &e)))
}
