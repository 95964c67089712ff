//! Resource builder.
//!
//! Each declaration file is resolved, routed to its descriptor, parsed and
//! normalized independently and in parallel. The results are then folded in
//! discovery order into the [`BuildContext`].

use rayon::prelude::*;
use serde_yaml::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::context::BuildContext;
use super::discovery::Module;
use super::hash::ContentHasher;
use super::issue::{BuildIssue, IssueCode};
use super::variables::VariableResolver;
use crate::resources::{
    DescriptorRegistry, FolderKind, Identifier, ResourceDescriptor, ResourceKind, ResourceRecord,
};

/// A normalized resource and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltResource {
    /// Canonical record.
    pub record: ResourceRecord,
    /// Unique identifier.
    pub identifier: Identifier,
    /// Declaration file.
    pub source: PathBuf,
    /// Owning module name.
    pub module: String,
    /// Identifiers this resource references.
    pub dependencies: BTreeSet<Identifier>,
    /// Issues raised for this resource.
    pub issues: Vec<BuildIssue>,
}

/// The build result of one declaration file.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltFile {
    /// Owning module name.
    pub module: String,
    /// Resource folder the file was found in.
    pub folder: FolderKind,
    /// Kind the file was routed to, if any.
    pub kind: Option<ResourceKind>,
    /// Declaration file.
    pub source: PathBuf,
    /// Path below the resource folder, `/`-separated.
    pub folder_relative: String,
    /// SHA-256 of the source content.
    pub source_hash: String,
    /// Whether the file declared a list rather than a single record.
    pub is_list: bool,
    /// Resources declared by the file.
    pub resources: Vec<BuiltResource>,
    /// File-level issues.
    pub issues: Vec<BuildIssue>,
}

/// Builds declaration files into resources.
#[derive(Debug)]
pub struct ResourceBuilder<'a> {
    registry: &'a DescriptorRegistry,
    resolver: VariableResolver<'a>,
}

struct FileTask<'m> {
    module: &'m Module,
    folder: FolderKind,
    path: &'m Path,
}

impl<'a> ResourceBuilder<'a> {
    /// Creates a builder.
    #[must_use]
    pub const fn new(registry: &'a DescriptorRegistry, resolver: VariableResolver<'a>) -> Self {
        Self { registry, resolver }
    }

    /// Builds every file of `modules` and folds the results into `ctx`.
    pub fn build_all(&self, modules: &[Module], ctx: &mut BuildContext) {
        let tasks: Vec<FileTask<'_>> = modules
            .iter()
            .flat_map(|module| {
                module.resource_folders.iter().flat_map(move |(folder, files)| {
                    files.iter().map(move |path| FileTask {
                        module,
                        folder: *folder,
                        path,
                    })
                })
            })
            .collect();
        info!("Building {} declaration files from {} modules", tasks.len(), modules.len());

        let results: Vec<(BuiltFile, BTreeSet<String>)> = tasks
            .par_iter()
            .map(|task| self.build_file(task.module, task.folder, task.path))
            .collect();

        for ((file, used), task) in results.into_iter().zip(&tasks) {
            ctx.register(file, &task.module.relative_path, used);
        }
        ctx.report_unused_variables();
    }

    /// Builds a single declaration file.
    ///
    /// Returns the built file and the variable names it used. Never fails:
    /// every problem is recorded as an issue on the result.
    #[must_use]
    pub fn build_file(
        &self,
        module: &Module,
        folder: FolderKind,
        path: &Path,
    ) -> (BuiltFile, BTreeSet<String>) {
        let folder_path = module.path.join(folder.folder_name());
        let mut file = BuiltFile {
            module: module.name.clone(),
            folder,
            kind: None,
            source: path.to_path_buf(),
            folder_relative: relative_to(path, &folder_path),
            source_hash: String::new(),
            is_list: false,
            resources: Vec::new(),
            issues: Vec::new(),
        };

        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                file.issues.push(
                    BuildIssue::error(IssueCode::RES_001, format!("Could not read file: {e}")).at(path),
                );
                return (file, BTreeSet::new());
            }
        };
        file.source_hash = ContentHasher::new().hash_content(raw.as_bytes());

        let resolved = self.resolver.resolve(&raw, path, module);
        let used = resolved.used_names();
        file.issues.extend(resolved.issues);

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let Some(descriptor) = self.registry.for_file(folder, &file_name) else {
            file.issues.push(
                BuildIssue::warning(
                    IssueCode::RES_005,
                    format!("Cannot tell the resource kind of '{file_name}' in {folder}"),
                )
                .at(path)
                .with_suggestion(
                    "Name the file <name>.space.yaml, .container.yaml, .view.yaml or .datamodel.yaml",
                ),
            );
            return (file, used);
        };
        file.kind = Some(descriptor.kind());

        let content = descriptor.post_substitute(&resolved.content);
        let items = match serde_yaml::from_str::<Value>(&content) {
            Ok(Value::Null) => Vec::new(),
            Ok(Value::Sequence(items)) => {
                file.is_list = true;
                items
            }
            Ok(value @ Value::Mapping(_)) => vec![value],
            Ok(_) => {
                file.issues.push(
                    BuildIssue::error(
                        IssueCode::RES_001,
                        "Expected a mapping or a list of mappings",
                    )
                    .at(path),
                );
                return (file, used);
            }
            Err(e) => {
                file.issues.push(
                    BuildIssue::error(IssueCode::RES_001, format!("Invalid YAML: {e}")).at(path),
                );
                return (file, used);
            }
        };

        for item in items {
            if let Some(resource) = self.build_record(descriptor, item, module, &mut file) {
                file.resources.push(resource);
            }
        }
        debug!("{}: {} resources", path.display(), file.resources.len());
        (file, used)
    }

    fn build_record(
        &self,
        descriptor: &dyn ResourceDescriptor,
        item: Value,
        module: &Module,
        file: &mut BuiltFile,
    ) -> Option<BuiltResource> {
        let kind = descriptor.kind();
        let missing = descriptor.missing_fields(&item);
        if !missing.is_empty() {
            file.issues.push(
                BuildIssue::error(
                    IssueCode::RES_002,
                    format!("Invalid {kind}: missing required field {}", missing.join(", ")),
                )
                .at(&file.source),
            );
            return None;
        }
        let record = match descriptor.normalize(item) {
            Ok(record) => record,
            Err(e) => {
                file.issues.push(
                    BuildIssue::error(IssueCode::RES_001, format!("Invalid {kind}: {e}"))
                        .at(&file.source),
                );
                return None;
            }
        };

        let identifier = descriptor.identifier_of(&record);
        let issues = record
            .as_resource()
            .extra()
            .keys()
            .map(|field| {
                BuildIssue::warning(
                    IssueCode::RES_003,
                    format!("Unknown field '{field}' in {identifier}"),
                )
                .at(&file.source)
                .with_suggestion("Check the spelling; the platform ignores unknown fields")
            })
            .collect();

        Some(BuiltResource {
            dependencies: descriptor.dependencies_of(&record),
            identifier,
            record,
            source: file.source.clone(),
            module: module.name.clone(),
            issues,
        })
    }
}

fn relative_to(path: &Path, base: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
