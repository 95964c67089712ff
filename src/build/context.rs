//! Per-run build state.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::builder::{BuiltFile, BuiltResource};
use super::issue::{BuildIssue, IssueCode, IssueCollector};
use super::variables::VariableScope;
use crate::resources::Identifier;

/// State owned by one build run.
///
/// Created fresh for every run. The indexes are only written by the
/// sequential fold in [`BuildContext::register`], so the first occurrence of
/// an identifier in discovery order always wins.
#[derive(Debug, Default)]
pub struct BuildContext {
    /// Issues raised during the run.
    pub issues: IssueCollector,
    /// Variables available to the run.
    pub scope: VariableScope,
    /// Built files in discovery order, holding only winning resources.
    files: Vec<BuiltFile>,
    /// Winning identifier to its source file.
    identifiers: BTreeMap<Identifier, PathBuf>,
    /// Identifier to the identifiers it depends on.
    dependencies: BTreeMap<Identifier, BTreeSet<Identifier>>,
    /// Variable names used per module relative path.
    used_variables: BTreeMap<String, BTreeSet<String>>,
}

impl BuildContext {
    /// Creates a context over `scope`.
    #[must_use]
    pub fn new(scope: VariableScope) -> Self {
        Self {
            scope,
            ..Self::default()
        }
    }

    /// Folds one built file into the indexes.
    ///
    /// Resources whose identifier was already registered are dropped with a
    /// `RES_004` warning.
    pub fn register(&mut self, mut file: BuiltFile, module_path: &str, used: BTreeSet<String>) {
        self.issues.extend(std::mem::take(&mut file.issues));
        self.used_variables
            .entry(module_path.to_string())
            .or_default()
            .extend(used);

        let mut winners = Vec::with_capacity(file.resources.len());
        for mut resource in std::mem::take(&mut file.resources) {
            self.issues.extend(std::mem::take(&mut resource.issues));
            if let Some(first) = self.identifiers.get(&resource.identifier) {
                self.issues.push(
                    BuildIssue::warning(
                        IssueCode::RES_004,
                        format!(
                            "Duplicate identifier {}; keeping the one from {}",
                            resource.identifier,
                            first.display()
                        ),
                    )
                    .at(&resource.source)
                    .with_suggestion("Remove or rename one of the declarations"),
                );
                continue;
            }
            self.identifiers
                .insert(resource.identifier.clone(), resource.source.clone());
            self.dependencies
                .insert(resource.identifier.clone(), resource.dependencies.clone());
            winners.push(resource);
        }
        file.resources = winners;
        self.files.push(file);
    }

    /// Built files in discovery order.
    #[must_use]
    pub fn files(&self) -> &[BuiltFile] {
        &self.files
    }

    /// Every winning resource in discovery order.
    pub fn resources(&self) -> impl Iterator<Item = &BuiltResource> {
        self.files.iter().flat_map(|f| f.resources.iter())
    }

    /// Returns true if `id` is defined by this build.
    #[must_use]
    pub fn contains(&self, id: &Identifier) -> bool {
        self.identifiers.contains_key(id)
    }

    /// Source file of a winning identifier.
    #[must_use]
    pub fn source_of(&self, id: &Identifier) -> Option<&Path> {
        self.identifiers.get(id).map(PathBuf::as_path)
    }

    /// Dependency index: owner identifier to the identifiers it requires.
    #[must_use]
    pub const fn dependencies(&self) -> &BTreeMap<Identifier, BTreeSet<Identifier>> {
        &self.dependencies
    }

    /// Raises `VAR_002` hints for module variables no file used.
    pub fn report_unused_variables(&self) {
        for module_path in self.scope.modules.keys() {
            let used = self
                .used_variables
                .get(module_path)
                .cloned()
                .unwrap_or_default();
            for name in self.scope.unused(module_path, &used) {
                self.issues.push(
                    BuildIssue::hint(
                        IssueCode::VAR_002,
                        format!("Variable '{name}' of module {module_path} is never used"),
                    )
                    .with_suggestion("Remove it from the module configuration"),
                );
            }
        }
    }
}
