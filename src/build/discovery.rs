//! Module discovery.
//!
//! Walks the module root and turns every directory whose children include a
//! recognized resource folder into a [`Module`]. Modules do not nest: once a
//! directory is a module, the walk does not descend into it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::artifacts::resolve_path;
use super::issue::{BuildIssue, IssueCode, IssueCollector};
use crate::error::{BuildError, ModkitError, Result};
use crate::resources::FolderKind;

/// Directory name reserved for build output.
pub const BUILD_DIR_NAME: &str = "build";

/// Files that mark a directory as intended to be a module.
pub const MODULE_MARKERS: &[&str] = &["module.toml", "default.config.yaml"];

/// Directory whose direct children are expected to be modules.
const MODULES_DIR_NAME: &str = "modules";

/// A discovered module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Logical name, the last path segment.
    pub name: String,
    /// Absolute or root-joined path.
    pub path: PathBuf,
    /// Path relative to the module root, `/`-separated.
    pub relative_path: String,
    /// Declaration files per loaded resource folder, sorted by path.
    pub resource_folders: BTreeMap<FolderKind, Vec<PathBuf>>,
}

impl Module {
    /// Total number of declaration files.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.resource_folders.values().map(Vec::len).sum()
    }

    /// Returns true if a selection entry names this module.
    ///
    /// An entry matches by module name, or as a path prefix of the relative
    /// path on segment boundaries.
    #[must_use]
    pub fn matches_selection(&self, entry: &str) -> bool {
        let entry = entry.trim().trim_end_matches('/');
        if entry.is_empty() {
            return false;
        }
        entry == self.name
            || self.relative_path == entry
            || self
                .relative_path
                .strip_prefix(entry)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Discovers modules under a root directory.
#[derive(Debug)]
pub struct ModuleDiscovery<'a> {
    root: &'a Path,
    disabled: &'a [FolderKind],
    selected: &'a [String],
    build_dir: Option<PathBuf>,
}

/// A module directory found by the walk, not loaded yet.
struct Candidate {
    module: Module,
    children: Vec<String>,
}

impl<'a> ModuleDiscovery<'a> {
    /// Creates a discovery over `root`, skipping `disabled` folder kinds.
    #[must_use]
    pub const fn new(root: &'a Path, disabled: &'a [FolderKind]) -> Self {
        Self {
            root,
            disabled,
            selected: &[],
            build_dir: None,
        }
    }

    /// Keeps only the modules named by `selected`. An empty selection keeps all.
    #[must_use]
    pub fn with_selection(mut self, selected: &'a [String]) -> Self {
        self.selected = selected;
        self
    }

    /// Skips `build_dir` during the walk, wherever it sits below the root.
    #[must_use]
    pub fn with_build_dir(mut self, build_dir: &Path) -> Self {
        self.build_dir = Some(resolve_path(build_dir));
        self
    }

    /// Walks the root and returns the selected modules in stable discovery
    /// order.
    ///
    /// Folder diagnostics are raised only for modules that are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the root does not exist or cannot be listed.
    pub fn discover(&self, issues: &IssueCollector) -> Result<Vec<Module>> {
        if !self.root.is_dir() {
            issues.push(
                BuildIssue::error(
                    IssueCode::MOD_001,
                    format!("Module root {} does not exist", self.root.display()),
                )
                .at(self.root),
            );
            return Err(ModkitError::Build(BuildError::ModuleRootNotFound {
                path: self.root.to_path_buf(),
            }));
        }

        let candidates = self.walk(issues)?;
        let modules = self
            .select(candidates, issues)
            .into_iter()
            .map(|candidate| self.load_module(candidate, issues))
            .collect();
        Ok(modules)
    }

    /// Finds module directories, dropping later duplicates of a name.
    fn walk(&self, issues: &IssueCollector) -> Result<Vec<Candidate>> {
        let resolved_root = resolve_path(self.root);
        let mut candidates = Vec::new();
        let mut names = BTreeSet::new();
        let mut walker = WalkDir::new(self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy();
            if dir_name.starts_with('.') || dir_name == BUILD_DIR_NAME {
                walker.skip_current_dir();
                continue;
            }

            let dir = entry.path();
            if let Some(build_dir) = &self.build_dir {
                let rel = dir.strip_prefix(self.root).unwrap_or(dir);
                if resolved_root.join(rel) == *build_dir {
                    debug!("Skipping build directory {}", dir.display());
                    walker.skip_current_dir();
                    continue;
                }
            }

            let children = child_dirs(dir)?;
            let has_resource_folder = children
                .iter()
                .any(|name| name.parse::<FolderKind>().is_ok());

            if has_resource_folder {
                walker.skip_current_dir();
                let module = Module {
                    name: dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    path: dir.to_path_buf(),
                    relative_path: self.relative(dir),
                    resource_folders: BTreeMap::new(),
                };
                if names.insert(module.name.clone()) {
                    debug!("Discovered module {} at {}", module.name, module.relative_path);
                    candidates.push(Candidate { module, children });
                } else {
                    issues.push(
                        BuildIssue::error(
                            IssueCode::MOD_005,
                            format!(
                                "Module name '{}' is already used; {} is ignored",
                                module.name, module.relative_path
                            ),
                        )
                        .at(dir)
                        .with_suggestion("Rename one of the module directories"),
                    );
                }
            } else if self.is_candidate(dir, &children) {
                walker.skip_current_dir();
                issues.push(
                    BuildIssue::error(
                        IssueCode::MOD_002,
                        format!(
                            "Module {} has no resource folders",
                            self.relative(dir)
                        ),
                    )
                    .at(dir)
                    .with_suggestion(format!(
                        "Add one of: {}",
                        FolderKind::ALL.map(FolderKind::folder_name).join(", ")
                    )),
                );
            }
        }

        Ok(candidates)
    }

    /// Applies the selection. Entries that match no module are reported as
    /// warnings.
    fn select(&self, candidates: Vec<Candidate>, issues: &IssueCollector) -> Vec<Candidate> {
        if self.selected.is_empty() {
            return candidates;
        }
        for entry in self.selected {
            if !candidates.iter().any(|c| c.module.matches_selection(entry)) {
                issues.push(
                    BuildIssue::warning(
                        IssueCode::MOD_006,
                        format!("Selection '{entry}' matches no module"),
                    )
                    .with_suggestion("Check the `selected` list in the environment config"),
                );
            }
        }
        candidates
            .into_iter()
            .filter(|c| {
                self.selected
                    .iter()
                    .any(|entry| c.module.matches_selection(entry))
            })
            .collect()
    }

    fn load_module(&self, candidate: Candidate, issues: &IssueCollector) -> Module {
        let Candidate {
            mut module,
            children,
        } = candidate;
        for child in &children {
            let folder_path = module.path.join(child);
            match child.parse::<FolderKind>() {
                Ok(kind) if self.disabled.contains(&kind) => {
                    issues.push(
                        BuildIssue::warning(
                            IssueCode::MOD_004,
                            format!("Resource folder '{kind}' is disabled and was not loaded"),
                        )
                        .at(&folder_path),
                    );
                }
                Ok(kind) => {
                    module
                        .resource_folders
                        .insert(kind, declaration_files(&folder_path));
                }
                Err(_) if child.starts_with('.') => {}
                Err(_) => {
                    issues.push(
                        BuildIssue::warning(
                            IssueCode::MOD_003,
                            format!("Unrecognized folder '{child}' in module"),
                        )
                        .at(&folder_path),
                    );
                }
            }
        }
        module
    }

    fn is_candidate(&self, dir: &Path, children: &[String]) -> bool {
        let has_marker = MODULE_MARKERS.iter().any(|m| dir.join(m).is_file());
        let under_modules_dir = dir
            .parent()
            .and_then(Path::file_name)
            .is_some_and(|n| n == MODULES_DIR_NAME);
        has_marker || (under_modules_dir && children.is_empty())
    }

    fn relative(&self, dir: &Path) -> String {
        let rel = dir.strip_prefix(self.root).unwrap_or(dir);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Sorted names of the direct child directories of `dir`.
fn child_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| BuildError::file_access(dir, &e))?;
    let mut names: Vec<String> = entries
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

/// `*.yaml` and `*.yml` files under a resource folder, in path order.
fn declaration_files(folder: &Path) -> Vec<PathBuf> {
    WalkDir::new(folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .map(walkdir::DirEntry::into_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::issue::Severity;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }

    fn mkdir(root: &Path, rel: &str) {
        std::fs::create_dir_all(root.join(rel)).unwrap();
    }

    #[test]
    fn test_discovers_modules_without_nesting() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "modules/common/data_sets/ds.yaml");
        touch(root, "modules/common/transformations/t.yml");
        touch(root, "modules/common/transformations/notes.md");
        touch(root, "modules/common/auth/nested/data_sets/inner.yaml");
        touch(root, "modules/pumps/data_models/pump.view.yaml");

        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[]).discover(&issues).unwrap();

        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["common", "pumps"]);
        assert_eq!(modules[0].relative_path, "modules/common");
        assert_eq!(modules[0].resource_folders[&FolderKind::Transformations].len(), 1);
        assert_eq!(modules[0].resource_folders[&FolderKind::Auth].len(), 1);
        assert!(!issues.has_errors());
    }

    #[test]
    fn test_unknown_and_disabled_folders() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "modules/common/data_sets/ds.yaml");
        touch(root, "modules/common/streamlit/app.yaml");
        touch(root, "modules/common/functions/fn.yaml");

        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[FolderKind::Functions])
            .discover(&issues)
            .unwrap();

        assert_eq!(issues.with_code(IssueCode::MOD_003).len(), 1);
        assert_eq!(issues.with_code(IssueCode::MOD_004).len(), 1);
        assert!(!modules[0].resource_folders.contains_key(&FolderKind::Functions));
        assert_eq!(issues.count(Severity::Error), 0);
    }

    #[test]
    fn test_module_without_resource_folders_is_dropped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "modules/empty/default.config.yaml");
        mkdir(root, "modules/empty/docs");
        mkdir(root, "modules/bare");
        touch(root, "modules/ok/raw/t.yaml");

        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[]).discover(&issues).unwrap();

        assert_eq!(modules.len(), 1);
        assert_eq!(issues.with_code(IssueCode::MOD_002).len(), 2);
    }

    #[test]
    fn test_duplicate_module_names_keep_first() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "a/shared/data_sets/one.yaml");
        touch(root, "b/shared/data_sets/two.yaml");

        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[]).discover(&issues).unwrap();

        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].relative_path, "a/shared");
        assert_eq!(issues.with_code(IssueCode::MOD_005).len(), 1);
    }

    #[test]
    fn test_build_and_hidden_dirs_are_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "build/data_sets/common.ds.yaml");
        touch(root, ".git/data_sets/x.yaml");
        touch(root, "modules/m/data_sets/ds.yaml");

        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[]).discover(&issues).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "m");
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let issues = IssueCollector::new();
        let err = ModuleDiscovery::new(&missing, &[]).discover(&issues).unwrap_err();
        assert!(matches!(err, ModkitError::Build(BuildError::ModuleRootNotFound { .. })));
        assert_eq!(issues.with_code(IssueCode::MOD_001).len(), 1);
    }

    #[test]
    fn test_selection_by_name_and_prefix() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "modules/common/data_sets/ds.yaml");
        touch(root, "modules/sources/sap/raw/t.yaml");
        touch(root, "modules/sources_extra/x/raw/t.yaml");

        let selected = vec![
            String::from("common"),
            String::from("modules/sources/"),
            String::from("ghost"),
        ];
        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[])
            .with_selection(&selected)
            .discover(&issues)
            .unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["common", "sap"]);
        assert_eq!(issues.with_code(IssueCode::MOD_006).len(), 1);
    }

    #[test]
    fn test_excluded_modules_raise_no_folder_issues() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "a/shared/data_sets/one.yaml");
        touch(root, "b/shared/data_sets/two.yaml");
        touch(root, "b/shared/streamlit/app.yaml");
        touch(root, "b/shared/functions/fn.yaml");
        touch(root, "modules/skipped/raw/t.yaml");
        touch(root, "modules/skipped/notebooks/n.yaml");

        let selected = vec![String::from("shared")];
        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[FolderKind::Functions])
            .with_selection(&selected)
            .discover(&issues)
            .unwrap();

        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].relative_path, "a/shared");
        assert_eq!(issues.with_code(IssueCode::MOD_005).len(), 1);
        assert!(issues.with_code(IssueCode::MOD_003).is_empty());
        assert!(issues.with_code(IssueCode::MOD_004).is_empty());
    }

    #[test]
    fn test_custom_build_dir_is_skipped() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(root, "modules/m/data_sets/ds.yaml");
        touch(root, "out/data_sets/m.ds.yaml");
        touch(root, "out/transformations/m.t.yaml");

        let issues = IssueCollector::new();
        let modules = ModuleDiscovery::new(root, &[])
            .with_build_dir(&root.join("modules/../out"))
            .discover(&issues)
            .unwrap();
        let names: Vec<_> = modules.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["m"]);
        assert!(issues.snapshot().is_empty());

        let modules = ModuleDiscovery::new(root, &[]).discover(&issues).unwrap();
        assert_eq!(modules.len(), 2);
    }
}
