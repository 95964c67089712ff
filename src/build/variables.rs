//! Variable scopes and placeholder substitution.
//!
//! `{{ name }}` placeholders are resolved at build time from the environment
//! configuration and module defaults. `${NAME}` placeholders are a separate
//! namespace resolved from the process environment when a build is loaded
//! for deploy.

use regex::{Captures, Regex};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, trace};

use super::discovery::Module;
use super::issue::{BuildIssue, IssueCode, IssueCollector};

/// Per-module defaults file.
pub const MODULE_DEFAULTS_FILE: &str = "default.config.yaml";

#[allow(clippy::expect_used)]
static TEMPLATE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_][A-Za-z0-9_.\-]*)\s*\}\}").expect("template pattern is valid")
});

#[allow(clippy::expect_used)]
static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env pattern is valid")
});

#[allow(clippy::expect_used)]
static CHANGE_ME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<change[_-]me>").expect("change-me pattern is valid"));

/// Variables available to a build run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableScope {
    /// Variables visible to every module.
    pub global: BTreeMap<String, Value>,
    /// Module-scoped variables keyed by module relative path.
    pub modules: BTreeMap<String, BTreeMap<String, Value>>,
    /// Module name to relative path, for `module.variable` lookups.
    module_paths: BTreeMap<String, String>,
    /// Variables declared specifically for each module.
    declared: BTreeMap<String, BTreeSet<String>>,
}

impl VariableScope {
    /// Builds the scope from the `variables:` tree, `MODKIT_VAR_*` overrides
    /// and each module's defaults file.
    ///
    /// Unreadable defaults files are reported and treated as empty.
    #[must_use]
    pub fn build(
        variables: &Mapping,
        overrides: &BTreeMap<String, String>,
        modules: &[Module],
        issues: &IssueCollector,
    ) -> Self {
        let mut scope = Self::default();

        scope.global.extend(scalar_entries(variables));
        for (name, value) in overrides {
            scope.global.insert(name.clone(), Value::String(value.clone()));
        }

        for module in modules {
            let mut vars = load_module_defaults(&module.path.join(MODULE_DEFAULTS_FILE), issues);
            let mut declared: BTreeSet<String> = vars.keys().cloned().collect();

            // Deeper entries of the variables tree win over shallower ones.
            let mut node = Some(variables);
            let segments: Vec<&str> = module.relative_path.split('/').collect();
            for (depth, segment) in segments.iter().enumerate() {
                node = node
                    .and_then(|n| n.get(*segment))
                    .and_then(Value::as_mapping);
                let Some(current) = node else { break };
                let entries = scalar_entries(current);
                if depth + 1 == segments.len() {
                    declared.extend(entries.keys().cloned());
                }
                vars.extend(entries);
            }

            scope
                .module_paths
                .insert(module.name.clone(), module.relative_path.clone());
            scope.declared.insert(module.relative_path.clone(), declared);
            scope.modules.insert(module.relative_path.clone(), vars);
        }

        debug!(
            "Variable scope: {} global, {} module scopes",
            scope.global.len(),
            scope.modules.len()
        );
        scope
    }

    /// Looks `name` up for a module: module scope, then global, then
    /// `module.variable` as a variable of another module.
    #[must_use]
    pub fn lookup(&self, name: &str, module_path: &str) -> Option<&Value> {
        if let Some(value) = self.modules.get(module_path).and_then(|m| m.get(name)) {
            return Some(value);
        }
        if let Some(value) = self.global.get(name) {
            return Some(value);
        }
        let (module_name, var) = name.split_once('.')?;
        let path = self.module_paths.get(module_name)?;
        self.modules.get(path).and_then(|m| m.get(var))
    }

    /// Module-declared variables that none of `used` refers to.
    #[must_use]
    pub fn unused(&self, module_path: &str, used: &BTreeSet<String>) -> Vec<String> {
        self.declared
            .get(module_path)
            .map(|declared| declared.difference(used).cloned().collect())
            .unwrap_or_default()
    }
}

/// Non-mapping entries with string keys.
fn scalar_entries(mapping: &Mapping) -> BTreeMap<String, Value> {
    mapping
        .iter()
        .filter(|(_, v)| !v.is_mapping())
        .filter_map(|(k, v)| k.as_str().map(|k| (k.to_string(), v.clone())))
        .collect()
}

fn load_module_defaults(path: &Path, issues: &IssueCollector) -> BTreeMap<String, Value> {
    if !path.is_file() {
        return BTreeMap::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|content| {
            if content.trim().is_empty() {
                return Ok(Mapping::new());
            }
            serde_yaml::from_str::<Mapping>(&content).map_err(|e| e.to_string())
        });
    match parsed {
        Ok(mapping) => scalar_entries(&mapping),
        Err(message) => {
            issues.push(
                BuildIssue::error(
                    IssueCode::CFG_001,
                    format!("Module defaults could not be parsed: {message}"),
                )
                .at(path),
            );
            BTreeMap::new()
        }
    }
}

/// Text inserted for a variable value.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::from("null"),
        Value::Tagged(tagged) => render_value(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => serde_json::to_string(value)
            .unwrap_or_else(|_| serde_yaml::to_string(value).unwrap_or_default().trim().to_string()),
    }
}

/// One performed substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substitution {
    /// Variable name as written.
    pub name: String,
    /// Inserted text.
    pub value: String,
    /// File the substitution happened in.
    pub file: PathBuf,
}

/// One placeholder left in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedVariable {
    /// Variable name as written.
    pub name: String,
    /// File the placeholder is in.
    pub file: PathBuf,
}

/// Output of resolving one file.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContent {
    /// Content after substitution.
    pub content: String,
    /// Substitutions in order of appearance.
    pub substitutions: Vec<Substitution>,
    /// Unresolved placeholders in order of appearance.
    pub unresolved: Vec<UnresolvedVariable>,
    /// Issues raised for this file.
    pub issues: Vec<BuildIssue>,
}

impl ResolvedContent {
    /// Names used by this file, including the variable part of
    /// `module.variable` references.
    #[must_use]
    pub fn used_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for s in &self.substitutions {
            names.insert(s.name.clone());
            if let Some((_, var)) = s.name.split_once('.') {
                names.insert(var.to_string());
            }
        }
        names
    }
}

/// Substitutes `{{ name }}` placeholders from a [`VariableScope`].
#[derive(Debug, Clone, Copy)]
pub struct VariableResolver<'a> {
    scope: &'a VariableScope,
    env_name: &'a str,
}

impl<'a> VariableResolver<'a> {
    /// Creates a resolver for the environment `env_name`.
    #[must_use]
    pub const fn new(scope: &'a VariableScope, env_name: &'a str) -> Self {
        Self { scope, env_name }
    }

    /// Resolves every placeholder in `content`.
    ///
    /// Unresolved placeholders stay untouched and raise one `VAR_001` per
    /// name. `<change_me>` markers left after substitution raise `VAR_005`.
    #[must_use]
    pub fn resolve(&self, content: &str, file: &Path, module: &Module) -> ResolvedContent {
        let mut substitutions = Vec::new();
        let mut unresolved = Vec::new();

        let resolved = TEMPLATE_VAR.replace_all(content, |caps: &Captures<'_>| {
            let name = &caps[1];
            if let Some(value) = self.scope.lookup(name, &module.relative_path) {
                let value = render_value(value);
                trace!("{}: {{{{ {name} }}}} -> {value}", file.display());
                substitutions.push(Substitution {
                    name: name.to_string(),
                    value: value.clone(),
                    file: file.to_path_buf(),
                });
                value
            } else {
                unresolved.push(UnresolvedVariable {
                    name: name.to_string(),
                    file: file.to_path_buf(),
                });
                caps[0].to_string()
            }
        });
        let content = resolved.into_owned();

        let mut issues = Vec::new();
        let mut reported = BTreeSet::new();
        for var in &unresolved {
            if !reported.insert(var.name.as_str()) {
                continue;
            }
            let suggestion = if var.name.contains('.') {
                format!(
                    "Define it in {}/{MODULE_DEFAULTS_FILE}",
                    module.relative_path
                )
            } else {
                format!("Define it under `variables:` in config.{}.yaml", self.env_name)
            };
            issues.push(
                BuildIssue::warning(
                    IssueCode::VAR_001,
                    format!("Variable '{}' is not defined", var.name),
                )
                .at(file)
                .with_suggestion(suggestion),
            );
        }

        let markers = CHANGE_ME.find_iter(&content).count();
        if markers > 0 {
            issues.push(
                BuildIssue::warning(
                    IssueCode::VAR_005,
                    format!("{markers} <change_me> placeholder(s) left after substitution"),
                )
                .at(file)
                .with_suggestion("Set a real value for every <change_me> variable"),
            );
        }

        ResolvedContent {
            content,
            substitutions,
            unresolved,
            issues,
        }
    }
}

/// Replaces `${NAME}` with values from `lookup`.
///
/// Missing names are left in place and reported once each as `VAR_003`.
pub fn substitute_env(
    content: &str,
    file: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> (String, Vec<BuildIssue>) {
    let mut missing = BTreeSet::new();
    let replaced = ENV_VAR.replace_all(content, |caps: &Captures<'_>| {
        lookup(&caps[1]).unwrap_or_else(|| {
            missing.insert(caps[1].to_string());
            caps[0].to_string()
        })
    });
    let content = replaced.into_owned();
    let issues = missing
        .into_iter()
        .map(|name| {
            BuildIssue::warning(
                IssueCode::VAR_003,
                format!("Environment variable '{name}' is not set"),
            )
            .at(file)
            .with_suggestion(format!("Export {name} or add it to .env"))
        })
        .collect();
    (content, issues)
}
