//! Build issues and the run-wide issue collector.
//!
//! Every recoverable problem found while building or deploying is a
//! [`BuildIssue`] with a stable `{CATEGORY}_{NUMBER}` code. Issues are only ever
//! appended; display code filters and groups them.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Severity of a build issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Stops the affected item and makes the run exit non-zero.
    Error,
    /// Printed, but does not change the exit code unless strict.
    Warning,
    /// Informational.
    Hint,
}

/// Category prefix of an issue code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum IssueCategory {
    /// Module discovery.
    #[serde(rename = "MOD")]
    Module,
    /// Variable resolution.
    #[serde(rename = "VAR")]
    Variable,
    /// Resource parsing and normalization.
    #[serde(rename = "RES")]
    Resource,
    /// Dependency validation.
    #[serde(rename = "DEP")]
    Dependency,
    /// Environment configuration.
    #[serde(rename = "CFG")]
    Config,
}

/// Stable issue code, rendered as `{CATEGORY}_{NUMBER:03}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IssueCode {
    category: IssueCategory,
    number: u16,
}

impl IssueCode {
    /// Module root does not exist.
    pub const MOD_001: Self = Self::new(IssueCategory::Module, 1);
    /// Module candidate without recognized resource folders.
    pub const MOD_002: Self = Self::new(IssueCategory::Module, 2);
    /// Unrecognized folder inside a module.
    pub const MOD_003: Self = Self::new(IssueCategory::Module, 3);
    /// Resource folder kind is disabled.
    pub const MOD_004: Self = Self::new(IssueCategory::Module, 4);
    /// Two modules share a name.
    pub const MOD_005: Self = Self::new(IssueCategory::Module, 5);
    /// Selection entry matches no module.
    pub const MOD_006: Self = Self::new(IssueCategory::Module, 6);
    /// Unresolved `{{ variable }}`.
    pub const VAR_001: Self = Self::new(IssueCategory::Variable, 1);
    /// Module variable never referenced.
    pub const VAR_002: Self = Self::new(IssueCategory::Variable, 2);
    /// Unresolved `${ENV_VAR}`.
    pub const VAR_003: Self = Self::new(IssueCategory::Variable, 3);
    /// `<change_me>` placeholder left in content.
    pub const VAR_005: Self = Self::new(IssueCategory::Variable, 5);
    /// Declaration could not be parsed.
    pub const RES_001: Self = Self::new(IssueCategory::Resource, 1);
    /// Required field missing.
    pub const RES_002: Self = Self::new(IssueCategory::Resource, 2);
    /// Unknown field.
    pub const RES_003: Self = Self::new(IssueCategory::Resource, 3);
    /// Duplicate identifier.
    pub const RES_004: Self = Self::new(IssueCategory::Resource, 4);
    /// File name does not map to a resource kind.
    pub const RES_005: Self = Self::new(IssueCategory::Resource, 5);
    /// Missing dependency, no live lookup.
    pub const DEP_001: Self = Self::new(IssueCategory::Dependency, 1);
    /// Missing dependency confirmed by, or unverifiable through, the platform.
    pub const DEP_002: Self = Self::new(IssueCategory::Dependency, 2);
    /// Module configuration file could not be parsed.
    pub const CFG_001: Self = Self::new(IssueCategory::Config, 1);
    /// Environment name does not match the config file.
    pub const CFG_002: Self = Self::new(IssueCategory::Config, 2);

    /// Creates a code from its parts.
    #[must_use]
    pub const fn new(category: IssueCategory, number: u16) -> Self {
        Self { category, number }
    }

    /// Returns the category of this code.
    #[must_use]
    pub const fn category(&self) -> IssueCategory {
        self.category
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Module => "MOD",
            Self::Variable => "VAR",
            Self::Resource => "RES",
            Self::Dependency => "DEP",
            Self::Config => "CFG",
        };
        write!(f, "{s}")
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:03}", self.category, self.number)
    }
}

impl Serialize for IssueCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Hint => "hint",
        };
        write!(f, "{s}")
    }
}

/// A single recoverable problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildIssue {
    /// Severity.
    pub severity: Severity,
    /// Stable code.
    pub code: IssueCode,
    /// Human-readable message.
    pub message: String,
    /// File the issue refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
    /// Suggested fix.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl BuildIssue {
    /// Creates an error-severity issue.
    #[must_use]
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Creates a warning-severity issue.
    #[must_use]
    pub fn warning(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Creates a hint-severity issue.
    #[must_use]
    pub fn hint(code: IssueCode, message: impl Into<String>) -> Self {
        Self::new(Severity::Hint, code, message)
    }

    fn new(severity: Severity, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            location: None,
            suggestion: None,
        }
    }

    /// Returns true for error-severity issues.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Attaches a file location.
    #[must_use]
    pub fn at(mut self, path: impl AsRef<Path>) -> Self {
        self.location = Some(path.as_ref().to_path_buf());
        self
    }

    /// Attaches a fix suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for BuildIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)?;
        if let Some(location) = &self.location {
            write!(f, " ({})", location.display())?;
        }
        Ok(())
    }
}

/// Append-only issue sink shared by every stage of a run.
///
/// Appends are serialized through a mutex so that parallel stages can report
/// into the same collector.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Mutex<Vec<BuildIssue>>,
}

impl IssueCollector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one issue.
    pub fn push(&self, issue: BuildIssue) {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(issue);
    }

    /// Appends several issues, keeping their order.
    pub fn extend(&self, issues: impl IntoIterator<Item = BuildIssue>) {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(issues);
    }

    /// Returns a snapshot of all issues in append order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BuildIssue> {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of issues with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|i| i.severity == severity)
            .count()
    }

    /// Returns true if any error-severity issue was recorded.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    /// Returns the issues carrying the given code.
    #[must_use]
    pub fn with_code(&self, code: IssueCode) -> Vec<BuildIssue> {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|i| i.code == code)
            .cloned()
            .collect()
    }

    /// Groups issues by severity, then category, for the end-of-run summary.
    #[must_use]
    pub fn grouped(&self) -> BTreeMap<(Severity, IssueCategory), Vec<BuildIssue>> {
        let mut groups: BTreeMap<(Severity, IssueCategory), Vec<BuildIssue>> = BTreeMap::new();
        for issue in self.snapshot() {
            groups
                .entry((issue.severity, issue.code.category()))
                .or_default()
                .push(issue);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_display() {
        assert_eq!(IssueCode::MOD_002.to_string(), "MOD_002");
        assert_eq!(IssueCode::VAR_005.to_string(), "VAR_005");
        assert_eq!(IssueCode::DEP_001.to_string(), "DEP_001");
    }

    #[test]
    fn test_collector_counts_and_groups() {
        let collector = IssueCollector::new();
        collector.push(BuildIssue::warning(IssueCode::VAR_001, "unresolved"));
        collector.push(BuildIssue::error(IssueCode::RES_001, "bad yaml").at("a.yaml"));
        collector.push(BuildIssue::warning(IssueCode::RES_003, "unknown field"));

        assert!(collector.has_errors());
        assert_eq!(collector.count(Severity::Warning), 2);

        let groups = collector.grouped();
        let keys: Vec<_> = groups.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                (Severity::Error, IssueCategory::Resource),
                (Severity::Warning, IssueCategory::Variable),
                (Severity::Warning, IssueCategory::Resource),
            ]
        );
    }

    #[test]
    fn test_issue_serializes_code_as_string() {
        let issue = BuildIssue::hint(IssueCode::VAR_002, "unused").with_suggestion("remove it");
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "VAR_002");
        assert_eq!(json["severity"], "hint");
        assert_eq!(json["suggestion"], "remove it");
    }
}
