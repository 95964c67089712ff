//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! build and deploy results in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::build::{BuildIssue, IssueCollector, Severity};
use crate::deployer::{BuildOutcome, DeployOutcome};
use crate::planner::{DeploymentPlan, DiffResult, ExecutionReport, Mode};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
    /// Show fix suggestions inline.
    verbose: bool,
}

/// Per-kind count row for table display.
#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Created")]
    created: String,
    #[tabled(rename = "Updated")]
    updated: String,
    #[tabled(rename = "Deleted")]
    deleted: String,
    #[tabled(rename = "Unchanged")]
    unchanged: usize,
    #[tabled(rename = "Skipped")]
    skipped: usize,
}

/// Plan change row for table display.
#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Source")]
    source: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat, verbose: bool) -> Self {
        Self { format, verbose }
    }

    /// Returns true for JSON output.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Formats the result of a build.
    #[must_use]
    pub fn format_build(&self, outcome: &BuildOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = self.format_issues(&outcome.issues);
                let _ = writeln!(
                    output,
                    "\nBuilt {} resources from {} modules into {} files",
                    outcome.resources.to_string().bold(),
                    outcome.modules,
                    outcome.manifest.files.len()
                );
                output
            }
        }
    }

    /// Formats the result of a deploy or clean.
    #[must_use]
    pub fn format_deploy(&self, outcome: &DeployOutcome) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = self.format_issues(&outcome.issues);
                if let (Some(plan), Some(report)) = (&outcome.plan, &outcome.report) {
                    if report.dry_run {
                        output.push_str(&Self::format_plan_text(plan));
                    }
                    output.push_str(&Self::format_report_text(report));
                }
                output
            }
        }
    }

    /// Formats a plan as a table of changes.
    fn format_plan_text(plan: &DeploymentPlan) -> String {
        if plan.is_empty() {
            return format!("\n{} No changes required\n", "✓".green());
        }

        let rows: Vec<ChangeRow> = plan
            .kinds
            .iter()
            .flat_map(|k| k.items.iter())
            .filter(|i| i.diff.is_change())
            .map(|i| ChangeRow {
                action: Self::format_action(&i.diff),
                resource: i.identifier.to_string(),
                source: i
                    .source
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            })
            .collect();

        let mut output = format!("\nPlan ({} changes)\n", plan.change_count());
        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }
        for kind in &plan.kinds {
            if let Some(failure) = &kind.read_failure {
                let _ = writeln!(
                    output,
                    "{} {} not planned: {}",
                    "⚠".yellow(),
                    kind.kind,
                    failure.message
                );
            }
        }
        output
    }

    /// Formats an execution report as a per-kind table.
    fn format_report_text(report: &ExecutionReport) -> String {
        let mut output = String::new();
        let verb = match (report.mode, report.dry_run) {
            (Mode::Deploy, false) => "Deploy",
            (Mode::Deploy, true) => "Deploy (dry run)",
            (Mode::Clean, false) => "Clean",
            (Mode::Clean, true) => "Clean (dry run)",
        };
        let _ = writeln!(output, "\n{verb}");

        let rows: Vec<KindRow> = report
            .counts
            .iter()
            .map(|(kind, c)| KindRow {
                kind: kind.to_string(),
                created: Self::colored_count(c.created, |s| s.green().to_string()),
                updated: Self::colored_count(c.updated, |s| s.yellow().to_string()),
                deleted: Self::colored_count(c.deleted, |s| s.red().to_string()),
                unchanged: c.unchanged,
                skipped: c.skipped,
            })
            .collect();
        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        if !report.failures.is_empty() {
            let _ = write!(output, "\n{} Failures:\n", "✗".red());
            for failure in &report.failures {
                let _ = writeln!(output, "   - {}: {}", failure.identifier, failure.message);
            }
        }
        if report.cancelled {
            let _ = writeln!(output, "\n{} Cancelled; remaining items were skipped", "⚠".yellow());
        }

        let _ = writeln!(output, "\n{report}");
        output
    }

    /// Formats issues grouped by severity, then category.
    #[must_use]
    pub fn format_issues(&self, issues: &[BuildIssue]) -> String {
        let mut output = String::new();
        if issues.is_empty() {
            return output;
        }

        let collector = IssueCollector::new();
        collector.extend(issues.iter().cloned());
        for ((severity, category), group) in collector.grouped() {
            let _ = writeln!(
                output,
                "\n{} {category} ({})",
                Self::format_severity(severity),
                group.len()
            );
            for issue in group {
                let _ = write!(output, "   {} {}", issue.code, issue.message);
                if let Some(location) = &issue.location {
                    let _ = write!(output, " [{}]", location.display());
                }
                if self.verbose {
                    if let Some(suggestion) = &issue.suggestion {
                        let _ = write!(output, " {} {suggestion}", "fix:".cyan());
                    }
                }
                output.push('\n');
            }
        }

        let _ = writeln!(
            output,
            "\n{} errors, {} warnings, {} hints",
            collector.count(Severity::Error),
            collector.count(Severity::Warning),
            collector.count(Severity::Hint)
        );
        output
    }

    /// Formats a diff action with color.
    fn format_action(diff: &DiffResult) -> String {
        match diff {
            DiffResult::ToCreate => "+create".green().to_string(),
            DiffResult::ToUpdate(_) => format!("~{diff}").yellow().to_string(),
            DiffResult::ToDelete => "-delete".red().to_string(),
            DiffResult::Unchanged => "unchanged".dimmed().to_string(),
        }
    }

    /// Formats a severity with color.
    fn format_severity(severity: Severity) -> String {
        match severity {
            Severity::Error => "error".red().bold().to_string(),
            Severity::Warning => "warning".yellow().bold().to_string(),
            Severity::Hint => "hint".cyan().to_string(),
        }
    }

    fn colored_count(count: usize, paint: impl Fn(&str) -> String) -> String {
        if count == 0 {
            count.to_string()
        } else {
            paint(&count.to_string())
        }
    }

    /// Formats a fatal error.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }
}
