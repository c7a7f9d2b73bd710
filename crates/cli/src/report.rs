// Report rendering (table or JSON) and exit status

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

use plugin_check_core::domain::{CheckFailure, CheckResult, Finding, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Which severities make it into the report
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportFilter {
    pub ignore_errors: bool,
    pub ignore_warnings: bool,
}

impl ReportFilter {
    fn keeps(&self, finding: &Finding) -> bool {
        match finding.severity {
            Severity::Error => !self.ignore_errors,
            Severity::Warning => !self.ignore_warnings,
        }
    }
}

#[derive(Tabled)]
struct FindingRow {
    file: String,
    line: u32,
    column: u32,
    #[tabled(rename = "type")]
    severity: String,
    code: String,
    message: String,
}

impl From<&Finding> for FindingRow {
    fn from(finding: &Finding) -> Self {
        Self {
            file: finding.file.clone(),
            line: finding.line,
            column: finding.column,
            severity: finding.severity.to_string(),
            code: finding.code.clone(),
            message: finding.message.clone(),
        }
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    plugin: &'a str,
    error_count: usize,
    warning_count: usize,
    findings: &'a [Finding],
    failed_checks: &'a [CheckFailure],
}

/// Rendered report plus what it implies for the exit status
pub struct Report {
    plugin: String,
    findings: Vec<Finding>,
    failed_checks: Vec<CheckFailure>,
}

impl Report {
    pub fn new(plugin: impl Into<String>, result: &CheckResult, filter: ReportFilter) -> Self {
        Self {
            plugin: plugin.into(),
            findings: result
                .findings()
                .into_iter()
                .filter(|f| filter.keeps(f))
                .collect(),
            failed_checks: result.failed_checks(),
        }
    }

    fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&JsonReport {
                plugin: &self.plugin,
                error_count: self.count(Severity::Error),
                warning_count: self.count(Severity::Warning),
                findings: &self.findings,
                failed_checks: &self.failed_checks,
            })?),
            OutputFormat::Table => Ok(self.render_table()),
        }
    }

    fn render_table(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{}\n\n", format!("Plugin: {}", self.plugin).cyan().bold()));

        if self.findings.is_empty() {
            out.push_str(&format!("{}\n", "✓ No issues found".green().bold()));
        } else {
            let rows: Vec<FindingRow> = self.findings.iter().map(FindingRow::from).collect();
            out.push_str(&Table::new(rows).to_string());
            out.push('\n');
        }

        for failure in &self.failed_checks {
            out.push_str(&format!(
                "{} {}: {}\n",
                "✗ Check failed".red().bold(),
                failure.check,
                failure.reason
            ));
        }

        out.push_str(&format!(
            "\n  {} {}\n  {} {}\n",
            "Errors:".bold(),
            self.count(Severity::Error).to_string().red(),
            "Warnings:".bold(),
            self.count(Severity::Warning).to_string().yellow()
        ));
        out
    }

    /// 2 when a check failed to execute, 1 when errors are reported
    pub fn exit_status(&self) -> u8 {
        if !self.failed_checks.is_empty() {
            2
        } else if self.count(Severity::Error) > 0 {
            1
        } else {
            0
        }
    }
}
