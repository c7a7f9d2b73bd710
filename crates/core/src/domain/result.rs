// Check Result - aggregate of findings for one inspection run

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::finding::{Finding, Severity};

/// column -> findings, in insertion order
pub type ColumnBuckets = BTreeMap<u32, Vec<Finding>>;

/// line -> column buckets
pub type LineBuckets = BTreeMap<u32, ColumnBuckets>;

/// file -> line buckets
pub type FindingMap = BTreeMap<String, LineBuckets>;

/// A check that failed to execute (not a finding, never counted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckFailure {
    pub check: String,
    pub reason: String,
}

#[derive(Debug, Default, Clone)]
struct ResultState {
    findings: FindingMap,
    failures: Vec<CheckFailure>,
}

/// Mutable aggregator shared by all checks of a run.
///
/// Appends go through a single lock so concurrent static checks never lose
/// updates. Counts are always computed from the stored findings.
#[derive(Debug, Default)]
pub struct CheckResult {
    state: Mutex<ResultState>,
}

impl CheckResult {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResultState> {
        // A panicking check must not make the findings of its siblings unreachable
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a finding to its `(file, line, column)` bucket
    pub fn add_finding(&self, finding: Finding) {
        let mut state = self.lock();
        state
            .findings
            .entry(finding.file.clone())
            .or_default()
            .entry(finding.line)
            .or_default()
            .entry(finding.column)
            .or_default()
            .push(finding);
    }

    /// Record that a check could not run to completion
    pub fn record_failure(&self, check: impl Into<String>, reason: impl Into<String>) {
        self.lock().failures.push(CheckFailure {
            check: check.into(),
            reason: reason.into(),
        });
    }

    pub fn get_errors(&self) -> FindingMap {
        self.filtered(Severity::Error)
    }

    pub fn get_warnings(&self) -> FindingMap {
        self.filtered(Severity::Warning)
    }

    pub fn get_error_count(&self) -> usize {
        self.count(Severity::Error)
    }

    pub fn get_warning_count(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn failed_checks(&self) -> Vec<CheckFailure> {
        self.lock().failures.clone()
    }

    pub fn has_failures(&self) -> bool {
        !self.lock().failures.is_empty()
    }

    /// All findings in file/line/column order
    pub fn findings(&self) -> Vec<Finding> {
        let state = self.lock();
        state
            .findings
            .values()
            .flat_map(|lines| lines.values())
            .flat_map(|columns| columns.values())
            .flatten()
            .cloned()
            .collect()
    }

    /// Serializable snapshot for the reporting layer
    pub fn to_report(&self) -> ResultReport {
        ResultReport {
            error_count: self.get_error_count(),
            warning_count: self.get_warning_count(),
            errors: self.get_errors(),
            warnings: self.get_warnings(),
            failed_checks: self.failed_checks(),
        }
    }

    fn filtered(&self, severity: Severity) -> FindingMap {
        let state = self.lock();
        let mut out = FindingMap::new();
        for (file, lines) in &state.findings {
            for (line, columns) in lines {
                for (column, findings) in columns {
                    let matching: Vec<Finding> = findings
                        .iter()
                        .filter(|f| f.severity == severity)
                        .cloned()
                        .collect();
                    if matching.is_empty() {
                        continue;
                    }
                    out.entry(file.clone())
                        .or_default()
                        .entry(*line)
                        .or_default()
                        .insert(*column, matching);
                }
            }
        }
        out
    }

    fn count(&self, severity: Severity) -> usize {
        let state = self.lock();
        state
            .findings
            .values()
            .flat_map(|lines| lines.values())
            .flat_map(|columns| columns.values())
            .flatten()
            .filter(|f| f.severity == severity)
            .count()
    }
}

impl Clone for CheckResult {
    fn clone(&self) -> Self {
        Self {
            state: Mutex::new(self.lock().clone()),
        }
    }
}

/// Read-once view of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct ResultReport {
    pub error_count: usize,
    pub warning_count: usize,
    pub errors: FindingMap,
    pub warnings: FindingMap,
    pub failed_checks: Vec<CheckFailure>,
}
