//! Hierarchical check reports.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// The check kinds slipway runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// Dependency vulnerability audit. Once per toolchain.
    Audit,
    /// License/policy check. Once per toolchain.
    Policy,
    /// Source formatting. Once per toolchain.
    Formatting,
    /// Lint, once per (unit, feature set).
    Lint,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::Audit => "audit",
            CheckKind::Policy => "policy",
            CheckKind::Formatting => "formatting",
            CheckKind::Lint => "lint",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check or one lint cell.
#[derive(Debug, Clone, Serialize)]
pub struct CheckStatus {
    pub passed: bool,
    /// Diagnostics for failures, empty for clean passes.
    pub details: String,
}

impl CheckStatus {
    pub fn pass() -> Self {
        CheckStatus {
            passed: true,
            details: String::new(),
        }
    }

    pub fn fail(details: impl Into<String>) -> Self {
        CheckStatus {
            passed: false,
            details: details.into(),
        }
    }
}

/// Per-check result: flat for tree-wide checks, a unit × feature-set
/// matrix for lint.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CheckOutcome {
    Single(CheckStatus),
    Matrix(BTreeMap<String, BTreeMap<String, CheckStatus>>),
}

/// Full report for one toolchain run.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub toolchain: String,
    pub checks: BTreeMap<CheckKind, CheckOutcome>,
}

impl CheckReport {
    pub fn new(toolchain: impl Into<String>) -> Self {
        CheckReport {
            toolchain: toolchain.into(),
            checks: BTreeMap::new(),
        }
    }

    pub fn insert_single(&mut self, kind: CheckKind, status: CheckStatus) {
        self.checks.insert(kind, CheckOutcome::Single(status));
    }

    pub fn insert_matrix(
        &mut self,
        kind: CheckKind,
        matrix: BTreeMap<String, BTreeMap<String, CheckStatus>>,
    ) {
        self.checks.insert(kind, CheckOutcome::Matrix(matrix));
    }

    /// Whether every check and every matrix cell passed.
    pub fn passed(&self) -> bool {
        self.checks.values().all(|outcome| match outcome {
            CheckOutcome::Single(status) => status.passed,
            CheckOutcome::Matrix(matrix) => matrix
                .values()
                .all(|row| row.values().all(|status| status.passed)),
        })
    }

    /// Paths of failing cells, e.g. `lint/alpha/x+y`.
    pub fn failed_cells(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for (kind, outcome) in &self.checks {
            match outcome {
                CheckOutcome::Single(status) => {
                    if !status.passed {
                        failed.push(kind.to_string());
                    }
                }
                CheckOutcome::Matrix(matrix) => {
                    for (unit, row) in matrix {
                        for (set, status) in row {
                            if !status.passed {
                                failed.push(format!("{kind}/{unit}/{set}"));
                            }
                        }
                    }
                }
            }
        }
        failed
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Human-readable hierarchical rendering.
    pub fn render(&self) -> String {
        let mut out = format!("checks for toolchain `{}`\n", self.toolchain);
        for (kind, outcome) in &self.checks {
            match outcome {
                CheckOutcome::Single(status) => {
                    out.push_str(&format!("  {kind}: {}\n", mark(status)));
                    if !status.passed && !status.details.is_empty() {
                        for line in status.details.lines().take(20) {
                            out.push_str(&format!("      {line}\n"));
                        }
                    }
                }
                CheckOutcome::Matrix(matrix) => {
                    out.push_str(&format!("  {kind}:\n"));
                    for (unit, row) in matrix {
                        out.push_str(&format!("    {unit}:\n"));
                        for (set, status) in row {
                            out.push_str(&format!("      {set}: {}\n", mark(status)));
                        }
                    }
                }
            }
        }
        out
    }
}

fn mark(status: &CheckStatus) -> &'static str {
    if status.passed {
        "ok"
    } else {
        "FAILED"
    }
}
