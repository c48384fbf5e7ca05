//! Checks aggregation.
//!
//! Audit, policy, and formatting run once per toolchain against the whole
//! tree. Lint runs once per (unit, feature set) through the build graph,
//! cells dispatched in parallel. Aggregation never short-circuits: every
//! cell runs even when earlier ones fail, and the report keeps per-cell
//! status so a regression can be pinned to its exact coordinates.

pub mod report;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use rayon::prelude::*;
use tracing::debug;

use crate::builder::driver::BuildDriver;
use crate::builder::graph::{BuildError, BuildGraph};
use crate::builder::toolchain::Toolchain;
use crate::core::{FeatureSet, UnitRegistry};
use crate::util::shell::Progress;

pub use report::{CheckKind, CheckOutcome, CheckReport, CheckStatus};

/// Run all checks for one toolchain.
pub fn run_all(
    toolchain: &Toolchain,
    registry: &UnitRegistry,
    graph: &BuildGraph,
    driver: &dyn BuildDriver,
    root: &Path,
    progress: &Progress,
) -> Result<CheckReport> {
    let mut report = CheckReport::new(toolchain.name.as_str());

    debug!(toolchain = %toolchain.name, "running tree-wide checks");
    report.insert_single(
        CheckKind::Audit,
        status_from(driver.audit(root)?),
    );
    report.insert_single(
        CheckKind::Policy,
        status_from(driver.policy(root)?),
    );
    report.insert_single(
        CheckKind::Formatting,
        status_from(driver.fmt_check(root, toolchain.channel())?),
    );

    report.insert_matrix(
        CheckKind::Lint,
        lint_matrix(toolchain, registry, graph, progress)?,
    );

    Ok(report)
}

/// Number of lint cells a full run will execute.
pub fn lint_cell_count(registry: &UnitRegistry) -> usize {
    registry.units().map(|unit| unit.matrix().len()).sum()
}

fn status_from(report: crate::builder::driver::ExecReport) -> CheckStatus {
    if report.success {
        CheckStatus::pass()
    } else {
        CheckStatus::fail(report.diagnostics())
    }
}

fn lint_matrix(
    toolchain: &Toolchain,
    registry: &UnitRegistry,
    graph: &BuildGraph,
    progress: &Progress,
) -> Result<BTreeMap<String, BTreeMap<String, CheckStatus>>> {
    // Materialize all cells first so the scheduler sees the whole matrix;
    // cells are independent and run in any order.
    let cells: Vec<(&crate::core::BuildUnit, FeatureSet)> = registry
        .units()
        .flat_map(|unit| unit.matrix().into_iter().map(move |set| (unit, set)))
        .collect();

    let outcomes: Vec<(String, String, Result<CheckStatus, BuildError>)> = cells
        .into_par_iter()
        .map(|(unit, set)| {
            let status = graph.lint(toolchain, unit, &set).map(|outcome| {
                if outcome.passed {
                    CheckStatus::pass()
                } else {
                    CheckStatus::fail(outcome.diagnostics)
                }
            });
            progress.inc();
            (unit.name.clone(), set.name().to_string(), status)
        })
        .collect();

    let mut matrix: BTreeMap<String, BTreeMap<String, CheckStatus>> = BTreeMap::new();
    for (unit, set, status) in outcomes {
        // Infrastructure errors (as opposed to lint findings) still land
        // in the cell rather than aborting sibling cells.
        let status = status.unwrap_or_else(|e| CheckStatus::fail(format!("{e:#}")));
        matrix.entry(unit).or_default().insert(set, status);
    }
    Ok(matrix)
}
