//! Implementation of `slipway check`.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::builder::driver::BuildDriver;
use crate::builder::graph::BuildGraph;
use crate::builder::platform::PlatformRegistry;
use crate::builder::toolchain::ToolchainManager;
use crate::checks::{self, CheckReport};
use crate::core::UnitRegistry;
use crate::util::shell::Status;
use crate::util::{GlobalContext, Shell};

/// How the report is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Human,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(ReportFormat::Human),
            "json" => Ok(ReportFormat::Json),
            _ => Err(format!(
                "invalid report format '{s}'; expected 'human' or 'json'"
            )),
        }
    }
}

/// Options for the check operation.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub toolchain: String,
    pub format: ReportFormat,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            toolchain: "stable".to_string(),
            format: ReportFormat::Human,
        }
    }
}

/// Run every check for one toolchain and return the hierarchical report.
pub fn check(
    options: &CheckOptions,
    ctx: &GlobalContext,
    driver: Arc<dyn BuildDriver>,
    shell: &Shell,
) -> Result<CheckReport> {
    let start = Instant::now();

    let platforms = PlatformRegistry::new(&ctx.config().platforms)?;
    shell.status(Status::Resolving, format!("toolchain `{}`", options.toolchain));
    let manager = ToolchainManager::new(
        Arc::clone(&driver),
        ctx.config().msrv_channel.clone(),
        platforms.foreign_triples(),
    )
    .with_stamp_dir(ctx.toolchain_dir());
    let toolchain = manager.resolve(&options.toolchain)?;

    let metadata = driver
        .metadata(ctx.root())
        .context("failed to query source tree metadata")?;
    let registry = UnitRegistry::parse(&metadata)?;

    let cells = checks::lint_cell_count(&registry);
    shell.status(
        Status::Checking,
        format!("{} units, {} lint cells", registry.len(), cells),
    );

    let graph = BuildGraph::new(Arc::clone(&driver), ctx);
    let progress = shell.progress(cells as u64, "linting");
    let report = checks::run_all(
        &toolchain,
        &registry,
        &graph,
        driver.as_ref(),
        ctx.root(),
        &progress,
    )?;
    progress.finish();

    let status = if report.passed() {
        Status::Finished
    } else {
        Status::Error
    };
    shell.status(
        status,
        format!(
            "checks for `{}` in {}",
            toolchain.name,
            crate::util::shell::format_duration(start.elapsed())
        ),
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, ScriptedDriver};

    #[test]
    fn report_format_parses() {
        assert_eq!("human".parse::<ReportFormat>().unwrap(), ReportFormat::Human);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("yaml".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn check_reports_exact_failing_cell() {
        let (ctx, _tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::with_units(&[
            ("alpha", &["x", "y"]),
            ("beta", &["z"]),
        ]));
        driver.fail_lint("alpha", "x+y", "needless borrow");

        let options = CheckOptions::default();
        let report = check(&options, &ctx, driver.clone(), &Shell::default()).unwrap();

        assert!(!report.passed());
        assert_eq!(report.failed_cells(), vec!["lint/alpha/x+y"]);
        // alpha: 5 cells, beta: 3 cells, all executed.
        assert_eq!(driver.lint_invocations(), 8);
    }

    #[test]
    fn clean_tree_passes_all_checks() {
        let (ctx, _tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::with_units(&[("alpha", &[])]));

        let report = check(&CheckOptions::default(), &ctx, driver, &Shell::default()).unwrap();
        assert!(report.passed());
        assert!(report.failed_cells().is_empty());
    }
}
