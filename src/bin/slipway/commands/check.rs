//! `slipway check` command

use std::sync::Arc;

use anyhow::{bail, Result};

use slipway::ops::{self, CheckOptions, ReportFormat};
use slipway::util::Shell;
use slipway::{CommandDriver, GlobalContext};

use crate::cli::CheckArgs;

pub fn execute(args: CheckArgs, shell: &Shell) -> Result<()> {
    let format: ReportFormat = args.format.parse().map_err(anyhow::Error::msg)?;
    let ctx = GlobalContext::new()?;
    let driver = Arc::new(CommandDriver::from_path()?);

    let options = CheckOptions {
        toolchain: args.toolchain,
        format,
    };
    let report = ops::check(&options, &ctx, driver, shell)?;

    match format {
        ReportFormat::Human => print!("{}", report.render()),
        ReportFormat::Json => println!("{}", report.to_json()),
    }

    if !report.passed() {
        let failed = report.failed_cells();
        bail!("{} check cell(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
