//! `slipway clean` command
//!
//! Both persisted caches (dependency artifacts, resolved toolchains) are
//! pure: removing them never loses correctness, only warm starts.

use anyhow::Result;

use slipway::util::fs::remove_dir_all_if_exists;
use slipway::util::shell::Status;
use slipway::util::Shell;
use slipway::GlobalContext;

use crate::cli::CleanArgs;

pub fn execute(args: CleanArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;

    if args.all {
        remove_dir_all_if_exists(&ctx.slipway_dir())?;
        shell.status(Status::Removed, ctx.slipway_dir().display());
        return Ok(());
    }

    for dir in [ctx.deps_dir(), ctx.scratch_dir(), ctx.dist_dir()] {
        remove_dir_all_if_exists(&dir)?;
        shell.status(Status::Removed, dir.display());
    }
    Ok(())
}
