//! `slipway build` command

use std::sync::Arc;

use anyhow::Result;

use slipway::ops::{self, BuildOptions};
use slipway::util::Shell;
use slipway::{CommandDriver, GlobalContext};

use crate::cli::BuildArgs;

pub fn execute(args: BuildArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let driver = Arc::new(CommandDriver::from_path()?);

    let options = BuildOptions {
        unit: args.unit,
        toolchain: args.toolchain,
        platform: args.platform,
        features: args.features,
        with_deps: !args.no_deps,
        certificate: args.cert,
        private_key: args.key,
    };

    let artifact = ops::build(&options, &ctx, driver, shell)?;
    println!("{}", artifact.path().display());
    Ok(())
}
