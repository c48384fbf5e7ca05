//! `slipway package` command

use std::sync::Arc;

use anyhow::Result;

use slipway::ops::{self, PackageOptions};
use slipway::util::Shell;
use slipway::{CommandDriver, GlobalContext};

use crate::cli::PackageArgs;

pub fn execute(args: PackageArgs, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let driver = Arc::new(CommandDriver::from_path()?);

    let options = PackageOptions {
        unit: args.unit,
        platform: args.platform,
        toolchain: args.toolchain,
        features: args.features,
        certificate: args.cert,
        private_key: args.key,
    };

    let artifact = ops::package(&options, &ctx, driver, shell)?;
    println!("{}", artifact.path().display());
    Ok(())
}
