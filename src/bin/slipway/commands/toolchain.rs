//! `slipway toolchain` command

use std::sync::Arc;

use anyhow::Result;

use slipway::util::shell::Status;
use slipway::util::Shell;
use slipway::{CommandDriver, GlobalContext, PlatformRegistry, ToolchainManager, ToolchainName};

use crate::cli::{ToolchainArgs, ToolchainCommands};

pub fn execute(args: ToolchainArgs, shell: &Shell) -> Result<()> {
    match args.command {
        ToolchainCommands::List => list(),
        ToolchainCommands::Resolve { name } => resolve(&name, shell),
    }
}

fn list() -> Result<()> {
    let ctx = GlobalContext::new()?;
    for name in ToolchainName::ALL {
        let channel = match name {
            ToolchainName::Msrv => ctx.config().msrv_channel.clone(),
            other => other.as_str().to_string(),
        };
        println!("{:<10} -> {}", name.as_str(), channel);
    }
    Ok(())
}

fn resolve(name: &str, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?;
    let driver = Arc::new(CommandDriver::from_path()?);
    let platforms = PlatformRegistry::new(&ctx.config().platforms)?;

    let manager = ToolchainManager::new(
        driver,
        ctx.config().msrv_channel.clone(),
        platforms.foreign_triples(),
    )
    .with_stamp_dir(ctx.toolchain_dir());
    let toolchain = manager.resolve(name)?;

    shell.status(
        Status::Finished,
        format!(
            "toolchain `{}` resolved to channel `{}`",
            toolchain.name,
            toolchain.channel()
        ),
    );
    for target in &toolchain.targets {
        println!("target {target}");
    }
    Ok(())
}
