//! slipway CLI - build, verify, and package multi-target artifacts

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slipway::util::Shell;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("slipway=debug")
    } else {
        EnvFilter::new("slipway=info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let shell = Shell::from_flags(cli.quiet, cli.verbose, cli.no_color);

    match cli.command {
        Commands::Build(args) => commands::build::execute(args, &shell),
        Commands::Check(args) => commands::check::execute(args, &shell),
        Commands::Package(args) => commands::package::execute(args, &shell),
        Commands::Toolchain(args) => commands::toolchain::execute(args, &shell),
        Commands::Doctor(args) => commands::doctor::execute(args, &shell),
        Commands::Clean(args) => commands::clean::execute(args, &shell),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
