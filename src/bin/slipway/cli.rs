//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// slipway - build, verify, and package multi-target artifacts
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build one unit for a platform
    Build(BuildArgs),

    /// Run the full check matrix for a toolchain
    Check(CheckArgs),

    /// Build and package one unit for a platform
    Package(PackageArgs),

    /// Inspect and resolve toolchains
    Toolchain(ToolchainArgs),

    /// Report the state of required external tools
    Doctor(DoctorArgs),

    /// Remove cached build state
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Unit to build
    pub unit: String,

    /// Toolchain to build with
    #[arg(long, default_value = "stable")]
    pub toolchain: String,

    /// Target platform (defaults to native)
    #[arg(long)]
    pub platform: Option<String>,

    /// Explicit feature flags, comma separated; pass an empty value to
    /// disable every optional flag
    #[arg(long)]
    pub features: Option<String>,

    /// Build from scratch instead of on the cached dependency artifact
    #[arg(long)]
    pub no_deps: bool,

    /// Signing certificate (signed platforms only)
    #[arg(long, env = "SLIPWAY_SIGN_CERT")]
    pub cert: Option<PathBuf>,

    /// Signing private key (signed platforms only)
    #[arg(long, env = "SLIPWAY_SIGN_KEY")]
    pub key: Option<PathBuf>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Toolchain to check with
    #[arg(long, default_value = "stable")]
    pub toolchain: String,

    /// Report format: human or json
    #[arg(long, default_value = "human")]
    pub format: String,
}

#[derive(Args)]
pub struct PackageArgs {
    /// Unit to package
    pub unit: String,

    /// Target platform
    #[arg(long)]
    pub platform: String,

    /// Toolchain to build with
    #[arg(long, default_value = "stable")]
    pub toolchain: String,

    /// Explicit feature flags, comma separated
    #[arg(long)]
    pub features: Option<String>,

    /// Signing certificate
    #[arg(long, env = "SLIPWAY_SIGN_CERT")]
    pub cert: Option<PathBuf>,

    /// Signing private key
    #[arg(long, env = "SLIPWAY_SIGN_KEY")]
    pub key: Option<PathBuf>,
}

#[derive(Args)]
pub struct ToolchainArgs {
    #[command(subcommand)]
    pub command: ToolchainCommands,
}

#[derive(Subcommand)]
pub enum ToolchainCommands {
    /// List the registered toolchains
    List,

    /// Resolve (and install) one toolchain
    Resolve {
        /// Toolchain name
        name: String,
    },
}

#[derive(Args)]
pub struct DoctorArgs {}

#[derive(Args)]
pub struct CleanArgs {
    /// Also remove downloaded components and cross toolchains
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
