//! `slipway doctor` command
//!
//! Fast environment checks: reports which of the external tools slipway
//! drives are present. Informational only; always exits successfully so
//! it can run in any environment.

use anyhow::Result;

use slipway::util::process::{find_executable, tool_version};
use slipway::util::shell::Status;
use slipway::util::Shell;

use crate::cli::DoctorArgs;

/// (tool, why slipway needs it, required)
const TOOLS: &[(&str, &str, bool)] = &[
    ("cargo", "compiler driver", true),
    ("rustup", "toolchain installation", true),
    ("cargo-chef", "dependency-only builds", true),
    ("cargo-audit", "dependency vulnerability audit", false),
    ("cargo-deny", "license/policy checks", false),
    ("pkgsign", "vendor package signing", false),
];

pub fn execute(_args: DoctorArgs, shell: &Shell) -> Result<()> {
    for (tool, purpose, required) in TOOLS {
        match find_executable(tool) {
            Some(path) => {
                let version = tool_version(&path).unwrap_or_else(|| "unknown version".to_string());
                println!("{tool:<12} {version} ({})", path.display());
            }
            None if *required => {
                shell.status(Status::Warning, format!("{tool} not found ({purpose})"));
            }
            None => {
                shell.status(
                    Status::Skipped,
                    format!("{tool} not found ({purpose}; optional)"),
                );
            }
        }
    }
    Ok(())
}
