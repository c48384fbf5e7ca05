//! The seam between the build graph and the external toolchain.
//!
//! Everything slipway asks of the compiler stack goes through
//! [`BuildDriver`]: toolchain installation, metadata queries, dependency
//! and full builds, the verification checks, and the vendor signing tool.
//! The production implementation shells out; tests substitute a scripted
//! driver and never touch a real toolchain.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::FeatureSet;
use crate::util::process::{find_executable, ProcessBuilder};

/// Captured outcome of one external tool invocation.
///
/// A non-zero exit is data, not an error: compiler diagnostics travel in
/// the report so callers can attach them to typed failures.
#[derive(Debug, Clone)]
pub struct ExecReport {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ExecReport {
    pub fn ok() -> Self {
        ExecReport {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn from_output(output: &std::process::Output) -> Self {
        ExecReport {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    /// Merged diagnostic text for error reporting.
    pub fn diagnostics(&self) -> String {
        let mut text = String::new();
        if !self.stderr.trim().is_empty() {
            text.push_str(self.stderr.trim());
        }
        if !self.stdout.trim().is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(self.stdout.trim());
        }
        text
    }
}

/// One compile request against the source tree.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Toolchain channel to invoke.
    pub channel: String,

    /// Unit being built.
    pub unit: String,

    /// Feature-selection arguments, already rendered.
    pub feature_args: Vec<String>,

    /// Cross target, if any.
    pub target_triple: Option<String>,

    /// Environment overrides contributed by the platform.
    pub env: Vec<(String, String)>,

    /// Source tree root.
    pub root: PathBuf,

    /// Where compilation output lands.
    pub target_dir: PathBuf,
}

impl BuildRequest {
    pub fn new(
        channel: impl Into<String>,
        unit: impl Into<String>,
        features: &FeatureSet,
        root: impl Into<PathBuf>,
        target_dir: impl Into<PathBuf>,
    ) -> Self {
        BuildRequest {
            channel: channel.into(),
            unit: unit.into(),
            feature_args: features.build_args(),
            target_triple: None,
            env: Vec::new(),
            root: root.into(),
            target_dir: target_dir.into(),
        }
    }
}

/// One signing-tool invocation.
#[derive(Debug, Clone)]
pub struct SignRequest {
    pub manifest: PathBuf,
    pub staging_dir: PathBuf,
    pub output_dir: PathBuf,
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

/// Abstract interface to the external compiler, checker, and signer tools.
pub trait BuildDriver: Send + Sync {
    /// Install a toolchain channel plus std components for the given
    /// cross targets. Idempotent; the underlying tool content-addresses
    /// its downloads.
    fn install_toolchain(&self, channel: &str, targets: &[String]) -> Result<()>;

    /// Query the source tree's declared package metadata as JSON.
    fn metadata(&self, root: &Path) -> Result<String>;

    /// Compile only the unit's dependency closure.
    fn build_deps(&self, req: &BuildRequest) -> Result<ExecReport>;

    /// Compile the unit's own source.
    fn build(&self, req: &BuildRequest) -> Result<ExecReport>;

    /// Lint the unit across all targets, warnings denied.
    fn lint(&self, req: &BuildRequest) -> Result<ExecReport>;

    /// Source formatting check over the whole tree.
    fn fmt_check(&self, root: &Path, channel: &str) -> Result<ExecReport>;

    /// Dependency vulnerability audit over the whole tree.
    fn audit(&self, root: &Path) -> Result<ExecReport>;

    /// License/policy check over the whole tree.
    fn policy(&self, root: &Path) -> Result<ExecReport>;

    /// Invoke the vendor signing/packaging tool.
    fn sign(&self, req: &SignRequest) -> Result<ExecReport>;
}

/// Production driver shelling out to the real tools.
#[derive(Debug, Clone)]
pub struct CommandDriver {
    cargo: PathBuf,
    rustup: PathBuf,
    signer: Option<PathBuf>,
}

impl CommandDriver {
    pub fn new(cargo: PathBuf, rustup: PathBuf, signer: Option<PathBuf>) -> Self {
        CommandDriver {
            cargo,
            rustup,
            signer,
        }
    }

    /// Locate the tools on PATH. The signer is looked up lazily from
    /// `SLIPWAY_SIGNER` or PATH; it is only required for signed packaging.
    pub fn from_path() -> Result<Self> {
        let cargo = find_executable("cargo")
            .ok_or_else(|| anyhow::anyhow!("`cargo` not found on PATH"))?;
        let rustup = find_executable("rustup")
            .ok_or_else(|| anyhow::anyhow!("`rustup` not found on PATH"))?;
        let signer = std::env::var_os("SLIPWAY_SIGNER")
            .map(PathBuf::from)
            .or_else(|| find_executable("pkgsign"));
        Ok(CommandDriver::new(cargo, rustup, signer))
    }

    fn cargo_cmd(&self, req: &BuildRequest, subcommand: &str) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.cargo)
            .arg(format!("+{}", req.channel))
            .arg(subcommand)
            .arg("--locked")
            .arg("--release")
            .args(["-p", req.unit.as_str()])
            .args(&req.feature_args)
            .cwd(&req.root)
            .env("CARGO_TARGET_DIR", req.target_dir.display().to_string())
            .envs(&req.env);
        if let Some(triple) = &req.target_triple {
            cmd = cmd.args(["--target", triple]);
        }
        cmd
    }
}

impl BuildDriver for CommandDriver {
    fn install_toolchain(&self, channel: &str, targets: &[String]) -> Result<()> {
        ProcessBuilder::new(&self.rustup)
            .args(["toolchain", "install", channel, "--profile", "minimal"])
            .args(["--component", "clippy,rustfmt"])
            .run()?;
        for target in targets {
            ProcessBuilder::new(&self.rustup)
                .args(["target", "add", "--toolchain", channel, target.as_str()])
                .run()?;
        }
        Ok(())
    }

    fn metadata(&self, root: &Path) -> Result<String> {
        let output = ProcessBuilder::new(&self.cargo)
            .args(["metadata", "--format-version", "1", "--no-deps"])
            .cwd(root)
            .run()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn build_deps(&self, req: &BuildRequest) -> Result<ExecReport> {
        // Dependency-only compilation via the recipe tool: capture the
        // dependency closure, then cook it into the target directory.
        let recipe = req.target_dir.join("recipe.json");
        let prepare = ProcessBuilder::new(&self.cargo)
            .arg(format!("+{}", req.channel))
            .args(["chef", "prepare", "--recipe-path"])
            .arg(&recipe)
            .cwd(&req.root)
            .capture()?;
        if !prepare.status.success() {
            return Ok(ExecReport::from_output(&prepare));
        }

        let mut cook = ProcessBuilder::new(&self.cargo)
            .arg(format!("+{}", req.channel))
            .args(["chef", "cook", "--release", "--recipe-path"])
            .arg(&recipe)
            .args(&req.feature_args)
            .cwd(&req.root)
            .env("CARGO_TARGET_DIR", req.target_dir.display().to_string())
            .envs(&req.env);
        if let Some(triple) = &req.target_triple {
            cook = cook.args(["--target", triple]);
        }
        Ok(ExecReport::from_output(&cook.capture()?))
    }

    fn build(&self, req: &BuildRequest) -> Result<ExecReport> {
        let cmd = self.cargo_cmd(req, "build");
        Ok(ExecReport::from_output(&cmd.capture()?))
    }

    fn lint(&self, req: &BuildRequest) -> Result<ExecReport> {
        let cmd = self
            .cargo_cmd(req, "clippy")
            .arg("--all-targets")
            .args(["--", "-D", "warnings"]);
        Ok(ExecReport::from_output(&cmd.capture()?))
    }

    fn fmt_check(&self, root: &Path, channel: &str) -> Result<ExecReport> {
        let cmd = ProcessBuilder::new(&self.cargo)
            .arg(format!("+{channel}"))
            .args(["fmt", "--all", "--check"])
            .cwd(root);
        Ok(ExecReport::from_output(&cmd.capture()?))
    }

    fn audit(&self, root: &Path) -> Result<ExecReport> {
        let cmd = ProcessBuilder::new(&self.cargo).arg("audit").cwd(root);
        Ok(ExecReport::from_output(&cmd.capture()?))
    }

    fn policy(&self, root: &Path) -> Result<ExecReport> {
        let cmd = ProcessBuilder::new(&self.cargo)
            .args(["deny", "check"])
            .cwd(root);
        Ok(ExecReport::from_output(&cmd.capture()?))
    }

    fn sign(&self, req: &SignRequest) -> Result<ExecReport> {
        let Some(signer) = &self.signer else {
            bail!("no signing tool configured (set SLIPWAY_SIGNER or install `pkgsign`)");
        };
        let cmd = ProcessBuilder::new(signer)
            .args(["--cert"])
            .arg(&req.certificate)
            .args(["--key"])
            .arg(&req.private_key)
            .args(["--manifest"])
            .arg(&req.manifest)
            .args(["--input"])
            .arg(&req.staging_dir)
            .args(["--output"])
            .arg(&req.output_dir);
        Ok(ExecReport::from_output(&cmd.capture()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FeatureSet;

    #[test]
    fn build_request_renders_feature_args() {
        let req = BuildRequest::new(
            "stable",
            "alpha",
            &FeatureSet::explicit(["x"]),
            "/src",
            "/out",
        );
        assert_eq!(req.feature_args, vec!["--no-default-features", "--features", "x"]);
    }

    #[test]
    fn diagnostics_merges_both_streams() {
        let report = ExecReport {
            success: false,
            stdout: "out\n".to_string(),
            stderr: "err\n".to_string(),
        };
        assert_eq!(report.diagnostics(), "err\nout");
    }
}
