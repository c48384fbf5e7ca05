//! Test utilities: a scripted build driver and fixture constructors.
//!
//! The scripted driver stands in for the external toolchain. It records
//! every invocation, fabricates the files a real build would leave
//! behind, and fails exactly where a test tells it to.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use semver::Version;
use tempfile::TempDir;

use crate::builder::driver::{BuildDriver, BuildRequest, ExecReport, SignRequest};
use crate::builder::toolchain::{Toolchain, ToolchainName};
use crate::core::feature::{DEFAULT_TOKEN, EMPTY_TOKEN};
use crate::core::BuildUnit;
use crate::util::config::Config;
use crate::util::GlobalContext;

/// A context rooted in a fresh temporary directory.
pub fn test_context() -> (GlobalContext, TempDir) {
    let tmp = TempDir::new().unwrap();
    let ctx = GlobalContext::with_config(tmp.path().to_path_buf(), Config::default());
    (ctx, tmp)
}

/// A resolved toolchain without going through a manager.
pub fn test_toolchain(name: &str) -> Toolchain {
    let name: ToolchainName = name.parse().unwrap();
    let channel = match name {
        ToolchainName::Msrv => "1.76.0".to_string(),
        other => other.as_str().to_string(),
    };
    Toolchain {
        name,
        channel,
        targets: Vec::new(),
    }
}

/// A build unit whose binary shares its name.
pub fn test_unit(name: &str, flags: &[&str]) -> BuildUnit {
    BuildUnit::new(
        name,
        name,
        format!("{name} test unit"),
        Version::new(0, 1, 0),
        flags.iter().map(|s| s.to_string()),
    )
}

/// Render the feature arguments a request would carry for a set name.
fn args_for_set_name(name: &str) -> Vec<String> {
    match name {
        DEFAULT_TOKEN => Vec::new(),
        EMPTY_TOKEN => vec!["--no-default-features".to_string()],
        flags => vec![
            "--no-default-features".to_string(),
            "--features".to_string(),
            flags.split('+').collect::<Vec<_>>().join(","),
        ],
    }
}

#[derive(Default)]
struct Failures {
    deps: HashMap<String, String>,
    build: HashMap<String, String>,
    /// Keyed by (unit, feature-set name).
    lint: HashMap<(String, String), String>,
    /// Keyed by check kind: "audit", "policy", "fmt".
    checks: HashMap<String, String>,
    sign: Option<String>,
}

/// Scripted stand-in for the external toolchain.
#[derive(Default)]
pub struct ScriptedDriver {
    installed: Mutex<Vec<String>>,
    deps_calls: Mutex<Vec<BuildRequest>>,
    build_calls: Mutex<Vec<BuildRequest>>,
    lint_calls: Mutex<Vec<BuildRequest>>,
    sign_calls: Mutex<Vec<SignRequest>>,
    metadata_json: Mutex<Option<String>>,
    failures: Mutex<Failures>,
}

impl ScriptedDriver {
    pub fn with_metadata(json: impl Into<String>) -> Self {
        let driver = ScriptedDriver::default();
        *driver.metadata_json.lock().unwrap() = Some(json.into());
        driver
    }

    /// Metadata JSON declaring the given (name, flags) units.
    pub fn with_units(units: &[(&str, &[&str])]) -> Self {
        let packages: Vec<String> = units
            .iter()
            .map(|(name, flags)| {
                let features: Vec<String> =
                    flags.iter().map(|f| format!("\"{f}\": []")).collect();
                format!(
                    r#"{{
                        "name": "{name}",
                        "version": "0.1.0",
                        "description": "{name} test unit",
                        "features": {{{}}},
                        "targets": [{{"name": "{name}", "kind": ["bin"]}}]
                    }}"#,
                    features.join(", ")
                )
            })
            .collect();
        Self::with_metadata(format!(r#"{{"packages": [{}]}}"#, packages.join(", ")))
    }

    pub fn fail_deps(&self, unit: &str, diagnostics: &str) {
        self.failures
            .lock()
            .unwrap()
            .deps
            .insert(unit.to_string(), diagnostics.to_string());
    }

    pub fn fail_build(&self, unit: &str, diagnostics: &str) {
        self.failures
            .lock()
            .unwrap()
            .build
            .insert(unit.to_string(), diagnostics.to_string());
    }

    pub fn fail_lint(&self, unit: &str, set_name: &str, diagnostics: &str) {
        self.failures
            .lock()
            .unwrap()
            .lint
            .insert((unit.to_string(), set_name.to_string()), diagnostics.to_string());
    }

    /// Fail a tree-wide check; kind is one of `audit`, `policy`, `fmt`.
    pub fn fail_check(&self, kind: &str, diagnostics: &str) {
        self.failures
            .lock()
            .unwrap()
            .checks
            .insert(kind.to_string(), diagnostics.to_string());
    }

    pub fn fail_sign(&self, diagnostics: &str) {
        self.failures.lock().unwrap().sign = Some(diagnostics.to_string());
    }

    pub fn installed_toolchains(&self) -> Vec<String> {
        self.installed.lock().unwrap().clone()
    }

    pub fn deps_invocations(&self) -> usize {
        self.deps_calls.lock().unwrap().len()
    }

    pub fn build_invocations(&self) -> usize {
        self.build_calls.lock().unwrap().len()
    }

    pub fn lint_invocations(&self) -> usize {
        self.lint_calls.lock().unwrap().len()
    }

    pub fn sign_invocations(&self) -> usize {
        self.sign_calls.lock().unwrap().len()
    }

    /// Whether the lint request matches a scripted lint failure.
    fn lint_failure_for(&self, req: &BuildRequest) -> Option<String> {
        let failures = self.failures.lock().unwrap();
        failures
            .lint
            .iter()
            .find(|((unit, set_name), _)| {
                *unit == req.unit && args_for_set_name(set_name) == req.feature_args
            })
            .map(|(_, diagnostics)| diagnostics.clone())
    }
}

fn failed(diagnostics: String) -> ExecReport {
    ExecReport {
        success: false,
        stdout: String::new(),
        stderr: diagnostics,
    }
}

impl BuildDriver for ScriptedDriver {
    fn install_toolchain(&self, channel: &str, _targets: &[String]) -> Result<()> {
        self.installed.lock().unwrap().push(channel.to_string());
        Ok(())
    }

    fn metadata(&self, _root: &Path) -> Result<String> {
        Ok(self
            .metadata_json
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| r#"{"packages": []}"#.to_string()))
    }

    fn build_deps(&self, req: &BuildRequest) -> Result<ExecReport> {
        self.deps_calls.lock().unwrap().push(req.clone());
        if let Some(diagnostics) = self.failures.lock().unwrap().deps.get(&req.unit) {
            return Ok(failed(diagnostics.clone()));
        }
        Ok(ExecReport::ok())
    }

    fn build(&self, req: &BuildRequest) -> Result<ExecReport> {
        self.build_calls.lock().unwrap().push(req.clone());
        if let Some(diagnostics) = self.failures.lock().unwrap().build.get(&req.unit) {
            return Ok(failed(diagnostics.clone()));
        }

        // Leave behind the binary a real compiler would have produced.
        // The scripted tree names every binary after its unit.
        let mut out = req.target_dir.clone();
        if let Some(triple) = &req.target_triple {
            out.push(triple);
        }
        out.push("release");
        fs::create_dir_all(&out)?;
        fs::write(out.join(&req.unit), b"\x7fELF scripted binary")?;
        Ok(ExecReport::ok())
    }

    fn lint(&self, req: &BuildRequest) -> Result<ExecReport> {
        self.lint_calls.lock().unwrap().push(req.clone());
        if let Some(diagnostics) = self.lint_failure_for(req) {
            return Ok(failed(diagnostics));
        }
        Ok(ExecReport::ok())
    }

    fn fmt_check(&self, _root: &Path, _channel: &str) -> Result<ExecReport> {
        if let Some(diagnostics) = self.failures.lock().unwrap().checks.get("fmt") {
            return Ok(failed(diagnostics.clone()));
        }
        Ok(ExecReport::ok())
    }

    fn audit(&self, _root: &Path) -> Result<ExecReport> {
        if let Some(diagnostics) = self.failures.lock().unwrap().checks.get("audit") {
            return Ok(failed(diagnostics.clone()));
        }
        Ok(ExecReport::ok())
    }

    fn policy(&self, _root: &Path) -> Result<ExecReport> {
        if let Some(diagnostics) = self.failures.lock().unwrap().checks.get("policy") {
            return Ok(failed(diagnostics.clone()));
        }
        Ok(ExecReport::ok())
    }

    fn sign(&self, req: &SignRequest) -> Result<ExecReport> {
        self.sign_calls.lock().unwrap().push(req.clone());
        if let Some(diagnostics) = &self.failures.lock().unwrap().sign {
            return Ok(failed(diagnostics.clone()));
        }
        fs::create_dir_all(&req.output_dir)?;
        fs::write(req.output_dir.join("package.tgz"), b"signed package")?;
        Ok(ExecReport::ok())
    }
}
