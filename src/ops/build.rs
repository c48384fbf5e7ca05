//! Implementation of `slipway build`.
//!
//! Resolves the toolchain and platform, executes the build graph with the
//! dependency cache, and hands the finished binary to the packaging
//! pipeline. Signing requirements are validated up front so a run that
//! cannot possibly deliver fails before any compilation starts.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::builder::driver::BuildDriver;
use crate::builder::graph::BuildGraph;
use crate::builder::platform::{PlatformRegistry, NATIVE_PLATFORM};
use crate::builder::toolchain::ToolchainManager;
use crate::core::{FeatureSet, UnitRegistry};
use crate::sign::{self, PackagedArtifact, SignError, SigningMaterial};
use crate::util::shell::Status;
use crate::util::{GlobalContext, Shell};

/// Options for the build operation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Unit to build.
    pub unit: String,

    /// Toolchain name; callers default to `stable`.
    pub toolchain: String,

    /// Platform name; `None` means native.
    pub platform: Option<String>,

    /// Explicit feature selection as a comma-separated list. `None`
    /// builds the unit's default configuration; an empty string builds
    /// with every optional flag disabled.
    pub features: Option<String>,

    /// Build on top of the cached dependency artifact.
    pub with_deps: bool,

    /// Signing material paths, required for signed platforms.
    pub certificate: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            unit: String::new(),
            toolchain: "stable".to_string(),
            platform: None,
            features: None,
            with_deps: true,
            certificate: None,
            private_key: None,
        }
    }
}

/// Parse a `--features` value into a feature set.
pub(crate) fn feature_set_from_option(features: Option<&str>) -> FeatureSet {
    match features {
        None => FeatureSet::default_set(),
        Some(csv) => FeatureSet::explicit(
            csv.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from),
        ),
    }
}

/// Build one unit and wrap it into its platform deliverable.
pub fn build(
    options: &BuildOptions,
    ctx: &GlobalContext,
    driver: Arc<dyn BuildDriver>,
    shell: &Shell,
) -> Result<PackagedArtifact> {
    let start = Instant::now();

    let platforms = PlatformRegistry::new(&ctx.config().platforms)?;
    let platform = platforms.get(options.platform.as_deref().unwrap_or(NATIVE_PLATFORM))?;

    // Fail closed before any build work: a signed platform without its
    // material can never deliver.
    let material = match (&options.certificate, &options.private_key) {
        (Some(cert), Some(key)) => Some(SigningMaterial::new(cert.clone(), key.clone())),
        _ => None,
    };
    if platform.requires_signing() {
        let material = material
            .as_ref()
            .ok_or_else(|| SignError::MaterialNotConfigured {
                platform: platform.name().to_string(),
            })?;
        material.validate()?;
    }

    shell.status(Status::Resolving, format!("toolchain `{}`", options.toolchain));
    let manager = ToolchainManager::new(
        Arc::clone(&driver),
        ctx.config().msrv_channel.clone(),
        platforms.foreign_triples(),
    )
    .with_stamp_dir(ctx.toolchain_dir());
    let toolchain = manager.resolve(&options.toolchain)?;

    let metadata = driver
        .metadata(ctx.root())
        .context("failed to query source tree metadata")?;
    let registry = UnitRegistry::parse(&metadata)?;
    let unit = registry.get(&options.unit)?;

    let features = feature_set_from_option(options.features.as_deref());

    let prepared = platform
        .prepare(ctx)
        .with_context(|| format!("preparing platform `{}`", platform.name()))?;

    shell.status(
        Status::Building,
        format!(
            "{} ({}, {}, {})",
            unit.name,
            toolchain.name,
            features,
            platform.name()
        ),
    );
    let graph = BuildGraph::new(Arc::clone(&driver), ctx);
    let binary = graph.build(&toolchain, unit, &features, &prepared, options.with_deps)?;

    if platform.requires_signing() {
        shell.status(Status::Signing, format!("{} for {}", unit.name, platform.name()));
    }
    let artifact = sign::package(&binary, unit, platform, material.as_ref(), ctx, driver.as_ref())?;

    let status = match &artifact {
        PackagedArtifact::Binary(_) => Status::Finished,
        PackagedArtifact::Signed(_) => Status::Packaged,
    };
    shell.status(
        status,
        format!(
            "{} in {}",
            artifact.path().display(),
            crate::util::shell::format_duration(start.elapsed())
        ),
    );
    Ok(artifact)
}
