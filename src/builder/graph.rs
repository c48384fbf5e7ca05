//! Build-graph execution.
//!
//! A build request is a pure function of (toolchain, unit, feature set,
//! platform) plus the dependency cache. Dependency-only artifacts are
//! produced at most once per key, both within a process (single-flight
//! cache) and across processes (an on-disk stamp next to the compiled
//! closure).

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use thiserror::Error;
use tracing::debug;

use crate::builder::cache::{CachedFailure, DepsArtifact, DepsCache};
use crate::builder::driver::{BuildDriver, BuildRequest};
use crate::builder::platform::PreparedPlatform;
use crate::builder::toolchain::Toolchain;
use crate::core::unit::MetadataError;
use crate::core::{ArtifactKey, BuildUnit, FeatureSet};
use crate::util::GlobalContext;

/// Error executing a build-graph cell.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The compiler reported failure. Deterministic for the same inputs,
    /// so never retried; diagnostics travel with the key that produced
    /// them.
    #[error("build failed for {key}")]
    Failure { key: ArtifactKey, diagnostics: String },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A compiled entry-point binary.
#[derive(Debug, Clone)]
pub struct BinaryArtifact {
    pub key: ArtifactKey,
    pub path: PathBuf,
}

/// Result of one lint cell.
#[derive(Debug, Clone)]
pub struct LintOutcome {
    pub passed: bool,
    pub diagnostics: String,
}

/// Executes build requests against the dependency cache.
pub struct BuildGraph {
    driver: Arc<dyn BuildDriver>,
    cache: DepsCache,
    root: PathBuf,
    deps_dir: PathBuf,
    scratch_dir: PathBuf,
}

impl BuildGraph {
    pub fn new(driver: Arc<dyn BuildDriver>, ctx: &GlobalContext) -> Self {
        BuildGraph {
            driver,
            cache: DepsCache::new(),
            root: ctx.root().to_path_buf(),
            deps_dir: ctx.deps_dir(),
            scratch_dir: ctx.scratch_dir(),
        }
    }

    /// Build (or reuse) the unit's dependency-only artifact.
    pub fn build_deps(
        &self,
        toolchain: &Toolchain,
        unit: &BuildUnit,
        features: &FeatureSet,
    ) -> Result<DepsArtifact, BuildError> {
        let key = ArtifactKey::deps(toolchain.name.as_str(), &unit.name, features.name());

        self.cache
            .get_or_build(&key, || self.produce_deps(toolchain, unit, features, &key))
            .map_err(|failure| BuildError::Failure {
                key: failure.key,
                diagnostics: failure.diagnostics,
            })
    }

    fn produce_deps(
        &self,
        toolchain: &Toolchain,
        unit: &BuildUnit,
        features: &FeatureSet,
        key: &ArtifactKey,
    ) -> Result<DepsArtifact, CachedFailure> {
        let fingerprint = key.fingerprint();
        let target_dir = self.deps_dir.join(&fingerprint);
        let stamp = target_dir.join(".deps-ok");

        let artifact = DepsArtifact {
            key: key.clone(),
            fingerprint,
            target_dir: target_dir.clone(),
        };

        // Completed entries are immutable: a stamp on disk means this key
        // was already built, possibly by an earlier process.
        if stamp.exists() {
            debug!(%key, "dependency artifact cache hit");
            return Ok(artifact);
        }

        let fail = |diagnostics: String| CachedFailure {
            key: key.clone(),
            diagnostics,
        };

        fs::create_dir_all(&target_dir).map_err(|e| fail(e.to_string()))?;

        let req = BuildRequest::new(
            toolchain.channel(),
            &unit.name,
            features,
            &self.root,
            &target_dir,
        );

        debug!(%key, "building dependency closure");
        match self.driver.build_deps(&req) {
            Ok(report) if report.success => {
                fs::write(&stamp, &artifact.fingerprint).map_err(|e| fail(e.to_string()))?;
                Ok(artifact)
            }
            Ok(report) => Err(fail(report.diagnostics())),
            Err(e) => Err(fail(format!("{e:#}"))),
        }
    }

    /// Compile the unit's own source for a platform.
    ///
    /// With `with_deps` the matching dependency artifact is resolved (or
    /// produced) first and compilation runs on top of it; without, the
    /// build starts from scratch in its own target directory.
    pub fn build(
        &self,
        toolchain: &Toolchain,
        unit: &BuildUnit,
        features: &FeatureSet,
        platform: &PreparedPlatform,
        with_deps: bool,
    ) -> Result<BinaryArtifact, BuildError> {
        let key = ArtifactKey::binary(
            toolchain.name.as_str(),
            &unit.name,
            features.name(),
            &platform.name,
        );

        let target_dir = if with_deps {
            self.build_deps(toolchain, unit, features)?.target_dir
        } else {
            let dir = self.scratch_dir.join(key.fingerprint());
            fs::create_dir_all(&dir).map_err(anyhow::Error::from)?;
            dir
        };

        let req = platform.apply_to(BuildRequest::new(
            toolchain.channel(),
            &unit.name,
            features,
            &self.root,
            &target_dir,
        ));

        debug!(%key, "building unit source");
        let report = self.driver.build(&req)?;
        if !report.success {
            return Err(BuildError::Failure {
                key,
                diagnostics: report.diagnostics(),
            });
        }

        let mut path = target_dir;
        if let Some(triple) = &req.target_triple {
            path.push(triple);
        }
        path.push("release");
        path.push(&unit.bin_name);
        if !path.exists() {
            return Err(BuildError::Other(anyhow!(
                "build for {key} reported success but `{}` is missing",
                path.display()
            )));
        }

        Ok(BinaryArtifact { key, path })
    }

    /// Run one lint cell on top of the unit's dependency artifact.
    ///
    /// A compiler or lint failure is an outcome, not an error: the checks
    /// layer records it and keeps going.
    pub fn lint(
        &self,
        toolchain: &Toolchain,
        unit: &BuildUnit,
        features: &FeatureSet,
    ) -> Result<LintOutcome, BuildError> {
        let deps = match self.build_deps(toolchain, unit, features) {
            Ok(deps) => deps,
            Err(BuildError::Failure { diagnostics, .. }) => {
                return Ok(LintOutcome {
                    passed: false,
                    diagnostics,
                })
            }
            Err(other) => return Err(other),
        };

        let req = BuildRequest::new(
            toolchain.channel(),
            &unit.name,
            features,
            &self.root,
            &deps.target_dir,
        );

        let report = self.driver.lint(&req)?;
        Ok(LintOutcome {
            passed: report.success,
            diagnostics: report.diagnostics(),
        })
    }

    /// Completed dependency-cache entries (for reporting).
    pub fn deps_cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_context, test_toolchain, test_unit, ScriptedDriver};

    fn graph_with(driver: Arc<ScriptedDriver>) -> (BuildGraph, tempfile::TempDir) {
        let (ctx, tmp) = test_context();
        let graph = BuildGraph::new(driver as Arc<dyn BuildDriver>, &ctx);
        (graph, tmp)
    }

    #[test]
    fn deps_are_built_once_per_key() {
        let driver = Arc::new(ScriptedDriver::default());
        let (graph, _tmp) = graph_with(Arc::clone(&driver));
        let toolchain = test_toolchain("stable");
        let unit = test_unit("alpha", &["x", "y"]);
        let features = FeatureSet::explicit(["x", "y"]);

        let first = graph.build_deps(&toolchain, &unit, &features).unwrap();
        let second = graph.build_deps(&toolchain, &unit, &features).unwrap();

        assert_eq!(first, second);
        assert_eq!(driver.deps_invocations(), 1);
    }

    #[test]
    fn on_disk_stamp_survives_a_fresh_cache() {
        let driver = Arc::new(ScriptedDriver::default());
        let (ctx, _tmp) = test_context();
        let toolchain = test_toolchain("stable");
        let unit = test_unit("alpha", &[]);
        let features = FeatureSet::default_set();

        let graph = BuildGraph::new(Arc::clone(&driver) as Arc<dyn BuildDriver>, &ctx);
        graph.build_deps(&toolchain, &unit, &features).unwrap();

        // A second graph simulates a new process: same disk, empty
        // in-memory cache.
        let graph2 = BuildGraph::new(Arc::clone(&driver) as Arc<dyn BuildDriver>, &ctx);
        graph2.build_deps(&toolchain, &unit, &features).unwrap();

        assert_eq!(driver.deps_invocations(), 1);
    }

    #[test]
    fn changing_any_key_field_builds_again() {
        let driver = Arc::new(ScriptedDriver::default());
        let (graph, _tmp) = graph_with(Arc::clone(&driver));
        let unit = test_unit("alpha", &["x", "y"]);

        graph
            .build_deps(&test_toolchain("stable"), &unit, &FeatureSet::explicit(["x"]))
            .unwrap();
        graph
            .build_deps(
                &test_toolchain("stable"),
                &unit,
                &FeatureSet::explicit(["x", "y"]),
            )
            .unwrap();
        graph
            .build_deps(&test_toolchain("nightly"), &unit, &FeatureSet::explicit(["x"]))
            .unwrap();

        assert_eq!(driver.deps_invocations(), 3);
    }

    #[test]
    fn build_with_deps_reuses_cached_dependency_artifact() {
        let driver = Arc::new(ScriptedDriver::default());
        let (graph, _tmp) = graph_with(Arc::clone(&driver));
        let toolchain = test_toolchain("stable");
        let unit = test_unit("alpha", &["x", "y"]);
        let features = FeatureSet::explicit(["x", "y"]);
        let native = PreparedPlatform::native();

        let first = graph
            .build(&toolchain, &unit, &features, &native, true)
            .unwrap();
        let second = graph
            .build(&toolchain, &unit, &features, &native, true)
            .unwrap();

        assert_eq!(first.key.to_string(), "stable/alpha/x+y/native");
        assert_eq!(second.key, first.key);
        assert_eq!(driver.deps_invocations(), 1);
        assert_eq!(driver.build_invocations(), 2);
    }

    #[test]
    fn compiler_failure_carries_key_and_diagnostics() {
        let driver = Arc::new(ScriptedDriver::default());
        driver.fail_build("alpha", "expected `;`");
        let (graph, _tmp) = graph_with(Arc::clone(&driver));

        let err = graph
            .build(
                &test_toolchain("stable"),
                &test_unit("alpha", &[]),
                &FeatureSet::default_set(),
                &PreparedPlatform::native(),
                true,
            )
            .unwrap_err();

        match err {
            BuildError::Failure { key, diagnostics } => {
                assert_eq!(key.to_string(), "stable/alpha/default/native");
                assert!(diagnostics.contains("expected `;`"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn failed_deps_surface_as_failed_lint_cell() {
        let driver = Arc::new(ScriptedDriver::default());
        driver.fail_deps("alpha", "missing dependency source");
        let (graph, _tmp) = graph_with(Arc::clone(&driver));

        let outcome = graph
            .lint(
                &test_toolchain("stable"),
                &test_unit("alpha", &[]),
                &FeatureSet::default_set(),
            )
            .unwrap();
        assert!(!outcome.passed);
        assert!(outcome.diagnostics.contains("missing dependency source"));
    }

    #[test]
    fn lint_outcome_tracks_driver_result() {
        let driver = Arc::new(ScriptedDriver::default());
        driver.fail_lint("alpha", "x", "unused variable `n`");
        let (graph, _tmp) = graph_with(Arc::clone(&driver));
        let toolchain = test_toolchain("stable");
        let unit = test_unit("alpha", &["x", "y"]);

        let failing = graph
            .lint(&toolchain, &unit, &FeatureSet::explicit(["x"]))
            .unwrap();
        assert!(!failing.passed);
        assert!(failing.diagnostics.contains("unused variable"));

        let passing = graph
            .lint(&toolchain, &unit, &FeatureSet::explicit(["y"]))
            .unwrap();
        assert!(passing.passed);
    }
}
