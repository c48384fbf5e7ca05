//! Global context for slipway operations.
//!
//! Bundles the workspace root, the loaded configuration, and the layout of
//! the `.slipway/` state directory. Everything under `.slipway/` is a pure
//! cache: it can be deleted at any time and will be rebuilt.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context as _, Result};
use directories::ProjectDirs;

use crate::util::config::Config;

static PROJECT_DIRS: LazyLock<Option<ProjectDirs>> =
    LazyLock::new(|| ProjectDirs::from("dev", "slipway", "slipway"));

/// Global context: workspace root, configuration, and cache layout.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Workspace root (directory holding `Slipway.toml`, or the starting
    /// directory when no config exists).
    root: PathBuf,

    /// Loaded configuration.
    config: Config,

    /// Machine-wide cache for downloaded components.
    home: PathBuf,
}

impl GlobalContext {
    /// Create a context rooted at the current directory's workspace.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::at(&cwd)
    }

    /// Create a context by searching for a workspace from `start` upward.
    pub fn at(start: &Path) -> Result<Self> {
        let (root, config) = Config::find_and_load(start)?;

        let home = if let Some(dirs) = PROJECT_DIRS.as_ref() {
            dirs.cache_dir().to_path_buf()
        } else {
            root.join(".slipway").join("fetch")
        };

        Ok(GlobalContext { root, config, home })
    }

    /// Context with an explicit root and config, bypassing discovery.
    pub fn with_config(root: PathBuf, config: Config) -> Self {
        let home = root.join(".slipway").join("fetch");
        GlobalContext { root, config, home }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Workspace-local state directory.
    pub fn slipway_dir(&self) -> PathBuf {
        self.root.join(".slipway")
    }

    /// Dependency-artifact cache, one subdirectory per cache key.
    pub fn deps_dir(&self) -> PathBuf {
        self.slipway_dir().join("deps")
    }

    /// Scratch target directories for from-scratch builds.
    pub fn scratch_dir(&self) -> PathBuf {
        self.slipway_dir().join("scratch")
    }

    /// Resolved-toolchain stamps.
    pub fn toolchain_dir(&self) -> PathBuf {
        self.slipway_dir().join("toolchains")
    }

    /// Self-built cross-toolchain installations, one per target triple.
    pub fn cross_dir(&self) -> PathBuf {
        self.slipway_dir().join("cross")
    }

    /// Finished deliverables.
    pub fn dist_dir(&self) -> PathBuf {
        self.slipway_dir().join("dist")
    }

    /// Machine-wide download cache for pinned components.
    pub fn fetch_cache_dir(&self) -> PathBuf {
        self.home.clone()
    }
}
