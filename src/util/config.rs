//! `Slipway.toml` configuration.
//!
//! The config declares what the orchestrator cannot learn from the source
//! tree itself: the minimum supported compiler channel and the registry of
//! foreign platforms with their pinned cross-toolchain recipes. Build-unit
//! metadata is never configured here; it always comes from the tree.
//!
//! ```toml
//! msrv_channel = "1.76.0"
//!
//! [[platforms]]
//! name = "edgeos"
//! triple = "x86_64-unknown-freebsd"
//!
//! [platforms.cross]
//! sysroot_url = "https://vendor.example.net/edgeos/base-21.4.tar.gz"
//! binutils_version = "2.41"
//! binutils_url = "https://ftp.gnu.org/gnu/binutils/binutils-2.41.tar.gz"
//! gcc_version = "13.2.0"
//! gcc_url = "https://ftp.gnu.org/gnu/gcc/gcc-13.2.0/gcc-13.2.0.tar.gz"
//!
//! [platforms.packaging]
//! install_dir = "/var/db/scripts/ext"
//! copyright = "Copyright 2026, Example Networks"
//! arch = "x86_64"
//! abi = "freebsd12"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration file name, looked up from the working directory upward.
pub const CONFIG_FILE: &str = "Slipway.toml";

fn default_msrv() -> String {
    "1.76.0".to_string()
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Channel the `msrv` toolchain resolves to.
    #[serde(default = "default_msrv")]
    pub msrv_channel: String,

    /// Registered foreign platforms. The native platform always exists and
    /// is not configured.
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            msrv_channel: default_msrv(),
            platforms: Vec::new(),
        }
    }
}

/// One foreign platform declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformConfig {
    pub name: String,

    /// Target triple builds for this platform compile to.
    pub triple: Option<String>,

    /// Linker override; ignored when a cross recipe supplies its own.
    pub linker: Option<PathBuf>,

    /// Self-built cross-toolchain recipe.
    #[serde(default)]
    pub cross: Option<CrossConfig>,

    /// Signed vendor packaging convention. Absent means the raw binary is
    /// the deliverable.
    #[serde(default)]
    pub packaging: Option<PackagingConfig>,
}

/// Pinned inputs for a self-built cross toolchain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossConfig {
    /// Frozen vendor OS base filesystem snapshot, used as the sysroot.
    pub sysroot_url: String,
    /// Snapshot version label; defaults to the URL when unset.
    #[serde(default)]
    pub sysroot_version: Option<String>,
    #[serde(default)]
    pub sysroot_sha256: Option<String>,

    pub binutils_version: String,
    pub binutils_url: String,
    #[serde(default)]
    pub binutils_sha256: Option<String>,

    pub gcc_version: String,
    pub gcc_url: String,
    #[serde(default)]
    pub gcc_sha256: Option<String>,
}

/// Vendor packaging convention for signed deployable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingConfig {
    /// Directory the entry-point binary installs to on the device.
    pub install_dir: PathBuf,
    pub copyright: String,
    pub arch: String,
    pub abi: String,
}

impl Config {
    /// Load configuration from an explicit file path.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Find `Slipway.toml` from `start` upward and load it.
    ///
    /// Returns the directory holding the config as the workspace root.
    /// When no config exists anywhere up the tree, `start` is the root and
    /// the defaults apply (native platform only).
    pub fn find_and_load(start: &Path) -> Result<(PathBuf, Self)> {
        let mut current = start.to_path_buf();
        loop {
            let candidate = current.join(CONFIG_FILE);
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok((current, config));
            }
            if !current.pop() {
                return Ok((start.to_path_buf(), Config::default()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_have_no_foreign_platforms() {
        let config = Config::default();
        assert!(config.platforms.is_empty());
        assert_eq!(config.msrv_channel, "1.76.0");
    }

    #[test]
    fn find_and_load_searches_upward() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "msrv_channel = \"1.80.0\"\n",
        )
        .unwrap();

        let (root, config) = Config::find_and_load(&nested).unwrap();
        assert_eq!(root, tmp.path());
        assert_eq!(config.msrv_channel, "1.80.0");
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let tmp = TempDir::new().unwrap();
        let (root, config) = Config::find_and_load(tmp.path()).unwrap();
        assert_eq!(root, tmp.path());
        assert!(config.platforms.is_empty());
    }

    #[test]
    fn full_platform_block_parses() {
        let text = r#"
            msrv_channel = "1.76.0"

            [[platforms]]
            name = "edgeos"
            triple = "x86_64-unknown-freebsd"

            [platforms.cross]
            sysroot_url = "https://vendor.example.net/edgeos/base-21.4.tar.gz"
            binutils_version = "2.41"
            binutils_url = "https://ftp.gnu.org/gnu/binutils/binutils-2.41.tar.gz"
            gcc_version = "13.2.0"
            gcc_url = "https://ftp.gnu.org/gnu/gcc/gcc-13.2.0/gcc-13.2.0.tar.gz"

            [platforms.packaging]
            install_dir = "/var/db/scripts/ext"
            copyright = "Copyright 2026, Example Networks"
            arch = "x86_64"
            abi = "freebsd12"
        "#;
        let config: Config = toml::from_str(text).unwrap();
        assert_eq!(config.platforms.len(), 1);
        let platform = &config.platforms[0];
        assert_eq!(platform.name, "edgeos");
        assert!(platform.cross.is_some());
        assert!(platform.packaging.is_some());
    }
}
