//! Toolchain resolution.
//!
//! Toolchains form a small fixed enumeration. Resolving one installs the
//! channel together with the std component for every registered foreign
//! triple, so any platform can be cross-compiled to without another
//! resolution round-trip. Results are memoized per name for the life of
//! the process; the underlying installer content-addresses its downloads,
//! so repeat resolution is a cache hit even across processes.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::builder::driver::BuildDriver;

/// Error resolving a toolchain.
#[derive(Debug, Error)]
pub enum ToolchainError {
    #[error("unknown toolchain `{name}` (known toolchains: stable, nightly, msrv)")]
    Unknown { name: String },

    #[error("failed to install toolchain `{channel}`: {message}")]
    Install { channel: String, message: String },
}

/// The fixed toolchain enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolchainName {
    Stable,
    Nightly,
    /// Minimum supported compiler version, pinned in configuration.
    Msrv,
}

impl ToolchainName {
    pub const ALL: [ToolchainName; 3] =
        [ToolchainName::Stable, ToolchainName::Nightly, ToolchainName::Msrv];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainName::Stable => "stable",
            ToolchainName::Nightly => "nightly",
            ToolchainName::Msrv => "msrv",
        }
    }
}

impl fmt::Display for ToolchainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolchainName {
    type Err = ToolchainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stable" => Ok(ToolchainName::Stable),
            "nightly" => Ok(ToolchainName::Nightly),
            "msrv" | "minimum-supported" => Ok(ToolchainName::Msrv),
            _ => Err(ToolchainError::Unknown {
                name: s.to_string(),
            }),
        }
    }
}

/// A resolved toolchain: the channel plus its cross-target components.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub name: ToolchainName,
    pub channel: String,
    pub targets: Vec<String>,
}

impl Toolchain {
    /// The channel string passed to the underlying compiler.
    pub fn channel(&self) -> &str {
        &self.channel
    }
}

/// Resolves and memoizes toolchains.
pub struct ToolchainManager {
    driver: Arc<dyn BuildDriver>,
    msrv_channel: String,
    foreign_triples: Vec<String>,
    resolved: Mutex<HashMap<ToolchainName, Arc<Toolchain>>>,
    /// Persisted resolution stamps, keyed by toolchain name. A pure
    /// cache; deleting it only costs a re-install round-trip.
    stamp_dir: Option<PathBuf>,
}

impl ToolchainManager {
    pub fn new(
        driver: Arc<dyn BuildDriver>,
        msrv_channel: impl Into<String>,
        foreign_triples: Vec<String>,
    ) -> Self {
        ToolchainManager {
            driver,
            msrv_channel: msrv_channel.into(),
            foreign_triples,
            resolved: Mutex::new(HashMap::new()),
            stamp_dir: None,
        }
    }

    /// Persist resolution stamps under `dir` so repeat runs skip the
    /// installer entirely.
    pub fn with_stamp_dir(mut self, dir: PathBuf) -> Self {
        self.stamp_dir = Some(dir);
        self
    }

    fn channel_for(&self, name: ToolchainName) -> String {
        match name {
            ToolchainName::Stable => "stable".to_string(),
            ToolchainName::Nightly => "nightly".to_string(),
            ToolchainName::Msrv => self.msrv_channel.clone(),
        }
    }

    /// What a resolution depends on: the channel and the cross targets.
    fn stamp_content(&self, channel: &str) -> String {
        let mut content = channel.to_string();
        for triple in &self.foreign_triples {
            content.push('\n');
            content.push_str(triple);
        }
        content
    }

    fn stamp_path(&self, name: ToolchainName) -> Option<PathBuf> {
        self.stamp_dir
            .as_ref()
            .map(|dir| dir.join(format!("{name}.stamp")))
    }

    /// Resolve a toolchain by name.
    ///
    /// Installation failures are not memoized, so a transient installer
    /// problem does not poison the name for the rest of the process.
    pub fn resolve(&self, name: &str) -> Result<Arc<Toolchain>, ToolchainError> {
        let name: ToolchainName = name.parse()?;

        if let Some(toolchain) = self.resolved.lock().unwrap().get(&name) {
            return Ok(Arc::clone(toolchain));
        }

        let channel = self.channel_for(name);
        let stamp = self.stamp_path(name);
        let stamp_content = self.stamp_content(&channel);

        let already_installed = stamp
            .as_ref()
            .and_then(|path| fs::read_to_string(path).ok())
            .is_some_and(|existing| existing == stamp_content);

        if !already_installed {
            self.driver
                .install_toolchain(&channel, &self.foreign_triples)
                .map_err(|e| ToolchainError::Install {
                    channel: channel.clone(),
                    message: format!("{e:#}"),
                })?;
            if let Some(path) = &stamp {
                if let Some(parent) = path.parent() {
                    let _ = fs::create_dir_all(parent);
                }
                let _ = fs::write(path, &stamp_content);
            }
        }

        let toolchain = Arc::new(Toolchain {
            name,
            channel,
            targets: self.foreign_triples.clone(),
        });
        self.resolved
            .lock()
            .unwrap()
            .insert(name, Arc::clone(&toolchain));
        Ok(toolchain)
    }
}
