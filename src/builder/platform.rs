//! Platform registry and build-request environment injection.
//!
//! Exactly one native platform always exists; foreign platforms come from
//! configuration. Preparing a foreign platform may bootstrap its cross
//! toolchain; preparing the native platform is free. A prepared platform
//! is then applied to build requests as a set of environment overrides.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use crate::builder::cross::{self, CrossError, CrossRecipe, PinnedSource};
use crate::builder::driver::BuildRequest;
use crate::util::config::PlatformConfig;
use crate::util::GlobalContext;

/// Name of the always-present native platform.
pub const NATIVE_PLATFORM: &str = "native";

/// Error resolving or validating a platform.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unknown platform `{name}`")]
    Unknown { name: String, available: Vec<String> },

    #[error("platform `{name}` misconfigured: {message}")]
    Invalid { name: String, message: String },
}

/// Vendor packaging convention for signed deployable output.
#[derive(Debug, Clone)]
pub struct VendorPackaging {
    /// Where the entry-point binary installs on the device.
    pub install_dir: PathBuf,
    pub copyright: String,
    pub arch: String,
    pub abi: String,
}

/// How a finished binary becomes a deliverable on this platform.
#[derive(Debug, Clone)]
pub enum Packaging {
    /// The binary itself is the deliverable.
    Passthrough,
    /// Wrap and sign into a vendor package.
    SignedVendor(VendorPackaging),
}

/// One build target.
#[derive(Debug, Clone)]
pub struct Platform {
    name: String,
    triple: Option<String>,
    linker: Option<PathBuf>,
    cross: Option<CrossRecipe>,
    packaging: Packaging,
}

impl Platform {
    /// The native platform: no overrides, packaging is identity.
    pub fn native() -> Self {
        Platform {
            name: NATIVE_PLATFORM.to_string(),
            triple: None,
            linker: None,
            cross: None,
            packaging: Packaging::Passthrough,
        }
    }

    /// Construct a foreign platform from configuration.
    pub fn from_config(cfg: &PlatformConfig) -> Result<Self, PlatformError> {
        if cfg.name == NATIVE_PLATFORM {
            return Err(PlatformError::Invalid {
                name: cfg.name.clone(),
                message: "the native platform is built in and cannot be redeclared".to_string(),
            });
        }

        let triple = cfg.triple.clone().ok_or_else(|| PlatformError::Invalid {
            name: cfg.name.clone(),
            message: "foreign platforms must declare a target triple".to_string(),
        })?;

        let cross = cfg.cross.as_ref().map(|c| CrossRecipe {
            triple: triple.clone(),
            sysroot: PinnedSource {
                version: c
                    .sysroot_version
                    .clone()
                    .unwrap_or_else(|| c.sysroot_url.clone()),
                url: c.sysroot_url.clone(),
                sha256: c.sysroot_sha256.clone(),
            },
            binutils: PinnedSource {
                version: c.binutils_version.clone(),
                url: c.binutils_url.clone(),
                sha256: c.binutils_sha256.clone(),
            },
            gcc: PinnedSource {
                version: c.gcc_version.clone(),
                url: c.gcc_url.clone(),
                sha256: c.gcc_sha256.clone(),
            },
        });

        if cross.is_none() && cfg.linker.is_none() {
            return Err(PlatformError::Invalid {
                name: cfg.name.clone(),
                message: "foreign platforms need either a cross recipe or a linker path"
                    .to_string(),
            });
        }

        let packaging = match &cfg.packaging {
            Some(p) => Packaging::SignedVendor(VendorPackaging {
                install_dir: p.install_dir.clone(),
                copyright: p.copyright.clone(),
                arch: p.arch.clone(),
                abi: p.abi.clone(),
            }),
            None => Packaging::Passthrough,
        };

        Ok(Platform {
            name: cfg.name.clone(),
            triple: Some(triple),
            linker: cfg.linker.clone(),
            cross,
            packaging,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_native(&self) -> bool {
        self.name == NATIVE_PLATFORM
    }

    pub fn triple(&self) -> Option<&str> {
        self.triple.as_deref()
    }

    pub fn packaging(&self) -> &Packaging {
        &self.packaging
    }

    /// Whether deliverables for this platform must be signed.
    pub fn requires_signing(&self) -> bool {
        matches!(self.packaging, Packaging::SignedVendor(_))
    }

    /// Resolve the platform into concrete environment overrides.
    ///
    /// For a platform with a cross recipe this bootstraps (or finds) the
    /// self-built toolchain; failure poisons only this platform.
    pub fn prepare(&self, ctx: &GlobalContext) -> Result<PreparedPlatform, CrossError> {
        if self.is_native() {
            return Ok(PreparedPlatform::native());
        }

        let linker = match &self.cross {
            Some(recipe) => {
                let toolchain =
                    cross::ensure(recipe, &ctx.cross_dir(), &ctx.fetch_cache_dir())?;
                Some(toolchain.linker)
            }
            None => self.linker.clone(),
        };

        let mut env = Vec::new();
        if let (Some(triple), Some(linker)) = (&self.triple, &linker) {
            env.push((linker_env_var(triple), linker.display().to_string()));
        }
        // Identify the platform to compile-time configuration in the
        // source tree (build scripts key vendor quirks off this).
        env.push(("SLIPWAY_TARGET_PLATFORM".to_string(), self.name.clone()));
        env.push((
            "RUSTFLAGS".to_string(),
            format!("--cfg slipway_platform=\"{}\"", self.name),
        ));

        Ok(PreparedPlatform {
            name: self.name.clone(),
            triple: self.triple.clone(),
            env,
        })
    }
}

/// Environment variable selecting the linker for a target triple.
fn linker_env_var(triple: &str) -> String {
    format!(
        "CARGO_TARGET_{}_LINKER",
        triple.to_uppercase().replace('-', "_")
    )
}

/// A platform resolved to concrete build-request overrides.
#[derive(Debug, Clone)]
pub struct PreparedPlatform {
    pub name: String,
    pub triple: Option<String>,
    pub env: Vec<(String, String)>,
}

impl PreparedPlatform {
    pub fn native() -> Self {
        PreparedPlatform {
            name: NATIVE_PLATFORM.to_string(),
            triple: None,
            env: Vec::new(),
        }
    }

    /// Merge this platform's overrides into a build request.
    ///
    /// A no-op for the native platform.
    pub fn apply_to(&self, mut req: BuildRequest) -> BuildRequest {
        req.target_triple = self.triple.clone();
        req.env.extend(self.env.iter().cloned());
        req
    }
}

/// The fixed set of registered platforms.
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: BTreeMap<String, Platform>,
}

impl PlatformRegistry {
    /// Build the registry: the native platform plus the configured
    /// foreign ones.
    pub fn new(configs: &[PlatformConfig]) -> Result<Self, PlatformError> {
        let mut platforms = BTreeMap::new();
        platforms.insert(NATIVE_PLATFORM.to_string(), Platform::native());

        for cfg in configs {
            let platform = Platform::from_config(cfg)?;
            if platforms.contains_key(platform.name()) {
                return Err(PlatformError::Invalid {
                    name: cfg.name.clone(),
                    message: "platform declared twice".to_string(),
                });
            }
            platforms.insert(platform.name().to_string(), platform);
        }

        Ok(PlatformRegistry { platforms })
    }

    pub fn native(&self) -> &Platform {
        &self.platforms[NATIVE_PLATFORM]
    }

    pub fn get(&self, name: &str) -> Result<&Platform, PlatformError> {
        self.platforms
            .get(name)
            .ok_or_else(|| PlatformError::Unknown {
                name: name.to_string(),
                available: self.platforms.keys().cloned().collect(),
            })
    }

    /// Target triples of every foreign platform, for toolchain
    /// component installation.
    pub fn foreign_triples(&self) -> Vec<String> {
        self.platforms
            .values()
            .filter_map(|p| p.triple().map(str::to_string))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Platform> {
        self.platforms.values()
    }
}
