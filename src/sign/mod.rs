//! Packaging and signing.
//!
//! For the native platform the compiled binary is the deliverable. For a
//! signed vendor platform the binary and its generated manifest are
//! staged into a fresh directory, the external signing tool runs over
//! them, and only a fully signed output is moved into the dist tree; a
//! failed signing run leaves nothing behind. Missing key material always
//! fails closed; an unsigned artifact is never emitted as a substitute,
//! and a failed signing invocation is never silently retried.

pub mod manifest;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

use crate::builder::driver::{BuildDriver, SignRequest};
use crate::builder::graph::BinaryArtifact;
use crate::builder::platform::{Packaging, Platform};
use crate::core::BuildUnit;
use crate::util::fs::persist_dir;
use crate::util::GlobalContext;

pub use manifest::{ManifestEntry, PackageManifest};

/// Error wrapping or signing a package.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("signed packaging for platform `{platform}` requires certificate and key paths")]
    MaterialNotConfigured { platform: String },

    #[error("signing {} not found or unreadable at {}", .kind, .path.display())]
    MaterialMissing { kind: &'static str, path: PathBuf },

    #[error("signing tool failed for `{unit}`: {diagnostics}")]
    Signer { unit: String, diagnostics: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Certificate and private key locations, injected by the caller.
#[derive(Debug, Clone)]
pub struct SigningMaterial {
    pub certificate: PathBuf,
    pub private_key: PathBuf,
}

impl SigningMaterial {
    pub fn new(certificate: PathBuf, private_key: PathBuf) -> Self {
        SigningMaterial {
            certificate,
            private_key,
        }
    }

    /// Check both files exist and are readable.
    ///
    /// Ran immediately before every signing invocation; key material may
    /// be rotated or revoked between runs and must never be assumed.
    pub fn validate(&self) -> Result<(), SignError> {
        for (kind, path) in [
            ("certificate", &self.certificate),
            ("private key", &self.private_key),
        ] {
            if fs::File::open(path).is_err() {
                return Err(SignError::MaterialMissing {
                    kind,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A finished deliverable.
#[derive(Debug, Clone)]
pub enum PackagedArtifact {
    /// The binary itself (native platform).
    Binary(PathBuf),
    /// Directory holding the signed vendor package.
    Signed(PathBuf),
}

impl PackagedArtifact {
    pub fn path(&self) -> &Path {
        match self {
            PackagedArtifact::Binary(path) | PackagedArtifact::Signed(path) => path,
        }
    }
}

/// Wrap a compiled binary into the platform's deliverable form.
pub fn package(
    binary: &BinaryArtifact,
    unit: &BuildUnit,
    platform: &Platform,
    material: Option<&SigningMaterial>,
    ctx: &GlobalContext,
    driver: &dyn BuildDriver,
) -> Result<PackagedArtifact, SignError> {
    let packaging = match platform.packaging() {
        Packaging::Passthrough => return Ok(PackagedArtifact::Binary(binary.path.clone())),
        Packaging::SignedVendor(packaging) => packaging,
    };

    let material = material.ok_or_else(|| SignError::MaterialNotConfigured {
        platform: platform.name().to_string(),
    })?;
    material.validate()?;

    let dist_dir = ctx.dist_dir();
    fs::create_dir_all(&dist_dir)?;

    // Stage input and output in temp directories under dist: a failure at
    // any point drops them, so no partial package ever looks deliverable.
    let staging = TempDir::with_prefix_in(".staging-", &dist_dir)?;
    let signed_out = TempDir::with_prefix_in(".signed-", &dist_dir)?;

    let manifest = PackageManifest::derive(unit, packaging);
    let manifest_path = staging.path().join("manifest");
    manifest.write_to(&manifest_path)?;
    fs::copy(&binary.path, staging.path().join(&unit.bin_name))?;

    debug!(unit = %unit.name, platform = %platform.name(), "invoking signing tool");
    let report = driver
        .sign(&SignRequest {
            manifest: manifest_path,
            staging_dir: staging.path().to_path_buf(),
            output_dir: signed_out.path().to_path_buf(),
            certificate: material.certificate.clone(),
            private_key: material.private_key.clone(),
        })
        .map_err(SignError::Other)?;

    if !report.success {
        return Err(SignError::Signer {
            unit: unit.name.clone(),
            diagnostics: report.diagnostics(),
        });
    }

    let produced = crate::util::fs::collect_files(signed_out.path()).map_err(SignError::Other)?;
    if produced.is_empty() {
        return Err(SignError::Signer {
            unit: unit.name.clone(),
            diagnostics: "signing tool reported success but produced no output".to_string(),
        });
    }

    let dest = dist_dir.join(format!("{}-{}", manifest.basename, platform.name()));
    persist_dir(&signed_out.into_path(), &dest).map_err(SignError::Other)?;
    Ok(PackagedArtifact::Signed(dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use semver::Version;

    use crate::builder::platform::PlatformRegistry;
    use crate::core::ArtifactKey;
    use crate::test_support::{test_context, ScriptedDriver};
    use crate::util::config::{PackagingConfig, PlatformConfig};

    fn signed_platform_registry() -> PlatformRegistry {
        PlatformRegistry::new(&[PlatformConfig {
            name: "edgeos".to_string(),
            triple: Some("x86_64-unknown-freebsd".to_string()),
            linker: Some(PathBuf::from("/opt/cross/bin/ld")),
            cross: None,
            packaging: Some(PackagingConfig {
                install_dir: PathBuf::from("/var/db/scripts/ext"),
                copyright: "Copyright 2026, Example Networks".to_string(),
                arch: "x86_64".to_string(),
                abi: "freebsd12".to_string(),
            }),
        }])
        .unwrap()
    }

    fn unit() -> BuildUnit {
        BuildUnit::new(
            "agent",
            "agentd",
            "device agent",
            Version::new(1, 0, 0),
            Vec::new(),
        )
    }

    fn binary_at(dir: &Path) -> BinaryArtifact {
        let path = dir.join("agentd");
        fs::write(&path, b"\x7fELF").unwrap();
        BinaryArtifact {
            key: ArtifactKey::binary("stable", "agent", "default", "edgeos"),
            path,
        }
    }

    fn material_in(dir: &Path) -> SigningMaterial {
        let cert = dir.join("cert.pem");
        let key = dir.join("key.pem");
        fs::write(&cert, "cert").unwrap();
        fs::write(&key, "key").unwrap();
        SigningMaterial::new(cert, key)
    }

    #[test]
    fn native_packaging_is_identity() {
        let (ctx, tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::default());
        let registry = PlatformRegistry::new(&[]).unwrap();
        let binary = binary_at(tmp.path());

        let artifact = package(
            &binary,
            &unit(),
            registry.native(),
            None,
            &ctx,
            driver.as_ref(),
        )
        .unwrap();

        assert!(matches!(artifact, PackagedArtifact::Binary(ref p) if *p == binary.path));
        assert_eq!(driver.sign_invocations(), 0);
    }

    #[test]
    fn signed_platform_produces_signed_package() {
        let (ctx, tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::default());
        let registry = signed_platform_registry();
        let binary = binary_at(tmp.path());
        let material = material_in(tmp.path());

        let artifact = package(
            &binary,
            &unit(),
            registry.get("edgeos").unwrap(),
            Some(&material),
            &ctx,
            driver.as_ref(),
        )
        .unwrap();

        let PackagedArtifact::Signed(dir) = artifact else {
            panic!("expected signed artifact");
        };
        assert_eq!(dir, ctx.dist_dir().join("agent-edgeos"));
        assert!(dir.join("package.tgz").exists());
        assert_eq!(driver.sign_invocations(), 1);
    }

    #[test]
    fn unconfigured_material_fails_closed() {
        let (ctx, tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::default());
        let registry = signed_platform_registry();
        let binary = binary_at(tmp.path());

        let err = package(
            &binary,
            &unit(),
            registry.get("edgeos").unwrap(),
            None,
            &ctx,
            driver.as_ref(),
        )
        .unwrap_err();

        assert!(matches!(err, SignError::MaterialNotConfigured { .. }));
        assert_eq!(driver.sign_invocations(), 0);
    }

    #[test]
    fn missing_key_file_fails_without_output() {
        let (ctx, tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::default());
        let registry = signed_platform_registry();
        let binary = binary_at(tmp.path());

        let cert = tmp.path().join("cert.pem");
        fs::write(&cert, "cert").unwrap();
        let material = SigningMaterial::new(cert, tmp.path().join("absent-key.pem"));

        let err = package(
            &binary,
            &unit(),
            registry.get("edgeos").unwrap(),
            Some(&material),
            &ctx,
            driver.as_ref(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            SignError::MaterialMissing { kind: "private key", .. }
        ));
        assert_eq!(driver.sign_invocations(), 0);
        assert!(!ctx.dist_dir().join("agent-edgeos").exists());
    }

    #[test]
    fn signer_failure_leaves_no_partial_package() {
        let (ctx, tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::default());
        driver.fail_sign("certificate revoked");
        let registry = signed_platform_registry();
        let binary = binary_at(tmp.path());
        let material = material_in(tmp.path());

        let err = package(
            &binary,
            &unit(),
            registry.get("edgeos").unwrap(),
            Some(&material),
            &ctx,
            driver.as_ref(),
        )
        .unwrap_err();

        assert!(matches!(err, SignError::Signer { .. }));
        assert!(!ctx.dist_dir().join("agent-edgeos").exists());
        // Staging temp dirs are cleaned up on drop.
        let leftovers: Vec<_> = fs::read_dir(ctx.dist_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(leftovers.is_empty());
    }
}
