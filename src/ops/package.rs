//! Implementation of `slipway package`.
//!
//! A thin wrapper over the build operation with an explicit platform:
//! building for a signed platform already ends in the packaging pipeline,
//! and for the native platform packaging is the identity transform.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use crate::builder::driver::BuildDriver;
use crate::ops::build::{build, BuildOptions};
use crate::sign::PackagedArtifact;
use crate::util::{GlobalContext, Shell};

/// Options for the package operation.
#[derive(Debug, Clone)]
pub struct PackageOptions {
    pub unit: String,
    pub platform: String,
    pub toolchain: String,
    pub features: Option<String>,
    pub certificate: Option<PathBuf>,
    pub private_key: Option<PathBuf>,
}

/// Build one unit for a platform and produce its deliverable.
pub fn package(
    options: &PackageOptions,
    ctx: &GlobalContext,
    driver: Arc<dyn BuildDriver>,
    shell: &Shell,
) -> Result<PackagedArtifact> {
    let build_options = BuildOptions {
        unit: options.unit.clone(),
        toolchain: options.toolchain.clone(),
        platform: Some(options.platform.clone()),
        features: options.features.clone(),
        with_deps: true,
        certificate: options.certificate.clone(),
        private_key: options.private_key.clone(),
    };
    build(&build_options, ctx, driver, shell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::test_support::{test_context, ScriptedDriver};
    use crate::util::config::{Config, PackagingConfig, PlatformConfig};
    use crate::util::GlobalContext;

    fn signed_ctx() -> (GlobalContext, tempfile::TempDir) {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            msrv_channel: "1.76.0".to_string(),
            platforms: vec![PlatformConfig {
                name: "edgeos".to_string(),
                triple: Some("x86_64-unknown-freebsd".to_string()),
                linker: Some("/opt/cross/bin/ld".into()),
                cross: None,
                packaging: Some(PackagingConfig {
                    install_dir: "/var/db/scripts/ext".into(),
                    copyright: "Copyright 2026, Example Networks".to_string(),
                    arch: "x86_64".to_string(),
                    abi: "freebsd12".to_string(),
                }),
            }],
        };
        (
            GlobalContext::with_config(tmp.path().to_path_buf(), config),
            tmp,
        )
    }

    fn options(unit: &str, platform: &str) -> PackageOptions {
        PackageOptions {
            unit: unit.to_string(),
            platform: platform.to_string(),
            toolchain: "stable".to_string(),
            features: None,
            certificate: None,
            private_key: None,
        }
    }

    #[test]
    fn package_for_signed_platform_emits_signed_artifact() {
        let (ctx, tmp) = signed_ctx();
        let driver = Arc::new(ScriptedDriver::with_units(&[("alpha", &[])]));

        let cert = tmp.path().join("cert.pem");
        let key = tmp.path().join("key.pem");
        fs::write(&cert, "cert").unwrap();
        fs::write(&key, "key").unwrap();

        let mut opts = options("alpha", "edgeos");
        opts.certificate = Some(cert);
        opts.private_key = Some(key);

        let artifact = package(&opts, &ctx, driver.clone(), &Shell::default()).unwrap();
        assert!(matches!(artifact, PackagedArtifact::Signed(_)));
        assert!(artifact.path().join("package.tgz").exists());
        assert_eq!(driver.sign_invocations(), 1);
    }

    #[test]
    fn package_for_native_platform_is_the_binary() {
        let (ctx, _tmp) = test_context();
        let driver = Arc::new(ScriptedDriver::with_units(&[("alpha", &[])]));

        let artifact = package(
            &options("alpha", "native"),
            &ctx,
            driver,
            &Shell::default(),
        )
        .unwrap();
        assert!(matches!(artifact, PackagedArtifact::Binary(_)));
    }

    #[test]
    fn missing_material_fails_before_any_build() {
        let (ctx, _tmp) = signed_ctx();
        let driver = Arc::new(ScriptedDriver::with_units(&[("alpha", &[])]));

        let err = package(&options("alpha", "edgeos"), &ctx, driver.clone(), &Shell::default())
            .unwrap_err();
        assert!(err.to_string().contains("requires certificate and key"));
        assert_eq!(driver.build_invocations(), 0);
        assert_eq!(driver.sign_invocations(), 0);
    }
}
