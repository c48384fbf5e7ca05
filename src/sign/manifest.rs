//! Vendor package manifests.
//!
//! The manifest describes a deployable package to the vendor signing
//! tool: identity, copyright, target architecture/ABI, and where each
//! staged file installs on the device. Derivation is pure: the same unit
//! and platform conventions always produce byte-identical output.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::platform::VendorPackaging;
use crate::core::BuildUnit;

/// One (staged file, install destination) mapping.
#[derive(Debug, Clone, Serialize)]
pub struct ManifestEntry {
    /// File name inside the staging directory.
    pub source: String,
    /// Absolute install path on the device.
    pub destination: PathBuf,
    /// Octal permission bits.
    pub mode: u32,
}

/// Metadata for one deployable package.
#[derive(Debug, Clone, Serialize)]
pub struct PackageManifest {
    pub basename: String,
    pub version: String,
    pub description: String,
    pub copyright: String,
    pub arch: String,
    pub abi: String,
    pub files: Vec<ManifestEntry>,
}

impl PackageManifest {
    /// Derive the manifest for a unit on a signed platform.
    ///
    /// The entry-point binary maps to the platform's fixed install
    /// directory; nothing else ships.
    pub fn derive(unit: &BuildUnit, packaging: &VendorPackaging) -> Self {
        PackageManifest {
            basename: unit.name.clone(),
            version: unit.version.to_string(),
            description: unit.description.clone(),
            copyright: packaging.copyright.clone(),
            arch: packaging.arch.clone(),
            abi: packaging.abi.clone(),
            files: vec![ManifestEntry {
                source: unit.bin_name.clone(),
                destination: packaging.install_dir.join(&unit.bin_name),
                mode: 0o755,
            }],
        }
    }

    /// Render to the signing tool's manifest format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("package {} {}\n", self.basename, self.version));
        out.push_str(&format!("description \"{}\"\n", self.description));
        out.push_str(&format!("copyright \"{}\"\n", self.copyright));
        out.push_str(&format!("target {} {}\n", self.arch, self.abi));
        for entry in &self.files {
            out.push_str(&format!(
                "file {} {} mode={:04o}\n",
                entry.source,
                entry.destination.display(),
                entry.mode
            ));
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        std::fs::write(path, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use semver::Version;

    fn unit() -> BuildUnit {
        BuildUnit::new(
            "agent",
            "agentd",
            "device agent",
            Version::new(1, 2, 3),
            Vec::new(),
        )
    }

    fn packaging() -> VendorPackaging {
        VendorPackaging {
            install_dir: PathBuf::from("/var/db/scripts/ext"),
            copyright: "Copyright 2026, Example Networks".to_string(),
            arch: "x86_64".to_string(),
            abi: "freebsd12".to_string(),
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let a = PackageManifest::derive(&unit(), &packaging()).render();
        let b = PackageManifest::derive(&unit(), &packaging()).render();
        assert_eq!(a, b);
    }

    #[test]
    fn binary_maps_to_vendor_install_path() {
        let manifest = PackageManifest::derive(&unit(), &packaging());
        assert_eq!(manifest.files.len(), 1);
        let entry = &manifest.files[0];
        assert_eq!(entry.source, "agentd");
        assert_eq!(entry.destination, PathBuf::from("/var/db/scripts/ext/agentd"));
        assert_eq!(entry.mode, 0o755);
    }

    #[test]
    fn render_contains_every_field() {
        let text = PackageManifest::derive(&unit(), &packaging()).render();
        assert!(text.contains("package agent 1.2.3"));
        assert!(text.contains("description \"device agent\""));
        assert!(text.contains("copyright \"Copyright 2026, Example Networks\""));
        assert!(text.contains("target x86_64 freebsd12"));
        assert!(text.contains("file agentd /var/db/scripts/ext/agentd mode=0755"));
    }
}
