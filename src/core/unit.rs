//! Build units and the registry loaded from source-tree metadata.
//!
//! A build unit is one compilable package: a name, an entry-point binary,
//! a description, and its declared optional capability flags. The registry
//! is populated from the underlying toolchain's metadata query; slipway
//! never parses package manifests itself.

use std::collections::{BTreeMap, BTreeSet};

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::feature::{self, FeatureSet, EMPTY_TOKEN};

/// Error in the source tree's declared unit metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("unit `{unit}` not found in the source tree")]
    NotFound { unit: String, available: Vec<String> },

    #[error("duplicate unit name `{unit}` in source tree metadata")]
    Duplicate { unit: String },

    #[error("unit `{unit}` declares reserved flag name `{flag}`")]
    ReservedFlag { unit: String, flag: String },

    #[error("malformed source tree metadata: {message}")]
    Malformed { message: String },
}

/// One compilable package in the source tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildUnit {
    pub name: String,

    /// Entry-point binary produced by this unit.
    pub bin_name: String,

    pub description: String,

    pub version: Version,

    /// Declared optional capability flags, order-free and unique.
    pub flags: BTreeSet<String>,
}

impl BuildUnit {
    pub fn new(
        name: impl Into<String>,
        bin_name: impl Into<String>,
        description: impl Into<String>,
        version: Version,
        flags: impl IntoIterator<Item = String>,
    ) -> Self {
        BuildUnit {
            name: name.into(),
            bin_name: bin_name.into(),
            description: description.into(),
            version,
            flags: flags.into_iter().collect(),
        }
    }

    /// The unit's full verification matrix.
    pub fn matrix(&self) -> Vec<FeatureSet> {
        feature::expand(&self.flags)
    }
}

// Subset of the toolchain's metadata JSON we consume.

#[derive(Debug, Deserialize)]
struct RawMetadata {
    packages: Vec<RawPackage>,
}

#[derive(Debug, Deserialize)]
struct RawPackage {
    name: String,
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    features: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    name: String,
    kind: Vec<String>,
}

/// All declared build units, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: BTreeMap<String, BuildUnit>,
}

impl UnitRegistry {
    /// Build a registry from already-constructed units.
    ///
    /// Rejects duplicate names outright: two units sharing a name is a
    /// misconfigured source tree, never something to resolve silently.
    /// Also rejects a declared flag named `__empty`, which would collide
    /// with the reserved empty-set token.
    pub fn from_units(units: Vec<BuildUnit>) -> Result<Self, MetadataError> {
        let mut map = BTreeMap::new();
        for unit in units {
            if let Some(flag) = unit.flags.iter().find(|f| *f == EMPTY_TOKEN) {
                return Err(MetadataError::ReservedFlag {
                    unit: unit.name,
                    flag: flag.clone(),
                });
            }
            if map.contains_key(&unit.name) {
                return Err(MetadataError::Duplicate { unit: unit.name });
            }
            map.insert(unit.name.clone(), unit);
        }
        Ok(UnitRegistry { units: map })
    }

    /// Parse the toolchain's metadata JSON into a registry.
    ///
    /// Only packages with an entry-point binary become build units; pure
    /// library packages are dependencies, not deliverables.
    pub fn parse(json: &str) -> Result<Self, MetadataError> {
        let raw: RawMetadata =
            serde_json::from_str(json).map_err(|e| MetadataError::Malformed {
                message: e.to_string(),
            })?;

        let mut units = Vec::new();
        for package in raw.packages {
            let Some(bin_name) = package
                .targets
                .iter()
                .find(|t| t.kind.iter().any(|k| k == "bin"))
                .map(|t| t.name.clone())
            else {
                continue;
            };

            let version =
                Version::parse(&package.version).map_err(|e| MetadataError::Malformed {
                    message: format!("unit `{}` version: {e}", package.name),
                })?;

            units.push(BuildUnit::new(
                package.name,
                bin_name,
                package.description.unwrap_or_default(),
                version,
                package.features.into_keys(),
            ));
        }

        Self::from_units(units)
    }

    /// Look up a unit by name.
    pub fn get(&self, name: &str) -> Result<&BuildUnit, MetadataError> {
        self.units.get(name).ok_or_else(|| MetadataError::NotFound {
            unit: name.to_string(),
            available: self.names().iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn units(&self) -> impl Iterator<Item = &BuildUnit> {
        self.units.values()
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(name: &str, flags: &[&str]) -> BuildUnit {
        BuildUnit::new(
            name,
            name,
            "test unit",
            Version::new(0, 1, 0),
            flags.iter().map(|s| s.to_string()),
        )
    }

    #[test]
    fn duplicate_unit_names_are_fatal() {
        let err = UnitRegistry::from_units(vec![unit("alpha", &[]), unit("alpha", &[])])
            .unwrap_err();
        assert!(matches!(err, MetadataError::Duplicate { unit } if unit == "alpha"));
    }

    #[test]
    fn reserved_empty_token_flag_is_rejected() {
        let err = UnitRegistry::from_units(vec![unit("alpha", &["__empty"])]).unwrap_err();
        assert!(matches!(err, MetadataError::ReservedFlag { .. }));
    }

    #[test]
    fn missing_unit_lists_available_names() {
        let registry = UnitRegistry::from_units(vec![unit("alpha", &[]), unit("beta", &[])])
            .unwrap();
        match registry.get("gamma").unwrap_err() {
            MetadataError::NotFound { unit, available } => {
                assert_eq!(unit, "gamma");
                assert_eq!(available, vec!["alpha", "beta"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_keeps_only_binary_packages() {
        let json = r#"{
            "packages": [
                {
                    "name": "agent",
                    "version": "1.2.3",
                    "description": "device agent",
                    "features": {"default": ["tls"], "tls": [], "ssh": []},
                    "targets": [
                        {"name": "agent-core", "kind": ["lib"]},
                        {"name": "agentd", "kind": ["bin"]}
                    ]
                },
                {
                    "name": "support-lib",
                    "version": "0.3.0",
                    "targets": [{"name": "support_lib", "kind": ["lib"]}]
                }
            ]
        }"#;

        let registry = UnitRegistry::parse(json).unwrap();
        assert_eq!(registry.len(), 1);

        let agent = registry.get("agent").unwrap();
        assert_eq!(agent.bin_name, "agentd");
        assert_eq!(agent.version, Version::new(1, 2, 3));
        assert!(agent.flags.contains("ssh"));
    }

    #[test]
    fn parse_rejects_bad_json() {
        assert!(matches!(
            UnitRegistry::parse("not json").unwrap_err(),
            MetadataError::Malformed { .. }
        ));
    }

    #[test]
    fn matrix_size_tracks_declared_flags() {
        let u = unit("alpha", &["x", "y"]);
        assert_eq!(u.matrix().len(), 5);
    }
}
