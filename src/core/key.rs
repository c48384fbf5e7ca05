//! Composite cache keys addressing build artifacts.

use std::fmt;

use serde::Serialize;

use crate::util::hash::Fingerprint;

/// Address of one build-graph execution.
///
/// Dependency-only artifacts are keyed by (toolchain, unit, feature set)
/// and shared across platforms; final binaries additionally carry the
/// platform they were produced for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ArtifactKey {
    pub toolchain: String,
    pub unit: String,
    pub features: String,
    pub deps_only: bool,
    pub platform: Option<String>,
}

impl ArtifactKey {
    /// Key for a dependency-only artifact.
    pub fn deps(
        toolchain: impl Into<String>,
        unit: impl Into<String>,
        features: impl Into<String>,
    ) -> Self {
        ArtifactKey {
            toolchain: toolchain.into(),
            unit: unit.into(),
            features: features.into(),
            deps_only: true,
            platform: None,
        }
    }

    /// Key for a final binary on a platform.
    pub fn binary(
        toolchain: impl Into<String>,
        unit: impl Into<String>,
        features: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        ArtifactKey {
            toolchain: toolchain.into(),
            unit: unit.into(),
            features: features.into(),
            deps_only: false,
            platform: Some(platform.into()),
        }
    }

    /// Short content fingerprint, used as a directory name.
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.field(&self.toolchain)
            .field(&self.unit)
            .field(&self.features)
            .flag(self.deps_only)
            .opt_field(self.platform.as_deref());
        fp.finish_short()
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.toolchain, self.unit, self.features)?;
        if self.deps_only {
            write!(f, "/deps")?;
        }
        if let Some(platform) = &self.platform {
            write!(f, "/{platform}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let key = ArtifactKey::deps("stable", "alpha", "x+y");
        assert_eq!(key.fingerprint(), key.clone().fingerprint());
    }

    #[test]
    fn any_field_change_changes_the_fingerprint() {
        let base = ArtifactKey::deps("stable", "alpha", "x+y");

        let mut other = base.clone();
        other.features = "x".to_string();
        assert_ne!(base.fingerprint(), other.fingerprint());

        let mut other = base.clone();
        other.toolchain = "nightly".to_string();
        assert_ne!(base.fingerprint(), other.fingerprint());

        let mut other = base.clone();
        other.deps_only = false;
        assert_ne!(base.fingerprint(), other.fingerprint());

        let mut other = base.clone();
        other.platform = Some("native".to_string());
        assert_ne!(base.fingerprint(), other.fingerprint());
    }

    #[test]
    fn display_includes_every_component() {
        let key = ArtifactKey::binary("stable", "alpha", "x+y", "native");
        assert_eq!(key.to_string(), "stable/alpha/x+y/native");

        let key = ArtifactKey::deps("stable", "alpha", "default");
        assert_eq!(key.to_string(), "stable/alpha/default/deps");
    }
}
