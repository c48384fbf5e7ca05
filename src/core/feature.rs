//! Feature sets and verification-matrix expansion.
//!
//! A build unit declares optional capability flags; verification builds the
//! unit once per meaningful combination of them. Two names are reserved:
//! `default` for the unit's built-in defaults (no explicit selection at
//! all) and `__empty` for the explicit all-flags-disabled configuration.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Reserved name for the built-in default configuration.
pub const DEFAULT_TOKEN: &str = "default";

/// Reserved name for the explicit empty flag selection.
pub const EMPTY_TOKEN: &str = "__empty";

/// Separator joining flag names into a feature-set name.
pub const FLAG_SEPARATOR: &str = "+";

/// A named selection of optional capability flags.
///
/// Equality and hashing are by name only; the name is derived
/// deterministically from the flag set, so this is equivalent to set
/// equality and cheap to use in map keys.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureSet {
    name: String,
    /// `None` means the reserved default configuration: no explicit flag
    /// selection is passed to the compiler at all.
    flags: Option<BTreeSet<String>>,
}

impl FeatureSet {
    /// The reserved default configuration.
    pub fn default_set() -> Self {
        FeatureSet {
            name: DEFAULT_TOKEN.to_string(),
            flags: None,
        }
    }

    /// An explicit flag selection, possibly empty.
    pub fn explicit<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let flags: BTreeSet<String> = flags.into_iter().map(Into::into).collect();
        let name = if flags.is_empty() {
            EMPTY_TOKEN.to_string()
        } else {
            flags
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(FLAG_SEPARATOR)
        };
        FeatureSet {
            name,
            flags: Some(flags),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_default(&self) -> bool {
        self.flags.is_none()
    }

    pub fn flags(&self) -> Option<&BTreeSet<String>> {
        self.flags.as_ref()
    }

    /// Compiler arguments selecting this configuration.
    ///
    /// The default set passes nothing; an explicit set disables the
    /// built-in defaults and enables exactly the named flags.
    pub fn build_args(&self) -> Vec<String> {
        match &self.flags {
            None => Vec::new(),
            Some(flags) => {
                let mut args = vec!["--no-default-features".to_string()];
                if !flags.is_empty() {
                    args.push("--features".to_string());
                    args.push(flags.iter().cloned().collect::<Vec<_>>().join(","));
                }
                args
            }
        }
    }
}

impl PartialEq for FeatureSet {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for FeatureSet {}

impl std::hash::Hash for FeatureSet {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Expand declared flags into the full verification matrix.
///
/// The result is the reserved default entry followed by every subset of
/// the declared flags (a declared literal `default` is dropped first, as
/// it duplicates the reserved entry). Output length is `2^k + 1` for `k`
/// effective flags, and the order is deterministic regardless of how the
/// input set was assembled.
pub fn expand(declared: &BTreeSet<String>) -> Vec<FeatureSet> {
    let flags: Vec<&String> = declared.iter().filter(|f| *f != DEFAULT_TOKEN).collect();

    let mut matrix = Vec::with_capacity((1 << flags.len()) + 1);
    matrix.push(FeatureSet::default_set());

    // Subsets in bitmask order over the sorted flag list: the empty set
    // first, then singletons, pairs, and so on up to the full set.
    for mask in 0u32..(1u32 << flags.len()) {
        let subset = flags
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, f)| (*f).clone());
        matrix.push(FeatureSet::explicit(subset));
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(flags: &[&str]) -> BTreeSet<String> {
        flags.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn expand_produces_power_set_plus_default() {
        for k in 0..5usize {
            let flags: Vec<String> = (0..k).map(|i| format!("flag{i}")).collect();
            let matrix = expand(&flags.iter().cloned().collect());
            assert_eq!(matrix.len(), (1 << k) + 1, "k = {k}");
        }
    }

    #[test]
    fn expand_contains_default_and_empty_exactly_once() {
        let matrix = expand(&declared(&["x", "y"]));
        let defaults = matrix.iter().filter(|f| f.name() == DEFAULT_TOKEN).count();
        let empties = matrix.iter().filter(|f| f.name() == EMPTY_TOKEN).count();
        assert_eq!(defaults, 1);
        assert_eq!(empties, 1);
    }

    #[test]
    fn expand_two_flags_yields_expected_names() {
        let matrix = expand(&declared(&["y", "x"]));
        let names: Vec<&str> = matrix.iter().map(FeatureSet::name).collect();
        assert_eq!(names, vec!["default", "__empty", "x", "y", "x+y"]);
    }

    #[test]
    fn expand_is_deterministic_across_input_order() {
        let a = expand(&declared(&["tls", "ssh", "vendored"]));
        let b = expand(&declared(&["vendored", "tls", "ssh"]));
        let names_a: Vec<&str> = a.iter().map(FeatureSet::name).collect();
        let names_b: Vec<&str> = b.iter().map(FeatureSet::name).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn declared_default_flag_is_deduplicated() {
        let matrix = expand(&declared(&["default", "x"]));
        // One effective flag: default entry + 2 subsets.
        assert_eq!(matrix.len(), 3);
    }

    #[test]
    fn set_names_are_order_independent() {
        let a = FeatureSet::explicit(["b", "a"]);
        let b = FeatureSet::explicit(["a", "b"]);
        assert_eq!(a, b);
        assert_eq!(a.name(), "a+b");
    }

    #[test]
    fn default_set_passes_no_arguments() {
        assert!(FeatureSet::default_set().build_args().is_empty());
    }

    #[test]
    fn empty_set_disables_defaults_only() {
        let args = FeatureSet::explicit(Vec::<String>::new()).build_args();
        assert_eq!(args, vec!["--no-default-features"]);
    }

    #[test]
    fn explicit_set_enables_exact_flags() {
        let args = FeatureSet::explicit(["y", "x"]).build_args();
        assert_eq!(args, vec!["--no-default-features", "--features", "x,y"]);
    }
}
