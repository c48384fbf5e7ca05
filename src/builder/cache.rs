//! Single-flight dependency-artifact cache.
//!
//! Concurrent requesters for the same key block on one in-flight build
//! and share the completed entry; requesters for different keys never
//! contend beyond the map lock. Entries are immutable once created.
//! Failures are cached too: a compiler failure is deterministic given the
//! same inputs, so re-running it buys nothing but wasted work.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};

use crate::core::ArtifactKey;

/// A completed dependency-only build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepsArtifact {
    pub key: ArtifactKey,
    /// Content fingerprint of the key; doubles as the on-disk directory
    /// name.
    pub fingerprint: String,
    /// Target directory holding the compiled dependency closure.
    pub target_dir: PathBuf,
}

/// A captured, shareable build failure.
#[derive(Debug, Clone)]
pub struct CachedFailure {
    pub key: ArtifactKey,
    pub diagnostics: String,
}

type Slot = Arc<OnceLock<Result<DepsArtifact, CachedFailure>>>;

/// In-process dependency cache with single-flight deduplication.
#[derive(Default)]
pub struct DepsCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl DepsCache {
    pub fn new() -> Self {
        DepsCache::default()
    }

    /// Return the artifact for `key`, running `build` at most once per
    /// key across all threads.
    pub fn get_or_build<F>(&self, key: &ArtifactKey, build: F) -> Result<DepsArtifact, CachedFailure>
    where
        F: FnOnce() -> Result<DepsArtifact, CachedFailure>,
    {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            Arc::clone(
                slots
                    .entry(key.fingerprint())
                    .or_insert_with(|| Arc::new(OnceLock::new())),
            )
        };
        // get_or_init blocks concurrent callers until the first finishes,
        // then everyone clones the same immutable result.
        slot.get_or_init(build).clone()
    }

    /// Whether a completed entry exists for `key`.
    pub fn contains(&self, key: &ArtifactKey) -> bool {
        self.slots
            .lock()
            .unwrap()
            .get(&key.fingerprint())
            .is_some_and(|slot| slot.get().is_some())
    }

    /// Number of completed entries.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .values()
            .filter(|slot| slot.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn artifact(key: &ArtifactKey) -> DepsArtifact {
        DepsArtifact {
            key: key.clone(),
            fingerprint: key.fingerprint(),
            target_dir: PathBuf::from("/tmp/deps").join(key.fingerprint()),
        }
    }

    #[test]
    fn second_request_reuses_first_result() {
        let cache = DepsCache::new();
        let key = ArtifactKey::deps("stable", "alpha", "x+y");
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_build(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(artifact(&key))
            })
            .unwrap();
        let second = cache
            .get_or_build(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(artifact(&key))
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn different_keys_build_independently() {
        let cache = DepsCache::new();
        let a = ArtifactKey::deps("stable", "alpha", "x");
        let b = ArtifactKey::deps("stable", "alpha", "x+y");

        cache.get_or_build(&a, || Ok(artifact(&a))).unwrap();
        cache.get_or_build(&b, || Ok(artifact(&b))).unwrap();

        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failures_are_cached_and_shared() {
        let cache = DepsCache::new();
        let key = ArtifactKey::deps("stable", "alpha", "default");
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let err = cache
                .get_or_build(&key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(CachedFailure {
                        key: key.clone(),
                        diagnostics: "unresolved import".to_string(),
                    })
                })
                .unwrap_err();
            assert_eq!(err.diagnostics, "unresolved import");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_requesters_share_one_build() {
        let cache = Arc::new(DepsCache::new());
        let key = ArtifactKey::deps("stable", "alpha", "x+y");
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .get_or_build(&key, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            // Widen the race window.
                            std::thread::sleep(std::time::Duration::from_millis(20));
                            Ok(artifact(&key))
                        })
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
