//! Content-addressed retrieval of pinned external components.
//!
//! Downloads land in a shared cache directory keyed by the URL digest, so a
//! component is fetched at most once per machine no matter how many builds
//! request it. Network failures are plausibly transient and retried a
//! bounded number of times; everything else fails immediately.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use flate2::read::GzDecoder;
use thiserror::Error;
use url::Url;

use crate::util::hash;

/// How many times a download is attempted before giving up.
pub const FETCH_ATTEMPTS: u32 = 3;

/// Error retrieving or unpacking an external component.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid download url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("failed to download {url} after {attempts} attempts: {message}")]
    Exhausted {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("digest mismatch for {url}: expected {expected}, got {actual}")]
    DigestMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("failed to unpack {}: {}", .archive.display(), .message)]
    Unpack { archive: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One pinned download: a URL and an optional expected content digest.
#[derive(Debug, Clone)]
pub struct Download {
    pub url: String,
    pub sha256: Option<String>,
}

impl Download {
    pub fn new(url: impl Into<String>) -> Self {
        Download {
            url: url.into(),
            sha256: None,
        }
    }

    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }

    /// The file name this download caches under: URL digest plus the
    /// original file name, so unpack code can still see the extension.
    fn cache_name(&self) -> String {
        let tail = self
            .url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download");
        format!("{}-{}", &hash::digest_str(&self.url)[..16], tail)
    }
}

/// Fetch a pinned component into the cache, returning the cached path.
///
/// A cache hit with a matching digest never touches the network, which is
/// what makes repeated toolchain resolution idempotent.
pub fn fetch(download: &Download, cache_dir: &Path) -> Result<PathBuf, FetchError> {
    let url = Url::parse(&download.url).map_err(|e| FetchError::InvalidUrl {
        url: download.url.clone(),
        message: e.to_string(),
    })?;

    fs::create_dir_all(cache_dir)?;
    let dest = cache_dir.join(download.cache_name());

    if dest.exists() && verify_digest(&dest, download).is_ok() {
        return Ok(dest);
    }

    let mut last_error = String::new();
    for attempt in 1..=FETCH_ATTEMPTS {
        match fetch_once(&url, &dest) {
            Ok(()) => {
                verify_digest(&dest, download)?;
                return Ok(dest);
            }
            Err(e) => {
                last_error = e;
                if attempt < FETCH_ATTEMPTS {
                    thread::sleep(Duration::from_secs(2 * u64::from(attempt)));
                }
            }
        }
    }

    Err(FetchError::Exhausted {
        url: download.url.clone(),
        attempts: FETCH_ATTEMPTS,
        message: last_error,
    })
}

fn fetch_once(url: &Url, dest: &Path) -> Result<(), String> {
    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(600))
        .build()
        .map_err(|e| e.to_string())?;

    let mut response = client
        .get(url.clone())
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;

    // Write through a temp name so an interrupted download never looks
    // like a completed cache entry.
    let partial = dest.with_extension("partial");
    let mut file = File::create(&partial).map_err(|e| e.to_string())?;
    io::copy(&mut response, &mut file).map_err(|e| e.to_string())?;
    fs::rename(&partial, dest).map_err(|e| e.to_string())?;
    Ok(())
}

fn verify_digest(path: &Path, download: &Download) -> Result<(), FetchError> {
    if let Some(expected) = &download.sha256 {
        let actual = hash::digest_file(path).map_err(|e| FetchError::Unpack {
            archive: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if &actual != expected {
            fs::remove_file(path)?;
            return Err(FetchError::DigestMismatch {
                url: download.url.clone(),
                expected: expected.clone(),
                actual,
            });
        }
    }
    Ok(())
}

/// Unpack a gzip-compressed tarball into a directory.
pub fn unpack_tar_gz(archive: &Path, dest: &Path) -> Result<(), FetchError> {
    fs::create_dir_all(dest)?;
    let file = File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    tar.unpack(dest).map_err(|e| FetchError::Unpack {
        archive: archive.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cache_name_is_stable_and_keeps_extension() {
        let dl = Download::new("https://example.net/pkg/base-12.1.tar.gz");
        let a = dl.cache_name();
        let b = dl.cache_name();
        assert_eq!(a, b);
        assert!(a.ends_with("base-12.1.tar.gz"));
    }

    #[test]
    fn invalid_url_is_rejected_without_retry() {
        let tmp = TempDir::new().unwrap();
        let err = fetch(&Download::new("not a url"), tmp.path()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[test]
    fn cache_hit_skips_network() {
        let tmp = TempDir::new().unwrap();
        // Nothing listens on port 1: the only way this succeeds is via
        // the cache.
        let dl = Download::new("http://127.0.0.1:1/component.tar.gz");
        let cached = tmp.path().join(dl.cache_name());
        fs::write(&cached, b"cached bytes").unwrap();

        let path = fetch(&dl, tmp.path()).unwrap();
        assert_eq!(path, cached);
    }

    #[test]
    fn digest_mismatch_evicts_cache_entry() {
        let tmp = TempDir::new().unwrap();
        let dl = Download::new("http://127.0.0.1:1/component.tar.gz")
            .with_sha256(hash::digest_str("other bytes"));
        let cached = tmp.path().join(dl.cache_name());
        fs::write(&cached, b"cached bytes").unwrap();

        // Stale entry is evicted, then the (unroutable) refetch exhausts.
        let err = fetch(&dl, tmp.path()).unwrap_err();
        assert!(matches!(err, FetchError::Exhausted { .. }));
        assert!(!cached.exists());
    }

    #[test]
    fn unpack_round_trip() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.tar.gz");

        let file = File::create(&archive).unwrap();
        let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
        let mut builder = tar::Builder::new(enc);
        let payload = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "dir/hello.txt", payload.as_slice())
            .unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        let out = tmp.path().join("out");
        unpack_tar_gz(&archive, &out).unwrap();
        assert_eq!(fs::read(out.join("dir/hello.txt")).unwrap(), payload);
    }
}
