//! Content hashing for cache keys, recipe stamps, and download digests.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Compute the SHA256 digest of a byte slice, hex-encoded.
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute the SHA256 digest of a string, hex-encoded.
pub fn digest_str(s: &str) -> String {
    digest_bytes(s.as_bytes())
}

/// Compute the SHA256 digest of a file's contents.
pub fn digest_file(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 16 * 1024];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Incremental fingerprint builder.
///
/// Components are fed in a fixed order with unambiguous separators so that
/// `["ab", "c"]` and `["a", "bc"]` never collide. Used for artifact cache
/// keys and cross-toolchain recipe stamps.
#[derive(Default)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Fingerprint {
            hasher: Sha256::new(),
        }
    }

    /// Feed one string component.
    pub fn field(&mut self, s: &str) -> &mut Self {
        self.hasher.update((s.len() as u64).to_le_bytes());
        self.hasher.update(s.as_bytes());
        self
    }

    /// Feed an optional component, distinguishing absence from emptiness.
    pub fn opt_field(&mut self, opt: Option<&str>) -> &mut Self {
        match opt {
            Some(s) => {
                self.hasher.update(b"\x01");
                self.field(s);
            }
            None => {
                self.hasher.update(b"\x00");
            }
        }
        self
    }

    /// Feed a boolean component.
    pub fn flag(&mut self, b: bool) -> &mut Self {
        self.hasher.update([b as u8]);
        self
    }

    /// Finalize to a full hex digest.
    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }

    /// Finalize to a short digest suitable for directory names.
    pub fn finish_short(self) -> String {
        self.finish()[..16].to_string()
    }
}
