//! Self-built cross-toolchain bootstrap.
//!
//! A foreign platform with no native toolchain support gets its compiler
//! stack built from source: fetch the frozen vendor OS base snapshot and
//! the pinned binary-utilities and C/C++ compiler sources, build the cross
//! binutils, then build the cross compiler against the snapshot as its
//! sysroot. The whole pipeline is memoized by a stamp derived from the
//! pinned versions, so re-running against existing artifacts is a no-op.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::util::fetch::{self, Download, FetchError};
use crate::util::hash::Fingerprint;
use crate::util::process::ProcessBuilder;

/// Error bootstrapping a cross toolchain.
///
/// Fatal for the owning platform only; native builds and other foreign
/// platforms are unaffected.
#[derive(Debug, Error)]
pub enum CrossError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cross-toolchain stage `{stage}` failed for `{triple}`: {message}")]
    Stage {
        stage: &'static str,
        triple: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One pinned source tarball.
#[derive(Debug, Clone)]
pub struct PinnedSource {
    pub version: String,
    pub url: String,
    pub sha256: Option<String>,
}

impl PinnedSource {
    fn download(&self) -> Download {
        let mut dl = Download::new(self.url.clone());
        if let Some(digest) = &self.sha256 {
            dl = dl.with_sha256(digest.clone());
        }
        dl
    }
}

/// Everything that determines a cross toolchain's content.
#[derive(Debug, Clone)]
pub struct CrossRecipe {
    pub triple: String,
    /// Frozen vendor OS base filesystem snapshot (the sysroot).
    pub sysroot: PinnedSource,
    pub binutils: PinnedSource,
    pub gcc: PinnedSource,
}

impl CrossRecipe {
    /// Stamp fingerprint: the pinned versions and URLs fully determine
    /// the produced toolchain.
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprint::new();
        fp.field(&self.triple);
        for src in [&self.sysroot, &self.binutils, &self.gcc] {
            fp.field(&src.version)
                .field(&src.url)
                .opt_field(src.sha256.as_deref());
        }
        fp.finish()
    }
}

/// An installed cross toolchain.
#[derive(Debug, Clone)]
pub struct CrossToolchain {
    pub triple: String,
    pub root: PathBuf,
    pub linker: PathBuf,
}

/// Ensure the recipe's toolchain exists under `install_root`, building it
/// if the stamp is missing or stale.
pub fn ensure(
    recipe: &CrossRecipe,
    install_root: &Path,
    fetch_cache: &Path,
) -> Result<CrossToolchain, CrossError> {
    let root = install_root.join(&recipe.triple);
    let linker = root.join("bin").join(format!("{}-gcc", recipe.triple));
    let stamp = root.join(".recipe-stamp");
    let fingerprint = recipe.fingerprint();

    if stamp_matches(&stamp, &fingerprint) && linker.exists() {
        debug!(triple = %recipe.triple, "cross toolchain up to date");
        return Ok(CrossToolchain {
            triple: recipe.triple.clone(),
            root,
            linker,
        });
    }

    info!(triple = %recipe.triple, "bootstrapping cross toolchain");
    bootstrap(recipe, &root, fetch_cache)?;
    fs::write(&stamp, &fingerprint)?;

    Ok(CrossToolchain {
        triple: recipe.triple.clone(),
        root,
        linker,
    })
}

fn stamp_matches(stamp: &Path, fingerprint: &str) -> bool {
    fs::read_to_string(stamp)
        .map(|s| s.trim() == fingerprint)
        .unwrap_or(false)
}

fn bootstrap(recipe: &CrossRecipe, root: &Path, fetch_cache: &Path) -> Result<(), CrossError> {
    let build_dir = root.join("build");
    let sysroot_dir = root.join("sysroot");
    fs::create_dir_all(&build_dir)?;

    // Stage 1: fetch the frozen snapshot and pinned sources.
    let sysroot_tar = fetch::fetch(&recipe.sysroot.download(), fetch_cache)?;
    let binutils_tar = fetch::fetch(&recipe.binutils.download(), fetch_cache)?;
    let gcc_tar = fetch::fetch(&recipe.gcc.download(), fetch_cache)?;

    fetch::unpack_tar_gz(&sysroot_tar, &sysroot_dir)?;
    fetch::unpack_tar_gz(&binutils_tar, &build_dir)?;
    fetch::unpack_tar_gz(&gcc_tar, &build_dir)?;

    // Stage 2: cross binutils for the target triple.
    let binutils_src = build_dir.join(format!("binutils-{}", recipe.binutils.version));
    let binutils_build = build_dir.join("binutils-build");
    fs::create_dir_all(&binutils_build)?;

    run_stage(
        "binutils-configure",
        &recipe.triple,
        ProcessBuilder::new(binutils_src.join("configure"))
            .arg(format!("--target={}", recipe.triple))
            .arg(format!("--prefix={}", root.display()))
            .args(["--disable-nls", "--disable-werror"])
            .cwd(&binutils_build),
    )?;
    run_stage(
        "binutils-build",
        &recipe.triple,
        ProcessBuilder::new("make")
            .arg(parallel_jobs())
            .cwd(&binutils_build),
    )?;
    run_stage(
        "binutils-install",
        &recipe.triple,
        ProcessBuilder::new("make").arg("install").cwd(&binutils_build),
    )?;

    // Stage 3: cross compiler against the snapshot sysroot, with the
    // non-essential pieces disabled to keep the bootstrap cheap.
    let gcc_src = build_dir.join(format!("gcc-{}", recipe.gcc.version));
    let gcc_build = build_dir.join("gcc-build");
    fs::create_dir_all(&gcc_build)?;

    run_stage(
        "gcc-configure",
        &recipe.triple,
        ProcessBuilder::new(gcc_src.join("configure"))
            .arg(format!("--target={}", recipe.triple))
            .arg(format!("--prefix={}", root.display()))
            .arg(format!("--with-sysroot={}", sysroot_dir.display()))
            .args([
                "--enable-languages=c,c++",
                "--disable-bootstrap",
                "--disable-multilib",
                "--disable-nls",
                "--disable-libssp",
                "--disable-libsanitizer",
                "--disable-libquadmath",
            ])
            .cwd(&gcc_build),
    )?;
    run_stage(
        "gcc-build",
        &recipe.triple,
        ProcessBuilder::new("make").arg(parallel_jobs()).cwd(&gcc_build),
    )?;
    run_stage(
        "gcc-install",
        &recipe.triple,
        ProcessBuilder::new("make").arg("install").cwd(&gcc_build),
    )?;

    // The build tree is only an intermediate; the installed prefix and
    // sysroot are what later builds consume.
    let _ = fs::remove_dir_all(&build_dir);
    Ok(())
}

fn parallel_jobs() -> String {
    let jobs = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    format!("-j{jobs}")
}

fn run_stage(
    stage: &'static str,
    triple: &str,
    cmd: ProcessBuilder,
) -> Result<(), CrossError> {
    debug!(stage, %triple, command = %cmd.display(), "running cross stage");
    let output = cmd.capture().map_err(|e| CrossError::Stage {
        stage,
        triple: triple.to_string(),
        message: format!("{e:#}"),
    })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Keep the tail; compiler bootstrap logs run long.
        let tail: String = stderr
            .lines()
            .rev()
            .take(30)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(CrossError::Stage {
            stage,
            triple: triple.to_string(),
            message: tail,
        });
    }
    Ok(())
}
