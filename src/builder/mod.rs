//! Build execution: toolchains, platforms, the build graph, and its
//! dependency cache.

pub mod cache;
pub mod cross;
pub mod driver;
pub mod graph;
pub mod platform;
pub mod toolchain;

pub use cache::{DepsArtifact, DepsCache};
pub use cross::{CrossError, CrossRecipe, CrossToolchain};
pub use driver::{BuildDriver, BuildRequest, CommandDriver, ExecReport, SignRequest};
pub use graph::{BinaryArtifact, BuildError, BuildGraph, LintOutcome};
pub use platform::{Packaging, Platform, PlatformError, PlatformRegistry, PreparedPlatform};
pub use toolchain::{Toolchain, ToolchainError, ToolchainManager, ToolchainName};
