//! Caller-facing operations, consumed by the CLI layer.

pub mod build;
pub mod check;
pub mod package;

pub use build::{build, BuildOptions};
pub use check::{check, CheckOptions, ReportFormat};
pub use package::{package, PackageOptions};
