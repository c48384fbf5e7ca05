//! Status-line output for the CLI.
//!
//! All user-facing output goes through [`Shell`] so commands never manage
//! colors or alignment themselves. Progress bars degrade to plain lines in
//! verbose mode and disappear in quiet mode.

use std::fmt::Display;
use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only, no progress.
    Quiet,
    #[default]
    Normal,
    /// Immediate status lines, no progress bars.
    Verbose,
}

/// Status prefix for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    // In-progress (cyan)
    Resolving,
    Fetching,
    Building,
    Checking,
    Signing,
    // Success (green)
    Finished,
    Packaged,
    Cached,
    Removed,
    // Attention (yellow/red)
    Skipped,
    Warning,
    Error,
    // Neutral
    Info,
}

impl Status {
    fn as_str(&self) -> &'static str {
        match self {
            Status::Resolving => "Resolving",
            Status::Fetching => "Fetching",
            Status::Building => "Building",
            Status::Checking => "Checking",
            Status::Signing => "Signing",
            Status::Finished => "Finished",
            Status::Packaged => "Packaged",
            Status::Cached => "Cached",
            Status::Removed => "Removed",
            Status::Skipped => "Skipped",
            Status::Warning => "Warning",
            Status::Error => "error",
            Status::Info => "Info",
        }
    }

    fn color_code(&self) -> &'static str {
        match self {
            Status::Resolving
            | Status::Fetching
            | Status::Building
            | Status::Checking
            | Status::Signing => "\x1b[1;36m",
            Status::Finished | Status::Packaged | Status::Cached | Status::Removed => "\x1b[1;32m",
            Status::Skipped | Status::Warning => "\x1b[1;33m",
            Status::Error => "\x1b[1;31m",
            Status::Info => "\x1b[1;34m",
        }
    }
}

/// Width the status column is right-aligned to.
const STATUS_WIDTH: usize = 12;

/// Central shell for CLI output.
#[derive(Debug)]
pub struct Shell {
    verbosity: Verbosity,
    use_color: bool,
}

impl Shell {
    pub fn new(verbosity: Verbosity, use_color: bool) -> Self {
        Shell {
            verbosity,
            use_color,
        }
    }

    /// Build a shell from CLI flags. `quiet` wins over `verbose`.
    pub fn from_flags(quiet: bool, verbose: bool, no_color: bool) -> Self {
        let verbosity = if quiet {
            Verbosity::Quiet
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        };
        let use_color = !no_color && io::stderr().is_terminal();
        Shell::new(verbosity, use_color)
    }

    pub fn is_quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity == Verbosity::Verbose
    }

    /// Print a status line: `{status:>12} {message}`.
    ///
    /// Quiet mode suppresses everything except errors.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_quiet() && status != Status::Error {
            return;
        }
        eprintln!("{} {}", self.prefix(status), msg);
    }

    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    pub fn error(&self, msg: impl Display) {
        self.status(Status::Error, msg);
    }

    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Create a progress bar over `total` items.
    ///
    /// Returns a no-op handle in quiet and verbose modes, where bars would
    /// fight with the raw status lines.
    pub fn progress(&self, total: u64, msg: impl Display) -> Progress {
        if self.is_quiet() || self.is_verbose() || total <= 1 {
            return Progress { bar: None };
        }
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("#>-"),
        );
        bar.set_message(msg.to_string());
        Progress { bar: Some(bar) }
    }

    fn prefix(&self, status: Status) -> String {
        let text = status.as_str();
        if self.use_color {
            format!(
                "{}{:>width$}\x1b[0m",
                status.color_code(),
                text,
                width = STATUS_WIDTH
            )
        } else {
            format!("{:>width$}", text, width = STATUS_WIDTH)
        }
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(Verbosity::Normal, false)
    }
}

/// Progress handle safe to share across worker threads.
pub struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    pub fn inc(&self) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

/// Format a duration the way the status lines expect.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_wins_over_verbose() {
        let shell = Shell::from_flags(true, true, true);
        assert!(shell.is_quiet());
        assert!(!shell.is_verbose());
    }

    #[test]
    fn prefix_is_right_aligned() {
        let shell = Shell::new(Verbosity::Normal, false);
        let prefix = shell.prefix(Status::Building);
        assert_eq!(prefix.len(), STATUS_WIDTH);
        assert_eq!(prefix.trim(), "Building");
    }

    #[test]
    fn format_duration_switches_units() {
        assert_eq!(format_duration(Duration::from_millis(250)), "0.25s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }
}
