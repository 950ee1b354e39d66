//! Command-line arguments for the `tapsuite` runner.
//!
//! Built with `clap`'s derive API. Everything after a literal `--` is handed to the suite
//! factories untouched.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Run suites and report TAP version 13 on stdout.
#[derive(Debug, Parser)]
#[command(name = "tapsuite", version, about = "Run test suites and report TAP version 13.")]
pub struct TapsuiteArgs {
    /// Suite paths to load, in order.
    #[arg(value_name = "SUITE", required_unless_present = "list")]
    pub suites: Vec<String>,

    /// Arguments passed to every suite factory.
    #[arg(last = true, value_name = "ARGS")]
    pub suite_args: Vec<String>,

    /// Wrap output at this many columns instead of the terminal width.
    #[arg(long, value_name = "N")]
    pub width: Option<usize>,

    /// When to colour the output.
    #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Also exit with status 1 when any case failed.
    #[arg(long)]
    pub strict: bool,

    /// Write a JSON run summary to this file.
    #[arg(long, value_name = "PATH")]
    pub summary: Option<PathBuf>,

    /// Print the registered suites and exit.
    #[arg(long)]
    pub list: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolves `auto` with the detected terminal state.
    pub fn enabled(self, detected: bool) -> bool {
        match self {
            ColorMode::Auto => detected,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}
