//! The `tapsuite` command-line entry point.
//!
//! Resolves the requested suites from a [`SuiteRegistry`], registers them into one root in
//! argument order, walks the tree on a current-thread `tokio` runtime and reports TAP on
//! stdout. Process-level errors are rendered through `miette` on stderr.

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;

use crate::errors::RunnerError;
use crate::report::{StdoutSink, TapConfig, TapReporter};
use crate::runtime::{RunOutcome, Runner, RunnerConfig};

pub mod args;
pub mod registry;

pub use args::{ColorMode, TapsuiteArgs};
pub use registry::{normalize, SuiteFactory, SuiteFn, SuiteRegistry};

/// Parses the process arguments and runs.
pub fn run(registry: &SuiteRegistry) -> ExitCode {
    run_with_args(registry, TapsuiteArgs::parse())
}

pub fn run_with_args(registry: &SuiteRegistry, args: TapsuiteArgs) -> ExitCode {
    if args.list {
        for path in registry.paths() {
            println!("{path}");
        }
        return ExitCode::SUCCESS;
    }

    match execute(registry, &args) {
        Ok(outcome) => ExitCode::from(outcome.exit_code(args.strict)),
        Err(error) => {
            print_error(error);
            ExitCode::FAILURE
        }
    }
}

fn execute(registry: &SuiteRegistry, args: &TapsuiteArgs) -> Result<RunOutcome, RunnerError> {
    let suites = registry.resolve(&args.suites, &args.suite_args)?;
    let config = tap_config(args);
    debug!(suites = ?args.suites, width = config.line_length, color = config.color, "starting run");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|source| RunnerError::Runtime { source })?;

    let runner = Runner::new(RunnerConfig::default());
    let mut reporter = TapReporter::new(StdoutSink, config);
    let outcome = runtime.block_on(runner.run_with(
        |t| {
            for suite in suites {
                suite(t);
            }
        },
        &mut reporter,
    ));

    if let Some(path) = &args.summary {
        write_summary(path, &outcome)?;
    }
    Ok(outcome)
}

fn tap_config(args: &TapsuiteArgs) -> TapConfig {
    let mut config = TapConfig::default();
    if let Some(width) = args.width {
        config.line_length = width.max(1);
    }
    config.color = args.color.enabled(config.color);
    config.dir = args
        .suites
        .first()
        .and_then(|suite| Path::new(&normalize(suite)).parent().map(Path::to_path_buf))
        .filter(|dir| !dir.as_os_str().is_empty());
    config
}

fn write_summary(path: &Path, outcome: &RunOutcome) -> Result<(), RunnerError> {
    let summary_error = |source| RunnerError::Summary {
        path: path.display().to_string(),
        source,
    };
    let json = serde_json::to_string_pretty(outcome)
        .map_err(|error| summary_error(std::io::Error::other(error)))?;
    fs::write(path, json + "\n").map_err(summary_error)
}

fn print_error(error: RunnerError) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
