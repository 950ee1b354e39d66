//! `tapsuite` runner binary with the bundled demo suites.
//!
//! Usage: tapsuite [OPTIONS] <SUITE>... [-- <ARGS>...]
//! Log verbosity follows `RUST_LOG`; logs go to stderr, TAP to stdout.

use std::process::ExitCode;

use tapsuite::cli::{self, SuiteRegistry};

mod demos;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let registry = SuiteRegistry::new()
        .with("demos/ledger", demos::ledger_suite)
        .with("demos/failing", demos::failing_suite)
        .with("demos/bail", demos::bail_suite);

    cli::run(&registry)
}
