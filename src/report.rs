//! Run reporting.
//!
//! The walker talks to a [`Reporter`]: once at start, once per finished case (in completion
//! order), and once at the end, or through [`Reporter::report_fatal`] when a hook failure or a
//! registration panic aborts the run. [`TapReporter`] renders TAP version 13.

use serde::Serialize;

use crate::errors::Failure;
use crate::suite::{Kind, Totals};

pub mod output;
pub mod tap;
pub mod wrap;
pub mod yaml;

pub use output::{OutputBuffer, OutputSink, StdoutSink};
pub use tap::{TapConfig, TapReporter};

/// A finished case, as handed to [`Reporter::report_case`].
#[derive(Debug, Clone, Copy)]
pub struct CaseReport<'a> {
    pub number: usize,
    pub title: &'a str,
    pub path: &'a [String],
    /// `None` when the case passed.
    pub failure: Option<&'a Failure>,
}

impl CaseReport<'_> {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// The item that aborted a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FatalReport {
    pub kind: Kind,
    /// Title, or the kind name for hooks and the root.
    pub label: String,
    pub path: Vec<String>,
    pub message: Option<String>,
    /// Rendered call stack (or the literal thrown value).
    pub stack: Option<String>,
}

impl FatalReport {
    pub(crate) fn new(kind: Kind, label: String, path: Vec<String>, failure: Option<&Failure>) -> Self {
        Self {
            kind,
            label,
            path,
            message: failure.map(|failure| failure.message().to_string()),
            stack: failure.map(Failure::stack),
        }
    }
}

/// Sink for run events.
pub trait Reporter {
    /// `total` is the number of cases declared.
    fn report_start(&mut self, total: usize);

    fn report_case(&mut self, case: &CaseReport<'_>);

    /// Closing summary. Not called after [`Reporter::report_fatal`].
    fn report_end(&mut self, totals: &Totals);

    fn report_fatal(&mut self, fatal: &FatalReport);
}
