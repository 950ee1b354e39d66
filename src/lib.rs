//! tapsuite: a hierarchical async test engine reporting TAP version 13.
//!
//! Suites are declared with a [`Dsl`] (`describe`/`define`/`before`/`after`/`it`), walked once
//! by a [`Runner`] and reported through a [`Reporter`], usually [`TapReporter`].

pub use crate::context::{Context, Scope, Value, Vars};
pub use crate::errors::{Assertion, Failure, RunnerError};
pub use crate::report::{
    CaseReport, FatalReport, OutputBuffer, OutputSink, Reporter, StdoutSink, TapConfig,
    TapReporter,
};
pub use crate::runtime::{CaseOutcome, RunOutcome, Runner, RunnerConfig};
pub use crate::suite::{handler, Dsl, Handler, ItemId, Kind, Status, Suite, Totals};
pub use crate::trace::{Frame, StackRewriter, Trace};

pub mod cli;
pub mod context;
pub mod errors;
pub mod report;
pub mod runtime;
pub mod suite;
pub mod trace;
