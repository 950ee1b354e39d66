//! tapsuite error handling.
//!
//! Two families live here:
//!
//! - [`Failure`]: whatever a hook or a case "throws". A failing `define`/`before`/`after`
//!   hook aborts the run, a failing case is recorded and the walk continues. The walker
//!   decides which policy applies; the value itself is the same.
//! - [`RunnerError`]: failures at the process boundary (unknown suite, registration panic,
//!   I/O). These never describe a single test item.

use std::fmt;
use std::panic::Location;

use miette::Diagnostic;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::trace::Trace;

// ============================================================================
// ASSERTIONS - structured operator/actual/expected payload
// ============================================================================

/// Structured details of a failed comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assertion {
    pub operator: String,
    pub actual: String,
    pub expected: String,
}

impl Assertion {
    pub fn new(
        operator: impl Into<String>,
        actual: impl fmt::Display,
        expected: impl fmt::Display,
    ) -> Self {
        Self {
            operator: operator.into(),
            actual: actual.to_string(),
            expected: expected.to_string(),
        }
    }

    /// Recovers the comparison from an `assert_eq!`/`assert_ne!` panic message.
    ///
    /// Returns the assertion together with the message that should be reported: the custom
    /// message when the macro was given one, else the headline.
    pub fn from_panic_message(message: &str) -> Option<(String, Self)> {
        static HEADLINE: Lazy<Option<Regex>> = Lazy::new(|| {
            Regex::new(r"^assertion `left (==|!=) right` failed(?:: (?s:(.*?)))?\n\s*left: (?s:(.*?))\n\s*right: (?s:(.*))$").ok()
        });

        let captures = HEADLINE.as_ref()?.captures(message)?;
        let operator = captures.get(1)?.as_str();
        let left = captures.get(3)?.as_str().trim_end();
        let right = captures.get(4)?.as_str().trim_end();
        let reported = match captures.get(2) {
            Some(custom) => custom.as_str().to_string(),
            None => format!("assertion `left {} right` failed", operator),
        };

        Some((reported, Self::new(operator, left, right)))
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.actual, self.operator, self.expected)
    }
}

// ============================================================================
// FAILURE - the value raised by a hook or a case
// ============================================================================

/// An error raised by a hook or a case handler.
#[derive(Debug, Error, Diagnostic)]
pub enum Failure {
    /// A proper error: carries a message, an optional assertion and a call stack.
    #[error("{message}")]
    #[diagnostic(code(tapsuite::failure))]
    Error {
        message: String,
        assertion: Option<Assertion>,
        trace: Trace,
    },
    /// A bare thrown value. Reported with its literal text only, no stack rewriting.
    #[error("{0}")]
    #[diagnostic(code(tapsuite::thrown))]
    Thrown(String),
}

impl Failure {
    /// Creates an error failure, capturing the call stack at the caller.
    #[track_caller]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            assertion: None,
            trace: Trace::capture(Location::caller()),
        }
    }

    /// Creates a failure carrying structured assertion fields.
    #[track_caller]
    pub fn assertion(message: impl Into<String>, assertion: Assertion) -> Self {
        Self::Error {
            message: message.into(),
            assertion: Some(assertion),
            trace: Trace::capture(Location::caller()),
        }
    }

    /// Wraps any error, keeping its display text as the message.
    #[track_caller]
    pub fn from_error<E: std::error::Error + ?Sized>(error: &E) -> Self {
        Self::error(error.to_string())
    }

    /// A thrown value that is not an error.
    pub fn thrown(value: impl fmt::Display) -> Self {
        Self::Thrown(value.to_string())
    }

    pub fn message(&self) -> &str {
        match self {
            Failure::Error { message, .. } => message,
            Failure::Thrown(value) => value,
        }
    }

    pub fn assertion_details(&self) -> Option<&Assertion> {
        match self {
            Failure::Error { assertion, .. } => assertion.as_ref(),
            Failure::Thrown(_) => None,
        }
    }

    pub fn trace(&self) -> Option<&Trace> {
        match self {
            Failure::Error { trace, .. } => Some(trace),
            Failure::Thrown(_) => None,
        }
    }

    pub(crate) fn trace_mut(&mut self) -> Option<&mut Trace> {
        match self {
            Failure::Error { trace, .. } => Some(trace),
            Failure::Thrown(_) => None,
        }
    }

    /// The stack text printed after a bail-out line.
    pub fn stack(&self) -> String {
        match self {
            Failure::Error { message, trace, .. } => trace.render(message),
            Failure::Thrown(value) => value.clone(),
        }
    }
}

impl From<&str> for Failure {
    #[track_caller]
    fn from(message: &str) -> Self {
        Failure::error(message)
    }
}

impl From<String> for Failure {
    #[track_caller]
    fn from(message: String) -> Self {
        Failure::error(message)
    }
}

impl From<Assertion> for Failure {
    #[track_caller]
    fn from(assertion: Assertion) -> Self {
        let message = format!("expected {}", assertion);
        Failure::assertion(message, assertion)
    }
}

impl From<std::io::Error> for Failure {
    #[track_caller]
    fn from(error: std::io::Error) -> Self {
        Failure::from_error(&error)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Failure {
    #[track_caller]
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Failure::from_error(error.as_ref())
    }
}

// ============================================================================
// RUNNER ERRORS - process boundary
// ============================================================================

/// Errors raised outside of any test item.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("unknown suite `{path}`")]
    #[diagnostic(
        code(tapsuite::unknown_suite),
        help("registered suites: {known}")
    )]
    UnknownSuite { path: String, known: String },

    #[error("suite registration failed: {message}")]
    #[diagnostic(code(tapsuite::registration))]
    Registration { message: String },

    #[error("failed to write run summary to {path}")]
    #[diagnostic(code(tapsuite::io))]
    Summary {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start the async runtime")]
    #[diagnostic(code(tapsuite::io))]
    Runtime {
        #[source]
        source: std::io::Error,
    },
}
