//! Running a suite.
//!
//! [`Runner`] owns the run configuration, builds the tree (optionally) and drives the
//! [`walker`] over it once, streaming events to a [`Reporter`]. The result is a
//! serialisable [`RunOutcome`].

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::RunnerError;
use crate::report::{FatalReport, Reporter};
use crate::suite::{Dsl, ItemId, Kind, Status, Suite, Totals};
use crate::trace::panic::{catch, failure_from_panic, PanicCapture};
use crate::trace::StackRewriter;

pub mod walker;

use walker::{Step, Walker};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Stack frame paths are reported relative to this directory.
    pub cwd: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// A reported case, in run-completion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseOutcome {
    pub number: usize,
    pub title: String,
    pub path: Vec<String>,
    pub passed: bool,
}

/// Everything a finished run leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    /// Final status of the root section.
    pub status: Status,
    pub totals: Totals,
    pub cases: Vec<CaseOutcome>,
    /// Set when a hook failure or a registration panic ended the run.
    pub fatal: Option<FatalReport>,
}

impl RunOutcome {
    pub fn is_aborted(&self) -> bool {
        self.status != Status::Completed || self.fatal.is_some()
    }

    pub fn failed_cases(&self) -> impl Iterator<Item = &CaseOutcome> {
        self.cases.iter().filter(|case| !case.passed)
    }

    /// `1` when the run aborted, or with `strict` when any case failed; `0` otherwise.
    pub fn exit_code(&self, strict: bool) -> u8 {
        if self.is_aborted() || (strict && self.failed_cases().next().is_some()) {
            1
        } else {
            0
        }
    }
}

// ============================================================================
// RUNNER
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Runner {
    config: RunnerConfig,
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Builds a suite, turning a panic raised while registering into an error.
    pub fn build(register: impl FnOnce(&mut Dsl<'_>)) -> Result<Suite, RunnerError> {
        let capture = PanicCapture::install();
        let built = catch(|| Suite::build(register));
        drop(capture);

        built.map_err(|payload| RunnerError::Registration {
            message: failure_from_panic(payload).message().to_string(),
        })
    }

    /// Builds and walks a suite. A registration failure is reported as fatal and nothing is
    /// walked.
    pub async fn run_with(
        &self,
        register: impl FnOnce(&mut Dsl<'_>),
        reporter: &mut dyn Reporter,
    ) -> RunOutcome {
        match Self::build(register) {
            Ok(suite) => self.run(suite, reporter).await,
            Err(error) => {
                let message = error.to_string();
                let fatal = FatalReport {
                    kind: Kind::Section,
                    label: Kind::Section.to_string(),
                    path: Vec::new(),
                    message: Some(message.clone()),
                    stack: Some(message),
                };
                reporter.report_fatal(&fatal);
                RunOutcome {
                    status: Status::Aborted,
                    totals: Totals::default(),
                    cases: Vec::new(),
                    fatal: Some(fatal),
                }
            }
        }
    }

    /// Walks `suite` once. After a bail-out no summary is reported, since the declared total
    /// no longer matches what ran.
    ///
    /// A panic escaping the walk itself (from the reporter, say) is resumed once the panic
    /// hook has been restored.
    pub async fn run(&self, suite: Suite, reporter: &mut dyn Reporter) -> RunOutcome {
        let total = suite.totals().total;
        debug!(cases = total, nodes = suite.len(), "run started");
        reporter.report_start(total);

        let mut walker = Walker::new(suite, &mut *reporter, StackRewriter::new(&self.config.cwd));
        let capture = PanicCapture::install();
        let walked = AssertUnwindSafe(walker.walk(ItemId::ROOT))
            .catch_unwind()
            .await;
        drop(capture);
        let step = match walked {
            Ok(step) => step,
            Err(payload) => panic::resume_unwind(payload),
        };
        let (suite, cases) = walker.finish();

        let fatal = match step {
            Step::Aborted(abort) => {
                let node = suite.node(abort.item);
                let fatal = FatalReport::new(
                    node.kind(),
                    node.label(),
                    node.path.clone(),
                    node.error.as_ref(),
                );
                reporter.report_fatal(&fatal);
                Some(fatal)
            }
            Step::Completed | Step::Recorded(_) => None,
        };

        let totals = suite.totals();
        if fatal.is_none() {
            reporter.report_end(&totals);
        }
        info!(
            total = totals.total,
            pass = totals.pass,
            ran = cases.len(),
            aborted = fatal.is_some(),
            "run finished"
        );

        RunOutcome {
            status: suite.node(ItemId::ROOT).status,
            totals,
            cases,
            fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: Status, passed: &[bool]) -> RunOutcome {
        RunOutcome {
            status,
            totals: Totals {
                total: passed.len(),
                pass: passed.iter().filter(|passed| **passed).count(),
            },
            cases: passed
                .iter()
                .enumerate()
                .map(|(index, passed)| CaseOutcome {
                    number: index + 1,
                    title: format!("case {}", index + 1),
                    path: vec![format!("case {}", index + 1)],
                    passed: *passed,
                })
                .collect(),
            fatal: None,
        }
    }

    #[test]
    fn exit_code_follows_root_status() {
        assert_eq!(outcome(Status::Completed, &[true, false]).exit_code(false), 0);
        assert_eq!(outcome(Status::Aborted, &[true]).exit_code(false), 1);
    }

    #[test]
    fn strict_fails_on_any_failed_case() {
        assert_eq!(outcome(Status::Completed, &[true, false]).exit_code(true), 1);
        assert_eq!(outcome(Status::Completed, &[true, true]).exit_code(true), 0);
    }

    #[test]
    fn registration_panic_is_an_error() {
        let result = Runner::build(|t| {
            t.it("declared", |_| async { Ok(()) });
            panic!("bad registration");
        });
        match result {
            Err(RunnerError::Registration { message }) => assert_eq!(message, "bad registration"),
            other => panic!("unexpected {:?}", other.map(|suite| suite.len())),
        }
    }
}
