//! Depth-first, strictly sequential walk over a frozen [`Suite`].
//!
//! Inside a section, actions run grouped by [`Kind::priority`]: `define`/`before` hooks,
//! nested sections (each walked to the end before the next starts), cases, `after` hooks.
//! The sort is stable, so declaration order holds within a class.
//!
//! Every step resolves to a [`Step`]. A failing case is [`Step::Recorded`] and the walk goes
//! on; a failing hook is [`Step::Aborted`], which settles every enclosing section as aborted
//! on its way up and ends the run.

use std::future::Future;

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use tracing::{debug, warn};

use crate::context::Context;
use crate::errors::Failure;
use crate::report::{CaseReport, Reporter};
use crate::runtime::CaseOutcome;
use crate::suite::counters::increase_pass;
use crate::suite::{Handler, Item, ItemId, Kind, Status, Suite};
use crate::trace::panic::{catch_future, failure_from_panic};
use crate::trace::StackRewriter;

/// Result of running one action.
#[derive(Debug)]
pub(crate) enum Step {
    /// A hook or section finished without error.
    Completed,
    /// A case ran; its outcome has been reported.
    Recorded(CaseOutcome),
    /// A hook failed somewhere at or below this action.
    Aborted(Abort),
}

/// The hook that ended the run. Its error is stored on the node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Abort {
    pub item: ItemId,
}

/// What a hook action needs once it is detached from the tree.
enum Hook {
    Define(crate::suite::DefineHandler),
    Effect(Handler),
}

pub(crate) struct Walker<'r> {
    suite: Suite,
    reporter: &'r mut dyn Reporter,
    rewriter: StackRewriter,
    cases: Vec<CaseOutcome>,
}

impl<'r> Walker<'r> {
    pub(crate) fn new(suite: Suite, reporter: &'r mut dyn Reporter, rewriter: StackRewriter) -> Self {
        Self {
            suite,
            reporter,
            rewriter,
            cases: Vec::new(),
        }
    }

    /// Gives back the walked tree and the recorded cases.
    pub(crate) fn finish(self) -> (Suite, Vec<CaseOutcome>) {
        (self.suite, self.cases)
    }

    /// Runs every action of `section`, then settles it.
    pub(crate) fn walk(&mut self, section: ItemId) -> LocalBoxFuture<'_, Step> {
        async move {
            let mut actions = match self.suite.node(section).as_section() {
                Some(owner) => owner.actions.clone(),
                None => return Step::Completed,
            };
            actions.sort_by_key(|id| self.suite.node(*id).kind().priority());

            self.suite.node_mut(section).status = Status::Running;
            debug!(path = ?self.suite.node(section).path, actions = actions.len(), "entering section");

            for id in actions {
                match self.step(id).await {
                    Step::Completed => {}
                    Step::Recorded(outcome) => self.cases.push(outcome),
                    Step::Aborted(abort) => {
                        self.suite.settle(section, Status::Aborted);
                        return Step::Aborted(abort);
                    }
                }
            }

            self.suite.settle(section, Status::Completed);
            debug!(path = ?self.suite.node(section).path, "leaving section");
            Step::Completed
        }
        .boxed_local()
    }

    async fn step(&mut self, id: ItemId) -> Step {
        match self.suite.node(id).kind() {
            Kind::Section => self.walk(id).await,
            Kind::Case => Step::Recorded(self.run_case(id).await),
            Kind::Define | Kind::Before | Kind::After => match self.run_hook(id).await {
                Ok(()) => Step::Completed,
                Err(abort) => Step::Aborted(abort),
            },
        }
    }

    /// Context for an action: its owning section's view.
    fn context_of(&self, id: ItemId) -> Context {
        let owner = self.suite.node(id).parent.unwrap_or(ItemId::ROOT);
        self.suite.context_for(owner)
    }

    async fn run_hook(&mut self, id: ItemId) -> Result<(), Abort> {
        let node = self.suite.node(id);
        let kind = node.kind();
        let hook = match &node.item {
            Item::Define(handler) => Hook::Define(handler.clone()),
            Item::Before(handler) | Item::After(handler) => Hook::Effect(handler.clone()),
            Item::Section(_) | Item::Case(_) => return Ok(()),
        };
        let owner = node.parent.unwrap_or(ItemId::ROOT);
        let context = self.context_of(id);
        self.suite.node_mut(id).status = Status::Running;

        let result = match hook {
            Hook::Define(handler) => match guarded(async move { handler(context).await }).await {
                Ok(vars) => {
                    if let Some(section) = self.suite.node(owner).as_section() {
                        section.scope.merge(vars);
                    }
                    Ok(())
                }
                Err(failure) => Err(failure),
            },
            Hook::Effect(handler) => guarded(async move { handler(context).await }).await,
        };

        match result {
            Ok(()) => {
                self.suite.settle(id, Status::Passed);
                Ok(())
            }
            Err(mut failure) => {
                self.rewriter.rewrite(&mut failure);
                warn!(
                    %kind,
                    path = ?self.suite.node(id).path,
                    message = failure.message(),
                    "hook failed, aborting run"
                );
                let node = self.suite.node_mut(id);
                node.error = Some(failure);
                self.suite.settle(id, Status::Failed);
                Err(Abort { item: id })
            }
        }
    }

    async fn run_case(&mut self, id: ItemId) -> CaseOutcome {
        let Some(case) = self.suite.node(id).as_case() else {
            return CaseOutcome {
                number: 0,
                title: String::new(),
                path: Vec::new(),
                passed: false,
            };
        };
        let number = case.number;
        let chain = case.chain.clone();
        let title = self.suite.node(id).label();
        let context = self.context_of(id);
        self.suite.node_mut(id).status = Status::Running;
        debug!(number, title = %title, "case started");

        let mut result = Ok(());
        for link in chain {
            let context = context.clone();
            result = guarded(async move { link(context).await }).await;
            if result.is_err() {
                break;
            }
        }

        match result {
            Ok(()) => {
                increase_pass(&mut self.suite, id);
                self.suite.settle(id, Status::Passed);
            }
            Err(mut failure) => {
                self.rewriter.rewrite(&mut failure);
                debug!(number, message = failure.message(), "case failed");
                self.suite.node_mut(id).error = Some(failure);
                self.suite.settle(id, Status::Failed);
            }
        }

        let node = self.suite.node(id);
        self.reporter.report_case(&CaseReport {
            number,
            title: &title,
            path: &node.path,
            failure: node.error.as_ref(),
        });

        CaseOutcome {
            number,
            path: node.path.clone(),
            passed: node.error.is_none(),
            title,
        }
    }
}

/// Awaits `future`, turning a panic raised while polling it into a [`Failure`].
async fn guarded<T>(future: impl Future<Output = Result<T, Failure>>) -> Result<T, Failure> {
    match catch_future(future).await {
        Ok(result) => result,
        Err(payload) => Err(failure_from_panic(payload)),
    }
}
