//! Declarative registration API: `describe`, `define`, `before`, `after`, `it`.
//!
//! ```
//! use tapsuite::{Suite, Vars};
//!
//! let suite = Suite::build(|t| {
//!     t.describe("Token", |t| {
//!         t.define(|_| async { Ok(Vars::new().with("supply", 10u64)) });
//!         t.it("has a supply", |ctx| async move {
//!             let supply = ctx.require::<u64>("supply")?;
//!             assert_eq!(*supply, 10);
//!             Ok(())
//!         });
//!     });
//! });
//! assert_eq!(suite.totals().total, 1);
//! ```

use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;

use crate::context::{Context, Scope, Vars};
use crate::errors::Failure;
use crate::suite::counters::increase_total;
use crate::suite::{Case, Handler, Item, ItemId, Section, Suite};

/// Boxes a handler function so it can be part of a case chain.
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Context) -> Fut + 'static,
    Fut: Future<Output = Result<(), Failure>> + 'static,
{
    Rc::new(move |ctx| f(ctx).boxed_local())
}

/// Registration handle bound to one section.
pub struct Dsl<'a> {
    suite: &'a mut Suite,
    section: ItemId,
}

impl<'a> Dsl<'a> {
    pub(crate) fn new(suite: &'a mut Suite, section: ItemId) -> Self {
        Self { suite, section }
    }

    /// The section this handle registers into.
    pub fn section(&self) -> ItemId {
        self.section
    }

    fn section_path(&self) -> Vec<String> {
        self.suite.node(self.section).path.clone()
    }

    /// Adds a nested section and runs `body` against it right away.
    pub fn describe(&mut self, title: impl Into<String>, body: impl FnOnce(&mut Dsl<'_>)) {
        let title = title.into();
        let mut path = self.section_path();
        path.push(title.clone());
        let id = self.suite.push(
            self.section,
            path,
            Item::Section(Section {
                title,
                scope: Scope::new(),
                actions: Vec::new(),
                total: 0,
                pass: 0,
            }),
        );
        body(&mut Dsl::new(self.suite, id));
    }

    /// Adds a hook whose returned [`Vars`] are merged into this section's scope.
    pub fn define<F, Fut>(&mut self, f: F)
    where
        F: Fn(Context) -> Fut + 'static,
        Fut: Future<Output = Result<Vars, Failure>> + 'static,
    {
        let path = self.section_path();
        self.suite.push(
            self.section,
            path,
            Item::Define(Rc::new(move |ctx| f(ctx).boxed_local())),
        );
    }

    /// Adds a side-effecting hook run before nested sections and cases.
    pub fn before<F, Fut>(&mut self, f: F)
    where
        F: Fn(Context) -> Fut + 'static,
        Fut: Future<Output = Result<(), Failure>> + 'static,
    {
        let path = self.section_path();
        self.suite
            .push(self.section, path, Item::Before(handler(f)));
    }

    /// Adds a side-effecting hook run after everything else in this section.
    pub fn after<F, Fut>(&mut self, f: F)
    where
        F: Fn(Context) -> Fut + 'static,
        Fut: Future<Output = Result<(), Failure>> + 'static,
    {
        let path = self.section_path();
        self.suite.push(self.section, path, Item::After(handler(f)));
    }

    /// Adds a case with a single handler.
    pub fn it<F, Fut>(&mut self, title: impl Into<String>, f: F)
    where
        F: Fn(Context) -> Fut + 'static,
        Fut: Future<Output = Result<(), Failure>> + 'static,
    {
        self.it_chain(title, [handler(f)]);
    }

    /// Adds a case whose handlers run in order against the same context; the first
    /// error ends the chain.
    pub fn it_chain(&mut self, title: impl Into<String>, chain: impl IntoIterator<Item = Handler>) {
        let title = title.into();
        let mut path = self.section_path();
        path.push(title.clone());
        let number = self.suite.root().total + 1;
        self.suite.push(
            self.section,
            path,
            Item::Case(Case {
                title,
                number,
                chain: chain.into_iter().collect(),
            }),
        );
        increase_total(self.suite, self.section);
    }
}
