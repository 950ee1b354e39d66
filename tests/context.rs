// Context resolution through nested sections.

use std::cell::RefCell;
use std::rc::Rc;

use tapsuite::{Context, Failure, OutputBuffer, RunOutcome, Runner, Suite, TapConfig, TapReporter, Vars};

type Seen = Rc<RefCell<Vec<(String, Option<u32>, Option<u32>)>>>;

/// A case handler recording the `a` and `b` values it resolves.
fn observe(
    seen: &Seen,
    name: &'static str,
) -> impl Fn(Context) -> std::future::Ready<Result<(), Failure>> {
    let seen = seen.clone();
    move |ctx| {
        let a = ctx.get::<u32>("a").map(|value| *value);
        let b = ctx.get::<u32>("b").map(|value| *value);
        seen.borrow_mut().push((name.to_string(), a, b));
        std::future::ready(Ok(()))
    }
}

async fn run(suite: Suite) -> (RunOutcome, String) {
    let mut reporter = TapReporter::new(OutputBuffer::new(), TapConfig::plain(120));
    let outcome = Runner::default().run(suite, &mut reporter).await;
    (outcome, reporter.into_sink().buffer)
}

#[tokio::test(flavor = "current_thread")]
async fn deeper_sections_override_ancestors() {
    let seen: Seen = Rc::default();
    let suite = Suite::build(|t| {
        t.describe("parent", |t| {
            t.define(|_| async { Ok(Vars::new().with("a", 1u32)) });
            t.describe("child", |t| {
                t.define(|_| async { Ok(Vars::new().with("a", 2u32).with("b", 3u32)) });
                t.it("in child", observe(&seen, "in child"));
            });
            t.describe("sibling", |t| {
                t.it("in sibling", observe(&seen, "in sibling"));
            });
            t.it("in parent", observe(&seen, "in parent"));
        });
    });

    run(suite).await;
    assert_eq!(
        *seen.borrow(),
        vec![
            ("in child".to_string(), Some(2), Some(3)),
            ("in sibling".to_string(), Some(1), None),
            ("in parent".to_string(), Some(1), None),
        ]
    );
}

#[tokio::test(flavor = "current_thread")]
async fn definitions_declared_after_a_descendant_are_visible_to_it() {
    let seen: Seen = Rc::default();
    let suite = Suite::build(|t| {
        t.describe("outer", |t| {
            t.describe("inner", |t| {
                t.it("reads", observe(&seen, "reads"));
            });
            t.define(|_| async { Ok(Vars::new().with("a", 7u32)) });
        });
    });

    run(suite).await;
    assert_eq!(*seen.borrow(), vec![("reads".to_string(), Some(7), None)]);
}

#[tokio::test(flavor = "current_thread")]
async fn contexts_read_live_scopes() {
    let kept: Rc<RefCell<Option<Context>>> = Rc::default();
    let early: Rc<RefCell<Option<u32>>> = Rc::default();
    let late: Rc<RefCell<Option<u32>>> = Rc::default();

    let suite = Suite::build(|t| {
        t.define(|_| async { Ok(Vars::new().with("a", 1u32)) });
        let (kept_in_hook, early_in_hook) = (kept.clone(), early.clone());
        t.before(move |ctx| {
            *early_in_hook.borrow_mut() = ctx.get::<u32>("a").map(|value| *value);
            *kept_in_hook.borrow_mut() = Some(ctx);
            std::future::ready(Ok(()))
        });
        t.define(|_| async { Ok(Vars::new().with("a", 2u32)) });

        let (kept_in_case, late_in_case) = (kept.clone(), late.clone());
        t.it("reads the kept context", move |_| {
            let kept = kept_in_case.borrow();
            *late_in_case.borrow_mut() = kept
                .as_ref()
                .and_then(|ctx| ctx.get::<u32>("a"))
                .map(|value| *value);
            std::future::ready(Ok(()))
        });
    });

    let (outcome, _) = run(suite).await;
    assert_eq!(outcome.totals.pass, 1);
    assert_eq!(*early.borrow(), Some(1));
    assert_eq!(*late.borrow(), Some(2));
}

#[tokio::test(flavor = "current_thread")]
async fn before_and_after_results_are_not_merged() {
    let seen: Seen = Rc::default();
    let suite = Suite::build(|t| {
        t.before(|_| async { Ok(()) });
        t.it("sees nothing", observe(&seen, "sees nothing"));
    });

    run(suite).await;
    assert_eq!(*seen.borrow(), vec![("sees nothing".to_string(), None, None)]);
}

#[tokio::test(flavor = "current_thread")]
async fn required_values_fail_the_case_when_missing() {
    let suite = Suite::build(|t| {
        t.define(|_| async { Ok(Vars::new().with("name", "ledger".to_string())) });
        t.it("missing", |ctx| async move {
            ctx.require::<u32>("supply")?;
            Ok(())
        });
        t.it("wrong type", |ctx| async move {
            ctx.require::<u32>("name")?;
            Ok(())
        });
        t.it("present", |ctx| async move {
            assert_eq!(ctx.require::<String>("name")?.as_str(), "ledger");
            Ok(())
        });
    });

    let (outcome, output) = run(suite).await;
    assert_eq!(outcome.totals.pass, 1);
    assert!(output.contains("message: \"context has no `supply`\""));
    assert!(output.contains("message: \"context value `name` is not a u32\""));
    assert!(output.contains("ok 3 - present"));
}
