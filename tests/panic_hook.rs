// The process panic hook around a walk.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use tapsuite::trace::panic::PanicCapture;
use tapsuite::{CaseReport, FatalReport, Reporter, Runner, Suite, Totals};

static HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

// Both tests swap the process hook.
static SERIAL: Mutex<()> = Mutex::new(());

fn install_counting_hook() {
    HOOK_CALLS.store(0, Ordering::SeqCst);
    panic::set_hook(Box::new(|_| {
        HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
    }));
}

fn calls() -> usize {
    HOOK_CALLS.load(Ordering::SeqCst)
}

/// Panics on the first finished case.
struct BrokenReporter;

impl Reporter for BrokenReporter {
    fn report_start(&mut self, _total: usize) {}

    fn report_case(&mut self, _case: &CaseReport<'_>) {
        panic!("reporter broke");
    }

    fn report_end(&mut self, _totals: &Totals) {}

    fn report_fatal(&mut self, _fatal: &FatalReport) {}
}

#[test]
fn hook_is_restored_when_a_panic_escapes_the_walk() {
    let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    install_counting_hook();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let escaped = panic::catch_unwind(AssertUnwindSafe(|| {
        runtime.block_on(async {
            let suite = Suite::build(|t| {
                t.it("panics inside the case", |_| async { panic!("inside") });
            });
            Runner::default().run(suite, &mut BrokenReporter).await
        })
    }));

    assert!(escaped.is_err());
    // The case panic was captured; the reporter panic was not.
    assert_eq!(calls(), 1);

    let _ = panic::catch_unwind(|| panic!("unrelated"));
    assert_eq!(calls(), 2);
    let _ = panic::take_hook();
}

#[test]
fn overlapping_guards_restore_the_original_hook() {
    let _serial = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);
    install_counting_hook();

    let first = PanicCapture::install();
    let second = PanicCapture::install();
    drop(first);

    // Outside a caught action the capture hook forwards.
    let _ = panic::catch_unwind(|| panic!("while second is live"));
    assert_eq!(calls(), 1);

    drop(second);
    let _ = panic::catch_unwind(|| panic!("after both"));
    assert_eq!(calls(), 2);
    let _ = panic::take_hook();
}
