//! Scoped panic hook used while a suite is walked.
//!
//! Panics inside hook and case futures are caught by the walker. While such a future is
//! polled through [`catch_future`] (or a registration closure runs through [`catch`]), the
//! hook installed here keeps the default hook from printing over the TAP stream and records
//! where the panic happened, so the walker can turn the payload into a [`Failure`] with a real
//! stack. Every other panic goes to the previously installed hook.
//!
//! The hook is process-wide. Guards are counted: the first [`PanicCapture::install`] swaps
//! the hook in, the last drop puts the previous one back, whatever order guards are dropped in.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::future::{poll_fn, Future};
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::pin::pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use backtrace::Backtrace;
use futures::FutureExt;
use tracing::warn;

use crate::errors::{Assertion, Failure};
use crate::trace::{Frame, Trace, ANONYMOUS};

type Hook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Where the last captured panic on this thread was raised.
struct PanicRecord {
    origin: Option<Frame>,
    backtrace: Backtrace,
}

thread_local! {
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
    /// Set while user code runs under [`catch`] or [`catch_future`].
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
}

/// Process-wide install state shared by every guard.
struct Installed {
    depth: usize,
    /// The hook that was current before the capture hook went in.
    previous: Option<Arc<Hook>>,
}

static INSTALLED: Mutex<Installed> = Mutex::new(Installed {
    depth: 0,
    previous: None,
});

/// Guard holding the capture hook in place. Dropping the last one puts the previous hook back.
pub struct PanicCapture {
    _private: (),
}

impl PanicCapture {
    /// Installs the capturing hook, or joins the one already installed.
    pub fn install() -> Self {
        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        if installed.previous.is_none() {
            let previous: Arc<Hook> = Arc::new(panic::take_hook());
            let delegate = Arc::clone(&previous);
            panic::set_hook(Box::new(move |info| {
                if CAPTURING.with(Cell::get) {
                    record(info);
                } else {
                    (**delegate)(info);
                }
            }));
            installed.previous = Some(previous);
        }
        installed.depth += 1;
        Self { _private: () }
    }
}

impl Drop for PanicCapture {
    fn drop(&mut self) {
        let mut installed = INSTALLED.lock().unwrap_or_else(PoisonError::into_inner);
        installed.depth = installed.depth.saturating_sub(1);
        if installed.depth > 0 {
            return;
        }
        // set_hook/take_hook panic when called from a panicking thread. The capture hook
        // only acts inside `catch`, so leaving it behind is harmless; the next install reuses it.
        if thread::panicking() {
            warn!("unwinding through the runner, panic hook restore deferred");
            return;
        }
        let Some(previous) = installed.previous.take() else {
            return;
        };
        drop(panic::take_hook());
        match Arc::try_unwrap(previous) {
            Ok(hook) => panic::set_hook(hook),
            Err(shared) => panic::set_hook(Box::new(move |info| (**shared)(info))),
        }
    }
}

fn record(info: &PanicHookInfo<'_>) {
    let origin = info.location().map(|location| Frame {
        owner: None,
        function: ANONYMOUS.to_string(),
        file: location.file().into(),
        line: location.line(),
        column: location.column(),
    });
    let record = PanicRecord {
        origin,
        backtrace: Backtrace::new_unresolved(),
    };
    LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(record));
}

/// Raises [`CAPTURING`] for as long as it lives.
struct Capturing {
    outer: bool,
}

impl Capturing {
    fn raise() -> Self {
        Self {
            outer: CAPTURING.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for Capturing {
    fn drop(&mut self) {
        CAPTURING.with(|flag| flag.set(self.outer));
    }
}

/// Runs `f`, capturing a panic it raises.
pub fn catch<R>(f: impl FnOnce() -> R) -> thread::Result<R> {
    let _capturing = Capturing::raise();
    panic::catch_unwind(AssertUnwindSafe(f))
}

/// Awaits `future`, capturing a panic raised while it is polled. Code between polls is not
/// covered.
pub async fn catch_future<F: Future>(future: F) -> thread::Result<F::Output> {
    let mut caught = pin!(AssertUnwindSafe(future).catch_unwind());
    poll_fn(|cx| {
        let _capturing = Capturing::raise();
        caught.as_mut().poll(cx)
    })
    .await
}

/// Converts a caught panic payload into a [`Failure`].
///
/// String payloads become error failures (with assertion fields when the message came from
/// `assert_eq!`/`assert_ne!`); a `Failure` payload is passed through; anything else is a thrown
/// value reported by its literal text.
pub fn failure_from_panic(payload: Box<dyn Any + Send>) -> Failure {
    let record = LAST_PANIC.with(|slot| slot.borrow_mut().take());

    let payload = match payload.downcast::<Failure>() {
        Ok(failure) => return *failure,
        Err(payload) => payload,
    };
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        return Failure::Thrown(describe_payload(payload.as_ref()));
    };

    let trace = record
        .map(|record| Trace::from_parts(record.origin, record.backtrace))
        .unwrap_or_default();
    match Assertion::from_panic_message(&message) {
        Some((reported, assertion)) => Failure::Error {
            message: reported,
            assertion: Some(assertion),
            trace,
        },
        None => Failure::Error {
            message,
            assertion: None,
            trace,
        },
    }
}

fn describe_payload(payload: &(dyn Any + Send)) -> String {
    macro_rules! literal {
        ($($ty:ty),*) => {
            $(if let Some(value) = payload.downcast_ref::<$ty>() {
                return value.to_string();
            })*
        };
    }
    literal!(bool, char, i32, i64, u32, u64, usize, isize, f32, f64);
    "Box<dyn Any>".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caught_panics_become_failures() {
        let capture = PanicCapture::install();
        let payload = catch(|| panic!("inside")).unwrap_err();
        drop(capture);
        assert_eq!(failure_from_panic(payload).message(), "inside");
    }

    #[test]
    fn string_payload_becomes_error() {
        let failure = failure_from_panic(Box::new("boom"));
        assert_eq!(failure.message(), "boom");
        assert!(failure.trace().is_some());
    }

    #[test]
    fn numeric_payload_is_thrown_value() {
        let failure = failure_from_panic(Box::new(7u64));
        assert!(matches!(failure, Failure::Thrown(ref v) if v == "7"));
    }

    #[test]
    fn opaque_payload_is_named() {
        struct Opaque;
        let failure = failure_from_panic(Box::new(Opaque));
        assert_eq!(failure.message(), "Box<dyn Any>");
    }

    #[test]
    fn failure_payload_passes_through() {
        let failure = failure_from_panic(Box::new(Failure::thrown("raw")));
        assert_eq!(failure.message(), "raw");
    }

    #[test]
    fn assert_eq_payload_carries_assertion() {
        let payload = String::from("assertion `left == right` failed\n  left: 3\n right: 4");
        let failure = failure_from_panic(Box::new(payload));
        let assertion = failure.assertion_details().unwrap();
        assert_eq!(assertion.actual, "3");
        assert_eq!(assertion.expected, "4");
    }
}
