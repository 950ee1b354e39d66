//! Demo suites over a small in-memory ledger.
//!
//! The ledger stands in for an external chain simulator: balances, a clock and
//! snapshot/rollback. Suites receive it through the context like any other value.

use std::cell::RefCell;
use std::collections::BTreeMap;

use tapsuite::cli::SuiteFn;
use tapsuite::{handler, Context, Failure, Vars};
use thiserror::Error;

const DEFAULT_SUPPLY: u64 = 1_000;

// ============================================================================
// LEDGER
// ============================================================================

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("insufficient balance: `{account}` holds {balance}, needs {amount}")]
    Insufficient {
        account: String,
        balance: u64,
        amount: u64,
    },
    #[error("no snapshot to roll back to")]
    NoSnapshot,
}

impl From<LedgerError> for Failure {
    #[track_caller]
    fn from(error: LedgerError) -> Self {
        Failure::from_error(&error)
    }
}

#[derive(Debug, Clone, Default)]
struct State {
    balances: BTreeMap<String, u64>,
    now: u64,
}

#[derive(Debug, Default)]
pub struct Ledger {
    state: RefCell<State>,
    snapshots: RefCell<Vec<State>>,
}

impl Ledger {
    pub fn with_supply(account: &str, supply: u64) -> Self {
        let ledger = Self::default();
        ledger.mint(account, supply);
        ledger
    }

    pub fn mint(&self, account: &str, amount: u64) {
        *self
            .state
            .borrow_mut()
            .balances
            .entry(account.to_string())
            .or_default() += amount;
    }

    pub fn balance(&self, account: &str) -> u64 {
        self.state
            .borrow()
            .balances
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    pub fn transfer(&self, from: &str, to: &str, amount: u64) -> Result<(), LedgerError> {
        let mut state = self.state.borrow_mut();
        let balance = state.balances.get(from).copied().unwrap_or(0);
        if balance < amount {
            return Err(LedgerError::Insufficient {
                account: from.to_string(),
                balance,
                amount,
            });
        }
        state.balances.insert(from.to_string(), balance - amount);
        *state.balances.entry(to.to_string()).or_default() += amount;
        Ok(())
    }

    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    pub fn increase_time(&self, seconds: u64) {
        self.state.borrow_mut().now += seconds;
    }

    /// Saves the current state; returns the snapshot depth.
    pub fn snapshot(&self) -> usize {
        let state = self.state.borrow().clone();
        let mut snapshots = self.snapshots.borrow_mut();
        snapshots.push(state);
        snapshots.len()
    }

    pub fn rollback(&self) -> Result<(), LedgerError> {
        let state = self
            .snapshots
            .borrow_mut()
            .pop()
            .ok_or(LedgerError::NoSnapshot)?;
        *self.state.borrow_mut() = state;
        Ok(())
    }
}

fn ledger(ctx: &Context) -> Result<std::rc::Rc<Ledger>, Failure> {
    ctx.require::<Ledger>("ledger")
}

/// `--supply N` or `--supply=N` from the trailing arguments.
fn supply_arg(args: &[String]) -> Option<u64> {
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if let Some(value) = arg.strip_prefix("--supply=") {
            return value.parse().ok();
        }
        if arg == "--supply" {
            return iter.next().and_then(|value| value.parse().ok());
        }
    }
    None
}

// ============================================================================
// SUITES
// ============================================================================

/// Every case passes.
pub fn ledger_suite(args: &[String]) -> SuiteFn {
    let supply = supply_arg(args).unwrap_or(DEFAULT_SUPPLY);

    Box::new(move |t| {
        t.describe("Ledger", |t| {
            t.define(move |_| async move {
                Ok(Vars::new()
                    .with("ledger", Ledger::with_supply("treasury", supply))
                    .with("supply", supply))
            });

            t.it("mints the initial supply", |ctx| async move {
                let supply = ctx.require::<u64>("supply")?;
                assert_eq!(ledger(&ctx)?.balance("treasury"), *supply);
                Ok(())
            });

            t.describe("transfers", |t| {
                t.define(|_| async { Ok(Vars::new().with("amount", 250u64)) });
                t.before(|ctx| async move {
                    ledger(&ctx)?.snapshot();
                    Ok(())
                });
                t.after(|ctx| async move {
                    ledger(&ctx)?.rollback()?;
                    Ok(())
                });

                t.it("moves funds between accounts", |ctx| async move {
                    let ledger = ledger(&ctx)?;
                    let amount = *ctx.require::<u64>("amount")?;
                    ledger.transfer("treasury", "alice", amount)?;
                    assert_eq!(ledger.balance("alice"), amount);
                    Ok(())
                });

                t.it_chain(
                    "rejects overdrafts",
                    vec![
                        handler(|ctx| async move {
                            if ledger(&ctx)?.balance("bob") != 0 {
                                return Err("bob already holds funds".into());
                            }
                            Ok(())
                        }),
                        handler(|ctx| async move {
                            match ledger(&ctx)?.transfer("bob", "alice", 1) {
                                Err(LedgerError::Insufficient { .. }) => Ok(()),
                                Err(other) => Err(other.into()),
                                Ok(()) => Err("overdraft accepted".into()),
                            }
                        }),
                    ],
                );
            });

            t.describe("clock", |t| {
                t.it("advances by the requested time", |ctx| async move {
                    let ledger = ledger(&ctx)?;
                    let before = ledger.now();
                    ledger.increase_time(3_600);
                    assert_eq!(ledger.now() - before, 3_600);
                    Ok(())
                });
            });
        });
    })
}

/// Mixes passing and failing cases; no hook fails.
pub fn failing_suite(_args: &[String]) -> SuiteFn {
    Box::new(|t| {
        t.describe("Failing", |t| {
            t.define(|_| async { Ok(Vars::new().with("ledger", Ledger::with_supply("alice", 10))) });

            t.it("reads a balance", |ctx| async move {
                assert_eq!(ledger(&ctx)?.balance("alice"), 10);
                Ok(())
            });
            t.it("reports a returned error", |_| async { Err(Failure::error("boom")) });
            t.it("reports a failed comparison", |ctx| async move {
                assert_eq!(ledger(&ctx)?.balance("alice"), 20, "alice balance");
                Ok(())
            });
            t.it("reports a thrown value", |_| async { Err(Failure::thrown(42)) });
            t.it("keeps running after failures", |_| async { Ok(()) });
        });
    })
}

/// A `before` hook fails and aborts the run.
pub fn bail_suite(_args: &[String]) -> SuiteFn {
    Box::new(|t| {
        t.describe("Setup", |t| {
            t.it("runs first", |_| async { Ok(()) });
        });
        t.describe("Broken", |t| {
            t.before(|_| async { Err(Failure::error("simulator unreachable")) });
            t.it("never runs", |_| async { Ok(()) });
        });
        t.it("is never reached", |_| async { Ok(()) });
    })
}
