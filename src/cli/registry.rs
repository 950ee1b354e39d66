//! Named suite factories.
//!
//! A suite "module" is a factory registered under a path key. The runner looks paths given
//! on the command line up here, calls the factory with the trailing arguments and registers
//! the returned suite function into the shared root.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::RunnerError;
use crate::suite::Dsl;

/// Registers a suite's sections, hooks and cases.
pub type SuiteFn = Box<dyn FnOnce(&mut Dsl<'_>)>;

/// Builds a [`SuiteFn`] from the runner's trailing arguments.
pub type SuiteFactory = fn(&[String]) -> SuiteFn;

#[derive(Default)]
pub struct SuiteRegistry {
    suites: BTreeMap<String, SuiteFactory>,
}

impl SuiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under the normalised form of `path`.
    pub fn register(&mut self, path: &str, factory: SuiteFactory) -> &mut Self {
        self.suites.insert(normalize(path), factory);
        self
    }

    pub fn with(mut self, path: &str, factory: SuiteFactory) -> Self {
        self.register(path, factory);
        self
    }

    pub fn get(&self, path: &str) -> Option<SuiteFactory> {
        self.suites.get(&normalize(path)).copied()
    }

    /// Registered keys, sorted.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.suites.keys().map(String::as_str)
    }

    /// Looks up every path and instantiates its suite with `args`. Fails on the first
    /// unknown path.
    pub fn resolve(&self, paths: &[String], args: &[String]) -> Result<Vec<SuiteFn>, RunnerError> {
        paths
            .iter()
            .map(|path| {
                self.get(path)
                    .map(|factory| factory(args))
                    .ok_or_else(|| RunnerError::UnknownSuite {
                        path: path.clone(),
                        known: self.paths().collect::<Vec<_>>().join(", "),
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for SuiteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.suites.keys()).finish()
    }
}

/// Canonical key for a suite path: forward slashes, no leading `./`, no extension.
pub fn normalize(path: &str) -> String {
    let mut key = path.replace('\\', "/");
    while let Some(rest) = key.strip_prefix("./") {
        key = rest.to_string();
    }
    let has_extension = Path::new(&key).extension().is_some();
    if has_extension {
        if let Some(dot) = key.rfind('.') {
            key.truncate(dot);
        }
    }
    key.trim_end_matches('/').to_string()
}
