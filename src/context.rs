//! Layered context visible to hooks and cases.
//!
//! Every section owns a [`Scope`] holding only the keys its own `define` hooks returned.
//! A [`Context`] is the chain of scopes from a section up to the root, deepest first.
//! Lookups walk that chain at the time of the call, so a value an ancestor defines after a
//! descendant was declared is still seen by the descendant when it runs.

use std::any::{type_name, Any};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::errors::Failure;

/// An opaque context value.
pub type Value = Rc<dyn Any>;

// ============================================================================
// VARS - the mapping a define hook returns
// ============================================================================

/// Named values returned by a `define` hook and merged into its section's scope.
#[derive(Clone, Default)]
pub struct Vars {
    entries: BTreeMap<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Vars::insert`].
    pub fn with<T: Any>(mut self, key: impl Into<String>, value: T) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert<T: Any>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Rc::new(value));
    }

    /// Inserts an already shared value without re-wrapping it.
    pub fn insert_shared(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl fmt::Debug for Vars {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}

// ============================================================================
// SCOPE - one section's local store
// ============================================================================

/// A section's local context store, shared between the section and every context
/// resolved through it.
#[derive(Clone, Default)]
pub struct Scope(Rc<RefCell<Vars>>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow merge; keys already present are replaced.
    pub fn merge(&self, vars: Vars) {
        self.0.borrow_mut().entries.extend(vars.entries);
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        self.0.borrow().entries.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.0.borrow().entries.keys().cloned().collect()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0.borrow(), f)
    }
}

// ============================================================================
// CONTEXT - deepest-first view over a chain of scopes
// ============================================================================

/// The effective context handed to a hook or case handler.
///
/// Cheap to clone. Values are read from the live scopes on every call.
#[derive(Clone, Default)]
pub struct Context {
    layers: Rc<Vec<Scope>>,
}

impl Context {
    /// `layers` must be ordered deepest section first, root last.
    pub fn from_layers(layers: Vec<Scope>) -> Self {
        Self {
            layers: Rc::new(layers),
        }
    }

    /// The raw value for `key` from the deepest section that defines it.
    pub fn value(&self, key: &str) -> Option<Value> {
        self.layers.iter().find_map(|scope| scope.lookup(key))
    }

    /// Typed lookup; `None` when the key is missing or holds another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<Rc<T>> {
        self.value(key).and_then(|value| value.downcast::<T>().ok())
    }

    /// Typed lookup failing with a descriptive error, for use with `?` in handlers.
    #[track_caller]
    pub fn require<T: Any>(&self, key: &str) -> Result<Rc<T>, Failure> {
        match self.value(key) {
            None => Err(Failure::error(format!("context has no `{}`", key))),
            Some(value) => value.downcast::<T>().map_err(|_| {
                Failure::error(format!(
                    "context value `{}` is not a {}",
                    key,
                    type_name::<T>()
                ))
            }),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.layers.iter().any(|scope| scope.lookup(key).is_some())
    }

    /// Every visible key, sorted and deduplicated.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.layers.iter().flat_map(Scope::keys).collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("keys", &self.keys()).finish()
    }
}
