//! The in-memory suite tree.
//!
//! Nodes live in an arena owned by [`Suite`] and refer to each other by [`ItemId`]; the
//! parent link is a plain index, not an ownership edge. The tree is built through a
//! [`Dsl`] while the registration closure runs and is frozen afterwards: the walker takes
//! the `Suite` by value and nothing else can reach a `Dsl` for it.

use std::fmt;

use futures::future::LocalBoxFuture;
use serde::Serialize;

use crate::context::{Context, Scope, Vars};
use crate::errors::Failure;

pub mod counters;
pub mod dsl;

pub use counters::Totals;
pub use dsl::{handler, Dsl};

/// A case or hook handler.
pub type Handler = std::rc::Rc<dyn Fn(Context) -> LocalBoxFuture<'static, Result<(), Failure>>>;

/// A `define` hook handler; its output is merged into the owning section's scope.
pub type DefineHandler =
    std::rc::Rc<dyn Fn(Context) -> LocalBoxFuture<'static, Result<Vars, Failure>>>;

// ============================================================================
// IDENTIFIERS AND STATES
// ============================================================================

/// Index of a node in its [`Suite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItemId(usize);

impl ItemId {
    pub const ROOT: ItemId = ItemId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// Item discriminator, as printed in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Section,
    Case,
    Define,
    Before,
    After,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Section => "section",
            Kind::Case => "case",
            Kind::Define => "define",
            Kind::Before => "before",
            Kind::After => "after",
        }
    }

    /// Walk order inside a section. `define` and `before` share a class.
    pub fn priority(&self) -> u8 {
        match self {
            Kind::Define | Kind::Before => 1,
            Kind::Section => 5,
            Kind::Case => 6,
            Kind::After => 10,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a node. Cases and hooks end `Passed`/`Failed`, sections
/// `Completed`/`Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Running,
    Passed,
    Failed,
    Completed,
    Aborted,
}

impl Status {
    pub fn is_settled(&self) -> bool {
        !matches!(self, Status::Pending | Status::Running)
    }
}

// ============================================================================
// ITEMS
// ============================================================================

/// A grouping node.
pub struct Section {
    pub title: String,
    pub scope: Scope,
    pub actions: Vec<ItemId>,
    pub total: usize,
    pub pass: usize,
}

/// A leaf with a handler chain.
pub struct Case {
    pub title: String,
    /// 1-based, in declaration order.
    pub number: usize,
    pub chain: Vec<Handler>,
}

/// One variant per item kind.
pub enum Item {
    Section(Section),
    Case(Case),
    Define(DefineHandler),
    Before(Handler),
    After(Handler),
}

impl Item {
    pub fn kind(&self) -> Kind {
        match self {
            Item::Section(_) => Kind::Section,
            Item::Case(_) => Kind::Case,
            Item::Define(_) => Kind::Define,
            Item::Before(_) => Kind::Before,
            Item::After(_) => Kind::After,
        }
    }
}

/// An item together with its position and run state.
pub struct Node {
    pub parent: Option<ItemId>,
    /// Titles from the root. Hooks share their section's path.
    pub path: Vec<String>,
    pub status: Status,
    pub error: Option<Failure>,
    pub item: Item,
}

impl Node {
    pub fn kind(&self) -> Kind {
        self.item.kind()
    }

    pub fn title(&self) -> Option<&str> {
        match &self.item {
            Item::Section(section) => Some(&section.title),
            Item::Case(case) => Some(&case.title),
            _ => None,
        }
    }

    /// Title, or the kind name for hooks and the untitled root.
    pub fn label(&self) -> String {
        match self.title() {
            Some(title) if !title.is_empty() => title.to_string(),
            _ => self.kind().to_string(),
        }
    }

    pub fn as_section(&self) -> Option<&Section> {
        match &self.item {
            Item::Section(section) => Some(section),
            _ => None,
        }
    }

    pub fn as_case(&self) -> Option<&Case> {
        match &self.item {
            Item::Case(case) => Some(case),
            _ => None,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("kind", &self.kind())
            .field("path", &self.path)
            .field("status", &self.status)
            .field("error", &self.error.as_ref().map(Failure::message))
            .finish()
    }
}

// ============================================================================
// SUITE
// ============================================================================

/// The suite tree. Node `0` is the untitled root section.
pub struct Suite {
    nodes: Vec<Node>,
}

impl Default for Suite {
    fn default() -> Self {
        Self::new()
    }
}

impl Suite {
    pub fn new() -> Self {
        let root = Node {
            parent: None,
            path: Vec::new(),
            status: Status::Pending,
            error: None,
            item: Item::Section(Section {
                title: String::new(),
                scope: Scope::new(),
                actions: Vec::new(),
                total: 0,
                pass: 0,
            }),
        };
        Self { nodes: vec![root] }
    }

    /// Builds a tree by running `register` against the root section.
    pub fn build(register: impl FnOnce(&mut Dsl<'_>)) -> Self {
        let mut suite = Suite::new();
        register(&mut Dsl::new(&mut suite, ItemId::ROOT));
        suite
    }

    pub fn root(&self) -> &Section {
        match &self.nodes[ItemId::ROOT.0].item {
            Item::Section(section) => section,
            _ => unreachable!("node 0 is always the root section"),
        }
    }

    pub fn totals(&self) -> Totals {
        let root = self.root();
        Totals {
            total: root.total,
            pass: root.pass,
        }
    }

    pub fn node(&self, id: ItemId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: ItemId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Every node id, in declaration order.
    pub fn ids(&self) -> impl Iterator<Item = ItemId> {
        (0..self.nodes.len()).map(ItemId)
    }

    /// Context for items owned by `section`: its scope first, then each ancestor's.
    pub fn context_for(&self, section: ItemId) -> Context {
        let mut layers = Vec::new();
        let mut cursor = Some(section);
        while let Some(id) = cursor {
            let node = self.node(id);
            if let Item::Section(section) = &node.item {
                layers.push(section.scope.clone());
            }
            cursor = node.parent;
        }
        Context::from_layers(layers)
    }

    /// Marks a node settled. A node settles at most once.
    pub(crate) fn settle(&mut self, id: ItemId, status: Status) {
        let node = self.node_mut(id);
        debug_assert!(!node.status.is_settled(), "{:?} settled twice", node);
        if !node.status.is_settled() {
            node.status = status;
        }
    }

    pub(crate) fn push(&mut self, parent: ItemId, path: Vec<String>, item: Item) -> ItemId {
        let id = ItemId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            path,
            status: Status::Pending,
            error: None,
            item,
        });
        if let Item::Section(section) = &mut self.node_mut(parent).item {
            section.actions.push(id);
        }
        id
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("nodes", &self.nodes)
            .field("totals", &self.totals())
            .finish()
    }
}
