//! Total/pass bookkeeping bubbled through every ancestor section.

use serde::Serialize;

use crate::suite::{Item, ItemId, Suite};

/// Case counts of a section, the root's being the run totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Totals {
    pub total: usize,
    pub pass: usize,
}

impl Totals {
    pub fn fail(&self) -> usize {
        self.total.saturating_sub(self.pass)
    }

    /// Pass rate as a percentage, `0.0` for an empty run.
    pub fn rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.pass as f64 / self.total as f64) * 100.0
    }
}

/// Counts a newly declared case on `section` and every section above it.
pub(crate) fn increase_total(suite: &mut Suite, section: ItemId) {
    bubble(suite, Some(section), |section| section.total += 1);
}

/// Counts a passed case on every strict ancestor of `case`.
pub(crate) fn increase_pass(suite: &mut Suite, case: ItemId) {
    let parent = suite.node(case).parent;
    bubble(suite, parent, |section| section.pass += 1);
}

fn bubble(suite: &mut Suite, from: Option<ItemId>, bump: impl Fn(&mut crate::suite::Section)) {
    let mut cursor = from;
    while let Some(id) = cursor {
        let node = suite.node_mut(id);
        if let Item::Section(section) = &mut node.item {
            bump(section);
        }
        cursor = node.parent;
    }
}
