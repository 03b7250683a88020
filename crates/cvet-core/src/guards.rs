/*! Null guards derived from conditions.
 *
 * A condition contributes two fact sets: refs known non-null when the condition is true, and
 * refs known non-null when it is false. `p != NULL` puts `p` in the true set; `p == NULL` puts
 * it in the false set; a bare pointer condition guards its own ref on the true side.
 */

use crate::storage::RefId;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardSet {
    pub true_guards: IndexSet<RefId>,
    pub false_guards: IndexSet<RefId>,
}

impl GuardSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.true_guards.is_empty() && self.false_guards.is_empty()
    }

    pub fn add_true(&mut self, id: RefId) {
        self.true_guards.insert(id);
    }

    pub fn add_false(&mut self, id: RefId) {
        self.false_guards.insert(id);
    }

    /// Guards of `a && b`: both conditions hold when true, so true guards union.
    /// On the false side only facts common to both failures survive.
    pub fn and(&self, other: &GuardSet) -> GuardSet {
        GuardSet {
            true_guards: self.true_guards.union(&other.true_guards).copied().collect(),
            false_guards: self
                .false_guards
                .intersection(&other.false_guards)
                .copied()
                .collect(),
        }
    }

    /// Guards of `a || b`: true guards intersect, false guards union.
    pub fn or(&self, other: &GuardSet) -> GuardSet {
        GuardSet {
            true_guards: self
                .true_guards
                .intersection(&other.true_guards)
                .copied()
                .collect(),
            false_guards: self
                .false_guards
                .union(&other.false_guards)
                .copied()
                .collect(),
        }
    }

    /// Guards of `!a`.
    pub fn invert(&self) -> GuardSet {
        GuardSet {
            true_guards: self.false_guards.clone(),
            false_guards: self.true_guards.clone(),
        }
    }

    /// Sequencing combination where neither side dominates.
    pub fn union_free(&mut self, other: &GuardSet) {
        for id in &other.true_guards {
            self.true_guards.insert(*id);
        }
        for id in &other.false_guards {
            self.false_guards.insert(*id);
        }
    }

    /// Drop facts about `id`, after an assignment makes them stale.
    pub fn invalidate(&mut self, id: RefId) {
        self.true_guards.shift_remove(&id);
        self.false_guards.shift_remove(&id);
    }
}
