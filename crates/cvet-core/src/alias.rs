/*! Must-alias tracking and representation exposure.
 *
 * Alias facts are recorded at assignments and scoped to the block that created them; leaving the
 * block drops facts about storage that no longer exists. The exposure check walks the alias set
 * of an assigned value to find externally visible storage that ends up sharing an abstract
 * type's representation.
 */

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::ExprNode;
use crate::storage::{Exposure, RefId, RefKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct AliasFact {
    lhs: RefId,
    rhs: RefId,
    scope: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    facts: Vec<AliasFact>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, lhs: RefId, rhs: RefId, scope: u32) {
        if lhs == rhs {
            return;
        }
        self.facts.push(AliasFact { lhs, rhs, scope });
    }

    /// Assignment to `lhs` kills what it previously aliased.
    pub fn clear_for(&mut self, lhs: RefId) {
        self.facts.retain(|f| f.lhs != lhs);
    }

    /// Drop facts recorded at scopes deeper than `depth`.
    pub fn prune_to(&mut self, depth: u32) {
        self.facts.retain(|f| f.scope <= depth);
    }

    /// Everything known to share storage with `id`, in both directions.
    pub fn aliases_of(&self, id: RefId) -> Vec<RefId> {
        let mut out = Vec::new();
        for f in &self.facts {
            if f.lhs == id && !out.contains(&f.rhs) {
                out.push(f.rhs);
            }
            if f.rhs == id && !out.contains(&f.lhs) {
                out.push(f.lhs);
            }
        }
        out
    }

    pub fn may_alias(&self, a: RefId, b: RefId) -> bool {
        a == b || self.aliases_of(a).contains(&b)
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }
}

impl Analyzer {
    /// Record must-alias(lhs, rhs) after a plain pointer assignment.
    pub(crate) fn record_alias(&mut self, lhs: RefId, rhs: RefId) {
        let scope = self.symbols.depth() as u32;
        self.aliases.clear_for(lhs);
        if self.refs.is_meaningful(rhs) {
            self.aliases.record(lhs, rhs, scope);
        }
    }

    /// Storing externally visible mutable storage into the representation of an abstract type
    /// exposes the rep: later mutations through the external name bypass the abstraction.
    pub(crate) fn check_rep_exposure(&mut self, lhs: &ExprNode, rhs: &ExprNode) {
        if !self.assigns_into_abstract_rep(lhs.sref) {
            return;
        }
        if !self.types.is_mutable(&rhs.ty) {
            return;
        }

        let mut candidates = vec![rhs.sref];
        candidates.extend(self.aliases.aliases_of(rhs.sref));

        for cand in candidates {
            if !self.refs.is_meaningful(cand) {
                continue;
            }
            let root = self.refs.root(cand);
            let external = matches!(
                self.refs.kind(root),
                RefKind::Param { .. } | RefKind::Global { .. }
            );
            if !external {
                continue;
            }
            let state = self.refs.state(cand);
            if state.alias.is_transferred() || state.exposure == Exposure::Exposed {
                continue;
            }
            let name = self.refs.unparse(cand);
            self.reporter.report(
                DiagKind::RepExposure,
                lhs.loc,
                format!(
                    "abstract representation of {} now shares storage with {}",
                    self.refs.unparse(lhs.sref),
                    name
                ),
            );
            return;
        }
    }

    /// True when `lhs` writes through a field or deref whose root has abstract type.
    fn assigns_into_abstract_rep(&self, lhs: RefId) -> bool {
        let chain = self.refs.chain(lhs);
        if chain.len() < 2 {
            return false;
        }
        chain
            .iter()
            .skip(1)
            .any(|r| self.types.is_abstract(self.refs.ty(*r)))
    }
}
