/*! Use-before-definition and write-target checking.
 *
 * `check_use` walks the base chain of a storage ref and reports against the deepest invalid
 * location: for `p->f` with `p` undefined, the complaint names `p`, not `p->f`. After a report
 * the offending ref is forced defined so one broken variable produces one diagnostic.
 */

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::ExprNode;
use crate::loc::SourceSpan;
use crate::storage::{DefState, Exposure, NullState, RefId, RefKind};

/// Why a read of a ref is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseDenial {
    Undefined,
    Released,
    Inconsistent,
}

impl Analyzer {
    /// Consume `node` as an rvalue: record the use and check its storage is readable.
    pub fn use_value(&mut self, node: &mut ExprNode) {
        if self.refs.is_meaningful(node.sref) {
            node.uses.insert(node.sref);
            self.check_use(node.sref, node.loc);
        }
    }

    /// Report at most one diagnostic for reading `id`, against the deepest bad ancestor.
    pub fn check_use(&mut self, id: RefId, loc: SourceSpan) {
        // &x evaluates the location of x, not the value stored in it; the base
        // need not be defined (it is usually the write target of the call)
        if matches!(self.refs.kind(id), RefKind::Addr { .. }) {
            return;
        }

        let chain = self.refs.chain(id);

        // walk root to leaf so the last denial seen is the deepest
        let mut denied: Option<(RefId, UseDenial)> = None;
        for r in chain.iter().rev() {
            if !self.refs.is_meaningful(*r) {
                continue;
            }
            if let Some(denial) = self.denial_for(*r) {
                denied = Some((*r, denial));
            }
        }

        let Some((bad, denial)) = denied else { return };

        let name = self.refs.unparse(bad);
        match denial {
            UseDenial::Undefined => self.reporter.report(
                DiagKind::UseBeforeDefinition,
                loc,
                format!("{} used before definition", name),
            ),
            UseDenial::Released => self.reporter.report(
                DiagKind::UseAfterRelease,
                loc,
                format!("{} used after release", name),
            ),
            UseDenial::Inconsistent => self.reporter.report(
                DiagKind::InconsistentState,
                loc,
                format!("{} is in an inconsistent state", name),
            ),
        }

        // force defined so the same broken location is complained about once
        self.refs.state_mut(bad).def = DefState::Defined;
    }

    fn denial_for(&self, id: RefId) -> Option<UseDenial> {
        match self.refs.state(id).def {
            DefState::Undefined | DefState::MaybeUndefined => Some(UseDenial::Undefined),
            DefState::Dead | DefState::Killed | DefState::UndefKilled => Some(UseDenial::Released),
            DefState::Unuseable => Some(UseDenial::Inconsistent),
            _ => None,
        }
    }

    /// Check a definite write to `id`, record it in `node.sets`, and advance the def state.
    pub fn check_set(&mut self, node: &mut ExprNode, id: RefId, loc: SourceSpan) {
        if !self.refs.is_meaningful(id) {
            return;
        }

        if self.deny_write(id, loc) {
            return;
        }

        node.sets.insert(id);
        self.advance_defined(id);
        self.check_own_modifies(id, loc);
    }

    /// Check a possible write (unconstrained call target, address escape).
    pub fn check_mset(&mut self, node: &mut ExprNode, id: RefId, loc: SourceSpan) {
        if !self.refs.is_meaningful(id) {
            return;
        }

        if self.deny_write(id, loc) {
            return;
        }

        // benefit of the doubt: a possibly-written location reads cleanly afterwards
        node.msets.insert(id);
        let state = self.refs.state_mut(id);
        state.def = state.def.advance();
        self.check_own_modifies(id, loc);
    }

    fn deny_write(&mut self, id: RefId, loc: SourceSpan) -> bool {
        if matches!(self.refs.kind(id), RefKind::Const) {
            self.reporter.report(
                DiagKind::UnwritableTarget,
                loc,
                "assignment to constant storage".to_string(),
            );
            return true;
        }

        let state = self.refs.state(id);
        if state.exposure == Exposure::Observer {
            let name = self.refs.unparse(id);
            self.reporter.report(
                DiagKind::UnwritableTarget,
                loc,
                format!("{} is observer storage and may not be modified", name),
            );
            return true;
        }

        // indirect writes through storage whose ownership was handed away
        if state.alias.is_transferred() && self.refs.state(id).def.is_dead() {
            let name = self.refs.unparse(id);
            self.reporter.report(
                DiagKind::UnwritableTarget,
                loc,
                format!("{} written after ownership transfer", name),
            );
            return true;
        }

        false
    }

    /// Writing a derived ref also (partially) defines everything up its chain.
    fn advance_defined(&mut self, id: RefId) {
        let state = self.refs.state_mut(id);
        state.def = state.def.advance();

        let chain = self.refs.chain(id);
        for ancestor in chain.into_iter().skip(1) {
            let s = self.refs.state_mut(ancestor);
            if !s.def.is_defined() {
                s.def = DefState::PartialDefined;
            }
        }
    }

    /// Writes outside the current function's modifies clause, when it has one.
    fn check_own_modifies(&mut self, id: RefId, loc: SourceSpan) {
        let root = self.refs.root(id);
        let external = match self.refs.kind(root) {
            RefKind::Global { .. } => true,
            RefKind::Param { .. } => self.refs.is_indirect(id) || id != root,
            _ => false,
        };
        if !external {
            return;
        }

        let rendered = self.refs.unparse(id);
        let root_name = self.refs.unparse(root);
        let listed = match self.own_modifies() {
            None => return,
            Some(modifies) => modifies
                .iter()
                .any(|m| *m == rendered || *m == root_name || *m == format!("*{}", root_name)),
        };
        if !listed {
            self.reporter.report(
                DiagKind::ModifiesUndocumented,
                loc,
                format!("{} modified but not listed in modifies clause", rendered),
            );
        }
    }

    /// Null state of `id` after guards: a guarded ref is not null on this path.
    pub fn possibly_null(&self, id: RefId) -> bool {
        if !self.refs.is_meaningful(id) {
            return false;
        }
        if self.guarded_not_null(id) {
            return false;
        }
        matches!(
            self.refs.state(id).null,
            NullState::PossiblyNull | NullState::DefinitelyNull
        )
    }
}
