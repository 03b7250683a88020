//! Assignment expressions.

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::{ExprKind, ExprNode};
use crate::loc::SourceSpan;
use crate::storage::NullState;

impl Analyzer {
    /// `lhs op rhs` for `=` and the compound assignment operators.
    pub fn make_assign(
        &mut self,
        op: &str,
        mut lhs: ExprNode,
        mut rhs: ExprNode,
        loc: SourceSpan,
    ) -> ExprNode {
        self.use_value(&mut rhs);
        if op != "=" {
            // read-modify-write reads the target first
            self.use_value(&mut lhs);
        }

        let null_exempt = lhs.ty.decay().is_pointer() && rhs.is_null_literal();
        if !null_exempt && !self.types.match_types(&lhs.ty, &rhs.ty.decay()) {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!(
                    "assignment of {} to {} of type {}",
                    rhs.ty,
                    self.describe(&lhs),
                    lhs.ty
                ),
            );
        }

        if op == "=" {
            self.check_rep_exposure(&lhs, &rhs);
        }

        let text = format!("{} {} {}", self.describe(&lhs), op, self.describe(&rhs));
        let mut node = ExprNode::new(ExprKind::Assign(op.to_string()), lhs.ty.clone(), loc);
        node.absorb(&lhs);
        node.absorb(&rhs);

        let target = lhs.sref;
        self.check_set(&mut node, target, loc);
        self.invalidate_guards(target);

        if op == "=" {
            self.transfer_value_state(target, &rhs);
            node.value = rhs.value.clone();
        } else if matches!(op, "+=" | "-=") && lhs.ty.decay().is_pointer() {
            self.shift_buf(target, op, &rhs);
        }

        node.sref = target;
        node.with_text(text)
    }

    /// Plain assignment copies null, alias and buffer knowledge from the right side.
    fn transfer_value_state(&mut self, target: crate::storage::RefId, rhs: &ExprNode) {
        if !self.refs.is_meaningful(target) {
            return;
        }

        if rhs.is_null_literal() {
            self.set_null(target, NullState::DefinitelyNull);
            self.aliases.clear_for(target);
            return;
        }

        if self.refs.is_meaningful(rhs.sref) {
            self.copy_value_state(target, rhs.sref);
            self.record_alias(target, rhs.sref);
        } else {
            self.aliases.clear_for(target);
            if let crate::values::ConstValue::Str(s) = &rhs.value {
                let state = self.refs.state_mut(target);
                state.null = NullState::NotNull;
                state.buf = Some(Analyzer::string_buf_info(s));
            }
        }
    }

    /// `p += k` moves the pointer; its remaining extent shrinks by the known delta.
    fn shift_buf(&mut self, target: crate::storage::RefId, op: &str, rhs: &ExprNode) {
        if !self.refs.is_meaningful(target) {
            return;
        }
        let Some(delta) = rhs.value.as_int() else {
            self.refs.state_mut(target).buf = None;
            return;
        };
        let delta = if op == "-=" { -delta } else { delta };
        let state = self.refs.state_mut(target);
        state.buf = state.buf.map(|b| b.shifted(delta));
    }
}
