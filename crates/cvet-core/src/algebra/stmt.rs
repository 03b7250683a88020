//! Statements, declarations, and statement-list fusion.

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::{ExprKind, ExprNode};
use crate::flow::{ExitKind, FlowSummary};
use crate::loc::SourceSpan;
use crate::storage::{DefState, NullState, RESULT_REF};
use crate::symtab::StorageClass;
use crate::types::CType;

impl Analyzer {
    pub fn make_expr_stmt(&mut self, expr: ExprNode, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::ExprStmt, CType::Void, loc);
        node.summary = expr.summary;
        node.absorb(&expr);
        let text = expr.text.clone();
        node.with_text(text)
    }

    /// Declaration with optional initializer. The symbol must already be in scope; the
    /// initializer behaves like a plain assignment to the fresh storage.
    pub fn make_decl(
        &mut self,
        name: &str,
        init: Option<ExprNode>,
        loc: SourceSpan,
    ) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::Decl(name.to_string()), CType::Void, loc);

        let Some(id) = self.ref_for_symbol(name) else {
            return node.with_text(name);
        };
        let is_global = self
            .symbols
            .lookup(name)
            .map(|s| s.is_global())
            .unwrap_or(false);
        let declared_null = self.symbols.lookup(name).map(|s| s.null);
        let declared_alias = self.symbols.lookup(name).map(|s| s.alias);

        match init {
            Some(mut rhs) => {
                self.use_value(&mut rhs);
                let lhs_ty = self.refs.ty(id).clone();
                let null_exempt = lhs_ty.decay().is_pointer() && rhs.is_null_literal();
                if !null_exempt && !self.types.match_types(&lhs_ty, &rhs.ty.decay()) {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("initializer of type {} for {} of type {}", rhs.ty, name, lhs_ty),
                    );
                }
                node.absorb(&rhs);
                node.sets.insert(id);
                {
                    let state = self.refs.state_mut(id);
                    state.def = DefState::Defined;
                }
                if rhs.is_null_literal() {
                    self.set_null(id, NullState::DefinitelyNull);
                } else if self.refs.is_meaningful(rhs.sref) {
                    self.copy_value_state(id, rhs.sref);
                    self.record_alias(id, rhs.sref);
                } else if let crate::values::ConstValue::Str(s) = &rhs.value {
                    let state = self.refs.state_mut(id);
                    state.null = NullState::NotNull;
                    state.buf = Some(Analyzer::string_buf_info(s));
                }
            }
            None => {
                let state = self.refs.state_mut(id);
                state.def = if is_global {
                    // file-scope storage is zero-initialized
                    DefState::Defined
                } else {
                    DefState::Undefined
                };
            }
        }

        // annotations on the declaration seed the storage state
        if let Some(null) = declared_null {
            if null != NullState::Unknown {
                self.refs.state_mut(id).null = null;
            }
        }
        if let Some(alias) = declared_alias {
            if alias != crate::storage::AliasKind::Unknown {
                self.refs.state_mut(id).alias = alias;
            }
        }

        node.sref = id;
        node.with_text(name)
    }

    /// Fuse two consecutive statements. Code after an escaping statement is unreachable
    /// unless it is a label that can be jumped to.
    pub fn concat(&mut self, first: ExprNode, second: ExprNode) -> ExprNode {
        if first.summary.blocks_fallthrough()
            && !second.enters_jump_target()
            && !matches!(second.kind, ExprKind::Empty | ExprKind::Error)
        {
            self.reporter.report(
                DiagKind::UnreachableCode,
                second.loc,
                "code is unreachable".to_string(),
            );
        }

        let mut node = ExprNode::new(ExprKind::StmtList, CType::Void, first.loc);
        node.lead_label = first.enters_jump_target();
        node.absorb(&first);
        node.absorb(&second);
        node.summary = if second.enters_jump_target() {
            // control re-enters at the label, so the list continues from there
            FlowSummary {
                exit: second.summary.exit,
                can_break: first.summary.can_break || second.summary.can_break,
                must_break: second.summary.must_break,
            }
        } else {
            first.summary.seq(&second.summary)
        };
        node
    }

    pub fn make_return(&mut self, value: Option<ExprNode>, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::Return, CType::Void, loc);
        let expected = self.return_type();

        match value {
            Some(mut e) => {
                self.use_value(&mut e);
                let null_exempt = expected.decay().is_pointer() && e.is_null_literal();
                if !null_exempt && !self.types.match_types(&expected, &e.ty.decay()) {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("return of {} from function returning {}", e.ty, expected),
                    );
                }
                self.check_result_null(&e, loc);
                node.absorb(&e);
                node.sets.insert(RESULT_REF);
            }
            None => {
                if !matches!(expected, CType::Void | CType::Unknown) {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("return without a value in function returning {}", expected),
                    );
                }
            }
        }

        node.summary = FlowSummary::exits(ExitKind::MustReturn);
        node.with_text("return")
    }

    /// A function not annotated as returning null may not return a possibly null value.
    fn check_result_null(&mut self, e: &ExprNode, loc: SourceSpan) {
        let result_may_be_null = self
            .current_fn
            .as_ref()
            .map(|f| f.contract.result_null)
            .unwrap_or(true);
        if result_may_be_null || !self.return_type().is_pointer() {
            return;
        }
        if e.is_null_literal() || self.possibly_null(e.sref) {
            let desc = self.describe(e);
            self.reporter.report(
                DiagKind::NullDeref,
                loc,
                format!("possibly null {} returned as non-null result", desc),
            );
        }
    }

    pub fn make_break(&mut self, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::Break, CType::Void, loc);
        node.summary = FlowSummary::breaks();
        node.with_text("break")
    }

    pub fn make_continue(&mut self, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::Continue, CType::Void, loc);
        // leaves the enclosing list, but does not help the loop terminate
        node.summary = FlowSummary {
            exit: ExitKind::NeverEscape,
            can_break: false,
            must_break: true,
        };
        node.with_text("continue")
    }

    pub fn make_goto(&mut self, label: &str, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::Goto(label.to_string()), CType::Void, loc);
        node.summary = FlowSummary::exits(ExitKind::Goto);
        node.with_text(format!("goto {}", label))
    }

    pub fn make_label(&mut self, name: &str, loc: SourceSpan) -> ExprNode {
        ExprNode::new(ExprKind::Label(name.to_string()), CType::Void, loc)
            .with_text(format!("{}:", name))
    }

    pub fn make_block(&mut self, body: ExprNode, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::Block, CType::Void, loc);
        node.summary = body.summary;
        node.absorb(&body);
        node
    }

    /// Global or file-scope declaration outside any function.
    pub fn declare_file_scope(&mut self, name: &str, ty: CType, is_static: bool) {
        let mut sym = crate::symtab::Symbol::local(name, ty);
        sym.class = if is_static {
            StorageClass::Static
        } else {
            StorageClass::Global
        };
        self.symbols.declare_global(sym);
    }
}
