//! Field access, dereference, array fetch, and address-of.

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::{ExprKind, ExprNode};
use crate::loc::SourceSpan;
use crate::storage::{NullState, RefKind};
use crate::types::CType;

impl Analyzer {
    /// `base.field` on a struct or union lvalue.
    pub fn make_field(&mut self, base: ExprNode, field: &str, loc: SourceSpan) -> ExprNode {
        let ty = match self.types.field_type(&base.ty, field) {
            Some(t) => t,
            None => {
                // an abstract type's fields are hidden, not absent
                if !base.ty.is_unknown() && !self.types.is_abstract(&base.ty) {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("{} has no field named {}", base.ty, field),
                    );
                }
                CType::Unknown
            }
        };

        let text = format!("{}.{}", self.describe(&base), field);
        let mut node = ExprNode::new(ExprKind::Field(field.to_string()), ty.clone(), loc);
        node.absorb(&base);
        if self.refs.is_meaningful(base.sref) {
            node.sref = self.refs.intern(
                RefKind::Field {
                    base: base.sref,
                    name: field.to_string(),
                },
                ty,
            );
            self.note_pointer_guard(&mut node);
        }
        node.with_text(text)
    }

    /// `base->field`: reads the pointer, so the pointer must be defined and non-null.
    pub fn make_arrow(&mut self, mut base: ExprNode, field: &str, loc: SourceSpan) -> ExprNode {
        self.use_value(&mut base);
        self.check_null_deref(&base, loc);

        let pointee = base.ty.decay().pointee().cloned().unwrap_or(CType::Unknown);
        if !base.ty.decay().is_pointer() && !base.ty.is_unknown() {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!("-> applied to non-pointer type {}", base.ty),
            );
        }

        let ty = match self.types.field_type(&pointee, field) {
            Some(t) => t,
            None => {
                if !pointee.is_unknown() && !self.types.is_abstract(&pointee) {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("{} has no field named {}", pointee, field),
                    );
                }
                CType::Unknown
            }
        };

        let text = format!("{}->{}", self.describe(&base), field);
        let mut node = ExprNode::new(ExprKind::Arrow(field.to_string()), ty.clone(), loc);
        node.absorb(&base);
        if self.refs.is_meaningful(base.sref) {
            let deref = self.refs.intern(RefKind::Deref { base: base.sref }, pointee);
            node.sref = self.refs.intern(
                RefKind::Field {
                    base: deref,
                    name: field.to_string(),
                },
                ty,
            );
            self.note_pointer_guard(&mut node);
        }
        node.with_text(text)
    }

    pub fn make_deref(&mut self, mut base: ExprNode, loc: SourceSpan) -> ExprNode {
        self.use_value(&mut base);
        self.check_null_deref(&base, loc);

        let decayed = base.ty.decay();
        let pointee = match decayed.pointee() {
            Some(t) => t.clone(),
            None => {
                if !base.ty.is_unknown() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("* applied to non-pointer type {}", base.ty),
                    );
                }
                CType::Unknown
            }
        };

        let text = format!("*{}", self.describe(&base));
        let mut node = ExprNode::new(ExprKind::Deref, pointee.clone(), loc);
        node.absorb(&base);
        if self.refs.is_meaningful(base.sref) {
            node.sref = self.refs.intern(RefKind::Deref { base: base.sref }, pointee);
            self.note_pointer_guard(&mut node);
        }
        node.with_text(text)
    }

    /// `&lvalue` does not read the lvalue.
    pub fn make_addr(&mut self, base: ExprNode, loc: SourceSpan) -> ExprNode {
        let text = format!("&{}", self.describe(&base));
        let ty = CType::Pointer(Box::new(base.ty.clone()));
        let mut node = ExprNode::new(ExprKind::Addr, ty.clone(), loc);
        node.absorb(&base);
        if self.refs.is_meaningful(base.sref) {
            node.sref = self.refs.intern(RefKind::Addr { base: base.sref }, ty);
        }
        node.with_text(text)
    }

    pub fn make_index(
        &mut self,
        mut base: ExprNode,
        mut index: ExprNode,
        loc: SourceSpan,
    ) -> ExprNode {
        self.use_value(&mut base);
        self.use_value(&mut index);
        if base.ty.decay().is_pointer() {
            self.check_null_deref(&base, loc);
        } else if !base.ty.is_unknown() {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!("subscript applied to non-array type {}", base.ty),
            );
        }
        if !index.ty.decay().is_integral() && !index.ty.is_unknown() {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!("array subscript has non-integral type {}", index.ty),
            );
        }

        let elem = base.ty.element().cloned().unwrap_or(CType::Unknown);
        let text = format!("{}[{}]", self.describe(&base), self.describe(&index));
        let mut node = ExprNode::new(ExprKind::ArrayFetch, elem.clone(), loc);
        node.absorb(&base);
        node.absorb(&index);
        if self.refs.is_meaningful(base.sref) {
            node.sref = self.refs.intern(
                RefKind::Element {
                    base: base.sref,
                    index: index.value.as_int(),
                },
                elem,
            );
            self.note_pointer_guard(&mut node);
        }
        node.with_text(text)
    }

    /// One complaint per possibly-null pointer, then the pointer is treated as checked.
    pub(crate) fn check_null_deref(&mut self, base: &ExprNode, loc: SourceSpan) {
        if !self.possibly_null(base.sref) && !base.is_null_literal() {
            return;
        }
        let desc = self.describe(base);
        let certain = matches!(self.refs.state(base.sref).null, NullState::DefinitelyNull)
            || base.is_null_literal();
        let message = if certain {
            format!("dereference of null pointer {}", desc)
        } else {
            format!("dereference of possibly null pointer {}", desc)
        };
        self.reporter.report(DiagKind::NullDeref, loc, message);
        self.set_null(base.sref, NullState::NotNull);
    }
}
