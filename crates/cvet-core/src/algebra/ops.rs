//! Literals, identifiers, and operator expressions.

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::{ExprKind, ExprNode};
use crate::loc::SourceSpan;
use crate::storage::{BufInfo, NullState, CONST_REF};
use crate::types::CType;
use crate::values::ConstValue;

impl Analyzer {
    pub fn make_int_lit(&mut self, value: i64, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::IntLit, CType::Int, loc);
        node.value = ConstValue::Int(value);
        node.sref = CONST_REF;
        node.with_text(value.to_string())
    }

    pub fn make_char_lit(&mut self, value: char, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::CharLit, CType::Char, loc);
        node.value = ConstValue::Char(value);
        node.sref = CONST_REF;
        node.with_text(format!("'{}'", value))
    }

    pub fn make_float_lit(&mut self, value: f64, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::FloatLit, CType::Double, loc);
        node.value = ConstValue::Double(value);
        node.sref = CONST_REF;
        node.with_text(value.to_string())
    }

    pub fn make_string_lit(&mut self, value: &str, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(
            ExprKind::StringLit,
            CType::Array(Box::new(CType::Char), Some(value.len() + 1)),
            loc,
        );
        node.value = ConstValue::Str(value.to_string());
        node.sref = CONST_REF;
        node.with_text(format!("\"{}\"", value))
    }

    pub fn make_identifier(&mut self, name: &str, loc: SourceSpan) -> ExprNode {
        if let Some(symbol) = self.symbols.lookup(name).cloned() {
            let mut node = ExprNode::new(
                ExprKind::Identifier(name.to_string()),
                symbol.ty.clone(),
                loc,
            );
            if let Some(id) = self.ref_for_symbol(name) {
                node.sref = id;
                self.note_pointer_guard(&mut node);
            }
            if symbol.is_global() {
                self.check_global_documented(name, loc);
            }
            return node.with_text(name);
        }

        // enum members are identifiers with a known constant value
        if let Some(eid) = self.types.enum_of_member(name) {
            let position = self.types.enums[&eid]
                .members
                .iter()
                .position(|m| m == name)
                .unwrap_or(0);
            let mut node =
                ExprNode::new(ExprKind::Identifier(name.to_string()), CType::Enum(eid), loc);
            node.value = ConstValue::Int(position as i64);
            node.sref = CONST_REF;
            return node.with_text(name);
        }

        self.reporter.report(
            DiagKind::TypeMismatch,
            loc,
            format!("unrecognized identifier {}", name),
        );
        ExprNode::new(ExprKind::Identifier(name.to_string()), CType::Unknown, loc).with_text(name)
    }

    /// A pointer-valued lvalue used as a condition guards itself non-null on the true side.
    pub(crate) fn note_pointer_guard(&self, node: &mut ExprNode) {
        if node.ty.decay().is_pointer() && self.refs.is_meaningful(node.sref) {
            node.guards.add_true(node.sref);
        }
    }

    fn check_global_documented(&mut self, name: &str, loc: SourceSpan) {
        let undocumented = match self.own_globals() {
            None => false,
            Some(own) => !own.iter().any(|g| g == name),
        };
        if undocumented {
            self.reporter.report(
                DiagKind::GlobalsUndocumented,
                loc,
                format!("global {} used but not listed in globals clause", name),
            );
        }
    }

    pub fn make_unary(&mut self, op: &str, mut child: ExprNode, loc: SourceSpan) -> ExprNode {
        match op {
            "*" => return self.make_deref(child, loc),
            "&" => return self.make_addr(child, loc),
            _ => {}
        }

        self.use_value(&mut child);
        let text = format!("{}{}", op, self.describe(&child));
        let mut node = ExprNode::new(ExprKind::Unary(op.to_string()), CType::Unknown, loc);
        node.absorb(&child);

        match op {
            "!" => {
                node.ty = CType::Int;
                node.guards = child.guards.invert();
                node.value = ConstValue::apply_unary("!", &child.value);
            }
            "-" | "+" | "~" => {
                self.check_abstract_operand(op, &child, loc);
                if !child.ty.is_arithmetic() && !child.ty.is_unknown() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("operand of {} has non-arithmetic type {}", op, child.ty),
                    );
                }
                node.ty = child.ty.promote();
                node.value = ConstValue::apply_unary(op, &child.value);
            }
            "++" | "--" => {
                let target = child.sref;
                self.check_set(&mut node, target, loc);
                self.invalidate_guards(target);
                node.ty = child.ty.clone();
            }
            _ => {}
        }

        node.with_text(text)
    }

    /// Postfix increment/decrement: value is the old one, effect is the same write.
    pub fn make_postfix(&mut self, op: &str, mut child: ExprNode, loc: SourceSpan) -> ExprNode {
        self.use_value(&mut child);
        let text = format!("{}{}", self.describe(&child), op);
        let mut node = ExprNode::new(ExprKind::Postfix(op.to_string()), child.ty.clone(), loc);
        node.absorb(&child);
        let target = child.sref;
        self.check_set(&mut node, target, loc);
        self.invalidate_guards(target);
        node.with_text(text)
    }

    pub fn make_binary(
        &mut self,
        op: &str,
        mut lhs: ExprNode,
        mut rhs: ExprNode,
        loc: SourceSpan,
    ) -> ExprNode {
        self.use_value(&mut lhs);
        self.use_value(&mut rhs);

        let text = format!("{} {} {}", self.describe(&lhs), op, self.describe(&rhs));
        let mut node = ExprNode::new(ExprKind::Binary(op.to_string()), CType::Unknown, loc);

        let logical = matches!(op, "&&" | "||");
        if !logical && (lhs.interferes_with(&rhs) || rhs.interferes_with(&lhs)) {
            self.reporter.report(
                DiagKind::EvalOrderUndefined,
                loc,
                format!("evaluation order of operands of {} is undefined", text),
            );
        }

        node.absorb(&lhs);
        node.absorb(&rhs);

        match op {
            "&&" => {
                node.ty = CType::Int;
                node.guards = lhs.guards.and(&rhs.guards);
            }
            "||" => {
                node.ty = CType::Int;
                node.guards = lhs.guards.or(&rhs.guards);
            }
            "<" | ">" | "<=" | ">=" | "==" | "!=" => {
                self.check_comparison_types(op, &lhs, &rhs, loc);
                node.ty = CType::Int;
                self.note_null_test(op, &lhs, &rhs, &mut node);
            }
            "+" | "-" => {
                self.check_abstract_operand(op, &lhs, loc);
                self.check_abstract_operand(op, &rhs, loc);
                node.ty = self.pointer_or_arith_type(op, &lhs, &rhs, loc);
            }
            "*" | "/" | "%" => {
                self.check_abstract_operand(op, &lhs, loc);
                self.check_abstract_operand(op, &rhs, loc);
                self.require_arithmetic(op, &lhs, loc);
                self.require_arithmetic(op, &rhs, loc);
                node.ty = lhs.ty.usual_arith(&rhs.ty);
            }
            "<<" | ">>" | "&" | "|" | "^" => {
                self.require_integral(op, &lhs, loc);
                self.require_integral(op, &rhs, loc);
                node.ty = lhs.ty.usual_arith(&rhs.ty);
            }
            _ => {}
        }

        node.value = ConstValue::apply_binary(op, &lhs.value, &rhs.value);
        node.with_text(text)
    }

    /// Comparisons against a null constant produce guard facts.
    fn note_null_test(&self, op: &str, lhs: &ExprNode, rhs: &ExprNode, node: &mut ExprNode) {
        let ptr = if rhs.is_null_literal() {
            lhs
        } else if lhs.is_null_literal() {
            rhs
        } else {
            return;
        };
        if !self.refs.is_meaningful(ptr.sref) || !ptr.ty.decay().is_pointer() {
            return;
        }
        match op {
            "==" => node.guards.add_false(ptr.sref),
            "!=" => node.guards.add_true(ptr.sref),
            _ => {}
        }
    }

    fn check_comparison_types(&mut self, op: &str, lhs: &ExprNode, rhs: &ExprNode, loc: SourceSpan) {
        let a = lhs.ty.decay();
        let b = rhs.ty.decay();

        match (&a, &b) {
            (CType::Enum(x), CType::Enum(y)) if x != y => {
                self.reporter.report(
                    DiagKind::TypeMismatch,
                    loc,
                    format!("comparison {} mixes members of different enum types", op),
                );
            }
            (CType::Enum(_), t) | (t, CType::Enum(_))
                if t.is_arithmetic() && !matches!(t, CType::Enum(_)) =>
            {
                // a literal member position is fine; anything else loses the enum abstraction
                if !lhs.value.is_known() && !rhs.value.is_known() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("comparison {} mixes enum and arithmetic operands", op),
                    );
                }
            }
            (CType::Bool, t) | (t, CType::Bool)
                if t.is_arithmetic() && !matches!(t, CType::Bool) =>
            {
                if !lhs.value.is_known() && !rhs.value.is_known() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("comparison {} mixes boolean and arithmetic operands", op),
                    );
                }
            }
            (p, q) if p.is_pointer() && q.is_arithmetic() => {
                if !rhs.is_null_literal() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        "comparison of pointer and integer".to_string(),
                    );
                }
            }
            (p, q) if q.is_pointer() && p.is_arithmetic() => {
                if !lhs.is_null_literal() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        "comparison of pointer and integer".to_string(),
                    );
                }
            }
            _ => {}
        }
    }

    /// Pointer plus integer keeps the pointer type; anything else goes through the usual
    /// arithmetic conversions.
    fn pointer_or_arith_type(
        &mut self,
        op: &str,
        lhs: &ExprNode,
        rhs: &ExprNode,
        loc: SourceSpan,
    ) -> CType {
        let a = lhs.ty.decay();
        let b = rhs.ty.decay();
        match (a.is_pointer(), b.is_pointer()) {
            (true, false) => {
                if !b.is_integral() && !b.is_unknown() {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        format!("pointer {} requires an integral offset", op),
                    );
                }
                a
            }
            (false, true) => {
                if op == "-" {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        "integer minus pointer is not defined".to_string(),
                    );
                }
                b
            }
            (true, true) => {
                if op == "-" {
                    CType::Long
                } else {
                    self.reporter.report(
                        DiagKind::TypeMismatch,
                        loc,
                        "pointers may not be added".to_string(),
                    );
                    CType::Unknown
                }
            }
            (false, false) => lhs.ty.usual_arith(&rhs.ty),
        }
    }

    fn check_abstract_operand(&mut self, op: &str, node: &ExprNode, loc: SourceSpan) {
        if self.options.warn_abstract_ops && self.types.is_abstract(&node.ty) {
            let desc = self.describe(node);
            self.reporter.report(
                DiagKind::AbstractTypeOp,
                loc,
                format!("operator {} applied to abstract type operand {}", op, desc),
            );
        }
    }

    fn require_arithmetic(&mut self, op: &str, node: &ExprNode, loc: SourceSpan) {
        if !node.ty.decay().is_arithmetic() && !node.ty.is_unknown() {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!("operand of {} has non-arithmetic type {}", op, node.ty),
            );
        }
    }

    fn require_integral(&mut self, op: &str, node: &ExprNode, loc: SourceSpan) {
        if !node.ty.decay().is_integral() && !node.ty.is_unknown() {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!("operand of {} has non-integral type {}", op, node.ty),
            );
        }
    }

    pub fn make_cast(&mut self, target: CType, mut child: ExprNode, loc: SourceSpan) -> ExprNode {
        self.use_value(&mut child);
        let text = format!("({}){}", target, self.describe(&child));
        let mut node = ExprNode::new(ExprKind::Cast, target, loc);
        node.absorb(&child);
        node.sref = child.sref;
        node.value = child.value.clone();
        node.with_text(text)
    }

    /// sizeof does not evaluate its operand.
    pub fn make_sizeof_type(&mut self, ty: &CType, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::SizeofType, CType::ULong, loc);
        node.value = ConstValue::Int(ty.size_bytes() as i64);
        node.sref = CONST_REF;
        node.with_text(format!("sizeof({})", ty))
    }

    pub fn make_sizeof_expr(&mut self, child: ExprNode, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(ExprKind::SizeofExpr, CType::ULong, loc);
        node.value = ConstValue::Int(child.ty.size_bytes() as i64);
        node.sref = CONST_REF;
        let desc = self.describe(&child);
        node.with_text(format!("sizeof({})", desc))
    }

    /// Comma is a sequence point; the value is the right operand's.
    pub fn make_comma(&mut self, mut lhs: ExprNode, mut rhs: ExprNode, loc: SourceSpan) -> ExprNode {
        self.use_value(&mut lhs);
        self.use_value(&mut rhs);
        let text = format!("{}, {}", self.describe(&lhs), self.describe(&rhs));
        let mut node = ExprNode::new(ExprKind::Comma, rhs.ty.clone(), loc);
        node.absorb(&lhs);
        node.absorb(&rhs);
        node.sref = rhs.sref;
        node.value = rhs.value.clone();
        node.summary = lhs.summary.seq(&rhs.summary);
        node.with_text(text)
    }

    /// Mark a string-literal-backed pointer with its buffer extent, for initializers.
    pub(crate) fn string_buf_info(value: &str) -> BufInfo {
        BufInfo {
            size: Some(value.len() as i64 + 1),
            len: Some(value.len() as i64),
            null_terminated: true,
        }
    }

    /// A freshly seen null literal in pointer context.
    pub(crate) fn null_state_of(node: &ExprNode) -> Option<NullState> {
        node.is_null_literal().then_some(NullState::DefinitelyNull)
    }
}
