/*! Expression and statement nodes.
 *
 * Nodes are built bottom-up by the smart constructors in `algebra`; by the time a node exists its
 * checks have already run. Statements are expression nodes too, distinguished only by kind, so
 * sequencing and branch logic work uniformly.
 */

use crate::flow::FlowSummary;
use crate::guards::GuardSet;
use crate::loc::SourceSpan;
use crate::storage::{RefId, UNKNOWN_REF};
use crate::types::CType;
use crate::values::ConstValue;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    IntLit,
    CharLit,
    FloatLit,
    StringLit,
    Identifier(String),
    Unary(String),
    Postfix(String),
    Binary(String),
    Assign(String),
    Field(String),
    Arrow(String),
    ArrayFetch,
    Deref,
    Addr,
    Call(String),
    Cast,
    SizeofType,
    SizeofExpr,
    Conditional,
    Comma,
    InitList,
    Decl(String),
    ExprStmt,
    StmtList,
    Block,
    If,
    IfElse,
    While,
    DoWhile,
    For,
    Switch,
    Case,
    Default,
    Label(String),
    Break,
    Continue,
    Return,
    Goto(String),
    Empty,
    Error,
}

impl ExprKind {
    /// Case labels and targets of goto may legitimately follow escaping control flow.
    pub fn is_jump_target(&self) -> bool {
        matches!(self, ExprKind::Case | ExprKind::Default | ExprKind::Label(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprNode {
    pub kind: ExprKind,
    pub ty: CType,
    pub sref: RefId,
    pub value: ConstValue,
    pub uses: IndexSet<RefId>,
    pub sets: IndexSet<RefId>,
    pub msets: IndexSet<RefId>,
    pub guards: GuardSet,
    pub summary: FlowSummary,
    pub loc: SourceSpan,
    pub text: String,
    /// For a statement list, whether its first statement is a jump target.
    pub lead_label: bool,
}

impl ExprNode {
    pub fn new(kind: ExprKind, ty: CType, loc: SourceSpan) -> Self {
        ExprNode {
            kind,
            ty,
            sref: UNKNOWN_REF,
            value: ConstValue::Unknown,
            uses: IndexSet::new(),
            sets: IndexSet::new(),
            msets: IndexSet::new(),
            guards: GuardSet::new(),
            summary: FlowSummary::normal(),
            loc,
            text: String::new(),
            lead_label: false,
        }
    }

    pub fn error(loc: SourceSpan) -> Self {
        ExprNode::new(ExprKind::Error, CType::Unknown, loc)
    }

    pub fn empty(loc: SourceSpan) -> Self {
        ExprNode::new(ExprKind::Empty, CType::Void, loc)
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn is_error(&self) -> bool {
        matches!(self.kind, ExprKind::Error)
    }

    /// Control entering this node lands on a case, default, or label first.
    pub fn enters_jump_target(&self) -> bool {
        self.lead_label || self.kind.is_jump_target()
    }

    /// Union the child's use/def information into this node.
    pub fn absorb(&mut self, child: &ExprNode) {
        for id in &child.uses {
            self.uses.insert(*id);
        }
        for id in &child.sets {
            self.sets.insert(*id);
        }
        for id in &child.msets {
            self.msets.insert(*id);
        }
    }

    pub fn has_side_effects(&self) -> bool {
        !self.sets.is_empty() || !self.msets.is_empty()
    }

    /// A literal zero in pointer context is the null pointer constant.
    pub fn is_null_literal(&self) -> bool {
        matches!(self.kind, ExprKind::IntLit | ExprKind::Cast) && self.value.is_zero()
    }

    /// Defs of one operand overlapping uses or defs of the other, for the
    /// unsequenced-evaluation check.
    pub fn interferes_with(&self, other: &ExprNode) -> bool {
        let writes = self.sets.iter().chain(self.msets.iter());
        for w in writes {
            if other.uses.contains(w) || other.sets.contains(w) || other.msets.contains(w) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb_unions() {
        let mut parent = ExprNode::new(ExprKind::Binary("+".into()), CType::Int, SourceSpan::default());
        let mut child = ExprNode::new(ExprKind::IntLit, CType::Int, SourceSpan::default());
        child.uses.insert(RefId(7));
        child.sets.insert(RefId(8));
        parent.absorb(&child);
        assert!(parent.uses.contains(&RefId(7)));
        assert!(parent.sets.contains(&RefId(8)));
    }

    #[test]
    fn test_interference() {
        let mut a = ExprNode::new(ExprKind::Postfix("++".into()), CType::Int, SourceSpan::default());
        a.sets.insert(RefId(5));
        let mut b = ExprNode::new(ExprKind::Identifier("x".into()), CType::Int, SourceSpan::default());
        b.uses.insert(RefId(5));
        assert!(a.interferes_with(&b));
        assert!(!b.interferes_with(&a));
    }

    #[test]
    fn test_null_literal() {
        let mut zero = ExprNode::new(ExprKind::IntLit, CType::Int, SourceSpan::default());
        zero.value = ConstValue::Int(0);
        assert!(zero.is_null_literal());
        zero.value = ConstValue::Int(1);
        assert!(!zero.is_null_literal());
    }
}
