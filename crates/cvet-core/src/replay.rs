/*! Re-evaluation of recorded expression structure.
 *
 * Macro bodies are checked as if expanded at the point of use: the structure of the body is
 * recorded once as a `ReplayRecord`, then replayed through the same smart constructors at every
 * use site, with the states current there. Replaying is pure with respect to the record itself,
 * so replaying twice yields the same node shape.
 */

use crate::context::Analyzer;
use crate::expr::ExprNode;
use crate::loc::SourceSpan;
use crate::types::CType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ReplayRecord {
    Int(i64),
    Char(char),
    Float(f64),
    Str(String),
    Ident(String),
    Unary {
        op: String,
        operand: Box<ReplayRecord>,
    },
    Postfix {
        op: String,
        operand: Box<ReplayRecord>,
    },
    Binary {
        op: String,
        lhs: Box<ReplayRecord>,
        rhs: Box<ReplayRecord>,
    },
    Assign {
        op: String,
        lhs: Box<ReplayRecord>,
        rhs: Box<ReplayRecord>,
    },
    Field {
        base: Box<ReplayRecord>,
        name: String,
    },
    Arrow {
        base: Box<ReplayRecord>,
        name: String,
    },
    Index {
        base: Box<ReplayRecord>,
        index: Box<ReplayRecord>,
    },
    Cast {
        ty: CType,
        operand: Box<ReplayRecord>,
    },
    Comma {
        lhs: Box<ReplayRecord>,
        rhs: Box<ReplayRecord>,
    },
    Call {
        name: String,
        args: Vec<ReplayRecord>,
    },
}

impl ReplayRecord {
    /// Rebuild the node at `loc`, running every check against the current states.
    pub fn replay(&self, az: &mut Analyzer, loc: SourceSpan) -> ExprNode {
        match self {
            ReplayRecord::Int(v) => az.make_int_lit(*v, loc),
            ReplayRecord::Char(c) => az.make_char_lit(*c, loc),
            ReplayRecord::Float(v) => az.make_float_lit(*v, loc),
            ReplayRecord::Str(s) => az.make_string_lit(s, loc),
            ReplayRecord::Ident(name) => az.make_identifier(name, loc),
            ReplayRecord::Unary { op, operand } => {
                let child = operand.replay(az, loc);
                az.make_unary(op, child, loc)
            }
            ReplayRecord::Postfix { op, operand } => {
                let child = operand.replay(az, loc);
                az.make_postfix(op, child, loc)
            }
            ReplayRecord::Binary { op, lhs, rhs } => {
                let l = lhs.replay(az, loc);
                let r = rhs.replay(az, loc);
                az.make_binary(op, l, r, loc)
            }
            ReplayRecord::Assign { op, lhs, rhs } => {
                let l = lhs.replay(az, loc);
                let r = rhs.replay(az, loc);
                az.make_assign(op, l, r, loc)
            }
            ReplayRecord::Field { base, name } => {
                let b = base.replay(az, loc);
                az.make_field(b, name, loc)
            }
            ReplayRecord::Arrow { base, name } => {
                let b = base.replay(az, loc);
                az.make_arrow(b, name, loc)
            }
            ReplayRecord::Index { base, index } => {
                let b = base.replay(az, loc);
                let i = index.replay(az, loc);
                az.make_index(b, i, loc)
            }
            ReplayRecord::Cast { ty, operand } => {
                let child = operand.replay(az, loc);
                az.make_cast(ty.clone(), child, loc)
            }
            ReplayRecord::Comma { lhs, rhs } => {
                let l = lhs.replay(az, loc);
                let r = rhs.replay(az, loc);
                az.make_comma(l, r, loc)
            }
            ReplayRecord::Call { name, args } => {
                let replayed = args.iter().map(|a| a.replay(az, loc)).collect();
                az.make_call(name, replayed, loc)
            }
        }
    }
}
