/*! Smart constructors for expression and statement nodes.
 *
 * The parser calls these bottom-up; each one builds a node from analyzed children and runs its
 * checks as a side effect. Construction never fails: a type error produces a diagnostic and a
 * node that degrades to an unknown type so analysis continues.
 */

pub mod access;
pub mod assign;
pub mod call;
pub mod control;
pub mod ops;
pub mod stmt;
