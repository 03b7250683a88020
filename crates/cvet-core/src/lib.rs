/*! Core flow-sensitive analysis engine for C-like sources.
 *
 * Checking happens during parsing: the parser invokes smart constructors that build expression
 * nodes bottom-up, and every constructor runs use/def, null, aliasing, contract and control-flow
 * checks as a side effect. A type error never aborts analysis; the offending node degrades to an
 * unknown type and checking continues.
 */

pub mod algebra;
pub mod alias;
pub mod callcheck;
pub mod context;
pub mod contract;
pub mod diagnostics;
pub mod expr;
pub mod flow;
pub mod format;
pub mod guards;
pub mod loc;
pub mod replay;
pub mod storage;
pub mod symtab;
pub mod types;
pub mod usedef;
pub mod values;

pub use context::{Analyzer, AnalyzerOptions, FunctionSummary};
pub use contract::{ContractTable, FormatKind, FunctionContract, ParamContract, ParamMode};
pub use diagnostics::{DiagKind, Diagnostic, RegionOverride, Reporter};
pub use expr::{ExprKind, ExprNode};
pub use flow::{ExitKind, FlowSummary};
pub use guards::GuardSet;
pub use loc::{SourceFiles, SourceSpan};
pub use storage::{AliasKind, DefState, Exposure, NullState, RefId, RefKind, RefTable};
pub use types::{CType, EnumId, StructId, TypeRegistry};
pub use values::ConstValue;

use thiserror::Error;

/// Internal failures only. User-level problems are diagnostics, never errors.
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Missing child node: {0}")]
    MissingChild(&'static str),
    #[error("Scope imbalance: {0}")]
    ScopeImbalance(String),
    #[error("Unknown contract: {0}")]
    UnknownContract(String),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests;
