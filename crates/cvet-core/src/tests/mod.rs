//! Engine-level tests driving the smart constructors directly, the way the parser does.

mod control_flow;
mod exposure;
mod formats;
mod nullcheck;
mod switches;

use crate::context::{Analyzer, AnalyzerOptions};
use crate::contract::FunctionContract;
use crate::loc::SourceSpan;
use crate::symtab::{ScopeToken, Symbol};
use crate::types::CType;

pub(crate) fn analyzer() -> Analyzer {
    Analyzer::new(AnalyzerOptions::default())
}

pub(crate) fn span(line: u32) -> SourceSpan {
    SourceSpan::new(0, line, 1)
}

/// Enter a void function with no parameters and an unconstrained modifies clause.
pub(crate) fn open_fn(az: &mut Analyzer, name: &str) -> ScopeToken {
    let contract = FunctionContract::new(name, CType::Void).unconstrained_modifies();
    az.begin_function(&contract, span(1))
}

pub(crate) fn declare_local(az: &mut Analyzer, name: &str, ty: CType) {
    az.symbols.declare(Symbol::local(name, ty));
}

pub(crate) fn int_ptr() -> CType {
    CType::Pointer(Box::new(CType::Int))
}
