/*! Unified interface for the cvet checker.
 *
 * Single import for everything you need: running the fused parse-and-check driver over source
 * files, inspecting per-function summaries, and rendering the diagnostic stream as text or JSON.
 */

pub use cvet_core as core;
pub use cvet_parser as parser;
pub use cvet_report as report;

pub use cvet_core::{
    context::{Analyzer, AnalyzerOptions, FunctionSummary},
    contract::{ContractTable, FunctionContract, ParamContract},
    diagnostics::{DiagKind, Diagnostic, RegionOverride, Reporter},
    flow::ExitKind,
    loc::{SourceFiles, SourceSpan},
    types::CType,
};

pub use cvet_parser::{parse, CheckOutcome, Driver, DriverError};

pub use cvet_report::{OutputFormat, ReportConfig, Renderer};
