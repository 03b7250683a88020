/*! Parse C-like sources with fused checking.
 *
 * There is no separate AST pass: the driver walks the pest parse tree depth-first and calls the
 * analyzer's smart constructors bottom-up, so every expression and statement is checked the
 * moment it is parsed. Syntax errors abort a file; everything the checker finds in well-formed
 * code is a diagnostic, collected in the analyzer's reporter.
 */

use pest::Parser;
use pest_derive::Parser;

pub mod annotations;
pub mod driver;

pub use driver::{CheckOutcome, Driver, DriverError};

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct CvetParser;

pub type ParseResult<T> = Result<T, Box<pest::error::Error<Rule>>>;

/// Parse a translation unit without running any checks.
pub fn parse(input: &str) -> ParseResult<pest::iterators::Pairs<'_, Rule>> {
    CvetParser::parse(Rule::translation_unit, input).map_err(Box::new)
}

pub fn check_syntax(input: &str) -> bool {
    parse(input).is_ok()
}
