/*! Render cvet diagnostics for people and for tools.
 *
 * The checker produces a flat diagnostic stream; everything about how it looks lives here. Text
 * output is one line per diagnostic with a location and a kind tag, JSON output carries the same
 * stream plus per-function summaries for downstream tooling.
 */

pub mod config;
pub mod output;
pub mod render;

pub use config::{OutputFormat, ReportConfig};
pub use render::Renderer;
