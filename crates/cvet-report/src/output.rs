//! Machine-readable output.

use anyhow::Result;
use cvet_core::context::FunctionSummary;
use cvet_core::diagnostics::Diagnostic;
use serde_json::json;
use std::io::Write;

pub fn write_diagnostics<W: Write>(writer: &mut W, diags: &[Diagnostic]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, diags)?;
    writeln!(writer)?;
    Ok(())
}

pub fn write_summaries<W: Write>(writer: &mut W, summaries: &[FunctionSummary]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, summaries)?;
    writeln!(writer)?;
    Ok(())
}

/// The whole run as one object, suppressed count included.
pub fn write_report<W: Write>(
    writer: &mut W,
    diags: &[Diagnostic],
    summaries: &[FunctionSummary],
    suppressed: usize,
) -> Result<()> {
    let report = json!({
        "diagnostics": diags,
        "summaries": summaries,
        "suppressed": suppressed,
    });
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvet_core::diagnostics::DiagKind;
    use cvet_core::flow::ExitKind;
    use cvet_core::loc::SourceSpan;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostics_round_trip() {
        let diags = vec![Diagnostic {
            kind: DiagKind::CaseFallthrough,
            span: SourceSpan::new(0, 21, 5),
            message: "fall through into case".to_string(),
        }];
        let mut out = Vec::new();
        write_diagnostics(&mut out, &diags).unwrap();
        let parsed: Vec<Diagnostic> = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, diags);
    }

    #[test]
    fn test_report_object_shape() {
        let summaries = vec![FunctionSummary {
            name: "init".to_string(),
            exit: ExitKind::NeverEscape,
            storage: vec![],
        }];
        let mut out = Vec::new();
        write_report(&mut out, &[], &summaries, 2).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["suppressed"], 2);
        assert_eq!(value["diagnostics"].as_array().map(Vec::len), Some(0));
        assert_eq!(value["summaries"][0]["name"], "init");
    }

    #[test]
    fn test_kind_serializes_as_code() {
        let diags = vec![Diagnostic {
            kind: DiagKind::UseBeforeDefinition,
            span: SourceSpan::new(0, 1, 1),
            message: "x used before definition".to_string(),
        }];
        let mut out = Vec::new();
        write_diagnostics(&mut out, &diags).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["kind"], "use-before-definition");
    }
}
