//! One line of text per diagnostic, plus the closing tally.

use colored::Colorize;
use cvet_core::context::FunctionSummary;
use cvet_core::diagnostics::Diagnostic;
use cvet_core::flow::ExitKind;
use cvet_core::loc::SourceFiles;
use std::io::Write;

use crate::config::ReportConfig;

pub struct Renderer {
    config: ReportConfig,
}

impl Renderer {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// `path:line:col: message [kind-code]`
    pub fn render_diagnostic(&self, files: &SourceFiles, diag: &Diagnostic) -> String {
        let loc = files.display(diag.span);
        let tag = diag.kind.code();
        if self.config.color {
            format!(
                "{}: {} {}",
                loc.bold(),
                diag.message,
                format!("[{}]", tag).yellow()
            )
        } else {
            format!("{}: {} [{}]", loc, diag.message, tag)
        }
    }

    pub fn render_summary(&self, summary: &FunctionSummary) -> String {
        let exit = exit_label(summary.exit);
        if self.config.color {
            format!("{} {}", summary.name.cyan(), exit)
        } else {
            format!("{} {}", summary.name, exit)
        }
    }

    fn tally(&self, count: usize, suppressed: usize) -> String {
        let mut line = match count {
            0 => String::from("no problems found"),
            1 => String::from("1 problem found"),
            n => format!("{} problems found", n),
        };
        if self.config.show_suppressed && suppressed > 0 {
            line.push_str(&format!(" ({} suppressed)", suppressed));
        }
        line
    }

    pub fn write_report<W: Write>(
        &self,
        writer: &mut W,
        files: &SourceFiles,
        diags: &[Diagnostic],
        suppressed: usize,
    ) -> anyhow::Result<()> {
        for diag in diags {
            writeln!(writer, "{}", self.render_diagnostic(files, diag))?;
        }
        writeln!(writer, "{}", self.tally(diags.len(), suppressed))?;
        Ok(())
    }
}

pub fn exit_label(exit: ExitKind) -> &'static str {
    match exit {
        ExitKind::Unknown => "unknown",
        ExitKind::NeverEscape => "falls through",
        ExitKind::MayExit => "may exit",
        ExitKind::MustExit => "must exit",
        ExitKind::MustReturn => "must return",
        ExitKind::MustReturnOrExit => "must return or exit",
        ExitKind::Goto => "leaves by goto",
        ExitKind::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use cvet_core::diagnostics::DiagKind;
    use cvet_core::loc::SourceSpan;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn plain() -> Renderer {
        Renderer::new(ReportConfig {
            color: false,
            format: OutputFormat::Text,
            show_suppressed: false,
        })
    }

    fn one_file() -> SourceFiles {
        let mut files = SourceFiles::new();
        files.add_file(PathBuf::from("queue.c"));
        files
    }

    #[test]
    fn test_diagnostic_line_shape() {
        let files = one_file();
        let diag = Diagnostic {
            kind: DiagKind::NullDeref,
            span: SourceSpan::new(0, 12, 5),
            message: "dereference of possibly null pointer p".to_string(),
        };
        assert_eq!(
            plain().render_diagnostic(&files, &diag),
            "queue.c:12:5: dereference of possibly null pointer p [null-deref]"
        );
    }

    #[test]
    fn test_report_tally() {
        let files = one_file();
        let diags = vec![
            Diagnostic {
                kind: DiagKind::UseBeforeDefinition,
                span: SourceSpan::new(0, 3, 9),
                message: "x used before definition".to_string(),
            },
            Diagnostic {
                kind: DiagKind::UnreachableCode,
                span: SourceSpan::new(0, 8, 5),
                message: "unreachable code".to_string(),
            },
        ];
        let mut out = Vec::new();
        plain().write_report(&mut out, &files, &diags, 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "queue.c:3:9: x used before definition [use-before-definition]\n\
             queue.c:8:5: unreachable code [unreachable-code]\n\
             2 problems found\n"
        );
    }

    #[test]
    fn test_clean_report() {
        let files = one_file();
        let mut out = Vec::new();
        plain().write_report(&mut out, &files, &[], 0).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "no problems found\n");
    }

    #[test]
    fn test_suppressed_shown_on_request() {
        let renderer = Renderer::new(ReportConfig {
            color: false,
            format: OutputFormat::Text,
            show_suppressed: true,
        });
        let files = one_file();
        let mut out = Vec::new();
        renderer.write_report(&mut out, &files, &[], 3).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "no problems found (3 suppressed)\n"
        );
    }

    #[test]
    fn test_summary_line() {
        let summary = FunctionSummary {
            name: "drain".to_string(),
            exit: ExitKind::MustReturn,
            storage: vec![],
        };
        assert_eq!(plain().render_summary(&summary), "drain must return");
    }
}
