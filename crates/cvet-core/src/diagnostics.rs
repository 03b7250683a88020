/*! Diagnostic kinds, the collected diagnostic stream, and suppression.
 *
 * Problems found in checked code are diagnostics, never `CheckError`s. The reporter filters by
 * kind, applies line-region overrides, deduplicates repeats at the same location, and collects
 * everything for the rendering layer.
 */

use crate::loc::SourceSpan;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagKind {
    UseBeforeDefinition,
    UseAfterRelease,
    InconsistentState,
    NullDeref,
    UnwritableTarget,
    TypeMismatch,
    RepExposure,
    AliasViolation,
    GlobalsUndocumented,
    ModifiesUndocumented,
    UnconstrainedCall,
    UnreachableCode,
    MissingCase,
    DuplicateCase,
    CaseFallthrough,
    SuspectedInfiniteLoop,
    EvalOrderUndefined,
    SideEffectArg,
    FormatArgMismatch,
    FormatArgMissing,
    FormatArgExtra,
    FormatCodeUnknown,
    AbstractTypeOp,
    EmptyBody,
}

impl DiagKind {
    pub const ALL: [DiagKind; 24] = [
        DiagKind::UseBeforeDefinition,
        DiagKind::UseAfterRelease,
        DiagKind::InconsistentState,
        DiagKind::NullDeref,
        DiagKind::UnwritableTarget,
        DiagKind::TypeMismatch,
        DiagKind::RepExposure,
        DiagKind::AliasViolation,
        DiagKind::GlobalsUndocumented,
        DiagKind::ModifiesUndocumented,
        DiagKind::UnconstrainedCall,
        DiagKind::UnreachableCode,
        DiagKind::MissingCase,
        DiagKind::DuplicateCase,
        DiagKind::CaseFallthrough,
        DiagKind::SuspectedInfiniteLoop,
        DiagKind::EvalOrderUndefined,
        DiagKind::SideEffectArg,
        DiagKind::FormatArgMismatch,
        DiagKind::FormatArgMissing,
        DiagKind::FormatArgExtra,
        DiagKind::FormatCodeUnknown,
        DiagKind::AbstractTypeOp,
        DiagKind::EmptyBody,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            DiagKind::UseBeforeDefinition => "use-before-definition",
            DiagKind::UseAfterRelease => "use-after-release",
            DiagKind::InconsistentState => "inconsistent-state",
            DiagKind::NullDeref => "null-deref",
            DiagKind::UnwritableTarget => "unwritable-target",
            DiagKind::TypeMismatch => "type-mismatch",
            DiagKind::RepExposure => "rep-exposure",
            DiagKind::AliasViolation => "alias-violation",
            DiagKind::GlobalsUndocumented => "globals-undocumented",
            DiagKind::ModifiesUndocumented => "modifies-undocumented",
            DiagKind::UnconstrainedCall => "unconstrained-call",
            DiagKind::UnreachableCode => "unreachable-code",
            DiagKind::MissingCase => "missing-case",
            DiagKind::DuplicateCase => "duplicate-case",
            DiagKind::CaseFallthrough => "case-fallthrough",
            DiagKind::SuspectedInfiniteLoop => "suspected-infinite-loop",
            DiagKind::EvalOrderUndefined => "eval-order-undefined",
            DiagKind::SideEffectArg => "side-effect-arg",
            DiagKind::FormatArgMismatch => "format-arg-mismatch",
            DiagKind::FormatArgMissing => "format-arg-missing",
            DiagKind::FormatArgExtra => "format-arg-extra",
            DiagKind::FormatCodeUnknown => "format-code-unknown",
            DiagKind::AbstractTypeOp => "abstract-type-op",
            DiagKind::EmptyBody => "empty-body",
        }
    }
}

impl fmt::Display for DiagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for DiagKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagKind::ALL
            .iter()
            .find(|k| k.code() == s)
            .copied()
            .ok_or_else(|| format!("unknown diagnostic kind: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagKind,
    pub span: SourceSpan,
    pub message: String,
}

/// Enables or disables one kind for a line range of one file. Later overrides win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionOverride {
    pub file_id: u32,
    pub from_line: u32,
    pub to_line: u32,
    pub kind: DiagKind,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Reporter {
    diags: Vec<Diagnostic>,
    disabled: HashSet<DiagKind>,
    only: Option<HashSet<DiagKind>>,
    overrides: Vec<RegionOverride>,
    seen: HashSet<(DiagKind, SourceSpan)>,
    suppressed_count: usize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disable(&mut self, kind: DiagKind) {
        self.disabled.insert(kind);
    }

    pub fn enable(&mut self, kind: DiagKind) {
        self.disabled.remove(&kind);
    }

    /// Restrict output to the given kinds only.
    pub fn restrict_to(&mut self, kinds: impl IntoIterator<Item = DiagKind>) {
        self.only = Some(kinds.into_iter().collect());
    }

    pub fn add_override(&mut self, region: RegionOverride) {
        self.overrides.push(region);
    }

    fn enabled_at(&self, kind: DiagKind, span: SourceSpan) -> bool {
        let mut enabled = !self.disabled.contains(&kind)
            && self.only.as_ref().map(|s| s.contains(&kind)).unwrap_or(true);

        for ov in &self.overrides {
            if ov.kind == kind
                && ov.file_id == span.file_id
                && (ov.from_line..=ov.to_line).contains(&span.line)
            {
                enabled = ov.enabled;
            }
        }
        enabled
    }

    pub fn report(&mut self, kind: DiagKind, span: SourceSpan, message: impl Into<String>) {
        if !self.seen.insert((kind, span)) {
            return;
        }
        if !self.enabled_at(kind, span) {
            self.suppressed_count += 1;
            return;
        }
        self.diags.push(Diagnostic {
            kind,
            span,
            message: message.into(),
        });
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diags.is_empty()
    }

    pub fn count(&self) -> usize {
        self.diags.len()
    }

    pub fn suppressed_count(&self) -> usize {
        self.suppressed_count
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diags)
    }
}
