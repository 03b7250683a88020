/*! Control-flow summaries attached to statement nodes.
 *
 * Each statement carries an `ExitKind` saying how control leaves it, plus break reachability
 * flags used by switch and loop checking. Summaries compose with three combinators: sequencing,
 * branch join, and weakening to conditional execution.
 */

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ExitKind {
    #[default]
    Unknown,
    /// Falls through normally.
    NeverEscape,
    MayExit,
    MustExit,
    MustReturn,
    MustReturnOrExit,
    Goto,
    Error,
}

impl ExitKind {
    /// Control definitely does not continue past this point.
    pub fn must_escape(&self) -> bool {
        matches!(
            self,
            ExitKind::MustExit | ExitKind::MustReturn | ExitKind::MustReturnOrExit | ExitKind::Goto
        )
    }

    pub fn may_escape(&self) -> bool {
        self.must_escape() || matches!(self, ExitKind::MayExit)
    }

    fn seq(self, second: ExitKind) -> ExitKind {
        if self.must_escape() {
            return self;
        }
        match (self, second) {
            (ExitKind::MayExit, ExitKind::MustReturn) => ExitKind::MustReturnOrExit,
            (ExitKind::MayExit, s) if !s.may_escape() => ExitKind::MayExit,
            (_, s) => s,
        }
    }

    fn branch_join(self, other: ExitKind) -> ExitKind {
        if self == other {
            return self;
        }
        if self.must_escape() && other.must_escape() {
            return match (self, other) {
                (ExitKind::MustExit, ExitKind::MustExit) => ExitKind::MustExit,
                (ExitKind::MustReturn, ExitKind::MustReturn) => ExitKind::MustReturn,
                _ => ExitKind::MustReturnOrExit,
            };
        }
        if self.may_escape() || other.may_escape() {
            ExitKind::MayExit
        } else {
            ExitKind::NeverEscape
        }
    }

    /// Weaken a must-escape to a may-escape (execution is conditional).
    pub fn conditional(self) -> ExitKind {
        if self.may_escape() {
            ExitKind::MayExit
        } else {
            self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FlowSummary {
    pub exit: ExitKind,
    pub can_break: bool,
    pub must_break: bool,
}

impl FlowSummary {
    pub fn normal() -> Self {
        FlowSummary {
            exit: ExitKind::NeverEscape,
            ..Default::default()
        }
    }

    pub fn exits(kind: ExitKind) -> Self {
        FlowSummary {
            exit: kind,
            ..Default::default()
        }
    }

    pub fn breaks() -> Self {
        FlowSummary {
            exit: ExitKind::NeverEscape,
            can_break: true,
            must_break: true,
        }
    }

    /// Control cannot reach the statement after this one.
    pub fn blocks_fallthrough(&self) -> bool {
        self.exit.must_escape() || self.must_break
    }

    pub fn seq(&self, second: &FlowSummary) -> FlowSummary {
        if self.blocks_fallthrough() {
            return *self;
        }
        FlowSummary {
            exit: self.exit.seq(second.exit),
            can_break: self.can_break || second.can_break,
            must_break: second.must_break,
        }
    }

    pub fn branch_join(&self, other: &FlowSummary) -> FlowSummary {
        FlowSummary {
            exit: self.exit.branch_join(other.exit),
            can_break: self.can_break || other.can_break,
            must_break: self.must_break && other.must_break,
        }
    }

    pub fn conditional(&self) -> FlowSummary {
        FlowSummary {
            exit: self.exit.conditional(),
            can_break: self.can_break,
            must_break: false,
        }
    }

    /// A loop absorbs break: control continues after the loop either way.
    pub fn loop_body(&self) -> FlowSummary {
        FlowSummary {
            exit: if self.exit == ExitKind::Goto {
                ExitKind::Goto
            } else {
                self.exit.conditional()
            },
            can_break: false,
            must_break: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_stops_at_return() {
        let ret = FlowSummary::exits(ExitKind::MustReturn);
        let after = FlowSummary::normal();
        assert_eq!(ret.seq(&after).exit, ExitKind::MustReturn);
    }

    #[test]
    fn test_branch_join_both_return() {
        let r = FlowSummary::exits(ExitKind::MustReturn);
        assert_eq!(r.branch_join(&r).exit, ExitKind::MustReturn);
        let e = FlowSummary::exits(ExitKind::MustExit);
        assert_eq!(r.branch_join(&e).exit, ExitKind::MustReturnOrExit);
    }

    #[test]
    fn test_branch_join_one_returns() {
        let r = FlowSummary::exits(ExitKind::MustReturn);
        let n = FlowSummary::normal();
        assert_eq!(r.branch_join(&n).exit, ExitKind::MayExit);
    }

    #[test]
    fn test_may_exit_then_return() {
        let may = FlowSummary::exits(ExitKind::MayExit);
        let ret = FlowSummary::exits(ExitKind::MustReturn);
        assert_eq!(may.seq(&ret).exit, ExitKind::MustReturnOrExit);
    }

    #[test]
    fn test_break_blocks_fallthrough() {
        assert!(FlowSummary::breaks().blocks_fallthrough());
        assert!(!FlowSummary::normal().blocks_fallthrough());
    }
}
