//! Branching and looping constructs.
//!
//! Because parsing and checking are fused, the parser opens a token before analyzing each branch
//! arm or loop body and hands it back here, where the arm states are merged and the construct's
//! flow summary is computed.

use crate::context::{Analyzer, BranchToken, CaseLabel, LoopToken, SwitchToken};
use crate::diagnostics::DiagKind;
use crate::expr::{ExprKind, ExprNode};
use crate::flow::{ExitKind, FlowSummary};
use crate::loc::SourceSpan;
use crate::storage::{RefId, RESULT_REF};
use crate::types::CType;
use crate::Result;

impl Analyzer {
    /// Finalize a condition expression: its value is read here.
    pub fn make_condition(&mut self, mut cond: ExprNode) -> ExprNode {
        self.use_value(&mut cond);
        cond
    }

    /// `if` without `else`. The token comes from `begin_then`.
    pub fn make_if(
        &mut self,
        cond: ExprNode,
        then_stmt: ExprNode,
        token: BranchToken,
        loc: SourceSpan,
    ) -> Result<ExprNode> {
        self.check_empty_body(&then_stmt, "if", loc);

        let then_escapes = then_stmt.summary.blocks_fallthrough();
        self.merge_branch(token, false, then_escapes)?;
        if then_escapes {
            // `if (p == NULL) return;` leaves p non-null on the surviving path
            self.apply_surviving_guards(&cond.guards.false_guards.clone());
        }

        let mut node = ExprNode::new(ExprKind::If, CType::Void, loc);
        node.summary = cond
            .summary
            .seq(&then_stmt.summary.branch_join(&FlowSummary::normal()));
        node.absorb(&cond);
        node.absorb(&then_stmt);
        Ok(node)
    }

    /// `if`/`else`. The parser called `begin_else` between the arms.
    pub fn make_if_else(
        &mut self,
        cond: ExprNode,
        then_stmt: ExprNode,
        else_stmt: ExprNode,
        token: BranchToken,
        loc: SourceSpan,
    ) -> Result<ExprNode> {
        let then_escapes = then_stmt.summary.blocks_fallthrough();
        let else_escapes = else_stmt.summary.blocks_fallthrough();
        self.merge_branch(token, then_escapes, else_escapes)?;

        if then_escapes && !else_escapes {
            self.apply_surviving_guards(&cond.guards.false_guards.clone());
        } else if else_escapes && !then_escapes {
            self.apply_surviving_guards(&cond.guards.true_guards.clone());
        }

        let mut node = ExprNode::new(ExprKind::IfElse, CType::Void, loc);
        let joined = match self.known_truth(&cond) {
            Some(true) => then_stmt.summary,
            Some(false) => else_stmt.summary,
            None => then_stmt.summary.branch_join(&else_stmt.summary),
        };
        node.summary = cond.summary.seq(&joined);
        node.absorb(&cond);
        node.absorb(&then_stmt);
        node.absorb(&else_stmt);
        Ok(node)
    }

    /// `cond ? then : else` as a value.
    pub fn make_conditional(
        &mut self,
        cond: ExprNode,
        mut then_expr: ExprNode,
        mut else_expr: ExprNode,
        token: BranchToken,
        loc: SourceSpan,
    ) -> Result<ExprNode> {
        self.use_value(&mut then_expr);
        self.use_value(&mut else_expr);
        let then_escapes = then_expr.summary.exit.must_escape();
        let else_escapes = else_expr.summary.exit.must_escape();
        self.merge_branch(token, then_escapes, else_escapes)?;

        let ty = self.conditional_type(&then_expr, &else_expr);
        let text = format!(
            "{} ? {} : {}",
            self.describe(&cond),
            self.describe(&then_expr),
            self.describe(&else_expr)
        );
        let mut node = ExprNode::new(ExprKind::Conditional, ty, loc);
        node.value = match self.known_truth(&cond) {
            Some(true) => then_expr.value.clone(),
            Some(false) => else_expr.value.clone(),
            None => crate::values::ConstValue::Unknown,
        };
        node.summary = cond
            .summary
            .seq(&then_expr.summary.branch_join(&else_expr.summary));
        node.absorb(&cond);
        node.absorb(&then_expr);
        node.absorb(&else_expr);
        Ok(node.with_text(text))
    }

    fn conditional_type(&self, a: &ExprNode, b: &ExprNode) -> CType {
        let ta = a.ty.decay();
        let tb = b.ty.decay();
        if ta == tb {
            return ta;
        }
        if ta.is_pointer() && b.is_null_literal() {
            return ta;
        }
        if tb.is_pointer() && a.is_null_literal() {
            return tb;
        }
        if ta.is_arithmetic() && tb.is_arithmetic() {
            return ta.usual_arith(&tb);
        }
        CType::Unknown
    }

    /// `while`. The token comes from `begin_loop`.
    pub fn make_while(
        &mut self,
        cond: ExprNode,
        body: ExprNode,
        token: LoopToken,
        loc: SourceSpan,
    ) -> Result<ExprNode> {
        self.merge_loop(token, false)?;
        self.check_empty_body(&body, "while", loc);
        self.check_infinite_loop(&cond, &body, None, loc);

        let mut node = ExprNode::new(ExprKind::While, CType::Void, loc);
        node.summary = self.loop_summary(&cond, &body);
        node.absorb(&cond);
        node.absorb(&body);
        Ok(node)
    }

    /// `do { body } while (cond)`: the body runs at least once.
    pub fn make_do_while(
        &mut self,
        body: ExprNode,
        cond: ExprNode,
        token: LoopToken,
        loc: SourceSpan,
    ) -> Result<ExprNode> {
        self.merge_loop(token, true)?;
        self.check_infinite_loop(&cond, &body, None, loc);

        let mut node = ExprNode::new(ExprKind::DoWhile, CType::Void, loc);
        node.summary = self.loop_summary(&cond, &body);
        node.absorb(&body);
        node.absorb(&cond);
        Ok(node)
    }

    /// `for`. Init was analyzed before `begin_loop`; the increment inside the loop frame.
    pub fn make_for(
        &mut self,
        init: Option<ExprNode>,
        cond: Option<ExprNode>,
        inc: Option<ExprNode>,
        body: ExprNode,
        token: LoopToken,
        loc: SourceSpan,
    ) -> Result<ExprNode> {
        self.merge_loop(token, false)?;
        self.check_empty_body(&body, "for", loc);
        if let Some(c) = &cond {
            self.check_infinite_loop(c, &body, inc.as_ref(), loc);
        }

        let mut node = ExprNode::new(ExprKind::For, CType::Void, loc);
        let cond_node = cond.unwrap_or_else(|| {
            // no condition reads as constant true
            let mut t = ExprNode::empty(loc);
            t.value = crate::values::ConstValue::Int(1);
            t
        });
        node.summary = self.loop_summary(&cond_node, &body);
        if let Some(i) = init {
            node.absorb(&i);
        }
        node.absorb(&cond_node);
        if let Some(i) = inc {
            node.absorb(&i);
        }
        node.absorb(&body);
        Ok(node)
    }

    fn loop_summary(&self, cond: &ExprNode, body: &ExprNode) -> FlowSummary {
        let known = self.known_truth(cond);
        if known == Some(true) && !body.summary.can_break {
            if body.summary.exit == ExitKind::MustReturn {
                return FlowSummary::exits(ExitKind::MustReturn);
            }
            if !body.summary.exit.may_escape() {
                // spins forever; nothing after it is reachable
                return FlowSummary::exits(ExitKind::MustExit);
            }
        }
        body.summary.loop_body()
    }

    /// A loop whose condition depends only on storage the body never touches cannot
    /// terminate. Constant conditions are deliberate and exempt; a call anywhere in the
    /// condition or an unconstrained call in the body may change anything, so those are
    /// exempt too.
    fn check_infinite_loop(
        &mut self,
        cond: &ExprNode,
        body: &ExprNode,
        inc: Option<&ExprNode>,
        loc: SourceSpan,
    ) {
        if cond.uses.is_empty() || cond.uses.contains(&RESULT_REF) {
            return;
        }
        if body.summary.can_break || body.summary.exit.may_escape() {
            return;
        }

        let mut writes: Vec<RefId> = Vec::new();
        for n in [Some(body), Some(cond), inc].into_iter().flatten() {
            writes.extend(n.sets.iter().copied());
            writes.extend(n.msets.iter().copied());
        }

        if writes.iter().any(|w| self.refs.is_unconstrained(*w)) {
            return;
        }

        let changed = cond.uses.iter().any(|u| {
            let u_root = self.refs.root(*u);
            writes
                .iter()
                .any(|w| *w == *u || self.refs.root(*w) == u_root)
        });
        if !changed {
            self.reporter.report(
                DiagKind::SuspectedInfiniteLoop,
                loc,
                "suspected infinite loop: condition storage is never modified in the loop"
                    .to_string(),
            );
        }
    }

    fn check_empty_body(&mut self, body: &ExprNode, construct: &str, loc: SourceSpan) {
        if self.options.warn_empty_body && matches!(body.kind, ExprKind::Empty) {
            self.reporter.report(
                DiagKind::EmptyBody,
                loc,
                format!("body of {} is empty", construct),
            );
        }
    }

    // ---- switch ----

    /// A case or default label. `prev` is the fused statement list of the arm ending here,
    /// if any; `label` is None for `default`.
    pub fn make_case(
        &mut self,
        token: &mut SwitchToken,
        label: Option<ExprNode>,
        prev: Option<&ExprNode>,
        loc: SourceSpan,
    ) -> ExprNode {
        if let Some(p) = prev {
            token.arm_summaries.push(p.summary);
            if !p.kind.is_jump_target()
                && !matches!(p.kind, ExprKind::Empty)
                && !p.summary.blocks_fallthrough()
            {
                self.reporter.report(
                    DiagKind::CaseFallthrough,
                    loc,
                    "execution falls through into the next case".to_string(),
                );
            }
        }

        // each arm is checked from the switch entry state
        let end = self.refs.snapshot();
        match token.merged.take() {
            None => token.merged = Some(end),
            Some(m) => {
                self.refs.join_with(&m);
                token.merged = Some(self.refs.snapshot());
            }
        }
        self.refs.restore(&token.entry);

        let Some(label) = label else {
            if token.has_default {
                self.reporter.report(
                    DiagKind::DuplicateCase,
                    loc,
                    "duplicate default label".to_string(),
                );
            }
            token.has_default = true;
            return ExprNode::new(ExprKind::Default, CType::Void, loc).with_text("default:");
        };

        self.check_case_label(token, &label, loc);
        token.cases.push(CaseLabel {
            text: label.text.clone(),
            value: label.value.as_int(),
        });

        let text = format!("case {}:", label.text);
        let mut node = ExprNode::new(ExprKind::Case, CType::Void, loc);
        node.absorb(&label);
        node.with_text(text)
    }

    fn check_case_label(&mut self, token: &SwitchToken, label: &ExprNode, loc: SourceSpan) {
        let duplicate = token.cases.iter().any(|c| match (c.value, label.value.as_int()) {
            (Some(a), Some(b)) => a == b,
            _ => c.text == label.text,
        });
        if duplicate {
            self.reporter.report(
                DiagKind::DuplicateCase,
                loc,
                format!("duplicate case {}", label.text),
            );
        }

        if let CType::Enum(eid) = token.scrutinee_ty.decay() {
            // anything that is not a member of the switched enum loses the abstraction
            let member = match &label.ty {
                CType::Enum(lid) => *lid == eid,
                CType::Unknown => true,
                _ => false,
            };
            if !member {
                self.reporter.report(
                    DiagKind::TypeMismatch,
                    loc,
                    format!(
                        "case {} is not a member of the switched enum type",
                        label.text
                    ),
                );
            }
        }
    }

    /// Close a switch. `last_arm` is the fused statement list of the final arm, if any.
    pub fn make_switch(
        &mut self,
        scrutinee: ExprNode,
        body: ExprNode,
        mut token: SwitchToken,
        last_arm: Option<&ExprNode>,
        loc: SourceSpan,
    ) -> ExprNode {
        if let Some(l) = last_arm {
            token.arm_summaries.push(l.summary);
        }

        let last_escapes = last_arm
            .map(|l| l.summary.blocks_fallthrough())
            .unwrap_or(false);
        if let Some(m) = token.merged.take() {
            if last_escapes {
                self.refs.restore(&m);
            } else {
                self.refs.join_with(&m);
            }
        }

        let exhaustive = self.check_exhaustive(&token, loc);
        if !token.has_default && !exhaustive {
            // some value may match no case at all
            self.refs.join_with(&token.entry);
        }

        let mut node = ExprNode::new(ExprKind::Switch, CType::Void, loc);
        node.summary = self.switch_summary(&token, exhaustive);
        node.absorb(&scrutinee);
        node.absorb(&body);
        node
    }

    /// Enum switches without a default must name every member. Returns whether every
    /// possible scrutinee value reaches some arm.
    fn check_exhaustive(&mut self, token: &SwitchToken, loc: SourceSpan) -> bool {
        if token.has_default {
            return true;
        }
        let CType::Enum(eid) = token.scrutinee_ty.decay() else {
            return false;
        };
        let Some(def) = self.types.enums.get(&eid) else {
            return false;
        };

        let missing: Vec<&str> = def
            .members
            .iter()
            .filter(|m| !token.cases.iter().any(|c| &c.text == *m))
            .map(|m| m.as_str())
            .collect();
        if missing.is_empty() {
            return true;
        }
        self.reporter.report(
            DiagKind::MissingCase,
            loc,
            format!(
                "switch on enum {} has no case for {}",
                def.name,
                missing.join(", ")
            ),
        );
        false
    }

    fn switch_summary(&self, token: &SwitchToken, exhaustive: bool) -> FlowSummary {
        if exhaustive && !token.arm_summaries.is_empty() {
            let all_escape = token
                .arm_summaries
                .iter()
                .all(|s| s.exit.must_escape());
            if all_escape {
                let exit = token
                    .arm_summaries
                    .iter()
                    .map(|s| s.exit)
                    .reduce(|a, b| FlowSummary::exits(a).branch_join(&FlowSummary::exits(b)).exit)
                    .unwrap_or(ExitKind::NeverEscape);
                return FlowSummary::exits(exit);
            }
        }

        let mut joined = FlowSummary::normal();
        for s in &token.arm_summaries {
            joined = joined.branch_join(s);
        }
        // break leaves the switch, not the surrounding statement list
        FlowSummary {
            exit: joined.exit.conditional(),
            can_break: false,
            must_break: false,
        }
    }
}
