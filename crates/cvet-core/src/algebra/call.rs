//! Call expressions.

use crate::context::Analyzer;
use crate::diagnostics::DiagKind;
use crate::expr::{ExprKind, ExprNode};
use crate::loc::SourceSpan;

impl Analyzer {
    /// Build a call node from analyzed arguments and run the contract checks.
    pub fn make_call(&mut self, name: &str, mut args: Vec<ExprNode>, loc: SourceSpan) -> ExprNode {
        let mut node = ExprNode::new(
            ExprKind::Call(name.to_string()),
            crate::types::CType::Unknown,
            loc,
        );

        self.check_call(&mut node, name, &mut args, loc);

        // argument evaluation order is unspecified; uses are recorded by check_call,
        // so the interference scan runs on the checked arguments
        for i in 0..args.len() {
            for j in (i + 1)..args.len() {
                if args[i].interferes_with(&args[j]) || args[j].interferes_with(&args[i]) {
                    let a = self.describe(&args[i]);
                    let b = self.describe(&args[j]);
                    self.reporter.report(
                        DiagKind::EvalOrderUndefined,
                        loc,
                        format!(
                            "evaluation order of arguments {} and {} to {} is undefined",
                            a, b, name
                        ),
                    );
                }
            }
        }

        let mut rendered = Vec::with_capacity(args.len());
        for arg in &args {
            node.absorb(arg);
            rendered.push(self.describe(arg));
        }
        node.with_text(format!("{}({})", name, rendered.join(", ")))
    }
}
