/*! Call-site checking against function contracts.
 *
 * A contracted call gets arity and type checking, null and side-effect argument checks, unique
 * parameter overlap detection, globals and modifies accounting, and format-string dispatch. A
 * call with no contract is unconstrained: anything reachable from its arguments, and the
 * internal state of the world, may have been modified afterwards.
 */

use crate::context::Analyzer;
use crate::contract::{FormatKind, FunctionContract, ParamMode};
use crate::diagnostics::DiagKind;
use crate::expr::ExprNode;
use crate::flow::{ExitKind, FlowSummary};
use crate::loc::SourceSpan;
use crate::storage::{
    AliasKind, DefState, NullState, RefId, RefKind, INTERNAL_STATE_REF, RESULT_REF,
    SYSTEM_STATE_REF,
};
use crate::types::CType;
use tracing::trace;

impl Analyzer {
    /// Run all call-site checks, mutate argument storage states, and fill in the call node's
    /// type, summary and result ref. Arguments must already be analyzed.
    pub fn check_call(
        &mut self,
        node: &mut ExprNode,
        name: &str,
        args: &mut [ExprNode],
        loc: SourceSpan,
    ) {
        trace!(callee = name, argc = args.len(), "checking call");

        for arg in args.iter_mut() {
            self.use_value(arg);
        }

        let Some(contract) = self.contracts.get(name).cloned() else {
            self.check_unconstrained_call(node, name, args, loc);
            return;
        };

        self.check_arity(&contract, name, args.len(), loc);
        self.check_positional(node, &contract, args, loc);
        self.check_unique_params(&contract, name, args, loc);
        self.check_format_dispatch(node, &contract, name, args, loc);
        self.check_glob_mods(node, &contract, args, loc);
        self.apply_result(node, &contract);
    }

    fn check_unconstrained_call(
        &mut self,
        node: &mut ExprNode,
        name: &str,
        args: &[ExprNode],
        loc: SourceSpan,
    ) {
        if self.options.warn_unconstrained_calls {
            self.reporter.report(
                DiagKind::UnconstrainedCall,
                loc,
                format!("call to {} with no contract; effects unknown", name),
            );
        }

        self.mset_reachable(node, args, loc);
        self.check_mset(node, INTERNAL_STATE_REF, loc);

        let marker = self.refs.intern(
            RefKind::Unconstrained {
                name: name.to_string(),
            },
            CType::Unknown,
        );
        node.sets.insert(marker);
        node.ty = CType::Unknown;
        node.summary = FlowSummary::normal();
        self.refs.state_mut(RESULT_REF).null = NullState::Unknown;
        node.sref = RESULT_REF;
    }

    /// Possibly modify everything reachable through pointer arguments.
    fn mset_reachable(&mut self, node: &mut ExprNode, args: &[ExprNode], loc: SourceSpan) {
        for arg in args {
            if !self.refs.is_meaningful(arg.sref) {
                continue;
            }
            match self.refs.kind(arg.sref).clone() {
                RefKind::Addr { base } => self.check_mset(node, base, loc),
                _ if arg.ty.decay().is_pointer() => {
                    let pointee = arg.ty.decay().pointee().cloned().unwrap_or(CType::Unknown);
                    let deref = self.refs.intern(RefKind::Deref { base: arg.sref }, pointee);
                    self.check_mset(node, deref, loc);
                }
                _ => {}
            }
        }
    }

    fn check_arity(
        &mut self,
        contract: &FunctionContract,
        name: &str,
        argc: usize,
        loc: SourceSpan,
    ) {
        let expected = contract.params.len();
        let bad = if contract.variadic {
            argc < expected
        } else {
            argc != expected
        };
        if bad {
            self.reporter.report(
                DiagKind::TypeMismatch,
                loc,
                format!(
                    "{} called with {} argument{}, expects {}{}",
                    name,
                    argc,
                    if argc == 1 { "" } else { "s" },
                    if contract.variadic { "at least " } else { "" },
                    expected
                ),
            );
        }
    }

    fn check_positional(
        &mut self,
        node: &mut ExprNode,
        contract: &FunctionContract,
        args: &mut [ExprNode],
        loc: SourceSpan,
    ) {
        for (p, arg) in contract.params.iter().zip(args.iter_mut()) {
            let actual = arg.ty.decay();
            let null_exempt = p.ty.is_pointer() && arg.is_null_literal();
            if !null_exempt && !self.types.match_types(&p.ty, &actual) {
                self.reporter.report(
                    DiagKind::TypeMismatch,
                    loc,
                    format!(
                        "argument {} to {} has type {}, expects {}",
                        p.name, contract.name, actual, p.ty
                    ),
                );
            }

            if p.not_null && (arg.is_null_literal() || self.possibly_null(arg.sref)) {
                let desc = self.describe(arg);
                self.reporter.report(
                    DiagKind::NullDeref,
                    loc,
                    format!(
                        "possibly null {} passed as non-null parameter {} of {}",
                        desc, p.name, contract.name
                    ),
                );
                self.set_null(arg.sref, NullState::NotNull);
            }

            match p.mode {
                ParamMode::Sef if arg.has_side_effects() => {
                    let desc = self.describe(arg);
                    self.reporter.report(
                        DiagKind::SideEffectArg,
                        loc,
                        format!(
                            "{} has side effects but parameter {} of {} must be side-effect free",
                            desc, p.name, contract.name
                        ),
                    );
                }
                ParamMode::Out => {
                    if self.refs.is_meaningful(arg.sref) {
                        let target = match self.refs.kind(arg.sref).clone() {
                            RefKind::Addr { base } => base,
                            _ => {
                                let pointee =
                                    arg.ty.decay().pointee().cloned().unwrap_or(CType::Unknown);
                                self.refs.intern(RefKind::Deref { base: arg.sref }, pointee)
                            }
                        };
                        self.check_set(node, target, loc);
                    }
                }
                ParamMode::Only => {
                    // ownership transfers; the caller's reference is dead afterwards
                    if self.refs.is_meaningful(arg.sref) {
                        let state = self.refs.state_mut(arg.sref);
                        state.def = DefState::Dead;
                        state.alias = AliasKind::Error;
                    }
                }
                _ => {}
            }
        }
    }

    /// Unique parameters may not overlap any other argument, directly or through aliases.
    fn check_unique_params(
        &mut self,
        contract: &FunctionContract,
        name: &str,
        args: &[ExprNode],
        loc: SourceSpan,
    ) {
        for (i, p) in contract.params.iter().enumerate() {
            if !matches!(p.mode, ParamMode::Unique | ParamMode::Only) {
                continue;
            }
            let Some(a) = args.get(i) else { continue };
            if !self.refs.is_meaningful(a.sref) {
                continue;
            }
            let a_root = self.refs.root(a.sref);

            for (j, b) in args.iter().enumerate() {
                if i == j || !self.refs.is_meaningful(b.sref) {
                    continue;
                }
                let b_root = self.refs.root(b.sref);
                if a_root == b_root || self.aliases.may_alias(a.sref, b.sref) {
                    let an = self.refs.unparse(a.sref);
                    let bn = self.refs.unparse(b.sref);
                    self.reporter.report(
                        DiagKind::AliasViolation,
                        loc,
                        format!(
                            "{} and {} may share storage, but parameter {} of {} must be unique",
                            an, bn, p.name, name
                        ),
                    );
                }
            }
        }
    }

    fn check_format_dispatch(
        &mut self,
        node: &mut ExprNode,
        contract: &FunctionContract,
        name: &str,
        args: &[ExprNode],
        loc: SourceSpan,
    ) {
        if contract.format == FormatKind::None {
            return;
        }
        let Some(fmt_node) = args.get(contract.format_arg) else {
            return;
        };
        let Some(fmt) = fmt_node.value.as_str().map(str::to_owned) else {
            // format string not known at compile time; nothing to scan
            return;
        };
        let rest = &args[contract.format_arg + 1..];
        self.check_format_args(node, contract.format, name, &fmt, rest, loc);
    }

    /// Globals the callee reads are uses here; its modifies clause becomes sets, with formal
    /// parameter targets bound to the actual arguments.
    fn check_glob_mods(
        &mut self,
        node: &mut ExprNode,
        contract: &FunctionContract,
        args: &[ExprNode],
        loc: SourceSpan,
    ) {
        for g in &contract.globals {
            let id = self.global_ref(g);
            node.uses.insert(id);
            self.check_use(id, loc);
            self.check_caller_documents_global(g, loc);
        }

        match &contract.modifies {
            None => {
                self.mset_reachable(node, args, loc);
                self.check_mset(node, INTERNAL_STATE_REF, loc);
            }
            Some(targets) => {
                for m in targets.clone() {
                    self.apply_modifies_target(node, contract, &m, args, loc);
                }
            }
        }
    }

    fn apply_modifies_target(
        &mut self,
        node: &mut ExprNode,
        contract: &FunctionContract,
        target: &str,
        args: &[ExprNode],
        loc: SourceSpan,
    ) {
        if target == "file system state" {
            self.check_mset(node, SYSTEM_STATE_REF, loc);
            return;
        }
        if target == "internal state" {
            self.check_mset(node, INTERNAL_STATE_REF, loc);
            return;
        }

        let (deref, base_name) = match target.strip_prefix('*') {
            Some(rest) => (true, rest),
            None => (false, target),
        };

        // a target naming a formal binds to the corresponding actual
        if let Some(i) = contract.params.iter().position(|p| p.name == base_name) {
            let Some(arg) = args.get(i) else { return };
            if !self.refs.is_meaningful(arg.sref) {
                return;
            }
            let id = match self.refs.kind(arg.sref).clone() {
                RefKind::Addr { base } => base,
                _ => {
                    let pointee = arg.ty.decay().pointee().cloned().unwrap_or(CType::Unknown);
                    self.refs.intern(RefKind::Deref { base: arg.sref }, pointee)
                }
            };
            self.check_set(node, id, loc);
            return;
        }

        let id = self.global_ref(base_name);
        let id = if deref {
            let pointee = self
                .refs
                .ty(id)
                .pointee()
                .cloned()
                .unwrap_or(CType::Unknown);
            self.refs.intern(RefKind::Deref { base: id }, pointee)
        } else {
            id
        };
        self.check_set(node, id, loc);
    }

    /// A callee global must be documented by the calling function's own globals clause.
    fn check_caller_documents_global(&mut self, g: &str, loc: SourceSpan) {
        let undocumented = match self.own_globals() {
            None => false,
            Some(own) => !own.iter().any(|o| o == g),
        };
        if undocumented {
            self.reporter.report(
                DiagKind::GlobalsUndocumented,
                loc,
                format!("callee uses global {} not listed in globals clause", g),
            );
        }
    }

    fn global_ref(&mut self, name: &str) -> RefId {
        let ty = self
            .symbols
            .lookup(name)
            .map(|s| s.ty.clone())
            .unwrap_or(CType::Unknown);
        self.refs.intern(
            RefKind::Global {
                name: name.to_string(),
            },
            ty,
        )
    }

    fn apply_result(&mut self, node: &mut ExprNode, contract: &FunctionContract) {
        node.ty = contract.returns.clone();
        node.summary = match contract.exits {
            ExitKind::MustExit => FlowSummary::exits(ExitKind::MustExit),
            ExitKind::MayExit => FlowSummary::exits(ExitKind::MayExit),
            _ => FlowSummary::normal(),
        };

        let state = self.refs.state_mut(RESULT_REF);
        state.def = DefState::Defined;
        state.null = if contract.result_null {
            NullState::PossiblyNull
        } else if contract.returns.is_pointer() {
            NullState::NotNull
        } else {
            NullState::Unknown
        };
        state.alias = if contract.returns.is_pointer() {
            AliasKind::Fresh
        } else {
            AliasKind::Unknown
        };
        node.sref = RESULT_REF;
    }
}
