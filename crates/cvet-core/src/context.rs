/*! The analysis context threaded through every smart constructor.
 *
 * `Analyzer` owns the ref table, flow states, symbol table, alias facts, guard frames, contracts
 * and the reporter. The parser drives it: scopes and branches open and close with explicit
 * tokens, because children are analyzed before their parent node exists.
 */

use crate::alias::AliasTable;
use crate::contract::{ContractTable, FunctionContract, ParamMode};
use crate::diagnostics::Reporter;
use crate::expr::ExprNode;
use crate::flow::{ExitKind, FlowSummary};
use crate::loc::{SourceFiles, SourceSpan};
use crate::storage::{
    AliasKind, DefState, Exposure, FlowState, NullState, RefId, RefKind, RefTable, StateSnapshot,
};
use crate::symtab::{ScopeToken, StorageClass, Symbol, SymbolTable};
use crate::types::{CType, TypeRegistry};
use crate::values::ConstValue;
use crate::{CheckError, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Warn at every call to a function with no contract.
    pub warn_unconstrained_calls: bool,
    /// Flag arithmetic on abstract-typed operands.
    pub warn_abstract_ops: bool,
    /// Flag if/while bodies that are a bare semicolon.
    pub warn_empty_body: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        AnalyzerOptions {
            warn_unconstrained_calls: false,
            warn_abstract_ops: true,
            warn_empty_body: true,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct CurrentFunction {
    pub name: String,
    pub returns: CType,
    pub contract: FunctionContract,
}

/// Token for an if/conditional: created before the first arm, consumed at the merge.
#[must_use = "branch tokens must be passed back when the branch merges"]
#[derive(Debug)]
pub struct BranchToken {
    pub(crate) entry: StateSnapshot,
    pub(crate) first_arm: Option<StateSnapshot>,
    pub(crate) guard_depth: usize,
}

/// Token for a loop body.
#[must_use = "loop tokens must be passed back when the loop closes"]
#[derive(Debug)]
pub struct LoopToken {
    pub(crate) entry: StateSnapshot,
    pub(crate) guard_depth: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct CaseLabel {
    pub text: String,
    pub value: Option<i64>,
}

/// Token for a switch body: collects case labels and arm outcomes as the arms are analyzed.
#[must_use = "switch tokens must be passed back when the switch closes"]
#[derive(Debug)]
pub struct SwitchToken {
    pub(crate) scrutinee_ty: CType,
    pub(crate) entry: StateSnapshot,
    pub(crate) cases: Vec<CaseLabel>,
    pub(crate) has_default: bool,
    pub(crate) merged: Option<StateSnapshot>,
    pub(crate) arm_summaries: Vec<FlowSummary>,
}

/// Exit-time state of one named storage location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageExit {
    pub name: String,
    pub def: DefState,
    pub null: NullState,
    pub alias: AliasKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSummary {
    pub name: String,
    pub exit: ExitKind,
    pub storage: Vec<StorageExit>,
}

#[derive(Debug, Default)]
pub struct Analyzer {
    pub refs: RefTable,
    pub types: TypeRegistry,
    pub symbols: SymbolTable,
    pub aliases: AliasTable,
    pub contracts: ContractTable,
    pub reporter: Reporter,
    pub files: SourceFiles,
    pub options: AnalyzerOptions,
    guard_frames: Vec<IndexSet<RefId>>,
    pub(crate) current_fn: Option<CurrentFunction>,
}

impl Analyzer {
    pub fn new(options: AnalyzerOptions) -> Self {
        Analyzer {
            refs: RefTable::new(),
            types: TypeRegistry::new(),
            symbols: SymbolTable::new(),
            aliases: AliasTable::new(),
            contracts: ContractTable::with_builtins(),
            reporter: Reporter::new(),
            files: SourceFiles::new(),
            options,
            guard_frames: Vec::new(),
            current_fn: None,
        }
    }

    // ---- storage helpers ----

    /// Ref for a name currently in scope, interning on first use.
    pub fn ref_for_symbol(&mut self, name: &str) -> Option<RefId> {
        let symbol = self.symbols.lookup(name)?.clone();
        let kind = match symbol.class {
            StorageClass::Local => RefKind::Local {
                name: name.to_string(),
                scope: self.symbols.scope_of(name).unwrap_or(0),
            },
            StorageClass::Param { index } => RefKind::Param {
                name: name.to_string(),
                index,
            },
            StorageClass::Global | StorageClass::Static => RefKind::Global {
                name: name.to_string(),
            },
        };
        Some(self.refs.intern(kind, symbol.ty))
    }

    // ---- guard frames ----

    pub(crate) fn push_guard_frame(&mut self, refs: IndexSet<RefId>) -> usize {
        self.guard_frames.push(refs);
        self.guard_frames.len()
    }

    pub(crate) fn pop_guard_frame(&mut self, depth: usize) -> Result<()> {
        if self.guard_frames.len() != depth {
            return Err(CheckError::ScopeImbalance(format!(
                "guard frame pop at depth {} expected {}",
                self.guard_frames.len(),
                depth
            )));
        }
        self.guard_frames.pop();
        Ok(())
    }

    /// Is `id` covered by an active non-null guard?
    pub fn guarded_not_null(&self, id: RefId) -> bool {
        self.guard_frames.iter().any(|f| f.contains(&id))
    }

    /// Assignment makes guard facts about `id` stale.
    pub(crate) fn invalidate_guards(&mut self, id: RefId) {
        for frame in &mut self.guard_frames {
            frame.shift_remove(&id);
        }
    }

    // ---- branch scopes ----

    /// Open the true arm of a two-way branch on `cond`.
    pub fn begin_then(&mut self, cond: &ExprNode) -> BranchToken {
        let entry = self.refs.snapshot();
        let guard_depth = self.push_guard_frame(cond.guards.true_guards.clone());
        BranchToken {
            entry,
            first_arm: None,
            guard_depth,
        }
    }

    /// Switch from the true arm to the false arm: the true-arm end state is parked in the
    /// token and analysis restarts from the branch entry under the false guards.
    pub fn begin_else(&mut self, token: &mut BranchToken, cond: &ExprNode) -> Result<()> {
        self.pop_guard_frame(token.guard_depth)?;
        token.first_arm = Some(self.refs.snapshot());
        self.refs.restore(&token.entry);
        token.guard_depth = self.push_guard_frame(cond.guards.false_guards.clone());
        Ok(())
    }

    /// Merge at the end of the branch. `first_escapes`/`second_escapes` say whether each arm's
    /// end state is unreachable and therefore excluded from the join.
    pub(crate) fn merge_branch(
        &mut self,
        token: BranchToken,
        first_escapes: bool,
        second_escapes: bool,
    ) -> Result<()> {
        self.pop_guard_frame(token.guard_depth)?;
        let other = token.first_arm.unwrap_or(token.entry);
        if second_escapes {
            // the current (second-arm) state never reaches the merge
            self.refs.restore(&other);
        } else if !first_escapes {
            self.refs.join_with(&other);
        }
        Ok(())
    }

    /// Open a loop body guarded by `cond` being true.
    pub fn begin_loop(&mut self, cond: &ExprNode) -> LoopToken {
        let entry = self.refs.snapshot();
        let guard_depth = self.push_guard_frame(cond.guards.true_guards.clone());
        LoopToken { entry, guard_depth }
    }

    pub(crate) fn merge_loop(&mut self, token: LoopToken, at_least_once: bool) -> Result<()> {
        self.pop_guard_frame(token.guard_depth)?;
        if !at_least_once {
            self.refs.join_with(&token.entry);
        }
        Ok(())
    }

    /// Open a do-while body, which is not guarded by any condition.
    pub fn begin_loop_unguarded(&mut self) -> LoopToken {
        let entry = self.refs.snapshot();
        let guard_depth = self.push_guard_frame(IndexSet::new());
        LoopToken { entry, guard_depth }
    }

    /// Open a switch on a scrutinee of the given type.
    pub fn begin_switch(&mut self, scrutinee: &ExprNode) -> SwitchToken {
        SwitchToken {
            scrutinee_ty: scrutinee.ty.clone(),
            entry: self.refs.snapshot(),
            cases: Vec::new(),
            has_default: false,
            merged: None,
            arm_summaries: Vec::new(),
        }
    }

    /// After a must-escape arm, surviving conditions from the other side become facts:
    /// `if (p == NULL) return;` leaves `p` non-null.
    pub(crate) fn apply_surviving_guards(&mut self, guards: &IndexSet<RefId>) {
        for id in guards {
            self.refs.state_mut(*id).null = NullState::NotNull;
        }
    }

    // ---- function lifecycle ----

    /// Enter a function body: scope, parameter symbols, parameter storage states.
    pub fn begin_function(&mut self, contract: &FunctionContract, span: SourceSpan) -> ScopeToken {
        debug!(name = %contract.name, line = span.line, "checking function");
        let token = self.symbols.enter_scope();

        for (index, p) in contract.params.iter().enumerate() {
            let mut sym = Symbol::local(p.name.clone(), p.ty.clone());
            sym.class = StorageClass::Param {
                index: index as u32,
            };
            if p.mode == ParamMode::Observer {
                sym.exposure = Exposure::Observer;
            }
            self.symbols.declare(sym);

            let id = self.refs.intern(
                RefKind::Param {
                    name: p.name.clone(),
                    index: index as u32,
                },
                p.ty.clone(),
            );
            let state = self.refs.state_mut(id);
            state.def = DefState::Defined;
            state.null = if p.not_null {
                NullState::NotNull
            } else if p.null_ok {
                NullState::PossiblyNull
            } else {
                NullState::Unknown
            };
            state.alias = match p.mode {
                ParamMode::Only => AliasKind::Only,
                ParamMode::Unique => AliasKind::Unique,
                ParamMode::Keep => AliasKind::Keep,
                _ => AliasKind::Unknown,
            };
            if p.mode == ParamMode::Observer {
                state.exposure = Exposure::Observer;
            }

            // an out parameter's pointee starts undefined; the callee must write it
            if p.mode == ParamMode::Out && p.ty.is_pointer() {
                let pointee_ty = p.ty.pointee().cloned().unwrap_or(CType::Unknown);
                let deref = self.refs.intern(RefKind::Deref { base: id }, pointee_ty);
                self.refs.state_mut(deref).def = DefState::Undefined;
            }
        }

        self.current_fn = Some(CurrentFunction {
            name: contract.name.clone(),
            returns: contract.returns.clone(),
            contract: contract.clone(),
        });
        token
    }

    /// Leave a function body, producing its summary from the exit-time storage states.
    pub fn end_function(
        &mut self,
        token: ScopeToken,
        body_summary: &FlowSummary,
    ) -> Result<FunctionSummary> {
        let current = self
            .current_fn
            .take()
            .ok_or_else(|| CheckError::ScopeImbalance("end_function outside a function".into()))?;

        let mut storage = Vec::new();
        for i in 0..self.refs.len() {
            let id = RefId(i as u32);
            match self.refs.kind(id) {
                RefKind::Param { name, .. } | RefKind::Global { name } => {
                    let state = self.refs.state(id);
                    storage.push(StorageExit {
                        name: name.clone(),
                        def: state.def,
                        null: state.null,
                        alias: state.alias,
                    });
                }
                _ => {}
            }
        }

        self.symbols.exit_scope(token)?;
        self.aliases.prune_to(self.symbols.depth() as u32);

        Ok(FunctionSummary {
            name: current.name,
            exit: body_summary.exit,
            storage,
        })
    }

    pub(crate) fn return_type(&self) -> CType {
        self.current_fn
            .as_ref()
            .map(|f| f.returns.clone())
            .unwrap_or(CType::Unknown)
    }

    /// The current function's own modifies clause, if it has one.
    pub(crate) fn own_modifies(&self) -> Option<&[String]> {
        self.current_fn
            .as_ref()
            .and_then(|f| f.contract.modifies.as_deref())
    }

    pub(crate) fn own_globals(&self) -> Option<&[String]> {
        let f = self.current_fn.as_ref()?;
        if f.contract.globals.is_empty() {
            None
        } else {
            Some(&f.contract.globals)
        }
    }

    // ---- state mutation used across check modules ----

    pub(crate) fn set_null(&mut self, id: RefId, null: NullState) {
        if self.refs.is_meaningful(id) {
            self.refs.state_mut(id).null = null;
        }
    }

    pub(crate) fn copy_value_state(&mut self, dst: RefId, src: RefId) {
        if !self.refs.is_meaningful(dst) || !self.refs.is_meaningful(src) {
            return;
        }
        let FlowState {
            null, alias, buf, ..
        } = self.refs.state(src).clone();
        let dst_state = self.refs.state_mut(dst);
        dst_state.null = null;
        dst_state.alias = alias;
        dst_state.buf = buf;
    }

    /// Evaluate a compile-time condition for a node, honoring known constants.
    pub fn known_truth(&self, node: &ExprNode) -> Option<bool> {
        node.value.truth()
    }

    /// Render a node for messages, falling back to its storage ref.
    pub(crate) fn describe(&self, node: &ExprNode) -> String {
        if !node.text.is_empty() {
            node.text.clone()
        } else if self.refs.is_meaningful(node.sref) {
            self.refs.unparse(node.sref)
        } else {
            match &node.value {
                ConstValue::Unknown => "expression".to_string(),
                v => v.to_string(),
            }
        }
    }
}
