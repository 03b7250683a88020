/*! The fused parse-and-check driver.
 *
 * Two passes per translation unit. The prepass registers type definitions, file-scope storage
 * and function contracts, so bodies can call forward and each other. The main pass walks each
 * function body depth-first, calling the analyzer's smart constructors bottom-up; branch, loop
 * and switch tokens are opened before the corresponding subtree and handed back at the merge.
 */

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use cvet_core::contract::{FormatKind, FunctionContract, ParamContract};
use cvet_core::flow::ExitKind;
use cvet_core::symtab::{StorageClass, Symbol};
use cvet_core::types::{
    AbstractDefinition, CType, EnumDefinition, StructDefinition, StructFieldDef,
};
use cvet_core::{
    Analyzer, AnalyzerOptions, CheckError, Diagnostic, ExprKind, ExprNode, FunctionSummary,
    SourceSpan,
};
use pest::iterators::Pair;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::annotations::{parse_annotation, Annotation};
use crate::{parse, Rule};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("syntax error: {0}")]
    Syntax(#[from] Box<pest::error::Error<Rule>>),
    #[error(transparent)]
    Check(#[from] CheckError),
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Everything a run produced, ready for rendering.
#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub summaries: Vec<FunctionSummary>,
    pub diagnostics: Vec<Diagnostic>,
    pub suppressed: usize,
}

pub struct Driver {
    az: Analyzer,
    typedefs: HashMap<String, CType>,
    summaries: Vec<FunctionSummary>,
    file_id: u32,
}

impl Driver {
    pub fn new(options: AnalyzerOptions) -> Self {
        Driver {
            az: Analyzer::new(options),
            typedefs: HashMap::new(),
            summaries: Vec::new(),
            file_id: 0,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.az
    }

    pub fn analyzer_mut(&mut self) -> &mut Analyzer {
        &mut self.az
    }

    pub fn check_file(&mut self, path: &Path) -> Result<(), DriverError> {
        let source = fs::read_to_string(path).map_err(|source| DriverError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let file_id = self.az.files.add_file(path.to_path_buf());
        self.run(file_id, &source)
    }

    /// Check an in-memory source registered under `name`.
    pub fn check_source(&mut self, name: &str, source: &str) -> Result<(), DriverError> {
        let file_id = self.az.files.add_file(PathBuf::from(name));
        self.run(file_id, source)
    }

    pub fn finish(mut self) -> CheckOutcome {
        CheckOutcome {
            summaries: self.summaries,
            suppressed: self.az.reporter.suppressed_count(),
            diagnostics: self.az.reporter.take(),
        }
    }

    fn run(&mut self, file_id: u32, source: &str) -> Result<(), DriverError> {
        self.file_id = file_id;
        let mut pairs = parse(source)?;
        let unit = pairs
            .next()
            .ok_or(CheckError::MissingChild("translation unit"))?;
        let items: Vec<Pair<Rule>> = unit
            .into_inner()
            .filter(|p| p.as_rule() == Rule::top_item)
            .filter_map(|p| p.into_inner().next())
            .collect();

        for item in &items {
            self.prepass_item(item.clone());
        }
        for item in items {
            self.check_item(item)?;
        }
        Ok(())
    }

    fn span(&self, pair: &Pair<Rule>) -> SourceSpan {
        let (line, col) = pair.as_span().start_pos().line_col();
        SourceSpan::new(self.file_id, line as u32, col as u32)
    }

    // ---- prepass: types, globals, contracts ----

    fn prepass_item(&mut self, item: Pair<Rule>) {
        match item.as_rule() {
            Rule::enum_def => self.register_enum(item),
            Rule::struct_def => self.register_struct(item),
            Rule::typedef_decl => self.register_typedef(item),
            Rule::global_decl => self.register_globals(item),
            Rule::function_def | Rule::function_decl => {
                let contract = self.contract_of(item);
                debug!(name = %contract.name, "registered contract");
                self.az.contracts.insert(contract);
            }
            _ => {}
        }
    }

    fn register_enum(&mut self, item: Pair<Rule>) {
        let mut names = item
            .into_inner()
            .filter(|p| p.as_rule() == Rule::ident)
            .map(|p| p.as_str().to_string());
        let Some(name) = names.next() else { return };
        self.az.types.add_enum(EnumDefinition {
            name,
            members: names.collect(),
        });
    }

    fn register_struct(&mut self, item: Pair<Rule>) {
        let mut inner = item.into_inner();
        let is_union = inner
            .next()
            .map(|kw| kw.as_rule() == Rule::kw_union)
            .unwrap_or(false);
        let Some(name) = inner.next().map(|p| p.as_str().to_string()) else {
            return;
        };

        // register before resolving fields so self-referential pointers resolve
        let id = self.az.types.add_struct(StructDefinition {
            name,
            fields: Vec::new(),
            is_union,
        });

        let mut fields = Vec::new();
        for field in inner.filter(|p| p.as_rule() == Rule::struct_field) {
            let mut parts = field.into_inner();
            let Some(spec) = parts.next() else { continue };
            let mut ty = self.resolve_type_spec(spec);
            let Some(fname) = parts.next().map(|p| p.as_str().to_string()) else {
                continue;
            };
            if let Some(suffix) = parts.next() {
                ty = self.apply_array_suffix(ty, &suffix);
            }
            fields.push(StructFieldDef {
                name: fname,
                field_type: ty,
            });
        }
        if let Some(def) = self.az.types.structs.get_mut(&id) {
            def.fields = fields;
        }
    }

    fn register_typedef(&mut self, item: Pair<Rule>) {
        let mut annots = Vec::new();
        let mut underlying = CType::Unknown;
        let mut name = String::new();
        for p in item.into_inner() {
            match p.as_rule() {
                Rule::annotation => annots.push(parse_annotation(p.as_str())),
                Rule::type_spec => underlying = self.resolve_type_spec(p),
                Rule::ident => name = p.as_str().to_string(),
                _ => {}
            }
        }
        if name.is_empty() {
            return;
        }

        if annots.contains(&Annotation::Abstract) {
            let mutable = annots.contains(&Annotation::Mutable)
                || (!annots.contains(&Annotation::Immutable)
                    && self.az.types.is_mutable(&underlying));
            let id = self.az.types.add_abstract(AbstractDefinition {
                name: name.clone(),
                mutable,
            });
            self.typedefs.insert(name, CType::Abstract(id));
        } else {
            self.typedefs.insert(name, underlying);
        }
    }

    fn register_globals(&mut self, item: Pair<Rule>) {
        let mut decl_annots = Vec::new();
        let mut is_static = false;
        let mut base = CType::Unknown;
        for p in item.into_inner() {
            match p.as_rule() {
                Rule::annotation => decl_annots.push(parse_annotation(p.as_str())),
                Rule::static_kw => is_static = true,
                Rule::type_spec => base = self.resolve_type_spec(p),
                Rule::init_declarator => {
                    let (annots, name, ty, _) = self.split_declarator(p, &base);
                    self.az.declare_file_scope(&name, ty, is_static);
                    if let Some(sym) = self.az.symbols.lookup_mut(&name) {
                        for a in decl_annots.iter().chain(annots.iter()) {
                            a.seed_symbol(sym);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Contract from a definition or prototype: signature plus its annotation clauses.
    fn contract_of(&mut self, item: Pair<Rule>) -> FunctionContract {
        let mut clause_annots = Vec::new();
        let mut returns = CType::Unknown;
        let mut name = String::new();
        let mut params: Vec<ParamContract> = Vec::new();
        let mut variadic = false;

        for p in item.into_inner() {
            match p.as_rule() {
                Rule::annotation => clause_annots.push(parse_annotation(p.as_str())),
                Rule::fn_sig => {
                    for s in p.into_inner() {
                        match s.as_rule() {
                            Rule::type_spec => returns = self.resolve_type_spec(s),
                            Rule::ident => name = s.as_str().to_string(),
                            Rule::param_list => {
                                for entry in s.into_inner() {
                                    match entry.as_rule() {
                                        Rule::varargs => variadic = true,
                                        Rule::param => {
                                            if let Some(pc) =
                                                self.param_contract(entry, params.len())
                                            {
                                                params.push(pc);
                                            }
                                        }
                                        _ => {}
                                    }
                                }
                            }
                            Rule::annotation => {
                                clause_annots.push(parse_annotation(s.as_str()))
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let mut contract = FunctionContract::new(name, returns);
        let n_params = params.len();
        for pc in params {
            contract = contract.param(pc);
        }
        if variadic {
            contract = contract.variadic();
        }

        let mut saw_modifies = false;
        for a in clause_annots {
            match a {
                Annotation::Globals(g) => contract.globals = g,
                Annotation::Modifies(m) => {
                    contract.modifies = Some(m);
                    saw_modifies = true;
                }
                Annotation::Null => contract = contract.result_null(),
                Annotation::Exits => contract = contract.exits(ExitKind::MustExit),
                Annotation::PrintfLike => {
                    contract =
                        contract.formats(FormatKind::Printf, n_params.saturating_sub(1));
                }
                Annotation::ScanfLike => {
                    contract = contract.formats(FormatKind::Scanf, n_params.saturating_sub(1));
                }
                Annotation::MessageLike => {
                    contract =
                        contract.formats(FormatKind::Message, n_params.saturating_sub(1));
                }
                _ => {}
            }
        }
        // without a modifies clause the function may modify anything it reaches
        if !saw_modifies {
            contract = contract.unconstrained_modifies();
        }
        contract
    }

    fn param_contract(&mut self, param: Pair<Rule>, index: usize) -> Option<ParamContract> {
        let mut annots = Vec::new();
        let mut ty = CType::Unknown;
        let mut name: Option<String> = None;
        let mut suffix = None;
        for p in param.into_inner() {
            match p.as_rule() {
                Rule::annotation => annots.push(parse_annotation(p.as_str())),
                Rule::type_spec => ty = self.resolve_type_spec(p),
                Rule::ident => name = Some(p.as_str().to_string()),
                Rule::array_suffix => suffix = Some(p),
                _ => {}
            }
        }
        // `f(void)` takes no parameters
        if name.is_none() && ty == CType::Void {
            return None;
        }
        if let Some(s) = suffix {
            ty = self.apply_array_suffix(ty, &s);
        }

        let name = name.unwrap_or_else(|| format!("arg{}", index));
        let mut pc = ParamContract::plain(name, ty);
        for a in &annots {
            pc = a.apply_to_param(pc);
        }
        Some(pc)
    }

    // ---- main pass ----

    fn check_item(&mut self, item: Pair<Rule>) -> Result<(), DriverError> {
        match item.as_rule() {
            Rule::global_decl => self.check_global_decl(item)?,
            Rule::function_def => self.check_function(item)?,
            _ => {}
        }
        Ok(())
    }

    fn check_global_decl(&mut self, item: Pair<Rule>) -> Result<(), DriverError> {
        let mut base = CType::Unknown;
        for p in item.into_inner() {
            match p.as_rule() {
                Rule::type_spec => base = self.resolve_type_spec(p),
                Rule::init_declarator => {
                    let loc = self.span(&p);
                    let (_, name, _, init_pair) = self.split_declarator(p, &base);
                    let init = match init_pair {
                        Some(e) => Some(self.expr(e)?),
                        None => None,
                    };
                    self.az.make_decl(&name, init, loc);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_function(&mut self, item: Pair<Rule>) -> Result<(), DriverError> {
        let loc = self.span(&item);
        let mut name = String::new();
        let mut body = None;
        for p in item.into_inner() {
            match p.as_rule() {
                Rule::fn_sig => {
                    if let Some(id) = p.into_inner().find(|s| s.as_rule() == Rule::ident) {
                        name = id.as_str().to_string();
                    }
                }
                Rule::block => body = Some(p),
                _ => {}
            }
        }
        let Some(body) = body else { return Ok(()) };
        let Some(contract) = self.az.contracts.get(&name).cloned() else {
            return Err(CheckError::UnknownContract(name).into());
        };

        let token = self.az.begin_function(&contract, loc);
        // the outer block shares the parameter scope
        let node = self.stmt_list(body.into_inner(), loc)?;
        let summary = self.az.end_function(token, &node.summary)?;
        self.summaries.push(summary);
        Ok(())
    }

    // ---- statements ----

    fn stmt_list<'a>(
        &mut self,
        stmts: impl Iterator<Item = Pair<'a, Rule>>,
        loc: SourceSpan,
    ) -> Result<ExprNode, DriverError> {
        let mut acc: Option<ExprNode> = None;
        for s in stmts {
            let node = self.stmt(s)?;
            acc = Some(match acc {
                Some(a) => self.az.concat(a, node),
                None => node,
            });
        }
        Ok(acc.unwrap_or_else(|| ExprNode::empty(loc)))
    }

    fn stmt(&mut self, pair: Pair<Rule>) -> Result<ExprNode, DriverError> {
        let loc = self.span(&pair);
        let inner = pair
            .into_inner()
            .next()
            .ok_or(CheckError::MissingChild("statement"))?;
        self.stmt_inner(inner, loc)
    }

    fn if_stmt(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut cond_pair = None;
        let mut arms = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::expr => cond_pair = Some(p),
                Rule::stmt => arms.push(p),
                _ => {}
            }
        }
        let cond_pair = cond_pair.ok_or(CheckError::MissingChild("if condition"))?;
        let mut arms = arms.into_iter();
        let then_pair = arms.next().ok_or(CheckError::MissingChild("then arm"))?;

        let raw = self.expr(cond_pair)?;
        let cond = self.az.make_condition(raw);
        let mut token = self.az.begin_then(&cond);
        let then_stmt = self.stmt(then_pair)?;

        match arms.next() {
            Some(else_pair) => {
                self.az.begin_else(&mut token, &cond)?;
                let else_stmt = self.stmt(else_pair)?;
                Ok(self.az.make_if_else(cond, then_stmt, else_stmt, token, loc)?)
            }
            None => Ok(self.az.make_if(cond, then_stmt, token, loc)?),
        }
    }

    fn while_stmt(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut cond_pair = None;
        let mut body_pair = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::expr => cond_pair = Some(p),
                Rule::stmt => body_pair = Some(p),
                _ => {}
            }
        }
        let raw = self.expr(cond_pair.ok_or(CheckError::MissingChild("while condition"))?)?;
        let cond = self.az.make_condition(raw);
        let token = self.az.begin_loop(&cond);
        let body = self.stmt(body_pair.ok_or(CheckError::MissingChild("while body"))?)?;
        Ok(self.az.make_while(cond, body, token, loc)?)
    }

    fn do_stmt(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut cond_pair = None;
        let mut body_pair = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::expr => cond_pair = Some(p),
                Rule::stmt => body_pair = Some(p),
                _ => {}
            }
        }
        let token = self.az.begin_loop_unguarded();
        let body = self.stmt(body_pair.ok_or(CheckError::MissingChild("do body"))?)?;
        let raw = self.expr(cond_pair.ok_or(CheckError::MissingChild("do condition"))?)?;
        let cond = self.az.make_condition(raw);
        Ok(self.az.make_do_while(body, cond, token, loc)?)
    }

    fn for_stmt(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut init_pair = None;
        let mut cond_pair = None;
        let mut inc_pair = None;
        let mut body_pair = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::for_init => init_pair = Some(p),
                Rule::for_cond => cond_pair = Some(p),
                Rule::for_inc => inc_pair = Some(p),
                Rule::stmt => body_pair = Some(p),
                _ => {}
            }
        }

        let init = match init_pair.and_then(|p| p.into_inner().next()) {
            Some(p) if p.as_rule() == Rule::for_decl => Some(self.for_decl(p)?),
            Some(p) => Some(self.expr(p)?),
            None => None,
        };
        let cond = match cond_pair.and_then(|p| p.into_inner().next()) {
            Some(e) => {
                let raw = self.expr(e)?;
                Some(self.az.make_condition(raw))
            }
            None => None,
        };
        let token = match &cond {
            Some(c) => self.az.begin_loop(c),
            None => self.az.begin_loop_unguarded(),
        };
        let body = self.stmt(body_pair.ok_or(CheckError::MissingChild("for body"))?)?;
        // the increment runs after each iteration, inside the loop frame
        let inc = match inc_pair.and_then(|p| p.into_inner().next()) {
            Some(e) => Some(self.expr(e)?),
            None => None,
        };
        Ok(self.az.make_for(init, cond, inc, body, token, loc)?)
    }

    fn for_decl(&mut self, pair: Pair<Rule>) -> Result<ExprNode, DriverError> {
        let loc = self.span(&pair);
        let mut decl_annots = Vec::new();
        let mut base = CType::Unknown;
        let mut node = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::annotation => decl_annots.push(parse_annotation(p.as_str())),
                Rule::type_spec => base = self.resolve_type_spec(p),
                Rule::init_declarator => {
                    node = Some(self.declare_local(p, &base, false, &decl_annots)?);
                }
                _ => {}
            }
        }
        Ok(node.unwrap_or_else(|| ExprNode::empty(loc)))
    }

    fn decl_stmt(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut decl_annots = Vec::new();
        let mut is_static = false;
        let mut base = CType::Unknown;
        let mut acc: Option<ExprNode> = None;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::annotation => decl_annots.push(parse_annotation(p.as_str())),
                Rule::static_kw => is_static = true,
                Rule::type_spec => base = self.resolve_type_spec(p),
                Rule::init_declarator => {
                    let node = self.declare_local(p, &base, is_static, &decl_annots)?;
                    acc = Some(match acc {
                        Some(a) => self.az.concat(a, node),
                        None => node,
                    });
                }
                _ => {}
            }
        }
        Ok(acc.unwrap_or_else(|| ExprNode::empty(loc)))
    }

    fn declare_local(
        &mut self,
        declarator: Pair<Rule>,
        base: &CType,
        is_static: bool,
        decl_annots: &[Annotation],
    ) -> Result<ExprNode, DriverError> {
        let loc = self.span(&declarator);
        let (annots, name, ty, init_pair) = self.split_declarator(declarator, base);

        let mut sym = Symbol::local(name.clone(), ty);
        if is_static {
            sym.class = StorageClass::Static;
        }
        for a in decl_annots.iter().chain(annots.iter()) {
            a.seed_symbol(&mut sym);
        }
        self.az.symbols.declare(sym);

        let init = match init_pair {
            Some(e) => Some(self.expr(e)?),
            None => None,
        };
        Ok(self.az.make_decl(&name, init, loc))
    }

    /// Annotations, name, full type and optional initializer of one declarator.
    fn split_declarator<'a>(
        &mut self,
        declarator: Pair<'a, Rule>,
        base: &CType,
    ) -> (Vec<Annotation>, String, CType, Option<Pair<'a, Rule>>) {
        let mut annots = Vec::new();
        let mut name = String::new();
        let mut ty = base.clone();
        let mut init = None;
        for p in declarator.into_inner() {
            match p.as_rule() {
                Rule::annotation => annots.push(parse_annotation(p.as_str())),
                Rule::ident => name = p.as_str().to_string(),
                Rule::array_suffix => ty = self.apply_array_suffix(ty, &p),
                Rule::assign_expr => init = Some(p),
                _ => {}
            }
        }
        (annots, name, ty, init)
    }

    // ---- switch ----

    fn switch_stmt(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut scrut_pair = None;
        let mut body_stmts = Vec::new();
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::expr => scrut_pair = Some(p),
                Rule::stmt => body_stmts.push(p),
                _ => {}
            }
        }
        let raw = self.expr(scrut_pair.ok_or(CheckError::MissingChild("switch scrutinee"))?)?;
        let scrutinee = self.az.make_condition(raw);
        let mut token = self.az.begin_switch(&scrutinee);

        // arms are fused separately so each one's summary is attached to its label
        let mut done: Vec<ExprNode> = Vec::new();
        let mut arm: Option<ExprNode> = None;
        for s in body_stmts {
            let s_loc = self.span(&s);
            let inner = s
                .into_inner()
                .next()
                .ok_or(CheckError::MissingChild("switch arm statement"))?;
            match inner.as_rule() {
                Rule::case_label => {
                    let label_pair = inner
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::conditional)
                        .ok_or(CheckError::MissingChild("case label"))?;
                    let label = self.expr(label_pair)?;
                    let node = self.az.make_case(&mut token, Some(label), arm.as_ref(), s_loc);
                    if let Some(a) = arm.take() {
                        done.push(a);
                    }
                    arm = Some(node);
                }
                Rule::default_label => {
                    let node = self.az.make_case(&mut token, None, arm.as_ref(), s_loc);
                    if let Some(a) = arm.take() {
                        done.push(a);
                    }
                    arm = Some(node);
                }
                _ => {
                    let node = self.stmt_inner(inner, s_loc)?;
                    arm = Some(match arm {
                        Some(a) => self.az.concat(a, node),
                        None => node,
                    });
                }
            }
        }

        let mut body = ExprNode::new(ExprKind::StmtList, CType::Void, loc);
        for a in &done {
            body.absorb(a);
        }
        if let Some(l) = &arm {
            body.absorb(l);
        }
        Ok(self.az.make_switch(scrutinee, body, token, arm.as_ref(), loc))
    }

    fn stmt_inner(&mut self, inner: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        match inner.as_rule() {
            Rule::block => {
                let token = self.az.symbols.enter_scope();
                let body = self.stmt_list(inner.into_inner(), loc)?;
                self.az.symbols.exit_scope(token)?;
                Ok(self.az.make_block(body, loc))
            }
            Rule::if_stmt => self.if_stmt(inner, loc),
            Rule::while_stmt => self.while_stmt(inner, loc),
            Rule::do_stmt => self.do_stmt(inner, loc),
            Rule::for_stmt => self.for_stmt(inner, loc),
            Rule::switch_stmt => self.switch_stmt(inner, loc),
            Rule::return_stmt => {
                let value = match inner.into_inner().find(|p| p.as_rule() == Rule::expr) {
                    Some(e) => Some(self.expr(e)?),
                    None => None,
                };
                Ok(self.az.make_return(value, loc))
            }
            Rule::break_stmt => Ok(self.az.make_break(loc)),
            Rule::continue_stmt => Ok(self.az.make_continue(loc)),
            Rule::goto_stmt => {
                let label = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                Ok(self.az.make_goto(&label, loc))
            }
            Rule::label_stmt => {
                let name = inner
                    .into_inner()
                    .next()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                Ok(self.az.make_label(&name, loc))
            }
            Rule::decl_stmt => self.decl_stmt(inner, loc),
            Rule::expr_stmt => {
                let e = inner
                    .into_inner()
                    .next()
                    .ok_or(CheckError::MissingChild("expression statement"))?;
                let node = self.expr(e)?;
                Ok(self.az.make_expr_stmt(node, loc))
            }
            _ => Ok(ExprNode::empty(loc)),
        }
    }

    // ---- expressions ----

    fn expr(&mut self, pair: Pair<Rule>) -> Result<ExprNode, DriverError> {
        let loc = self.span(&pair);
        match pair.as_rule() {
            Rule::expr => {
                let mut inner = pair.into_inner();
                let first = inner.next().ok_or(CheckError::MissingChild("expression"))?;
                let mut node = self.expr(first)?;
                for next in inner {
                    let rhs = self.expr(next)?;
                    node = self.az.make_comma(node, rhs, loc);
                }
                Ok(node)
            }
            Rule::assign_expr => {
                let mut inner = pair.into_inner();
                let lhs_pair = inner.next().ok_or(CheckError::MissingChild("assignment"))?;
                match inner.next() {
                    Some(op) => {
                        let rhs_pair =
                            inner.next().ok_or(CheckError::MissingChild("assignment rhs"))?;
                        let lhs = self.expr(lhs_pair)?;
                        let rhs = self.expr(rhs_pair)?;
                        Ok(self.az.make_assign(op.as_str(), lhs, rhs, loc))
                    }
                    None => self.expr(lhs_pair),
                }
            }
            Rule::conditional => {
                let mut inner = pair.into_inner();
                let cond_pair = inner.next().ok_or(CheckError::MissingChild("conditional"))?;
                match inner.next() {
                    Some(then_pair) => {
                        let else_pair = inner
                            .next()
                            .ok_or(CheckError::MissingChild("conditional else"))?;
                        let raw = self.expr(cond_pair)?;
                        let cond = self.az.make_condition(raw);
                        let mut token = self.az.begin_then(&cond);
                        let then_expr = self.expr(then_pair)?;
                        self.az.begin_else(&mut token, &cond)?;
                        let else_expr = self.expr(else_pair)?;
                        Ok(self
                            .az
                            .make_conditional(cond, then_expr, else_expr, token, loc)?)
                    }
                    None => self.expr(cond_pair),
                }
            }
            Rule::logical_or
            | Rule::logical_and
            | Rule::bit_or
            | Rule::bit_xor
            | Rule::bit_and
            | Rule::equality
            | Rule::relational
            | Rule::shift_expr
            | Rule::additive
            | Rule::multiplicative => self.binary_chain(pair, loc),
            Rule::cast_expr => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or(CheckError::MissingChild("cast expression"))?;
                self.expr(inner)
            }
            Rule::cast => {
                let mut inner = pair.into_inner();
                let ty_pair = inner.next().ok_or(CheckError::MissingChild("cast type"))?;
                let child_pair = inner.next().ok_or(CheckError::MissingChild("cast operand"))?;
                let ty = self.resolve_cast_type(ty_pair);
                let child = self.expr(child_pair)?;
                Ok(self.az.make_cast(ty, child, loc))
            }
            Rule::unary_expr => {
                let mut inner = pair.into_inner();
                let first = inner
                    .next()
                    .ok_or(CheckError::MissingChild("unary expression"))?;
                if first.as_rule() == Rule::prefix_op {
                    let operand_pair =
                        inner.next().ok_or(CheckError::MissingChild("unary operand"))?;
                    let child = self.expr(operand_pair)?;
                    Ok(self.az.make_unary(first.as_str(), child, loc))
                } else {
                    self.expr(first)
                }
            }
            Rule::sizeof_expr => {
                let inner = pair
                    .into_inner()
                    .find(|p| matches!(p.as_rule(), Rule::cast_type | Rule::unary_expr))
                    .ok_or(CheckError::MissingChild("sizeof operand"))?;
                if inner.as_rule() == Rule::cast_type {
                    let ty = self.resolve_cast_type(inner);
                    Ok(self.az.make_sizeof_type(&ty, loc))
                } else {
                    let child = self.expr(inner)?;
                    Ok(self.az.make_sizeof_expr(child, loc))
                }
            }
            Rule::postfix_expr => self.postfix_expr(pair, loc),
            Rule::primary => self.primary(pair, loc),
            Rule::paren_expr => {
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or(CheckError::MissingChild("parenthesized expression"))?;
                self.expr(inner)
            }
            other => {
                debug!(rule = ?other, "unhandled expression rule");
                Ok(ExprNode::error(loc))
            }
        }
    }

    fn binary_chain(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or(CheckError::MissingChild("operand"))?;
        let mut node = self.expr(first)?;
        while let Some(op) = inner.next() {
            let rhs_pair = inner.next().ok_or(CheckError::MissingChild("operand"))?;
            let rhs = self.expr(rhs_pair)?;
            node = self.az.make_binary(op.as_str(), node, rhs, loc);
        }
        Ok(node)
    }

    fn postfix_expr(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let mut inner = pair.into_inner();
        let primary_pair = inner.next().ok_or(CheckError::MissingChild("primary"))?;
        let postfixes: Vec<Pair<Rule>> = inner.collect();

        // a bare identifier followed by an argument list is a call, not a variable read:
        // function names are contracts, not symbols
        let callee = Self::callee_name(&primary_pair);
        let mut node;
        let mut rest = postfixes.iter();
        match (callee, postfixes.first().map(Self::postfix_kind)) {
            (Some(name), Some(Rule::call_args)) => {
                let first_postfix = rest.next().cloned();
                let mut args = Vec::new();
                if let Some(ca) = first_postfix.and_then(|p| p.into_inner().next()) {
                    for arg in ca.into_inner() {
                        if arg.as_rule() == Rule::arg_list {
                            for a in arg.into_inner() {
                                args.push(self.expr(a)?);
                            }
                        } else {
                            args.push(self.expr(arg)?);
                        }
                    }
                }
                node = self.az.make_call(&name, args, loc);
            }
            _ => {
                node = self.primary(primary_pair, loc)?;
            }
        }

        for p in rest {
            let p_loc = self.span(p);
            let op = p
                .clone()
                .into_inner()
                .next()
                .unwrap_or_else(|| p.clone());
            node = match Self::postfix_kind(p) {
                Rule::index => {
                    let idx_pair = op
                        .into_inner()
                        .next()
                        .ok_or(CheckError::MissingChild("subscript"))?;
                    let idx = self.expr(idx_pair)?;
                    self.az.make_index(node, idx, p_loc)
                }
                Rule::member => {
                    let field = op
                        .into_inner()
                        .next()
                        .map(|i| i.as_str().to_string())
                        .unwrap_or_default();
                    self.az.make_field(node, &field, p_loc)
                }
                Rule::arrow => {
                    let field = op
                        .into_inner()
                        .next()
                        .map(|i| i.as_str().to_string())
                        .unwrap_or_default();
                    self.az.make_arrow(node, &field, p_loc)
                }
                Rule::inc_dec => self.az.make_postfix(p.as_str(), node, p_loc),
                Rule::call_args => {
                    // calling anything but a plain function name is out of scope
                    node
                }
                _ => node,
            };
        }
        Ok(node)
    }

    /// The inner rule of a postfix pair, or `inc_dec` for the atomic one.
    fn postfix_kind(p: &Pair<Rule>) -> Rule {
        p.clone()
            .into_inner()
            .next()
            .map(|i| i.as_rule())
            .unwrap_or(Rule::inc_dec)
    }

    fn callee_name(primary: &Pair<Rule>) -> Option<String> {
        let inner = primary.clone().into_inner().next()?;
        if inner.as_rule() == Rule::ident {
            Some(inner.as_str().to_string())
        } else {
            None
        }
    }

    fn primary(&mut self, pair: Pair<Rule>, loc: SourceSpan) -> Result<ExprNode, DriverError> {
        let inner = pair
            .into_inner()
            .next()
            .ok_or(CheckError::MissingChild("primary"))?;
        match inner.as_rule() {
            Rule::null_lit => Ok(self.az.make_int_lit(0, loc)),
            Rule::int_lit => Ok(self.az.make_int_lit(parse_int(inner.as_str()), loc)),
            Rule::float_lit => {
                let text = inner.as_str().trim_end_matches(['f', 'F']);
                Ok(self.az.make_float_lit(text.parse().unwrap_or(0.0), loc))
            }
            Rule::char_lit => {
                let body = inner.as_str().trim_matches('\'');
                Ok(self.az.make_char_lit(unescape_char(body), loc))
            }
            Rule::string_lit => {
                let body = inner.as_str();
                let body = &body[1..body.len().saturating_sub(1)];
                Ok(self.az.make_string_lit(&unescape_string(body), loc))
            }
            Rule::ident => Ok(self.az.make_identifier(inner.as_str(), loc)),
            Rule::paren_expr => self.expr(inner),
            _ => Ok(ExprNode::error(loc)),
        }
    }

    // ---- type resolution ----

    fn resolve_type_spec(&mut self, pair: Pair<Rule>) -> CType {
        let mut inner = pair.into_inner();
        let Some(base) = inner.next() else {
            return CType::Unknown;
        };
        let mut ty = self.resolve_type_base(base);
        for p in inner {
            if p.as_rule() == Rule::star {
                ty = CType::Pointer(Box::new(ty));
            }
        }
        ty
    }

    fn resolve_type_base(&mut self, pair: Pair<Rule>) -> CType {
        let Some(inner) = pair.into_inner().next() else {
            return CType::Unknown;
        };
        match inner.as_rule() {
            Rule::prim_type => prim_type_of(inner.as_str()),
            Rule::struct_ref => {
                let name = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                match self.az.types.struct_by_name(&name) {
                    Some(id) => {
                        if self.az.types.structs.get(&id).map(|d| d.is_union).unwrap_or(false) {
                            CType::Union(id)
                        } else {
                            CType::Struct(id)
                        }
                    }
                    None => CType::Unknown,
                }
            }
            Rule::enum_ref => {
                let name = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default();
                self.az
                    .types
                    .enum_by_name(&name)
                    .map(CType::Enum)
                    .unwrap_or(CType::Unknown)
            }
            Rule::ident => {
                let name = inner.as_str();
                if let Some(ty) = self.typedefs.get(name) {
                    return ty.clone();
                }
                self.az
                    .types
                    .abstract_by_name(name)
                    .map(CType::Abstract)
                    .unwrap_or(CType::Unknown)
            }
            _ => CType::Unknown,
        }
    }

    fn resolve_cast_type(&mut self, pair: Pair<Rule>) -> CType {
        let mut ty = CType::Unknown;
        for p in pair.into_inner() {
            match p.as_rule() {
                Rule::prim_type => ty = prim_type_of(p.as_str()),
                Rule::struct_ref | Rule::enum_ref => {
                    let name = p
                        .clone()
                        .into_inner()
                        .find(|q| q.as_rule() == Rule::ident)
                        .map(|q| q.as_str().to_string())
                        .unwrap_or_default();
                    ty = if p.as_rule() == Rule::enum_ref {
                        self.az
                            .types
                            .enum_by_name(&name)
                            .map(CType::Enum)
                            .unwrap_or(CType::Unknown)
                    } else {
                        match self.az.types.struct_by_name(&name) {
                            Some(id) => {
                                if self
                                    .az
                                    .types
                                    .structs
                                    .get(&id)
                                    .map(|d| d.is_union)
                                    .unwrap_or(false)
                                {
                                    CType::Union(id)
                                } else {
                                    CType::Struct(id)
                                }
                            }
                            None => CType::Unknown,
                        }
                    };
                }
                Rule::ident => {
                    let name = p.as_str();
                    ty = self
                        .typedefs
                        .get(name)
                        .cloned()
                        .or_else(|| self.az.types.abstract_by_name(name).map(CType::Abstract))
                        .unwrap_or(CType::Unknown);
                }
                Rule::star => ty = CType::Pointer(Box::new(ty)),
                _ => {}
            }
        }
        ty
    }

    fn apply_array_suffix(&mut self, elem: CType, suffix: &Pair<Rule>) -> CType {
        let size = suffix
            .clone()
            .into_inner()
            .find(|p| p.as_rule() == Rule::int_lit)
            .map(|p| parse_int(p.as_str()) as usize);
        CType::Array(Box::new(elem), size)
    }
}

fn prim_type_of(text: &str) -> CType {
    let words: Vec<&str> = text.split_whitespace().collect();
    let unsigned = words.contains(&"unsigned");
    let longs = words.iter().filter(|w| **w == "long").count();

    if words.contains(&"double") {
        CType::Double
    } else if words.contains(&"float") {
        CType::Float
    } else if words.contains(&"void") {
        CType::Void
    } else if words.contains(&"_Bool") {
        CType::Bool
    } else if words.contains(&"char") {
        if unsigned {
            CType::UChar
        } else {
            CType::Char
        }
    } else if words.contains(&"short") {
        if unsigned {
            CType::UShort
        } else {
            CType::Short
        }
    } else if longs >= 2 {
        if unsigned {
            CType::ULongLong
        } else {
            CType::LongLong
        }
    } else if longs == 1 {
        if unsigned {
            CType::ULong
        } else {
            CType::Long
        }
    } else if unsigned {
        CType::UInt
    } else {
        CType::Int
    }
}

fn parse_int(text: &str) -> i64 {
    let t = text.trim_end_matches(['u', 'U', 'l', 'L']);
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).unwrap_or(0)
    } else {
        t.parse().unwrap_or(0)
    }
}

fn unescape_char(body: &str) -> char {
    let mut chars = body.chars();
    match chars.next() {
        Some('\\') => match chars.next() {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some(c) => c,
            None => '\\',
        },
        Some(c) => c,
        None => ' ',
    }
}

fn unescape_string(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(e) => out.push(e),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvet_core::DiagKind;
    use pretty_assertions::assert_eq;

    fn check(source: &str) -> CheckOutcome {
        let mut driver = Driver::new(AnalyzerOptions::default());
        driver
            .check_source("test.c", source)
            .unwrap_or_else(|e| panic!("driver error: {}", e));
        driver.finish()
    }

    fn kinds(outcome: &CheckOutcome) -> Vec<DiagKind> {
        outcome.diagnostics.iter().map(|d| d.kind).collect()
    }

    fn assert_clean(outcome: &CheckOutcome) {
        assert!(
            outcome.diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            outcome.diagnostics
        );
    }

    #[test]
    fn test_clean_function() {
        let outcome = check(
            r"
int add(int a, int b)
{
    int sum = a + b;
    return sum;
}
",
        );
        assert_clean(&outcome);
        assert_eq!(outcome.summaries.len(), 1);
        assert_eq!(outcome.summaries[0].name, "add");
        assert_eq!(outcome.summaries[0].exit, ExitKind::MustReturn);
    }

    #[test]
    fn test_use_before_definition() {
        let outcome = check(
            r"
int f(void)
{
    int x;
    return x + 1;
}
",
        );
        assert_eq!(kinds(&outcome), vec![DiagKind::UseBeforeDefinition]);
    }

    #[test]
    fn test_null_param_deref_guarded() {
        let outcome = check(
            r"
int get(/*@null@*/ int *p)
{
    if (p != NULL) {
        return *p;
    }
    return 0;
}
",
        );
        assert_clean(&outcome);
    }

    #[test]
    fn test_null_param_deref_unguarded() {
        let outcome = check(
            r"
int get(/*@null@*/ int *p)
{
    return *p;
}
",
        );
        assert_eq!(kinds(&outcome), vec![DiagKind::NullDeref]);
    }

    #[test]
    fn test_malloc_result_checked_before_use() {
        let outcome = check(
            r#"
int fill(void)
{
    char *p = malloc(16);
    if (p == NULL) {
        return 1;
    }
    *p = 'a';
    return 0;
}
"#,
        );
        assert_clean(&outcome);
    }

    #[test]
    fn test_malloc_result_used_unchecked() {
        let outcome = check(
            r#"
int fill(void)
{
    char *p = malloc(16);
    *p = 'a';
    return 0;
}
"#,
        );
        assert_eq!(kinds(&outcome), vec![DiagKind::NullDeref]);
    }

    #[test]
    fn test_unreachable_after_return() {
        let outcome = check(
            r"
int f(int n)
{
    return n;
    n = n + 1;
}
",
        );
        assert_eq!(kinds(&outcome), vec![DiagKind::UnreachableCode]);
    }

    #[test]
    fn test_case_fallthrough_reported() {
        let outcome = check(
            r"
int pick(int n)
{
    int r = 0;
    switch (n) {
    case 0:
        r = 1;
    case 1:
        r = 2;
        break;
    default:
        r = 3;
        break;
    }
    return r;
}
",
        );
        assert_eq!(kinds(&outcome), vec![DiagKind::CaseFallthrough]);
    }

    #[test]
    fn test_unknown_callee_is_unconstrained() {
        // helper has no contract, so calling it may define anything reachable
        let outcome = check(
            r"
int f(void)
{
    int x;
    helper(&x);
    return x;
}
",
        );
        assert_clean(&outcome);
    }

    #[test]
    fn test_prototype_contract_applies() {
        let outcome = check(
            r"
/*@exits@*/ void die(void);

int f(int n)
{
    if (n < 0) {
        die();
    }
    return n;
}
",
        );
        assert_clean(&outcome);
    }

    #[test]
    fn test_enum_switch_missing_member() {
        let outcome = check(
            r"
enum color { RED, GREEN, BLUE };

int f(enum color c)
{
    switch (c) {
    case RED:
        return 1;
    case GREEN:
        return 2;
    }
    return 0;
}
",
        );
        assert_eq!(kinds(&outcome), vec![DiagKind::MissingCase]);
    }

    #[test]
    fn test_global_documented_in_clause() {
        let outcome = check(
            r"
static int counter = 0;

int bump(void) /*@globals counter@*/ /*@modifies counter@*/
{
    counter = counter + 1;
    return counter;
}
",
        );
        assert_clean(&outcome);
    }

    #[test]
    fn test_abstract_typedef_hides_arithmetic() {
        let outcome = check(
            r"
/*@abstract@*/ typedef int handle;

int raw(handle h)
{
    return h + 1;
}
",
        );
        assert!(kinds(&outcome).contains(&DiagKind::AbstractTypeOp));
    }

    #[test]
    fn test_for_loop_with_decl_init() {
        let outcome = check(
            r"
int sum(int n)
{
    int total = 0;
    for (int i = 0; i < n; i++) {
        total += i;
    }
    return total;
}
",
        );
        assert_clean(&outcome);
    }

    #[test]
    fn test_io_error_names_path() {
        let mut driver = Driver::new(AnalyzerOptions::default());
        let err = driver
            .check_file(Path::new("/nonexistent/input.c"))
            .expect_err("missing file");
        assert!(matches!(err, DriverError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/input.c"));
    }
}
