use super::*;
use crate::diagnostics::DiagKind;
use crate::storage::{DefState, NullState};
use pretty_assertions::assert_eq;

fn possibly_null_ptr(az: &mut Analyzer, name: &str) {
    declare_local(az, name, int_ptr());
    let id = az.ref_for_symbol(name).unwrap();
    az.refs.state_mut(id).def = DefState::Defined;
    az.refs.state_mut(id).null = NullState::PossiblyNull;
}

#[test]
fn test_unguarded_deref_flagged() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    possibly_null_ptr(&mut az, "p");

    let p = az.make_identifier("p", span(3));
    az.make_deref(p, span(3));

    let kinds: Vec<DiagKind> = az.reporter.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagKind::NullDeref]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_guarded_deref_is_clean() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    possibly_null_ptr(&mut az, "p");

    // if (p != NULL) { *p; }
    let p = az.make_identifier("p", span(3));
    let zero = az.make_int_lit(0, span(3));
    let cond = az.make_binary("!=", p, zero, span(3));
    let cond = az.make_condition(cond);

    let branch = az.begin_then(&cond);
    let p2 = az.make_identifier("p", span(4));
    let deref = az.make_deref(p2, span(4));
    let body = az.make_expr_stmt(deref, span(4));
    az.make_if(cond, body, branch, span(3)).unwrap();

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_bare_pointer_condition_guards() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    possibly_null_ptr(&mut az, "p");

    // if (p) { *p; }
    let p = az.make_identifier("p", span(3));
    let cond = az.make_condition(p);
    let branch = az.begin_then(&cond);
    let p2 = az.make_identifier("p", span(4));
    let deref = az.make_deref(p2, span(4));
    let body = az.make_expr_stmt(deref, span(4));
    az.make_if(cond, body, branch, span(3)).unwrap();

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_early_return_establishes_not_null() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    possibly_null_ptr(&mut az, "p");

    // if (p == NULL) return; *p;
    let p = az.make_identifier("p", span(3));
    let zero = az.make_int_lit(0, span(3));
    let cond = az.make_binary("==", p, zero, span(3));
    let cond = az.make_condition(cond);

    let branch = az.begin_then(&cond);
    let ret = az.make_return(None, span(3));
    az.make_if(cond, ret, branch, span(3)).unwrap();

    let p2 = az.make_identifier("p", span(5));
    az.make_deref(p2, span(5));

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_guard_dies_with_branch() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    possibly_null_ptr(&mut az, "p");

    // if (p != NULL) { } *p;  -- the guard does not outlive the branch
    let p = az.make_identifier("p", span(3));
    let zero = az.make_int_lit(0, span(3));
    let cond = az.make_binary("!=", p, zero, span(3));
    let cond = az.make_condition(cond);
    let branch = az.begin_then(&cond);
    let zero_stmt = az.make_int_lit(0, span(4));
    let body = az.make_expr_stmt(zero_stmt, span(4));
    az.make_if(cond, body, branch, span(3)).unwrap();

    let p2 = az.make_identifier("p", span(5));
    az.make_deref(p2, span(5));

    let kinds: Vec<DiagKind> = az.reporter.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagKind::NullDeref]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_assignment_invalidates_guard() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    possibly_null_ptr(&mut az, "p");
    possibly_null_ptr(&mut az, "q");

    // if (p != NULL) { p = q; *p; }
    let p = az.make_identifier("p", span(3));
    let zero = az.make_int_lit(0, span(3));
    let cond = az.make_binary("!=", p, zero, span(3));
    let cond = az.make_condition(cond);

    let branch = az.begin_then(&cond);
    let lhs = az.make_identifier("p", span(4));
    let rhs = az.make_identifier("q", span(4));
    az.make_assign("=", lhs, rhs, span(4));
    let p2 = az.make_identifier("p", span(5));
    let deref = az.make_deref(p2, span(5));
    let body = az.make_expr_stmt(deref, span(5));
    az.make_if(cond, body, branch, span(3)).unwrap();

    let kinds: Vec<DiagKind> = az.reporter.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagKind::NullDeref]);
    az.symbols.exit_scope(tok).unwrap();
}
