use super::*;
use crate::diagnostics::DiagKind;
use crate::flow::ExitKind;
use pretty_assertions::assert_eq;

#[test]
fn test_code_after_return_unreachable() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    let init = az.make_int_lit(1, span(2));
    az.make_decl("x", Some(init), span(2));

    let ret = az.make_return(None, span(3));
    let x = az.make_identifier("x", span(4));
    let stmt = az.make_expr_stmt(x, span(4));
    let list = az.concat(ret, stmt);

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::UnreachableCode));
    assert_eq!(list.summary.exit, ExitKind::MustReturn);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_label_after_return_is_reachable() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let ret = az.make_return(None, span(3));
    let label = az.make_label("out", span(4));
    az.concat(ret, label);

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_if_else_both_return() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    let init = az.make_int_lit(1, span(2));
    az.make_decl("x", Some(init), span(2));

    let x = az.make_identifier("x", span(3));
    let cond = az.make_condition(x);
    let mut branch = az.begin_then(&cond);
    let then_ret = az.make_return(None, span(4));
    az.begin_else(&mut branch, &cond).unwrap();
    let else_ret = az.make_return(None, span(6));
    let node = az
        .make_if_else(cond, then_ret, else_ret, branch, span(3))
        .unwrap();

    assert_eq!(node.summary.exit, ExitKind::MustReturn);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_one_arm_returning_may_exit() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    let init = az.make_int_lit(1, span(2));
    az.make_decl("x", Some(init), span(2));

    let x = az.make_identifier("x", span(3));
    let cond = az.make_condition(x);
    let branch = az.begin_then(&cond);
    let then_ret = az.make_return(None, span(4));
    let node = az.make_if(cond, then_ret, branch, span(3)).unwrap();

    assert_eq!(node.summary.exit, ExitKind::MayExit);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_branch_states_join_to_maybe_undefined() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "c", CType::Int);
    let init = az.make_int_lit(1, span(1));
    az.make_decl("c", Some(init), span(1));
    declare_local(&mut az, "x", CType::Int);
    az.make_decl("x", None, span(2));

    // if (c) x = 1;  -- x defined on one path only
    let c = az.make_identifier("c", span(3));
    let cond = az.make_condition(c);
    let branch = az.begin_then(&cond);
    let lhs = az.make_identifier("x", span(4));
    let rhs = az.make_int_lit(1, span(4));
    let asg = az.make_assign("=", lhs, rhs, span(4));
    let body = az.make_expr_stmt(asg, span(4));
    az.make_if(cond, body, branch, span(3)).unwrap();

    let x = az.make_identifier("x", span(6));
    let one = az.make_int_lit(1, span(6));
    az.make_binary("+", x, one, span(6));

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::UseBeforeDefinition));
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_suspected_infinite_loop() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "i", CType::Int);
    declare_local(&mut az, "y", CType::Int);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("i", Some(init), span(2));
    let init = az.make_int_lit(0, span(2));
    az.make_decl("y", Some(init), span(2));

    // while (i < 10) { y = y + 1; }
    let i = az.make_identifier("i", span(3));
    let ten = az.make_int_lit(10, span(3));
    let cond = az.make_binary("<", i, ten, span(3));
    let cond = az.make_condition(cond);

    let lt = az.begin_loop(&cond);
    let y = az.make_identifier("y", span(4));
    let one = az.make_int_lit(1, span(4));
    let sum = az.make_binary("+", y, one, span(4));
    let ylhs = az.make_identifier("y", span(4));
    let asg = az.make_assign("=", ylhs, sum, span(4));
    let body = az.make_expr_stmt(asg, span(4));
    az.make_while(cond, body, lt, span(3)).unwrap();

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::SuspectedInfiniteLoop));
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_loop_modifying_condition_is_clean() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "i", CType::Int);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("i", Some(init), span(2));

    // while (i < 10) { i++; }
    let i = az.make_identifier("i", span(3));
    let ten = az.make_int_lit(10, span(3));
    let cond = az.make_binary("<", i, ten, span(3));
    let cond = az.make_condition(cond);

    let lt = az.begin_loop(&cond);
    let i2 = az.make_identifier("i", span(4));
    let inc = az.make_postfix("++", i2, span(4));
    let body = az.make_expr_stmt(inc, span(4));
    az.make_while(cond, body, lt, span(3)).unwrap();

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_loop_with_break_is_clean() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "i", CType::Int);
    declare_local(&mut az, "y", CType::Int);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("i", Some(init), span(2));
    let init = az.make_int_lit(0, span(2));
    az.make_decl("y", Some(init), span(2));

    // while (i < 10) { y = 1; break; }
    let i = az.make_identifier("i", span(3));
    let ten = az.make_int_lit(10, span(3));
    let cond = az.make_binary("<", i, ten, span(3));
    let cond = az.make_condition(cond);

    let lt = az.begin_loop(&cond);
    let ylhs = az.make_identifier("y", span(4));
    let one = az.make_int_lit(1, span(4));
    let asg = az.make_assign("=", ylhs, one, span(4));
    let stmt = az.make_expr_stmt(asg, span(4));
    let brk = az.make_break(span(5));
    let body = az.concat(stmt, brk);
    az.make_while(cond, body, lt, span(3)).unwrap();

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_forever_loop_blocks_fallthrough() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "y", CType::Int);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("y", Some(init), span(2));

    // while (1) { y = 1; }
    let one = az.make_int_lit(1, span(3));
    let cond = az.make_condition(one);
    let lt = az.begin_loop(&cond);
    let ylhs = az.make_identifier("y", span(4));
    let v = az.make_int_lit(1, span(4));
    let asg = az.make_assign("=", ylhs, v, span(4));
    let body = az.make_expr_stmt(asg, span(4));
    let node = az.make_while(cond, body, lt, span(3)).unwrap();

    // no infinite-loop warning for a deliberate constant condition
    assert!(az.reporter.diagnostics().is_empty());
    assert!(node.summary.exit.must_escape());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_empty_if_body_flagged() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    let init = az.make_int_lit(1, span(2));
    az.make_decl("x", Some(init), span(2));

    let x = az.make_identifier("x", span(3));
    let cond = az.make_condition(x);
    let branch = az.begin_then(&cond);
    let body = crate::expr::ExprNode::empty(span(3));
    az.make_if(cond, body, branch, span(3)).unwrap();

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::EmptyBody));
    az.symbols.exit_scope(tok).unwrap();
}
