use super::*;
use crate::diagnostics::DiagKind;
use crate::types::EnumDefinition;
use pretty_assertions::assert_eq;

fn with_color_enum(az: &mut Analyzer) -> CType {
    let eid = az.types.add_enum(EnumDefinition {
        name: "color".to_string(),
        members: vec!["RED".to_string(), "GREEN".to_string(), "BLUE".to_string()],
    });
    CType::Enum(eid)
}

fn color_scrutinee(az: &mut Analyzer, ty: &CType) -> crate::expr::ExprNode {
    declare_local(az, "c", ty.clone());
    let init = az.make_identifier("RED", span(2));
    az.make_decl("c", Some(init), span(2));
    let c = az.make_identifier("c", span(3));
    az.make_condition(c)
}

#[test]
fn test_missing_case_without_default() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);

    let red = az.make_identifier("RED", span(4));
    let case_red = az.make_case(&mut sw, Some(red), None, span(4));
    let brk = az.make_break(span(5));
    let arm1 = az.concat(case_red, brk);

    let green = az.make_identifier("GREEN", span(6));
    let case_green = az.make_case(&mut sw, Some(green), Some(&arm1), span(6));
    let brk = az.make_break(span(7));
    let arm2 = az.concat(case_green, brk);

    let body = az.concat(arm1.clone(), arm2.clone());
    az.make_switch(scrutinee, body, sw, Some(&arm2), span(3));

    let diags = az.reporter.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].kind, DiagKind::MissingCase);
    assert!(diags[0].message.contains("BLUE"), "{}", diags[0].message);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_default_satisfies_exhaustiveness() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);

    let red = az.make_identifier("RED", span(4));
    let case_red = az.make_case(&mut sw, Some(red), None, span(4));
    let brk = az.make_break(span(5));
    let arm1 = az.concat(case_red, brk);

    let case_def = az.make_case(&mut sw, None, Some(&arm1), span(6));
    let brk = az.make_break(span(7));
    let arm2 = az.concat(case_def, brk);

    let body = az.concat(arm1, arm2.clone());
    az.make_switch(scrutinee, body, sw, Some(&arm2), span(3));

    assert!(az.reporter.diagnostics().is_empty());
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_arm_after_break_is_reachable() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("x", Some(init), span(2));
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);

    let red = az.make_identifier("RED", span(4));
    let case_red = az.make_case(&mut sw, Some(red), None, span(4));
    let brk = az.make_break(span(5));
    let arm1 = az.concat(case_red, brk);

    // case GREEN: x = 1; break;  -- the arm is a list led by its label
    let green = az.make_identifier("GREEN", span(6));
    let case_green = az.make_case(&mut sw, Some(green), Some(&arm1), span(6));
    let lhs = az.make_identifier("x", span(7));
    let one = az.make_int_lit(1, span(7));
    let asg = az.make_assign("=", lhs, one, span(7));
    let stmt = az.make_expr_stmt(asg, span(7));
    let arm2 = az.concat(case_green, stmt);
    let brk = az.make_break(span(8));
    let arm2 = az.concat(arm2, brk);

    az.concat(arm1, arm2);

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .all(|d| d.kind != DiagKind::UnreachableCode));
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_duplicate_case() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);

    let red = az.make_identifier("RED", span(4));
    let case1 = az.make_case(&mut sw, Some(red), None, span(4));
    let brk = az.make_break(span(5));
    let arm1 = az.concat(case1, brk);

    let red_again = az.make_identifier("RED", span(6));
    az.make_case(&mut sw, Some(red_again), Some(&arm1), span(6));

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::DuplicateCase));
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_case_fallthrough_flagged() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("x", Some(init), span(2));
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);

    // case RED: x = 1;   (no break)
    let red = az.make_identifier("RED", span(4));
    let case1 = az.make_case(&mut sw, Some(red), None, span(4));
    let lhs = az.make_identifier("x", span(5));
    let one = az.make_int_lit(1, span(5));
    let asg = az.make_assign("=", lhs, one, span(5));
    let stmt = az.make_expr_stmt(asg, span(5));
    let arm1 = az.concat(case1, stmt);

    let green = az.make_identifier("GREEN", span(6));
    az.make_case(&mut sw, Some(green), Some(&arm1), span(6));

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::CaseFallthrough));
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_stacked_case_labels_do_not_warn() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);

    // case RED: case GREEN: break;
    let red = az.make_identifier("RED", span(4));
    let case1 = az.make_case(&mut sw, Some(red), None, span(4));
    let green = az.make_identifier("GREEN", span(4));
    az.make_case(&mut sw, Some(green), Some(&case1), span(4));

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .all(|d| d.kind != DiagKind::CaseFallthrough));
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_case_outside_enum_members() {
    let mut az = analyzer();
    let ty = with_color_enum(&mut az);
    let tok = open_fn(&mut az, "f");
    let scrutinee = color_scrutinee(&mut az, &ty);

    let mut sw = az.begin_switch(&scrutinee);
    let stray = az.make_string_lit("RED", span(4));
    az.make_case(&mut sw, Some(stray), None, span(4));

    assert!(az
        .reporter
        .diagnostics()
        .iter()
        .any(|d| d.kind == DiagKind::TypeMismatch));
    az.symbols.exit_scope(tok).unwrap();
}
