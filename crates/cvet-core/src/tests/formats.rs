use super::*;
use crate::diagnostics::DiagKind;
use pretty_assertions::assert_eq;

fn kinds(az: &Analyzer) -> Vec<DiagKind> {
    az.reporter.diagnostics().iter().map(|d| d.kind).collect()
}

#[test]
fn test_printf_matching_args_clean() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let fmt = az.make_string_lit("value %d is %s", span(3));
    let n = az.make_int_lit(42, span(3));
    let s = az.make_string_lit("ok", span(3));
    az.make_call("printf", vec![fmt, n, s], span(3));

    assert_eq!(kinds(&az), vec![]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_printf_too_few_args() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let fmt = az.make_string_lit("%d %d", span(3));
    let n = az.make_int_lit(1, span(3));
    az.make_call("printf", vec![fmt, n], span(3));

    assert_eq!(kinds(&az), vec![DiagKind::FormatArgMissing]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_printf_extra_args() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let fmt = az.make_string_lit("%d", span(3));
    let a = az.make_int_lit(1, span(3));
    let b = az.make_int_lit(2, span(3));
    az.make_call("printf", vec![fmt, a, b], span(3));

    assert_eq!(kinds(&az), vec![DiagKind::FormatArgExtra]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_printf_type_mismatch() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let fmt = az.make_string_lit("%s", span(3));
    let n = az.make_int_lit(7, span(3));
    az.make_call("printf", vec![fmt, n], span(3));

    assert_eq!(kinds(&az), vec![DiagKind::FormatArgMismatch]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_printf_unknown_code() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let fmt = az.make_string_lit("%y", span(3));
    az.make_call("printf", vec![fmt], span(3));

    assert_eq!(kinds(&az), vec![DiagKind::FormatCodeUnknown]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_printf_star_width_consumes_int() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");

    let fmt = az.make_string_lit("%*d", span(3));
    let w = az.make_int_lit(8, span(3));
    let n = az.make_int_lit(42, span(3));
    az.make_call("printf", vec![fmt, w, n], span(3));

    assert_eq!(kinds(&az), vec![]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_scanf_defines_target() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    az.make_decl("x", None, span(2));

    // scanf("%d", &x) defines x
    let fmt = az.make_string_lit("%d", span(3));
    let x = az.make_identifier("x", span(3));
    let addr = az.make_addr(x, span(3));
    az.make_call("scanf", vec![fmt, addr], span(3));

    let x2 = az.make_identifier("x", span(4));
    let one = az.make_int_lit(1, span(4));
    az.make_binary("+", x2, one, span(4));

    assert_eq!(kinds(&az), vec![]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_scanf_suppressed_conversion_takes_no_arg() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "x", CType::Int);
    az.make_decl("x", None, span(2));

    let fmt = az.make_string_lit("%*d %d", span(3));
    let x = az.make_identifier("x", span(3));
    let addr = az.make_addr(x, span(3));
    az.make_call("scanf", vec![fmt, addr], span(3));

    assert_eq!(kinds(&az), vec![]);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_long_modifier_checked() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "n", CType::Long);
    let init = az.make_int_lit(0, span(2));
    az.make_decl("n", Some(init), span(2));

    // %d with a long argument is a mismatch; %ld is fine
    let fmt = az.make_string_lit("%d", span(3));
    let n = az.make_identifier("n", span(3));
    az.make_call("printf", vec![fmt, n], span(3));
    assert_eq!(kinds(&az), vec![DiagKind::FormatArgMismatch]);

    let fmt = az.make_string_lit("%ld", span(4));
    let n = az.make_identifier("n", span(4));
    az.make_call("printf", vec![fmt, n], span(4));
    assert_eq!(kinds(&az).len(), 1);
    az.symbols.exit_scope(tok).unwrap();
}

#[test]
fn test_nonconstant_format_skipped() {
    let mut az = analyzer();
    let tok = open_fn(&mut az, "f");
    declare_local(&mut az, "fmt", CType::Pointer(Box::new(CType::Char)));
    let hello = az.make_string_lit("hello", span(2));
    az.make_decl("fmt", Some(hello), span(2));

    let f = az.make_identifier("fmt", span(3));
    let extra = az.make_int_lit(1, span(3));
    az.make_call("printf", vec![f, extra], span(3));

    // the variable's contents are not scanned, even though its initializer is known here
    assert!(!kinds(&az).contains(&DiagKind::FormatArgExtra));
    az.symbols.exit_scope(tok).unwrap();
}
