/*! Format string checking for printf-, scanf-, and message-style functions.
 *
 * Runs only when the format string is a compile-time constant. Each conversion specifier is
 * scanned for flags, width, precision and length modifiers, then unified with the corresponding
 * argument. Scanf conversions expect a pointer to the converted type and honor `*` suppression;
 * `%n` writes through its argument in both dialects.
 */

use crate::context::Analyzer;
use crate::contract::FormatKind;
use crate::diagnostics::DiagKind;
use crate::expr::ExprNode;
use crate::loc::SourceSpan;
use crate::storage::RefKind;
use crate::types::CType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Length {
    None,
    Short,
    Long,
    LongLong,
    LongDouble,
}

#[derive(Debug)]
struct Spec {
    conv: char,
    length: Length,
    /// `*` field width consumes an int argument (printf).
    star_width: bool,
    star_precision: bool,
    /// `%*d` in scanf consumes no argument.
    suppressed: bool,
}

impl Analyzer {
    /// Check the argument list of a call against its constant format string.
    /// `call` is the node under construction; writes through scanf/`%n` targets are
    /// recorded into it.
    pub fn check_format_args(
        &mut self,
        call: &mut ExprNode,
        kind: FormatKind,
        fname: &str,
        fmt: &str,
        args: &[ExprNode],
        loc: SourceSpan,
    ) {
        let mut next_arg = 0usize;
        let mut starved = false;
        let mut chars = fmt.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                continue;
            }

            let Some(spec) = parse_spec(&mut chars, kind) else {
                self.reporter.report(
                    DiagKind::FormatCodeUnknown,
                    loc,
                    format!("unrecognized format code in {} format string", fname),
                );
                continue;
            };

            if !valid_conversion(kind, spec.conv) {
                self.reporter.report(
                    DiagKind::FormatCodeUnknown,
                    loc,
                    format!("unknown conversion %{} in {} format string", spec.conv, fname),
                );
                continue;
            }

            if spec.suppressed {
                continue;
            }

            // star width/precision each take an int argument ahead of the converted one
            let mut extra = 0;
            if spec.star_width {
                extra += 1;
            }
            if spec.star_precision {
                extra += 1;
            }
            for _ in 0..extra {
                match args.get(next_arg) {
                    Some(arg) => {
                        self.expect_format_type(&CType::Int, arg, spec.conv, fname, loc);
                        next_arg += 1;
                    }
                    None => {
                        starved = true;
                        break;
                    }
                }
            }
            if starved {
                break;
            }

            let Some(arg) = args.get(next_arg) else {
                starved = true;
                break;
            };

            let expected = expected_type(kind, &spec);
            self.expect_format_type(&expected, arg, spec.conv, fname, loc);

            if writes_through_arg(kind, spec.conv) {
                self.record_format_write(call, arg, loc);
            }

            next_arg += 1;
        }

        if starved {
            self.reporter.report(
                DiagKind::FormatArgMissing,
                loc,
                format!("{} format string expects more arguments than supplied", fname),
            );
            return;
        }

        if next_arg < args.len() && kind != FormatKind::Scanf {
            self.reporter.report(
                DiagKind::FormatArgExtra,
                loc,
                format!(
                    "{} called with {} argument{} unused by its format string",
                    fname,
                    args.len() - next_arg,
                    if args.len() - next_arg == 1 { "" } else { "s" }
                ),
            );
        }
    }

    fn expect_format_type(
        &mut self,
        expected: &CType,
        arg: &ExprNode,
        conv: char,
        fname: &str,
        loc: SourceSpan,
    ) {
        if format_matches(&self.types, expected, arg, conv) {
            return;
        }
        self.reporter.report(
            DiagKind::FormatArgMismatch,
            loc,
            format!(
                "%{} in {} format string expects {}, given {}",
                conv, fname, expected, arg.ty
            ),
        );
    }

    /// Scanf conversions and `%n` define the storage their pointer argument reaches.
    fn record_format_write(&mut self, call: &mut ExprNode, arg: &ExprNode, loc: SourceSpan) {
        if !self.refs.is_meaningful(arg.sref) {
            return;
        }

        // &x arguments write x itself; other pointers write their pointee
        let target = match self.refs.kind(arg.sref).clone() {
            RefKind::Addr { base } => base,
            _ => {
                let pointee = arg.ty.pointee().cloned().unwrap_or(CType::Unknown);
                self.refs.intern(RefKind::Deref { base: arg.sref }, pointee)
            }
        };
        self.check_set(call, target, loc);
    }
}

fn parse_spec(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, kind: FormatKind) -> Option<Spec> {
    let mut star_width = false;
    let mut star_precision = false;
    let mut suppressed = false;

    // scanf assignment suppression comes first
    if kind == FormatKind::Scanf && chars.peek() == Some(&'*') {
        chars.next();
        suppressed = true;
    }

    while matches!(chars.peek(), Some('-' | '+' | ' ' | '#' | '0')) {
        chars.next();
    }

    if chars.peek() == Some(&'*') {
        chars.next();
        star_width = kind != FormatKind::Scanf;
    } else {
        while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
            chars.next();
        }
    }

    if chars.peek() == Some(&'.') {
        chars.next();
        if chars.peek() == Some(&'*') {
            chars.next();
            star_precision = true;
        } else {
            while matches!(chars.peek(), Some(c) if c.is_ascii_digit()) {
                chars.next();
            }
        }
    }

    let mut length = Length::None;
    match chars.peek() {
        Some('h') => {
            chars.next();
            if chars.peek() == Some(&'h') {
                chars.next();
            }
            length = Length::Short;
        }
        Some('l') => {
            chars.next();
            if chars.peek() == Some(&'l') {
                chars.next();
                length = Length::LongLong;
            } else {
                length = Length::Long;
            }
        }
        Some('L') => {
            chars.next();
            length = Length::LongDouble;
        }
        _ => {}
    }

    let conv = chars.next()?;

    // scan sets run to the closing bracket
    if conv == '[' {
        let mut prev = conv;
        for c in chars.by_ref() {
            if c == ']' && prev != '[' && prev != '^' {
                break;
            }
            prev = c;
        }
    }

    Some(Spec {
        conv,
        length,
        star_width,
        star_precision,
        suppressed,
    })
}

fn valid_conversion(kind: FormatKind, conv: char) -> bool {
    match kind {
        FormatKind::Printf => matches!(
            conv,
            'd' | 'i' | 'u' | 'o' | 'x' | 'X' | 'f' | 'e' | 'E' | 'g' | 'G' | 'c' | 's' | 'p' | 'n'
        ),
        FormatKind::Scanf => matches!(
            conv,
            'd' | 'i' | 'u' | 'o' | 'x' | 'X' | 'f' | 'e' | 'E' | 'g' | 'G' | 'c' | 's' | 'n' | '['
        ),
        FormatKind::Message => matches!(conv, 's' | 'd' | 'q'),
        FormatKind::None => false,
    }
}

fn expected_type(kind: FormatKind, spec: &Spec) -> CType {
    let char_ptr = || CType::Pointer(Box::new(CType::Char));
    let base = match (kind, spec.conv) {
        (FormatKind::Message, 's' | 'q') => return char_ptr(),
        (FormatKind::Message, _) => return CType::Int,
        (_, 'd' | 'i') => match spec.length {
            Length::Long => CType::Long,
            Length::LongLong => CType::LongLong,
            Length::Short if kind == FormatKind::Scanf => CType::Short,
            _ => CType::Int,
        },
        (_, 'u' | 'o' | 'x' | 'X') => match spec.length {
            Length::Long => CType::ULong,
            Length::LongLong => CType::ULongLong,
            Length::Short if kind == FormatKind::Scanf => CType::UShort,
            _ => CType::UInt,
        },
        (_, 'f' | 'e' | 'E' | 'g' | 'G') => {
            if kind == FormatKind::Scanf {
                match spec.length {
                    Length::Long | Length::LongDouble => CType::Double,
                    _ => CType::Float,
                }
            } else {
                CType::Double
            }
        }
        (_, 'c') => {
            if kind == FormatKind::Scanf {
                CType::Char
            } else {
                CType::Int
            }
        }
        (_, 's' | '[') => return char_ptr(),
        (_, 'p') => return CType::Pointer(Box::new(CType::Void)),
        (_, 'n') => CType::Int,
        _ => CType::Unknown,
    };

    if kind == FormatKind::Scanf || spec.conv == 'n' {
        CType::Pointer(Box::new(base))
    } else {
        base
    }
}

fn writes_through_arg(kind: FormatKind, conv: char) -> bool {
    conv == 'n' || (kind == FormatKind::Scanf && conv != '%')
}

fn format_matches(
    registry: &crate::types::TypeRegistry,
    expected: &CType,
    arg: &ExprNode,
    conv: char,
) -> bool {
    let actual = arg.ty.decay();
    if expected.is_unknown() || actual.is_unknown() {
        return true;
    }

    // %p takes any object pointer; a literal zero is the null pointer constant
    if conv == 'p' {
        return actual.is_pointer() || arg.is_null_literal();
    }

    if expected.is_pointer() && arg.is_null_literal() {
        return true;
    }

    if expected.is_arithmetic() && actual.is_arithmetic() {
        // variadic passing promotes, so compare promoted shapes
        let e = expected.promote();
        let a = actual.promote();
        return e == a || (e.is_floating() && a.is_floating());
    }

    registry.match_types(expected, &actual)
}
