use serde::{Deserialize, Serialize};

/// Compile-time-known value attached to an expression node, if determinable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum ConstValue {
    #[default]
    Unknown,
    Int(i64),
    Char(char),
    Double(f64),
    Str(String),
}

impl ConstValue {
    pub fn is_known(&self) -> bool {
        !matches!(self, ConstValue::Unknown)
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, ConstValue::Int(0))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConstValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Truth value for conditions, when statically known.
    pub fn truth(&self) -> Option<bool> {
        match self {
            ConstValue::Int(v) => Some(*v != 0),
            ConstValue::Char(c) => Some(*c != '\0'),
            ConstValue::Double(d) => Some(*d != 0.0),
            ConstValue::Str(_) => Some(true),
            ConstValue::Unknown => None,
        }
    }

    pub fn apply_binary(op: &str, lhs: &ConstValue, rhs: &ConstValue) -> ConstValue {
        if let (Some(a), Some(b)) = (lhs.as_int(), rhs.as_int()) {
            let v = match op {
                "+" => a.checked_add(b),
                "-" => a.checked_sub(b),
                "*" => a.checked_mul(b),
                "/" => (b != 0).then(|| a / b),
                "%" => (b != 0).then(|| a % b),
                "<<" => (0..64).contains(&b).then(|| a << b),
                ">>" => (0..64).contains(&b).then(|| a >> b),
                "&" => Some(a & b),
                "|" => Some(a | b),
                "^" => Some(a ^ b),
                "<" => Some((a < b) as i64),
                ">" => Some((a > b) as i64),
                "<=" => Some((a <= b) as i64),
                ">=" => Some((a >= b) as i64),
                "==" => Some((a == b) as i64),
                "!=" => Some((a != b) as i64),
                "&&" => Some(((a != 0) && (b != 0)) as i64),
                "||" => Some(((a != 0) || (b != 0)) as i64),
                _ => None,
            };
            return v.map(ConstValue::Int).unwrap_or(ConstValue::Unknown);
        }

        if let (ConstValue::Double(a), ConstValue::Double(b)) = (lhs, rhs) {
            let v = match op {
                "+" => Some(a + b),
                "-" => Some(a - b),
                "*" => Some(a * b),
                "/" => Some(a / b),
                _ => None,
            };
            return v.map(ConstValue::Double).unwrap_or(ConstValue::Unknown);
        }

        // adjacent string literal concatenation
        if op == "++" {
            if let (ConstValue::Str(a), ConstValue::Str(b)) = (lhs, rhs) {
                return ConstValue::Str(format!("{}{}", a, b));
            }
        }

        ConstValue::Unknown
    }

    pub fn apply_unary(op: &str, operand: &ConstValue) -> ConstValue {
        match (op, operand.as_int()) {
            ("-", Some(v)) => v.checked_neg().map(ConstValue::Int).unwrap_or_default(),
            ("+", Some(v)) => ConstValue::Int(v),
            ("~", Some(v)) => ConstValue::Int(!v),
            ("!", _) => operand
                .truth()
                .map(|t| ConstValue::Int((!t) as i64))
                .unwrap_or_default(),
            ("-", None) => match operand {
                ConstValue::Double(d) => ConstValue::Double(-d),
                _ => ConstValue::Unknown,
            },
            _ => ConstValue::Unknown,
        }
    }
}

impl std::fmt::Display for ConstValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstValue::Unknown => write!(f, "?"),
            ConstValue::Int(v) => write!(f, "{}", v),
            ConstValue::Char(c) => write!(f, "'{}'", c),
            ConstValue::Double(d) => write!(f, "{}", d),
            ConstValue::Str(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_arith() {
        let a = ConstValue::Int(6);
        let b = ConstValue::Int(7);
        assert_eq!(ConstValue::apply_binary("*", &a, &b), ConstValue::Int(42));
        assert_eq!(
            ConstValue::apply_binary("/", &a, &ConstValue::Int(0)),
            ConstValue::Unknown
        );
    }

    #[test]
    fn test_string_concat() {
        let a = ConstValue::Str("ab".into());
        let b = ConstValue::Str("cd".into());
        assert_eq!(
            ConstValue::apply_binary("++", &a, &b),
            ConstValue::Str("abcd".into())
        );
    }

    #[test]
    fn test_unknown_propagates() {
        assert_eq!(
            ConstValue::apply_binary("+", &ConstValue::Int(1), &ConstValue::Unknown),
            ConstValue::Unknown
        );
    }
}
