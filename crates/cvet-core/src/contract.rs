/*! Function contracts.
 *
 * A contract describes what a call may read, write, and return: per-parameter modes, globals the
 * function touches, a modifies list, null behavior, format-string role, and exit behavior. A call
 * to a function with no contract is unconstrained and may modify anything reachable from its
 * arguments.
 */

use crate::flow::ExitKind;
use crate::types::CType;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ParamMode {
    #[default]
    None,
    /// Argument must be side-effect free.
    Sef,
    /// Written by the callee, need not be defined at the call.
    Out,
    /// Returned to the caller; aliasing with the result is expected.
    Returned,
    /// Ownership transfers to the callee.
    Only,
    /// Must not alias any other argument.
    Unique,
    /// Callee keeps a reference but caller retains ownership.
    Keep,
    /// Callee will not modify anything reachable from it.
    Observer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamContract {
    pub name: String,
    pub ty: CType,
    pub mode: ParamMode,
    /// Argument must be non-null at the call.
    pub not_null: bool,
    /// Argument may meaningfully be null.
    pub null_ok: bool,
}

impl ParamContract {
    pub fn plain(name: impl Into<String>, ty: CType) -> Self {
        ParamContract {
            name: name.into(),
            ty,
            mode: ParamMode::None,
            not_null: false,
            null_ok: false,
        }
    }

    pub fn with_mode(mut self, mode: ParamMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FormatKind {
    #[default]
    None,
    Printf,
    Scanf,
    Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionContract {
    pub name: String,
    pub params: Vec<ParamContract>,
    pub returns: CType,
    pub variadic: bool,
    /// Result may be null.
    pub result_null: bool,
    pub globals: Vec<String>,
    /// None means unconstrained; Some(empty) means modifies nothing.
    pub modifies: Option<Vec<String>>,
    pub format: FormatKind,
    /// Zero-based index of the format-string parameter.
    pub format_arg: usize,
    pub exits: ExitKind,
}

impl FunctionContract {
    pub fn new(name: impl Into<String>, returns: CType) -> Self {
        FunctionContract {
            name: name.into(),
            params: Vec::new(),
            returns,
            variadic: false,
            result_null: false,
            globals: Vec::new(),
            modifies: Some(Vec::new()),
            format: FormatKind::None,
            format_arg: 0,
            exits: ExitKind::NeverEscape,
        }
    }

    pub fn param(mut self, p: ParamContract) -> Self {
        self.params.push(p);
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn result_null(mut self) -> Self {
        self.result_null = true;
        self
    }

    pub fn formats(mut self, kind: FormatKind, arg: usize) -> Self {
        self.format = kind;
        self.format_arg = arg;
        self
    }

    pub fn modifies(mut self, targets: &[&str]) -> Self {
        self.modifies = Some(targets.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn unconstrained_modifies(mut self) -> Self {
        self.modifies = None;
        self
    }

    pub fn exits(mut self, kind: ExitKind) -> Self {
        self.exits = kind;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractTable {
    map: IndexMap<String, FunctionContract>,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contracts for the standard library subset the checker knows about.
    pub fn with_builtins() -> Self {
        let mut t = ContractTable::new();
        let char_ptr = CType::Pointer(Box::new(CType::Char));
        let void_ptr = CType::Pointer(Box::new(CType::Void));
        let file_state = "file system state";

        t.insert(
            FunctionContract::new("printf", CType::Int)
                .param(ParamContract::plain("format", char_ptr.clone()).not_null())
                .variadic()
                .formats(FormatKind::Printf, 0)
                .modifies(&[file_state]),
        );
        t.insert(
            FunctionContract::new("fprintf", CType::Int)
                .param(ParamContract::plain("stream", void_ptr.clone()).not_null())
                .param(ParamContract::plain("format", char_ptr.clone()).not_null())
                .variadic()
                .formats(FormatKind::Printf, 1)
                .modifies(&[file_state]),
        );
        t.insert(
            FunctionContract::new("sprintf", CType::Int)
                .param(
                    ParamContract::plain("s", char_ptr.clone())
                        .with_mode(ParamMode::Out)
                        .not_null(),
                )
                .param(ParamContract::plain("format", char_ptr.clone()).not_null())
                .variadic()
                .formats(FormatKind::Printf, 1)
                .modifies(&["s"]),
        );
        t.insert(
            FunctionContract::new("snprintf", CType::Int)
                .param(
                    ParamContract::plain("s", char_ptr.clone())
                        .with_mode(ParamMode::Out)
                        .not_null(),
                )
                .param(ParamContract::plain("n", CType::ULong))
                .param(ParamContract::plain("format", char_ptr.clone()).not_null())
                .variadic()
                .formats(FormatKind::Printf, 2)
                .modifies(&["s"]),
        );
        t.insert(
            FunctionContract::new("scanf", CType::Int)
                .param(ParamContract::plain("format", char_ptr.clone()).not_null())
                .variadic()
                .formats(FormatKind::Scanf, 0)
                .modifies(&[file_state]),
        );
        t.insert(
            FunctionContract::new("sscanf", CType::Int)
                .param(ParamContract::plain("s", char_ptr.clone()).not_null())
                .param(ParamContract::plain("format", char_ptr.clone()).not_null())
                .variadic()
                .formats(FormatKind::Scanf, 1),
        );
        t.insert(
            FunctionContract::new("malloc", void_ptr.clone())
                .param(ParamContract::plain("size", CType::ULong))
                .result_null(),
        );
        t.insert(
            FunctionContract::new("calloc", void_ptr.clone())
                .param(ParamContract::plain("count", CType::ULong))
                .param(ParamContract::plain("size", CType::ULong))
                .result_null(),
        );
        t.insert(
            FunctionContract::new("free", CType::Void)
                .param(ParamContract::plain("ptr", void_ptr.clone()).with_mode(ParamMode::Only)),
        );
        t.insert(
            FunctionContract::new("exit", CType::Void)
                .param(ParamContract::plain("status", CType::Int))
                .exits(ExitKind::MustExit),
        );
        t.insert(FunctionContract::new("abort", CType::Void).exits(ExitKind::MustExit));
        t.insert(
            FunctionContract::new("strlen", CType::ULong).param(
                ParamContract::plain("s", char_ptr.clone())
                    .with_mode(ParamMode::Observer)
                    .not_null(),
            ),
        );
        t.insert(
            FunctionContract::new("strcpy", char_ptr.clone())
                .param(
                    ParamContract::plain("dst", char_ptr.clone())
                        .with_mode(ParamMode::Out)
                        .not_null(),
                )
                .param(
                    ParamContract::plain("src", char_ptr.clone())
                        .with_mode(ParamMode::Observer)
                        .not_null(),
                )
                .modifies(&["dst"]),
        );
        t.insert(
            FunctionContract::new("strcmp", CType::Int)
                .param(
                    ParamContract::plain("a", char_ptr.clone())
                        .with_mode(ParamMode::Observer)
                        .not_null(),
                )
                .param(
                    ParamContract::plain("b", char_ptr.clone())
                        .with_mode(ParamMode::Observer)
                        .not_null(),
                ),
        );
        t.insert(
            FunctionContract::new("memcpy", void_ptr.clone())
                .param(
                    ParamContract::plain("dst", void_ptr.clone())
                        .with_mode(ParamMode::Unique)
                        .not_null(),
                )
                .param(
                    ParamContract::plain("src", void_ptr.clone())
                        .with_mode(ParamMode::Unique)
                        .not_null(),
                )
                .param(ParamContract::plain("n", CType::ULong))
                .modifies(&["dst"]),
        );
        t.insert(
            FunctionContract::new("getchar", CType::Int).modifies(&[file_state]),
        );
        t
    }

    pub fn insert(&mut self, contract: FunctionContract) {
        self.map.insert(contract.name.clone(), contract);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionContract> {
        self.map.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FunctionContract> {
        self.map.values()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_include_printf_family() {
        let t = ContractTable::with_builtins();
        assert_eq!(t.get("printf").map(|c| c.format), Some(FormatKind::Printf));
        assert_eq!(t.get("fprintf").map(|c| c.format_arg), Some(1));
        assert_eq!(t.get("scanf").map(|c| c.format), Some(FormatKind::Scanf));
    }

    #[test]
    fn test_exit_contract() {
        let t = ContractTable::with_builtins();
        assert_eq!(t.get("exit").map(|c| c.exits), Some(ExitKind::MustExit));
    }

    #[test]
    fn test_malloc_result_may_be_null() {
        let t = ContractTable::with_builtins();
        assert!(t.get("malloc").is_some_and(|c| c.result_null));
    }
}
