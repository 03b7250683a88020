/*! Contract and storage annotations.
 *
 * Annotations ride in `/*@ ... @*/` comments. On a parameter or declaration they qualify one
 * storage location; after a function signature they attach whole-function clauses such as
 * `globals` and `modifies`.
 */

use cvet_core::contract::{ParamContract, ParamMode};
use cvet_core::storage::{AliasKind, Exposure, NullState};
use cvet_core::symtab::Symbol;

#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Ownership transfers with the value.
    Only,
    /// The holder keeps a reference without taking ownership.
    Keep,
    /// Must not alias any other argument.
    Unique,
    /// Will not be modified through this reference.
    Observer,
    /// Written by the callee; need not be defined before the call.
    Out,
    /// Argument expression must be side-effect free.
    Sef,
    /// Returned to the caller.
    Returned,
    /// May meaningfully be null.
    Null,
    /// Must not be null.
    NotNull,
    /// Declares an abstract type (on a typedef).
    Abstract,
    /// The abstract type's value can change through shared references.
    Mutable,
    Immutable,
    Globals(Vec<String>),
    Modifies(Vec<String>),
    PrintfLike,
    ScanfLike,
    MessageLike,
    /// The function never returns normally.
    Exits,
    Unknown(String),
}

/// Parse the body of one annotation comment, delimiters included.
pub fn parse_annotation(raw: &str) -> Annotation {
    let body = raw
        .trim_start_matches("/*@")
        .trim_end_matches("@*/")
        .trim();
    let (head, rest) = match body.split_once(char::is_whitespace) {
        Some((h, r)) => (h, r.trim()),
        None => (body, ""),
    };

    match head {
        "only" => Annotation::Only,
        "keep" => Annotation::Keep,
        "unique" => Annotation::Unique,
        "observer" => Annotation::Observer,
        "out" => Annotation::Out,
        "sef" => Annotation::Sef,
        "returned" => Annotation::Returned,
        "null" => Annotation::Null,
        "notnull" => Annotation::NotNull,
        "abstract" => Annotation::Abstract,
        "mutable" => Annotation::Mutable,
        "immutable" => Annotation::Immutable,
        "globals" => Annotation::Globals(split_targets(rest)),
        "modifies" => Annotation::Modifies(split_targets(rest)),
        "printflike" => Annotation::PrintfLike,
        "scanflike" => Annotation::ScanfLike,
        "messagelike" => Annotation::MessageLike,
        "exits" | "noreturn" => Annotation::Exits,
        _ => Annotation::Unknown(body.to_string()),
    }
}

fn split_targets(rest: &str) -> Vec<String> {
    rest.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

impl Annotation {
    /// Fold a parameter annotation into its contract entry.
    pub fn apply_to_param(&self, p: ParamContract) -> ParamContract {
        match self {
            Annotation::Only => p.with_mode(ParamMode::Only),
            Annotation::Keep => p.with_mode(ParamMode::Keep),
            Annotation::Unique => p.with_mode(ParamMode::Unique),
            Annotation::Observer => p.with_mode(ParamMode::Observer),
            Annotation::Out => p.with_mode(ParamMode::Out),
            Annotation::Sef => p.with_mode(ParamMode::Sef),
            Annotation::Returned => p.with_mode(ParamMode::Returned),
            Annotation::NotNull => p.not_null(),
            Annotation::Null => {
                let mut p = p;
                p.null_ok = true;
                p
            }
            _ => p,
        }
    }

    /// Seed a declared symbol's storage state from a declaration annotation.
    pub fn seed_symbol(&self, sym: &mut Symbol) {
        match self {
            Annotation::Only => sym.alias = AliasKind::Only,
            Annotation::Keep => sym.alias = AliasKind::Keep,
            Annotation::Unique => sym.alias = AliasKind::Unique,
            Annotation::Observer => sym.exposure = Exposure::Observer,
            Annotation::Null => sym.null = NullState::PossiblyNull,
            Annotation::NotNull => sym.null = NullState::NotNull,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bare_qualifiers() {
        assert_eq!(parse_annotation("/*@only@*/"), Annotation::Only);
        assert_eq!(parse_annotation("/*@ observer @*/"), Annotation::Observer);
        assert_eq!(parse_annotation("/*@notnull@*/"), Annotation::NotNull);
    }

    #[test]
    fn test_globals_clause() {
        assert_eq!(
            parse_annotation("/*@globals errno_count, log_level@*/"),
            Annotation::Globals(vec!["errno_count".to_string(), "log_level".to_string()])
        );
    }

    #[test]
    fn test_modifies_clause_keeps_stars_and_phrases() {
        assert_eq!(
            parse_annotation("/*@modifies *dst, file system state@*/"),
            Annotation::Modifies(vec!["*dst".to_string(), "file system state".to_string()])
        );
    }

    #[test]
    fn test_empty_modifies_means_modifies_nothing() {
        assert_eq!(parse_annotation("/*@modifies@*/"), Annotation::Modifies(vec![]));
    }

    #[test]
    fn test_unknown_annotation_preserved() {
        assert_eq!(
            parse_annotation("/*@frobnicate x@*/"),
            Annotation::Unknown("frobnicate x".to_string())
        );
    }
}
