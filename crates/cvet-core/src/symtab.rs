/*! Scoped symbol table with balance-checked scope tokens.
 *
 * Scopes nest with the block structure of the checked program. Entering a scope yields a token
 * that must be passed back on exit; a mismatched token is an internal invariant violation, not a
 * user diagnostic.
 */

use crate::storage::{AliasKind, Exposure, NullState};
use crate::types::CType;
use crate::{CheckError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageClass {
    Local,
    Param { index: u32 },
    Global,
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub ty: CType,
    pub class: StorageClass,
    pub alias: AliasKind,
    pub null: NullState,
    pub exposure: Exposure,
}

impl Symbol {
    pub fn local(name: impl Into<String>, ty: CType) -> Self {
        Symbol {
            name: name.into(),
            ty,
            class: StorageClass::Local,
            alias: AliasKind::Unknown,
            null: NullState::Unknown,
            exposure: Exposure::Unknown,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.class, StorageClass::Global | StorageClass::Static)
    }
}

#[must_use = "scope tokens must be passed back to exit_scope"]
#[derive(Debug)]
pub struct ScopeToken {
    depth: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    scopes: Vec<IndexMap<String, Symbol>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        // file scope is always present
        SymbolTable {
            scopes: vec![IndexMap::new()],
        }
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn enter_scope(&mut self) -> ScopeToken {
        self.scopes.push(IndexMap::new());
        ScopeToken {
            depth: self.scopes.len(),
        }
    }

    pub fn exit_scope(&mut self, token: ScopeToken) -> Result<()> {
        if token.depth != self.scopes.len() || self.scopes.len() <= 1 {
            return Err(CheckError::ScopeImbalance(format!(
                "exit at depth {} with token for depth {}",
                self.scopes.len(),
                token.depth
            )));
        }
        self.scopes.pop();
        Ok(())
    }

    /// Redeclaration in the same scope shadows silently; the parser decides whether to complain.
    pub fn declare(&mut self, symbol: Symbol) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(symbol.name.clone(), symbol);
        }
    }

    pub fn declare_global(&mut self, symbol: Symbol) {
        self.scopes[0].insert(symbol.name.clone(), symbol);
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }

    /// Scope depth of the innermost declaration of `name`, for alias scoping.
    pub fn scope_of(&self, name: &str) -> Option<u32> {
        for (i, scope) in self.scopes.iter().enumerate().rev() {
            if scope.contains_key(name) {
                return Some(i as u32);
            }
        }
        None
    }
}
