/*! Symbolic storage references and their flow state.
 *
 * A `StorageRef` describes an addressable location (`x`, `p->next`, `a[3]`, `*q`). References are
 * interned in a `RefTable` and identified by `RefId`; the structural part never changes after
 * interning, while the flow state (definedness, null state, alias kind, exposure) lives in a
 * parallel table that is snapshotted around branches and joined at merge points.
 */

use crate::types::CType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefId(pub u32);

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ref{}", self.0)
    }
}

pub const UNKNOWN_REF: RefId = RefId(0);
pub const NOTHING_REF: RefId = RefId(1);
pub const CONST_REF: RefId = RefId(2);
pub const RESULT_REF: RefId = RefId(3);
pub const INTERNAL_STATE_REF: RefId = RefId(4);
pub const SYSTEM_STATE_REF: RefId = RefId(5);

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefKind {
    Unknown,
    Nothing,
    Const,
    Local { name: String, scope: u32 },
    Param { name: String, index: u32 },
    Global { name: String },
    Field { base: RefId, name: String },
    Element { base: RefId, index: Option<i64> },
    Deref { base: RefId },
    Addr { base: RefId },
    Unconstrained { name: String },
    Result,
    InternalState,
    SystemState,
}

impl RefKind {
    pub fn base(&self) -> Option<RefId> {
        match self {
            RefKind::Field { base, .. }
            | RefKind::Element { base, .. }
            | RefKind::Deref { base }
            | RefKind::Addr { base } => Some(*base),
            _ => None,
        }
    }
}

/// Definedness lattice for a storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DefState {
    #[default]
    Unknown,
    /// Storage exists but reading it is never meaningful.
    Unuseable,
    Undefined,
    MaybeUndefined,
    /// Pointer allocated; pointee contents not yet written.
    Allocated,
    /// Some reachable parts written, not all.
    PartialDefined,
    Defined,
    /// Defined, but may be overwritten without complaint.
    Partial,
    /// Released; reads are use-after-release.
    Dead,
    Killed,
    /// Undefined on one path, killed on another.
    UndefKilled,
}

impl DefState {
    pub fn is_defined(&self) -> bool {
        matches!(
            self,
            DefState::Defined | DefState::Partial | DefState::PartialDefined
        )
    }

    pub fn is_dead(&self) -> bool {
        matches!(self, DefState::Dead | DefState::Killed | DefState::UndefKilled)
    }

    /// Advance on a write. Never regresses except through an explicit kill.
    pub fn advance(&self) -> DefState {
        match self {
            DefState::Dead | DefState::Killed | DefState::UndefKilled => DefState::Partial,
            DefState::Allocated => DefState::Defined,
            _ => DefState::Defined,
        }
    }

    pub fn join(self, other: DefState) -> DefState {
        use DefState::*;
        if self == other {
            return self;
        }
        match (self, other) {
            (Unknown, _) | (_, Unknown) => Unknown,
            (Undefined, x) | (x, Undefined) if x.is_defined() => MaybeUndefined,
            (MaybeUndefined, x) | (x, MaybeUndefined) if x.is_defined() => MaybeUndefined,
            (Dead, x) | (x, Dead) if x.is_defined() => UndefKilled,
            (Killed, x) | (x, Killed) if x.is_defined() => UndefKilled,
            (Allocated, x) | (x, Allocated) if x.is_defined() => PartialDefined,
            (Undefined, Allocated) | (Allocated, Undefined) => Undefined,
            (a, b) if a.is_dead() && b.is_dead() => UndefKilled,
            (PartialDefined, x) | (x, PartialDefined) if x.is_defined() => PartialDefined,
            (Partial, Defined) | (Defined, Partial) => Partial,
            _ => MaybeUndefined,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NullState {
    #[default]
    Unknown,
    NotNull,
    PossiblyNull,
    DefinitelyNull,
}

impl NullState {
    pub fn join(self, other: NullState) -> NullState {
        if self == other {
            self
        } else if self == NullState::Unknown || other == NullState::Unknown {
            NullState::Unknown
        } else {
            NullState::PossiblyNull
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AliasKind {
    #[default]
    Unknown,
    /// Sole reference; holder must release.
    Only,
    Unique,
    /// Freshly allocated local storage.
    Fresh,
    Owned,
    Keep,
    Kept,
    Dependent,
    Shared,
    Temp,
    Static,
    Error,
}

impl AliasKind {
    /// Ownership already transferred away from the checked location.
    pub fn is_transferred(&self) -> bool {
        matches!(
            self,
            AliasKind::Only | AliasKind::Keep | AliasKind::Kept | AliasKind::Owned
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Exposure {
    #[default]
    Unknown,
    Exposed,
    Observer,
}

/// Buffer bookkeeping carried by pointer-valued refs and adjusted by pointer arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BufInfo {
    pub size: Option<i64>,
    pub len: Option<i64>,
    pub null_terminated: bool,
}

impl BufInfo {
    pub fn shifted(&self, delta: i64) -> BufInfo {
        BufInfo {
            size: self.size.map(|s| s - delta),
            len: self.len.map(|l| l - delta),
            null_terminated: self.null_terminated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlowState {
    pub def: DefState,
    pub null: NullState,
    pub alias: AliasKind,
    pub exposure: Exposure,
    pub buf: Option<BufInfo>,
}

impl FlowState {
    pub fn defined() -> Self {
        FlowState {
            def: DefState::Defined,
            ..Default::default()
        }
    }

    pub fn undefined() -> Self {
        FlowState {
            def: DefState::Undefined,
            ..Default::default()
        }
    }

    pub fn join(&self, other: &FlowState) -> FlowState {
        FlowState {
            def: self.def.join(other.def),
            null: self.null.join(other.null),
            alias: if self.alias == other.alias {
                self.alias
            } else {
                AliasKind::Unknown
            },
            exposure: if self.exposure == other.exposure {
                self.exposure
            } else {
                Exposure::Unknown
            },
            buf: if self.buf == other.buf { self.buf } else { None },
        }
    }
}

/// Snapshot of all flow states, taken before a branch and joined after.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    states: Vec<FlowState>,
}

#[derive(Debug, Clone, Default)]
pub struct RefTable {
    kinds: Vec<RefKind>,
    tys: Vec<CType>,
    states: Vec<FlowState>,
    interned: HashMap<RefKind, RefId>,
}

impl RefTable {
    pub fn new() -> Self {
        let mut table = RefTable::default();
        table.seed(RefKind::Unknown, CType::Unknown, FlowState::default());
        table.seed(RefKind::Nothing, CType::Void, FlowState::default());
        table.seed(RefKind::Const, CType::Unknown, FlowState::defined());
        table.seed(RefKind::Result, CType::Unknown, FlowState::defined());
        table.seed(RefKind::InternalState, CType::Unknown, FlowState::defined());
        table.seed(RefKind::SystemState, CType::Unknown, FlowState::defined());
        table
    }

    fn seed(&mut self, kind: RefKind, ty: CType, state: FlowState) {
        let id = RefId(self.kinds.len() as u32);
        self.interned.insert(kind.clone(), id);
        self.kinds.push(kind);
        self.tys.push(ty);
        self.states.push(state);
    }

    pub fn intern(&mut self, kind: RefKind, ty: CType) -> RefId {
        if let Some(id) = self.interned.get(&kind) {
            return *id;
        }

        let id = RefId(self.kinds.len() as u32);
        let initial = self.initial_state(&kind);
        self.interned.insert(kind.clone(), id);
        self.kinds.push(kind);
        self.tys.push(ty);
        self.states.push(initial);
        id
    }

    /// Derived refs start from their base's definedness: fields of a defined struct read fine,
    /// the pointee of a merely-allocated pointer does not.
    fn initial_state(&self, kind: &RefKind) -> FlowState {
        match kind {
            RefKind::Const | RefKind::Unconstrained { .. } => FlowState::defined(),
            RefKind::Field { base, .. } | RefKind::Element { base, .. } => {
                let base_state = self.state(*base);
                match base_state.def {
                    DefState::Defined | DefState::Partial => FlowState::defined(),
                    DefState::Allocated => FlowState::undefined(),
                    other => FlowState {
                        def: other,
                        ..Default::default()
                    },
                }
            }
            RefKind::Deref { base } => {
                let base_state = self.state(*base);
                match base_state.def {
                    DefState::Defined | DefState::Partial => FlowState::defined(),
                    DefState::Allocated => FlowState::undefined(),
                    other => FlowState {
                        def: other,
                        ..Default::default()
                    },
                }
            }
            RefKind::Addr { .. } => FlowState::defined(),
            _ => FlowState::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, id: RefId) -> &RefKind {
        &self.kinds[id.0 as usize]
    }

    pub fn ty(&self, id: RefId) -> &CType {
        &self.tys[id.0 as usize]
    }

    pub fn state(&self, id: RefId) -> &FlowState {
        &self.states[id.0 as usize]
    }

    pub fn state_mut(&mut self, id: RefId) -> &mut FlowState {
        &mut self.states[id.0 as usize]
    }

    pub fn base(&self, id: RefId) -> Option<RefId> {
        self.kind(id).base()
    }

    /// Walk `id`, base(id), base(base(id)), ... to the root.
    pub fn chain(&self, id: RefId) -> Vec<RefId> {
        let mut out = vec![id];
        let mut cur = id;
        while let Some(b) = self.base(cur) {
            if out.contains(&b) {
                break;
            }
            out.push(b);
            cur = b;
        }
        out
    }

    pub fn root(&self, id: RefId) -> RefId {
        *self.chain(id).last().unwrap_or(&id)
    }

    pub fn is_meaningful(&self, id: RefId) -> bool {
        !matches!(
            self.kind(id),
            RefKind::Unknown | RefKind::Nothing | RefKind::Const
        )
    }

    pub fn is_param_root(&self, id: RefId) -> bool {
        matches!(self.kind(self.root(id)), RefKind::Param { .. })
    }

    pub fn is_global_root(&self, id: RefId) -> bool {
        matches!(self.kind(self.root(id)), RefKind::Global { .. })
    }

    pub fn is_unconstrained(&self, id: RefId) -> bool {
        matches!(self.kind(id), RefKind::Unconstrained { .. })
    }

    pub fn is_internal_state(&self, id: RefId) -> bool {
        matches!(
            self.kind(id),
            RefKind::InternalState | RefKind::SystemState
        )
    }

    /// A ref is derived through a pointer or array access somewhere in its chain.
    pub fn is_indirect(&self, id: RefId) -> bool {
        self.chain(id)
            .iter()
            .any(|r| matches!(self.kind(*r), RefKind::Deref { .. } | RefKind::Element { .. }))
    }

    pub fn unparse(&self, id: RefId) -> String {
        match self.kind(id) {
            RefKind::Unknown => "?".to_string(),
            RefKind::Nothing => "nothing".to_string(),
            RefKind::Const => "constant".to_string(),
            RefKind::Local { name, .. }
            | RefKind::Param { name, .. }
            | RefKind::Global { name }
            | RefKind::Unconstrained { name } => name.clone(),
            RefKind::Field { base, name } => {
                if let RefKind::Deref { base: inner } = self.kind(*base) {
                    format!("{}->{}", self.unparse(*inner), name)
                } else {
                    format!("{}.{}", self.unparse(*base), name)
                }
            }
            RefKind::Element { base, index } => match index {
                Some(i) => format!("{}[{}]", self.unparse(*base), i),
                None => format!("{}[]", self.unparse(*base)),
            },
            RefKind::Deref { base } => format!("*{}", self.unparse(*base)),
            RefKind::Addr { base } => format!("&{}", self.unparse(*base)),
            RefKind::Result => "result".to_string(),
            RefKind::InternalState => "internal state".to_string(),
            RefKind::SystemState => "file system state".to_string(),
        }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            states: self.states.clone(),
        }
    }

    pub fn restore(&mut self, snap: &StateSnapshot) {
        for (i, s) in snap.states.iter().enumerate() {
            self.states[i] = s.clone();
        }
        // refs interned after the snapshot keep their current state
    }

    /// Join the current states with `other` in place (control-flow merge).
    pub fn join_with(&mut self, other: &StateSnapshot) {
        for (i, s) in other.states.iter().enumerate() {
            if i < self.states.len() {
                self.states[i] = self.states[i].join(s);
            }
        }
    }
}
