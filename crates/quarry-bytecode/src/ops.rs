//! Typed instructions of the rule program.

use quarry_core::Entity;
use serde::{Deserialize, Serialize};

/// Register id: a variable's position in the variable table.
pub type VarId = u8;

/// Jump target of the terminal failure edge.
pub const HALT: i32 = -1;

/// Instruction kinds. A closed set dispatched exhaustively by the VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    /// Prologue; succeeds once, fails on redo.
    Input,
    /// Finds tables matching a filter pair; iterates tables, then columns.
    Select,
    /// Applies a filter to a table already bound to a register.
    With,
    /// Lazily enumerates transitive predecessors of an object.
    SubSet,
    /// Lazily enumerates transitive successors of a subject.
    SuperSet,
    /// Writes a literal or register value into a register, once.
    Store,
    /// Forwards each entity of a bound table, one per redo.
    Each,
    /// Saves a jump label (pass on first eval, fail on redo) for Jump.
    SetJmp,
    /// Transfers control to the label stashed by a prior SetJmp.
    Jump,
    /// Inverts the result of the enclosed operation.
    Not,
    /// Epilogue; always fails to force backtracking after a match.
    Yield,
}

impl OpKind {
    /// Lower-case mnemonic, at most 8 characters.
    pub fn name(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Select => "select",
            Self::With => "with",
            Self::SubSet => "subset",
            Self::SuperSet => "superset",
            Self::Store => "store",
            Self::Each => "each",
            Self::SetJmp => "setjmp",
            Self::Jump => "jump",
            Self::Not => "not",
            Self::Yield => "yield",
        }
    }
}

/// One position of a filter pair: a constant entity or a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterSlot {
    Entity(Entity),
    Var(VarId),
}

/// Filter pair of an instruction. `obj` is absent for plain components.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub pred: FilterSlot,
    pub obj: Option<FilterSlot>,
}

impl Filter {
    pub fn single(pred: FilterSlot) -> Self {
        Self { pred, obj: None }
    }

    pub fn pair(pred: FilterSlot, obj: FilterSlot) -> Self {
        Self {
            pred,
            obj: Some(obj),
        }
    }
}

/// A single instruction.
///
/// `on_pass`/`on_fail` are absolute instruction indices; [`HALT`] on the
/// fail edge terminates the iteration. For `Jump`, `on_pass` holds the
/// index of the paired `SetJmp` whose stashed label the dispatcher follows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Op {
    pub kind: OpKind,
    pub filter: Option<Filter>,
    /// Constant subject entity, where the subject is not a register.
    pub subject: Option<Entity>,
    pub on_pass: i32,
    pub on_fail: i32,
    /// Register frame the instruction reads and writes.
    pub frame: u16,
    /// Index of the source term, or -1 for bookkeeping instructions.
    pub term: i32,
    pub r_in: Option<VarId>,
    pub r_out: Option<VarId>,
}

impl Op {
    /// A bookkeeping instruction of the given kind with no filter.
    pub fn bare(kind: OpKind, frame: u16) -> Self {
        Self {
            kind,
            filter: None,
            subject: None,
            on_pass: 0,
            on_fail: HALT,
            frame,
            term: -1,
            r_in: None,
            r_out: None,
        }
    }
}

/// The compiled instruction array.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Program {
    ops: Vec<Op>,
}

impl Program {
    pub fn new(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Number of register frames the program addresses.
    pub fn frame_count(&self) -> usize {
        self.ops.iter().map(|op| op.frame as usize + 1).max().unwrap_or(0)
    }
}
