//! Per-instruction iteration state.
//!
//! A parallel array with one entry per instruction; redo evaluations
//! resume from here. The set walks keep their stacks inline up to 16
//! frames and spill to the heap beyond that.

use quarry_core::{Id, TableId, TableRecord};
use smallvec::SmallVec;

/// Iteration state, one variant per stateful instruction kind.
#[derive(Clone, Debug, Default)]
pub enum OpCtx<'s> {
    #[default]
    None,
    Select(SelectCtx<'s>),
    With(WithCtx),
    SubSet(SubSetCtx),
    SuperSet(SuperSetCtx),
    Each(EachCtx),
    SetJmp(SetJmpCtx),
}

/// Resolved filter, fixed at the first evaluation of an instruction so
/// that reified registers do not change the pattern on redo.
#[derive(Clone, Copy, Debug)]
pub struct Pattern {
    pub id: Id,
    /// Predicate and object are the same wildcard register: only columns
    /// whose two halves are equal match.
    pub same_pair: bool,
    pub wildcard: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct SelectCtx<'s> {
    pub pattern: Pattern,
    pub records: &'s [TableRecord],
    pub rec: usize,
    pub column: i32,
    /// The output register was pre-bound; the op degrades to a constraint
    /// check on that table.
    pub bound: Option<TableId>,
}

#[derive(Clone, Copy, Debug)]
pub struct WithCtx {
    pub pattern: Pattern,
    pub table: TableId,
    /// -1 marks a reflexive transitive-self match.
    pub column: i32,
}

#[derive(Clone, Debug, Default)]
pub struct SubSetCtx {
    pub stack: SmallVec<[SubSetFrame; 16]>,
}

/// One level of the downward walk: the table set of the current node,
/// a record cursor, a row cursor, and whether rows are being yielded or
/// expanded into their own sub-trees.
#[derive(Clone, Debug)]
pub struct SubSetFrame {
    pub records: SmallVec<[TableRecord; 4]>,
    pub rec: usize,
    pub row: u32,
    pub expanding: bool,
}

#[derive(Clone, Debug, Default)]
pub struct SuperSetCtx {
    pub stack: SmallVec<[SuperSetFrame; 16]>,
}

/// One level of the upward walk: the table being scanned and the column
/// of the edge taken.
#[derive(Clone, Copy, Debug)]
pub struct SuperSetFrame {
    pub table: TableId,
    pub column: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct EachCtx {
    pub table: TableId,
    pub row: u32,
    pub end: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct SetJmpCtx {
    pub label: i32,
}
