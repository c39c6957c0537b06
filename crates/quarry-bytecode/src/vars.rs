//! Variable table of a compiled rule.
//!
//! Variables are held in an array indexed by a compact id; all
//! cross-references are ids, never pointers. The compiler sorts the table
//! and reassigns ids so that `id == position` always holds.

use serde::{Deserialize, Serialize};

use crate::ops::VarId;

/// Sentinel for a depth that has not been determined yet.
pub const DEPTH_UNSET: u32 = u32::MAX;

/// Maximum number of variables a rule may declare.
pub const MAX_VARIABLE_COUNT: usize = 256;

/// Binding kind of a variable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VarKind {
    /// Bound to a table slice. Every subject variable ends up Table-kind.
    Table,
    /// Bound to a single entity.
    Entity,
    /// Not yet classified; only occurs during compilation.
    Unknown,
}

/// One variable record. Two records may share a name: a subject variable
/// that is also used as a predicate or object has a Table and an Entity
/// record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub kind: VarKind,
    pub occurs: u32,
    pub depth: u32,
    /// Created by the compiler rather than named in a term.
    pub anonymous: bool,
}

/// The ordered variable table.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VarTable {
    vars: Vec<Variable>,
}

impl VarTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, id: VarId) -> &Variable {
        &self.vars[id as usize]
    }

    pub fn get_mut(&mut self, id: VarId) -> &mut Variable {
        &mut self.vars[id as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.vars.iter()
    }

    /// Find a variable by name and kind.
    pub fn find(&self, name: &str, kind: VarKind) -> Option<VarId> {
        self.vars
            .iter()
            .find(|v| v.kind == kind && v.name == name)
            .map(|v| v.id)
    }

    /// Append a record. The caller checks `MAX_VARIABLE_COUNT` first.
    pub fn push(&mut self, mut var: Variable) -> VarId {
        let id = self.vars.len() as VarId;
        var.id = id;
        self.vars.push(var);
        id
    }

    /// Sort records with the given comparator and reassign ids to match
    /// the new positions.
    pub fn sort_by(&mut self, cmp: impl FnMut(&Variable, &Variable) -> std::cmp::Ordering) {
        self.vars.sort_by(cmp);
        for (i, var) in self.vars.iter_mut().enumerate() {
            var.id = i as VarId;
        }
    }
}
