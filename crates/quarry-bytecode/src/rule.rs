//! The compiled rule artifact.

use serde::{Deserialize, Serialize};

use quarry_core::Entity;

use crate::ops::{Filter, Program, VarId};
use crate::vars::{VarKind, VarTable};

/// Subject position of a term after compilation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubjectRef {
    /// A fixed entity.
    Literal(Entity),
    /// The Table-kind variable bound for the subject, plus the Entity-kind
    /// twin when one exists.
    Var {
        table: VarId,
        entity: Option<VarId>,
    },
}

/// A compiled rule: the program, its variable table, and the per-term
/// subject lookup used when populating yields. Immutable after
/// compilation; iterators never mutate it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rule {
    program: Program,
    vars: VarTable,
    subjects: Vec<SubjectRef>,
    filters: Vec<Filter>,
}

impl Rule {
    pub fn new(
        program: Program,
        vars: VarTable,
        subjects: Vec<SubjectRef>,
        filters: Vec<Filter>,
    ) -> Self {
        Self {
            program,
            vars,
            subjects,
            filters,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn vars(&self) -> &VarTable {
        &self.vars
    }

    /// Per-term subject lookup, indexed by term.
    pub fn subjects(&self) -> &[SubjectRef] {
        &self.subjects
    }

    /// Per-term resolved filters, indexed by term; the yield step
    /// substitutes register values into these to report matched ids.
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn term_count(&self) -> usize {
        self.subjects.len()
    }

    /// The root variable, when the rule has a variable subject. Named
    /// subject variables are Table-kind and sort first (anonymous
    /// variables are only ever appended), so the root is variable 0.
    pub fn root(&self) -> Option<VarId> {
        (!self.vars.is_empty()
            && self.vars.get(0).kind == VarKind::Table
            && !self.vars.get(0).anonymous)
            .then_some(0)
    }
}
