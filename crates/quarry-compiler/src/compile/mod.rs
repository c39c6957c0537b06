//! Rule compilation.
//!
//! Compilation runs in four phases:
//! 1. Variable scan: subject variables become Table records, predicate and
//!    object variables Entity records; the root is elected.
//! 2. Depth assignment: a worklist crawl from the root (and from the
//!    variables of literal-subject terms, which seed depth 0).
//! 3. Sort: Table before Entity, then ascending depth, descending
//!    occurrence count, descending discovery id; ids are reassigned.
//! 4. Emission: one instruction group per term, inline Each instructions
//!    for register reads, the epilogue Each pass and the final Yield.
//!
//! # Module Organization
//!
//! - `scan`: phases 1-3
//! - `emit`: phase 4

mod emit;
mod scan;

#[cfg(test)]
mod emit_tests;
#[cfg(test)]
mod scan_tests;

use quarry_bytecode::{Filter, Op, OpKind, Program, Rule, SubjectRef, VarId, VarKind, VarTable};
use quarry_core::{Entity, Store};

use crate::error::RuleError;
use crate::term::{Term, TermOper, TermValue};

/// Compiler state shared by the scan and emission phases.
pub struct Compiler<'a> {
    store: &'a Store,
    terms: &'a [Term],
    vars: VarTable,
    /// Name of the elected root variable, if any subject is a variable.
    root: Option<String>,
    ops: Vec<Op>,
    /// Tracks which registers carry a value, indexed by variable id.
    written: Vec<bool>,
    /// Per-term filters used to resolve yielded ids.
    filters: Vec<Filter>,
    frame: u16,
    anon: u32,
}

/// Compile a term list against a store into an executable rule.
pub fn compile(store: &Store, terms: &[Term]) -> Result<Rule, RuleError> {
    if terms.is_empty() {
        return Err(RuleError::NoTerms);
    }
    if terms.iter().all(|t| t.oper == TermOper::Not) {
        return Err(RuleError::OnlyNegatedTerms);
    }

    let mut compiler = Compiler {
        store,
        terms,
        vars: VarTable::new(),
        root: None,
        ops: Vec::new(),
        written: Vec::new(),
        filters: Vec::new(),
        frame: 0,
        anon: 0,
    };
    compiler.scan_variables()?;
    compiler.assign_depths()?;
    compiler.sort_vars();
    compiler.written = vec![false; compiler.vars.len()];
    compiler.emit_program()?;

    let subjects = compiler.subject_refs();
    Ok(Rule::new(
        Program::new(compiler.ops),
        compiler.vars,
        subjects,
        compiler.filters,
    ))
}

/// Subject position of a term during emission.
#[derive(Clone, Copy)]
enum SubjPos {
    Literal(Entity),
    Var {
        table: VarId,
        entity: Option<VarId>,
    },
}

impl Compiler<'_> {
    /// Append an instruction with default chaining: pass to the next
    /// instruction, fail to the previous one. The first instruction's fail
    /// edge is the terminal -1.
    fn push_op(&mut self, mut op: Op) -> usize {
        let index = self.ops.len();
        op.on_pass = index as i32 + 1;
        op.on_fail = index as i32 - 1;
        self.ops.push(op);
        index
    }

    /// Blank instruction in the current frame.
    fn op(&self, kind: OpKind) -> Op {
        Op {
            kind,
            filter: None,
            subject: None,
            on_pass: 0,
            on_fail: 0,
            frame: self.frame,
            term: -1,
            r_in: None,
            r_out: None,
        }
    }

    fn subject_pos(&self, term: &Term) -> SubjPos {
        match term.subject.var_name() {
            Some(name) => SubjPos::Var {
                table: self
                    .vars
                    .find(name, VarKind::Table)
                    .expect("subject variable without table record"),
                entity: self.vars.find(name, VarKind::Entity),
            },
            None => match &term.subject {
                TermValue::Entity(e) => SubjPos::Literal(*e),
                TermValue::Var(_) => unreachable!(),
            },
        }
    }

    fn subject_refs(&self) -> Vec<SubjectRef> {
        self.terms
            .iter()
            .map(|term| match self.subject_pos(term) {
                SubjPos::Literal(e) => SubjectRef::Literal(e),
                SubjPos::Var { table, entity } => SubjectRef::Var { table, entity },
            })
            .collect()
    }
}
