//! Instruction set and compiled rule artifact for quarry.
//!
//! This crate contains:
//! - The typed instruction set and program array ([`OpKind`], [`Op`],
//!   [`Program`]).
//! - The variable table data model ([`Variable`], [`VarTable`]).
//! - The compiled [`Rule`], consumed by the VM.
//! - A stable, human-readable program [`dump`].

mod dump;
mod ops;
mod rule;
mod vars;

#[cfg(test)]
mod dump_tests;

pub use dump::{NameResolver, dump};
pub use ops::{Filter, FilterSlot, HALT, Op, OpKind, Program, VarId};
pub use rule::{Rule, SubjectRef};
pub use vars::{DEPTH_UNSET, MAX_VARIABLE_COUNT, VarKind, VarTable, Variable};
