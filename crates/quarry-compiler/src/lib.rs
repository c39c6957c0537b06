//! Term analysis and instruction emission for quarry rules.
//!
//! The compiler takes a parsed [`Term`] list and a [`quarry_core::Store`]
//! (consulted for predicate attributes and literal-subject tables) and
//! produces a [`quarry_bytecode::Rule`]: dependency-ordered variables plus
//! a backtracking instruction program.

mod compile;
mod error;
mod term;

pub use compile::compile;
pub use error::RuleError;
pub use term::{Term, TermOper, TermValue};
