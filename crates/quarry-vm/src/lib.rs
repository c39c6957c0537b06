//! Backtracking interpreter for compiled quarry rules.
//!
//! [`RuleIter`] executes a [`quarry_bytecode::Rule`] against a
//! [`quarry_core::Store`], yielding one variable assignment per call to
//! `next`. Execution is single-threaded and cooperative; the only
//! suspension point is the yield back to the caller.

mod engine;

pub use engine::{NoopTracer, PrintTracer, Reg, RuleIter, Tracer};
