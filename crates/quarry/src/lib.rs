//! Declarative rule engine over an entity-component store.
//!
//! A rule is a conjunction of [`Term`]s with variables, evaluated against
//! a [`Store`] by a backtracking virtual machine. Compile once, iterate
//! any number of times:
//!
//! ```
//! use quarry::{Term, compile, iter};
//!
//! let mut store = quarry::Store::new();
//! let likes = store.spawn_named("Likes");
//! let leia = store.spawn_named("Leia");
//! let han = store.spawn_named("HanSolo");
//! store.add_pair(leia, likes, han);
//!
//! let rule = compile(&store, &[Term::pair(likes, "_X")]).unwrap();
//! let mut it = iter(&rule, &store);
//! while it.next() {
//!     let who = it.entities()[0];
//!     assert_eq!(who, leia);
//! }
//! ```

pub use quarry_bytecode::{Filter, FilterSlot, Op, OpKind, Program, Rule, VarId, VarKind};
pub use quarry_compiler::{RuleError, Term, TermOper, TermValue, compile};
pub use quarry_core::{
    Attributes, Entity, EntityRecord, ISA, Id, Store, THIS, Table, TableId, TableRange,
    TableRecord, WILDCARD,
};
pub use quarry_vm::{NoopTracer, PrintTracer, RuleIter, Tracer};


/// Create an iterator over a compiled rule's matches. The rule holds no
/// store handle; the borrow taken here pins the store for the iterator's
/// lifetime.
pub fn iter<'r, 's>(rule: &'r Rule, store: &'s Store) -> RuleIter<'r, 's> {
    RuleIter::new(rule, store)
}

/// Human-readable form of a compiled program, resolving entity names
/// through the store. Stable for a given program.
pub fn rule_str(rule: &Rule, store: &Store) -> String {
    quarry_bytecode::dump(rule, &|e| store.name(e).map(str::to_string))
}
