//! Core data structures for the quarry rule engine.
//!
//! Two layers:
//! - **Identifiers**: [`Entity`] handles and [`Id`] component identifiers,
//!   including the pair encoding and wildcard matching.
//! - **Storage**: the [`Store`], grouping entities into typed [`Table`]s
//!   and maintaining the id index the rule engine queries.

mod entity;
mod store;


pub use entity::{Attributes, Entity, ISA, Id, THIS, WILDCARD};
pub use store::{EntityRecord, Store, Table, TableId, TableRange, TableRecord};
