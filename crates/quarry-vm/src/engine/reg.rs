//! Tagged register slots.
//!
//! Whether a slot holds a table slice or a single entity is structural
//! (from the owning variable's kind), but a table slice of count 1 reads
//! as an entity, and either representation can appear in either position
//! on demand.

use quarry_core::{Entity, Store, TableRange, WILDCARD};

/// One register slot. An unbound slot reads as the wildcard entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Reg {
    #[default]
    Unbound,
    Entity(Entity),
    /// `count == 0` spans the whole table.
    Range(TableRange),
}

impl Reg {
    /// Entity view of the slot; the wildcard when no single entity is
    /// addressed.
    pub fn entity(self, store: &Store) -> Entity {
        match self {
            Self::Unbound => WILDCARD,
            Self::Entity(e) => e,
            Self::Range(r) if r.count == 1 => {
                store.table(r.table).entities()[r.offset as usize]
            }
            Self::Range(_) => WILDCARD,
        }
    }

    /// Table view of the slot; an entity binding resolves to its home row.
    pub fn range(self, store: &Store) -> Option<TableRange> {
        match self {
            Self::Unbound => None,
            Self::Entity(e) => store.entity_record(e).map(|rec| TableRange {
                table: rec.table,
                offset: rec.row,
                count: 1,
            }),
            Self::Range(r) => Some(r),
        }
    }

    pub fn is_bound(self) -> bool {
        !matches!(self, Self::Unbound)
    }
}
