//! Entity handles and component identifiers.
//!
//! An [`Entity`] is a 64-bit opaque handle: the low 32 bits are the index,
//! bits 32..48 carry the generation. An [`Id`] names a component in a table
//! type: either a plain entity index, or a pair with bit 63 set and the
//! predicate/object indices packed into the two 32-bit halves.

use serde::{Deserialize, Serialize};

/// Bit that marks an [`Id`] as a pair.
const PAIR_BIT: u64 = 1 << 63;

/// Mask for the index half of an entity handle.
const INDEX_MASK: u64 = 0xFFFF_FFFF;

/// Shift of the generation bits in an entity handle.
const GENERATION_SHIFT: u64 = 32;

/// Opaque entity handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

/// The builtin wildcard entity, matching any concrete value in a filter.
pub const WILDCARD: Entity = Entity(1);

/// The builtin "this" entity, standing in for the implicit subject.
pub const THIS: Entity = Entity(2);

/// The builtin IsA relation used for inheritance expansion.
pub const ISA: Entity = Entity(3);

/// First index handed out to user entities; lower indices are reserved.
pub(crate) const FIRST_USER_INDEX: u32 = 8;

impl Entity {
    /// Reconstruct a handle from raw bits.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits of the handle.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    pub(crate) fn from_parts(index: u32, generation: u16) -> Self {
        Self(u64::from(index) | (u64::from(generation) << GENERATION_SHIFT))
    }

    /// Index half, used for comparison in filter masks.
    pub fn index(self) -> u32 {
        (self.0 & INDEX_MASK) as u32
    }

    /// Generation of the handle.
    pub fn generation(self) -> u16 {
        (self.0 >> GENERATION_SHIFT) as u16
    }

    /// The null entity. Registers use this as the wildcard-read value.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self(0)
    }
}

/// Component identifier: a plain entity index or a pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(u64);

impl Id {
    /// Id of a plain component. Generation bits are stripped so that ids
    /// compare by index.
    pub fn entity(e: Entity) -> Self {
        Self(u64::from(e.index()))
    }

    /// Id of a pair. The predicate index lands in the high half (capped to
    /// 31 bits below the pair flag), the object index in the low half.
    pub fn pair(pred: Entity, obj: Entity) -> Self {
        let pred = u64::from(pred.index()) & 0x7FFF_FFFF;
        Self(PAIR_BIT | (pred << 32) | u64::from(obj.index()))
    }

    /// Pair id built from raw index halves, for pattern construction.
    pub fn pair_indices(pred: u32, obj: u32) -> Self {
        Self(PAIR_BIT | (u64::from(pred & 0x7FFF_FFFF) << 32) | u64::from(obj))
    }

    /// Reconstruct from raw bits.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Whether this id denotes a pair.
    pub fn is_pair(self) -> bool {
        self.0 & PAIR_BIT != 0
    }

    /// Predicate index of a pair, or the plain index itself.
    pub fn pred_index(self) -> u32 {
        if self.is_pair() {
            ((self.0 >> 32) & 0x7FFF_FFFF) as u32
        } else {
            (self.0 & INDEX_MASK) as u32
        }
    }

    /// Object index of a pair. Zero for plain ids.
    pub fn obj_index(self) -> u32 {
        if self.is_pair() {
            (self.0 & INDEX_MASK) as u32
        } else {
            0
        }
    }

    /// Whether either half of this id is the wildcard index.
    pub fn has_wildcard(self) -> bool {
        if self.is_pair() {
            self.pred_index() == WILDCARD.index() || self.obj_index() == WILDCARD.index()
        } else {
            self.pred_index() == WILDCARD.index()
        }
    }

    /// Whether `self` is an instance of `pattern`.
    ///
    /// A wildcard half in the pattern matches any concrete value. A plain
    /// wildcard pattern matches plain ids only; pairs are matched through
    /// the `(*, *)` pattern.
    pub fn matches(self, pattern: Id) -> bool {
        if pattern.is_pair() {
            if !self.is_pair() {
                return false;
            }
            let pred_ok = pattern.pred_index() == WILDCARD.index()
                || pattern.pred_index() == self.pred_index();
            let obj_ok = pattern.obj_index() == WILDCARD.index()
                || pattern.obj_index() == self.obj_index();
            pred_ok && obj_ok
        } else if pattern.pred_index() == WILDCARD.index() {
            !self.is_pair()
        } else {
            !self.is_pair() && self.0 == pattern.0
        }
    }
}

bitflags::bitflags! {
    /// Predicate attributes consulted by the rule compiler and the
    /// transitive closure engine.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct Attributes: u8 {
        /// The relation chains: `P(a, b), P(b, c) => P(a, c)`.
        const TRANSITIVE = 1 << 0;
        /// The relation is reflexive in addition to transitive.
        const TRANSITIVE_SELF = 1 << 1;
        /// The predicate is not subject to implicit IsA substitution.
        const FINAL = 1 << 2;
    }
}

#[cfg(test)]
mod entity_tests {
    use super::*;

    #[test]
    fn entity_parts_round_trip() {
        let e = Entity::from_parts(42, 7);
        assert_eq!(e.index(), 42);
        assert_eq!(e.generation(), 7);
        assert_eq!(Entity::from_bits(e.to_bits()), e);
    }

    #[test]
    fn pair_encoding() {
        let pred = Entity::from_parts(10, 3);
        let obj = Entity::from_parts(11, 1);
        let id = Id::pair(pred, obj);
        assert!(id.is_pair());
        assert_eq!(id.pred_index(), 10);
        assert_eq!(id.obj_index(), 11);
    }

    #[test]
    fn plain_id_strips_generation() {
        let a = Id::entity(Entity::from_parts(9, 0));
        let b = Id::entity(Entity::from_parts(9, 5));
        assert_eq!(a, b);
        assert!(!a.is_pair());
        assert_eq!(a.pred_index(), 9);
    }

    #[test]
    fn wildcard_matching() {
        let p = Entity::from_parts(10, 0);
        let o = Entity::from_parts(11, 0);
        let id = Id::pair(p, o);
        assert!(id.matches(Id::pair(p, o)));
        assert!(id.matches(Id::pair(p, WILDCARD)));
        assert!(id.matches(Id::pair(WILDCARD, o)));
        assert!(id.matches(Id::pair(WILDCARD, WILDCARD)));
        assert!(!id.matches(Id::pair(o, WILDCARD)));
        // Plain wildcard does not match pairs.
        assert!(!id.matches(Id::entity(WILDCARD)));

        let plain = Id::entity(p);
        assert!(plain.matches(Id::entity(WILDCARD)));
        assert!(plain.matches(Id::entity(p)));
        assert!(!plain.matches(Id::pair(WILDCARD, WILDCARD)));
    }
}
