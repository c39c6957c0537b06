//! In-memory entity/table store.
//!
//! Entities live in tables; a table groups all entities sharing the same
//! ordered component-id vector. The store maintains two lookup structures
//! the rule engine depends on:
//!
//! - a table registry keyed by type, so equal types share one table, and
//! - an id index mapping every component id (including its wildcard
//!   patterns) to the tables that contain it, with the matching column.
//!
//! Both are insertion-ordered maps; the iteration order of the id index is
//! what makes rule results deterministic across runs.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::entity::{Attributes, Entity, FIRST_USER_INDEX, Id, ISA, THIS, WILDCARD};

/// Handle to a table inside a [`Store`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId(u32);

impl TableId {
    /// Position of the table in creation order.
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Entry of the id index: a table plus the column where the id matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableRecord {
    pub table: TableId,
    pub column: u32,
}

/// A slice of a table's entity vector. `count == 0` means the whole table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRange {
    pub table: TableId,
    pub offset: u32,
    pub count: u32,
}

/// Location of a live entity: its home table and row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntityRecord {
    pub table: TableId,
    pub row: u32,
}

/// A group of entities sharing one component-id vector.
#[derive(Debug)]
pub struct Table {
    type_ids: Vec<Id>,
    entities: Vec<Entity>,
}

impl Table {
    /// Ordered component ids of this table.
    pub fn type_ids(&self) -> &[Id] {
        &self.type_ids
    }

    /// Dense entity vector; a row is an index into it.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Number of live entities.
    pub fn count(&self) -> usize {
        self.entities.len()
    }

    /// First column at or after `from` whose id matches `pattern`.
    pub fn search_from(&self, pattern: Id, from: usize) -> Option<usize> {
        if from >= self.type_ids.len() {
            return None;
        }
        self.type_ids[from..]
            .iter()
            .position(|id| id.matches(pattern))
            .map(|i| i + from)
    }
}

#[derive(Debug)]
struct EntityMeta {
    generation: u16,
    alive: bool,
    table: Option<TableId>,
    row: u32,
}

impl EntityMeta {
    fn detached(alive: bool) -> Self {
        Self {
            generation: 0,
            alive,
            table: None,
            row: 0,
        }
    }
}

/// The entity/table store.
pub struct Store {
    entities: Vec<EntityMeta>,
    tables: Vec<Table>,
    table_index: IndexMap<Box<[Id]>, TableId>,
    id_index: IndexMap<Id, Vec<TableRecord>>,
    attributes: HashMap<u32, Attributes>,
    names: HashMap<u32, String>,
    by_name: HashMap<String, Entity>,
}

impl Store {
    pub fn new() -> Self {
        let mut store = Self {
            entities: Vec::new(),
            tables: Vec::new(),
            table_index: IndexMap::new(),
            id_index: IndexMap::new(),
            attributes: HashMap::new(),
            names: HashMap::new(),
            by_name: HashMap::new(),
        };
        for index in 0..FIRST_USER_INDEX {
            // Index 0 stays dead: it is the null handle.
            store.entities.push(EntityMeta::detached(index != 0));
        }
        store.assign_name(WILDCARD, "*");
        store.assign_name(THIS, ".");
        store.assign_name(ISA, "IsA");
        store.add_attribute(
            ISA,
            Attributes::TRANSITIVE | Attributes::TRANSITIVE_SELF | Attributes::FINAL,
        );
        store
    }

    // ------------------------------------------------------------------
    // Entity lifecycle
    // ------------------------------------------------------------------

    /// Create a fresh entity with no components.
    pub fn spawn(&mut self) -> Entity {
        let index = self.entities.len() as u32;
        self.entities.push(EntityMeta::detached(true));
        Entity::from_parts(index, 0)
    }

    /// Create a fresh entity and register a name for diagnostics.
    pub fn spawn_named(&mut self, name: &str) -> Entity {
        let e = self.spawn();
        self.assign_name(e, name);
        e
    }

    /// Remove an entity from its table and mark it dead.
    pub fn despawn(&mut self, e: Entity) {
        assert!(self.is_alive(e), "despawn of dead or invalid entity");
        self.detach(e);
        self.entities[e.index() as usize].alive = false;
    }

    /// True if the handle refers to a known slot with a matching generation.
    pub fn is_valid(&self, e: Entity) -> bool {
        self.entities
            .get(e.index() as usize)
            .is_some_and(|meta| meta.generation == e.generation())
    }

    /// True if the handle is valid and the entity has not been despawned.
    pub fn is_alive(&self, e: Entity) -> bool {
        self.entities
            .get(e.index() as usize)
            .is_some_and(|meta| meta.generation == e.generation() && meta.alive)
    }

    /// Reconstruct the live handle for a raw index, e.g. when decoding a
    /// pair half found in a table type.
    pub fn entity_from_index(&self, index: u32) -> Option<Entity> {
        let meta = self.entities.get(index as usize)?;
        if !meta.alive {
            return None;
        }
        Some(Entity::from_parts(index, meta.generation))
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    /// Add a component id to an entity, migrating it between tables.
    pub fn add_id(&mut self, e: Entity, id: Id) {
        assert!(self.is_alive(e), "add on dead or invalid entity");
        let mut type_ids = self.type_of(e);
        match type_ids.binary_search(&id) {
            Ok(_) => return,
            Err(pos) => type_ids.insert(pos, id),
        }
        self.migrate(e, type_ids);
    }

    /// Add a plain component.
    pub fn add(&mut self, e: Entity, component: Entity) {
        self.add_id(e, Id::entity(component));
    }

    /// Add a pair `(pred, obj)`.
    pub fn add_pair(&mut self, e: Entity, pred: Entity, obj: Entity) {
        self.add_id(e, Id::pair(pred, obj));
    }

    /// Remove a component id from an entity.
    pub fn remove_id(&mut self, e: Entity, id: Id) {
        assert!(self.is_alive(e), "remove on dead or invalid entity");
        let mut type_ids = self.type_of(e);
        let Ok(pos) = type_ids.binary_search(&id) else {
            return;
        };
        type_ids.remove(pos);
        self.migrate(e, type_ids);
    }

    /// Whether the entity's table type contains an id matching `pattern`.
    pub fn has(&self, e: Entity, pattern: Id) -> bool {
        self.entity_record(e)
            .is_some_and(|rec| self.table(rec.table).search_from(pattern, 0).is_some())
    }

    // ------------------------------------------------------------------
    // Lookup surface used by the rule engine
    // ------------------------------------------------------------------

    /// Locate an entity's home table, if it has components.
    pub fn entity_record(&self, e: Entity) -> Option<EntityRecord> {
        let meta = self.entities.get(e.index() as usize)?;
        if !meta.alive || meta.generation != e.generation() {
            return None;
        }
        let table = meta.table?;
        Some(EntityRecord {
            table,
            row: meta.row,
        })
    }

    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.0 as usize]
    }

    /// Tables registered under `id`, in creation order. Wildcard patterns
    /// (`(P, *)`, `(*, O)`, `(*, *)` and the plain wildcard) are themselves
    /// keys, registered when the table is created.
    pub fn id_index(&self, id: Id) -> &[TableRecord] {
        self.id_index.get(&id).map_or(&[], |v| v.as_slice())
    }

    // ------------------------------------------------------------------
    // Predicate attributes and names
    // ------------------------------------------------------------------

    pub fn add_attribute(&mut self, e: Entity, attrs: Attributes) {
        *self.attributes.entry(e.index()).or_default() |= attrs;
    }

    pub fn has_attribute(&self, e: Entity, attrs: Attributes) -> bool {
        self.attributes
            .get(&e.index())
            .is_some_and(|a| a.contains(attrs))
    }

    pub fn assign_name(&mut self, e: Entity, name: &str) {
        self.names.insert(e.index(), name.to_string());
        self.by_name.insert(name.to_string(), e);
    }

    pub fn name(&self, e: Entity) -> Option<&str> {
        self.names.get(&e.index()).map(String::as_str)
    }

    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.by_name.get(name).copied()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn type_of(&self, e: Entity) -> Vec<Id> {
        match self.entities[e.index() as usize].table {
            Some(t) => self.table(t).type_ids.clone(),
            None => Vec::new(),
        }
    }

    /// Remove the entity from its current table, fixing up the row of the
    /// entity swapped into its place.
    fn detach(&mut self, e: Entity) {
        let meta = &mut self.entities[e.index() as usize];
        let Some(table_id) = meta.table.take() else {
            return;
        };
        let row = meta.row as usize;
        let table = &mut self.tables[table_id.0 as usize];
        table.entities.swap_remove(row);
        if let Some(&moved) = table.entities.get(row) {
            self.entities[moved.index() as usize].row = row as u32;
        }
    }

    fn migrate(&mut self, e: Entity, type_ids: Vec<Id>) {
        self.detach(e);
        if type_ids.is_empty() {
            return;
        }
        let table_id = self.ensure_table(type_ids);
        let table = &mut self.tables[table_id.0 as usize];
        let row = table.entities.len() as u32;
        table.entities.push(e);
        let meta = &mut self.entities[e.index() as usize];
        meta.table = Some(table_id);
        meta.row = row;
    }

    fn ensure_table(&mut self, type_ids: Vec<Id>) -> TableId {
        if let Some(&id) = self.table_index.get(type_ids.as_slice()) {
            return id;
        }
        let table_id = TableId(self.tables.len() as u32);
        self.tables.push(Table {
            type_ids: type_ids.clone(),
            entities: Vec::new(),
        });
        self.table_index
            .insert(type_ids.clone().into_boxed_slice(), table_id);
        for (column, &id) in type_ids.iter().enumerate() {
            self.register(id, table_id, column as u32);
            if id.is_pair() {
                let (p, o) = (id.pred_index(), id.obj_index());
                let star = WILDCARD.index();
                self.register(Id::pair_indices(p, star), table_id, column as u32);
                self.register(Id::pair_indices(star, o), table_id, column as u32);
                self.register(Id::pair_indices(star, star), table_id, column as u32);
            } else {
                self.register(Id::entity(WILDCARD), table_id, column as u32);
            }
        }
        table_id
    }

    /// Register a table under a key, keeping the first matching column.
    fn register(&mut self, key: Id, table: TableId, column: u32) {
        let records = self.id_index.entry(key).or_default();
        if !records.iter().any(|r| r.table == table) {
            records.push(TableRecord { table, column });
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
