//! Entity storage — identity plus per-entity typed-component bags.
//!
//! The store owns every entity's [`ComponentSet`] and the two-phase
//! deletion list. Deletion is mark-then-collect: a marked entity keeps its
//! storage (systems that matched it before the mark may still read it)
//! until [`EntityStore::collect`] reclaims it at a schedule boundary.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;
use stage_core::{ComponentSet, Entity, EntityAllocator, WorldError};

/// Entity identity and component storage.
#[derive(Debug, Default)]
pub struct EntityStore {
    allocator: EntityAllocator,
    entities: HashMap<Entity, ComponentSet>,
    /// Entities marked for collection, reclaimed by the next `collect`.
    pending: BTreeSet<Entity>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new entity with an empty component set. Never fails.
    pub fn create(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        self.entities.insert(entity, ComponentSet::new());
        entity
    }

    /// Returns `true` if the entity has storage (created and not yet
    /// collected). Marked entities are still alive in this sense.
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.contains_key(&entity)
    }

    /// Returns `true` if the entity is marked for collection.
    #[must_use]
    pub fn is_pending(&self, entity: Entity) -> bool {
        self.pending.contains(&entity)
    }

    /// Inserts or replaces the component of `kind` on the entity, returning
    /// the replaced instance if one was present.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if the entity was never created or has
    /// been collected.
    pub fn insert(
        &mut self,
        entity: Entity,
        kind: &str,
        instance: Value,
    ) -> Result<Option<Value>, WorldError> {
        let set = self
            .entities
            .get_mut(&entity)
            .ok_or(WorldError::UnknownEntity(entity))?;
        Ok(set.insert(kind.to_string(), instance))
    }

    /// Removes the component of `kind` from the entity. Returns `Ok(None)`
    /// when the kind was absent — a redundant remove is not an error.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if the entity is dead.
    pub fn remove(&mut self, entity: Entity, kind: &str) -> Result<Option<Value>, WorldError> {
        let set = self
            .entities
            .get_mut(&entity)
            .ok_or(WorldError::UnknownEntity(entity))?;
        Ok(set.remove(kind))
    }

    /// Returns the entity's component set.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if the entity is dead.
    pub fn components(&self, entity: Entity) -> Result<&ComponentSet, WorldError> {
        self.entities
            .get(&entity)
            .ok_or(WorldError::UnknownEntity(entity))
    }

    /// Mutable access to the entity's component set.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if the entity is dead.
    pub fn components_mut(&mut self, entity: Entity) -> Result<&mut ComponentSet, WorldError> {
        self.entities
            .get_mut(&entity)
            .ok_or(WorldError::UnknownEntity(entity))
    }

    /// Marks the entity for collection. Idempotent: returns `Ok(true)` the
    /// first time, `Ok(false)` when already pending.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownEntity`] if the entity is dead.
    pub fn mark(&mut self, entity: Entity) -> Result<bool, WorldError> {
        if !self.is_alive(entity) {
            return Err(WorldError::UnknownEntity(entity));
        }
        Ok(self.pending.insert(entity))
    }

    /// Drains the pending-deletion list, removing each entity's storage and
    /// invoking `on_collected` exactly once per entity so dependents can
    /// purge their references. Returns the number of entities collected.
    pub fn collect(&mut self, mut on_collected: impl FnMut(Entity)) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for entity in pending {
            self.entities.remove(&entity);
            on_collected(entity);
        }
        count
    }

    /// Iterates over all live entity ids, including marked ones.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.keys().copied()
    }

    /// Returns the number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if the store holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
