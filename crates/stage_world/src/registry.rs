//! System registry — owns each registered system and its matched set.
//!
//! The registry is the authoritative holder of the match relation: for
//! every system it stores the exact set of entities whose component kinds
//! satisfy the system's dependencies. The world's relink pass keeps these
//! sets consistent with every component-set mutation and every system
//! registration.

use std::collections::{BTreeSet, HashMap};

use stage_core::Entity;

use crate::system::{SystemDef, SystemFn, SystemId};

/// A registered system: its declaration plus its current matched set.
pub(crate) struct SystemEntry {
    pub name: String,
    pub requires: Vec<String>,
    pub resources: Vec<String>,
    pub callback: SystemFn,
    pub matched: BTreeSet<Entity>,
}

/// Registry of all systems known to the world.
#[derive(Default)]
pub struct SystemRegistry {
    next_id: u64,
    systems: HashMap<SystemId, SystemEntry>,
}

impl SystemRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition and returns its handle.
    pub fn register(&mut self, def: SystemDef) -> SystemId {
        let (name, requires, resources, callback) = def.into_parts();
        self.next_id += 1;
        let id = SystemId(self.next_id);
        self.systems.insert(
            id,
            SystemEntry {
                name,
                requires,
                resources,
                callback,
                matched: BTreeSet::new(),
            },
        );
        id
    }

    /// Removes a system, dropping its matched set. Returns `true` if it
    /// was present.
    pub fn remove(&mut self, id: SystemId) -> bool {
        self.systems.remove(&id).is_some()
    }

    /// Returns `true` if the system is registered.
    #[must_use]
    pub fn contains(&self, id: SystemId) -> bool {
        self.systems.contains_key(&id)
    }

    /// The system's current matched entity set.
    #[must_use]
    pub fn matched(&self, id: SystemId) -> Option<&BTreeSet<Entity>> {
        self.systems.get(&id).map(|entry| &entry.matched)
    }

    /// The system's name.
    #[must_use]
    pub fn name(&self, id: SystemId) -> Option<&str> {
        self.systems.get(&id).map(|entry| entry.name.as_str())
    }

    pub(crate) fn entry(&self, id: SystemId) -> Option<&SystemEntry> {
        self.systems.get(&id)
    }

    pub(crate) fn entry_mut(&mut self, id: SystemId) -> Option<&mut SystemEntry> {
        self.systems.get_mut(&id)
    }

    /// All registered system ids, in unspecified order.
    #[must_use]
    pub fn ids(&self) -> Vec<SystemId> {
        self.systems.keys().copied().collect()
    }

    /// Adds an entity to the system's matched set. Idempotent.
    pub(crate) fn insert_match(&mut self, id: SystemId, entity: Entity) {
        if let Some(entry) = self.systems.get_mut(&id) {
            entry.matched.insert(entity);
        }
    }

    /// Removes an entity from the system's matched set. No-op if absent.
    pub(crate) fn remove_match(&mut self, id: SystemId, entity: Entity) {
        if let Some(entry) = self.systems.get_mut(&id) {
            entry.matched.remove(&entity);
        }
    }

    /// Purges a collected entity from every system's matched set.
    pub fn purge_entity(&mut self, entity: Entity) {
        for entry in self.systems.values_mut() {
            entry.matched.remove(&entity);
        }
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }
}

impl std::fmt::Debug for SystemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.systems.values().map(|e| e.name.as_str()).collect();
        f.debug_struct("SystemRegistry")
            .field("systems", &names)
            .finish()
    }
}
