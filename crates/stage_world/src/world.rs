//! The world — entity/component storage, system matching, schedules.
//!
//! [`World`] wires the store, the property index, the system registry, the
//! resource table, and the version clock together, and owns the central
//! invariant of the runtime: for every (system, entity) pair, the system
//! matches the entity iff it declares at least one component dependency
//! and the entity's component kinds are a superset of those dependencies
//! (dependency-free systems match nothing and run once per schedule).
//! Every mutating operation restores that invariant before returning and
//! bumps the clock exactly once.
//!
//! ## Execution model
//!
//! Single-threaded and cooperative. `run_schedule` iterates the schedule's
//! systems in registration order; each system sees the entities matched at
//! the start of its turn. Entity deletion is two-phase: `delete_entity`
//! marks, and the collection pass at the end of `run_schedule` reclaims
//! storage and purges every matched set and index entry. A re-entrancy
//! guard rejects mutating calls that arrive while a run is in flight.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use serde_json::Value;
use stage_core::{ComponentSet, Entity, VersionClock, WorldError, index_keys};
use tracing::{debug, info, warn};

use crate::index::{Match, PropertyIndex};
use crate::query::Query;
use crate::registry::SystemRegistry;
use crate::resource::ResourceTable;
use crate::store::EntityStore;
use crate::system::{SystemDef, SystemId};

/// The ECS world: entities, components, systems, resources, schedules.
pub struct World {
    store: Rc<RefCell<EntityStore>>,
    index: Rc<RefCell<PropertyIndex>>,
    clock: VersionClock,
    registry: SystemRegistry,
    resources: ResourceTable,
    /// Declared schedules; each holds system ids in registration order.
    schedules: HashMap<String, Vec<SystemId>>,
    /// Raised while `run_schedule` is in flight.
    running: Rc<Cell<bool>>,
}

/// RAII flag for the in-flight schedule run. Clears on drop, so a panicking
/// system callback cannot leave the world permanently locked.
struct RunGuard {
    flag: Rc<Cell<bool>>,
}

impl RunGuard {
    fn raise(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self {
            flag: Rc::clone(flag),
        }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl World {
    /// Creates a world with a fixed set of schedule names.
    ///
    /// Duplicate names collapse. Zero schedules is legal; every later
    /// `add_system`/`run_schedule` call will fail with `UnknownSchedule`.
    #[must_use]
    pub fn new<I, S>(schedules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schedules: HashMap<String, Vec<SystemId>> = schedules
            .into_iter()
            .map(|name| (name.into(), Vec::new()))
            .collect();
        info!(schedules = ?schedules.keys().collect::<Vec<_>>(), "world created");
        Self {
            store: Rc::new(RefCell::new(EntityStore::new())),
            index: Rc::new(RefCell::new(PropertyIndex::new())),
            clock: VersionClock::new(),
            registry: SystemRegistry::new(),
            resources: ResourceTable::new(),
            schedules,
            running: Rc::new(Cell::new(false)),
        }
    }

    fn guard_mutation(&self) -> Result<(), WorldError> {
        if self.running.get() {
            return Err(WorldError::ReentrantMutation);
        }
        Ok(())
    }

    // -- Entity lifecycle --

    /// Allocates a new entity with an empty component set. Never fails.
    pub fn create_entity(&mut self) -> Entity {
        let entity = self.store.borrow_mut().create();
        self.clock.bump();
        debug!(%entity, "entity created");
        entity
    }

    /// Marks an entity for collection. Logically dead immediately: it will
    /// not be matched to new systems, but systems that already matched it
    /// still iterate it until the end of the next schedule run, when its
    /// storage is reclaimed. Idempotent.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a dead id, `ReentrantMutation` mid-run.
    pub fn delete_entity(&mut self, entity: Entity) -> Result<(), WorldError> {
        self.guard_mutation()?;
        if self.store.borrow_mut().mark(entity)? {
            debug!(%entity, "entity marked for collection");
        }
        Ok(())
    }

    /// Returns `true` if the entity has storage (marked entities included).
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.store.borrow().is_alive(entity)
    }

    // -- Component operations --

    /// Inserts or replaces the component of `kind` on the entity, then
    /// reindexes the entity, relinks it against every system, and bumps the
    /// clock. Replacing an existing kind is the documented contract, not an
    /// error.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a dead id, `ReentrantMutation` mid-run.
    pub fn add_component(
        &mut self,
        entity: Entity,
        kind: &str,
        instance: Value,
    ) -> Result<(), WorldError> {
        self.guard_mutation()?;
        let old_keys = self.entity_keys(entity)?;
        let replaced = self.store.borrow_mut().insert(entity, kind, instance)?;
        if replaced.is_some() {
            debug!(%entity, kind, "component replaced");
        }
        self.reindex(entity, &old_keys);
        self.relink(Some(entity), None);
        self.clock.bump();
        Ok(())
    }

    /// Inserts several components atomically with respect to match-relation
    /// recomputation: one reindex, one relink pass, one clock bump.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a dead id (nothing is inserted), and
    /// `ReentrantMutation` mid-run.
    pub fn add_component_bundle<I, K>(
        &mut self,
        entity: Entity,
        components: I,
    ) -> Result<(), WorldError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        self.guard_mutation()?;
        let old_keys = self.entity_keys(entity)?;
        {
            let mut store = self.store.borrow_mut();
            for (kind, instance) in components {
                store.insert(entity, &kind.into(), instance)?;
            }
        }
        self.reindex(entity, &old_keys);
        self.relink(Some(entity), None);
        self.clock.bump();
        Ok(())
    }

    /// Removes the component of `kind` from the entity. A redundant remove
    /// (kind absent) is a no-op, not an error, and commits nothing.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a dead id, `ReentrantMutation` mid-run.
    pub fn remove_component(&mut self, entity: Entity, kind: &str) -> Result<(), WorldError> {
        self.guard_mutation()?;
        let old_keys = self.entity_keys(entity)?;
        let removed = self.store.borrow_mut().remove(entity, kind)?;
        if removed.is_some() {
            self.reindex(entity, &old_keys);
            self.relink(Some(entity), None);
            self.clock.bump();
        }
        Ok(())
    }

    /// Returns a snapshot of the entity's component set.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a dead id.
    pub fn components(&self, entity: Entity) -> Result<ComponentSet, WorldError> {
        self.store.borrow().components(entity).cloned()
    }

    /// Returns a snapshot of one component, `Ok(None)` when the kind is
    /// absent.
    ///
    /// # Errors
    ///
    /// `UnknownEntity` for a dead id.
    pub fn component(&self, entity: Entity, kind: &str) -> Result<Option<Value>, WorldError> {
        Ok(self.store.borrow().components(entity)?.get(kind).cloned())
    }

    // -- Resources --

    /// Registers the factory used to create the singleton instance of a
    /// resource kind. The instance itself is created lazily, the first time
    /// a registered system requires the kind, and exactly once.
    pub fn register_resource(&mut self, kind: impl Into<String>, factory: impl Fn() -> Value + 'static) {
        self.resources.register_factory(kind, factory);
    }

    /// Returns a snapshot of a resource instance, if created.
    #[must_use]
    pub fn resource(&self, kind: &str) -> Option<Value> {
        self.resources.get(kind).cloned()
    }

    // -- Systems & schedules --

    /// Registers a system into the named schedules.
    ///
    /// Validation is all-or-nothing: every schedule name and every required
    /// resource kind is checked before any side effect, so a failure leaves
    /// the system registered nowhere. On success the system's required
    /// resources are instantiated (once per kind, ever) and the system is
    /// relinked against every live entity.
    ///
    /// # Errors
    ///
    /// `UnknownSchedule` for an undeclared name, `UnknownResource` for a
    /// required resource kind with no factory, `ReentrantMutation` mid-run.
    pub fn add_system(&mut self, def: SystemDef, schedules: &[&str]) -> Result<SystemId, WorldError> {
        self.guard_mutation()?;
        for name in schedules {
            if !self.schedules.contains_key(*name) {
                return Err(WorldError::UnknownSchedule((*name).to_string()));
            }
        }
        for kind in def.resource_kinds() {
            if self.resources.get(kind).is_none() && !self.resources.has_factory(kind) {
                return Err(WorldError::UnknownResource(kind.clone()));
            }
        }
        if def.required_kinds().is_empty() {
            warn!(
                system = def.name(),
                "system declares no component dependencies; it will match no entity"
            );
        }
        for kind in def.resource_kinds() {
            self.resources.ensure(kind)?;
        }

        let name = def.name().to_string();
        let id = self.registry.register(def);
        for schedule in schedules {
            if let Some(systems) = self.schedules.get_mut(*schedule)
                && !systems.contains(&id)
            {
                systems.push(id);
            }
        }
        self.relink(None, Some(id));
        info!(system = name, %id, ?schedules, "system registered");
        Ok(id)
    }

    /// Removes a system from the registry and scrubs it from every schedule
    /// that references it, so no schedule holds a dangling id. Returns
    /// `true` if the system was registered.
    ///
    /// # Errors
    ///
    /// `ReentrantMutation` mid-run.
    pub fn delete_system(&mut self, id: SystemId) -> Result<bool, WorldError> {
        self.guard_mutation()?;
        let removed = self.registry.remove(id);
        if removed {
            for systems in self.schedules.values_mut() {
                systems.retain(|s| *s != id);
            }
            debug!(%id, "system deleted");
        }
        Ok(removed)
    }

    /// The entities currently matched to a system, or `None` for an
    /// unregistered id.
    #[must_use]
    pub fn matched_entities(&self, id: SystemId) -> Option<Vec<Entity>> {
        self.registry
            .matched(id)
            .map(|set| set.iter().copied().collect())
    }

    /// Access to the system registry.
    #[must_use]
    pub fn registry(&self) -> &SystemRegistry {
        &self.registry
    }

    // -- Matching --

    /// Re-evaluates the match relation. Four behaviors under one operation:
    ///
    /// - `(Some(e), Some(s))` — relink one pair;
    /// - `(Some(e), None)` — one entity against all systems (component
    ///   mutation);
    /// - `(None, Some(s))` — one system against all entities (system
    ///   registration);
    /// - `(None, None)` — full reconciliation.
    ///
    /// Idempotent, and the resulting match sets are independent of internal
    /// iteration order. Entities pending collection are skipped entirely:
    /// they are never matched to new systems, and their existing matches
    /// survive until the collection pass.
    pub fn relink(&mut self, entity: Option<Entity>, system: Option<SystemId>) {
        match (entity, system) {
            (Some(e), Some(s)) => self.relink_pair(e, s),
            (Some(e), None) => {
                for s in self.registry.ids() {
                    self.relink_pair(e, s);
                }
            }
            (None, Some(s)) => {
                let entities: Vec<Entity> = self.store.borrow().entities().collect();
                for e in entities {
                    self.relink_pair(e, s);
                }
            }
            (None, None) => {
                let entities: Vec<Entity> = self.store.borrow().entities().collect();
                for s in self.registry.ids() {
                    for &e in &entities {
                        self.relink_pair(e, s);
                    }
                }
            }
        }
    }

    fn relink_pair(&mut self, entity: Entity, system: SystemId) {
        let matches = {
            let store = self.store.borrow();
            if store.is_pending(entity) {
                return;
            }
            let Ok(set) = store.components(entity) else {
                self.registry.remove_match(system, entity);
                return;
            };
            let Some(entry) = self.registry.entry(system) else {
                return;
            };
            // A dependency-free system matches no entity; it runs once per
            // schedule without entity data. The superset rule applies only
            // to a non-empty dependency list.
            !entry.requires.is_empty()
                && entry.requires.iter().all(|kind| set.contains_key(kind))
        };
        if matches {
            self.registry.insert_match(system, entity);
        } else {
            self.registry.remove_match(system, entity);
        }
    }

    // -- Queries --

    /// Creates a cached query over the given keys: entities carrying every
    /// key (intersection).
    #[must_use]
    pub fn query(&self, keys: &[&str]) -> Query {
        self.make_query(keys, Match::All)
    }

    /// Creates a cached query over the given keys: entities carrying at
    /// least one key (union).
    #[must_use]
    pub fn query_any(&self, keys: &[&str]) -> Query {
        self.make_query(keys, Match::Any)
    }

    fn make_query(&self, keys: &[&str], mode: Match) -> Query {
        Query::new(
            keys.iter().map(|k| (*k).to_string()).collect(),
            mode,
            Rc::clone(&self.store),
            Rc::clone(&self.index),
            self.clock.clone(),
        )
    }

    /// The world's version clock.
    #[must_use]
    pub fn clock(&self) -> &VersionClock {
        &self.clock
    }

    // -- Execution --

    /// Runs every system in the named schedule, then performs the
    /// collection pass: marked entities lose their storage and are purged
    /// from the index and from every system's matched set.
    ///
    /// # Errors
    ///
    /// `UnknownSchedule` for an undeclared name, `ReentrantMutation` when a
    /// run is already in flight. An empty schedule is a no-op.
    pub fn run_schedule(&mut self, name: &str) -> Result<(), WorldError> {
        if self.running.get() {
            return Err(WorldError::ReentrantMutation);
        }
        let ids = self
            .schedules
            .get(name)
            .cloned()
            .ok_or_else(|| WorldError::UnknownSchedule(name.to_string()))?;

        let _guard = RunGuard::raise(&self.running);
        debug!(schedule = name, systems = ids.len(), "schedule run start");

        for id in ids {
            self.run_system(id);
        }

        let collected = {
            let mut index = self.index.borrow_mut();
            let registry = &mut self.registry;
            self.store.borrow_mut().collect(|entity| {
                index.purge(entity);
                registry.purge_entity(entity);
            })
        };
        if collected > 0 {
            self.clock.bump();
            debug!(schedule = name, collected, "collection pass reclaimed entities");
        }
        debug!(schedule = name, "schedule run complete");
        Ok(())
    }

    /// Runs one system over its matched set, snapshotted at entry. A system
    /// with no component dependencies runs exactly once with an empty
    /// component slice — it sees only its resources.
    fn run_system(&mut self, id: SystemId) {
        let Some((requires, resource_kinds)) = self
            .registry
            .entry(id)
            .map(|entry| (entry.requires.clone(), entry.resources.clone()))
        else {
            return;
        };

        if requires.is_empty() {
            self.invoke(id, Entity::INVALID, &requires, &resource_kinds);
            return;
        }

        let matched: Vec<Entity> = self
            .registry
            .matched(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for entity in matched {
            self.invoke(id, entity, &requires, &resource_kinds);
        }
    }

    /// Gathers the ordered component and resource tuples, invokes the
    /// callback, and writes both back.
    fn invoke(&mut self, id: SystemId, entity: Entity, requires: &[String], resource_kinds: &[String]) {
        let mut comps: Vec<Value> = Vec::with_capacity(requires.len());
        if !requires.is_empty() {
            let store = self.store.borrow();
            let Ok(set) = store.components(entity) else {
                return;
            };
            for kind in requires {
                let Some(instance) = set.get(kind) else {
                    return;
                };
                comps.push(instance.clone());
            }
        }

        let mut res: Vec<Value> = Vec::with_capacity(resource_kinds.len());
        for kind in resource_kinds {
            let Some(instance) = self.resources.get(kind) else {
                return;
            };
            res.push(instance.clone());
        }

        {
            let Some(entry) = self.registry.entry_mut(id) else {
                return;
            };
            (entry.callback)(&mut comps, &mut res);
        }

        if !requires.is_empty() {
            let mut store = self.store.borrow_mut();
            if let Ok(set) = store.components_mut(entity) {
                for (kind, instance) in requires.iter().zip(comps) {
                    set.insert(kind.clone(), instance);
                }
            }
        }
        for (kind, instance) in resource_kinds.iter().zip(res) {
            if let Some(slot) = self.resources.get_mut(kind) {
                *slot = instance;
            }
        }
    }

    // -- Indexing helpers --

    /// The full secondary-index key set an entity currently contributes.
    fn entity_keys(&self, entity: Entity) -> Result<BTreeSet<String>, WorldError> {
        let store = self.store.borrow();
        let set = store.components(entity)?;
        let mut keys = BTreeSet::new();
        for (kind, instance) in set {
            keys.extend(index_keys(kind, instance));
        }
        Ok(keys)
    }

    /// Diffs the entity's key set against `old_keys`: keys no longer
    /// contributed by any component are unlinked, new ones linked. A field
    /// name shared by two components stays indexed until the last
    /// contributor is removed.
    fn reindex(&mut self, entity: Entity, old_keys: &BTreeSet<String>) {
        let new_keys = match self.entity_keys(entity) {
            Ok(keys) => keys,
            Err(_) => BTreeSet::new(),
        };
        let mut index = self.index.borrow_mut();
        index.unlink(entity, old_keys.difference(&new_keys));
        index.link(entity, new_keys.difference(old_keys));
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entities", &self.store.borrow().len())
            .field("systems", &self.registry.len())
            .field("schedules", &self.schedules.keys().collect::<Vec<_>>())
            .field("version", &self.clock.now())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;
    use stage_core::ErrorKind;

    use super::*;

    fn world() -> World {
        World::new(["startup", "update"])
    }

    #[test]
    fn test_match_invariant_after_mutations() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Position", json!({ "x": 0, "y": 0 })).unwrap();

        let id = w
            .add_system(
                SystemDef::new("movement").requires("Position").requires("Velocity"),
                &["update"],
            )
            .unwrap();
        // Position alone does not satisfy [Position, Velocity].
        assert_eq!(w.matched_entities(id).unwrap(), Vec::<Entity>::new());

        w.add_component(e, "Velocity", json!({ "vx": 1, "vy": 0 })).unwrap();
        assert_eq!(w.matched_entities(id).unwrap(), vec![e]);

        w.remove_component(e, "Velocity").unwrap();
        assert_eq!(w.matched_entities(id).unwrap(), Vec::<Entity>::new());
    }

    #[test]
    fn test_relink_is_idempotent() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();
        let id = w
            .add_system(SystemDef::new("regen").requires("Health"), &["update"])
            .unwrap();

        let before = w.matched_entities(id).unwrap();
        w.relink(None, None);
        w.relink(None, None);
        assert_eq!(w.matched_entities(id).unwrap(), before);
    }

    #[test]
    fn test_late_component_joins_matched_set_without_reregistration() {
        let mut w = world();
        let e2 = w.create_entity();
        w.add_component(e2, "Position", json!({ "x": 5, "y": 5 })).unwrap();

        let id = w
            .add_system(
                SystemDef::new("damage").requires("Position").requires("Health"),
                &["update"],
            )
            .unwrap();
        assert!(w.matched_entities(id).unwrap().is_empty());

        w.add_component(e2, "Health", json!({ "hp": 10, "max": 10 })).unwrap();
        assert_eq!(w.matched_entities(id).unwrap(), vec![e2]);
    }

    #[test]
    fn test_regen_health_scenario() {
        let mut w = world();
        let e1 = w.create_entity();
        w.add_component_bundle(
            e1,
            vec![
                ("Position", json!({ "x": 0.0, "y": 0.0 })),
                ("Health", json!({ "hp": 4.0, "max": 20.0 })),
            ],
        )
        .unwrap();

        w.register_resource("Timer", || json!({ "elapsed": 2500.0 }));
        w.add_system(
            SystemDef::new("regen_health")
                .requires("Health")
                .resource("Timer")
                .run(|comps, res| {
                    let hp = comps[0]["hp"].as_f64().unwrap();
                    let max = comps[0]["max"].as_f64().unwrap();
                    let elapsed = res[0]["elapsed"].as_f64().unwrap();
                    let regen = (elapsed / 5000.0) * 5.0;
                    comps[0]["hp"] = json!((hp + regen).min(max));
                }),
            &["update"],
        )
        .unwrap();

        w.run_schedule("update").unwrap();
        let health = w.component(e1, "Health").unwrap().unwrap();
        // (2500 / 5000) * 5 = 2.5 regenerated.
        assert_eq!(health["hp"], json!(6.5));

        // Repeated runs cap at max.
        for _ in 0..20 {
            w.run_schedule("update").unwrap();
        }
        let health = w.component(e1, "Health").unwrap().unwrap();
        assert_eq!(health["hp"], json!(20.0));
    }

    #[test]
    fn test_deletion_takes_effect_at_end_of_run() {
        let mut w = world();
        let e1 = w.create_entity();
        w.add_component(e1, "Health", json!({ "hp": 1.0 })).unwrap();

        let hits = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&hits);
        let id = w
            .add_system(
                SystemDef::new("tick").requires("Health").run(move |comps, _| {
                    *counter.borrow_mut() += 1;
                    comps[0]["hp"] = json!(99.0);
                }),
                &["update"],
            )
            .unwrap();

        w.delete_entity(e1).unwrap();
        // Matched before the mark: the system still runs for e1 this pass,
        // and its write still lands.
        w.run_schedule("update").unwrap();
        assert_eq!(*hits.borrow(), 1);

        // After the run the entity is gone everywhere.
        assert_eq!(
            w.components(e1).unwrap_err().kind(),
            ErrorKind::UnknownEntity
        );
        assert!(w.matched_entities(id).unwrap().is_empty());

        // And the next run does not see it.
        w.run_schedule("update").unwrap();
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn test_marked_entity_not_matched_to_new_systems() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();
        w.delete_entity(e).unwrap();

        let id = w
            .add_system(SystemDef::new("late").requires("Health"), &["update"])
            .unwrap();
        assert!(w.matched_entities(id).unwrap().is_empty());
    }

    #[test]
    fn test_collection_idempotence() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();
        let id = w
            .add_system(SystemDef::new("regen").requires("Health"), &["update"])
            .unwrap();
        let query = w.query(&["hp"]);
        assert_eq!(query.len(), 1);

        w.delete_entity(e).unwrap();
        w.delete_entity(e).unwrap();
        w.delete_entity(e).unwrap();
        w.run_schedule("update").unwrap();

        assert!(!w.is_alive(e));
        assert!(w.matched_entities(id).unwrap().is_empty());
        assert!(query.is_empty());
    }

    #[test]
    fn test_query_freshness_after_mutations() {
        let mut w = world();
        let query = w.query(&["hp"]);
        assert!(query.is_empty());

        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 3 })).unwrap();
        assert_eq!(query.entities(), vec![e]);

        w.remove_component(e, "Health").unwrap();
        assert!(query.is_empty());
    }

    #[test]
    fn test_resource_singleton_shared_across_systems() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();

        w.register_resource("Counter", || json!({ "n": 0 }));
        w.add_system(
            SystemDef::new("inc")
                .requires("Health")
                .resource("Counter")
                .run(|_, res| {
                    let n = res[0]["n"].as_i64().unwrap();
                    res[0]["n"] = json!(n + 1);
                }),
            &["update"],
        )
        .unwrap();
        w.add_system(
            SystemDef::new("double")
                .requires("Health")
                .resource("Counter")
                .run(|_, res| {
                    let n = res[0]["n"].as_i64().unwrap();
                    res[0]["n"] = json!(n * 2);
                }),
            &["update"],
        )
        .unwrap();

        // One shared instance: inc then double sees the incremented value.
        w.run_schedule("update").unwrap();
        assert_eq!(w.resource("Counter").unwrap()["n"], json!(2));
        w.run_schedule("update").unwrap();
        assert_eq!(w.resource("Counter").unwrap()["n"], json!(6));
    }

    #[test]
    fn test_schedule_isolation() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();

        let runs = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&runs);
        w.add_system(
            SystemDef::new("only_startup").requires("Health").run(move |_, _| {
                *counter.borrow_mut() += 1;
            }),
            &["startup"],
        )
        .unwrap();

        w.run_schedule("update").unwrap();
        assert_eq!(*runs.borrow(), 0);
        w.run_schedule("startup").unwrap();
        assert_eq!(*runs.borrow(), 1);
    }

    #[test]
    fn test_unknown_schedule_errors() {
        let mut w = world();
        assert_eq!(
            w.run_schedule("nonexistent").unwrap_err().kind(),
            ErrorKind::UnknownSchedule
        );

        let err = w
            .add_system(
                SystemDef::new("stray").requires("Health"),
                &["update", "nonexistent"],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSchedule);
        // No partial registration into the valid schedule.
        assert!(w.registry().is_empty());
        w.run_schedule("update").unwrap();
    }

    #[test]
    fn test_unknown_resource_aborts_registration() {
        let mut w = world();
        let err = w
            .add_system(
                SystemDef::new("timed").requires("Health").resource("Timer"),
                &["update"],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownResource);
        assert!(w.registry().is_empty());
    }

    #[test]
    fn test_zero_dependency_system_runs_once_with_resources_only() {
        let mut w = world();
        // Matched entities are irrelevant to a dependency-free system.
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();

        w.register_resource("Timer", || json!({ "elapsed": 0 }));
        let id = w
            .add_system(
                SystemDef::new("advance_timer").resource("Timer").run(|comps, res| {
                    assert!(comps.is_empty());
                    let t = res[0]["elapsed"].as_i64().unwrap();
                    res[0]["elapsed"] = json!(t + 16);
                }),
                &["update"],
            )
            .unwrap();
        assert!(w.matched_entities(id).unwrap().is_empty());

        w.run_schedule("update").unwrap();
        w.run_schedule("update").unwrap();
        assert_eq!(w.resource("Timer").unwrap()["elapsed"], json!(32));
    }

    #[test]
    fn test_zero_dependency_system_never_accumulates_matches() {
        let mut w = world();
        w.register_resource("Timer", || json!({ "elapsed": 0 }));
        let id = w
            .add_system(SystemDef::new("advance_timer").resource("Timer"), &["update"])
            .unwrap();

        // Component mutations relink every system; a dependency-free one
        // must stay unmatched no matter how many entities exist.
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();
        assert!(w.matched_entities(id).unwrap().is_empty());

        w.relink(None, None);
        assert!(w.matched_entities(id).unwrap().is_empty());

        w.run_schedule("update").unwrap();
        assert!(w.matched_entities(id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_system_scrubs_schedules() {
        let mut w = world();
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();

        let runs = Rc::new(RefCell::new(0u32));
        let counter = Rc::clone(&runs);
        let id = w
            .add_system(
                SystemDef::new("regen").requires("Health").run(move |_, _| {
                    *counter.borrow_mut() += 1;
                }),
                &["startup", "update"],
            )
            .unwrap();

        w.run_schedule("update").unwrap();
        assert_eq!(*runs.borrow(), 1);

        assert!(w.delete_system(id).unwrap());
        w.run_schedule("update").unwrap();
        w.run_schedule("startup").unwrap();
        assert_eq!(*runs.borrow(), 1);
        assert!(w.matched_entities(id).is_none());
    }

    #[test]
    fn test_bundle_failure_commits_nothing() {
        let mut w = world();
        let query = w.query(&["hp"]);
        let err = w
            .add_component_bundle(
                Entity::from_raw(404),
                vec![("Health", json!({ "hp": 1 }))],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownEntity);
        assert!(query.is_empty());
    }

    #[test]
    fn test_shared_field_name_survives_partial_removal() {
        let mut w = world();
        let e = w.create_entity();
        // Both kinds contribute an "x" field.
        w.add_component_bundle(
            e,
            vec![
                ("Position", json!({ "x": 0, "y": 0 })),
                ("Anchor", json!({ "x": 10 })),
            ],
        )
        .unwrap();

        let xs = w.query(&["x"]);
        assert_eq!(xs.len(), 1);

        // Removing one contributor keeps the key indexed.
        w.remove_component(e, "Anchor").unwrap();
        assert_eq!(xs.len(), 1);

        // Removing the last contributor drops it.
        w.remove_component(e, "Position").unwrap();
        assert!(xs.is_empty());
    }

    #[test]
    fn test_reentrant_mutation_is_rejected() {
        let mut w = world();
        let e = w.create_entity();
        let _guard = RunGuard::raise(&w.running);

        assert_eq!(
            w.add_component(e, "Health", json!({})).unwrap_err().kind(),
            ErrorKind::ReentrantMutation
        );
        assert_eq!(
            w.delete_entity(e).unwrap_err().kind(),
            ErrorKind::ReentrantMutation
        );
        assert_eq!(
            w.add_system(SystemDef::new("x"), &["update"]).unwrap_err().kind(),
            ErrorKind::ReentrantMutation
        );
        assert_eq!(
            w.run_schedule("update").unwrap_err().kind(),
            ErrorKind::ReentrantMutation
        );
    }

    #[test]
    fn test_guard_clears_after_run() {
        let mut w = world();
        w.run_schedule("update").unwrap();
        // The RAII guard dropped; mutation works again.
        let e = w.create_entity();
        w.add_component(e, "Health", json!({ "hp": 1 })).unwrap();
    }

    #[test]
    fn test_empty_schedule_run_is_noop() {
        let mut w = world();
        w.run_schedule("startup").unwrap();
    }

    #[test]
    fn test_zero_schedule_world() {
        let mut w = World::new(Vec::<String>::new());
        assert_eq!(
            w.add_system(SystemDef::new("x"), &["update"]).unwrap_err().kind(),
            ErrorKind::UnknownSchedule
        );
        assert_eq!(
            w.run_schedule("update").unwrap_err().kind(),
            ErrorKind::UnknownSchedule
        );
    }

    #[test]
    fn test_query_chain_joint_iteration() {
        let mut w = world();
        let player = w.create_entity();
        w.add_component_bundle(
            player,
            vec![
                ("Position", json!({ "x": 3, "y": 4 })),
                ("Health", json!({ "hp": 100, "max": 100 })),
            ],
        )
        .unwrap();
        let bullet = w.create_entity();
        w.add_component_bundle(
            bullet,
            vec![
                ("Position", json!({ "x": 3, "y": 4 })),
                ("Damage", json!({ "dmg": 10 })),
            ],
        )
        .unwrap();

        let players = w.query(&["hp", "x", "y"]);
        let projectiles = w.query(&["dmg", "x", "y"]);
        let chain = players.and(&projectiles);

        // Caller-driven cross-product: apply damage on overlap.
        let [players, projectiles] = chain.queries() else {
            panic!("chain holds two queries");
        };
        let mut hits = Vec::new();
        for (p_entity, p_bag) in players.rows() {
            for (_, b_bag) in projectiles.rows() {
                if p_bag["Position"] == b_bag["Position"] {
                    hits.push((p_entity, b_bag["Damage"]["dmg"].clone()));
                }
            }
        }
        assert_eq!(hits, vec![(player, json!(10))]);
    }
}
