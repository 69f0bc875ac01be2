//! Secondary index from field/kind keys to candidate entity sets.
//!
//! The index powers [`Query`](crate::Query) resolution without requiring a
//! caller to declare a formal system. Keys are component kind names and
//! top-level field names; each key maps to the set of entities that
//! currently carry it.

use std::collections::{BTreeSet, HashMap};

use stage_core::Entity;

/// How [`PropertyIndex::resolve`] combines candidate sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// Intersection: the entity must carry every key.
    All,
    /// Union: the entity must carry at least one key.
    Any,
}

/// Index from property key to the set of entities carrying it.
#[derive(Debug, Default)]
pub struct PropertyIndex {
    keys: HashMap<String, BTreeSet<Entity>>,
}

impl PropertyIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the entity to each key's candidate set.
    pub fn link<I, S>(&mut self, entity: Entity, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            self.keys
                .entry(key.as_ref().to_string())
                .or_default()
                .insert(entity);
        }
    }

    /// Removes the entity from each key's candidate set.
    pub fn unlink<I, S>(&mut self, entity: Entity, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            if let Some(set) = self.keys.get_mut(key.as_ref()) {
                set.remove(&entity);
                if set.is_empty() {
                    self.keys.remove(key.as_ref());
                }
            }
        }
    }

    /// Removes the entity from every candidate set. Used at collection.
    pub fn purge(&mut self, entity: Entity) {
        self.keys.retain(|_, set| {
            set.remove(&entity);
            !set.is_empty()
        });
    }

    /// Resolves a key list to a set of entity ids.
    ///
    /// `Match::All` seeds the result with the first key's set and subtracts
    /// every id absent from each subsequent key's set, exiting early once
    /// the result is empty; an empty key list or any unindexed key
    /// short-circuits to the empty set. `Match::Any` unions all sets.
    #[must_use]
    pub fn resolve(&self, keys: &[String], mode: Match) -> BTreeSet<Entity> {
        match mode {
            Match::All => {
                let Some(first) = keys.first() else {
                    return BTreeSet::new();
                };
                let Some(seed) = self.keys.get(first) else {
                    return BTreeSet::new();
                };
                let mut result = seed.clone();
                for key in &keys[1..] {
                    let Some(set) = self.keys.get(key) else {
                        return BTreeSet::new();
                    };
                    result.retain(|id| set.contains(id));
                    if result.is_empty() {
                        return result;
                    }
                }
                result
            }
            Match::Any => {
                let mut result = BTreeSet::new();
                for key in keys {
                    if let Some(set) = self.keys.get(key) {
                        result.extend(set.iter().copied());
                    }
                }
                result
            }
        }
    }

    /// Returns the number of distinct keys currently indexed.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}
