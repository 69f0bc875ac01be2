//! Cached, versioned queries over the property index.
//!
//! A [`Query`] records the key list it was built from and caches the
//! matching entity ids together with the clock version observed at the
//! last rebuild. Reads compare against the world's [`VersionClock`] and
//! rebuild when the clock has moved, so no read ever observes a result
//! older than the most recent committed mutation. Component bags are
//! fetched live from the store at read time, which means plain field-value
//! edits need no invalidation at all.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stage_core::{ComponentSet, Entity, VersionClock};

use crate::index::{Match, PropertyIndex};
use crate::store::EntityStore;

/// A cached lookup of entities satisfying a set of index keys.
///
/// Queries are cheap handles: clones share the same cache. They hold no
/// ownership of world data — the cache is purely derived and is rebuilt
/// from the index whenever it is stale.
#[derive(Clone)]
pub struct Query {
    inner: Rc<QueryInner>,
}

struct QueryInner {
    keys: Vec<String>,
    mode: Match,
    store: Rc<RefCell<EntityStore>>,
    index: Rc<RefCell<PropertyIndex>>,
    clock: VersionClock,
    seen: Cell<u64>,
    cache: RefCell<Vec<Entity>>,
}

impl Query {
    pub(crate) fn new(
        keys: Vec<String>,
        mode: Match,
        store: Rc<RefCell<EntityStore>>,
        index: Rc<RefCell<PropertyIndex>>,
        clock: VersionClock,
    ) -> Self {
        let query = Self {
            inner: Rc::new(QueryInner {
                keys,
                mode,
                store,
                index,
                clock,
                seen: Cell::new(0),
                cache: RefCell::new(Vec::new()),
            }),
        };
        query.rebuild();
        query
    }

    /// The keys this query resolves.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.inner.keys
    }

    fn rebuild(&self) {
        let version = self.inner.clock.now();
        let matched = self
            .inner
            .index
            .borrow()
            .resolve(&self.inner.keys, self.inner.mode);
        *self.inner.cache.borrow_mut() = matched.into_iter().collect();
        self.inner.seen.set(version);
    }

    fn refresh(&self) {
        if self.inner.seen.get() != self.inner.clock.now() {
            self.rebuild();
        }
    }

    /// Returns the matching entity ids, rebuilding the cache if stale.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.refresh();
        self.inner.cache.borrow().clone()
    }

    /// Returns each matching entity together with a snapshot of its
    /// component bag. Entities whose storage disappeared between the index
    /// update and this read are skipped.
    #[must_use]
    pub fn rows(&self) -> Vec<(Entity, ComponentSet)> {
        self.refresh();
        let store = self.inner.store.borrow();
        self.inner
            .cache
            .borrow()
            .iter()
            .filter_map(|&entity| {
                store
                    .components(entity)
                    .ok()
                    .map(|set| (entity, set.clone()))
            })
            .collect()
    }

    /// Visits each matching entity's live component bag for in-place field
    /// mutation.
    ///
    /// The callback must not call back into the world or other queries; the
    /// store is mutably borrowed for the duration of each visit. Structural
    /// changes (adding or removing component kinds) go through the world's
    /// `add_component`/`remove_component` instead.
    pub fn for_each(&self, mut f: impl FnMut(Entity, &mut ComponentSet)) {
        self.refresh();
        let ids = self.inner.cache.borrow().clone();
        let mut store = self.inner.store.borrow_mut();
        for entity in ids {
            if let Ok(set) = store.components_mut(entity) {
                f(entity, set);
            }
        }
    }

    /// Number of matching entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.refresh();
        self.inner.cache.borrow().len()
    }

    /// Returns `true` if no entity matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Composes this query with another for joint iteration.
    #[must_use]
    pub fn and(&self, other: &Query) -> QueryChain {
        QueryChain {
            queries: vec![self.clone(), other.clone()],
        }
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("keys", &self.inner.keys)
            .field("mode", &self.inner.mode)
            .field("seen", &self.inner.seen.get())
            .finish()
    }
}

/// An ordered grouping of queries exposed together for joint iteration.
///
/// The chain owns no cache of its own; the cross-product walk is the
/// caller's responsibility.
#[derive(Debug, Clone)]
pub struct QueryChain {
    queries: Vec<Query>,
}

impl QueryChain {
    /// Appends another query, returning the extended chain.
    #[must_use]
    pub fn and(&self, query: &Query) -> QueryChain {
        let mut queries = self.queries.clone();
        queries.push(query.clone());
        QueryChain { queries }
    }

    /// The member queries, in composition order.
    #[must_use]
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }
}

impl<'a> IntoIterator for &'a QueryChain {
    type Item = &'a Query;
    type IntoIter = std::slice::Iter<'a, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.queries.iter()
    }
}
