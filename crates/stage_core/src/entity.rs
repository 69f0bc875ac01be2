//! Entity identity.
//!
//! An [`Entity`] is an opaque `u64` handle with no inherent data; the
//! world attaches components to it to give it meaning. IDs come from an
//! [`EntityAllocator`] and are never reused for the life of the process,
//! so a stale handle can never silently alias a newer entity.

use serde::{Deserialize, Serialize};

/// A unique entity identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(u64);

impl Entity {
    /// The null entity. Never allocated; stands in where no entity applies.
    pub const INVALID: Entity = Entity(0);

    /// Builds an entity from a raw identifier.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Hands out monotonically increasing entity IDs, starting at 1.
///
/// There is no free call: the allocator cannot take an ID back, which is
/// what makes handles stable across the whole process lifetime.
#[derive(Debug)]
pub struct EntityAllocator {
    next: u64,
}

impl EntityAllocator {
    /// Creates an allocator whose first ID is 1 (0 is [`Entity::INVALID`]).
    #[must_use]
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Allocates a fresh entity ID.
    pub fn allocate(&mut self) -> Entity {
        let entity = Entity(self.next);
        self.next += 1;
        entity
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_roundtrip() {
        let e = Entity::from_raw(42);
        assert_eq!(e.id(), 42);
        assert_ne!(e, Entity::INVALID);
    }

    #[test]
    fn test_first_allocation_is_not_invalid() {
        let mut alloc = EntityAllocator::new();
        assert_ne!(alloc.allocate(), Entity::INVALID);
    }

    #[test]
    fn test_ids_are_strictly_increasing() {
        let mut alloc = EntityAllocator::new();
        let mut last = alloc.allocate();
        for _ in 0..100 {
            let next = alloc.allocate();
            assert!(next.id() > last.id());
            last = next;
        }
    }
}
