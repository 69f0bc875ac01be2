//! Version clock for cache invalidation.
//!
//! Every committed world mutation bumps the clock once. Cached derivations
//! (queries) record the version they were built at and compare against
//! [`VersionClock::now`] on read, rebuilding when the clock has moved.
//! Pull-style comparison means a cache can never serve a result older than
//! the most recent committed mutation.

use std::cell::Cell;
use std::rc::Rc;

/// A shared, monotonically increasing mutation counter.
///
/// Clones share the same underlying counter, so the world can hand a clock
/// handle to every query it creates.
#[derive(Debug, Clone, Default)]
pub struct VersionClock {
    version: Rc<Cell<u64>>,
}

impl VersionClock {
    /// Creates a clock at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current version.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.version.get()
    }

    /// Advances the clock by one and returns the new version.
    pub fn bump(&self) -> u64 {
        let next = self.version.get() + 1;
        self.version.set(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_starts_at_zero() {
        assert_eq!(VersionClock::new().now(), 0);
    }

    #[test]
    fn test_bump_is_monotonic() {
        let clock = VersionClock::new();
        assert_eq!(clock.bump(), 1);
        assert_eq!(clock.bump(), 2);
        assert_eq!(clock.now(), 2);
    }

    #[test]
    fn test_clones_share_the_counter() {
        let clock = VersionClock::new();
        let other = clock.clone();
        clock.bump();
        assert_eq!(other.now(), 1);
        other.bump();
        assert_eq!(clock.now(), 2);
    }
}
