//! # stage_core
//!
//! Leaf primitives shared by the stagecraft ECS runtime.
//!
//! This crate provides:
//!
//! - [`Entity`] — lightweight `u64` entity identifiers.
//! - [`EntityAllocator`] — monotonically increasing ID allocator.
//! - [`index_keys`] — derives secondary-index keys from a component.
//! - [`VersionClock`] — shared mutation counter for cache invalidation.
//! - [`WorldError`] / [`ErrorKind`] — the runtime's error taxonomy.

pub mod clock;
pub mod component;
pub mod entity;
pub mod error;

pub use clock::VersionClock;
pub use component::{ComponentSet, index_keys};
pub use entity::{Entity, EntityAllocator};
pub use error::{ErrorKind, WorldError};
