//! # stage_world
//!
//! The stagecraft ECS runtime. A [`World`] tracks which components are
//! attached to which entities, keeps every registered system's matched
//! entity set consistent with the component graph, executes systems in
//! named schedules, and serves cached multi-key queries that are never
//! stale after a committed mutation.
//!
//! The runtime is single-threaded and cooperative: one logical thread
//! drives [`World::run_schedule`], and all mutation happens between runs.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use stage_world::{SystemDef, World};
//!
//! let mut world = World::new(["update"]);
//! let e = world.create_entity();
//! world
//!     .add_component(e, "Position", json!({ "x": 0.0, "y": 0.0 }))
//!     .unwrap();
//!
//! world
//!     .add_system(
//!         SystemDef::new("fall").requires("Position").run(|comps, _res| {
//!             comps[0]["y"] = json!(comps[0]["y"].as_f64().unwrap() - 1.0);
//!         }),
//!         &["update"],
//!     )
//!     .unwrap();
//!
//! world.run_schedule("update").unwrap();
//! let position = world.component(e, "Position").unwrap().unwrap();
//! assert_eq!(position["y"], json!(-1.0));
//! ```

pub mod index;
pub mod query;
pub mod registry;
pub mod resource;
pub mod store;
pub mod system;
pub mod world;

pub use index::{Match, PropertyIndex};
pub use query::{Query, QueryChain};
pub use registry::SystemRegistry;
pub use resource::ResourceTable;
pub use store::EntityStore;
pub use system::{SystemDef, SystemId};
pub use world::World;

pub use stage_core::{ComponentSet, Entity, ErrorKind, VersionClock, WorldError};
