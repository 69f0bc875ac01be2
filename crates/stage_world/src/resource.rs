//! Resource table — one shared singleton instance per resource kind.
//!
//! Resources are process-wide singletons shared by every system that
//! declares them. Instantiation is explicit-then-lazy: a factory is
//! registered per kind up front, and the instance is created at most once,
//! the first time a registered system requires the kind. The instance is
//! never re-created while the world lives.

use std::collections::HashMap;

use serde_json::Value;
use stage_core::WorldError;
use tracing::debug;

type ResourceFactory = Box<dyn Fn() -> Value>;

/// Singleton resource storage with per-kind factories.
#[derive(Default)]
pub struct ResourceTable {
    factories: HashMap<String, ResourceFactory>,
    resources: HashMap<String, Value>,
}

impl ResourceTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the factory for a resource kind. Re-registering replaces
    /// the factory but never an already-created instance.
    pub fn register_factory(&mut self, kind: impl Into<String>, factory: impl Fn() -> Value + 'static) {
        let kind = kind.into();
        debug!(kind, "resource factory registered");
        self.factories.insert(kind, Box::new(factory));
    }

    /// Ensures an instance of `kind` exists, invoking the factory on first
    /// need. No-op when the instance already exists.
    ///
    /// # Errors
    ///
    /// [`WorldError::UnknownResource`] when no factory is registered.
    pub fn ensure(&mut self, kind: &str) -> Result<(), WorldError> {
        if self.resources.contains_key(kind) {
            return Ok(());
        }
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| WorldError::UnknownResource(kind.to_string()))?;
        debug!(kind, "resource instantiated");
        self.resources.insert(kind.to_string(), factory());
        Ok(())
    }

    /// Returns `true` if a factory is registered for `kind`.
    #[must_use]
    pub fn has_factory(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// The current instance of `kind`, if created.
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&Value> {
        self.resources.get(kind)
    }

    /// Mutable access to the instance of `kind`, if created.
    pub fn get_mut(&mut self, kind: &str) -> Option<&mut Value> {
        self.resources.get_mut(kind)
    }

    /// Number of live resource instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns `true` if no instance has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl std::fmt::Debug for ResourceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTable")
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}
