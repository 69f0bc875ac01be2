//! System definitions — per-frame logic units with declared data needs.
//!
//! A [`SystemDef`] pairs a callback with the component kinds and resource
//! kinds it depends on. The world matches each system against the entity
//! population (entity matches iff its component kinds are a superset of
//! the system's dependencies) and invokes the callback once per matched
//! entity per schedule run.

use serde_json::Value;

/// A registry-scoped handle to a registered system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId(pub u64);

impl std::fmt::Display for SystemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "System({})", self.0)
    }
}

/// The callback type for systems.
///
/// Invoked with the matched entity's component instances in dependency
/// declaration order, and the required resource instances in declaration
/// order. Mutations to either slice are written back after the call.
pub type SystemFn = Box<dyn FnMut(&mut [Value], &mut [Value])>;

/// Declarative description of a system: name, dependencies, callback.
///
/// Built fluently and handed to `World::add_system`:
///
/// ```rust,ignore
/// SystemDef::new("regen_health")
///     .requires("Health")
///     .resource("Timer")
///     .run(|comps, res| { /* ... */ })
/// ```
pub struct SystemDef {
    name: String,
    requires: Vec<String>,
    resources: Vec<String>,
    callback: Option<SystemFn>,
}

impl SystemDef {
    /// Starts a definition with the given human-readable name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: Vec::new(),
            resources: Vec::new(),
            callback: None,
        }
    }

    /// Adds a required component kind. Declaration order is the order the
    /// callback receives component instances in.
    #[must_use]
    pub fn requires(mut self, kind: impl Into<String>) -> Self {
        self.requires.push(kind.into());
        self
    }

    /// Adds a required resource kind. Declaration order is the order the
    /// callback receives resource instances in.
    #[must_use]
    pub fn resource(mut self, kind: impl Into<String>) -> Self {
        self.resources.push(kind.into());
        self
    }

    /// Sets the callback and finishes the definition.
    #[must_use]
    pub fn run(mut self, callback: impl FnMut(&mut [Value], &mut [Value]) + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// The system's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared component dependencies, in order.
    #[must_use]
    pub fn required_kinds(&self) -> &[String] {
        &self.requires
    }

    /// The declared resource dependencies, in order.
    #[must_use]
    pub fn resource_kinds(&self) -> &[String] {
        &self.resources
    }

    pub(crate) fn into_parts(self) -> (String, Vec<String>, Vec<String>, SystemFn) {
        let callback = self.callback.unwrap_or_else(|| Box::new(|_, _| {}));
        (self.name, self.requires, self.resources, callback)
    }
}

impl std::fmt::Debug for SystemDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemDef")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .field("resources", &self.resources)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
