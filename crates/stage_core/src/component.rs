//! Component representation and index-key derivation.
//!
//! Components are dynamic, named-field records: a [`serde_json::Value`]
//! stored under a string **kind** name. An entity owns at most one instance
//! of a given kind at a time, held in its [`ComponentSet`].
//!
//! The runtime's secondary index is keyed by both the kind name and the
//! record's top-level field names, so callers can query either "entities
//! with a `Health` component" or "entities with an `hp` field" without
//! declaring a formal system.

use std::collections::BTreeMap;

use serde_json::Value;

/// Per-entity mapping from component kind to component instance.
///
/// `BTreeMap` keeps iteration deterministic, which keeps query results and
/// log output stable across runs.
pub type ComponentSet = BTreeMap<String, Value>;

/// Derives the secondary-index keys contributed by one component.
///
/// The kind name itself is always a key. When the instance is a JSON
/// object, each of its top-level field names is a key as well. Non-object
/// instances (tags, scalars) contribute only their kind name.
#[must_use]
pub fn index_keys(kind: &str, instance: &Value) -> Vec<String> {
    let mut keys = vec![kind.to_string()];
    if let Value::Object(fields) = instance {
        keys.extend(fields.keys().cloned());
    }
    keys
}
