//! Collaborator seam between the cache and the host application.
//!
//! The cache does not know how an object becomes a stable node id, nor which
//! parameterized reads can be satisfied by entities already in the graph.
//! Both policies come in through `CacheContext`.

use indexmap::IndexMap;
use trellis_core::{NodeId, Value};

/// Well-known key carrying an object's type name, when the host records one.
pub const TYPENAME_KEY: &str = "__typename";

/// Host-provided identity and redirect policy.
pub trait CacheContext {
    /// Resolve an object value to its stable entity identity, if it has one.
    fn entity_id(&self, value: &Value) -> Option<NodeId>;

    /// Map a parameterized field that was never explicitly cached onto an
    /// entity already known to the graph, e.g. `user(id: 5)` → `User:5`.
    ///
    /// Consulted per `(typename, field name)`; the default table is empty.
    fn redirect(
        &self,
        typename: &str,
        field: &str,
        args: &IndexMap<String, Value>,
    ) -> Option<NodeId> {
        let _ = (typename, field, args);
        None
    }

    /// Typename assumed for the operation root when its value carries none.
    fn root_typename(&self) -> &str {
        "Query"
    }
}

/// Read an object's recorded typename.
pub(crate) fn value_typename(value: &Value) -> Option<&str> {
    value.get(TYPENAME_KEY).and_then(Value::as_str)
}

/// Identity policy resolving entities by their `id` field.
///
/// Suits graphs whose nodes carry a globally unique string or numeric `id`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdFieldContext;

impl CacheContext for IdFieldContext {
    fn entity_id(&self, value: &Value) -> Option<NodeId> {
        match value.get("id") {
            Some(Value::String(s)) => Some(NodeId::new(s.clone())),
            Some(Value::Number(n)) => Some(NodeId::new(Value::Number(*n).canonical_json())),
            _ => None,
        }
    }
}
