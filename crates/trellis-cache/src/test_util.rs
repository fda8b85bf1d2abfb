//! Shared helpers for the crate's tests.

use indexmap::IndexMap;

use trellis_core::{NodeId, Value};

use crate::context::{CacheContext, IdFieldContext};

pub(crate) fn val(json: serde_json::Value) -> Value {
    Value::from(json)
}

/// Id-field identity plus a single-entry redirect table.
pub(crate) struct RedirectContext {
    typename: String,
    field: String,
    target: NodeId,
}

impl RedirectContext {
    pub(crate) fn new(typename: &str, field: &str, target: &str) -> Self {
        RedirectContext {
            typename: typename.to_owned(),
            field: field.to_owned(),
            target: NodeId::from(target),
        }
    }
}

impl CacheContext for RedirectContext {
    fn entity_id(&self, value: &Value) -> Option<NodeId> {
        IdFieldContext.entity_id(value)
    }

    fn redirect(
        &self,
        typename: &str,
        field: &str,
        _args: &IndexMap<String, Value>,
    ) -> Option<NodeId> {
        (typename == self.typename && field == self.field).then(|| self.target.clone())
    }
}
