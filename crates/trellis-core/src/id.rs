//! Node identities.
//!
//! Two kinds of identity address the graph:
//! - *entity* identities, stable ids derived from entity content by the
//!   host's identity policy;
//! - *parameterized-field* identities, synthetic ids derived here from
//!   `(container id, path from container, arguments)`.
//!
//! Both the write path (when it stores an argument-dependent value) and the
//! read path (when it overlays one back) must derive the same synthetic id,
//! so the derivation is canonical: argument objects render with sorted keys.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Identity of a node in the graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_owned())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// One step of a path from a container node to a nested field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// Response key of a field.
    Key(String),
    /// Index of an array element.
    Index(usize),
}

impl PathSegment {
    fn to_value(&self) -> Value {
        match self {
            PathSegment::Key(key) => Value::String(key.clone()),
            PathSegment::Index(index) => Value::Number(*index as f64),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_owned())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Separates the three components of a synthetic id. Unlikely to occur in an
/// entity id; the canonical JSON on either side disambiguates regardless.
const DYNAMIC_ID_SEPARATOR: char = '§';

/// Derive the synthetic identity of a parameterized field.
///
/// Deterministic and pure: the same `(container, path, args)` always yields
/// the same id, independent of argument spelling order.
pub fn dynamic_node_id(
    container: &NodeId,
    path: &[PathSegment],
    args: &IndexMap<String, Value>,
) -> NodeId {
    let path_json = Value::Array(path.iter().map(PathSegment::to_value).collect());
    let args_json = Value::Object(args.clone());
    NodeId(format!(
        "{container}{sep}{path}{sep}{args}",
        container = container,
        sep = DYNAMIC_ID_SEPARATOR,
        path = path_json.canonical_json(),
        args = args_json.canonical_json(),
    ))
}
