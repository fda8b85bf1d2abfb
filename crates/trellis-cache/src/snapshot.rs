//! One immutable version of the graph, plus its read memoization table.
//!
//! The write path produces a fresh `GraphSnapshot` per version; the read
//! path only looks nodes up. The memo table is the single mutated structure:
//! an upsert-only map from operation instance to its cached read, valid
//! exactly as long as this snapshot value is alive. Dropping the snapshot
//! drops every memoized result with it; there is no explicit invalidation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use trellis_core::{NodeId, Value};

use crate::read::{CachedRead, InstanceId};

/// Stored state of a single node.
#[derive(Clone, Debug)]
pub struct NodeSnapshot {
    /// The node's data. `Rc` so unoverlaid reads can hand it out without
    /// copying; readers never mutate through it.
    pub data: Rc<Value>,
}

/// An immutable-per-version view of the graph.
#[derive(Default)]
pub struct GraphSnapshot {
    nodes: HashMap<NodeId, NodeSnapshot>,
    reads: RefCell<HashMap<InstanceId, CachedRead>>,
}

impl GraphSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a node's data. Part of the write-path surface; the read path
    /// never calls this.
    pub fn insert(&mut self, id: impl Into<NodeId>, data: Value) {
        self.nodes.insert(
            id.into(),
            NodeSnapshot {
                data: Rc::new(data),
            },
        );
    }

    pub fn node_snapshot(&self, id: &NodeId) -> Option<&NodeSnapshot> {
        self.nodes.get(id)
    }

    pub fn node_data(&self, id: &NodeId) -> Option<&Rc<Value>> {
        self.nodes.get(id).map(|node| &node.data)
    }

    /// Memoized read for an operation instance, if one exists for this
    /// snapshot version. Entries are cheap to clone (`Rc` fields).
    pub(crate) fn cached_read(&self, instance: InstanceId) -> Option<CachedRead> {
        self.reads.borrow().get(&instance).cloned()
    }

    /// Record (or extend) the memoized read for an operation instance.
    /// Pure upsert: repeated writes for the same key are idempotent in
    /// their final effect.
    pub(crate) fn upsert_read(&self, instance: InstanceId, read: CachedRead) {
        self.reads.borrow_mut().insert(instance, read);
    }
}
