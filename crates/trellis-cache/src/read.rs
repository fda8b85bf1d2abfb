//! Read orchestration: compile once, then fetch → overlay → check →
//! partition per snapshot, memoizing the outcome inside the snapshot.
//!
//! State machine per (operation instance, snapshot version):
//! 1. uncomputed → compute and memoize;
//! 2. result known, entity ids requested for the first time → re-check with
//!    id collection and extend the memo entry in place (the completeness
//!    verdict never changes for a snapshot version, so this only adds
//!    information);
//! 3. anything later → served straight from the memo.

use std::collections::HashSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use trellis_core::{Document, NodeId, Value};

use crate::compile::{CompiledOperation, Variables, compile};
use crate::complete::check;
use crate::context::CacheContext;
use crate::error::Result;
use crate::overlay::overlay;
use crate::partition::partition;
use crate::snapshot::GraphSnapshot;

/// Process-unique identity of an operation instance; the memoization key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceId(u64);

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(0);

impl InstanceId {
    fn fresh() -> Self {
        InstanceId(NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A compiled operation bound to a concrete root entity.
///
/// Created once per distinct (query, variables, root) and reused across
/// snapshots; each snapshot memoizes reads per instance.
pub struct OperationInstance {
    id: InstanceId,
    document: Rc<Document>,
    variables: Variables,
    operation: CompiledOperation,
    root_id: NodeId,
}

impl OperationInstance {
    /// Compile `document` against `variables`, rooted at `root_id`.
    pub fn compile(
        document: Rc<Document>,
        variables: Variables,
        root_id: impl Into<NodeId>,
    ) -> Result<Self> {
        let operation = compile(&document, &variables)?;
        Ok(OperationInstance {
            id: InstanceId::fresh(),
            document,
            variables,
            operation,
            root_id: root_id.into(),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn operation(&self) -> &CompiledOperation {
        &self.operation
    }

    pub fn root_id(&self) -> &NodeId {
        &self.root_id
    }

    pub fn document(&self) -> &Rc<Document> {
        &self.document
    }

    /// True when the compiled tree and result shape cannot change across
    /// calls: no variables referenced, no conditional directives.
    pub fn is_static(&self) -> bool {
        self.operation.is_static
    }
}

/// Outcome of one read.
#[derive(Clone, Debug)]
pub struct QueryResult {
    /// The assembled result, when the root node had stored data.
    pub result: Option<Rc<Value>>,
    /// Whether every requested field was present.
    pub complete: bool,
    /// Entity ids touched by the result; populated only when requested.
    pub entity_ids: Option<Rc<HashSet<NodeId>>>,
    /// Synthetic ids resolved while overlaying parameterized fields.
    pub dynamic_node_ids: Rc<HashSet<NodeId>>,
    /// The original document when nothing is missing, else the reduced
    /// query covering exactly the absences.
    pub partitioned_query: Rc<Document>,
}

/// Memoized read state held by a snapshot.
#[derive(Clone)]
pub(crate) struct CachedRead {
    result: Option<Rc<Value>>,
    complete: bool,
    entity_ids: Option<Rc<HashSet<NodeId>>>,
    dynamic_node_ids: Rc<HashSet<NodeId>>,
    partitioned_query: Rc<Document>,
}

impl From<CachedRead> for QueryResult {
    fn from(cached: CachedRead) -> Self {
        QueryResult {
            result: cached.result,
            complete: cached.complete,
            entity_ids: cached.entity_ids,
            dynamic_node_ids: cached.dynamic_node_ids,
            partitioned_query: cached.partitioned_query,
        }
    }
}

/// Read `instance` against `snapshot`.
pub fn read(
    context: &dyn CacheContext,
    instance: &OperationInstance,
    snapshot: &GraphSnapshot,
    include_entity_ids: bool,
) -> QueryResult {
    if let Some(mut cached) = snapshot.cached_read(instance.id) {
        if include_entity_ids && cached.entity_ids.is_none() {
            // Upgrade in place: same verdict, plus the ids.
            let outcome = check(
                &instance.operation,
                cached.result.as_deref(),
                &instance.root_id,
                context,
                true,
            );
            debug_assert_eq!(outcome.complete, cached.complete);
            cached.entity_ids = Some(Rc::new(outcome.entity_ids.unwrap_or_default()));
            snapshot.upsert_read(instance.id, cached.clone());
            debug!(complete = cached.complete, "read upgraded with entity ids");
        } else {
            debug!(complete = cached.complete, "read served from memo");
        }
        return cached.into();
    }

    let mut dynamic_node_ids = HashSet::new();
    let result = snapshot.node_data(&instance.root_id).map(|raw| {
        overlay(
            &instance.operation,
            &instance.root_id,
            snapshot,
            context,
            raw,
            &mut dynamic_node_ids,
        )
    });

    let outcome = check(
        &instance.operation,
        result.as_deref(),
        &instance.root_id,
        context,
        include_entity_ids,
    );
    let partitioned_query = if outcome.missing.is_empty() {
        Rc::clone(&instance.document)
    } else {
        Rc::new(partition(
            &instance.document,
            &instance.operation,
            &instance.variables,
            &outcome.missing,
        ))
    };
    debug!(
        complete = outcome.complete,
        missing = outcome.missing.len(),
        "read computed"
    );

    let cached = CachedRead {
        result,
        complete: outcome.complete,
        entity_ids: outcome.entity_ids.map(Rc::new),
        dynamic_node_ids: Rc::new(dynamic_node_ids),
        partitioned_query,
    };
    snapshot.upsert_read(instance.id, cached.clone());
    cached.into()
}
