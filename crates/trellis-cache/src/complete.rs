//! Completeness checking: does a result satisfy a compiled operation?
//!
//! Built on the generic walker. An absent value marks the result incomplete
//! and records the *enclosing field*, the highest absent point, so
//! re-requesting it fetches the whole subtree in one round trip instead of
//! one entry per leaf. Optionally collects every entity identity the result
//! touches.

use std::collections::HashSet;

use indexmap::IndexMap;

use trellis_core::{NodeId, Value};

use crate::compile::{CompiledFieldNode, CompiledOperation, FieldId};
use crate::context::CacheContext;
use crate::walk::{TreeVisitor, walk};

/// Outcome of a completeness check.
#[derive(Clone, Debug)]
pub struct Completeness {
    pub complete: bool,
    /// Ids of the highest compiled fields whose values were absent.
    pub missing: Vec<FieldId>,
    /// Entity ids touched by the result; collected only on request.
    pub entity_ids: Option<HashSet<NodeId>>,
}

/// Check `result` against the operation's compiled tree.
///
/// Repeated checks against the same snapshot version are stable: the same
/// result yields the same verdict, and collecting entity ids on a later
/// check adds information without changing it.
pub fn check(
    operation: &CompiledOperation,
    result: Option<&Value>,
    root_id: &NodeId,
    context: &dyn CacheContext,
    want_entity_ids: bool,
) -> Completeness {
    let mut entity_ids = want_entity_ids.then(HashSet::new);
    if let (Some(ids), Some(_)) = (entity_ids.as_mut(), result) {
        // The operation root always counts as touched, whether or not its
        // value resolves to an identity of its own.
        ids.insert(root_id.clone());
    }

    let mut visitor = CompletenessVisitor {
        context,
        complete: true,
        missing: Vec::new(),
        entity_ids,
    };
    walk(operation, result, &mut visitor);

    Completeness {
        complete: visitor.complete,
        missing: visitor.missing,
        entity_ids: visitor.entity_ids,
    }
}

struct CompletenessVisitor<'a> {
    context: &'a dyn CacheContext,
    complete: bool,
    missing: Vec<FieldId>,
    entity_ids: Option<HashSet<NodeId>>,
}

impl TreeVisitor for CompletenessVisitor<'_> {
    fn visit(
        &mut self,
        value: Option<&Value>,
        children: &IndexMap<String, CompiledFieldNode>,
        enclosing: Option<&CompiledFieldNode>,
    ) -> bool {
        let Some(value) = value else {
            self.complete = false;
            if let Some(field) = enclosing {
                if !self.missing.contains(&field.id) {
                    self.missing.push(field.id);
                }
            }
            return true;
        };

        if let (Some(ids), Value::Object(_)) = (self.entity_ids.as_mut(), value) {
            if let Some(id) = self.context.entity_id(value) {
                ids.insert(id);
            }
        }

        // A scalar where an object was expected is not this check's concern;
        // the branch counts as satisfied at this level.
        if !children.is_empty() && !matches!(value, Value::Object(_)) {
            return true;
        }

        false
    }
}
