//! Dynamic overlay: merge separately stored parameterized-field values back
//! into the nested shape a query expects.
//!
//! A field with arguments is not stored inline on its containing entity; the
//! write path keeps it under a synthetic identity derived from
//! `(container id, path from container, args)`. This engine re-derives those
//! identities while traversing the naively assembled result and substitutes
//! the stored node data under each field's response key.
//!
//! The traversal is an explicit stack of frames, not the generic walker: it
//! must track container identity and relative path, and it writes into the
//! result as it goes. The stored snapshot is never aliased: the engine works
//! on a private copy and every substituted subtree is a fresh clone.

use std::collections::HashSet;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use trellis_core::{NodeId, PathSegment, Value, dynamic_node_id};

use crate::compile::{CompiledFieldNode, CompiledOperation};
use crate::context::{CacheContext, value_typename};
use crate::snapshot::GraphSnapshot;

struct Frame<'a> {
    /// Response path from the result root.
    abs: Vec<PathSegment>,
    /// Identity of the nearest enclosing entity.
    container: NodeId,
    /// Response path from that entity.
    rel: Vec<PathSegment>,
    children: &'a IndexMap<String, CompiledFieldNode>,
}

/// Overlay parameterized-field values onto `raw`.
///
/// Resolved synthetic identities are recorded into `dynamic_ids`. An
/// identity that resolves to nothing (directly or via redirect) leaves the
/// field untouched; the completeness check will flag it as absent.
pub fn overlay(
    operation: &CompiledOperation,
    root_id: &NodeId,
    snapshot: &GraphSnapshot,
    context: &dyn CacheContext,
    raw: &Rc<Value>,
    dynamic_ids: &mut HashSet<NodeId>,
) -> Rc<Value> {
    // Nothing to overlay: hand the stored value back as-is.
    if !operation.has_parameterized_fields() || snapshot.node_snapshot(root_id).is_none() {
        return Rc::clone(raw);
    }

    let mut result = (**raw).clone();
    let mut stack = vec![Frame {
        abs: Vec::new(),
        container: root_id.clone(),
        rel: Vec::new(),
        children: &operation.root,
    }];

    while let Some(mut frame) = stack.pop() {
        let Some(current) = get_path(&result, &frame.abs) else {
            continue;
        };

        match current {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    // Null elements are preserved without traversal.
                    if item.is_null() {
                        continue;
                    }
                    stack.push(Frame {
                        abs: extend(&frame.abs, PathSegment::Index(index)),
                        container: frame.container.clone(),
                        rel: extend(&frame.rel, PathSegment::Index(index)),
                        children: frame.children,
                    });
                }
                continue;
            }
            Value::Object(_) => {}
            _ => continue,
        }

        // Crossing into a nested entity: synthetic identities are relative
        // to the nearest enclosing entity, so reset container and path.
        if let Some(entity) = context.entity_id(current) {
            if entity != frame.container {
                frame.container = entity;
                frame.rel = Vec::new();
            }
        }

        let mut writes: Vec<(Vec<PathSegment>, NodeId)> = Vec::new();
        for (key, child) in frame.children {
            if let Some(args) = &child.args {
                let rel = extend(&frame.rel, PathSegment::Key(key.clone()));
                let dynamic = dynamic_node_id(&frame.container, &rel, args);
                let resolved = if snapshot.node_snapshot(&dynamic).is_some() {
                    Some(dynamic)
                } else {
                    // Redirects map a never-cached parameterized read onto
                    // an entity the graph already knows.
                    value_typename(current)
                        .map(str::to_owned)
                        .or_else(|| {
                            frame
                                .abs
                                .is_empty()
                                .then(|| context.root_typename().to_owned())
                        })
                        .and_then(|typename| context.redirect(&typename, child.field_name(), args))
                        .filter(|id| snapshot.node_snapshot(id).is_some())
                };

                let Some(id) = resolved else {
                    trace!(container = %frame.container, field = key.as_str(),
                           "parameterized field unresolved");
                    continue;
                };
                trace!(container = %frame.container, field = key.as_str(), node = %id,
                       "parameterized field resolved");

                let abs = extend(&frame.abs, PathSegment::Key(key.clone()));
                if child.children.values().any(|c| c.has_parameterized_children) {
                    stack.push(Frame {
                        abs: abs.clone(),
                        container: id.clone(),
                        rel: Vec::new(),
                        children: &child.children,
                    });
                }
                dynamic_ids.insert(id.clone());
                writes.push((abs, id));
            } else if child.has_parameterized_children {
                stack.push(Frame {
                    abs: extend(&frame.abs, PathSegment::Key(key.clone())),
                    container: frame.container.clone(),
                    rel: extend(&frame.rel, PathSegment::Key(key.clone())),
                    children: &child.children,
                });
            }
        }

        for (path, id) in writes {
            if let Some(data) = snapshot.node_data(&id) {
                set_path(&mut result, &path, (**data).clone());
            }
        }
    }

    Rc::new(result)
}

fn extend(path: &[PathSegment], segment: PathSegment) -> Vec<PathSegment> {
    let mut extended = Vec::with_capacity(path.len() + 1);
    extended.extend_from_slice(path);
    extended.push(segment);
    extended
}

fn get_path<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    let mut current = root;
    for segment in path {
        current = match segment {
            PathSegment::Key(key) => current.get(key)?,
            PathSegment::Index(index) => current.as_array()?.get(*index)?,
        };
    }
    Some(current)
}

/// Write `value` at `path`, inserting the final key if absent. Does nothing
/// when an intermediate step no longer exists.
fn set_path(root: &mut Value, path: &[PathSegment], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *root = value;
        return;
    };

    let mut current = root;
    for segment in parents {
        current = match segment {
            PathSegment::Key(key) => match current {
                Value::Object(map) => match map.get_mut(key) {
                    Some(next) => next,
                    None => return,
                },
                _ => return,
            },
            PathSegment::Index(index) => match current {
                Value::Array(items) => match items.get_mut(*index) {
                    Some(next) => next,
                    None => return,
                },
                _ => return,
            },
        };
    }

    match (current, last) {
        (Value::Object(map), PathSegment::Key(key)) => {
            map.insert(key.clone(), value);
        }
        (Value::Array(items), PathSegment::Index(index)) => {
            if let Some(slot) = items.get_mut(*index) {
                *slot = value;
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trellis_core::{ArgValue, Document, Field};

    use crate::compile::{Variables, compile};
    use crate::context::IdFieldContext;
    use crate::test_util::{RedirectContext, val};

    fn compile_query(selections: Vec<trellis_core::Selection>) -> CompiledOperation {
        compile(&Document::query(selections), &Variables::new()).unwrap()
    }

    fn run(
        op: &CompiledOperation,
        root: &NodeId,
        snapshot: &GraphSnapshot,
        context: &dyn CacheContext,
    ) -> (Rc<Value>, HashSet<NodeId>) {
        let raw = snapshot.node_data(root).cloned().unwrap_or_else(|| Rc::new(Value::Null));
        let mut dynamic_ids = HashSet::new();
        let overlaid = overlay(op, root, snapshot, context, &raw, &mut dynamic_ids);
        (overlaid, dynamic_ids)
    }

    fn dynamic_id(container: &str, path: &[PathSegment], args: &[(&str, Value)]) -> NodeId {
        let args = args.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect();
        dynamic_node_id(&NodeId::from(container), path, &args)
    }

    #[test]
    fn no_parameterized_fields_is_a_no_op() {
        let op = compile_query(vec![Field::new("name").into()]);
        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({"name": "Ada"})));
        let root = NodeId::from("ROOT");

        let raw = snapshot.node_data(&root).cloned().unwrap();
        let mut ids = HashSet::new();
        let overlaid = overlay(&op, &root, &snapshot, &IdFieldContext, &raw, &mut ids);

        assert!(Rc::ptr_eq(&raw, &overlaid));
        assert!(ids.is_empty());
    }

    #[test]
    fn parameterized_field_materializes_under_its_response_key() {
        let op = compile_query(vec![
            Field::new("posts")
                .with_arg("first", ArgValue::literal(2i64))
                .with_selections(vec![Field::new("title").into()])
                .into(),
        ]);
        let root = NodeId::from("ROOT");
        let posts_id = dynamic_id(
            "ROOT",
            &[PathSegment::from("posts")],
            &[("first", Value::from(2i64))],
        );

        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({})));
        snapshot.insert(posts_id.clone(), val(json!([{"title": "one"}, {"title": "two"}])));

        let (overlaid, ids) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(
            *overlaid,
            val(json!({"posts": [{"title": "one"}, {"title": "two"}]})),
        );
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![posts_id]);
    }

    #[test]
    fn aliased_parameterized_field_keys_by_alias() {
        // The synthetic identity and the result key both use the alias.
        let op = compile_query(vec![
            Field::new("posts")
                .with_alias("recent")
                .with_arg("first", ArgValue::literal(1i64))
                .into(),
        ]);
        let root = NodeId::from("ROOT");
        let recent_id = dynamic_id(
            "ROOT",
            &[PathSegment::from("recent")],
            &[("first", Value::from(1i64))],
        );

        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({})));
        snapshot.insert(recent_id.clone(), val(json!("compact")));

        let (overlaid, ids) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(*overlaid, val(json!({"recent": "compact"})));
        assert!(ids.contains(&recent_id));
    }

    #[test]
    fn unresolved_identity_leaves_the_field_absent() {
        let op = compile_query(vec![
            Field::new("posts").with_arg("first", ArgValue::literal(2i64)).into(),
        ]);
        let root = NodeId::from("ROOT");
        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({"other": 1})));

        let (overlaid, ids) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(*overlaid, val(json!({"other": 1})));
        assert!(ids.is_empty());
    }

    #[test]
    fn missing_root_snapshot_is_a_no_op() {
        let op = compile_query(vec![
            Field::new("posts").with_arg("first", ArgValue::literal(2i64)).into(),
        ]);
        let snapshot = GraphSnapshot::new();
        let root = NodeId::from("ROOT");

        let raw = Rc::new(Value::Null);
        let mut ids = HashSet::new();
        let overlaid = overlay(&op, &root, &snapshot, &IdFieldContext, &raw, &mut ids);
        assert!(Rc::ptr_eq(&raw, &overlaid));
    }

    #[test]
    fn redirect_resolves_through_the_root_typename_fallback() {
        let op = compile_query(vec![
            Field::new("user")
                .with_arg("id", ArgValue::literal("User:5"))
                .with_selections(vec![Field::new("name").into()])
                .into(),
        ]);
        let root = NodeId::from("ROOT");
        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({})));
        snapshot.insert("User:5", val(json!({"id": "User:5", "name": "Eve"})));

        let context = RedirectContext::new("Query", "user", "User:5");
        let (overlaid, ids) = run(&op, &root, &snapshot, &context);

        assert_eq!(
            overlaid.get("user").and_then(|u| u.get("name")).and_then(Value::as_str),
            Some("Eve"),
        );
        assert!(ids.contains(&NodeId::from("User:5")));
    }

    #[test]
    fn redirect_to_a_missing_node_falls_through_to_absent() {
        let op = compile_query(vec![
            Field::new("user").with_arg("id", ArgValue::literal("User:9")).into(),
        ]);
        let root = NodeId::from("ROOT");
        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({})));

        let context = RedirectContext::new("Query", "user", "User:9");
        let (overlaid, ids) = run(&op, &root, &snapshot, &context);
        assert_eq!(*overlaid, val(json!({})));
        assert!(ids.is_empty());
    }

    #[test]
    fn nested_entity_resets_container_and_path() {
        // `parcels` hangs off the Shipment entity, not the query root, so
        // its synthetic identity derives from Shipment:1 with a fresh path.
        let op = compile_query(vec![
            Field::new("shipment")
                .with_selections(vec![
                    Field::new("parcels")
                        .with_arg("limit", ArgValue::literal(2i64))
                        .into(),
                ])
                .into(),
        ]);
        let root = NodeId::from("ROOT");
        let parcels_id = dynamic_id(
            "Shipment:1",
            &[PathSegment::from("parcels")],
            &[("limit", Value::from(2i64))],
        );

        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({"shipment": {"id": "Shipment:1"}})));
        snapshot.insert(parcels_id.clone(), val(json!([4.2, 1.1])));

        let (overlaid, ids) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(
            *overlaid,
            val(json!({"shipment": {"id": "Shipment:1", "parcels": [4.2, 1.1]}})),
        );
        assert!(ids.contains(&parcels_id));
    }

    #[test]
    fn array_elements_get_index_extended_paths() {
        let op = compile_query(vec![
            Field::new("rows")
                .with_selections(vec![
                    Field::new("cell").with_arg("format", ArgValue::literal("short")).into(),
                ])
                .into(),
        ]);
        let root = NodeId::from("ROOT");
        let cell0 = dynamic_id(
            "ROOT",
            &[
                PathSegment::from("rows"),
                PathSegment::from(0usize),
                PathSegment::from("cell"),
            ],
            &[("format", Value::from("short"))],
        );

        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({"rows": [{}, null]})));
        snapshot.insert(cell0.clone(), val(json!("c0")));

        let (overlaid, ids) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(*overlaid, val(json!({"rows": [{"cell": "c0"}, null]})));
        assert!(ids.contains(&cell0));
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn parameterized_fields_nest_inside_parameterized_results() {
        // The outer field's stored value itself contains a parameterized
        // field, whose identity is relative to the outer synthetic node.
        let op = compile_query(vec![
            Field::new("feed")
                .with_arg("kind", ArgValue::literal("hot"))
                .with_selections(vec![
                    Field::new("top").with_arg("count", ArgValue::literal(1i64)).into(),
                ])
                .into(),
        ]);
        let root = NodeId::from("ROOT");
        let feed_id = dynamic_id(
            "ROOT",
            &[PathSegment::from("feed")],
            &[("kind", Value::from("hot"))],
        );
        let top_id = dynamic_id(
            feed_id.as_str(),
            &[PathSegment::from("top")],
            &[("count", Value::from(1i64))],
        );

        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({})));
        snapshot.insert(feed_id.clone(), val(json!({"label": "hot"})));
        snapshot.insert(top_id.clone(), val(json!("first")));

        let (overlaid, ids) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(
            *overlaid,
            val(json!({"feed": {"label": "hot", "top": "first"}})),
        );
        assert!(ids.contains(&feed_id));
        assert!(ids.contains(&top_id));
    }

    #[test]
    fn snapshot_data_is_never_aliased_by_the_result() {
        let op = compile_query(vec![
            Field::new("posts").with_arg("first", ArgValue::literal(1i64)).into(),
        ]);
        let root = NodeId::from("ROOT");
        let posts_id = dynamic_id(
            "ROOT",
            &[PathSegment::from("posts")],
            &[("first", Value::from(1i64))],
        );

        let mut snapshot = GraphSnapshot::new();
        snapshot.insert("ROOT", val(json!({"name": "Ada"})));
        snapshot.insert(posts_id.clone(), val(json!(["p"])));

        let (overlaid, _) = run(&op, &root, &snapshot, &IdFieldContext);
        assert_eq!(*overlaid, val(json!({"name": "Ada", "posts": ["p"]})));

        // The stored nodes still hold their original values.
        assert_eq!(
            **snapshot.node_data(&root).unwrap(),
            val(json!({"name": "Ada"})),
        );
        assert_eq!(**snapshot.node_data(&posts_id).unwrap(), val(json!(["p"])));
    }
}
