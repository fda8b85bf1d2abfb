//! Generic lock-step traversal of a compiled tree and a value tree.
//!
//! The walker pairs compiled field nodes with the values found under their
//! response keys and drives a visitor over the pairs. It is deliberately
//! policy-free: it does not decide what an absent value means; that is the
//! visitor's job. An explicit work stack bounds host stack depth regardless
//! of query depth, and visitation order across siblings and array elements
//! is unspecified (visitors must not depend on it).

use indexmap::IndexMap;

use trellis_core::Value;

use crate::compile::{CompiledFieldNode, CompiledOperation};

/// Visitor invoked at each compiled-tree/value pair.
pub trait TreeVisitor {
    /// Called once per reachable node.
    ///
    /// `value` is `None` when the response key was absent (distinct from an
    /// explicit null, which the walker never surfaces; null branches are
    /// satisfied by definition). `children` are the node's compiled
    /// sub-selections; `enclosing` is the compiled field whose value this
    /// is, or `None` at the operation root.
    ///
    /// Return `true` to prune descent below this node.
    fn visit(
        &mut self,
        value: Option<&Value>,
        children: &IndexMap<String, CompiledFieldNode>,
        enclosing: Option<&CompiledFieldNode>,
    ) -> bool;
}

/// Walk `value` in lock-step with the operation's compiled tree.
pub fn walk<V: TreeVisitor>(operation: &CompiledOperation, value: Option<&Value>, visitor: &mut V) {
    let mut stack: Vec<(
        Option<&Value>,
        &IndexMap<String, CompiledFieldNode>,
        Option<&CompiledFieldNode>,
    )> = vec![(value, &operation.root, None)];

    while let Some((value, children, enclosing)) = stack.pop() {
        match value {
            // Nulls short-circuit the branch as satisfied.
            Some(Value::Null) => continue,
            // Arrays fan out: each element pairs with the same compiled
            // subtree.
            Some(Value::Array(items)) => {
                for item in items {
                    stack.push((Some(item), children, enclosing));
                }
                continue;
            }
            _ => {}
        }

        if visitor.visit(value, children, enclosing) {
            continue;
        }

        if let Some(Value::Object(map)) = value {
            for (key, child) in children {
                stack.push((map.get(key), &child.children, Some(child)));
            }
        }
    }
}
