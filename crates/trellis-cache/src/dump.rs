//! Compact text rendering of compiled operations.
//!
//! One line per compiled field: response key, `-> name` when aliased,
//! resolved arguments in canonical form. Children indent two spaces. Stable
//! output, so tests can assert whole trees at once.

use crate::compile::{CompiledFieldNode, CompiledOperation};

pub fn dump_operation(operation: &CompiledOperation) -> String {
    let mut out = String::new();
    for node in operation.root.values() {
        dump_node(&mut out, node, 0);
    }
    out
}

fn dump_node(out: &mut String, node: &CompiledFieldNode, indent: usize) {
    out.push_str(&" ".repeat(indent));
    out.push_str(&node.response_key);
    if let Some(schema) = &node.schema_name {
        out.push_str(" -> ");
        out.push_str(schema);
    }
    if let Some(args) = &node.args {
        out.push('(');
        for (i, (name, value)) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&value.canonical_json());
        }
        out.push(')');
    }
    out.push('\n');
    for child in node.children.values() {
        dump_node(out, child, indent + 2);
    }
}
