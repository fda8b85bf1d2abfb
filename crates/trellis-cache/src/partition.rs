//! Query partitioner: rebuild a document containing only the selections a
//! completeness check flagged missing.
//!
//! The original selection set is walked in lock-step with the compiled tree,
//! pairing selections with compiled nodes by response key and re-evaluating
//! directive inclusion exactly as compilation did. A selection whose
//! compiled id is missing is kept verbatim: its whole subtree, variable
//! references and directives intact. Everything else survives only as a
//! pruned copy around deeper missing selections. Fragments flatten into
//! plain selections: a pruned fragment could no longer reuse its original
//! definition.

use std::collections::HashSet;

use indexmap::IndexMap;

use trellis_core::{Document, Field, Operation, Selection, SelectionSet};

use crate::compile::{
    CompiledFieldNode, CompiledOperation, FieldId, Variables, evaluate_directives,
};

/// Build the reduced document for `missing`.
///
/// Callers with nothing missing should reuse the original document instead.
pub fn partition(
    document: &Document,
    operation: &CompiledOperation,
    variables: &Variables,
    missing: &[FieldId],
) -> Document {
    let missing: HashSet<FieldId> = missing.iter().copied().collect();
    let pruner = Pruner {
        document,
        variables,
        missing,
    };
    let selections = pruner.prune_set(&document.operation.selection_set, &operation.root);

    Document {
        operation: Operation {
            name: document.operation.name.clone(),
            // The reduced query runs with the same variables.
            variable_definitions: document.operation.variable_definitions.clone(),
            selection_set: SelectionSet { selections },
        },
        fragments: IndexMap::new(),
    }
}

struct Pruner<'a> {
    document: &'a Document,
    variables: &'a Variables,
    missing: HashSet<FieldId>,
}

impl Pruner<'_> {
    fn prune_set(
        &self,
        set: &SelectionSet,
        level: &IndexMap<String, CompiledFieldNode>,
    ) -> Vec<Selection> {
        let mut out = Vec::new();
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    if !self.included(&field.directives) {
                        continue;
                    }
                    let Some(node) = level.get(field.response_key()) else {
                        continue;
                    };
                    if self.missing.contains(&node.id) {
                        out.push(Selection::Field(field.clone()));
                    } else if let Some(sub) = &field.selection_set {
                        let pruned = self.prune_set(sub, &node.children);
                        if !pruned.is_empty() {
                            out.push(Selection::Field(Field {
                                alias: field.alias.clone(),
                                name: field.name.clone(),
                                arguments: field.arguments.clone(),
                                directives: field.directives.clone(),
                                selection_set: Some(SelectionSet { selections: pruned }),
                            }));
                        }
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.included(&spread.directives) {
                        continue;
                    }
                    if let Some(fragment) = self.document.fragments.get(&spread.name) {
                        out.extend(self.prune_set(&fragment.selection_set, level));
                    }
                }
                Selection::InlineFragment(inline) => {
                    if self.included(&inline.directives) {
                        out.extend(self.prune_set(&inline.selection_set, level));
                    }
                }
            }
        }
        out
    }

    fn included(&self, directives: &[trellis_core::Directive]) -> bool {
        evaluate_directives(
            directives,
            self.variables,
            &self.document.operation.variable_definitions,
        )
    }
}
