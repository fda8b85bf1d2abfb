//! Query compiler: selection set + bound variables → compiled field tree.
//!
//! Compilation resolves everything a read would otherwise re-derive per
//! node: aliases become response keys, fragment spreads and inline fragments
//! are flattened into their enclosing level, `@skip`/`@include` are evaluated
//! against the bound variables, and argument values (including variable
//! references) are resolved to concrete values. Later passes never look at
//! the original query syntax again.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use trellis_core::{
    ArgValue, Directive, Document, Field, Selection, SelectionSet, Value, VariableDefinition,
};

use crate::error::{Error, Result};

/// Variable values bound for one read.
pub type Variables = IndexMap<String, Value>;

/// Dense compile-time id of a compiled field node.
///
/// Missing-selection bookkeeping and partitioning work on ids rather than
/// node references, so results can outlive borrows of the compiled tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(pub u32);

/// One compiled field within an operation.
#[derive(Clone, Debug)]
pub struct CompiledFieldNode {
    pub id: FieldId,
    /// Key the field's value is read and written under (alias if aliased).
    pub response_key: String,
    /// Underlying field name; recorded only when it differs from the
    /// response key.
    pub schema_name: Option<String>,
    /// Resolved arguments. Presence marks the field as parameterized.
    pub args: Option<IndexMap<String, Value>>,
    /// Sub-selections keyed by response key. Empty for leaf fields.
    pub children: IndexMap<String, CompiledFieldNode>,
    /// Whether this node or any descendant carries arguments. Set once by a
    /// bottom-up pass after the tree is built.
    pub has_parameterized_children: bool,
}

impl CompiledFieldNode {
    pub fn is_parameterized(&self) -> bool {
        self.args.is_some()
    }

    /// The schema-side field name (falls back to the response key when the
    /// field is unaliased).
    pub fn field_name(&self) -> &str {
        self.schema_name.as_deref().unwrap_or(&self.response_key)
    }
}

/// A compiled operation. Immutable after compilation; safe to share across
/// reads against different snapshots.
#[derive(Clone, Debug)]
pub struct CompiledOperation {
    /// Root-level fields keyed by response key.
    pub root: IndexMap<String, CompiledFieldNode>,
    /// Names of every variable the operation referenced.
    pub variables_used: BTreeSet<String>,
    /// True when no directive conditionally filtered a selection and no
    /// field referenced a variable: the compiled tree cannot change across
    /// calls, so results for it can be memoized indefinitely.
    pub is_static: bool,
}

impl CompiledOperation {
    /// Whether any field anywhere in the operation is parameterized.
    pub fn has_parameterized_fields(&self) -> bool {
        self.root.values().any(|node| node.has_parameterized_children)
    }
}

/// Compile an operation's selection set against bound variable values.
pub fn compile(document: &Document, variables: &Variables) -> Result<CompiledOperation> {
    let mut compiler = Compiler {
        document,
        variables,
        next_id: 0,
        variables_used: BTreeSet::new(),
        saw_conditional: false,
        saw_variable: false,
    };

    let mut root = IndexMap::new();
    compiler.collect(&document.operation.selection_set, &mut root)?;
    if root.is_empty() {
        return Err(Error::EmptySelectionSet);
    }

    for node in root.values_mut() {
        mark_parameterized(node);
    }

    Ok(CompiledOperation {
        root,
        variables_used: compiler.variables_used,
        is_static: !compiler.saw_conditional && !compiler.saw_variable,
    })
}

struct Compiler<'a> {
    document: &'a Document,
    variables: &'a Variables,
    next_id: u32,
    variables_used: BTreeSet<String>,
    saw_conditional: bool,
    saw_variable: bool,
}

impl Compiler<'_> {
    fn collect(
        &mut self,
        set: &SelectionSet,
        out: &mut IndexMap<String, CompiledFieldNode>,
    ) -> Result<()> {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => {
                    if self.include(&field.directives) {
                        self.collect_field(field, out)?;
                    }
                }
                Selection::FragmentSpread(spread) => {
                    if !self.include(&spread.directives) {
                        continue;
                    }
                    let Some(fragment) = self.document.fragments.get(&spread.name) else {
                        return Err(Error::UnknownFragment(spread.name.clone()));
                    };
                    // Type conditions are treated as always matching: the
                    // compiler has no schema to test them against.
                    self.collect(&fragment.selection_set, out)?;
                }
                Selection::InlineFragment(inline) => {
                    if self.include(&inline.directives) {
                        self.collect(&inline.selection_set, out)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn collect_field(
        &mut self,
        field: &Field,
        out: &mut IndexMap<String, CompiledFieldNode>,
    ) -> Result<()> {
        let key = field.response_key();

        // The same response key twice means repeated identical fields; merge
        // the sub-selections instead of overwriting the node.
        if let Some(existing) = out.get_mut(key) {
            if let Some(set) = &field.selection_set {
                return self.collect(set, &mut existing.children);
            }
            return Ok(());
        }

        let id = self.fresh_id();
        let schema_name = (key != field.name).then(|| field.name.clone());
        let args = (!field.arguments.is_empty()).then(|| self.resolve_args(&field.arguments));

        let mut node = CompiledFieldNode {
            id,
            response_key: key.to_owned(),
            schema_name,
            args,
            children: IndexMap::new(),
            has_parameterized_children: false,
        };
        if let Some(set) = &field.selection_set {
            self.collect(set, &mut node.children)?;
        }
        out.insert(node.response_key.clone(), node);
        Ok(())
    }

    fn fresh_id(&mut self) -> FieldId {
        let id = FieldId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Evaluate a selection's directives, tracking what makes the operation
    /// non-static.
    fn include(&mut self, directives: &[Directive]) -> bool {
        for directive in directives {
            if matches!(directive.name.as_str(), "skip" | "include") {
                self.saw_conditional = true;
                for arg in directive.arguments.values() {
                    self.note_variables(arg);
                }
            }
        }
        evaluate_directives(
            directives,
            self.variables,
            &self.document.operation.variable_definitions,
        )
    }

    fn note_variables(&mut self, arg: &ArgValue) {
        match arg {
            ArgValue::Variable(name) => {
                self.saw_variable = true;
                self.variables_used.insert(name.clone());
            }
            ArgValue::List(items) => {
                for item in items {
                    self.note_variables(item);
                }
            }
            ArgValue::Object(map) => {
                for value in map.values() {
                    self.note_variables(value);
                }
            }
            ArgValue::Literal(_) => {}
        }
    }

    fn resolve_args(&mut self, args: &IndexMap<String, ArgValue>) -> IndexMap<String, Value> {
        args.iter()
            .map(|(name, arg)| (name.clone(), self.resolve_arg(arg)))
            .collect()
    }

    fn resolve_arg(&mut self, arg: &ArgValue) -> Value {
        match arg {
            ArgValue::Literal(value) => value.clone(),
            ArgValue::Variable(name) => {
                self.saw_variable = true;
                self.variables_used.insert(name.clone());
                lookup_variable(
                    name,
                    self.variables,
                    &self.document.operation.variable_definitions,
                )
                .cloned()
                .unwrap_or(Value::Null)
            }
            ArgValue::List(items) => {
                Value::Array(items.iter().map(|item| self.resolve_arg(item)).collect())
            }
            ArgValue::Object(map) => Value::Object(
                map.iter()
                    .map(|(name, value)| (name.clone(), self.resolve_arg(value)))
                    .collect(),
            ),
        }
    }
}

/// Bottom-up parameterized marking: a node is marked when it or any
/// descendant carries arguments.
fn mark_parameterized(node: &mut CompiledFieldNode) -> bool {
    let mut parameterized = node.args.is_some();
    for child in node.children.values_mut() {
        parameterized |= mark_parameterized(child);
    }
    node.has_parameterized_children = parameterized;
    parameterized
}

/// Evaluate `@skip`/`@include` against bound variables.
///
/// Unknown directives, and conditions that are missing or not boolean, leave
/// the selection included. The partitioner calls this too, so inclusion
/// decisions match compilation exactly.
pub(crate) fn evaluate_directives(
    directives: &[Directive],
    variables: &Variables,
    definitions: &[VariableDefinition],
) -> bool {
    for directive in directives {
        let condition = directive
            .arguments
            .get("if")
            .and_then(|arg| resolve_condition(arg, variables, definitions));
        match directive.name.as_str() {
            "skip" => {
                if condition.unwrap_or(false) {
                    return false;
                }
            }
            "include" => {
                if !condition.unwrap_or(true) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn resolve_condition(
    arg: &ArgValue,
    variables: &Variables,
    definitions: &[VariableDefinition],
) -> Option<bool> {
    match arg {
        ArgValue::Literal(value) => value.as_bool(),
        ArgValue::Variable(name) => {
            lookup_variable(name, variables, definitions).and_then(Value::as_bool)
        }
        _ => None,
    }
}

/// Resolve a variable: bound value first, then the operation's declared
/// default.
pub(crate) fn lookup_variable<'a>(
    name: &str,
    variables: &'a Variables,
    definitions: &'a [VariableDefinition],
) -> Option<&'a Value> {
    variables.get(name).or_else(|| {
        definitions
            .iter()
            .find(|definition| definition.name == name)
            .and_then(|definition| definition.default.as_ref())
    })
}
