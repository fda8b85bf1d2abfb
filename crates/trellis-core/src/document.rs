//! Query document AST.
//!
//! The cache consumes an already-parsed document: one operation plus the
//! named fragments it may spread. Parsing query text into this shape is the
//! host's concern. Constructors below keep hand-built documents compact.

use indexmap::IndexMap;

use crate::value::Value;

/// A parsed query document: a single operation and its fragments.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub operation: Operation,
    pub fragments: IndexMap<String, FragmentDefinition>,
}

impl Document {
    /// A query with the given root selections and no fragments.
    pub fn query(selections: Vec<Selection>) -> Self {
        Document {
            operation: Operation {
                name: None,
                variable_definitions: Vec::new(),
                selection_set: SelectionSet { selections },
            },
            fragments: IndexMap::new(),
        }
    }

    pub fn with_fragment(mut self, fragment: FragmentDefinition) -> Self {
        self.fragments.insert(fragment.name.clone(), fragment);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, default: Option<Value>) -> Self {
        self.operation.variable_definitions.push(VariableDefinition {
            name: name.into(),
            default,
        });
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub name: Option<String>,
    pub variable_definitions: Vec<VariableDefinition>,
    pub selection_set: SelectionSet,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VariableDefinition {
    pub name: String,
    pub default: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

/// A field selection: `alias: name(args) @directives { sub-selections }`.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub alias: Option<String>,
    pub name: String,
    pub arguments: IndexMap<String, ArgValue>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// A leaf field with no alias, arguments, or directives.
    pub fn new(name: impl Into<String>) -> Self {
        Field {
            alias: None,
            name: name.into(),
            arguments: IndexMap::new(),
            directives: Vec::new(),
            selection_set: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }

    pub fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn with_selections(mut self, selections: Vec<Selection>) -> Self {
        self.selection_set = Some(SelectionSet { selections });
        self
    }

    /// The key this field's value appears under in a result: the alias if
    /// present, else the field name.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Selection::Field(field)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FragmentSpread {
    pub name: String,
    pub directives: Vec<Directive>,
}

impl FragmentSpread {
    pub fn new(name: impl Into<String>) -> Self {
        FragmentSpread {
            name: name.into(),
            directives: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct InlineFragment {
    pub type_condition: Option<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: SelectionSet,
}

impl FragmentDefinition {
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selections: Vec<Selection>,
    ) -> Self {
        FragmentDefinition {
            name: name.into(),
            type_condition: type_condition.into(),
            selection_set: SelectionSet { selections },
        }
    }
}

/// A directive attached to a selection, e.g. `@include(if: $flag)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Directive {
    pub name: String,
    pub arguments: IndexMap<String, ArgValue>,
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Directive {
            name: name.into(),
            arguments: IndexMap::new(),
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// An argument value as written in the query: a literal, a variable
/// reference, or a list/object possibly containing either.
#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    Literal(Value),
    Variable(String),
    List(Vec<ArgValue>),
    Object(IndexMap<String, ArgValue>),
}

impl ArgValue {
    pub fn literal(value: impl Into<Value>) -> Self {
        ArgValue::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        ArgValue::Variable(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_key_prefers_alias() {
        let plain = Field::new("user");
        assert_eq!(plain.response_key(), "user");

        let aliased = Field::new("user").with_alias("me");
        assert_eq!(aliased.response_key(), "me");
    }

    #[test]
    fn builders_compose() {
        let doc = Document::query(vec![
            Field::new("user")
                .with_arg("id", ArgValue::literal(5i64))
                .with_selections(vec![Field::new("name").into()])
                .into(),
        ])
        .with_variable("flag", Some(Value::Bool(true)));

        assert_eq!(doc.operation.selection_set.selections.len(), 1);
        assert_eq!(doc.operation.variable_definitions[0].name, "flag");
        let Selection::Field(user) = &doc.operation.selection_set.selections[0] else {
            panic!("expected a field");
        };
        assert_eq!(user.arguments["id"], ArgValue::Literal(Value::Number(5.0)));
        assert!(user.selection_set.as_ref().is_some_and(|s| !s.is_empty()));
    }
}
