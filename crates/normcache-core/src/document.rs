//! # Document Model
//!
//! The parsed shape of a GraphQL document as consumed by the traversals.
//!
//! Parsing and printing live outside this crate. Documents arrive either
//! already built through the builder API below, or as JSON deserialized with
//! serde (see the `normcache` CLI replay scripts).

use crate::keys::key_of_field;
use crate::types::Variables;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;

/// Fragment definitions in scope, by name.
pub type Fragments<'a> = BTreeMap<&'a str, &'a FragmentDefinition>;

// =============================================================================
// DEFINITIONS
// =============================================================================

/// A parsed document: operations and fragments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub definitions: Vec<Definition>,
}

/// A top-level definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}

/// The operation type of an operation definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    #[default]
    Query,
    Mutation,
    Subscription,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    #[serde(default)]
    pub operation: OperationKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub variables: Vec<VariableDefinition>,
    pub selection_set: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(default)]
    pub default_value: Option<Json>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: Vec<Selection>,
}

// =============================================================================
// SELECTIONS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub alias: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub directives: Vec<Directive>,
    #[serde(default)]
    pub selection_set: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub name: String,
    #[serde(default)]
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    #[serde(default)]
    pub type_condition: Option<String>,
    #[serde(default)]
    pub directives: Vec<Directive>,
    pub selection_set: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    pub value: InputValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Directive {
    pub name: String,
    #[serde(default)]
    pub arguments: Vec<Argument>,
}

/// An argument value as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputValue {
    Variable(String),
    Literal(Json),
    List(Vec<InputValue>),
    Object(BTreeMap<String, InputValue>),
}

impl InputValue {
    /// Evaluate against operation variables.
    ///
    /// Returns `None` when the value is a variable the caller did not define.
    /// Undefined variables inside lists become `null`; inside objects the
    /// entry is omitted.
    #[must_use]
    pub fn evaluate(&self, variables: &Variables) -> Option<Json> {
        match self {
            InputValue::Variable(name) => variables.get(name).cloned(),
            InputValue::Literal(value) => Some(value.clone()),
            InputValue::List(items) => Some(Json::Array(
                items
                    .iter()
                    .map(|item| item.evaluate(variables).unwrap_or(Json::Null))
                    .collect(),
            )),
            InputValue::Object(entries) => Some(Json::Object(
                entries
                    .iter()
                    .filter_map(|(k, v)| v.evaluate(variables).map(|v| (k.clone(), v)))
                    .collect(),
            )),
        }
    }
}

// =============================================================================
// DOCUMENT HELPERS
// =============================================================================

impl Document {
    /// Find an operation: the one named `name`, or the first one.
    #[must_use]
    pub fn operation(&self, name: Option<&str>) -> Option<&OperationDefinition> {
        self.definitions.iter().find_map(|definition| match definition {
            Definition::Operation(op) if name.is_none() || op.name.as_deref() == name => Some(op),
            _ => None,
        })
    }

    /// The first fragment definition of the document.
    #[must_use]
    pub fn first_fragment(&self) -> Option<&FragmentDefinition> {
        self.definitions.iter().find_map(|definition| match definition {
            Definition::Fragment(fragment) => Some(fragment),
            Definition::Operation(_) => None,
        })
    }

    /// All fragment definitions by name.
    #[must_use]
    pub fn fragments(&self) -> Fragments<'_> {
        self.definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
                Definition::Operation(_) => None,
            })
            .collect()
    }
}

impl OperationDefinition {
    /// Fill in declared default values for variables the caller omitted.
    #[must_use]
    pub fn normalize_variables(&self, input: &Variables) -> Variables {
        let mut variables = input.clone();
        for definition in &self.variables {
            if let Some(default) = &definition.default_value {
                variables
                    .entry(definition.name.clone())
                    .or_insert_with(|| default.clone());
            }
        }
        variables
    }
}

impl Field {
    /// The key this field's value has in a response object.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Evaluate arguments; `None` when there are none after evaluation.
    #[must_use]
    pub fn arguments(&self, variables: &Variables) -> Option<Variables> {
        let args: Variables = self
            .arguments
            .iter()
            .filter_map(|arg| arg.value.evaluate(variables).map(|v| (arg.name.clone(), v)))
            .collect();
        (!args.is_empty()).then_some(args)
    }

    /// The storage key of this field invocation.
    #[must_use]
    pub fn field_key(&self, variables: &Variables) -> String {
        key_of_field(&self.name, self.arguments(variables).as_ref())
    }

    /// Check if the field has a sub-selection.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        !self.selection_set.is_empty()
    }
}

/// Evaluate `@skip(if:)` and `@include(if:)`.
#[must_use]
pub fn should_include(directives: &[Directive], variables: &Variables) -> bool {
    directives.iter().all(|directive| {
        let condition = directive
            .arguments
            .iter()
            .find(|arg| arg.name == "if")
            .and_then(|arg| arg.value.evaluate(variables));
        match (directive.name.as_str(), condition) {
            ("skip", Some(Json::Bool(true))) => false,
            ("include", Some(Json::Bool(false))) => false,
            _ => true,
        }
    })
}

// =============================================================================
// FIELD COLLECTION
// =============================================================================

/// Flatten a selection set into its fields, expanding fragments.
///
/// `matches(type_condition, selection_set)` decides whether a fragment with a
/// type condition applies to the current object. Fragments without a type
/// condition always apply. Selections excluded by `@skip`/`@include` are
/// dropped.
///
/// Returns `false` if a fragment spread named an undeclared fragment; such a
/// spread contributes no fields.
pub fn collect_fields<'a>(
    selection_set: &'a [Selection],
    fragments: &Fragments<'a>,
    variables: &Variables,
    matches: &mut dyn FnMut(&str, &'a [Selection]) -> bool,
    out: &mut Vec<&'a Field>,
) -> bool {
    let mut complete = true;
    for selection in selection_set {
        match selection {
            Selection::Field(field) => {
                if should_include(&field.directives, variables) {
                    out.push(field);
                }
            }
            Selection::InlineFragment(inline) => {
                if !should_include(&inline.directives, variables) {
                    continue;
                }
                let applies = match &inline.type_condition {
                    Some(condition) => matches(condition.as_str(), &inline.selection_set),
                    None => true,
                };
                if applies {
                    complete &=
                        collect_fields(&inline.selection_set, fragments, variables, matches, out);
                }
            }
            Selection::FragmentSpread(spread) => {
                if !should_include(&spread.directives, variables) {
                    continue;
                }
                let Some(fragment) = fragments.get(spread.name.as_str()) else {
                    tracing::warn!(fragment = %spread.name, "undeclared fragment spread; treating as empty");
                    complete = false;
                    continue;
                };
                if matches(fragment.type_condition.as_str(), &fragment.selection_set) {
                    complete &=
                        collect_fields(&fragment.selection_set, fragments, variables, matches, out);
                }
            }
        }
    }
    complete
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Document {
    /// A document holding one anonymous query.
    #[must_use]
    pub fn query(selection_set: Vec<Selection>) -> Self {
        Self::operation_of(OperationKind::Query, selection_set)
    }

    /// A document holding one anonymous mutation.
    #[must_use]
    pub fn mutation(selection_set: Vec<Selection>) -> Self {
        Self::operation_of(OperationKind::Mutation, selection_set)
    }

    /// A document holding one fragment definition.
    #[must_use]
    pub fn fragment(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: Vec<Selection>,
    ) -> Self {
        Self::default().with_fragment(name, type_condition, selection_set)
    }

    /// Append a fragment definition.
    #[must_use]
    pub fn with_fragment(
        mut self,
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: Vec<Selection>,
    ) -> Self {
        self.definitions
            .push(Definition::Fragment(FragmentDefinition {
                name: name.into(),
                type_condition: type_condition.into(),
                selection_set,
            }));
        self
    }

    /// Declare a variable with a default value on the first operation.
    #[must_use]
    pub fn with_variable_default(mut self, name: impl Into<String>, default: Json) -> Self {
        let definition = VariableDefinition {
            name: name.into(),
            default_value: Some(default),
        };
        if let Some(Definition::Operation(op)) = self
            .definitions
            .iter_mut()
            .find(|d| matches!(d, Definition::Operation(_)))
        {
            op.variables.push(definition);
        }
        self
    }

    fn operation_of(operation: OperationKind, selection_set: Vec<Selection>) -> Self {
        Self {
            definitions: vec![Definition::Operation(OperationDefinition {
                operation,
                name: None,
                variables: Vec::new(),
                selection_set,
            })],
        }
    }
}

impl Field {
    /// A field with no alias, arguments or sub-selection.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            alias: None,
            name: name.into(),
            arguments: Vec::new(),
            directives: Vec::new(),
            selection_set: Vec::new(),
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: InputValue) -> Self {
        self.arguments.push(Argument {
            name: name.into(),
            value,
        });
        self
    }

    #[must_use]
    pub fn directive(mut self, name: impl Into<String>, condition: InputValue) -> Self {
        self.directives.push(Directive {
            name: name.into(),
            arguments: vec![Argument {
                name: "if".to_string(),
                value: condition,
            }],
        });
        self
    }

    #[must_use]
    pub fn select(mut self, selection_set: Vec<Selection>) -> Self {
        self.selection_set = selection_set;
        self
    }
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Selection::Field(field)
    }
}

impl Selection {
    /// A named fragment spread.
    #[must_use]
    pub fn spread(name: impl Into<String>) -> Self {
        Selection::FragmentSpread(FragmentSpread {
            name: name.into(),
            directives: Vec::new(),
        })
    }

    /// An inline fragment with a type condition.
    #[must_use]
    pub fn on(type_condition: impl Into<String>, selection_set: Vec<Selection>) -> Self {
        Selection::InlineFragment(InlineFragment {
            type_condition: Some(type_condition.into()),
            directives: Vec::new(),
            selection_set,
        })
    }
}

/// Plain leaf fields, in order.
#[must_use]
pub fn fields(names: &[&str]) -> Vec<Selection> {
    names.iter().map(|name| Field::new(*name).into()).collect()
}

// =============================================================================
// TESTS
// =============================================================================
