//! # Schema Predicates
//!
//! Schema-driven questions asked by the traversals: is a field nullable,
//! does a concrete type satisfy a type condition, what is a root type called.
//!
//! The schema is optional. Without one every predicate answers permissively;
//! that policy is decided once, by [`SchemaMode`], rather than at each call.
//! A type or field the schema does not know is a tolerated mismatch: the
//! answer is permissive and a `warn` diagnostic is emitted, since it usually
//! means the schema is stale.

use crate::document::OperationKind;
use crate::primitives::{DEFAULT_MUTATION_ROOT, DEFAULT_QUERY_ROOT, DEFAULT_SUBSCRIPTION_ROOT};
use crate::types::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// INTROSPECTION INPUT
// =============================================================================

/// The `__schema` object of an introspection result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    #[serde(default)]
    pub query_type: Option<NamedType>,
    #[serde(default)]
    pub mutation_type: Option<NamedType>,
    #[serde(default)]
    pub subscription_type: Option<NamedType>,
    pub types: Vec<IntrospectionType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedType {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionType {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default)]
    pub fields: Option<Vec<IntrospectionField>>,
    #[serde(default)]
    pub interfaces: Option<Vec<NamedType>>,
    #[serde(default)]
    pub possible_types: Option<Vec<NamedType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntrospectionField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
}

/// A possibly wrapped type reference (`[Todo!]!` and friends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: TypeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub of_type: Option<Box<TypeRef>>,
}

impl IntrospectionSchema {
    /// Read an introspection result.
    ///
    /// Accepts `{"data": {"__schema": ..}}`, `{"__schema": ..}` or the bare
    /// schema object.
    pub fn from_json(input: &str) -> Result<Self, CacheError> {
        let value: Json =
            serde_json::from_str(input).map_err(|e| CacheError::Schema(e.to_string()))?;
        let data = value.get("data").unwrap_or(&value);
        let schema = data.get("__schema").unwrap_or(data);
        Self::deserialize(schema).map_err(|e| CacheError::Schema(e.to_string()))
    }
}

// =============================================================================
// PREDICATES
// =============================================================================

/// Root operation type names.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RootNames {
    query: String,
    mutation: String,
    subscription: String,
}

impl Default for RootNames {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY_ROOT.to_string(),
            mutation: DEFAULT_MUTATION_ROOT.to_string(),
            subscription: DEFAULT_SUBSCRIPTION_ROOT.to_string(),
        }
    }
}

/// Nullability of one field, and of its items when it is a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nullability {
    field: bool,
    item: bool,
}

impl Nullability {
    fn of(ty: &TypeRef) -> Self {
        let (field, inner) = match (ty.kind, ty.of_type.as_deref()) {
            (TypeKind::NonNull, Some(inner)) => (false, inner),
            _ => (true, ty),
        };
        let item = match (inner.kind, inner.of_type.as_deref()) {
            (TypeKind::List, Some(item)) => item.kind != TypeKind::NonNull,
            _ => true,
        };
        Self { field, item }
    }
}

/// Structural information collected from a schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    /// typename -> field name -> nullability
    fields: BTreeMap<String, BTreeMap<String, Nullability>>,
    /// abstract typename -> concrete typenames
    possible_types: BTreeMap<String, BTreeSet<String>>,
}

/// Whether structural information is available.
#[derive(Debug, Clone)]
pub enum SchemaMode {
    /// No schema: every check passes.
    Permissive,
    /// Checks answer from the schema.
    Typed(SchemaIndex),
}

/// Schema-driven predicates used by the traversals.
#[derive(Debug, Clone)]
pub struct SchemaPredicates {
    roots: RootNames,
    mode: SchemaMode,
}

impl Default for SchemaPredicates {
    fn default() -> Self {
        Self::permissive()
    }
}

impl SchemaPredicates {
    /// Build predicates from an optional introspected schema.
    #[must_use]
    pub fn new(schema: Option<&IntrospectionSchema>) -> Self {
        match schema {
            Some(schema) => Self::from_schema(schema),
            None => Self::permissive(),
        }
    }

    /// Predicates with no schema behind them.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            roots: RootNames::default(),
            mode: SchemaMode::Permissive,
        }
    }

    fn from_schema(schema: &IntrospectionSchema) -> Self {
        let mut roots = RootNames::default();
        if let Some(t) = &schema.query_type {
            roots.query = t.name.clone();
        }
        if let Some(t) = &schema.mutation_type {
            roots.mutation = t.name.clone();
        }
        if let Some(t) = &schema.subscription_type {
            roots.subscription = t.name.clone();
        }

        let mut index = SchemaIndex::default();
        for ty in &schema.types {
            if let Some(fields) = &ty.fields {
                let nullability = fields
                    .iter()
                    .map(|f| (f.name.clone(), Nullability::of(&f.ty)))
                    .collect();
                index.fields.insert(ty.name.clone(), nullability);
            }

            match ty.kind {
                TypeKind::Union | TypeKind::Interface => {
                    let members = index.possible_types.entry(ty.name.clone()).or_default();
                    for possible in ty.possible_types.iter().flatten() {
                        members.insert(possible.name.clone());
                    }
                }
                TypeKind::Object => {
                    for interface in ty.interfaces.iter().flatten() {
                        index
                            .possible_types
                            .entry(interface.name.clone())
                            .or_default()
                            .insert(ty.name.clone());
                    }
                }
                _ => {}
            }
        }

        Self {
            roots,
            mode: SchemaMode::Typed(index),
        }
    }

    /// Check if there is no schema behind these predicates.
    #[must_use]
    pub fn is_permissive(&self) -> bool {
        matches!(self.mode, SchemaMode::Permissive)
    }

    /// The root type name for an operation kind.
    #[must_use]
    pub fn root_key(&self, operation: OperationKind) -> &str {
        match operation {
            OperationKind::Query => &self.roots.query,
            OperationKind::Mutation => &self.roots.mutation,
            OperationKind::Subscription => &self.roots.subscription,
        }
    }

    /// Check if a type name is one of the root operation types.
    #[must_use]
    pub fn is_root_type(&self, typename: &str) -> bool {
        typename == self.roots.query
            || typename == self.roots.mutation
            || typename == self.roots.subscription
    }

    /// Check if `typename.field` may be null.
    ///
    /// Unknown types and fields answer `true` with a diagnostic.
    #[must_use]
    pub fn is_field_nullable(&self, typename: &str, field: &str) -> bool {
        self.nullability(typename, field).is_none_or(|n| n.field)
    }

    /// Check if the items of the list field `typename.field` may be null.
    ///
    /// Answers `true` for fields that are not lists, and for unknown types
    /// and fields.
    #[must_use]
    pub fn is_list_item_nullable(&self, typename: &str, field: &str) -> bool {
        self.nullability(typename, field).is_none_or(|n| n.item)
    }

    fn nullability(&self, typename: &str, field: &str) -> Option<Nullability> {
        let SchemaMode::Typed(index) = &self.mode else {
            return None;
        };
        let Some(fields) = index.fields.get(typename) else {
            tracing::warn!(typename, field, "type missing from schema; assuming nullable");
            return None;
        };
        let nullability = fields.get(field).copied();
        if nullability.is_none() {
            tracing::warn!(typename, field, "field missing from schema; assuming nullable");
        }
        nullability
    }

    /// Check if `concrete` satisfies the type condition `type_condition`.
    #[must_use]
    pub fn is_interface_of_type(&self, type_condition: &str, concrete: &str) -> bool {
        if type_condition == concrete {
            return true;
        }
        let SchemaMode::Typed(index) = &self.mode else {
            return true;
        };
        index
            .possible_types
            .get(type_condition)
            .is_some_and(|members| members.contains(concrete))
    }

    /// Check if the schema defines `typename.field`, without diagnostics.
    #[must_use]
    pub fn has_field(&self, typename: &str, field: &str) -> bool {
        match &self.mode {
            SchemaMode::Permissive => true,
            SchemaMode::Typed(index) => index
                .fields
                .get(typename)
                .is_some_and(|fields| fields.contains_key(field)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
