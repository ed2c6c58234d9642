//! # Cache Configuration
//!
//! User functions keyed by `(typename, field)`:
//! - resolvers override the value a read returns for a field
//! - update handlers run after a field has been written
//! - optimistic handlers produce speculative mutation results
//!
//! Configuration is validated once, when the store is built. A malformed
//! table is a programmer error and is reported then, never mid-traversal.

use crate::document::Fragments;
use crate::schema::{IntrospectionSchema, SchemaPredicates};
use crate::store::Store;
use crate::types::{CacheError, Entity, LayerId, Resolved, Variables};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Context handed to resolvers and handlers.
#[derive(Debug, Clone, Copy)]
pub struct ResolveInfo<'a> {
    /// Key of the entity owning the field.
    pub parent_key: &'a str,
    /// Concrete typename of the owning entity.
    pub parent_typename: &'a str,
    pub field_name: &'a str,
    pub field_key: &'a str,
    /// Fragment definitions of the document being traversed.
    pub fragments: &'a Fragments<'a>,
    /// Normalized operation variables.
    pub variables: &'a Variables,
    /// The optimistic layer being written, if any.
    pub optimistic: Option<LayerId>,
}

/// Overrides the value of a field at read time.
pub type Resolver =
    Arc<dyn Fn(&Entity, &Variables, &Store, &ResolveInfo<'_>) -> Resolved + Send + Sync>;

/// Runs after a field (and its subtree) has been written.
pub type UpdateHandler =
    Arc<dyn Fn(&Json, &Variables, &mut Store, &ResolveInfo<'_>) + Send + Sync>;

/// Produces the speculative result of one mutation root field.
pub type OptimisticHandler =
    Arc<dyn Fn(&Variables, &Store, &ResolveInfo<'_>) -> Json + Send + Sync>;

/// A `(typename, field)` pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldCoordinate {
    pub typename: String,
    pub field: String,
}

impl FieldCoordinate {
    #[must_use]
    pub fn new(typename: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            typename: typename.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for FieldCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.typename, self.field)
    }
}

/// Configuration accepted at store construction.
#[derive(Clone, Default)]
pub struct CacheConfig {
    schema: Option<IntrospectionSchema>,
    resolvers: BTreeMap<FieldCoordinate, Resolver>,
    updates: BTreeMap<FieldCoordinate, UpdateHandler>,
    /// Keyed by mutation root field name.
    optimistic: BTreeMap<String, OptimisticHandler>,
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("schema", &self.schema.is_some())
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .field("updates", &self.updates.keys().collect::<Vec<_>>())
            .field("optimistic", &self.optimistic.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl CacheConfig {
    /// An empty configuration: no schema, no user functions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an introspected schema.
    #[must_use]
    pub fn schema(mut self, schema: IntrospectionSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Register a resolver for `typename.field`.
    #[must_use]
    pub fn resolver<F>(mut self, typename: &str, field: &str, resolver: F) -> Self
    where
        F: Fn(&Entity, &Variables, &Store, &ResolveInfo<'_>) -> Resolved + Send + Sync + 'static,
    {
        self.resolvers
            .insert(FieldCoordinate::new(typename, field), Arc::new(resolver));
        self
    }

    /// Register an update handler for `typename.field`.
    #[must_use]
    pub fn update<F>(mut self, typename: &str, field: &str, handler: F) -> Self
    where
        F: Fn(&Json, &Variables, &mut Store, &ResolveInfo<'_>) + Send + Sync + 'static,
    {
        self.updates
            .insert(FieldCoordinate::new(typename, field), Arc::new(handler));
        self
    }

    /// Register an optimistic handler for a mutation root field.
    #[must_use]
    pub fn optimistic<F>(mut self, field: &str, handler: F) -> Self
    where
        F: Fn(&Variables, &Store, &ResolveInfo<'_>) -> Json + Send + Sync + 'static,
    {
        self.optimistic.insert(field.to_string(), Arc::new(handler));
        self
    }

    /// The attached schema, if any.
    #[must_use]
    pub fn introspection(&self) -> Option<&IntrospectionSchema> {
        self.schema.as_ref()
    }

    #[must_use]
    pub fn resolver_for(&self, typename: &str, field: &str) -> Option<&Resolver> {
        self.resolvers.get(&FieldCoordinate::new(typename, field))
    }

    #[must_use]
    pub fn update_for(&self, typename: &str, field: &str) -> Option<&UpdateHandler> {
        self.updates.get(&FieldCoordinate::new(typename, field))
    }

    #[must_use]
    pub fn optimistic_for(&self, field: &str) -> Option<&OptimisticHandler> {
        self.optimistic.get(field)
    }

    /// Reject malformed tables.
    ///
    /// Names must be non-empty. With a schema, every coordinate must name a
    /// field the schema defines, and optimistic handlers must name fields of
    /// the mutation root.
    pub fn validate(&self, predicates: &SchemaPredicates) -> Result<(), CacheError> {
        let mutation_root = predicates
            .root_key(crate::document::OperationKind::Mutation)
            .to_string();
        let coordinates = self
            .resolvers
            .keys()
            .map(|c| ("resolver", c.clone()))
            .chain(self.updates.keys().map(|c| ("update", c.clone())))
            .chain(
                self.optimistic
                    .keys()
                    .map(|field| ("optimistic", FieldCoordinate::new(&mutation_root, field))),
            );

        for (kind, coordinate) in coordinates {
            if coordinate.typename.is_empty() || coordinate.field.is_empty() {
                return Err(CacheError::InvalidConfig(format!(
                    "{kind} registered with an empty name: {coordinate:?}"
                )));
            }
            if !predicates.has_field(&coordinate.typename, &coordinate.field) {
                return Err(CacheError::InvalidConfig(format!(
                    "{kind} targets {coordinate}, which the schema does not define"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
