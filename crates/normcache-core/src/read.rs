//! # Read Traversal
//!
//! Walks a query document against the store and builds a result tree shaped
//! like the selection set, along with a completeness verdict.
//!
//! ## Completeness
//!
//! The verdict starts at `FULL` and only ever degrades:
//! - a field never cached, or a link to a removed entity, is `PARTIAL`
//! - a null on a field the schema declares non-null is `PARTIAL`, and so is
//!   a null slot in a list whose items are non-null
//! - a spread of an undeclared fragment is `PARTIAL`
//! - when no root field resolved at all, the verdict is `EMPTY`
//!
//! Unresolved fields appear as `null` in the tree. A read never fails
//! because of missing data.

use crate::config::ResolveInfo;
use crate::document::{collect_fields, Document, Field, Fragments, Selection};
use crate::primitives::{MAX_SELECTION_DEPTH, TYPENAME_FIELD};
use crate::schema::SchemaPredicates;
use crate::store::Store;
use crate::types::{typename_of_key, CacheError, Completeness, Entity, Resolved, Variables};
use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;

/// The outcome of a read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadResult {
    /// The result tree; `None` when the verdict is `EMPTY`.
    pub data: Option<Json>,
    pub completeness: Completeness,
    /// Entity keys the result was built from.
    pub dependencies: BTreeSet<String>,
}

impl ReadResult {
    fn empty(dependencies: BTreeSet<String>) -> Self {
        Self {
            data: None,
            completeness: Completeness::Empty,
            dependencies,
        }
    }
}

/// Read the first operation of `document`.
pub fn read_query(
    store: &Store,
    document: &Document,
    variables: &Variables,
) -> Result<ReadResult, CacheError> {
    let operation = document.operation(None).ok_or(CacheError::MissingOperation)?;
    let variables = operation.normalize_variables(variables);
    let fragments = document.fragments();
    let root_key = store.schema().root_key(operation.operation);
    let root = store.find(root_key).unwrap_or_default();

    let mut ctx = ReadContext::new(store, &fragments, &variables);
    ctx.dependencies.insert(root_key.to_string());
    let (data, resolved) = ctx.read_record(root_key, &root, &operation.selection_set, 0);
    Ok(ctx.finish(data, resolved))
}

/// Read the first fragment of `document` off one entity.
pub fn read_fragment(
    store: &Store,
    document: &Document,
    entity: &Json,
    variables: &Variables,
) -> Result<ReadResult, CacheError> {
    let fragment = document.first_fragment().ok_or(CacheError::MissingFragment)?;
    let key = match entity {
        Json::String(key) => Some(key.clone()),
        other => store.key_of_entity(other),
    };
    let Some(key) = key else {
        tracing::warn!(fragment = %fragment.name, "cannot read fragment off an unkeyed object");
        return Ok(ReadResult::empty(BTreeSet::new()));
    };
    let Some(record) = store.find(&key) else {
        return Ok(ReadResult::empty(BTreeSet::from([key])));
    };

    let fragments = document.fragments();
    let mut ctx = ReadContext::new(store, &fragments, variables);
    ctx.dependencies.insert(key.clone());
    let (data, resolved) = ctx.read_record(&key, &record, &fragment.selection_set, 0);
    Ok(ctx.finish(data, resolved))
}

// =============================================================================
// TRAVERSAL
// =============================================================================

/// State of one read.
struct ReadContext<'a> {
    store: &'a Store,
    schema: &'a SchemaPredicates,
    fragments: &'a Fragments<'a>,
    variables: &'a Variables,
    completeness: Completeness,
    dependencies: BTreeSet<String>,
}

impl<'a> ReadContext<'a> {
    fn new(store: &'a Store, fragments: &'a Fragments<'a>, variables: &'a Variables) -> Self {
        Self {
            store,
            schema: store.schema(),
            fragments,
            variables,
            completeness: Completeness::Full,
            dependencies: BTreeSet::new(),
        }
    }

    fn finish(self, data: Map<String, Json>, resolved: bool) -> ReadResult {
        if !resolved {
            return ReadResult::empty(self.dependencies);
        }
        ReadResult {
            data: Some(Json::Object(data)),
            completeness: self.completeness,
            dependencies: self.dependencies,
        }
    }

    fn partial(&mut self) {
        self.completeness = self.completeness.degrade(Completeness::Partial);
    }

    /// Read a selection set off a record.
    ///
    /// Returns the result object and whether any selected field resolved
    /// (vacuously true for an empty selection).
    fn read_record(
        &mut self,
        key: &str,
        entity: &Entity,
        selection_set: &'a [Selection],
        depth: usize,
    ) -> (Map<String, Json>, bool) {
        let typename = entity.typename().unwrap_or_else(|| typename_of_key(key));

        let schema = self.schema;
        let variables = self.variables;
        let fragments = self.fragments;
        let mut matches =
            |condition: &str, _: &'a [Selection]| fragment_matches(schema, condition, Some(typename));
        let mut fields = Vec::new();
        if !collect_fields(selection_set, fragments, variables, &mut matches, &mut fields) {
            self.partial();
        }

        let mut out = Map::new();
        let mut any_resolved = fields.is_empty();
        for field in fields {
            let value = if field.name == TYPENAME_FIELD {
                Some(Json::String(typename.to_string()))
            } else {
                let resolved = self.resolve(key, typename, entity, field);
                self.complete(resolved, field, typename, depth)
            };
            any_resolved |= value.is_some();
            insert_merged(&mut out, field.response_key(), value.unwrap_or(Json::Null));
        }
        (out, any_resolved)
    }

    /// Resolve one field of a record, through its resolver if one is
    /// registered.
    fn resolve(&self, key: &str, typename: &str, entity: &Entity, field: &Field) -> Resolved {
        let field_key = field.field_key(self.variables);
        match self.store.config().resolver_for(typename, &field.name) {
            Some(resolver) => {
                let args = field.arguments(self.variables).unwrap_or_default();
                let info = ResolveInfo {
                    parent_key: key,
                    parent_typename: typename,
                    field_name: &field.name,
                    field_key: &field_key,
                    fragments: self.fragments,
                    variables: self.variables,
                    optimistic: self.store.active_layer(),
                };
                resolver(entity, &args, self.store, &info)
            }
            None => self.store.resolve_field(entity, Some(key), &field_key),
        }
    }

    /// Turn a resolved value into output. `None` marks an unresolved value.
    fn complete(
        &mut self,
        resolved: Resolved,
        field: &'a Field,
        parent_typename: &str,
        depth: usize,
    ) -> Option<Json> {
        match resolved {
            Resolved::Missing => {
                self.partial();
                None
            }
            Resolved::Null => {
                if !self.schema.is_field_nullable(parent_typename, &field.name) {
                    self.partial();
                }
                Some(Json::Null)
            }
            Resolved::Dangling(key) => {
                tracing::debug!(%key, field = %field.name, "link points at a removed entity");
                self.dependencies.insert(key);
                self.partial();
                None
            }
            Resolved::Scalar(value) if field.is_composite() => {
                if !self.descend(field, depth) {
                    return None;
                }
                Some(self.read_embedded(&value, &field.selection_set, depth + 1))
            }
            Resolved::Scalar(value) => Some(value),
            Resolved::Entity { key, entity } => {
                self.dependencies.insert(key.clone());
                if !field.is_composite() {
                    return Some(Json::String(key));
                }
                if !self.descend(field, depth) {
                    return None;
                }
                let (data, _) = self.read_record(&key, &entity, &field.selection_set, depth + 1);
                Some(Json::Object(data))
            }
            Resolved::List(items) => {
                let item_nullable = self.schema.is_list_item_nullable(parent_typename, &field.name);
                Some(Json::Array(
                    items
                        .into_iter()
                        .map(|item| {
                            self.complete_item(item, field, parent_typename, item_nullable, depth)
                        })
                        .collect(),
                ))
            }
        }
    }

    /// Complete one slot of a list; a null slot is checked against the
    /// item type, not the field.
    fn complete_item(
        &mut self,
        item: Resolved,
        field: &'a Field,
        parent_typename: &str,
        nullable: bool,
        depth: usize,
    ) -> Json {
        match item {
            Resolved::Null => {
                if !nullable {
                    self.partial();
                }
                Json::Null
            }
            other => self
                .complete(other, field, parent_typename, depth)
                .unwrap_or(Json::Null),
        }
    }

    /// Check the nesting bound before entering a sub-selection.
    fn descend(&mut self, field: &Field, depth: usize) -> bool {
        if depth < MAX_SELECTION_DEPTH {
            return true;
        }
        tracing::warn!(field = %field.name, depth, "selection nested too deeply; treating as unresolved");
        self.partial();
        false
    }

    /// Read a selection set off an embedded value.
    fn read_embedded(&mut self, value: &Json, selection_set: &'a [Selection], depth: usize) -> Json {
        match value {
            Json::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.read_embedded(item, selection_set, depth))
                    .collect(),
            ),
            Json::Object(object) => {
                let typename = object.get(TYPENAME_FIELD).and_then(Json::as_str);

                let schema = self.schema;
                let variables = self.variables;
                let mut matches =
                    |condition: &str, _: &'a [Selection]| fragment_matches(schema, condition, typename);
                let mut fields = Vec::new();
                if !collect_fields(selection_set, self.fragments, variables, &mut matches, &mut fields) {
                    self.partial();
                }

                let mut out = Map::new();
                for field in fields {
                    let field_key = field.field_key(self.variables);
                    let value = match object.get(&field_key) {
                        None => {
                            self.partial();
                            Json::Null
                        }
                        Some(nested) if field.is_composite() => {
                            if self.descend(field, depth) {
                                self.read_embedded(nested, &field.selection_set, depth + 1)
                            } else {
                                Json::Null
                            }
                        }
                        Some(leaf) => leaf.clone(),
                    };
                    insert_merged(&mut out, field.response_key(), value);
                }
                Json::Object(out)
            }
            other => other.clone(),
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Decide whether a fragment with `condition` applies to an object.
///
/// Without a schema, or without a known typename, every fragment applies:
/// its fields are then required, so gaps show up as `PARTIAL`.
fn fragment_matches(schema: &SchemaPredicates, condition: &str, typename: Option<&str>) -> bool {
    typename.is_none_or(|typename| schema.is_interface_of_type(condition, typename))
}

/// Insert a response value, deep-merging objects selected more than once.
fn insert_merged(out: &mut Map<String, Json>, response_key: &str, value: Json) {
    if let Some(existing) = out.get_mut(response_key) {
        merge_json(existing, value);
    } else {
        out.insert(response_key.to_string(), value);
    }
}

fn merge_json(existing: &mut Json, incoming: Json) {
    match (existing, incoming) {
        (Json::Object(left), Json::Object(right)) => {
            for (key, value) in right {
                insert_merged(left, &key, value);
            }
        }
        (Json::Array(left), Json::Array(right)) if left.len() == right.len() => {
            for (slot, value) in left.iter_mut().zip(right) {
                merge_json(slot, value);
            }
        }
        (_, Json::Null) => {}
        (slot, incoming) => *slot = incoming,
    }
}

// =============================================================================
// TESTS
// =============================================================================
