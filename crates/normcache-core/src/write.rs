//! # Write Traversal
//!
//! Walks a document and a response payload in lock-step and normalizes the
//! payload into the store.
//!
//! For each object in the payload:
//! - a normalizable object becomes a record; every composite field of it
//!   becomes a link slot plus a link
//! - any other object is embedded inline into its parent's field slot,
//!   keyed by field keys
//!
//! Update handlers run after a field and its subtree have been written, in
//! document order, before the next sibling.
//!
//! All mutations go through the store's active layer, so a write scoped to
//! an optimistic layer never touches base state.

use crate::config::{CacheConfig, ResolveInfo};
use crate::document::{collect_fields, Document, Field, Fragments, OperationKind, Selection};
use crate::keys::join_keys;
use crate::primitives::{FALLBACK_ID_FIELD, ID_FIELD, MAX_SELECTION_DEPTH, TYPENAME_FIELD};
use crate::schema::SchemaPredicates;
use crate::store::Store;
use crate::types::{CacheError, FieldValue, LayerId, Link, Variables};
use serde::Serialize;
use serde_json::{Map, Value as Json};
use std::collections::BTreeSet;
use std::sync::Arc;

/// The outcome of a write.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteResult {
    /// Entity keys written, in key order.
    pub dependencies: BTreeSet<String>,
}

/// Normalize the result of the first operation of `document`.
pub fn write_query(
    store: &mut Store,
    document: &Document,
    variables: &Variables,
    data: &Json,
    layer: Option<LayerId>,
) -> Result<WriteResult, CacheError> {
    let operation = document.operation(None).ok_or(CacheError::MissingOperation)?;
    let Json::Object(data) = data else {
        return Err(CacheError::InvalidData(
            "operation result must be an object".to_string(),
        ));
    };
    let variables = operation.normalize_variables(variables);
    let fragments = document.fragments();

    store.with_layer(layer, |store| {
        let mut ctx = WriteContext::new(store, &fragments, &variables, layer);
        let root_key = ctx.schema.root_key(operation.operation).to_string();
        ctx.write_root(store, &root_key, operation.operation, &operation.selection_set, data);
        Ok(ctx.finish())
    })
}

/// Write the payload produced by optimistic handlers into `layer`.
///
/// Root fields without a handler are left out of the payload. When no
/// handler applies nothing is written and no layer is opened.
pub fn write_optimistic(
    store: &mut Store,
    document: &Document,
    variables: &Variables,
    layer: LayerId,
) -> Result<WriteResult, CacheError> {
    let operation = document.operation(None).ok_or(CacheError::MissingOperation)?;
    let normalized = operation.normalize_variables(variables);
    let fragments = document.fragments();
    let (config, schema) = store.handles();
    let root_key = schema.root_key(operation.operation);

    let mut always = |_: &str, _: &[Selection]| true;
    let mut fields = Vec::new();
    collect_fields(&operation.selection_set, &fragments, &normalized, &mut always, &mut fields);

    let mut payload = Map::new();
    for field in fields {
        let Some(handler) = config.optimistic_for(&field.name) else {
            tracing::debug!(field = %field.name, "no optimistic handler for root field");
            continue;
        };
        let args = field.arguments(&normalized).unwrap_or_default();
        let field_key = field.field_key(&normalized);
        let info = ResolveInfo {
            parent_key: root_key,
            parent_typename: root_key,
            field_name: &field.name,
            field_key: &field_key,
            fragments: &fragments,
            variables: &normalized,
            optimistic: Some(layer),
        };
        let value = handler(&args, &*store, &info);
        payload.insert(field.response_key().to_string(), value);
    }

    if payload.is_empty() {
        return Ok(WriteResult::default());
    }
    write_query(store, document, variables, &Json::Object(payload), Some(layer))
}

/// Normalize `data` through the first fragment of `document`, into the
/// store's active layer.
pub fn write_fragment(
    store: &mut Store,
    document: &Document,
    data: &Json,
    variables: &Variables,
) -> Result<WriteResult, CacheError> {
    let fragment = document.first_fragment().ok_or(CacheError::MissingFragment)?;
    let Json::Object(object) = data else {
        return Err(CacheError::InvalidData(
            "fragment data must be an object".to_string(),
        ));
    };
    let Some(key) = store.key_of_entity(data) else {
        tracing::warn!(
            fragment = %fragment.name,
            "fragment data has no __typename or id; nothing written"
        );
        return Ok(WriteResult::default());
    };

    let fragments = document.fragments();
    let layer = store.active_layer();
    let mut ctx = WriteContext::new(store, &fragments, variables, layer);
    ctx.write_entity(store, &key, object, &fragment.selection_set, 0);
    Ok(ctx.finish())
}

// =============================================================================
// TRAVERSAL
// =============================================================================

/// What a composite field turned into.
enum Slot {
    Link(Link),
    Embedded(Json),
}

/// State of one write.
///
/// Holds its own handles on the configuration so the store can be lent
/// mutably to update handlers.
struct WriteContext<'a> {
    config: Arc<CacheConfig>,
    schema: Arc<SchemaPredicates>,
    fragments: &'a Fragments<'a>,
    variables: &'a Variables,
    layer: Option<LayerId>,
    dependencies: BTreeSet<String>,
}

impl<'a> WriteContext<'a> {
    fn new(
        store: &Store,
        fragments: &'a Fragments<'a>,
        variables: &'a Variables,
        layer: Option<LayerId>,
    ) -> Self {
        let (config, schema) = store.handles();
        Self {
            config,
            schema,
            fragments,
            variables,
            layer,
            dependencies: BTreeSet::new(),
        }
    }

    fn finish(self) -> WriteResult {
        WriteResult {
            dependencies: self.dependencies,
        }
    }

    /// Flatten a selection set against a payload object.
    fn fields_of(&self, selection_set: &'a [Selection], object: &Map<String, Json>) -> Vec<&'a Field> {
        let typename = object.get(TYPENAME_FIELD).and_then(Json::as_str);
        let schema = &self.schema;
        let mut matches = |condition: &str, _: &[Selection]| match typename {
            Some(typename) => schema.is_interface_of_type(condition, typename),
            None => true,
        };
        let mut fields = Vec::new();
        collect_fields(selection_set, self.fragments, self.variables, &mut matches, &mut fields);
        fields
    }

    fn write_root(
        &mut self,
        store: &mut Store,
        root_key: &str,
        operation: OperationKind,
        selection_set: &'a [Selection],
        data: &Map<String, Json>,
    ) {
        if operation == OperationKind::Query {
            self.dependencies.insert(root_key.to_string());
            store.write_field(root_key, TYPENAME_FIELD, FieldValue::Scalar(Json::from(root_key)));
        }

        let fields = self.fields_of(selection_set, data);
        for field in fields {
            let Some(value) = data.get(field.response_key()) else {
                tracing::debug!(field = %field.response_key(), "field missing from payload");
                continue;
            };
            if operation == OperationKind::Query {
                self.write_field(store, root_key, root_key, field, value, 0);
                continue;
            }
            // Mutation and subscription results are not cached on the root.
            let field_key = field.field_key(self.variables);
            if field.is_composite() {
                self.write_composite(store, &join_keys(root_key, &field_key), field, value, 0);
            }
            self.run_update(store, root_key, root_key, field, &field_key, value);
        }
    }

    /// Write the selected fields of a normalizable object into its record.
    fn write_entity(
        &mut self,
        store: &mut Store,
        key: &str,
        object: &Map<String, Json>,
        selection_set: &'a [Selection],
        depth: usize,
    ) {
        self.dependencies.insert(key.to_string());
        for system in [TYPENAME_FIELD, ID_FIELD, FALLBACK_ID_FIELD] {
            if let Some(value) = object.get(system).filter(|v| !v.is_null()) {
                store.write_field(key, system, FieldValue::Scalar(value.clone()));
            }
        }

        let typename = object
            .get(TYPENAME_FIELD)
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string();
        for field in self.fields_of(selection_set, object) {
            match object.get(field.response_key()) {
                Some(value) => self.write_field(store, key, &typename, field, value, depth),
                None => {
                    tracing::debug!(%key, field = %field.response_key(), "field missing from payload");
                }
            }
        }
    }

    /// Write one field of a record, then run its update handler.
    fn write_field(
        &mut self,
        store: &mut Store,
        owner_key: &str,
        owner_typename: &str,
        field: &'a Field,
        value: &Json,
        depth: usize,
    ) {
        let field_key = field.field_key(self.variables);
        if !field.is_composite() {
            store.write_field(owner_key, &field_key, FieldValue::Scalar(value.clone()));
        } else {
            let path = join_keys(owner_key, &field_key);
            match self.write_composite(store, &path, field, value, depth) {
                Some(Slot::Link(link)) => {
                    store.write_field(owner_key, &field_key, FieldValue::Link);
                    store.set_link(&path, link);
                }
                Some(Slot::Embedded(embedded)) => {
                    store.write_field(owner_key, &field_key, FieldValue::Scalar(embedded));
                }
                None => return,
            }
        }
        self.run_update(store, owner_key, owner_typename, field, &field_key, value);
    }

    /// Normalize the value of a composite field.
    ///
    /// `path` addresses the field slot and is handed to update handlers of
    /// embedded objects as their parent key. Returns `None` when the
    /// selection is nested too deeply to write.
    fn write_composite(
        &mut self,
        store: &mut Store,
        path: &str,
        field: &'a Field,
        value: &Json,
        depth: usize,
    ) -> Option<Slot> {
        if depth >= MAX_SELECTION_DEPTH {
            tracing::warn!(field = %field.name, depth, "selection nested too deeply; not written");
            return None;
        }
        let selection_set = &field.selection_set;
        let slot = match value {
            Json::Null => Slot::Link(Link::Null),
            Json::Object(object) => match store.key_of_entity(value) {
                Some(key) => {
                    self.write_entity(store, &key, object, selection_set, depth + 1);
                    Slot::Link(Link::One(key))
                }
                None => Slot::Embedded(self.embed(store, path, value, selection_set, depth + 1)),
            },
            Json::Array(items) if items.iter().all(|item| is_linkable(store, item)) => {
                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    let key = match (item, store.key_of_entity(item)) {
                        (Json::Object(object), Some(key)) => {
                            self.write_entity(store, &key, object, selection_set, depth + 1);
                            Some(key)
                        }
                        _ => None,
                    };
                    keys.push(key);
                }
                Slot::Link(Link::Many(keys))
            }
            Json::Array(_) => Slot::Embedded(self.embed(store, path, value, selection_set, depth + 1)),
            scalar => {
                tracing::warn!(field = %field.name, "scalar value under a sub-selection; stored inline");
                Slot::Embedded(scalar.clone())
            }
        };
        Some(slot)
    }

    /// Build the inline form of a non-normalizable value.
    ///
    /// Normalizable objects found inside are also written as records, with
    /// their own update handlers. Fields of embedded objects run the update
    /// handlers registered for the embedded typename.
    fn embed(
        &mut self,
        store: &mut Store,
        path: &str,
        value: &Json,
        selection_set: &'a [Selection],
        depth: usize,
    ) -> Json {
        match value {
            Json::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.embed(store, path, item, selection_set, depth))
                    .collect(),
            ),
            Json::Object(object) => {
                if let Some(key) = store.key_of_entity(value) {
                    self.write_entity(store, &key, object, selection_set, depth);
                    return self.project(value, selection_set, depth);
                }

                let typename = object.get(TYPENAME_FIELD).and_then(Json::as_str);
                let mut out = Map::new();
                if let Some(typename) = typename {
                    out.insert(TYPENAME_FIELD.to_string(), Json::from(typename));
                }
                for field in self.fields_of(selection_set, object) {
                    let Some(nested) = object.get(field.response_key()) else {
                        continue;
                    };
                    let field_key = field.field_key(self.variables);
                    let embedded = if field.is_composite() && depth < MAX_SELECTION_DEPTH {
                        let nested_path = join_keys(path, &field_key);
                        self.embed(store, &nested_path, nested, &field.selection_set, depth + 1)
                    } else {
                        nested.clone()
                    };
                    out.insert(field_key.clone(), embedded);
                    if let Some(typename) = typename {
                        self.run_update(store, path, typename, field, &field_key, nested);
                    }
                }
                Json::Object(out)
            }
            other => other.clone(),
        }
    }

    /// The inline copy of a value, keyed by field keys, without touching
    /// the store.
    fn project(&self, value: &Json, selection_set: &'a [Selection], depth: usize) -> Json {
        match value {
            Json::Array(items) => Json::Array(
                items
                    .iter()
                    .map(|item| self.project(item, selection_set, depth))
                    .collect(),
            ),
            Json::Object(object) => {
                let mut out = Map::new();
                for system in [TYPENAME_FIELD, ID_FIELD, FALLBACK_ID_FIELD] {
                    if let Some(v) = object.get(system) {
                        out.insert(system.to_string(), v.clone());
                    }
                }
                for field in self.fields_of(selection_set, object) {
                    let Some(nested) = object.get(field.response_key()) else {
                        continue;
                    };
                    let projected = if field.is_composite() && depth < MAX_SELECTION_DEPTH {
                        self.project(nested, &field.selection_set, depth + 1)
                    } else {
                        nested.clone()
                    };
                    out.insert(field.field_key(self.variables), projected);
                }
                Json::Object(out)
            }
            other => other.clone(),
        }
    }

    fn run_update(
        &self,
        store: &mut Store,
        parent_key: &str,
        parent_typename: &str,
        field: &Field,
        field_key: &str,
        value: &Json,
    ) {
        let Some(handler) = self.config.update_for(parent_typename, &field.name) else {
            return;
        };
        let args = field.arguments(self.variables).unwrap_or_default();
        let info = ResolveInfo {
            parent_key,
            parent_typename,
            field_name: &field.name,
            field_key,
            fragments: self.fragments,
            variables: self.variables,
            optimistic: self.layer,
        };
        handler(value, &args, store, &info);
    }
}

/// A list becomes a link only when every item is null or normalizable.
fn is_linkable(store: &Store, item: &Json) -> bool {
    item.is_null() || store.key_of_entity(item).is_some()
}

// =============================================================================
// TESTS
// =============================================================================
