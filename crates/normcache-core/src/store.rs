//! # Store Module
//!
//! The Store owns the two primary maps of the cache:
//! - entity records: entity key -> `Entity`
//! - links: link key -> `Link`
//!
//! Both maps are layered. Base state holds committed data, overlays hold
//! speculative writes of optimistic mutations.
//!
//! ## Active Layer
//!
//! Every mutating accessor writes to the *active layer*: the optimistic layer
//! of the write currently in progress, or the base when there is none. Update
//! handlers invoked during an optimistic write therefore land in the same
//! overlay as the write that triggered them.
//!
//! ## Per-Layer Records
//!
//! An overlay holds only the fields written in that layer. `find` merges the
//! record stack newest-first and stops at a tombstone, so a removal in a layer
//! hides everything older without touching it.

use crate::config::CacheConfig;
use crate::document::Document;
use crate::keys::{self, join_keys, key_of_field};
use crate::layered::Layered;
use crate::primitives::{FALLBACK_ID_FIELD, ID_FIELD, TYPENAME_FIELD};
use crate::read::{self, ReadResult};
use crate::schema::SchemaPredicates;
use crate::types::{CacheError, Entity, FieldValue, LayerId, Link, Resolved, Variables};
use crate::write::{self, WriteResult};
use serde::Serialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A read-only view of everything visible in a store.
///
/// Used for inspection and debugging. It is never loaded back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    /// Visible records, merged across layers.
    pub records: BTreeMap<String, Entity>,
    /// Visible links.
    pub links: BTreeMap<String, Link>,
    /// Open optimistic layers, newest first.
    pub layers: Vec<LayerId>,
}

/// The normalized cache store.
#[derive(Debug, Clone)]
pub struct Store {
    records: Layered<Entity>,
    links: Layered<Link>,
    config: Arc<CacheConfig>,
    schema: Arc<SchemaPredicates>,
    /// The layer mutations are routed to; `None` means base.
    optimistic_key: Option<LayerId>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            records: Layered::new(),
            links: Layered::new(),
            config: Arc::new(CacheConfig::new()),
            schema: Arc::new(SchemaPredicates::permissive()),
            optimistic_key: None,
        }
    }
}

impl Store {
    /// Create a store from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidConfig` if a resolver, update handler or
    /// optimistic handler is registered under an invalid coordinate.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let schema = SchemaPredicates::new(config.introspection());
        config.validate(&schema)?;
        tracing::debug!(?config, permissive = schema.is_permissive(), "store created");
        Ok(Self {
            config: Arc::new(config),
            schema: Arc::new(schema),
            ..Self::default()
        })
    }

    /// Schema predicates of this store.
    #[must_use]
    pub fn schema(&self) -> &SchemaPredicates {
        &self.schema
    }

    /// The user configuration of this store.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Shared handles used by the write traversal, which must hand
    /// `&mut Store` to update handlers while holding the configuration.
    pub(crate) fn handles(&self) -> (Arc<CacheConfig>, Arc<SchemaPredicates>) {
        (Arc::clone(&self.config), Arc::clone(&self.schema))
    }

    /// The layer mutations are currently routed to.
    #[must_use]
    pub fn active_layer(&self) -> Option<LayerId> {
        self.optimistic_key
    }

    /// Derive the entity key of an object.
    ///
    /// Objects whose `__typename` is a root operation type are keyed by the
    /// type name alone.
    #[must_use]
    pub fn key_of_entity(&self, data: &Json) -> Option<String> {
        let typename = data.get(TYPENAME_FIELD).and_then(Json::as_str)?;
        if self.schema.is_root_type(typename) {
            return Some(typename.to_string());
        }
        keys::key_of_entity(data)
    }

    /// Derive the key of a stored record from its identifying fields.
    fn key_of_record(&self, entity: &Entity) -> Option<String> {
        let probe: serde_json::Map<String, Json> = [TYPENAME_FIELD, ID_FIELD, FALLBACK_ID_FIELD]
            .into_iter()
            .filter_map(|field| entity.scalar(field).map(|v| (field.to_string(), v.clone())))
            .collect();
        self.key_of_entity(&Json::Object(probe))
    }

    // =========================================================================
    // RECORDS
    // =========================================================================

    /// Exact lookup of a record, merged across layers. Never creates.
    #[must_use]
    pub fn find(&self, key: &str) -> Option<Entity> {
        let mut visible = Vec::new();
        for slot in self.records.stack(key) {
            match slot {
                Some(entity) => visible.push(entity),
                None => break,
            }
        }
        if visible.is_empty() {
            return None;
        }

        let mut merged = Entity::new();
        for entity in visible.into_iter().rev() {
            merged.merge_from(entity);
        }
        Some(merged)
    }

    /// The record for `key` in the active layer, created empty if absent.
    ///
    /// In an overlay the returned entity holds only the fields written in
    /// that layer; use `find` for the merged view.
    pub fn find_or_create(&mut self, key: &str) -> &mut Entity {
        self.records.slot_mut(key, self.optimistic_key)
    }

    /// Delete a record. Links pointing at it are left dangling.
    pub fn remove(&mut self, key: &str) {
        self.records.set(key, None, self.optimistic_key);
    }

    /// Store one field slot on a record.
    pub fn write_field(&mut self, key: &str, field_key: &str, value: FieldValue) {
        self.find_or_create(key).set(field_key, value);
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    /// Read a link by its joined link key. `None` means unknown.
    #[must_use]
    pub fn read_link(&self, link_key: &str) -> Option<&Link> {
        self.links.get(link_key)
    }

    /// Store a link under its joined link key.
    pub fn set_link(&mut self, link_key: &str, link: Link) {
        self.links.set(link_key, Some(link), self.optimistic_key);
    }

    /// Forget a link, making it unknown again.
    pub fn remove_link(&mut self, link_key: &str) {
        self.links.set(link_key, None, self.optimistic_key);
    }

    // =========================================================================
    // RESOLUTION
    // =========================================================================

    /// Find the record of a normalizable object.
    #[must_use]
    pub fn resolve_entity(&self, data: &Json) -> Option<Entity> {
        self.key_of_entity(data).and_then(|key| self.find(&key))
    }

    /// Resolve an entity key, for resolvers that redirect to cached data.
    #[must_use]
    pub fn resolve_key(&self, key: &str) -> Resolved {
        match self.find(key) {
            Some(entity) => Resolved::Entity {
                key: key.to_string(),
                entity,
            },
            None => Resolved::Dangling(key.to_string()),
        }
    }

    /// Resolve one field of an already-known record.
    ///
    /// Links are followed; list slots whose entity is gone stay in place as
    /// `Resolved::Dangling`. A field never cached is `Resolved::Missing`.
    #[must_use]
    pub fn resolve_property(
        &self,
        parent: &Entity,
        field_name: &str,
        args: Option<&Variables>,
    ) -> Resolved {
        let field_key = key_of_field(field_name, args);
        let parent_key = self.key_of_record(parent);
        self.resolve_field(parent, parent_key.as_deref(), &field_key)
    }

    /// `resolve_property` for callers that already know both keys.
    pub(crate) fn resolve_field(
        &self,
        parent: &Entity,
        parent_key: Option<&str>,
        field_key: &str,
    ) -> Resolved {
        match parent.get(field_key) {
            None => Resolved::Missing,
            Some(FieldValue::Scalar(Json::Null)) => Resolved::Null,
            Some(FieldValue::Scalar(value)) => Resolved::Scalar(value.clone()),
            Some(FieldValue::Link) => {
                // Links off a non-normalizable parent cannot be addressed.
                let Some(parent_key) = parent_key else {
                    return Resolved::Null;
                };
                match self.read_link(&join_keys(parent_key, field_key)) {
                    None => Resolved::Missing,
                    Some(Link::Null) => Resolved::Null,
                    Some(Link::One(key)) => self.resolve_key(key),
                    Some(Link::Many(keys)) => Resolved::List(
                        keys.iter()
                            .map(|slot| match slot {
                                Some(key) => self.resolve_key(key),
                                None => Resolved::Null,
                            })
                            .collect(),
                    ),
                }
            }
        }
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Answer a query from the cache.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::MissingOperation` if the document has no
    /// operation. Gaps in cached data only degrade completeness.
    pub fn read(&self, document: &Document, variables: &Variables) -> Result<ReadResult, CacheError> {
        read::read_query(self, document, variables)
    }

    /// Normalize a response into base state.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no operation or `data` is not an
    /// object.
    pub fn write(
        &mut self,
        document: &Document,
        variables: &Variables,
        data: &Json,
    ) -> Result<WriteResult, CacheError> {
        write::write_query(self, document, variables, data, None)
    }

    /// Normalize a response into an optimistic layer.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Store::write`].
    pub fn write_in_layer(
        &mut self,
        document: &Document,
        variables: &Variables,
        data: &Json,
        layer: LayerId,
    ) -> Result<WriteResult, CacheError> {
        write::write_query(self, document, variables, data, Some(layer))
    }

    /// Write the speculative result produced by the optimistic handlers of
    /// a mutation's root fields into `layer`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::MissingOperation` if the document has no
    /// operation.
    pub fn write_optimistic(
        &mut self,
        document: &Document,
        variables: &Variables,
        layer: LayerId,
    ) -> Result<WriteResult, CacheError> {
        write::write_optimistic(self, document, variables, layer)
    }

    /// Promote the real result of an optimistic mutation: write it to base,
    /// then drop the layer.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Store::write`]. The layer is left open on error.
    pub fn commit(
        &mut self,
        document: &Document,
        variables: &Variables,
        data: &Json,
        layer: LayerId,
    ) -> Result<WriteResult, CacheError> {
        let result = self.write(document, variables, data)?;
        self.clear_layer(layer);
        Ok(result)
    }

    /// Drop an optimistic layer. Idempotent.
    pub fn clear_layer(&mut self, layer: LayerId) {
        self.records.clear(layer);
        self.links.clear(layer);
    }

    /// Open optimistic layers, newest first.
    #[must_use]
    pub fn optimistic_layers(&self) -> Vec<LayerId> {
        self.records.layers()
    }

    /// Read the cached result of `document`, hand it to `updater` and write
    /// back whatever it returns.
    ///
    /// The current value is passed even when incomplete, and is `None` when
    /// nothing is cached. Returning `None` leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the document has no operation or the updated
    /// value is not an object.
    pub fn update_query<F>(
        &mut self,
        document: &Document,
        variables: &Variables,
        updater: F,
    ) -> Result<WriteResult, CacheError>
    where
        F: FnOnce(Option<Json>) -> Option<Json>,
    {
        let current = self.read(document, variables)?.data;
        let Some(updated) = updater(current) else {
            return Ok(WriteResult::default());
        };
        let layer = self.optimistic_key;
        write::write_query(self, document, variables, &updated, layer)
    }

    /// Read the first fragment of `document` off one entity.
    ///
    /// `entity` is either an entity key string or an object with
    /// `__typename` and `id`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::MissingFragment` if the document has no fragment.
    pub fn read_fragment(
        &self,
        document: &Document,
        entity: &Json,
        variables: &Variables,
    ) -> Result<ReadResult, CacheError> {
        read::read_fragment(self, document, entity, variables)
    }

    /// Normalize `data` through the first fragment of `document`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::MissingFragment` if the document has no fragment
    /// and `CacheError::InvalidData` if `data` is not an object.
    pub fn write_fragment(
        &mut self,
        document: &Document,
        data: &Json,
        variables: &Variables,
    ) -> Result<WriteResult, CacheError> {
        write::write_fragment(self, document, data, variables)
    }

    /// Everything currently visible.
    #[must_use]
    pub fn snapshot(&self) -> StoreSnapshot {
        let records = self
            .records
            .keys()
            .into_iter()
            .filter_map(|key| self.find(key).map(|entity| (key.to_string(), entity)))
            .collect();
        let links = self
            .links
            .keys()
            .into_iter()
            .filter_map(|key| self.read_link(key).map(|link| (key.to_string(), link.clone())))
            .collect();
        StoreSnapshot {
            records,
            links,
            layers: self.optimistic_layers(),
        }
    }

    /// Run `f` with mutations routed to `layer`, restoring the previous
    /// routing afterwards.
    pub(crate) fn with_layer<T>(
        &mut self,
        layer: Option<LayerId>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        if let Some(layer) = layer {
            // Both maps must agree on layer order.
            self.records.open(layer);
            self.links.open(layer);
        }
        let previous = std::mem::replace(&mut self.optimistic_key, layer);
        let result = f(self);
        self.optimistic_key = previous;
        result
    }
}

// =============================================================================
// TESTS
// =============================================================================
