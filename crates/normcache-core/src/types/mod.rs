//! # Core Type Definitions
//!
//! This module contains the data model shared by the store and both
//! traversals:
//! - Field slots and entities (`FieldValue`, `Entity`)
//! - Stored relations (`Link`)
//! - Read-side values (`Resolved`, `Completeness`)
//! - Error types (`CacheError`)
//!
//! ## Determinism Guarantees
//!
//! Entities use `BTreeMap` so iteration order (and therefore snapshots and
//! debug output) never depends on insertion order.

use crate::primitives::{ENTITY_KEY_SEPARATOR, TYPENAME_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Operation variables and evaluated field arguments.
pub type Variables = serde_json::Map<String, Json>;

/// Identifier of an optimistic layer.
pub type LayerId = u64;

// =============================================================================
// FIELD SLOTS & ENTITIES
// =============================================================================

/// The value held in one field slot of an entity.
///
/// A field key that is absent from the entity means "never cached"; there is
/// no variant for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// An inline value: a scalar, a list of scalars, or an embedded object.
    Scalar(Json),
    /// The field is a relation; its value lives in the link map.
    Link,
}

/// A flat mapping from field key to field slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity {
    fields: BTreeMap<String, FieldValue>,
}

impl Entity {
    /// Create a new empty entity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the slot stored under a field key.
    #[must_use]
    pub fn get(&self, field_key: &str) -> Option<&FieldValue> {
        self.fields.get(field_key)
    }

    /// Get an inline value stored under a field key.
    ///
    /// Returns `None` for link slots and for fields never cached.
    #[must_use]
    pub fn scalar(&self, field_key: &str) -> Option<&Json> {
        match self.fields.get(field_key) {
            Some(FieldValue::Scalar(value)) => Some(value),
            _ => None,
        }
    }

    /// Store a slot under a field key, replacing any previous slot.
    pub fn set(&mut self, field_key: impl Into<String>, value: FieldValue) {
        self.fields.insert(field_key.into(), value);
    }

    /// Remove a slot, returning it if it was present.
    pub fn remove(&mut self, field_key: &str) -> Option<FieldValue> {
        self.fields.remove(field_key)
    }

    /// Check whether a field key has ever been cached on this entity.
    #[must_use]
    pub fn contains(&self, field_key: &str) -> bool {
        self.fields.contains_key(field_key)
    }

    /// The concrete type name recorded on this entity, if any.
    #[must_use]
    pub fn typename(&self) -> Option<&str> {
        self.scalar(TYPENAME_FIELD).and_then(Json::as_str)
    }

    /// Number of cached field slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if no field has been cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over slots in field key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Overwrite this entity's slots with every slot of `newer`.
    pub fn merge_from(&mut self, newer: &Entity) {
        for (key, value) in &newer.fields {
            self.fields.insert(key.clone(), value.clone());
        }
    }
}

/// Extract the type name part of an entity key (`"Todo:1"` -> `"Todo"`).
///
/// Root keys carry no separator and are returned whole.
#[must_use]
pub fn typename_of_key(key: &str) -> &str {
    key.split_once(ENTITY_KEY_SEPARATOR)
        .map_or(key, |(typename, _)| typename)
}

// =============================================================================
// LINKS
// =============================================================================

/// A stored relation value.
///
/// A link that is absent from the link map means "unknown", which is distinct
/// from `Link::Null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Link {
    /// Explicit absence.
    Null,
    /// A single entity key.
    One(String),
    /// An ordered list; `None` slots are null list elements.
    Many(Vec<Option<String>>),
}

impl Link {
    /// Iterate over every entity key referenced by this link.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let (one, many) = match self {
            Link::Null => (None, None),
            Link::One(key) => (Some(key.as_str()), None),
            Link::Many(keys) => (None, Some(keys.iter().flatten().map(String::as_str))),
        };
        one.into_iter().chain(many.into_iter().flatten())
    }
}

// =============================================================================
// READ-SIDE VALUES
// =============================================================================

/// The outcome of resolving one field of one entity.
///
/// Resolvers return this type as well, so a resolver can answer with a
/// scalar, redirect to another cached entity, or report the field unknown.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// The field has never been cached.
    Missing,
    /// An explicit null: a null scalar, a null link, or a link off a
    /// non-normalizable parent.
    Null,
    /// An inline value (scalar, list of scalars, or embedded object).
    Scalar(Json),
    /// A linked entity that exists in the store.
    Entity { key: String, entity: Entity },
    /// A link pointing at a key with no stored entity.
    Dangling(String),
    /// A list link, slot for slot.
    List(Vec<Resolved>),
}

impl Resolved {
    /// Check if this is the "never cached" outcome.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Resolved::Missing)
    }
}

/// How much of a query's result could be answered from the cache.
///
/// Variants are ordered from least to most complete, so the verdict of a
/// tree is the minimum over its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Completeness {
    /// The root resolved no data at all.
    Empty,
    /// Some requested field, at some depth, was unresolved.
    Partial,
    /// Every requested field resolved.
    Full,
}

impl Completeness {
    /// Check if the result can be served without a network round-trip.
    #[must_use]
    pub fn is_full(self) -> bool {
        self == Completeness::Full
    }

    /// Combine two verdicts; the less complete one wins.
    #[must_use]
    pub fn degrade(self, other: Completeness) -> Completeness {
        self.min(other)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the cache.
///
/// Gaps in cached data are never errors; they degrade completeness instead.
/// Only malformed input and malformed configuration produce a `CacheError`.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An operation API was called with a document holding no operation.
    #[error("Document contains no operation")]
    MissingOperation,

    /// A fragment API was called with a document holding no fragment.
    #[error("Document contains no fragment definition")]
    MissingFragment,

    /// A payload does not have the shape the document requires.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Resolver, update or optimistic configuration is malformed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The introspection schema could not be read.
    #[error("Schema error: {0}")]
    Schema(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
