//! # Key Derivation
//!
//! Canonical identity strings for entities, field invocations and links.
//!
//! All functions here are pure. The same logical input always produces the
//! same key, regardless of the property order of the JSON it came from.

use crate::primitives::{
    ENTITY_KEY_SEPARATOR, FALLBACK_ID_FIELD, ID_FIELD, LINK_KEY_SEPARATOR, TYPENAME_FIELD,
};
use crate::types::Variables;
use serde_json::Value as Json;

/// Derive `"<typename>:<id>"` for a normalizable object.
///
/// Returns `None` when `__typename` is absent or empty, or when neither `id`
/// nor `_id` carries a non-null value. `id` takes precedence over `_id`.
#[must_use]
pub fn key_of_entity(data: &Json) -> Option<String> {
    let object = data.as_object()?;
    let typename = object
        .get(TYPENAME_FIELD)
        .and_then(Json::as_str)
        .filter(|name| !name.is_empty())?;

    let id = [ID_FIELD, FALLBACK_ID_FIELD]
        .iter()
        .filter_map(|field| object.get(*field))
        .find(|value| !value.is_null())?;

    let id = match id {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    };

    Some(format!("{typename}{ENTITY_KEY_SEPARATOR}{id}"))
}

/// Derive the key of one field invocation.
///
/// Without arguments the key is the field name. Otherwise the arguments are
/// appended in a serialization whose object keys are sorted, so argument
/// insertion order never affects the key.
#[must_use]
pub fn key_of_field(name: &str, args: Option<&Variables>) -> String {
    match args {
        Some(args) if !args.is_empty() => {
            let canonical = canonicalize(&Json::Object(args.clone()));
            format!("{name}({canonical})")
        }
        _ => name.to_string(),
    }
}

/// Join an entity key and a field key into a link key.
#[must_use]
pub fn join_keys(parent_key: &str, field_key: &str) -> String {
    format!("{parent_key}{LINK_KEY_SEPARATOR}{field_key}")
}

/// Rebuild a JSON value with every object's keys in sorted order.
///
/// The map is rebuilt explicitly because `serde_json` may be compiled with
/// `preserve_order`, in which case maps keep insertion order.
#[must_use]
pub fn canonicalize(value: &Json) -> Json {
    match value {
        Json::Object(object) => {
            let mut entries: Vec<(&String, &Json)> = object.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Json::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Json::Array(items) => Json::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
