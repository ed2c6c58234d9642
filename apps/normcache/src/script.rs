//! # Replay Scripts
//!
//! A replay script is a JSON file listing cache operations in order:
//!
//! ```json
//! { "steps": [
//!     { "op": "write", "document": { ... }, "data": { ... } },
//!     { "op": "write_optimistic", "document": { ... }, "data": { ... }, "layer": 1 },
//!     { "op": "read", "document": { ... } },
//!     { "op": "revert", "layer": 1 }
//! ] }
//! ```
//!
//! Documents use the serde form of `normcache_core::Document`. Every step
//! yields an [`Outcome`].

use normcache_core::{CacheError, Completeness, Document, LayerId, Store, Variables};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::BTreeSet;

/// An ordered list of cache operations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

impl Script {
    /// Parse a script from JSON text.
    pub fn from_json(input: &str) -> Result<Self, CacheError> {
        serde_json::from_str(input)
            .map_err(|e| CacheError::SerializationError(format!("Invalid script: {}", e)))
    }
}

/// One cache operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Normalize a response into base state.
    Write {
        document: Document,
        #[serde(default)]
        variables: Variables,
        data: Json,
    },
    /// Answer a query from the cache.
    Read {
        document: Document,
        #[serde(default)]
        variables: Variables,
    },
    /// Normalize a speculative response into an optimistic layer.
    WriteOptimistic {
        document: Document,
        #[serde(default)]
        variables: Variables,
        data: Json,
        layer: LayerId,
    },
    /// Write the real response to base and drop the layer.
    Commit {
        document: Document,
        #[serde(default)]
        variables: Variables,
        data: Json,
        layer: LayerId,
    },
    /// Drop an optimistic layer.
    Revert { layer: LayerId },
    /// Delete an entity record.
    Remove { key: String },
    WriteFragment {
        document: Document,
        #[serde(default)]
        variables: Variables,
        data: Json,
    },
    ReadFragment {
        document: Document,
        #[serde(default)]
        variables: Variables,
        /// Entity key string or an object with `__typename` and `id`.
        entity: Json,
    },
}

impl Step {
    /// The `op` tag of this step.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Write { .. } => "write",
            Step::Read { .. } => "read",
            Step::WriteOptimistic { .. } => "write_optimistic",
            Step::Commit { .. } => "commit",
            Step::Revert { .. } => "revert",
            Step::Remove { .. } => "remove",
            Step::WriteFragment { .. } => "write_fragment",
            Step::ReadFragment { .. } => "read_fragment",
        }
    }
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    /// Zero-based position in the script.
    pub step: usize,
    pub op: &'static str,
    /// Set for reads only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
    /// Set for reads that produced data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    /// Entity keys read or written.
    pub dependencies: BTreeSet<String>,
    /// Open optimistic layers after the step, newest first.
    pub layers: Vec<LayerId>,
}

/// Run every step of `script` against `store`.
///
/// Stops at the first failing step.
pub fn replay(store: &mut Store, script: &Script) -> Result<Vec<Outcome>, CacheError> {
    let mut outcomes = Vec::with_capacity(script.steps.len());

    for (index, step) in script.steps.iter().enumerate() {
        tracing::debug!(step = index, op = step.name(), "Replaying step");

        let (completeness, data, dependencies) = match step {
            Step::Write {
                document,
                variables,
                data,
            } => (None, None, store.write(document, variables, data)?.dependencies),
            Step::Read {
                document,
                variables,
            } => {
                let result = store.read(document, variables)?;
                (Some(result.completeness), result.data, result.dependencies)
            }
            Step::WriteOptimistic {
                document,
                variables,
                data,
                layer,
            } => {
                let written = store.write_in_layer(document, variables, data, *layer)?;
                (None, None, written.dependencies)
            }
            Step::Commit {
                document,
                variables,
                data,
                layer,
            } => {
                let written = store.commit(document, variables, data, *layer)?;
                (None, None, written.dependencies)
            }
            Step::Revert { layer } => {
                store.clear_layer(*layer);
                (None, None, BTreeSet::new())
            }
            Step::Remove { key } => {
                store.remove(key);
                (None, None, BTreeSet::from([key.clone()]))
            }
            Step::WriteFragment {
                document,
                variables,
                data,
            } => {
                let written = store.write_fragment(document, data, variables)?;
                (None, None, written.dependencies)
            }
            Step::ReadFragment {
                document,
                variables,
                entity,
            } => {
                let result = store.read_fragment(document, entity, variables)?;
                (Some(result.completeness), result.data, result.dependencies)
            }
        };

        outcomes.push(Outcome {
            step: index,
            op: step.name(),
            completeness,
            data,
            dependencies,
            layers: store.optimistic_layers(),
        });
    }

    Ok(outcomes)
}
