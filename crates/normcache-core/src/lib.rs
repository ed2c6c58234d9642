//! # normcache-core
//!
//! The normalized cache engine for normcache - THE LOGIC.
//!
//! This crate stores graph-shaped query responses (GraphQL) as flat entity
//! records joined by links, answers later queries from them, and reports how
//! completely a query could be answered.
//!
//! ## Layout
//!
//! - `keys`: identity strings for entities, field invocations and links
//! - `layered`: base map plus rollback-capable optimistic overlays
//! - `schema`: nullability and abstract-type predicates
//! - `store`: records, links and the operation entry points
//! - `read` / `write`: the two document traversals
//!
//! ## Architectural Constraints
//!
//! - Synchronous and single-threaded: every call completes before returning
//! - Deterministic: BTreeMap only, traversal follows document order
//! - In-memory only: there is no on-disk format
//! - Gaps in cached data degrade completeness, they never raise errors

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod document;
pub mod keys;
pub mod layered;
pub mod primitives;
pub mod read;
pub mod schema;
pub mod store;
pub mod types;
pub mod write;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CacheError, Completeness, Entity, FieldValue, LayerId, Link, Resolved, Variables,
    typename_of_key,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use config::{CacheConfig, FieldCoordinate, ResolveInfo};
pub use document::{
    Definition, Document, Field, FragmentDefinition, InputValue, OperationDefinition,
    OperationKind, Selection,
};
pub use keys::{join_keys, key_of_entity, key_of_field};
pub use layered::Layered;
pub use read::ReadResult;
pub use schema::{IntrospectionSchema, SchemaPredicates};
pub use store::{Store, StoreSnapshot};
pub use write::WriteResult;
