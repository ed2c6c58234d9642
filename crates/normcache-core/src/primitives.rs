//! # Cache Primitives
//!
//! Hardcoded constants shared by key derivation and both traversals.
//!
//! These values define the identity scheme of the cache. Changing any of
//! them changes every key the store produces.

/// The system field carrying an object's concrete type name.
pub const TYPENAME_FIELD: &str = "__typename";

/// The preferred identifying field of a normalizable object.
pub const ID_FIELD: &str = "id";

/// The fallback identifying field, consulted only when `id` is absent.
pub const FALLBACK_ID_FIELD: &str = "_id";

/// Separator between a type name and an identifying value in an entity key.
pub const ENTITY_KEY_SEPARATOR: char = ':';

/// Separator between an entity key and a field key in a link key.
///
/// GraphQL names never contain `.`, but identifying values and argument
/// JSON may, so a link key does not always split back into its parts. Two
/// different pairs collide only when the shorter parent's field key itself
/// contains `.`, which takes an argument value containing `.`. Link keys
/// are built, never parsed.
pub const LINK_KEY_SEPARATOR: char = '.';

/// Conventional name of the query root type when the schema does not say.
pub const DEFAULT_QUERY_ROOT: &str = "Query";

/// Conventional name of the mutation root type when the schema does not say.
pub const DEFAULT_MUTATION_ROOT: &str = "Mutation";

/// Conventional name of the subscription root type when the schema does not say.
pub const DEFAULT_SUBSCRIPTION_ROOT: &str = "Subscription";

/// Maximum nesting depth of selection sets walked by the traversals.
///
/// All traversals must be computationally bounded. Deeper selections are
/// treated as unresolved.
pub const MAX_SELECTION_DEPTH: usize = 128;
