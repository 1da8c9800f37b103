//! Normalized query trees for GraphQL operations.
//!
//! Normalizing an operation merges every field selection that resolves against the same concrete
//! types with the same arguments into one [`NormalizedField`], through fragment spreads and
//! interface or union branching. Each normalized field records the object types it applies to.
//! `@skip` and `@include` are applied statically against the request's variables.
//!
//! ```
//! use apollo_compiler::ExecutableDocument;
//! use apollo_normalized_query::JsonMap;
//! use apollo_normalized_query::QuerySchema;
//! use apollo_normalized_query::normalize_operation;
//!
//! let schema = QuerySchema::parse_and_validate(
//!     r#"
//!     type Query { animal: Animal }
//!     interface Animal { sound: String }
//!     type Dog implements Animal { sound: String }
//!     type Cat implements Animal { sound: String }
//!     "#,
//!     "schema.graphql",
//! )?;
//! let document = ExecutableDocument::parse_and_validate(
//!     schema.schema(),
//!     "{ animal { ... on Dog { sound } ... on Cat { sound } } }",
//!     "query.graphql",
//! )
//! .map_err(|error| error.errors.to_string())?;
//!
//! let query = normalize_operation(&schema, &document, None, &JsonMap::new())?;
//! assert_eq!(query.to_string(), "Query.animal\n  [Dog, Cat].sound");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(
    rustdoc::broken_intra_doc_links,
    unreachable_pub,
    unreachable_patterns,
    unused,
    unused_qualifications,
    dead_code,
    while_true,
    unconditional_panic,
    clippy::all
)]

mod conditions;
pub mod config;
mod display_helpers;
pub mod error;
pub mod normalized;
mod normalizer;
pub mod schema;
pub(crate) mod utils;
pub mod values;

pub use crate::config::NormalizerConfig;
pub use crate::error::NormalizationError;
pub use crate::normalized::FieldCoordinates;
pub use crate::normalized::MergedField;
pub use crate::normalized::NamedFragments;
pub use crate::normalized::NormalizedField;
pub use crate::normalized::NormalizedFieldId;
pub use crate::normalized::NormalizedQuery;
pub use crate::normalizer::QueryNormalizer;
pub use crate::normalizer::normalize_operation;
pub use crate::normalizer::normalize_operation_with_raw_variables;
pub use crate::schema::CompositeType;
pub use crate::schema::QuerySchema;
pub use crate::values::NormalizedInputValue;
pub use crate::values::NormalizedValue;

/// A JSON object, as used for variable and argument values.
pub type JsonMap = serde_json_bytes::Map<serde_json_bytes::ByteString, serde_json_bytes::Value>;

// Normalized queries are built once and then read from any thread.
const _: () = {
    const fn assert_thread_safe<T: Sync + Send>() {}

    assert_thread_safe::<NormalizedQuery>();
    assert_thread_safe::<QueryNormalizer>();
    assert_thread_safe::<QuerySchema>();
};
