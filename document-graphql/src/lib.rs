//! Document GraphQL generates a complete CRUD GraphQL API from the declaration of a document type.
//! It consists of three layers, used strictly in sequence:
//!
//! * A [schema] layer, where an application declares the shape of its documents by deriving
//!   [`Document`](schema::Document) on ordinary Rust structs. A document is a record with named,
//!   typed fields, some of which may be documents embedded in their parent. Fields can be indexed,
//!   required, defaulted, or constrained to a closed set of values.
//! * A [graphql] layer, which derives GraphQL object types, input types and a fixed catalog of
//!   twelve CRUD resolvers from any document schema, then assembles a subset of those resolvers
//!   into root Query and Mutation types according to an explicit
//!   [field map](graphql::assembly::FieldMap).
//! * A [store] layer, which persists documents. Resolvers only talk to the
//!   [`DocumentStore`](store::DocumentStore) trait, which makes the GraphQL layer agnostic to the
//!   specifics of storage. This crate comes with an in-memory store (feature `memory`), which
//!   validates writes against the document schema and maintains indexes on indexed fields.
//!
//! The [user] module puts the pieces together for the `User` document, the data model this crate
//! ships with:
//!
//! ```
//! # #[async_std::main]
//! # async fn main() {
//! use document_graphql::{store::MemoryStore, user};
//!
//! let api = user::schema(MemoryStore::shared()).await.unwrap();
//! let res = api
//!     .execute(
//!         r#"mutation {
//!             userCreate(record: { name: "Ann", age: 40 }) { name age languages { skill } }
//!         }"#,
//!     )
//!     .await;
//! assert_eq!(
//!     res.data,
//!     document_graphql::prelude::value!({
//!         "userCreate": { "name": "Ann", "age": 40, "languages": [] }
//!     })
//! );
//! # }
//! ```

use std::sync::Once;
use tracing_subscriber::EnvFilter;

// Lets generated code refer to this crate by name from inside the crate itself.
extern crate self as document_graphql;

pub mod graphql;
pub mod prelude;
pub mod schema;
pub mod store;
pub mod user;

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        color_eyre::install().unwrap();
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}
