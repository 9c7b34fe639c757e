//! Derivation of a GraphQL API from a document schema.
//!
//! This happens in two steps. First, a [`TypeComposer`](type_composer::TypeComposer) reads the
//! [schema](crate::schema) of a document and composes everything a GraphQL API for the document
//! needs: an object type for the document and its embedded documents, input types for creating,
//! updating and filtering documents, a sort enum, and a [catalog](resolver::ResolverCatalog) of
//! twelve CRUD [resolvers](crud). Nothing is exposed yet at this point.
//!
//! Second, [assembly](assembly) picks resolvers out of the catalog according to an explicit
//! [`FieldMap`](assembly::FieldMap) and binds each one to a field of the root Query or Mutation
//! type. The result is an immutable, executable schema.
//!
//! Resolvers never touch data directly. Every one of them goes through the
//! [`SharedStore`](crate::store::SharedStore) registered in the schema's context data.

pub mod args;
pub mod assembly;
pub mod crud;
pub mod resolver;
pub mod type_composer;

// Re-export commonly used `async_graphql` types.
pub use async_graphql::{
    dynamic::{Schema, SchemaError},
    value, Request, Response, Result, Value,
};

// Re-export `async_graphql` directly as an escape hatch.
pub extern crate async_graphql;
