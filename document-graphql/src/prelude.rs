//! Common items that you will always want in scope when declaring documents and building schemas.

pub use crate::graphql::{
    assembly::{assemble, DocumentSchemaApi, FieldMap, SchemaLimits},
    async_graphql::{self, value},
    type_composer::{ComposeOptions, TypeComposer},
};
pub use crate::schema::{
    Document, DocumentEnum, DocumentSchema, EnumDecl, FieldDecl, FieldType, Fields, ScalarType,
    Shape,
};
pub use crate::store::{DocumentStore, SharedStore};
