//! Derive macros for the `document_graphql` crate.

use proc_macro::TokenStream;
use syn::parse_macro_input;

mod helpers;
mod schema;

/// Derive an implementation of `Document` (and `Shape`) for a struct.
///
/// The derived `Document::schema` describes every field of the struct to the rest of the crate: its
/// name, its [shape](#field-types), and the constraints declared with `#[document(...)]`
/// attributes. The same schema is used to compose GraphQL types and resolvers for the document and
/// to validate documents when they are written to a store.
///
/// The derived `Shape` implementation lets the struct appear as a field of another document, in
/// which case it is stored as an embedded document with no identity of its own.
///
/// Documentation (doc comments or the `#[doc = "..."]` attribute) on the struct and its fields is
/// propagated to the schema and will appear in the exported GraphQL schema.
///
/// # Examples
///
/// ```
/// # mod example {
/// use document_graphql::prelude::*;
///
/// /// A person who reads books.
/// #[derive(Clone, Debug, Document)]
/// struct Reader {
///     /// How the reader wants to be called.
///     name: Option<String>,
///     #[document(index)]
///     books_read: Option<i32>,
///     #[document(default)]
///     shelves: Vec<Shelf>,
/// }
///
/// /// An embedded document.
/// #[derive(Clone, Debug, Document)]
/// struct Shelf {
///     #[document(required)]
///     label: String,
///     genre: Option<Genre>,
/// }
///
/// #[derive(Clone, Copy, Debug, DocumentEnum)]
/// enum Genre {
///     Fiction,
///     #[document(rename(non_fiction))]
///     NonFiction,
/// }
///
/// # pub fn example() {
/// let schema = Reader::schema();
/// assert_eq!(schema.name(), "Reader");
/// assert!(schema.field("booksRead").unwrap().is_indexed());
/// assert_eq!(Genre::VALUES, &["fiction", "non_fiction"]);
/// # }
/// # }
/// # example::example();
/// ```
///
/// # Field types
///
/// The shape of each field is computed from its Rust type by the `Shape` trait:
/// * `String`, `i32`, `f64` and `bool` are scalars.
/// * Types deriving `DocumentEnum` are enums with a closed set of values.
/// * Types deriving `Document` are embedded documents.
/// * `Vec<T>` is an ordered list of `T`.
/// * `Option<T>` has the same shape as `T`. Every field is optional unless it is marked
///   `required`.
///
/// # Struct attributes
///
/// | Attribute     | Description                                             | Arg     | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | rename        | Override the document name. The name defaults to the name of the struct. | ident | no |
///
/// # Field attributes
///
/// | Attribute     | Description                                             | Arg    | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | index         | Ask the store to maintain an index on this field, for equality and range queries. The field is also offered as a sort key. | n/a | no |
/// | required      | Reject documents which do not have a value for this field. | n/a | no |
/// | default       | Fill in the default value of the field's shape (the empty list for list fields) when a document is created without it. | n/a | no |
/// | rename        | Override the field name. The name defaults to the name of the Rust field converted to camelCase. | ident | no |
/// | skip          | Do not include this field in the document schema. | n/a | no |
#[proc_macro_derive(Document, attributes(document))]
pub fn document(input: TokenStream) -> TokenStream {
    schema::document::derive(parse_macro_input!(input)).into()
}

/// Derive an implementation of `DocumentEnum` (and `Shape`) for a fieldless enum.
///
/// Each variant becomes one value of the enum's closed value set. A field of this type accepts only
/// those values; a store refuses to write any other.
///
/// # Variant attributes
///
/// | Attribute     | Description                                             | Arg     | Required |
/// |---------------|---------------------------------------------------------|---------|----------|
/// | rename        | Override the value. It defaults to the name of the variant in snake_case. | ident | no |
#[proc_macro_derive(DocumentEnum, attributes(document))]
pub fn document_enum(input: TokenStream) -> TokenStream {
    schema::enumeration::derive(parse_macro_input!(input)).into()
}
