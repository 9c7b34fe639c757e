//! Derive macros for document schema declarations.

use proc_macro2::TokenStream;
use quote::quote;

pub mod document;
pub mod enumeration;

/// The path of the `document_graphql::schema` module in the scope invoking a procedural macro.
fn schema_path() -> TokenStream {
    quote!(document_graphql::schema)
}
