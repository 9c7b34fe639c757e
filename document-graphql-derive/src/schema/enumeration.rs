//! Derive macro for `DocumentEnum` types.

use super::schema_path;
use crate::helpers::AttrParser;
use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DataEnum, DeriveInput, Fields, Ident};

/// Generate a `DocumentEnum` implementation for a fieldless enum.
pub fn derive(
    DeriveInput {
        ident,
        generics,
        data,
        ..
    }: DeriveInput,
) -> TokenStream {
    if !generics.params.is_empty() {
        panic!("DocumentEnum cannot be derived on generic types");
    }
    match data {
        Data::Enum(e) => generate_enum(ident, e),
        _ => panic!("DocumentEnum can only be derived for enums"),
    }
}

fn generate_enum(ident: Ident, e: DataEnum) -> TokenStream {
    let schema = schema_path();
    let p = AttrParser::new("document");

    if e.variants.is_empty() {
        panic!("DocumentEnum needs at least one variant");
    }

    let (variants, values): (Vec<_>, Vec<_>) = e
        .variants
        .iter()
        .map(|v| {
            if !matches!(v.fields, Fields::Unit) {
                panic!("DocumentEnum variants cannot have fields");
            }
            let value = p
                .get_arg::<Ident, _>(&v.attrs, "rename")
                .map(|rename| rename.to_string())
                .unwrap_or_else(|| v.ident.to_string().to_case(Case::Snake));
            (v.ident.clone(), value)
        })
        .unzip();

    quote! {
        impl #schema::DocumentEnum for #ident {
            const VALUES: &'static [&'static str] = &[#(#values),*];

            fn as_str(&self) -> &'static str {
                match self {
                    #(Self::#variants => #values,)*
                }
            }

            fn from_value(value: &str) -> Option<Self> {
                match value {
                    #(#values => Some(Self::#variants),)*
                    _ => None,
                }
            }
        }

        impl #schema::Shape for #ident {
            fn shape() -> #schema::FieldType {
                #schema::FieldType::Enum(#schema::EnumDecl::new(
                    <Self as #schema::DocumentEnum>::VALUES.iter().copied(),
                ))
            }
        }
    }
}
