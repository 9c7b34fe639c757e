//! Derive macro for `Document` types.

use super::schema_path;
use crate::helpers::{parse_docs, AttrParser};
use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DataStruct, DeriveInput, Fields, Ident};

/// Generate a `Document` implementation for a struct.
pub fn derive(
    DeriveInput {
        ident,
        generics,
        data,
        attrs,
        ..
    }: DeriveInput,
) -> TokenStream {
    if !generics.params.is_empty() {
        panic!("Document cannot be derived on generic types");
    }
    match data {
        Data::Struct(s) => generate_struct(ident, attrs, s),
        _ => panic!("Document can only be derived for structs"),
    }
}

fn generate_struct(ident: Ident, attrs: Vec<Attribute>, s: DataStruct) -> TokenStream {
    let schema = schema_path();
    let p = AttrParser::new("document");

    let Fields::Named(fields) = s.fields else {
        panic!("Document can only be derived for structs with named fields");
    };

    let name = p
        .get_arg::<Ident, _>(&attrs, "rename")
        .unwrap_or_else(|| ident.clone())
        .to_string();
    let doc = parse_docs(&attrs);

    // Describe each field which is not skipped.
    let fields = fields
        .named
        .iter()
        .filter(|f| !p.has_flag(&f.attrs, "skip"))
        .map(|f| {
            let field_name = p
                .get_arg::<Ident, _>(&f.attrs, "rename")
                .map(|rename| rename.to_string())
                .unwrap_or_else(|| f.ident.as_ref().unwrap().to_string().to_case(Case::Camel));
            let ty = &f.ty;
            let doc = parse_docs(&f.attrs);

            let mut decl = quote! {
                #schema::FieldDecl::new(#field_name, <#ty as #schema::Shape>::shape())
                    .with_description(#doc)
            };
            if p.has_flag(&f.attrs, "index") {
                decl = quote!(#decl.indexed());
            }
            if p.has_flag(&f.attrs, "required") {
                decl = quote!(#decl.required());
            }
            if p.has_flag(&f.attrs, "default") {
                decl = quote!(#decl.with_default());
            }
            decl
        });

    quote! {
        impl #schema::Document for #ident {
            const NAME: &'static str = #name;

            fn schema() -> #schema::DocumentSchema {
                #schema::DocumentSchema::new(#name)
                    .with_description(#doc)
                    #(.with_field(#fields))*
            }
        }

        impl #schema::Shape for #ident {
            fn shape() -> #schema::FieldType {
                #schema::FieldType::Embedded(<Self as #schema::Document>::schema())
            }
        }
    }
}
