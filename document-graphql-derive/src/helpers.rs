//! Helper functions for implementing procedural macros.

use itertools::Itertools;
use proc_macro2::TokenStream;
use std::borrow::Borrow;
use syn::{parenthesized, parse::Parse, Attribute, Expr, Ident, Lit, Meta};

/// Parser for the helper attributes of one derive macro.
///
/// Every attribute handled by this parser lives under a single scope, like `#[document(...)]`.
/// Inside the scope, an attribute is either a flag (`#[document(index)]`) or takes exactly one
/// parenthesized argument (`#[document(rename(User))]`).
pub struct AttrParser(String);

impl AttrParser {
    /// Create a parser for attributes of the form `#[scope(...)]`.
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    /// Is the flag `name` set in any of `attrs`?
    ///
    /// # Panics
    ///
    /// Panics if one of `attrs` is in scope but is not a list of identifiers.
    pub fn has_flag<I>(&self, attrs: I, name: &str) -> bool
    where
        I: IntoIterator,
        I::Item: Borrow<Attribute>,
    {
        attrs.into_iter().any(|a| {
            self.parse_attrs(a.borrow())
                .into_iter()
                .any(|(attr, arg)| attr == name && arg.is_none())
        })
    }

    /// Find the argument of the attribute `name` in `attrs`, if it is present.
    ///
    /// # Panics
    ///
    /// Panics if one of `attrs` is in scope but malformed, or if the argument does not parse as a
    /// `T`.
    pub fn get_arg<T: Parse, I>(&self, attrs: I, name: &str) -> Option<T>
    where
        I: IntoIterator,
        I::Item: Borrow<Attribute>,
    {
        attrs.into_iter().find_map(|a| {
            self.parse_attrs(a.borrow())
                .into_iter()
                .find_map(|(attr, arg)| {
                    if attr != name {
                        return None;
                    }
                    let arg = arg.unwrap_or_else(|| panic!("{} attribute {name} needs an argument", self.0));
                    Some(syn::parse2(arg).unwrap_or_else(|_| {
                        panic!(
                            "argument to {name} must be a {}",
                            std::any::type_name::<T>()
                        )
                    }))
                })
        })
    }

    /// Parse every attribute in this scope from `a`.
    ///
    /// `#[scope(foo, bar(baz))]` parses to `[("foo", None), ("bar", Some("baz"))]`. Attributes
    /// outside of this scope parse to an empty list.
    ///
    /// # Panics
    ///
    /// Panics if `a` is in scope but one of its entries does not start with an identifier.
    pub fn parse_attrs(&self, a: &Attribute) -> Vec<(Ident, Option<TokenStream>)> {
        let mut parsed = vec![];
        if a.path().is_ident(&self.0) {
            a.parse_nested_meta(|meta| {
                let name = meta.path.get_ident().unwrap_or_else(|| {
                    panic!("{} attribute must start with an identifier", self.0)
                });
                let arg = if meta.input.is_empty() || meta.input.peek(syn::Token![,]) {
                    None
                } else {
                    let content;
                    parenthesized!(content in meta.input);
                    Some(content.parse()?)
                };
                parsed.push((name.clone(), arg));
                Ok(())
            })
            .unwrap_or_else(|err| panic!("malformed {} attribute: {err}", self.0));
        }
        parsed
    }
}

/// Extract documentation from the attributes on an item.
///
/// The documentation is constructed by taking all the `#[doc = "..."]` attributes and concatenating
/// their arguments, separated by newlines.
pub fn parse_docs(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .filter_map(|attr| {
            let Meta::NameValue(nv) = &attr.meta else { return None; };
            if !nv.path.is_ident("doc") {
                return None;
            }
            let Expr::Lit(lit) = &nv.value else { return None; };
            let Lit::Str(s) = &lit.lit else { return None; };
            Some(s.value().trim().to_string())
        })
        .join("\n")
}
