//! Resolvers: named operations with a fixed argument list and output type.
//!
//! A [`Resolver`] is a GraphQL field that has not been given a name yet. Resolvers live in a
//! [`ResolverCatalog`], keyed by their catalog name, until [assembly](super::assembly) exposes
//! some of them as fields of the root types, under names of its choosing.

use async_graphql::{
    dynamic::{Field, FieldFuture, FieldValue, InputValue, ResolverContext, TypeRef},
    Value,
};
use derive_more::Display;
use indexmap::IndexMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// The function which computes the value of a resolver.
pub type ResolveFn = Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

/// Wrap a closure as a [`ResolveFn`].
///
/// Passing the closure through this function gives it the higher-ranked signature a [`ResolveFn`]
/// needs, which closure type inference cannot work out from an `Arc::new` alone.
pub fn resolver_fn<F>(f: F) -> ResolveFn
where
    F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Convert a stored value into the value of a GraphQL field.
///
/// Lists become lists of field values, so that each item of a list of embedded documents is
/// resolved as an object in its own right.
pub fn into_field_value<'a>(value: Value) -> FieldValue<'a> {
    match value {
        Value::List(items) => FieldValue::list(items.into_iter().map(into_field_value)),
        value => FieldValue::value(value),
    }
}

/// The root type a resolver belongs on.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    /// Reads data. Exposed on the root Query type.
    #[display(fmt = "query")]
    Query,
    /// Writes data. Exposed on the root Mutation type.
    #[display(fmt = "mutation")]
    Mutation,
}

/// An argument of a resolver.
#[derive(Clone, Debug)]
pub struct ArgDecl {
    name: String,
    ty: TypeRef,
    default: Option<Value>,
    description: Option<String>,
}

impl ArgDecl {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            description: None,
        }
    }

    /// The value the argument takes when it is omitted.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    fn input_value(&self) -> InputValue {
        let mut input = InputValue::new(self.name.clone(), self.ty.clone());
        if let Some(default) = &self.default {
            input = input.default_value(default.clone());
        }
        if let Some(description) = &self.description {
            input = input.description(description.clone());
        }
        input
    }
}

/// A named operation with a defined input/output contract.
#[derive(Clone)]
pub struct Resolver {
    name: String,
    kind: ResolverKind,
    args: Vec<ArgDecl>,
    output: TypeRef,
    description: Option<String>,
    resolve: ResolveFn,
}

impl Debug for Resolver {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("args", &self.args)
            .field("output", &self.output)
            .finish()
    }
}

impl Resolver {
    pub fn new(
        name: impl Into<String>,
        kind: ResolverKind,
        output: TypeRef,
        resolve: ResolveFn,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            args: vec![],
            output,
            description: None,
            resolve,
        }
    }

    pub fn with_arg(mut self, arg: ArgDecl) -> Self {
        self.args.push(arg);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The catalog name of this resolver.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResolverKind {
        self.kind
    }

    pub fn args(&self) -> &[ArgDecl] {
        &self.args
    }

    pub fn arg(&self, name: &str) -> Option<&ArgDecl> {
        self.args.iter().find(|arg| arg.name == name)
    }

    pub fn output(&self) -> &TypeRef {
        &self.output
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// A GraphQL field which exposes this resolver under `name`.
    pub fn field(&self, name: impl Into<String>) -> Field {
        let resolve = self.resolve.clone();
        let mut field = Field::new(name, self.output.clone(), move |ctx| resolve(ctx));
        for arg in &self.args {
            field = field.argument(arg.input_value());
        }
        if let Some(description) = &self.description {
            field = field.description(description.clone());
        }
        field
    }
}

/// The resolvers composed for a document type, by catalog name.
#[derive(Clone, Debug, Default)]
pub struct ResolverCatalog {
    resolvers: IndexMap<String, Resolver>,
}

impl ResolverCatalog {
    /// Add a resolver, replacing any resolver with the same name.
    pub fn insert(&mut self, resolver: Resolver) -> Option<Resolver> {
        self.resolvers.insert(resolver.name.clone(), resolver)
    }

    pub fn get(&self, name: &str) -> Option<&Resolver> {
        self.resolvers.get(name)
    }

    /// Take a resolver out of the catalog.
    pub fn remove(&mut self, name: &str) -> Option<Resolver> {
        self.resolvers.shift_remove(name)
    }

    /// Catalog names, in the order the resolvers were added.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resolvers.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resolver> {
        self.resolvers.values()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
