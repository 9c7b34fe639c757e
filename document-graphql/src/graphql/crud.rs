//! The catalog of CRUD resolvers composed for every document.
//!
//! | Name         | Kind     | Arguments                                          | Output                |
//! |--------------|----------|----------------------------------------------------|-----------------------|
//! | `findById`   | query    | `id: ID!`                                          | `T`                   |
//! | `findByIds`  | query    | `ids: [ID!]!, limit, sort = _ID_ASC`               | `[T!]!`               |
//! | `findOne`    | query    | `filter, skip, sort`                               | `T`                   |
//! | `findMany`   | query    | `filter, skip, limit, sort`                        | `[T!]!`               |
//! | `count`      | query    | `filter`                                           | `Int!`                |
//! | `createOne`  | mutation | `record: CreateOneTInput!`                         | `T!`                  |
//! | `updateById` | mutation | `id: ID!, record: UpdateTInput!`                   | `T`                   |
//! | `updateOne`  | mutation | `filter, record: UpdateTInput!, skip, sort`        | `T`                   |
//! | `updateMany` | mutation | `filter, record: UpdateTInput!, skip, limit, sort` | `UpdateManyTPayload!` |
//! | `removeById` | mutation | `id: ID!`                                          | `T`                   |
//! | `removeOne`  | mutation | `filter, sort`                                     | `T`                   |
//! | `removeMany` | mutation | `filter`                                           | `RemoveManyTPayload!` |
//!
//! List resolvers return at most the composer's default limit of documents when no `limit` is
//! given. Not finding a document is not an error: single-document resolvers return `null` and bulk
//! resolvers a count of 0. Store errors are reported as GraphQL errors whose `code` extension
//! classifies them (see [`Error::code`]).

use super::{
    args,
    resolver::{into_field_value, resolver_fn, ArgDecl, Resolver, ResolverCatalog, ResolverKind},
    type_composer::{list_of, DocumentBinding, TypeNames},
};
use crate::schema::Fields;
use crate::store::{Direction, Error, FieldPath, Filter, Query, Record, SharedStore};
use async_graphql::{
    dynamic::{FieldFuture, ObjectAccessor, ResolverContext, TypeRef},
    ErrorExtensions, Name, Value,
};
use std::future::Future;
use std::sync::Arc;

pub const FIND_BY_ID: &str = "findById";
pub const FIND_BY_IDS: &str = "findByIds";
pub const FIND_ONE: &str = "findOne";
pub const FIND_MANY: &str = "findMany";
pub const COUNT: &str = "count";
pub const CREATE_ONE: &str = "createOne";
pub const UPDATE_BY_ID: &str = "updateById";
pub const UPDATE_ONE: &str = "updateOne";
pub const UPDATE_MANY: &str = "updateMany";
pub const REMOVE_BY_ID: &str = "removeById";
pub const REMOVE_ONE: &str = "removeOne";
pub const REMOVE_MANY: &str = "removeMany";

/// Every catalog name, in catalog order.
pub const ALL: [&str; 12] = [
    FIND_BY_ID,
    FIND_BY_IDS,
    FIND_ONE,
    FIND_MANY,
    COUNT,
    CREATE_ONE,
    UPDATE_BY_ID,
    UPDATE_ONE,
    UPDATE_MANY,
    REMOVE_BY_ID,
    REMOVE_ONE,
    REMOVE_MANY,
];

/// Mutations which may write any number of documents at once.
pub const BULK_MUTATIONS: [&str; 2] = [UPDATE_MANY, REMOVE_MANY];

impl ErrorExtensions for Error {
    fn extend(&self) -> async_graphql::Error {
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", self.code()))
    }
}

/// Compose the full catalog for a document.
pub fn catalog(names: &TypeNames, binding: &Arc<DocumentBinding>) -> ResolverCatalog {
    let mut catalog = ResolverCatalog::default();
    for resolver in [
        find_by_id(names, binding),
        find_by_ids(names, binding),
        find_one(names, binding),
        find_many(names, binding),
        count(names, binding),
        create_one(names, binding),
        update_by_id(names, binding),
        update_one(names, binding),
        update_many(names, binding),
        remove_by_id(names, binding),
        remove_one(names, binding),
        remove_many(names, binding),
    ] {
        catalog.insert(resolver);
    }
    catalog
}

/// Everything a resolver invocation has to work with.
struct Call<'a> {
    args: ObjectAccessor<'a>,
    store: &'a SharedStore,
    binding: Arc<DocumentBinding>,
}

impl<'a> Call<'a> {
    fn collection(&self) -> &str {
        &self.binding.collection
    }

    fn query(&self) -> Result<Query, Error> {
        args::query(&self.args, &self.binding)
    }

    /// The query arguments, limited to the default number of documents if there is no `limit`.
    fn paged_query(&self) -> Result<Query, Error> {
        let mut query = self.query()?;
        query.limit.get_or_insert(self.binding.default_limit);
        Ok(query)
    }
}

/// Run `f` as the body of a resolver.
fn run<'a, F, Fut>(
    ctx: ResolverContext<'a>,
    binding: &Arc<DocumentBinding>,
    f: F,
) -> FieldFuture<'a>
where
    F: FnOnce(Call<'a>) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Option<Value>, Error>> + Send + 'a,
{
    let binding = binding.clone();
    FieldFuture::new(async move {
        let store = ctx.ctx.data::<SharedStore>()?;
        let call = Call {
            args: ctx.args,
            store,
            binding,
        };
        let value = f(call).await.map_err(|err| err.extend())?;
        Ok(value.map(into_field_value))
    })
}

fn one(records: Vec<Record>) -> Option<Value> {
    records.into_iter().next().map(Record::into_value)
}

fn many(records: Vec<Record>) -> Option<Value> {
    Some(Value::List(
        records.into_iter().map(Record::into_value).collect(),
    ))
}

fn payload(count: usize) -> Option<Value> {
    Some(Value::Object(Fields::from([(
        Name::new("count"),
        Value::from(count),
    )])))
}

fn id_arg() -> ArgDecl {
    ArgDecl::new(args::ID, TypeRef::named_nn(TypeRef::ID))
}

fn filter_arg(names: &TypeNames) -> ArgDecl {
    ArgDecl::new(args::FILTER, TypeRef::named(&names.filter_input))
        .with_description("Conditions documents must satisfy.")
}

fn skip_arg() -> ArgDecl {
    ArgDecl::new(args::SKIP, TypeRef::named(TypeRef::INT))
        .with_description("The number of matching documents to skip.")
}

fn limit_arg(default: Option<usize>) -> ArgDecl {
    let arg = ArgDecl::new(args::LIMIT, TypeRef::named(TypeRef::INT))
        .with_description("The maximum number of documents to return.");
    match default {
        Some(limit) => arg.with_default(limit),
        None => arg,
    }
}

fn sort_arg(names: &TypeNames) -> ArgDecl {
    ArgDecl::new(args::SORT, TypeRef::named(&names.sort_enum))
}

fn record_arg(ty: &str) -> ArgDecl {
    ArgDecl::new(args::RECORD, TypeRef::named_nn(ty))
}

fn find_by_id(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        FIND_BY_ID,
        ResolverKind::Query,
        TypeRef::named(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = Query::new(Filter::by_id(args::id(&call.args)?)).limit(1);
                Ok(one(call.store.find(call.collection(), &query).await?))
            })
        }),
    )
    .with_arg(id_arg())
    .with_description(format!("Find a {} by its id.", binding.type_name))
}

fn find_by_ids(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        FIND_BY_IDS,
        ResolverKind::Query,
        TypeRef::NonNull(Box::new(list_of(TypeRef::named(&names.output)))),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let mut query = call.paged_query()?;
                query.filter = Filter::by_ids(args::ids(&call.args)?);
                if query.sort.is_empty() {
                    query = query.sort(FieldPath::id(), Direction::Asc);
                }
                Ok(many(call.store.find(call.collection(), &query).await?))
            })
        }),
    )
    .with_arg(ArgDecl::new(
        args::IDS,
        TypeRef::NonNull(Box::new(list_of(TypeRef::named(TypeRef::ID)))),
    ))
    .with_arg(limit_arg(Some(binding.default_limit)))
    .with_arg(sort_arg(names).with_default(Value::Enum(Name::new("_ID_ASC"))))
    .with_description(format!("Find every {} with one of the given ids.", binding.type_name))
}

fn find_one(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        FIND_ONE,
        ResolverKind::Query,
        TypeRef::named(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = call.query()?.limit(1);
                Ok(one(call.store.find(call.collection(), &query).await?))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_arg(skip_arg())
    .with_arg(sort_arg(names))
    .with_description(format!("Find one {} matching the filter.", binding.type_name))
}

fn find_many(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        FIND_MANY,
        ResolverKind::Query,
        TypeRef::NonNull(Box::new(list_of(TypeRef::named(&names.output)))),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = call.paged_query()?;
                Ok(many(call.store.find(call.collection(), &query).await?))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_arg(skip_arg())
    .with_arg(limit_arg(Some(binding.default_limit)))
    .with_arg(sort_arg(names))
    .with_description(format!("Find every {} matching the filter.", binding.type_name))
}

fn count(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        COUNT,
        ResolverKind::Query,
        TypeRef::named_nn(TypeRef::INT),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let filter = args::filter(&call.args)?;
                let count = call.store.count(call.collection(), &filter).await?;
                Ok(Some(Value::from(count)))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_description(format!("Count the {}s matching the filter.", binding.type_name))
}

fn create_one(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        CREATE_ONE,
        ResolverKind::Mutation,
        TypeRef::named_nn(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let record = args::record(&call.args)?;
                let created = call.store.insert(call.collection(), record).await?;
                Ok(Some(created.into_value()))
            })
        }),
    )
    .with_arg(record_arg(&names.create_input))
    .with_description(format!("Create a new {}.", binding.type_name))
}

fn update_by_id(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        UPDATE_BY_ID,
        ResolverKind::Mutation,
        TypeRef::named(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = Query::new(Filter::by_id(args::id(&call.args)?)).limit(1);
                let patch = args::record(&call.args)?;
                Ok(one(
                    call.store.update(call.collection(), &query, &patch).await?,
                ))
            })
        }),
    )
    .with_arg(id_arg())
    .with_arg(record_arg(&names.update_input))
    .with_description(format!(
        "Update the {} with the given id. Fields set to null are removed.",
        binding.type_name
    ))
}

fn update_one(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        UPDATE_ONE,
        ResolverKind::Mutation,
        TypeRef::named(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = call.query()?.limit(1);
                let patch = args::record(&call.args)?;
                Ok(one(
                    call.store.update(call.collection(), &query, &patch).await?,
                ))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_arg(record_arg(&names.update_input))
    .with_arg(skip_arg())
    .with_arg(sort_arg(names))
    .with_description(format!(
        "Update one {} matching the filter. Fields set to null are removed.",
        binding.type_name
    ))
}

fn update_many(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        UPDATE_MANY,
        ResolverKind::Mutation,
        TypeRef::named_nn(&names.update_many_payload),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = call.query()?;
                let patch = args::record(&call.args)?;
                let updated = call.store.update(call.collection(), &query, &patch).await?;
                Ok(payload(updated.len()))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_arg(record_arg(&names.update_input))
    .with_arg(skip_arg())
    .with_arg(limit_arg(None))
    .with_arg(sort_arg(names))
    .with_description(format!(
        "Update every {} matching the filter. Either all of them are updated or none is.",
        binding.type_name
    ))
}

fn remove_by_id(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        REMOVE_BY_ID,
        ResolverKind::Mutation,
        TypeRef::named(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = Query::new(Filter::by_id(args::id(&call.args)?)).limit(1);
                Ok(one(call.store.remove(call.collection(), &query).await?))
            })
        }),
    )
    .with_arg(id_arg())
    .with_description(format!(
        "Remove the {} with the given id, returning it.",
        binding.type_name
    ))
}

fn remove_one(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        REMOVE_ONE,
        ResolverKind::Mutation,
        TypeRef::named(&names.output),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let query = call.query()?.limit(1);
                Ok(one(call.store.remove(call.collection(), &query).await?))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_arg(sort_arg(names))
    .with_description(format!(
        "Remove one {} matching the filter, returning it.",
        binding.type_name
    ))
}

fn remove_many(names: &TypeNames, binding: &Arc<DocumentBinding>) -> Resolver {
    let b = binding.clone();
    Resolver::new(
        REMOVE_MANY,
        ResolverKind::Mutation,
        TypeRef::named_nn(&names.remove_many_payload),
        resolver_fn(move |ctx| {
            run(ctx, &b, |call| async move {
                let filter = args::filter(&call.args)?;
                let removed = call
                    .store
                    .remove(call.collection(), &Query::new(filter))
                    .await?;
                Ok(payload(removed.len()))
            })
        }),
    )
    .with_arg(filter_arg(names))
    .with_description(format!(
        "Remove every {} matching the filter.",
        binding.type_name
    ))
}
