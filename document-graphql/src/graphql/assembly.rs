//! Assembly of composed resolvers into an executable schema.
//!
//! Which resolvers a schema exposes, and under which names, is spelled out by a [`FieldMap`]: a
//! table of `(field name, catalog name)` entries for each root type. [`assemble`] checks the table
//! against the catalog of a [`TypeComposer`] and fails if it is not a faithful, one-to-one mapping.
//! Configuration mistakes are caught when the schema is built, never while serving a request.

use super::{
    crud::BULK_MUTATIONS,
    resolver::{Resolver, ResolverKind},
    type_composer::TypeComposer,
    Request, Response, Schema,
};
use crate::store::{self, SharedStore};
use async_graphql::{dynamic::Object, extensions::Tracing};
use derive_more::{Deref, From, Into};
use snafu::{ResultExt, Snafu};
use std::collections::HashSet;

/// The name of the root Query type.
pub const QUERY_ROOT: &str = "RootQuery";

/// The name of the root Mutation type.
pub const MUTATION_ROOT: &str = "RootMutation";

/// Errors assembling a schema.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("field {root}.{field} refers to {resolver}, which is not in the catalog of {type_name}"))]
    MissingResolver {
        root: &'static str,
        field: String,
        resolver: String,
        type_name: String,
    },

    #[snafu(display("resolver {resolver} is exposed more than once"))]
    DuplicateResolver { resolver: String },

    #[snafu(display("field {root}.{field} is defined more than once"))]
    DuplicateField { root: &'static str, field: String },

    #[snafu(display("field {root}.{field} refers to {resolver}, which is a {kind} resolver"))]
    MisplacedResolver {
        root: &'static str,
        field: String,
        resolver: String,
        kind: ResolverKind,
    },

    #[snafu(display("type {name} composed for {type_name} is claimed by more than one type"))]
    TypeConflict { type_name: String, name: String },

    #[snafu(display("the RootQuery type needs at least one field"))]
    EmptyQuery,

    #[snafu(display("error registering the store: {source}"))]
    Store { source: store::Error },

    #[snafu(display("invalid schema: {message}"))]
    Schema { message: String },
}

/// The fields of the root types, and the resolvers they expose.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldMap {
    query: Vec<(String, String)>,
    mutation: Vec<(String, String)>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose the resolver `resolver` as the field `field` of the Query root.
    pub fn query(mut self, field: impl Into<String>, resolver: impl Into<String>) -> Self {
        self.query.push((field.into(), resolver.into()));
        self
    }

    /// Expose the resolver `resolver` as the field `field` of the Mutation root.
    pub fn mutation(mut self, field: impl Into<String>, resolver: impl Into<String>) -> Self {
        self.mutation.push((field.into(), resolver.into()));
        self
    }

    /// Remove the field `field` from either root.
    pub fn without(mut self, field: &str) -> Self {
        self.query.retain(|(name, _)| name != field);
        self.mutation.retain(|(name, _)| name != field);
        self
    }

    /// Remove every mutation which may write any number of documents at once.
    pub fn without_bulk_mutations(mut self) -> Self {
        self.mutation
            .retain(|(_, resolver)| !BULK_MUTATIONS.contains(&resolver.as_str()));
        self
    }

    /// `(field, resolver)` entries of the Query root, in order.
    pub fn query_fields(&self) -> &[(String, String)] {
        &self.query
    }

    /// `(field, resolver)` entries of the Mutation root, in order.
    pub fn mutation_fields(&self) -> &[(String, String)] {
        &self.mutation
    }
}

/// Limits on the queries a schema accepts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchemaLimits {
    /// The maximum nesting depth of a query.
    pub depth: Option<usize>,
    /// The maximum complexity (number of fields) of a query.
    pub complexity: Option<usize>,
}

/// An assembled, executable schema.
#[derive(Clone, Deref, From, Into)]
pub struct DocumentSchemaApi(Schema);

impl DocumentSchemaApi {
    /// Execute a GraphQL request.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        self.0.execute(request).await
    }

    /// The schema in GraphQL schema definition language.
    pub fn sdl(&self) -> String {
        self.0.sdl()
    }
}

/// Build a schema exposing resolvers from `composer` as specified by `fields`.
///
/// The collection for the composed document is registered with `store`, which becomes the store
/// every resolver in the schema works with.
pub async fn assemble(
    mut composer: TypeComposer,
    fields: &FieldMap,
    store: SharedStore,
    limits: SchemaLimits,
) -> Result<DocumentSchemaApi, Error> {
    if fields.query.is_empty() {
        return Err(Error::EmptyQuery);
    }
    if let Some(name) = composer.conflicts().first() {
        return Err(Error::TypeConflict {
            type_name: composer.binding().type_name.clone(),
            name: name.clone(),
        });
    }

    let mut exposed = HashSet::new();
    let query = root(
        &composer,
        QUERY_ROOT,
        ResolverKind::Query,
        &fields.query,
        &mut exposed,
    )?;
    let mutation = if fields.mutation.is_empty() {
        None
    } else {
        Some(root(
            &composer,
            MUTATION_ROOT,
            ResolverKind::Mutation,
            &fields.mutation,
            &mut exposed,
        )?)
    };

    store
        .register(composer.document_schema())
        .await
        .context(StoreSnafu)?;

    let mut builder = Schema::build(
        QUERY_ROOT,
        mutation.as_ref().map(|_| MUTATION_ROOT),
        None,
    )
    .register(query);
    if let Some(mutation) = mutation {
        builder = builder.register(mutation);
    }
    builder = composer.register_types(builder).data(store).extension(Tracing);
    if let Some(depth) = limits.depth {
        builder = builder.limit_depth(depth);
    }
    if let Some(complexity) = limits.complexity {
        builder = builder.limit_complexity(complexity);
    }

    let schema = builder.finish().map_err(|err| Error::Schema {
        message: err.to_string(),
    })?;
    tracing::info!(
        "assembled schema for {} with {} query and {} mutation fields",
        composer.binding().type_name,
        fields.query.len(),
        fields.mutation.len(),
    );
    Ok(schema.into())
}

/// Build the root type `name` from `entries`.
///
/// `exposed` holds the resolvers already exposed on other roots.
fn root(
    composer: &TypeComposer,
    name: &'static str,
    kind: ResolverKind,
    entries: &[(String, String)],
    exposed: &mut HashSet<String>,
) -> Result<Object, Error> {
    let mut fields = HashSet::new();
    let mut object = Object::new(name);
    for (field, resolver) in entries {
        if !fields.insert(field.as_str()) {
            return Err(Error::DuplicateField {
                root: name,
                field: field.clone(),
            });
        }
        let r: &Resolver =
            composer
                .catalog()
                .get(resolver)
                .ok_or_else(|| Error::MissingResolver {
                    root: name,
                    field: field.clone(),
                    resolver: resolver.clone(),
                    type_name: composer.binding().type_name.clone(),
                })?;
        if r.kind() != kind {
            return Err(Error::MisplacedResolver {
                root: name,
                field: field.clone(),
                resolver: resolver.clone(),
                kind: r.kind(),
            });
        }
        if !exposed.insert(resolver.clone()) {
            return Err(Error::DuplicateResolver {
                resolver: resolver.clone(),
            });
        }
        tracing::debug!("{name}.{field} -> {resolver}");
        object = object.field(r.field(field.as_str()));
    }
    Ok(object)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        graphql::{crud, type_composer::ComposeOptions},
        init_logging,
        schema::Document,
        store::MemoryStore,
    };
    use async_graphql::value;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Debug, Serialize, Deserialize, Document)]
    struct Note {
        #[document(required)]
        text: String,
        #[document(index)]
        stars: Option<i32>,
    }

    fn composer() -> TypeComposer {
        TypeComposer::new::<Note>(ComposeOptions::default())
    }

    fn field_map() -> FieldMap {
        crud::ALL.into_iter().fold(FieldMap::new(), |map, resolver| {
            let field = format!("note{}{}", &resolver[..1].to_uppercase(), &resolver[1..]);
            match composer().catalog().get(resolver).unwrap().kind() {
                ResolverKind::Query => map.query(field, resolver),
                ResolverKind::Mutation => map.mutation(field, resolver),
            }
        })
    }

    async fn root_fields(api: &DocumentSchemaApi, root: &str) -> Vec<String> {
        let res = api
            .execute(format!(r#"{{ __type(name: "{root}") {{ fields {{ name }} }} }}"#))
            .await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let data = res.data.into_json().unwrap();
        data["__type"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[async_std::test]
    async fn test_assemble_all() {
        init_logging();

        let store = MemoryStore::create();
        let api = assemble(
            composer(),
            &field_map(),
            std::sync::Arc::new(store.clone()),
            SchemaLimits::default(),
        )
        .await
        .unwrap();
        assert_eq!(store.collections().await, ["notes"]);
        assert_eq!(
            root_fields(&api, QUERY_ROOT).await,
            ["noteFindById", "noteFindByIds", "noteFindOne", "noteFindMany", "noteCount"]
        );
        assert_eq!(
            root_fields(&api, MUTATION_ROOT).await,
            [
                "noteCreateOne",
                "noteUpdateById",
                "noteUpdateOne",
                "noteUpdateMany",
                "noteRemoveById",
                "noteRemoveOne",
                "noteRemoveMany"
            ]
        );

        let sdl = api.sdl();
        assert!(sdl.contains("type RootQuery"), "{sdl}");
        assert!(sdl.contains("input CreateOneNoteInput"), "{sdl}");
        assert!(sdl.contains("text: String!"), "{sdl}");
    }

    #[async_std::test]
    async fn test_configuration_errors() {
        init_logging();

        let check = |fields: FieldMap| async move {
            assemble(
                composer(),
                &fields,
                MemoryStore::shared(),
                SchemaLimits::default(),
            )
            .await
        };

        assert!(matches!(
            check(field_map().query("noteFindAll", "findAll")).await,
            Err(Error::MissingResolver { resolver, .. }) if resolver == "findAll"
        ));
        assert!(matches!(
            check(field_map().query("noteById", "findById")).await,
            Err(Error::DuplicateResolver { resolver }) if resolver == "findById"
        ));
        assert!(matches!(
            check(FieldMap::new().query("a", "findById").query("a", "findOne")).await,
            Err(Error::DuplicateField { field, .. }) if field == "a"
        ));
        assert!(matches!(
            check(FieldMap::new().query("a", "createOne")).await,
            Err(Error::MisplacedResolver { kind: ResolverKind::Mutation, .. })
        ));
        assert!(matches!(
            check(FieldMap::new().mutation("a", "createOne")).await,
            Err(Error::EmptyQuery)
        ));
    }

    #[derive(Clone, Debug, Serialize, Deserialize, Document)]
    struct Job {
        title: Option<String>,
        operators: Option<Crew>,
    }

    #[derive(Clone, Debug, Serialize, Deserialize, Document)]
    struct Crew {
        size: Option<i32>,
    }

    #[async_std::test]
    async fn test_type_conflict() {
        init_logging();

        let err = assemble(
            TypeComposer::new::<Job>(ComposeOptions::default()),
            &FieldMap::new().query("jobs", "findMany"),
            MemoryStore::shared(),
            SchemaLimits::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(
            matches!(&err, Error::TypeConflict { type_name, name }
                if type_name == "Job" && name == "FilterJobOperatorsInput"),
            "{err}"
        );
    }

    #[async_std::test]
    async fn test_without() {
        init_logging();

        let fields = field_map().without("noteCount").without_bulk_mutations();
        assert_eq!(fields.query_fields().len(), 4);
        assert_eq!(
            fields
                .mutation_fields()
                .iter()
                .map(|(_, resolver)| resolver.as_str())
                .collect::<Vec<_>>(),
            ["createOne", "updateById", "updateOne", "removeById", "removeOne"]
        );

        let api = assemble(composer(), &fields, MemoryStore::shared(), SchemaLimits::default())
            .await
            .unwrap();
        assert!(!root_fields(&api, QUERY_ROOT).await.contains(&"noteCount".to_string()));
        assert_eq!(root_fields(&api, MUTATION_ROOT).await.len(), 5);
    }

    #[async_std::test]
    async fn test_query_only() {
        init_logging();

        let api = assemble(
            composer(),
            &FieldMap::new().query("notes", "findMany"),
            MemoryStore::shared(),
            SchemaLimits::default(),
        )
        .await
        .unwrap();
        assert!(!api.sdl().contains(MUTATION_ROOT));

        let res = api.execute("{ notes { text } }").await;
        assert_eq!(res.data, value!({ "notes": [] }));
    }

    #[async_std::test]
    async fn test_limits() {
        init_logging();

        let api = assemble(
            composer(),
            &field_map(),
            MemoryStore::shared(),
            SchemaLimits {
                depth: Some(1),
                complexity: None,
            },
        )
        .await
        .unwrap();
        let res = api
            .execute("{ __schema { types { fields { name } } } }")
            .await;
        assert!(!res.errors.is_empty());
    }
}
