use clap::Parser;
use color_eyre::eyre::{bail, eyre};
use document_graphql::{
    graphql::Request,
    init_logging,
    prelude::*,
    store::{collection_name, MemoryStore},
    user::{self, Contacts, Gender, Language, Skill, User},
};
use std::path::PathBuf;

/// Print the user API schema, or run a GraphQL document against it.
///
/// Each run starts with a fresh, empty in-memory store.
#[derive(Clone, Debug, Parser)]
pub struct Options {
    /// GraphQL document to execute, instead of printing the schema.
    #[clap(long, env = "USER_SCHEMA_QUERY", conflicts_with = "query_file")]
    query: Option<String>,
    /// File containing a GraphQL document to execute.
    #[clap(long, env = "USER_SCHEMA_QUERY_FILE")]
    query_file: Option<PathBuf>,
    /// Insert a sample user before executing the document.
    #[clap(long, env = "USER_SCHEMA_SEED")]
    seed: bool,
    /// Leave out mutations which update or remove any number of users at once.
    #[clap(long, env = "USER_SCHEMA_NO_BULK_MUTATIONS")]
    no_bulk_mutations: bool,
    /// Maximum nesting depth of a query.
    #[clap(long, env = "USER_SCHEMA_LIMIT_DEPTH")]
    limit_depth: Option<usize>,
    /// Maximum complexity of a query.
    #[clap(long, env = "USER_SCHEMA_LIMIT_COMPLEXITY")]
    limit_complexity: Option<usize>,
}

fn sample_user() -> User {
    User {
        name: Some("Jeff".into()),
        age: Some(40),
        languages: vec![
            Language {
                language: Some("en".into()),
                skill: Some(Skill::Native),
            },
            Language {
                language: Some("es".into()),
                skill: Some(Skill::Basic),
            },
        ],
        contacts: Some(Contacts {
            email: Some("jeff@example.com".into()),
            phones: vec!["555-0123".into()],
        }),
        gender: Some(Gender::Male),
    }
}

#[async_std::main]
async fn main() -> color_eyre::Result<()> {
    init_logging();
    let opt = Options::parse();

    let mut fields = user::field_map();
    if opt.no_bulk_mutations {
        fields = fields.without_bulk_mutations();
    }
    let limits = SchemaLimits {
        depth: opt.limit_depth,
        complexity: opt.limit_complexity,
    };
    let store = MemoryStore::shared();
    let api = user::schema_with(&fields, store.clone(), limits).await?;

    if opt.seed {
        let record = store
            .insert(&collection_name(User::NAME), sample_user().to_fields()?)
            .await?;
        tracing::info!("seeded user {}", record.id());
    }

    let query = match (opt.query, opt.query_file) {
        (Some(query), _) => query,
        (None, Some(path)) => async_std::fs::read_to_string(&path)
            .await
            .map_err(|err| eyre!("cannot read {}: {err}", path.display()))?,
        (None, None) => {
            println!("{}", api.sdl());
            return Ok(());
        }
    };

    let res = api.execute(Request::new(query)).await;
    println!("{:#}", res.data.into_json()?);
    if !res.errors.is_empty() {
        for err in &res.errors {
            eprintln!("error: {err}");
        }
        bail!("query failed with {} errors", res.errors.len());
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[async_std::test]
    async fn test_seeded_query() {
        init_logging();

        let store = MemoryStore::shared();
        let api = user::schema_with(
            &user::field_map().without_bulk_mutations(),
            store.clone(),
            SchemaLimits::default(),
        )
        .await
        .unwrap();
        assert!(!api.sdl().contains("userUpdateMany"));

        store
            .insert(&collection_name(User::NAME), sample_user().to_fields().unwrap())
            .await
            .unwrap();
        let res = api
            .execute(Request::new("{ userOne(filter: { name: \"Jeff\" }) { age } }"))
            .await;
        assert_eq!(res.data, value!({ "userOne": { "age": 40 } }));
    }
}
