//! The `User` document and its GraphQL API.
//!
//! [`schema`] assembles the full API over a store of users, exposing every CRUD resolver under
//! the field names in [`field_map`]:
//!
//! | Root     | Field            | Resolver     |
//! |----------|------------------|--------------|
//! | Query    | `userById`       | `findById`   |
//! | Query    | `userByIds`      | `findByIds`  |
//! | Query    | `userOne`        | `findOne`    |
//! | Query    | `userMany`       | `findMany`   |
//! | Query    | `userTotal`      | `count`      |
//! | Mutation | `userCreate`     | `createOne`  |
//! | Mutation | `userUpdateById` | `updateById` |
//! | Mutation | `userUpdateOne`  | `updateOne`  |
//! | Mutation | `userUpdateMany` | `updateMany` |
//! | Mutation | `userRemoveById` | `removeById` |
//! | Mutation | `userRemoveOne`  | `removeOne`  |
//! | Mutation | `userRemoveMany` | `removeMany` |

use crate::graphql::{
    assembly::{assemble, DocumentSchemaApi, Error, FieldMap, SchemaLimits},
    crud,
    type_composer::{ComposeOptions, TypeComposer},
};
use crate::schema::{Document, DocumentEnum};
use crate::store::SharedStore;
use serde::{Deserialize, Serialize};

/// A user of the application.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Document)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub name: Option<String>,
    #[document(index)]
    pub age: Option<i32>,
    /// Languages the user speaks.
    #[document(default)]
    #[serde(default)]
    pub languages: Vec<Language>,
    pub contacts: Option<Contacts>,
    pub gender: Option<Gender>,
}

/// A language spoken by a user.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Document)]
pub struct Language {
    pub language: Option<String>,
    pub skill: Option<Skill>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Document)]
pub struct Contacts {
    pub email: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, DocumentEnum)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Ladyboy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, DocumentEnum)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Basic,
    Fluent,
    Native,
}

/// The fields of the user API.
pub fn field_map() -> FieldMap {
    FieldMap::new()
        .query("userById", crud::FIND_BY_ID)
        .query("userByIds", crud::FIND_BY_IDS)
        .query("userOne", crud::FIND_ONE)
        .query("userMany", crud::FIND_MANY)
        .query("userTotal", crud::COUNT)
        .mutation("userCreate", crud::CREATE_ONE)
        .mutation("userUpdateById", crud::UPDATE_BY_ID)
        .mutation("userUpdateOne", crud::UPDATE_ONE)
        .mutation("userUpdateMany", crud::UPDATE_MANY)
        .mutation("userRemoveById", crud::REMOVE_BY_ID)
        .mutation("userRemoveOne", crud::REMOVE_ONE)
        .mutation("userRemoveMany", crud::REMOVE_MANY)
}

/// Types and resolvers for [`User`].
pub fn composer() -> TypeComposer {
    TypeComposer::new::<User>(ComposeOptions::default())
}

/// The user API, backed by `store`.
pub async fn schema(store: SharedStore) -> Result<DocumentSchemaApi, Error> {
    schema_with(&field_map(), store, SchemaLimits::default()).await
}

/// A user API with a custom selection of fields.
pub async fn schema_with(
    fields: &FieldMap,
    store: SharedStore,
    limits: SchemaLimits,
) -> Result<DocumentSchemaApi, Error> {
    assemble(composer(), fields, store, limits).await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        graphql::assembly::{MUTATION_ROOT, QUERY_ROOT},
        init_logging,
        schema::{EnumDecl, FieldType, Shape},
        store::{self, DocumentStore, Filter, MemoryStore, Query},
    };
    use async_graphql::{value, Value};
    use std::sync::Arc;

    async fn root_fields(api: &DocumentSchemaApi, root: &str) -> Vec<String> {
        let data = run(
            api,
            format!(r#"{{ __type(name: "{root}") {{ fields {{ name }} }} }}"#),
        )
        .await
        .into_json()
        .unwrap();
        data["__type"]["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|field| field["name"].as_str().unwrap().to_string())
            .collect()
    }

    /// Run `query`, asserting that it succeeds, and return its data.
    async fn run(api: &DocumentSchemaApi, query: impl Into<String>) -> Value {
        let res = api.execute(query.into()).await;
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        res.data
    }

    /// Pass `value` through JSON, which turns enum values into strings.
    fn json(value: Value) -> Value {
        Value::from_json(value.into_json().unwrap()).unwrap()
    }

    #[test]
    fn test_user_schema() {
        let schema = User::schema();
        assert_eq!(User::NAME, "User");
        assert!(schema.field("age").unwrap().is_indexed());
        assert_eq!(
            schema.field("languages").unwrap().default_value(),
            Some(Value::List(vec![]))
        );
        assert_eq!(schema.indexed_fields().count(), 1);
        assert_eq!(
            schema.fields().iter().filter(|f| f.is_required()).count(),
            0
        );

        let FieldType::List(language) = schema.field("languages").unwrap().ty() else {
            panic!("languages is not a list");
        };
        assert_eq!(**language, FieldType::Embedded(Language::schema()));
        assert_eq!(Skill::VALUES, ["basic", "fluent", "native"]);
        assert_eq!(Gender::VALUES, ["male", "female", "ladyboy"]);
        assert_eq!(Gender::Ladyboy.as_str(), "ladyboy");
        assert_eq!(
            <Option<Skill> as Shape>::shape(),
            FieldType::Enum(EnumDecl::new(["basic", "fluent", "native"]))
        );
    }

    #[async_std::test]
    async fn test_field_mapping() {
        init_logging();

        let api = schema(MemoryStore::shared()).await.unwrap();
        assert_eq!(
            root_fields(&api, QUERY_ROOT).await,
            ["userById", "userByIds", "userOne", "userMany", "userTotal"]
        );
        assert_eq!(
            root_fields(&api, MUTATION_ROOT).await,
            [
                "userCreate",
                "userUpdateById",
                "userUpdateOne",
                "userUpdateMany",
                "userRemoveById",
                "userRemoveOne",
                "userRemoveMany"
            ]
        );

        let sdl = api.sdl();
        for ty in [
            "type User ",
            "type UserLanguages ",
            "type UserContacts ",
            "enum EnumUserGender ",
            "enum EnumUserLanguagesSkill ",
            "input CreateOneUserInput ",
            "input FilterUserInput ",
            "enum SortUserEnum ",
        ] {
            assert!(sdl.contains(ty), "missing {ty:?} in\n{sdl}");
        }
    }

    #[async_std::test]
    async fn test_remove_one_field() {
        init_logging();

        let full = schema(MemoryStore::shared()).await.unwrap();
        let full_query = root_fields(&full, QUERY_ROOT).await;
        let full_mutation = root_fields(&full, MUTATION_ROOT).await;

        let map = field_map();
        let entries = map.query_fields().iter().chain(map.mutation_fields());
        for (field, _) in entries {
            let api = schema_with(
                &field_map().without(field),
                MemoryStore::shared(),
                SchemaLimits::default(),
            )
            .await
            .unwrap();
            let expected = |fields: &[String]| {
                fields
                    .iter()
                    .filter(|name| *name != field)
                    .cloned()
                    .collect::<Vec<_>>()
            };
            assert_eq!(
                root_fields(&api, QUERY_ROOT).await,
                expected(&full_query),
                "without {field}"
            );
            assert_eq!(
                root_fields(&api, MUTATION_ROOT).await,
                expected(&full_mutation),
                "without {field}"
            );
        }
        assert_eq!(full_query.len() + full_mutation.len(), 12);

        let api = schema_with(
            &field_map().without_bulk_mutations(),
            MemoryStore::shared(),
            SchemaLimits::default(),
        )
        .await
        .unwrap();
        let mutations = root_fields(&api, MUTATION_ROOT).await;
        assert_eq!(mutations.len(), 5);
        assert!(!mutations.contains(&"userUpdateMany".to_string()));
        assert!(!mutations.contains(&"userRemoveMany".to_string()));
    }

    #[async_std::test]
    async fn test_missing_resolver() {
        init_logging();

        let err = schema_with(
            &field_map().query("userAll", "findAll"),
            MemoryStore::shared(),
            SchemaLimits::default(),
        )
        .await
        .err()
        .unwrap();
        assert!(
            matches!(&err, Error::MissingResolver { field, resolver, .. }
                if field == "userAll" && resolver == "findAll"),
            "{err}"
        );
    }

    #[async_std::test]
    async fn test_create_and_find() {
        init_logging();

        let api = schema(MemoryStore::shared()).await.unwrap();
        let created = run(
            &api,
            r#"mutation {
                userCreate(record: {
                    name: "Ann",
                    age: 33,
                    languages: [{ language: "en", skill: basic }],
                    contacts: { email: "ann@example.com", phones: ["555-0100"] },
                    gender: female,
                }) { _id }
            }"#,
        )
        .await;
        let Value::Object(created) = created else {
            panic!("expected object");
        };
        let Some(Value::Object(user)) = created.get("userCreate") else {
            panic!("userCreate returned nothing");
        };
        let Some(Value::String(id)) = user.get("_id") else {
            panic!("user has no id");
        };
        assert_eq!(id.len(), 24);

        let found = run(
            &api,
            format!(
                r#"{{
                    userById(id: "{id}") {{
                        _id name age gender
                        languages {{ language skill }}
                        contacts {{ email phones }}
                    }}
                }}"#
            ),
        )
        .await;
        assert_eq!(
            json(found),
            json(value!({
                "userById": {
                    "_id": id.clone(),
                    "name": "Ann",
                    "age": 33,
                    "gender": "female",
                    "languages": [{ "language": "en", "skill": "basic" }],
                    "contacts": { "email": "ann@example.com", "phones": ["555-0100"] },
                }
            }))
        );

        // Unknown ids are not errors.
        let missing = run(
            &api,
            r#"{ userById(id: "000000000000000000000000") { name } }"#,
        )
        .await;
        assert_eq!(missing, value!({ "userById": null }));
    }

    #[async_std::test]
    async fn test_languages_default() {
        init_logging();

        let api = schema(MemoryStore::shared()).await.unwrap();
        let created = run(
            &api,
            r#"mutation { userCreate(record: { name: "Bob" }) { name languages { language } } }"#,
        )
        .await;
        assert_eq!(
            created,
            value!({ "userCreate": { "name": "Bob", "languages": [] } })
        );
    }

    #[async_std::test]
    async fn test_reject_invalid_skill() {
        init_logging();

        let store = MemoryStore::create();
        let api = schema(Arc::new(store.clone())).await.unwrap();

        for skill in ["intermediate", r#""intermediate""#] {
            let res = api
                .execute(format!(
                    r#"mutation {{
                        userCreate(record: {{ name: "Cy", languages: [{{ skill: {skill} }}] }}) {{
                            _id
                        }}
                    }}"#
                ))
                .await;
            assert!(!res.errors.is_empty(), "{skill} was accepted");
            assert!(
                res.errors.iter().any(|err| err.message.contains("intermediate")
                    || err.message.contains("EnumUserLanguagesSkill")),
                "{:?}",
                res.errors
            );
        }
        assert_eq!(
            run(&api, "{ userTotal }").await,
            value!({ "userTotal": 0 })
        );

        // The store enforces the same constraint on writes that bypass GraphQL.
        let mut fields = User {
            name: Some("Cy".into()),
            ..Default::default()
        }
        .to_fields()
        .unwrap();
        fields.insert(
            async_graphql::Name::new("languages"),
            value!([{ "skill": "intermediate" }]),
        );
        let err = store.insert("users", fields).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION");
        assert!(
            matches!(&err, store::Error::Validation { path, .. } if path == "languages.0.skill"),
            "{err}"
        );
        assert_eq!(store.count("users", &Filter::all()).await.unwrap(), 0);
    }

    #[async_std::test]
    async fn test_bad_id() {
        init_logging();

        let api = schema(MemoryStore::shared()).await.unwrap();
        let res = api.execute(r#"{ userById(id: "nope") { name } }"#).await;
        assert_eq!(res.errors.len(), 1);
        let code = res.errors[0]
            .extensions
            .as_ref()
            .and_then(|extensions| extensions.get("code"))
            .cloned();
        assert_eq!(code, Some(value!("BAD_INPUT")));
    }

    #[async_std::test]
    async fn test_update_and_remove() {
        init_logging();

        let api = schema(MemoryStore::shared()).await.unwrap();
        for (name, age) in [("Ann", 33), ("Bob", 25), ("Cy", 41)] {
            let record = format!(r#"{{ name: "{name}", age: {age} }}"#);
            run(&api, format!("mutation {{ userCreate(record: {record}) {{ _id }} }}")).await;
        }

        assert_eq!(
            run(
                &api,
                r#"mutation {
                    userUpdateMany(filter: { name: "Nobody" }, record: { age: 1 }) { count }
                }"#
            )
            .await,
            value!({ "userUpdateMany": { "count": 0 } })
        );
        assert_eq!(
            run(
                &api,
                r#"mutation {
                    userUpdateMany(
                        filter: { _operators: { age: { gte: 30 } } },
                        record: { gender: male },
                    ) { count }
                }"#
            )
            .await,
            value!({ "userUpdateMany": { "count": 2 } })
        );
        assert_eq!(
            json(
                run(
                    &api,
                    "{ userMany(filter: { gender: male }, sort: AGE_DESC) { name gender } }"
                )
                .await
            ),
            json(value!({
                "userMany": [
                    { "name": "Cy", "gender": "male" },
                    { "name": "Ann", "gender": "male" },
                ]
            }))
        );

        assert_eq!(
            run(
                &api,
                r#"mutation { userUpdateOne(filter: { name: "Bob" }, record: { age: 26 }) { age } }"#
            )
            .await,
            value!({ "userUpdateOne": { "age": 26 } })
        );
        assert_eq!(
            run(&api, r#"mutation { userRemoveOne(filter: { name: "Bob" }) { name } }"#).await,
            value!({ "userRemoveOne": { "name": "Bob" } })
        );
        assert_eq!(
            run(&api, "mutation { userRemoveMany { count } }").await,
            value!({ "userRemoveMany": { "count": 2 } })
        );
        assert_eq!(
            run(&api, "{ userTotal }").await,
            value!({ "userTotal": 0 })
        );
    }

    #[async_std::test]
    async fn test_typed_round_trip() {
        init_logging();

        let store = MemoryStore::create();
        store.register(&User::schema()).await.unwrap();

        let user = User {
            name: Some("Dee".into()),
            age: Some(52),
            languages: vec![Language {
                language: Some("fr".into()),
                skill: Some(Skill::Native),
            }],
            contacts: Some(Contacts {
                email: None,
                phones: vec!["555-0199".into()],
            }),
            gender: Some(Gender::Female),
        };
        let record = store
            .insert("users", user.to_fields().unwrap())
            .await
            .unwrap();

        let found = store
            .find("users", &Query::new(Filter::by_id(record.id())))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            User::from_fields(found.into_iter().next().unwrap().into_fields()).unwrap(),
            user
        );
    }
}
