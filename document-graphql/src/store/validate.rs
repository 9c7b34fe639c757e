//! Write-time validation of documents against their schema.
//!
//! Any [`DocumentStore`](super::DocumentStore) can use these checks. They enforce the constraints a
//! [`DocumentSchema`] declares: field types, enum values, required fields. They also normalize the
//! representation of values, so that equal documents are always stored the same way:
//! * `null` fields are dropped, so an absent field and a `null` field are indistinguishable;
//! * enum values are stored as [`Value::Enum`], whether they were written as enums or strings;
//! * fields are stored in declaration order.

use super::Error;
use crate::schema::{DocumentSchema, FieldType, Fields, ScalarType};
use async_graphql::{Name, Value};

/// Whether to fill in defaulted fields which are absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Defaults {
    /// A new document is being created: absent fields with a default get it.
    Apply,
    /// An existing document is being replaced: absent fields stay absent.
    Skip,
}

/// Check `fields` against `schema`, returning the normalized document.
///
/// `collection` is only used to report errors.
pub fn validate(
    collection: &str,
    schema: &DocumentSchema,
    fields: Fields,
    defaults: Defaults,
) -> Result<Fields, Error> {
    validate_document(schema, fields, defaults, "").map_err(|(path, message)| Error::Validation {
        collection: collection.to_string(),
        path,
        message,
    })
}

type Failure = (String, String);

fn join(prefix: &str, name: impl std::fmt::Display) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

fn validate_document(
    schema: &DocumentSchema,
    mut fields: Fields,
    defaults: Defaults,
    prefix: &str,
) -> Result<Fields, Failure> {
    let mut valid = Fields::with_capacity(fields.len());
    for decl in schema.fields() {
        let path = join(prefix, decl.name());
        let value = match fields.shift_remove(decl.name()) {
            Some(Value::Null) | None => match defaults {
                Defaults::Apply => decl.default_value(),
                Defaults::Skip => None,
            },
            Some(value) => Some(value),
        };
        match value {
            Some(value) => {
                let value = validate_value(decl.ty(), value, defaults, &path)?;
                valid.insert(Name::new(decl.name()), value);
            }
            None if decl.is_required() => {
                return Err((path, "field is required".into()));
            }
            None => {}
        }
    }

    // Anything left over was not declared.
    if let Some((name, _)) = fields.first() {
        return Err((
            join(prefix, name),
            format!("{} has no field {name}", schema.name()),
        ));
    }
    Ok(valid)
}

fn validate_value(
    ty: &FieldType,
    value: Value,
    defaults: Defaults,
    path: &str,
) -> Result<Value, Failure> {
    let mismatch = |expected: &str, value: &Value| {
        (path.to_string(), format!("expected {expected}, got {value}"))
    };

    match (ty, value) {
        (FieldType::Scalar(ScalarType::String), value @ Value::String(_)) => Ok(value),
        (FieldType::Scalar(ScalarType::Int), Value::Number(n)) => {
            match n.as_i64().and_then(|n| i32::try_from(n).ok()) {
                Some(n) => Ok(Value::from(n)),
                None => Err(mismatch("a 32-bit integer", &Value::Number(n))),
            }
        }
        (FieldType::Scalar(ScalarType::Float), Value::Number(n)) => match n.as_f64() {
            Some(x) => Ok(Value::from(x)),
            None => Err(mismatch("a number", &Value::Number(n))),
        },
        (FieldType::Scalar(ScalarType::Boolean), value @ Value::Boolean(_)) => Ok(value),
        (FieldType::Scalar(ty), value) => Err(mismatch(&format!("{ty:?}"), &value)),
        (FieldType::Enum(decl), Value::Enum(name)) if decl.contains(name.as_str()) => {
            Ok(Value::Enum(name))
        }
        (FieldType::Enum(decl), Value::String(s)) if decl.contains(&s) => {
            Ok(Value::Enum(Name::new(s)))
        }
        (FieldType::Enum(decl), value) => Err((
            path.to_string(),
            format!("{value} is not one of {}", decl.values().join(", ")),
        )),
        (FieldType::Embedded(schema), Value::Object(fields)) => Ok(Value::Object(
            validate_document(schema, fields, defaults, path)?,
        )),
        (FieldType::Embedded(schema), value) => Err(mismatch(schema.name(), &value)),
        (FieldType::List(ty), Value::List(items)) => Ok(Value::List(
            items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    let path = join(path, i);
                    if item == Value::Null {
                        return Err((path, "list items cannot be null".into()));
                    }
                    validate_value(ty, item, defaults, &path)
                })
                .collect::<Result<_, _>>()?,
        )),
        (FieldType::List(_), value) => Err(mismatch("a list", &value)),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::schema::{Document, DocumentEnum};
    use async_graphql::value;

    #[derive(Document)]
    struct Post {
        #[document(required)]
        title: String,
        #[document(index)]
        stars: Option<i32>,
        #[document(default)]
        tags: Vec<Tag>,
        meta: Option<Meta>,
    }

    #[derive(Document)]
    struct Meta {
        #[document(default)]
        flagged: Option<bool>,
        score: Option<f64>,
    }

    #[derive(DocumentEnum)]
    enum Tag {
        News,
        Opinion,
    }

    fn fields(value: Value) -> Fields {
        let Value::Object(fields) = value else { panic!("not an object: {value}"); };
        fields
    }

    fn check(value: Value, defaults: Defaults) -> Result<Value, (String, String)> {
        match validate("posts", &Post::schema(), fields(value), defaults) {
            Ok(fields) => Ok(Value::Object(fields)),
            Err(Error::Validation {
                collection,
                path,
                message,
            }) => {
                assert_eq!(collection, "posts");
                Err((path, message))
            }
            Err(err) => panic!("unexpected error {err}"),
        }
    }

    #[test]
    fn test_normalize() {
        let mut input = fields(value!({
            "meta": { "score": 3 },
            "tags": ["opinion"],
            "stars": null,
            "title": "hello",
        }));
        let Some(Value::List(tags)) = input.get_mut("tags") else { unreachable!() };
        tags.push(Value::Enum(Name::new("news")));

        let doc = validate("posts", &Post::schema(), input, Defaults::Apply).unwrap();
        assert_eq!(
            doc.keys().map(Name::as_str).collect::<Vec<_>>(),
            ["title", "tags", "meta"]
        );
        assert_eq!(
            doc["tags"],
            Value::List(vec![
                Value::Enum(Name::new("opinion")),
                Value::Enum(Name::new("news"))
            ])
        );
        assert_eq!(doc["meta"], value!({ "flagged": false, "score": 3.0 }));
        assert_eq!(Tag::News.as_str(), "news");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            check(value!({ "title": "t" }), Defaults::Apply).unwrap(),
            value!({ "title": "t", "tags": [] })
        );
        assert_eq!(
            check(value!({ "title": "t" }), Defaults::Skip).unwrap(),
            value!({ "title": "t" })
        );
    }

    #[test]
    fn test_rejections() {
        let cases = [
            (value!({}), "title", "field is required"),
            (value!({ "title": null }), "title", "field is required"),
            (value!({ "title": 1 }), "title", "expected String"),
            (value!({ "title": "t", "stars": 1.5 }), "stars", "32-bit integer"),
            (value!({ "title": "t", "stars": 4_000_000_000i64 }), "stars", "32-bit integer"),
            (value!({ "title": "t", "tags": ["sports"] }), "tags.0", "is not one of news, opinion"),
            (value!({ "title": "t", "tags": "news" }), "tags", "expected a list"),
            (value!({ "title": "t", "tags": ["news", null] }), "tags.1", "cannot be null"),
            (value!({ "title": "t", "meta": { "flagged": "yes" } }), "meta.flagged", "expected Boolean"),
            (value!({ "title": "t", "meta": { "views": 1 } }), "meta.views", "Meta has no field views"),
            (value!({ "title": "t", "author": "me" }), "author", "Post has no field author"),
            (value!({ "title": "t", "meta": [] }), "meta", "expected Meta"),
        ];
        for (doc, path, message) in cases {
            let (actual_path, actual_message) = check(doc.clone(), Defaults::Apply).unwrap_err();
            assert_eq!(actual_path, path, "{doc}");
            assert!(
                actual_message.contains(message),
                "{doc}: {actual_message:?} does not contain {message:?}"
            );
        }
    }
}
