//! Persistence of documents.
//!
//! The GraphQL layer never touches stored documents directly. It talks to a [`DocumentStore`],
//! which owns storage, identity, indexing and write-time validation. Resolvers find the store in
//! the GraphQL context as a [`SharedStore`].
//!
//! Queries are expressed in a small, backend-agnostic language: a [`Filter`] is a conjunction of
//! [`Condition`]s on [`FieldPath`]s, and a [`Query`] adds sorting and paging on top of a filter.
//! The semantics of each condition are defined once, by [`Condition::matches`], so that every
//! backend agrees on which documents a filter selects.

use crate::schema::Fields;
use async_graphql::{Name, Value};
use async_trait::async_trait;
use bson::oid;
use convert_case::{Boundary, Case, Casing};
use derive_more::Display;
use snafu::Snafu;
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "memory")]
pub mod memory;
pub mod validate;

#[cfg(feature = "memory")]
pub use memory::MemoryStore;

pub use crate::schema::DocumentSchema;

/// The name of the identity field every stored document has.
pub const ID_FIELD: &str = "_id";

/// A [`DocumentStore`] shared between resolvers.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Errors reported by a [`DocumentStore`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("validation failed for {collection}.{path}: {message}"))]
    Validation {
        collection: String,
        path: String,
        message: String,
    },

    #[snafu(display("no such collection {collection}"))]
    UnknownCollection { collection: String },

    #[snafu(display("invalid id {id:?}"))]
    InvalidId { id: String },

    #[snafu(display("invalid query: {message}"))]
    InvalidQuery { message: String },

    #[snafu(display("store error: {message}"))]
    Backend { message: String },
}

impl Error {
    /// A failure of the storage backend itself.
    pub fn backend(message: impl Display) -> Self {
        Self::Backend {
            message: message.to_string(),
        }
    }

    /// A short, stable classification of this error, suitable for reporting to clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION",
            Self::InvalidId { .. } | Self::InvalidQuery { .. } => "BAD_INPUT",
            Self::UnknownCollection { .. } | Self::Backend { .. } => "BACKEND",
        }
    }
}

/// A store of documents, organized in collections.
///
/// Implementations must make operations on the same document linearizable: once an update of a
/// document has returned, every later read of that document observes it.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create the collection for documents described by `schema`, along with its indexes.
    ///
    /// Registering the same schema again is a no-op.
    async fn register(&self, schema: &DocumentSchema) -> Result<(), Error>;

    /// Validate and insert a new document, returning it as stored.
    ///
    /// Fields which are absent from `fields` but declared with a default are filled in.
    async fn insert(&self, collection: &str, fields: Fields) -> Result<Record, Error>;

    /// Load the documents matching `query`.
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Record>, Error>;

    /// Count the documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, Error>;

    /// Apply `patch` to every document matching `query`, returning the updated documents.
    ///
    /// The update is all or nothing: if any patched document fails validation, no document is
    /// changed. See [`merge`] for how `patch` is applied.
    async fn update(
        &self,
        collection: &str,
        query: &Query,
        patch: &Fields,
    ) -> Result<Vec<Record>, Error>;

    /// Delete every document matching `query`, returning the deleted documents.
    async fn remove(&self, collection: &str, query: &Query) -> Result<Vec<Record>, Error>;
}

/// The name of the collection holding documents named `document`.
///
/// This is the snake_case plural of the document name, so `User` documents live in `users`.
pub fn collection_name(document: &str) -> String {
    use Boundary::*;
    format!("{document}s")
        .with_boundaries(&[Hyphen, Underscore, Space, LowerUpper])
        .to_case(Case::Snake)
}

/// The identity of a stored document.
///
/// Ids are BSON object ids: a 4-byte creation timestamp, 5 bytes unique to the process and a
/// 3-byte counter. They are written as 24 lowercase hex digits, and because all ids have the same
/// length, the written form orders the same way as the bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(oid::ObjectId);

impl ObjectId {
    /// A fresh id, distinct from every other id generated by this process.
    pub fn new() -> Self {
        Self(oid::ObjectId::new())
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(oid::ObjectId::from_bytes(bytes))
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0.bytes()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        oid::ObjectId::parse_str(s)
            .map(Self)
            .map_err(|_| Error::InvalidId { id: s.to_string() })
    }
}

/// A stored document.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    id: ObjectId,
    fields: Fields,
}

impl Record {
    pub fn new(id: ObjectId, fields: Fields) -> Self {
        Self { id, fields }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    /// The value at `path`, if the document has one.
    pub fn get(&self, path: &FieldPath) -> Option<Value> {
        if path.is_id() {
            return Some(Value::String(self.id.to_string()));
        }
        let (first, rest) = path.0.split_first()?;
        let mut value = self.fields.get(first.as_str())?;
        for segment in rest {
            let Value::Object(fields) = value else { return None; };
            value = fields.get(segment.as_str())?;
        }
        Some(value.clone())
    }

    /// The whole document as a value, with its id in the [`ID_FIELD`].
    pub fn into_value(self) -> Value {
        let mut fields = Fields::with_capacity(self.fields.len() + 1);
        fields.insert(Name::new(ID_FIELD), Value::String(self.id.to_string()));
        fields.extend(self.fields);
        Value::Object(fields)
    }
}

/// Apply a partial update to the fields of a document.
///
/// Each top-level entry of `patch` is applied independently:
/// * `null` removes the field;
/// * an object merged into an existing object (an embedded document) is merged recursively;
/// * anything else replaces the existing value, so lists and scalars are overwritten whole.
pub fn merge(fields: &mut Fields, patch: &Fields) {
    for (name, value) in patch {
        match (fields.get_mut(name), value) {
            (_, Value::Null) => {
                fields.shift_remove(name);
            }
            (Some(Value::Object(current)), Value::Object(patch)) => merge(current, patch),
            _ => {
                fields.insert(name.clone(), value.clone());
            }
        }
    }
}

/// A dotted path to a field, possibly inside embedded documents.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The path of the document id.
    pub fn id() -> Self {
        Self(vec![ID_FIELD.to_string()])
    }

    /// A path made of `segments`.
    ///
    /// # Panics
    ///
    /// Panics if `segments` is empty.
    pub fn new<I>(segments: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        assert!(!segments.is_empty(), "a field path needs at least one segment");
        Self(segments)
    }

    /// Extend this path with a nested field.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_id(&self) -> bool {
        self.0.len() == 1 && self.0[0] == ID_FIELD
    }

    /// The name of the field, if this path names a top-level field.
    pub fn top_level(&self) -> Option<&str> {
        match self.0.as_slice() {
            [name] => Some(name),
            _ => None,
        }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::new(path.split('.'))
    }
}

/// A comparison applied to the value at a [`FieldPath`].
#[derive(Clone, Debug, Display, PartialEq)]
pub enum Op {
    #[display(fmt = "= {}", _0)]
    Eq(Value),
    #[display(fmt = "!= {}", _0)]
    Ne(Value),
    #[display(fmt = "> {}", _0)]
    Gt(Value),
    #[display(fmt = ">= {}", _0)]
    Gte(Value),
    #[display(fmt = "< {}", _0)]
    Lt(Value),
    #[display(fmt = "<= {}", _0)]
    Lte(Value),
    #[display(fmt = "in {:?}", _0)]
    In(Vec<Value>),
    #[display(fmt = "not in {:?}", _0)]
    Nin(Vec<Value>),
}

/// A single condition of a [`Filter`].
#[derive(Clone, Debug, Display, PartialEq)]
#[display(fmt = "{path} {op}")]
pub struct Condition {
    pub path: FieldPath,
    pub op: Op,
}

impl Condition {
    /// Does `record` satisfy this condition?
    ///
    /// * Equality against `null` matches documents where the field is absent.
    /// * Equality against a list field matches if any element of the list is equal.
    /// * Ordering comparisons only match values of the same kind (numbers with numbers, text with
    ///   text) and never match an absent field.
    pub fn matches(&self, record: &Record) -> bool {
        let value = record.get(&self.path);
        let value = value.as_ref();
        match &self.op {
            Op::Eq(expected) => is_eq(value, expected),
            Op::Ne(expected) => !is_eq(value, expected),
            Op::Gt(bound) => cmp_is(value, bound, |o| o == Ordering::Greater),
            Op::Gte(bound) => cmp_is(value, bound, |o| o != Ordering::Less),
            Op::Lt(bound) => cmp_is(value, bound, |o| o == Ordering::Less),
            Op::Lte(bound) => cmp_is(value, bound, |o| o != Ordering::Greater),
            Op::In(options) => options.iter().any(|expected| is_eq(value, expected)),
            Op::Nin(options) => !options.iter().any(|expected| is_eq(value, expected)),
        }
    }
}

fn is_eq(value: Option<&Value>, expected: &Value) -> bool {
    match (value, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(Value::List(items)), expected) if !matches!(expected, Value::List(_)) => items
            .iter()
            .any(|item| compare(item, expected) == Some(Ordering::Equal)),
        (Some(value), expected) => compare(value, expected) == Some(Ordering::Equal),
        (None, _) => false,
    }
}

fn cmp_is(value: Option<&Value>, bound: &Value, f: impl Fn(Ordering) -> bool) -> bool {
    value.and_then(|value| compare(value, bound)).map_or(false, f)
}

/// Compare two values of the same kind.
///
/// Numbers compare numerically and text (including enum values) lexicographically. Values of
/// different kinds are incomparable.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::Boolean(a), Value::Boolean(b)) => Some(a.cmp(b)),
        (Value::List(a), Value::List(b)) => {
            for (a, b) in a.iter().zip(b) {
                match compare(a, b)? {
                    Ordering::Equal => continue,
                    ord => return Some(ord),
                }
            }
            Some(a.len().cmp(&b.len()))
        }
        (Value::Object(a), Value::Object(b)) => {
            if a.len() == b.len()
                && a.iter().all(|(k, v)| {
                    b.get(k)
                        .and_then(|w| compare(v, w))
                        .map_or(false, Ordering::is_eq)
                })
            {
                Some(Ordering::Equal)
            } else {
                None
            }
        }
        (a, b) => text(a)?.partial_cmp(text(b)?),
    }
}

fn text(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s),
        Value::Enum(name) => Some(name.as_str()),
        _ => None,
    }
}

/// The sort order of values, used to order query results.
///
/// Unlike [`compare`], this is a total order: absent and `null` values come first, then values
/// grouped by kind (booleans, numbers, text, lists, objects), ordered within each kind.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Boolean(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_) | Value::Enum(_)) => 3,
            Some(Value::List(_)) => 4,
            Some(Value::Object(_) | Value::Binary(_)) => 5,
        }
    }

    match (a, b) {
        (Some(a), Some(b)) if rank(Some(a)) == rank(Some(b)) => {
            compare(a, b).unwrap_or(Ordering::Equal)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A conjunction of [`Condition`]s.
///
/// The empty filter matches every document.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// A filter matching every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching the document with id `id`.
    pub fn by_id(id: ObjectId) -> Self {
        Self::all().and(FieldPath::id(), Op::Eq(Value::String(id.to_string())))
    }

    /// A filter matching the documents with any of the ids in `ids`.
    pub fn by_ids(ids: impl IntoIterator<Item = ObjectId>) -> Self {
        Self::all().and(
            FieldPath::id(),
            Op::In(
                ids.into_iter()
                    .map(|id| Value::String(id.to_string()))
                    .collect(),
            ),
        )
    }

    /// Require `op` to hold on the value at `path` as well.
    pub fn and(mut self, path: impl Into<FieldPath>, op: Op) -> Self {
        self.conditions.push(Condition {
            path: path.into(),
            op,
        });
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Does `record` satisfy every condition?
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

impl FromIterator<Condition> for Filter {
    fn from_iter<I: IntoIterator<Item = Condition>>(conditions: I) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
        }
    }
}

impl Display for Filter {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.conditions.is_empty() {
            return write!(f, "true");
        }
        for (i, cond) in self.conditions.iter().enumerate() {
            if i > 0 {
                write!(f, " AND ")?;
            }
            write!(f, "{cond}")?;
        }
        Ok(())
    }
}

/// The direction of a sort key.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum Direction {
    #[display(fmt = "ASC")]
    Asc,
    #[display(fmt = "DESC")]
    Desc,
}

/// A filter plus ordering and paging.
///
/// Without sort keys, documents come back in natural (insertion) order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub sort: Vec<(FieldPath, Direction)>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Order results by `path` (after any sort keys already added).
    pub fn sort(mut self, path: impl Into<FieldPath>, direction: Direction) -> Self {
        self.sort.push((path.into(), direction));
        self
    }

    /// Skip the first `skip` matching documents.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Return at most `limit` documents.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order `records` by the sort keys of this query.
    ///
    /// The sort is stable, so ties keep the order they came in.
    pub fn order(&self, records: &mut [Record]) {
        if self.sort.is_empty() {
            return;
        }
        records.sort_by(|a, b| {
            for (path, direction) in &self.sort {
                let ord = sort_order(a.get(path).as_ref(), b.get(path).as_ref());
                let ord = match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    /// Apply skip and limit to an ordered list of matches.
    pub fn page<T>(&self, matches: Vec<T>) -> Vec<T> {
        let limit = self.limit.unwrap_or(usize::MAX);
        matches.into_iter().skip(self.skip).take(limit).collect()
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "WHERE {}", self.filter)?;
        if !self.sort.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, (path, direction)) in self.sort.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{path} {direction}")?;
            }
        }
        if self.skip > 0 {
            write!(f, " SKIP {}", self.skip)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_graphql::value;

    fn record(fields: Value) -> Record {
        let Value::Object(fields) = fields else { panic!("not an object: {fields}"); };
        Record::new(ObjectId::from_bytes([7; 12]), fields)
    }

    #[test]
    fn test_collection_name() {
        assert_eq!(collection_name("User"), "users");
        assert_eq!(collection_name("UserProfile"), "user_profiles");
    }

    #[test]
    fn test_object_id_text() {
        let id = ObjectId::from_bytes([0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0xab, 0xff]);
        assert_eq!(id.to_string(), "00010203040506070809abff");
        assert_eq!(id.to_string().parse::<ObjectId>().unwrap(), id);
        assert_eq!("00010203040506070809ABFF".parse::<ObjectId>().unwrap(), id);
        assert_eq!(id.bytes()[10..], [0xab, 0xff]);

        for bad in [
            "",
            "000102030405060708090af",
            "zz0102030405060708090aff",
            "ßß0102030405060708090a",
        ] {
            assert!(
                matches!(bad.parse::<ObjectId>(), Err(Error::InvalidId { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_object_id_new() {
        let ids = (0..100).map(|_| ObjectId::new()).collect::<Vec<_>>();
        assert_eq!(ids.iter().collect::<std::collections::HashSet<_>>().len(), 100);
        for pair in ids.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert_eq!(a.cmp(&b), a.to_string().cmp(&b.to_string()));
            assert_eq!(a.to_string().parse::<ObjectId>().unwrap(), a);
        }
    }

    #[test]
    fn test_record_get() {
        let r = record(value!({
            "name": "Jeff",
            "contacts": { "email": "jeff@example.com" },
        }));
        assert_eq!(r.get(&"name".into()), Some(value!("Jeff")));
        assert_eq!(
            r.get(&"contacts.email".into()),
            Some(value!("jeff@example.com"))
        );
        assert_eq!(r.get(&"contacts.phones".into()), None);
        assert_eq!(r.get(&"name.first".into()), None);
        assert_eq!(r.get(&FieldPath::id()), Some(value!("070707070707070707070707")));
    }

    #[test]
    fn test_conditions() {
        let mut r = record(value!({
            "age": 30,
            "phones": ["555-1234", "555-9876"],
        }));
        r.fields
            .insert(Name::new("gender"), Value::Enum(Name::new("female")));
        let check = |path: &str, op| Condition {
            path: path.into(),
            op,
        }
        .matches(&r);

        assert!(check("age", Op::Eq(value!(30))));
        assert!(check("age", Op::Eq(value!(30.0))));
        assert!(!check("age", Op::Eq(value!("30"))));
        assert!(check("age", Op::Gt(value!(29))));
        assert!(!check("age", Op::Gt(value!(30))));
        assert!(check("age", Op::Gte(value!(30))));
        assert!(check("age", Op::Lt(value!(31))));
        assert!(check("age", Op::Lte(value!(30))));
        assert!(!check("age", Op::Lt(value!("a"))));
        assert!(check("age", Op::In(vec![value!(1), value!(30)])));
        assert!(check("age", Op::Nin(vec![value!(1), value!(2)])));

        // Enums compare with their text.
        assert!(check("gender", Op::Eq(value!("female"))));
        assert!(check("gender", Op::Ne(Value::Enum(Name::new("male")))));

        // Lists match if any element matches.
        assert!(check("phones", Op::Eq(value!("555-9876"))));
        assert!(!check("phones", Op::Eq(value!("555-0000"))));

        // Absent fields are equal to null and nothing else.
        assert!(check("name", Op::Eq(Value::Null)));
        assert!(check("name", Op::Ne(value!("Jeff"))));
        assert!(!check("name", Op::Gt(value!(""))));
        assert!(!check("age", Op::Eq(Value::Null)));
    }

    #[test]
    fn test_merge() {
        let Value::Object(mut fields) = value!({
            "name": "Jeff",
            "age": 30,
            "languages": [{ "language": "en" }],
            "contacts": { "email": "jeff@example.com", "phones": ["1"] },
        }) else { unreachable!() };
        let Value::Object(patch) = value!({
            "age": null,
            "languages": [],
            "contacts": { "phones": ["2", "3"] },
        }) else { unreachable!() };

        merge(&mut fields, &patch);
        assert_eq!(
            Value::Object(fields),
            value!({
                "name": "Jeff",
                "languages": [],
                "contacts": { "email": "jeff@example.com", "phones": ["2", "3"] },
            })
        );
    }

    #[test]
    fn test_query_order_and_page() {
        let mut records = [
            value!({ "name": "b", "age": 2 }),
            value!({ "name": "a" }),
            value!({ "name": "c", "age": 1 }),
            value!({ "name": "d", "age": 2 }),
        ]
        .into_iter()
        .map(record)
        .collect::<Vec<_>>();

        let query = Query::default()
            .sort("age", Direction::Desc)
            .sort("name", Direction::Asc)
            .skip(1)
            .limit(2);
        query.order(&mut records);
        let names = query
            .page(records)
            .into_iter()
            .map(|r| r.get(&"name".into()).unwrap())
            .collect::<Vec<_>>();
        assert_eq!(names, [value!("d"), value!("c")]);
        assert_eq!(
            query.to_string(),
            "WHERE true ORDER BY age DESC, name ASC SKIP 1 LIMIT 2"
        );
    }
}
