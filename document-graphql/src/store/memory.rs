//! In-memory instantiation of the [`DocumentStore`](super::DocumentStore) interface.
//!
//! This store keeps every collection in a simple in-memory database guarded by a single lock. It
//! is useful for testing and for serving small, ephemeral data sets. It nonetheless behaves like a
//! real document database in the ways clients can observe:
//! * documents get [`ObjectId`]s which sort roughly by creation time;
//! * writes are validated against the registered schema, and a failed write changes nothing;
//! * indexed fields get an ordered index, which answers equality, `in` and range conditions
//!   without scanning the collection.

use super::{
    collection_name, merge,
    validate::{validate, Defaults},
    Condition, DocumentSchema, Error, Filter, ObjectId, Op, Query, Record, SharedStore,
};
use crate::schema::Fields;
use async_graphql::Value;
use async_std::sync::{Arc, RwLock};
use async_trait::async_trait;
use indexmap::IndexMap;
use itertools::Itertools;
use std::cmp::Ordering;
use std::collections::hash_map::{Entry, HashMap};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

/// The in-memory database.
#[derive(Debug)]
struct Db {
    collections: HashMap<String, Collection>,
}

impl Db {
    fn collection(&self, name: &str) -> Result<&Collection, Error> {
        self.collections
            .get(name)
            .ok_or_else(|| Error::UnknownCollection {
                collection: name.to_string(),
            })
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection, Error> {
        self.collections
            .get_mut(name)
            .ok_or_else(|| Error::UnknownCollection {
                collection: name.to_string(),
            })
    }
}

/// An in-memory collection.
#[derive(Debug)]
struct Collection {
    name: String,
    schema: DocumentSchema,
    /// Documents in natural (insertion) order.
    documents: IndexMap<ObjectId, Fields>,
    indexes: HashMap<String, Index>,
}

impl Collection {
    fn new(name: String, schema: DocumentSchema) -> Self {
        let indexes = schema
            .indexed_fields()
            .map(|field| {
                tracing::info!("CREATE INDEX ON {name} ({})", field.name());
                (field.name().to_string(), Index::default())
            })
            .collect();
        Self {
            name,
            schema,
            documents: IndexMap::new(),
            indexes,
        }
    }

    fn insert(&mut self, id: ObjectId, fields: Fields) {
        for (field, index) in &mut self.indexes {
            if let Some(key) = fields.get(field.as_str()).and_then(IndexKey::new) {
                index.insert(key, id);
            }
        }
        self.documents.insert(id, fields);
    }

    fn replace(&mut self, id: ObjectId, fields: Fields) {
        let Some(old) = self.documents.get_mut(&id) else { return; };
        for (field, index) in &mut self.indexes {
            if let Some(key) = old.get(field.as_str()).and_then(IndexKey::new) {
                index.remove(&key, id);
            }
            if let Some(key) = fields.get(field.as_str()).and_then(IndexKey::new) {
                index.insert(key, id);
            }
        }
        *old = fields;
    }

    fn delete(&mut self, id: ObjectId) {
        let Some(old) = self.documents.shift_remove(&id) else { return; };
        for (field, index) in &mut self.indexes {
            if let Some(key) = old.get(field.as_str()).and_then(IndexKey::new) {
                index.remove(&key, id);
            }
        }
    }

    /// The documents matching `query`, ordered and paged.
    fn select(&self, query: &Query) -> Vec<Record> {
        let candidates = match self.plan(&query.filter) {
            Some(ids) => ids
                .into_iter()
                .filter_map(|id| Some((self.documents.get_index_of(&id)?, id)))
                .sorted()
                .map(|(_, id)| Record::new(id, self.documents[&id].clone()))
                .collect_vec(),
            None => self
                .documents
                .iter()
                .map(|(id, fields)| Record::new(*id, fields.clone()))
                .collect_vec(),
        };

        // The plan only narrows the search. Every condition is still checked on every candidate.
        let mut matches = candidates
            .into_iter()
            .filter(|record| query.filter.matches(record))
            .collect_vec();
        query.order(&mut matches);
        query.page(matches)
    }

    /// Use the id and the indexes to find a superset of the documents matching `filter`.
    ///
    /// Returns [`None`] if no condition can be answered this way, in which case the whole
    /// collection must be scanned.
    fn plan(&self, filter: &Filter) -> Option<BTreeSet<ObjectId>> {
        filter
            .conditions()
            .iter()
            .filter_map(|cond| self.lookup(cond))
            .reduce(|a, b| a.intersection(&b).copied().collect())
    }

    fn lookup(&self, cond: &Condition) -> Option<BTreeSet<ObjectId>> {
        if cond.path.is_id() {
            let parse = |value: &Value| match value {
                Value::String(s) => s.parse::<ObjectId>().ok(),
                _ => None,
            };
            return match &cond.op {
                Op::Eq(value) => Some(parse(value).into_iter().collect()),
                Op::In(values) => Some(values.iter().filter_map(parse).collect()),
                _ => None,
            };
        }

        let index = self.indexes.get(cond.path.top_level()?)?;
        match &cond.op {
            Op::Eq(value) => index.get(value),
            Op::In(values) => values
                .iter()
                .map(|value| index.get(value))
                .fold_options(BTreeSet::new(), |mut all, ids| {
                    all.extend(ids);
                    all
                }),
            Op::Gt(value) => index.range(Bound::Excluded(IndexKey::new(value)?), Bound::Unbounded),
            Op::Gte(value) => index.range(Bound::Included(IndexKey::new(value)?), Bound::Unbounded),
            Op::Lt(value) => index.range(Bound::Unbounded, Bound::Excluded(IndexKey::new(value)?)),
            Op::Lte(value) => index.range(Bound::Unbounded, Bound::Included(IndexKey::new(value)?)),
            Op::Ne(_) | Op::Nin(_) => None,
        }
    }
}

/// An ordered index on one field.
///
/// Documents which do not have the field are not in the index.
#[derive(Debug, Default)]
struct Index {
    entries: BTreeMap<IndexKey, BTreeSet<ObjectId>>,
}

impl Index {
    fn insert(&mut self, key: IndexKey, id: ObjectId) {
        self.entries.entry(key).or_default().insert(id);
    }

    fn remove(&mut self, key: &IndexKey, id: ObjectId) {
        if let Some(ids) = self.entries.get_mut(key) {
            ids.remove(&id);
            if ids.is_empty() {
                self.entries.remove(key);
            }
        }
    }

    /// The documents whose field equals `value`.
    ///
    /// Returns [`None`] for `null`, which matches documents the index does not contain.
    fn get(&self, value: &Value) -> Option<BTreeSet<ObjectId>> {
        let key = IndexKey::new(value)?;
        Some(self.entries.get(&key).cloned().unwrap_or_default())
    }

    /// The documents whose field lies between `lower` and `upper`.
    ///
    /// One of the bounds must be unbounded.
    fn range(&self, lower: Bound<IndexKey>, upper: Bound<IndexKey>) -> Option<BTreeSet<ObjectId>> {
        Some(
            self.entries
                .range((lower, upper))
                .flat_map(|(_, ids)| ids.iter().copied())
                .collect(),
        )
    }
}

/// The ordered representation of an indexed value.
///
/// Keys of different kinds are ordered by kind, mirroring [`sort_order`](super::sort_order).
#[derive(Clone, Debug)]
enum IndexKey {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl IndexKey {
    fn new(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(Self::Boolean(*b)),
            // Fold -0.0 into 0.0, which it compares equal to.
            Value::Number(n) => n.as_f64().map(|x| Self::Number(x + 0.0)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Enum(name) => Some(Self::Text(name.to_string())),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Boolean(_) => 0,
            Self::Number(_) => 1,
            Self::Text(_) => 2,
        }
    }
}

impl Ord for IndexKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for IndexKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for IndexKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IndexKey {}

/// A handle to an in-memory document store.
#[derive(Clone, Debug)]
pub struct MemoryStore(Arc<RwLock<Db>>);

impl Default for MemoryStore {
    fn default() -> Self {
        Self::create()
    }
}

impl MemoryStore {
    /// Create a new, empty store.
    ///
    /// The store is not related to any other store. It can be [cloned](Clone) to get multiple
    /// handles to the same data.
    pub fn create() -> Self {
        Self(Arc::new(RwLock::new(Db {
            collections: HashMap::new(),
        })))
    }

    /// Create a new, empty store, ready to be handed to resolvers.
    pub fn shared() -> SharedStore {
        Arc::new(Self::create())
    }

    /// The names of the registered collections.
    pub async fn collections(&self) -> Vec<String> {
        self.0.read().await.collections.keys().cloned().sorted().collect()
    }
}

#[async_trait]
impl super::DocumentStore for MemoryStore {
    async fn register(&self, schema: &DocumentSchema) -> Result<(), Error> {
        let name = collection_name(schema.name());
        let mut db = self.0.write().await;
        match db.collections.entry(name.clone()) {
            Entry::Occupied(e) if e.get().schema == *schema => Ok(()),
            Entry::Occupied(_) => Err(Error::backend(format!(
                "collection {name} is already registered with a different schema"
            ))),
            Entry::Vacant(e) => {
                tracing::info!("CREATE COLLECTION {name}");
                e.insert(Collection::new(name, schema.clone()));
                Ok(())
            }
        }
    }

    async fn insert(&self, collection: &str, fields: Fields) -> Result<Record, Error> {
        let mut db = self.0.write().await;
        let coll = db.collection_mut(collection)?;

        let fields = validate(&coll.name, &coll.schema, fields, Defaults::Apply)?;
        let id = ObjectId::new();
        tracing::info!("INSERT INTO {collection} {id}");
        coll.insert(id, fields.clone());
        Ok(Record::new(id, fields))
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Record>, Error> {
        let db = self.0.read().await;
        tracing::info!("FIND {collection} {query}");
        Ok(db.collection(collection)?.select(query))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<usize, Error> {
        let db = self.0.read().await;
        tracing::info!("COUNT {collection} WHERE {filter}");
        Ok(db
            .collection(collection)?
            .select(&Query::new(filter.clone()))
            .len())
    }

    async fn update(
        &self,
        collection: &str,
        query: &Query,
        patch: &Fields,
    ) -> Result<Vec<Record>, Error> {
        let mut db = self.0.write().await;
        let coll = db.collection_mut(collection)?;
        let set = Value::Object(patch.clone());
        tracing::info!("UPDATE {collection} SET {set} {query}");

        // Validate every patched document before changing any of them.
        let updated = coll
            .select(query)
            .into_iter()
            .map(|record| {
                let id = record.id();
                let mut fields = record.into_fields();
                merge(&mut fields, patch);
                let fields = validate(&coll.name, &coll.schema, fields, Defaults::Skip)?;
                Ok::<_, Error>(Record::new(id, fields))
            })
            .collect::<Result<Vec<_>, _>>()?;
        for record in &updated {
            coll.replace(record.id(), record.fields().clone());
        }
        Ok(updated)
    }

    async fn remove(&self, collection: &str, query: &Query) -> Result<Vec<Record>, Error> {
        let mut db = self.0.write().await;
        let coll = db.collection_mut(collection)?;
        tracing::info!("REMOVE {collection} {query}");

        let removed = coll.select(query);
        for record in &removed {
            coll.delete(record.id());
        }
        Ok(removed)
    }
}
