//! Composition of GraphQL types and resolvers for a document.
//!
//! A [`TypeComposer`] reads a [`DocumentSchema`] and builds every GraphQL type a CRUD API for the
//! document needs. Types for embedded documents and enums are named by their path from the root
//! document, so a `User` with a list of embedded `languages`, each of which has an enum `skill`,
//! gets the types
//!
//! | Type                      | Kind         | Purpose                                          |
//! |---------------------------|--------------|--------------------------------------------------|
//! | `User`                    | object       | the document, with its `_id`                     |
//! | `UserLanguages`           | object       | an embedded language                             |
//! | `EnumUserLanguagesSkill`  | enum         | the values of `skill`                            |
//! | `CreateOneUserInput`      | input object | a new document; required fields are non-null     |
//! | `UpdateUserInput`         | input object | a partial update                                 |
//! | `UserLanguagesInput`      | input object | an embedded language, in create and update input |
//! | `FilterUserInput`         | input object | equality conditions, plus `_operators`           |
//! | `FilterUserOperatorsInput`| input object | comparison operators on `_id` and indexed fields |
//! | `SortUserEnum`            | enum         | sort keys: `_id` and indexed fields, both ways   |
//! | `UpdateManyUserPayload`   | object       | the result of `updateMany`                       |
//! | `RemoveManyUserPayload`   | object       | the result of `removeMany`                       |
//!
//! along with the [catalog](super::crud) of resolvers working with these types.

use super::{
    crud,
    resolver::{into_field_value, ResolverCatalog},
};
use crate::schema::{Document, DocumentSchema, EnumDecl, FieldType, ScalarType};
use crate::store::{collection_name, Direction, FieldPath, ID_FIELD};
use async_graphql::{
    dynamic::{
        Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Object, SchemaBuilder,
        TypeRef,
    },
    Value,
};
use convert_case::{Case, Casing};
use indexmap::IndexMap;
use std::collections::hash_map::{Entry, HashMap};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// The filter field holding comparison operators.
pub const OPERATORS_FIELD: &str = "_operators";

/// Operators taking a single operand.
pub const COMPARISON_OPERATORS: [&str; 5] = ["gt", "gte", "lt", "lte", "ne"];

/// Operators taking a list of operands.
pub const LIST_OPERATORS: [&str; 2] = ["in", "nin"];

/// Options controlling composition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeOptions {
    /// The name of the output type. Defaults to the name of the document.
    pub type_name: Option<String>,
    /// The number of documents list resolvers return when no `limit` is given.
    pub default_limit: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            type_name: None,
            default_limit: 100,
        }
    }
}

impl ComposeOptions {
    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.default_limit = limit;
        self
    }
}

/// The names of the top-level types composed for a document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeNames {
    pub output: String,
    pub create_input: String,
    pub update_input: String,
    pub filter_input: String,
    pub operators_input: String,
    pub sort_enum: String,
    pub update_many_payload: String,
    pub remove_many_payload: String,
}

impl TypeNames {
    fn new(type_name: &str) -> Self {
        Self {
            output: type_name.to_string(),
            create_input: format!("CreateOne{type_name}Input"),
            update_input: format!("Update{type_name}Input"),
            filter_input: format!("Filter{type_name}Input"),
            operators_input: format!("Filter{type_name}OperatorsInput"),
            sort_enum: format!("Sort{type_name}Enum"),
            update_many_payload: format!("UpdateMany{type_name}Payload"),
            remove_many_payload: format!("RemoveMany{type_name}Payload"),
        }
    }
}

/// What resolvers need to know about the document they serve.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentBinding {
    pub type_name: String,
    pub collection: String,
    pub default_limit: usize,
    /// The values of the sort enum and the sort keys they stand for.
    pub sort_keys: IndexMap<String, (FieldPath, Direction)>,
}

impl DocumentBinding {
    pub fn sort_key(&self, value: &str) -> Option<&(FieldPath, Direction)> {
        self.sort_keys.get(value)
    }
}

/// The GraphQL types and resolvers for one document.
pub struct TypeComposer {
    schema: DocumentSchema,
    names: TypeNames,
    binding: Arc<DocumentBinding>,
    types: Types,
    catalog: ResolverCatalog,
}

impl Debug for TypeComposer {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("TypeComposer")
            .field("names", &self.names)
            .field("binding", &self.binding)
            .field("types", &self.types.defined)
            .field("catalog", &self.catalog)
            .finish()
    }
}

impl TypeComposer {
    /// Compose types and resolvers for the document `T`.
    pub fn new<T: Document>(options: ComposeOptions) -> Self {
        Self::from_schema(T::schema(), options)
    }

    /// Compose types and resolvers for the document described by `schema`.
    pub fn from_schema(schema: DocumentSchema, options: ComposeOptions) -> Self {
        let type_name = options
            .type_name
            .unwrap_or_else(|| schema.name().to_string());
        let names = TypeNames::new(&type_name);
        tracing::debug!("composing types for {} as {type_name}", schema.name());

        let mut types = Types::default();
        types.output_object(&type_name, &schema, true);
        types.input_object(&names.create_input, &type_name, &schema, true);
        types.input_object(&names.update_input, &type_name, &schema, false);
        types.filter_input(&names.filter_input, &type_name, &schema);
        let sort_keys = types.sort_enum(&names.sort_enum, &schema);
        types.payload(&names.update_many_payload, "The number of updated documents.");
        types.payload(&names.remove_many_payload, "The number of removed documents.");

        let binding = Arc::new(DocumentBinding {
            type_name,
            collection: collection_name(schema.name()),
            default_limit: options.default_limit,
            sort_keys,
        });
        let catalog = crud::catalog(&names, &binding);

        Self {
            schema,
            names,
            binding,
            types,
            catalog,
        }
    }

    /// The schema of the composed document.
    pub fn document_schema(&self) -> &DocumentSchema {
        &self.schema
    }

    pub fn names(&self) -> &TypeNames {
        &self.names
    }

    pub fn binding(&self) -> &DocumentBinding {
        &self.binding
    }

    /// The names of all composed types, in the order they were composed.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.defined.iter().map(String::as_str)
    }

    /// The resolvers composed for the document.
    pub fn catalog(&self) -> &ResolverCatalog {
        &self.catalog
    }

    /// Type names which more than one composed type needed.
    ///
    /// Only the first type to claim such a name is composed, so a schema built from a composer
    /// with conflicts would silently use the wrong types. [Assembly](super::assembly) refuses it.
    pub fn conflicts(&self) -> &[String] {
        &self.types.conflicts
    }

    /// Mutable access to the catalog, to add or replace resolvers before assembly.
    pub fn catalog_mut(&mut self) -> &mut ResolverCatalog {
        &mut self.catalog
    }

    /// Register every composed type with `builder`.
    ///
    /// The types are moved into the builder, so this can only be done once.
    pub fn register_types(&mut self, mut builder: SchemaBuilder) -> SchemaBuilder {
        for object in self.types.objects.drain(..) {
            builder = builder.register(object);
        }
        for input in self.types.inputs.drain(..) {
            builder = builder.register(input);
        }
        for e in self.types.enums.drain(..) {
            builder = builder.register(e);
        }
        builder
    }
}

/// A list of non-null `ty`.
pub fn list_of(ty: TypeRef) -> TypeRef {
    TypeRef::List(Box::new(non_null(ty)))
}

pub fn non_null(ty: TypeRef) -> TypeRef {
    match ty {
        ty @ TypeRef::NonNull(_) => ty,
        ty => TypeRef::NonNull(Box::new(ty)),
    }
}

fn scalar_name(ty: ScalarType) -> &'static str {
    match ty {
        ScalarType::String => TypeRef::STRING,
        ScalarType::Int => TypeRef::INT,
        ScalarType::Float => TypeRef::FLOAT,
        ScalarType::Boolean => TypeRef::BOOLEAN,
    }
}

fn nested_name(parent: &str, field: &str) -> String {
    format!("{parent}{}", field.to_case(Case::Pascal))
}

/// An output field resolved by looking up `name` in the parent document.
fn value_field(name: &str, ty: TypeRef) -> Field {
    let key = name.to_string();
    Field::new(name, ty, move |ctx| {
        let key = key.clone();
        FieldFuture::new(async move {
            let value = match ctx.parent_value.as_value() {
                Some(Value::Object(fields)) => fields.get(key.as_str()).cloned(),
                _ => None,
            };
            Ok(value.map(into_field_value))
        })
    })
}

/// The types composed so far.
#[derive(Default)]
struct Types {
    objects: Vec<Object>,
    inputs: Vec<InputObject>,
    enums: Vec<Enum>,
    defined: Vec<String>,
    /// What each defined name stands for, so that two different types claiming the same name
    /// can be told apart from one type being reused.
    seen: HashMap<String, String>,
    /// Names claimed by more than one type.
    conflicts: Vec<String>,
}

impl Types {
    /// Claim the type name `name` for the type identified by `key`.
    ///
    /// Returns whether the type still needs to be built. Claiming a name again with the same key
    /// reuses the existing type. Claiming it with a different key records a conflict.
    fn define(&mut self, name: &str, key: impl Into<String>) -> bool {
        let key = key.into();
        match self.seen.entry(name.to_string()) {
            Entry::Vacant(e) => {
                e.insert(key);
                self.defined.push(name.to_string());
                true
            }
            Entry::Occupied(e) => {
                if *e.get() != key && !self.conflicts.iter().any(|c| c == name) {
                    tracing::warn!("type name {name} is claimed by both {} and {key}", e.get());
                    self.conflicts.push(name.to_string());
                }
                false
            }
        }
    }

    fn output_object(&mut self, name: &str, schema: &DocumentSchema, root: bool) {
        if !self.define(name, format!("object {name} {root}")) {
            return;
        }
        let mut object = Object::new(name);
        if let Some(description) = schema.description() {
            object = object.description(description);
        }
        if root {
            object = object.field(
                value_field(ID_FIELD, TypeRef::named_nn(TypeRef::ID))
                    .description("The unique id of the document."),
            );
        }
        for decl in schema.fields() {
            let mut ty = self.output_type(&nested_name(name, decl.name()), decl.ty());
            if decl.is_required() {
                ty = non_null(ty);
            }
            let mut field = value_field(decl.name(), ty);
            if let Some(description) = decl.description() {
                field = field.description(description);
            }
            object = object.field(field);
        }
        self.objects.push(object);
    }

    fn output_type(&mut self, path: &str, ty: &FieldType) -> TypeRef {
        match ty {
            FieldType::Scalar(scalar) => TypeRef::named(scalar_name(*scalar)),
            FieldType::Enum(decl) => TypeRef::named(self.enum_type(path, decl)),
            FieldType::Embedded(schema) => {
                self.output_object(path, schema, false);
                TypeRef::named(path)
            }
            FieldType::List(item) => list_of(self.output_type(path, item)),
        }
    }

    /// Compose the enum for the field at `path`, returning its name.
    fn enum_type(&mut self, path: &str, decl: &EnumDecl) -> String {
        let name = format!("Enum{path}");
        if self.define(&name, format!("enum {path}")) {
            let e = decl
                .values()
                .iter()
                .fold(Enum::new(&name), |e, value| e.item(EnumItem::new(value)));
            self.enums.push(e);
        }
        name
    }

    /// Compose an input object for a document at `path`.
    ///
    /// Only create input (`strict`) marks required fields as non-null. Everything else, including
    /// embedded documents in create input, is checked by the store when the document is written.
    fn input_object(&mut self, name: &str, path: &str, schema: &DocumentSchema, strict: bool) {
        if !self.define(name, format!("input {path} {strict}")) {
            return;
        }
        let mut input = InputObject::new(name);
        for decl in schema.fields() {
            let mut ty = self.input_type(&nested_name(path, decl.name()), decl.ty());
            if strict && decl.is_required() {
                ty = non_null(ty);
            }
            let mut field = InputValue::new(decl.name(), ty);
            if let Some(description) = decl.description() {
                field = field.description(description);
            }
            input = input.field(field);
        }
        self.inputs.push(input);
    }

    fn input_type(&mut self, path: &str, ty: &FieldType) -> TypeRef {
        match ty {
            FieldType::Scalar(scalar) => TypeRef::named(scalar_name(*scalar)),
            FieldType::Enum(decl) => TypeRef::named(self.enum_type(path, decl)),
            FieldType::Embedded(schema) => {
                let name = format!("{path}Input");
                self.input_object(&name, path, schema, false);
                TypeRef::named(name)
            }
            FieldType::List(item) => list_of(self.input_type(path, item)),
        }
    }

    /// Compose the filter input for the root document.
    fn filter_input(&mut self, name: &str, type_name: &str, schema: &DocumentSchema) {
        let mut fields = vec![InputValue::new(ID_FIELD, TypeRef::named(TypeRef::ID))];
        fields.extend(self.filter_fields(type_name, schema));
        let operators = self.operators_input(type_name, schema);
        fields.push(
            InputValue::new(OPERATORS_FIELD, TypeRef::named(operators))
                .description("Comparisons on the id and indexed fields."),
        );
        if self.define(name, format!("filter {type_name}")) {
            self.inputs
                .push(fields.into_iter().fold(InputObject::new(name), InputObject::field));
        }
    }

    /// Equality filters for the fields of a document at `path`.
    ///
    /// Scalars and enums are compared directly. A list of scalars or enums matches if any of its
    /// items is equal to the given value. Embedded documents which are not in lists are filtered
    /// field by field, with a nested filter input.
    fn filter_fields(&mut self, path: &str, schema: &DocumentSchema) -> Vec<InputValue> {
        let mut fields = vec![];
        for decl in schema.fields() {
            let field_path = nested_name(path, decl.name());
            let ty = match decl.ty() {
                FieldType::List(item) if item.is_indexable() => self.input_type(&field_path, item),
                ty @ (FieldType::Scalar(_) | FieldType::Enum(_)) => {
                    self.input_type(&field_path, ty)
                }
                FieldType::Embedded(schema) => {
                    let nested = self.filter_fields(&field_path, schema);
                    if nested.is_empty() {
                        continue;
                    }
                    let name = format!("Filter{field_path}Input");
                    if self.define(&name, format!("filter {field_path}")) {
                        let input = nested
                            .into_iter()
                            .fold(InputObject::new(&name), InputObject::field);
                        self.inputs.push(input);
                    }
                    TypeRef::named(name)
                }
                FieldType::List(_) => continue,
            };
            fields.push(InputValue::new(decl.name(), ty));
        }
        fields
    }

    fn operators_input(&mut self, type_name: &str, schema: &DocumentSchema) -> String {
        let name = format!("Filter{type_name}OperatorsInput");
        let mut input = InputObject::new(&name);

        let id = self.operator_input(&nested_name(type_name, "id"), TypeRef::ID);
        input = input.field(InputValue::new(ID_FIELD, TypeRef::named(id)));
        for decl in schema.indexed_fields() {
            let path = nested_name(type_name, decl.name());
            let item = match decl.ty() {
                FieldType::Scalar(scalar) => scalar_name(*scalar).to_string(),
                FieldType::Enum(e) => self.enum_type(&path, e),
                _ => continue,
            };
            let ops = self.operator_input(&path, &item);
            input = input.field(InputValue::new(decl.name(), TypeRef::named(ops)));
        }

        if self.define(&name, format!("operators {type_name}")) {
            self.inputs.push(input);
        }
        name
    }

    /// Compose the operators on a field at `path` holding values of type `item`.
    fn operator_input(&mut self, path: &str, item: &str) -> String {
        let name = format!("Filter{path}OperatorsInput");
        if self.define(&name, format!("operators {path} {item}")) {
            let input = COMPARISON_OPERATORS
                .into_iter()
                .map(|op| InputValue::new(op, TypeRef::named(item)))
                .chain(
                    LIST_OPERATORS
                        .into_iter()
                        .map(|op| InputValue::new(op, list_of(TypeRef::named(item)))),
                )
                .fold(InputObject::new(&name), InputObject::field);
            self.inputs.push(input);
        }
        name
    }

    /// Compose the sort enum, returning the sort key of each of its values.
    ///
    /// Documents can be sorted by id and by any indexed field, in either direction.
    fn sort_enum(
        &mut self,
        name: &str,
        schema: &DocumentSchema,
    ) -> IndexMap<String, (FieldPath, Direction)> {
        let mut keys = IndexMap::new();
        for (value, path) in [("_ID".to_string(), FieldPath::id())].into_iter().chain(
            schema
                .indexed_fields()
                .map(|decl| (decl.name().to_case(Case::UpperSnake), FieldPath::new([decl.name()]))),
        ) {
            keys.insert(format!("{value}_ASC"), (path.clone(), Direction::Asc));
            keys.insert(format!("{value}_DESC"), (path, Direction::Desc));
        }

        if self.define(name, "sort") {
            self.enums.push(
                keys.keys()
                    .fold(Enum::new(name), |e, value| e.item(EnumItem::new(value))),
            );
        }
        keys
    }

    fn payload(&mut self, name: &str, description: &str) {
        if !self.define(name, format!("payload {name}")) {
            return;
        }
        let count = value_field("count", TypeRef::named_nn(TypeRef::INT)).description(description);
        self.objects.push(Object::new(name).field(count));
    }
}
