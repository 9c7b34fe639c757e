//! Declarations of document shapes.
//!
//! A document is a record stored as a unit: a set of named fields, some of which may themselves be
//! documents embedded in their parent. This module describes the shape of a document as plain
//! metadata, a [`DocumentSchema`], which the rest of the crate consumes:
//! * the [GraphQL layer](crate::graphql) composes object types, input types and CRUD resolvers for
//!   the document from its schema;
//! * a [store](crate::store) validates documents against the schema when they are written and
//!   maintains indexes for the fields the schema marks as indexed.
//!
//! Schemas are rarely written by hand. Instead, a Rust struct declares the shape of a document and
//! derives the schema with [`macro@Document`]:
//!
//! ```
//! # mod example {
//! use document_graphql::prelude::*;
//!
//! #[derive(Clone, Debug, Document)]
//! struct Pet {
//!     name: Option<String>,
//!     #[document(index)]
//!     age: Option<i32>,
//!     species: Option<Species>,
//! }
//!
//! #[derive(Clone, Copy, Debug, DocumentEnum)]
//! enum Species {
//!     Cat,
//!     Dog,
//! }
//! # pub fn example() {
//! let schema = Pet::schema();
//! assert_eq!(schema.fields().len(), 3);
//! assert_eq!(
//!     schema.field("species").unwrap().ty(),
//!     &FieldType::Enum(EnumDecl::new(["cat", "dog"])),
//! );
//! # }
//! # }
//! # example::example();
//! ```

use async_graphql::{Name, Value};
use indexmap::IndexMap;
use serde::{de::DeserializeOwned, Serialize};
use snafu::Snafu;

pub use document_graphql_derive::{Document, DocumentEnum};

/// The fields of a document, in order, by name.
pub type Fields = IndexMap<Name, Value>;

/// Errors converting between typed documents and [`Fields`].
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("error converting {document} to fields: {message}"))]
    Serialize {
        document: &'static str,
        message: String,
    },

    #[snafu(display("error converting fields to {document}: {message}"))]
    Deserialize {
        document: &'static str,
        message: String,
    },
}

/// A type whose values are stored as documents.
///
/// Usually derived with [`macro@Document`].
pub trait Document {
    /// The name of the document type.
    const NAME: &'static str;

    /// Describe the fields of this document.
    fn schema() -> DocumentSchema;

    /// Convert a typed document into the [`Fields`] a store works with.
    fn to_fields(&self) -> Result<Fields, Error>
    where
        Self: Serialize,
    {
        match async_graphql::to_value(self) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(value) => Err(Error::Serialize {
                document: Self::NAME,
                message: format!("expected an object, got {value}"),
            }),
            Err(err) => Err(Error::Serialize {
                document: Self::NAME,
                message: err.to_string(),
            }),
        }
    }

    /// Recover a typed document from [`Fields`] loaded from a store.
    fn from_fields(fields: Fields) -> Result<Self, Error>
    where
        Self: DeserializeOwned + Sized,
    {
        async_graphql::from_value(Value::Object(fields)).map_err(|err| Error::Deserialize {
            document: Self::NAME,
            message: err.to_string(),
        })
    }
}

/// A fieldless enum whose variants form the closed set of values a field may take.
///
/// Usually derived with [`macro@DocumentEnum`].
pub trait DocumentEnum: Sized {
    /// Every value of the enum, in declaration order.
    const VALUES: &'static [&'static str];

    /// The value representing this variant.
    fn as_str(&self) -> &'static str;

    /// The variant represented by `value`, if there is one.
    fn from_value(value: &str) -> Option<Self>;
}

/// A Rust type which can be the type of a document field.
pub trait Shape {
    /// The shape of fields of this type.
    fn shape() -> FieldType;
}

impl Shape for String {
    fn shape() -> FieldType {
        FieldType::Scalar(ScalarType::String)
    }
}

impl Shape for i32 {
    fn shape() -> FieldType {
        FieldType::Scalar(ScalarType::Int)
    }
}

impl Shape for f64 {
    fn shape() -> FieldType {
        FieldType::Scalar(ScalarType::Float)
    }
}

impl Shape for bool {
    fn shape() -> FieldType {
        FieldType::Scalar(ScalarType::Boolean)
    }
}

/// An optional field has the same shape as the value it holds. Whether the field may be absent
/// is declared separately, with [`FieldDecl::required`].
impl<T: Shape> Shape for Option<T> {
    fn shape() -> FieldType {
        T::shape()
    }
}

impl<T: Shape> Shape for Vec<T> {
    fn shape() -> FieldType {
        FieldType::List(Box::new(T::shape()))
    }
}

/// The declared shape of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentSchema {
    name: String,
    description: Option<String>,
    fields: Vec<FieldDecl>,
}

impl DocumentSchema {
    /// An empty schema for the document type `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: vec![],
        }
    }

    /// Attach a description. An empty description is ignored.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_empty(description.into());
        self
    }

    /// Add a field.
    ///
    /// # Panics
    ///
    /// Panics if the schema already has a field with the same name.
    pub fn with_field(mut self, field: FieldDecl) -> Self {
        assert!(
            self.field(field.name()).is_none(),
            "duplicate field {} in document {}",
            field.name(),
            self.name
        );
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// All fields, in declaration order.
    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// The fields the store is asked to index.
    pub fn indexed_fields(&self) -> impl Iterator<Item = &FieldDecl> {
        self.fields.iter().filter(|f| f.is_indexed())
    }
}

/// The declaration of a single field of a document.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDecl {
    name: String,
    ty: FieldType,
    indexed: bool,
    required: bool,
    default: bool,
    description: Option<String>,
}

impl FieldDecl {
    /// An optional, unindexed field.
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Self {
            name: name.into(),
            ty,
            indexed: false,
            required: false,
            default: false,
            description: None,
        }
    }

    /// Attach a description. An empty description is ignored.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = non_empty(description.into());
        self
    }

    /// Ask the store to index this field.
    ///
    /// # Panics
    ///
    /// Panics if the field is not a scalar or an enum. Only those have an order to index by.
    pub fn indexed(mut self) -> Self {
        assert!(
            self.ty.is_indexable(),
            "field {} cannot be indexed: only scalar and enum fields have an index order",
            self.name
        );
        self.indexed = true;
        self
    }

    /// Reject documents which lack this field.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Fill in [`FieldType::default_value`] when a document is created without this field.
    pub fn with_default(mut self) -> Self {
        self.default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The value a new document gets for this field if it doesn't specify one.
    pub fn default_value(&self) -> Option<Value> {
        self.default.then(|| self.ty.default_value())
    }
}

/// The shape of the values a field holds.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    Scalar(ScalarType),
    Enum(EnumDecl),
    /// A document owned by its parent, with no identity of its own.
    Embedded(DocumentSchema),
    /// An ordered list. Order is preserved but carries no meaning.
    List(Box<FieldType>),
}

impl FieldType {
    /// Can a field of this type be indexed?
    pub fn is_indexable(&self) -> bool {
        matches!(self, Self::Scalar(_) | Self::Enum(_))
    }

    /// The zero value of this type.
    ///
    /// Lists default to empty and embedded documents to a document with only their own defaulted
    /// fields. Enums default to their first value.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Scalar(ScalarType::String) => Value::String(String::new()),
            Self::Scalar(ScalarType::Int) => Value::from(0),
            Self::Scalar(ScalarType::Float) => Value::from(0.0),
            Self::Scalar(ScalarType::Boolean) => Value::Boolean(false),
            Self::Enum(decl) => Value::Enum(Name::new(&decl.values()[0])),
            Self::Embedded(schema) => Value::Object(
                schema
                    .fields()
                    .iter()
                    .filter_map(|f| Some((Name::new(f.name()), f.default_value()?)))
                    .collect(),
            ),
            Self::List(_) => Value::List(vec![]),
        }
    }
}

/// Primitive field types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
}

/// A closed set of text values.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EnumDecl {
    values: Vec<String>,
}

impl EnumDecl {
    /// # Panics
    ///
    /// Panics if `values` is empty.
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        assert!(!values.is_empty(), "an enum needs at least one value");
        Self { values }
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Is `value` one of the values of this enum?
    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::init_logging;
    use serde::Deserialize;

    /// A thing with a shape.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Document)]
    #[document(rename(Widget))]
    #[serde(rename_all = "camelCase")]
    struct TestWidget {
        /// The label printed on the widget.
        #[document(required)]
        label: String,
        #[document(index)]
        size_mm: Option<i32>,
        #[document(default)]
        #[serde(default)]
        parts: Vec<TestPart>,
        #[document(skip)]
        #[serde(skip)]
        scratch: Option<String>,
    }

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Document)]
    struct TestPart {
        finish: Option<TestFinish>,
        weight: Option<f64>,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, DocumentEnum)]
    #[serde(rename_all = "snake_case")]
    enum TestFinish {
        Matte,
        HighGloss,
        #[document(rename(raw))]
        #[serde(rename = "raw")]
        Unfinished,
    }

    #[test]
    fn test_derived_schema() {
        init_logging();

        let schema = TestWidget::schema();
        assert_eq!(TestWidget::NAME, "Widget");
        assert_eq!(schema.name(), "Widget");
        assert_eq!(
            schema.fields().iter().map(|f| f.name()).collect::<Vec<_>>(),
            ["label", "sizeMm", "parts"]
        );

        let label = schema.field("label").unwrap();
        assert!(label.is_required());
        assert!(!label.is_indexed());
        assert_eq!(label.description(), Some("The label printed on the widget."));
        assert_eq!(label.ty(), &FieldType::Scalar(ScalarType::String));

        let size = schema.field("sizeMm").unwrap();
        assert!(size.is_indexed());
        assert!(!size.is_required());
        assert_eq!(size.default_value(), None);

        let parts = schema.field("parts").unwrap();
        assert_eq!(parts.default_value(), Some(Value::List(vec![])));
        let FieldType::List(part) = parts.ty() else {
            panic!("expected a list, got {:?}", parts.ty());
        };
        assert_eq!(**part, FieldType::Embedded(TestPart::schema()));
        assert_eq!(
            TestPart::schema().field("finish").unwrap().ty(),
            &FieldType::Enum(EnumDecl::new(["matte", "high_gloss", "raw"]))
        );
        assert_eq!(
            TestPart::schema().field("weight").unwrap().ty(),
            &FieldType::Scalar(ScalarType::Float)
        );
    }

    #[test]
    fn test_derived_enum() {
        assert_eq!(TestFinish::VALUES, &["matte", "high_gloss", "raw"]);
        assert_eq!(TestFinish::HighGloss.as_str(), "high_gloss");
        assert_eq!(TestFinish::from_value("raw"), Some(TestFinish::Unfinished));
        assert_eq!(TestFinish::from_value("Matte"), None);
    }

    #[test]
    fn test_typed_fields() {
        let widget = TestWidget {
            label: "sprocket".into(),
            size_mm: Some(12),
            parts: vec![TestPart {
                finish: Some(TestFinish::HighGloss),
                weight: None,
            }],
            scratch: Some("not stored".into()),
        };
        let fields = widget.to_fields().unwrap();
        assert_eq!(fields["label"], Value::from("sprocket"));
        assert_eq!(fields["sizeMm"], Value::from(12));
        assert!(!fields.contains_key("scratch"));

        let back = TestWidget::from_fields(fields).unwrap();
        assert_eq!(
            back,
            TestWidget {
                scratch: None,
                ..widget
            }
        );
    }

    #[test]
    fn test_default_values() {
        assert_eq!(
            FieldType::Enum(EnumDecl::new(["a", "b"])).default_value(),
            Value::Enum(Name::new("a"))
        );
        assert_eq!(
            FieldType::Embedded(TestWidget::schema()).default_value(),
            async_graphql::value!({ "parts": [] })
        );
    }

    #[test]
    #[should_panic(expected = "cannot be indexed")]
    fn test_index_list_field() {
        FieldDecl::new("tags", Vec::<String>::shape()).indexed();
    }
}
