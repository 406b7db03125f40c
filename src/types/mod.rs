//! A structural type algebra over JSON values.
//!
//! A [`DataType`] describes a set of JSON values (plus the distinguished
//! _nothing_ result of a query that selects no node). Types are immutable and
//! always built through the factory functions on [`DataType`], which keep them
//! in normal form:
//!
//! - unions are flat, never contain `never`, and never contain a member that
//!   is a subtype of another member;
//! - an object or array that requires a member of type `never` is itself
//!   `never`;
//! - `true | false` is `boolean`, and the `null` literal is the `null`
//!   primitive.
//!
//! Subtyping, intersection and subtraction are deliberately approximate. They
//! are sound in the direction static analysis needs: a subtype check that
//! answers `true` is always right, and `subtract` never removes values that
//! might still be there.
use std::{collections::BTreeSet, fmt, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;

use crate::filter::json_eq;

mod display;
mod ops;
mod path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveType {
    Number,
    String,
    Boolean,
    Null,
    /// The absence of a value, as produced by a query that selects no node.
    Nothing,
}

impl PrimitiveType {
    pub fn of(value: &Value) -> Option<PrimitiveType> {
        match value {
            Value::Null => Some(PrimitiveType::Null),
            Value::Bool(_) => Some(PrimitiveType::Boolean),
            Value::Number(_) => Some(PrimitiveType::Number),
            Value::String(_) => Some(PrimitiveType::String),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

/// Documentation carried along with a type. Annotations never affect
/// subtyping or equality.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub default: Option<Value>,
    pub examples: Vec<Value>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self == &Annotations::default()
    }

    /// Fields from `self` win; missing ones are taken from `other`.
    pub fn merge(&self, other: &Annotations) -> Annotations {
        let mut examples = self.examples.clone();
        for example in &other.examples {
            if !examples.iter().any(|e| json_eq(e, example)) {
                examples.push(example.clone());
            }
        }

        Annotations {
            title: self.title.clone().or_else(|| other.title.clone()),
            description: self
                .description
                .clone()
                .or_else(|| other.description.clone()),
            deprecated: self.deprecated || other.deprecated,
            read_only: self.read_only || other.read_only,
            write_only: self.write_only || other.write_only,
            default: self.default.clone().or_else(|| other.default.clone()),
            examples,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    properties: IndexMap<String, DataType>,
    rest: DataType,
    required: BTreeSet<String>,
}

impl ObjectType {
    pub fn properties(&self) -> &IndexMap<String, DataType> {
        &self.properties
    }

    /// The type of every member not named in `properties`.
    pub fn rest(&self) -> &DataType {
        &self.rest
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    /// The type of the member `name` when it is present.
    pub fn property(&self, name: &str) -> &DataType {
        self.properties.get(name).unwrap_or(&self.rest)
    }
}

#[derive(Debug, Clone)]
pub struct ArrayType {
    prefix: Vec<DataType>,
    rest: DataType,
    required_count: usize,
}

impl ArrayType {
    pub fn prefix(&self) -> &[DataType] {
        &self.prefix
    }

    /// The type of every element after the prefix.
    pub fn rest(&self) -> &DataType {
        &self.rest
    }

    /// The minimum length of the array.
    pub fn required_count(&self) -> usize {
        self.required_count
    }

    /// The type of the element at `index` when it is present.
    pub fn element(&self, index: usize) -> &DataType {
        self.prefix.get(index).unwrap_or(&self.rest)
    }
}

#[derive(Debug, Clone)]
pub enum TypeKind {
    Any,
    Never,
    Literal(Value),
    Primitive(PrimitiveType),
    Object(ObjectType),
    Array(ArrayType),
    Union(Vec<DataType>),
}

#[derive(Debug)]
struct TypeData {
    kind: TypeKind,
    annotations: Annotations,
}

/// An immutable, structurally compared type. Cloning is cheap.
#[derive(Clone)]
pub struct DataType(Arc<TypeData>);

impl DataType {
    fn new(kind: TypeKind) -> Self {
        DataType(Arc::new(TypeData {
            kind,
            annotations: Annotations::default(),
        }))
    }

    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    pub fn annotations(&self) -> &Annotations {
        &self.0.annotations
    }

    pub fn with_annotations(&self, annotations: Annotations) -> DataType {
        DataType(Arc::new(TypeData {
            kind: self.0.kind.clone(),
            annotations,
        }))
    }

    pub(crate) fn with_merged_annotations(&self, other: &DataType) -> DataType {
        if other.annotations().is_empty() {
            self.clone()
        } else {
            self.with_annotations(self.annotations().merge(other.annotations()))
        }
    }

    pub fn any() -> DataType {
        DataType::new(TypeKind::Any)
    }

    pub fn never() -> DataType {
        DataType::new(TypeKind::Never)
    }

    pub fn primitive(primitive: PrimitiveType) -> DataType {
        DataType::new(TypeKind::Primitive(primitive))
    }

    pub fn number() -> DataType {
        DataType::primitive(PrimitiveType::Number)
    }

    pub fn string() -> DataType {
        DataType::primitive(PrimitiveType::String)
    }

    pub fn boolean() -> DataType {
        DataType::primitive(PrimitiveType::Boolean)
    }

    pub fn null() -> DataType {
        DataType::primitive(PrimitiveType::Null)
    }

    pub fn nothing() -> DataType {
        DataType::primitive(PrimitiveType::Nothing)
    }

    /// The type containing exactly `value`.
    pub fn literal(value: Value) -> DataType {
        match value {
            Value::Null => DataType::null(),
            Value::Array(_) | Value::Object(_) => DataType::from_value(&value),
            scalar => DataType::new(TypeKind::Literal(scalar)),
        }
    }

    /// The most precise type of a JSON value: literals all the way down.
    pub fn from_value(value: &Value) -> DataType {
        match value {
            Value::Array(items) => DataType::array(
                items.iter().map(DataType::from_value).collect(),
                DataType::never(),
                items.len(),
            ),
            Value::Object(map) => DataType::object(
                map.iter()
                    .map(|(k, v)| (k.to_owned(), DataType::from_value(v)))
                    .collect(),
                DataType::never(),
                map.keys().cloned(),
            ),
            scalar => DataType::literal(scalar.clone()),
        }
    }

    pub fn object(
        properties: IndexMap<String, DataType>,
        rest: DataType,
        required: impl IntoIterator<Item = String>,
    ) -> DataType {
        let required: BTreeSet<String> = required.into_iter().collect();

        let unsatisfiable = required
            .iter()
            .any(|name| properties.get(name).unwrap_or(&rest).is_never());

        if unsatisfiable {
            return DataType::never();
        }

        DataType::new(TypeKind::Object(ObjectType {
            properties,
            rest,
            required,
        }))
    }

    pub fn array(mut prefix: Vec<DataType>, mut rest: DataType, required_count: usize) -> DataType {
        if (0..required_count).any(|i| prefix.get(i).unwrap_or(&rest).is_never()) {
            return DataType::never();
        }

        // An optional element that can't exist ends the array.
        if let Some(i) = prefix.iter().position(|t| t.is_never()) {
            prefix.truncate(i);
            rest = DataType::never();
        }

        DataType::new(TypeKind::Array(ArrayType {
            prefix,
            rest,
            required_count,
        }))
    }

    /// An array of any length whose elements are all `element`.
    pub fn array_of(element: DataType) -> DataType {
        DataType::array(Vec::new(), element, 0)
    }

    /// An object with any members whose values are all `value`.
    pub fn record_of(value: DataType) -> DataType {
        DataType::object(IndexMap::new(), value, Vec::new())
    }

    pub fn union(members: impl IntoIterator<Item = DataType>) -> DataType {
        ops::union(members)
    }

    pub fn is_any(&self) -> bool {
        matches!(self.kind(), TypeKind::Any)
    }

    pub fn is_never(&self) -> bool {
        matches!(self.kind(), TypeKind::Never)
    }

    pub fn is_primitive(&self, primitive: PrimitiveType) -> bool {
        matches!(self.kind(), TypeKind::Primitive(p) if *p == primitive)
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self.kind() {
            TypeKind::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayType> {
        match self.kind() {
            TypeKind::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self.kind() {
            TypeKind::Literal(value) => Some(value),
            _ => None,
        }
    }

    /// Union members, or the type itself when it is not a union.
    pub fn members(&self) -> Vec<DataType> {
        match self.kind() {
            TypeKind::Union(members) => members.clone(),
            TypeKind::Never => Vec::new(),
            _ => vec![self.clone()],
        }
    }

    /// True for a type with exactly one possible value.
    pub fn is_singleton(&self) -> bool {
        matches!(
            self.kind(),
            TypeKind::Literal(_)
                | TypeKind::Primitive(PrimitiveType::Null)
                | TypeKind::Primitive(PrimitiveType::Nothing)
        )
    }

    /// True when the type might describe the absence of a value.
    pub fn may_be_nothing(&self) -> bool {
        DataType::nothing().is_subtype_of(self)
    }
}

impl PartialEq for DataType {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }

        match (self.kind(), other.kind()) {
            (TypeKind::Any, TypeKind::Any) | (TypeKind::Never, TypeKind::Never) => true,
            (TypeKind::Literal(a), TypeKind::Literal(b)) => json_eq(a, b),
            (TypeKind::Primitive(a), TypeKind::Primitive(b)) => a == b,
            (TypeKind::Object(a), TypeKind::Object(b)) => {
                a.properties.len() == b.properties.len()
                    && a.rest == b.rest
                    && a.required == b.required
                    && a
                        .properties
                        .iter()
                        .all(|(k, t)| b.properties.get(k).is_some_and(|u| t == u))
            }
            (TypeKind::Array(a), TypeKind::Array(b)) => {
                a.required_count == b.required_count && a.rest == b.rest && a.prefix == b.prefix
            }
            (TypeKind::Union(a), TypeKind::Union(b)) => {
                a.len() == b.len() && a.iter().all(|t| b.contains(t))
            }
            _ => false,
        }
    }
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataType({})", self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_literal_is_the_null_primitive() {
        assert_eq!(DataType::literal(Value::Null), DataType::null());
    }

    #[test]
    fn numbers_compare_by_value() {
        assert_eq!(DataType::literal(json!(1)), DataType::literal(json!(1.0)));
    }

    #[test]
    fn object_requiring_never_collapses() {
        let mut properties = IndexMap::new();
        properties.insert(String::from("a"), DataType::never());
        let t = DataType::object(properties, DataType::any(), vec![String::from("a")]);
        assert!(t.is_never());
    }

    #[test]
    fn object_requiring_undeclared_member_of_closed_object_collapses() {
        let t = DataType::object(IndexMap::new(), DataType::never(), vec![String::from("a")]);
        assert!(t.is_never());
    }

    #[test]
    fn optional_never_property_is_kept() {
        let mut properties = IndexMap::new();
        properties.insert(String::from("a"), DataType::never());
        let t = DataType::object(properties, DataType::any(), Vec::new());
        assert!(t.as_object().is_some());
    }

    #[test]
    fn array_requiring_never_collapses() {
        let t = DataType::array(vec![DataType::number(), DataType::never()], DataType::any(), 2);
        assert!(t.is_never());
        let t = DataType::array(Vec::new(), DataType::never(), 1);
        assert!(t.is_never());
    }

    #[test]
    fn optional_never_element_ends_array() {
        let t = DataType::array(
            vec![DataType::number(), DataType::never(), DataType::string()],
            DataType::any(),
            1,
        );
        let array = t.as_array().unwrap();
        assert_eq!(array.prefix().len(), 1);
        assert!(array.rest().is_never());
    }

    #[test]
    fn from_value_is_exact() {
        let t = DataType::from_value(&json!({"a": [1, "x"], "b": null}));
        assert_eq!(t.to_string(), r#"{a: [1, "x"], b: null}"#);
    }

    #[test]
    fn annotations_do_not_affect_equality() {
        let described = DataType::string().with_annotations(Annotations {
            description: Some(String::from("a name")),
            ..Annotations::default()
        });
        assert_eq!(described, DataType::string());
    }
}
