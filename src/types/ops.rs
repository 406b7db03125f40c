use indexmap::IndexMap;
use serde_json::Value;

use crate::filter::json_eq;

use super::{ArrayType, DataType, ObjectType, PrimitiveType, TypeKind};

pub(super) fn union(members: impl IntoIterator<Item = DataType>) -> DataType {
    let mut flat: Vec<DataType> = Vec::new();

    for member in members {
        match member.kind() {
            TypeKind::Union(inner) => flat.extend(inner.iter().cloned()),
            TypeKind::Never => (),
            _ => flat.push(member),
        }
    }

    if let Some(any) = flat.iter().find(|t| t.is_any()) {
        return any.clone();
    }

    let has_true = flat.iter().any(|t| is_bool_literal(t, true));
    let has_false = flat.iter().any(|t| is_bool_literal(t, false));

    if has_true && has_false {
        flat.retain(|t| !matches!(t.kind(), TypeKind::Literal(Value::Bool(_))));
        flat.push(DataType::boolean());
    }

    let mut rv: Vec<DataType> = Vec::with_capacity(flat.len());

    for member in flat {
        if let Some(existing) = rv.iter_mut().find(|t| member.is_subtype_of(t)) {
            if *existing == member {
                *existing = existing.with_merged_annotations(&member);
            }
            continue;
        }

        rv.retain(|t| !t.is_subtype_of(&member));
        rv.push(member);
    }

    match rv.len() {
        0 => DataType::never(),
        1 => rv.swap_remove(0),
        _ => DataType::new(TypeKind::Union(rv)),
    }
}

fn is_bool_literal(t: &DataType, b: bool) -> bool {
    matches!(t.kind(), TypeKind::Literal(Value::Bool(v)) if *v == b)
}

fn bool_literal(b: bool) -> DataType {
    DataType::literal(Value::Bool(b))
}

impl DataType {
    /// True when every value described by `self` is also described by `other`.
    pub fn is_subtype_of(&self, other: &DataType) -> bool {
        use TypeKind::*;

        match (self.kind(), other.kind()) {
            (_, Any) | (Never, _) => true,
            (Any, _) | (_, Never) => false,
            (Union(members), _) => members.iter().all(|m| m.is_subtype_of(other)),
            (Primitive(PrimitiveType::Boolean), Union(_)) => {
                bool_literal(true).is_subtype_of(other) && bool_literal(false).is_subtype_of(other)
            }
            (_, Union(members)) => members.iter().any(|m| self.is_subtype_of(m)),
            (Literal(a), Literal(b)) => json_eq(a, b),
            (Literal(v), Primitive(p)) => PrimitiveType::of(v) == Some(*p),
            (Primitive(a), Primitive(b)) => a == b,
            (Object(a), Object(b)) => object_subtype(a, b),
            (Array(a), Array(b)) => array_subtype(a, b),
            _ => false,
        }
    }

    pub fn equivalent(&self, other: &DataType) -> bool {
        self.is_subtype_of(other) && other.is_subtype_of(self)
    }

    /// The values described by both types.
    pub fn intersect(&self, other: &DataType) -> DataType {
        use TypeKind::*;

        if self.is_subtype_of(other) {
            return self.with_merged_annotations(other);
        }

        if other.is_subtype_of(self) {
            return other.with_merged_annotations(self);
        }

        match (self.kind(), other.kind()) {
            (Union(members), _) => union(members.iter().map(|m| m.intersect(other))),
            (_, Union(members)) => union(members.iter().map(|m| self.intersect(m))),
            (Object(a), Object(b)) => {
                let mut properties: IndexMap<String, DataType> = IndexMap::new();

                for name in a.properties.keys().chain(b.properties.keys()) {
                    if !properties.contains_key(name) {
                        properties.insert(
                            name.to_owned(),
                            a.property(name).intersect(b.property(name)),
                        );
                    }
                }

                let required = a.required.union(&b.required).cloned().collect::<Vec<_>>();

                DataType::object(properties, a.rest.intersect(&b.rest), required)
                    .with_merged_annotations(self)
                    .with_merged_annotations(other)
            }
            (Array(a), Array(b)) => {
                let len = a.prefix.len().max(b.prefix.len());
                let prefix = (0..len)
                    .map(|i| a.element(i).intersect(b.element(i)))
                    .collect();

                DataType::array(
                    prefix,
                    a.rest.intersect(&b.rest),
                    a.required_count.max(b.required_count),
                )
                .with_merged_annotations(self)
                .with_merged_annotations(other)
            }
            _ => DataType::never(),
        }
    }

    /// An over-approximation of the values in `self` that are not in `other`.
    ///
    /// The result is `never` only when `self` is a subtype of `other`. Apart
    /// from distributing over the members of a union on the left (`boolean`
    /// counting as `true | false`), anything else comes back unchanged.
    pub fn subtract(&self, other: &DataType) -> DataType {
        if self.is_subtype_of(other) {
            return DataType::never();
        }

        match self.kind() {
            TypeKind::Union(members) => {
                let rv = union(members.iter().map(|m| m.subtract(other)));
                if rv.is_never() {
                    rv
                } else {
                    rv.with_merged_annotations(self)
                }
            }
            TypeKind::Primitive(PrimitiveType::Boolean) => {
                let t = bool_literal(true).subtract(other);
                let f = bool_literal(false).subtract(other);
                if t.is_never() || f.is_never() {
                    union([t, f]).with_merged_annotations(self)
                } else {
                    self.clone()
                }
            }
            _ => self.clone(),
        }
    }
}

fn object_subtype(a: &ObjectType, b: &ObjectType) -> bool {
    b.required.is_subset(&a.required)
        && a.rest.is_subtype_of(&b.rest)
        && a
            .properties
            .keys()
            .chain(b.properties.keys())
            .all(|name| a.property(name).is_subtype_of(b.property(name)))
}

fn array_subtype(a: &ArrayType, b: &ArrayType) -> bool {
    let len = a.prefix.len().max(b.prefix.len());
    a.required_count >= b.required_count
        && a.rest.is_subtype_of(&b.rest)
        && (0..len).all(|i| a.element(i).is_subtype_of(b.element(i)))
}
