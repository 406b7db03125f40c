use crate::node::PathSegment;

use super::{DataType, TypeKind};

impl DataType {
    /// The type found by stepping through `segment`, including `nothing` when
    /// the member might be absent.
    pub fn get_type_at_path_segment(&self, segment: &PathSegment) -> DataType {
        match (self.kind(), segment) {
            (TypeKind::Any, _) => DataType::any(),
            (TypeKind::Never, _) => DataType::never(),
            (TypeKind::Union(members), _) => DataType::union(
                members
                    .iter()
                    .map(|m| m.get_type_at_path_segment(segment)),
            ),
            (TypeKind::Object(object), PathSegment::Name(name)) => {
                let t = object.property(name).clone();
                if object.is_required(name) {
                    t
                } else {
                    DataType::union([t, DataType::nothing()])
                }
            }
            (TypeKind::Array(array), PathSegment::Index(index)) => {
                let t = array.element(*index).clone();
                if *index < array.required_count() {
                    t
                } else {
                    DataType::union([t, DataType::nothing()])
                }
            }
            _ => DataType::nothing(),
        }
    }

    pub fn get_type_at_path(&self, path: &[PathSegment]) -> DataType {
        path.iter().fold(self.clone(), |t, segment| {
            t.get_type_at_path_segment(segment)
        })
    }

    /// Rebuild the spine of `self` along `path`, replacing the type at the
    /// end of the path with `f` applied to it.
    ///
    /// Members of the spine that can't be stepped through by `path` are left
    /// untouched.
    pub fn change_type_at_path<F>(&self, path: &[PathSegment], f: &F) -> DataType
    where
        F: Fn(&DataType) -> DataType,
    {
        let Some((segment, rest)) = path.split_first() else {
            return f(self);
        };

        match (self.kind(), segment) {
            (TypeKind::Union(members), _) => {
                DataType::union(members.iter().map(|m| m.change_type_at_path(path, f)))
                    .with_merged_annotations(self)
            }
            (TypeKind::Object(object), PathSegment::Name(name)) => {
                let changed = object.property(name).change_type_at_path(rest, f);
                let mut properties = object.properties().clone();
                properties.insert(name.to_owned(), changed);
                DataType::object(
                    properties,
                    object.rest().clone(),
                    object.required().iter().cloned(),
                )
                .with_annotations(self.annotations().clone())
            }
            (TypeKind::Array(array), PathSegment::Index(index)) => {
                let changed = array.element(*index).change_type_at_path(rest, f);

                let Some(mut prefix) = expanded_prefix(array.prefix(), array.rest(), *index)
                else {
                    // Too far out to track on its own. Widen the rest instead.
                    let rest = DataType::union([array.rest().clone(), changed]);
                    return DataType::array(
                        array.prefix().to_vec(),
                        rest,
                        array.required_count(),
                    )
                    .with_annotations(self.annotations().clone());
                };

                prefix[*index] = changed;
                DataType::array(prefix, array.rest().clone(), array.required_count())
                    .with_annotations(self.annotations().clone())
            }
            _ => self.clone(),
        }
    }

    /// Narrow `self` to the values in which `path` leads to an existing value.
    pub fn set_path_existence(&self, path: &[PathSegment]) -> DataType {
        let Some((segment, rest)) = path.split_first() else {
            return self.clone();
        };

        match (self.kind(), segment) {
            (TypeKind::Any, _) => self.clone(),
            (TypeKind::Union(members), _) => {
                DataType::union(members.iter().map(|m| m.set_path_existence(path)))
                    .with_merged_annotations(self)
            }
            (TypeKind::Object(object), PathSegment::Name(name)) => {
                let present = object.property(name).set_path_existence(rest);
                let mut properties = object.properties().clone();
                properties.insert(name.to_owned(), present);
                let required = object
                    .required()
                    .iter()
                    .cloned()
                    .chain(std::iter::once(name.to_owned()));
                DataType::object(properties, object.rest().clone(), required)
                    .with_annotations(self.annotations().clone())
            }
            (TypeKind::Array(array), PathSegment::Index(index)) => {
                let Some(mut prefix) = expanded_prefix(array.prefix(), array.rest(), *index)
                else {
                    return if array.rest().set_path_existence(rest).is_never() {
                        DataType::never()
                    } else {
                        self.clone()
                    };
                };

                prefix[*index] = array.element(*index).set_path_existence(rest);
                DataType::array(
                    prefix,
                    array.rest().clone(),
                    array.required_count().max(index + 1),
                )
                .with_annotations(self.annotations().clone())
            }
            _ => DataType::never(),
        }
    }

    /// The union of the types of all array elements or object member values.
    pub fn children_type(&self) -> DataType {
        match self.kind() {
            TypeKind::Any => DataType::any(),
            TypeKind::Union(members) => DataType::union(members.iter().map(|m| m.children_type())),
            TypeKind::Object(object) => DataType::union(
                object
                    .properties()
                    .values()
                    .cloned()
                    .chain(std::iter::once(object.rest().clone())),
            ),
            TypeKind::Array(array) => DataType::union(
                array
                    .prefix()
                    .iter()
                    .cloned()
                    .chain(std::iter::once(array.rest().clone())),
            ),
            _ => DataType::never(),
        }
    }

    /// The union of the types of every value nested anywhere below `self`.
    pub fn descendant_type(&self) -> DataType {
        match self.kind() {
            TypeKind::Any => DataType::any(),
            TypeKind::Union(members) => {
                DataType::union(members.iter().map(|m| m.descendant_type()))
            }
            _ => {
                let children = self.children_type();
                if children.is_never() {
                    children
                } else {
                    let below = children.descendant_type();
                    DataType::union([children, below])
                }
            }
        }
    }
}

/// How far past the end of a tuple prefix an index may reach and still get
/// an element of its own.
const MAX_PREFIX_GROWTH: usize = 64;

/// A copy of `prefix` long enough to hold `index`, padded with `rest`, or
/// `None` when that would grow it by more than [`MAX_PREFIX_GROWTH`].
fn expanded_prefix(prefix: &[DataType], rest: &DataType, index: usize) -> Option<Vec<DataType>> {
    if index >= prefix.len() + MAX_PREFIX_GROWTH {
        return None;
    }

    let mut expanded = prefix.to_vec();
    expanded.resize(expanded.len().max(index + 1), rest.clone());
    Some(expanded)
}
