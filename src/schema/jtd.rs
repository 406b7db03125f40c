//! JSON Type Definition (RFC 8927) to [`DataType`].
use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::{annotate, annotations_of, ConvertedType, Entry, Memo};
use crate::types::{DataType, TypeKind};

const KEYWORDS: &[&str] = &[
    "metadata",
    "nullable",
    "definitions",
    "type",
    "enum",
    "elements",
    "properties",
    "optionalProperties",
    "additionalProperties",
    "values",
    "discriminator",
    "mapping",
    "ref",
];

pub fn from_jtd(schema: &Value) -> ConvertedType {
    JtdConverter::new(schema).convert()
}

pub struct JtdConverter<'s> {
    root: &'s Value,
    memo: Memo,
}

impl<'s> JtdConverter<'s> {
    pub fn new(root: &'s Value) -> Self {
        JtdConverter {
            root,
            memo: Memo::default(),
        }
    }

    pub fn convert(&mut self) -> ConvertedType {
        self.convert_node(self.root)
    }

    pub fn convert_node(&mut self, schema: &'s Value) -> ConvertedType {
        match self.memo.enter(schema) {
            Entry::Done(done) => done,
            Entry::Enter => {
                let t = self.convert_schema(schema);
                self.memo.leave(schema, t)
            }
        }
    }

    fn sub(&mut self, schema: &'s Value) -> DataType {
        self.convert_node(schema).data_type
    }

    fn convert_schema(&mut self, schema: &'s Value) -> DataType {
        let Value::Object(map) = schema else {
            log::debug!("not a type definition: {}", schema);
            self.memo.mark_inexact();
            return DataType::any();
        };

        for keyword in map.keys() {
            if !KEYWORDS.contains(&keyword.as_str()) {
                log::debug!("unknown JTD keyword {:?}, result is approximate", keyword);
                self.memo.mark_inexact();
            }
        }

        let t = self.convert_form(map);

        let t = if map.get("nullable").and_then(Value::as_bool).unwrap_or(false) {
            DataType::union([t, DataType::null()])
        } else {
            t
        };

        match map.get("metadata").and_then(Value::as_object) {
            Some(metadata) => annotate(t, annotations_of(metadata)),
            None => t,
        }
    }

    fn convert_form(&mut self, map: &'s Map<String, Value>) -> DataType {
        if let Some(name) = map.get("ref").and_then(Value::as_str) {
            return match self.definition(name) {
                Some(target) => self.sub(target),
                None => {
                    log::debug!("undefined JTD ref {:?}", name);
                    self.memo.mark_inexact();
                    DataType::any()
                }
            };
        }

        if let Some(name) = map.get("type").and_then(Value::as_str) {
            return self.primitive(name);
        }

        if let Some(values) = map.get("enum").and_then(Value::as_array) {
            return DataType::union(
                values
                    .iter()
                    .filter(|v| v.is_string())
                    .map(|v| DataType::literal(v.clone())),
            );
        }

        if let Some(elements) = map.get("elements") {
            return DataType::array_of(self.sub(elements));
        }

        if map.contains_key("properties") || map.contains_key("optionalProperties") {
            return self.properties_form(map);
        }

        if let Some(values) = map.get("values") {
            return DataType::record_of(self.sub(values));
        }

        if let Some(tag) = map.get("discriminator").and_then(Value::as_str) {
            let mapping = map.get("mapping").and_then(Value::as_object);
            let mut variants = Vec::new();

            for (key, variant) in mapping.into_iter().flatten() {
                if !is_mapping_variant(variant) {
                    log::debug!("JTD mapping {:?} is not a non-nullable properties form", key);
                    self.memo.mark_inexact();
                }

                let t = self.sub(variant);
                variants.push(with_tag(t, tag, key));
            }

            return DataType::union(variants);
        }

        DataType::any()
    }

    fn primitive(&mut self, name: &str) -> DataType {
        match name {
            "boolean" => DataType::boolean(),
            "string" | "timestamp" => DataType::string(),
            "float32" | "float64" => DataType::number(),
            "int8" | "uint8" | "int16" | "uint16" | "int32" | "uint32" => {
                // Integer ranges aren't modelled.
                self.memo.mark_inexact();
                DataType::number()
            }
            _ => {
                log::debug!("unknown JTD type {:?}", name);
                self.memo.mark_inexact();
                DataType::any()
            }
        }
    }

    fn properties_form(&mut self, map: &'s Map<String, Value>) -> DataType {
        let mut properties = IndexMap::new();
        let mut required = Vec::new();

        if let Some(props) = map.get("properties").and_then(Value::as_object) {
            for (name, s) in props {
                let t = self.sub(s);
                properties.insert(name.to_owned(), t);
                required.push(name.to_owned());
            }
        }

        if let Some(props) = map.get("optionalProperties").and_then(Value::as_object) {
            for (name, s) in props {
                let t = self.sub(s);
                properties.insert(name.to_owned(), t);
            }
        }

        let rest = match map.get("additionalProperties").and_then(Value::as_bool) {
            Some(true) => DataType::any(),
            _ => DataType::never(),
        };

        DataType::object(properties, rest, required)
    }

    fn definition(&self, name: &str) -> Option<&'s Value> {
        self.root.get("definitions")?.get(name)
    }
}

fn is_mapping_variant(schema: &Value) -> bool {
    let is_properties_form = schema.get("properties").is_some()
        || schema.get("optionalProperties").is_some();
    let nullable = schema
        .get("nullable")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    is_properties_form && !nullable
}

/// Add the discriminator `tag` to each object member of a mapping variant,
/// as a required property holding the variant's `key`.
fn with_tag(t: DataType, tag: &str, key: &str) -> DataType {
    match t.kind() {
        TypeKind::Union(members) => {
            DataType::union(members.iter().map(|m| with_tag(m.clone(), tag, key)))
        }
        TypeKind::Object(object) => {
            let mut properties = IndexMap::with_capacity(object.properties().len() + 1);
            properties.insert(tag.to_owned(), DataType::literal(Value::from(key)));
            for (name, t) in object.properties() {
                if name != tag {
                    properties.insert(name.to_owned(), t.clone());
                }
            }

            let required = object
                .required()
                .iter()
                .cloned()
                .chain(std::iter::once(tag.to_owned()));

            DataType::object(properties, object.rest().clone(), required)
                .with_annotations(t.annotations().clone())
        }
        _ => t,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn primitives() {
        assert_eq!(from_jtd(&json!({})).data_type, DataType::any());
        assert_eq!(
            from_jtd(&json!({"type": "timestamp"})).data_type,
            DataType::string()
        );

        let rv = from_jtd(&json!({"type": "float64"}));
        assert_eq!(rv.data_type, DataType::number());
        assert!(rv.exact);

        let rv = from_jtd(&json!({"type": "uint8"}));
        assert_eq!(rv.data_type, DataType::number());
        assert!(!rv.exact);
    }

    #[test]
    fn enums_and_nullable() {
        let rv = from_jtd(&json!({"enum": ["admin", "guest"], "nullable": true}));
        assert!(rv.exact);
        assert_eq!(rv.data_type.to_string(), "\"admin\" | \"guest\" | null");
    }

    #[test]
    fn properties() {
        let rv = from_jtd(&json!({
            "properties": {"name": {"type": "string"}},
            "optionalProperties": {"tags": {"elements": {"type": "string"}}}
        }));
        assert!(rv.exact);
        assert_eq!(rv.data_type.to_string(), "{name: string, tags?: string[]}");

        let rv = from_jtd(&json!({
            "properties": {"name": {"type": "string"}},
            "additionalProperties": true
        }));
        assert_eq!(rv.data_type.to_string(), "{name: string, ...}");
    }

    #[test]
    fn values() {
        let rv = from_jtd(&json!({"values": {"type": "boolean"}}));
        assert_eq!(rv.data_type.to_string(), "{[key: string]: boolean}");
    }

    #[test]
    fn discriminator() {
        let rv = from_jtd(&json!({
            "discriminator": "kind",
            "mapping": {
                "circle": {"properties": {"radius": {"type": "float64"}}},
                "square": {"properties": {"side": {"type": "float64"}}}
            }
        }));
        assert!(rv.exact);
        assert_eq!(
            rv.data_type.to_string(),
            "{kind: \"circle\", radius: number} | {kind: \"square\", side: number}"
        );
    }

    #[test]
    fn discriminator_variants_are_checked() {
        let rv = from_jtd(&json!({
            "discriminator": "kind",
            "mapping": {
                "circle": {
                    "properties": {"radius": {"type": "float64"}},
                    "nullable": true
                },
                "square": {
                    "properties": {"side": {"type": "float64"}},
                    "units": "cm"
                }
            }
        }));
        assert!(!rv.exact);
        assert_eq!(
            rv.data_type.to_string(),
            "{kind: \"circle\", radius: number} | null | {kind: \"square\", side: number}"
        );

        let rv = from_jtd(&json!({
            "discriminator": "kind",
            "mapping": {"any": {}}
        }));
        assert!(!rv.exact);
        assert_eq!(rv.data_type, DataType::any());
    }

    #[test]
    fn refs_and_metadata() {
        let schema = json!({
            "definitions": {
                "user": {
                    "metadata": {"description": "A user"},
                    "properties": {"id": {"type": "string"}}
                }
            },
            "elements": {"ref": "user"}
        });
        let rv = from_jtd(&schema);
        assert!(rv.exact);
        let element = rv.data_type.as_array().unwrap().rest().clone();
        assert_eq!(element.to_string(), "{id: string}");
        assert_eq!(element.annotations().description.as_deref(), Some("A user"));

        let rv = from_jtd(&json!({"ref": "missing"}));
        assert_eq!(rv.data_type, DataType::any());
        assert!(!rv.exact);
    }

    #[test]
    fn recursive_refs() {
        let schema = json!({
            "definitions": {
                "node": {
                    "properties": {"value": {"type": "string"}},
                    "optionalProperties": {"next": {"ref": "node"}}
                }
            },
            "ref": "node"
        });
        let rv = from_jtd(&schema);
        assert!(!rv.exact);
        assert_eq!(rv.data_type.to_string(), "{value: string, next?: any}");
    }
}
