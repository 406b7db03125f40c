//! JSON Schema (2020-12 subset) to [`DataType`].
use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use url::Url;

use super::{annotate, annotations_of, ConvertedType, Entry, Memo};
use crate::types::DataType;

const DEFAULT_BASE_URI: &str = "memory://schema/root.json";

/// Keywords that are either modelled by the conversion or don't constrain
/// values at all. Anything else makes the result approximate.
const SUPPORTED_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "$anchor",
    "$defs",
    "definitions",
    "$ref",
    "$comment",
    "title",
    "description",
    "deprecated",
    "readOnly",
    "writeOnly",
    "default",
    "examples",
    "type",
    "enum",
    "const",
    "properties",
    "required",
    "additionalProperties",
    "items",
    "prefixItems",
    "minItems",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
];

/// Keywords whose value is a single subschema.
const SCHEMA_KEYWORDS: &[&str] = &[
    "additionalProperties",
    "items",
    "not",
    "if",
    "then",
    "else",
    "contains",
    "propertyNames",
    "unevaluatedItems",
    "unevaluatedProperties",
];

/// Keywords whose value is an array of subschemas.
const SCHEMA_ARRAY_KEYWORDS: &[&str] = &["prefixItems", "allOf", "anyOf", "oneOf", "items"];

/// Keywords whose value maps names to subschemas.
const SCHEMA_MAP_KEYWORDS: &[&str] = &[
    "$defs",
    "definitions",
    "properties",
    "patternProperties",
    "dependentSchemas",
];

/// Convert `schema`, resolving relative references against `base_uri`.
pub fn from_json_schema(schema: &Value, base_uri: Option<&str>) -> ConvertedType {
    JsonSchemaConverter::new(schema, base_uri).convert()
}

pub struct JsonSchemaConverter<'s> {
    root: &'s Value,
    resources: HashMap<String, &'s Value>,
    anchors: HashMap<String, &'s Value>,
    bases: HashMap<*const Value, Url>,
    memo: Memo,
}

impl<'s> JsonSchemaConverter<'s> {
    pub fn new(root: &'s Value, base_uri: Option<&str>) -> Self {
        let base = base_uri
            .and_then(|uri| match Url::parse(uri) {
                Ok(url) => Some(url),
                Err(err) => {
                    log::debug!("ignoring base URI {:?}: {}", uri, err);
                    None
                }
            })
            .or_else(|| Url::parse(DEFAULT_BASE_URI).ok());

        let mut converter = JsonSchemaConverter {
            root,
            resources: HashMap::new(),
            anchors: HashMap::new(),
            bases: HashMap::new(),
            memo: Memo::default(),
        };

        if let Some(base) = base {
            converter.index(root, base);
        }

        converter
    }

    pub fn convert(&mut self) -> ConvertedType {
        self.convert_node(self.root)
    }

    /// Convert one schema node of the document this converter was built for.
    pub fn convert_node(&mut self, schema: &'s Value) -> ConvertedType {
        match self.memo.enter(schema) {
            Entry::Done(done) => done,
            Entry::Enter => {
                let t = self.convert_schema(schema);
                self.memo.leave(schema, t)
            }
        }
    }

    /// Record the base URI of every schema node, and every resource and
    /// anchor a `$ref` might point at.
    fn index(&mut self, schema: &'s Value, base: Url) {
        let Value::Object(map) = schema else {
            self.bases.insert(schema, base);
            return;
        };

        let base = match map.get("$id").and_then(Value::as_str) {
            Some(id) => match base.join(id) {
                Ok(url) => url,
                Err(err) => {
                    log::debug!("ignoring $id {:?}: {}", id, err);
                    base
                }
            },
            None => base,
        };

        let mut resource = base.clone();
        resource.set_fragment(None);
        self.resources
            .entry(resource.to_string())
            .or_insert(schema);

        if let Some(anchor) = map.get("$anchor").and_then(Value::as_str) {
            let mut url = resource.clone();
            url.set_fragment(Some(anchor));
            self.anchors.insert(url.to_string(), schema);
        }

        self.bases.insert(schema, base.clone());

        for (keyword, value) in map {
            let keyword = keyword.as_str();
            if SCHEMA_KEYWORDS.contains(&keyword) && !value.is_array() {
                self.index(value, base.clone());
            } else if SCHEMA_ARRAY_KEYWORDS.contains(&keyword) {
                for item in value.as_array().into_iter().flatten() {
                    self.index(item, base.clone());
                }
            } else if SCHEMA_MAP_KEYWORDS.contains(&keyword) {
                for item in value.as_object().into_iter().flat_map(|m| m.values()) {
                    self.index(item, base.clone());
                }
            }
        }
    }

    fn resolve(&self, schema: &'s Value, reference: &str) -> Option<&'s Value> {
        let base = self.bases.get(&(schema as *const Value))?;
        let url = base.join(reference).ok()?;

        let mut document = url.clone();
        document.set_fragment(None);

        match url.fragment() {
            None | Some("") => self.resources.get(document.as_str()).copied(),
            Some(pointer) if pointer.starts_with('/') => self
                .resources
                .get(document.as_str())?
                .pointer(&percent_decode(pointer)),
            Some(_) => self.anchors.get(url.as_str()).copied(),
        }
    }

    fn sub(&mut self, schema: &'s Value) -> DataType {
        self.convert_node(schema).data_type
    }

    fn convert_schema(&mut self, schema: &'s Value) -> DataType {
        match schema {
            Value::Bool(true) => DataType::any(),
            Value::Bool(false) => DataType::never(),
            Value::Object(map) => self.convert_object(schema, map),
            _ => {
                log::debug!("not a schema: {}", schema);
                self.memo.mark_inexact();
                DataType::any()
            }
        }
    }

    fn convert_object(&mut self, schema: &'s Value, map: &'s Map<String, Value>) -> DataType {
        for keyword in map.keys() {
            if !SUPPORTED_KEYWORDS.contains(&keyword.as_str()) {
                log::debug!("unsupported keyword {:?}, result is approximate", keyword);
                self.memo.mark_inexact();
            }
        }

        let mut t = match map.get("type") {
            Some(Value::String(name)) => self.type_branch(name, map),
            Some(Value::Array(names)) => {
                let mut branches = Vec::new();
                for name in names.iter().filter_map(Value::as_str) {
                    branches.push(self.type_branch(name, map));
                }
                DataType::union(branches)
            }
            Some(_) => {
                self.memo.mark_inexact();
                DataType::any()
            }
            None if has_structural_keywords(map) => DataType::union([
                DataType::null(),
                DataType::boolean(),
                DataType::number(),
                DataType::string(),
                self.array_type(map),
                self.object_type(map),
            ]),
            None => DataType::any(),
        };

        if let Some(values) = map.get("enum").and_then(Value::as_array) {
            t = t.intersect(&DataType::union(values.iter().map(DataType::from_value)));
        }

        if let Some(value) = map.get("const") {
            t = t.intersect(&DataType::from_value(value));
        }

        if let Some(schemas) = map.get("allOf").and_then(Value::as_array) {
            for s in schemas {
                let branch = self.sub(s);
                t = t.intersect(&branch);
            }
        }

        if let Some(schemas) = map.get("anyOf").and_then(Value::as_array) {
            let branches: Vec<DataType> = schemas.iter().map(|s| self.sub(s)).collect();
            t = t.intersect(&DataType::union(branches));
        }

        if let Some(schemas) = map.get("oneOf").and_then(Value::as_array) {
            // Exclusivity isn't modelled.
            if schemas.len() > 1 {
                self.memo.mark_inexact();
            }
            let branches: Vec<DataType> = schemas.iter().map(|s| self.sub(s)).collect();
            t = t.intersect(&DataType::union(branches));
        }

        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            match self.resolve(schema, reference) {
                Some(target) => {
                    let resolved = self.sub(target);
                    t = t.intersect(&resolved);
                }
                None => {
                    log::debug!("unresolved $ref {:?}", reference);
                    self.memo.mark_inexact();
                }
            }
        }

        if let Some(not) = map.get("not") {
            let excluded = self.sub(not);
            t = t.subtract(&excluded);
            if !t.intersect(&excluded).is_never() {
                self.memo.mark_inexact();
            }
        }

        annotate(t, annotations_of(map))
    }

    fn type_branch(&mut self, name: &str, map: &'s Map<String, Value>) -> DataType {
        match name {
            "null" => DataType::null(),
            "boolean" => DataType::boolean(),
            "number" => DataType::number(),
            "integer" => {
                // Integers aren't distinguished from other numbers.
                self.memo.mark_inexact();
                DataType::number()
            }
            "string" => DataType::string(),
            "array" => self.array_type(map),
            "object" => self.object_type(map),
            _ => {
                log::debug!("unknown type {:?}", name);
                self.memo.mark_inexact();
                DataType::any()
            }
        }
    }

    fn object_type(&mut self, map: &'s Map<String, Value>) -> DataType {
        let mut properties = IndexMap::new();

        if let Some(props) = map.get("properties").and_then(Value::as_object) {
            for (name, s) in props {
                let t = self.sub(s);
                properties.insert(name.to_owned(), t);
            }
        }

        let required: Vec<String> = map
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_owned)
            .collect();

        let rest = match map.get("additionalProperties") {
            Some(s) => self.sub(s),
            None => DataType::any(),
        };

        DataType::object(properties, rest, required)
    }

    fn array_type(&mut self, map: &'s Map<String, Value>) -> DataType {
        let mut prefix = Vec::new();

        if let Some(items) = map.get("prefixItems").and_then(Value::as_array) {
            for s in items {
                prefix.push(self.sub(s));
            }
        }

        let rest = match map.get("items") {
            // The array form from earlier drafts is a tuple.
            Some(Value::Array(items)) if prefix.is_empty() => {
                for s in items {
                    prefix.push(self.sub(s));
                }
                DataType::any()
            }
            Some(s) => self.sub(s),
            None => DataType::any(),
        };

        let required_count = map
            .get("minItems")
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);

        DataType::array(prefix, rest, required_count)
    }
}

fn has_structural_keywords(map: &Map<String, Value>) -> bool {
    [
        "properties",
        "required",
        "additionalProperties",
        "items",
        "prefixItems",
        "minItems",
    ]
    .iter()
    .any(|k| map.contains_key(*k))
}

/// Decode `%XX` escapes in a URI fragment.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn convert(schema: Value) -> ConvertedType {
        from_json_schema(&schema, None)
    }

    #[test]
    fn boolean_schemas() {
        assert_eq!(convert(json!(true)).data_type, DataType::any());
        assert_eq!(convert(json!(false)).data_type, DataType::never());
        assert!(convert(json!({})).exact);
    }

    #[test]
    fn objects() {
        let rv = convert(json!({
            "type": "object",
            "properties": {
                "role": {"enum": ["admin", "guest"]},
                "bannedCount": {"type": "number"}
            },
            "required": ["role"],
            "additionalProperties": false
        }));
        assert!(rv.exact);
        assert_eq!(
            rv.data_type.to_string(),
            "{role: \"admin\" | \"guest\", bannedCount?: number}"
        );
    }

    #[test]
    fn arrays() {
        let rv = convert(json!({
            "type": "array",
            "prefixItems": [{"type": "string"}],
            "items": {"type": "boolean"},
            "minItems": 1
        }));
        assert_eq!(rv.data_type.to_string(), "[string, ...boolean[]]");

        let rv = convert(json!({"type": "array", "items": {"type": ["string", "null"]}}));
        assert_eq!(rv.data_type.to_string(), "(string | null)[]");
    }

    #[test]
    fn combinators() {
        let rv = convert(json!({
            "anyOf": [{"type": "string"}, {"type": "number"}],
            "not": {"const": 1}
        }));
        assert_eq!(rv.data_type.to_string(), "string | number");
        assert!(!rv.exact);

        let rv = convert(json!({
            "allOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}},
                {"required": ["a"]}
            ]
        }));
        assert_eq!(rv.data_type.to_string(), "{a: string, ...}");

        let rv = convert(json!({"enum": [true, false, null], "not": {"type": "null"}}));
        assert_eq!(rv.data_type.to_string(), "boolean");
        assert!(rv.exact);
    }

    #[test]
    fn unsupported_keywords_are_approximate() {
        let rv = convert(json!({"type": "string", "maxLength": 3}));
        assert_eq!(rv.data_type, DataType::string());
        assert!(!rv.exact);
    }

    #[test]
    fn local_references() {
        let rv = convert(json!({
            "$defs": {"name": {"type": "string", "title": "Name"}},
            "type": "object",
            "properties": {"first": {"$ref": "#/$defs/name"}},
            "additionalProperties": false
        }));
        assert!(rv.exact);
        let first = rv.data_type.as_object().unwrap().property("first").clone();
        assert_eq!(first, DataType::string());
        assert_eq!(first.annotations().title.as_deref(), Some("Name"));
    }

    #[test]
    fn ids_and_anchors() {
        let schema = json!({
            "$id": "https://example.com/root.json",
            "type": "array",
            "items": {"$ref": "item.json"},
            "$defs": {
                "item": {
                    "$id": "item.json",
                    "type": "object",
                    "properties": {"tag": {"$ref": "#tag"}},
                    "additionalProperties": false,
                    "$defs": {"tag": {"$anchor": "tag", "const": "x"}}
                }
            }
        });
        let rv = from_json_schema(&schema, None);
        assert!(rv.exact);
        assert_eq!(rv.data_type.to_string(), "{tag?: \"x\"}[]");
    }

    #[test]
    fn unresolved_references() {
        let rv = convert(json!({"$ref": "#/$defs/missing"}));
        assert_eq!(rv.data_type, DataType::any());
        assert!(!rv.exact);
    }

    #[test]
    fn recursive_references() {
        let rv = convert(json!({
            "$defs": {
                "tree": {
                    "type": "object",
                    "properties": {
                        "children": {"type": "array", "items": {"$ref": "#/$defs/tree"}}
                    },
                    "additionalProperties": false
                }
            },
            "$ref": "#/$defs/tree"
        }));
        assert!(!rv.exact);
        assert_eq!(rv.data_type.to_string(), "{children?: any[]}");
    }

    #[test]
    fn pointer_fragments_are_decoded() {
        assert_eq!(percent_decode("/a%20b/c"), "/a b/c");
        assert_eq!(percent_decode("/100%"), "/100%");
    }
}
