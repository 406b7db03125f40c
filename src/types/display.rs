use std::fmt;

use super::{ArrayType, DataType, ObjectType, PrimitiveType, TypeKind};

const SHORT_SCALAR: usize = 32;

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveType::Number => f.write_str("number"),
            PrimitiveType::String => f.write_str("string"),
            PrimitiveType::Boolean => f.write_str("boolean"),
            PrimitiveType::Null => f.write_str("null"),
            PrimitiveType::Nothing => f.write_str("nothing"),
        }
    }
}

/// The single-line form, e.g. `{id: number, tags?: string[], ...}`.
impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeKind::Any => f.write_str("any"),
            TypeKind::Never => f.write_str("never"),
            TypeKind::Literal(value) => write!(f, "{}", value),
            TypeKind::Primitive(p) => write!(f, "{}", p),
            TypeKind::Object(object) => write_object(f, object),
            TypeKind::Array(array) => write_array(f, array),
            TypeKind::Union(members) => {
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", member)?;
                }
                Ok(())
            }
        }
    }
}

fn write_object(f: &mut fmt::Formatter<'_>, object: &ObjectType) -> fmt::Result {
    let mut parts: Vec<String> = object
        .properties()
        .iter()
        .map(|(name, t)| property_line(object, name, &t.to_string()))
        .collect();

    if let Some(rest) = rest_line(object.rest(), &object.rest().to_string()) {
        parts.push(rest);
    }

    write!(f, "{{{}}}", parts.join(", "))
}

fn write_array(f: &mut fmt::Formatter<'_>, array: &ArrayType) -> fmt::Result {
    if array.prefix().is_empty() {
        if array.rest().is_never() {
            return f.write_str("[]");
        }
        return f.write_str(&element_list(array.rest(), &array.rest().to_string()));
    }

    let mut parts: Vec<String> = array
        .prefix()
        .iter()
        .enumerate()
        .map(|(i, t)| element_line(array, i, &t.to_string()))
        .collect();

    if !array.rest().is_never() {
        parts.push(format!(
            "...{}",
            element_list(array.rest(), &array.rest().to_string())
        ));
    }

    write!(f, "[{}]", parts.join(", "))
}

fn property_line(object: &ObjectType, name: &str, rendered: &str) -> String {
    let optional = if object.is_required(name) { "" } else { "?" };
    format!("{}{}: {}", property_name(name), optional, rendered)
}

fn element_line(array: &ArrayType, index: usize, rendered: &str) -> String {
    if index < array.required_count() {
        rendered.to_owned()
    } else {
        format!("{}?", rendered)
    }
}

fn rest_line(rest: &DataType, rendered: &str) -> Option<String> {
    match rest.kind() {
        TypeKind::Never => None,
        TypeKind::Any => Some(String::from("...")),
        _ => Some(format!("[key: string]: {}", rendered)),
    }
}

fn element_list(element: &DataType, rendered: &str) -> String {
    if matches!(element.kind(), TypeKind::Union(_)) {
        format!("({})[]", rendered)
    } else {
        format!("{}[]", rendered)
    }
}

fn property_name(name: &str) -> String {
    let mut chars = name.chars();
    let is_identifier = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');

    if is_identifier {
        name.to_owned()
    } else {
        serde_json::Value::String(name.to_owned()).to_string()
    }
}

fn is_short_scalar(t: &DataType) -> bool {
    matches!(
        t.kind(),
        TypeKind::Any | TypeKind::Never | TypeKind::Literal(_) | TypeKind::Primitive(_)
    ) && t.to_string().len() <= SHORT_SCALAR
}

impl DataType {
    /// A multi-line rendering with two-space indentation.
    ///
    /// A union of short scalars stays on one line.
    pub fn to_pretty_string(&self) -> String {
        let mut buf = String::new();
        write_pretty(&mut buf, self, 0);
        buf
    }
}

fn write_pretty(buf: &mut String, t: &DataType, indent: usize) {
    let pad = " ".repeat(indent);
    let inner = " ".repeat(indent + 2);

    match t.kind() {
        TypeKind::Object(object) if !object.properties().is_empty() => {
            buf.push_str("{\n");
            let mut lines: Vec<String> = object
                .properties()
                .iter()
                .map(|(name, t)| {
                    let mut rendered = String::new();
                    write_pretty(&mut rendered, t, indent + 2);
                    format!("{}{}", inner, property_line(object, name, &rendered))
                })
                .collect();

            let mut rest = String::new();
            write_pretty(&mut rest, object.rest(), indent + 2);
            if let Some(line) = rest_line(object.rest(), &rest) {
                lines.push(format!("{}{}", inner, line));
            }

            buf.push_str(&lines.join(",\n"));
            buf.push_str(&format!("\n{}}}", pad));
        }
        TypeKind::Array(array) if !array.prefix().is_empty() => {
            buf.push_str("[\n");
            let mut lines: Vec<String> = array
                .prefix()
                .iter()
                .enumerate()
                .map(|(i, t)| {
                    let mut rendered = String::new();
                    write_pretty(&mut rendered, t, indent + 2);
                    format!("{}{}", inner, element_line(array, i, &rendered))
                })
                .collect();

            if !array.rest().is_never() {
                let mut rest = String::new();
                write_pretty(&mut rest, array.rest(), indent + 2);
                lines.push(format!("{}...{}", inner, element_list(array.rest(), &rest)));
            }

            buf.push_str(&lines.join(",\n"));
            buf.push_str(&format!("\n{}]", pad));
        }
        TypeKind::Array(array) if !array.rest().is_never() => {
            let mut rest = String::new();
            write_pretty(&mut rest, array.rest(), indent);
            buf.push_str(&element_list(array.rest(), &rest));
        }
        TypeKind::Union(members) => {
            if members.iter().all(is_short_scalar) {
                buf.push_str(&t.to_string());
            } else {
                let rendered: Vec<String> = members
                    .iter()
                    .map(|m| {
                        let mut s = String::new();
                        write_pretty(&mut s, m, indent);
                        s
                    })
                    .collect();
                buf.push_str(&rendered.join(&format!("\n{}| ", pad)));
            }
        }
        _ => {
            buf.push_str(&t.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::json;

    use super::*;

    fn record() -> DataType {
        let mut properties = IndexMap::new();
        properties.insert(
            String::from("role"),
            DataType::union([
                DataType::literal(json!("admin")),
                DataType::literal(json!("guest")),
            ]),
        );
        properties.insert(String::from("bannedCount"), DataType::number());
        properties.insert(
            String::from("tags"),
            DataType::array_of(DataType::union([DataType::string(), DataType::null()])),
        );
        DataType::object(properties, DataType::any(), vec![String::from("role")])
    }

    #[test]
    fn simplified_form() {
        assert_eq!(
            record().to_string(),
            r#"{role: "admin" | "guest", bannedCount?: number, tags?: (string | null)[], ...}"#
        );
    }

    #[test]
    fn scalars() {
        assert_eq!(DataType::any().to_string(), "any");
        assert_eq!(DataType::never().to_string(), "never");
        assert_eq!(DataType::nothing().to_string(), "nothing");
        assert_eq!(DataType::literal(json!(1.5)).to_string(), "1.5");
        assert_eq!(DataType::literal(json!("a\"b")).to_string(), r#""a\"b""#);
    }

    #[test]
    fn arrays() {
        assert_eq!(DataType::array(Vec::new(), DataType::never(), 0).to_string(), "[]");
        assert_eq!(
            DataType::array(
                vec![DataType::number(), DataType::string()],
                DataType::boolean(),
                1
            )
            .to_string(),
            "[number, string?, ...boolean[]]"
        );
    }

    #[test]
    fn quoted_property_names() {
        let t = DataType::from_value(&json!({"first name": 1}));
        assert_eq!(t.to_string(), r#"{"first name": 1}"#);
    }

    #[test]
    fn record_rest() {
        assert_eq!(
            DataType::record_of(DataType::number()).to_string(),
            "{[key: string]: number}"
        );
    }

    #[test]
    fn pretty_form() {
        let expected = concat!(
            "{\n",
            "  role: \"admin\" | \"guest\",\n",
            "  bannedCount?: number,\n",
            "  tags?: (string | null)[],\n",
            "  ...\n",
            "}"
        );
        assert_eq!(record().to_pretty_string(), expected);
    }

    #[test]
    fn pretty_tuple_of_objects() {
        let t = DataType::from_value(&json!([{"a": [1]}, true]));
        let expected = concat!(
            "[\n",
            "  {\n",
            "    a: [\n",
            "      1\n",
            "    ]\n",
            "  },\n",
            "  true\n",
            "]"
        );
        assert_eq!(t.to_pretty_string(), expected);
    }

    #[test]
    fn pretty_union_of_objects() {
        let t = DataType::union([
            DataType::from_value(&json!({"a": 1})),
            DataType::string(),
        ]);
        assert_eq!(t.to_pretty_string(), "{\n  a: 1\n}\n| string");
    }
}
