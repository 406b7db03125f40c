use std::{fmt, rc::Rc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An array element index or object member name in a node's location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Name(String),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "[{}]", i),
            PathSegment::Name(s) => write!(f, "['{}']", escape_name(s)),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl From<&str> for PathSegment {
    fn from(name: &str) -> Self {
        PathSegment::Name(name.to_owned())
    }
}

/// A JSON value located by a query, linked back to the node that located it.
///
/// The chain of parents is only walked when a path is asked for.
#[derive(Debug, PartialEq)]
pub struct Node<'v> {
    pub value: &'v Value,
    pub segment: Option<PathSegment>,
    pub parent: Option<Rc<Node<'v>>>,
}

pub type NodeList<'v> = Vec<Rc<Node<'v>>>;

impl<'v> Node<'v> {
    pub fn root(value: &'v Value) -> Rc<Self> {
        Rc::new(Node {
            value,
            segment: None,
            parent: None,
        })
    }

    pub fn new_array_element(parent: &Rc<Node<'v>>, value: &'v Value, index: usize) -> Rc<Self> {
        Rc::new(Node {
            value,
            segment: Some(PathSegment::Index(index)),
            parent: Some(Rc::clone(parent)),
        })
    }

    pub fn new_object_member(parent: &Rc<Node<'v>>, value: &'v Value, name: &str) -> Rc<Self> {
        Rc::new(Node {
            value,
            segment: Some(PathSegment::Name(name.to_owned())),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Path segments from the query argument down to this node.
    pub fn path(&self) -> Vec<PathSegment> {
        let mut segments = Vec::new();
        let mut node = Some(self);

        while let Some(n) = node {
            if let Some(segment) = &n.segment {
                segments.push(segment.clone());
            }
            node = n.parent.as_deref();
        }

        segments.reverse();
        segments
    }

    /// The location of this node's value in the query argument as a normalized path.
    pub fn normalized_path(&self) -> String {
        normalized_path(&self.path())
    }
}

pub fn normalized_path(segments: &[PathSegment]) -> String {
    let mut rv = String::from("$");
    for segment in segments {
        rv.push_str(&segment.to_string());
    }
    rv
}

pub(crate) fn escape_name(name: &str) -> String {
    let mut rv = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '\'' => rv.push_str("\\'"),
            '\\' => rv.push_str("\\\\"),
            '\u{0008}' => rv.push_str("\\b"),
            '\u{000C}' => rv.push_str("\\f"),
            '\n' => rv.push_str("\\n"),
            '\r' => rv.push_str("\\r"),
            '\t' => rv.push_str("\\t"),
            c if (c as u32) < 0x20 => rv.push_str(&format!("\\u{:04x}", c as u32)),
            c => rv.push(c),
        }
    }
    rv
}

/// Values of every node, in order.
pub fn values<'v>(nodes: &NodeList<'v>) -> Vec<&'v Value> {
    nodes.iter().map(|node| node.value).collect()
}

/// Paths of every node, in order.
pub fn paths(nodes: &NodeList) -> Vec<Vec<PathSegment>> {
    nodes.iter().map(|node| node.path()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain<'v>(value: &'v Value, segments: Vec<PathSegment>) -> Rc<Node<'v>> {
        segments.into_iter().fold(Node::root(value), |parent, segment| {
            Rc::new(Node {
                value,
                segment: Some(segment),
                parent: Some(parent),
            })
        })
    }

    #[test]
    fn normalized_path_names() {
        let value = Value::Bool(true);
        let node = chain(&value, vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(node.normalized_path(), "$['a']['b']['c']");
    }

    #[test]
    fn normalized_path_indices() {
        let value = Value::Bool(true);
        let node = chain(&value, vec![1usize.into(), 2usize.into(), 3usize.into()]);
        assert_eq!(node.normalized_path(), "$[1][2][3]");
    }

    #[test]
    fn normalized_path_mixed() {
        let value = Value::Bool(true);
        let node = chain(&value, vec!["a".into(), 2usize.into(), "c".into()]);
        assert_eq!(node.normalized_path(), "$['a'][2]['c']");
    }

    #[test]
    fn normalized_path_root() {
        let value = Value::Bool(true);
        assert_eq!(Node::root(&value).normalized_path(), "$");
    }

    #[test]
    fn normalized_path_escapes() {
        let value = Value::Null;
        let node = chain(&value, vec!["it's".into(), "a\\b\n".into()]);
        assert_eq!(node.normalized_path(), "$['it\\'s']['a\\\\b\\n']");
    }

    #[test]
    fn path_serializes_as_json_array() {
        let value = Value::Null;
        let node = chain(&value, vec!["items".into(), 0usize.into(), "price".into()]);
        assert_eq!(
            serde_json::to_string(&node.path()).unwrap(),
            r#"["items",0,"price"]"#
        );
    }
}
