//! Conversion of schema documents to [`DataType`]s.
//!
//! Conversion never fails. Anything a converter can't represent precisely
//! widens the result and clears [`ConvertedType::exact`].
use std::collections::HashMap;

use serde_json::Value;

use crate::types::{Annotations, DataType};

pub mod json_schema;
pub mod jtd;

pub use json_schema::{from_json_schema, JsonSchemaConverter};
pub use jtd::{from_jtd, JtdConverter};

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedType {
    pub data_type: DataType,
    /// False when `data_type` is only an over-approximation of the values
    /// the schema accepts.
    pub exact: bool,
}

impl ConvertedType {
    pub fn exact(data_type: DataType) -> Self {
        ConvertedType {
            data_type,
            exact: true,
        }
    }

    pub fn approximate(data_type: DataType) -> Self {
        ConvertedType {
            data_type,
            exact: false,
        }
    }
}

type NodeKey = *const Value;

struct Frame {
    node: NodeKey,
    exact: bool,
}

/// Memoization and cycle detection shared by the converters, keyed by the
/// address of each schema node.
#[derive(Default)]
pub(crate) struct Memo {
    done: HashMap<NodeKey, ConvertedType>,
    stack: Vec<Frame>,
}

pub(crate) enum Entry {
    Done(ConvertedType),
    Enter,
}

impl Memo {
    /// Start converting `node`, unless it has been converted already or is
    /// being converted further up the stack.
    pub fn enter(&mut self, node: &Value) -> Entry {
        let key: NodeKey = node;

        if let Some(done) = self.done.get(&key).cloned() {
            if !done.exact {
                self.mark_inexact();
            }
            return Entry::Done(done);
        }

        if self.stack.iter().any(|f| f.node == key) {
            log::debug!("recursive schema reference, approximating with any");
            for frame in &mut self.stack {
                frame.exact = false;
            }
            return Entry::Done(ConvertedType::approximate(DataType::any()));
        }

        self.stack.push(Frame { node: key, exact: true });
        Entry::Enter
    }

    pub fn leave(&mut self, node: &Value, data_type: DataType) -> ConvertedType {
        let exact = self.stack.pop().map(|f| f.exact).unwrap_or(false);
        let rv = ConvertedType { data_type, exact };
        self.done.insert(node as NodeKey, rv.clone());

        // An approximate child makes its parent approximate too.
        if !exact {
            self.mark_inexact();
        }

        rv
    }

    /// Mark the node being converted as approximate.
    pub fn mark_inexact(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            frame.exact = false;
        }
    }
}

/// The documentation keywords both schema languages can carry, read from
/// `metadata` for JTD and from the schema itself for JSON Schema.
pub(crate) fn annotations_of(map: &serde_json::Map<String, Value>) -> Annotations {
    Annotations {
        title: map.get("title").and_then(Value::as_str).map(str::to_owned),
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned),
        deprecated: map
            .get("deprecated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        read_only: map.get("readOnly").and_then(Value::as_bool).unwrap_or(false),
        write_only: map
            .get("writeOnly")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        default: map.get("default").cloned(),
        examples: map
            .get("examples")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
    }
}

pub(crate) fn annotate(t: DataType, annotations: Annotations) -> DataType {
    if annotations.is_empty() || t.is_never() {
        t
    } else {
        t.with_annotations(annotations.merge(t.annotations()))
    }
}
