use std::{fmt, rc::Rc};

use itertools::Itertools;
use serde_json::Value;

use crate::{
    context::QueryContext,
    node::{Node, NodeList},
    selector::Selector,
    token::{NodeId, Token},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Child,
    Descendant,
}

/// One step of a query.
///
/// Shorthand notation (`.name`, `..*`) has a `dot` and a single selector and
/// no brackets. Bracketed notation has brackets, and `separators[i]` is the
/// comma after `selectors[i]`. A descendant segment always has a `..` dot.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub id: NodeId,
    pub kind: SegmentKind,
    pub dot: Option<Token>,
    pub open_bracket: Option<Token>,
    pub selectors: Vec<Selector>,
    pub separators: Vec<Token>,
    pub close_bracket: Option<Token>,
}

impl Segment {
    pub fn is_descendant(&self) -> bool {
        self.kind == SegmentKind::Descendant
    }

    pub fn is_bracketed(&self) -> bool {
        self.open_bracket.is_some()
    }

    /// A child segment with exactly one name or index selector.
    pub fn is_singular(&self) -> bool {
        self.kind == SegmentKind::Child
            && self.selectors.len() == 1
            && self.selectors[0].is_singular()
    }

    /// Append everything this segment selects from `input` to `output`.
    pub fn select<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        input: &Rc<Node<'v>>,
        output: &mut NodeList<'v>,
    ) {
        let start = output.len();

        match self.kind {
            SegmentKind::Child => self.select_children(ctx, input, output),
            SegmentKind::Descendant => self.visit(ctx, input, output),
        }

        log::trace!(
            "segment {} selected {} node(s) from {}",
            self,
            output.len() - start,
            input.normalized_path()
        );

        ctx.notify(|hooks| hooks.segment_evaluated(self, input, &output[start..]));
    }

    fn select_children<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        node: &Rc<Node<'v>>,
        output: &mut NodeList<'v>,
    ) {
        for selector in &self.selectors {
            selector.select(ctx, node, output);
        }
    }

    fn visit<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        node: &Rc<Node<'v>>,
        output: &mut NodeList<'v>,
    ) {
        self.select_children(ctx, node, output);

        match node.value {
            Value::Array(arr) => {
                for (i, v) in arr.iter().enumerate() {
                    self.visit(ctx, &Node::new_array_element(node, v, i), output);
                }
            }
            Value::Object(obj) => {
                for (k, v) in obj.iter() {
                    self.visit(ctx, &Node::new_object_member(node, v, k), output);
                }
            }
            _ => (),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let selectors = self
            .selectors
            .iter()
            .map(|s| s.to_string())
            .join(", ");

        match self.kind {
            SegmentKind::Child => write!(f, "[{}]", selectors),
            SegmentKind::Descendant => write!(f, "..[{}]", selectors),
        }
    }
}
