use std::{
    fmt::{self, Write},
    rc::Rc,
};

use serde_json::Value;

use crate::{
    context::QueryContext,
    filter::FilterExpression,
    node::{escape_name, Node, NodeList, PathSegment},
    token::{NodeId, Token},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Name {
        id: NodeId,
        token: Token,
        name: String,
    },
    Index {
        id: NodeId,
        token: Token,
        index: i64,
    },
    Slice {
        id: NodeId,
        start: Option<i64>,
        stop: Option<i64>,
        step: Option<i64>,
        start_token: Option<Token>,
        colon: Token,
        stop_token: Option<Token>,
        step_colon: Option<Token>,
        step_token: Option<Token>,
    },
    Wild {
        id: NodeId,
        token: Token,
    },
    Filter {
        id: NodeId,
        token: Token,
        expression: Box<FilterExpression>,
    },
    /// Stands in for a selector the parser expected but could not find.
    Missing {
        id: NodeId,
        token: Token,
    },
}

impl Selector {
    pub fn id(&self) -> NodeId {
        match self {
            Selector::Name { id, .. }
            | Selector::Index { id, .. }
            | Selector::Slice { id, .. }
            | Selector::Wild { id, .. }
            | Selector::Filter { id, .. }
            | Selector::Missing { id, .. } => *id,
        }
    }

    /// Name and index selectors select at most one node.
    pub fn is_singular(&self) -> bool {
        matches!(self, Selector::Name { .. } | Selector::Index { .. })
    }

    /// The location step of a name or non-negative index selector.
    pub fn path_segment(&self) -> Option<PathSegment> {
        match self {
            Selector::Name { name, .. } => Some(PathSegment::Name(name.to_owned())),
            Selector::Index { index, .. } => usize::try_from(*index).ok().map(PathSegment::Index),
            _ => None,
        }
    }

    /// Append the nodes this selector selects from `input` to `output`.
    pub fn select<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        input: &Rc<Node<'v>>,
        output: &mut NodeList<'v>,
    ) {
        let start = output.len();

        match self {
            Selector::Name { name, .. } => {
                if let Some((k, v)) = input.value.as_object().and_then(|m| m.get_key_value(name)) {
                    output.push(Node::new_object_member(input, v, k));
                }
            }
            Selector::Index { index, .. } => {
                if let Some(array) = input.value.as_array() {
                    if let Some(i) = norm_index(*index, array.len()) {
                        if let Some(v) = array.get(i) {
                            output.push(Node::new_array_element(input, v, i));
                        }
                    }
                }
            }
            Selector::Slice {
                start: slice_start,
                stop,
                step,
                ..
            } => {
                if let Some(array) = input.value.as_array() {
                    for i in slice_indices(array.len(), *slice_start, *stop, *step) {
                        output.push(Node::new_array_element(input, &array[i], i));
                    }
                }
            }
            Selector::Wild { .. } => match input.value {
                Value::Array(arr) => output.extend(
                    arr.iter()
                        .enumerate()
                        .map(|(i, v)| Node::new_array_element(input, v, i)),
                ),
                Value::Object(obj) => output.extend(
                    obj.iter()
                        .map(|(k, v)| Node::new_object_member(input, v, k)),
                ),
                _ => (),
            },
            Selector::Filter { expression, .. } => match input.value {
                Value::Array(arr) => {
                    for (i, v) in arr.iter().enumerate() {
                        let candidate = Node::new_array_element(input, v, i);
                        if expression.evaluate(ctx, &candidate).is_truthy() {
                            output.push(candidate);
                        }
                    }
                }
                Value::Object(obj) => {
                    for (k, v) in obj.iter() {
                        let candidate = Node::new_object_member(input, v, k);
                        if expression.evaluate(ctx, &candidate).is_truthy() {
                            output.push(candidate);
                        }
                    }
                }
                _ => (),
            },
            Selector::Missing { .. } => (),
        }

        ctx.notify(|hooks| hooks.selector_evaluated(self, input, &output[start..]));
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name { name, .. } => write!(f, "'{}'", escape_name(name)),
            Selector::Index { index, .. } => write!(f, "{index}"),
            Selector::Slice {
                start, stop, step, ..
            } => {
                write!(
                    f,
                    "{}:{}:{}",
                    start.map(|i| i.to_string()).unwrap_or_default(),
                    stop.map(|i| i.to_string()).unwrap_or_default(),
                    step.unwrap_or(1),
                )
            }
            Selector::Wild { .. } => f.write_char('*'),
            Selector::Filter { expression, .. } => write!(f, "?{expression}"),
            Selector::Missing { .. } => Ok(()),
        }
    }
}

fn norm_index(index: i64, length: usize) -> Option<usize> {
    if index < 0 {
        index
            .checked_abs()
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| length.checked_sub(i))
    } else {
        usize::try_from(index).ok()
    }
}

/// Array indices selected by a slice, in selection order.
pub(crate) fn slice_indices(
    length: usize,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Vec<usize> {
    let len = length as i128;
    let step = step.unwrap_or(1) as i128;

    if step == 0 || len == 0 {
        return Vec::new();
    }

    let normalize = |i: i64| {
        let i = i as i128;
        if i >= 0 {
            i
        } else {
            len + i
        }
    };

    let mut indices = Vec::new();

    if step > 0 {
        let n_start = start.map(normalize).unwrap_or(0);
        let n_stop = stop.map(normalize).unwrap_or(len);
        let lower = n_start.clamp(0, len);
        let upper = n_stop.clamp(0, len);
        let mut i = lower;
        while i < upper {
            indices.push(i as usize);
            i += step;
        }
    } else {
        let n_start = start.map(normalize).unwrap_or(len - 1);
        let n_stop = stop.map(normalize).unwrap_or(-len - 1);
        let upper = n_start.clamp(-1, len - 1);
        let lower = n_stop.clamp(-1, len - 1);
        let mut i = upper;
        while lower < i {
            indices.push(i as usize);
            i += step;
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_slice() {
        assert_eq!(slice_indices(5, None, None, Some(-1)), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn stepped_slice() {
        assert_eq!(slice_indices(5, Some(1), Some(4), Some(2)), vec![1, 3]);
    }

    #[test]
    fn zero_step_selects_nothing() {
        assert!(slice_indices(5, None, None, Some(0)).is_empty());
    }

    #[test]
    fn out_of_range_bounds_are_clamped() {
        assert_eq!(slice_indices(3, Some(-10), Some(10), None), vec![0, 1, 2]);
        assert!(slice_indices(3, Some(10), None, None).is_empty());
        assert_eq!(slice_indices(3, Some(10), None, Some(-1)), vec![2, 1, 0]);
        assert_eq!(slice_indices(3, Some(i64::MIN), Some(i64::MAX), Some(i64::MAX)), vec![0]);
    }

    #[test]
    fn negative_bounds() {
        assert_eq!(slice_indices(5, Some(-2), None, None), vec![3, 4]);
        assert_eq!(slice_indices(5, Some(-1), Some(-3), Some(-1)), vec![4, 3]);
    }

    #[test]
    fn negative_index() {
        assert_eq!(norm_index(-1, 3), Some(2));
        assert_eq!(norm_index(-4, 3), None);
        assert_eq!(norm_index(i64::MIN, 3), None);
    }
}
