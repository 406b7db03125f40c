use std::rc::Rc;

use serde_json::Value;

use crate::{
    env::Environment,
    filter::{FilterExpression, FilterExpressionResult},
    function::FunctionWarning,
    node::Node,
    query::SubQuery,
    segment::Segment,
    selector::Selector,
};

/// Callbacks fired while a query is evaluated.
///
/// Each method is called synchronously, in evaluation order, right after the
/// syntax element it names has produced its output. `output` is exactly the
/// run of nodes that element appended. Implementations observe only; nothing
/// they do changes what the query selects.
#[allow(unused_variables)]
pub trait Instrumentation<'v> {
    fn query_evaluated(&mut self, query: &SubQuery, output: &[Rc<Node<'v>>]) {}

    fn segment_evaluated(
        &mut self,
        segment: &Segment,
        input: &Rc<Node<'v>>,
        output: &[Rc<Node<'v>>],
    ) {
    }

    fn selector_evaluated(
        &mut self,
        selector: &Selector,
        input: &Rc<Node<'v>>,
        output: &[Rc<Node<'v>>],
    ) {
    }

    fn expression_evaluated(
        &mut self,
        expression: &FilterExpression,
        current: &Rc<Node<'v>>,
        result: &FilterExpressionResult<'v>,
    ) {
    }

    fn function_warning(&mut self, warning: &FunctionWarning) {}
}

/// Everything an evaluation needs besides the query itself.
pub struct QueryContext<'v, 'e> {
    pub root: &'v Value,
    pub env: &'e Environment,
    hooks: Option<&'e mut (dyn Instrumentation<'v> + 'e)>,
}

impl<'v, 'e> QueryContext<'v, 'e> {
    pub fn new(root: &'v Value, env: &'e Environment) -> Self {
        Self {
            root,
            env,
            hooks: None,
        }
    }

    pub fn with_hooks(
        root: &'v Value,
        env: &'e Environment,
        hooks: &'e mut (dyn Instrumentation<'v> + 'e),
    ) -> Self {
        Self {
            root,
            env,
            hooks: Some(hooks),
        }
    }

    pub(crate) fn notify(&mut self, f: impl FnOnce(&mut dyn Instrumentation<'v>)) {
        if let Some(hooks) = self.hooks.as_deref_mut() {
            f(hooks);
        }
    }
}
