use std::{borrow::Cow, cmp::Ordering, fmt, rc::Rc};

use serde_json::{Number, Value};

use crate::{
    context::QueryContext,
    function::{ExpressionType, FunctionContext, FunctionWarning},
    node::{Node, NodeList},
    query::SubQuery,
    token::{NodeId, Token, TokenType},
    tree::SyntaxRef,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Ge,
    Gt,
    Le,
    Lt,
}

impl ComparisonOperator {
    pub(crate) fn from_token_type(kind: TokenType) -> Option<Self> {
        match kind {
            TokenType::Eq => Some(ComparisonOperator::Eq),
            TokenType::Ne => Some(ComparisonOperator::Ne),
            TokenType::Ge => Some(ComparisonOperator::Ge),
            TokenType::Gt => Some(ComparisonOperator::Gt),
            TokenType::Le => Some(ComparisonOperator::Le),
            TokenType::Lt => Some(ComparisonOperator::Lt),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonOperator::Eq => f.write_str("=="),
            ComparisonOperator::Ne => f.write_str("!="),
            ComparisonOperator::Ge => f.write_str(">="),
            ComparisonOperator::Gt => f.write_str(">"),
            ComparisonOperator::Le => f.write_str("<="),
            ComparisonOperator::Lt => f.write_str("<"),
        }
    }
}

/// A node in the expression tree of a filter selector.
///
/// `Or` and `And` are n-ary: `operators[i]` sits between `operands[i]` and
/// `operands[i + 1]`. Likewise `separators[i]` follows `args[i]` in a
/// function call.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Or {
        id: NodeId,
        operands: Vec<FilterExpression>,
        operators: Vec<Token>,
    },
    And {
        id: NodeId,
        operands: Vec<FilterExpression>,
        operators: Vec<Token>,
    },
    Not {
        id: NodeId,
        bang: Token,
        expression: Box<FilterExpression>,
    },
    Comparison {
        id: NodeId,
        left: Box<FilterExpression>,
        operator: Token,
        op: ComparisonOperator,
        right: Box<FilterExpression>,
    },
    Query {
        id: NodeId,
        query: Box<SubQuery>,
    },
    Function {
        id: NodeId,
        name: Token,
        open: Token,
        args: Vec<FilterExpression>,
        separators: Vec<Token>,
        close: Token,
    },
    Literal {
        id: NodeId,
        token: Token,
        value: Value,
    },
    Paren {
        id: NodeId,
        open: Token,
        expression: Box<FilterExpression>,
        close: Token,
    },
    Missing {
        id: NodeId,
        token: Token,
    },
}

impl FilterExpression {
    pub fn id(&self) -> NodeId {
        match self {
            FilterExpression::Or { id, .. }
            | FilterExpression::And { id, .. }
            | FilterExpression::Not { id, .. }
            | FilterExpression::Comparison { id, .. }
            | FilterExpression::Query { id, .. }
            | FilterExpression::Function { id, .. }
            | FilterExpression::Literal { id, .. }
            | FilterExpression::Paren { id, .. }
            | FilterExpression::Missing { id, .. } => *id,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, FilterExpression::Literal { .. })
    }

    /// A relative or absolute query that selects at most one node.
    pub fn is_singular_query(&self) -> bool {
        matches!(self, FilterExpression::Query { query, .. } if query.is_singular())
    }

    /// The function name of a call, as written.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            FilterExpression::Function { name, .. } => Some(&*name.text),
            _ => None,
        }
    }

    pub fn evaluate<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        current: &Rc<Node<'v>>,
    ) -> FilterExpressionResult<'v> {
        let rv = match self {
            FilterExpression::Or { operands, .. } => {
                let mut rv = false;
                for operand in operands {
                    if operand.evaluate(ctx, current).is_truthy() {
                        rv = true;
                        break;
                    }
                }
                FilterExpressionResult::Logical(rv)
            }
            FilterExpression::And { operands, .. } => {
                let mut rv = true;
                for operand in operands {
                    if !operand.evaluate(ctx, current).is_truthy() {
                        rv = false;
                        break;
                    }
                }
                FilterExpressionResult::Logical(rv)
            }
            FilterExpression::Not { expression, .. } => {
                FilterExpressionResult::Logical(!expression.evaluate(ctx, current).is_truthy())
            }
            FilterExpression::Comparison {
                left, op, right, ..
            } => {
                let left = left.evaluate(ctx, current);
                let right = right.evaluate(ctx, current);
                FilterExpressionResult::Logical(compare(left, *op, right))
            }
            FilterExpression::Query { query, .. } => {
                FilterExpressionResult::Nodes(query.select(ctx, Some(current)))
            }
            FilterExpression::Function { name, args, .. } => {
                self.call_function(ctx, current, &name.text, args)
            }
            FilterExpression::Literal { value, .. } => {
                FilterExpressionResult::Value(Cow::Owned(value.clone()))
            }
            FilterExpression::Paren { expression, .. } => expression.evaluate(ctx, current),
            FilterExpression::Missing { .. } => FilterExpressionResult::Nothing,
        };

        ctx.notify(|hooks| hooks.expression_evaluated(self, current, &rv));
        rv
    }

    fn call_function<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        current: &Rc<Node<'v>>,
        name: &str,
        args: &[FilterExpression],
    ) -> FilterExpressionResult<'v> {
        let env = ctx.env;

        let Some(function) = env.functions.get(name) else {
            self.warn(ctx, name, None, format!("unknown function '{}'", name));
            return FilterExpressionResult::Nothing;
        };

        let sig = function.sig();

        if args.len() != sig.param_types.len() {
            self.warn(
                ctx,
                name,
                None,
                format!(
                    "{}() takes {} argument{} but {} were given",
                    name,
                    sig.param_types.len(),
                    if sig.param_types.len() == 1 { "" } else { "s" },
                    args.len()
                ),
            );
            return FilterExpressionResult::empty(sig.return_type);
        }

        let mut coerced = Vec::with_capacity(args.len());

        for (i, (arg, param)) in args.iter().zip(sig.param_types.iter()).enumerate() {
            match arg.evaluate(ctx, current).coerce(*param) {
                Some(rv) => coerced.push(rv),
                None => {
                    self.warn(ctx, name, Some(i), format!("expected an argument of {}", param));
                    return FilterExpressionResult::empty(sig.return_type);
                }
            }
        }

        let mut function_context = FunctionContext::new();
        let rv = function.call(coerced, &mut function_context);

        for (argument, message) in function_context.take_warnings() {
            self.warn(ctx, name, argument, message);
        }

        rv
    }

    fn warn(
        &self,
        ctx: &mut QueryContext<'_, '_>,
        name: &str,
        argument: Option<usize>,
        message: String,
    ) {
        let range = match (self, argument) {
            (FilterExpression::Function { args, .. }, Some(i)) if i < args.len() => {
                SyntaxRef::Expression(&args[i]).range()
            }
            _ => SyntaxRef::Expression(self).range(),
        };

        let warning = FunctionWarning {
            function: name.to_owned(),
            argument,
            message,
            range,
        };

        log::debug!("{}", warning);
        ctx.notify(|hooks| hooks.function_warning(&warning));
    }
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::Or { operands, .. } => write_joined(f, operands, " || "),
            FilterExpression::And { operands, .. } => write_joined(f, operands, " && "),
            FilterExpression::Not { expression, .. } => write!(f, "!{expression}"),
            FilterExpression::Comparison {
                left, op, right, ..
            } => write!(f, "{left} {op} {right}"),
            FilterExpression::Query { query, .. } => write!(f, "{query}"),
            FilterExpression::Function { name, args, .. } => {
                write!(f, "{}(", name.text)?;
                write_joined(f, args, ", ")?;
                f.write_str(")")
            }
            FilterExpression::Literal { value, .. } => write!(f, "{value}"),
            FilterExpression::Paren { expression, .. } => write!(f, "({expression})"),
            FilterExpression::Missing { .. } => Ok(()),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    expressions: &[FilterExpression],
    sep: &str,
) -> fmt::Result {
    for (i, expr) in expressions.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{expr}")?;
    }
    Ok(())
}

/// The result of evaluating a filter expression or function call.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpressionResult<'v> {
    Value(Cow<'v, Value>),
    Nothing,
    Logical(bool),
    Nodes(NodeList<'v>),
}

impl<'v> FilterExpressionResult<'v> {
    pub fn owned(value: Value) -> Self {
        FilterExpressionResult::Value(Cow::Owned(value))
    }

    pub fn borrowed(value: &'v Value) -> Self {
        FilterExpressionResult::Value(Cow::Borrowed(value))
    }

    /// The result a function of the given kind produces when it can't run.
    pub fn empty(kind: ExpressionType) -> Self {
        match kind {
            ExpressionType::Value => FilterExpressionResult::Nothing,
            ExpressionType::Logical => FilterExpressionResult::Logical(false),
            ExpressionType::Nodes => FilterExpressionResult::Nodes(Vec::new()),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            FilterExpressionResult::Logical(b) => *b,
            FilterExpressionResult::Nodes(nodes) => !nodes.is_empty(),
            FilterExpressionResult::Value(_) | FilterExpressionResult::Nothing => false,
        }
    }

    /// Nodes become the value of a lone node, or nothing.
    pub fn into_value(self) -> Self {
        match self {
            FilterExpressionResult::Nodes(nodes) if nodes.len() == 1 => {
                FilterExpressionResult::borrowed(nodes[0].value)
            }
            FilterExpressionResult::Nodes(_) => FilterExpressionResult::Nothing,
            rv => rv,
        }
    }

    /// Convert to a function parameter kind, or `None` when no conversion
    /// exists.
    pub fn coerce(self, kind: ExpressionType) -> Option<Self> {
        match (kind, self) {
            (
                ExpressionType::Value,
                rv @ (FilterExpressionResult::Value(_) | FilterExpressionResult::Nothing),
            ) => Some(rv),
            (ExpressionType::Value, rv @ FilterExpressionResult::Nodes(_)) => Some(rv.into_value()),
            (ExpressionType::Logical, rv @ FilterExpressionResult::Logical(_)) => Some(rv),
            (ExpressionType::Logical, FilterExpressionResult::Nodes(nodes)) => {
                Some(FilterExpressionResult::Logical(!nodes.is_empty()))
            }
            (ExpressionType::Nodes, rv @ FilterExpressionResult::Nodes(_)) => Some(rv),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FilterExpressionResult::Value(v) => Some(v.as_ref()),
            _ => None,
        }
    }
}

fn compare(
    left: FilterExpressionResult,
    op: ComparisonOperator,
    right: FilterExpressionResult,
) -> bool {
    use ComparisonOperator::*;
    let left = left.into_value();
    let right = right.into_value();
    match op {
        Eq => eq(&left, &right),
        Ne => !eq(&left, &right),
        Lt => lt(&left, &right),
        Gt => lt(&right, &left),
        Ge => lt(&right, &left) || eq(&left, &right),
        Le => lt(&left, &right) || eq(&left, &right),
    }
}

fn eq(left: &FilterExpressionResult, right: &FilterExpressionResult) -> bool {
    match (left, right) {
        (FilterExpressionResult::Nothing, FilterExpressionResult::Nothing) => true,
        (FilterExpressionResult::Value(l), FilterExpressionResult::Value(r)) => json_eq(l, r),
        _ => false,
    }
}

fn lt(left: &FilterExpressionResult, right: &FilterExpressionResult) -> bool {
    match (left.as_value(), right.as_value()) {
        (Some(Value::Number(l)), Some(Value::Number(r))) => {
            compare_numbers(l, r) == Some(Ordering::Less)
        }
        (Some(Value::String(l)), Some(Value::String(r))) => l < r,
        _ => false,
    }
}

fn compare_numbers(left: &Number, right: &Number) -> Option<Ordering> {
    if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        return Some(l.cmp(&r));
    }
    if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        return Some(l.cmp(&r));
    }
    left.as_f64()?.partial_cmp(&right.as_f64()?)
}

/// Deep equality in which numbers compare by value, so `1 == 1.0`.
pub fn json_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => compare_numbers(l, r) == Some(Ordering::Equal),
        (Value::Array(l), Value::Array(r)) => {
            l.len() == r.len() && l.iter().zip(r.iter()).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l
                    .iter()
                    .all(|(k, v)| r.get(k).is_some_and(|w| json_eq(v, w)))
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_compare_across_representations() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(json_eq(&json!([1, {"a": 2}]), &json!([1.0, {"a": 2.0}])));
        assert!(!json_eq(&json!(1), &json!("1")));
    }

    #[test]
    fn nothing_equals_only_nothing() {
        use FilterExpressionResult::Nothing;
        let null = || FilterExpressionResult::owned(serde_json::Value::Null);
        assert!(compare(Nothing, ComparisonOperator::Eq, Nothing));
        assert!(!compare(Nothing, ComparisonOperator::Eq, null()));
        assert!(compare(null(), ComparisonOperator::Eq, null()));
        assert!(compare(Nothing, ComparisonOperator::Le, Nothing));
        assert!(!compare(Nothing, ComparisonOperator::Lt, Nothing));
    }

    #[test]
    fn ordering_only_for_numbers_and_strings() {
        let one = || FilterExpressionResult::owned(json!(1));
        let two = || FilterExpressionResult::owned(json!(2.5));
        assert!(compare(one(), ComparisonOperator::Lt, two()));
        assert!(compare(two(), ComparisonOperator::Ge, one()));
        assert!(compare(
            FilterExpressionResult::owned(json!("a")),
            ComparisonOperator::Lt,
            FilterExpressionResult::owned(json!("b"))
        ));
        assert!(!compare(
            FilterExpressionResult::owned(json!(true)),
            ComparisonOperator::Lt,
            FilterExpressionResult::owned(json!(false))
        ));
        assert!(compare(
            FilterExpressionResult::owned(json!(true)),
            ComparisonOperator::Le,
            FilterExpressionResult::owned(json!(true))
        ));
    }

    #[test]
    fn empty_nodes_compare_as_nothing() {
        assert!(compare(
            FilterExpressionResult::Nodes(Vec::new()),
            ComparisonOperator::Eq,
            FilterExpressionResult::Nothing
        ));
    }

    #[test]
    fn coercion() {
        let value = json!(7);
        let nodes = vec![Node::root(&value)];
        assert_eq!(
            FilterExpressionResult::Nodes(nodes.clone()).coerce(ExpressionType::Value),
            Some(FilterExpressionResult::borrowed(&value))
        );
        assert_eq!(
            FilterExpressionResult::Nodes(nodes).coerce(ExpressionType::Logical),
            Some(FilterExpressionResult::Logical(true))
        );
        assert_eq!(
            FilterExpressionResult::owned(json!(1)).coerce(ExpressionType::Nodes),
            None
        );
        assert_eq!(
            FilterExpressionResult::Logical(true).coerce(ExpressionType::Value),
            None
        );
    }
}
