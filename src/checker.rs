//! Well-typedness checks for filter expressions.
//!
//! Runs over an already parsed tree and never changes it. Everything found is
//! reported as a diagnostic; nothing stops at the first problem.
use crate::{
    env::Environment,
    errors::Diagnostic,
    filter::FilterExpression,
    function::{ExpressionType, FunctionSignature},
    query::{Query, SubQuery},
    selector::Selector,
    token::{TextRange, Token},
    tree::SyntaxRef,
};

pub fn check(query: &Query, env: &Environment) -> Vec<Diagnostic> {
    let mut checker = Checker {
        env,
        diagnostics: Vec::new(),
    };

    checker.check_query(&query.query);

    log::debug!(
        "type checked {} with {} diagnostic(s)",
        query,
        checker.diagnostics.len()
    );

    checker.diagnostics
}

struct Checker<'e> {
    env: &'e Environment,
    diagnostics: Vec<Diagnostic>,
}

fn range_of(expression: &FilterExpression) -> TextRange {
    SyntaxRef::Expression(expression).range()
}

impl<'e> Checker<'e> {
    fn check_query(&mut self, query: &SubQuery) {
        for segment in &query.segments {
            for selector in &segment.selectors {
                self.check_selector(selector);
            }
        }
    }

    fn check_selector(&mut self, selector: &Selector) {
        match selector {
            Selector::Index { index, token, .. } => self.check_index(*index, token),
            Selector::Slice {
                start,
                stop,
                step,
                start_token,
                stop_token,
                step_token,
                ..
            } => {
                for (value, token) in [(start, start_token), (stop, stop_token), (step, step_token)]
                {
                    if let (Some(value), Some(token)) = (value, token) {
                        self.check_index(*value, token);
                    }
                }
            }
            Selector::Filter { expression, .. } => self.check_test(expression),
            Selector::Name { .. } | Selector::Wild { .. } | Selector::Missing { .. } => (),
        }
    }

    fn check_index(&mut self, value: i64, token: &Token) {
        if token.is_missing() {
            return;
        }

        if value < self.env.min_index || value > self.env.max_index {
            self.diagnostics.push(Diagnostic::typ(
                format!("index out of range '{}'", token.text),
                token.range,
            ));
        }
    }

    /// An expression in a position where its truth value is used.
    fn check_test(&mut self, expression: &FilterExpression) {
        match expression {
            FilterExpression::Literal { .. } => self.diagnostics.push(Diagnostic::typ(
                "filter expression literals must be compared",
                range_of(expression),
            )),
            FilterExpression::Function { name, args, .. } => {
                self.check_expression(expression);

                // A call with the wrong arity has already been reported.
                if let Some(FunctionSignature {
                    param_types,
                    return_type: ExpressionType::Value,
                    ..
                }) = self.env.signature(&name.text)
                {
                    if param_types.len() == args.len() {
                        self.diagnostics.push(Diagnostic::typ(
                            format!("result of {}() must be compared", name.text),
                            range_of(expression),
                        ));
                    }
                }
            }
            _ => self.check_expression(expression),
        }
    }

    fn check_expression(&mut self, expression: &FilterExpression) {
        match expression {
            FilterExpression::Or { operands, .. } | FilterExpression::And { operands, .. } => {
                for operand in operands {
                    self.check_test(operand);
                }
            }
            FilterExpression::Not { expression, .. }
            | FilterExpression::Paren { expression, .. } => self.check_test(expression),
            FilterExpression::Comparison { left, right, .. } => {
                self.check_comparable(left);
                self.check_comparable(right);
            }
            FilterExpression::Query { query, .. } => self.check_query(query),
            FilterExpression::Function { name, args, .. } => {
                self.check_function(expression, name, args)
            }
            FilterExpression::Literal { .. } | FilterExpression::Missing { .. } => (),
        }
    }

    fn check_comparable(&mut self, expression: &FilterExpression) {
        if let FilterExpression::Function { name, .. } = expression {
            match self.env.signature(&name.text) {
                Some(FunctionSignature {
                    return_type: ExpressionType::Value,
                    ..
                })
                | None => (),
                Some(_) => self.diagnostics.push(Diagnostic::typ(
                    format!("result of {}() is not comparable", name.text),
                    range_of(expression),
                )),
            }
        }

        // Non-singular queries are reported by the parser.
        self.check_expression(expression);
    }

    fn check_function(
        &mut self,
        call: &FilterExpression,
        name: &Token,
        args: &[FilterExpression],
    ) {
        for arg in args {
            self.check_expression(arg);
        }

        if name.is_missing() {
            return;
        }

        let Some(sig) = self.env.signature(&name.text) else {
            self.diagnostics.push(Diagnostic::name(
                format!("unknown function '{}'", name.text),
                name.range,
            ));
            return;
        };

        if args.len() != sig.param_types.len() {
            self.diagnostics.push(Diagnostic::typ(
                format!(
                    "{}() takes {} argument{} but {} were given",
                    name.text,
                    sig.param_types.len(),
                    if sig.param_types.len() == 1 { "" } else { "s" },
                    args.len()
                ),
                range_of(call),
            ));
            return;
        }

        for (i, (arg, param)) in args.iter().zip(sig.param_types.iter()).enumerate() {
            if !self.accepts(*param, arg) {
                self.diagnostics.push(Diagnostic::typ(
                    format!(
                        "argument {} of {}() must be of a {}",
                        i + 1,
                        name.text,
                        param
                    ),
                    range_of(arg),
                ));
            }
        }
    }

    /// True when `arg` can be passed for a parameter of kind `param`. Calls to
    /// unknown functions are accepted, they are reported elsewhere.
    fn accepts(&self, param: ExpressionType, arg: &FilterExpression) -> bool {
        let returns = match arg {
            FilterExpression::Function { name, .. } => match self.env.signature(&name.text) {
                Some(sig) => Some(sig.return_type),
                None => return true,
            },
            _ => None,
        };

        match param {
            ExpressionType::Value => match arg {
                FilterExpression::Literal { .. } | FilterExpression::Missing { .. } => true,
                FilterExpression::Query { query, .. } => query.is_singular(),
                _ => returns == Some(ExpressionType::Value),
            },
            ExpressionType::Logical => match arg {
                FilterExpression::Query { .. }
                | FilterExpression::Or { .. }
                | FilterExpression::And { .. }
                | FilterExpression::Not { .. }
                | FilterExpression::Comparison { .. }
                | FilterExpression::Paren { .. }
                | FilterExpression::Missing { .. } => true,
                _ => matches!(
                    returns,
                    Some(ExpressionType::Logical) | Some(ExpressionType::Nodes)
                ),
            },
            ExpressionType::Nodes => match arg {
                FilterExpression::Query { .. } | FilterExpression::Missing { .. } => true,
                _ => returns == Some(ExpressionType::Nodes),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DiagnosticKind;

    fn messages(expr: &str) -> Vec<String> {
        let query = Query::parse(expr);
        check(&query, &Environment::standard())
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn well_typed_queries() {
        for expr in [
            "$[?length(@) < 3]",
            "$[?count(@.*) == 1]",
            "$[?match(@.timezone, 'Europe/.*')]",
            "$[?value(@..color) == 'red']",
            "$[?!search(@.a, 'b') || @.c]",
            "$[0, -1, 1:2:-1]",
        ] {
            assert!(messages(expr).is_empty(), "{expr}");
        }
    }

    #[test]
    fn unknown_function() {
        let query = Query::parse("$[?nosuchthing(@.a)]");
        let diagnostics = check(&query, &Environment::standard());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, DiagnosticKind::Name);
        assert_eq!(diagnostics[0].message, "unknown function 'nosuchthing'");
        assert_eq!(diagnostics[0].range, TextRange::new(3, 14));
    }

    #[test]
    fn arity() {
        assert_eq!(
            messages("$[?count()]"),
            vec!["count() takes 1 argument but 0 were given"]
        );
        assert_eq!(
            messages("$[?match(@.a)]"),
            vec!["match() takes 2 arguments but 1 were given"]
        );
        assert_eq!(
            messages("$[?count(@.a, @.b)]"),
            vec!["count() takes 1 argument but 2 were given"]
        );
        assert_eq!(
            messages("$[?@.a || length()]"),
            vec!["length() takes 1 argument but 0 were given"]
        );
    }

    #[test]
    fn arity_error_is_the_first_error() {
        let err = Query::new("$[?count()]", &Environment::standard()).unwrap_err();
        assert_eq!(err.msg, "count() takes 1 argument but 0 were given");
        assert_eq!(err.span, TextRange::new(3, 10));
    }

    #[test]
    fn argument_kinds() {
        assert_eq!(
            messages("$[?count(1) == 1]"),
            vec!["argument 1 of count() must be of a NodesType"]
        );
        assert_eq!(
            messages("$[?length(@.*) < 3]"),
            vec!["argument 1 of length() must be of a ValueType"]
        );
    }

    #[test]
    fn tests_and_comparisons() {
        assert_eq!(
            messages("$[?1]"),
            vec!["filter expression literals must be compared"]
        );
        assert_eq!(
            messages("$[?@.a && value(@.b)]"),
            vec!["result of value() must be compared"]
        );
        assert_eq!(
            messages("$[?match(@.a, 'b') == true]"),
            vec!["result of match() is not comparable"]
        );
    }

    #[test]
    fn index_range() {
        assert_eq!(
            messages("$[9007199254740992]"),
            vec!["index out of range '9007199254740992'"]
        );
        assert_eq!(
            messages("$[:-9007199254740992]"),
            vec!["index out of range '-9007199254740992'"]
        );
        assert!(messages("$[9007199254740991]").is_empty());
    }
}
