//! A fault-tolerant recursive descent parser.
//!
//! Every production returns a node, whatever the input looks like. When the
//! parser meets something it does not expect it records a diagnostic, steps
//! over the offending characters (they end up as skipped text on the next
//! token) and, where a node is required, synthesizes a missing one.
use serde_json::Value;

use crate::{
    cursor::{
        is_function_name_char, is_function_name_first, is_name_char, is_name_first, Cursor,
    },
    filter::{ComparisonOperator, FilterExpression},
    query::{Query, QueryKind, SubQuery},
    segment::{Segment, SegmentKind},
    selector::Selector,
    token::{NodeId, TextRange, Token, TokenType},
    tree::SyntaxRef,
    unescape::unescape,
};

pub(crate) fn parse(source: &str) -> Query {
    let mut parser = Parser {
        c: Cursor::new(source),
    };
    parser.parse_query()
}

struct Parser<'s> {
    c: Cursor<'s>,
}

impl<'s> Parser<'s> {
    fn parse_query(&mut self) -> Query {
        let id = self.c.next_id();
        let sub_id = self.c.next_id();

        let leading = self.c.skip_whitespace();
        if !leading.is_empty() {
            self.c.error("leading whitespace is not allowed", leading);
        }

        let (kind, identifier) = match self.c.peek() {
            Some('$') => (QueryKind::Absolute, self.c.eat(TokenType::Root, 1)),
            Some('@') => {
                let token = self.c.eat(TokenType::Current, 1);
                self.c.error("a query must start with '$'", token.range);
                (QueryKind::Relative, token)
            }
            _ => {
                let message = format!("expected '$', found {}", self.found());
                let range = self.next_range();
                self.c.error(message, range);
                (QueryKind::Absolute, self.c.missing(TokenType::Root))
            }
        };

        let mut segments = self.parse_segments();

        loop {
            let trailing = self.c.skip_whitespace();

            if self.c.is_eof() {
                if !trailing.is_empty() {
                    self.c.error("trailing whitespace is not allowed", trailing);
                }
                break;
            }

            self.c
                .skip_garbage("end of query", |c| c == '.' || c == '[');
            segments.extend(self.parse_segments());
        }

        let end = self.c.token(TokenType::EndOfInput, self.c.pos());

        log::debug!(
            "parsed {:?} with {} diagnostic(s)",
            self.c.source(),
            self.c.diagnostics.len()
        );

        Query {
            id,
            query: SubQuery {
                id: sub_id,
                kind,
                identifier,
                segments,
            },
            end,
            diagnostics: std::mem::take(&mut self.c.diagnostics),
            node_count: self.c.node_count(),
            length: self.c.source().len(),
        }
    }

    fn parse_segments(&mut self) -> Vec<Segment> {
        let mut segments = Vec::new();

        loop {
            let save = self.c.pos();
            self.c.skip_whitespace();

            let segment = if self.c.at("..") {
                self.parse_descendant_segment()
            } else if self.c.at(".") {
                self.parse_dot_segment()
            } else if self.c.at("[") {
                let id = self.c.next_id();
                self.parse_bracketed_segment(id, SegmentKind::Child, None)
            } else {
                self.c.reset(save);
                break;
            };

            segments.push(segment);
        }

        segments
    }

    fn parse_dot_segment(&mut self) -> Segment {
        let id = self.c.next_id();
        let dot = self.c.eat(TokenType::Dot, 1);
        self.no_whitespace_after(&dot);
        let selector = self.parse_shorthand_selector("'.'");

        Segment {
            id,
            kind: SegmentKind::Child,
            dot: Some(dot),
            open_bracket: None,
            selectors: vec![selector],
            separators: Vec::new(),
            close_bracket: None,
        }
    }

    fn parse_descendant_segment(&mut self) -> Segment {
        let id = self.c.next_id();
        let dot = self.c.eat(TokenType::DoubleDot, 2);
        self.no_whitespace_after(&dot);

        if self.c.at("[") {
            return self.parse_bracketed_segment(id, SegmentKind::Descendant, Some(dot));
        }

        let selector = self.parse_shorthand_selector("'..'");

        Segment {
            id,
            kind: SegmentKind::Descendant,
            dot: Some(dot),
            open_bracket: None,
            selectors: vec![selector],
            separators: Vec::new(),
            close_bracket: None,
        }
    }

    fn parse_shorthand_selector(&mut self, after: &str) -> Selector {
        let id = self.c.next_id();

        match self.c.peek() {
            Some('*') => Selector::Wild {
                id,
                token: self.c.eat(TokenType::Wild, 1),
            },
            Some(ch) if is_name_first(ch) => {
                let start = self.c.pos();
                self.c.bump_while(is_name_char);
                let token = self.c.token(TokenType::Name, start);
                Selector::Name {
                    id,
                    name: token.text.to_string(),
                    token,
                }
            }
            _ => {
                let message = format!(
                    "expected a name or '*' after {}, found {}",
                    after,
                    self.found()
                );
                let range = self.next_range();
                self.c.error(message, range);
                Selector::Missing {
                    id,
                    token: self.c.missing(TokenType::Name),
                }
            }
        }
    }

    fn parse_bracketed_segment(
        &mut self,
        id: NodeId,
        kind: SegmentKind,
        dot: Option<Token>,
    ) -> Segment {
        let open = self.c.eat(TokenType::LBracket, 1);
        let mut selectors = Vec::new();
        let mut separators = Vec::new();

        let close = 'selectors: loop {
            self.c.skip_whitespace();
            selectors.push(self.parse_selector());

            loop {
                self.c.skip_whitespace();
                match self.c.peek() {
                    Some(',') => {
                        separators.push(self.c.eat(TokenType::Comma, 1));
                        continue 'selectors;
                    }
                    Some(']') => break 'selectors self.c.eat(TokenType::RBracket, 1),
                    None => {
                        self.c.error("unclosed bracketed selection", open.range);
                        break 'selectors self.c.missing(TokenType::RBracket);
                    }
                    Some(_) => self
                        .c
                        .skip_garbage("',' or ']'", |c| c == ',' || c == ']'),
                }
            }
        };

        Segment {
            id,
            kind,
            dot,
            open_bracket: Some(open),
            selectors,
            separators,
            close_bracket: Some(close),
        }
    }

    fn parse_selector(&mut self) -> Selector {
        match self.c.peek() {
            Some('\'' | '"') => {
                let id = self.c.next_id();
                let (token, name) = self.parse_string_literal();
                Selector::Name { id, token, name }
            }
            Some('*') => {
                let id = self.c.next_id();
                Selector::Wild {
                    id,
                    token: self.c.eat(TokenType::Wild, 1),
                }
            }
            Some('?') => {
                let id = self.c.next_id();
                let token = self.c.eat(TokenType::Filter, 1);
                let expression = self.parse_logical_or();
                Selector::Filter {
                    id,
                    token,
                    expression: Box::new(expression),
                }
            }
            Some(c) if c == '-' || c == ':' || c.is_ascii_digit() => self.parse_index_or_slice(),
            _ => {
                let id = self.c.next_id();
                if matches!(self.c.peek(), None | Some(',') | Some(']')) {
                    let message = format!("expected a selector, found {}", self.found());
                    let range = self.next_range();
                    self.c.error(message, range);
                } else {
                    self.c.skip_garbage("a selector", |c| c == ',' || c == ']');
                }
                Selector::Missing {
                    id,
                    token: self.c.missing(TokenType::Name),
                }
            }
        }
    }

    fn parse_index_or_slice(&mut self) -> Selector {
        let id = self.c.next_id();

        let start = if self.at_int() {
            Some(self.parse_int())
        } else {
            None
        };

        let save = self.c.pos();
        self.c.skip_whitespace();

        match (start, self.c.peek()) {
            (start, Some(':')) => {
                let colon = self.c.eat(TokenType::Colon, 1);
                self.c.skip_whitespace();
                let stop = if self.at_int() {
                    Some(self.parse_int())
                } else {
                    None
                };

                let save = self.c.pos();
                self.c.skip_whitespace();
                let (step_colon, step) = if self.c.at(":") {
                    let step_colon = self.c.eat(TokenType::Colon, 1);
                    self.c.skip_whitespace();
                    let step = if self.at_int() {
                        Some(self.parse_int())
                    } else {
                        None
                    };
                    (Some(step_colon), step)
                } else {
                    self.c.reset(save);
                    (None, None)
                };

                let (start_token, start) = unzip(start);
                let (stop_token, stop) = unzip(stop);
                let (step_token, step) = unzip(step);

                Selector::Slice {
                    id,
                    start,
                    stop,
                    step,
                    start_token,
                    colon,
                    stop_token,
                    step_colon,
                    step_token,
                }
            }
            (Some((token, index)), _) => {
                self.c.reset(save);
                Selector::Index { id, token, index }
            }
            (None, _) => {
                self.c.reset(save);
                Selector::Missing {
                    id,
                    token: self.c.missing(TokenType::Number),
                }
            }
        }
    }

    fn at_int(&self) -> bool {
        matches!(self.c.peek(), Some(c) if c == '-' || c.is_ascii_digit())
    }

    /// An index or slice bound. Out of range values saturate; the type
    /// checker reports anything outside the I-JSON safe range.
    fn parse_int(&mut self) -> (Token, i64) {
        let start = self.c.pos();
        let negative = self.c.at("-");
        if negative {
            self.c.bump();
        }

        let digits_start = self.c.pos();
        let digits = self.c.bump_while(|c| c.is_ascii_digit());
        let digits_end = self.c.pos();
        let digits_text = &self.c.source()[digits_start..digits_end];

        if digits == 0 {
            let message = format!("expected an integer, found {}", self.found());
            self.c.error(message, TextRange::new(start, self.c.pos()));
        } else if digits > 1 && digits_text.starts_with('0') {
            self.c.error(
                "leading zeros are not allowed in indices",
                TextRange::new(start, digits_end),
            );
        } else if negative && digits_text == "0" {
            self.c.error(
                "negative zero is not allowed in indices",
                TextRange::new(start, digits_end),
            );
        }

        let value = if digits == 0 {
            0
        } else {
            self.c.source()[start..digits_end]
                .parse::<i64>()
                .unwrap_or(if negative { i64::MIN } else { i64::MAX })
        };

        if matches!(self.c.peek(), Some('.' | 'e' | 'E')) {
            self.c.bump();
            self.c
                .bump_while(|c| c.is_ascii_digit() || c == '+' || c == '-');
            self.c.error(
                "expected an integer, found a decimal number",
                TextRange::new(start, self.c.pos()),
            );
        }

        (self.c.token(TokenType::Number, start), value)
    }

    fn parse_string_literal(&mut self) -> (Token, String) {
        let start = self.c.pos();
        let quote = self.c.bump().unwrap_or('\'');
        let mut terminated = false;

        loop {
            match self.c.peek() {
                None => break,
                Some('\\') => {
                    self.c.bump();
                    self.c.bump();
                }
                Some(c) if c == quote => {
                    self.c.bump();
                    terminated = true;
                    break;
                }
                Some(_) => {
                    self.c.bump();
                }
            }
        }

        let body_start = start + 1;
        let body_end = if terminated {
            self.c.pos() - 1
        } else {
            self.c.pos()
        };

        if !terminated {
            self.c.error(
                "unclosed string literal",
                TextRange::new(start, self.c.pos()),
            );
        }

        let (value, errors) = unescape(&self.c.source()[body_start..body_end], quote);

        for err in errors {
            self.c.error(
                err.message,
                TextRange::new(body_start + err.start, body_start + err.end),
            );
        }

        (self.c.token(TokenType::String, start), value)
    }

    fn parse_logical_or(&mut self) -> FilterExpression {
        let first = self.parse_logical_and();
        self.c.skip_whitespace();

        if !self.c.at("||") {
            return first;
        }

        let id = self.c.next_id();
        let mut operands = vec![first];
        let mut operators = Vec::new();

        while self.c.at("||") {
            operators.push(self.c.eat(TokenType::Or, 2));
            operands.push(self.parse_logical_and());
            self.c.skip_whitespace();
        }

        FilterExpression::Or {
            id,
            operands,
            operators,
        }
    }

    fn parse_logical_and(&mut self) -> FilterExpression {
        let first = self.parse_logical_not();
        self.c.skip_whitespace();

        if !self.c.at("&&") {
            return first;
        }

        let id = self.c.next_id();
        let mut operands = vec![first];
        let mut operators = Vec::new();

        while self.c.at("&&") {
            operators.push(self.c.eat(TokenType::And, 2));
            operands.push(self.parse_logical_not());
            self.c.skip_whitespace();
        }

        FilterExpression::And {
            id,
            operands,
            operators,
        }
    }

    fn parse_logical_not(&mut self) -> FilterExpression {
        self.c.skip_whitespace();

        if self.c.at("!") && !self.c.at("!=") {
            let id = self.c.next_id();
            let bang = self.c.eat(TokenType::Not, 1);
            let expression = self.parse_logical_not();
            return FilterExpression::Not {
                id,
                bang,
                expression: Box::new(expression),
            };
        }

        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> FilterExpression {
        let left = self.parse_primary();
        self.c.skip_whitespace();

        let Some((kind, op, len)) = self.peek_comparison_operator() else {
            return left;
        };

        let id = self.c.next_id();
        let operator = self.c.eat(kind, len);
        if &*operator.text == "=" {
            self.c.error("expected '==', found '='", operator.range);
        }

        let right = self.parse_primary();

        self.check_comparable(&left);
        self.check_comparable(&right);

        FilterExpression::Comparison {
            id,
            left: Box::new(left),
            operator,
            op,
            right: Box::new(right),
        }
    }

    fn peek_comparison_operator(&self) -> Option<(TokenType, ComparisonOperator, usize)> {
        let (kind, len) = if self.c.at("==") {
            (TokenType::Eq, 2)
        } else if self.c.at("!=") {
            (TokenType::Ne, 2)
        } else if self.c.at("<=") {
            (TokenType::Le, 2)
        } else if self.c.at(">=") {
            (TokenType::Ge, 2)
        } else if self.c.at("<") {
            (TokenType::Lt, 1)
        } else if self.c.at(">") {
            (TokenType::Gt, 1)
        } else if self.c.at("=") {
            (TokenType::Eq, 1)
        } else {
            return None;
        };

        ComparisonOperator::from_token_type(kind).map(|op| (kind, op, len))
    }

    fn check_comparable(&mut self, expression: &FilterExpression) {
        let message = match expression {
            FilterExpression::Paren { .. } => "parenthesized expressions are not comparable",
            FilterExpression::Not { .. } => "negated expressions are not comparable",
            FilterExpression::Query { query, .. } if !query.is_singular() => {
                "non-singular query is not comparable"
            }
            _ => return,
        };

        let range = SyntaxRef::Expression(expression).range();
        self.c.error(message, range);
    }

    fn parse_primary(&mut self) -> FilterExpression {
        self.c.skip_whitespace();

        match self.c.peek() {
            Some('(') => {
                let id = self.c.next_id();
                let open = self.c.eat(TokenType::LParen, 1);
                let expression = self.parse_logical_or();
                self.c.skip_whitespace();
                let close = if self.c.at(")") {
                    self.c.eat(TokenType::RParen, 1)
                } else {
                    self.c.error("unbalanced parentheses", open.range);
                    self.c.missing(TokenType::RParen)
                };
                FilterExpression::Paren {
                    id,
                    open,
                    expression: Box::new(expression),
                    close,
                }
            }
            Some('!') if !self.c.at("!=") => {
                let id = self.c.next_id();
                let bang = self.c.eat(TokenType::Not, 1);
                let expression = self.parse_primary();
                FilterExpression::Not {
                    id,
                    bang,
                    expression: Box::new(expression),
                }
            }
            Some(c @ ('$' | '@')) => {
                let id = self.c.next_id();
                let sub_id = self.c.next_id();
                let (kind, identifier) = if c == '$' {
                    (QueryKind::Absolute, self.c.eat(TokenType::Root, 1))
                } else {
                    (QueryKind::Relative, self.c.eat(TokenType::Current, 1))
                };
                let segments = self.parse_segments();
                FilterExpression::Query {
                    id,
                    query: Box::new(SubQuery {
                        id: sub_id,
                        kind,
                        identifier,
                        segments,
                    }),
                }
            }
            Some('\'' | '"') => {
                let id = self.c.next_id();
                let (token, value) = self.parse_string_literal();
                FilterExpression::Literal {
                    id,
                    token,
                    value: Value::String(value),
                }
            }
            Some(c) if c == '-' || c.is_ascii_digit() => self.parse_number_literal(),
            Some(c) if is_function_name_first(c) => self.parse_function_or_keyword(),
            _ => {
                let id = self.c.next_id();
                let message = format!("expected a filter expression, found {}", self.found());
                let range = self.next_range();
                self.c.error(message, range);
                FilterExpression::Missing {
                    id,
                    token: self.c.missing(TokenType::Name),
                }
            }
        }
    }

    fn parse_number_literal(&mut self) -> FilterExpression {
        let id = self.c.next_id();
        let start = self.c.pos();

        if self.c.at("-") {
            self.c.bump();
        }

        let int_start = self.c.pos();
        let digits = self.c.bump_while(|c| c.is_ascii_digit());

        if digits == 0 {
            let message = format!("expected a number, found {}", self.found());
            self.c.error(message, TextRange::new(start, self.c.pos()));
        } else if digits > 1 && self.c.source()[int_start..].starts_with('0') {
            self.c.error(
                "leading zeros are not allowed in numbers",
                TextRange::new(start, self.c.pos()),
            );
        }

        if self.c.at(".") {
            self.c.bump();
            if self.c.bump_while(|c| c.is_ascii_digit()) == 0 {
                self.c.error(
                    "expected a digit after the decimal point",
                    TextRange::new(start, self.c.pos()),
                );
            }
        }

        if matches!(self.c.peek(), Some('e' | 'E')) {
            self.c.bump();
            if matches!(self.c.peek(), Some('+' | '-')) {
                self.c.bump();
            }
            if self.c.bump_while(|c| c.is_ascii_digit()) == 0 {
                self.c.error(
                    "expected a digit in the exponent",
                    TextRange::new(start, self.c.pos()),
                );
            }
        }

        let token = self.c.token(TokenType::Number, start);
        let value = serde_json::from_str::<Value>(&token.text)
            .ok()
            .filter(Value::is_number)
            .unwrap_or(Value::from(0));

        FilterExpression::Literal { id, token, value }
    }

    fn parse_function_or_keyword(&mut self) -> FilterExpression {
        let id = self.c.next_id();
        let start = self.c.pos();
        self.c.bump_while(is_function_name_char);
        let name_end = self.c.pos();

        self.c.skip_whitespace();
        let is_call = self.c.at("(");
        self.c.reset(name_end);

        if is_call {
            let name = self.c.token(TokenType::Function, start);
            let gap = self.c.skip_whitespace();
            if !gap.is_empty() {
                self.c.error(
                    "whitespace is not allowed between a function name and '('",
                    gap,
                );
            }
            return self.parse_function_call(id, name);
        }

        let keyword = match &self.c.source()[start..name_end] {
            "true" => Some((TokenType::True, Value::Bool(true))),
            "false" => Some((TokenType::False, Value::Bool(false))),
            "null" => Some((TokenType::Null, Value::Null)),
            _ => None,
        };

        match keyword {
            Some((kind, value)) => FilterExpression::Literal {
                id,
                token: self.c.token(kind, start),
                value,
            },
            None => {
                // Leave the name to be skipped by the placeholder.
                let name = &self.c.source()[start..name_end];
                self.c.error(
                    format!("expected a filter expression, found '{}'", name),
                    TextRange::new(start, name_end),
                );
                FilterExpression::Missing {
                    id,
                    token: self.c.missing(TokenType::Name),
                }
            }
        }
    }

    fn parse_function_call(&mut self, id: NodeId, name: Token) -> FilterExpression {
        let open = self.c.eat(TokenType::LParen, 1);
        let mut args = Vec::new();
        let mut separators = Vec::new();

        self.c.skip_whitespace();

        let close = if self.c.at(")") {
            self.c.eat(TokenType::RParen, 1)
        } else {
            'args: loop {
                args.push(self.parse_logical_or());

                loop {
                    self.c.skip_whitespace();
                    match self.c.peek() {
                        Some(',') => {
                            separators.push(self.c.eat(TokenType::Comma, 1));
                            continue 'args;
                        }
                        Some(')') => break 'args self.c.eat(TokenType::RParen, 1),
                        None | Some(']') => {
                            self.c.error("unbalanced parentheses", open.range);
                            break 'args self.c.missing(TokenType::RParen);
                        }
                        Some(_) => self.c.skip_garbage("',' or ')'", |c| {
                            c == ',' || c == ')' || c == ']'
                        }),
                    }
                }
            }
        };

        FilterExpression::Function {
            id,
            name,
            open,
            args,
            separators,
            close,
        }
    }

    fn no_whitespace_after(&mut self, token: &Token) {
        let ws = self.c.skip_whitespace();
        if !ws.is_empty() {
            self.c
                .error(format!("whitespace is not allowed after {}", token.kind), ws);
        }
    }

    /// Describe the next character for a diagnostic.
    fn found(&self) -> String {
        match self.c.peek() {
            Some(ch) => format!("'{}'", ch),
            None => String::from("end of query"),
        }
    }

    fn next_range(&self) -> TextRange {
        let pos = self.c.pos();
        match self.c.peek() {
            Some(ch) => TextRange::new(pos, pos + ch.len_utf8()),
            None => TextRange::empty(pos),
        }
    }
}

fn unzip(bound: Option<(Token, i64)>) -> (Option<Token>, Option<i64>) {
    match bound {
        Some((token, value)) => (Some(token), Some(value)),
        None => (None, None),
    }
}
