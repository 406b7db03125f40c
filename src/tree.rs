//! Uniform access to the syntax tree.
//!
//! The tree itself is made of typed structs that own their children.
//! [`SyntaxRef`] is a borrowed, copyable handle on any one of them, with
//! position queries and pre-order traversal. [`SyntaxIndex`] adds parent
//! links and lookup by [`NodeId`].
use std::fmt;

use crate::{
    filter::FilterExpression,
    query::{Query, QueryKind, SubQuery},
    segment::{Segment, SegmentKind},
    selector::Selector,
    token::{NodeId, TextRange, Token, TokenType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    Query,
    AbsoluteQuery,
    RelativeQuery,
    ChildSegment,
    DescendantSegment,
    NameSelector,
    IndexSelector,
    SliceSelector,
    WildcardSelector,
    FilterSelector,
    MissingSelector,
    OrExpression,
    AndExpression,
    NotExpression,
    ComparisonExpression,
    QueryExpression,
    FunctionExpression,
    LiteralExpression,
    ParenExpression,
    MissingExpression,
    Token(TokenType),
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxKind::Token(kind) => write!(f, "{kind}"),
            kind => write!(f, "{kind:?}"),
        }
    }
}

/// Returned by a traversal visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// Don't descend into the element just visited.
    SkipChildren,
}

#[derive(Debug, Clone, Copy)]
pub enum SyntaxRef<'q> {
    Query(&'q Query),
    SubQuery(&'q SubQuery),
    Segment(&'q Segment),
    Selector(&'q Selector),
    Expression(&'q FilterExpression),
    Token(&'q Token),
}

impl<'q> SyntaxRef<'q> {
    pub fn id(self) -> NodeId {
        match self {
            SyntaxRef::Query(q) => q.id,
            SyntaxRef::SubQuery(q) => q.id,
            SyntaxRef::Segment(s) => s.id,
            SyntaxRef::Selector(s) => s.id(),
            SyntaxRef::Expression(e) => e.id(),
            SyntaxRef::Token(t) => t.id,
        }
    }

    pub fn kind(self) -> SyntaxKind {
        match self {
            SyntaxRef::Query(_) => SyntaxKind::Query,
            SyntaxRef::SubQuery(q) => match q.kind {
                QueryKind::Absolute => SyntaxKind::AbsoluteQuery,
                QueryKind::Relative => SyntaxKind::RelativeQuery,
            },
            SyntaxRef::Segment(s) => match s.kind {
                SegmentKind::Child => SyntaxKind::ChildSegment,
                SegmentKind::Descendant => SyntaxKind::DescendantSegment,
            },
            SyntaxRef::Selector(s) => match s {
                Selector::Name { .. } => SyntaxKind::NameSelector,
                Selector::Index { .. } => SyntaxKind::IndexSelector,
                Selector::Slice { .. } => SyntaxKind::SliceSelector,
                Selector::Wild { .. } => SyntaxKind::WildcardSelector,
                Selector::Filter { .. } => SyntaxKind::FilterSelector,
                Selector::Missing { .. } => SyntaxKind::MissingSelector,
            },
            SyntaxRef::Expression(e) => match e {
                FilterExpression::Or { .. } => SyntaxKind::OrExpression,
                FilterExpression::And { .. } => SyntaxKind::AndExpression,
                FilterExpression::Not { .. } => SyntaxKind::NotExpression,
                FilterExpression::Comparison { .. } => SyntaxKind::ComparisonExpression,
                FilterExpression::Query { .. } => SyntaxKind::QueryExpression,
                FilterExpression::Function { .. } => SyntaxKind::FunctionExpression,
                FilterExpression::Literal { .. } => SyntaxKind::LiteralExpression,
                FilterExpression::Paren { .. } => SyntaxKind::ParenExpression,
                FilterExpression::Missing { .. } => SyntaxKind::MissingExpression,
            },
            SyntaxRef::Token(t) => SyntaxKind::Token(t.kind),
        }
    }

    pub fn is_token(self) -> bool {
        matches!(self, SyntaxRef::Token(_))
    }

    /// Byte offsets of this element's text. Composites cover their first to
    /// last token; the root query always covers the whole source.
    pub fn range(self) -> TextRange {
        match self {
            SyntaxRef::Query(q) => q.range(),
            SyntaxRef::Token(t) => t.range,
            composite => match (composite.first_token(), composite.last_token()) {
                (Some(first), Some(last)) => first.range.cover(last.range),
                _ => TextRange::default(),
            },
        }
    }

    /// The leftmost token below this element.
    pub fn first_token(self) -> Option<&'q Token> {
        match self {
            SyntaxRef::Query(q) => Some(&q.query.identifier),
            SyntaxRef::SubQuery(q) => Some(&q.identifier),
            SyntaxRef::Segment(s) => match s.dot.as_ref().or(s.open_bracket.as_ref()) {
                Some(token) => Some(token),
                None => SyntaxRef::Selector(s.selectors.first()?).first_token(),
            },
            SyntaxRef::Selector(s) => match s {
                Selector::Name { token, .. }
                | Selector::Index { token, .. }
                | Selector::Wild { token, .. }
                | Selector::Filter { token, .. }
                | Selector::Missing { token, .. } => Some(token),
                Selector::Slice {
                    start_token, colon, ..
                } => Some(start_token.as_ref().unwrap_or(colon)),
            },
            SyntaxRef::Expression(e) => match e {
                FilterExpression::Or { operands, .. } | FilterExpression::And { operands, .. } => {
                    SyntaxRef::Expression(operands.first()?).first_token()
                }
                FilterExpression::Comparison { left, .. } => {
                    SyntaxRef::Expression(left).first_token()
                }
                FilterExpression::Not { bang: token, .. }
                | FilterExpression::Function { name: token, .. }
                | FilterExpression::Literal { token, .. }
                | FilterExpression::Missing { token, .. }
                | FilterExpression::Paren { open: token, .. } => Some(token),
                FilterExpression::Query { query, .. } => Some(&query.identifier),
            },
            SyntaxRef::Token(t) => Some(t),
        }
    }

    /// The rightmost token below this element.
    pub fn last_token(self) -> Option<&'q Token> {
        match self {
            SyntaxRef::Query(q) => Some(&q.end),
            SyntaxRef::SubQuery(q) => match q.segments.last() {
                Some(segment) => SyntaxRef::Segment(segment).last_token(),
                None => Some(&q.identifier),
            },
            SyntaxRef::Segment(s) => match &s.close_bracket {
                Some(token) => Some(token),
                None => SyntaxRef::Selector(s.selectors.last()?).last_token(),
            },
            SyntaxRef::Selector(s) => match s {
                Selector::Name { token, .. }
                | Selector::Index { token, .. }
                | Selector::Wild { token, .. }
                | Selector::Missing { token, .. } => Some(token),
                Selector::Slice {
                    colon,
                    stop_token,
                    step_colon,
                    step_token,
                    ..
                } => Some(
                    step_token
                        .as_ref()
                        .or(step_colon.as_ref())
                        .or(stop_token.as_ref())
                        .unwrap_or(colon),
                ),
                Selector::Filter { expression, .. } => {
                    SyntaxRef::Expression(expression).last_token()
                }
            },
            SyntaxRef::Expression(e) => match e {
                FilterExpression::Or { operands, .. } | FilterExpression::And { operands, .. } => {
                    SyntaxRef::Expression(operands.last()?).last_token()
                }
                FilterExpression::Not { expression, .. } => {
                    SyntaxRef::Expression(expression).last_token()
                }
                FilterExpression::Comparison { right, .. } => {
                    SyntaxRef::Expression(right).last_token()
                }
                FilterExpression::Query { query, .. } => SyntaxRef::SubQuery(query).last_token(),
                FilterExpression::Function { close: token, .. }
                | FilterExpression::Literal { token, .. }
                | FilterExpression::Missing { token, .. }
                | FilterExpression::Paren { close: token, .. } => Some(token),
            },
            SyntaxRef::Token(t) => Some(t),
        }
    }

    /// Direct children in source order.
    pub fn children(self) -> Vec<SyntaxRef<'q>> {
        let mut rv = Vec::new();

        match self {
            SyntaxRef::Query(q) => {
                rv.push(SyntaxRef::SubQuery(&q.query));
                rv.push(SyntaxRef::Token(&q.end));
            }
            SyntaxRef::SubQuery(q) => {
                rv.push(SyntaxRef::Token(&q.identifier));
                rv.extend(q.segments.iter().map(SyntaxRef::Segment));
            }
            SyntaxRef::Segment(s) => {
                rv.extend(s.dot.iter().map(SyntaxRef::Token));
                rv.extend(s.open_bracket.iter().map(SyntaxRef::Token));
                for (i, selector) in s.selectors.iter().enumerate() {
                    rv.push(SyntaxRef::Selector(selector));
                    if let Some(comma) = s.separators.get(i) {
                        rv.push(SyntaxRef::Token(comma));
                    }
                }
                rv.extend(s.close_bracket.iter().map(SyntaxRef::Token));
            }
            SyntaxRef::Selector(s) => match s {
                Selector::Name { token, .. }
                | Selector::Index { token, .. }
                | Selector::Wild { token, .. }
                | Selector::Missing { token, .. } => rv.push(SyntaxRef::Token(token)),
                Selector::Slice {
                    start_token,
                    colon,
                    stop_token,
                    step_colon,
                    step_token,
                    ..
                } => {
                    rv.extend(start_token.iter().map(SyntaxRef::Token));
                    rv.push(SyntaxRef::Token(colon));
                    rv.extend(stop_token.iter().map(SyntaxRef::Token));
                    rv.extend(step_colon.iter().map(SyntaxRef::Token));
                    rv.extend(step_token.iter().map(SyntaxRef::Token));
                }
                Selector::Filter {
                    token, expression, ..
                } => {
                    rv.push(SyntaxRef::Token(token));
                    rv.push(SyntaxRef::Expression(expression));
                }
            },
            SyntaxRef::Expression(e) => match e {
                FilterExpression::Or {
                    operands,
                    operators,
                    ..
                }
                | FilterExpression::And {
                    operands,
                    operators,
                    ..
                } => interleave(&mut rv, operands, operators),
                FilterExpression::Not {
                    bang, expression, ..
                } => {
                    rv.push(SyntaxRef::Token(bang));
                    rv.push(SyntaxRef::Expression(expression));
                }
                FilterExpression::Comparison {
                    left,
                    operator,
                    right,
                    ..
                } => {
                    rv.push(SyntaxRef::Expression(left));
                    rv.push(SyntaxRef::Token(operator));
                    rv.push(SyntaxRef::Expression(right));
                }
                FilterExpression::Query { query, .. } => rv.push(SyntaxRef::SubQuery(query)),
                FilterExpression::Function {
                    name,
                    open,
                    args,
                    separators,
                    close,
                    ..
                } => {
                    rv.push(SyntaxRef::Token(name));
                    rv.push(SyntaxRef::Token(open));
                    interleave(&mut rv, args, separators);
                    rv.push(SyntaxRef::Token(close));
                }
                FilterExpression::Literal { token, .. } | FilterExpression::Missing { token, .. } => {
                    rv.push(SyntaxRef::Token(token))
                }
                FilterExpression::Paren {
                    open,
                    expression,
                    close,
                    ..
                } => {
                    rv.push(SyntaxRef::Token(open));
                    rv.push(SyntaxRef::Expression(expression));
                    rv.push(SyntaxRef::Token(close));
                }
            },
            SyntaxRef::Token(_) => (),
        }

        rv
    }

    /// Pre-order traversal of this element and everything below it.
    pub fn for_each<F>(self, visitor: &mut F)
    where
        F: FnMut(SyntaxRef<'q>) -> Visit,
    {
        if visitor(self) == Visit::SkipChildren {
            return;
        }
        for child in self.children() {
            child.for_each(visitor);
        }
    }

    /// All tokens below this element, in source order.
    pub fn tokens(self) -> Vec<&'q Token> {
        let mut rv = Vec::new();
        self.for_each(&mut |node| {
            if let SyntaxRef::Token(token) = node {
                rv.push(token);
            }
            Visit::Continue
        });
        rv
    }

    /// The innermost element at `pos`, found by repeatedly stepping into the
    /// first child that ends after `pos`.
    pub fn get_at_position(self, pos: usize) -> SyntaxRef<'q> {
        let mut node = self;
        while let Some(child) = node
            .children()
            .into_iter()
            .find(|child| child.range().end > pos)
        {
            node = child;
        }
        node
    }

    /// The innermost element whose range strictly surrounds `pos`.
    pub fn get_containing_at_position(self, pos: usize) -> Option<SyntaxRef<'q>> {
        if !self.range().contains_strictly(pos) {
            return None;
        }

        let mut node = self;
        while let Some(child) = node
            .children()
            .into_iter()
            .find(|child| child.range().contains_strictly(pos))
        {
            node = child;
        }
        Some(node)
    }

    /// Every token whose range touches `pos`, including at either end.
    pub fn get_touching_at_position(self, pos: usize) -> Vec<&'q Token> {
        let mut rv = Vec::new();
        self.for_each(&mut |node| {
            if !node.range().contains_inclusive(pos) {
                return Visit::SkipChildren;
            }
            if let SyntaxRef::Token(token) = node {
                rv.push(token);
            }
            Visit::Continue
        });
        rv
    }
}

fn interleave<'q>(rv: &mut Vec<SyntaxRef<'q>>, items: &'q [FilterExpression], separators: &'q [Token]) {
    for (i, item) in items.iter().enumerate() {
        rv.push(SyntaxRef::Expression(item));
        if let Some(sep) = separators.get(i) {
            rv.push(SyntaxRef::Token(sep));
        }
    }
}

/// Parent links and id lookup for one query, built in a single pass.
pub struct SyntaxIndex<'q> {
    query: &'q Query,
    nodes: Vec<Option<SyntaxRef<'q>>>,
    parents: Vec<Option<NodeId>>,
}

impl<'q> SyntaxIndex<'q> {
    pub fn new(query: &'q Query) -> Self {
        let size = query.node_count();
        let mut index = SyntaxIndex {
            query,
            nodes: vec![None; size],
            parents: vec![None; size],
        };
        index.visit(SyntaxRef::Query(query), None);
        index
    }

    fn visit(&mut self, node: SyntaxRef<'q>, parent: Option<NodeId>) {
        let id = node.id().index();
        if id >= self.nodes.len() {
            self.nodes.resize(id + 1, None);
            self.parents.resize(id + 1, None);
        }
        self.nodes[id] = Some(node);
        self.parents[id] = parent;

        for child in node.children() {
            self.visit(child, Some(node.id()));
        }
    }

    pub fn query(&self) -> &'q Query {
        self.query
    }

    pub fn get(&self, id: NodeId) -> Option<SyntaxRef<'q>> {
        self.nodes.get(id.index()).copied().flatten()
    }

    pub fn parent(&self, id: NodeId) -> Option<SyntaxRef<'q>> {
        self.parents
            .get(id.index())
            .copied()
            .flatten()
            .and_then(|p| self.get(p))
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Vec<SyntaxRef<'q>> {
        let mut rv = Vec::new();
        let mut next = self.parent(id);
        while let Some(node) = next {
            rv.push(node);
            next = self.parent(node.id());
        }
        rv
    }

    /// The segment a selector belongs to.
    pub fn segment_of(&self, selector: &Selector) -> Option<&'q Segment> {
        match self.parent(selector.id()) {
            Some(SyntaxRef::Segment(segment)) => Some(segment),
            _ => None,
        }
    }

    /// The filter selector whose expression contains `id`, if any.
    pub fn enclosing_filter(&self, id: NodeId) -> Option<&'q Selector> {
        self.ancestors(id).into_iter().find_map(|node| match node {
            SyntaxRef::Selector(selector @ Selector::Filter { .. }) => Some(selector),
            _ => None,
        })
    }
}
