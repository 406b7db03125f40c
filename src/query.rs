use std::{fmt, rc::Rc};

use serde_json::Value;

use crate::{
    checker,
    context::{Instrumentation, QueryContext},
    env::Environment,
    errors::{Diagnostic, JSONPathError},
    jsonpath::ENV,
    node::{Node, NodeList, PathSegment},
    parser,
    segment::Segment,
    token::{NodeId, TextRange, Token},
    tree::{SyntaxRef, Visit},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Starts at the query argument, `$`.
    Absolute,
    /// Starts at the current node of a filter, `@`.
    Relative,
}

/// A root identifier followed by segments. Used both for the query as a
/// whole and for queries embedded in filter expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct SubQuery {
    pub id: NodeId,
    pub kind: QueryKind,
    pub identifier: Token,
    pub segments: Vec<Segment>,
}

impl SubQuery {
    pub fn is_singular(&self) -> bool {
        self.segments.iter().all(|s| s.is_singular())
    }

    /// The location steps of a singular query made of names and
    /// non-negative indices only.
    pub fn singular_path(&self) -> Option<Vec<PathSegment>> {
        self.segments
            .iter()
            .map(|s| {
                if s.is_singular() {
                    s.selectors[0].path_segment()
                } else {
                    None
                }
            })
            .collect()
    }

    /// Evaluate this query. Relative queries start from `current`, absolute
    /// queries (or relative ones with no current node) from the root.
    pub fn select<'v>(
        &self,
        ctx: &mut QueryContext<'v, '_>,
        current: Option<&Rc<Node<'v>>>,
    ) -> NodeList<'v> {
        let seed = match (self.kind, current) {
            (QueryKind::Relative, Some(node)) => Rc::clone(node),
            _ => Node::root(ctx.root),
        };

        let mut nodes: NodeList<'v> = vec![seed];
        let mut buffer: NodeList<'v> = Vec::new();

        for segment in &self.segments {
            buffer.clear();
            for node in &nodes {
                segment.select(ctx, node, &mut buffer);
            }
            std::mem::swap(&mut nodes, &mut buffer);
        }

        ctx.notify(|hooks| hooks.query_evaluated(self, &nodes));
        nodes
    }
}

impl fmt::Display for SubQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            QueryKind::Absolute => f.write_str("$")?,
            QueryKind::Relative => f.write_str("@")?,
        }
        for segment in &self.segments {
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

/// A parsed JSONPath query.
///
/// Parsing never fails. Problems are recorded in `diagnostics`, and the tree
/// holds placeholders wherever something was missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub id: NodeId,
    pub query: SubQuery,
    /// Zero-length, at the end of the source. Its skipped text holds
    /// anything left over after the last segment.
    pub end: Token,
    pub diagnostics: Vec<Diagnostic>,
    pub(crate) node_count: u32,
    pub(crate) length: usize,
}

impl Query {
    /// Parse `expr`, keeping every syntax diagnostic.
    pub fn parse(expr: &str) -> Self {
        parser::parse(expr)
    }

    /// Parse and type check `expr` against `env`, failing on the first error.
    pub fn new(expr: &str, env: &Environment) -> Result<Self, JSONPathError> {
        let query = Query::parse(expr);

        if let Some(diagnostic) = query.diagnostics.iter().find(|d| d.is_error()) {
            return Err(JSONPathError::from(diagnostic));
        }

        if let Some(diagnostic) = checker::check(&query, env)
            .iter()
            .find(|d| d.is_error())
        {
            return Err(JSONPathError::from(diagnostic));
        }

        Ok(query)
    }

    /// Like [`Query::new`], with only the standard function extensions.
    pub fn standard(expr: &str) -> Result<Self, JSONPathError> {
        Query::new(expr, &ENV)
    }

    pub fn find<'v>(&self, value: &'v Value, env: &Environment) -> NodeList<'v> {
        let mut ctx = QueryContext::new(value, env);
        self.select(&mut ctx)
    }

    /// Evaluate with instrumentation hooks.
    pub fn find_with<'v, 'e>(
        &self,
        value: &'v Value,
        env: &'e Environment,
        hooks: &'e mut (dyn Instrumentation<'v> + 'e),
    ) -> NodeList<'v> {
        let mut ctx = QueryContext::with_hooks(value, env, hooks);
        self.select(&mut ctx)
    }

    pub fn select<'v>(&self, ctx: &mut QueryContext<'v, '_>) -> NodeList<'v> {
        self.query.select(ctx, None)
    }

    pub fn is_singular(&self) -> bool {
        self.query.is_singular()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }

    /// Always the whole source text.
    pub fn range(&self) -> TextRange {
        TextRange::new(0, self.length)
    }

    /// One more than the largest `NodeId` in the tree.
    pub fn node_count(&self) -> usize {
        self.node_count as usize
    }

    pub fn syntax(&self) -> SyntaxRef<'_> {
        SyntaxRef::Query(self)
    }

    /// The exact text this query was parsed from.
    pub fn to_source(&self) -> String {
        let mut buf = String::with_capacity(self.length);
        self.syntax().for_each(&mut |node| {
            if let SyntaxRef::Token(token) = node {
                buf.push_str(&token.skipped);
                buf.push_str(&token.text);
            }
            Visit::Continue
        });
        buf
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::node::values;

    #[test]
    fn canonical_display() {
        let q = Query::parse("$.a..b[1, 'c', ::-1, *][?@.x > 1 && !@.y]");
        assert_eq!(
            q.to_string(),
            "$['a']..['b'][1, 'c', ::-1, *][?@['x'] > 1 && !@['y']]"
        );
    }

    #[test]
    fn source_round_trip() {
        let source = " $ .a [ 1 ,  ?@.b== 'x' ]  junk";
        assert_eq!(Query::parse(source).to_source(), source);
    }

    #[test]
    fn singular_path() {
        let q = Query::parse("$.a[0]['b']");
        assert_eq!(
            q.query.singular_path(),
            Some(vec![
                PathSegment::from("a"),
                PathSegment::from(0usize),
                PathSegment::from("b")
            ])
        );
        assert_eq!(Query::parse("$.a[-1]").query.singular_path(), None);
        assert_eq!(Query::parse("$.a.*").query.singular_path(), None);
    }

    #[test]
    fn find_in_document() {
        let value = json!({"a": [{"b": 1}, {"b": 2}, {"c": 3}]});
        let q = Query::standard("$.a[*].b").unwrap();
        let nodes = q.find(&value, &ENV);
        assert_eq!(values(&nodes), vec![&json!(1), &json!(2)]);
    }

    #[test]
    fn standard_rejects_syntax_errors() {
        let err = Query::standard("$.a[").unwrap_err();
        assert_eq!(err.kind, crate::errors::JSONPathErrorType::SyntaxError);
    }
}
