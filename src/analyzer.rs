//! Static type inference over a parsed query.
//!
//! A [`TypeAnalyzer`] answers "what could this syntax element produce?" for
//! every element of one query, given the type of the document the query
//! will run against. Answers are computed on demand and remembered per
//! [`NodeId`].
use crate::{
    env::Environment,
    filter::{ComparisonOperator, FilterExpression},
    node::PathSegment,
    query::{Query, QueryKind, SubQuery},
    segment::Segment,
    selector::Selector,
    token::{NodeId, Token, TokenType},
    tree::{SyntaxIndex, SyntaxRef},
    types::{DataType, TypeKind},
};

pub struct TypeAnalyzer<'q> {
    index: SyntaxIndex<'q>,
    root_type: DataType,
    env: &'q Environment,
    cache: Vec<Option<DataType>>,
}

impl<'q> TypeAnalyzer<'q> {
    pub fn new(query: &'q Query, root_type: DataType, env: &'q Environment) -> Self {
        TypeAnalyzer {
            index: SyntaxIndex::new(query),
            root_type,
            env,
            cache: vec![None; query.node_count()],
        }
    }

    pub fn query(&self) -> &'q Query {
        self.index.query()
    }

    pub fn index(&self) -> &SyntaxIndex<'q> {
        &self.index
    }

    pub fn root_type(&self) -> &DataType {
        &self.root_type
    }

    /// The type of the syntax element with id `id`.
    ///
    /// For queries, segments and selectors this is the type of the values
    /// they select. Filter expressions have the type of their result, and
    /// `$`/`@` the type of the value they stand for. Other tokens share the
    /// type of the element they belong to.
    pub fn get_type(&mut self, id: NodeId) -> DataType {
        if let Some(Some(t)) = self.cache.get(id.index()) {
            return t.clone();
        }

        let t = match self.index.get(id) {
            Some(node) => self.compute(node),
            None => DataType::never(),
        };

        if let Some(slot) = self.cache.get_mut(id.index()) {
            *slot = Some(t.clone());
        }

        t
    }

    /// The type of the values a segment is applied to. For a descendant
    /// segment that includes everything nested below them.
    pub fn get_incoming_type_to_segment(&mut self, segment: &Segment) -> DataType {
        let Some(SyntaxRef::SubQuery(query)) = self.index.parent(segment.id) else {
            return DataType::never();
        };

        let before = match query.segments.iter().position(|s| s.id == segment.id) {
            Some(i) if i > 0 => self.get_type(query.segments[i - 1].id),
            _ => self.get_type(query.identifier.id),
        };

        if segment.is_descendant() {
            let below = before.descendant_type();
            DataType::union([before, below])
        } else {
            before
        }
    }

    /// The type of the candidates a filter selector tests, before narrowing.
    pub fn get_candidate_type(&mut self, filter: &Selector) -> DataType {
        match self.index.segment_of(filter) {
            Some(segment) => self.get_incoming_type_to_segment(segment).children_type(),
            None => DataType::never(),
        }
    }

    fn compute(&mut self, node: SyntaxRef<'q>) -> DataType {
        match node {
            SyntaxRef::Query(query) => self.get_type(query.query.id),
            SyntaxRef::SubQuery(query) => self.sub_query_type(query),
            SyntaxRef::Segment(segment) => {
                let types: Vec<DataType> = segment
                    .selectors
                    .iter()
                    .map(|s| self.get_type(s.id()))
                    .collect();
                DataType::union(types)
            }
            SyntaxRef::Selector(selector) => self.selector_type(selector),
            SyntaxRef::Expression(expression) => self.expression_type(expression),
            SyntaxRef::Token(token) => self.token_type(token),
        }
    }

    fn sub_query_type(&mut self, query: &SubQuery) -> DataType {
        match query.segments.last() {
            Some(segment) => self.get_type(segment.id),
            None => self.get_type(query.identifier.id),
        }
    }

    fn token_type(&mut self, token: &Token) -> DataType {
        match token.kind {
            TokenType::Root => self.root_type.clone(),
            TokenType::Current => match self.index.enclosing_filter(token.id) {
                Some(filter) => self.get_candidate_type(filter),
                None => self.root_type.clone(),
            },
            _ => match self.index.parent(token.id) {
                Some(parent) => self.get_type(parent.id()),
                None => DataType::never(),
            },
        }
    }

    fn selector_type(&mut self, selector: &Selector) -> DataType {
        let incoming = match self.index.segment_of(selector) {
            Some(segment) => self.get_incoming_type_to_segment(segment),
            None => return DataType::never(),
        };

        match selector {
            Selector::Name { name, .. } => present(
                incoming.get_type_at_path_segment(&PathSegment::Name(name.to_owned())),
            ),
            Selector::Index { index, .. } => match usize::try_from(*index) {
                Ok(i) => present(incoming.get_type_at_path_segment(&PathSegment::Index(i))),
                Err(_) => array_elements(&incoming),
            },
            Selector::Slice { .. } => array_elements(&incoming),
            Selector::Wild { .. } => incoming.children_type(),
            Selector::Filter { expression, .. } => {
                let candidates = incoming.children_type();
                self.narrow(expression, candidates, true)
            }
            Selector::Missing { .. } => DataType::never(),
        }
    }

    fn expression_type(&mut self, expression: &FilterExpression) -> DataType {
        match expression {
            FilterExpression::Literal { value, .. } => DataType::literal(value.clone()),
            FilterExpression::Query { query, .. } => self.get_type(query.id),
            FilterExpression::Function { name, .. } => self
                .env
                .signature(&name.text)
                .map(|sig| sig.return_data_type)
                .unwrap_or_else(DataType::any),
            FilterExpression::Missing { .. } => DataType::never(),
            FilterExpression::Or { .. }
            | FilterExpression::And { .. }
            | FilterExpression::Not { .. }
            | FilterExpression::Comparison { .. }
            | FilterExpression::Paren { .. } => DataType::boolean(),
        }
    }

    /// Restrict `t` to the candidates for which `expression` evaluates to
    /// `assume`.
    pub fn narrow(&mut self, expression: &FilterExpression, t: DataType, assume: bool) -> DataType {
        match expression {
            FilterExpression::And { operands, .. } => self.narrow_all(operands, t, assume, true),
            FilterExpression::Or { operands, .. } => self.narrow_all(operands, t, assume, false),
            FilterExpression::Not { expression, .. } => self.narrow(expression, t, !assume),
            FilterExpression::Paren { expression, .. } => self.narrow(expression, t, assume),
            FilterExpression::Comparison {
                left, op, right, ..
            } => self.narrow_comparison(left, *op, right, t, assume),
            FilterExpression::Query { query, .. } => match relative_path(query) {
                Some(path) if assume => t.set_path_existence(&path),
                Some(path) => {
                    t.change_type_at_path(&path, &|x| x.intersect(&DataType::nothing()))
                }
                None => t,
            },
            FilterExpression::Function { .. }
            | FilterExpression::Literal { .. }
            | FilterExpression::Missing { .. } => t,
        }
    }

    /// `&&` when `conjunction`, otherwise `||`. Every operand has to hold for
    /// a true conjunction or a false disjunction, so those intersect; the
    /// other two cases union.
    fn narrow_all(
        &mut self,
        operands: &[FilterExpression],
        t: DataType,
        assume: bool,
        conjunction: bool,
    ) -> DataType {
        let narrowed: Vec<DataType> = operands
            .iter()
            .map(|op| self.narrow(op, t.clone(), assume))
            .collect();

        if assume == conjunction {
            narrowed
                .into_iter()
                .reduce(|acc, n| acc.intersect(&n))
                .unwrap_or(t)
        } else {
            DataType::union(narrowed)
        }
    }

    fn narrow_comparison(
        &mut self,
        left: &FilterExpression,
        op: ComparisonOperator,
        right: &FilterExpression,
        t: DataType,
        assume: bool,
    ) -> DataType {
        let (path, other, op) = match (operand_path(left), operand_path(right)) {
            (Some(path), _) => (path, right, op),
            (None, Some(path)) => (path, left, mirror(op)),
            (None, None) => return t,
        };

        match op {
            ComparisonOperator::Eq | ComparisonOperator::Ne => {
                let other_type = self.get_type(other.id());
                let equal = (op == ComparisonOperator::Eq) == assume;

                if equal {
                    let narrowed = t.change_type_at_path(&path, &|x| x.intersect(&other_type));
                    if other_type.may_be_nothing() {
                        narrowed
                    } else {
                        narrowed.set_path_existence(&path)
                    }
                } else if other_type.is_singleton() {
                    t.change_type_at_path(&path, &|x| x.subtract(&other_type))
                } else {
                    t
                }
            }
            // Nothing is never ordered, so a true ordering means the value
            // is there.
            _ if assume => t.set_path_existence(&path),
            _ => t,
        }
    }
}

fn operand_path(expression: &FilterExpression) -> Option<Vec<PathSegment>> {
    match expression {
        FilterExpression::Query { query, .. } => relative_path(query),
        _ => None,
    }
}

fn relative_path(query: &SubQuery) -> Option<Vec<PathSegment>> {
    match query.kind {
        QueryKind::Relative => query.singular_path(),
        QueryKind::Absolute => None,
    }
}

fn mirror(op: ComparisonOperator) -> ComparisonOperator {
    match op {
        ComparisonOperator::Lt => ComparisonOperator::Gt,
        ComparisonOperator::Gt => ComparisonOperator::Lt,
        ComparisonOperator::Le => ComparisonOperator::Ge,
        ComparisonOperator::Ge => ComparisonOperator::Le,
        op => op,
    }
}

/// Drop the possibility of a missing member; a selector only outputs members
/// that exist.
fn present(t: DataType) -> DataType {
    t.subtract(&DataType::nothing())
}

fn array_elements(t: &DataType) -> DataType {
    match t.kind() {
        TypeKind::Any => DataType::any(),
        TypeKind::Union(members) => DataType::union(members.iter().map(array_elements)),
        TypeKind::Array(_) => t.children_type(),
        _ => DataType::never(),
    }
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use serde_json::json;

    use super::*;
    use crate::jsonpath::ENV;

    fn user() -> DataType {
        let mut properties = IndexMap::new();
        properties.insert(
            "role".to_owned(),
            DataType::union([
                DataType::literal(json!("admin")),
                DataType::literal(json!("guest")),
            ]),
        );
        properties.insert("bannedCount".to_owned(), DataType::number());
        DataType::object(properties, DataType::never(), ["role".to_owned()])
    }

    fn type_of(expr: &str, root: DataType) -> String {
        let query = Query::parse(expr);
        let mut analyzer = TypeAnalyzer::new(&query, root, &ENV);
        analyzer.get_type(query.id).to_string()
    }

    #[test]
    fn paths() {
        let root = DataType::from_value(&json!({"a": [1, "x"], "b": {"c": true}}));
        assert_eq!(type_of("$.a[0]", root.clone()), "1");
        assert_eq!(type_of("$.a[-1]", root.clone()), "1 | \"x\"");
        assert_eq!(type_of("$.a[0:1]", root.clone()), "1 | \"x\"");
        assert_eq!(type_of("$.b.*", root.clone()), "true");
        assert_eq!(type_of("$.nope", root.clone()), "never");
        assert_eq!(type_of("$", root), "{a: [1, \"x\"], b: {c: true}}");
    }

    #[test]
    fn optional_members_are_present_once_selected() {
        assert_eq!(type_of("$.bannedCount", user()), "number");
    }

    #[test]
    fn descendants() {
        let root = DataType::from_value(&json!({"a": {"b": 1}}));
        assert_eq!(type_of("$..b", root.clone()), "1");
        assert_eq!(type_of("$..*", root), "{b: 1} | 1");
    }

    #[test]
    fn equality_narrows_both_ways() {
        let root = DataType::array_of(user());
        assert_eq!(
            type_of("$[?@.role == 'admin']", root.clone()),
            "{role: \"admin\", bannedCount?: number}"
        );
        assert_eq!(
            type_of("$[?@.role != 'admin']", root.clone()),
            "{role: \"guest\", bannedCount?: number}"
        );
        assert_eq!(
            type_of("$[?!(@.role == 'admin')]", root),
            "{role: \"guest\", bannedCount?: number}"
        );
    }

    #[test]
    fn existence_narrows() {
        let root = DataType::array_of(user());
        assert_eq!(
            type_of("$[?@.bannedCount]", root.clone()),
            "{role: \"admin\" | \"guest\", bannedCount: number}"
        );
        assert_eq!(
            type_of("$[?@.bannedCount > 1]", root.clone()),
            "{role: \"admin\" | \"guest\", bannedCount: number}"
        );
        assert_eq!(
            type_of("$[?!@.bannedCount]", root.clone()),
            "{role: \"admin\" | \"guest\", bannedCount?: never}"
        );
        assert_eq!(type_of("$[?!@.role]", root), "never");
    }

    #[test]
    fn logical_operators() {
        let root = DataType::array_of(user());
        assert_eq!(
            type_of("$[?@.role == 'admin' && @.bannedCount]", root.clone()),
            "{role: \"admin\", bannedCount: number}"
        );
        assert_eq!(
            type_of("$[?@.role == 'admin' || @.role == 'guest']", root.clone()),
            "{role: \"admin\", bannedCount?: number} | {role: \"guest\", bannedCount?: number}"
        );
        assert_eq!(
            type_of("$[?@.role == 'admin' || @.role == 'nobody']", root),
            "{role: \"admin\", bannedCount?: number}"
        );
    }

    #[test]
    fn current_node_and_functions() {
        let query = Query::parse("$[?length(@.role) > 1]");
        let mut analyzer = TypeAnalyzer::new(&query, DataType::array_of(user()), &ENV);

        let Selector::Filter { expression, .. } = &query.query.segments[0].selectors[0] else {
            panic!("expected a filter");
        };
        let FilterExpression::Comparison { left, .. } = expression.as_ref() else {
            panic!("expected a comparison");
        };
        let FilterExpression::Function { args, .. } = left.as_ref() else {
            panic!("expected a function call");
        };
        let FilterExpression::Query { query: arg, .. } = &args[0] else {
            panic!("expected a query");
        };

        assert_eq!(analyzer.get_type(left.id()).to_string(), "number | nothing");
        assert_eq!(
            analyzer.get_type(arg.identifier.id).to_string(),
            user().to_string()
        );
        assert_eq!(
            analyzer.get_type(arg.id).to_string(),
            "\"admin\" | \"guest\""
        );
    }

    #[test]
    fn narrowing_at_the_largest_index() {
        let root = DataType::array_of(DataType::array_of(DataType::number()));
        assert_eq!(
            type_of("$[?@[9007199254740991] == 1]", root.clone()),
            "number[]"
        );
        assert_eq!(type_of("$[?@[9007199254740991]]", root.clone()), "number[]");
        assert_eq!(type_of("$[?@[2] == 1]", root), "[number, number, 1, ...number[]]");
    }

    #[test]
    fn results_are_cached() {
        let query = Query::parse("$.a");
        let mut analyzer = TypeAnalyzer::new(&query, DataType::any(), &ENV);
        let first = analyzer.get_type(query.id);
        assert!(analyzer.cache[query.id.index()].is_some());
        assert_eq!(analyzer.get_type(query.id), first);
    }
}
