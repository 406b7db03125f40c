//! Warnings about selectors that can't, or didn't, select anything.
use std::{collections::BTreeMap, rc::Rc};

use serde_json::Value;

use crate::{
    analyzer::TypeAnalyzer,
    context::Instrumentation,
    env::Environment,
    errors::Diagnostic,
    function::FunctionWarning,
    node::{Node, NodeList},
    query::Query,
    selector::Selector,
    token::{NodeId, TextRange},
    tree::{SyntaxRef, Visit},
    types::DataType,
};

/// Report every selector that can never produce output when the query runs
/// against a value of type `root_type`.
///
/// A selector is only reported when its input could exist, so one dead
/// selector doesn't drag everything after it along.
pub fn analyze_static(query: &Query, root_type: DataType, env: &Environment) -> Vec<Diagnostic> {
    let mut analyzer = TypeAnalyzer::new(query, root_type, env);
    let mut selectors: Vec<&Selector> = Vec::new();

    query.syntax().for_each(&mut |node| {
        if let SyntaxRef::Selector(selector) = node {
            if !matches!(selector, Selector::Missing { .. }) {
                selectors.push(selector);
            }
        }
        Visit::Continue
    });

    let mut diagnostics = Vec::new();

    for selector in selectors {
        let Some(segment) = analyzer.index().segment_of(selector) else {
            continue;
        };

        let incoming = analyzer.get_incoming_type_to_segment(segment);
        if incoming.is_never() {
            continue;
        }

        if analyzer.get_type(selector.id()).is_never() {
            diagnostics.push(Diagnostic::analysis(
                format!("{} never produces output for {}", describe(selector), incoming),
                SyntaxRef::Selector(selector).range(),
            ));
        }
    }

    diagnostics
}

fn describe(selector: &Selector) -> String {
    match selector {
        Selector::Name { name, .. } => format!("name selector '{}'", name),
        Selector::Index { index, .. } => format!("index selector {}", index),
        Selector::Slice { .. } => String::from("slice selector"),
        Selector::Wild { .. } => String::from("wildcard selector"),
        Selector::Filter { .. } => String::from("filter selector"),
        Selector::Missing { .. } => String::from("selector"),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SelectorStats {
    evaluated: usize,
    produced: usize,
    range: TextRange,
}

/// Records what each selector did during one or more evaluations.
///
/// Pass it to [`Query::find_with`], then collect [`DynamicAnalyzer::diagnostics`].
#[derive(Debug, Default)]
pub struct DynamicAnalyzer {
    selectors: BTreeMap<NodeId, SelectorStats>,
    warnings: Vec<FunctionWarning>,
}

impl DynamicAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many nodes the selector with id `id` produced in total, if it
    /// was evaluated at all.
    pub fn produced(&self, id: NodeId) -> Option<usize> {
        self.selectors.get(&id).map(|s| s.produced)
    }

    pub fn function_warnings(&self) -> &[FunctionWarning] {
        &self.warnings
    }

    /// A warning for every selector that ran but never selected anything,
    /// followed by any function warnings.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.selectors
            .values()
            .filter(|s| s.evaluated > 0 && s.produced == 0)
            .map(|s| Diagnostic::analysis("selector produced no output", s.range))
            .chain(
                self.warnings
                    .iter()
                    .map(|w| Diagnostic::analysis(format!("{}(): {}", w.function, w.message), w.range)),
            )
            .collect()
    }
}

impl<'v> Instrumentation<'v> for DynamicAnalyzer {
    fn selector_evaluated(
        &mut self,
        selector: &Selector,
        _input: &Rc<Node<'v>>,
        output: &[Rc<Node<'v>>],
    ) {
        let stats = self
            .selectors
            .entry(selector.id())
            .or_insert_with(|| SelectorStats {
                range: SyntaxRef::Selector(selector).range(),
                ..SelectorStats::default()
            });
        stats.evaluated += 1;
        stats.produced += output.len();
    }

    fn function_warning(&mut self, warning: &FunctionWarning) {
        self.warnings.push(warning.clone());
    }
}

/// Evaluate `query` against `value`, returning its nodes and what
/// [`DynamicAnalyzer`] found.
pub fn analyze_dynamic<'v>(
    query: &Query,
    value: &'v Value,
    env: &Environment,
) -> (NodeList<'v>, Vec<Diagnostic>) {
    let mut analyzer = DynamicAnalyzer::new();
    let nodes = query.find_with(value, env, &mut analyzer);
    (nodes, analyzer.diagnostics())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::jsonpath::ENV;

    #[test]
    fn static_dead_selectors() {
        let root = DataType::from_value(&json!({"a": {"b": 1}, "c": [1, 2]}));
        let query = Query::parse("$.a.x.y");
        let diagnostics = analyze_static(&query, root.clone(), &ENV);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].range, TextRange::new(4, 5));
        assert_eq!(
            diagnostics[0].message,
            "name selector 'x' never produces output for {b: 1}"
        );

        let query = Query::parse("$.c[?@ > 5]");
        let diagnostics = analyze_static(&query, root.clone(), &ENV);
        assert!(diagnostics.is_empty(), "{diagnostics:?}");

        let query = Query::parse("$.a[0]");
        let diagnostics = analyze_static(&query, root, &ENV);
        assert_eq!(
            diagnostics[0].message,
            "index selector 0 never produces output for {b: 1}"
        );
    }

    #[test]
    fn dynamic_dead_selectors() {
        let value = json!({"a": [{"b": 1}, {"c": 2}]});
        let query = Query::standard("$.a[*]['b', 'd']").unwrap();
        let (nodes, diagnostics) = analyze_dynamic(&query, &value, &ENV);

        assert_eq!(nodes.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "selector produced no output");
        assert_eq!(diagnostics[0].range, TextRange::new(12, 15));
    }

    #[test]
    fn dynamic_function_warnings() {
        let value = json!([{"a": "x"}]);
        let query = Query::standard("$[?match(@.a, '(?<n>x)')]").unwrap();
        let (nodes, diagnostics) = analyze_dynamic(&query, &value, &ENV);

        assert!(nodes.is_empty());
        assert!(diagnostics
            .iter()
            .any(|d| d.message.starts_with("match(): ")));
    }
}
