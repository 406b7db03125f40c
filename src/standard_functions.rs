use std::{num::NonZeroUsize, sync::Mutex};

use lru::LruCache;
use regex::Regex;

use crate::{
    filter::FilterExpressionResult,
    function::{ExpressionType, FunctionContext, FunctionExtension, FunctionSignature},
    types::DataType,
};

const REGEX_CACHE_SIZE: usize = 100;

pub struct Count;

impl Count {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for Count {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionExtension for Count {
    fn call<'v>(
        &self,
        args: Vec<FilterExpressionResult<'v>>,
        _context: &mut FunctionContext,
    ) -> FilterExpressionResult<'v> {
        match args.first() {
            Some(FilterExpressionResult::Nodes(nodes)) => {
                FilterExpressionResult::owned(nodes.len().into())
            }
            _ => unreachable!("count() takes a node list"),
        }
    }

    fn sig(&self) -> FunctionSignature {
        FunctionSignature {
            param_types: vec![ExpressionType::Nodes],
            return_type: ExpressionType::Value,
            return_data_type: DataType::number(),
        }
    }
}

pub struct Length;

impl Length {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for Length {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionExtension for Length {
    fn call<'v>(
        &self,
        args: Vec<FilterExpressionResult<'v>>,
        _context: &mut FunctionContext,
    ) -> FilterExpressionResult<'v> {
        match args.first().and_then(|arg| arg.as_value()) {
            Some(serde_json::Value::String(s)) => {
                FilterExpressionResult::owned(s.chars().count().into())
            }
            Some(serde_json::Value::Array(a)) => FilterExpressionResult::owned(a.len().into()),
            Some(serde_json::Value::Object(o)) => FilterExpressionResult::owned(o.len().into()),
            _ => FilterExpressionResult::Nothing,
        }
    }

    fn sig(&self) -> FunctionSignature {
        FunctionSignature {
            param_types: vec![ExpressionType::Value],
            return_type: ExpressionType::Value,
            return_data_type: DataType::union([DataType::number(), DataType::nothing()]),
        }
    }
}

/// Compiled I-Regexp patterns, keyed by the pattern as written in the query.
struct RegexCache {
    cache: Mutex<LruCache<String, Regex>>,
    full_match: bool,
}

impl RegexCache {
    fn new(full_match: bool) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(REGEX_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
            full_match,
        }
    }

    fn is_match(&self, value: &str, pattern: &str, context: &mut FunctionContext) -> bool {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(re) = cache.get(pattern) {
            return re.is_match(value);
        }

        if !iregexp::check(pattern) {
            context.warn_argument(1, format!("'{}' is not a valid I-Regexp pattern", pattern));
            return false;
        }

        let mapped = map_regex(pattern);
        let mapped = if self.full_match {
            format!(r"\A(?:{})\z", mapped)
        } else {
            mapped
        };

        match Regex::new(&mapped) {
            Ok(re) => {
                let rv = re.is_match(value);
                cache.push(pattern.to_owned(), re);
                rv
            }
            Err(err) => {
                log::debug!("failed to compile {:?}: {}", mapped, err);
                context.warn_argument(1, format!("can't compile pattern '{}'", pattern));
                false
            }
        }
    }
}

fn regex_args<'a>(args: &'a [FilterExpressionResult<'_>]) -> Option<(&'a str, &'a str)> {
    match (
        args.first().and_then(|a| a.as_value()),
        args.get(1).and_then(|a| a.as_value()),
    ) {
        (Some(serde_json::Value::String(s)), Some(serde_json::Value::String(p))) => {
            Some((s.as_str(), p.as_str()))
        }
        _ => None,
    }
}

fn regex_signature() -> FunctionSignature {
    FunctionSignature {
        param_types: vec![ExpressionType::Value, ExpressionType::Value],
        return_type: ExpressionType::Logical,
        return_data_type: DataType::boolean(),
    }
}

pub struct Match {
    cache: RegexCache,
}

impl Match {
    pub fn new() -> Self {
        Self {
            cache: RegexCache::new(true),
        }
    }
}

impl Default for Match {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionExtension for Match {
    fn call<'v>(
        &self,
        args: Vec<FilterExpressionResult<'v>>,
        context: &mut FunctionContext,
    ) -> FilterExpressionResult<'v> {
        match regex_args(&args) {
            Some((s, p)) => FilterExpressionResult::Logical(self.cache.is_match(s, p, context)),
            None => FilterExpressionResult::Logical(false),
        }
    }

    fn sig(&self) -> FunctionSignature {
        regex_signature()
    }
}

pub struct Search {
    cache: RegexCache,
}

impl Search {
    pub fn new() -> Self {
        Self {
            cache: RegexCache::new(false),
        }
    }
}

impl Default for Search {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionExtension for Search {
    fn call<'v>(
        &self,
        args: Vec<FilterExpressionResult<'v>>,
        context: &mut FunctionContext,
    ) -> FilterExpressionResult<'v> {
        match regex_args(&args) {
            Some((s, p)) => FilterExpressionResult::Logical(self.cache.is_match(s, p, context)),
            None => FilterExpressionResult::Logical(false),
        }
    }

    fn sig(&self) -> FunctionSignature {
        regex_signature()
    }
}

pub struct Value;

impl Value {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionExtension for Value {
    fn call<'v>(
        &self,
        args: Vec<FilterExpressionResult<'v>>,
        _context: &mut FunctionContext,
    ) -> FilterExpressionResult<'v> {
        match args.into_iter().next() {
            Some(FilterExpressionResult::Nodes(nodes)) if nodes.len() == 1 => {
                FilterExpressionResult::borrowed(nodes[0].value)
            }
            Some(FilterExpressionResult::Nodes(_)) => FilterExpressionResult::Nothing,
            _ => unreachable!("value() takes a node list"),
        }
    }

    fn sig(&self) -> FunctionSignature {
        FunctionSignature {
            param_types: vec![ExpressionType::Nodes],
            return_type: ExpressionType::Value,
            return_data_type: DataType::any(),
        }
    }
}

/// Map an I-Regexp pattern to `regex` syntax. Outside character classes, `.`
/// matches any character except line breaks.
fn map_regex(pattern: &str) -> String {
    let mut escaped = false;
    let mut char_class = false;
    let mut mapped = String::with_capacity(pattern.len());

    for c in pattern.chars() {
        if escaped {
            mapped.push(c);
            escaped = false;
            continue;
        }

        match c {
            '.' if !char_class => mapped.push_str(r"[^\n\r]"),
            '\\' => {
                escaped = true;
                mapped.push(c);
            }
            '[' => {
                char_class = true;
                mapped.push(c);
            }
            ']' => {
                char_class = false;
                mapped.push(c);
            }
            _ => mapped.push(c),
        }
    }

    mapped
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value as JsonValue};

    use super::*;

    fn call<'v>(
        f: &dyn FunctionExtension,
        args: Vec<FilterExpressionResult<'v>>,
    ) -> (FilterExpressionResult<'v>, Vec<(Option<usize>, String)>) {
        let mut context = FunctionContext::new();
        let rv = f.call(args, &mut context);
        (rv, context.take_warnings())
    }

    fn s(v: &str) -> FilterExpressionResult<'static> {
        FilterExpressionResult::owned(JsonValue::String(v.to_owned()))
    }

    #[test]
    fn length_counts_characters() {
        let (rv, _) = call(&Length::new(), vec![s("h☺llo")]);
        assert_eq!(rv.as_value(), Some(&json!(5)));
        let (rv, _) = call(&Length::new(), vec![FilterExpressionResult::owned(json!(1))]);
        assert_eq!(rv, FilterExpressionResult::Nothing);
    }

    #[test]
    fn match_is_anchored() {
        let m = Match::new();
        assert_eq!(
            call(&m, vec![s("1974-05-01"), s("1974-05-..")]).0,
            FilterExpressionResult::Logical(true)
        );
        assert_eq!(
            call(&m, vec![s("x1974-05-01"), s("1974-05-..")]).0,
            FilterExpressionResult::Logical(false)
        );
        // From the cache this time.
        assert_eq!(
            call(&m, vec![s("1974-05-01"), s("1974-05-..")]).0,
            FilterExpressionResult::Logical(true)
        );
    }

    #[test]
    fn search_is_not_anchored() {
        let (rv, _) = call(&Search::new(), vec![s("Pineapple"), s("[aA]pple")]);
        assert_eq!(rv, FilterExpressionResult::Logical(true));
    }

    #[test]
    fn dot_does_not_match_line_breaks() {
        let (rv, _) = call(&Match::new(), vec![s("a\nb"), s("a.b")]);
        assert_eq!(rv, FilterExpressionResult::Logical(false));
        assert_eq!(map_regex(r"[.]\.."), r"[.]\.[^\n\r]");
    }

    #[test]
    fn invalid_patterns_warn() {
        let (rv, warnings) = call(&Search::new(), vec![s("abc"), s("(?<x>a)")]);
        assert_eq!(rv, FilterExpressionResult::Logical(false));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].0, Some(1));
    }

    #[test]
    fn non_string_arguments() {
        let (rv, warnings) = call(
            &Match::new(),
            vec![FilterExpressionResult::owned(json!(1)), s("1")],
        );
        assert_eq!(rv, FilterExpressionResult::Logical(false));
        assert!(warnings.is_empty());
    }
}
