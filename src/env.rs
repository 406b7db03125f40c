use std::collections::HashMap;

use crate::{
    function::{FunctionExtension, FunctionRegister, FunctionSignature},
    standard_functions::{Count, Length, Match, Search, Value},
};

/// Function extensions and index limits used when checking and evaluating
/// queries.
#[derive(Debug)]
pub struct Environment {
    pub max_index: i64,
    pub min_index: i64,
    pub functions: FunctionRegister,
}

impl Environment {
    /// An environment with no function extensions.
    pub fn new() -> Self {
        Environment {
            max_index: 2_i64.pow(53) - 1,
            min_index: -(2_i64.pow(53)) + 1,
            functions: HashMap::new(),
        }
    }

    /// An environment with the five functions defined by RFC 9535.
    pub fn standard() -> Self {
        let mut env = Environment::new();
        env.add_function("count", Box::new(Count::new()));
        env.add_function("length", Box::new(Length::new()));
        env.add_function("match", Box::new(Match::new()));
        env.add_function("search", Box::new(Search::new()));
        env.add_function("value", Box::new(Value::new()));
        env
    }

    /// Register `function` as `name`, replacing any existing function with
    /// that name.
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        function: Box<dyn FunctionExtension + Send + Sync>,
    ) {
        self.functions.insert(name.into(), function);
    }

    pub fn signature(&self, name: &str) -> Option<FunctionSignature> {
        self.functions.get(name).map(|f| f.sig())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::ExpressionType;

    #[test]
    fn standard_signatures() {
        let env = Environment::standard();
        let count = env.signature("count").unwrap();
        assert_eq!(count.param_types, vec![ExpressionType::Nodes]);
        assert_eq!(count.return_type, ExpressionType::Value);

        let search = env.signature("search").unwrap();
        assert_eq!(
            search.param_types,
            vec![ExpressionType::Value, ExpressionType::Value]
        );
        assert_eq!(search.return_type, ExpressionType::Logical);
        assert!(env.signature("nosuchthing").is_none());
    }

    #[test]
    fn empty_environment() {
        let env = Environment::new();
        assert!(env.functions.is_empty());
        assert_eq!(env.max_index, 9_007_199_254_740_991);
        assert_eq!(env.min_index, -9_007_199_254_740_991);
    }
}
