use std::{collections::HashMap, fmt};

use crate::{filter::FilterExpressionResult, token::TextRange, types::DataType};

/// The kind of result a filter expression or function argument produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionType {
    Logical,
    Nodes,
    Value,
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionType::Logical => f.write_str("LogicalType"),
            ExpressionType::Nodes => f.write_str("NodesType"),
            ExpressionType::Value => f.write_str("ValueType"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub param_types: Vec<ExpressionType>,
    pub return_type: ExpressionType,
    /// The shape of values the function can produce, for static analysis.
    pub return_data_type: DataType,
}

/// Collects non-fatal warnings raised by a function handler during a call.
#[derive(Debug, Default)]
pub struct FunctionContext {
    warnings: Vec<(Option<usize>, String)>,
}

impl FunctionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warn about the call as a whole.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push((None, message.into()));
    }

    /// Warn about the argument at `index`.
    pub fn warn_argument(&mut self, index: usize, message: impl Into<String>) {
        self.warnings.push((Some(index), message.into()));
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<(Option<usize>, String)> {
        std::mem::take(&mut self.warnings)
    }
}

/// A warning raised while evaluating a function call, located in the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionWarning {
    pub function: String,
    pub argument: Option<usize>,
    pub message: String,
    pub range: TextRange,
}

impl fmt::Display for FunctionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument {
            Some(i) => write!(
                f,
                "{}(): argument {}: {} ({})",
                self.function,
                i + 1,
                self.message,
                self.range
            ),
            None => write!(f, "{}(): {} ({})", self.function, self.message, self.range),
        }
    }
}

/// A filter function.
///
/// Arguments arrive already converted to the kinds named by `sig().param_types`,
/// and there are always exactly as many of them as there are parameters.
pub trait FunctionExtension {
    fn call<'v>(
        &self,
        args: Vec<FilterExpressionResult<'v>>,
        context: &mut FunctionContext,
    ) -> FilterExpressionResult<'v>;

    fn sig(&self) -> FunctionSignature;
}

impl fmt::Debug for dyn FunctionExtension + Send + Sync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = self.sig();
        write!(f, "({:?}) -> {:?}", sig.param_types, sig.return_type)
    }
}

pub type FunctionRegister = HashMap<String, Box<dyn FunctionExtension + Send + Sync>>;
