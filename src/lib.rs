//! A JSONPath (RFC 9535) parser, evaluator and structural type analyzer.
//!
//! ## Parsing
//!
//! [`Query::parse`] never fails. It always returns a complete syntax tree,
//! with placeholder nodes wherever something was missing, plus a list of
//! syntax diagnostics. Every node of the tree knows its byte range in the
//! source text, and the tree's tokens reproduce the source exactly.
//!
//! ```
//! use jsonpath_types::Query;
//!
//! let q = Query::parse("$.users[?@.role == 'admin'");
//!
//! assert!(q.has_errors());
//! assert_eq!(q.diagnostics[0].message, "unclosed bracketed selection");
//! assert_eq!(q.to_source(), "$.users[?@.role == 'admin'");
//! ```
//!
//! Use [`Query::standard`] when a query must be well formed and well typed
//! against the standard [function extensions]. It fails with a
//! [`JSONPathError`] describing the first problem found.
//!
//! ## Evaluation
//!
//! ```
//! use jsonpath_types::{errors::JSONPathError, find};
//! use serde_json::json;
//!
//! fn main() -> Result<(), JSONPathError> {
//!     let value = json!({"items": [{"price": 19}, {}, {"price": 30}]});
//!     let nodes = find("$.items[?@.price].price", &value)?;
//!
//!     assert_eq!(nodes[0].value, &json!(19));
//!     assert_eq!(nodes[1].normalized_path(), "$['items'][2]['price']");
//!     Ok(())
//! }
//! ```
//!
//! Pass an [`Instrumentation`] to [`Query::find_with`] to observe what each
//! part of a query produced. [`analysis::DynamicAnalyzer`] is one.
//!
//! ## Types
//!
//! A [`DataType`] describes the values a document, or part of one, can hold.
//! Given the type of a query's argument, a [`TypeAnalyzer`] predicts the
//! type of everything the query selects, without a document.
//!
//! ```
//! use jsonpath_types::{from_json_schema, Query, TypeAnalyzer, ENV};
//! use serde_json::json;
//!
//! let schema = json!({
//!     "type": "object",
//!     "properties": {
//!         "users": {
//!             "type": "array",
//!             "items": {
//!                 "type": "object",
//!                 "properties": {
//!                     "role": {"enum": ["admin", "guest"]},
//!                     "bannedCount": {"type": "number"}
//!                 },
//!                 "required": ["role"],
//!                 "additionalProperties": false
//!             }
//!         }
//!     },
//!     "required": ["users"],
//!     "additionalProperties": false
//! });
//!
//! let root = from_json_schema(&schema, None).data_type;
//! let q = Query::parse("$.users[?@.role == 'admin']");
//! let mut analyzer = TypeAnalyzer::new(&q, root, &ENV);
//!
//! assert_eq!(
//!     analyzer.get_type(q.query.id).to_string(),
//!     "{role: \"admin\", bannedCount?: number}"
//! );
//! ```
//!
//! [function extensions]: https://datatracker.ietf.org/doc/html/rfc9535#name-function-extensions
pub mod analysis;
pub mod analyzer;
pub mod checker;
pub mod context;
mod cursor;
pub mod env;
pub mod errors;
pub mod filter;
pub mod function;
pub mod jsonpath;
pub mod node;
mod parser;
pub mod query;
pub mod schema;
pub mod segment;
pub mod selector;
pub mod standard_functions;
pub mod token;
pub mod tree;
pub mod types;
mod unescape;

pub use analyzer::TypeAnalyzer;
pub use context::{Instrumentation, QueryContext};
pub use env::Environment;
pub use errors::{Diagnostic, DiagnosticKind, JSONPathError, JSONPathErrorType, Severity};
pub use function::{ExpressionType, FunctionExtension, FunctionSignature};
pub use jsonpath::{find, remove, replace, ENV};
pub use node::{Node, NodeList, PathSegment};
pub use query::Query;
pub use schema::{from_json_schema, from_jtd, ConvertedType};
pub use token::{NodeId, TextRange};
pub use types::DataType;
