use std::fmt;

use serde::Serialize;

use crate::token::TextRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JSONPathErrorType {
    SyntaxError,
    TypeError,
    NameError,
}

impl fmt::Display for JSONPathErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JSONPathErrorType::SyntaxError => f.write_str("syntax error:"),
            JSONPathErrorType::TypeError => f.write_str("type error:"),
            JSONPathErrorType::NameError => f.write_str("name error:"),
        }
    }
}

/// The error returned by the convenience entry points when a query has at
/// least one error-severity diagnostic.
#[derive(Debug, thiserror::Error)]
#[error("{kind} {msg} ({}..{})", .span.start, .span.end)]
pub struct JSONPathError {
    pub kind: JSONPathErrorType,
    pub msg: String,
    pub span: TextRange,
}

impl JSONPathError {
    pub fn new(kind: JSONPathErrorType, msg: String, span: TextRange) -> Self {
        Self { kind, msg, span }
    }

    pub fn syntax(msg: String, span: TextRange) -> Self {
        Self::new(JSONPathErrorType::SyntaxError, msg, span)
    }

    pub fn typ(msg: String, span: TextRange) -> Self {
        Self::new(JSONPathErrorType::TypeError, msg, span)
    }

    pub fn name(msg: String, span: TextRange) -> Self {
        Self::new(JSONPathErrorType::NameError, msg, span)
    }
}

impl From<&Diagnostic> for JSONPathError {
    fn from(diagnostic: &Diagnostic) -> Self {
        let kind = match diagnostic.kind {
            DiagnosticKind::Syntax => JSONPathErrorType::SyntaxError,
            DiagnosticKind::Name => JSONPathErrorType::NameError,
            DiagnosticKind::Type | DiagnosticKind::Analysis => JSONPathErrorType::TypeError,
        };
        JSONPathError::new(kind, diagnostic.message.clone(), diagnostic.range)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Which pass produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Syntax,
    Type,
    Name,
    Analysis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub message: String,
    pub range: TextRange,
}

impl Diagnostic {
    pub fn syntax(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Syntax,
            message: message.into(),
            range,
        }
    }

    pub fn typ(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Type,
            message: message.into(),
            range,
        }
    }

    pub fn name(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            severity: Severity::Error,
            kind: DiagnosticKind::Name,
            message: message.into(),
            range,
        }
    }

    pub fn analysis(message: impl Into<String>, range: TextRange) -> Self {
        Self {
            severity: Severity::Warning,
            kind: DiagnosticKind::Analysis,
            message: message.into(),
            range,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{}: {} ({})", severity, self.message, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_kind_and_span() {
        let err = JSONPathError::syntax(String::from("unexpected ']'"), TextRange::new(3, 4));
        assert_eq!(err.to_string(), "syntax error: unexpected ']' (3..4)");
    }

    #[test]
    fn name_diagnostic_maps_to_name_error() {
        let diagnostic = Diagnostic::name("unknown function 'foo'", TextRange::new(3, 6));
        let err = JSONPathError::from(&diagnostic);
        assert_eq!(err.kind, JSONPathErrorType::NameError);
        assert_eq!(err.msg, "unknown function 'foo'");
    }
}
