use core::fmt;

use serde::Serialize;

/// A dense identifier for every token and composite node in a parsed query.
///
/// Ids are assigned by the parser in construction order and are used as slot
/// indices by caches that need to remember something per syntax element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An end-exclusive range of byte offsets into the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted text range {start}..{end}");
        Self { start, end }
    }

    pub fn empty(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn cover(self, other: TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn contains_inclusive(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub fn contains_strictly(&self, pos: usize) -> bool {
        self.start < pos && pos < self.end
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum TokenType {
    EndOfInput,

    Root,
    Current,
    Dot,
    DoubleDot,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Wild,
    Filter,
    Name,
    String,
    Number,

    True,
    False,
    Null,
    Function,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl TokenType {
    pub fn is_comparison_operator(self) -> bool {
        matches!(
            self,
            TokenType::Eq
                | TokenType::Ne
                | TokenType::Lt
                | TokenType::Le
                | TokenType::Gt
                | TokenType::Ge
        )
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::EndOfInput => f.write_str("'end of query'"),
            TokenType::Root => f.write_str("'$'"),
            TokenType::Current => f.write_str("'@'"),
            TokenType::Dot => f.write_str("'.'"),
            TokenType::DoubleDot => f.write_str("'..'"),
            TokenType::LBracket => f.write_str("'['"),
            TokenType::RBracket => f.write_str("']'"),
            TokenType::Comma => f.write_str("','"),
            TokenType::Colon => f.write_str("':'"),
            TokenType::Wild => f.write_str("'*'"),
            TokenType::Filter => f.write_str("'?'"),
            TokenType::Name => f.write_str("a name"),
            TokenType::String => f.write_str("a string"),
            TokenType::Number => f.write_str("a number"),
            TokenType::True => f.write_str("'true'"),
            TokenType::False => f.write_str("'false'"),
            TokenType::Null => f.write_str("'null'"),
            TokenType::Function => f.write_str("a function name"),
            TokenType::LParen => f.write_str("'('"),
            TokenType::RParen => f.write_str("')'"),
            TokenType::Not => f.write_str("'!'"),
            TokenType::And => f.write_str("'&&'"),
            TokenType::Or => f.write_str("'||'"),
            TokenType::Eq => f.write_str("'=='"),
            TokenType::Ne => f.write_str("'!='"),
            TokenType::Lt => f.write_str("'<'"),
            TokenType::Le => f.write_str("'<='"),
            TokenType::Gt => f.write_str("'>'"),
            TokenType::Ge => f.write_str("'>='"),
        }
    }
}

/// A leaf of the syntax tree.
///
/// `skipped` holds whatever the parser stepped over between the previous token
/// and this one (whitespace, or characters it could not make sense of), so the
/// original query can be rebuilt from the tokens alone. A `missing` token was
/// synthesized during error recovery and has an empty range.
#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub id: NodeId,
    pub kind: TokenType,
    pub text: Box<str>,
    pub skipped: Box<str>,
    pub range: TextRange,
    pub missing: bool,
}

impl Token {
    pub fn is_missing(&self) -> bool {
        self.missing
    }
}
