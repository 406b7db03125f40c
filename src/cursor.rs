use crate::{
    errors::Diagnostic,
    token::{NodeId, TextRange, Token, TokenType},
};

/// A position in the query string, plus the bookkeeping shared by every
/// production of the parser: the next free node id, where the last token
/// ended, and the diagnostics found so far.
pub(crate) struct Cursor<'s> {
    source: &'s str,
    pos: usize,
    last_end: usize,
    next_id: u32,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'s> Cursor<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            pos: 0,
            last_end: 0,
            next_id: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn source(&self) -> &'s str {
        self.source
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Move back to an earlier position that no token has been made past.
    pub fn reset(&mut self, pos: usize) {
        debug_assert!(pos >= self.last_end);
        self.pos = pos;
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    pub fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    pub fn at(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    pub fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    pub fn bump_while(&mut self, f: impl Fn(char) -> bool) -> usize {
        let start = self.pos;
        while self.peek().is_some_and(&f) {
            self.bump();
        }
        self.pos - start
    }

    /// Step over blank characters, returning the range stepped over.
    pub fn skip_whitespace(&mut self) -> TextRange {
        let start = self.pos;
        self.bump_while(is_blank);
        TextRange::new(start, self.pos)
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn node_count(&self) -> u32 {
        self.next_id
    }

    /// Make a token of the text from `start` to the current position.
    pub fn token(&mut self, kind: TokenType, start: usize) -> Token {
        let token = Token {
            id: self.next_id(),
            kind,
            text: self.source[start..self.pos].into(),
            skipped: self.source[self.last_end..start].into(),
            range: TextRange::new(start, self.pos),
            missing: false,
        };
        self.last_end = self.pos;
        token
    }

    /// Consume `len` bytes as a token.
    pub fn eat(&mut self, kind: TokenType, len: usize) -> Token {
        let start = self.pos;
        self.pos += len;
        self.token(kind, start)
    }

    /// Synthesize an empty token at the current position.
    pub fn missing(&mut self, kind: TokenType) -> Token {
        let mut token = self.token(kind, self.pos);
        token.missing = true;
        token
    }

    pub fn error(&mut self, message: impl Into<String>, range: TextRange) {
        self.diagnostics.push(Diagnostic::syntax(message, range));
    }

    /// Report and step over characters up to (not including) the first one
    /// accepted by `stop`. They become skipped text of the next token.
    pub fn skip_garbage(&mut self, expected: &str, stop: impl Fn(char) -> bool) {
        let start = self.pos;
        self.bump_while(|c| !stop(c));
        if self.pos > start {
            let range = TextRange::new(start, self.pos);
            let found = &self.source[start..self.pos];
            self.error(format!("expected {}, found '{}'", expected, found), range);
        }
    }
}

pub(crate) fn is_blank(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n' | '\r')
}

pub(crate) fn is_name_first(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ch as u32 >= 0x80
}

pub(crate) fn is_name_char(ch: char) -> bool {
    is_name_first(ch) || ch.is_ascii_digit()
}

pub(crate) fn is_function_name_first(ch: char) -> bool {
    ch.is_ascii_lowercase()
}

pub(crate) fn is_function_name_char(ch: char) -> bool {
    ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_carry_skipped_text() {
        let mut cursor = Cursor::new("$  .a");
        let root = cursor.eat(TokenType::Root, 1);
        cursor.skip_whitespace();
        let dot = cursor.eat(TokenType::Dot, 1);
        assert_eq!(&*root.skipped, "");
        assert_eq!(&*dot.skipped, "  ");
        assert_eq!(dot.range, TextRange::new(3, 4));
    }

    #[test]
    fn missing_tokens_are_empty() {
        let mut cursor = Cursor::new("$ ");
        cursor.eat(TokenType::Root, 1);
        cursor.skip_whitespace();
        let missing = cursor.missing(TokenType::RBracket);
        assert!(missing.is_missing());
        assert_eq!(missing.range, TextRange::new(2, 2));
        assert_eq!(&*missing.skipped, " ");
    }

    #[test]
    fn garbage_is_reported() {
        let mut cursor = Cursor::new("#!]");
        cursor.skip_garbage("a selector", |c| c == ']');
        assert_eq!(cursor.pos(), 2);
        assert_eq!(cursor.diagnostics[0].message, "expected a selector, found '#!'");
    }
}
