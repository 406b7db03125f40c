//! Decoding of quoted string literals.
//!
//! Decoding never fails. Malformed escapes are reported with their position
//! in the literal's body and decoded as well as they can be, so the parser can
//! keep going.

/// A problem found while decoding, located by byte offsets into the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EscapeError {
    pub message: String,
    pub start: usize,
    pub end: usize,
}

/// Decode the body of a string literal (the text between its quotes).
pub(crate) fn unescape(body: &str, quote: char) -> (String, Vec<EscapeError>) {
    let bytes = body.as_bytes();
    let mut rv = String::with_capacity(body.len());
    let mut errors = Vec::new();
    let mut chars = body.char_indices().peekable();

    while let Some((index, ch)) = chars.next() {
        match ch {
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    errors.push(EscapeError {
                        message: String::from("incomplete escape sequence"),
                        start: index,
                        end: body.len(),
                    });
                    break;
                };

                match escaped {
                    'b' => rv.push('\u{0008}'),
                    'f' => rv.push('\u{000C}'),
                    'n' => rv.push('\n'),
                    'r' => rv.push('\r'),
                    't' => rv.push('\t'),
                    '/' => rv.push('/'),
                    '\\' => rv.push('\\'),
                    c if c == quote => rv.push(c),
                    'u' => match decode_hex_char(bytes, index) {
                        Ok((code_point, end)) => {
                            rv.push(code_point);
                            while chars.peek().is_some_and(|(i, _)| *i < end) {
                                chars.next();
                            }
                        }
                        Err((message, end)) => {
                            errors.push(EscapeError {
                                message: message.to_owned(),
                                start: index,
                                end,
                            });
                            rv.push(char::REPLACEMENT_CHARACTER);
                            while chars.peek().is_some_and(|(i, _)| *i < end) {
                                chars.next();
                            }
                        }
                    },
                    c => {
                        errors.push(EscapeError {
                            message: format!("invalid escape sequence '\\{}'", c),
                            start: index,
                            end: index + 1 + c.len_utf8(),
                        });
                        rv.push(c);
                    }
                }
            }
            c if (c as u32) < 0x20 => {
                errors.push(EscapeError {
                    message: String::from("invalid character in string literal"),
                    start: index,
                    end: index + 1,
                });
                rv.push(c);
            }
            c => rv.push(c),
        }
    }

    (rv, errors)
}

/// Decode `\uXXXX`, or a surrogate pair `\uXXXX\uXXXX`, starting at the
/// backslash at `index`. Returns the character and the offset just past the
/// escape, or a message and the offset just past what was examined.
fn decode_hex_char(bytes: &[u8], index: usize) -> Result<(char, usize), (&'static str, usize)> {
    let digits_start = index + 2;
    let code_point = parse_hex_digits(bytes, digits_start)
        .ok_or(("incomplete escape sequence", hex_run_end(bytes, digits_start)))?;
    let end = digits_start + 4;

    if is_low_surrogate(code_point) {
        return Err(("unexpected low surrogate", end));
    }

    if is_high_surrogate(code_point) {
        if bytes.get(end) != Some(&b'\\') || bytes.get(end + 1) != Some(&b'u') {
            return Err(("unpaired high surrogate", end));
        }

        let low = parse_hex_digits(bytes, end + 2)
            .ok_or(("incomplete escape sequence", hex_run_end(bytes, end + 2)))?;

        if !is_low_surrogate(low) {
            return Err(("unpaired high surrogate", end + 6));
        }

        let code_point = 0x10000 + (((code_point & 0x03FF) << 10) | (low & 0x03FF));
        return char::from_u32(code_point)
            .map(|c| (c, end + 6))
            .ok_or(("invalid code point", end + 6));
    }

    char::from_u32(code_point)
        .map(|c| (c, end))
        .ok_or(("invalid code point", end))
}

fn parse_hex_digits(bytes: &[u8], start: usize) -> Option<u32> {
    let digits = bytes.get(start..start + 4)?;
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let s = std::str::from_utf8(digits).ok()?;
    u32::from_str_radix(s, 16).ok()
}

fn hex_run_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start.min(bytes.len());
    while end < bytes.len() && end < start + 4 && bytes[end].is_ascii_hexdigit() {
        end += 1;
    }
    end
}

fn is_high_surrogate(code_point: u32) -> bool {
    (0xD800..=0xDBFF).contains(&code_point)
}

fn is_low_surrogate(code_point: u32) -> bool {
    (0xDC00..=0xDFFF).contains(&code_point)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str, quote: char) -> String {
        let (rv, errors) = unescape(body, quote);
        assert!(errors.is_empty(), "{:?}", errors);
        rv
    }

    fn errors(body: &str, quote: char) -> Vec<String> {
        unescape(body, quote)
            .1
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    #[test]
    fn simple_escapes() {
        assert_eq!(ok(r#"a\tb\nc\\d\/e"#, '\''), "a\tb\nc\\d/e");
    }

    #[test]
    fn quote_escapes_depend_on_quote() {
        assert_eq!(ok(r#"it\'s"#, '\''), "it's");
        assert_eq!(ok(r#"say \"hi\""#, '"'), "say \"hi\"");
        assert_eq!(errors(r#"it\'s"#, '"'), vec!["invalid escape sequence '\\''"]);
    }

    #[test]
    fn unicode_escapes() {
        assert_eq!(ok(r#"\u263A"#, '"'), "☺");
        assert_eq!(ok(r#"\uD834\uDD1E"#, '"'), "𝄞");
    }

    #[test]
    fn surrogate_errors() {
        assert_eq!(errors(r#"\uD834"#, '"'), vec!["unpaired high surrogate"]);
        assert_eq!(errors(r#"\uD834A"#, '"'), vec!["unpaired high surrogate"]);
        assert_eq!(errors(r#"\uDD1E"#, '"'), vec!["unexpected low surrogate"]);
    }

    #[test]
    fn incomplete_hex() {
        let (_, errs) = unescape(r#"ab\u12"#, '"');
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].message, "incomplete escape sequence");
        assert_eq!((errs[0].start, errs[0].end), (2, 6));
    }

    #[test]
    fn control_characters() {
        assert_eq!(errors("a\u{0001}b", '"'), vec!["invalid character in string literal"]);
    }

    #[test]
    fn trailing_backslash() {
        assert_eq!(errors("a\\", '"'), vec!["incomplete escape sequence"]);
    }
}
