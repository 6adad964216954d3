//! Content stream tokenizer.
//!
//! Turns decoded content stream bytes into [`Operation`]s whose operands are
//! `lopdf` objects. Comments are dropped. An inline image
//! (`BI <entries> ID <data> EI`) becomes a single `BI` operation carrying the
//! entry dictionary and the raw data as a string.

use lopdf::{Dictionary, Object, StringFormat};
use thiserror::Error;

use crate::operation::Operation;

/// Malformed content stream syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("unterminated {what} starting at offset {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("unexpected byte 0x{byte:02X} in {context} at offset {offset}")]
    UnexpectedByte {
        byte: u8,
        context: &'static str,
        offset: usize,
    },

    #[error("invalid number '{token}' at offset {offset}")]
    InvalidNumber { token: String, offset: usize },

    #[error("invalid hex digit 0x{byte:02X} at offset {offset}")]
    InvalidHexDigit { byte: u8, offset: usize },
}

/// Tokenize a decoded content stream.
///
/// # Errors
///
/// Returns a [`ContentError`] for unterminated strings, arrays, dictionaries
/// or inline images, a `]` outside an array, and unparsable numbers.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operation>, ContentError> {
    Lexer { input, pos: 0 }.run()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn run(mut self) -> Result<Vec<Operation>, ContentError> {
        let mut ops = Vec::new();
        let mut operands: Vec<Object> = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            let Some(b) = self.peek() else {
                break;
            };
            match b {
                b']' => {
                    return Err(ContentError::UnexpectedByte {
                        byte: b,
                        context: "content stream",
                        offset: self.pos,
                    });
                }
                b')' | b'>' | b'{' | b'}' => self.pos += 1,
                b'a'..=b'z' | b'A'..=b'Z' | b'*' | b'\'' | b'"' => {
                    let keyword = self.keyword();
                    match keyword.as_str() {
                        "true" => operands.push(Object::Boolean(true)),
                        "false" => operands.push(Object::Boolean(false)),
                        "null" => operands.push(Object::Null),
                        "BI" => {
                            let (dict, data) = self.inline_image()?;
                            operands.clear();
                            ops.push(Operation::new(
                                "BI",
                                vec![
                                    Object::Dictionary(dict),
                                    Object::String(data, StringFormat::Literal),
                                ],
                            ));
                        }
                        _ => ops.push(Operation::new(keyword, std::mem::take(&mut operands))),
                    }
                }
                _ => operands.push(self.object("content stream")?),
            }
        }

        Ok(ops)
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while self.peek().is_some_and(|b| b != b'\n' && b != b'\r') {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// One operand value. Bare keywords other than `true`/`false`/`null`
    /// inside arrays and dictionaries are kept as names.
    fn object(&mut self, context: &'static str) -> Result<Object, ContentError> {
        let start = self.pos;
        match self.peek() {
            Some(b'(') => Ok(Object::String(self.literal_string()?, StringFormat::Literal)),
            Some(b'<') if self.peek_at(1) == Some(b'<') => Ok(Object::Dictionary(self.dictionary()?)),
            Some(b'<') => Ok(Object::String(self.hex_string()?, StringFormat::Hexadecimal)),
            Some(b'[') => Ok(Object::Array(self.array()?)),
            Some(b'/') => Ok(Object::Name(self.name())),
            Some(b'0'..=b'9' | b'+' | b'-' | b'.') => self.number(),
            Some(b) if is_regular(b) => {
                let keyword = self.keyword();
                Ok(match keyword.as_str() {
                    "true" => Object::Boolean(true),
                    "false" => Object::Boolean(false),
                    "null" => Object::Null,
                    _ => Object::Name(keyword.into_bytes()),
                })
            }
            Some(byte) => Err(ContentError::UnexpectedByte {
                byte,
                context,
                offset: start,
            }),
            None => Err(ContentError::Unterminated {
                what: context,
                offset: start,
            }),
        }
    }

    /// A run of regular characters (`BT`, `d0`, `f*`, `'`).
    fn keyword(&mut self) -> String {
        let start = self.pos;
        self.pos += 1;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, ContentError> {
        let start = self.pos;
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1u32;

        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(escaped) = self.peek() else {
                        break;
                    };
                    self.pos += 1;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\r' => {
                            // line continuation, CR or CR LF
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }

        Err(ContentError::Unterminated {
            what: "literal string",
            offset: start,
        })
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, ContentError> {
        let start = self.pos;
        self.pos += 1;
        let mut nibbles = Vec::new();
        loop {
            let Some(b) = self.peek() else {
                return Err(ContentError::Unterminated {
                    what: "hex string",
                    offset: start,
                });
            };
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            let value = hex_value(b).ok_or(ContentError::InvalidHexDigit {
                byte: b,
                offset: self.pos - 1,
            })?;
            nibbles.push(value);
        }
        // An odd final digit is followed by an implied 0.
        if nibbles.len() % 2 != 0 {
            nibbles.push(0);
        }
        Ok(nibbles.chunks(2).map(|pair| (pair[0] << 4) | pair[1]).collect())
    }

    fn array(&mut self) -> Result<Vec<Object>, ContentError> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => {
                    return Err(ContentError::Unterminated {
                        what: "array",
                        offset: start,
                    });
                }
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.object("array")?),
            }
        }
    }

    fn dictionary(&mut self) -> Result<Dictionary, ContentError> {
        let start = self.pos;
        self.pos += 2;
        let mut dict = Dictionary::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => {
                    return Err(ContentError::Unterminated {
                        what: "dictionary",
                        offset: start,
                    });
                }
                Some(b'>') if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    return Ok(dict);
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    let value = self.object("dictionary")?;
                    dict.set(key, value);
                }
                Some(byte) => {
                    return Err(ContentError::UnexpectedByte {
                        byte,
                        context: "dictionary key",
                        offset: self.pos,
                    });
                }
            }
        }
    }

    /// `/Name` with `#xx` escapes decoded. Returns the bytes without the slash.
    fn name(&mut self) -> Vec<u8> {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(is_regular) {
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let mut name = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_value(raw[i + 1]), hex_value(raw[i + 2])) {
                    name.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            name.push(raw[i]);
            i += 1;
        }
        name
    }

    fn number(&mut self) -> Result<Object, ContentError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut has_dot = false;
        while let Some(b) = self.peek() {
            if b == b'.' && !has_dot {
                has_dot = true;
            } else if !b.is_ascii_digit() {
                break;
            }
            self.pos += 1;
        }
        let token = String::from_utf8_lossy(&self.input[start..self.pos]).into_owned();
        let invalid = || ContentError::InvalidNumber {
            token: token.clone(),
            offset: start,
        };
        if has_dot {
            // "5." and ".5" are valid PDF reals; Rust needs a digit on both sides.
            let normalized = match token.as_str() {
                t if t.ends_with('.') => format!("{t}0"),
                t => t.to_string(),
            };
            let value: f64 = normalized.parse().map_err(|_| invalid())?;
            Ok(Object::Real(value as _))
        } else {
            let value: i64 = token.parse().map_err(|_| invalid())?;
            Ok(Object::Integer(value))
        }
    }

    /// Entries and data of an inline image; `BI` was just consumed.
    fn inline_image(&mut self) -> Result<(Dictionary, Vec<u8>), ContentError> {
        let start = self.pos;
        let mut dict = Dictionary::new();

        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => {
                    return Err(ContentError::Unterminated {
                        what: "inline image dictionary",
                        offset: start,
                    });
                }
                Some(b'I')
                    if self.peek_at(1) == Some(b'D')
                        && self.peek_at(2).is_none_or(|b| !is_regular(b)) =>
                {
                    self.pos += 2;
                    // exactly one whitespace byte separates ID from the data
                    if self.peek().is_some_and(is_whitespace) {
                        self.pos += 1;
                    }
                    break;
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    let value = self.object("inline image dictionary")?;
                    dict.set(key, value);
                }
                Some(byte) => {
                    return Err(ContentError::UnexpectedByte {
                        byte,
                        context: "inline image dictionary",
                        offset: self.pos,
                    });
                }
            }
        }

        let data_start = self.pos;
        while self.pos < self.input.len() {
            let at_boundary = self.pos == data_start || is_whitespace(self.input[self.pos - 1]);
            if at_boundary
                && self.peek() == Some(b'E')
                && self.peek_at(1) == Some(b'I')
                && self.peek_at(2).is_none_or(|b| !is_regular(b))
            {
                let mut end = self.pos;
                if end > data_start && is_whitespace(self.input[end - 1]) {
                    end -= 1;
                }
                let data = self.input[data_start..end].to_vec();
                self.pos += 2;
                return Ok((dict, data));
            }
            self.pos += 1;
        }

        Err(ContentError::Unterminated {
            what: "inline image data",
            offset: data_start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::Operator;

    fn single(input: &[u8]) -> Operation {
        let mut ops = tokenize(input).unwrap();
        assert_eq!(ops.len(), 1, "expected one operation in {:?}", String::from_utf8_lossy(input));
        ops.remove(0)
    }

    fn as_f64(obj: &Object) -> f64 {
        crate::operands::object_to_f64(obj).unwrap()
    }

    // --- Numbers and names ---

    #[test]
    fn integers_and_reals() {
        let op = single(b"1 -2 3.5 .5 -.25 +7 5. w");
        let values: Vec<f64> = op.operands.iter().map(as_f64).collect();
        assert_eq!(values, vec![1.0, -2.0, 3.5, 0.5, -0.25, 7.0, 5.0]);
        assert!(matches!(op.operands[0], Object::Integer(1)));
        assert!(matches!(op.operands[2], Object::Real(_)));
    }

    #[test]
    fn invalid_number_is_an_error() {
        let err = tokenize(b"- m").unwrap_err();
        assert!(matches!(err, ContentError::InvalidNumber { .. }));
    }

    #[test]
    fn names_with_hex_escapes() {
        let op = single(b"/A#20B Do");
        assert!(matches!(&op.operands[0], Object::Name(n) if n == b"A B"));
    }

    // --- Strings ---

    #[test]
    fn literal_string_escapes_and_nesting() {
        let op = single(br"(a\(b\) (c) \n\101\7) Tj");
        assert!(matches!(&op.operands[0], Object::String(s, _) if s == b"a(b) (c) \nA\x07"));
    }

    #[test]
    fn literal_string_line_continuation() {
        let op = single(b"(ab\\\r\ncd) Tj");
        assert!(matches!(&op.operands[0], Object::String(s, _) if s == b"abcd"));
    }

    #[test]
    fn hex_string_with_whitespace_and_odd_digit() {
        let op = single(b"<48 65 6C 6C 6F 7> Tj");
        assert!(matches!(&op.operands[0], Object::String(s, StringFormat::Hexadecimal) if s == b"Hello\x70"));
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(matches!(
            tokenize(b"(abc Tj").unwrap_err(),
            ContentError::Unterminated { what: "literal string", .. }
        ));
    }

    // --- Operators ---

    #[test]
    fn operators_collect_preceding_operands() {
        let ops = tokenize(b"q 1 0 0 1 10 10 cm 0 0 100 100 re f Q").unwrap();
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names, vec!["q", "cm", "re", "f", "Q"]);
        assert_eq!(ops[1].operands.len(), 6);
        assert_eq!(ops[2].kind(), Some(Operator::Rectangle));
    }

    #[test]
    fn starred_quoted_and_digit_operators() {
        let ops = tokenize(b"f* B* T* (a) ' 1 2 (b) \" 500 0 d0").unwrap();
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names, vec!["f*", "B*", "T*", "'", "\"", "d0"]);
        assert_eq!(ops[4].operands.len(), 3);
    }

    #[test]
    fn tj_array_with_adjustments() {
        let op = single(b"[(H) -20 (ello)] TJ");
        let Object::Array(items) = &op.operands[0] else {
            panic!("expected array");
        };
        assert_eq!(items.len(), 3);
        assert_eq!(as_f64(&items[1]), -20.0);
    }

    #[test]
    fn comments_are_skipped() {
        let ops = tokenize(b"% header\nBT % inline\nET").unwrap();
        assert_eq!(ops.len(), 2);
    }

    #[test]
    fn booleans_and_null_are_operands() {
        let op = single(b"true false null xx");
        assert!(matches!(op.operands[..], [Object::Boolean(true), Object::Boolean(false), Object::Null]));
    }

    #[test]
    fn inline_dictionary_for_bdc() {
        let op = single(b"/Span << /MCID 3 /ActualText (x) >> BDC");
        let Object::Dictionary(dict) = &op.operands[1] else {
            panic!("expected dictionary");
        };
        assert!(matches!(dict.get(b"MCID"), Ok(Object::Integer(3))));
    }

    #[test]
    fn stray_array_end_is_an_error() {
        assert!(matches!(
            tokenize(b"1 ] w").unwrap_err(),
            ContentError::UnexpectedByte { byte: b']', .. }
        ));
    }

    #[test]
    fn empty_and_whitespace_only_streams() {
        assert!(tokenize(b"").unwrap().is_empty());
        assert!(tokenize(b" \n\t ").unwrap().is_empty());
    }

    // --- Inline images ---

    #[test]
    fn inline_image_becomes_single_operation() {
        let ops = tokenize(b"q BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xFF EI Q").unwrap();
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        assert_eq!(names, vec!["q", "BI", "Q"]);
        let Object::Dictionary(dict) = &ops[1].operands[0] else {
            panic!("expected dictionary");
        };
        assert!(matches!(dict.get(b"W"), Ok(Object::Integer(2))));
        assert!(matches!(&ops[1].operands[1], Object::String(data, _) if data == &[0x00, 0xFF]));
    }

    #[test]
    fn inline_image_data_may_contain_ei_letters() {
        let ops = tokenize(b"BI /W 4 /H 1 ID xEIy EI").unwrap();
        assert!(matches!(&ops[0].operands[1], Object::String(data, _) if data == b"xEIy"));
    }

    #[test]
    fn inline_image_without_ei_is_an_error() {
        assert!(matches!(
            tokenize(b"BI /W 1 ID abc").unwrap_err(),
            ContentError::Unterminated { what: "inline image data", .. }
        ));
    }
}
