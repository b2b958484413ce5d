//! Text parser for the `.koda` syntax.
//!
//! The parser is a hand-rolled byte cursor with a recursive-descent grammar
//! on top. One pass produces the [`Value`] tree; there is no token buffer.
//!
//! # Key design decisions
//!
//! - **Positions**: every error points at the first offending byte with a
//!   1-based line, a 1-based character column, and a byte offset. The cursor
//!   tracks all three as it advances.
//! - **Separators**: any run of whitespace or comments separates elements,
//!   and at most one comma may additionally appear between them. Trailing
//!   commas before a closing bracket are accepted; `a: 1,, b: 2` is not.
//! - **Brace-less root objects**: a document whose first token is a key
//!   followed by `:` parses as a root object without braces, so config-style
//!   files (`name: my-app`) work without wrapping. Detection is a bounded
//!   lookahead that rewinds before the real parse.
//! - **Number classification**: a literal with no `.` and no exponent that
//!   fits in i64 is an `Int`; everything else is a `Float`, including
//!   integer literals that overflow i64.

use crate::error::{ParseError, ParseErrorKind};
use crate::value::Value;

/// Limits applied while parsing text input.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum nesting depth; a scalar counts as depth 1.
    pub max_depth: usize,
    /// Reject inputs longer than this many bytes before parsing starts.
    pub max_input_length: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_depth: 256,
            max_input_length: None,
        }
    }
}

/// Parse one `.koda` document into a [`Value`].
pub fn parse(text: &str, options: &ParseOptions) -> Result<Value, ParseError> {
    if let Some(max) = options.max_input_length {
        if text.len() > max {
            return Err(ParseError {
                kind: ParseErrorKind::InputTooLarge {
                    len: text.len(),
                    max,
                },
                line: 1,
                column: 1,
                offset: 0,
            });
        }
    }
    Parser::new(text, options.max_depth).document()
}

/// A saved cursor position, used for rewinding lookahead and for reporting
/// errors at the start of a token rather than where scanning stopped.
#[derive(Debug, Clone, Copy)]
struct Mark {
    offset: usize,
    line: usize,
    column: usize,
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    max_depth: usize,
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'-'
}

/// `[A-Za-z_][A-Za-z0-9_-]*`, shared with the serializer's quoting decision.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if is_ident_start(b) => {}
        _ => return false,
    }
    bytes.all(is_ident_continue)
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, max_depth: usize) -> Parser<'a> {
        Parser {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            max_depth,
        }
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.pos,
            line: self.line,
            column: self.column,
        }
    }

    fn reset(&mut self, mark: Mark) {
        self.pos = mark.offset;
        self.line = mark.line;
        self.column = mark.column;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    /// Advance over one character, keeping line and column in step.
    fn bump(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        self.error_at(kind, self.mark())
    }

    fn error_at(&self, kind: ParseErrorKind, mark: Mark) -> ParseError {
        ParseError {
            kind,
            line: mark.line,
            column: mark.column,
            offset: mark.offset,
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth > self.max_depth {
            return Err(self.error(ParseErrorKind::DepthExceeded(self.max_depth)));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trivia
    // ------------------------------------------------------------------

    /// Skip whitespace and comments. Stops before anything else, including a
    /// bare `/` that does not open a comment.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.bump();
                }
                Some(b'/') => match self.bytes.get(self.pos + 1) {
                    Some(b'/') => self.skip_line_comment(),
                    Some(b'*') => self.skip_block_comment()?,
                    _ => return Ok(()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                break;
            }
            self.bump();
        }
    }

    /// Block comments do not nest; an unterminated one errors at its opener.
    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let opener = self.mark();
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                None => return Err(self.error_at(ParseErrorKind::UnterminatedComment, opener)),
                Some(b'*') if self.bytes.get(self.pos + 1) == Some(&b'/') => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Document structure
    // ------------------------------------------------------------------

    fn document(&mut self) -> Result<Value, ParseError> {
        self.skip_trivia()?;
        if self.at_end() {
            return Err(self.error(ParseErrorKind::UnexpectedEnd));
        }
        let value = if self.starts_bare_object() {
            self.bare_root_object()?
        } else {
            self.value(1)?
        };
        self.skip_trivia()?;
        if !self.at_end() {
            return Err(self.error(ParseErrorKind::TrailingCharacters));
        }
        Ok(value)
    }

    /// Lookahead: does the document open with `key :` instead of a value?
    /// Rewinds unconditionally; any lexing error means "no" and the real
    /// parse reports it from the value path.
    fn starts_bare_object(&mut self) -> bool {
        let mark = self.mark();
        let is_key = match self.peek() {
            Some(q @ (b'"' | b'\'')) => self.string_literal(q).is_ok(),
            Some(b) if is_ident_start(b) => {
                self.identifier();
                true
            }
            _ => false,
        };
        let result = is_key && self.skip_trivia().is_ok() && self.peek() == Some(b':');
        self.reset(mark);
        result
    }

    fn bare_root_object(&mut self) -> Result<Value, ParseError> {
        self.check_depth(1)?;
        let mut pairs: Vec<(String, Value)> = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.at_end() {
                break;
            }
            let pair = self.pair(2, &pairs)?;
            pairs.push(pair);
            self.skip_trivia()?;
            if self.peek() == Some(b',') {
                self.bump();
            }
        }
        Ok(Value::Object(pairs))
    }

    /// Parse `key : value`. `depth` is the nesting position of the value.
    fn pair(
        &mut self,
        depth: usize,
        existing: &[(String, Value)],
    ) -> Result<(String, Value), ParseError> {
        let key_mark = self.mark();
        let key = self.key()?;
        if existing.iter().any(|(k, _)| *k == key) {
            return Err(self.error_at(ParseErrorKind::DuplicateKey(key), key_mark));
        }
        self.skip_trivia()?;
        match self.peek() {
            Some(b':') => {
                self.bump();
            }
            Some(_) => {
                return Err(match self.peek_char() {
                    Some(ch) => self.error(ParseErrorKind::UnexpectedCharacter(ch)),
                    None => self.error(ParseErrorKind::UnexpectedEnd),
                })
            }
            None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
        }
        self.skip_trivia()?;
        let value = self.value(depth)?;
        Ok((key, value))
    }

    /// A key is an identifier or a quoted string. `true`, `false`, and
    /// `null` are ordinary key names here; position disambiguates them from
    /// their value meaning.
    fn key(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(q @ (b'"' | b'\'')) => self.string_literal(q),
            Some(b) if is_ident_start(b) => Ok(self.identifier().to_owned()),
            Some(_) => Err(match self.peek_char() {
                Some(ch) => self.error(ParseErrorKind::UnexpectedCharacter(ch)),
                None => self.error(ParseErrorKind::UnexpectedEnd),
            }),
            None => Err(self.error(ParseErrorKind::UnexpectedEnd)),
        }
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    fn value(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.check_depth(depth)?;
        match self.peek() {
            Some(b'{') => self.object(depth),
            Some(b'[') => self.array(depth),
            Some(q @ (b'"' | b'\'')) => self.string_literal(q).map(Value::String),
            Some(b) if b == b'-' || b.is_ascii_digit() => self.number(),
            Some(b) if is_ident_start(b) => {
                let word = self.identifier();
                Ok(match word {
                    "true" => Value::Bool(true),
                    "false" => Value::Bool(false),
                    "null" => Value::Null,
                    other => Value::String(other.to_owned()),
                })
            }
            Some(_) => Err(match self.peek_char() {
                Some(ch) => self.error(ParseErrorKind::UnexpectedCharacter(ch)),
                None => self.error(ParseErrorKind::UnexpectedEnd),
            }),
            None => Err(self.error(ParseErrorKind::UnexpectedEnd)),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.bump(); // '{'
        let mut pairs: Vec<(String, Value)> = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(b'}') => {
                    self.bump();
                    return Ok(Value::Object(pairs));
                }
                None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
                Some(_) => {
                    let pair = self.pair(depth + 1, &pairs)?;
                    pairs.push(pair);
                    self.skip_trivia()?;
                    if self.peek() == Some(b',') {
                        self.bump();
                    }
                }
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, ParseError> {
        self.bump(); // '['
        let mut items = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(b']') => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                None => return Err(self.error(ParseErrorKind::UnexpectedEnd)),
                Some(_) => {
                    items.push(self.value(depth + 1)?);
                    self.skip_trivia()?;
                    if self.peek() == Some(b',') {
                        self.bump();
                    }
                }
            }
        }
    }

    fn identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_ident_continue(b) {
                break;
            }
            self.bump();
        }
        &self.text[start..self.pos]
    }

    // ------------------------------------------------------------------
    // Strings
    // ------------------------------------------------------------------

    /// Lex a quoted string. Double and single quotes take the same escapes
    /// except that the active quote replaces the other in the escape set.
    fn string_literal(&mut self, quote: u8) -> Result<String, ParseError> {
        let opener = self.mark();
        self.bump(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek_char() {
                None => return Err(self.error_at(ParseErrorKind::UnterminatedString, opener)),
                Some(ch) if ch == quote as char => {
                    self.bump();
                    return Ok(out);
                }
                Some('\\') => {
                    let escape_mark = self.mark();
                    self.bump();
                    let esc = match self.peek_char() {
                        Some(e) => e,
                        None => {
                            return Err(
                                self.error_at(ParseErrorKind::UnterminatedString, opener)
                            )
                        }
                    };
                    self.bump();
                    match esc {
                        '\\' => out.push('\\'),
                        '/' => out.push('/'),
                        'b' => out.push('\u{0008}'),
                        'f' => out.push('\u{000C}'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'u' => out.push(self.unicode_escape(escape_mark)?),
                        q if q == quote as char => out.push(q),
                        other => {
                            return Err(
                                self.error_at(ParseErrorKind::InvalidEscape(other), escape_mark)
                            )
                        }
                    }
                }
                Some(ch) if (ch as u32) < 0x20 => {
                    return Err(self.error(ParseErrorKind::ControlCharacter))
                }
                Some(ch) => {
                    self.bump();
                    out.push(ch);
                }
            }
        }
    }

    /// `\uXXXX`, with UTF-16 surrogate pairs combined into one scalar.
    /// `escape_mark` points at the backslash of the first escape so surrogate
    /// errors report the start of the whole sequence.
    fn unicode_escape(&mut self, escape_mark: Mark) -> Result<char, ParseError> {
        let first = self.hex4()?;
        if (0xD800..=0xDBFF).contains(&first) {
            if self.peek() == Some(b'\\') && self.bytes.get(self.pos + 1) == Some(&b'u') {
                self.bump();
                self.bump();
                let second = self.hex4()?;
                if (0xDC00..=0xDFFF).contains(&second) {
                    let combined = 0x10000 + ((first - 0xD800) << 10) + (second - 0xDC00);
                    return char::from_u32(combined).ok_or_else(|| {
                        self.error_at(ParseErrorKind::InvalidSurrogatePair, escape_mark)
                    });
                }
            }
            return Err(self.error_at(ParseErrorKind::InvalidSurrogatePair, escape_mark));
        }
        if (0xDC00..=0xDFFF).contains(&first) {
            return Err(self.error_at(ParseErrorKind::InvalidSurrogatePair, escape_mark));
        }
        char::from_u32(first)
            .ok_or_else(|| self.error_at(ParseErrorKind::InvalidUnicodeEscape, escape_mark))
    }

    fn hex4(&mut self) -> Result<u32, ParseError> {
        let mut out = 0u32;
        for _ in 0..4 {
            let digit = match self.peek() {
                Some(b) if b.is_ascii_hexdigit() => (b as char).to_digit(16),
                _ => None,
            };
            match digit {
                Some(d) => {
                    self.bump();
                    out = out * 16 + d;
                }
                None => return Err(self.error(ParseErrorKind::InvalidUnicodeEscape)),
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------

    fn number(&mut self) -> Result<Value, ParseError> {
        let start = self.mark();
        if self.peek() == Some(b'-') {
            self.bump();
        }
        match self.peek() {
            Some(b'0') => {
                self.bump();
                // no leading zeros: "01" is invalid, "0" and "0.5" are fine
                if matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    return Err(self.error(ParseErrorKind::InvalidNumber));
                }
            }
            Some(b) if b.is_ascii_digit() => {
                while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                    self.bump();
                }
            }
            _ => return Err(self.error_at(ParseErrorKind::InvalidNumber, start)),
        }

        let mut is_float = false;
        if self.peek() == Some(b'.') {
            is_float = true;
            self.bump();
            if !matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                return Err(self.error(ParseErrorKind::InvalidNumber));
            }
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.bump();
            }
            if !matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                return Err(self.error(ParseErrorKind::InvalidNumber));
            }
            while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
                self.bump();
            }
        }

        // a number must not run straight into an identifier: "1abc" is a lex error
        if matches!(self.peek(), Some(b) if is_ident_continue(b)) {
            return Err(self.error(ParseErrorKind::InvalidNumber));
        }

        let lexeme = &self.text[start.offset..self.pos];
        if is_float {
            let f: f64 = lexeme
                .parse()
                .map_err(|_| self.error_at(ParseErrorKind::InvalidNumber, start))?;
            return Ok(Value::Float(f));
        }
        match lexeme.parse::<i64>() {
            Ok(i) => Ok(Value::Int(i)),
            // out of i64 range: the value survives as a float
            Err(_) => {
                let f: f64 = lexeme
                    .parse()
                    .map_err(|_| self.error_at(ParseErrorKind::InvalidNumber, start))?;
                Ok(Value::Float(f))
            }
        }
    }
}
