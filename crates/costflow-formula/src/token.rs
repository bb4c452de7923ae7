//! Formula tokenizer
//!
//! Turns formula text into a flat token stream. Whitespace is skipped,
//! `and`/`or`/`not` (any case) become the operator tokens `&&`/`||`/`!`, and
//! two-character operators are matched before single-character ones. Any
//! character outside the language is a hard [`FormulaError::Tokenize`].

use crate::error::{FormulaError, FormulaResult};

/// Kind of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    Operator,
    Paren,
    Comma,
}

/// A single token.
///
/// `text` holds the lexeme for numbers, identifiers and punctuation, the
/// canonical operator spelling for operators, and the unescaped contents for
/// string literals. `position` is the byte offset of the token start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub position: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, position: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            position,
        }
    }

    /// Whether this is the operator or punctuation token `text`
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

const TWO_CHAR_OPERATORS: [&str; 6] = [">=", "<=", "==", "!=", "&&", "||"];
const ONE_CHAR_OPERATORS: [char; 8] = ['+', '-', '*', '/', '%', '<', '>', '!'];

/// Tokenize a formula string
pub fn tokenize(input: &str) -> FormulaResult<Vec<Token>> {
    Scanner::new(input).run()
}

struct Scanner<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    fn run(mut self) -> FormulaResult<Vec<Token>> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek_char() else {
                break;
            };
            let start = self.pos;

            match c {
                '(' | ')' => {
                    self.advance();
                    self.push(TokenKind::Paren, c.to_string(), start);
                }
                ',' => {
                    self.advance();
                    self.push(TokenKind::Comma, ",", start);
                }
                '"' | '\'' => self.scan_string(c)?,
                c if c.is_ascii_digit()
                    || (c == '.' && self.peek_char_at(1).map_or(false, |n| n.is_ascii_digit())) =>
                {
                    self.scan_number()?
                }
                c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),
                _ => self.scan_operator(c)?,
            }
        }
        Ok(self.tokens)
    }

    fn push(&mut self, kind: TokenKind, text: impl Into<String>, position: usize) {
        self.tokens.push(Token::new(kind, text, position));
    }

    fn scan_string(&mut self, quote: char) -> FormulaResult<()> {
        let start = self.pos;
        self.advance(); // opening quote

        let mut s = String::new();
        loop {
            match self.peek_char() {
                None => {
                    return Err(FormulaError::Parse(format!(
                        "Unterminated string literal starting at position {}",
                        start
                    )))
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some(escaped) => {
                            s.push(escaped);
                            self.advance();
                        }
                        None => {
                            return Err(FormulaError::Parse(format!(
                                "Unterminated string literal starting at position {}",
                                start
                            )))
                        }
                    }
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }

        self.push(TokenKind::String, s, start);
        Ok(())
    }

    fn scan_number(&mut self) -> FormulaResult<()> {
        let start = self.pos;
        let mut seen_dot = false;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' {
                if seen_dot {
                    return Err(FormulaError::Parse(format!(
                        "Malformed number '{}.' at position {}",
                        &self.input[start..self.pos],
                        start
                    )));
                }
                seen_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        let text = &self.input[start..self.pos];
        self.push(TokenKind::Number, text, start);
        Ok(())
    }

    fn scan_identifier(&mut self) {
        let start = self.pos;
        while self
            .peek_char()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        match text.to_ascii_lowercase().as_str() {
            "and" => self.push(TokenKind::Operator, "&&", start),
            "or" => self.push(TokenKind::Operator, "||", start),
            "not" => self.push(TokenKind::Operator, "!", start),
            _ => self.push(TokenKind::Identifier, text, start),
        }
    }

    fn scan_operator(&mut self, c: char) -> FormulaResult<()> {
        let start = self.pos;
        let rest = &self.input[self.pos..];

        if let Some(op) = TWO_CHAR_OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            self.pos += op.len();
            self.push(TokenKind::Operator, *op, start);
            return Ok(());
        }

        if ONE_CHAR_OPERATORS.contains(&c) {
            self.advance();
            self.push(TokenKind::Operator, c.to_string(), start);
            return Ok(());
        }

        Err(FormulaError::Tokenize {
            position: start,
            found: c,
        })
    }

    // === Helper methods ===

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_char_at(&self, offset: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(offset)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek_char().map_or(false, |c| c.is_whitespace()) {
            self.advance();
        }
    }
}
