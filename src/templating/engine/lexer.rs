//! Tokenizer for template text with configurable action delimiters.
//!
//! Everything outside an action is emitted as a single text token. Only the
//! configured left delimiter opens an action, so text written for the other
//! render pass passes through untouched.

use super::Delimiters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Keyword {
    If,
    Else,
    End,
    Range,
    With,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Text(String),
    LeftDelim,
    RightDelim,
    Ident(String),
    Keyword(Keyword),
    /// `.Name`, stored without the dot
    Field(String),
    Dot,
    /// `$name`, stored with the dollar sign; `$` alone is the root
    Variable(String),
    Str(String),
    Number(String),
    Bool(bool),
    Nil,
    Pipe,
    LeftParen,
    RightParen,
    Comma,
    Declare,
    Assign,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: usize,
    /// Whether whitespace separated this token from the previous one.
    pub spaced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LexError {
    pub line: usize,
    pub message: String,
}

pub(crate) fn lex(input: &str, delims: Delimiters) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        input,
        pos: 0,
        line: 1,
        delims,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    delims: Delimiters,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, line: usize, spaced: bool) {
        self.tokens.push(Token {
            kind,
            line,
            spaced,
        });
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, LexError> {
        Err(LexError {
            line: self.line,
            message: message.into(),
        })
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.bump();
            skipped = true;
        }
        skipped
    }

    fn run(&mut self) -> Result<(), LexError> {
        let left = self.delims.left;
        loop {
            let Some(offset) = self.rest().find(left) else {
                let text = self.rest().to_string();
                let line = self.line;
                self.pos = self.input.len();
                if !text.is_empty() {
                    self.push(TokenKind::Text(text), line, false);
                }
                self.push(TokenKind::Eof, self.line, false);
                return Ok(());
            };

            let text_start = self.pos;
            let text_line = self.line;
            let text_end = text_start + offset;
            let mut text = &self.input[text_start..text_end];
            self.line += text.matches('\n').count();
            self.pos = text_end + left.len();

            let trim_before = self.rest().starts_with('-')
                && self.peek_at(1).is_some_and(char::is_whitespace);
            if trim_before {
                text = text.trim_end();
                self.bump();
            }
            if !text.is_empty() {
                self.push(TokenKind::Text(text.to_string()), text_line, false);
            }

            if self.at_comment() {
                self.lex_comment()?;
                continue;
            }

            self.push(TokenKind::LeftDelim, self.line, false);
            self.lex_action()?;
        }
    }

    fn at_comment(&self) -> bool {
        self.rest().trim_start().starts_with("/*")
    }

    fn lex_comment(&mut self) -> Result<(), LexError> {
        self.skip_whitespace();
        let Some(end) = self.rest().find("*/") else {
            return self.error("unclosed comment");
        };
        let len = self.rest()[..end + 2].chars().count();
        for _ in 0..len {
            self.bump();
        }
        self.lex_close_delim("comment ends before closing delimiter")
    }

    /// Consume a right delimiter (with optional trim marker) or fail.
    fn lex_close_delim(&mut self, message: &str) -> Result<(), LexError> {
        let spaced = self.skip_whitespace();
        if self.rest().starts_with(self.delims.right) {
            self.pos += self.delims.right.len();
            return Ok(());
        }
        if spaced && self.at_trim_close() {
            self.pos += 1 + self.delims.right.len();
            self.skip_whitespace();
            return Ok(());
        }
        self.error(message)
    }

    fn at_trim_close(&self) -> bool {
        self.rest().starts_with('-') && self.rest()[1..].starts_with(self.delims.right)
    }

    fn lex_action(&mut self) -> Result<(), LexError> {
        loop {
            let spaced = self.skip_whitespace();
            let line = self.line;

            if self.rest().starts_with(self.delims.right) {
                self.pos += self.delims.right.len();
                self.push(TokenKind::RightDelim, line, spaced);
                return Ok(());
            }
            if spaced && self.at_trim_close() {
                self.pos += 1 + self.delims.right.len();
                self.push(TokenKind::RightDelim, line, spaced);
                self.skip_whitespace();
                return Ok(());
            }

            let Some(c) = self.peek() else {
                return self.error("unclosed action");
            };

            let kind = match c {
                '"' => TokenKind::Str(self.lex_quoted()?),
                '`' => TokenKind::Str(self.lex_raw()?),
                '|' => {
                    self.bump();
                    TokenKind::Pipe
                }
                '(' => {
                    self.bump();
                    TokenKind::LeftParen
                }
                ')' => {
                    self.bump();
                    TokenKind::RightParen
                }
                ',' => {
                    self.bump();
                    TokenKind::Comma
                }
                ':' => {
                    self.bump();
                    if self.peek() != Some('=') {
                        return self.error("expected :=");
                    }
                    self.bump();
                    TokenKind::Declare
                }
                '=' => {
                    self.bump();
                    TokenKind::Assign
                }
                '$' => {
                    self.bump();
                    let name = self.take_while(is_ident_char);
                    TokenKind::Variable(format!("${name}"))
                }
                '.' if self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) => {
                    TokenKind::Number(self.lex_number()?)
                }
                '.' => {
                    self.bump();
                    if self.peek().is_some_and(is_ident_start) {
                        TokenKind::Field(self.take_while(is_ident_char))
                    } else {
                        TokenKind::Dot
                    }
                }
                '+' | '-' | '0'..='9' => TokenKind::Number(self.lex_number()?),
                c if is_ident_start(c) => {
                    let word = self.take_while(is_ident_char);
                    match word.as_str() {
                        "if" => TokenKind::Keyword(Keyword::If),
                        "else" => TokenKind::Keyword(Keyword::Else),
                        "end" => TokenKind::Keyword(Keyword::End),
                        "range" => TokenKind::Keyword(Keyword::Range),
                        "with" => TokenKind::Keyword(Keyword::With),
                        "true" => TokenKind::Bool(true),
                        "false" => TokenKind::Bool(false),
                        "nil" => TokenKind::Nil,
                        _ => TokenKind::Ident(word),
                    }
                }
                other => return self.error(format!("unexpected {other:?} in action")),
            };
            self.push(kind, line, spaced);
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        self.input[start..self.pos].to_string()
    }

    fn lex_number(&mut self) -> Result<String, LexError> {
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.bump();
        }
        let hex = self.rest().starts_with("0x") || self.rest().starts_with("0X");
        if hex {
            self.bump();
            self.bump();
            self.take_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.take_while(|c| c.is_ascii_digit() || c == '_');
            if self.peek() == Some('.') {
                self.bump();
                self.take_while(|c| c.is_ascii_digit() || c == '_');
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    self.bump();
                }
                self.take_while(|c| c.is_ascii_digit());
            }
        }
        let text = &self.input[start..self.pos];
        if text == "+" || text == "-" || self.peek().is_some_and(|c| c.is_alphanumeric()) {
            let tail = self.take_while(|c| c.is_alphanumeric());
            return self.error(format!("bad number syntax: {text}{tail:?}"));
        }
        Ok(text.to_string())
    }

    fn lex_raw(&mut self) -> Result<String, LexError> {
        self.bump();
        let Some(end) = self.rest().find('`') else {
            return self.error("unterminated raw quoted string");
        };
        let body = self.rest()[..end].to_string();
        for _ in 0..=body.chars().count() {
            self.bump();
        }
        Ok(body)
    }

    fn lex_quoted(&mut self) -> Result<String, LexError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => return self.error("unterminated quoted string"),
                Some('"') => return Ok(out),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        Some('\'') => '\'',
                        Some('x') => self.lex_hex_escape(2)?,
                        Some('u') => self.lex_hex_escape(4)?,
                        Some(other) => {
                            return self.error(format!("unknown escape sequence \\{other}"));
                        }
                        None => return self.error("unterminated quoted string"),
                    };
                    out.push(escaped);
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn lex_hex_escape(&mut self, digits: usize) -> Result<char, LexError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let Some(d) = self.bump().and_then(|c| c.to_digit(16)) else {
                return self.error("invalid hex escape");
            };
            code = code * 16 + d;
        }
        match char::from_u32(code) {
            Some(c) => Ok(c),
            None => self.error("invalid unicode escape"),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
