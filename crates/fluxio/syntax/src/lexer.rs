//! Lexer: tokenizes state machine source
//!
//! Produces a stream of tokens that the parser consumes. The source is
//! indentation sensitive, so besides keywords, identifiers, literals and
//! operators the lexer emits `Newline`, `Indent` and `Dedent` tokens.
//! Line breaks inside brackets and after a trailing backslash are joined.

use crate::ast::Position;
use crate::errors::{SyntaxError, SyntaxResult};

const TAB_WIDTH: usize = 8;

/// A token produced by the lexer
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The raw text of the token (decoded contents for string literals)
    pub text: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub col: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            col,
        }
    }

    pub fn pos(&self) -> Position {
        Position::new(self.line, self.col)
    }
}

/// Token types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Def,
    If,
    Elif,
    Else,
    Try,
    Except,
    As,
    Pass,
    Return,
    Raise,
    And,
    Or,
    Not,
    Is,
    In,
    True,
    False,
    None,
    /// A keyword of the host syntax with no meaning in state machines
    Reserved,

    // Identifiers and literals
    Identifier,
    StringLiteral,
    IntLiteral,
    FloatLiteral,

    // Structural
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    Colon,
    Comma,
    Dot,
    At,
    Arrow, // ->
    Assign,
    AugAssign,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,
    EqEq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,

    // Layout
    Newline,
    Indent,
    Dedent,

    // End of input
    Eof,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Def => write!(f, "def"),
            Self::If => write!(f, "if"),
            Self::Elif => write!(f, "elif"),
            Self::Else => write!(f, "else"),
            Self::Try => write!(f, "try"),
            Self::Except => write!(f, "except"),
            Self::As => write!(f, "as"),
            Self::Pass => write!(f, "pass"),
            Self::Return => write!(f, "return"),
            Self::Raise => write!(f, "raise"),
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
            Self::Not => write!(f, "not"),
            Self::Is => write!(f, "is"),
            Self::In => write!(f, "in"),
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::None => write!(f, "None"),
            Self::Reserved => write!(f, "reserved keyword"),
            Self::Identifier => write!(f, "identifier"),
            Self::StringLiteral => write!(f, "string literal"),
            Self::IntLiteral => write!(f, "integer"),
            Self::FloatLiteral => write!(f, "float"),
            Self::OpenParen => write!(f, "("),
            Self::CloseParen => write!(f, ")"),
            Self::OpenBracket => write!(f, "["),
            Self::CloseBracket => write!(f, "]"),
            Self::OpenBrace => write!(f, "{{"),
            Self::CloseBrace => write!(f, "}}"),
            Self::Colon => write!(f, ":"),
            Self::Comma => write!(f, ","),
            Self::Dot => write!(f, "."),
            Self::At => write!(f, "@"),
            Self::Arrow => write!(f, "->"),
            Self::Assign => write!(f, "="),
            Self::AugAssign => write!(f, "augmented assignment"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Percent => write!(f, "%"),
            Self::Pipe => write!(f, "|"),
            Self::EqEq => write!(f, "=="),
            Self::NotEq => write!(f, "!="),
            Self::Lt => write!(f, "<"),
            Self::LtE => write!(f, "<="),
            Self::Gt => write!(f, ">"),
            Self::GtE => write!(f, ">="),
            Self::Newline => write!(f, "newline"),
            Self::Indent => write!(f, "indent"),
            Self::Dedent => write!(f, "dedent"),
            Self::Eof => write!(f, "end of input"),
        }
    }
}

/// Lexer for state machine source
pub struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    indents: Vec<usize>,
    bracket_depth: usize,
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer from input text
    pub fn new(input: &str) -> Self {
        Self {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            indents: vec![0],
            bracket_depth: 0,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> SyntaxResult<Vec<Token>> {
        let mut tokens = Vec::new();

        loop {
            if self.at_line_start && self.bracket_depth == 0 {
                self.read_indentation(&mut tokens)?;
            }
            self.skip_whitespace_and_comments()?;

            if self.pos >= self.input.len() {
                self.finish(&mut tokens);
                break;
            }

            if self.input[self.pos] == '\n' {
                let (line, col) = (self.line, self.col);
                self.advance();
                if self.bracket_depth == 0 {
                    if needs_newline(&tokens) {
                        tokens.push(Token::new(TokenKind::Newline, "", line, col));
                    }
                    self.at_line_start = true;
                }
                continue;
            }

            let token = self.next_token()?;
            tokens.push(token);
        }

        Ok(tokens)
    }

    fn finish(&mut self, tokens: &mut Vec<Token>) {
        if needs_newline(tokens) {
            tokens.push(Token::new(TokenKind::Newline, "", self.line, self.col));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            tokens.push(Token::new(TokenKind::Dedent, "", self.line, self.col));
        }
        tokens.push(Token::new(TokenKind::Eof, "", self.line, self.col));
    }

    /// Measure leading whitespace and emit `Indent`/`Dedent` tokens.
    /// Blank and comment-only lines do not affect indentation.
    fn read_indentation(&mut self, tokens: &mut Vec<Token>) -> SyntaxResult<()> {
        let mut width = 0;
        while let Some(ch) = self.peek_at(0) {
            match ch {
                ' ' => width += 1,
                '\t' => width = (width / TAB_WIDTH + 1) * TAB_WIDTH,
                '\x0c' => width = 0,
                _ => break,
            }
            self.advance();
        }

        match self.peek_at(0) {
            None | Some('\n') | Some('#') | Some('\r') => return Ok(()),
            _ => {}
        }
        self.at_line_start = false;

        let current = self.indents.last().copied().unwrap_or(0);
        if width > current {
            self.indents.push(width);
            tokens.push(Token::new(TokenKind::Indent, "", self.line, self.col));
        } else if width < current {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                tokens.push(Token::new(TokenKind::Dedent, "", self.line, self.col));
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(SyntaxError::Indentation {
                    line: self.line,
                    message: "unindent does not match any outer indentation level".into(),
                });
            }
        }
        Ok(())
    }

    fn next_token(&mut self) -> SyntaxResult<Token> {
        let ch = self.input[self.pos];
        let line = self.line;
        let col = self.col;

        let single = |lexer: &mut Self, kind: TokenKind| {
            lexer.advance();
            Ok(Token::new(kind, ch.to_string(), line, col))
        };

        match ch {
            '(' => {
                self.bracket_depth += 1;
                single(self, TokenKind::OpenParen)
            }
            '[' => {
                self.bracket_depth += 1;
                single(self, TokenKind::OpenBracket)
            }
            '{' => {
                self.bracket_depth += 1;
                single(self, TokenKind::OpenBrace)
            }
            ')' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                single(self, TokenKind::CloseParen)
            }
            ']' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                single(self, TokenKind::CloseBracket)
            }
            '}' => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
                single(self, TokenKind::CloseBrace)
            }
            ':' => single(self, TokenKind::Colon),
            ',' => single(self, TokenKind::Comma),
            '@' => single(self, TokenKind::At),
            '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.read_number(),
            '.' => single(self, TokenKind::Dot),
            '-' if self.peek_at(1) == Some('>') => self.operator("->", TokenKind::Arrow),
            '=' if self.peek_at(1) == Some('=') => self.operator("==", TokenKind::EqEq),
            '!' if self.peek_at(1) == Some('=') => self.operator("!=", TokenKind::NotEq),
            '<' if self.peek_at(1) == Some('=') => self.operator("<=", TokenKind::LtE),
            '>' if self.peek_at(1) == Some('=') => self.operator(">=", TokenKind::GtE),
            '=' => single(self, TokenKind::Assign),
            '<' => single(self, TokenKind::Lt),
            '>' => single(self, TokenKind::Gt),
            '+' | '-' | '*' | '/' | '%' | '|' => self.read_arithmetic(ch),
            ';' => Err(SyntaxError::ParseError {
                line,
                col,
                message: "Semicolon-separated statements are not supported".into(),
            }),
            '"' | '\'' => self.read_string_literal(false),
            c if c.is_ascii_digit() => self.read_number(),
            c if c.is_alphabetic() || c == '_' => self.read_identifier_or_keyword(),
            _ => Err(SyntaxError::ParseError {
                line,
                col,
                message: format!("Unexpected character: '{}'", ch),
            }),
        }
    }

    fn operator(&mut self, text: &str, kind: TokenKind) -> SyntaxResult<Token> {
        let (line, col) = (self.line, self.col);
        for _ in text.chars() {
            self.advance();
        }
        Ok(Token::new(kind, text, line, col))
    }

    fn read_arithmetic(&mut self, ch: char) -> SyntaxResult<Token> {
        let (line, col) = (self.line, self.col);
        let next = self.peek_at(1);
        if (ch == '*' || ch == '/') && next == Some(ch) {
            return Err(SyntaxError::ParseError {
                line,
                col,
                message: format!("Operator '{}{}' is not supported", ch, ch),
            });
        }
        if next == Some('=') {
            return self.operator(&format!("{}=", ch), TokenKind::AugAssign);
        }
        let kind = match ch {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            _ => TokenKind::Pipe,
        };
        self.advance();
        Ok(Token::new(kind, ch.to_string(), line, col))
    }

    fn read_string_literal(&mut self, raw: bool) -> SyntaxResult<Token> {
        let line = self.line;
        let col = self.col;
        let quote = self.input[self.pos];
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let delimiter_len = if triple { 3 } else { 1 };
        for _ in 0..delimiter_len {
            self.advance();
        }

        let unterminated = || SyntaxError::ParseError {
            line,
            col,
            message: "Unterminated string literal".into(),
        };

        let mut text = String::new();
        loop {
            let Some(ch) = self.peek_at(0) else {
                return Err(unterminated());
            };

            if ch == quote
                && (!triple || (self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote)))
            {
                for _ in 0..delimiter_len {
                    self.advance();
                }
                break;
            }
            if ch == '\n' && !triple {
                return Err(unterminated());
            }

            if ch == '\\' && !raw {
                self.advance();
                let Some(escaped) = self.peek_at(0) else {
                    return Err(unterminated());
                };
                self.advance();
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    '\n' => {}
                    'x' => text.push(self.read_hex_escape(2, line, col)?),
                    'u' => text.push(self.read_hex_escape(4, line, col)?),
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
                continue;
            }

            if ch == '\\' && raw && self.peek_at(1) == Some(quote) {
                text.push('\\');
                text.push(quote);
                self.advance();
                self.advance();
                continue;
            }

            text.push(ch);
            self.advance();
        }

        Ok(Token::new(TokenKind::StringLiteral, text, line, col))
    }

    fn read_hex_escape(&mut self, digits: usize, line: usize, col: usize) -> SyntaxResult<char> {
        let mut code = String::new();
        for _ in 0..digits {
            match self.peek_at(0) {
                Some(c) if c.is_ascii_hexdigit() => {
                    code.push(c);
                    self.advance();
                }
                _ => break,
            }
        }
        u32::from_str_radix(&code, 16)
            .ok()
            .filter(|_| code.len() == digits)
            .and_then(char::from_u32)
            .ok_or_else(|| SyntaxError::ParseError {
                line,
                col,
                message: format!("Invalid escape sequence in string literal: '{}'", code),
            })
    }

    fn read_number(&mut self) -> SyntaxResult<Token> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();
        let mut is_float = false;

        self.read_digits(&mut text);
        if self.peek_at(0) == Some('.') {
            is_float = true;
            text.push('.');
            self.advance();
            self.read_digits(&mut text);
        }
        if matches!(self.peek_at(0), Some('e') | Some('E')) {
            let sign = self.peek_at(1);
            let has_sign = matches!(sign, Some('+') | Some('-'));
            let digit_at = if has_sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                text.push('e');
                self.advance();
                if has_sign {
                    text.push(self.input[self.pos]);
                    self.advance();
                }
                self.read_digits(&mut text);
            }
        }

        if self.peek_at(0).is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(SyntaxError::ParseError {
                line,
                col,
                message: format!("Invalid numeric literal starting with '{}'", text),
            });
        }

        let kind = if is_float {
            TokenKind::FloatLiteral
        } else {
            TokenKind::IntLiteral
        };
        Ok(Token::new(kind, text, line, col))
    }

    fn read_digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek_at(0) {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c != '_' {
                break;
            }
            self.advance();
        }
    }

    fn read_identifier_or_keyword(&mut self) -> SyntaxResult<Token> {
        let line = self.line;
        let col = self.col;
        let mut text = String::new();

        while self.pos < self.input.len()
            && (self.input[self.pos].is_alphanumeric() || self.input[self.pos] == '_')
        {
            text.push(self.input[self.pos]);
            self.advance();
        }

        if matches!(self.peek_at(0), Some('"') | Some('\'')) && text.len() <= 2 {
            return match text.to_ascii_lowercase().as_str() {
                "r" => self.read_string_literal(true),
                "u" => self.read_string_literal(false),
                prefix => Err(SyntaxError::ParseError {
                    line,
                    col,
                    message: format!("String prefix '{}' is not supported", prefix),
                }),
            };
        }

        let kind = match text.as_str() {
            "def" => TokenKind::Def,
            "if" => TokenKind::If,
            "elif" => TokenKind::Elif,
            "else" => TokenKind::Else,
            "try" => TokenKind::Try,
            "except" => TokenKind::Except,
            "as" => TokenKind::As,
            "pass" => TokenKind::Pass,
            "return" => TokenKind::Return,
            "raise" => TokenKind::Raise,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "is" => TokenKind::Is,
            "in" => TokenKind::In,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "None" => TokenKind::None,
            "while" | "for" | "with" | "class" | "import" | "from" | "lambda" | "finally"
            | "global" | "nonlocal" | "del" | "yield" | "async" | "await" | "assert"
            | "break" | "continue" => TokenKind::Reserved,
            _ => TokenKind::Identifier,
        };

        Ok(Token::new(kind, text, line, col))
    }

    fn skip_whitespace_and_comments(&mut self) -> SyntaxResult<()> {
        while self.pos < self.input.len() {
            let ch = self.input[self.pos];
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\x0c' {
                self.advance();
            } else if ch == '\n' && self.bracket_depth > 0 {
                self.advance();
            } else if ch == '#' {
                // Line comment
                while self.pos < self.input.len() && self.input[self.pos] != '\n' {
                    self.advance();
                }
            } else if ch == '\\' {
                let next = match self.peek_at(1) {
                    Some('\r') => self.peek_at(2),
                    other => other,
                };
                if next != Some('\n') {
                    return Err(SyntaxError::ParseError {
                        line: self.line,
                        col: self.col,
                        message: "Unexpected character after line continuation".into(),
                    });
                }
                while self.input[self.pos] != '\n' {
                    self.advance();
                }
                self.advance();
            } else {
                break;
            }
        }
        Ok(())
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            if self.input[self.pos] == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
            self.pos += 1;
        }
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }
}

fn needs_newline(tokens: &[Token]) -> bool {
    tokens.last().is_some_and(|t| {
        !matches!(
            t.kind,
            TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent
        )
    })
}
