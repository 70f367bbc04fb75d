//! Hand-written scanner for Reso source text.
//!
//! Produces a flat [`Token`] stream with 1-based line/column spans. The
//! scanner is written over an indexed character buffer because `..` vs. a
//! float literal needs two characters of lookahead.

mod token;

pub use token::*;

use std::{error::Error, fmt::Display};

use unescape::unescape;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub span: Span,
    /// A malformed literal is distinguished from other scan failures so the
    /// driver can classify the diagnostic.
    pub invalid_literal: bool,
}

impl LexError {
    fn new(message: impl ToString, span: Span) -> LexError {
        LexError {
            message: message.to_string(),
            span,
            invalid_literal: false,
        }
    }

    fn literal(message: impl ToString, span: Span) -> LexError {
        LexError {
            message: message.to_string(),
            span,
            invalid_literal: true,
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}: {}", self.span, self.message))
    }
}

impl Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    pub fn new(input: &str) -> Lexer {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            tokens: vec![],
        }
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.eat_trivia();
            let Some(next) = self.peek() else {
                return Ok(self.tokens);
            };

            match next {
                'a'..='z' | 'A'..='Z' | '_' => self.lex_word(),
                '0'..='9' => self.lex_number()?,
                '"' => self.lex_string()?,
                '\'' => self.lex_character()?,
                _ => self.lex_operator()?,
            }
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_ahead(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let next = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if next == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(next)
    }

    fn push(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    /// Skip whitespace and `//` line comments.
    fn eat_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_ahead(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn lex_word(&mut self) {
        let span = self.span();
        let mut word = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.advance();
            } else {
                break;
            }
        }

        match TokenKind::keyword(&word) {
            Some(keyword) => self.push(keyword, span),
            None => self.push(TokenKind::Ident(word), span),
        }
    }

    fn lex_number(&mut self) -> LexResult<()> {
        let span = self.span();
        let mut digits = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.advance();
            } else {
                break;
            }
        }

        // A '.' continues the literal only when followed by a digit; `0..n`
        // keeps the integer and leaves the range operator in the stream.
        let is_float = self.peek() == Some('.')
            && self
                .peek_ahead(1)
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false);

        if is_float {
            digits.push('.');
            self.advance();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    if c != '_' {
                        digits.push(c);
                    }
                    self.advance();
                } else {
                    break;
                }
            }

            let value = digits
                .parse::<f64>()
                .map_err(|_| LexError::literal(format!("invalid float literal '{digits}'"), span))?;
            self.push(TokenKind::Float(value), span);
        } else {
            let value = digits.parse::<u128>().map_err(|_| {
                LexError::literal(format!("integer literal '{digits}' is out of range"), span)
            })?;
            if value > u64::MAX as u128 {
                return Err(LexError::literal(
                    format!("integer literal '{digits}' does not fit any integer type"),
                    span,
                ));
            }
            self.push(TokenKind::Integer(value), span);
        }

        Ok(())
    }

    /// Collect the raw body of a quoted literal, keeping escape sequences
    /// intact for `unescape` to resolve.
    fn lex_quoted_body(&mut self, quote: char, span: Span) -> LexResult<String> {
        self.advance();
        let mut raw = String::new();

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::new(
                        format!("unterminated {quote} literal"),
                        span,
                    ));
                }
                Some('\\') => {
                    raw.push('\\');
                    self.advance();
                    if let Some(escaped) = self.advance() {
                        raw.push(escaped);
                    }
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Ok(raw);
                }
                Some(c) => {
                    raw.push(c);
                    self.advance();
                }
            }
        }
    }

    fn lex_string(&mut self) -> LexResult<()> {
        let span = self.span();
        let raw = self.lex_quoted_body('"', span)?;
        let value = unescape(&raw)
            .ok_or_else(|| LexError::literal(format!("invalid escape in string \"{raw}\""), span))?;
        self.push(TokenKind::Str(value), span);
        Ok(())
    }

    fn lex_character(&mut self) -> LexResult<()> {
        let span = self.span();
        let raw = self.lex_quoted_body('\'', span)?;
        let value = unescape(&raw)
            .ok_or_else(|| LexError::literal(format!("invalid escape in character '{raw}'"), span))?;

        let mut chars = value.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                self.push(TokenKind::Character(c), span);
                Ok(())
            }
            _ => Err(LexError::literal(
                format!("character literal '{raw}' must contain exactly one character"),
                span,
            )),
        }
    }

    fn lex_operator(&mut self) -> LexResult<()> {
        let span = self.span();
        let Some(first) = self.advance() else {
            unreachable!("lex_operator called at end of input");
        };

        let two = |lexer: &Lexer, c: char| lexer.peek() == Some(c);

        let kind = match first {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ';' => TokenKind::Semicolon,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '+' => TokenKind::Plus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '^' => TokenKind::Caret,
            '.' if two(self, '.') => {
                self.advance();
                TokenKind::DotDot
            }
            '.' => TokenKind::Dot,
            '-' if two(self, '>') => {
                self.advance();
                TokenKind::Arrow
            }
            '-' => TokenKind::Minus,
            '=' if two(self, '=') => {
                self.advance();
                TokenKind::Eq
            }
            '=' => TokenKind::Assign,
            '!' if two(self, '=') => {
                self.advance();
                TokenKind::NotEq
            }
            '!' => TokenKind::Bang,
            '<' if two(self, '=') => {
                self.advance();
                TokenKind::Le
            }
            '<' if two(self, '<') => {
                self.advance();
                TokenKind::Shl
            }
            '<' => TokenKind::Lt,
            '>' if two(self, '=') => {
                self.advance();
                TokenKind::Ge
            }
            '>' if two(self, '>') => {
                self.advance();
                TokenKind::Shr
            }
            '>' => TokenKind::Gt,
            '&' if two(self, '&') => {
                self.advance();
                TokenKind::AmpAmp
            }
            '&' => TokenKind::Ampersand,
            '|' if two(self, '|') => {
                self.advance();
                TokenKind::PipePipe
            }
            '|' => TokenKind::Pipe,
            other => {
                return Err(LexError::new(
                    format!("unexpected character '{other}'"),
                    span,
                ));
            }
        };

        self.push(kind, span);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .lex()
            .expect("lexing failed")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            kinds("fn main resource foo"),
            vec![
                TokenKind::Fn,
                TokenKind::Ident("main".into()),
                TokenKind::Resource,
                TokenKind::Ident("foo".into()),
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("42 3.25 1_000"),
            vec![
                TokenKind::Integer(42),
                TokenKind::Float(3.25),
                TokenKind::Integer(1000),
            ]
        );
    }

    #[test]
    fn test_range_is_not_a_float() {
        assert_eq!(
            kinds("0..10"),
            vec![
                TokenKind::Integer(0),
                TokenKind::DotDot,
                TokenKind::Integer(10),
            ]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("-> .. == != <= >= << >> && || = < >"),
            vec![
                TokenKind::Arrow,
                TokenKind::DotDot,
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::AmpAmp,
                TokenKind::PipePipe,
                TokenKind::Assign,
                TokenKind::Lt,
                TokenKind::Gt,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds("\"a\\nb\""),
            vec![TokenKind::Str("a\nb".into())]
        );
    }

    #[test]
    fn test_char_literal() {
        assert_eq!(kinds("'x'"), vec![TokenKind::Character('x')]);
        assert!(Lexer::new("'xy'").lex().is_err());
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("1 // ignored\n2"),
            vec![TokenKind::Integer(1), TokenKind::Integer(2)]
        );
    }

    #[test]
    fn test_spans_track_lines() {
        let tokens = Lexer::new("fn\n  foo").lex().expect("lexing failed");
        assert_eq!(tokens[0].span, Span { line: 1, col: 1 });
        assert_eq!(tokens[1].span, Span { line: 2, col: 3 });
    }

    #[test]
    fn test_oversized_integer_is_rejected() {
        let result = Lexer::new("999999999999999999999999999999").lex();
        assert!(matches!(result, Err(LexError { invalid_literal: true, .. })));
    }
}
