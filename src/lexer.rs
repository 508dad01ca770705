use std::{fmt, str::Chars};

use crate::{
    diagnostic::{DiagnosticKind, Diagnostics},
    token::{Span, Token, TokenKind},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnterminatedString,
    UnterminatedComment,
    InvalidCharacter(char),
    InvalidEscape(char),
    InvalidNumber,
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexErrorKind::UnterminatedString => write!(f, "unterminated string literal"),
            LexErrorKind::UnterminatedComment => write!(f, "unterminated block comment"),
            LexErrorKind::InvalidCharacter(ch) => {
                write!(f, "invalid character `{}`", ch.escape_debug())
            }
            LexErrorKind::InvalidEscape(ch) => {
                write!(f, "unknown escape sequence `\\{}`", ch.escape_debug())
            }
            LexErrorKind::InvalidNumber => write!(f, "malformed number literal"),
        }
    }
}

pub type LexerResult<'t> = Option<Result<Token<'t>, LexError>>;

/// Lazily turns source text into [Token]s, ending with a single
/// [TokenKind::Eof].
#[derive(Debug)]
pub struct Lexer<'src> {
    chars: Chars<'src>,
    text: &'src str,
    byte_pos: usize,
    finished: bool,
}

impl<'src> Lexer<'src> {
    /// Creates a new [Lexer] from the given source text.
    pub fn new(text: &'src str) -> Self {
        Self {
            chars: text.chars(),
            text,
            byte_pos: 0,
            finished: false,
        }
    }

    #[inline]
    /// Returns the next [char] in the source text without advancing.
    fn peek(&self) -> Option<char> {
        self.chars.clone().next()
    }

    #[inline]
    /// Returns the [char] after the next one without advancing.
    fn peek_second(&self) -> Option<char> {
        let mut chars = self.chars.clone();
        chars.next();
        chars.next()
    }

    #[inline]
    /// Consumes the next [char] in the source text.
    fn next(&mut self) {
        if let Some(ch) = self.chars.next() {
            self.byte_pos += ch.len_utf8();
        }
    }

    #[inline]
    fn is_peek(&self, ch: char) -> bool {
        self.peek().is_some_and(|peek| peek == ch)
    }

    #[inline]
    /// Consumes the next [char] if it is the given one.
    fn try_next(&mut self, ch: char) -> bool {
        if self.is_peek(ch) {
            self.next();
            true
        } else {
            false
        }
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.next();
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.byte_pos)
    }

    fn error(&self, start: usize, kind: LexErrorKind) -> LexError {
        LexError {
            kind,
            span: self.span_from(start),
        }
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            self.skip_while(char::is_whitespace);

            if !self.is_peek('/') {
                return Ok(());
            }

            let start = self.byte_pos;
            match self.peek_second() {
                Some('/') => self.skip_while(|ch| ch != '\n'),
                Some('*') => {
                    self.next();
                    self.next();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(self.error(start, LexErrorKind::UnterminatedComment))
                            }
                            Some('*') if self.peek_second() == Some('/') => {
                                self.next();
                                self.next();
                                break;
                            }
                            Some(_) => self.next(),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    #[inline]
    fn create_token(&self, start: usize, kind: TokenKind) -> Token<'src> {
        Token {
            kind,
            span: self.span_from(start),
            text: &self.text[start..self.byte_pos],
        }
    }

    #[inline]
    /// Consumes one character and creates a [Token] of the given kind.
    fn create_simple_token(&mut self, kind: TokenKind) -> Token<'src> {
        let start = self.byte_pos;
        self.next();
        self.create_token(start, kind)
    }

    /// Creates a two-character token when the second character matches,
    /// a one-character token otherwise.
    fn create_pair_token(
        &mut self,
        second: char,
        pair: TokenKind,
        single: TokenKind,
    ) -> Token<'src> {
        let start = self.byte_pos;
        self.next();
        if self.try_next(second) {
            self.create_token(start, pair)
        } else {
            self.create_token(start, single)
        }
    }

    fn next_identifier_token(&mut self) -> Token<'src> {
        let start = self.byte_pos;
        self.skip_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');

        let kind =
            TokenKind::keyword(&self.text[start..self.byte_pos]).unwrap_or(TokenKind::Identifier);
        self.create_token(start, kind)
    }

    fn skip_suffix(&mut self) {
        self.skip_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    }

    /// Lexes an integer or float literal, including any type suffix.
    fn next_number_token(&mut self) -> Result<Token<'src>, LexError> {
        let start = self.byte_pos;

        if self.is_peek('0') {
            let radix_digits: Option<fn(char) -> bool> = match self.peek_second() {
                Some('x') => Some(|ch: char| ch.is_ascii_hexdigit()),
                Some('b') => Some(|ch: char| matches!(ch, '0' | '1')),
                Some('o') => Some(|ch: char| matches!(ch, '0'..='7')),
                _ => None,
            };

            if let Some(valid) = radix_digits {
                self.next();
                self.next();
                let digits_start = self.byte_pos;
                self.skip_while(|ch| valid(ch) || ch == '_');

                // only the base prefix
                if self.text[digits_start..self.byte_pos].replace('_', "").is_empty() {
                    self.skip_suffix();
                    return Err(self.error(start, LexErrorKind::InvalidNumber));
                }

                self.skip_suffix();
                return Ok(self.create_token(start, TokenKind::Integer));
            }
        }

        self.skip_while(|ch| ch.is_ascii_digit() || ch == '_');

        // `1..2` is a range, `1.5` a float
        let is_float =
            self.is_peek('.') && self.peek_second().is_some_and(|ch| ch.is_ascii_digit());
        if !is_float {
            self.skip_suffix();
            return Ok(self.create_token(start, TokenKind::Integer));
        }

        self.next();
        self.skip_while(|ch| ch.is_ascii_digit() || ch == '_');

        if matches!(self.peek(), Some('e' | 'E')) {
            self.next();
            if !self.try_next('-') {
                self.try_next('+');
            }

            let exponent_start = self.byte_pos;
            self.skip_while(|ch| ch.is_ascii_digit());
            if self.byte_pos == exponent_start {
                self.skip_suffix();
                return Err(self.error(start, LexErrorKind::InvalidNumber));
            }
        }

        self.skip_suffix();
        Ok(self.create_token(start, TokenKind::Float))
    }

    fn next_string_token(&mut self) -> Result<Token<'src>, LexError> {
        let start = self.byte_pos;
        self.next();

        let mut invalid_escape = None;
        loop {
            match self.peek() {
                None => return Err(self.error(start, LexErrorKind::UnterminatedString)),
                Some('"') => {
                    self.next();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.byte_pos;
                    self.next();
                    match self.peek() {
                        None => return Err(self.error(start, LexErrorKind::UnterminatedString)),
                        Some(ch) => {
                            self.next();
                            if !is_valid_escape(ch) && invalid_escape.is_none() {
                                invalid_escape = Some(LexError {
                                    kind: LexErrorKind::InvalidEscape(ch),
                                    span: self.span_from(escape_start),
                                });
                            }
                        }
                    }
                }
                Some(_) => self.next(),
            }
        }

        match invalid_escape {
            Some(err) => Err(err),
            None => Ok(self.create_token(start, TokenKind::String)),
        }
    }

    /// Used to lex the next [Token].
    pub fn next_token(&mut self) -> LexerResult<'src> {
        if let Err(err) = self.skip_trivia() {
            return Some(Err(err));
        }

        let start = self.byte_pos;
        let Some(ch) = self.peek() else {
            if self.finished {
                return None;
            }
            self.finished = true;
            return Some(Ok(self.create_token(start, TokenKind::Eof)));
        };

        let token = match ch {
            'a'..='z' | 'A'..='Z' | '_' => self.next_identifier_token(),
            '0'..='9' => return Some(self.next_number_token()),
            '"' => return Some(self.next_string_token()),

            '+' => self.create_simple_token(TokenKind::Plus),
            '-' => self.create_simple_token(TokenKind::Minus),
            '*' => self.create_simple_token(TokenKind::Asterisk),
            '/' => self.create_simple_token(TokenKind::Slash),
            '%' => self.create_simple_token(TokenKind::Percent),

            '=' => self.create_pair_token('=', TokenKind::Equal, TokenKind::Assign),
            '!' => self.create_pair_token('=', TokenKind::Unequal, TokenKind::Bang),
            '<' => self.create_pair_token('=', TokenKind::LessEqual, TokenKind::LessThan),
            '>' => self.create_pair_token('=', TokenKind::GreaterEqual, TokenKind::GreaterThan),

            '&' | '|' | '.' if self.peek_second() == Some(ch) => {
                self.next();
                self.next();
                let kind = match ch {
                    '&' => TokenKind::AndAnd,
                    '|' => TokenKind::OrOr,
                    _ => TokenKind::DotDot,
                };
                self.create_token(start, kind)
            }

            '(' => self.create_simple_token(TokenKind::LParen),
            ')' => self.create_simple_token(TokenKind::RParen),
            '{' => self.create_simple_token(TokenKind::LBrace),
            '}' => self.create_simple_token(TokenKind::RBrace),
            ',' => self.create_simple_token(TokenKind::Comma),
            ':' => self.create_simple_token(TokenKind::Colon),
            ';' => self.create_simple_token(TokenKind::Semicolon),

            _ => {
                self.next();
                return Some(Err(self.error(start, LexErrorKind::InvalidCharacter(ch))));
            }
        };

        Some(Ok(token))
    }

    /// Lexes the whole input, reporting every [LexError] and skipping past it.
    pub fn tokenize(self, diagnostics: &mut Diagnostics) -> Vec<Token<'src>> {
        let mut tokens = Vec::new();

        for token in self {
            match token {
                Ok(token) => tokens.push(token),
                Err(err) => diagnostics.report(DiagnosticKind::Lex(err.kind), err.span),
            }
        }

        tokens
    }
}

impl<'src> Iterator for Lexer<'src> {
    type Item = Result<Token<'src>, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

fn is_valid_escape(ch: char) -> bool {
    matches!(ch, 'n' | 't' | 'r' | '\\' | '"' | '0')
}

/// Decodes the text of a [TokenKind::String] token, quotes included.
pub fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .map(|rest| rest.strip_suffix('"').unwrap_or(rest))
        .unwrap_or(raw);

    let mut value = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            value.push(ch);
            continue;
        }

        match chars.next() {
            Some('n') => value.push('\n'),
            Some('t') => value.push('\t'),
            Some('r') => value.push('\r'),
            Some('0') => value.push('\0'),
            Some('\\') => value.push('\\'),
            Some('"') => value.push('"'),
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => value.push('\\'),
        }
    }

    value
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::token::TokenKind::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .map(|token| token.map(|token| token.kind))
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn all_tokens() {
        let input = "proc for in if else return let true false hello 12 1.5 \"s\" \
                     + - * / % = ! == != < <= > >= && || .. ( ) { } , : ;";
        let expected = [
            Proc, For, In, If, Else, Return, Let, True, False, Identifier, Integer, Float, String,
            Plus, Minus, Asterisk, Slash, Percent, Assign, Bang, Equal, Unequal, LessThan,
            LessEqual, GreaterThan, GreaterEqual, AndAnd, OrOr, DotDot, LParen, RParen, LBrace,
            RBrace, Comma, Colon, Semicolon, Eof,
        ];

        assert_eq!(kinds(input), expected);
    }

    #[test]
    fn spans_and_text() {
        let tokens: Vec<_> = Lexer::new("let x = 0xFFu8;")
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            tokens[3],
            Token {
                kind: Integer,
                span: Span::new(8, 14),
                text: "0xFFu8",
            }
        );
        assert_eq!(tokens.last().map(|t| t.span), Some(Span::new(15, 15)));
    }

    #[test]
    fn range_is_not_a_float() {
        assert_eq!(
            kinds("2..(num / 2)"),
            [Integer, DotDot, LParen, Identifier, Slash, Integer, RParen, Eof]
        );
        assert_eq!(kinds("1.25e-3f64 7u64 0b1010 0o17"), [Float, Integer, Integer, Integer, Eof]);
    }

    #[test]
    fn comments_are_skipped() {
        let input = "/* block\n comment */ proc // line comment\n main";
        assert_eq!(kinds(input), [Proc, Identifier, Eof]);
    }

    #[test]
    fn errors_do_not_stop_lexing() {
        let mut diagnostics = Diagnostics::new(10);
        let tokens = Lexer::new("a @ b # c").tokenize(&mut diagnostics);

        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, ["a", "b", "c", ""]);

        let errors: Vec<_> = diagnostics.iter().map(|d| (d.kind.clone(), d.span)).collect();
        assert_eq!(
            errors,
            [
                (DiagnosticKind::Lex(LexErrorKind::InvalidCharacter('@')), Span::new(2, 3)),
                (DiagnosticKind::Lex(LexErrorKind::InvalidCharacter('#')), Span::new(6, 7)),
            ]
        );
    }

    #[test]
    fn invalid_input() {
        let cases = [
            ("\"abc", LexErrorKind::UnterminatedString, Span::new(0, 4)),
            ("/* abc", LexErrorKind::UnterminatedComment, Span::new(0, 6)),
            ("\"a\\qb\"", LexErrorKind::InvalidEscape('q'), Span::new(2, 4)),
            ("0x", LexErrorKind::InvalidNumber, Span::new(0, 2)),
            ("1.5e", LexErrorKind::InvalidNumber, Span::new(0, 4)),
            ("$", LexErrorKind::InvalidCharacter('$'), Span::new(0, 1)),
        ];

        for (input, kind, span) in cases {
            let mut lexer = Lexer::new(input);
            assert_eq!(lexer.next_token(), Some(Err(LexError { kind, span })), "input: {}", input);
        }
    }

    #[test]
    fn lexer_is_finite() {
        let mut lexer = Lexer::new("x");
        assert!(matches!(lexer.next_token(), Some(Ok(_))));
        assert!(matches!(lexer.next_token(), Some(Ok(Token { kind: Eof, .. }))));
        assert_eq!(lexer.next_token(), None);
        assert_eq!(lexer.next_token(), None);
    }

    #[test]
    fn unescape_string() {
        assert_eq!(unescape(r#""a\tb\n\"c\"""#), "a\tb\n\"c\"");
        assert_eq!(unescape(r#""\\0""#), "\\0");
    }
}
