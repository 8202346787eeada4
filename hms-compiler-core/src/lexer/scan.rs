// Lexer (tokenizer) for Homescript
//
// A hand-written lexer that:
// - Tokenizes Homescript source into a stream of tokens
// - Recovers from errors by emitting Error tokens and continuing
// - Tracks line/column/byte positions for every token

use crate::diagnostic::Diagnostics;
use crate::source::{Position, Span};

use super::{Token, TokenKind};

/// Lexer state.
pub struct Lexer<'a> {
    source: &'a str,
    filename: String,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    /// Position of the next unconsumed character.
    pos: Position,
    /// Position of the most recently consumed character.
    prev: Position,
    diagnostics: Diagnostics,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str, filename: impl Into<String>) -> Self {
        Self {
            source,
            filename: filename.into(),
            chars: source.char_indices().peekable(),
            pos: Position::start(),
            prev: Position::start(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Tokenize the entire source and return tokens + diagnostics.
    ///
    /// The returned stream always ends with an `Eof` token.
    pub fn tokenize(mut self) -> (Vec<Token>, Diagnostics) {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        (tokens, self.diagnostics)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn peek_char2(&self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next().map(|(_, c)| c)
    }

    /// Consume one character, updating position tracking.
    fn advance(&mut self) -> Option<char> {
        let (_, ch) = self.chars.next()?;
        self.prev = self.pos;
        self.pos.byte += ch.len_utf8() as u32;
        if ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }
        Some(ch)
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(self.filename.clone(), start, self.prev)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == '/' && self.peek_char2() == Some('/') {
                while let Some(c) = self.peek_char() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else {
                break;
            }
        }
    }

    /// Get the next token.
    fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.pos;

        let Some(ch) = self.peek_char() else {
            return Token::new(TokenKind::Eof, Span::new(self.filename.clone(), start, start));
        };

        let kind = match ch {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            ',' => self.single(TokenKind::Comma),
            ':' => self.single(TokenKind::Colon),
            ';' => self.single(TokenKind::Semicolon),
            '#' => self.single(TokenKind::Hash),
            '?' => self.single(TokenKind::Question),
            '.' => {
                self.advance();
                if self.peek_char() == Some('.') {
                    self.advance();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '+' => self.with_eq(TokenKind::Plus, TokenKind::PlusEq),
            '-' => {
                self.advance();
                match self.peek_char() {
                    Some('>') => {
                        self.advance();
                        TokenKind::Arrow
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::MinusEq
                    }
                    _ => TokenKind::Minus,
                }
            }
            '*' => {
                self.advance();
                match self.peek_char() {
                    Some('*') => {
                        self.advance();
                        if self.peek_char() == Some('=') {
                            self.advance();
                            TokenKind::StarStarEq
                        } else {
                            TokenKind::StarStar
                        }
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::StarEq
                    }
                    _ => TokenKind::Star,
                }
            }
            '/' => self.with_eq(TokenKind::Slash, TokenKind::SlashEq),
            '%' => self.with_eq(TokenKind::Percent, TokenKind::PercentEq),
            '^' => self.with_eq(TokenKind::Caret, TokenKind::CaretEq),
            '!' => self.with_eq(TokenKind::Bang, TokenKind::BangEq),
            '=' => {
                self.advance();
                match self.peek_char() {
                    Some('=') => {
                        self.advance();
                        TokenKind::EqEq
                    }
                    Some('>') => {
                        self.advance();
                        TokenKind::FatArrow
                    }
                    _ => TokenKind::Eq,
                }
            }
            '<' => {
                self.advance();
                match self.peek_char() {
                    Some('<') => {
                        self.advance();
                        if self.peek_char() == Some('=') {
                            self.advance();
                            TokenKind::ShlEq
                        } else {
                            TokenKind::Shl
                        }
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::LtEq
                    }
                    _ => TokenKind::Lt,
                }
            }
            '>' => {
                self.advance();
                match self.peek_char() {
                    Some('>') => {
                        self.advance();
                        if self.peek_char() == Some('=') {
                            self.advance();
                            TokenKind::ShrEq
                        } else {
                            TokenKind::Shr
                        }
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::GtEq
                    }
                    _ => TokenKind::Gt,
                }
            }
            '&' => {
                self.advance();
                match self.peek_char() {
                    Some('&') => {
                        self.advance();
                        TokenKind::AmpAmp
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::AmpEq
                    }
                    _ => TokenKind::Amp,
                }
            }
            '|' => {
                self.advance();
                match self.peek_char() {
                    Some('|') => {
                        self.advance();
                        TokenKind::PipePipe
                    }
                    Some('=') => {
                        self.advance();
                        TokenKind::PipeEq
                    }
                    _ => TokenKind::Pipe,
                }
            }
            '"' | '\'' => return self.lex_string(start),
            '@' => {
                self.advance();
                if self.peek_char().is_some_and(is_ident_start) {
                    while self.peek_char().is_some_and(is_ident_continue) {
                        self.advance();
                    }
                    TokenKind::AtIdent
                } else {
                    self.diagnostics.error(
                        "Expected identifier after '@'",
                        self.span_from(start),
                    );
                    TokenKind::Error
                }
            }
            c if c.is_ascii_digit() => return self.lex_number(start),
            c if is_ident_start(c) => return self.lex_identifier(start),
            c => {
                self.advance();
                self.diagnostics.error(
                    format!("Unexpected character {c:?}"),
                    self.span_from(start),
                );
                TokenKind::Error
            }
        };

        Token::new(kind, self.span_from(start))
    }

    /// Consume one character and return `kind`.
    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Consume one character; if followed by `=`, return `with_eq` instead.
    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        self.advance();
        if self.peek_char() == Some('=') {
            self.advance();
            with_eq
        } else {
            plain
        }
    }

    fn lex_number(&mut self, start: Position) -> Token {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit() || c == '_') {
            self.advance();
        }

        // A '.' only continues the number if followed by a digit; `0..5`
        // must leave the '..' for the range operator.
        let mut kind = TokenKind::IntLiteral;
        if self.peek_char() == Some('.') && self.peek_char2().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit() || c == '_') {
                self.advance();
            }
            kind = TokenKind::FloatLiteral;
        }

        Token::new(kind, self.span_from(start))
    }

    fn lex_identifier(&mut self, start: Position) -> Token {
        while self.peek_char().is_some_and(is_ident_continue) {
            self.advance();
        }
        let span = self.span_from(start);
        let text = &self.source[span.start.byte as usize..=span.end.byte as usize];
        let kind = TokenKind::keyword_from_str(text).unwrap_or(TokenKind::Identifier);
        Token::new(kind, span)
    }

    fn lex_string(&mut self, start: Position) -> Token {
        let quote = self.advance().expect("caller peeked the opening quote");

        loop {
            match self.peek_char() {
                Option::None | Some('\n') => {
                    self.diagnostics
                        .error("Unterminated string literal", self.span_from(start));
                    return Token::new(TokenKind::Error, self.span_from(start));
                }
                Some('\\') => {
                    self.advance();
                    match self.advance() {
                        Some('n' | 't' | 'r' | '\\' | '\'' | '"') => {}
                        Some(c) => {
                            self.diagnostics.error(
                                format!("Invalid escape sequence '\\{c}'"),
                                self.span_from(start),
                            );
                        }
                        Option::None => {}
                    }
                }
                Some(c) if c == quote => {
                    self.advance();
                    return Token::new(TokenKind::StringLiteral, self.span_from(start));
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Decode a string literal's raw source text (including its surrounding
/// quotes) into its value. Escape errors were already reported by the
/// lexer; unknown escapes decode to the escaped character itself.
pub fn unescape_string(raw: &str) -> String {
    let inner = if raw.len() >= 2 {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            Option::None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = Lexer::new(source, "test.hms").tokenize();
        assert!(!diags.has_errors(), "lex errors: {:?}", diags);
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_and_idents() {
        assert_eq!(
            lex("fn main foo"),
            vec![
                TokenKind::Fn,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_singleton_ident() {
        let (tokens, diags) = Lexer::new("@power_state", "t.hms").tokenize();
        assert!(!diags.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::AtIdent);
        assert_eq!(tokens[0].text("@power_state"), "@power_state");
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            lex("** **= << <<= -> => .. ="),
            vec![
                TokenKind::StarStar,
                TokenKind::StarStarEq,
                TokenKind::Shl,
                TokenKind::ShlEq,
                TokenKind::Arrow,
                TokenKind::FatArrow,
                TokenKind::DotDot,
                TokenKind::Eq,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_range_does_not_eat_dots() {
        assert_eq!(
            lex("0..10"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::DotDot,
                TokenKind::IntLiteral,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn test_float_literal() {
        assert_eq!(lex("3.14"), vec![TokenKind::FloatLiteral, TokenKind::Eof]);
    }

    #[test]
    fn test_string_and_positions() {
        let source = "let x = 'hi';";
        let (tokens, diags) = Lexer::new(source, "t.hms").tokenize();
        assert!(!diags.has_errors());
        let string = &tokens[3];
        assert_eq!(string.kind, TokenKind::StringLiteral);
        assert_eq!(string.text(source), "'hi'");
        assert_eq!(string.span.start.column, 9);
        assert_eq!(string.span.end.column, 12);
        assert_eq!(string.span.start.byte, 8);
        assert_eq!(string.span.end.byte, 11);
    }

    #[test]
    fn test_unterminated_string() {
        let (tokens, diags) = Lexer::new("'oops", "t.hms").tokenize();
        assert!(diags.has_errors());
        assert_eq!(tokens[0].kind, TokenKind::Error);
    }

    #[test]
    fn test_line_tracking() {
        let (tokens, _) = Lexer::new("a\n  b", "t.hms").tokenize();
        assert_eq!(tokens[1].span.start.line, 2);
        assert_eq!(tokens[1].span.start.column, 3);
    }

    #[test]
    fn test_comments_skipped() {
        assert_eq!(
            lex("a // comment\nb"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape_string("'a\\nb'"), "a\nb");
        assert_eq!(unescape_string("\"x\\'y\""), "x'y");
    }
}
