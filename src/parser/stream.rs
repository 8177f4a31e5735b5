//! Token stream wrapper for the hand-written parser.

use crate::foundation::Span;
use crate::lexer::Token;
use crate::parser::ParseError;
use std::ops::Range;

/// Token stream with lookahead and span tracking.
///
/// Each token is paired with its byte range from the source, so parse
/// errors point at the offending text.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    file_id: u16,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream.
    pub fn new(tokens: &'src [(Token, Range<usize>)], file_id: u16) -> Self {
        Self {
            tokens,
            pos: 0,
            file_id,
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the consumed one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check whether the current token has the same discriminant as
    /// `expected` (payloads are ignored).
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Expect a specific token kind and consume it.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(ParseError::expected(
                expected.to_string(),
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Expect a word token and consume it, returning the lowercased name.
    pub fn expect_word(&mut self) -> Result<(String, Span), ParseError> {
        let span = self.current_span();
        match self.peek() {
            Some(Token::Word(word)) => {
                let word = word.clone();
                self.advance();
                Ok((word, span))
            }
            other => Err(ParseError::expected("name", other.cloned(), span)),
        }
    }

    /// Consume the current token if it matches; return whether it did.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// True at end of input.
    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Span of the current token, or a zero-length span at EOF.
    pub fn current_span(&self) -> Span {
        if let Some((_, range)) = self.tokens.get(self.pos) {
            Span::new(self.file_id, range.start as u32, range.end as u32, 0)
        } else if let Some((_, range)) = self.tokens.last() {
            Span::new(self.file_id, range.end as u32, range.end as u32, 0)
        } else {
            Span::zero(self.file_id)
        }
    }

    /// Span from the start of the token at `start_pos` to the end of the
    /// last consumed token.
    pub fn span_from(&self, start_pos: usize) -> Span {
        let start = self
            .tokens
            .get(start_pos)
            .map(|(_, range)| range.start)
            .unwrap_or(0);
        let end = if self.pos > 0 {
            self.tokens
                .get(self.pos - 1)
                .map(|(_, range)| range.end)
                .unwrap_or(start)
        } else {
            start
        };
        Span::new(self.file_id, start as u32, end as u32, 0)
    }

    /// Current position, for later use with [`TokenStream::span_from`].
    pub fn pos(&self) -> usize {
        self.pos
    }
}
