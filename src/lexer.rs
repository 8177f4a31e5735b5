//! Lexical analysis for YASDL.
//!
//! Tokenization is built on logos. YASDL names are case-insensitive:
//! every word is lowercased during lexing, and keyword recognition runs on
//! the lowercased form (so `Schema`, `SCHEMA` and `schema` are the same
//! keyword). Original casing survives only in the source map, which is
//! what diagnostics quote.
//!
//! Strings come in single, double, and triple-quoted forms with backslash
//! escapes. `#` starts a line comment.

use logos::Logos;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// YASDL token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    // === Keywords (case-insensitive, like all YASDL names) ===
    /// Keyword `schema`
    #[token("schema", ignore(ascii_case))]
    Schema,
    /// Keyword `fieldset`
    #[token("fieldset", ignore(ascii_case))]
    Fieldset,
    /// Keyword `field`
    #[token("field", ignore(ascii_case))]
    Field,
    /// Keyword `index`
    #[token("index", ignore(ascii_case))]
    Index,
    /// Keyword `constraint`
    #[token("constraint", ignore(ascii_case))]
    Constraint,
    /// Keyword `fields`
    #[token("fields", ignore(ascii_case))]
    Fields,
    /// Keyword `use`
    #[token("use", ignore(ascii_case))]
    Use,
    /// Keyword `require`
    #[token("require", ignore(ascii_case))]
    Require,
    /// Keyword `as`
    #[token("as", ignore(ascii_case))]
    As,
    /// Keyword `delete`
    #[token("delete", ignore(ascii_case))]
    Delete,
    /// Modifier `abstract`
    #[token("abstract", ignore(ascii_case))]
    Abstract,
    /// Modifier `final`
    #[token("final", ignore(ascii_case))]
    Final,
    /// Modifier `required`
    #[token("required", ignore(ascii_case))]
    Required,
    /// Literal `none`
    #[token("none", ignore(ascii_case))]
    None,
    /// Literal `true`
    #[token("true", ignore(ascii_case))]
    True,
    /// Literal `false`
    #[token("false", ignore(ascii_case))]
    False,
    /// Literal `all`
    #[token("all", ignore(ascii_case))]
    All,
    /// Literal `any`
    #[token("any", ignore(ascii_case))]
    Any,

    // === Literals ===
    /// Lowercased identifier
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_ascii_lowercase())]
    Word(String),
    /// String literal, unescaped
    #[regex(r"'''([^']|'[^']|''[^'])*'''", |lex| strip_triple(lex.slice()))]
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#, |lex| strip_triple(lex.slice()))]
    #[regex(r"'([^'\\\n]|\\.)*'", |lex| unescape(lex.slice()))]
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape(lex.slice()))]
    Str(String),
    /// Integer literal
    #[regex(r"[+-]?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    /// Float literal
    #[regex(
        r"[+-]?(([0-9]*\.[0-9]+|[0-9]+\.[0-9]*)([eE][+-]?[0-9]+)?|[0-9]+[eE][+-]?[0-9]+)",
        |lex| lex.slice().parse::<f64>().ok()
    )]
    Float(f64),

    // === Punctuation ===
    /// `.`
    #[token(".")]
    Dot,
    /// `:`
    #[token(":")]
    Colon,
    /// `;`
    #[token(";")]
    Semicolon,
    /// `=`
    #[token("=")]
    Equals,
    /// `->`
    #[token("->")]
    Arrow,
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
}

/// Words that may never be used as definition or alias names.
///
/// Phase 1 rejects any definition whose name appears here.
pub const RESERVED_WORDS: &[&str] = &[
    "schema", "fieldset", "field", "index", "fields", "modifiers", "abstract", "final", "fallback",
    "required", "use", "require", "as", "rename", "delete", "none", "true", "false", "all", "any",
];

/// Property names with language-level meaning.
///
/// A node carrying one of these names must be a property, never a
/// definition.
pub const RESERVED_PROPERTY_NAMES: &[&str] = &[
    "ancestors",
    "references",
    "implements",
    "unique",
    "fields",
    "index",
    "property",
];

/// True when `name` (already lowercased) is a reserved word.
pub fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

/// True when `name` (already lowercased) is a reserved property name.
pub fn is_reserved_property_name(name: &str) -> bool {
    RESERVED_PROPERTY_NAMES.contains(&name)
}

/// Strip the quote delimiters of a triple-quoted literal.
///
/// Triple-quoted strings are verbatim; no escape processing.
fn strip_triple(slice: &str) -> String {
    slice[3..slice.len() - 3].to_string()
}

/// Strip quotes and process backslash escapes of a quoted literal.
fn unescape(slice: &str) -> String {
    let inner = &slice[1..slice.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('0') => out.push('\0'),
                Some(other) => out.push(other),
                Option::None => {}
            }
        } else {
            out.push(ch);
        }
    }
    out
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Schema => write!(f, "schema"),
            Token::Fieldset => write!(f, "fieldset"),
            Token::Field => write!(f, "field"),
            Token::Index => write!(f, "index"),
            Token::Constraint => write!(f, "constraint"),
            Token::Fields => write!(f, "fields"),
            Token::Use => write!(f, "use"),
            Token::Require => write!(f, "require"),
            Token::As => write!(f, "as"),
            Token::Delete => write!(f, "delete"),
            Token::Abstract => write!(f, "abstract"),
            Token::Final => write!(f, "final"),
            Token::Required => write!(f, "required"),
            Token::None => write!(f, "none"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::All => write!(f, "all"),
            Token::Any => write!(f, "any"),
            Token::Word(w) => write!(f, "{}", w),
            Token::Str(_) => write!(f, "string literal"),
            Token::Int(v) => write!(f, "{}", v),
            Token::Float(v) => write!(f, "{}", v),
            Token::Dot => write!(f, "."),
            Token::Colon => write!(f, ":"),
            Token::Semicolon => write!(f, ";"),
            Token::Equals => write!(f, "="),
            Token::Arrow => write!(f, "->"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
        }
    }
}

/// Lexer failure: an illegal character sequence.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("illegal character sequence {snippet:?}")]
pub struct LexError {
    /// Byte range of the offending input
    pub span: Range<usize>,
    /// The offending text
    pub snippet: String,
}

/// Tokenize a source string.
///
/// Returns tokens paired with their byte ranges. Keyword recognition is
/// case-insensitive, so the parser never sees a `Word("schema")`.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, LexError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(LexError {
                    snippet: source[span.clone()].to_string(),
                    span,
                });
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("lexing failed")
            .into_iter()
            .map(|(tok, _)| tok)
            .collect()
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(
            tokens("Schema FIELDSET fIeLd"),
            vec![Token::Schema, Token::Fieldset, Token::Field]
        );
    }

    #[test]
    fn words_are_lowercased() {
        assert_eq!(tokens("Invoice"), vec![Token::Word("invoice".into())]);
    }

    #[test]
    fn punctuation_and_arrow() {
        assert_eq!(
            tokens("issuer -> person;"),
            vec![
                Token::Word("issuer".into()),
                Token::Arrow,
                Token::Word("person".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn string_forms() {
        assert_eq!(tokens(r#""char""#), vec![Token::Str("char".into())]);
        assert_eq!(tokens(r"'a\'b'"), vec![Token::Str("a'b".into())]);
        assert_eq!(tokens(r#""a\nb""#), vec![Token::Str("a\nb".into())]);
        assert_eq!(
            tokens("'''multi 'quoted' text'''"),
            vec![Token::Str("multi 'quoted' text".into())]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(tokens("100"), vec![Token::Int(100)]);
        assert_eq!(tokens("-5"), vec![Token::Int(-5)]);
        assert_eq!(tokens("1.5"), vec![Token::Float(1.5)]);
        assert_eq!(tokens("2e3"), vec![Token::Float(2000.0)]);
    }

    #[test]
    fn sign_before_word_stays_punctuation() {
        // index sort directions: `fields +code -name;`
        assert_eq!(
            tokens("fields +code -name;"),
            vec![
                Token::Fields,
                Token::Plus,
                Token::Word("code".into()),
                Token::Minus,
                Token::Word("name".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("field a; # trailing comment\nfield b;"),
            vec![
                Token::Field,
                Token::Word("a".into()),
                Token::Semicolon,
                Token::Field,
                Token::Word("b".into()),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn reserved_word_tables() {
        assert!(is_reserved_word("fallback"));
        assert!(is_reserved_word("rename"));
        assert!(!is_reserved_word("invoice"));
        assert!(is_reserved_property_name("ancestors"));
        assert!(!is_reserved_property_name("type"));
    }

    #[test]
    fn illegal_character_reports_span() {
        let err = tokenize("field a @ b").unwrap_err();
        assert_eq!(err.snippet, "@");
    }
}
