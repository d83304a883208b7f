//! Lexer for metric definitions
//!
//! Tokenizes source into a stream for the parser. Newlines are significant
//! (they end statements) except inside brackets; [`layout`] resolves that.

use chumsky::prelude::*;
use std::ops::Range;

/// Token types for the metric language
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Token {
    // Literals
    Ident(String),
    Number(String),

    // Operators
    Plus,  // +
    Minus, // -
    Star,  // *
    Slash, // /
    Caret, // ^ or **

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBracket,  // [
    RBracket,  // ]
    Comma,     // ,
    Eq,        // =
    Semicolon, // ;
    Newline,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::Eq => write!(f, "="),
            Token::Semicolon => write!(f, ";"),
            Token::Newline => write!(f, "newline"),
        }
    }
}

/// Type alias for spans
pub type Span = Range<usize>;

/// Create a lexer for metric definitions
pub fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
    // `12` or `0.25`; decimals become exact rationals later
    let number = text::int(10)
        .then(just('.').ignore_then(text::digits(10)).or_not())
        .map(|(int, frac): (String, Option<String>)| match frac {
            Some(frac) => Token::Number(format!("{}.{}", int, frac)),
            None => Token::Number(int),
        });

    let ident = text::ident().map(Token::Ident);

    // `**` must be tried before `*`
    let punctuation = choice((
        just("**").to(Token::Caret),
        just('^').to(Token::Caret),
        just('+').to(Token::Plus),
        just('-').to(Token::Minus),
        just('*').to(Token::Star),
        just('/').to(Token::Slash),
        just('(').to(Token::LParen),
        just(')').to(Token::RParen),
        just('[').to(Token::LBracket),
        just(']').to(Token::RBracket),
        just(',').to(Token::Comma),
        just('=').to(Token::Eq),
        just(';').to(Token::Semicolon),
        just('\n').to(Token::Newline),
    ));

    // Comments run to the end of the line but leave the newline in place
    let comment = just('#').then(none_of('\n').repeated()).ignored();

    let token_or_skip = comment
        .to(None)
        .or(number.or(ident).or(punctuation).map(Some));

    let horizontal_space = one_of(" \t\r").repeated();

    token_or_skip
        .map_with_span(|opt_tok, span| opt_tok.map(|tok| (tok, span)))
        .padded_by(horizontal_space)
        .repeated()
        .then_ignore(end())
        .map(|items| items.into_iter().flatten().collect())
}

/// Resolve significant newlines.
///
/// Newlines inside `(...)` or `[...]` are dropped; the rest become `;`.
/// Runs of separators collapse into one and leading/trailing separators are
/// removed, so the parser only ever sees `stmt ; stmt ; ...`.
pub fn layout(tokens: Vec<(Token, Span)>) -> Vec<(Token, Span)> {
    let mut out: Vec<(Token, Span)> = Vec::with_capacity(tokens.len());
    let mut depth = 0usize;
    for (tok, span) in tokens {
        match tok {
            Token::LParen | Token::LBracket => depth += 1,
            Token::RParen | Token::RBracket => depth = depth.saturating_sub(1),
            Token::Newline if depth > 0 => continue,
            _ => {}
        }
        let tok = if tok == Token::Newline {
            Token::Semicolon
        } else {
            tok
        };
        if tok == Token::Semicolon
            && out.last().map_or(true, |(last, _)| *last == Token::Semicolon)
        {
            continue;
        }
        out.push((tok, span));
    }
    if matches!(out.last(), Some((Token::Semicolon, _))) {
        out.pop();
    }
    out
}

/// Net number of open brackets in a token stream.
///
/// The REPL keeps reading lines while this is positive.
pub fn open_brackets(tokens: &[(Token, Span)]) -> isize {
    tokens.iter().fold(0, |depth, (tok, _)| match tok {
        Token::LParen | Token::LBracket => depth + 1,
        Token::RParen | Token::RBracket => depth - 1,
        _ => depth,
    })
}

// Unit tests live in tests/unit_parsing.rs
