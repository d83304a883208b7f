//! Parser for metric definitions
//!
//! Parses laid-out token streams (see [`crate::lexer::layout`]) into AST.
//!
//! Precedence, loosest first: `+ -`, `* /`, unary `-`, `^` (right
//! associative). So `-x^2` is `-(x^2)` and `2^-1` is `2^(-1)`.

use chumsky::prelude::*;

use crate::ast::*;
use crate::lexer::{Span as TokenSpan, Token};

/// Create a parser for a complete definition
pub fn parser() -> impl Parser<Token, Program, Error = Simple<Token>> + Clone {
    statement()
        .map_with_span(|stmt, span| Spanned::new(stmt, to_span(span)))
        .separated_by(just(Token::Semicolon))
        .then_ignore(end())
        .map(|statements| Program { statements })
}

fn to_span(span: TokenSpan) -> Span {
    Span::new(span.start, span.end)
}

// ============================================================================
// Helpers
// ============================================================================

fn ident() -> impl Parser<Token, String, Error = Simple<Token>> + Clone {
    select! { Token::Ident(s) => s }
}

fn binary(op: BinOp, lhs: Spanned<Term>, rhs: Spanned<Term>) -> Spanned<Term> {
    let span = lhs.span.join(rhs.span);
    Spanned::new(
        Term::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

// ============================================================================
// Statements
// ============================================================================

fn statement() -> impl Parser<Token, Statement, Error = Simple<Token>> + Clone {
    let assign = ident()
        .map_with_span(|name, span| Spanned::new(name, to_span(span)))
        .then_ignore(just(Token::Eq))
        .then(term())
        .map(|(name, value)| Statement::Assign { name, value });

    assign.or(term().map(Statement::Expr))
}

// ============================================================================
// Terms
// ============================================================================

/// Parse a single expression
pub fn term() -> impl Parser<Token, Spanned<Term>, Error = Simple<Token>> + Clone {
    recursive(|term| {
        let number = select! { Token::Number(n) => Term::Number(n) };

        let args = term
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::LParen), just(Token::RParen));

        // `f(x, y)` or a bare identifier
        let call_or_ident = ident().then(args.or_not()).map(|(name, args)| match args {
            Some(args) => Term::Call { name, args },
            None => Term::Ident(name),
        });

        let list = term
            .clone()
            .separated_by(just(Token::Comma))
            .allow_trailing()
            .delimited_by(just(Token::LBracket), just(Token::RBracket))
            .map(Term::List);

        let paren = term
            .clone()
            .delimited_by(just(Token::LParen), just(Token::RParen))
            .map(|inner: Spanned<Term>| inner.node);

        let atom = choice((number, call_or_ident, list, paren))
            .map_with_span(|t, span| Spanned::new(t, to_span(span)));

        // factor := '-' factor | atom ('^' factor)?
        let factor = recursive(|factor| {
            let negated = just(Token::Minus)
                .ignore_then(factor.clone())
                .map_with_span(|t: Spanned<Term>, span| {
                    Spanned::new(Term::Neg(Box::new(t)), to_span(span))
                });

            let power = atom
                .clone()
                .then(just(Token::Caret).ignore_then(factor).or_not())
                .map(|(base, exp)| match exp {
                    Some(exp) => binary(BinOp::Pow, base, exp),
                    None => base,
                });

            negated.or(power)
        });

        let product_op = choice((
            just(Token::Star).to(BinOp::Mul),
            just(Token::Slash).to(BinOp::Div),
        ));
        let product = factor
            .clone()
            .then(product_op.then(factor).repeated())
            .foldl(|lhs, (op, rhs)| binary(op, lhs, rhs));

        let sum_op = choice((
            just(Token::Plus).to(BinOp::Add),
            just(Token::Minus).to(BinOp::Sub),
        ));
        product
            .clone()
            .then(sum_op.then(product).repeated())
            .foldl(|lhs, (op, rhs)| binary(op, lhs, rhs))
    })
}

// Unit tests live in tests/unit_parsing.rs
