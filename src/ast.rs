//! Abstract Syntax Tree for metric definitions

use std::fmt;

/// A span in the source code, for error reporting
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Smallest span covering both.
    pub fn join(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// A node with source location
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// A complete definition: statements in source order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub statements: Vec<Spanned<Statement>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Statement {
    /// `name = term`
    Assign { name: Spanned<String>, value: Spanned<Term> },

    /// A bare expression (printed by the REPL, ignored in files)
    Expr(Spanned<Term>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Pow => "^",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Term {
    /// Numeric literal as written, e.g. `2` or `0.5`
    Number(String),

    Ident(String),

    /// `-term`
    Neg(Box<Spanned<Term>>),

    Binary {
        op: BinOp,
        lhs: Box<Spanned<Term>>,
        rhs: Box<Spanned<Term>>,
    },

    /// `name(args...)`
    Call { name: String, args: Vec<Spanned<Term>> },

    /// `[a, b, ...]`; a list of lists is a matrix literal
    List(Vec<Spanned<Term>>),
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Number(n) => write!(f, "{}", n),
            Term::Ident(s) => write!(f, "{}", s),
            Term::Neg(t) => write!(f, "-({})", t.node),
            Term::Binary { op, lhs, rhs } => {
                write!(f, "({} {} {})", lhs.node, op.symbol(), rhs.node)
            }
            Term::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a.node)?;
                }
                write!(f, ")")
            }
            Term::List(items) => {
                write!(f, "[")?;
                for (i, a) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a.node)?;
                }
                write!(f, "]")
            }
        }
    }
}
