//! Algebraic generators.

use std::sync::Arc;

use super::expr::Expr;
use super::AlgebraResult;
use crate::symbol::Symbol;

/// Elementary functions known to the algebra.
///
/// The declaration order is significant: `Cos` must sort after `Sin` so that
/// `cos(u)^2` is the leading term of `cos(u)^2 + sin(u)^2 - 1`, which makes
/// the trigonometric reduction in [`super::Poly::reduce`] a normal form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Func {
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Sqrt => "sqrt",
        }
    }

    pub fn from_name(name: &str) -> Option<Func> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "exp" => Some(Func::Exp),
            "log" | "ln" => Some(Func::Log),
            "sqrt" => Some(Func::Sqrt),
            _ => None,
        }
    }
}

/// A generator of the polynomial ring.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kernel {
    Symbol(Symbol),
    Func(Func, Expr),
    /// The `order`-th derivative of an undefined function, applied to `arg`
    Undefined {
        name: String,
        order: u32,
        arg: Expr,
    },
}

impl Kernel {
    pub fn symbol(sym: &Symbol) -> Arc<Kernel> {
        Arc::new(Kernel::Symbol(sym.clone()))
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Kernel::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_func(&self, f: Func) -> bool {
        matches!(self, Kernel::Func(g, _) if *g == f)
    }

    /// Does this kernel mention `x` anywhere, including inside arguments?
    pub fn depends_on(&self, x: &Symbol) -> bool {
        match self {
            Kernel::Symbol(s) => s == x,
            Kernel::Func(_, arg) => arg.depends_on(x),
            Kernel::Undefined { arg, .. } => arg.depends_on(x),
        }
    }

    /// The kernel as an expression of its own.
    pub fn to_expr(self: &Arc<Self>) -> Expr {
        Expr::from_kernel(self.clone())
    }

    /// Partial derivative with respect to `x`, by the chain rule.
    pub fn derivative(self: &Arc<Self>, x: &Symbol) -> AlgebraResult<Expr> {
        if !self.depends_on(x) {
            return Ok(Expr::zero());
        }
        match &**self {
            Kernel::Symbol(_) => Ok(Expr::one()),
            Kernel::Func(f, u) => {
                let du = u.diff(x)?;
                let outer = match f {
                    Func::Sin => Expr::apply(Func::Cos, u.clone())?,
                    Func::Cos => -Expr::apply(Func::Sin, u.clone())?,
                    Func::Exp => self.to_expr(),
                    Func::Log => Expr::one().div(u)?,
                    Func::Sqrt => Expr::one().div(&Expr::integer(2).mul(&self.to_expr()))?,
                };
                Ok(outer.mul(&du))
            }
            Kernel::Undefined { name, order, arg } => {
                let du = arg.diff(x)?;
                Ok(Expr::undefined(name, order + 1, arg.clone()).mul(&du))
            }
        }
    }

    /// Replace `x` by `value` inside this kernel.
    pub fn subs(self: &Arc<Self>, x: &Symbol, value: &Expr) -> AlgebraResult<Expr> {
        if !self.depends_on(x) {
            return Ok(self.to_expr());
        }
        match &**self {
            Kernel::Symbol(_) => Ok(value.clone()),
            Kernel::Func(f, u) => Expr::apply(*f, u.subs(x, value)?),
            Kernel::Undefined { name, order, arg } => {
                Ok(Expr::undefined(name, *order, arg.subs(x, value)?))
            }
        }
    }
}
