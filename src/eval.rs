//! Evaluation of metric definitions
//!
//! Walks a parsed [`Program`] against a [`SymbolTable`], producing symbolic
//! values. Only the builtins listed in [`BUILTINS`] and the table's declared
//! functions are callable; there is no other way to reach the host.

use std::sync::Arc;

use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::{One, ToPrimitive};

use crate::algebra::{AlgebraResult, Expr, Func, Matrix, Rational};
use crate::ast::{BinOp, Program, Span, Spanned, Statement, Term};
use crate::error::{DefinitionError, GrError};
use crate::metric::MetricModel;
use crate::symbol::{validate_identifier, Binding, Symbol, SymbolTable};

/// Callable builtins.
pub const BUILTINS: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "exp", "log", "ln", "sqrt", "sinh", "cosh", "tanh",
    "diff", "subs", "simplify", "diag",
];

/// The binding a definition must assign.
pub const METRIC_NAME: &str = "metric";

/// Largest absolute integer exponent accepted by `^`.
pub const MAX_EXPONENT: i64 = 64;

/// Result of evaluating a term.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Scalar(Expr),
    Matrix(Matrix),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Scalar(e) => write!(f, "{}", e),
            Value::Matrix(m) => write!(f, "{}", m),
        }
    }
}

type EvalResult<T> = Result<T, DefinitionError>;

fn err<T>(message: impl Into<String>, span: Span) -> EvalResult<T> {
    Err(DefinitionError::eval(message, span))
}

/// Lift an algebra error to a definition error at `span`.
fn at<T>(result: AlgebraResult<T>, span: Span) -> EvalResult<T> {
    result.map_err(|e| DefinitionError::eval(e.to_string(), span))
}

/// Statement-by-statement evaluator holding local bindings.
#[derive(Clone, Debug)]
pub struct Evaluator {
    table: Arc<SymbolTable>,
    locals: IndexMap<String, Value>,
    metric_span: Option<Span>,
}

impl Evaluator {
    pub fn new(table: Arc<SymbolTable>) -> Self {
        Self {
            table,
            locals: IndexMap::new(),
            metric_span: None,
        }
    }

    pub fn table(&self) -> &Arc<SymbolTable> {
        &self.table
    }

    /// Local bindings in assignment order.
    pub fn locals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.locals.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    /// Evaluate every statement in order.
    pub fn program(&mut self, program: &Program) -> EvalResult<()> {
        for stmt in &program.statements {
            self.statement(stmt)?;
        }
        Ok(())
    }

    /// Evaluate one statement. Returns the value of bare expressions.
    pub fn statement(&mut self, stmt: &Spanned<Statement>) -> EvalResult<Option<Value>> {
        match &stmt.node {
            Statement::Assign { name, value } => {
                self.check_assignable(name)?;
                let v = self.term(value)?;
                if name.node == METRIC_NAME {
                    self.metric_span = Some(stmt.span);
                }
                self.locals.insert(name.node.clone(), v);
                Ok(None)
            }
            Statement::Expr(term) => self.term(term).map(Some),
        }
    }

    fn check_assignable(&self, name: &Spanned<String>) -> EvalResult<()> {
        if name.node == METRIC_NAME {
            return Ok(());
        }
        if let Err(GrError::InvalidIdentifier { reason, .. }) = validate_identifier(&name.node) {
            return err(format!("cannot assign to `{}`: {}", name.node, reason), name.span);
        }
        if self.table.lookup(&name.node).is_some() {
            return err(
                format!("cannot assign to `{}`: it is a declared coordinate, parameter or function", name.node),
                name.span,
            );
        }
        Ok(())
    }

    /// The `metric` binding as a matrix.
    pub fn metric(&self) -> EvalResult<Matrix> {
        match self.locals.get(METRIC_NAME) {
            Some(Value::Matrix(m)) => Ok(m.clone()),
            Some(Value::Scalar(_)) => err(
                "`metric` must be a matrix such as [[-1, 0], [0, 1]] or diag(-1, 1)",
                self.metric_span.unwrap_or_default(),
            ),
            None => Err(DefinitionError::MissingMetric),
        }
    }

    // ========================================================================
    // Terms
    // ========================================================================

    pub fn term(&self, t: &Spanned<Term>) -> EvalResult<Value> {
        match &t.node {
            Term::Number(n) => parse_number(n, t.span).map(|q| Value::Scalar(Expr::rational(q))),
            Term::Ident(name) => self.ident(name, t.span),
            Term::Neg(inner) => Ok(match self.term(inner)? {
                Value::Scalar(e) => Value::Scalar(-e),
                Value::Matrix(m) => Value::Matrix(at(m.try_map(|e| Ok(-e)), t.span)?),
            }),
            Term::Binary { op, lhs, rhs } => {
                let l = self.term(lhs)?;
                let r = self.term(rhs)?;
                self.binary(*op, l, r, t.span, rhs.span)
            }
            Term::Call { name, args } => self.call(name, args, t.span),
            Term::List(rows) => self.matrix_literal(rows, t.span),
        }
    }

    fn scalar(&self, t: &Spanned<Term>) -> EvalResult<Expr> {
        match self.term(t)? {
            Value::Scalar(e) => Ok(e),
            Value::Matrix(_) => err("expected a scalar, found a matrix", t.span),
        }
    }

    fn ident(&self, name: &str, span: Span) -> EvalResult<Value> {
        if let Some(v) = self.locals.get(name) {
            return Ok(v.clone());
        }
        match self.table.lookup(name) {
            Some(Binding::Coordinate(i)) => Ok(Value::Scalar(Expr::symbol(&self.table.coordinates()[*i]))),
            Some(Binding::Parameter(sym)) => Ok(Value::Scalar(Expr::symbol(sym))),
            Some(Binding::Function(f)) => err(format!("function `{}` must be applied, as in {}(r)", f, f), span),
            None if BUILTINS.contains(&name) => err(format!("builtin `{}` must be called", name), span),
            None => err(format!("unknown name `{}`", name), span),
        }
    }

    fn matrix_literal(&self, rows: &[Spanned<Term>], span: Span) -> EvalResult<Value> {
        if rows.is_empty() {
            return err("empty matrix literal", span);
        }
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let cells = match &row.node {
                Term::List(cells) => cells,
                _ => return err("matrix rows must be bracketed lists, as in [[a, b], [c, d]]", row.span),
            };
            let mut values = Vec::with_capacity(cells.len());
            for cell in cells {
                values.push(self.scalar(cell)?);
            }
            out.push(values);
        }
        let widths: Vec<usize> = out.iter().map(Vec::len).collect();
        match Matrix::from_rows(out) {
            Ok(m) => Ok(Value::Matrix(m)),
            Err(_) => err(format!("matrix rows have different lengths {:?}", widths), span),
        }
    }

    fn binary(&self, op: BinOp, l: Value, r: Value, span: Span, rhs_span: Span) -> EvalResult<Value> {
        match (op, l, r) {
            (BinOp::Add, Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a.add(&b))),
            (BinOp::Sub, Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a.sub(&b))),
            (BinOp::Mul, Value::Scalar(a), Value::Scalar(b)) => Ok(Value::Scalar(a.mul(&b))),
            (BinOp::Div, Value::Scalar(a), Value::Scalar(b)) => at(a.div(&b), span).map(Value::Scalar),
            (BinOp::Pow, Value::Scalar(a), Value::Scalar(b)) => {
                power(&a, &b, rhs_span).map(Value::Scalar)
            }

            (BinOp::Add, Value::Matrix(a), Value::Matrix(b))
            | (BinOp::Sub, Value::Matrix(a), Value::Matrix(b)) => {
                if a.rows() != b.rows() || a.cols() != b.cols() {
                    return err(
                        format!(
                            "cannot combine {}x{} and {}x{} matrices",
                            a.rows(),
                            a.cols(),
                            b.rows(),
                            b.cols()
                        ),
                        span,
                    );
                }
                let sub = op == BinOp::Sub;
                Ok(Value::Matrix(Matrix::from_fn(a.rows(), a.cols(), |i, j| {
                    if sub {
                        a.get(i, j).sub(b.get(i, j))
                    } else {
                        a.get(i, j).add(b.get(i, j))
                    }
                })))
            }
            (BinOp::Mul, Value::Matrix(a), Value::Matrix(b)) => at(a.mul(&b), span).map(Value::Matrix),
            (BinOp::Mul, Value::Scalar(s), Value::Matrix(m))
            | (BinOp::Mul, Value::Matrix(m), Value::Scalar(s)) => {
                at(m.try_map(|e| Ok(e.mul(&s))), span).map(Value::Matrix)
            }
            (BinOp::Div, Value::Matrix(m), Value::Scalar(s)) => {
                at(m.try_map(|e| e.div(&s)), span).map(Value::Matrix)
            }
            (op, _, _) => err(
                format!("operator `{}` is not defined for these operands", op.symbol()),
                span,
            ),
        }
    }

    fn call(&self, name: &str, args: &[Spanned<Term>], span: Span) -> EvalResult<Value> {
        let arity = |n: usize| -> EvalResult<()> {
            if args.len() == n {
                Ok(())
            } else {
                err(format!("`{}` takes {} argument(s), found {}", name, n, args.len()), span)
            }
        };

        if let Some(Binding::Function(f)) = self.table.lookup(name) {
            arity(1)?;
            let u = self.scalar(&args[0])?;
            return Ok(Value::Scalar(Expr::undefined(f, 0, u)));
        }

        match name {
            "diff" => {
                if args.len() != 2 && args.len() != 3 {
                    return err("`diff` takes (expr, symbol) or (expr, symbol, order)", span);
                }
                let x = self.symbol_arg(&args[1])?;
                let order = match args.get(2) {
                    Some(n) => self.small_integer(n, 0, MAX_EXPONENT)? as u32,
                    None => 1,
                };
                self.map_value(self.term(&args[0])?, span, |e| e.diff_n(&x, order))
            }
            "subs" => {
                arity(3)?;
                let x = self.symbol_arg(&args[1])?;
                let v = self.scalar(&args[2])?;
                self.map_value(self.term(&args[0])?, span, |e| e.subs(&x, &v))
            }
            "simplify" => {
                arity(1)?;
                self.map_value(self.term(&args[0])?, span, |e| Ok(e.simplify()))
            }
            "diag" => {
                if args.is_empty() {
                    return err("`diag` needs at least one entry", span);
                }
                let entries = args.iter().map(|a| self.scalar(a)).collect::<EvalResult<Vec<_>>>()?;
                Ok(Value::Matrix(Matrix::diagonal(entries)))
            }
            _ => {
                let unary = elementary(name)
                    .ok_or_else(|| DefinitionError::eval(format!("unknown function `{}`", name), span))?;
                arity(1)?;
                let u = self.scalar(&args[0])?;
                at(unary(u), span).map(Value::Scalar)
            }
        }
    }

    fn map_value(
        &self,
        v: Value,
        span: Span,
        f: impl Fn(&Expr) -> AlgebraResult<Expr>,
    ) -> EvalResult<Value> {
        match v {
            Value::Scalar(e) => at(f(&e), span).map(Value::Scalar),
            Value::Matrix(m) => at(m.try_map(f), span).map(Value::Matrix),
        }
    }

    fn symbol_arg(&self, t: &Spanned<Term>) -> EvalResult<Symbol> {
        match self.scalar(t)?.as_symbol() {
            Some(s) => Ok(s.clone()),
            None => err("expected a coordinate or parameter name", t.span),
        }
    }

    fn small_integer(&self, t: &Spanned<Term>, min: i64, max: i64) -> EvalResult<i64> {
        let q = self
            .scalar(t)?
            .as_constant()
            .filter(|q| q.is_integer())
            .and_then(|q| q.to_integer().to_i64());
        match q {
            Some(n) if (min..=max).contains(&n) => Ok(n),
            _ => err(format!("expected an integer between {} and {}", min, max), t.span),
        }
    }
}

/// `12` or `1.25` as an exact rational.
fn parse_number(text: &str, span: Span) -> EvalResult<Rational> {
    let invalid = || DefinitionError::eval(format!("invalid number `{}`", text), span);
    match text.split_once('.') {
        None => text
            .parse::<BigInt>()
            .map(Rational::from_integer)
            .map_err(|_| invalid()),
        Some((int, frac)) => {
            let digits = format!("{}{}", int, frac).parse::<BigInt>().map_err(|_| invalid())?;
            let scale = num_traits::pow(BigInt::from(10), frac.len());
            Ok(Rational::new(digits, scale))
        }
    }
}

/// `base ^ exponent` for integer and half-integer exponents.
fn power(base: &Expr, exponent: &Expr, span: Span) -> EvalResult<Expr> {
    let q = match exponent.as_constant() {
        Some(q) => q,
        None => return err("exponents must be numeric constants", span),
    };
    let n = q.numer().to_i64().filter(|n| n.abs() <= 2 * MAX_EXPONENT);
    let n = match n {
        Some(n) => n,
        None => return err(format!("exponent {} is too large", q), span),
    };
    if q.denom().is_one() {
        if n.abs() > MAX_EXPONENT {
            return err(format!("exponent {} is too large", q), span);
        }
        return at(base.powi(n), span);
    }
    if *q.denom() == BigInt::from(2) {
        let root = at(Expr::apply(Func::Sqrt, base.clone()), span)?;
        return at(root.powi(n), span);
    }
    err(
        format!("only integer and half-integer exponents are supported, found {}", q),
        span,
    )
}

type Unary = fn(Expr) -> AlgebraResult<Expr>;

/// Elementary one-argument builtins, expressed through sin, cos, exp, log
/// and sqrt.
fn elementary(name: &str) -> Option<Unary> {
    let f: Unary = match name {
        "sin" => |u| Expr::apply(Func::Sin, u),
        "cos" => |u| Expr::apply(Func::Cos, u),
        "exp" => |u| Expr::apply(Func::Exp, u),
        "log" | "ln" => |u| Expr::apply(Func::Log, u),
        "sqrt" => |u| Expr::apply(Func::Sqrt, u),
        "tan" => |u| Expr::apply(Func::Sin, u.clone())?.div(&Expr::apply(Func::Cos, u)?),
        "cot" => |u| Expr::apply(Func::Cos, u.clone())?.div(&Expr::apply(Func::Sin, u)?),
        "sec" => |u| Expr::apply(Func::Cos, u)?.recip(),
        "csc" => |u| Expr::apply(Func::Sin, u)?.recip(),
        "sinh" => |u| {
            let (p, m) = exp_pair(u)?;
            Ok(p.sub(&m).scale(&half()))
        },
        "cosh" => |u| {
            let (p, m) = exp_pair(u)?;
            Ok(p.add(&m).scale(&half()))
        },
        "tanh" => |u| {
            let (p, m) = exp_pair(u)?;
            p.sub(&m).div(&p.add(&m))
        },
        _ => return None,
    };
    Some(f)
}

fn exp_pair(u: Expr) -> AlgebraResult<(Expr, Expr)> {
    Ok((Expr::apply(Func::Exp, u.clone())?, Expr::apply(Func::Exp, -u)?))
}

fn half() -> Rational {
    Rational::new(BigInt::one(), BigInt::from(2))
}

/// Parse and evaluate `source`, returning the metric it defines.
pub fn evaluate_metric(source: &str, table: Arc<SymbolTable>) -> Result<MetricModel, GrError> {
    let program = crate::parse(source)?;
    let mut evaluator = Evaluator::new(Arc::clone(&table));
    evaluator.program(&program)?;
    let metric = evaluator.metric()?;
    MetricModel::from_matrix(table, metric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::{Signed, Zero};

    #[test]
    fn test_decimal_is_exact() {
        let q = parse_number("0.25", Span::default()).unwrap();
        assert_eq!(q, Rational::new(BigInt::from(1), BigInt::from(4)));
        assert!(!q.is_zero() && q.is_positive());
    }

    #[test]
    fn test_half_exponent_is_sqrt() {
        let table = Arc::new(SymbolTable::new(&["r"], &["M"]).unwrap());
        let src = "metric = [[(2*M)^(1/2)]]";
        let model = evaluate_metric(src, table).unwrap();
        let printed = model.component(0, 0).to_string();
        assert_eq!(printed, "sqrt(2*M)");
    }
}
