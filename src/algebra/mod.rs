//! Exact symbolic algebra for metric computations
//!
//! Expressions are rational functions over *kernels*: symbols, elementary
//! function applications and undefined functions. Coefficients are exact
//! rationals, so every equality the pipeline relies on is decided exactly
//! rather than numerically.
//!
//! # Architecture
//!
//! - **kernel**: algebraic generators (`r`, `sin(theta)`, `omega'(r)`, ...)
//! - **poly**: sparse multivariate polynomials over kernels, kept in a normal
//!   form modulo `sin(u)^2 + cos(u)^2 = 1`
//! - **expr**: rational functions with a factored denominator
//! - **matrix**: dense matrices of expressions, including symbolic inversion
//!
//! Zero testing is exact: an [`Expr`] is zero iff its reduced numerator is the
//! zero polynomial. Cancellation of common factors is best-effort (exact
//! division against known denominator factors, no multivariate GCD).

mod expr;
mod kernel;
mod matrix;
mod poly;

pub use expr::Expr;
pub use kernel::{Func, Kernel};
pub use matrix::{GaussJordan, Matrix};
pub use poly::{Monomial, Poly};

use num_rational::BigRational;
use thiserror::Error;

/// Exact rational coefficient type.
pub type Rational = BigRational;

/// Errors raised by algebra operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AlgebraError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("matrix is singular (no non-zero pivot in column {column})")]
    SingularMatrix { column: usize },

    #[error("shape mismatch: {left_rows}x{left_cols} and {right_rows}x{right_cols}")]
    ShapeMismatch {
        left_rows: usize,
        left_cols: usize,
        right_rows: usize,
        right_cols: usize,
    },

    #[error("{0} is undefined")]
    Domain(String),
}

/// Shorthand for algebra results.
pub type AlgebraResult<T> = Result<T, AlgebraError>;
