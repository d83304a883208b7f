//! Rational functions with factored denominators.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};

use super::kernel::{Func, Kernel};
use super::poly::{Monomial, Poly};
use super::{AlgebraError, AlgebraResult, Rational};
use crate::symbol::Symbol;

/// A symbolic expression `numerator / prod(factor ^ exponent)`.
///
/// Invariants maintained by every constructor:
/// - the numerator is in trigonometric normal form;
/// - denominator factors are reduced, monic, non-constant polynomials;
/// - zero is represented with an empty denominator;
/// - no denominator factor is known to divide the numerator exactly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Expr {
    num: Poly,
    den: BTreeMap<Poly, u32>,
}

type Factors = BTreeMap<Poly, u32>;

impl Default for Expr {
    fn default() -> Self {
        Expr::zero()
    }
}

impl Expr {
    // ========================================================================
    // Construction
    // ========================================================================

    pub fn zero() -> Self {
        Expr {
            num: Poly::zero(),
            den: Factors::new(),
        }
    }

    pub fn one() -> Self {
        Expr::from_poly(Poly::one())
    }

    pub fn integer(n: i64) -> Self {
        Expr::rational(Rational::from_integer(BigInt::from(n)))
    }

    /// The constant `n / d`. `d` must be non-zero.
    pub fn ratio(n: i64, d: i64) -> Self {
        Expr::rational(Rational::new(BigInt::from(n), BigInt::from(d)))
    }

    pub fn rational(q: Rational) -> Self {
        Expr::from_poly(Poly::constant(q))
    }

    pub fn symbol(sym: &Symbol) -> Self {
        Expr::from_kernel(Kernel::symbol(sym))
    }

    pub fn from_kernel(k: Arc<Kernel>) -> Self {
        Expr::from_poly(Poly::from_kernel(k))
    }

    pub fn from_poly(p: Poly) -> Self {
        Expr {
            num: p.reduce(),
            den: Factors::new(),
        }
    }

    /// An undefined function (or one of its derivatives) applied to `arg`.
    pub fn undefined(name: &str, order: u32, arg: Expr) -> Self {
        Expr::from_kernel(Arc::new(Kernel::Undefined {
            name: name.to_string(),
            order,
            arg,
        }))
    }

    /// Apply an elementary function, folding the identities that keep
    /// kernels canonical (odd/even symmetry, `exp`/`log` inverses, exact
    /// square roots).
    pub fn apply(f: Func, arg: Expr) -> AlgebraResult<Expr> {
        let kernel = |f: Func, arg: Expr| Expr::from_kernel(Arc::new(Kernel::Func(f, arg)));
        match f {
            Func::Sin => {
                if arg.is_zero() {
                    Ok(Expr::zero())
                } else if arg.is_negative() {
                    Ok(-kernel(Func::Sin, -arg))
                } else {
                    Ok(kernel(Func::Sin, arg))
                }
            }
            Func::Cos => {
                if arg.is_zero() {
                    Ok(Expr::one())
                } else if arg.is_negative() {
                    Ok(kernel(Func::Cos, -arg))
                } else {
                    Ok(kernel(Func::Cos, arg))
                }
            }
            Func::Exp => {
                if arg.is_zero() {
                    return Ok(Expr::one());
                }
                if let Some(inner) = arg.as_func(Func::Log) {
                    return Ok(inner.clone());
                }
                if arg.is_negative() {
                    kernel(Func::Exp, -arg).recip()
                } else {
                    Ok(kernel(Func::Exp, arg))
                }
            }
            Func::Log => {
                if arg.is_zero() {
                    return Err(AlgebraError::Domain("log(0)".to_string()));
                }
                if arg.is_one() {
                    return Ok(Expr::zero());
                }
                if let Some(inner) = arg.as_func(Func::Exp) {
                    return Ok(inner.clone());
                }
                Ok(kernel(Func::Log, arg))
            }
            Func::Sqrt => {
                if arg.is_zero() {
                    return Ok(Expr::zero());
                }
                if let Some(root) = arg.exact_sqrt() {
                    return Ok(root);
                }
                Ok(kernel(Func::Sqrt, arg))
            }
        }
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub fn numerator(&self) -> &Poly {
        &self.num
    }

    /// Denominator factors with their exponents.
    pub fn denominator(&self) -> impl Iterator<Item = (&Poly, u32)> {
        self.den.iter().map(|(f, e)| (f, *e))
    }

    /// The denominator multiplied out.
    pub fn denominator_poly(&self) -> Poly {
        product(&self.den)
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.den.is_empty() && self.num.is_one()
    }

    /// The value, if the expression is a rational constant.
    pub fn as_constant(&self) -> Option<Rational> {
        if self.den.is_empty() {
            self.num.as_constant()
        } else {
            None
        }
    }

    /// Is the leading numerator coefficient negative?
    ///
    /// Used as a canonical "sign" when folding `f(-u)` identities.
    pub fn is_negative(&self) -> bool {
        self.num.is_leading_negative()
    }

    /// A rough size measure: total number of stored terms.
    pub fn complexity(&self) -> usize {
        self.num.len() + self.den.keys().map(Poly::len).sum::<usize>()
    }

    /// The kernel, if the expression is exactly one kernel to the first power.
    pub fn as_kernel(&self) -> Option<&Arc<Kernel>> {
        if !self.den.is_empty() || self.num.len() != 1 {
            return None;
        }
        let (m, c) = self.num.leading()?;
        match m.factors() {
            [(k, 1)] if c.is_one() => Some(k),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        self.as_kernel().and_then(|k| k.as_symbol())
    }

    fn as_func(&self, f: Func) -> Option<&Expr> {
        match &**self.as_kernel()? {
            Kernel::Func(g, arg) if *g == f => Some(arg),
            _ => None,
        }
    }

    pub fn depends_on(&self, x: &Symbol) -> bool {
        self.kernels().iter().any(|k| k.depends_on(x))
    }

    /// All kernels in numerator and denominator.
    pub fn kernels(&self) -> BTreeSet<Arc<Kernel>> {
        let mut out = self.num.kernels();
        for f in self.den.keys() {
            out.extend(f.kernels());
        }
        out
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    pub fn add(&self, other: &Expr) -> Expr {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        if self.den == other.den {
            return normalize(self.num.add(&other.num), self.den.clone());
        }
        let mut den = self.den.clone();
        for (f, e) in &other.den {
            let entry = den.entry(f.clone()).or_insert(0);
            *entry = (*entry).max(*e);
        }
        let a = self.num.mul(&cofactor(&den, &self.den));
        let b = other.num.mul(&cofactor(&den, &other.den));
        normalize(a.add(&b), den)
    }

    pub fn sub(&self, other: &Expr) -> Expr {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Expr {
        Expr {
            num: self.num.neg(),
            den: self.den.clone(),
        }
    }

    pub fn scale(&self, s: &Rational) -> Expr {
        if s.is_zero() {
            return Expr::zero();
        }
        Expr {
            num: self.num.scale(s),
            den: self.den.clone(),
        }
    }

    pub fn mul(&self, other: &Expr) -> Expr {
        if self.is_zero() || other.is_zero() {
            return Expr::zero();
        }
        if let Some(c) = other.as_constant() {
            return self.scale(&c);
        }
        if let Some(c) = self.as_constant() {
            return other.scale(&c);
        }
        let mut den = self.den.clone();
        for (f, e) in &other.den {
            *den.entry(f.clone()).or_insert(0) += e;
        }
        normalize(self.num.mul(&other.num), den)
    }

    pub fn div(&self, other: &Expr) -> AlgebraResult<Expr> {
        if other.is_zero() {
            return Err(AlgebraError::DivisionByZero);
        }
        if self.is_zero() {
            return Ok(Expr::zero());
        }
        if let Some(c) = other.as_constant() {
            return Ok(self.scale(&c.recip()));
        }
        let num = self.num.mul(&product(&other.den));
        divide_by_poly(num, self.den.clone(), other.num.clone())
    }

    pub fn recip(&self) -> AlgebraResult<Expr> {
        Expr::one().div(self)
    }

    /// Integer power; negative exponents divide.
    pub fn powi(&self, n: i64) -> AlgebraResult<Expr> {
        if n == 0 {
            return Ok(Expr::one());
        }
        if n < 0 {
            return self.recip()?.powi(-n);
        }
        let n = u32::try_from(n)
            .map_err(|_| AlgebraError::Domain(format!("exponent {}", n)))?;
        if n == 1 {
            return Ok(self.clone());
        }
        let den = self.den.iter().map(|(f, e)| (f.clone(), e * n)).collect();
        Ok(normalize(self.num.pow(n), den))
    }

    /// Sum of an iterator of expressions.
    pub fn sum<'a>(items: impl IntoIterator<Item = &'a Expr>) -> Expr {
        items.into_iter().fold(Expr::zero(), |acc, e| acc.add(e))
    }

    // ========================================================================
    // Calculus and rewriting
    // ========================================================================

    /// Partial derivative with respect to `x`.
    pub fn diff(&self, x: &Symbol) -> AlgebraResult<Expr> {
        if !self.depends_on(x) {
            return Ok(Expr::zero());
        }
        let inv_den = Expr {
            num: Poly::one(),
            den: self.den.clone(),
        };
        let mut result = poly_diff(&self.num, x)?.mul(&inv_den);

        // d(N / prod f^e) picks up -e * N * f' / (f * prod f^e) per factor
        for (f, e) in &self.den {
            let df = poly_diff(f, x)?;
            if df.is_zero() {
                continue;
            }
            let mut den = self.den.clone();
            *den.entry(f.clone()).or_insert(0) += 1;
            let coeff = -Rational::from_integer(BigInt::from(*e));
            let term = normalize(self.num.scale(&coeff), den).mul(&df);
            result = result.add(&term);
        }
        Ok(result)
    }

    /// `order`-th partial derivative with respect to `x`.
    pub fn diff_n(&self, x: &Symbol, order: u32) -> AlgebraResult<Expr> {
        let mut out = self.clone();
        for _ in 0..order {
            out = out.diff(x)?;
        }
        Ok(out)
    }

    /// Substitute `value` for every occurrence of `x`.
    pub fn subs(&self, x: &Symbol, value: &Expr) -> AlgebraResult<Expr> {
        if !self.depends_on(x) {
            return Ok(self.clone());
        }
        let mut cache = BTreeMap::new();
        let num = poly_subs(&self.num, x, value, &mut cache)?;
        let mut den = Expr::one();
        for (f, e) in &self.den {
            den = den.mul(&poly_subs(f, x, value, &mut cache)?.powi(i64::from(*e))?);
        }
        num.div(&den)
    }

    /// Refine the denominator factorisation and cancel again.
    ///
    /// Every operation already cancels what it can; this additionally splits
    /// factors that are exact multiples of other factors, which can expose
    /// further cancellations against the numerator.
    pub fn simplify(&self) -> Expr {
        for big in self.den.keys() {
            for small in self.den.keys() {
                if big == small || leading_degree(big) <= leading_degree(small) {
                    continue;
                }
                let q = match big.div_exact(small) {
                    Some(q) => q.reduce(),
                    None => continue,
                };
                let mut den = self.den.clone();
                let e = den.remove(big).unwrap_or(0);
                *den.entry(small.clone()).or_insert(0) += e;
                let (lc, monic) = q.into_monic();
                let mut num = self.num.clone();
                for _ in 0..e {
                    num = num.scale(&lc.recip());
                }
                if monic.as_constant().is_none() {
                    *den.entry(monic).or_insert(0) += e;
                }
                return normalize(num, den).simplify();
            }
        }
        normalize(self.num.clone(), self.den.clone())
    }

    /// `sqrt` of a perfect square with positive kernels, if exact.
    fn exact_sqrt(&self) -> Option<Expr> {
        if self.num.len() != 1 {
            return None;
        }
        let (m, c) = self.num.leading()?;
        let c_root = rational_sqrt(c)?;
        let mut root = Poly::term(half_monomial(m)?, c_root);
        root = root.reduce();
        let mut den = Factors::new();
        for (f, e) in &self.den {
            if e % 2 != 0 {
                return None;
            }
            let (fm, _) = f.leading()?;
            if f.len() != 1 || !positive_kernels(fm) {
                return None;
            }
            den.insert(f.clone(), e / 2);
        }
        Some(normalize(root, den))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Cancel exact factors and drop exhausted exponents.
fn normalize(num: Poly, mut den: Factors) -> Expr {
    let mut num = num.reduce();
    if num.is_zero() {
        return Expr::zero();
    }
    for (f, e) in den.iter_mut() {
        while *e > 0 {
            match num.div_exact(f) {
                Some(q) => {
                    num = q.reduce();
                    *e -= 1;
                }
                None => break,
            }
        }
    }
    den.retain(|_, e| *e > 0);
    Expr { num, den }
}

/// `num / (den * p)`, splitting `p` into monomial, known and new factors.
fn divide_by_poly(num: Poly, mut den: Factors, p: Poly) -> AlgebraResult<Expr> {
    let p = p.reduce();
    if p.is_zero() {
        return Err(AlgebraError::DivisionByZero);
    }

    let content = p.monomial_content();
    let mut rest = p.div_monomial(&content);
    for (k, e) in content.factors() {
        *den.entry(Poly::from_kernel(k.clone())).or_insert(0) += e;
    }

    if rest.as_constant().is_none() {
        let known: Vec<Poly> = den.keys().filter(|f| f.len() > 1).cloned().collect();
        for f in known {
            while rest.as_constant().is_none() {
                match rest.div_exact(&f) {
                    Some(q) => {
                        rest = q.reduce();
                        *den.entry(f.clone()).or_insert(0) += 1;
                    }
                    None => break,
                }
            }
        }
    }

    let (lc, monic) = rest.into_monic();
    let num = num.scale(&lc.recip());
    if !monic.is_one() {
        *den.entry(monic).or_insert(0) += 1;
    }
    Ok(normalize(num, den))
}

fn leading_degree(p: &Poly) -> u32 {
    p.leading().map(|(m, _)| m.degree()).unwrap_or(0)
}

fn product(factors: &Factors) -> Poly {
    factors
        .iter()
        .fold(Poly::one(), |acc, (f, e)| acc.mul(&f.pow(*e)))
}

/// `prod f^(full[f] - part[f])`
fn cofactor(full: &Factors, part: &Factors) -> Poly {
    let mut out = Poly::one();
    for (f, e) in full {
        let missing = e - part.get(f).copied().unwrap_or(0);
        if missing > 0 {
            out = out.mul(&f.pow(missing));
        }
    }
    out
}

/// Derivative of a polynomial, as an expression (function kernels can
/// contribute rational terms).
fn poly_diff(p: &Poly, x: &Symbol) -> AlgebraResult<Expr> {
    let mut polynomial = Poly::zero();
    let mut rest = Expr::zero();
    for (k, coeff) in p.partials(|k| k.depends_on(x)) {
        match &*k {
            Kernel::Symbol(_) => polynomial = polynomial.add(&coeff),
            _ => {
                let dk = k.derivative(x)?;
                rest = rest.add(&Expr::from_poly(coeff).mul(&dk));
            }
        }
    }
    Ok(Expr::from_poly(polynomial).add(&rest))
}

fn poly_subs(
    p: &Poly,
    x: &Symbol,
    value: &Expr,
    cache: &mut BTreeMap<Arc<Kernel>, Expr>,
) -> AlgebraResult<Expr> {
    let mut acc = Expr::zero();
    for (m, c) in p.terms() {
        let mut term = Expr::rational(c.clone());
        for (k, e) in m.factors() {
            let kv = match cache.get(k) {
                Some(v) => v.clone(),
                None => {
                    let v = k.subs(x, value)?;
                    cache.insert(k.clone(), v.clone());
                    v
                }
            };
            term = term.mul(&kv.powi(i64::from(*e))?);
        }
        acc = acc.add(&term);
    }
    Ok(acc)
}

fn rational_sqrt(c: &Rational) -> Option<Rational> {
    if c.is_negative() {
        return None;
    }
    let n = c.numer().sqrt();
    let d = c.denom().sqrt();
    if &(&n * &n) == c.numer() && &(&d * &d) == c.denom() {
        Some(Rational::new(n, d))
    } else {
        None
    }
}

fn positive_kernels(m: &Monomial) -> bool {
    m.factors()
        .iter()
        .all(|(k, _)| k.as_symbol().map(Symbol::is_positive).unwrap_or(false))
}

/// Halve every exponent of a monomial of positive symbols.
fn half_monomial(m: &Monomial) -> Option<Monomial> {
    if !positive_kernels(m) {
        return None;
    }
    let mut out = Monomial::one();
    for (k, e) in m.factors() {
        if e % 2 != 0 {
            return None;
        }
        out = out.mul(&Monomial::kernel(k.clone(), e / 2));
    }
    Some(out)
}

// ============================================================================
// Operators
// ============================================================================

macro_rules! forward_binop {
    ($trait:ident, $method:ident) => {
        impl std::ops::$trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                Expr::$method(self, rhs)
            }
        }
    };
}

forward_binop!(Add, add);
forward_binop!(Sub, sub);
forward_binop!(Mul, mul);

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::neg(&self)
    }
}

impl std::ops::Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::neg(self)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::integer(n)
    }
}

impl From<&Symbol> for Expr {
    fn from(sym: &Symbol) -> Self {
        Expr::symbol(sym)
    }
}
