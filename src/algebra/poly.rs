//! Sparse multivariate polynomials over kernels.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{One, Signed, Zero};

use super::kernel::{Func, Kernel};
use super::Rational;

// ============================================================================
// Monomials
// ============================================================================

/// A power product of kernels, sorted by kernel, exponents strictly positive.
///
/// Monomials are ordered graded-lexicographically: total degree first, then
/// exponents compared from the largest kernel downwards. This is a monomial
/// order, which the exact division in [`Poly::div_exact`] relies on.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Monomial(Vec<(Arc<Kernel>, u32)>);

impl Monomial {
    pub fn one() -> Self {
        Monomial(Vec::new())
    }

    pub fn kernel(k: Arc<Kernel>, exp: u32) -> Self {
        if exp == 0 {
            Monomial::one()
        } else {
            Monomial(vec![(k, exp)])
        }
    }

    pub fn is_one(&self) -> bool {
        self.0.is_empty()
    }

    pub fn factors(&self) -> &[(Arc<Kernel>, u32)] {
        &self.0
    }

    pub fn degree(&self) -> u32 {
        self.0.iter().map(|(_, e)| e).sum()
    }

    pub fn exponent(&self, k: &Kernel) -> u32 {
        self.0
            .iter()
            .find(|(kk, _)| **kk == *k)
            .map(|(_, e)| *e)
            .unwrap_or(0)
    }

    pub fn mul(&self, other: &Monomial) -> Monomial {
        let mut out = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            match self.0[i].0.cmp(&other.0[j].0) {
                Ordering::Less => {
                    out.push(self.0[i].clone());
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(other.0[j].clone());
                    j += 1;
                }
                Ordering::Equal => {
                    out.push((self.0[i].0.clone(), self.0[i].1 + other.0[j].1));
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&self.0[i..]);
        out.extend_from_slice(&other.0[j..]);
        Monomial(out)
    }

    /// `self / other`, or `None` if `other` does not divide `self`.
    pub fn div(&self, other: &Monomial) -> Option<Monomial> {
        let mut out = Vec::with_capacity(self.0.len());
        let mut j = 0;
        for (k, e) in &self.0 {
            if j < other.0.len() && other.0[j].0 == *k {
                let d = other.0[j].1;
                if d > *e {
                    return None;
                }
                if d < *e {
                    out.push((k.clone(), e - d));
                }
                j += 1;
            } else if j < other.0.len() && other.0[j].0 < *k {
                return None;
            } else {
                out.push((k.clone(), *e));
            }
        }
        if j < other.0.len() {
            return None;
        }
        Some(Monomial(out))
    }

    /// Greatest common divisor of two monomials.
    pub fn gcd(&self, other: &Monomial) -> Monomial {
        let mut out = Vec::new();
        for (k, e) in &self.0 {
            let f = other.exponent(k);
            if f > 0 {
                out.push((k.clone(), (*e).min(f)));
            }
        }
        Monomial(out)
    }

    /// `self / k`, lowering the exponent of the factor at `index` by one.
    fn lower(&self, index: usize) -> Monomial {
        let mut out = self.0.clone();
        if out[index].1 == 1 {
            out.remove(index);
        } else {
            out[index].1 -= 1;
        }
        Monomial(out)
    }

    /// If some `cos(u)` occurs squared, split off `cos(u)^2` and return the
    /// remaining monomial with the matching `sin(u)` kernel.
    fn split_cos_square(&self) -> Option<(Monomial, Arc<Kernel>)> {
        let idx = self
            .0
            .iter()
            .position(|(k, e)| *e >= 2 && k.is_func(Func::Cos))?;
        let arg = match &*self.0[idx].0 {
            Kernel::Func(Func::Cos, arg) => arg.clone(),
            _ => return None,
        };
        let mut rest = self.0.clone();
        if rest[idx].1 == 2 {
            rest.remove(idx);
        } else {
            rest[idx].1 -= 2;
        }
        Some((Monomial(rest), Arc::new(Kernel::Func(Func::Sin, arg))))
    }
}

impl Ord for Monomial {
    fn cmp(&self, other: &Self) -> Ordering {
        self.degree().cmp(&other.degree()).then_with(|| {
            let mut a = self.0.iter().rev();
            let mut b = other.0.iter().rev();
            loop {
                match (a.next(), b.next()) {
                    (None, None) => return Ordering::Equal,
                    (Some(_), None) => return Ordering::Greater,
                    (None, Some(_)) => return Ordering::Less,
                    (Some((ka, ea)), Some((kb, eb))) => match ka.cmp(kb) {
                        Ordering::Equal => match ea.cmp(eb) {
                            Ordering::Equal => continue,
                            ord => return ord,
                        },
                        ord => return ord,
                    },
                }
            }
        })
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// Polynomials
// ============================================================================

/// A polynomial with exact rational coefficients. Zero coefficients are never
/// stored.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Poly {
    terms: BTreeMap<Monomial, Rational>,
}

impl Poly {
    pub fn zero() -> Self {
        Poly::default()
    }

    pub fn one() -> Self {
        Poly::constant(Rational::one())
    }

    pub fn constant(c: Rational) -> Self {
        Poly::term(Monomial::one(), c)
    }

    pub fn term(m: Monomial, c: Rational) -> Self {
        let mut p = Poly::zero();
        p.add_term(m, c);
        p
    }

    pub fn from_kernel(k: Arc<Kernel>) -> Self {
        Poly::term(Monomial::kernel(k, 1), Rational::one())
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_one(&self) -> bool {
        self.as_constant().map(|c| c.is_one()).unwrap_or(false)
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The constant value, if the polynomial has no kernels.
    pub fn as_constant(&self) -> Option<Rational> {
        match self.terms.len() {
            0 => Some(Rational::zero()),
            1 => self
                .terms
                .iter()
                .next()
                .filter(|(m, _)| m.is_one())
                .map(|(_, c)| c.clone()),
            _ => None,
        }
    }

    /// Terms in ascending monomial order.
    pub fn terms(&self) -> impl DoubleEndedIterator<Item = (&Monomial, &Rational)> {
        self.terms.iter()
    }

    /// The largest term.
    pub fn leading(&self) -> Option<(&Monomial, &Rational)> {
        self.terms.iter().next_back()
    }

    pub fn is_leading_negative(&self) -> bool {
        self.leading().map(|(_, c)| c.is_negative()).unwrap_or(false)
    }

    pub fn add_term(&mut self, m: Monomial, c: Rational) {
        if c.is_zero() {
            return;
        }
        match self.terms.entry(m) {
            std::collections::btree_map::Entry::Vacant(v) => {
                v.insert(c);
            }
            std::collections::btree_map::Entry::Occupied(mut o) => {
                let sum = o.get() + c;
                if sum.is_zero() {
                    o.remove();
                } else {
                    *o.get_mut() = sum;
                }
            }
        }
    }

    pub fn add(&self, other: &Poly) -> Poly {
        let (mut out, smaller) = if self.len() >= other.len() {
            (self.clone(), other)
        } else {
            (other.clone(), self)
        };
        for (m, c) in &smaller.terms {
            out.add_term(m.clone(), c.clone());
        }
        out
    }

    pub fn sub(&self, other: &Poly) -> Poly {
        let mut out = self.clone();
        for (m, c) in &other.terms {
            out.add_term(m.clone(), -c.clone());
        }
        out
    }

    pub fn neg(&self) -> Poly {
        Poly {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), -c.clone())).collect(),
        }
    }

    pub fn scale(&self, s: &Rational) -> Poly {
        if s.is_zero() {
            return Poly::zero();
        }
        Poly {
            terms: self.terms.iter().map(|(m, c)| (m.clone(), c * s)).collect(),
        }
    }

    pub fn mul_term(&self, m: &Monomial, s: &Rational) -> Poly {
        if s.is_zero() {
            return Poly::zero();
        }
        Poly {
            terms: self.terms.iter().map(|(mm, c)| (mm.mul(m), c * s)).collect(),
        }
    }

    /// Product in the plain polynomial ring (not reduced).
    pub fn mul(&self, other: &Poly) -> Poly {
        if self.is_zero() || other.is_zero() {
            return Poly::zero();
        }
        let mut out = Poly::zero();
        for (ma, ca) in &self.terms {
            for (mb, cb) in &other.terms {
                out.add_term(ma.mul(mb), ca * cb);
            }
        }
        out
    }

    pub fn pow(&self, mut exp: u32) -> Poly {
        let mut base = self.clone();
        let mut acc = Poly::one();
        while exp > 0 {
            if exp & 1 == 1 {
                acc = acc.mul(&base);
            }
            exp >>= 1;
            if exp > 0 {
                base = base.mul(&base);
            }
        }
        acc
    }

    /// Normal form modulo `cos(u)^2 = 1 - sin(u)^2` for every argument `u`.
    ///
    /// The generators `cos(u)^2 + sin(u)^2 - 1` have pairwise coprime leading
    /// terms, so they form a Groebner basis and this reduction is canonical.
    pub fn reduce(self) -> Poly {
        if !self.terms.keys().any(|m| m.split_cos_square().is_some()) {
            return self;
        }
        let mut out = Poly::zero();
        let mut work: Vec<(Monomial, Rational)> = self.terms.into_iter().collect();
        while let Some((m, c)) = work.pop() {
            match m.split_cos_square() {
                None => out.add_term(m, c),
                Some((rest, sin)) => {
                    let sin_sq = rest.mul(&Monomial::kernel(sin, 2));
                    work.push((rest, c.clone()));
                    work.push((sin_sq, -c));
                }
            }
        }
        out
    }

    /// Exact quotient `self / d` in the polynomial ring, if it exists.
    pub fn div_exact(&self, d: &Poly) -> Option<Poly> {
        let (dm, dc) = d.leading()?;
        if self.is_zero() {
            return Some(Poly::zero());
        }
        if d.len() == 1 {
            let inv = dc.recip();
            let mut terms = BTreeMap::new();
            for (m, c) in &self.terms {
                terms.insert(m.div(dm)?, c * &inv);
            }
            return Some(Poly { terms });
        }
        if self.leading().map(|(m, _)| m.degree()).unwrap_or(0) < dm.degree() {
            return None;
        }

        let mut rem = self.clone();
        let mut quotient = Poly::zero();
        loop {
            let (m, c) = match rem.leading() {
                None => break,
                Some((rm, rc)) => (rm.div(dm)?, rc / dc),
            };
            for (tm, tc) in &d.terms {
                rem.add_term(tm.mul(&m), -(tc * &c));
            }
            quotient.add_term(m, c);
        }
        Some(quotient)
    }

    /// Greatest common monomial divisor of all terms.
    pub fn monomial_content(&self) -> Monomial {
        let mut iter = self.terms.keys();
        let first = match iter.next() {
            Some(m) => m.clone(),
            None => return Monomial::one(),
        };
        iter.fold(first, |acc, m| if acc.is_one() { acc } else { acc.gcd(m) })
    }

    /// Divide every term by `m`; terms not divisible are a logic error and
    /// are kept unchanged.
    pub fn div_monomial(&self, m: &Monomial) -> Poly {
        if m.is_one() {
            return self.clone();
        }
        Poly {
            terms: self
                .terms
                .iter()
                .map(|(mm, c)| (mm.div(m).unwrap_or_else(|| mm.clone()), c.clone()))
                .collect(),
        }
    }

    /// Split into `(leading coefficient, monic polynomial)`.
    pub fn into_monic(self) -> (Rational, Poly) {
        match self.leading().map(|(_, c)| c.clone()) {
            None => (Rational::zero(), self),
            Some(lc) if lc.is_one() => (lc, self),
            Some(lc) => {
                let inv = lc.recip();
                let p = self.scale(&inv);
                (lc, p)
            }
        }
    }

    /// Every kernel occurring in the polynomial.
    pub fn kernels(&self) -> BTreeSet<Arc<Kernel>> {
        self.terms
            .keys()
            .flat_map(|m| m.factors().iter().map(|(k, _)| k.clone()))
            .collect()
    }

    /// Least common multiple of the coefficient denominators.
    pub fn denominator_lcm(&self) -> BigInt {
        self.terms
            .values()
            .fold(BigInt::one(), |acc, c| acc.lcm(c.denom()))
    }

    /// Collect `d/dk` contributions: for each kernel `k`, the polynomial
    /// `sum c * e * m / k` over terms `c * m` containing `k^e`.
    pub(crate) fn partials(&self, keep: impl Fn(&Kernel) -> bool) -> BTreeMap<Arc<Kernel>, Poly> {
        let mut out: BTreeMap<Arc<Kernel>, Poly> = BTreeMap::new();
        for (m, c) in &self.terms {
            for (i, (k, e)) in m.factors().iter().enumerate() {
                if !keep(k) {
                    continue;
                }
                let coeff = c * Rational::from_integer(BigInt::from(*e));
                out.entry(k.clone())
                    .or_default()
                    .add_term(m.lower(i), coeff);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Assumptions, Symbol};

    fn var(name: &str) -> Poly {
        Poly::from_kernel(Kernel::symbol(&Symbol::new(name, Assumptions::REAL)))
    }

    fn int(n: i64) -> Rational {
        Rational::from_integer(BigInt::from(n))
    }

    #[test]
    fn test_exact_division() {
        let x = var("x");
        let y = var("y");
        // (x + y)(x - y) / (x + y) = x - y
        let p = x.add(&y).mul(&x.sub(&y));
        let q = p.div_exact(&x.add(&y)).expect("divisible");
        assert_eq!(q, x.sub(&y));
        assert!(p.div_exact(&x.add(&Poly::constant(int(1)))).is_none());
    }

    #[test]
    fn test_monomial_content() {
        let x = var("x");
        let y = var("y");
        let p = x.mul(&x).mul(&y).add(&x.mul(&y).scale(&int(3)));
        let content = p.monomial_content();
        assert_eq!(content.degree(), 2);
    }
}
