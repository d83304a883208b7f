//! LaTeX output for expressions
//!
//! Formatting follows the conventions of common computer-algebra LaTeX
//! printers: `\sin{\left(\theta \right)}`, `\frac{..}{..}`, `e^{u}`,
//! Greek letter names as macros, and rational coefficients folded into a
//! single fraction.

use num_bigint::BigInt;
use num_traits::{One, Signed};

use crate::algebra::{Expr, Func, Kernel, Matrix, Monomial, Poly, Rational};

const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "pi", "rho", "sigma", "tau", "upsilon", "phi", "chi", "psi",
    "omega", "Gamma", "Delta", "Theta", "Lambda", "Xi", "Pi", "Sigma", "Upsilon", "Phi", "Psi",
    "Omega",
];

/// LaTeX for a symbol name: Greek names become macros, `a_b` and trailing
/// digits become subscripts.
pub fn symbol_latex(name: &str) -> String {
    if let Some((base, sub)) = name.split_once('_') {
        if !base.is_empty() && !sub.is_empty() {
            return format!("{}_{{{}}}", symbol_latex(base), symbol_latex(sub));
        }
    }
    let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits > 0 && digits < name.len() {
        let (base, sub) = name.split_at(name.len() - digits);
        return format!("{}_{{{}}}", symbol_latex(base), sub);
    }
    if GREEK.contains(&name) {
        format!("\\{}", name)
    } else if name == "omicron" {
        "o".to_string()
    } else {
        name.to_string()
    }
}

/// LaTeX for an expression.
pub fn latex(e: &Expr) -> String {
    let factors: Vec<(&Poly, u32)> = e.denominator().collect();
    if factors.is_empty() {
        return poly(e.numerator());
    }

    // Clear coefficient denominators into the fraction's denominator
    let lcm = e.numerator().denominator_lcm();
    let num = e.numerator().scale(&Rational::from_integer(lcm.clone()));

    let mut den_parts = Vec::new();
    if !lcm.is_one() {
        den_parts.push(lcm.to_string());
    }
    for (f, exp) in factors {
        den_parts.push(factor(f, exp));
    }
    let den = den_parts.join(" ");

    if num.len() == 1 && num.is_leading_negative() {
        format!("- \\frac{{{}}}{{{}}}", poly(&num.neg()), den)
    } else {
        format!("\\frac{{{}}}{{{}}}", poly(&num), den)
    }
}

/// `\begin{bmatrix}a & b \\ c & d\end{bmatrix}`
pub fn latex_matrix(m: &Matrix) -> String {
    let rows: Vec<String> = m
        .row_iter()
        .map(|row| row.iter().map(latex).collect::<Vec<_>>().join(" & "))
        .collect();
    format!("\\begin{{bmatrix}}{}\\end{{bmatrix}}", rows.join(" \\\\ "))
}

fn poly(p: &Poly) -> String {
    if p.is_zero() {
        return "0".to_string();
    }
    let mut out = String::new();
    for (i, (m, c)) in p.terms().rev().enumerate() {
        match (i, c.is_negative()) {
            (0, true) => out.push_str("- "),
            (0, false) => {}
            (_, true) => out.push_str(" - "),
            (_, false) => out.push_str(" + "),
        }
        out.push_str(&term(m, &c.abs()));
    }
    out
}

/// One term with a non-negative coefficient.
fn term(m: &Monomial, c: &Rational) -> String {
    let numer = c.numer();
    let denom = c.denom();
    let body = if m.is_one() {
        numer.to_string()
    } else if numer.is_one() {
        monomial(m)
    } else {
        format!("{} {}", numer, monomial(m))
    };
    if denom.is_one() {
        body
    } else {
        format!("\\frac{{{}}}{{{}}}", body, denom)
    }
}

fn monomial(m: &Monomial) -> String {
    m.factors()
        .iter()
        .map(|(k, e)| kernel_power(k, *e))
        .collect::<Vec<_>>()
        .join(" ")
}

fn factor(f: &Poly, exp: u32) -> String {
    if let Some((m, c)) = f.leading() {
        if f.len() == 1 && c.is_one() {
            return match m.factors() {
                [(k, e)] => kernel_power(k, e * exp),
                _ => power(&monomial(m), exp, true),
            };
        }
    }
    power(&poly(f), exp, true)
}

/// `base^{exp}`, parenthesising compound bases.
fn power(base: &str, exp: u32, compound: bool) -> String {
    match (exp, compound) {
        (1, true) => format!("\\left({}\\right)", base),
        (1, false) => base.to_string(),
        (_, true) => format!("\\left({}\\right)^{{{}}}", base, exp),
        (_, false) => format!("{}^{{{}}}", base, exp),
    }
}

fn argument(arg: &Expr) -> String {
    format!("{{\\left({} \\right)}}", latex(arg))
}

fn kernel_power(k: &Kernel, exp: u32) -> String {
    match k {
        Kernel::Symbol(s) => power(&symbol_latex(s.name()), exp, false),
        Kernel::Func(Func::Exp, arg) => {
            let scaled = arg.scale(&Rational::from_integer(BigInt::from(exp)));
            format!("e^{{{}}}", latex(&scaled))
        }
        Kernel::Func(Func::Sqrt, arg) => {
            let root = format!("\\sqrt{{{}}}", latex(arg));
            if exp == 1 {
                root
            } else {
                power(&root, exp, true)
            }
        }
        Kernel::Func(f, arg) => {
            let head = if exp == 1 {
                format!("\\{}", f.name())
            } else {
                format!("\\{}^{{{}}}", f.name(), exp)
            };
            format!("{}{}", head, argument(arg))
        }
        Kernel::Undefined { name, order, arg } => {
            let head = symbol_latex(name);
            if *order == 0 {
                let head = if exp == 1 {
                    head
                } else {
                    format!("{}^{{{}}}", head, exp)
                };
                return format!("{}{}", head, argument(arg));
            }
            let base = match arg.as_symbol() {
                Some(x) if *order == 1 => {
                    format!("\\frac{{d}}{{d {}}} {}{}", symbol_latex(x.name()), head, argument(arg))
                }
                Some(x) => format!(
                    "\\frac{{d^{{{}}}}}{{d {}^{{{}}}}} {}{}",
                    order,
                    symbol_latex(x.name()),
                    order,
                    head,
                    argument(arg)
                ),
                None => format!("{}{}{}", head, "'".repeat(*order as usize), argument(arg)),
            };
            if exp == 1 {
                base
            } else {
                power(&base, exp, true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greek_and_subscripts() {
        assert_eq!(symbol_latex("theta"), "\\theta");
        assert_eq!(symbol_latex("r"), "r");
        assert_eq!(symbol_latex("x1"), "x_{1}");
        assert_eq!(symbol_latex("r_s"), "r_{s}");
        assert_eq!(symbol_latex("omega_0"), "\\omega_{0}");
    }
}
