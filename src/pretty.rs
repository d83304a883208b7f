//! Plain-text printer for algebra values
//!
//! Renders expressions in metric-language syntax, so printed values can be
//! pasted back into a definition.

use std::fmt;

use num_traits::{One, Signed};

use crate::algebra::{Expr, Kernel, Matrix, Monomial, Poly, Rational};

/// A printer accumulating output
#[derive(Default)]
pub struct Pretty {
    output: String,
}

impl Pretty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> String {
        self.output
    }

    fn write(&mut self, s: &str) {
        self.output.push_str(s);
    }
}

// ============ Pretty-printing implementations ============

impl Pretty {
    pub fn expr(&mut self, e: &Expr) {
        if e.denominator().next().is_none() {
            self.poly(e.numerator());
            return;
        }

        if e.numerator().len() > 1 {
            self.write("(");
            self.poly(e.numerator());
            self.write(")");
        } else {
            self.poly(e.numerator());
        }
        self.write("/");

        let factors: Vec<(&Poly, u32)> = e.denominator().collect();
        let wrap = factors.len() > 1;
        if wrap {
            self.write("(");
        }
        for (i, (f, exp)) in factors.into_iter().enumerate() {
            if i > 0 {
                self.write("*");
            }
            self.factor(f, exp);
        }
        if wrap {
            self.write(")");
        }
    }

    pub fn poly(&mut self, p: &Poly) {
        if p.is_zero() {
            self.write("0");
            return;
        }
        for (i, (m, c)) in p.terms().rev().enumerate() {
            match (i, c.is_negative()) {
                (0, true) => self.write("-"),
                (0, false) => {}
                (_, true) => self.write(" - "),
                (_, false) => self.write(" + "),
            }
            self.term(m, &c.abs());
        }
    }

    fn term(&mut self, m: &Monomial, c: &Rational) {
        if m.is_one() {
            self.write(&c.to_string());
            return;
        }
        if !c.is_one() {
            self.write(&c.to_string());
            self.write("*");
        }
        self.monomial(m);
    }

    fn monomial(&mut self, m: &Monomial) {
        for (i, (k, e)) in m.factors().iter().enumerate() {
            if i > 0 {
                self.write("*");
            }
            self.kernel(k);
            if *e > 1 {
                self.write(&format!("^{}", e));
            }
        }
    }

    /// A denominator factor raised to `exp`.
    fn factor(&mut self, f: &Poly, exp: u32) {
        let atomic = f.len() == 1
            && f
                .leading()
                .map_or(false, |(m, c)| c.is_one() && m.factors().len() == 1);
        if atomic {
            self.poly(f);
        } else {
            self.write("(");
            self.poly(f);
            self.write(")");
        }
        if exp > 1 {
            self.write(&format!("^{}", exp));
        }
    }

    pub fn kernel(&mut self, k: &Kernel) {
        match k {
            Kernel::Symbol(s) => self.write(s.name()),
            Kernel::Func(f, arg) => {
                self.write(f.name());
                self.write("(");
                self.expr(arg);
                self.write(")");
            }
            Kernel::Undefined { name, order, arg } => match (*order, arg.as_symbol()) {
                (0, _) => {
                    self.write(name);
                    self.write("(");
                    self.expr(arg);
                    self.write(")");
                }
                (1, Some(x)) => self.write(&format!("diff({}({}), {})", name, x, x)),
                (n, Some(x)) => self.write(&format!("diff({}({}), {}, {})", name, x, x, n)),
                (n, None) => {
                    self.write(&format!("{}{}(", name, "'".repeat(n as usize)));
                    self.expr(arg);
                    self.write(")");
                }
            },
        }
    }

    pub fn matrix(&mut self, m: &Matrix) {
        self.write("[");
        for (i, row) in m.row_iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write("[");
            for (j, e) in row.iter().enumerate() {
                if j > 0 {
                    self.write(", ");
                }
                self.expr(e);
            }
            self.write("]");
        }
        self.write("]");
    }
}

/// Print an expression in source syntax
pub fn pretty_print(e: &Expr) -> String {
    let mut p = Pretty::new();
    p.expr(e);
    p.finish()
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&pretty_print(self))
    }
}

impl fmt::Display for Poly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Pretty::new();
        p.poly(self);
        f.write_str(&p.finish())
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Pretty::new();
        p.kernel(self);
        f.write_str(&p.finish())
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Pretty::new();
        p.matrix(self);
        f.write_str(&p.finish())
    }
}
