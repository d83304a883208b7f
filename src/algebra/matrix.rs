//! Dense square and rectangular matrices of expressions.

use super::expr::Expr;
use super::{AlgebraError, AlgebraResult};

/// Row-major matrix of expressions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<Expr>,
}

impl Matrix {
    /// Build from nested rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<Expr>>) -> AlgebraResult<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            if row.len() != n_cols {
                return Err(AlgebraError::ShapeMismatch {
                    left_rows: n_rows,
                    left_cols: n_cols,
                    right_rows: 1,
                    right_cols: row.len(),
                });
            }
            data.extend(row);
        }
        Ok(Matrix {
            rows: n_rows,
            cols: n_cols,
            data,
        })
    }

    /// Build by evaluating `f(i, j)` for every entry.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> Expr) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Matrix { rows, cols, data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix::from_fn(rows, cols, |_, _| Expr::zero())
    }

    pub fn identity(n: usize) -> Self {
        Matrix::from_fn(n, n, |i, j| if i == j { Expr::one() } else { Expr::zero() })
    }

    /// Diagonal matrix from its entries.
    pub fn diagonal(entries: Vec<Expr>) -> Self {
        let n = entries.len();
        let mut m = Matrix::zeros(n, n);
        for (i, e) in entries.into_iter().enumerate() {
            m.data[i * n + i] = e;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_square(&self) -> bool {
        self.rows == self.cols
    }

    /// Entry `(i, j)`. Panics when out of bounds, like slice indexing.
    pub fn get(&self, i: usize, j: usize) -> &Expr {
        &self.data[i * self.cols + j]
    }

    pub fn set(&mut self, i: usize, j: usize, value: Expr) {
        self.data[i * self.cols + j] = value;
    }

    /// Rows as slices.
    pub fn row_iter(&self) -> impl Iterator<Item = &[Expr]> {
        self.data.chunks(self.cols.max(1)).take(self.rows)
    }

    pub fn transpose(&self) -> Matrix {
        Matrix::from_fn(self.cols, self.rows, |i, j| self.get(j, i).clone())
    }

    pub fn is_symmetric(&self) -> bool {
        self.is_square()
            && (0..self.rows).all(|i| (i + 1..self.cols).all(|j| self.get(i, j) == self.get(j, i)))
    }

    pub fn is_diagonal(&self) -> bool {
        (0..self.rows).all(|i| (0..self.cols).all(|j| i == j || self.get(i, j).is_zero()))
    }

    pub fn mul(&self, other: &Matrix) -> AlgebraResult<Matrix> {
        if self.cols != other.rows {
            return Err(AlgebraError::ShapeMismatch {
                left_rows: self.rows,
                left_cols: self.cols,
                right_rows: other.rows,
                right_cols: other.cols,
            });
        }
        Ok(Matrix::from_fn(self.rows, other.cols, |i, j| {
            let mut acc = Expr::zero();
            for k in 0..self.cols {
                acc = acc.add(&self.get(i, k).mul(other.get(k, j)));
            }
            acc
        }))
    }

    /// Apply `f` to every entry.
    pub fn try_map(&self, mut f: impl FnMut(&Expr) -> AlgebraResult<Expr>) -> AlgebraResult<Matrix> {
        let data = self.data.iter().map(&mut f).collect::<AlgebraResult<Vec<_>>>()?;
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Symbolic inverse by Gauss-Jordan elimination.
    pub fn inverse(&self) -> AlgebraResult<Matrix> {
        let mut gj = GaussJordan::new(self)?;
        while gj.step()? {}
        gj.finish()
    }
}

/// Incremental Gauss-Jordan inversion, one pivot column per [`step`].
///
/// Exposed so that long inversions can be interleaved with cancellation
/// checks.
///
/// [`step`]: GaussJordan::step
#[derive(Clone, Debug)]
pub struct GaussJordan {
    n: usize,
    left: Matrix,
    right: Matrix,
    column: usize,
}

impl GaussJordan {
    pub fn new(m: &Matrix) -> AlgebraResult<Self> {
        if !m.is_square() {
            return Err(AlgebraError::ShapeMismatch {
                left_rows: m.rows,
                left_cols: m.cols,
                right_rows: m.cols,
                right_cols: m.rows,
            });
        }
        Ok(GaussJordan {
            n: m.rows,
            left: m.clone(),
            right: Matrix::identity(m.rows),
            column: 0,
        })
    }

    /// Number of columns still to eliminate.
    pub fn remaining(&self) -> usize {
        self.n - self.column
    }

    /// Eliminate the next column. Returns `false` once every column is done.
    pub fn step(&mut self) -> AlgebraResult<bool> {
        let col = self.column;
        if col >= self.n {
            return Ok(false);
        }

        // Simplest non-zero pivot keeps intermediate expressions small
        let pivot_row = (col..self.n)
            .filter(|&r| !self.left.get(r, col).is_zero())
            .min_by_key(|&r| self.left.get(r, col).complexity())
            .ok_or(AlgebraError::SingularMatrix { column: col })?;
        self.swap_rows(col, pivot_row);

        let pivot = self.left.get(col, col).clone();
        for j in 0..self.n {
            let l = self.left.get(col, j).div(&pivot)?;
            self.left.set(col, j, l);
            let r = self.right.get(col, j).div(&pivot)?;
            self.right.set(col, j, r);
        }

        for i in 0..self.n {
            if i == col {
                continue;
            }
            let factor = self.left.get(i, col).clone();
            if factor.is_zero() {
                continue;
            }
            for j in 0..self.n {
                let l = self.left.get(i, j).sub(&factor.mul(self.left.get(col, j)));
                self.left.set(i, j, l);
                let r = self.right.get(i, j).sub(&factor.mul(self.right.get(col, j)));
                self.right.set(i, j, r);
            }
        }

        self.column += 1;
        Ok(self.column < self.n)
    }

    /// The inverse, once all steps have run.
    pub fn finish(mut self) -> AlgebraResult<Matrix> {
        while self.step()? {}
        Ok(self.right)
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        for j in 0..self.n {
            self.left.data.swap(a * self.n + j, b * self.n + j);
            self.right.data.swap(a * self.n + j, b * self.n + j);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::{Assumptions, Symbol};

    #[test]
    fn test_inverse_of_diagonal() {
        let r = Expr::symbol(&Symbol::new("r", Assumptions::REAL));
        let m = Matrix::diagonal(vec![Expr::integer(-1), r.mul(&r)]);
        let inv = m.inverse().unwrap();
        assert_eq!(*inv.get(0, 0), Expr::integer(-1));
        assert_eq!(inv.get(1, 1).mul(&r).mul(&r), Expr::one());
        assert!(inv.get(0, 1).is_zero());
    }

    #[test]
    fn test_inverse_of_off_diagonal() {
        let a = Expr::symbol(&Symbol::new("a", Assumptions::REAL));
        // [[0, a], [a, 1]]
        let m = Matrix::from_rows(vec![
            vec![Expr::zero(), a.clone()],
            vec![a.clone(), Expr::one()],
        ])
        .unwrap();
        let inv = m.inverse().unwrap();
        assert_eq!(m.mul(&inv).unwrap(), Matrix::identity(2));
    }

    #[test]
    fn test_singular_matrix() {
        let m = Matrix::from_rows(vec![
            vec![Expr::one(), Expr::integer(2)],
            vec![Expr::integer(2), Expr::integer(4)],
        ])
        .unwrap();
        assert_eq!(m.inverse(), Err(AlgebraError::SingularMatrix { column: 1 }));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Matrix::from_rows(vec![vec![Expr::one()], vec![Expr::one(), Expr::one()]]);
        assert!(matches!(err, Err(AlgebraError::ShapeMismatch { .. })));
    }
}
