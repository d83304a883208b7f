//! The metric tensor and its coordinate system.

use std::sync::Arc;

use crate::algebra::{Expr, Matrix};
use crate::error::GrError;
use crate::symbol::{Symbol, SymbolTable};

/// An `n x n` symbolic metric over `n` coordinates.
///
/// Only the shape is validated. Symmetry and signature are the user's
/// responsibility; the derivation reads `g[i][j]` as written.
#[derive(Clone, Debug)]
pub struct MetricModel {
    table: Arc<SymbolTable>,
    components: Matrix,
}

impl MetricModel {
    /// Build from rows of expressions.
    pub fn new(table: Arc<SymbolTable>, rows: Vec<Vec<Expr>>) -> Result<Self, GrError> {
        let n = table.dimension();
        let mismatch = |rows: usize, cols: usize| GrError::DimensionMismatch {
            rows,
            cols,
            coordinates: n,
        };

        let first_cols = rows.first().map(Vec::len).unwrap_or(0);
        if n == 0 || rows.len() != n {
            return Err(mismatch(rows.len(), first_cols));
        }
        if let Some(bad) = rows.iter().find(|row| row.len() != n) {
            return Err(mismatch(rows.len(), bad.len()));
        }

        let components = Matrix::from_rows(rows).map_err(|_| mismatch(n, first_cols))?;
        Ok(Self { table, components })
    }

    /// Build from an already-shaped matrix.
    pub fn from_matrix(table: Arc<SymbolTable>, components: Matrix) -> Result<Self, GrError> {
        let n = table.dimension();
        if n == 0 || components.rows() != n || components.cols() != n {
            return Err(GrError::DimensionMismatch {
                rows: components.rows(),
                cols: components.cols(),
                coordinates: n,
            });
        }
        Ok(Self { table, components })
    }

    pub fn dimension(&self) -> usize {
        self.components.rows()
    }

    pub fn table(&self) -> &Arc<SymbolTable> {
        &self.table
    }

    pub fn coordinates(&self) -> &[Symbol] {
        self.table.coordinates()
    }

    pub fn components(&self) -> &Matrix {
        &self.components
    }

    pub fn component(&self, i: usize, j: usize) -> &Expr {
        self.components.get(i, j)
    }

    pub fn is_symmetric(&self) -> bool {
        self.components.is_symmetric()
    }
}
