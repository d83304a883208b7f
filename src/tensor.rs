//! Derived tensors and their index metadata.

use crate::algebra::{Expr, Matrix};

/// Position of one tensor index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    Upper,
    Lower,
}

/// Which quantity a tensor value represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorKind {
    Metric,
    InverseMetric,
    Christoffel,
    Ricci,
    RicciScalar,
    Einstein,
    MixedEinstein,
    Divergence,
}

impl TensorKind {
    /// The LaTeX head symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            TensorKind::Metric | TensorKind::InverseMetric => "g",
            TensorKind::Christoffel => "\\Gamma",
            TensorKind::Ricci | TensorKind::RicciScalar => "R",
            TensorKind::Einstein | TensorKind::MixedEinstein => "G",
            TensorKind::Divergence => "\\nabla_\\nu G",
        }
    }

    /// Index positions, outermost first.
    pub fn slots(self) -> &'static [Slot] {
        use Slot::*;
        match self {
            TensorKind::Metric | TensorKind::Ricci | TensorKind::Einstein => &[Lower, Lower],
            TensorKind::InverseMetric => &[Upper, Upper],
            TensorKind::Christoffel => &[Upper, Lower, Lower],
            TensorKind::RicciScalar => &[],
            TensorKind::MixedEinstein => &[Upper, Lower],
            // the free index of the divergence; the contracted one is in the head
            TensorKind::Divergence => &[Upper],
        }
    }

    pub fn rank(self) -> usize {
        self.slots().len()
    }

    /// Section title used by renderers.
    pub fn title(self) -> &'static str {
        match self {
            TensorKind::Metric => "Metric tensor",
            TensorKind::InverseMetric => "Inverse metric",
            TensorKind::Christoffel => "Christoffel symbols",
            TensorKind::Ricci => "Ricci tensor",
            TensorKind::RicciScalar => "Ricci scalar",
            TensorKind::Einstein => "Einstein tensor",
            TensorKind::MixedEinstein => "Mixed Einstein tensor",
            TensorKind::Divergence => "Covariant divergence of the Einstein tensor",
        }
    }
}

/// Component storage for ranks 0 to 3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TensorValue {
    Scalar(Expr),
    Vector(Vec<Expr>),
    Matrix(Matrix),
    /// Indexed by the first index; each entry is the matrix over the other two
    Rank3(Vec<Matrix>),
}

impl TensorValue {
    pub fn rank(&self) -> usize {
        match self {
            TensorValue::Scalar(_) => 0,
            TensorValue::Vector(_) => 1,
            TensorValue::Matrix(_) => 2,
            TensorValue::Rank3(_) => 3,
        }
    }

    /// Component at `index`, if the index has the right length and is in range.
    pub fn component(&self, index: &[usize]) -> Option<&Expr> {
        match (self, index) {
            (TensorValue::Scalar(e), []) => Some(e),
            (TensorValue::Vector(v), [i]) => v.get(*i),
            (TensorValue::Matrix(m), [i, j]) if *i < m.rows() && *j < m.cols() => Some(m.get(*i, *j)),
            (TensorValue::Rank3(t), [i, j, k]) => t
                .get(*i)
                .filter(|m| *j < m.rows() && *k < m.cols())
                .map(|m| m.get(*j, *k)),
            _ => None,
        }
    }

    /// True when every component is exactly zero.
    pub fn is_zero(&self) -> bool {
        match self {
            TensorValue::Scalar(e) => e.is_zero(),
            TensorValue::Vector(v) => v.iter().all(Expr::is_zero),
            TensorValue::Matrix(m) => m.row_iter().flatten().all(Expr::is_zero),
            TensorValue::Rank3(t) => t.iter().all(|m| m.row_iter().flatten().all(Expr::is_zero)),
        }
    }
}

/// A derived tensor: what it is plus its components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tensor {
    pub kind: TensorKind,
    pub value: TensorValue,
}

impl Tensor {
    pub fn new(kind: TensorKind, value: TensorValue) -> Self {
        Self { kind, value }
    }

    pub fn component(&self, index: &[usize]) -> Option<&Expr> {
        self.value.component(index)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn as_matrix(&self) -> Option<&Matrix> {
        match &self.value {
            TensorValue::Matrix(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Expr> {
        match &self.value {
            TensorValue::Scalar(e) => Some(e),
            _ => None,
        }
    }
}
