//! Per-stage tensor computations.
//!
//! Each stage is a plain function from earlier results to its own result.
//! Work is split into *units* (one component, or one elimination column);
//! every unit goes through a [`Checkpoint`], which polls for cancellation
//! before the unit runs and tags any algebra error with the unit's index.
//!
//! Index conventions: `gamma[rho].get(mu, nu)` is `Gamma^rho_{mu nu}`;
//! `mixed.get(mu, nu)` is `G^mu_nu`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use num_bigint::BigInt;

use crate::algebra::{AlgebraError, AlgebraResult, Expr, GaussJordan, Matrix, Rational};
use crate::engine::Stage;
use crate::metric::MetricModel;
use crate::symbol::Symbol;

/// Something the derivation can ask "should I stop?".
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// Never cancels. For synchronous one-off derivations.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Callback invoked after every completed unit of work.
pub type UnitObserver = dyn Fn(Stage, &[usize]) + Send + Sync;

/// Why a stage stopped early.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageError {
    Cancelled,
    Computation {
        index: Vec<usize>,
        cause: AlgebraError,
    },
}

/// Unit-of-work gate for one stage.
pub struct Checkpoint<'a> {
    stage: Stage,
    cancel: &'a dyn Cancellation,
    observer: Option<&'a UnitObserver>,
    units: usize,
}

impl<'a> Checkpoint<'a> {
    pub fn new(stage: Stage, cancel: &'a dyn Cancellation) -> Self {
        Self {
            stage,
            cancel,
            observer: None,
            units: 0,
        }
    }

    pub fn with_observer(mut self, observer: Option<&'a UnitObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Units completed so far.
    pub fn units(&self) -> usize {
        self.units
    }

    /// Poll for cancellation without running anything.
    pub fn check(&self) -> Result<(), StageError> {
        if self.cancel.is_cancelled() {
            Err(StageError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run one unit of work identified by `index`.
    pub fn unit<T>(
        &mut self,
        index: &[usize],
        work: impl FnOnce() -> AlgebraResult<T>,
    ) -> Result<T, StageError> {
        self.check()?;
        let out = work().map_err(|cause| StageError::Computation {
            index: index.to_vec(),
            cause,
        })?;
        self.units += 1;
        tracing::debug!(stage = %self.stage, ?index, "unit done");
        if let Some(observer) = self.observer {
            observer(self.stage, index);
        }
        Ok(out)
    }
}

fn half() -> Rational {
    Rational::new(BigInt::from(1), BigInt::from(2))
}

fn computation(index: Vec<usize>, cause: AlgebraError) -> StageError {
    StageError::Computation { index, cause }
}

/// Lazily computed `d_k g_{ij}`, shared by every Christoffel component.
pub struct MetricDerivatives<'a> {
    metric: &'a Matrix,
    coordinates: &'a [Symbol],
    cache: BTreeMap<(usize, usize, usize), Expr>,
}

impl<'a> MetricDerivatives<'a> {
    pub fn new(metric: &'a MetricModel) -> Self {
        Self {
            metric: metric.components(),
            coordinates: metric.coordinates(),
            cache: BTreeMap::new(),
        }
    }

    /// `d g_{ij} / d x^k`
    pub fn get(&mut self, k: usize, i: usize, j: usize) -> AlgebraResult<Expr> {
        // symmetric metrics share entries; asymmetric ones must not
        let key = if self.metric.get(i, j) == self.metric.get(j, i) {
            (k, i.min(j), i.max(j))
        } else {
            (k, i, j)
        };
        if let Some(d) = self.cache.get(&key) {
            return Ok(d.clone());
        }
        let d = self.metric.get(i, j).diff(&self.coordinates[k])?;
        self.cache.insert(key, d.clone());
        Ok(d)
    }

    /// Number of cached derivatives.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

// ============================================================================
// Stages
// ============================================================================

/// `g^{mu nu}` by Gauss-Jordan elimination, one column per unit.
pub fn inverse_metric(metric: &MetricModel, cp: &mut Checkpoint<'_>) -> Result<Matrix, StageError> {
    let mut gj = GaussJordan::new(metric.components()).map_err(|e| computation(vec![], e))?;
    let mut column = 0;
    loop {
        let more = cp.unit(&[column], || gj.step())?;
        column += 1;
        if !more {
            break;
        }
    }
    gj.finish().map_err(|e| computation(vec![column], e))
}

/// `Gamma^rho_{mu nu}`, computed for `mu <= nu` and mirrored.
pub fn christoffel(
    metric: &MetricModel,
    inverse: &Matrix,
    cp: &mut Checkpoint<'_>,
) -> Result<Vec<Matrix>, StageError> {
    let n = metric.dimension();
    let mut dg = MetricDerivatives::new(metric);
    let mut gamma = vec![Matrix::zeros(n, n); n];

    for rho in 0..n {
        for mu in 0..n {
            for nu in mu..n {
                let value = cp.unit(&[rho, mu, nu], || {
                    let mut acc = Expr::zero();
                    for sigma in 0..n {
                        let g_inv = inverse.get(rho, sigma);
                        if g_inv.is_zero() {
                            continue;
                        }
                        let bracket = dg
                            .get(mu, sigma, nu)?
                            .add(&dg.get(nu, sigma, mu)?)
                            .sub(&dg.get(sigma, mu, nu)?);
                        acc = acc.add(&g_inv.mul(&bracket));
                    }
                    Ok(acc.scale(&half()).simplify())
                })?;
                gamma[rho].set(nu, mu, value.clone());
                gamma[rho].set(mu, nu, value);
            }
        }
    }
    tracing::debug!(cached = dg.len(), "metric derivatives");
    Ok(gamma)
}

/// `T_mu = Gamma^rho_{mu rho}`
pub fn contracted_christoffel(gamma: &[Matrix]) -> Vec<Expr> {
    let n = gamma.len();
    (0..n)
        .map(|mu| Expr::sum((0..n).map(|rho| gamma[rho].get(mu, rho))).simplify())
        .collect()
}

/// `R_{mu nu}`, computed for `mu <= nu` and mirrored.
pub fn ricci(
    metric: &MetricModel,
    gamma: &[Matrix],
    cp: &mut Checkpoint<'_>,
) -> Result<Matrix, StageError> {
    let n = metric.dimension();
    let x = metric.coordinates();
    cp.check()?;
    let trace = contracted_christoffel(gamma);
    let mut ricci = Matrix::zeros(n, n);

    for mu in 0..n {
        for nu in mu..n {
            let value = cp.unit(&[mu, nu], || {
                let mut acc = Expr::zero();
                for rho in 0..n {
                    acc = acc.add(&gamma[rho].get(mu, nu).diff(&x[rho])?);
                }
                acc = acc.sub(&trace[mu].diff(&x[nu])?);
                for sigma in 0..n {
                    acc = acc.add(&trace[sigma].mul(gamma[sigma].get(mu, nu)));
                    for rho in 0..n {
                        let a = gamma[rho].get(nu, sigma);
                        if a.is_zero() {
                            continue;
                        }
                        acc = acc.sub(&a.mul(gamma[sigma].get(mu, rho)));
                    }
                }
                Ok(acc.simplify())
            })?;
            ricci.set(nu, mu, value.clone());
            ricci.set(mu, nu, value);
        }
    }
    Ok(ricci)
}

/// `R = g^{mu nu} R_{mu nu}`, a single unit.
pub fn ricci_scalar(
    inverse: &Matrix,
    ricci: &Matrix,
    cp: &mut Checkpoint<'_>,
) -> Result<Expr, StageError> {
    cp.unit(&[], || Ok(trace(inverse, ricci)))
}

/// `sum g^{mu nu} T_{mu nu}`
pub fn trace(inverse: &Matrix, t: &Matrix) -> Expr {
    let n = inverse.rows();
    let mut acc = Expr::zero();
    for mu in 0..n {
        for nu in 0..n {
            let g = inverse.get(mu, nu);
            if !g.is_zero() {
                acc = acc.add(&g.mul(t.get(mu, nu)));
            }
        }
    }
    acc.simplify()
}

/// `G_{mu nu} = R_{mu nu} - R g_{mu nu} / 2`
pub fn einstein(
    metric: &MetricModel,
    ricci: &Matrix,
    scalar: &Expr,
    cp: &mut Checkpoint<'_>,
) -> Result<Matrix, StageError> {
    let n = metric.dimension();
    let half_r = scalar.scale(&half());
    let mut out = Matrix::zeros(n, n);
    for mu in 0..n {
        for nu in mu..n {
            let value = cp.unit(&[mu, nu], || {
                Ok(ricci
                    .get(mu, nu)
                    .sub(&half_r.mul(metric.component(mu, nu)))
                    .simplify())
            })?;
            out.set(nu, mu, value.clone());
            out.set(mu, nu, value);
        }
    }
    Ok(out)
}

/// `G^mu_nu = g^{mu sigma} G_{sigma nu}`, one unit per component.
pub fn mixed_einstein(
    inverse: &Matrix,
    einstein: &Matrix,
    cp: &mut Checkpoint<'_>,
) -> Result<Matrix, StageError> {
    let n = inverse.rows();
    let mut out = Matrix::zeros(n, n);
    for mu in 0..n {
        for nu in 0..n {
            let value = cp.unit(&[mu, nu], || {
                let mut acc = Expr::zero();
                for sigma in 0..n {
                    acc = acc.add(&inverse.get(mu, sigma).mul(einstein.get(sigma, nu)));
                }
                Ok(acc.simplify())
            })?;
            out.set(mu, nu, value);
        }
    }
    Ok(out)
}

/// `nabla_nu G^{mu nu}` for each free `mu`.
///
/// The mixed tensor is raised on its second index first; the raising pass
/// polls for cancellation per row but is not counted as units.
pub fn divergence(
    metric: &MetricModel,
    inverse: &Matrix,
    gamma: &[Matrix],
    mixed: &Matrix,
    cp: &mut Checkpoint<'_>,
) -> Result<Vec<Expr>, StageError> {
    let n = metric.dimension();
    let x = metric.coordinates();

    let mut upper = Matrix::zeros(n, n);
    for mu in 0..n {
        cp.check()?;
        for nu in 0..n {
            let mut acc = Expr::zero();
            for sigma in 0..n {
                acc = acc.add(&mixed.get(mu, sigma).mul(inverse.get(sigma, nu)));
            }
            upper.set(mu, nu, acc.simplify());
        }
    }
    let trace = contracted_christoffel(gamma);

    let mut out = Vec::with_capacity(n);
    for mu in 0..n {
        let value = cp.unit(&[mu], || {
            let mut acc = Expr::zero();
            for nu in 0..n {
                acc = acc.add(&upper.get(mu, nu).diff(&x[nu])?);
                for sigma in 0..n {
                    acc = acc.add(&gamma[mu].get(nu, sigma).mul(upper.get(sigma, nu)));
                }
            }
            for sigma in 0..n {
                acc = acc.add(&trace[sigma].mul(upper.get(mu, sigma)));
            }
            Ok(acc.simplify())
        })?;
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolTable;
    use std::sync::Arc;

    fn polar() -> MetricModel {
        let table = Arc::new(SymbolTable::new(&["r", "phi"], &[]).unwrap());
        let r = Expr::symbol(&table.coordinates()[0]);
        MetricModel::new(
            table,
            vec![vec![Expr::one(), Expr::zero()], vec![Expr::zero(), r.mul(&r)]],
        )
        .unwrap()
    }

    #[test]
    fn test_polar_christoffel() {
        let metric = polar();
        let r = Expr::symbol(&metric.coordinates()[0]);
        let mut cp = Checkpoint::new(Stage::InverseMetric, &NeverCancel);
        let inv = inverse_metric(&metric, &mut cp).unwrap();
        assert_eq!(cp.units(), 2);

        let mut cp = Checkpoint::new(Stage::Christoffel, &NeverCancel);
        let gamma = christoffel(&metric, &inv, &mut cp).unwrap();
        assert_eq!(cp.units(), 2 * 2 * 3 / 2);
        // Gamma^r_{phi phi} = -r, Gamma^phi_{r phi} = 1/r
        assert_eq!(*gamma[0].get(1, 1), -r.clone());
        assert_eq!(*gamma[1].get(0, 1), Expr::one().div(&r).unwrap());
        assert_eq!(gamma[1].get(0, 1), gamma[1].get(1, 0));
    }

    #[test]
    fn test_cancelled_before_first_unit() {
        let metric = polar();
        let flag = AtomicBool::new(true);
        let mut cp = Checkpoint::new(Stage::InverseMetric, &flag);
        assert_eq!(inverse_metric(&metric, &mut cp), Err(StageError::Cancelled));
        assert_eq!(cp.units(), 0);
    }

    #[test]
    fn test_singular_metric_reports_column() {
        let table = Arc::new(SymbolTable::new(&["x", "y"], &[]).unwrap());
        let metric = MetricModel::new(
            table,
            vec![vec![Expr::one(), Expr::one()], vec![Expr::one(), Expr::one()]],
        )
        .unwrap();
        let mut cp = Checkpoint::new(Stage::InverseMetric, &NeverCancel);
        assert_eq!(
            inverse_metric(&metric, &mut cp),
            Err(StageError::Computation {
                index: vec![1],
                cause: AlgebraError::SingularMatrix { column: 1 }
            })
        );
    }
}
