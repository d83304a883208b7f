//! LaTeX rendering of derived tensors.
//!
//! The adapter never fails a run: a tensor that cannot be rendered becomes a
//! LaTeX comment placeholder and a logged warning.

use thiserror::Error;

use crate::algebra::Expr;
use crate::latex::{latex, latex_matrix, symbol_latex};
use crate::tensor::{Slot, Tensor, TensorKind, TensorValue};

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("{kind:?} has {axis} components per index but {labels} index labels were given")]
    LabelCount {
        kind: TensorKind,
        axis: usize,
        labels: usize,
    },

    #[error("{kind:?} expects rank {expected}, value has rank {found}")]
    RankMismatch {
        kind: TensorKind,
        expected: usize,
        found: usize,
    },
}

/// Converts tensors to LaTeX markup.
#[derive(Clone, Debug, Default)]
pub struct RenderAdapter {
    show_zero_components: bool,
}

impl RenderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also list components that are identically zero.
    pub fn show_zero_components(mut self, show: bool) -> Self {
        self.show_zero_components = show;
        self
    }

    /// Render `tensor` with `labels` naming each coordinate index.
    ///
    /// On failure the returned markup is a placeholder comment.
    pub fn render(&self, tensor: &Tensor, labels: &[String]) -> String {
        match self.try_render(tensor, labels) {
            Ok(markup) => markup,
            Err(err) => {
                tracing::warn!(kind = ?tensor.kind, error = %err, "render failed, using placeholder");
                format!(
                    "{}% [{} could not be rendered: {}]\n",
                    section_header(tensor.kind),
                    tensor.kind.title(),
                    err
                )
            }
        }
    }

    pub fn try_render(&self, tensor: &Tensor, labels: &[String]) -> Result<String, RenderError> {
        let kind = tensor.kind;
        if kind.rank() != tensor.value.rank() {
            return Err(RenderError::RankMismatch {
                kind,
                expected: kind.rank(),
                found: tensor.value.rank(),
            });
        }
        let axis = axis_len(&tensor.value);
        if kind.rank() > 0 && axis != labels.len() {
            return Err(RenderError::LabelCount {
                kind,
                axis,
                labels: labels.len(),
            });
        }

        let labels: Vec<String> = labels.iter().map(|l| symbol_latex(l)).collect();
        let mut out = section_header(kind);
        match &tensor.value {
            TensorValue::Scalar(e) => {
                out.push_str(&format!("{} = {}\n", kind.symbol(), latex(e)));
            }
            TensorValue::Vector(v) => {
                for (mu, e) in v.iter().enumerate() {
                    out.push_str(&format!("{} = {}\n", component_name(kind, &[mu], &labels), latex(e)));
                }
            }
            TensorValue::Matrix(m) => {
                out.push_str(&latex_matrix(m));
                out.push('\n');
                let symmetric = m.is_symmetric() && kind != TensorKind::MixedEinstein;
                self.components(&mut out, kind, &labels, m.rows(), 2, |index| {
                    let (i, j) = (index[0], index[1]);
                    if symmetric && i > j {
                        None
                    } else {
                        Some(m.get(i, j))
                    }
                });
            }
            TensorValue::Rank3(t) => {
                self.components(&mut out, kind, &labels, t.len(), 3, |index| {
                    let (rho, mu, nu) = (index[0], index[1], index[2]);
                    if mu > nu {
                        None
                    } else {
                        Some(t[rho].get(mu, nu))
                    }
                });
            }
        }
        Ok(out)
    }

    /// Component lines `name = value \\` for every index tuple `pick` accepts.
    fn components<'a>(
        &self,
        out: &mut String,
        kind: TensorKind,
        labels: &[String],
        n: usize,
        rank: usize,
        pick: impl Fn(&[usize]) -> Option<&'a Expr>,
    ) {
        let mut written = 0;
        for index in index_tuples(n, rank) {
            let e = match pick(&index) {
                Some(e) => e,
                None => continue,
            };
            if e.is_zero() && !self.show_zero_components {
                continue;
            }
            out.push_str(&format!(
                "{} = {} \\\\\n",
                component_name(kind, &index, labels),
                latex(e)
            ));
            written += 1;
        }
        if written == 0 {
            out.push_str("% all components vanish\n");
        }
    }
}

fn section_header(kind: TensorKind) -> String {
    let name = match kind {
        TensorKind::Metric => "g_{\\mu\\nu}",
        TensorKind::InverseMetric => "g^{\\mu\\nu}",
        TensorKind::Christoffel => "\\Gamma^{\\rho}_{\\mu\\nu}",
        TensorKind::Ricci => "R_{\\mu\\nu}",
        TensorKind::RicciScalar => "R",
        TensorKind::Einstein => "G_{\\mu\\nu}",
        TensorKind::MixedEinstein => "G^{\\mu}_{\\nu}",
        TensorKind::Divergence => "\\nabla_\\nu G^{\\mu\\nu}",
    };
    format!("\n% ===== {} {} ===== %\n\n", kind.title(), name)
}

fn axis_len(value: &TensorValue) -> usize {
    match value {
        TensorValue::Scalar(_) => 0,
        TensorValue::Vector(v) => v.len(),
        TensorValue::Matrix(m) => m.rows(),
        TensorValue::Rank3(t) => t.len(),
    }
}

/// All index tuples of length `rank` over `0..n`, lexicographic.
fn index_tuples(n: usize, rank: usize) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new()];
    for _ in 0..rank {
        out = out
            .into_iter()
            .flat_map(|prefix| {
                (0..n).map(move |i| {
                    let mut next = prefix.clone();
                    next.push(i);
                    next
                })
            })
            .collect();
    }
    out
}

/// `\Gamma^{t}_{r r}`, `G^{t}_{r}`, `\nabla_\nu G^{t \nu}`
fn component_name(kind: TensorKind, index: &[usize], labels: &[String]) -> String {
    if kind == TensorKind::Divergence {
        return format!("\\nabla_\\nu G^{{{} \\nu}}", labels[index[0]]);
    }
    fn flush(name: &mut String, slot: Option<Slot>, group: &mut Vec<&str>) {
        if let Some(slot) = slot {
            let mark = if slot == Slot::Upper { '^' } else { '_' };
            name.push_str(&format!("{}{{{}}}", mark, group.join(" ")));
        }
        group.clear();
    }

    let mut name = kind.symbol().to_string();
    let mut current: Option<Slot> = None;
    let mut group: Vec<&str> = Vec::new();
    for (slot, i) in kind.slots().iter().zip(index) {
        if current != Some(*slot) {
            flush(&mut name, current, &mut group);
            current = Some(*slot);
        }
        group.push(&labels[*i]);
    }
    flush(&mut name, current, &mut group);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_tuples() {
        assert_eq!(index_tuples(2, 2), vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
        assert_eq!(index_tuples(3, 0), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_component_names() {
        let labels = vec!["t".to_string(), "\\theta".to_string()];
        assert_eq!(
            component_name(TensorKind::Christoffel, &[0, 1, 1], &labels),
            "\\Gamma^{t}_{\\theta \\theta}"
        );
        assert_eq!(component_name(TensorKind::MixedEinstein, &[1, 0], &labels), "G^{\\theta}_{t}");
        assert_eq!(component_name(TensorKind::Divergence, &[0], &labels), "\\nabla_\\nu G^{t \\nu}");
    }
}
