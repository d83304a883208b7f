//! Tests for LaTeX rendering of expressions and tensors

use std::sync::Arc;

use grtensor::algebra::{Expr, Func, Matrix};
use grtensor::latex::{latex, latex_matrix};
use grtensor::render::RenderError;
use grtensor::{RenderAdapter, SymbolTable, Tensor, TensorKind, TensorValue};

fn table() -> Arc<SymbolTable> {
    Arc::new(SymbolTable::with_functions(&["r", "theta"], &["M"], &["a"]).unwrap())
}

fn var(table: &SymbolTable, name: &str) -> Expr {
    Expr::symbol(table.symbol(name).unwrap())
}

fn labels() -> Vec<String> {
    vec!["r".to_string(), "theta".to_string()]
}

fn polar_metric(table: &SymbolTable) -> Tensor {
    let r = var(table, "r");
    Tensor::new(
        TensorKind::Metric,
        TensorValue::Matrix(Matrix::diagonal(vec![Expr::one(), r.mul(&r)])),
    )
}

// ============================================================================
// Expressions
// ============================================================================

#[test]
fn test_latex_expressions() {
    let t = table();
    let r = var(&t, "r");
    let theta = var(&t, "theta");
    assert_eq!(latex(&Expr::zero()), "0");
    assert_eq!(latex(&r.mul(&r)), "r^{2}");
    assert_eq!(latex(&r.neg()), "- r");
    assert_eq!(latex(&Expr::one().div(&r).unwrap()), "\\frac{1}{r}");
    assert_eq!(latex(&r.neg().div(&theta).unwrap()), "- \\frac{r}{\\theta}");
    assert_eq!(latex(&Expr::ratio(1, 2).mul(&r)), "\\frac{r}{2}");

    let s = Expr::apply(Func::Sin, theta).unwrap();
    assert_eq!(latex(&s), "\\sin{\\left(\\theta \\right)}");
    assert_eq!(latex(&s.mul(&s)), "\\sin^{2}{\\left(\\theta \\right)}");
}

#[test]
fn test_latex_special_kernels() {
    let t = table();
    let r = var(&t, "r");
    let e = Expr::apply(Func::Exp, Expr::integer(2).mul(&r)).unwrap();
    assert_eq!(latex(&e), "e^{2 r}");

    let root = Expr::apply(Func::Sqrt, r.clone()).unwrap();
    assert_eq!(latex(&root), "\\sqrt{r}");

    let a = Expr::undefined("a", 0, r.clone());
    assert_eq!(latex(&a), "a{\\left(r \\right)}");
    let da = Expr::undefined("a", 1, r.clone());
    assert_eq!(latex(&da), "\\frac{d}{d r} a{\\left(r \\right)}");
    let dda = Expr::undefined("a", 2, r);
    assert_eq!(latex(&dda), "\\frac{d^{2}}{d r^{2}} a{\\left(r \\right)}");
}

#[test]
fn test_latex_matrix() {
    assert_eq!(
        latex_matrix(&Matrix::identity(2)),
        "\\begin{bmatrix}1 & 0 \\\\ 0 & 1\\end{bmatrix}"
    );
}

// ============================================================================
// Tensors
// ============================================================================

#[test]
fn test_render_metric() {
    let t = table();
    let markup = RenderAdapter::new().render(&polar_metric(&t), &labels());
    assert!(markup.contains("% ===== Metric tensor g_{\\mu\\nu} ===== %"), "{}", markup);
    assert!(markup.contains("\\begin{bmatrix}1 & 0 \\\\ 0 & r^{2}\\end{bmatrix}"));
    assert!(markup.contains("g_{r r} = 1 \\\\\n"));
    assert!(markup.contains("g_{\\theta \\theta} = r^{2} \\\\\n"));
    // zero components are hidden by default
    assert!(!markup.contains("g_{r \\theta}"));
}

#[test]
fn test_render_shows_zero_components_on_request() {
    let t = table();
    let markup = RenderAdapter::new()
        .show_zero_components(true)
        .render(&polar_metric(&t), &labels());
    assert!(markup.contains("g_{r \\theta} = 0 \\\\\n"));
    // symmetric matrices list only the upper triangle
    assert!(!markup.contains("g_{\\theta r}"));
}

#[test]
fn test_render_vanishing_tensor() {
    let zero = Tensor::new(
        TensorKind::Christoffel,
        TensorValue::Rank3(vec![Matrix::zeros(2, 2), Matrix::zeros(2, 2)]),
    );
    let markup = RenderAdapter::new().render(&zero, &labels());
    assert!(markup.contains("Christoffel symbols"));
    assert!(markup.contains("% all components vanish\n"));
}

#[test]
fn test_render_scalar_and_vector() {
    let t = table();
    let m = var(&t, "M");
    let scalar = Tensor::new(TensorKind::RicciScalar, TensorValue::Scalar(m));
    let markup = RenderAdapter::new().render(&scalar, &labels());
    assert!(markup.contains("R = M\n"));

    let div = Tensor::new(
        TensorKind::Divergence,
        TensorValue::Vector(vec![Expr::zero(), Expr::zero()]),
    );
    let markup = RenderAdapter::new().render(&div, &labels());
    assert!(markup.contains("\\nabla_\\nu G^{r \\nu} = 0\n"));
    assert!(markup.contains("\\nabla_\\nu G^{\\theta \\nu} = 0\n"));
}

#[test]
fn test_render_mixed_tensor_lists_both_triangles() {
    let t = table();
    let r = var(&t, "r");
    let m = Matrix::from_rows(vec![vec![Expr::zero(), r.clone()], vec![r, Expr::zero()]]).unwrap();
    let tensor = Tensor::new(TensorKind::MixedEinstein, TensorValue::Matrix(m));
    let markup = RenderAdapter::new().render(&tensor, &labels());
    assert!(markup.contains("G^{r}_{\\theta} = r"));
    assert!(markup.contains("G^{\\theta}_{r} = r"));
}

#[test]
fn test_render_errors_become_placeholders() {
    let t = table();
    let metric = polar_metric(&t);
    let adapter = RenderAdapter::new();

    let one_label = vec!["r".to_string()];
    assert_eq!(
        adapter.try_render(&metric, &one_label).unwrap_err(),
        RenderError::LabelCount {
            kind: TensorKind::Metric,
            axis: 2,
            labels: 1
        }
    );
    let markup = adapter.render(&metric, &one_label);
    assert!(markup.contains("% [Metric tensor could not be rendered:"), "{}", markup);

    let wrong_rank = Tensor::new(TensorKind::Ricci, TensorValue::Scalar(Expr::one()));
    assert!(matches!(
        adapter.try_render(&wrong_rank, &labels()),
        Err(RenderError::RankMismatch {
            expected: 2,
            found: 0,
            ..
        })
    ));
}
