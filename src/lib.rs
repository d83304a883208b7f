//! grtensor: symbolic General Relativity tensors from a metric
//!
//! Given coordinates, parameters and a metric written in a small expression
//! language, the [`TensorDerivationEngine`] derives the inverse metric,
//! Christoffel symbols, Ricci tensor and scalar, Einstein tensor (covariant
//! and mixed) and the covariant divergence of the Einstein tensor. Each stage
//! is streamed through a [`ProgressChannel`] as LaTeX markup, and a run can be
//! cancelled between units of work.

pub mod algebra;
pub mod ast;
pub mod channel;
pub mod config;
pub mod derive;
pub mod engine;
pub mod error;
pub mod eval;
pub mod latex;
pub mod lexer;
pub mod metric;
pub mod parser;
pub mod presets;
pub mod pretty;
pub mod render;
pub mod repl;
pub mod symbol;
pub mod tensor;

pub use algebra::{AlgebraError, Expr, Matrix};
pub use ast::{Program, Span, Spanned, Statement, Term};
pub use channel::{Event, ProgressChannel, StageReport, StopSwitch};
pub use config::{MetricDefinition, RunConfig};
pub use engine::{EngineState, RunHandle, RunOutcome, RunStatus, Stage, TensorDerivationEngine};
pub use error::{DefinitionError, GrError};
pub use eval::{evaluate_metric, Evaluator, Value};
pub use metric::MetricModel;
pub use pretty::pretty_print;
pub use render::RenderAdapter;
pub use symbol::{Assumptions, Symbol, SymbolTable};
pub use tensor::{Tensor, TensorKind, TensorValue};

/// Parse metric-definition source into an AST.
pub fn parse(input: &str) -> Result<Program, DefinitionError> {
    use chumsky::prelude::*;

    let tokens = lexer::lexer().parse(input).map_err(error::lexer_error)?;
    let tokens = lexer::layout(tokens);
    let len = input.len();

    parser::parser()
        .parse(chumsky::Stream::from_iter(len..len + 1, tokens.into_iter()))
        .map_err(error::parser_error)
}
