//! Error types and diagnostics
//!
//! [`GrError`] is the crate-wide taxonomy. Source-level problems in metric
//! definitions are [`DefinitionError`]s, which carry spans and render as
//! ariadne reports.

use ariadne::{Color, Label, Report, ReportKind, Source};
use chumsky::prelude::Simple;
use thiserror::Error;

use crate::algebra::AlgebraError;
use crate::ast::Span;
use crate::engine::Stage;
use crate::lexer::Token;

/// Everything that can go wrong between user input and a finished run.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GrError {
    #[error("name `{name}` is declared more than once")]
    DuplicateName { name: String },

    #[error("`{name}` is not a valid identifier: {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("metric is {rows}x{cols} but there are {coordinates} coordinates")]
    DimensionMismatch {
        rows: usize,
        cols: usize,
        coordinates: usize,
    },

    #[error("{stage} failed at index {index:?}: {cause}")]
    StageComputation {
        stage: Stage,
        index: Vec<usize>,
        cause: AlgebraError,
    },

    #[error("a derivation is already running on this engine")]
    EngineBusy,

    #[error("worker thread error: {0}")]
    Worker(String),

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Problems in metric definition source text.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("lexical error: {message}")]
    Lex { message: String, span: Span },

    #[error("parse error: {message}")]
    Parse { message: String, span: Span },

    #[error("{message}")]
    Eval { message: String, span: Span },

    #[error("definition never assigns `metric`")]
    MissingMetric,
}

impl DefinitionError {
    pub fn eval(message: impl Into<String>, span: Span) -> Self {
        DefinitionError::Eval {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            DefinitionError::Lex { span, .. }
            | DefinitionError::Parse { span, .. }
            | DefinitionError::Eval { span, .. } => Some(*span),
            DefinitionError::MissingMetric => None,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            DefinitionError::Lex { .. } => "Lexical error",
            DefinitionError::Parse { .. } => "Parse error",
            DefinitionError::Eval { .. } => "Evaluation error",
            DefinitionError::MissingMetric => "Missing metric",
        }
    }

    fn message(&self) -> String {
        match self {
            DefinitionError::Lex { message, .. }
            | DefinitionError::Parse { message, .. }
            | DefinitionError::Eval { message, .. } => message.clone(),
            DefinitionError::MissingMetric => self.to_string(),
        }
    }

    /// Render as an ariadne report against `source`.
    pub fn report(&self, source: &str) -> String {
        let range = match self.span() {
            Some(span) => {
                let start = span.start.min(source.len());
                start..span.end.clamp(start, source.len())
            }
            None => source.len()..source.len(),
        };

        let mut output = Vec::new();
        let written = Report::build(ReportKind::Error, (), range.start)
            .with_message(self.title())
            .with_label(
                Label::new(range)
                    .with_message(self.message())
                    .with_color(Color::Red),
            )
            .finish()
            .write(Source::from(source), &mut output);

        match written {
            Ok(()) => String::from_utf8(output).unwrap_or_else(|_| self.to_string()),
            Err(_) => self.to_string(),
        }
    }
}

impl GrError {
    /// Human-readable message, with a source excerpt for definition errors.
    pub fn report(&self, source: &str) -> String {
        match self {
            GrError::Definition(e) => e.report(source),
            other => other.to_string(),
        }
    }
}

/// Convert the first lexer error into a [`DefinitionError`].
pub fn lexer_error(errors: Vec<Simple<char>>) -> DefinitionError {
    match errors.into_iter().next() {
        Some(error) => DefinitionError::Lex {
            message: format_lexer_error(&error),
            span: Span::new(error.span().start, error.span().end),
        },
        None => DefinitionError::Lex {
            message: "unknown lexical error".to_string(),
            span: Span::new(0, 0),
        },
    }
}

/// Convert the first parser error into a [`DefinitionError`].
///
/// Token streams are built with character spans, so error spans already
/// point into the source; the end-of-input marker lies one past the end.
pub fn parser_error(errors: Vec<Simple<Token>>) -> DefinitionError {
    match errors.into_iter().next() {
        Some(error) => DefinitionError::Parse {
            message: format_parser_error(&error),
            span: Span::new(error.span().start, error.span().end),
        },
        None => DefinitionError::Parse {
            message: "unknown parse error".to_string(),
            span: Span::new(0, 0),
        },
    }
}

fn format_lexer_error(error: &Simple<char>) -> String {
    let found = error
        .found()
        .map(|c| format!("'{}'", c.escape_default()))
        .unwrap_or_else(|| "end of input".to_string());

    if error.expected().next().is_some() {
        format!(
            "Unexpected {}, expected {}",
            found,
            format_char_set(error.expected())
        )
    } else {
        format!("Unexpected character {}", found)
    }
}

fn format_parser_error(error: &Simple<Token>) -> String {
    use chumsky::error::SimpleReason;

    if let SimpleReason::Custom(msg) = error.reason() {
        return msg.clone();
    }
    if let SimpleReason::Unclosed { delimiter, .. } = error.reason() {
        return format!("Unclosed '{}'", delimiter);
    }

    let found = error
        .found()
        .map(|t| format!("'{}'", t))
        .unwrap_or_else(|| "end of input".to_string());

    let expected: Vec<String> = error
        .expected()
        .filter_map(|opt| opt.as_ref())
        .map(|t| format!("'{}'", t))
        .collect();

    if expected.is_empty() {
        format!("Unexpected token {}", found)
    } else if error.found() == Some(&Token::Eq) {
        "Assignments must be statements of the form `name = expression`".to_string()
    } else {
        format!("Unexpected {}, expected one of: {}", found, expected.join(", "))
    }
}

fn format_char_set<'a>(expected: impl Iterator<Item = &'a Option<char>>) -> String {
    let chars: Vec<String> = expected
        .filter_map(|opt| opt.as_ref())
        .map(|c| format!("'{}'", c.escape_default()))
        .collect();

    if chars.is_empty() {
        "valid character".to_string()
    } else {
        chars.join(" or ")
    }
}
