//! Unit tests for lexer, parser and evaluator

use std::sync::Arc;

use chumsky::Parser;
use grtensor::ast::{Statement, Term};
use grtensor::eval::{evaluate_metric, Evaluator, Value};
use grtensor::lexer::{layout, lexer, open_brackets, Token};
use grtensor::{parse, DefinitionError, Expr, GrError, SymbolTable};

fn tokens(input: &str) -> Vec<Token> {
    lexer().parse(input).unwrap().into_iter().map(|(t, _)| t).collect()
}

fn only_expr(input: &str) -> String {
    let program = parse(input).unwrap();
    assert_eq!(program.statements.len(), 1);
    match &program.statements[0].node {
        Statement::Expr(t) => t.node.to_string(),
        other => panic!("expected an expression, got {:?}", other),
    }
}

fn schwarzschild_table() -> Arc<SymbolTable> {
    Arc::new(SymbolTable::new(&["t", "r", "theta", "phi"], &["M"]).unwrap())
}

// ============================================================================
// Lexer tests
// ============================================================================

#[test]
fn test_lex_operators() {
    assert_eq!(
        tokens("a**2 + b^-1"),
        vec![
            Token::Ident("a".to_string()),
            Token::Caret,
            Token::Number("2".to_string()),
            Token::Plus,
            Token::Ident("b".to_string()),
            Token::Caret,
            Token::Minus,
            Token::Number("1".to_string()),
        ]
    );
}

#[test]
fn test_lex_decimal_and_comment() {
    assert_eq!(
        tokens("x = 0.25 # quarter\n"),
        vec![
            Token::Ident("x".to_string()),
            Token::Eq,
            Token::Number("0.25".to_string()),
            Token::Newline,
        ]
    );
}

#[test]
fn test_lex_rejects_unknown_character() {
    assert!(lexer().parse("x = $").is_err());
}

#[test]
fn test_layout_drops_newlines_inside_brackets() {
    let raw = lexer().parse("\nm = [\n  [1, 0],\n  [0, 1]\n]\n\nx = 2\n").unwrap();
    let laid: Vec<Token> = layout(raw).into_iter().map(|(t, _)| t).collect();
    let separators = laid.iter().filter(|t| **t == Token::Semicolon).count();
    assert_eq!(separators, 1);
    assert!(!laid.contains(&Token::Newline));
    assert_ne!(laid.first(), Some(&Token::Semicolon));
    assert_ne!(laid.last(), Some(&Token::Semicolon));
}

#[test]
fn test_open_brackets() {
    let open = lexer().parse("metric = [[1, 0],").unwrap();
    assert_eq!(open_brackets(&open), 1);
    let closed = lexer().parse("f(x) + [1]").unwrap();
    assert_eq!(open_brackets(&closed), 0);
}

// ============================================================================
// Parser tests
// ============================================================================

#[test]
fn test_precedence() {
    assert_eq!(only_expr("a + b * c"), "(a + (b * c))");
    assert_eq!(only_expr("a - b - c"), "((a - b) - c)");
    assert_eq!(only_expr("-x^2"), "-((x ^ 2))");
    assert_eq!(only_expr("a^b^c"), "(a ^ (b ^ c))");
    assert_eq!(only_expr("2^-1"), "(2 ^ -(1))");
    assert_eq!(only_expr("(a + b) * c"), "((a + b) * c)");
}

#[test]
fn test_calls_and_lists() {
    assert_eq!(only_expr("sin(theta)^2"), "(sin(theta) ^ 2)");
    assert_eq!(only_expr("diff(f(r), r, 2)"), "diff(f(r), r, 2)");
    assert_eq!(only_expr("[[1, 0], [0, r^2]]"), "[[1, 0], [0, (r ^ 2)]]");
}

#[test]
fn test_statements() {
    let program = parse("f = 1 - 2*M/r; metric = diag(-f, 1/f)\n# done\n").unwrap();
    assert_eq!(program.statements.len(), 2);
    match &program.statements[0].node {
        Statement::Assign { name, value } => {
            assert_eq!(name.node, "f");
            assert!(matches!(value.node, Term::Binary { .. }));
        }
        other => panic!("expected assignment, got {:?}", other),
    }
}

#[test]
fn test_empty_program() {
    assert!(parse("").unwrap().statements.is_empty());
    assert!(parse("# only a comment\n\n").unwrap().statements.is_empty());
}

#[test]
fn test_parse_error_has_span() {
    let source = "x = (1 + 2";
    let err = parse(source).unwrap_err();
    assert!(matches!(err, DefinitionError::Parse { .. }));
    let span = err.span().unwrap();
    assert!(span.start <= source.len());
}

#[test]
fn test_lex_error_is_reported() {
    let source = "metric = diag(1, @)";
    let err = parse(source).unwrap_err();
    match &err {
        DefinitionError::Lex { span, .. } => assert_eq!(span.start, 17),
        other => panic!("expected lexical error, got {:?}", other),
    }
    let report = err.report(source);
    assert!(report.contains("Lexical error"));
}

// ============================================================================
// Evaluation tests
// ============================================================================

#[test]
fn test_evaluate_schwarzschild() {
    let src = "f = 1 - 2*M/r\nmetric = diag(-f, 1/f, r^2, r^2*sin(theta)^2)";
    let model = evaluate_metric(src, schwarzschild_table()).unwrap();
    assert_eq!(model.dimension(), 4);
    assert!(model.components().is_diagonal());
    // g_tt * g_rr = -1
    let product = model.component(0, 0).mul(model.component(1, 1));
    assert_eq!(product, Expr::integer(-1));
}

#[test]
fn test_locals_and_bare_expressions() {
    let table = schwarzschild_table();
    let mut ev = Evaluator::new(table);
    let program = parse("a = r^2\nb = a/r\nb").unwrap();
    let mut last = None;
    for stmt in &program.statements {
        last = ev.statement(stmt).unwrap();
    }
    assert_eq!(last.map(|v| v.to_string()), Some("r".to_string()));
    let names: Vec<&str> = ev.locals().map(|(k, _)| k).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_trig_builtins() {
    let table = Arc::new(SymbolTable::new(&["x"], &[]).unwrap());
    let mut ev = Evaluator::new(table);
    let program = parse("tan(x)*cos(x) - sin(x)").unwrap();
    let value = ev.statement(&program.statements[0]).unwrap();
    assert!(matches!(value, Some(Value::Scalar(e)) if e.is_zero()));

    let program = parse("cosh(x)^2 - sinh(x)^2").unwrap();
    let value = ev.statement(&program.statements[0]).unwrap();
    assert!(matches!(value, Some(Value::Scalar(e)) if e.is_one()));
}

#[test]
fn test_functions_must_be_declared() {
    let table = Arc::new(SymbolTable::with_functions(&["r"], &[], &["omega"]).unwrap());
    let model = evaluate_metric("metric = [[omega(r)^2]]", Arc::clone(&table)).unwrap();
    assert_eq!(model.component(0, 0).to_string(), "omega(r)^2");

    let err = evaluate_metric("metric = [[nu(r)]]", table).unwrap_err();
    assert!(matches!(err, GrError::Definition(DefinitionError::Eval { .. })));
}

#[test]
fn test_missing_metric() {
    let err = evaluate_metric("x = r", schwarzschild_table()).unwrap_err();
    assert_eq!(err, GrError::Definition(DefinitionError::MissingMetric));
}

#[test]
fn test_cannot_assign_to_coordinates_or_builtins() {
    for src in ["r = 2", "sin = 2", "M = 1"] {
        let err = evaluate_metric(src, schwarzschild_table()).unwrap_err();
        assert!(
            matches!(err, GrError::Definition(DefinitionError::Eval { .. })),
            "{}: {:?}",
            src,
            err
        );
    }
}

#[test]
fn test_non_square_metric() {
    let table = Arc::new(SymbolTable::new(&["x", "y"], &[]).unwrap());
    let err = evaluate_metric("metric = [[1, 0, 0], [0, 1, 0]]", table).unwrap_err();
    assert_eq!(
        err,
        GrError::DimensionMismatch {
            rows: 2,
            cols: 3,
            coordinates: 2
        }
    );
}

#[test]
fn test_ragged_literal() {
    let table = Arc::new(SymbolTable::new(&["x", "y"], &[]).unwrap());
    let err = evaluate_metric("metric = [[1, 0], [1]]", table).unwrap_err();
    assert!(matches!(err, GrError::Definition(DefinitionError::Eval { .. })));
}

#[test]
fn test_exponent_rules() {
    let table = Arc::new(SymbolTable::new(&["x"], &["a"]).unwrap());
    for (src, ok) in [
        ("metric = [[x^2]]", true),
        ("metric = [[x^-3]]", true),
        ("metric = [[(a^2)^(1/2)]]", true),
        ("metric = [[x^x]]", false),
        ("metric = [[x^(1/3)]]", false),
        ("metric = [[x^1000]]", false),
    ] {
        let result = evaluate_metric(src, Arc::clone(&table));
        assert_eq!(result.is_ok(), ok, "{}", src);
    }
}

#[test]
fn test_eval_error_report_points_at_source() {
    let source = "metric = diag(1, nope)";
    let err = evaluate_metric(source, schwarzschild_table()).unwrap_err();
    let report = err.report(source);
    assert!(report.contains("unknown name `nope`"), "{}", report);
}
