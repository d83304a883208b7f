//! Tests for identifier validation, name resolution and the symbol table

use grtensor::symbol::resolve;
use grtensor::{Assumptions, GrError, SymbolTable};

#[test]
fn test_duplicate_names() {
    assert_eq!(
        SymbolTable::new(&["t", "r", "t"], &[]).unwrap_err(),
        GrError::DuplicateName {
            name: "t".to_string()
        }
    );
    // coordinates and parameters share one namespace
    assert_eq!(
        SymbolTable::new(&["r"], &["r"]).unwrap_err(),
        GrError::DuplicateName {
            name: "r".to_string()
        }
    );
}

#[test]
fn test_invalid_identifiers() {
    for bad in ["2x", "", "a-b", "cos", "metric"] {
        assert!(
            matches!(
                SymbolTable::new(&[bad], &[]),
                Err(GrError::InvalidIdentifier { .. })
            ),
            "{:?}",
            bad
        );
    }
}

#[test]
fn test_table_lookup() {
    let table = SymbolTable::with_functions(&["r"], &["M"], &["omega"]).unwrap();
    assert!(table.symbol("omega").is_none());
    assert_eq!(table.symbol("M").map(|s| s.name()), Some("M"));
    assert_eq!(table.coordinate_names(), vec!["r".to_string()]);
}

#[test]
fn test_resolve_assigns_assumptions() {
    let symbols = resolve(&["t", "r"], Assumptions::REAL).unwrap();
    assert_eq!(symbols.len(), 2);
    assert_eq!(symbols[1].name(), "r");
    assert!(!symbols[1].is_positive());

    let params = resolve(&["M"], Assumptions::POSITIVE).unwrap();
    assert!(params[0].is_positive());

    assert!(matches!(
        resolve(&["a", "b", "a"], Assumptions::NONE),
        Err(GrError::DuplicateName { name }) if name == "a"
    ));
}
