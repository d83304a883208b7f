//! Symbol resolution
//!
//! Turns user-supplied coordinate, parameter and function names into shared
//! symbolic atoms. Every name maps to exactly one [`Symbol`]; the table is
//! built once per derivation run and is read-only afterwards.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::error::GrError;

/// Names that the metric language reserves for builtins.
pub const RESERVED_NAMES: &[&str] = &[
    "sin", "cos", "tan", "cot", "sec", "csc", "exp", "log", "ln", "sqrt", "sinh", "cosh", "tanh",
    "diff", "subs", "simplify", "diag", "metric",
];

/// Assumptions attached to a symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Assumptions {
    pub real: bool,
    pub positive: bool,
}

impl Assumptions {
    /// No assumptions at all.
    pub const NONE: Assumptions = Assumptions {
        real: false,
        positive: false,
    };

    /// Real-valued, sign unknown. Used for coordinates.
    pub const REAL: Assumptions = Assumptions {
        real: true,
        positive: false,
    };

    /// Real and strictly positive. Used for parameters.
    pub const POSITIVE: Assumptions = Assumptions {
        real: true,
        positive: true,
    };
}

#[derive(Debug)]
struct SymbolData {
    name: String,
    assumptions: Assumptions,
}

/// An opaque algebraic atom.
///
/// Cloning is cheap (reference counted). Two symbols are equal when their
/// names and assumptions agree, so a symbol rebuilt from the same table entry
/// is interchangeable with the original.
#[derive(Clone)]
pub struct Symbol(Arc<SymbolData>);

impl Symbol {
    pub fn new(name: impl Into<String>, assumptions: Assumptions) -> Self {
        Symbol(Arc::new(SymbolData {
            name: name.into(),
            assumptions,
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn assumptions(&self) -> Assumptions {
        self.0.assumptions
    }

    pub fn is_positive(&self) -> bool {
        self.0.assumptions.positive
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.name == other.0.name && self.0.assumptions == other.0.assumptions)
    }
}

impl Eq for Symbol {}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .name
            .cmp(&other.0.name)
            .then(self.0.assumptions.cmp(&other.0.assumptions))
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
        self.0.assumptions.hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.0.name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

/// What a resolved name stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Binding {
    Coordinate(usize),
    Parameter(Symbol),
    /// An undefined function of one argument, e.g. `omega(r)`
    Function(String),
}

/// Check that `name` is usable as a symbol identifier.
pub fn validate_identifier(name: &str) -> Result<(), GrError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if !valid {
        return Err(GrError::InvalidIdentifier {
            name: name.to_string(),
            reason: "identifiers start with a letter or '_' and contain only letters, digits and '_'"
                .to_string(),
        });
    }
    if RESERVED_NAMES.contains(&name) {
        return Err(GrError::InvalidIdentifier {
            name: name.to_string(),
            reason: "name is reserved for a builtin".to_string(),
        });
    }
    Ok(())
}

/// Resolve a list of names into fresh symbols carrying `assumptions`.
///
/// Fails on the first invalid identifier or on a repeated name.
pub fn resolve<S: AsRef<str>>(names: &[S], assumptions: Assumptions) -> Result<Vec<Symbol>, GrError> {
    let mut seen: IndexSet<&str> = IndexSet::new();
    let mut symbols = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        validate_identifier(name)?;
        if !seen.insert(name) {
            return Err(GrError::DuplicateName {
                name: name.to_string(),
            });
        }
        symbols.push(Symbol::new(name, assumptions));
    }
    Ok(symbols)
}

/// Resolved coordinates, parameters and function names for one run.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    coordinates: Vec<Symbol>,
    parameters: Vec<Symbol>,
    functions: Vec<String>,
    bindings: IndexMap<String, Binding>,
}

impl SymbolTable {
    /// Build a table from coordinate and parameter names.
    pub fn new<S: AsRef<str>>(coordinates: &[S], parameters: &[S]) -> Result<Self, GrError> {
        Self::with_functions(coordinates, parameters, &[] as &[&str])
    }

    /// Build a table that also declares undefined functions of one argument.
    pub fn with_functions<S: AsRef<str>, F: AsRef<str>>(
        coordinates: &[S],
        parameters: &[S],
        functions: &[F],
    ) -> Result<Self, GrError> {
        let coordinates = resolve(coordinates, Assumptions::REAL)?;
        let parameters = resolve(parameters, Assumptions::POSITIVE)?;

        let mut bindings = IndexMap::new();
        for (i, sym) in coordinates.iter().enumerate() {
            bindings.insert(sym.name().to_string(), Binding::Coordinate(i));
        }
        for sym in &parameters {
            if bindings
                .insert(sym.name().to_string(), Binding::Parameter(sym.clone()))
                .is_some()
            {
                return Err(GrError::DuplicateName {
                    name: sym.name().to_string(),
                });
            }
        }
        let mut function_names = Vec::with_capacity(functions.len());
        for name in functions {
            let name = name.as_ref();
            validate_identifier(name)?;
            if bindings
                .insert(name.to_string(), Binding::Function(name.to_string()))
                .is_some()
            {
                return Err(GrError::DuplicateName {
                    name: name.to_string(),
                });
            }
            function_names.push(name.to_string());
        }

        Ok(Self {
            coordinates,
            parameters,
            functions: function_names,
            bindings,
        })
    }

    pub fn coordinates(&self) -> &[Symbol] {
        &self.coordinates
    }

    pub fn parameters(&self) -> &[Symbol] {
        &self.parameters
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    /// Dimension of the coordinate system.
    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// The symbol bound to `name`, if it is a coordinate or parameter.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        match self.bindings.get(name)? {
            Binding::Coordinate(i) => self.coordinates.get(*i),
            Binding::Parameter(sym) => Some(sym),
            Binding::Function(_) => None,
        }
    }

    pub fn coordinate_index(&self, sym: &Symbol) -> Option<usize> {
        self.coordinates.iter().position(|c| c == sym)
    }

    /// Coordinate names, used as index labels when rendering.
    pub fn coordinate_names(&self) -> Vec<String> {
        self.coordinates.iter().map(|s| s.name().to_string()).collect()
    }
}
