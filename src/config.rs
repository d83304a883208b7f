//! Metric definition files and driver configuration.
//!
//! A metric definition is a TOML file naming the coordinates, parameters and
//! undefined functions, plus the definition source that assigns `metric`:
//!
//! ```toml
//! coordinates = ["t", "r", "theta", "phi"]
//! parameters = ["M"]
//! metric = """
//! f = 1 - 2*M/r
//! metric = diag(-f, 1/f, r^2, r^2*sin(theta)^2)
//! """
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GrError;
use crate::eval::evaluate_metric;
use crate::metric::MetricModel;
use crate::symbol::SymbolTable;

/// A complete, not yet evaluated, metric definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Coordinate names, in index order.
    pub coordinates: Vec<String>,
    /// Parameters, assumed real and positive.
    #[serde(default)]
    pub parameters: Vec<String>,
    /// Undefined functions of one argument, e.g. `omega` for `omega(r)`.
    #[serde(default)]
    pub functions: Vec<String>,
    /// Definition source; must assign `metric`.
    pub metric: String,
}

impl MetricDefinition {
    pub fn new(
        coordinates: &[&str],
        parameters: &[&str],
        functions: &[&str],
        metric: impl Into<String>,
    ) -> Self {
        let owned = |names: &[&str]| names.iter().map(|s| s.to_string()).collect();
        Self {
            coordinates: owned(coordinates),
            parameters: owned(parameters),
            functions: owned(functions),
            metric: metric.into(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, GrError> {
        toml::from_str(content)
            .map_err(|e| GrError::Config(format!("invalid metric definition: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, GrError> {
        let content = read(path)?;
        toml::from_str(&content).map_err(|e| {
            GrError::Config(format!("failed to parse '{}': {}", path.display(), e))
        })
    }

    pub fn to_toml(&self) -> Result<String, GrError> {
        toml::to_string_pretty(self)
            .map_err(|e| GrError::Config(format!("failed to serialize metric definition: {}", e)))
    }

    pub fn save(&self, path: &Path) -> Result<(), GrError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| {
            GrError::Config(format!("failed to write '{}': {}", path.display(), e))
        })
    }

    /// Resolve the names into a fresh [`SymbolTable`].
    pub fn symbol_table(&self) -> Result<SymbolTable, GrError> {
        if self.coordinates.is_empty() {
            return Err(GrError::Config("at least one coordinate is required".to_string()));
        }
        SymbolTable::with_functions(&self.coordinates, &self.parameters, &self.functions)
    }

    /// Resolve names, evaluate the source and validate the metric's shape.
    pub fn build(&self) -> Result<MetricModel, GrError> {
        let table = Arc::new(self.symbol_table()?);
        evaluate_metric(&self.metric, table)
    }
}

/// Settings for the command-line driver.
///
/// Every field is optional in the file; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Request cancellation after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
    /// Write LaTeX here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub show_zero_components: bool,
}

impl RunConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, GrError> {
        toml::from_str(content).map_err(|e| GrError::Config(format!("invalid run config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, GrError> {
        let content = read(path)?;
        toml::from_str(&content).map_err(|e| {
            GrError::Config(format!("failed to parse '{}': {}", path.display(), e))
        })
    }
}

fn read(path: &Path) -> Result<String, GrError> {
    std::fs::read_to_string(path)
        .map_err(|e| GrError::Config(format!("failed to read '{}': {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_optional_lists() {
        let def = MetricDefinition::from_toml_str(
            r#"
coordinates = ["x", "y"]
metric = "metric = diag(1, 1)"
"#,
        )
        .unwrap();
        assert!(def.parameters.is_empty());
        assert!(def.functions.is_empty());
        assert_eq!(def.build().unwrap().dimension(), 2);
    }

    #[test]
    fn test_missing_metric_field() {
        let err = MetricDefinition::from_toml_str(r#"coordinates = ["x"]"#).unwrap_err();
        assert!(matches!(err, GrError::Config(_)));
    }

    #[test]
    fn test_no_coordinates() {
        let def = MetricDefinition::new(&[], &[], &[], "metric = [[1]]");
        assert!(matches!(def.build(), Err(GrError::Config(_))));
    }

    #[test]
    fn test_run_config_empty_file() {
        assert_eq!(RunConfig::from_toml_str("").unwrap(), RunConfig::default());
    }
}
