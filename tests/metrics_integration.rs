//! Integration tests for the sample definitions in `metrics/`
//!
//! These keep the shipped definition files valid and double as worked
//! examples of the definition format.

use std::fs;
use std::path::Path;

use grtensor::repl::ReplState;
use grtensor::{
    Expr, MetricDefinition, MetricModel, ProgressChannel, RunConfig, RunOutcome,
    TensorDerivationEngine, TensorKind,
};

/// Load a definition file and build its metric
fn load_metric(path: &Path) -> Result<MetricModel, String> {
    let def = MetricDefinition::load(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    def.build().map_err(|e| format!("Error in {}: {}", path.display(), e.report(&def.metric)))
}

fn derive(metric: &MetricModel) -> RunOutcome {
    let engine = TensorDerivationEngine::new();
    let channel = ProgressChannel::new();
    let outcome = engine.run(metric, &channel).unwrap();
    assert!(outcome.is_completed(), "{:?}", outcome.status);
    outcome
}

#[test]
fn test_all_sample_metrics_build() {
    let mut count = 0;
    for entry in fs::read_dir("metrics").unwrap() {
        let path = entry.unwrap().path();
        if path.file_name().and_then(|n| n.to_str()) == Some("run.toml") {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let metric = load_metric(&path).unwrap_or_else(|e| panic!("{}", e));
        assert!(metric.is_symmetric(), "{} should be symmetric", path.display());
        count += 1;
    }
    assert!(count >= 4, "expected the sample metrics, found {}", count);
}

#[test]
fn test_sample_run_config() {
    let config = RunConfig::load(Path::new("metrics/run.toml")).unwrap();
    assert_eq!(config.time_limit_secs, Some(600));
    assert!(!config.show_zero_components);
}

#[test]
fn test_two_sphere_sample() {
    let metric = load_metric(Path::new("metrics/two_sphere.toml")).unwrap();
    assert_eq!(metric.dimension(), 2);
    let a = Expr::symbol(&metric.table().parameters()[0]);

    let outcome = derive(&metric);
    let scalar = outcome.tensor(TensorKind::RicciScalar).unwrap().as_scalar().unwrap();
    let expected = Expr::integer(2).div(&a.mul(&a)).unwrap();
    assert!(scalar.sub(&expected).is_zero(), "R = {}", scalar);
}

#[test]
fn test_reissner_nordstrom_sample() {
    let metric = load_metric(Path::new("metrics/reissner_nordstrom.toml")).unwrap();
    let outcome = derive(&metric);

    // electromagnetic stress-energy is traceless
    assert!(outcome.tensor(TensorKind::RicciScalar).unwrap().is_zero());
    assert!(!outcome.tensor(TensorKind::Einstein).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Divergence).unwrap().is_zero());
}

#[test]
fn test_sample_loads_into_repl() {
    let def = MetricDefinition::load(Path::new("metrics/schwarzschild.toml")).unwrap();
    let state = ReplState::from_definition(&def).unwrap();
    assert_eq!(state.coordinates().len(), 4);
    assert_eq!(state.parameters().len(), 1);
    assert!(state.evaluator().get("f").is_some());
    assert_eq!(state.metric().unwrap().dimension(), 4);
}
