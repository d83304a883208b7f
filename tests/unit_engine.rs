//! Tests for the derivation pipeline: physics results, event protocol,
//! cancellation, busy rejection and failure reporting

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use grtensor::algebra::{AlgebraError, Expr};
use grtensor::derive;
use grtensor::presets;
use grtensor::{
    EngineState, Event, GrError, MetricDefinition, MetricModel, ProgressChannel, RunStatus, Stage,
    StopSwitch, SymbolTable, TensorDerivationEngine, TensorKind,
};

fn preset(name: &str) -> MetricModel {
    presets::preset(name).unwrap().build().unwrap()
}

fn derive_all(metric: &MetricModel) -> grtensor::RunOutcome {
    let engine = TensorDerivationEngine::new();
    let channel = ProgressChannel::new();
    let outcome = engine.run(metric, &channel).unwrap();
    assert!(outcome.is_completed(), "{:?}", outcome.status);
    outcome
}

fn two_sphere() -> MetricModel {
    let def = MetricDefinition::new(
        &["theta", "phi"],
        &["a"],
        &[],
        "metric = diag(a^2, a^2*sin(theta)^2)",
    );
    def.build().unwrap()
}

// ============================================================================
// Physics
// ============================================================================

#[test]
fn test_minkowski_is_flat() {
    let outcome = derive_all(&preset("minkowski"));
    for kind in [
        TensorKind::Christoffel,
        TensorKind::Ricci,
        TensorKind::RicciScalar,
        TensorKind::Einstein,
        TensorKind::MixedEinstein,
        TensorKind::Divergence,
    ] {
        assert!(outcome.tensor(kind).unwrap().is_zero(), "{:?}", kind);
    }
    let inverse = outcome.tensor(TensorKind::InverseMetric).unwrap();
    assert_eq!(inverse.component(&[0, 0]), Some(&Expr::integer(-1)));
}

#[test]
fn test_polar_plane_is_flat() {
    let outcome = derive_all(&preset("polar2d"));
    assert!(!outcome.tensor(TensorKind::Christoffel).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Ricci).unwrap().is_zero());
}

#[test]
fn test_two_sphere_curvature() {
    let metric = two_sphere();
    let a = Expr::symbol(&metric.table().parameters()[0]);
    let outcome = derive_all(&metric);

    // R = 2 / a^2
    let scalar = outcome.tensor(TensorKind::RicciScalar).unwrap().as_scalar().unwrap();
    let expected = Expr::integer(2).div(&a.mul(&a)).unwrap();
    assert!(scalar.sub(&expected).is_zero(), "R = {}", scalar);

    // Einstein tensor vanishes identically in two dimensions
    assert!(outcome.tensor(TensorKind::Einstein).unwrap().is_zero());
}

#[test]
fn test_schwarzschild_is_vacuum() {
    let outcome = derive_all(&preset("schwarzschild"));
    assert!(!outcome.tensor(TensorKind::Christoffel).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Ricci).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::RicciScalar).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Einstein).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Divergence).unwrap().is_zero());
}

#[test]
fn test_kerr_is_vacuum() {
    let metric = preset("kerr");
    assert!(!metric.components().is_diagonal());
    let outcome = derive_all(&metric);

    let ricci = outcome.tensor(TensorKind::Ricci).unwrap();
    assert!(ricci.as_matrix().unwrap().is_symmetric());
    assert!(ricci.is_zero());
    assert!(outcome.tensor(TensorKind::RicciScalar).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Divergence).unwrap().is_zero());

    // off-diagonal t-phi coupling survives in the inverse
    let inverse = outcome.tensor(TensorKind::InverseMetric).unwrap();
    assert!(!inverse.component(&[0, 3]).unwrap().is_zero());
    assert_eq!(inverse.component(&[0, 3]), inverse.component(&[3, 0]));
}

#[test]
fn test_flrw_divergence_vanishes() {
    let outcome = derive_all(&preset("flrw"));
    assert!(!outcome.tensor(TensorKind::Einstein).unwrap().is_zero());
    assert!(outcome.tensor(TensorKind::Divergence).unwrap().is_zero());
}

// ============================================================================
// Consistency between stages
// ============================================================================

#[test]
fn test_inverse_times_metric_is_identity() {
    let metric = preset("schwarzschild");
    let outcome = derive_all(&metric);
    let inverse = outcome.tensor(TensorKind::InverseMetric).unwrap().as_matrix().unwrap();
    let product = metric.components().mul(inverse).unwrap();
    for i in 0..4 {
        for j in 0..4 {
            let expected = if i == j { Expr::one() } else { Expr::zero() };
            assert!(product.get(i, j).sub(&expected).is_zero(), "({}, {})", i, j);
        }
    }
}

#[test]
fn test_symmetries() {
    let outcome = derive_all(&two_sphere());
    let gamma = outcome.tensor(TensorKind::Christoffel).unwrap();
    for rho in 0..2 {
        for mu in 0..2 {
            for nu in 0..2 {
                assert_eq!(gamma.component(&[rho, mu, nu]), gamma.component(&[rho, nu, mu]));
            }
        }
    }
    assert!(outcome.tensor(TensorKind::Ricci).unwrap().as_matrix().unwrap().is_symmetric());
    assert!(outcome.tensor(TensorKind::Einstein).unwrap().as_matrix().unwrap().is_symmetric());
}

#[test]
fn test_scalar_is_trace_of_ricci() {
    let outcome = derive_all(&preset("flrw"));
    let inverse = outcome.tensor(TensorKind::InverseMetric).unwrap().as_matrix().unwrap();
    let ricci = outcome.tensor(TensorKind::Ricci).unwrap().as_matrix().unwrap();
    let scalar = outcome.tensor(TensorKind::RicciScalar).unwrap().as_scalar().unwrap();
    assert!(derive::trace(inverse, ricci).sub(scalar).is_zero());
    assert!(!scalar.is_zero());
}

// ============================================================================
// Event protocol
// ============================================================================

#[test]
fn test_events_arrive_in_stage_order() {
    let engine = TensorDerivationEngine::new();
    let channel = ProgressChannel::new();
    let outcome = engine.run(&preset("polar2d"), &channel).unwrap();
    assert_eq!(outcome.completed_stages(), Stage::ALL.to_vec());
    assert_eq!(engine.state(), EngineState::Done);
    assert!(!engine.is_busy());

    let events = channel.drain();
    assert_eq!(events.len(), Stage::COUNT + 1);
    for (i, stage) in Stage::ALL.iter().enumerate() {
        match &events[i] {
            Event::Progress(report) => {
                assert_eq!(report.stage, *stage);
                assert_eq!(report.tensor.kind, stage.output());
                assert_eq!(report.completed, i + 1);
                assert_eq!(report.total, Stage::COUNT);
                assert!(report.markup.contains(stage.output().title()));
            }
            other => panic!("expected progress for {}, got {:?}", stage, other),
        }
    }
    assert!(matches!(events.last(), Some(Event::Done)));
}

#[test]
fn test_spawned_run_delivers_every_stage() {
    let engine = Arc::new(TensorDerivationEngine::new());
    let handle = engine.spawn(Arc::new(preset("polar2d"))).unwrap();

    let mut stages = Vec::new();
    loop {
        match handle.recv_timeout(Duration::from_secs(30)) {
            Some(Event::Progress(report)) => stages.push(report.stage),
            Some(Event::Done) => break,
            other => panic!("unexpected event {:?}", other),
        }
    }
    let outcome = handle.join();
    assert!(outcome.is_completed());
    assert_eq!(stages, Stage::ALL.to_vec());
    assert!(!engine.is_busy());
}

// ============================================================================
// Cancellation
// ============================================================================

#[test]
fn test_cancel_between_units() {
    let channel = Arc::new(ProgressChannel::new());
    let flag = Arc::clone(&channel);
    let engine = TensorDerivationEngine::new().with_unit_observer(move |stage, index| {
        if stage == Stage::Christoffel && index == [0, 0, 0] {
            flag.request_cancel();
        }
    });

    let outcome = engine.run(&preset("schwarzschild"), &channel).unwrap();
    assert!(outcome.is_cancelled());
    assert_eq!(outcome.completed_stages(), vec![Stage::InverseMetric]);
    assert_eq!(engine.state(), EngineState::Cancelled);

    let events = channel.drain();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Progress(r) if r.stage == Stage::InverseMetric));
    assert!(matches!(events[1], Event::Cancelled));
}

#[test]
fn test_cancel_before_start() {
    let engine = TensorDerivationEngine::new();
    let channel = ProgressChannel::new();
    channel.request_cancel();
    let outcome = engine.run(&preset("minkowski"), &channel).unwrap();
    assert!(outcome.is_cancelled());
    assert!(outcome.tensors.is_empty());
    assert!(matches!(channel.drain().as_slice(), [Event::Cancelled]));
}

#[test]
fn test_engine_is_reusable_after_cancel() {
    let engine = TensorDerivationEngine::new();
    let cancelled = ProgressChannel::new();
    cancelled.request_cancel();
    assert!(engine.run(&preset("polar2d"), &cancelled).unwrap().is_cancelled());

    let fresh = ProgressChannel::new();
    assert!(engine.run(&preset("polar2d"), &fresh).unwrap().is_completed());
}

#[test]
fn test_stop_switch_cancels_spawned_run_and_keeps_earlier_stages() {
    let stop = Arc::new(StopSwitch::new());
    let armed_gate = Arc::new(Barrier::new(2));
    let once = Arc::new(AtomicBool::new(false));

    let (trigger, gate, o) = (Arc::clone(&stop), Arc::clone(&armed_gate), Arc::clone(&once));
    let engine = Arc::new(TensorDerivationEngine::new().with_unit_observer(move |stage, index| {
        // hold the worker until the switch follows its channel
        if !o.swap(true, Ordering::AcqRel) {
            gate.wait();
        }
        if stage == Stage::Christoffel && index == [0, 0, 0] {
            assert!(trigger.trigger());
        }
    }));

    let handle = engine.spawn(Arc::new(preset("schwarzschild"))).unwrap();
    let armed = stop.arm(Arc::clone(handle.channel()));
    armed_gate.wait();

    let mut markup = Vec::new();
    loop {
        match handle.recv_timeout(Duration::from_secs(30)) {
            Some(Event::Progress(report)) => markup.push(report.markup),
            Some(Event::Cancelled) => break,
            other => panic!("unexpected event {:?}", other),
        }
    }
    drop(armed);
    assert!(!stop.trigger());

    let outcome = handle.join();
    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert_eq!(outcome.completed_stages(), vec![Stage::InverseMetric]);
    assert_eq!(markup.len(), 1);
    assert!(markup[0].contains(TensorKind::InverseMetric.title()));
    assert_eq!(engine.state(), EngineState::Cancelled);
}

// ============================================================================
// Busy rejection
// ============================================================================

#[test]
fn test_second_run_is_rejected_while_busy() {
    let gate = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let once = Arc::new(AtomicBool::new(false));

    let (g, r, o) = (Arc::clone(&gate), Arc::clone(&release), Arc::clone(&once));
    let engine = Arc::new(TensorDerivationEngine::new().with_unit_observer(move |_, _| {
        if !o.swap(true, Ordering::AcqRel) {
            g.wait();
            r.wait();
        }
    }));

    let metric = Arc::new(preset("polar2d"));
    let handle = engine.spawn(Arc::clone(&metric)).unwrap();
    gate.wait();

    assert!(engine.is_busy());
    assert_eq!(engine.spawn(Arc::clone(&metric)).unwrap_err(), GrError::EngineBusy);
    let channel = ProgressChannel::new();
    assert_eq!(engine.run(&metric, &channel).unwrap_err(), GrError::EngineBusy);
    // the rejected call did not touch the active run
    assert!(channel.is_empty());
    assert_eq!(engine.state(), EngineState::InverseMetric);

    release.wait();
    let outcome = handle.join();
    assert!(outcome.is_completed());
    assert!(!engine.is_busy());
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_singular_metric_fails_in_first_stage() {
    let table = Arc::new(SymbolTable::new(&["x", "y"], &[]).unwrap());
    let metric = MetricModel::new(
        table,
        vec![vec![Expr::one(), Expr::one()], vec![Expr::one(), Expr::one()]],
    )
    .unwrap();

    let engine = TensorDerivationEngine::new();
    let channel = ProgressChannel::new();
    let outcome = engine.run(&metric, &channel).unwrap();

    let expected = GrError::StageComputation {
        stage: Stage::InverseMetric,
        index: vec![1],
        cause: AlgebraError::SingularMatrix { column: 1 },
    };
    assert_eq!(outcome.status, RunStatus::Failed(expected.clone()));
    assert!(outcome.tensors.is_empty());
    assert_eq!(engine.state(), EngineState::Failed);
    assert!(!engine.is_busy());
    match channel.drain().as_slice() {
        [Event::Failed(e)] => assert_eq!(*e, expected),
        other => panic!("expected a single failure event, got {:?}", other),
    }
}

#[test]
fn test_worker_panic_ends_the_run_as_failed() {
    let engine = Arc::new(TensorDerivationEngine::new().with_unit_observer(|stage, _| {
        if stage == Stage::Ricci {
            panic!("observer exploded");
        }
    }));
    let handle = engine.spawn(Arc::new(preset("polar2d"))).unwrap();

    let mut stages = Vec::new();
    let failure = loop {
        match handle.recv_timeout(Duration::from_secs(30)) {
            Some(Event::Progress(report)) => stages.push(report.stage),
            Some(Event::Failed(e)) => break e,
            other => panic!("unexpected event {:?}", other),
        }
    };
    assert_eq!(stages, vec![Stage::InverseMetric, Stage::Christoffel]);
    assert!(matches!(&failure, GrError::Worker(msg) if msg.contains("observer exploded")));

    let outcome = handle.join();
    assert_eq!(outcome.status, RunStatus::Failed(failure));
    assert_eq!(engine.state(), EngineState::Failed);
    assert!(!engine.is_busy());

    let channel = ProgressChannel::new();
    assert!(engine.run(&preset("minkowski"), &channel).unwrap().is_completed());
}

#[test]
fn test_dimension_mismatch_is_rejected_before_running() {
    let def = MetricDefinition::new(&["t", "r"], &[], &[], "metric = diag(-1, 1, 1)");
    assert_eq!(
        def.build().unwrap_err(),
        GrError::DimensionMismatch {
            rows: 3,
            cols: 3,
            coordinates: 2
        }
    );
}
