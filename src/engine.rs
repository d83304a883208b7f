//! The staged tensor-derivation pipeline.
//!
//! ```text
//! Init -> InverseMetric -> Christoffel -> Ricci -> RicciScalar
//!      -> Einstein -> MixedEinstein -> Divergence -> Done
//! ```
//!
//! Any non-terminal state can move to `Cancelled` (the consumer set the
//! channel's flag) or `Failed` (an algebra error inside a unit of work).
//! One run at a time per engine; a second caller gets [`GrError::EngineBusy`]
//! without disturbing the active run.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::algebra::{Expr, Matrix};
use crate::channel::{Event, ProgressChannel, StageReport};
use crate::derive::{self, Checkpoint, StageError, UnitObserver};
use crate::error::GrError;
use crate::metric::MetricModel;
use crate::render::RenderAdapter;
use crate::tensor::{Tensor, TensorKind, TensorValue};

/// The seven derivation stages, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    InverseMetric,
    Christoffel,
    Ricci,
    RicciScalar,
    Einstein,
    MixedEinstein,
    Divergence,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::InverseMetric,
        Stage::Christoffel,
        Stage::Ricci,
        Stage::RicciScalar,
        Stage::Einstein,
        Stage::MixedEinstein,
        Stage::Divergence,
    ];

    pub const COUNT: usize = Self::ALL.len();

    /// 1-based position in the pipeline.
    pub fn ordinal(self) -> usize {
        self as usize + 1
    }

    /// The tensor this stage produces.
    pub fn output(self) -> TensorKind {
        match self {
            Stage::InverseMetric => TensorKind::InverseMetric,
            Stage::Christoffel => TensorKind::Christoffel,
            Stage::Ricci => TensorKind::Ricci,
            Stage::RicciScalar => TensorKind::RicciScalar,
            Stage::Einstein => TensorKind::Einstein,
            Stage::MixedEinstein => TensorKind::MixedEinstein,
            Stage::Divergence => TensorKind::Divergence,
        }
    }

    /// Units of work the stage performs in dimension `n`.
    pub fn units(self, n: usize) -> usize {
        match self {
            Stage::InverseMetric | Stage::Divergence => n,
            Stage::Christoffel => n * n * (n + 1) / 2,
            Stage::Ricci | Stage::Einstein => n * (n + 1) / 2,
            Stage::RicciScalar => 1,
            Stage::MixedEinstein => n * n,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::InverseMetric => "inverse metric",
            Stage::Christoffel => "Christoffel symbols",
            Stage::Ricci => "Ricci tensor",
            Stage::RicciScalar => "Ricci scalar",
            Stage::Einstein => "Einstein tensor",
            Stage::MixedEinstein => "mixed Einstein tensor",
            Stage::Divergence => "divergence",
        };
        f.write_str(name)
    }
}

/// Externally observable engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Init = 0,
    InverseMetric,
    Christoffel,
    Ricci,
    RicciScalar,
    Einstein,
    MixedEinstein,
    Divergence,
    Done,
    Cancelled,
    Failed,
}

impl EngineState {
    fn running(stage: Stage) -> Self {
        match stage {
            Stage::InverseMetric => EngineState::InverseMetric,
            Stage::Christoffel => EngineState::Christoffel,
            Stage::Ricci => EngineState::Ricci,
            Stage::RicciScalar => EngineState::RicciScalar,
            Stage::Einstein => EngineState::Einstein,
            Stage::MixedEinstein => EngineState::MixedEinstein,
            Stage::Divergence => EngineState::Divergence,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => EngineState::InverseMetric,
            2 => EngineState::Christoffel,
            3 => EngineState::Ricci,
            4 => EngineState::RicciScalar,
            5 => EngineState::Einstein,
            6 => EngineState::MixedEinstein,
            7 => EngineState::Divergence,
            8 => EngineState::Done,
            9 => EngineState::Cancelled,
            10 => EngineState::Failed,
            _ => EngineState::Init,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            EngineState::Done | EngineState::Cancelled | EngineState::Failed
        )
    }
}

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed(GrError),
}

/// Result of one run: its status plus every tensor completed before it ended.
#[derive(Clone, Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub tensors: Vec<Tensor>,
    pub elapsed: Duration,
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    pub fn error(&self) -> Option<&GrError> {
        match &self.status {
            RunStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn tensor(&self, kind: TensorKind) -> Option<&Tensor> {
        self.tensors.iter().find(|t| t.kind == kind)
    }

    /// Stages whose results are available, in order.
    pub fn completed_stages(&self) -> Vec<Stage> {
        Stage::ALL
            .iter()
            .copied()
            .filter(|s| self.tensor(s.output()).is_some())
            .collect()
    }
}

/// Symbolic GR derivation engine.
pub struct TensorDerivationEngine {
    state: AtomicU8,
    busy: AtomicBool,
    renderer: RenderAdapter,
    observer: Option<Box<UnitObserver>>,
}

impl Default for TensorDerivationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TensorDerivationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TensorDerivationEngine")
            .field("state", &self.state())
            .field("busy", &self.is_busy())
            .finish()
    }
}

/// Releases the busy flag when dropped, including on unwind.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Why the pipeline stopped before `Done`.
enum Interrupt {
    Cancelled,
    Failed(GrError),
}

impl TensorDerivationEngine {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(EngineState::Init as u8),
            busy: AtomicBool::new(false),
            renderer: RenderAdapter::new(),
            observer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: RenderAdapter) -> Self {
        self.renderer = renderer;
        self
    }

    /// Install a callback that runs after every unit of work.
    ///
    /// Called on the worker thread. Progress UIs and tests use it to observe
    /// fine-grained progress.
    pub fn with_unit_observer(
        mut self,
        observer: impl Fn(Stage, &[usize]) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn set_state(&self, state: EngineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn acquire(&self) -> Result<(), GrError> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| GrError::EngineBusy)
    }

    /// Run the whole pipeline on the calling thread.
    ///
    /// Events go to `channel` as stages complete. Fails only with
    /// [`GrError::EngineBusy`]; everything else is reported through the
    /// returned outcome and the channel's terminal event.
    pub fn run(&self, metric: &MetricModel, channel: &ProgressChannel) -> Result<RunOutcome, GrError> {
        self.acquire()?;
        let _guard = BusyGuard(&self.busy);
        Ok(self.execute(metric, channel))
    }

    /// Run the pipeline on a new worker thread with a fresh channel.
    ///
    /// The busy check happens here, before the thread starts, so a rejected
    /// call never touches the active run.
    pub fn spawn(self: &Arc<Self>, metric: Arc<MetricModel>) -> Result<RunHandle, GrError> {
        self.acquire()?;
        let engine = Arc::clone(self);
        let channel = Arc::new(ProgressChannel::new());
        let worker_channel = Arc::clone(&channel);

        let spawned = std::thread::Builder::new()
            .name("grtensor-worker".to_string())
            .spawn(move || {
                let _guard = BusyGuard(&engine.busy);
                let run = panic::catch_unwind(AssertUnwindSafe(|| {
                    engine.execute(&metric, &worker_channel)
                }));
                run.unwrap_or_else(|payload| {
                    let error = GrError::Worker(panic_message(payload.as_ref()));
                    engine.set_state(EngineState::Failed);
                    error!(%error, "derivation worker panicked");
                    worker_channel.send(Event::Failed(error.clone()));
                    RunOutcome {
                        status: RunStatus::Failed(error),
                        tensors: Vec::new(),
                        elapsed: Duration::ZERO,
                    }
                })
            });

        match spawned {
            Ok(thread) => Ok(RunHandle { channel, thread }),
            Err(e) => {
                self.busy.store(false, Ordering::Release);
                Err(GrError::Worker(e.to_string()))
            }
        }
    }

    fn execute(&self, metric: &MetricModel, channel: &ProgressChannel) -> RunOutcome {
        let start = Instant::now();
        self.set_state(EngineState::Init);
        info!(dimension = metric.dimension(), "derivation started");

        let mut tensors = Vec::with_capacity(Stage::COUNT);
        let status = match self.pipeline(metric, channel, &mut tensors) {
            Ok(()) => {
                self.set_state(EngineState::Done);
                channel.send(Event::Done);
                info!(elapsed = ?start.elapsed(), "derivation finished");
                RunStatus::Completed
            }
            Err(Interrupt::Cancelled) => {
                self.set_state(EngineState::Cancelled);
                channel.send(Event::Cancelled);
                info!(completed = tensors.len(), "derivation cancelled");
                RunStatus::Cancelled
            }
            Err(Interrupt::Failed(error)) => {
                self.set_state(EngineState::Failed);
                warn!(%error, "derivation failed");
                channel.send(Event::Failed(error.clone()));
                RunStatus::Failed(error)
            }
        };

        RunOutcome {
            status,
            tensors,
            elapsed: start.elapsed(),
        }
    }

    fn pipeline(
        &self,
        metric: &MetricModel,
        channel: &ProgressChannel,
        tensors: &mut Vec<Tensor>,
    ) -> Result<(), Interrupt> {
        let labels = metric.table().coordinate_names();
        let mut emit = |stage: Stage, value: TensorValue| {
            let tensor = Tensor::new(stage.output(), value);
            let markup = self.renderer.render(&tensor, &labels);
            tensors.push(tensor.clone());
            channel.send(Event::Progress(StageReport {
                stage,
                tensor,
                markup,
                completed: stage.ordinal(),
                total: Stage::COUNT,
            }));
        };

        let inverse = self.stage(Stage::InverseMetric, metric, channel, |cp| {
            derive::inverse_metric(metric, cp)
        })?;
        emit(Stage::InverseMetric, TensorValue::Matrix(inverse.clone()));

        let gamma = self.stage(Stage::Christoffel, metric, channel, |cp| {
            derive::christoffel(metric, &inverse, cp)
        })?;
        emit(Stage::Christoffel, TensorValue::Rank3(gamma.clone()));

        let ricci = self.stage(Stage::Ricci, metric, channel, |cp| {
            derive::ricci(metric, &gamma, cp)
        })?;
        emit(Stage::Ricci, TensorValue::Matrix(ricci.clone()));

        let scalar: Expr = self.stage(Stage::RicciScalar, metric, channel, |cp| {
            derive::ricci_scalar(&inverse, &ricci, cp)
        })?;
        emit(Stage::RicciScalar, TensorValue::Scalar(scalar.clone()));

        let einstein: Matrix = self.stage(Stage::Einstein, metric, channel, |cp| {
            derive::einstein(metric, &ricci, &scalar, cp)
        })?;
        emit(Stage::Einstein, TensorValue::Matrix(einstein.clone()));

        let mixed = self.stage(Stage::MixedEinstein, metric, channel, |cp| {
            derive::mixed_einstein(&inverse, &einstein, cp)
        })?;
        emit(Stage::MixedEinstein, TensorValue::Matrix(mixed.clone()));

        let divergence = self.stage(Stage::Divergence, metric, channel, |cp| {
            derive::divergence(metric, &inverse, &gamma, &mixed, cp)
        })?;
        if divergence.iter().any(|e| !e.is_zero()) {
            warn!("covariant divergence of the Einstein tensor is not identically zero");
        }
        emit(Stage::Divergence, TensorValue::Vector(divergence));

        Ok(())
    }

    /// Run one stage behind a fresh checkpoint.
    fn stage<T>(
        &self,
        stage: Stage,
        metric: &MetricModel,
        channel: &ProgressChannel,
        work: impl FnOnce(&mut Checkpoint<'_>) -> Result<T, StageError>,
    ) -> Result<T, Interrupt> {
        self.set_state(EngineState::running(stage));
        let started = Instant::now();
        info!(
            stage = %stage,
            units = stage.units(metric.dimension()),
            "stage {}/{}",
            stage.ordinal(),
            Stage::COUNT
        );

        let mut cp = Checkpoint::new(stage, channel).with_observer(self.observer.as_deref());
        match work(&mut cp) {
            Ok(value) => {
                debug!(stage = %stage, units = cp.units(), elapsed = ?started.elapsed(), "stage complete");
                Ok(value)
            }
            Err(StageError::Cancelled) => Err(Interrupt::Cancelled),
            Err(StageError::Computation { index, cause }) => {
                Err(Interrupt::Failed(GrError::StageComputation { stage, index, cause }))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown cause");
    format!("worker thread panicked: {}", detail)
}

/// A run executing on its own worker thread.
#[derive(Debug)]
pub struct RunHandle {
    channel: Arc<ProgressChannel>,
    thread: JoinHandle<RunOutcome>,
}

impl RunHandle {
    pub fn channel(&self) -> &Arc<ProgressChannel> {
        &self.channel
    }

    pub fn request_cancel(&self) {
        self.channel.request_cancel();
    }

    pub fn poll(&self) -> Option<Event> {
        self.channel.poll()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.channel.recv_timeout(timeout)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the worker to finish.
    pub fn join(self) -> RunOutcome {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(_) => RunOutcome {
                status: RunStatus::Failed(GrError::Worker("worker thread panicked".to_string())),
                tensors: Vec::new(),
                elapsed: Duration::ZERO,
            },
        }
    }
}
