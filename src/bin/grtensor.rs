//! grtensor - symbolic GR tensors from a metric
//!
//! Usage:
//!   grtensor run [FILE] [--preset NAME] [--time-limit SECS] [--output PATH]
//!   grtensor presets
//!   grtensor show NAME
//!   grtensor repl [--preset NAME]
//!
//! Without a subcommand the REPL starts.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use grtensor::latex::{latex, latex_matrix};
use grtensor::presets::{self, DEFAULT_PRESET, PRESETS};
use grtensor::repl::{InputResult, MetaCommand, ReplState};
use grtensor::{
    Event, MetricDefinition, MetricModel, RenderAdapter, RunConfig, RunOutcome, RunStatus,
    Stage, StopSwitch, Tensor, TensorDerivationEngine, TensorKind, TensorValue, Value,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const PROMPT: &str = "grtensor> ";
const CONTINUATION: &str = "........  ";
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ctrl-C cancels the run in progress; outside a run it exits as usual.
static STOP: StopSwitch = StopSwitch::new();

#[derive(Parser)]
#[command(name = "grtensor")]
#[command(version, about = "Symbolic General Relativity tensors from a spacetime metric")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive every tensor for a metric definition and print LaTeX
    Run {
        /// Metric definition file (TOML)
        file: Option<PathBuf>,

        /// Use a built-in metric instead of a file
        #[arg(long, conflicts_with = "file")]
        preset: Option<String>,

        /// Cancel the run after this many seconds
        #[arg(long, value_name = "SECS")]
        time_limit: Option<u64>,

        /// Write LaTeX to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Driver settings (TOML); flags take precedence
        #[arg(long)]
        config: Option<PathBuf>,

        /// Also list components that vanish identically
        #[arg(long)]
        show_zeros: bool,
    },

    /// List built-in metrics
    Presets,

    /// Print a built-in metric as a definition file
    Show {
        name: String,
    },

    /// Interactive metric definition
    Repl {
        /// Start from a built-in metric
        #[arg(long)]
        preset: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    ctrlc::set_handler(|| {
        if !STOP.trigger() {
            std::process::exit(130);
        }
    })
    .context("installing the Ctrl-C handler")?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Run {
            file,
            preset,
            time_limit,
            output,
            config,
            show_zeros,
        }) => {
            let mut run_config = match config {
                Some(path) => RunConfig::load(&path)?,
                None => RunConfig::default(),
            };
            if time_limit.is_some() {
                run_config.time_limit_secs = time_limit;
            }
            if output.is_some() {
                run_config.output = output;
            }
            run_config.show_zero_components |= show_zeros;

            let def = match (file, preset) {
                (Some(path), _) => MetricDefinition::load(&path)?,
                (None, name) => lookup_preset(name.as_deref().unwrap_or(DEFAULT_PRESET))?,
            };
            run(&def, &run_config)
        }
        Some(Commands::Presets) => {
            for (name, description) in PRESETS {
                println!("{:<15} {}", name, description);
            }
            Ok(())
        }
        Some(Commands::Show { name }) => {
            print!("{}", lookup_preset(&name)?.to_toml()?);
            Ok(())
        }
        Some(Commands::Repl { preset }) => repl(preset.as_deref()),
        None => repl(None),
    }
}

fn lookup_preset(name: &str) -> Result<MetricDefinition> {
    presets::preset(name).ok_or_else(|| {
        let known: Vec<&str> = presets::names().collect();
        anyhow!("unknown preset `{}` (known: {})", name, known.join(", "))
    })
}

fn build(def: &MetricDefinition) -> Result<MetricModel> {
    def.build().map_err(|e| anyhow!("{}", e.report(&def.metric)))
}

fn run(def: &MetricDefinition, config: &RunConfig) -> Result<()> {
    let metric = Arc::new(build(def)?);
    let renderer = RenderAdapter::new().show_zero_components(config.show_zero_components);

    let mut out: Box<dyn Write> = match &config.output {
        Some(path) => {
            ensure_parent(path)?;
            Box::new(fs::File::create(path).with_context(|| format!("creating {}", path.display()))?)
        }
        None => Box::new(io::stdout().lock()),
    };

    let limit = config.time_limit_secs.map(Duration::from_secs);
    let outcome = derive(&metric, renderer, limit, &mut out)?;
    out.flush()?;
    if let Some(path) = &config.output {
        eprintln!("LaTeX written to {}", path.display());
    }

    match outcome.status {
        RunStatus::Completed | RunStatus::Cancelled => Ok(()),
        RunStatus::Failed(e) => Err(e.into()),
    }
}

/// Run the pipeline on a worker thread, streaming markup to `out` and a
/// progress line per stage to stderr.
fn derive(
    metric: &Arc<MetricModel>,
    renderer: RenderAdapter,
    limit: Option<Duration>,
    out: &mut dyn Write,
) -> Result<RunOutcome> {
    let labels = metric.table().coordinate_names();
    writeln!(
        out,
        "% Coordinates ({}D): {}",
        metric.dimension(),
        labels.join(", ")
    )?;
    let parameters: Vec<&str> = metric.table().parameters().iter().map(|s| s.name()).collect();
    if !parameters.is_empty() {
        writeln!(out, "% Parameters: {}", parameters.join(", "))?;
    }
    let input = Tensor::new(TensorKind::Metric, TensorValue::Matrix(metric.components().clone()));
    write!(out, "{}", renderer.render(&input, &labels))?;

    let engine = Arc::new(TensorDerivationEngine::new().with_renderer(renderer));
    let handle = engine.spawn(Arc::clone(metric))?;
    let _armed = STOP.arm(Arc::clone(handle.channel()));
    let started = Instant::now();

    loop {
        if let Some(limit) = limit {
            if started.elapsed() >= limit && !handle.channel().is_cancel_requested() {
                eprintln!("time limit of {}s reached, cancelling", limit.as_secs());
                handle.request_cancel();
            }
        }
        match handle.recv_timeout(POLL_INTERVAL) {
            Some(Event::Progress(report)) => {
                write!(out, "{}", report.markup)?;
                out.flush()?;
                eprintln!(
                    "[{}/{}] {:>3.0}% {} ({:.1}s)",
                    report.completed,
                    report.total,
                    report.fraction() * 100.0,
                    report.stage,
                    started.elapsed().as_secs_f64()
                );
            }
            Some(Event::Cancelled) => {
                eprintln!("stopped; tensors above are complete");
                break;
            }
            Some(Event::Failed(e)) => {
                eprintln!("failed: {}", e);
                break;
            }
            Some(Event::Done) => {
                eprintln!("done in {:.1}s", started.elapsed().as_secs_f64());
                break;
            }
            None if handle.is_finished() && handle.channel().is_empty() => break,
            None => {}
        }
    }

    Ok(handle.join())
}

// ============================================================================
// REPL
// ============================================================================

fn repl(preset: Option<&str>) -> Result<()> {
    println!("grtensor v{} - symbolic GR tensors", VERSION);
    println!("Type :help for help, :quit to exit\n");

    let mut state = ReplState::new();
    if let Some(name) = preset {
        state.load_preset(name)?;
        println!("Loaded preset `{}`", name);
    }

    let config = Config::builder().auto_add_history(true).build();
    let mut rl: Editor<(), DefaultHistory> =
        Editor::with_config(config).context("creating line editor")?;

    let history_path = history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        let prompt = if state.input_buffer.is_empty() {
            PROMPT
        } else {
            CONTINUATION
        };

        match rl.readline(prompt) {
            Ok(line) => match state.process_line(&line) {
                InputResult::MetaCommand(cmd) => {
                    if !handle_command(&mut state, cmd) {
                        break;
                    }
                }
                InputResult::Source(source) => handle_source(&mut state, &source),
                InputResult::Incomplete | InputResult::Empty => {}
            },
            Err(ReadlineError::Interrupted) => {
                if !state.input_buffer.is_empty() {
                    state.input_buffer.clear();
                    println!("^C");
                } else {
                    println!("Use :quit or Ctrl-D to exit");
                }
            }
            Err(ReadlineError::Eof) => {
                if let Some(source) = state.force_submit() {
                    handle_source(&mut state, &source);
                } else {
                    println!("\nGoodbye!");
                    break;
                }
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let _ = rl.save_history(path);
    }
    Ok(())
}

/// Handle a meta-command. Returns false if we should exit.
fn handle_command(state: &mut ReplState, cmd: MetaCommand) -> bool {
    match cmd {
        MetaCommand::Help => print_help(),
        MetaCommand::Quit => {
            println!("Goodbye!");
            return false;
        }
        MetaCommand::Coords(names) => {
            declare(state, "coordinates", names, ReplState::set_coordinates, ReplState::coordinates)
        }
        MetaCommand::Params(names) => {
            declare(state, "parameters", names, ReplState::set_parameters, ReplState::parameters)
        }
        MetaCommand::Functions(names) => {
            declare(state, "functions", names, ReplState::set_functions, ReplState::functions)
        }
        MetaCommand::Preset(None) => {
            for (name, description) in PRESETS {
                println!("  {:<15} {}", name, description);
            }
        }
        MetaCommand::Preset(Some(name)) => match state.load_preset(&name) {
            Ok(()) => println!("Loaded preset `{}`", name),
            Err(e) => eprintln!("Error: {}", e),
        },
        MetaCommand::Show => match state.definition().to_toml() {
            Ok(toml) => print!("{}", toml),
            Err(e) => eprintln!("Error: {}", e),
        },
        MetaCommand::Run => handle_run(state),
        MetaCommand::Reset => {
            state.reset();
            println!("State reset.");
        }
        MetaCommand::Unknown(msg) => {
            eprintln!("Error: {}", msg);
            eprintln!("Type :help for available commands");
        }
    }
    true
}

fn declare(
    state: &mut ReplState,
    what: &str,
    names: Vec<String>,
    set: fn(&mut ReplState, Vec<String>) -> Result<(), grtensor::GrError>,
    get: fn(&ReplState) -> &[String],
) {
    if !names.is_empty() {
        if let Err(e) = set(state, names) {
            eprintln!("Error: {}", e);
            return;
        }
    }
    let current = get(state);
    if current.is_empty() {
        println!("No {} declared", what);
    } else {
        println!("{}: {}", what, current.join(", "));
    }
}

fn handle_source(state: &mut ReplState, source: &str) {
    match state.execute(source) {
        Ok(values) => {
            for value in values {
                println!("{}", value);
                let markup = match &value {
                    Value::Scalar(e) => latex(e),
                    Value::Matrix(m) => latex_matrix(m),
                };
                println!("  latex: {}", markup);
            }
        }
        Err(e) => eprintln!("{}", e.report(source)),
    }
}

fn handle_run(state: &ReplState) {
    let metric = match state.metric() {
        Ok(m) => Arc::new(m),
        Err(e) => {
            eprintln!("Error: {}", e);
            return;
        }
    };
    let mut out = io::stdout().lock();
    match derive(&metric, RenderAdapter::new(), None, &mut out) {
        Ok(outcome) if outcome.is_completed() => {}
        Ok(outcome) => eprintln!(
            "{} of {} stages completed",
            outcome.completed_stages().len(),
            Stage::COUNT
        ),
        Err(e) => eprintln!("Error: {:#}", e),
    }
}

fn print_help() {
    println!("Metric definition statements:");
    println!("  name = expr           bind a local");
    println!("  metric = [[..], ..]   the metric to derive from (or diag(..))");
    println!("  expr                  print the simplified value and its LaTeX");
    println!();
    println!("Commands:");
    println!("  :coords [names]       show or declare coordinates, e.g. :coords t, r, theta, phi");
    println!("  :params [names]       show or declare parameters (real, positive)");
    println!("  :functions [names]    show or declare functions of one argument, e.g. omega");
    println!("  :preset [name]        list presets or load one");
    println!("  :show                 print the session as a definition file");
    println!("  :run                  derive all tensors for `metric` (Ctrl-C stops)");
    println!("  :reset                clear everything");
    println!("  :help                 show this help");
    println!("  :quit                 exit");
    println!();
    println!("Redeclaring names re-evaluates earlier statements; if they no longer");
    println!("evaluate, the declaration is rejected. Use :reset to start over.");
}

fn history_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("grtensor").join("history"))
}

fn config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    }
    #[cfg(windows)]
    {
        std::env::var_os("APPDATA").map(PathBuf::from)
    }
    #[cfg(not(any(unix, windows)))]
    {
        None
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))
        }
        _ => Ok(()),
    }
}
