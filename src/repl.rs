//! REPL state for interactive metric definition
//!
//! The REPL keeps the declared names, an [`Evaluator`] over the definition
//! statements entered so far, and the accepted source text, so that the
//! current session can always be turned back into a [`MetricDefinition`].
//! Terminal handling lives in the binary; this module is pure state.

use std::sync::Arc;

use chumsky::Parser;

use crate::config::MetricDefinition;
use crate::error::GrError;
use crate::eval::{Evaluator, Value};
use crate::lexer;
use crate::metric::MetricModel;
use crate::presets;
use crate::symbol::SymbolTable;

/// Result of processing a line of input
#[derive(Debug, PartialEq, Eq)]
pub enum InputResult {
    MetaCommand(MetaCommand),
    Source(String),
    Incomplete,
    Empty,
}

/// Meta-commands supported by the REPL
#[derive(Debug, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    Quit,
    /// `:coords t, r, theta, phi`; no names shows the current list
    Coords(Vec<String>),
    Params(Vec<String>),
    Functions(Vec<String>),
    /// `:preset kerr`; no name lists presets
    Preset(Option<String>),
    Show,
    Run,
    Reset,
    Unknown(String),
}

impl MetaCommand {
    pub fn parse(input: &str) -> Self {
        let input = input.trim_start_matches(':').trim();
        let (cmd, rest) = match input.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (input, ""),
        };

        match cmd {
            "help" | "h" | "?" => MetaCommand::Help,
            "quit" | "q" | "exit" => MetaCommand::Quit,
            "coords" | "coordinates" | "c" => MetaCommand::Coords(split_names(rest)),
            "params" | "parameters" | "p" => MetaCommand::Params(split_names(rest)),
            "functions" | "funcs" | "f" => MetaCommand::Functions(split_names(rest)),
            "preset" => MetaCommand::Preset(split_names(rest).into_iter().next()),
            "show" | "s" => MetaCommand::Show,
            "run" | "r" => MetaCommand::Run,
            "reset" => MetaCommand::Reset,
            other => MetaCommand::Unknown(format!("Unknown command: :{}", other)),
        }
    }
}

/// Split `a, b c` into names. Separators are commas and whitespace.
pub fn split_names(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// REPL session state.
#[derive(Debug)]
pub struct ReplState {
    coordinates: Vec<String>,
    parameters: Vec<String>,
    functions: Vec<String>,
    evaluator: Evaluator,
    /// Accepted definition source, one entry per submitted block
    source: Vec<String>,
    /// Multi-line input buffer
    pub input_buffer: String,
}

impl Default for ReplState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplState {
    /// Empty session: no names, no statements.
    pub fn new() -> Self {
        Self {
            coordinates: Vec::new(),
            parameters: Vec::new(),
            functions: Vec::new(),
            evaluator: Evaluator::new(Arc::new(SymbolTable::default())),
            source: Vec::new(),
            input_buffer: String::new(),
        }
    }

    /// Session preloaded with `def`.
    pub fn from_definition(def: &MetricDefinition) -> Result<Self, GrError> {
        let mut state = Self::new();
        state.load(def)?;
        Ok(state)
    }

    pub fn coordinates(&self) -> &[String] {
        &self.coordinates
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn functions(&self) -> &[String] {
        &self.functions
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Clear names, statements and any buffered input.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Replace the whole session with `def`. On error the session is unchanged.
    pub fn load(&mut self, def: &MetricDefinition) -> Result<(), GrError> {
        let (evaluator, source) = replay(
            &def.coordinates,
            &def.parameters,
            &def.functions,
            std::slice::from_ref(&def.metric),
        )?;
        self.coordinates = def.coordinates.clone();
        self.parameters = def.parameters.clone();
        self.functions = def.functions.clone();
        self.evaluator = evaluator;
        self.source = source;
        self.input_buffer.clear();
        Ok(())
    }

    pub fn load_preset(&mut self, name: &str) -> Result<(), GrError> {
        let def = presets::preset(name)
            .ok_or_else(|| GrError::Config(format!("unknown preset `{}`", name)))?;
        self.load(&def)
    }

    /// Redeclare coordinates and re-evaluate the accepted statements.
    pub fn set_coordinates(&mut self, names: Vec<String>) -> Result<(), GrError> {
        self.redeclare(names, self.parameters.clone(), self.functions.clone())
    }

    pub fn set_parameters(&mut self, names: Vec<String>) -> Result<(), GrError> {
        self.redeclare(self.coordinates.clone(), names, self.functions.clone())
    }

    pub fn set_functions(&mut self, names: Vec<String>) -> Result<(), GrError> {
        self.redeclare(self.coordinates.clone(), self.parameters.clone(), names)
    }

    fn redeclare(
        &mut self,
        coordinates: Vec<String>,
        parameters: Vec<String>,
        functions: Vec<String>,
    ) -> Result<(), GrError> {
        let (evaluator, source) = replay(&coordinates, &parameters, &functions, &self.source)?;
        self.coordinates = coordinates;
        self.parameters = parameters;
        self.functions = functions;
        self.evaluator = evaluator;
        self.source = source;
        Ok(())
    }

    /// Process a line of input, handling multi-line bracket matching
    pub fn process_line(&mut self, line: &str) -> InputResult {
        let trimmed = line.trim();

        if trimmed.is_empty() {
            if self.input_buffer.is_empty() {
                return InputResult::Empty;
            }
            return InputResult::Incomplete;
        }

        // Meta-command (only at start, not in continuation)
        if trimmed.starts_with(':') && self.input_buffer.is_empty() {
            return InputResult::MetaCommand(MetaCommand::parse(trimmed));
        }

        if !self.input_buffer.is_empty() {
            self.input_buffer.push('\n');
        }
        self.input_buffer.push_str(line);

        // Lex errors are reported on submit, not swallowed as "incomplete"
        let depth = lexer::lexer()
            .parse(self.input_buffer.as_str())
            .map(|tokens| lexer::open_brackets(&tokens))
            .unwrap_or(0);

        if depth > 0 {
            InputResult::Incomplete
        } else {
            InputResult::Source(std::mem::take(&mut self.input_buffer))
        }
    }

    /// Force submit current buffer (for Ctrl-D)
    pub fn force_submit(&mut self) -> Option<String> {
        if self.input_buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.input_buffer))
        }
    }

    /// Evaluate definition statements.
    ///
    /// Either every statement is accepted or none is. Returns the values of
    /// bare expression statements, simplified.
    pub fn execute(&mut self, source: &str) -> Result<Vec<Value>, GrError> {
        let program = crate::parse(source)?;
        let mut evaluator = self.evaluator.clone();
        let mut values = Vec::new();
        for stmt in &program.statements {
            if let Some(value) = evaluator.statement(stmt)? {
                values.push(simplified(value));
            }
        }
        self.evaluator = evaluator;
        self.source.push(source.to_string());
        Ok(values)
    }

    /// The session as a definition file.
    pub fn definition(&self) -> MetricDefinition {
        fn names(v: &[String]) -> Vec<&str> {
            v.iter().map(String::as_str).collect()
        }
        MetricDefinition::new(
            &names(&self.coordinates),
            &names(&self.parameters),
            &names(&self.functions),
            self.source.join("\n"),
        )
    }

    /// The current `metric` binding, validated against the coordinates.
    pub fn metric(&self) -> Result<MetricModel, GrError> {
        if self.coordinates.is_empty() {
            return Err(GrError::Config("declare coordinates first, e.g. :coords t, x".to_string()));
        }
        let m = self.evaluator.metric()?;
        MetricModel::from_matrix(Arc::clone(self.evaluator.table()), m)
    }
}

fn simplified(value: Value) -> Value {
    match value {
        Value::Scalar(e) => Value::Scalar(e.simplify()),
        Value::Matrix(m) => match m.try_map(|e| Ok(e.simplify())) {
            Ok(m) => Value::Matrix(m),
            Err(_) => Value::Matrix(m),
        },
    }
}

/// Build a table from the names and evaluate `blocks` against it.
fn replay(
    coordinates: &[String],
    parameters: &[String],
    functions: &[String],
    blocks: &[String],
) -> Result<(Evaluator, Vec<String>), GrError> {
    let table = SymbolTable::with_functions(coordinates, parameters, functions)?;
    let mut evaluator = Evaluator::new(Arc::new(table));
    for block in blocks {
        let program = crate::parse(block)?;
        evaluator.program(&program)?;
    }
    Ok((evaluator, blocks.to_vec()))
}
