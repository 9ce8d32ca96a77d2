//! The script runner
//!
//! [`ScriptRunner::run_script`] is the whole harness: clear the log, route
//! console output into it, evaluate the source with the capability bundle,
//! and finish with one RESPONSE entry (the serialized return value) or one
//! ERROR entry (the failure message).

use crate::bindings::CapabilityBundle;
use crate::error::RuntimeResult;
use crate::log_store::LogStore;
use crate::serializer::safe_stringify;
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, info};
use trueplay_script::console::{self, ConsoleLevel, ConsoleSink};
use trueplay_script::json::Indent;
use trueplay_script::{
    format_number, install_console, ErrorContext, ExecutionLimits, Interpreter, PropertyMap, ScriptError, Value,
};
use trueplay_types::{LogEntry, LogStatus};

/// Executes source text with a set of bindings
pub trait ScriptEvaluator {
    fn evaluate(&mut self, source: &str, bindings: &CapabilityBundle) -> Result<Value, ScriptError>;
}

/// Evaluates each run in a fresh [`Interpreter`]
#[derive(Debug, Clone, Default)]
pub struct InterpreterEvaluator {
    limits: ExecutionLimits,
}

impl InterpreterEvaluator {
    pub fn new(limits: ExecutionLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ExecutionLimits {
        self.limits
    }
}

impl ScriptEvaluator for InterpreterEvaluator {
    fn evaluate(&mut self, source: &str, bindings: &CapabilityBundle) -> Result<Value, ScriptError> {
        let mut interp = Interpreter::with_limits(self.limits);
        bindings.install(&mut interp);
        let result = interp.eval_source(source);
        debug!(steps = interp.steps(), "Evaluation finished");
        result
    }
}

/// Console sink active while a script runs
struct CaptureConsole {
    store: LogStore,
    previous: Rc<dyn ConsoleSink>,
}

impl ConsoleSink for CaptureConsole {
    fn write(&self, level: ConsoleLevel, args: &[Value]) {
        let is_error = args
            .iter()
            .any(|arg| matches!(arg, Value::String(s) if s.contains("error")));
        let status = if is_error { LogStatus::Error } else { LogStatus::Success };
        let message = args.iter().map(console_text).collect::<Vec<_>>().join(" ");

        let entry = self.store.append(message, status);
        debug!(id = %entry.id, status = %entry.status, level = level.as_str(), "Captured console output");
        self.previous.write(level, args);
    }
}

/// Text of one console argument in a log entry
fn console_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        Value::BigInt(n) => format_number(*n as f64),
        Value::Array(_) | Value::Object(_) | Value::Host(_) => safe_stringify(value, &Indent::None),
        other => other.to_display_string(),
    }
}

/// Runs playground scripts and keeps the log of the latest run
pub struct ScriptRunner<E = InterpreterEvaluator> {
    evaluator: E,
    bindings: CapabilityBundle,
    store: LogStore,
    runs: u64,
}

impl ScriptRunner<InterpreterEvaluator> {
    pub fn new(bundle: CapabilityBundle, limits: ExecutionLimits) -> RuntimeResult<Self> {
        Self::with_evaluator(InterpreterEvaluator::new(limits), bundle)
    }
}

impl<E: ScriptEvaluator> ScriptRunner<E> {
    /// Build a runner around `evaluator`; the bundle gains `addLog` and
    /// `LogStatus` bound to this runner's log
    pub fn with_evaluator(evaluator: E, bundle: CapabilityBundle) -> RuntimeResult<Self> {
        let store = LogStore::new();
        let mut bindings = bundle;
        bindings.extend(CapabilityBundle::log_bindings(&store))?;
        Ok(Self {
            evaluator,
            bindings,
            store,
            runs: 0,
        })
    }

    pub fn bindings(&self) -> &CapabilityBundle {
        &self.bindings
    }

    /// Handle to the log of the latest run
    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.store.entries()
    }

    pub fn clear_logs(&self) {
        self.store.clear();
    }

    /// Run `source` and return the full log of the run.
    ///
    /// Never fails: a failed run ends with an ERROR entry and no RESPONSE.
    /// A top-level error is left out only when an earlier ERROR entry (not
    /// any entry) already contains its message.
    pub fn run_script(&mut self, source: &str) -> Vec<LogEntry> {
        self.runs += 1;
        self.store.clear();
        let started = Instant::now();
        info!(run = self.runs, bytes = source.len(), "Running script");

        let capture = Rc::new(CaptureConsole {
            store: self.store.clone(),
            previous: console::current_sink(),
        });
        let outcome = {
            let _guard = install_console(capture);
            self.evaluator.evaluate(source, &self.bindings)
        };

        match outcome {
            Ok(value) => {
                let response = if value.is_nullish() {
                    Value::object(PropertyMap::new())
                } else {
                    value
                };
                let entry = self.store.append(safe_stringify(&response, &Indent::Spaces(2)), LogStatus::Response);
                debug!(id = %entry.id, "Recorded response");
            }
            Err(err) => {
                let message = failure_message(source, &err);
                if self.store.error_mentions(&message) {
                    debug!(%message, "Error already logged");
                } else {
                    let entry = self.store.append(message, LogStatus::Error);
                    debug!(id = %entry.id, "Recorded error");
                }
            }
        }

        let logs = self.store.entries();
        info!(
            run = self.runs,
            entries = logs.len(),
            success = self.store.has_response(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Script finished"
        );
        logs
    }
}

/// Message recorded for a failed run.
///
/// A thrown value contributes its `message`; errors raised by the
/// interpreter keep their name, and syntax errors also their position.
pub fn failure_message(source: &str, err: &ScriptError) -> String {
    match err {
        ScriptError::Thrown { .. } => {
            let message = err.message();
            if message.is_empty() {
                err.name().to_string()
            } else {
                message
            }
        }
        ScriptError::LexerError { .. } | ScriptError::ParserError { .. } => {
            let (line, column) = ErrorContext::new(source, err).line_col();
            format!("{}: {} (line {}, column {})", err.name(), err.message(), line, column)
        }
        ScriptError::Timeout { .. } | ScriptError::StepLimitExceeded { .. } | ScriptError::CallDepthExceeded { .. } => {
            err.message()
        }
        _ => format!("{}: {}", err.name(), err.message()),
    }
}
