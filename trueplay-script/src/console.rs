//! The `console` output hook
//!
//! Scripts write through `console.log` and friends to the thread's ambient
//! [`ConsoleSink`]. An embedder swaps the sink with [`install_console`]; the
//! returned [`ConsoleGuard`] puts the previous sink back when dropped.

use crate::json::{self, Indent, JsonError};
use crate::value::{format_number, Value};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl ConsoleLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        }
    }

    pub const ALL: [ConsoleLevel; 5] = [
        ConsoleLevel::Log,
        ConsoleLevel::Info,
        ConsoleLevel::Warn,
        ConsoleLevel::Error,
        ConsoleLevel::Debug,
    ];
}

/// Receiver of console output
pub trait ConsoleSink {
    fn write(&self, level: ConsoleLevel, args: &[Value]);
}

/// Default sink: forwards console lines to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingConsole;

impl ConsoleSink for TracingConsole {
    fn write(&self, level: ConsoleLevel, args: &[Value]) {
        let line = format_args(args);
        match level {
            ConsoleLevel::Error => tracing::error!(target: "trueplay::console", "{}", line),
            ConsoleLevel::Warn => tracing::warn!(target: "trueplay::console", "{}", line),
            ConsoleLevel::Debug => tracing::debug!(target: "trueplay::console", "{}", line),
            ConsoleLevel::Log | ConsoleLevel::Info => tracing::info!(target: "trueplay::console", "{}", line),
        }
    }
}

thread_local! {
    static SINK: RefCell<Option<Rc<dyn ConsoleSink>>> = const { RefCell::new(None) };
}

/// Restores the previously installed sink on drop
#[must_use = "the console hook is removed as soon as the guard is dropped"]
pub struct ConsoleGuard {
    previous: Option<Rc<dyn ConsoleSink>>,
    // the guard belongs to the thread whose sink it replaced
    _not_send: PhantomData<*const ()>,
}

impl Drop for ConsoleGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        SINK.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Make `sink` the ambient console for this thread until the guard drops
pub fn install_console(sink: Rc<dyn ConsoleSink>) -> ConsoleGuard {
    let previous = SINK.with(|slot| slot.borrow_mut().replace(sink));
    ConsoleGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// The sink console calls currently reach
pub fn current_sink() -> Rc<dyn ConsoleSink> {
    SINK.with(|slot| slot.borrow().clone())
        .unwrap_or_else(|| Rc::new(TracingConsole))
}

/// Whether a sink other than the default is installed
pub fn is_hooked() -> bool {
    SINK.with(|slot| slot.borrow().is_some())
}

/// Send one console call to the ambient sink
pub fn emit(level: ConsoleLevel, args: &[Value]) {
    // clone out of the slot so the sink may itself log
    let sink = current_sink();
    sink.write(level, args);
}

/// Space-joined rendering of console arguments
pub fn format_args(args: &[Value]) -> String {
    args.iter().map(inspect).collect::<Vec<_>>().join(" ")
}

/// Human-readable form of a single value; BigInts keep their `n` suffix
pub fn inspect(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        Value::BigInt(n) => format!("{}n", n),
        Value::Array(_) | Value::Object(_) | Value::Host(_) => {
            let mut replacer = |_: &str, v: Value| -> Result<Value, JsonError> {
                Ok(match v {
                    Value::BigInt(n) => Value::String(format!("{}n", n)),
                    other => other,
                })
            };
            match json::stringify(value, &mut replacer, &Indent::None) {
                Ok(Some(text)) => text,
                _ => value.to_display_string(),
            }
        }
        other => other.to_display_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(RefCell<Vec<String>>);

    impl ConsoleSink for Recorder {
        fn write(&self, level: ConsoleLevel, args: &[Value]) {
            self.0
                .borrow_mut()
                .push(format!("{}:{}", level.as_str(), format_args(args)));
        }
    }

    #[test]
    fn test_guard_restores_previous_sink() {
        assert!(!is_hooked());
        let outer = Rc::new(Recorder(RefCell::new(Vec::new())));
        {
            let _outer_guard = install_console(outer.clone());
            let inner = Rc::new(Recorder(RefCell::new(Vec::new())));
            {
                let _inner_guard = install_console(inner.clone());
                emit(ConsoleLevel::Info, &[Value::string("inner")]);
            }
            emit(ConsoleLevel::Warn, &[Value::string("outer"), Value::Number(1.0)]);
            assert_eq!(inner.0.borrow().as_slice(), ["info:inner"]);
        }
        assert_eq!(outer.0.borrow().as_slice(), ["warn:outer 1"]);
        assert!(!is_hooked());
    }

    #[test]
    fn test_inspect() {
        let value = Value::object_from([("big", Value::BigInt(7)), ("ok", Value::Bool(true))]);
        assert_eq!(inspect(&value), r#"{"big":"7n","ok":true}"#);
        assert_eq!(inspect(&Value::BigInt(5)), "5n");
    }
}
