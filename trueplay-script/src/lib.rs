//! # trueplay script
//!
//! The embedded language playground snippets are written in: a
//! JavaScript-flavoured statement language with closures, objects and arrays
//! with reference semantics, BigInt literals, template strings and
//! `try/catch`.
//!
//! A snippet is run as a function body, so a top-level `return` produces the
//! run's result:
//!
//! ```
//! use trueplay_script::{Interpreter, Value};
//!
//! let mut interp = Interpreter::new();
//! let value = interp.eval_source("const xs = [1, 2, 3]; return xs.map(x => x * 2)").unwrap();
//! assert_eq!(value.to_display_string(), "2,4,6");
//! ```
//!
//! Embedders inject capabilities with [`Interpreter::define_global`] (native
//! functions and [`HostObject`]s) and capture `console` output by installing
//! a [`ConsoleSink`].

pub mod ast;
pub mod builtins;
pub mod console;
pub mod env;
pub mod error;
pub mod interpreter;
pub mod json;
pub mod lexer;
pub mod methods;
pub mod parser;
pub mod value;

#[cfg(test)]
mod tests;

// Re-export key types
pub use ast::Program;
pub use console::{install_console, ConsoleGuard, ConsoleLevel, ConsoleSink, TracingConsole};
pub use error::{ErrorContext, Result, ScriptError};
pub use interpreter::{ExecutionLimits, Interpreter, MAX_CALL_DEPTH};
pub use json::{Indent, JsonError};
pub use lexer::{tokenize, Lexer, SpannedToken, Token};
pub use parser::{parse, Parser, MAX_NESTING_DEPTH};
pub use value::{format_number, Function, HostObject, NativeFn, PropertyMap, Value};

// Re-export shared types from trueplay-types
pub use trueplay_types::Span;

/// Parse script source into a program
pub fn parse_source(source: &str) -> Result<Program> {
    let tokens = tokenize(source)?;
    parse(&tokens)
}

/// Run script source with the standard globals and default limits
pub fn execute(source: &str) -> Result<Value> {
    let mut interpreter = Interpreter::new();
    interpreter.eval_source(source)
}
