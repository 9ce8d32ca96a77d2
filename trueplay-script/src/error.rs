use std::fmt;

use crate::value::Value;

// Re-export Span from shared types
pub use trueplay_types::Span;

/// Errors that can occur while parsing or running a script
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("SyntaxError at {span:?}: {message}")]
    LexerError { span: Span, message: String },

    #[error("SyntaxError at {span:?}: {message}")]
    ParserError { span: Span, message: String },

    #[error("TypeError at {span:?}: {message}")]
    TypeError { span: Span, message: String },

    #[error("ReferenceError at {span:?}: {message}")]
    ReferenceError { span: Span, message: String },

    #[error("RangeError at {span:?}: {message}")]
    RangeError { span: Span, message: String },

    #[error("Uncaught {} at {span:?}", describe_thrown(.value))]
    Thrown { span: Span, value: Value },

    #[error("Execution timed out after {limit_ms}ms")]
    Timeout { span: Span, limit_ms: u64 },

    #[error("Execution exceeded {limit} steps")]
    StepLimitExceeded { span: Span, limit: u64 },

    #[error("Maximum call depth of {limit} exceeded")]
    CallDepthExceeded { span: Span, limit: usize },
}

pub type Result<T> = std::result::Result<T, ScriptError>;

impl ScriptError {
    pub fn type_error(span: Span, message: impl Into<String>) -> Self {
        ScriptError::TypeError {
            span,
            message: message.into(),
        }
    }

    pub fn reference_error(span: Span, message: impl Into<String>) -> Self {
        ScriptError::ReferenceError {
            span,
            message: message.into(),
        }
    }

    pub fn range_error(span: Span, message: impl Into<String>) -> Self {
        ScriptError::RangeError {
            span,
            message: message.into(),
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ScriptError::LexerError { span, .. }
            | ScriptError::ParserError { span, .. }
            | ScriptError::TypeError { span, .. }
            | ScriptError::ReferenceError { span, .. }
            | ScriptError::RangeError { span, .. }
            | ScriptError::Thrown { span, .. }
            | ScriptError::Timeout { span, .. }
            | ScriptError::StepLimitExceeded { span, .. }
            | ScriptError::CallDepthExceeded { span, .. } => *span,
        }
    }

    /// Attach `span` to an error raised without position (from a native function)
    pub fn or_span(mut self, at: Span) -> Self {
        let slot = match &mut self {
            ScriptError::LexerError { span, .. }
            | ScriptError::ParserError { span, .. }
            | ScriptError::TypeError { span, .. }
            | ScriptError::ReferenceError { span, .. }
            | ScriptError::RangeError { span, .. }
            | ScriptError::Thrown { span, .. }
            | ScriptError::Timeout { span, .. }
            | ScriptError::StepLimitExceeded { span, .. }
            | ScriptError::CallDepthExceeded { span, .. } => span,
        };
        if *slot == Span::default() {
            *slot = at;
        }
        self
    }

    /// Whether a `try/catch` block in the script may intercept this error.
    ///
    /// Execution limits are not catchable, otherwise a script could swallow
    /// its own timeout and keep running.
    pub fn is_catchable(&self) -> bool {
        matches!(
            self,
            ScriptError::TypeError { .. }
                | ScriptError::ReferenceError { .. }
                | ScriptError::RangeError { .. }
                | ScriptError::Thrown { .. }
        )
    }

    /// Error name as a script would see it through `e.name`
    pub fn name(&self) -> &'static str {
        match self {
            ScriptError::LexerError { .. } | ScriptError::ParserError { .. } => "SyntaxError",
            ScriptError::TypeError { .. } => "TypeError",
            ScriptError::ReferenceError { .. } => "ReferenceError",
            ScriptError::RangeError { .. } => "RangeError",
            ScriptError::Thrown { .. } => "Error",
            ScriptError::Timeout { .. }
            | ScriptError::StepLimitExceeded { .. }
            | ScriptError::CallDepthExceeded { .. } => "LimitError",
        }
    }

    /// The message a script would see through `e.message`
    pub fn message(&self) -> String {
        match self {
            ScriptError::LexerError { message, .. }
            | ScriptError::ParserError { message, .. }
            | ScriptError::TypeError { message, .. }
            | ScriptError::ReferenceError { message, .. }
            | ScriptError::RangeError { message, .. } => message.clone(),
            ScriptError::Thrown { value, .. } => thrown_message(value),
            ScriptError::Timeout { limit_ms, .. } => {
                format!("Execution timed out after {}ms", limit_ms)
            }
            ScriptError::StepLimitExceeded { limit, .. } => {
                format!("Execution exceeded {} steps", limit)
            }
            ScriptError::CallDepthExceeded { limit, .. } => {
                format!("Maximum call depth of {} exceeded", limit)
            }
        }
    }

    /// Convert a catchable error into the value bound by `catch (e)`
    pub fn into_value(self) -> Value {
        match self {
            ScriptError::Thrown { value, .. } => value,
            other => Value::error_object(other.name(), &other.message()),
        }
    }
}

/// `e.message` of a thrown value, falling back to its string form
fn thrown_message(value: &Value) -> String {
    match value.get_own("message") {
        Some(Value::String(message)) => message,
        _ => value.to_display_string(),
    }
}

fn describe_thrown(value: &Value) -> String {
    value.to_display_string()
}

/// Display context for better error messages
pub struct ErrorContext<'a> {
    pub source: &'a str,
    pub error: &'a ScriptError,
}

impl<'a> ErrorContext<'a> {
    pub fn new(source: &'a str, error: &'a ScriptError) -> Self {
        Self { source, error }
    }

    /// Get the source line containing the error
    pub fn source_line(&self) -> Option<&'a str> {
        let start = self.start();

        let line_start = self.source[..start]
            .rfind('\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);

        let line_end = self.source[start..]
            .find('\n')
            .map(|pos| start + pos)
            .unwrap_or(self.source.len());

        Some(&self.source[line_start..line_end])
    }

    /// Get line and column numbers (1-indexed)
    pub fn line_col(&self) -> (usize, usize) {
        let start = self.start();

        let line = self.source[..start].matches('\n').count() + 1;
        let line_start = self.source[..start]
            .rfind('\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        let col = self.source[line_start..start].chars().count() + 1;

        (line, col)
    }

    fn start(&self) -> usize {
        let mut start = self.error.span().start.min(self.source.len());
        while !self.source.is_char_boundary(start) {
            start -= 1;
        }
        start
    }
}

impl<'a> fmt::Display for ErrorContext<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (line, col) = self.line_col();
        writeln!(f, "{} at line {}, column {}:", self.error.name(), line, col)?;
        writeln!(f, "  {}", self.error.message())?;

        if let Some(source_line) = self.source_line() {
            writeln!(f)?;
            writeln!(f, "  {}", source_line)?;
            let width = source_line.chars().count();
            let col_start = (col - 1).min(width);
            let marks = self.error.span().len().min(width - col_start).max(1);
            writeln!(f, "  {}{}", " ".repeat(col_start), "^".repeat(marks))?;
        }

        Ok(())
    }
}
