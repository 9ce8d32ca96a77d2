//! Conversion between script values and JSON
//!
//! [`to_json`] follows the `JSON.stringify` rules: `undefined` and functions
//! are dropped from objects and become `null` in arrays, non-finite numbers
//! become `null`, and a BigInt leaf is an error unless the replacer turns it
//! into something else.

use crate::error::{ScriptError, Span};
use crate::value::{PropertyMap, Value};
use serde::Serialize;
use std::rc::Rc;

/// Nesting bound for conversions in both directions
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("Do not know how to serialize a BigInt")]
    BigInt,

    #[error("Converting circular structure to JSON")]
    Circular,

    #[error("Maximum nesting depth of {0} exceeded")]
    TooDeep(usize),

    #[error("{0}")]
    Parse(String),

    /// The replacer function itself failed
    #[error("{}", .0.message())]
    Replacer(ScriptError),
}

impl JsonError {
    /// The error a script observes from `JSON.stringify` / `JSON.parse`
    pub fn into_script_error(self, span: Span) -> ScriptError {
        match self {
            JsonError::Replacer(err) => err,
            JsonError::TooDeep(_) => ScriptError::range_error(span, self.to_string()),
            JsonError::Parse(message) => ScriptError::Thrown {
                span,
                value: Value::error_object("SyntaxError", &message),
            },
            other => ScriptError::type_error(span, other.to_string()),
        }
    }
}

/// `replacer(key, value)`, applied to every value before conversion
pub type Replacer<'a> = &'a mut dyn FnMut(&str, Value) -> Result<Value, JsonError>;

/// Identity replacer
pub fn no_replacer(_key: &str, value: Value) -> Result<Value, JsonError> {
    Ok(value)
}

/// Convert a value to JSON.
///
/// `Ok(None)` means the value has no JSON form (`undefined`, a function).
pub fn to_json(value: &Value, replacer: Replacer<'_>) -> Result<Option<serde_json::Value>, JsonError> {
    let mut walker = Walker {
        replacer,
        stack: Vec::new(),
    };
    walker.convert("", value.clone())
}

struct Walker<'r> {
    replacer: Replacer<'r>,
    /// Containers currently being converted, for cycle detection
    stack: Vec<*const ()>,
}

impl Walker<'_> {
    fn enter(&mut self, ptr: *const ()) -> Result<(), JsonError> {
        if self.stack.contains(&ptr) {
            return Err(JsonError::Circular);
        }
        if self.stack.len() >= MAX_DEPTH {
            return Err(JsonError::TooDeep(MAX_DEPTH));
        }
        self.stack.push(ptr);
        Ok(())
    }

    fn convert(&mut self, key: &str, value: Value) -> Result<Option<serde_json::Value>, JsonError> {
        let value = (self.replacer)(key, value)?;

        let json = match value {
            Value::Undefined | Value::Function(_) => return Ok(None),
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => number_to_json(n),
            Value::BigInt(_) => return Err(JsonError::BigInt),
            Value::String(s) => serde_json::Value::String(s),
            Value::Host(host) => host
                .to_json()
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
            Value::Array(items) => {
                self.enter(Rc::as_ptr(&items).cast())?;
                let snapshot = items.borrow().clone();
                let mut out = Vec::with_capacity(snapshot.len());
                for (i, item) in snapshot.into_iter().enumerate() {
                    out.push(self.convert(&i.to_string(), item)?.unwrap_or(serde_json::Value::Null));
                }
                self.stack.pop();
                serde_json::Value::Array(out)
            }
            Value::Object(props) => {
                self.enter(Rc::as_ptr(&props).cast())?;
                let snapshot = props.borrow().clone();
                let mut out = serde_json::Map::new();
                for (k, v) in snapshot {
                    if let Some(json) = self.convert(&k, v)? {
                        out.insert(k, json);
                    }
                }
                self.stack.pop();
                serde_json::Value::Object(out)
            }
        };
        Ok(Some(json))
    }
}

/// Integral numbers print without a fractional part
pub fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9.223_372_036_854_776e18 {
        // -0 prints as 0
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Indentation argument of `JSON.stringify`: spaces or a literal string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Indent {
    #[default]
    None,
    Spaces(usize),
    Text(String),
}

impl Indent {
    /// Interpret the third `JSON.stringify` argument
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) if *n >= 1.0 => Indent::Spaces((*n as usize).min(10)),
            Value::String(s) if !s.is_empty() => Indent::Text(s.chars().take(10).collect()),
            _ => Indent::None,
        }
    }

    fn unit(&self) -> Option<String> {
        match self {
            Indent::None => None,
            Indent::Spaces(n) => Some(" ".repeat(*n)),
            Indent::Text(s) => Some(s.clone()),
        }
    }
}

/// Render JSON text with the given indentation
pub fn write_json(json: &serde_json::Value, indent: &Indent) -> String {
    let Some(unit) = indent.unit() else {
        return json.to_string();
    };
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(unit.as_bytes());
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    match json.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(out).unwrap_or_else(|_| json.to_string()),
        Err(_) => json.to_string(),
    }
}

/// `JSON.stringify(value, replacer, indent)`
pub fn stringify(value: &Value, replacer: Replacer<'_>, indent: &Indent) -> Result<Option<String>, JsonError> {
    Ok(to_json(value, replacer)?.map(|json| write_json(&json, indent)))
}

/// Convert parsed JSON into script values
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::array(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            let props: PropertyMap = map.iter().map(|(k, v)| (k.clone(), from_json(v))).collect();
            Value::object(props)
        }
    }
}

/// `JSON.parse(text)`
pub fn parse(text: &str) -> Result<Value, JsonError> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|err| JsonError::Parse(format!("Unexpected token in JSON: {}", err)))?;
    Ok(from_json(&json))
}
