use crate::ast::FunctionDecl;
use crate::env::Env;
use crate::error::Result;
use crate::interpreter::Interpreter;
use indexmap::IndexMap;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Deepest array nesting rendered by `String(value)`
const MAX_DISPLAY_NESTING: usize = 256;

/// Signature of a native function: the interpreter and the call arguments
pub type NativeFn = Rc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value>>;

/// Ordered property map of a script object
pub type PropertyMap = IndexMap<String, Value>;

/// A runtime value
///
/// Arrays and objects are shared references: cloning a `Value` clones the
/// handle, not the contents.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    BigInt(i128),
    String(String),
    Array(Rc<RefCell<Vec<Value>>>),
    Object(Rc<RefCell<PropertyMap>>),
    Function(Rc<Function>),
    /// Opaque object supplied by the embedder
    Host(Rc<dyn HostObject>),
}

/// Object implemented on the Rust side and exposed to scripts.
///
/// Scripts see properties through [`HostObject::get`] and call methods
/// through [`HostObject::call_method`]; returning `None` from either means
/// the member does not exist.
pub trait HostObject {
    fn type_name(&self) -> &str;

    fn get(&self, _name: &str) -> Option<Value> {
        None
    }

    fn call_method(&self, _interp: &mut Interpreter, _name: &str, _args: &[Value]) -> Option<Result<Value>> {
        None
    }

    /// JSON form used by `JSON.stringify`, like a `toJSON` method
    fn to_json(&self) -> Option<serde_json::Value> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// A callable value
pub enum Function {
    /// Script function with its captured scope
    Closure { decl: Rc<FunctionDecl>, env: Env },
    Native(NativeFunction),
}

pub struct NativeFunction {
    pub name: String,
    pub func: NativeFn,
    /// Static members, such as `Number.isInteger`
    pub props: PropertyMap,
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::Closure { decl, .. } => decl.name.as_deref().unwrap_or(""),
            Function::Native(native) => &native.name,
        }
    }
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: PropertyMap) -> Self {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    /// Object from `(key, value)` pairs, keeping their order
    pub fn object_from<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::object(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn native<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> Result<Value> + 'static,
    {
        Value::native_with_props(name, func, PropertyMap::new())
    }

    pub fn native_with_props<F>(name: impl Into<String>, func: F, props: PropertyMap) -> Self
    where
        F: Fn(&mut Interpreter, &[Value]) -> Result<Value> + 'static,
    {
        Value::Function(Rc::new(Function::Native(NativeFunction {
            name: name.into(),
            func: Rc::new(func),
            props,
        })))
    }

    pub fn host(object: impl HostObject + 'static) -> Self {
        Value::Host(Rc::new(object))
    }

    /// Error object as built by `new Error(message)`
    pub fn error_object(name: &str, message: &str) -> Self {
        Value::object_from([("name", Value::string(name)), ("message", Value::string(message))])
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Array(_) | Value::Object(_) | Value::Host(_) => "object",
            Value::Function(_) => "function",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_host<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Host(host) => host.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Numeric conversion used by arithmetic on non-BigInt operands
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::BigInt(n) => *n as f64,
            Value::String(s) => string_to_number(s),
            Value::Array(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [single] => single.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// `String(value)`
    pub fn to_display_string(&self) -> String {
        self.display_within(&mut Vec::new())
    }

    /// Arrays already being joined (or nested too deep) render as empty
    fn display_within(&self, path: &mut Vec<*const ()>) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::BigInt(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(items) => {
                let ptr = Rc::as_ptr(items) as *const ();
                if path.contains(&ptr) || path.len() >= MAX_DISPLAY_NESTING {
                    return String::new();
                }
                path.push(ptr);
                let text = items
                    .borrow()
                    .iter()
                    .map(|item| match item {
                        Value::Undefined | Value::Null => String::new(),
                        other => other.display_within(path),
                    })
                    .collect::<Vec<_>>()
                    .join(",");
                path.pop();
                text
            }
            Value::Object(props) => {
                let props = props.borrow();
                match (props.get("name"), props.get("message")) {
                    (Some(Value::String(name)), Some(Value::String(message))) if name.ends_with("Error") => {
                        if message.is_empty() {
                            name.clone()
                        } else {
                            format!("{}: {}", name, message)
                        }
                    }
                    _ => "[object Object]".to_string(),
                }
            }
            Value::Function(func) => format!("function {}() {{ [native code] }}", func.name()),
            Value::Host(host) => format!("[object {}]", host.type_name()),
        }
    }

    /// Own property lookup on objects, without prototype semantics
    pub fn get_own(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(props) => props.borrow().get(key).cloned(),
            Value::Host(host) => host.get(key),
            _ => None,
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Host(a), Value::Host(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::BigInt(a), Value::Number(b)) | (Value::Number(b), Value::BigInt(a)) => (*a as f64) == *b,
            (Value::BigInt(a), Value::String(s)) | (Value::String(s), Value::BigInt(a)) => {
                s.trim().parse::<i128>().is_ok_and(|parsed| parsed == *a)
            }
            (Value::Number(_) | Value::String(_) | Value::Bool(_), Value::Number(_) | Value::String(_) | Value::Bool(_)) => {
                if let (Value::String(a), Value::String(b)) = (self, other) {
                    return a == b;
                }
                self.to_number() == other.to_number()
            }
            (Value::Array(_) | Value::Object(_), Value::Number(_) | Value::String(_) | Value::Bool(_)) => {
                Value::String(self.to_display_string()).loose_equals(other)
            }
            (Value::Number(_) | Value::String(_) | Value::Bool(_), Value::Array(_) | Value::Object(_)) => {
                self.loose_equals(&Value::String(other.to_display_string()))
            }
            _ => self.strict_equals(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Array(items) => f.debug_list().entries(items.borrow().iter()).finish(),
            Value::Object(props) => f.debug_map().entries(props.borrow().iter()).finish(),
            Value::Function(func) => write!(f, "[Function {}]", func.name()),
            Value::Host(host) => write!(f, "[{}]", host.type_name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

/// `Number(string)`: whitespace-trimmed decimal or hex, empty is zero
pub fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|v| v as f64).unwrap_or(f64::NAN);
    }
    match trimmed {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if trimmed.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) => {
            trimmed.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Render a number the way scripts print it
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let abs = n.abs();
    if abs >= 1e21 || abs < 1e-6 {
        // shortest exponent form, `1e+21` style
        let raw = format!("{:e}", n);
        return match raw.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
            _ => raw,
        };
    }

    if n.fract() == 0.0 {
        return format!("{}", n as i128);
    }
    format!("{}", n)
}
