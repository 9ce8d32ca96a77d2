//! Global objects and functions available to every script

use crate::console::{self, ConsoleLevel};
use crate::error::{Result, ScriptError, Span};
use crate::interpreter::{keys_of, Interpreter};
use crate::json::{self, Indent, JsonError};
use crate::methods::arg;
use crate::value::{format_number, HostObject, PropertyMap, Value};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::any::Any;

/// Install the standard globals into `interp`
pub fn install(interp: &mut Interpreter) {
    interp.define_global("console", console_object());
    interp.define_global("Math", math_object());
    interp.define_global("JSON", json_object());
    interp.define_global("Object", object_namespace());
    interp.define_global("Array", array_namespace());
    interp.define_global("Promise", promise_object());
    interp.define_global("Date", date_constructor());

    interp.define_global("String", Value::native("String", |_, args| {
        Ok(Value::String(match args.first() {
            Some(value) => value.to_display_string(),
            None => String::new(),
        }))
    }));
    interp.define_global("Number", number_constructor());
    interp.define_global("Boolean", Value::native("Boolean", |_, args| {
        Ok(Value::Bool(arg(args, 0).is_truthy()))
    }));
    interp.define_global("BigInt", Value::native("BigInt", |_, args| to_bigint(&arg(args, 0)).map(Value::BigInt)));

    interp.define_global("parseInt", Value::native("parseInt", |_, args| {
        let radix = match args.get(1) {
            None | Some(Value::Undefined) => 10,
            Some(radix) => radix.to_number() as u32,
        };
        Ok(Value::Number(parse_int(&arg(args, 0).to_display_string(), radix)))
    }));
    interp.define_global("parseFloat", Value::native("parseFloat", |_, args| {
        Ok(Value::Number(parse_float(&arg(args, 0).to_display_string())))
    }));
    interp.define_global("isNaN", Value::native("isNaN", |_, args| {
        Ok(Value::Bool(arg(args, 0).to_number().is_nan()))
    }));
    interp.define_global("isFinite", Value::native("isFinite", |_, args| {
        Ok(Value::Bool(arg(args, 0).to_number().is_finite()))
    }));
    interp.define_global("NaN", Value::Number(f64::NAN));
    interp.define_global("Infinity", Value::Number(f64::INFINITY));

    for name in ["Error", "TypeError", "RangeError", "SyntaxError", "ReferenceError"] {
        interp.define_global(name, error_constructor(name));
    }
}

fn console_object() -> Value {
    let mut props = PropertyMap::new();
    for level in ConsoleLevel::ALL {
        props.insert(
            level.as_str().to_string(),
            Value::native(level.as_str(), move |_, args| {
                console::emit(level, args);
                Ok(Value::Undefined)
            }),
        );
    }
    Value::object(props)
}

fn math_fn(props: &mut PropertyMap, name: &str, f: fn(f64) -> f64) {
    props.insert(
        name.to_string(),
        Value::native(name, move |_, args| Ok(Value::Number(f(arg(args, 0).to_number())))),
    );
}

fn math_object() -> Value {
    let mut props = PropertyMap::new();
    props.insert("PI".into(), Value::Number(std::f64::consts::PI));
    props.insert("E".into(), Value::Number(std::f64::consts::E));

    math_fn(&mut props, "floor", f64::floor);
    math_fn(&mut props, "ceil", f64::ceil);
    math_fn(&mut props, "abs", f64::abs);
    math_fn(&mut props, "sqrt", f64::sqrt);
    math_fn(&mut props, "trunc", f64::trunc);
    // rounds half up, unlike f64::round
    math_fn(&mut props, "round", |n| (n + 0.5).floor());
    math_fn(&mut props, "sign", |n| if n.is_nan() || n == 0.0 { n } else { n.signum() });

    props.insert(
        "pow".into(),
        Value::native("pow", |_, args| {
            Ok(Value::Number(arg(args, 0).to_number().powf(arg(args, 1).to_number())))
        }),
    );
    props.insert(
        "max".into(),
        Value::native("max", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.max(n)
                }
            })))
        }),
    );
    props.insert(
        "min".into(),
        Value::native("min", |_, args| {
            Ok(Value::Number(args.iter().map(Value::to_number).fold(f64::INFINITY, |acc, n| {
                if acc.is_nan() || n.is_nan() {
                    f64::NAN
                } else {
                    acc.min(n)
                }
            })))
        }),
    );

    Value::object(props)
}

fn json_object() -> Value {
    let stringify = Value::native("stringify", |interp, args| {
        let value = arg(args, 0);
        let indent = Indent::from_value(&arg(args, 2));
        let text = match args.get(1) {
            Some(replacer @ Value::Function(_)) => {
                let mut call = |key: &str, v: Value| -> std::result::Result<Value, JsonError> {
                    interp
                        .call(replacer, &[Value::string(key), v])
                        .map_err(JsonError::Replacer)
                };
                json::stringify(&value, &mut call, &indent)
            }
            _ => json::stringify(&value, &mut json::no_replacer, &indent),
        };
        match text {
            Ok(Some(text)) => Ok(Value::String(text)),
            Ok(None) => Ok(Value::Undefined),
            Err(err) => Err(err.into_script_error(Span::default())),
        }
    });
    let parse = Value::native("parse", |_, args| {
        json::parse(&arg(args, 0).to_display_string()).map_err(|err| err.into_script_error(Span::default()))
    });
    Value::object_from([("stringify", stringify), ("parse", parse)])
}

fn object_namespace() -> Value {
    let keys = Value::native("keys", |_, args| {
        Ok(Value::array(keys_of(&arg(args, 0)).into_iter().map(Value::String).collect()))
    });
    let values = Value::native("values", |interp, args| {
        let target = arg(args, 0);
        let mut out = Vec::new();
        for key in keys_of(&target) {
            out.push(interp.get_property(&target, &key, Span::default())?);
        }
        Ok(Value::array(out))
    });
    let entries = Value::native("entries", |interp, args| {
        let target = arg(args, 0);
        let mut out = Vec::new();
        for key in keys_of(&target) {
            let value = interp.get_property(&target, &key, Span::default())?;
            out.push(Value::array(vec![Value::String(key), value]));
        }
        Ok(Value::array(out))
    });
    let assign = Value::native("assign", |_, args| {
        let target = arg(args, 0);
        let Value::Object(props) = &target else {
            return Err(ScriptError::type_error(
                Span::default(),
                "Object.assign target must be an object",
            ));
        };
        for source in args.iter().skip(1) {
            if let Value::Object(source) = source {
                let source = source.borrow().clone();
                props.borrow_mut().extend(source);
            }
        }
        Ok(target)
    });
    let freeze = Value::native("freeze", |_, args| Ok(arg(args, 0)));
    Value::object_from([
        ("keys", keys),
        ("values", values),
        ("entries", entries),
        ("assign", assign),
        ("freeze", freeze),
    ])
}

fn array_namespace() -> Value {
    let is_array = Value::native("isArray", |_, args| Ok(Value::Bool(matches!(arg(args, 0), Value::Array(_)))));
    let from = Value::native("from", |interp, args| {
        let source = arg(args, 0);
        let items = match &source {
            Value::Array(items) => items.borrow().clone(),
            Value::String(s) => s.chars().map(|c| Value::String(c.to_string())).collect(),
            other => match other.get_own("length") {
                Some(len) => {
                    let len = len.to_number().max(0.0);
                    if len > interp.limits().max_collection_len as f64 {
                        return Err(ScriptError::range_error(Span::default(), "Invalid array length"));
                    }
                    vec![Value::Undefined; len as usize]
                }
                None => Vec::new(),
            },
        };
        match args.get(1) {
            Some(mapper @ Value::Function(_)) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(interp.call(mapper, &[item, Value::Number(i as f64)])?);
                }
                Ok(Value::array(out))
            }
            _ => Ok(Value::array(items)),
        }
    });
    Value::native_with_props(
        "Array",
        |_, args| Ok(Value::array(args.to_vec())),
        [("isArray".to_string(), is_array), ("from".to_string(), from)]
            .into_iter()
            .collect(),
    )
}

/// Host calls settle synchronously, so promises are their own values
fn promise_object() -> Value {
    let resolve = Value::native("resolve", |_, args| Ok(arg(args, 0)));
    let all = Value::native("all", |_, args| match arg(args, 0) {
        Value::Array(items) => Ok(Value::array(items.borrow().clone())),
        other => Err(ScriptError::type_error(
            Span::default(),
            format!("{} is not iterable", other.type_of()),
        )),
    });
    let reject = Value::native("reject", |_, args| {
        Err(ScriptError::Thrown {
            span: Span::default(),
            value: arg(args, 0),
        })
    });
    Value::object_from([("resolve", resolve), ("all", all), ("reject", reject)])
}

fn number_constructor() -> Value {
    let mut props = PropertyMap::new();
    props.insert(
        "isInteger".into(),
        Value::native("isInteger", |_, args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite() && n.fract() == 0.0)))
        }),
    );
    props.insert(
        "isSafeInteger".into(),
        Value::native("isSafeInteger", |_, args| {
            Ok(Value::Bool(matches!(
                arg(args, 0),
                Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER
            )))
        }),
    );
    props.insert(
        "isFinite".into(),
        Value::native("isFinite", |_, args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_finite())))
        }),
    );
    props.insert(
        "isNaN".into(),
        Value::native("isNaN", |_, args| {
            Ok(Value::Bool(matches!(arg(args, 0), Value::Number(n) if n.is_nan())))
        }),
    );
    props.insert("MAX_SAFE_INTEGER".into(), Value::Number(MAX_SAFE_INTEGER));
    props.insert("MIN_SAFE_INTEGER".into(), Value::Number(-MAX_SAFE_INTEGER));

    Value::native_with_props(
        "Number",
        |_, args| {
            Ok(Value::Number(match args.first() {
                Some(value) => value.to_number(),
                None => 0.0,
            }))
        },
        props,
    )
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn error_constructor(name: &'static str) -> Value {
    Value::native(name, move |_, args| {
        let message = match args.first() {
            None | Some(Value::Undefined) => String::new(),
            Some(message) => message.to_display_string(),
        };
        Ok(Value::error_object(name, &message))
    })
}

/// `BigInt(value)`
pub fn to_bigint(value: &Value) -> Result<i128> {
    match value {
        Value::BigInt(n) => Ok(*n),
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Ok(*n as i128),
        Value::Number(n) => Err(ScriptError::range_error(
            Span::default(),
            format!(
                "The number {} cannot be converted to a BigInt because it is not an integer",
                format_number(*n)
            ),
        )),
        Value::String(s) => {
            let trimmed = s.trim();
            let parsed = if trimmed.is_empty() {
                Some(0)
            } else if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                i128::from_str_radix(hex, 16).ok()
            } else {
                trimmed.parse::<i128>().ok()
            };
            parsed.ok_or_else(|| ScriptError::Thrown {
                span: Span::default(),
                value: Value::error_object("SyntaxError", &format!("Cannot convert {} to a BigInt", s)),
            })
        }
        other => Err(ScriptError::type_error(
            Span::default(),
            format!("Cannot convert {} to a BigInt", other.to_display_string()),
        )),
    }
}

/// `parseInt`: leading sign and digits of the radix, `NaN` if none
fn parse_int(text: &str, radix: u32) -> f64 {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (radix, rest) = match (radix, rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X"))) {
        (16 | 0, Some(hex)) => (16, hex),
        (0, None) => (10, rest),
        _ => (radix, rest),
    };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut result = 0.0;
    let mut seen = false;
    for c in rest.chars() {
        let Some(digit) = c.to_digit(radix) else {
            break;
        };
        result = result * f64::from(radix) + f64::from(digit);
        seen = true;
    }
    match (seen, negative) {
        (false, _) => f64::NAN,
        (true, true) => -result,
        (true, false) => result,
    }
}

/// `parseFloat`: longest numeric prefix
fn parse_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    if trimmed.starts_with("Infinity") || trimmed.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if trimmed.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E') || (*i == 0 && matches!(c, '+' | '-')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    // shrink until the prefix parses, e.g. "1e" or "1.2.3"
    (1..=end)
        .rev()
        .find_map(|len| trimmed[..len].parse::<f64>().ok())
        .map_or(f64::NAN, |n| n)
}

/// `Date` values, backed by a UTC timestamp in milliseconds
#[derive(Debug, Clone, Copy)]
pub struct DateValue {
    millis: i64,
}

impl DateValue {
    pub fn now() -> Self {
        Self {
            millis: Utc::now().timestamp_millis(),
        }
    }

    fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.millis).single()
    }

    pub fn to_iso_string(&self) -> String {
        self.datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| "Invalid Date".to_string())
    }
}

impl HostObject for DateValue {
    fn type_name(&self) -> &str {
        "Date"
    }

    fn call_method(&self, _interp: &mut Interpreter, name: &str, _args: &[Value]) -> Option<Result<Value>> {
        let value = match name {
            "getTime" | "valueOf" => Value::Number(self.millis as f64),
            "toISOString" | "toJSON" => Value::String(self.to_iso_string()),
            "toString" => Value::String(
                self.datetime()
                    .map(|dt| dt.to_rfc2822())
                    .unwrap_or_else(|| "Invalid Date".to_string()),
            ),
            "getFullYear" => Value::Number(self.datetime().map_or(f64::NAN, |dt| f64::from(chrono::Datelike::year(&dt)))),
            _ => return None,
        };
        Some(Ok(value))
    }

    fn to_json(&self) -> Option<serde_json::Value> {
        Some(serde_json::Value::String(self.to_iso_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn date_constructor() -> Value {
    let now = Value::native("now", |_, _| Ok(Value::Number(Utc::now().timestamp_millis() as f64)));
    Value::native_with_props(
        "Date",
        |_, args| {
            let date = match args.first() {
                Some(Value::Number(millis)) => DateValue { millis: *millis as i64 },
                Some(Value::String(text)) => match DateTime::parse_from_rfc3339(text) {
                    Ok(dt) => DateValue {
                        millis: dt.timestamp_millis(),
                    },
                    Err(_) => DateValue { millis: i64::MIN },
                },
                _ => DateValue::now(),
            };
            Ok(Value::host(date))
        },
        [("now".to_string(), now)].into_iter().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("42px", 10), 42.0);
        assert_eq!(parse_int("  -0x1f", 0), -31.0);
        assert_eq!(parse_int("ff", 16), 255.0);
        assert!(parse_int("px", 10).is_nan());
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(parse_float("3.25kg"), 3.25);
        assert_eq!(parse_float("1e3"), 1000.0);
        assert_eq!(parse_float("1.5.2"), 1.5);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn test_to_bigint() {
        assert_eq!(to_bigint(&Value::Number(12.0)).unwrap(), 12);
        assert_eq!(to_bigint(&Value::string("123456789012345678901234")).unwrap(), 123456789012345678901234);
        assert!(matches!(to_bigint(&Value::Number(1.5)), Err(ScriptError::RangeError { .. })));
    }

    #[test]
    fn test_date_json() {
        let date = DateValue { millis: 0 };
        assert_eq!(date.to_iso_string(), "1970-01-01T00:00:00.000Z");
    }
}
