//! Built-in methods of strings, arrays, numbers and BigInts

use crate::error::{Result, ScriptError, Span};
use crate::interpreter::Interpreter;
use crate::value::{format_number, Value};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

/// Dispatch `receiver.name(args)` to a built-in method.
///
/// Returns `None` when the receiver's type has no such method.
pub fn call(interp: &mut Interpreter, receiver: &Value, name: &str, args: &[Value]) -> Option<Result<Value>> {
    match receiver {
        Value::String(s) => string_method(interp, s, name, args),
        Value::Array(items) => array_method(interp, items, name, args),
        Value::Number(n) => number_method(*n, name, args),
        Value::BigInt(n) => match name {
            "toString" | "toLocaleString" => Some(Ok(Value::String(n.to_string()))),
            _ => None,
        },
        Value::Bool(b) => match name {
            "toString" => Some(Ok(Value::String(b.to_string()))),
            _ => None,
        },
        Value::Object(props) => match name {
            "hasOwnProperty" => {
                let key = arg(args, 0).to_display_string();
                Some(Ok(Value::Bool(props.borrow().contains_key(&key))))
            }
            "toString" => Some(Ok(Value::String(receiver.to_display_string()))),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or_default()
}

/// Integer argument, `default` when absent or undefined
fn int_arg(args: &[Value], index: usize, default: i64) -> i64 {
    match args.get(index) {
        None | Some(Value::Undefined) => default,
        Some(value) => {
            let n = value.to_number();
            if n.is_nan() {
                0
            } else {
                n.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64
            }
        }
    }
}

/// Resolve a possibly negative relative index against `len`
fn relative_index(index: i64, len: usize) -> usize {
    let len = len as i64;
    let resolved = if index < 0 { (len + index).max(0) } else { index.min(len) };
    resolved as usize
}

fn string_method(interp: &Interpreter, s: &str, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let chars: Vec<char> = s.chars().collect();
    let needle = || arg(args, 0).to_display_string();

    let value = match name {
        "includes" => Value::Bool(s.contains(&needle())),
        "startsWith" => Value::Bool(s.starts_with(&needle())),
        "endsWith" => Value::Bool(s.ends_with(&needle())),
        "indexOf" => {
            let needle = needle();
            let index = s.find(&needle).map(|byte| s[..byte].chars().count() as f64).unwrap_or(-1.0);
            Value::Number(index)
        }
        "charAt" => {
            let index = int_arg(args, 0, 0);
            let c = usize::try_from(index).ok().and_then(|i| chars.get(i));
            Value::String(c.map(char::to_string).unwrap_or_default())
        }
        "slice" => {
            let start = relative_index(int_arg(args, 0, 0), chars.len());
            let end = relative_index(int_arg(args, 1, chars.len() as i64), chars.len());
            Value::String(chars.get(start..end.max(start)).map(String::from_iter).unwrap_or_default())
        }
        "substring" => {
            let clamp = |i: i64| i.clamp(0, chars.len() as i64) as usize;
            let a = clamp(int_arg(args, 0, 0));
            let b = clamp(int_arg(args, 1, chars.len() as i64));
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Value::String(chars[start..end].iter().collect())
        }
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "trimStart" => Value::String(s.trim_start().to_string()),
        "trimEnd" => Value::String(s.trim_end().to_string()),
        "split" => {
            let parts: Vec<Value> = match args.first() {
                None | Some(Value::Undefined) => vec![Value::string(s)],
                Some(sep) => {
                    let sep = sep.to_display_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str()).map(Value::string).collect()
                    }
                }
            };
            Value::array(parts)
        }
        "replace" => Value::String(s.replacen(&needle(), &arg(args, 1).to_display_string(), 1)),
        "replaceAll" => {
            let (needle, replacement) = (needle(), arg(args, 1).to_display_string());
            let grown = s.matches(needle.as_str()).count().saturating_mul(replacement.len());
            if let Err(err) = interp.check_string_len(s.len().saturating_add(grown), Span::default()) {
                return Some(Err(err));
            }
            Value::String(s.replace(&needle, &replacement))
        }
        "padStart" | "padEnd" => {
            let target = usize::try_from(int_arg(args, 0, 0)).unwrap_or(0);
            let fill = match args.get(1) {
                None | Some(Value::Undefined) => " ".to_string(),
                Some(fill) => fill.to_display_string(),
            };
            if target <= chars.len() || fill.is_empty() {
                Value::string(s)
            } else if let Err(err) = interp.check_string_len(target, Span::default()) {
                return Some(Err(err));
            } else {
                let padding: String = fill.chars().cycle().take(target - chars.len()).collect();
                if name == "padStart" {
                    Value::String(format!("{}{}", padding, s))
                } else {
                    Value::String(format!("{}{}", s, padding))
                }
            }
        }
        "repeat" => {
            let count = int_arg(args, 0, 0);
            let Ok(count) = usize::try_from(count) else {
                return Some(Err(ScriptError::range_error(
                    Span::default(),
                    format!("Invalid count value: {}", count),
                )));
            };
            if let Err(err) = interp.check_string_len(s.len().saturating_mul(count), Span::default()) {
                return Some(Err(err));
            }
            Value::String(s.repeat(count))
        }
        "concat" => {
            let mut out = s.to_string();
            for value in args {
                out.push_str(&value.to_display_string());
                if let Err(err) = interp.check_string_len(out.len(), Span::default()) {
                    return Some(Err(err));
                }
            }
            Value::String(out)
        }
        "toString" => Value::string(s),
        _ => return None,
    };
    Some(Ok(value))
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Result<Value>> {
    let value = match name {
        "toFixed" => {
            let digits = int_arg(args, 0, 0);
            if !(0..=100).contains(&digits) {
                return Some(Err(ScriptError::range_error(
                    Span::default(),
                    "toFixed() digits argument must be between 0 and 100",
                )));
            }
            if n.abs() >= 1e21 || !n.is_finite() {
                Value::String(format_number(n))
            } else {
                Value::String(format!("{:.*}", digits as usize, n))
            }
        }
        "toString" => match args.first() {
            None | Some(Value::Undefined) => Value::String(format_number(n)),
            Some(radix) => {
                let radix = radix.to_number() as u32;
                if !(2..=36).contains(&radix) {
                    return Some(Err(ScriptError::range_error(
                        Span::default(),
                        "toString() radix must be between 2 and 36",
                    )));
                }
                Value::String(integer_to_radix(n, radix))
            }
        },
        _ => return None,
    };
    Some(Ok(value))
}

/// Integral part of `n` in the given radix
fn integer_to_radix(n: f64, radix: u32) -> String {
    if radix == 10 || !n.is_finite() {
        return format_number(n);
    }
    let negative = n < 0.0;
    let mut value = n.abs().trunc() as u128;
    let mut digits = Vec::new();
    loop {
        let digit = (value % u128::from(radix)) as u32;
        digits.push(char::from_digit(digit, radix).unwrap_or('0'));
        value /= u128::from(radix);
        if value == 0 {
            break;
        }
    }
    if negative {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

fn callback(args: &[Value], method: &str) -> Result<Value> {
    match args.first() {
        Some(func @ Value::Function(_)) => Ok(func.clone()),
        Some(other) => Err(ScriptError::type_error(
            Span::default(),
            format!("{} is not a function", other.to_display_string()),
        )),
        None => Err(ScriptError::type_error(
            Span::default(),
            format!("undefined is not a function (Array.prototype.{})", method),
        )),
    }
}

fn array_method(
    interp: &mut Interpreter,
    items: &Rc<RefCell<Vec<Value>>>,
    name: &str,
    args: &[Value],
) -> Option<Result<Value>> {
    let this = Value::Array(Rc::clone(items));

    let result = match name {
        "push" => {
            let mut items = items.borrow_mut();
            if let Err(err) = interp.check_array_len(items.len().saturating_add(args.len()), Span::default()) {
                return Some(Err(err));
            }
            items.extend(args.iter().cloned());
            Ok(Value::Number(items.len() as f64))
        }
        "pop" => Ok(items.borrow_mut().pop().unwrap_or_default()),
        "shift" => {
            let mut items = items.borrow_mut();
            Ok(if items.is_empty() { Value::Undefined } else { items.remove(0) })
        }
        "unshift" => {
            let mut items = items.borrow_mut();
            if let Err(err) = interp.check_array_len(items.len().saturating_add(args.len()), Span::default()) {
                return Some(Err(err));
            }
            for (i, value) in args.iter().enumerate() {
                items.insert(i, value.clone());
            }
            Ok(Value::Number(items.len() as f64))
        }
        "join" | "toString" => {
            let sep = match args.first() {
                Some(sep) if name == "join" && !matches!(sep, Value::Undefined) => sep.to_display_string(),
                _ => ",".to_string(),
            };
            let parts = items
                .borrow()
                .iter()
                .map(|item| match item {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>();
            let len = parts
                .iter()
                .fold(0usize, |len, part| len.saturating_add(part.len()))
                .saturating_add(sep.len().saturating_mul(parts.len().saturating_sub(1)));
            if let Err(err) = interp.check_string_len(len, Span::default()) {
                return Some(Err(err));
            }
            Ok(Value::String(parts.join(&sep)))
        }
        "includes" => {
            let needle = arg(args, 0);
            let found = items.borrow().iter().any(|item| match (item, &needle) {
                (Value::Number(a), Value::Number(b)) if a.is_nan() && b.is_nan() => true,
                (item, needle) => item.strict_equals(needle),
            });
            Ok(Value::Bool(found))
        }
        "indexOf" => {
            let needle = arg(args, 0);
            let index = items.borrow().iter().position(|item| item.strict_equals(&needle));
            Ok(Value::Number(index.map_or(-1.0, |i| i as f64)))
        }
        "slice" => {
            let items = items.borrow();
            let start = relative_index(int_arg(args, 0, 0), items.len());
            let end = relative_index(int_arg(args, 1, items.len() as i64), items.len());
            Ok(Value::array(items.get(start..end.max(start)).map(<[Value]>::to_vec).unwrap_or_default()))
        }
        "concat" => {
            let added = args.iter().fold(0usize, |len, value| match value {
                Value::Array(other) => len.saturating_add(other.borrow().len()),
                _ => len.saturating_add(1),
            });
            if let Err(err) = interp.check_array_len(items.borrow().len().saturating_add(added), Span::default()) {
                return Some(Err(err));
            }
            let mut out = items.borrow().clone();
            for value in args {
                match value {
                    Value::Array(other) => out.extend(other.borrow().iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }
        "reverse" => {
            items.borrow_mut().reverse();
            Ok(this)
        }
        "flat" => {
            let depth = int_arg(args, 0, 1);
            let snapshot = items.borrow().clone();
            let mut out = Vec::with_capacity(snapshot.len());
            flatten(interp, &snapshot, depth, 0, &mut out).map(|()| Value::array(out))
        }
        "sort" => sort(interp, items, args).map(|()| this),
        "map" | "filter" | "forEach" | "find" | "findIndex" | "some" | "every" => {
            iterate_with(interp, items, name, args)
        }
        "reduce" => reduce(interp, items, args),
        _ => return None,
    };
    Some(result)
}

/// Deepest array nesting `flat` descends into
const MAX_FLAT_NESTING: usize = 256;

fn flatten(interp: &Interpreter, items: &[Value], depth: i64, level: usize, out: &mut Vec<Value>) -> Result<()> {
    for item in items {
        match item {
            Value::Array(inner) if depth > 0 => {
                if level >= MAX_FLAT_NESTING {
                    return Err(ScriptError::range_error(Span::default(), "Maximum call stack size exceeded"));
                }
                let inner = inner.borrow().clone();
                flatten(interp, &inner, depth - 1, level + 1, out)?;
            }
            other => {
                interp.check_array_len(out.len() + 1, Span::default())?;
                out.push(other.clone());
            }
        }
    }
    Ok(())
}

/// Callback-driven methods: `f(item, index, array)` over a snapshot
fn iterate_with(interp: &mut Interpreter, items: &Rc<RefCell<Vec<Value>>>, name: &str, args: &[Value]) -> Result<Value> {
    let func = callback(args, name)?;
    let this = Value::Array(Rc::clone(items));
    let snapshot = items.borrow().clone();
    let mut mapped = Vec::new();

    for (i, item) in snapshot.into_iter().enumerate() {
        let result = interp.call(&func, &[item.clone(), Value::Number(i as f64), this.clone()])?;
        match name {
            "map" => mapped.push(result),
            "filter" if result.is_truthy() => mapped.push(item),
            "find" if result.is_truthy() => return Ok(item),
            "findIndex" if result.is_truthy() => return Ok(Value::Number(i as f64)),
            "some" if result.is_truthy() => return Ok(Value::Bool(true)),
            "every" if !result.is_truthy() => return Ok(Value::Bool(false)),
            _ => {}
        }
    }

    Ok(match name {
        "map" | "filter" => Value::array(mapped),
        "findIndex" => Value::Number(-1.0),
        "some" => Value::Bool(false),
        "every" => Value::Bool(true),
        _ => Value::Undefined,
    })
}

fn reduce(interp: &mut Interpreter, items: &Rc<RefCell<Vec<Value>>>, args: &[Value]) -> Result<Value> {
    let func = callback(args, "reduce")?;
    let this = Value::Array(Rc::clone(items));
    let snapshot = items.borrow().clone();
    let mut iter = snapshot.into_iter().enumerate();

    let mut acc = match args.get(1) {
        Some(initial) => initial.clone(),
        None => match iter.next() {
            Some((_, first)) => first,
            None => {
                return Err(ScriptError::type_error(
                    Span::default(),
                    "Reduce of empty array with no initial value",
                ))
            }
        },
    };

    for (i, item) in iter {
        acc = interp.call(&func, &[acc, item, Value::Number(i as f64), this.clone()])?;
    }
    Ok(acc)
}

fn sort(interp: &mut Interpreter, items: &Rc<RefCell<Vec<Value>>>, args: &[Value]) -> Result<()> {
    let mut sorted = items.borrow().clone();

    match args.first() {
        Some(func @ Value::Function(_)) => {
            let mut failure = None;
            sorted.sort_by(|a, b| {
                if failure.is_some() {
                    return Ordering::Equal;
                }
                match interp.call(func, &[a.clone(), b.clone()]) {
                    Ok(result) => result.to_number().partial_cmp(&0.0).unwrap_or(Ordering::Equal),
                    Err(err) => {
                        failure = Some(err);
                        Ordering::Equal
                    }
                }
            });
            if let Some(err) = failure {
                return Err(err);
            }
        }
        // default order compares string forms, undefined last
        _ => sorted.sort_by(|a, b| match (a, b) {
            (Value::Undefined, Value::Undefined) => Ordering::Equal,
            (Value::Undefined, _) => Ordering::Greater,
            (_, Value::Undefined) => Ordering::Less,
            _ => a.to_display_string().cmp(&b.to_display_string()),
        }),
    }

    *items.borrow_mut() = sorted;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Value {
        Interpreter::new().eval_source(source).unwrap()
    }

    fn eval_str(source: &str) -> String {
        eval(source).to_display_string()
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(eval_str("return 'Hello'.padStart(8, '*')"), "***Hello");
        assert_eq!(eval_str("return 'a,b,c'.split(',').length"), "3");
        assert_eq!(eval_str("return 'trueplay'.slice(-4)"), "play");
        assert_eq!(eval_str("return 'abc'.substring(2, 0)"), "ab");
        assert_eq!(eval_str("return 'x-y-z'.replace('-', '+')"), "x+y-z");
    }

    #[test]
    fn test_array_callbacks() {
        assert_eq!(eval_str("return [1, 2, 3].map(x => x * 2).join('-')"), "2-4-6");
        assert_eq!(eval_str("return [1, 2, 3, 4].filter(x => x % 2 === 0)"), "2,4");
        assert_eq!(eval_str("return [1, 2, 3].reduce((a, b) => a + b, 10)"), "16");
        assert_eq!(eval_str("return [5, 1, 4].sort((a, b) => a - b)"), "1,4,5");
        assert_eq!(eval_str("return [[1], [2, [3]]].flat()"), "1,2,3");
    }

    #[test]
    fn test_reduce_empty_array() {
        let err = Interpreter::new().eval_source("[].reduce((a, b) => a + b)").unwrap_err();
        assert!(err.message().contains("Reduce of empty array"));
    }

    #[test]
    fn test_number_methods() {
        assert_eq!(eval_str("return (3.14159).toFixed(2)"), "3.14");
        assert_eq!(eval_str("return (255).toString(16)"), "ff");
        assert_eq!(eval_str("return 12n.toString()"), "12");
    }
}
