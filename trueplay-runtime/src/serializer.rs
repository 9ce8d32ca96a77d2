//! Display serialization of script values
//!
//! [`safe_stringify`] never fails: BigInts are narrowed to numbers (values
//! beyond 2^53 lose precision), a BigInt-specific failure falls back to an
//! explicit coercion pass, and anything else becomes an `{"error": ...}`
//! object.

use std::rc::Rc;
use tracing::warn;
use trueplay_script::json::{self, Indent, JsonError, Replacer, MAX_DEPTH};
use trueplay_script::{PropertyMap, Value};

/// Replacer narrowing BigInt values to numbers
pub fn bigint_replacer(_key: &str, value: Value) -> Result<Value, JsonError> {
    Ok(match value {
        Value::BigInt(n) => Value::Number(n as f64),
        other => other,
    })
}

/// Serialize `value` as JSON text for display
pub fn safe_stringify(value: &Value, indent: &Indent) -> String {
    stringify_with(value, indent, &mut bigint_replacer)
}

fn stringify_with(value: &Value, indent: &Indent, primary: Replacer<'_>) -> String {
    match json::stringify(value, primary, indent) {
        Ok(text) => text.unwrap_or_else(|| "null".to_string()),
        Err(JsonError::BigInt) => {
            warn!("BigInt survived the replacer, coercing before serializing again");
            let coerced = coerce_bigints(value);
            match json::stringify(&coerced, &mut json::no_replacer, indent) {
                Ok(text) => text.unwrap_or_else(|| "null".to_string()),
                Err(err) => {
                    warn!(error = %err, "Serializing after BigInt coercion failed");
                    error_object(&format!("Failed to stringify object with BigInt values: {}", err))
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "Serializing value failed");
            error_object(&format!("Failed to stringify: {}", err))
        }
    }
}

fn error_object(message: &str) -> String {
    serde_json::json!({ "error": message }).to_string()
}

/// Deep copy of `value` with every BigInt leaf narrowed to a number.
///
/// Plain arrays and objects are copied; host objects and functions are kept
/// as they are. A container that is already being copied is kept by
/// reference, so a cycle survives for the serializer to report.
pub fn coerce_bigints(value: &Value) -> Value {
    let mut path = Vec::new();
    coerce(value, &mut path)
}

fn coerce(value: &Value, path: &mut Vec<*const ()>) -> Value {
    match value {
        Value::BigInt(n) => Value::Number(*n as f64),
        Value::Array(items) => {
            let ptr: *const () = Rc::as_ptr(items).cast();
            if path.contains(&ptr) || path.len() >= MAX_DEPTH {
                return value.clone();
            }
            path.push(ptr);
            let copied = items.borrow().iter().map(|item| coerce(item, path)).collect();
            path.pop();
            Value::array(copied)
        }
        Value::Object(props) => {
            let ptr: *const () = Rc::as_ptr(props).cast();
            if path.contains(&ptr) || path.len() >= MAX_DEPTH {
                return value.clone();
            }
            path.push(ptr);
            let copied: PropertyMap = props
                .borrow()
                .iter()
                .map(|(key, item)| (key.clone(), coerce(item, path)))
                .collect();
            path.pop();
            Value::object(copied)
        }
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Value {
        Value::object_from([
            ("n", Value::BigInt(9007199254740993)),
            ("list", Value::array(vec![Value::BigInt(-2), Value::string("x")])),
        ])
    }

    #[test]
    fn test_bigint_narrowed() {
        let value = Value::object_from([("n", Value::BigInt(9007199254740993))]);
        assert_eq!(safe_stringify(&value, &Indent::None), r#"{"n":9007199254740992}"#);
    }

    #[test]
    fn test_fallback_coerces_when_primary_rejects_bigint() {
        let text = stringify_with(&nested(), &Indent::None, &mut json::no_replacer);
        assert_eq!(text, r#"{"n":9007199254740992,"list":[-2,"x"]}"#);
    }

    #[test]
    fn test_other_failures_become_error_object() {
        let value = Value::object(PropertyMap::new());
        if let Value::Object(props) = &value {
            props.borrow_mut().insert("me".into(), value.clone());
        }
        let text = safe_stringify(&value, &Indent::None);
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            parsed["error"],
            "Failed to stringify: Converting circular structure to JSON"
        );
        if let Value::Object(props) = &value {
            props.borrow_mut().clear();
        }
    }

    #[test]
    fn test_cycle_survives_coercion() {
        let value = Value::array(vec![Value::BigInt(1)]);
        if let Value::Array(items) = &value {
            items.borrow_mut().push(value.clone());
        }
        let text = stringify_with(&value, &Indent::None, &mut json::no_replacer);
        assert!(text.starts_with(r#"{"error":"Failed to stringify object with BigInt values"#));
        if let Value::Array(items) = &value {
            items.borrow_mut().clear();
        }
    }

    #[test]
    fn test_pretty_output() {
        insta::assert_snapshot!(safe_stringify(&nested(), &Indent::Spaces(2)), @r###"
        {
          "n": 9007199254740992,
          "list": [
            -2,
            "x"
          ]
        }
        "###);
    }

    #[test]
    fn test_undefined_has_no_json_form() {
        assert_eq!(safe_stringify(&Value::Undefined, &Indent::None), "null");
    }
}
