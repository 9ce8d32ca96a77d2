use crate::console::{install_console, ConsoleLevel, ConsoleSink};
use crate::error::ScriptError;
use crate::interpreter::{ExecutionLimits, Interpreter};
use crate::value::{HostObject, Value};
use crate::Result;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

fn eval(source: &str) -> Value {
    Interpreter::new().eval_source(source).unwrap()
}

fn eval_str(source: &str) -> String {
    eval(source).to_display_string()
}

fn eval_err(source: &str) -> ScriptError {
    Interpreter::new().eval_source(source).unwrap_err()
}

#[test]
fn test_arithmetic_and_strings() {
    assert_eq!(eval_str("return 1 + 2 * 3"), "7");
    assert_eq!(eval_str("return 'a' + 1 + 2"), "a12");
    assert_eq!(eval_str("return 7 % 3"), "1");
    assert_eq!(eval_str("return 2 ** 10"), "1024");
    assert_eq!(eval_str("return 0.1 + 0.2"), "0.30000000000000004");
    assert_eq!(eval_str("return 1 / 0"), "Infinity");
}

#[test]
fn test_bigint_arithmetic() {
    assert!(matches!(eval("return 2n ** 64n"), Value::BigInt(n) if n == 18446744073709551616));
    assert!(matches!(eval("return 7n / 2n"), Value::BigInt(3)));
    let err = eval_err("return 1n + 1");
    assert!(err.message().contains("Cannot mix BigInt"));
    assert!(matches!(eval_err("return 1n / 0n"), ScriptError::RangeError { .. }));
}

#[test]
fn test_equality() {
    assert_eq!(eval_str("return 1 == '1'"), "true");
    assert_eq!(eval_str("return 1 === '1'"), "false");
    assert_eq!(eval_str("return null == undefined"), "true");
    assert_eq!(eval_str("const a = {}; const b = a; return a === b && a !== {}"), "true");
}

#[test]
fn test_closures_capture_scope() {
    let source = r#"
        function counter() {
            let n = 0
            return () => ++n
        }
        const next = counter()
        next()
        next()
        return next()
    "#;
    assert_eq!(eval_str(source), "3");
}

#[test]
fn test_function_hoisting() {
    assert_eq!(eval_str("return double(21)\nfunction double(x) { return x * 2 }"), "42");
}

#[test]
fn test_default_and_rest_params() {
    assert_eq!(eval_str("const f = (a, b = 10, ...rest) => a + b + rest.length; return f(1)"), "11");
    assert_eq!(eval_str("const f = (a, b = 10, ...rest) => a + b + rest.length; return f(1, 2, 3, 4)"), "5");
}

#[test]
fn test_destructuring() {
    let source = r#"
        const { name, stats: { score }, ...others } = { name: "alice", stats: { score: 9 }, a: 1, b: 2 }
        const [first, , third, ...tail] = [1, 2, 3, 4, 5]
        return `${name}:${score}:${Object.keys(others).join("")}:${first}${third}:${tail}`
    "#;
    assert_eq!(eval_str(source), "alice:9:ab:13:4,5");
}

#[test]
fn test_loops() {
    let source = r#"
        let total = 0
        for (let i = 0; i < 10; i++) {
            if (i === 2) continue
            if (i === 6) break
            total += i
        }
        for (const x of [100, 200]) total += x
        for (const key in { a: 1, b: 2 }) total += key.length
        let n = 0
        while (n < 3) n++
        return total + n
    "#;
    // 0+1+3+4+5 = 13, +300, +2, +3
    assert_eq!(eval_str(source), "318");
}

#[test]
fn test_spread() {
    assert_eq!(eval_str("const a = [1, 2]; return [...a, 3, ...'xy']"), "1,2,3,x,y");
    assert_eq!(
        eval_str("const base = { a: 1, b: 2 }; const o = { ...base, b: 3 }; return JSON.stringify(o)"),
        r#"{"a":1,"b":3}"#
    );
    assert_eq!(eval_str("return Math.max(...[3, 9, 4])"), "9");
}

#[test]
fn test_optional_chaining_and_nullish() {
    assert_eq!(eval_str("const o = null; return o?.a"), "undefined");
    assert_eq!(eval_str("const o = { a: null }; return o.a ?? 'fallback'"), "fallback");
    assert_eq!(eval_str("const o = { a: 0 }; return o.a ?? 'fallback'"), "0");
    assert_eq!(eval_str("const o = {}; return o.missing?.()"), "undefined");
}

#[test]
fn test_reading_property_of_undefined() {
    let err = eval_err("const o = {}; return o.a.b");
    assert_eq!(err.message(), "Cannot read properties of undefined (reading 'b')");
    assert!(err.is_catchable());
}

#[test]
fn test_calling_non_function() {
    let err = eval_err("const api = {}; api.connect()");
    assert_eq!(err.message(), "api.connect is not a function");
}

#[test]
fn test_const_reassignment() {
    let err = eval_err("const a = 1; a = 2");
    assert!(matches!(err, ScriptError::TypeError { .. }));
    assert_eq!(err.message(), "Assignment to constant variable.");
}

#[test]
fn test_undeclared_identifier() {
    let err = eval_err("return missing + 1");
    assert!(matches!(err, ScriptError::ReferenceError { .. }));
    assert_eq!(eval_str("return typeof missing"), "undefined");
}

#[test]
fn test_throw_and_catch() {
    let source = r#"
        let log = []
        try {
            throw new Error("boom")
        } catch (e) {
            log.push(e.message)
        } finally {
            log.push("done")
        }
        try {
            null.x
        } catch (e) {
            log.push(e.name)
        }
        return log.join(",")
    "#;
    assert_eq!(eval_str(source), "boom,done,TypeError");
}

#[test]
fn test_uncaught_throw_keeps_value() {
    match eval_err("throw new Error('boom')") {
        err @ ScriptError::Thrown { .. } => assert_eq!(err.message(), "boom"),
        other => panic!("Expected thrown error, got {:?}", other),
    }
    assert_eq!(eval_err("throw 'plain'").message(), "plain");
}

#[test]
fn test_finally_overrides_return() {
    assert_eq!(eval_str("function f() { try { return 1 } finally { return 2 } } return f()"), "2");
}

#[test]
fn test_async_await_are_synchronous() {
    let source = r#"
        async function load() { return 5 }
        const value = await load()
        const all = await Promise.all([value, Promise.resolve(6)])
        return all.join("+")
    "#;
    assert_eq!(eval_str(source), "5+6");
}

#[test]
fn test_top_level_return_ends_run() {
    assert_eq!(eval_str("return 1\nthrow new Error('unreachable')"), "1");
}

#[test]
fn test_call_depth_limit_is_uncatchable() {
    let mut interp = Interpreter::with_limits(ExecutionLimits {
        timeout: None,
        max_steps: None,
        max_call_depth: 16,
        ..ExecutionLimits::default()
    });
    let err = interp
        .eval_source("function f() { return f() }\ntry { f() } catch (e) { return 'caught' }")
        .unwrap_err();
    assert!(matches!(err, ScriptError::CallDepthExceeded { limit: 16, .. }));
}

#[test]
fn test_step_limit_skips_finally() {
    let mut interp = Interpreter::with_limits(ExecutionLimits {
        timeout: None,
        max_steps: Some(500),
        max_call_depth: 16,
        ..ExecutionLimits::default()
    });
    interp.define_global("flag", Value::array(vec![]));
    let err = interp
        .eval_source("try { while (true) {} } finally { flag.push(1) }")
        .unwrap_err();
    assert!(matches!(err, ScriptError::StepLimitExceeded { .. }));
    let flag = interp.global("flag").unwrap();
    assert_eq!(flag.to_display_string(), "");
}

#[test]
fn test_globals_persist_between_runs() {
    let mut interp = Interpreter::new();
    interp.define_global("base", Value::Number(40.0));
    assert_eq!(interp.eval_source("return base + 2").unwrap().to_display_string(), "42");
    // script bindings do not leak into the next run
    interp.eval_source("const local = 1").unwrap();
    assert!(interp.eval_source("return local").is_err());
}

#[test]
fn test_native_globals() {
    let mut interp = Interpreter::new();
    interp.define_global(
        "twice",
        Value::native("twice", |interp, args| {
            let f = args.first().cloned().unwrap_or_default();
            interp.call(&f, &[])?;
            interp.call(&f, &[])
        }),
    );
    let value = interp.eval_source("let n = 0; twice(() => n++); return n").unwrap();
    assert_eq!(value.to_display_string(), "2");
}

#[derive(Debug)]
struct Counter {
    hits: RefCell<u32>,
}

impl HostObject for Counter {
    fn type_name(&self) -> &str {
        "Counter"
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "hits" => Some(Value::Number(f64::from(*self.hits.borrow()))),
            _ => None,
        }
    }

    fn call_method(&self, _interp: &mut Interpreter, name: &str, args: &[Value]) -> Option<Result<Value>> {
        match name {
            "hit" => {
                let by = args.first().map_or(1.0, Value::to_number) as u32;
                *self.hits.borrow_mut() += by;
                Some(Ok(Value::Undefined))
            }
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn test_host_objects() {
    let mut interp = Interpreter::new();
    interp.define_global("counter", Value::host(Counter { hits: RefCell::new(0) }));
    let value = interp
        .eval_source("counter.hit(); counter.hit(4); return counter.hits")
        .unwrap();
    assert_eq!(value.to_display_string(), "5");

    let err = interp.eval_source("counter.reset()").unwrap_err();
    assert_eq!(err.message(), "counter.reset is not a function");

    let counter = interp.global("counter").unwrap();
    assert_eq!(*counter.as_host::<Counter>().unwrap().hits.borrow(), 5);
}

struct Lines(RefCell<Vec<(ConsoleLevel, String)>>);

impl ConsoleSink for Lines {
    fn write(&self, level: ConsoleLevel, args: &[Value]) {
        self.0.borrow_mut().push((level, crate::console::format_args(args)));
    }
}

#[test]
fn test_console_reaches_installed_sink() {
    let lines = Rc::new(Lines(RefCell::new(Vec::new())));
    {
        let _guard = install_console(lines.clone());
        Interpreter::new()
            .eval_source("console.log('total', 3, { ok: true }); console.error('bad')")
            .unwrap();
    }
    let lines = lines.0.borrow();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], (ConsoleLevel::Log, r#"total 3 {"ok":true}"#.to_string()));
    assert_eq!(lines[1].0, ConsoleLevel::Error);
}

#[test]
fn test_json_builtins() {
    assert_eq!(eval_str(r#"return JSON.parse('{"a":[1,2]}').a[1]"#), "2");
    assert_eq!(
        eval_str("return JSON.stringify({ n: 5n }, (k, v) => typeof v === 'bigint' ? Number(v) : v)"),
        r#"{"n":5}"#
    );
    let err = eval_err("return JSON.stringify({ n: 5n })");
    assert_eq!(err.message(), "Do not know how to serialize a BigInt");
}

#[test]
fn test_bigint_conversions() {
    assert_eq!(eval_str("return typeof BigInt(10)"), "bigint");
    assert_eq!(eval_str("return Number(9007199254740993n)"), "9007199254740992");
    assert_eq!(eval_str("return String(12345678901234567890n)"), "12345678901234567890");
}
