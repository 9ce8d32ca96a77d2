//! Integration tests for the script runner harness

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use trueplay_runtime::{CapabilityBundle, ExecutionLimits, LogEntry, LogStatus, ScriptRunner};
use trueplay_script::console::{self, ConsoleLevel, ConsoleSink};
use trueplay_script::{install_console, Value};

fn runner() -> ScriptRunner {
    ScriptRunner::new(CapabilityBundle::new(), ExecutionLimits::default()).unwrap()
}

fn statuses(logs: &[LogEntry]) -> Vec<LogStatus> {
    logs.iter().map(|entry| entry.status).collect()
}

struct Recorder(RefCell<Vec<String>>);

impl ConsoleSink for Recorder {
    fn write(&self, _level: ConsoleLevel, args: &[Value]) {
        self.0.borrow_mut().push(console::format_args(args));
    }
}

#[test]
fn test_return_value_is_single_response() {
    let mut runner = runner();
    let logs = runner.run_script(r#"return { a: 1, b: [true, null, "x"], c: { d: 2.5 } }"#);

    assert_eq!(statuses(&logs), [LogStatus::Response]);
    let parsed: serde_json::Value = serde_json::from_str(&logs[0].message).unwrap();
    assert_eq!(
        parsed,
        serde_json::json!({ "a": 1, "b": [true, null, "x"], "c": { "d": 2.5 } })
    );
}

#[test]
fn test_no_return_value_is_empty_object() {
    let mut runner = runner();
    let logs = runner.run_script("const x = 1");
    assert_eq!(statuses(&logs), [LogStatus::Response]);
    assert_eq!(logs[0].message, "{}");
}

#[test]
fn test_thrown_error_is_single_error_entry() {
    let mut runner = runner();
    let logs = runner.run_script(r#"throw new Error("boom")"#);

    assert_eq!(statuses(&logs), [LogStatus::Error]);
    assert_eq!(logs[0].message, "boom");
}

#[test]
fn test_console_lines_precede_outcome() {
    let mut runner = runner();
    let logs = runner.run_script(
        r#"
        console.log("fine", 1, null, undefined)
        console.log("an error occurred")
        console.info({ big: 5n })
        return 7
        "#,
    );

    assert_eq!(
        statuses(&logs),
        [LogStatus::Success, LogStatus::Error, LogStatus::Success, LogStatus::Response]
    );
    assert_eq!(logs[0].message, "fine 1 null undefined");
    assert_eq!(logs[2].message, r#"{"big":5}"#);
    assert_eq!(logs[3].message, "7");
}

#[test]
fn test_each_run_starts_from_a_clear_log() {
    let mut runner = runner();
    let first = runner.run_script(r#"console.log("from a"); return 1"#);
    assert_eq!(first.len(), 2);

    let second = runner.run_script(r#"console.log("from b"); return 2"#);
    assert!(second.iter().all(|entry| !entry.message.contains("from a")));
    assert_eq!(second[0].message, "from b");
    assert_eq!(runner.logs(), second);
}

#[test]
fn test_console_hook_restored_after_every_run() {
    let outer = Rc::new(Recorder(RefCell::new(Vec::new())));
    let _guard = install_console(outer.clone());
    let mut runner = runner();

    runner.run_script(r#"console.log("ok"); return 1"#);
    runner.run_script(r#"console.log("before throw"); throw new Error("nope")"#);

    // lines are forwarded to the sink that was active before each run
    assert_eq!(outer.0.borrow().as_slice(), ["ok", "before throw"]);

    console::emit(ConsoleLevel::Log, &[Value::string("after")]);
    assert_eq!(outer.0.borrow().last().map(String::as_str), Some("after"));
    assert_eq!(runner.logs().len(), 2);
}

#[test]
fn test_hook_restored_after_limit_violation() {
    let limits = ExecutionLimits {
        timeout: Some(Duration::from_millis(50)),
        max_steps: None,
        ..ExecutionLimits::default()
    };
    let mut runner = ScriptRunner::new(CapabilityBundle::new(), limits).unwrap();
    assert!(!console::is_hooked());

    let logs = runner.run_script("console.log('spinning'); while (true) {}");
    assert_eq!(statuses(&logs), [LogStatus::Success, LogStatus::Error]);
    assert_eq!(logs[1].message, "Execution timed out after 50ms");
    assert!(!console::is_hooked());
}

#[test]
fn test_uncatchable_step_limit() {
    let limits = ExecutionLimits {
        max_steps: Some(1_000),
        ..ExecutionLimits::default()
    };
    let mut runner = ScriptRunner::new(CapabilityBundle::new(), limits).unwrap();
    let logs = runner.run_script("try { while (true) {} } catch (e) { return 'caught' }");
    assert_eq!(statuses(&logs), [LogStatus::Error]);
    assert_eq!(logs[0].message, "Execution exceeded 1000 steps");
}

#[test]
fn test_bigint_response_is_narrowed() {
    let mut runner = runner();
    let logs = runner.run_script("return { n: 9007199254740993n }");

    assert_eq!(statuses(&logs), [LogStatus::Response]);
    let parsed: serde_json::Value = serde_json::from_str(&logs[0].message).unwrap();
    assert_eq!(parsed, serde_json::json!({ "n": 9007199254740992u64 }));
}

#[test]
fn test_identical_errors_logged_once() {
    let mut runner = runner();
    let logs = runner.run_script(
        r#"
        try {
            throw new Error("error: quota")
        } catch (e) {
            console.log(e.message)
        }
        throw new Error("error: quota")
        "#,
    );

    assert_eq!(statuses(&logs), [LogStatus::Error]);
    assert_eq!(logs[0].message, "error: quota");
}

#[test]
fn test_add_log_binding_writes_to_the_run_log() {
    let mut runner = runner();
    let logs = runner.run_script(r#"addLog("\nmanual", LogStatus.ERROR); return null"#);

    assert_eq!(statuses(&logs), [LogStatus::Error, LogStatus::Response]);
    assert_eq!(logs[0].message, "manual");
    assert_eq!(logs[1].message, "{}");
}

fn sized_runner(max_len: usize) -> ScriptRunner {
    let limits = ExecutionLimits {
        max_collection_len: max_len,
        max_string_len: max_len,
        ..ExecutionLimits::default()
    };
    ScriptRunner::new(CapabilityBundle::new(), limits).unwrap()
}

#[test]
fn test_huge_arrays_are_range_errors() {
    let mut runner = runner();
    for source in [
        "const a = []; a.length = 1e18",
        "const a = []; a[1e15] = 1",
        "return Array.from({ length: 1e12 }).length",
    ] {
        let logs = runner.run_script(source);
        assert_eq!(statuses(&logs), [LogStatus::Error], "{}", source);
        assert_eq!(logs[0].message, "RangeError: Invalid array length", "{}", source);
    }
}

#[test]
fn test_huge_strings_are_range_errors() {
    let mut runner = runner();
    for source in [
        "return 'ab'.repeat(1e18)",
        "return 'x'.padStart(1e12)",
        "return 'x'.padEnd(1e12, 'ab')",
    ] {
        let logs = runner.run_script(source);
        assert_eq!(statuses(&logs), [LogStatus::Error], "{}", source);
        assert_eq!(logs[0].message, "RangeError: Invalid string length", "{}", source);
    }
}

#[test]
fn test_size_errors_are_catchable() {
    let mut runner = runner();
    let logs = runner.run_script(
        r#"
        try {
            'ab'.repeat(1e18)
        } catch (e) {
            return e.name + ': ' + e.message
        }
        "#,
    );
    assert_eq!(statuses(&logs), [LogStatus::Response]);
    assert_eq!(logs[0].message, "\"RangeError: Invalid string length\"");
}

#[test]
fn test_doubling_growth_hits_the_limits() {
    let mut runner = sized_runner(1_000);
    let cases = [
        ("let a = [1]; while (true) { a.push(...a) }", "RangeError: Invalid array length"),
        ("let a = [1]; while (true) { a = a.concat(a) }", "RangeError: Invalid array length"),
        ("let a = [1]; while (true) { a = [...a, ...a] }", "RangeError: Invalid array length"),
        ("let s = 'ab'; while (true) { s += s }", "RangeError: Invalid string length"),
        ("let s = 'ab'; while (true) { s = `${s}${s}` }", "RangeError: Invalid string length"),
        ("const a = Array.from({ length: 600 }); return a.join('--')", "RangeError: Invalid string length"),
    ];
    for (source, message) in cases {
        let logs = runner.run_script(source);
        assert_eq!(statuses(&logs), [LogStatus::Error], "{}", source);
        assert_eq!(logs[0].message, message, "{}", source);
    }

    let logs = runner.run_script("return 'ab'.repeat(500).length");
    assert_eq!(logs[0].message, "1000");
}

#[test]
fn test_cyclic_arrays_join_as_empty() {
    let mut runner = runner();
    let logs = runner.run_script("const a = [1]; a.push(a); return String(a)");
    assert_eq!(statuses(&logs), [LogStatus::Response]);
    assert_eq!(logs[0].message, "\"1,\"");

    let logs = runner.run_script("const a = [1]; a.push(a); return a.flat(Infinity).length");
    assert_eq!(statuses(&logs), [LogStatus::Error]);
    assert_eq!(logs[0].message, "RangeError: Maximum call stack size exceeded");
}

#[test]
fn test_deep_nesting_is_a_syntax_error() {
    let mut runner = runner();
    let sources = [
        format!("return {}1{}", "(".repeat(100_000), ")".repeat(100_000)),
        format!("return {}", vec!["1"; 300_000].join("+")),
        format!("return {}{}", "[".repeat(100_000), "]".repeat(100_000)),
        format!("return {}true", "!".repeat(100_000)),
        format!("{}{}", "{".repeat(100_000), "}".repeat(100_000)),
        format!("const o = {{}}; return o{}", ".a".repeat(100_000)),
    ];
    for source in &sources {
        let logs = runner.run_script(source);
        assert_eq!(statuses(&logs), [LogStatus::Error]);
        assert!(
            logs[0].message.starts_with("SyntaxError: Nesting deeper than 128 levels"),
            "{}",
            logs[0].message
        );
    }

    let logs = runner.run_script(&format!("return {}", vec!["1"; 60].join(" + ")));
    assert_eq!(logs[0].message, "60");
}
