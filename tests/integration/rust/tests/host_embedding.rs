//! Host Embedding Integration Tests
//!
//! Drives the engine the way an application embedding scripts does: host
//! services exposed as objects, configuration injected as values, and
//! script callbacks stored and invoked later.

use core_types::Value;
use script_engine::{Engine, Object, ScriptError};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

fn engine() -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    Engine::new().expect("engine should start")
}

fn render(args: &[Value]) -> String {
    args.iter()
        .map(|arg| match arg.as_str() {
            Some(text) => text.to_string(),
            None => arg.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Test: a console-like logger implemented by the host
#[test]
fn test_console_log_reaches_host() {
    let lines: Rc<RefCell<Vec<String>>> = Rc::default();
    let engine = engine();

    engine.with(|scope| {
        let console = scope.global_object().child(scope, "console").unwrap();
        let sink = lines.clone();
        console
            .register_function(scope, "log", move |_, _, args| {
                sink.borrow_mut().push(render(args));
                Ok(Value::Undefined)
            })
            .unwrap();
    });

    engine
        .evaluate("console.log('hello', 42); console.log([1, 2], true);", "console.js")
        .unwrap();
    assert_eq!(*lines.borrow(), vec!["hello 42".to_string(), "[1,2] true".to_string()]);
}

/// Test: JSON configuration injected as a global
#[test]
fn test_json_settings_visible_to_scripts() {
    let engine = engine();
    let settings = Value::from(serde_json::json!({
        "name": "demo",
        "limits": { "depth": 3, "ratio": 0.5 },
        "features": ["a", "b"]
    }));

    engine.with(|scope| {
        scope
            .global_object()
            .set_property(scope, "settings", &settings)
            .unwrap();
    });

    let result = engine
        .evaluate(
            "settings.name + ':' + (settings.limits.depth + 1) + ':' + settings.features.length",
            "settings.js",
        )
        .unwrap();
    assert_eq!(result, Value::from("demo:4:2"));

    let back = engine.with(|scope| scope.global_object().property(scope, "settings").unwrap());
    assert_eq!(back, settings);
}

/// Test: host -> script -> host round trip through a dotted call
#[test]
fn test_plugin_calls_back_into_host() {
    let recorded: Rc<RefCell<Vec<String>>> = Rc::default();
    let engine = engine();

    engine.with(|scope| {
        let host = scope.global_object().child(scope, "host").unwrap();
        let sink = recorded.clone();
        host.register_function(scope, "record", move |_, _, args| {
            sink.borrow_mut().push(render(args));
            Ok(Value::from(sink.borrow().len() as i64))
        })
        .unwrap();
    });

    engine
        .evaluate(
            "var plugin = { handle: function (event) { host.record(event.kind); return event.kind.length; } };",
            "plugin.js",
        )
        .unwrap();

    let mut event = HashMap::new();
    event.insert("kind".to_string(), Value::from("click"));
    let result = engine.call("plugin.handle", &[Value::from(event)]).unwrap();

    assert_eq!(result, Value::from(5));
    assert_eq!(*recorded.borrow(), vec!["click".to_string()]);
}

/// Test: a script callback kept by the host and invoked later
#[test]
fn test_stored_callback_invoked_later() {
    let subscriber: Rc<RefCell<Option<Object>>> = Rc::default();
    let engine = engine();

    engine.with(|scope| {
        let slot = subscriber.clone();
        scope
            .global_object()
            .register_function(scope, "subscribe", move |scope, _, args| {
                let callback = args.first().and_then(|arg| scope.to_object(arg));
                let accepted = callback.as_ref().is_some_and(Object::is_function);
                *slot.borrow_mut() = callback;
                Ok(Value::from(accepted))
            })
            .unwrap();
    });

    let accepted = engine
        .evaluate("subscribe(function (n) { return n + 1; })", "subscribe.js")
        .unwrap();
    assert_eq!(accepted, Value::from(true));

    engine.collect_garbage();
    let callback = subscriber.borrow().clone().expect("callback stored");
    let result = engine.with(|scope| callback.call(scope, &[Value::from(1)], None).unwrap());
    assert_eq!(result, Value::from(2));
}

/// Test: script files report failures against their path
#[test]
fn test_script_file_error_names_the_file() {
    let engine = engine();
    let mut file = tempfile::Builder::new().suffix(".js").tempfile().unwrap();
    writeln!(file, "var a = 1;\nthrow new Error('from file');").unwrap();

    let err = engine.evaluate_file(file.path()).unwrap_err();
    assert!(matches!(err, ScriptError::Runtime(_)));
    let text = err.to_string();
    let path = file.path().display().to_string();
    assert!(text.contains(&path), "message was {}", text);
    assert!(text.contains("from file"), "message was {}", text);
}
