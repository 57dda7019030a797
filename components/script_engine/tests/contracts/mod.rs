//! Contract tests for the script bridge API
//!
//! These tests pin down the public surface: construction, the facade
//! operations and the value types they exchange.

use core_types::Value;
use script_engine::{
    Class, Engine, EngineConfig, EngineError, ErrorHeader, HostException, HostResult, Interceptors,
    Object, ObjectId, ObjectKind, Property, Scope, ScriptError, ScriptResult, OBJECT_TAG,
};

fn engine() -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    Engine::new().expect("engine should start")
}

/// Test Engine::new() returns a running engine
#[test]
fn test_engine_new_contract() {
    let engine = engine();
    assert_eq!(engine.config(), &EngineConfig::default());
    assert!(engine.live_objects() >= 1, "the global object is always registered");
}

/// Test only one engine may run on a thread
#[test]
fn test_engine_singleton_contract() {
    let _engine = engine();
    let second = Engine::new();
    assert!(matches!(second, Err(EngineError::AlreadyRunning)));
}

/// Test Engine::evaluate() returns the completion value
#[test]
fn test_evaluate_contract() {
    let engine = engine();
    let result: ScriptResult<Value> = engine.evaluate("'a' + 'b'", "contract.js");
    assert_eq!(result.unwrap(), Value::from("ab"));
}

/// Test Engine::evaluate() reports compile and runtime errors separately
#[test]
fn test_evaluate_error_contract() {
    let engine = engine();
    assert!(matches!(
        engine.evaluate("function (", "syntax.js"),
        Err(ScriptError::Compile(_))
    ));
    assert!(matches!(
        engine.evaluate("throw new Error('x')", "throw.js"),
        Err(ScriptError::Runtime(_))
    ));
}

/// Test Engine::call() resolves dotted paths
#[test]
fn test_call_contract() {
    let engine = engine();
    engine
        .evaluate("var util = { id: function (v) { return v; } };", "util.js")
        .unwrap();
    assert_eq!(engine.call("util.id", &[Value::from(7)]).unwrap(), Value::from(7));
    assert!(matches!(
        engine.call("util.nope", &[]),
        Err(ScriptError::Unresolved { .. })
    ));
}

/// Test Engine::global_object() is a stable Global handle
#[test]
fn test_global_object_contract() {
    let engine = engine();
    let a: Object = engine.global_object();
    let b = engine.with(|scope: &Scope<'_>| scope.global_object());
    assert_eq!(a, b);
    assert_eq!(a.kind(), ObjectKind::Global);
    assert!(!a.is_function());
}

/// Test Object values carry the object tag
#[test]
fn test_object_value_contract() {
    let engine = engine();
    let object = engine.create_object().unwrap();
    let value = engine.from_object(&object);
    assert_eq!(value.as_custom().map(|custom| custom.tag()), Some(OBJECT_TAG));
    assert_eq!(Object::from_value(&value), Some(object.clone()));
    assert_eq!(engine.to_object(&value), Some(object));
    assert!(!engine.is_function(&value));
}

/// Test object ids are never reused
#[test]
fn test_object_id_contract() {
    let engine = engine();
    let first: ObjectId = engine.create_object().unwrap().id();
    engine.collect_garbage();
    let second = engine.create_object().unwrap().id();
    assert!(second > first);
}

/// Test Class registration surface
#[test]
fn test_class_contract() {
    let engine = engine();
    let class: Class = engine.create_class("Widget").unwrap();
    assert_eq!(class.name(), "Widget");
    engine.with(|scope| {
        class
            .register_function(scope, "kind", |_, object, _| Ok(Value::from(object.name())))
            .unwrap();
        class
            .register_static_function(scope, "count", |_, _| Ok(Value::from(0)))
            .unwrap();
        class
            .register_property(scope, "size", Property::read_only(|_, _| Ok(Value::from(1))))
            .unwrap();
        class
            .intercept_property_name(scope, Interceptors::new(|_, _, _| Ok(None)))
            .unwrap();
        let instance = class.create(scope).unwrap();
        assert_eq!(instance.kind(), ObjectKind::ClassInstance);
        assert!(instance.call(scope, &[], None).is_err());
    });
    assert_eq!(engine.evaluate("typeof Widget", "class.js").unwrap(), Value::from("function"));
}

/// Test Engine::throw_exception() builds a value exception
#[test]
fn test_throw_exception_contract() {
    let engine = engine();
    let exception: HostException = engine.throw_exception(5);
    assert_eq!(exception, HostException::Value(Value::from(5)));
}

/// Test handler results convert script errors into host exceptions
#[test]
fn test_host_result_contract() {
    fn relay(err: ScriptError) -> HostResult<Value> {
        let result: ScriptResult<Value> = Err(err);
        Ok(result?)
    }
    let result = relay(ScriptError::Expired);
    assert!(matches!(result, Err(HostException::Error { .. })));
}

/// Test error reports expose their header
#[test]
fn test_error_report_contract() {
    let engine = engine();
    let err = engine.evaluate("undefinedFunction()", "report.js").unwrap_err();
    let report = err.report().expect("runtime errors carry a report");
    assert_eq!(report.header, ErrorHeader::Evaluate);
    assert_eq!(report.resource, "report.js");
    assert!(report.message.contains("undefinedFunction"));
}
