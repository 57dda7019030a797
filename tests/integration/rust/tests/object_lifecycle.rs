//! Object Lifecycle Integration Tests
//!
//! Tests how long bridged objects live: host handles keep them alive,
//! script references keep them alive, and destroy listeners fire once the
//! engine has collected them.

use core_types::Value;
use script_engine::{Class, Engine};
use std::cell::Cell;
use std::rc::Rc;

fn engine() -> Engine {
    let _ = env_logger::builder().is_test(true).try_init();
    Engine::new().expect("engine should start")
}

/// Registers `Node`, whose instances bump `destroyed` when collected.
fn node_class(engine: &Engine, destroyed: &Rc<Cell<u32>>) -> Class {
    let class = engine.create_class("Node").unwrap();
    let factory = class.clone();
    let counter = destroyed.clone();
    class
        .register_constructor(move |scope, _| {
            let node = factory.create(scope)?;
            let counter = counter.clone();
            node.on_destroyed(move || counter.set(counter.get() + 1));
            Ok(node.into_value())
        })
        .unwrap();
    class
}

/// Test: temporaries created by scripts are reported destroyed
#[test]
fn test_script_temporaries_are_destroyed() {
    let destroyed = Rc::new(Cell::new(0));
    let engine = engine();
    let _class = node_class(&engine, &destroyed);
    let baseline = engine.live_objects();

    engine
        .evaluate("for (var i = 0; i < 10; i++) { new Node(); }", "loop.js")
        .unwrap();
    engine.collect_garbage();

    assert_eq!(destroyed.get(), 10);
    assert_eq!(engine.live_objects(), baseline);
}

/// Test: a script variable keeps its instance until reassigned
#[test]
fn test_script_reference_keeps_instance() {
    let destroyed = Rc::new(Cell::new(0));
    let engine = engine();
    let _class = node_class(&engine, &destroyed);

    engine.evaluate("var keep = new Node();", "keep.js").unwrap();
    engine.collect_garbage();
    assert_eq!(destroyed.get(), 0);

    engine.evaluate("keep = null;", "release.js").unwrap();
    engine.collect_garbage();
    assert_eq!(destroyed.get(), 1);
}

/// Test: cycles are only reclaimed by a collection pass
#[test]
fn test_cyclic_instance_collected_by_gc() {
    let destroyed = Rc::new(Cell::new(0));
    let engine = engine();
    let _class = node_class(&engine, &destroyed);

    engine
        .evaluate("(function () { var n = new Node(); n.self = n; })();", "cycle.js")
        .unwrap();
    engine.collect_garbage();
    assert_eq!(destroyed.get(), 1);
}

/// Test: a host handle outlives the script reference
#[test]
fn test_host_handle_keeps_instance() {
    let destroyed = Rc::new(Cell::new(0));
    let engine = engine();
    let _class = node_class(&engine, &destroyed);

    let value = engine.evaluate("new Node()", "held.js").unwrap();
    let node = engine.to_object(&value).unwrap();
    drop(value);
    engine.collect_garbage();
    assert_eq!(destroyed.get(), 0);

    let id = node.id();
    engine.with(|scope| {
        scope.global_object().set_property(scope, "again", &node.clone().into_value()).unwrap();
        let again = scope.evaluate("again", "again.js").unwrap();
        assert_eq!(scope.to_object(&again).map(|object| object.id()), Some(id));
        scope.evaluate("again = undefined;", "again.js").unwrap();
    });

    drop(node);
    engine.collect_garbage();
    assert_eq!(destroyed.get(), 1);
}

/// Test: shutting the engine down drops listeners without running them
#[test]
fn test_shutdown_does_not_fire_listeners() {
    let fired = Rc::new(Cell::new(false));
    let engine = engine();
    let object = engine.create_object().unwrap();
    let flag = fired.clone();
    object.on_destroyed(move || flag.set(true));

    drop(engine);
    drop(object);
    assert!(!fired.get());

    let restarted = Engine::new().expect("a new engine starts after the old one is gone");
    assert_eq!(restarted.evaluate("1", "restart.js").unwrap(), Value::from(1));
}
