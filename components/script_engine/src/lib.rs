//! Embedding bridge between host code and an embedded script engine.
//!
//! The crate wraps an embedded runtime and keeps host and script objects in
//! sync:
//!
//! - [`Engine`] - owns the runtime; evaluates scripts and calls functions
//!   by dotted path
//! - [`Scope`] - the active engine context every bridge operation runs in
//! - [`Object`] - host handle to a script-visible object, function or class
//!   instance
//! - [`Class`] - constructible class with host-implemented members and
//!   optional property interception
//! - Values cross the boundary as [`core_types::Value`]
//!
//! # Examples
//!
//! ```
//! use script_engine::{Engine, Property};
//! use core_types::Value;
//!
//! let engine = Engine::new().unwrap();
//! engine.with(|scope| {
//!     let app = scope.global_object().child(scope, "app").unwrap();
//!     app.register_function(scope, "add", |_scope, _function, args| {
//!         let a = args.first().and_then(Value::as_integer).unwrap_or(0);
//!         let b = args.get(1).and_then(Value::as_integer).unwrap_or(0);
//!         Ok(Value::from(a + b))
//!     })
//!     .unwrap();
//!     app.register_property(scope, "version", Property::read_only(|_scope, _object| Ok(Value::from("1.0"))))
//!         .unwrap();
//!
//!     let result = scope.evaluate("app.add(40, 2) + ' ' + app.version", "main.js").unwrap();
//!     assert_eq!(result, Value::from("42 1.0"));
//! });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod bridge;
mod class;
mod config;
mod dispatch;
mod engine;
mod error;
mod object;
mod registry;
mod scope;
mod support;

pub use bridge::MAX_DEPTH;
pub use class::{
    Class, InterceptEnumerator, InterceptGetter, InterceptQuery, InterceptSetter, Interceptors,
    StaticFunction,
};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{
    EngineError, ErrorHeader, ErrorReport, HostException, HostResult, ScriptError, ScriptResult,
};
pub use object::{Getter, HostFunction, Object, ObjectKind, Property, Setter, OBJECT_TAG};
pub use registry::ObjectId;
pub use scope::Scope;
