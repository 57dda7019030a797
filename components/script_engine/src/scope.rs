//! The active engine context handed to host code.
//!
//! A [`Scope`] exists only inside [`Engine::with`](crate::Engine::with) and
//! inside the native callbacks the engine invokes. Every bridge operation
//! takes the scope it runs in, which is how nested host -> script -> host
//! calls share one activation.

use crate::bridge;
use crate::class::Class;
use crate::error::{self, ErrorHeader, Evaluated, HostException, ScriptError, ScriptResult};
use crate::object::{Object, ObjectKind};
use crate::registry::{ObjectId, Registry, SlotInit};
use crate::support::Support;
use core_types::Value;
use rquickjs::context::EvalOptions;
use rquickjs::function::{Rest, This};
use rquickjs::{Ctx, Object as JsObject, Value as JsValue};
use std::rc::{Rc, Weak};

/// Access to the engine while it is active.
pub struct Scope<'js> {
    ctx: Ctx<'js>,
    registry: Rc<Registry>,
    global: Object,
}

impl<'js> Scope<'js> {
    pub(crate) fn new(ctx: Ctx<'js>, registry: Rc<Registry>, global: Object) -> Self {
        Self {
            ctx,
            registry,
            global,
        }
    }

    /// Rebuilds the scope inside a native callback. `None` once the engine
    /// is shutting down.
    pub(crate) fn enter(ctx: &Ctx<'js>, registry: &Weak<Registry>) -> Option<Self> {
        let registry = registry.upgrade()?;
        let global = registry.global()?;
        Some(Self::new(ctx.clone(), registry, global))
    }

    pub(crate) fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    pub(crate) fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    pub(crate) fn support(&self) -> rquickjs::Result<Support<'js>> {
        self.registry.support(&self.ctx)
    }

    /// Turns a failed engine call into a [`ScriptError`], consuming the
    /// pending exception.
    pub(crate) fn fail(&self, err: rquickjs::Error, header: ErrorHeader) -> ScriptError {
        error::capture(self, err, header, None)
    }

    /// Clears the pending exception behind `err`, if any, and logs it.
    pub(crate) fn discard(&self, err: rquickjs::Error, context: &str) {
        if matches!(err, rquickjs::Error::Exception) {
            let thrown = self.ctx.catch();
            let text = self
                .support()
                .and_then(|support| support.describe(&thrown))
                .unwrap_or_else(|_| "<exception>".to_string());
            log::warn!("Failed to {}: {}", context, text);
        } else {
            log::warn!("Failed to {}: {}", context, err);
        }
    }

    /// Converts a handler result into what the native callback returns.
    pub(crate) fn settle(&self, result: Result<Value, HostException>) -> rquickjs::Result<JsValue<'js>> {
        match result {
            Ok(value) => self.to_js(&value),
            Err(exception) => Err(self.raise(exception)),
        }
    }

    /// Throws `exception` into the calling script.
    pub(crate) fn raise(&self, exception: HostException) -> rquickjs::Error {
        let thrown = match exception {
            HostException::Value(value) => self.to_js(&value),
            HostException::Error { kind, message } => self
                .support()
                .and_then(|support| support.make_error(kind.name(), &message)),
        };
        match thrown {
            Ok(thrown) => self.ctx.throw(thrown),
            Err(err) => err,
        }
    }

    pub(crate) fn to_js(&self, value: &Value) -> rquickjs::Result<JsValue<'js>> {
        bridge::to_js(self, value)
    }

    /// The bridged object `object` stands for, found through its tag.
    pub(crate) fn tagged_object(&self, object: &JsObject<'js>) -> Option<Object> {
        let raw = match self.support().and_then(|support| support.tag_of(object)) {
            Ok(raw) => raw?,
            Err(err) => {
                self.discard(err, "read the bridge tag");
                return None;
            }
        };
        let id = ObjectId::from_tag(raw)?;
        self.registry.handle(&self.ctx, id, Some(object))
    }

    /// JSON text of `object`, or `[object Object]` when it has none.
    pub(crate) fn stringify(&self, object: &Object) -> String {
        let text = object
            .engine_object(self)
            .ok()
            .and_then(|engine| {
                self.support()
                    .and_then(|support| support.stringify(&engine.into_value()))
                    .map_err(|err| self.discard(err, "stringify object"))
                    .ok()
            });
        text.unwrap_or_else(|| "[object Object]".to_string())
    }

    /// Compiles and runs `source`. `origin` labels the script in error
    /// reports and backtraces.
    ///
    /// # Errors
    /// [`ScriptError::Compile`] when the source does not parse,
    /// [`ScriptError::Runtime`] when it throws.
    pub fn evaluate(&self, source: &str, origin: &str) -> ScriptResult<Value> {
        log::debug!("Evaluating {} ({} bytes)", origin, source.len());
        self.registry.set_last_origin(origin);

        let mut options = EvalOptions::default();
        options.strict = false;
        match self.ctx.eval_with_options::<JsValue, _>(source, options) {
            Ok(value) => Ok(self.from_engine(value)),
            Err(err) => {
                let evaluated = Evaluated { origin, source };
                Err(error::capture(self, err, ErrorHeader::Evaluate, Some(&evaluated)))
            }
        }
    }

    /// Calls the function at the dotted `path`, resolved from the global
    /// object, with the object holding it as `this`.
    ///
    /// # Errors
    /// [`ScriptError::Unresolved`] when a segment is missing or the last one
    /// is not a function; nothing is thrown into the engine in that case.
    /// [`ScriptError::Runtime`] when the callee throws.
    ///
    /// # Example
    /// ```
    /// use script_engine::Engine;
    /// use core_types::Value;
    ///
    /// let engine = Engine::new().unwrap();
    /// engine.with(|scope| {
    ///     scope.evaluate("var math = { twice: function (x) { return x * 2; } };", "setup.js").unwrap();
    ///     let result = scope.call("math.twice", &[Value::from(21)]).unwrap();
    ///     assert_eq!(result, Value::from(42));
    /// });
    /// ```
    pub fn call(&self, path: &str, args: &[Value]) -> ScriptResult<Value> {
        let mut current = self.global.engine_object(self)?.into_value();
        let mut holder: Option<JsObject<'js>> = None;
        for segment in path.split('.') {
            let Some(object) = current.as_object().cloned() else {
                return Err(ScriptError::unresolved(path));
            };
            if segment.is_empty() {
                return Err(ScriptError::unresolved(path));
            }
            let next: JsValue = object
                .get(segment)
                .map_err(|e| self.fail(e, ErrorHeader::Property))?;
            if next.is_undefined() || next.is_null() {
                return Err(ScriptError::unresolved(path));
            }
            holder = Some(object);
            current = next;
        }

        let function = current
            .into_function()
            .ok_or_else(|| ScriptError::unresolved(path))?;
        let this = match holder {
            Some(holder) => holder.into_value(),
            None => JsValue::new_undefined(self.ctx.clone()),
        };
        let args = args
            .iter()
            .map(|arg| self.to_engine(arg))
            .collect::<ScriptResult<Vec<_>>>()?;
        log::debug!("Calling {} with {} arguments", path, args.len());
        let result: JsValue = function
            .call((This(this), Rest(args)))
            .map_err(|e| self.fail(e, ErrorHeader::Call))?;
        Ok(self.from_engine(result))
    }

    /// The engine's global object.
    pub fn global_object(&self) -> Object {
        self.global.clone()
    }

    /// Registers a class and publishes its constructor as a global.
    pub fn create_class(&self, name: &str) -> ScriptResult<Class> {
        Class::define(self, name)
    }

    /// Creates an empty object not attached to any parent.
    pub fn create_object(&self) -> ScriptResult<Object> {
        let object = JsObject::new(self.ctx.clone()).map_err(|e| self.fail(e, ErrorHeader::Call))?;
        let init = SlotInit::new(ObjectKind::PlainObject, "");
        self.registry
            .insert(&self.ctx, self.registry.next_id(), &object, object.clone(), init)
            .map_err(|e| self.fail(e, ErrorHeader::Call))
    }

    /// Converts a host value into an engine value.
    pub fn to_engine(&self, value: &Value) -> ScriptResult<JsValue<'js>> {
        self.to_js(value).map_err(|e| self.fail(e, ErrorHeader::Call))
    }

    /// Converts an engine value into a host value. Script functions come back
    /// as adopted function objects, bridged objects as their handles.
    pub fn from_engine(&self, value: JsValue<'js>) -> Value {
        bridge::from_js(self, value)
    }

    /// Builds the exception a handler returns to throw `value` into the
    /// script that called it.
    ///
    /// ```
    /// use script_engine::Engine;
    /// use core_types::Value;
    ///
    /// let engine = Engine::new().unwrap();
    /// engine.with(|scope| {
    ///     scope
    ///         .global_object()
    ///         .register_function(scope, "fail", |scope, _function, _args| {
    ///             Err(scope.throw_exception(Value::from("nope")))
    ///         })
    ///         .unwrap();
    ///     let caught = scope.evaluate("try { fail(); } catch (e) { e }", "throw.js").unwrap();
    ///     assert_eq!(caught, Value::from("nope"));
    /// });
    /// ```
    pub fn throw_exception(&self, value: impl Into<Value>) -> HostException {
        HostException::Value(value.into())
    }

    /// Whether `value` carries a callable object of this engine.
    pub fn is_function(&self, value: &Value) -> bool {
        self.to_object(value).is_some_and(|object| object.is_function())
    }

    /// The object of this engine carried by `value`, if any.
    pub fn to_object(&self, value: &Value) -> Option<Object> {
        Object::from_value(value).filter(|object| object.registry_in(self).is_ok())
    }

    /// Wraps `object` into a host value.
    pub fn from_object(&self, object: &Object) -> Value {
        object.clone().into_value()
    }
}
