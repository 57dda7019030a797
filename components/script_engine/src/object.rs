//! Host handles to script-visible objects.
//!
//! An [`Object`] is a cheap, clonable handle. While at least one handle to an
//! entity is alive the engine value is kept alive too; once the last handle
//! is dropped the script side decides the lifetime, and the destroy
//! listeners run after the engine collects the value.

use crate::dispatch;
use crate::error::{self, ErrorHeader, HostResult, ScriptError, ScriptResult};
use crate::registry::{ObjectId, Registry, SlotInit};
use crate::scope::Scope;
use core_types::{Custom, Value};
use rquickjs::function::{Rest, This};
use rquickjs::{Object as JsObject, Value as JsValue};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

/// `Custom` tag of values wrapping an [`Object`].
pub const OBJECT_TAG: u32 = 0x6f62_6a00;

/// Handler behind a host function. Receives the function's own object and
/// the converted arguments.
pub type HostFunction = dyn Fn(&Scope<'_>, &Object, &[Value]) -> HostResult<Value>;

/// Property getter. Receives the object the property is read from.
pub type Getter = dyn Fn(&Scope<'_>, &Object) -> HostResult<Value>;

/// Property setter. Receives the object the property is written to.
pub type Setter = dyn Fn(&Scope<'_>, &Object, Value) -> HostResult<()>;

/// What a handle refers to. Fixed when the object is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// The global object of the engine
    Global,
    /// A plain object created by the host
    PlainObject,
    /// A function implemented by a host handler
    HostFunction,
    /// A script function that crossed into the host
    AdoptedScriptFunction,
    /// An instance of a registered class
    ClassInstance,
}

/// A native accessor: a getter and, unless read-only, a setter.
#[derive(Clone)]
pub struct Property {
    pub(crate) getter: Rc<Getter>,
    pub(crate) setter: Option<Rc<Setter>>,
}

impl Property {
    /// A property scripts can read but not assign.
    pub fn read_only<G>(getter: G) -> Self
    where
        G: Fn(&Scope<'_>, &Object) -> HostResult<Value> + 'static,
    {
        Self {
            getter: Rc::new(getter),
            setter: None,
        }
    }

    /// A property with both accessors.
    pub fn read_write<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn(&Scope<'_>, &Object) -> HostResult<Value> + 'static,
        S: Fn(&Scope<'_>, &Object, Value) -> HostResult<()> + 'static,
    {
        Self {
            getter: Rc::new(getter),
            setter: Some(Rc::new(setter)),
        }
    }

    /// Whether assignments are ignored.
    pub fn is_read_only(&self) -> bool {
        self.setter.is_none()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

pub(crate) struct ObjectHandle {
    id: ObjectId,
    kind: ObjectKind,
    registry: Weak<Registry>,
}

impl ObjectHandle {
    pub(crate) fn new(id: ObjectId, kind: ObjectKind, registry: Weak<Registry>) -> Self {
        Self { id, kind, registry }
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.release(self.id);
        }
    }
}

/// Host handle to one script-visible entity.
///
/// Handles compare equal when they refer to the same entity.
#[derive(Clone)]
pub struct Object(Rc<ObjectHandle>);

impl Object {
    pub(crate) fn from_handle(handle: Rc<ObjectHandle>) -> Self {
        Self(handle)
    }

    /// Stable identity of the entity.
    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    /// What this handle refers to.
    pub fn kind(&self) -> ObjectKind {
        self.0.kind
    }

    /// Whether [`call`](Self::call) can succeed.
    pub fn is_function(&self) -> bool {
        matches!(
            self.kind(),
            ObjectKind::HostFunction | ObjectKind::AdoptedScriptFunction
        )
    }

    /// Name the entity was registered under (empty for detached objects).
    pub fn name(&self) -> String {
        self.0
            .registry
            .upgrade()
            .and_then(|registry| registry.name_of(self.id()))
            .unwrap_or_default()
    }

    /// Wraps this handle into a host [`Value`].
    pub fn into_value(self) -> Value {
        Value::from(self)
    }

    /// Extracts the handle carried by `value`, if any.
    pub fn from_value(value: &Value) -> Option<Object> {
        let custom = value.as_custom()?;
        if custom.tag() != OBJECT_TAG {
            return None;
        }
        custom.downcast::<ObjectHandle>().map(Object)
    }

    /// Registers a callback run once, after the engine has collected the
    /// entity. Never runs for the global object.
    pub fn on_destroyed<F>(&self, listener: F)
    where
        F: FnOnce() + 'static,
    {
        if let Some(registry) = self.0.registry.upgrade() {
            registry.add_listener(self.id(), Box::new(listener));
        }
    }

    pub(crate) fn registry_in<'a>(&self, scope: &'a Scope<'_>) -> ScriptResult<&'a Rc<Registry>> {
        let registry = scope.registry();
        if std::ptr::eq(self.0.registry.as_ptr(), Rc::as_ptr(registry)) {
            Ok(registry)
        } else {
            Err(ScriptError::EngineGone)
        }
    }

    pub(crate) fn engine_object<'js>(&self, scope: &Scope<'js>) -> ScriptResult<JsObject<'js>> {
        self.registry_in(scope)?
            .engine_object(scope.ctx(), self.id())
            .ok_or(ScriptError::Expired)
    }

    /// Returns the child object `name`, creating an empty one on first use.
    ///
    /// Calling this twice with the same name yields the same object for as
    /// long as the child stays alive on the script side.
    ///
    /// # Errors
    /// Fails when this object no longer has an engine value or the engine
    /// refuses the property.
    pub fn child(&self, scope: &Scope<'_>, name: &str) -> ScriptResult<Object> {
        let registry = self.registry_in(scope)?;
        if let Some(existing) = registry
            .child_of(self.id(), name)
            .and_then(|id| registry.handle(scope.ctx(), id, None))
        {
            return Ok(existing);
        }

        let parent = self.engine_object(scope)?;
        let child = JsObject::new(scope.ctx().clone()).map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        parent
            .set(name, child.clone())
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;

        let init = SlotInit::new(ObjectKind::PlainObject, name).parent(self.id());
        registry
            .insert(scope.ctx(), registry.next_id(), &child, child.clone(), init)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))
    }

    /// Exposes `handler` as the function property `name`.
    ///
    /// The handler receives the function's own object and the converted
    /// arguments; its result is converted back for the caller. Registering
    /// the same name again replaces the previous function.
    pub fn register_function<F>(&self, scope: &Scope<'_>, name: &str, handler: F) -> ScriptResult<Object>
    where
        F: Fn(&Scope<'_>, &Object, &[Value]) -> HostResult<Value> + 'static,
    {
        let registry = self.registry_in(scope)?;
        let parent = self.engine_object(scope)?;
        let id = registry.next_id();
        let function = dispatch::host_function(scope.ctx(), Rc::downgrade(registry), id)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        let function = function
            .into_value()
            .into_object()
            .ok_or_else(|| ScriptError::Engine(format!("function {} is not an object", name)))?;
        parent
            .set(name, function.clone())
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;

        let init = SlotInit::new(ObjectKind::HostFunction, name)
            .parent(self.id())
            .function(Rc::new(handler));
        let object = registry
            .insert(scope.ctx(), id, &function, function.clone(), init)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        log::debug!("Registered function {}.{}", self.name(), name);
        Ok(object)
    }

    /// Defines the accessor property `name` backed by host callbacks.
    ///
    /// The accessors look the property up when they fire, so registering the
    /// same name again swaps the behavior in place.
    pub fn register_property(&self, scope: &Scope<'_>, name: &str, property: Property) -> ScriptResult<()> {
        let registry = self.registry_in(scope)?;
        let object = self.engine_object(scope)?;
        let read_only = property.is_read_only();
        // Dropped after the slot borrow ends: the old accessors may hold the
        // last handle of another object.
        let previous = registry
            .with_slot_mut(self.id(), |slot| slot.properties.insert(name.to_string(), property))
            .flatten();
        drop(previous);

        let weak = Rc::downgrade(registry);
        let define = || -> rquickjs::Result<()> {
            let getter = dispatch::object_getter(scope.ctx(), weak.clone(), self.id(), name)?;
            let setter = if read_only {
                JsValue::new_undefined(scope.ctx().clone())
            } else {
                dispatch::object_setter(scope.ctx(), weak.clone(), self.id(), name)?.into_value()
            };
            scope
                .support()?
                .define_accessor(&object, name, getter.into_value(), setter)
        };
        define().map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        log::debug!("Registered property {}.{}", self.name(), name);
        Ok(())
    }

    /// Invokes this object as a function.
    ///
    /// Host functions run their handler directly. Adopted script functions
    /// are called through the engine with `this` bound to `this`, or to the
    /// function itself when `None`.
    ///
    /// # Errors
    /// [`ScriptError::NotCallable`] for objects that are not functions, and
    /// [`ScriptError::Runtime`] when the callee throws.
    pub fn call(&self, scope: &Scope<'_>, args: &[Value], this: Option<&Object>) -> ScriptResult<Value> {
        let registry = self.registry_in(scope)?;
        match self.kind() {
            ObjectKind::HostFunction => {
                let handler = registry.function_of(self.id()).ok_or(ScriptError::Expired)?;
                handler(scope, self, args).map_err(|exception| error::host_report(&self.name(), exception))
            }
            ObjectKind::AdoptedScriptFunction => {
                let function = self
                    .engine_object(scope)?
                    .into_value()
                    .into_function()
                    .ok_or_else(|| ScriptError::NotCallable { name: self.name() })?;
                let receiver = match this {
                    Some(object) => object.engine_object(scope)?.into_value(),
                    None => function.clone().into_value(),
                };
                let args = args
                    .iter()
                    .map(|arg| scope.to_engine(arg))
                    .collect::<ScriptResult<Vec<_>>>()?;
                let result: JsValue = function
                    .call((This(receiver), Rest(args)))
                    .map_err(|e| scope.fail(e, ErrorHeader::Call))?;
                Ok(scope.from_engine(result))
            }
            _ => Err(ScriptError::NotCallable { name: self.name() }),
        }
    }

    /// Reads the property `name` through the engine.
    pub fn property(&self, scope: &Scope<'_>, name: &str) -> ScriptResult<Value> {
        let object = self.engine_object(scope)?;
        let value: JsValue = object.get(name).map_err(|e| scope.fail(e, ErrorHeader::Property))?;
        Ok(scope.from_engine(value))
    }

    /// Writes the property `name` through the engine.
    pub fn set_property(&self, scope: &Scope<'_>, name: &str, value: &Value) -> ScriptResult<()> {
        let object = self.engine_object(scope)?;
        let value = scope.to_engine(value)?;
        object
            .set(name, value)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Custom(Custom::from_rc(OBJECT_TAG, object.0))
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && Weak::ptr_eq(&self.0.registry, &other.0.registry)
    }
}

impl Eq for Object {}

impl Hash for Object {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
