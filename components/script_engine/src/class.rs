//! Constructible classes exposed to scripts.
//!
//! A class is a global constructor plus a prototype. Instance functions and
//! properties live on the prototype, static functions on the constructor.
//! All of them dispatch by name when they fire, so registering a name again
//! swaps the handler for existing instances too.
//!
//! Property interception wraps each new instance in a proxy whose hooks
//! consult the host interceptors for names that are not registered members.

use crate::dispatch;
use crate::error::{ErrorHeader, HostResult, ScriptError, ScriptResult};
use crate::object::{HostFunction, Object, ObjectKind, Property};
use crate::registry::{ClassId, Registry, SlotInit};
use crate::scope::Scope;
use core_types::Value;
use rquickjs::{Object as JsObject, Persistent};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Handler of a static function or of a class constructor.
pub type StaticFunction = dyn Fn(&Scope<'_>, &[Value]) -> HostResult<Value>;

/// Intercepting getter: `Some` handles the read, `None` declines.
pub type InterceptGetter = dyn Fn(&Scope<'_>, &Object, &str) -> HostResult<Option<Value>>;

/// Intercepting setter: `true` handles the write, `false` declines.
pub type InterceptSetter = dyn Fn(&Scope<'_>, &Object, &str, Value) -> HostResult<bool>;

/// Intercepting `in` query or `delete`: `Some` answers, `None` declines.
pub type InterceptQuery = dyn Fn(&Scope<'_>, &Object, &str) -> HostResult<Option<bool>>;

/// Intercepting enumeration: names listed in addition to the own keys.
pub type InterceptEnumerator = dyn Fn(&Scope<'_>, &Object) -> HostResult<Vec<String>>;

/// Dynamic property handlers for a class.
///
/// Only the getter is mandatory. Absent handlers leave the corresponding
/// operation to the engine's default behavior.
///
/// # Example
/// ```
/// use script_engine::Interceptors;
/// use core_types::Value;
///
/// let interceptors = Interceptors::new(|_scope, _object, name| {
///     Ok((name == "answer").then(|| Value::from(42)))
/// })
/// .with_enumerator(|_scope, _object| Ok(vec!["answer".to_string()]));
/// ```
#[derive(Clone)]
pub struct Interceptors {
    pub(crate) getter: Rc<InterceptGetter>,
    pub(crate) setter: Option<Rc<InterceptSetter>>,
    pub(crate) query: Option<Rc<InterceptQuery>>,
    pub(crate) deleter: Option<Rc<InterceptQuery>>,
    pub(crate) enumerator: Option<Rc<InterceptEnumerator>>,
}

impl Interceptors {
    /// Interceptors with only a getter.
    pub fn new<G>(getter: G) -> Self
    where
        G: Fn(&Scope<'_>, &Object, &str) -> HostResult<Option<Value>> + 'static,
    {
        Self {
            getter: Rc::new(getter),
            setter: None,
            query: None,
            deleter: None,
            enumerator: None,
        }
    }

    /// Add a setter
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&Scope<'_>, &Object, &str, Value) -> HostResult<bool> + 'static,
    {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// Add an `in` query handler
    pub fn with_query<Q>(mut self, query: Q) -> Self
    where
        Q: Fn(&Scope<'_>, &Object, &str) -> HostResult<Option<bool>> + 'static,
    {
        self.query = Some(Rc::new(query));
        self
    }

    /// Add a `delete` handler
    pub fn with_deleter<D>(mut self, deleter: D) -> Self
    where
        D: Fn(&Scope<'_>, &Object, &str) -> HostResult<Option<bool>> + 'static,
    {
        self.deleter = Some(Rc::new(deleter));
        self
    }

    /// Add an enumerator
    pub fn with_enumerator<E>(mut self, enumerator: E) -> Self
    where
        E: Fn(&Scope<'_>, &Object) -> HostResult<Vec<String>> + 'static,
    {
        self.enumerator = Some(Rc::new(enumerator));
        self
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("setter", &self.setter.is_some())
            .field("query", &self.query.is_some())
            .field("deleter", &self.deleter.is_some())
            .field("enumerator", &self.enumerator.is_some())
            .finish()
    }
}

/// Which table a name is registered in, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Member {
    None,
    Function,
    Static,
    Property,
}

pub(crate) struct ClassSlot {
    pub name: String,
    pub functions: HashMap<String, Rc<HostFunction>>,
    pub static_functions: HashMap<String, Rc<StaticFunction>>,
    pub properties: HashMap<String, Property>,
    pub constructor: Option<Rc<StaticFunction>>,
    pub interceptors: Option<Interceptors>,
    constructor_object: Persistent<JsObject<'static>>,
    prototype: Persistent<JsObject<'static>>,
    hooks: Option<Persistent<JsObject<'static>>>,
}

impl ClassSlot {
    pub fn member(&self, name: &str) -> Member {
        if self.functions.contains_key(name) {
            Member::Function
        } else if self.static_functions.contains_key(name) {
            Member::Static
        } else if self.properties.contains_key(name) {
            Member::Property
        } else {
            Member::None
        }
    }
}

/// Handle to a class registered with [`Scope::create_class`].
///
/// Classes live as long as their engine; the handle is a cheap id.
#[derive(Clone)]
pub struct Class {
    id: ClassId,
    name: Rc<str>,
    registry: Weak<Registry>,
}

impl Class {
    /// Defines a class called `name` and publishes its constructor as the
    /// global of the same name.
    pub(crate) fn define(scope: &Scope<'_>, name: &str) -> ScriptResult<Class> {
        let registry = scope.registry();
        let ctx = scope.ctx();
        let id = ClassId(registry.class_count());

        let define = || -> rquickjs::Result<ClassSlot> {
            let construct = dispatch::class_constructor(ctx, Rc::downgrade(registry), id)?;
            let constructor = scope.support()?.make_class(name, construct)?;
            let prototype: JsObject = constructor.get("prototype")?;
            ctx.globals().set(name, constructor.clone())?;
            Ok(ClassSlot {
                name: name.to_string(),
                functions: HashMap::new(),
                static_functions: HashMap::new(),
                properties: HashMap::new(),
                constructor: None,
                interceptors: None,
                constructor_object: Persistent::save(ctx, constructor),
                prototype: Persistent::save(ctx, prototype),
                hooks: None,
            })
        };
        let slot = define().map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        let added = registry.add_class(slot);
        debug_assert_eq!(added, id);
        log::debug!("Registered class {}", name);

        Ok(Class {
            id,
            name: Rc::from(name),
            registry: Rc::downgrade(registry),
        })
    }

    /// Name of the class and of its global constructor.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn registry_in<'a>(&self, scope: &'a Scope<'_>) -> ScriptResult<&'a Rc<Registry>> {
        let registry = scope.registry();
        if std::ptr::eq(self.registry.as_ptr(), Rc::as_ptr(registry)) {
            Ok(registry)
        } else {
            Err(ScriptError::EngineGone)
        }
    }

    fn stored(
        &self,
        registry: &Registry,
        pick: impl FnOnce(&ClassSlot) -> Option<Persistent<JsObject<'static>>>,
    ) -> ScriptResult<Persistent<JsObject<'static>>> {
        registry
            .with_class(self.id, pick)
            .flatten()
            .ok_or(ScriptError::EngineGone)
    }

    fn prototype<'js>(&self, scope: &Scope<'js>) -> ScriptResult<JsObject<'js>> {
        let stored = self.stored(self.registry_in(scope)?, |slot| Some(slot.prototype.clone()))?;
        stored
            .restore(scope.ctx())
            .map_err(|e| scope.fail(e, ErrorHeader::Property))
    }

    fn constructor_object<'js>(&self, scope: &Scope<'js>) -> ScriptResult<JsObject<'js>> {
        let stored = self.stored(self.registry_in(scope)?, |slot| {
            Some(slot.constructor_object.clone())
        })?;
        stored
            .restore(scope.ctx())
            .map_err(|e| scope.fail(e, ErrorHeader::Property))
    }

    /// Registers an instance function. The handler receives the instance
    /// the function was called on.
    pub fn register_function<F>(&self, scope: &Scope<'_>, name: &str, handler: F) -> ScriptResult<()>
    where
        F: Fn(&Scope<'_>, &Object, &[Value]) -> HostResult<Value> + 'static,
    {
        let registry = self.registry_in(scope)?;
        // The replaced handler is dropped outside the borrow; its captures
        // may release objects.
        let previous = registry
            .with_class_mut(self.id, |slot| slot.functions.insert(name.to_string(), Rc::new(handler)))
            .ok_or(ScriptError::EngineGone)?;
        if previous.is_some() {
            return Ok(());
        }

        let prototype = self.prototype(scope)?;
        let function = dispatch::class_function(scope.ctx(), Rc::downgrade(registry), self.id, name)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        prototype
            .set(name, function)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        log::debug!("Registered function {}.prototype.{}", self.name, name);
        Ok(())
    }

    /// Registers a function on the constructor, callable as `Name.fn(...)`.
    pub fn register_static_function<F>(&self, scope: &Scope<'_>, name: &str, handler: F) -> ScriptResult<()>
    where
        F: Fn(&Scope<'_>, &[Value]) -> HostResult<Value> + 'static,
    {
        let registry = self.registry_in(scope)?;
        let previous = registry
            .with_class_mut(self.id, |slot| {
                slot.static_functions.insert(name.to_string(), Rc::new(handler))
            })
            .ok_or(ScriptError::EngineGone)?;
        if previous.is_some() {
            return Ok(());
        }

        let constructor = self.constructor_object(scope)?;
        let function = dispatch::static_function(scope.ctx(), Rc::downgrade(registry), self.id, name)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        constructor
            .set(name, function)
            .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        log::debug!("Registered static function {}.{}", self.name, name);
        Ok(())
    }

    /// Registers an accessor property available on every instance.
    pub fn register_property(&self, scope: &Scope<'_>, name: &str, property: Property) -> ScriptResult<()> {
        let registry = self.registry_in(scope)?;
        let read_only = property.is_read_only();
        let previous = registry
            .with_class_mut(self.id, |slot| slot.properties.insert(name.to_string(), property))
            .ok_or(ScriptError::EngineGone)?;
        drop(previous);

        let prototype = self.prototype(scope)?;
        let weak = Rc::downgrade(registry);
        let define = || -> rquickjs::Result<()> {
            let getter = dispatch::class_getter(scope.ctx(), weak.clone(), self.id, name)?;
            let setter = if read_only {
                rquickjs::Value::new_undefined(scope.ctx().clone())
            } else {
                dispatch::class_setter(scope.ctx(), weak.clone(), self.id, name)?.into_value()
            };
            scope
                .support()?
                .define_accessor(&prototype, name, getter.into_value(), setter)
        };
        define().map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
        log::debug!("Registered property {}.prototype.{}", self.name, name);
        Ok(())
    }

    /// Sets the handler run by `new Name(...)`.
    ///
    /// The handler must return a value wrapping an [`Object`] of this
    /// engine (usually one made by [`create`](Self::create)); anything else
    /// makes the construction throw.
    pub fn register_constructor<F>(&self, constructor: F) -> ScriptResult<()>
    where
        F: Fn(&Scope<'_>, &[Value]) -> HostResult<Value> + 'static,
    {
        let registry = self.registry.upgrade().ok_or(ScriptError::EngineGone)?;
        let previous = registry
            .with_class_mut(self.id, |slot| slot.constructor.replace(Rc::new(constructor)))
            .ok_or(ScriptError::EngineGone)?;
        drop(previous);
        Ok(())
    }

    /// Enables dynamic property handling for instances created from now on.
    ///
    /// Also registers a `toString` function returning the JSON text of the
    /// instance, unless one is registered already.
    pub fn intercept_property_name(&self, scope: &Scope<'_>, interceptors: Interceptors) -> ScriptResult<()> {
        let registry = self.registry_in(scope)?;
        let (previous, needs_hooks, has_to_string) = registry
            .with_class_mut(self.id, |slot| {
                (
                    slot.interceptors.replace(interceptors),
                    slot.hooks.is_none(),
                    slot.functions.contains_key("toString"),
                )
            })
            .ok_or(ScriptError::EngineGone)?;
        drop(previous);

        if needs_hooks {
            let hooks = dispatch::interceptor_hooks(scope.ctx(), Rc::downgrade(registry), self.id)
                .map_err(|e| scope.fail(e, ErrorHeader::SetProperty))?;
            let hooks = Persistent::save(scope.ctx(), hooks);
            registry.with_class_mut(self.id, |slot| slot.hooks = Some(hooks));
        }
        if !has_to_string {
            self.register_function(scope, "toString", |scope, object, _args| {
                Ok(Value::from(scope.stringify(object)))
            })?;
        }
        log::debug!("Enabled property interception for {}", self.name);
        Ok(())
    }

    /// Creates an instance without running the registered constructor.
    pub fn create<'js>(&self, scope: &Scope<'js>) -> ScriptResult<Object> {
        let registry = self.registry_in(scope)?;
        let ctx = scope.ctx();
        let prototype = self.prototype(scope)?;
        let hooks = registry
            .with_class(self.id, |slot| slot.hooks.clone())
            .ok_or(ScriptError::EngineGone)?;

        let build = || -> rquickjs::Result<(JsObject<'js>, JsObject<'js>)> {
            let support = scope.support()?;
            let target = support.instantiate(&prototype)?;
            let exposed = match hooks {
                Some(hooks) => support.make_proxy(&target, &hooks.restore(ctx)?)?,
                None => target.clone(),
            };
            Ok((target, exposed))
        };
        let (target, exposed) = build().map_err(|e| scope.fail(e, ErrorHeader::Call))?;

        let init = SlotInit::new(ObjectKind::ClassInstance, &*self.name).class(self.id);
        registry
            .insert(ctx, registry.next_id(), &target, exposed, init)
            .map_err(|e| scope.fail(e, ErrorHeader::Call))
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class").field("name", &self.name).finish()
    }
}
