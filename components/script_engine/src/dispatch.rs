//! Native callbacks installed into the engine.
//!
//! Every closure here captures only a weak registry reference plus the ids
//! and names it dispatches on. Handlers are looked up when the callback
//! fires, so re-registration takes effect immediately and a callback that
//! outlives its object or engine degrades to returning `undefined`.

use crate::class::{Interceptors, Member};
use crate::error::HostException;
use crate::object::Object;
use crate::registry::{ClassId, ObjectId, Registry};
use crate::scope::Scope;
use core_types::Value;
use rquickjs::function::{Rest, This};
use rquickjs::{Array, Ctx, Function as JsFunction, Object as JsObject, Value as JsValue};
use std::rc::Weak;

fn undefined(ctx: Ctx<'_>) -> rquickjs::Result<JsValue<'_>> {
    Ok(JsValue::new_undefined(ctx))
}

fn arguments<'js>(scope: &Scope<'js>, args: Rest<JsValue<'js>>) -> Vec<Value> {
    args.0.into_iter().map(|arg| scope.from_engine(arg)).collect()
}

/// Function property created by `Object::register_function`.
pub(crate) fn host_function<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    id: ObjectId,
) -> rquickjs::Result<JsFunction<'js>> {
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let handler = scope.registry().function_of(id);
            let function = scope.registry().handle(&ctx, id, None);
            let (Some(handler), Some(function)) = (handler, function) else {
                log::error!("Host function {} called after it was destroyed", id);
                return undefined(ctx);
            };
            let args = arguments(&scope, args);
            scope.settle(handler(&scope, &function, &args))
        },
    )
}

/// Getter of a property created by `Object::register_property`.
pub(crate) fn object_getter<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    id: ObjectId,
    name: &str,
) -> rquickjs::Result<JsFunction<'js>> {
    let name = name.to_string();
    JsFunction::new(ctx.clone(), move |ctx: Ctx<'js>| -> rquickjs::Result<JsValue<'js>> {
        let Some(scope) = Scope::enter(&ctx, &registry) else {
            return undefined(ctx);
        };
        let property = scope.registry().property_of(id, &name);
        let owner = scope.registry().handle(&ctx, id, None);
        match (property, owner) {
            (Some(property), Some(owner)) => scope.settle((property.getter)(&scope, &owner)),
            _ => undefined(ctx),
        }
    })
}

/// Setter of a property created by `Object::register_property`.
pub(crate) fn object_setter<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    id: ObjectId,
    name: &str,
) -> rquickjs::Result<JsFunction<'js>> {
    let name = name.to_string();
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, value: JsValue<'js>| -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let setter = scope
                .registry()
                .property_of(id, &name)
                .and_then(|property| property.setter);
            let owner = scope.registry().handle(&ctx, id, None);
            let (Some(setter), Some(owner)) = (setter, owner) else {
                return undefined(ctx);
            };
            let value = scope.from_engine(value);
            scope.settle(setter(&scope, &owner, value).map(|()| Value::Undefined))
        },
    )
}

/// Resolves the instance of `class` a prototype callback was invoked on.
/// Any other receiver throws a `TypeError`.
fn instance<'js>(scope: &Scope<'js>, class: ClassId, this: &JsValue<'js>) -> rquickjs::Result<Object> {
    let object = this.as_object().and_then(|object| scope.tagged_object(object));
    match object {
        Some(object) if scope.registry().class_of(object.id()) == Some(class) => Ok(object),
        _ => Err(scope.raise(HostException::type_error("Illegal invocation"))),
    }
}

/// Constructor exposed to scripts as `new Name(...)`.
pub(crate) fn class_constructor<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    class: ClassId,
) -> rquickjs::Result<JsFunction<'js>> {
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let (name, constructor) = scope
                .registry()
                .with_class(class, |slot| (slot.name.clone(), slot.constructor.clone()))
                .unwrap_or_default();
            let Some(constructor) = constructor else {
                return Err(scope.raise(HostException::type_error(format!(
                    "{} is not constructible",
                    name
                ))));
            };

            let args = arguments(&scope, args);
            let created = constructor(&scope, &args).map_err(|exception| scope.raise(exception))?;
            match Object::from_value(&created).and_then(|object| object.engine_object(&scope).ok()) {
                Some(object) => Ok(object.into_value()),
                None => Err(scope.raise(HostException::type_error(format!(
                    "Unable to get object for class construct of {}",
                    name
                )))),
            }
        },
    )
}

/// Static function stored on the class constructor.
pub(crate) fn static_function<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    class: ClassId,
    name: &str,
) -> rquickjs::Result<JsFunction<'js>> {
    let name = name.to_string();
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, args: Rest<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let handler = scope
                .registry()
                .with_class(class, |slot| slot.static_functions.get(&name).cloned())
                .flatten();
            let Some(handler) = handler else {
                return undefined(ctx);
            };
            let args = arguments(&scope, args);
            scope.settle(handler(&scope, &args))
        },
    )
}

/// Instance function stored on the class prototype.
pub(crate) fn class_function<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    class: ClassId,
    name: &str,
) -> rquickjs::Result<JsFunction<'js>> {
    let name = name.to_string();
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>,
              this: This<JsValue<'js>>,
              args: Rest<JsValue<'js>>|
              -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let object = instance(&scope, class, &this.0)?;
            let handler = scope
                .registry()
                .with_class(class, |slot| slot.functions.get(&name).cloned())
                .flatten();
            let Some(handler) = handler else {
                return undefined(ctx);
            };
            let args = arguments(&scope, args);
            scope.settle(handler(&scope, &object, &args))
        },
    )
}

/// Getter of a class property, stored on the prototype.
pub(crate) fn class_getter<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    class: ClassId,
    name: &str,
) -> rquickjs::Result<JsFunction<'js>> {
    let name = name.to_string();
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, this: This<JsValue<'js>>| -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let object = instance(&scope, class, &this.0)?;
            let property = scope
                .registry()
                .with_class(class, |slot| slot.properties.get(&name).cloned())
                .flatten();
            match property {
                Some(property) => scope.settle((property.getter)(&scope, &object)),
                None => undefined(ctx),
            }
        },
    )
}

/// Setter of a class property, stored on the prototype.
pub(crate) fn class_setter<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    class: ClassId,
    name: &str,
) -> rquickjs::Result<JsFunction<'js>> {
    let name = name.to_string();
    JsFunction::new(
        ctx.clone(),
        move |ctx: Ctx<'js>,
              this: This<JsValue<'js>>,
              value: JsValue<'js>|
              -> rquickjs::Result<JsValue<'js>> {
            let Some(scope) = Scope::enter(&ctx, &registry) else {
                return undefined(ctx);
            };
            let object = instance(&scope, class, &this.0)?;
            let setter = scope
                .registry()
                .with_class(class, |slot| {
                    slot.properties.get(&name).and_then(|p| p.setter.clone())
                })
                .flatten();
            let Some(setter) = setter else {
                return undefined(ctx);
            };
            let value = scope.from_engine(value);
            scope.settle(setter(&scope, &object, value).map(|()| Value::Undefined))
        },
    )
}

/// Interception context shared by the proxy hooks: the scope, the instance
/// behind the proxy target, and the class interceptors.
struct Intercepted<'js> {
    scope: Scope<'js>,
    object: Object,
    interceptors: Interceptors,
}

fn intercepted<'js>(
    ctx: &Ctx<'js>,
    registry: &Weak<Registry>,
    class: ClassId,
    target: &JsObject<'js>,
    key: Option<&str>,
) -> Option<Intercepted<'js>> {
    let scope = Scope::enter(ctx, registry)?;
    let (interceptors, member) = scope.registry().with_class(class, |slot| {
        let member = key.map(|key| slot.member(key)).unwrap_or(Member::None);
        (slot.interceptors.clone(), member)
    })?;
    if member != Member::None {
        return None;
    }
    let interceptors = interceptors?;
    let object = scope.tagged_object(target)?;
    Some(Intercepted {
        scope,
        object,
        interceptors,
    })
}

/// Builds the hook object handed to the proxy of every intercepted instance
/// of `class`. Each hook returns `undefined` to let the engine apply its
/// default behavior.
pub(crate) fn interceptor_hooks<'js>(
    ctx: &Ctx<'js>,
    registry: Weak<Registry>,
    class: ClassId,
) -> rquickjs::Result<JsObject<'js>> {
    let hooks = JsObject::new(ctx.clone())?;

    let weak = registry.clone();
    hooks.set(
        "get",
        JsFunction::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, target: JsObject<'js>, key: String| -> rquickjs::Result<JsValue<'js>> {
                let Some(hit) = intercepted(&ctx, &weak, class, &target, Some(&key)) else {
                    return undefined(ctx);
                };
                let found = (hit.interceptors.getter)(&hit.scope, &hit.object, &key)
                    .map_err(|exception| hit.scope.raise(exception))?;
                match found {
                    Some(value) => {
                        let boxed = Array::new(ctx.clone())?;
                        boxed.set(0, hit.scope.to_js(&value)?)?;
                        Ok(boxed.into_value())
                    }
                    None => undefined(ctx),
                }
            },
        )?,
    )?;

    let weak = registry.clone();
    hooks.set(
        "set",
        JsFunction::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, target: JsObject<'js>, key: String, value: JsValue<'js>| -> rquickjs::Result<bool> {
                let Some(hit) = intercepted(&ctx, &weak, class, &target, Some(&key)) else {
                    return Ok(false);
                };
                let Some(setter) = hit.interceptors.setter.clone() else {
                    return Ok(false);
                };
                let value = hit.scope.from_engine(value);
                setter(&hit.scope, &hit.object, &key, value).map_err(|exception| hit.scope.raise(exception))
            },
        )?,
    )?;

    let weak = registry.clone();
    hooks.set(
        "has",
        JsFunction::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, target: JsObject<'js>, key: String| -> rquickjs::Result<Option<bool>> {
                let Some(hit) = intercepted(&ctx, &weak, class, &target, Some(&key)) else {
                    return Ok(None);
                };
                let Some(query) = hit.interceptors.query.clone() else {
                    return Ok(None);
                };
                query(&hit.scope, &hit.object, &key).map_err(|exception| hit.scope.raise(exception))
            },
        )?,
    )?;

    let weak = registry.clone();
    hooks.set(
        "deleteProperty",
        JsFunction::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, target: JsObject<'js>, key: String| -> rquickjs::Result<Option<bool>> {
                let Some(hit) = intercepted(&ctx, &weak, class, &target, Some(&key)) else {
                    return Ok(None);
                };
                let Some(deleter) = hit.interceptors.deleter.clone() else {
                    return Ok(None);
                };
                deleter(&hit.scope, &hit.object, &key).map_err(|exception| hit.scope.raise(exception))
            },
        )?,
    )?;

    let weak = registry;
    hooks.set(
        "ownKeys",
        JsFunction::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, target: JsObject<'js>| -> rquickjs::Result<Vec<String>> {
                let Some(hit) = intercepted(&ctx, &weak, class, &target, None) else {
                    return Ok(Vec::new());
                };
                let Some(enumerator) = hit.interceptors.enumerator.clone() else {
                    return Ok(Vec::new());
                };
                enumerator(&hit.scope, &hit.object).map_err(|exception| hit.scope.raise(exception))
            },
        )?,
    )?;

    Ok(hooks)
}
