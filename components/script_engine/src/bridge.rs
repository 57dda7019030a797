//! Conversion between host [`Value`]s and engine values.
//!
//! Both directions are total: anything that cannot be represented is logged
//! and becomes `undefined`/[`Value::Undefined`], and the rest of the
//! conversion carries on.

use crate::object::{Object, ObjectKind};
use crate::registry::SlotInit;
use crate::scope::Scope;
use core_types::Value;
use rquickjs::{Array, Object as JsObject, Value as JsValue};
use std::collections::HashMap;

/// Nesting depth at which conversion into the host stops. Script object
/// graphs may be cyclic; host values are not.
pub const MAX_DEPTH: usize = 64;

const MILLIS_PER_SECOND: f64 = 1000.0;

/// Converts a host value into an engine value.
pub(crate) fn to_js<'js>(scope: &Scope<'js>, value: &Value) -> rquickjs::Result<JsValue<'js>> {
    let ctx = scope.ctx().clone();
    let converted = match value {
        Value::Undefined => JsValue::new_undefined(ctx),
        Value::Boolean(b) => JsValue::new_bool(ctx, *b),
        Value::Integer(n) => match i32::try_from(*n) {
            Ok(small) => JsValue::new_int(ctx, small),
            Err(_) => JsValue::new_float(ctx, *n as f64),
        },
        Value::Double(d) => JsValue::new_float(ctx, *d),
        Value::String(s) => rquickjs::String::from_str(ctx, s)?.into_value(),
        Value::Date(secs) => scope.support()?.make_date(*secs as f64 * MILLIS_PER_SECOND)?,
        Value::List(items) => {
            let array = Array::new(ctx)?;
            for (index, item) in items.iter().enumerate() {
                array.set(index, to_js(scope, item)?)?;
            }
            array.into_value()
        }
        Value::Map(map) => {
            let object = JsObject::new(ctx)?;
            for (key, item) in map {
                object.set(key.as_str(), to_js(scope, item)?)?;
            }
            object.into_value()
        }
        Value::Custom(custom) => match Object::from_value(value) {
            Some(object) => match object.engine_object(scope) {
                Ok(engine) => engine.into_value(),
                Err(err) => {
                    log::warn!("Object {} cannot be passed to the engine: {}", object.id(), err);
                    JsValue::new_undefined(ctx)
                }
            },
            None => {
                log::warn!("Custom value with tag {} has no script representation", custom.tag());
                JsValue::new_undefined(ctx)
            }
        },
    };
    Ok(converted)
}

/// Converts an engine value into a host value.
pub(crate) fn from_js<'js>(scope: &Scope<'js>, value: JsValue<'js>) -> Value {
    from_js_at(scope, value, 0)
}

fn from_js_at<'js>(scope: &Scope<'js>, value: JsValue<'js>, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        log::warn!("Script value nested deeper than {} levels; truncating", MAX_DEPTH);
        return Value::Undefined;
    }

    if value.is_undefined() || value.is_null() {
        return Value::Undefined;
    }
    if let Some(b) = value.as_bool() {
        return Value::Boolean(b);
    }
    if let Some(n) = value.as_int() {
        return Value::Integer(n.into());
    }
    if let Some(d) = value.as_float() {
        return Value::Double(d);
    }
    if let Some(s) = value.as_string() {
        return match s.to_string() {
            Ok(s) => Value::String(s),
            Err(err) => {
                scope.discard(err, "read script string");
                Value::Undefined
            }
        };
    }

    let Some(object) = value.as_object().cloned() else {
        log::warn!("Unsupported script value of type {:?}", value.type_of());
        return Value::Undefined;
    };

    if let Some(secs) = date_seconds(scope, &value) {
        return Value::Date(secs);
    }
    if let Some(array) = value.as_array() {
        return Value::List(
            (0..array.len())
                .map(|index| match array.get::<JsValue>(index) {
                    Ok(item) => from_js_at(scope, item, depth + 1),
                    Err(err) => {
                        scope.discard(err, "read array element");
                        Value::Undefined
                    }
                })
                .collect(),
        );
    }
    if let Some(known) = scope.tagged_object(&object) {
        return known.into_value();
    }
    if value.is_function() {
        return adopt(scope, object);
    }

    let mut map = HashMap::new();
    for key in object.keys::<String>() {
        let key = match key {
            Ok(key) => key,
            Err(err) => {
                scope.discard(err, "enumerate object keys");
                continue;
            }
        };
        match object.get::<_, JsValue>(key.as_str()) {
            Ok(item) => {
                map.insert(key, from_js_at(scope, item, depth + 1));
            }
            Err(err) => scope.discard(err, "read object property"),
        }
    }
    Value::Map(map)
}

fn date_seconds<'js>(scope: &Scope<'js>, value: &JsValue<'js>) -> Option<i64> {
    let read = || -> rquickjs::Result<Option<i64>> {
        let support = scope.support()?;
        if !support.is_date(value)? {
            return Ok(None);
        }
        let millis = support.time_of(value)?;
        Ok(Some((millis / MILLIS_PER_SECOND).trunc() as i64))
    };
    read().unwrap_or_else(|err| {
        scope.discard(err, "inspect date");
        None
    })
}

/// Wraps a script function seen for the first time in a host object. The
/// tag it receives makes later conversions find the same object.
fn adopt<'js>(scope: &Scope<'js>, function: JsObject<'js>) -> Value {
    let name = match function.get::<_, Option<String>>("name") {
        Ok(name) => name.unwrap_or_default(),
        Err(err) => {
            scope.discard(err, "read function name");
            String::new()
        }
    };
    let registry = scope.registry();
    let init = SlotInit::new(ObjectKind::AdoptedScriptFunction, name);
    match registry.insert(scope.ctx(), registry.next_id(), &function, function.clone(), init) {
        Ok(object) => object.into_value(),
        Err(err) => {
            scope.discard(err, "adopt script function");
            Value::Undefined
        }
    }
}
