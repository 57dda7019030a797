//! Typed access to the support prelude.
//!
//! A handful of operations (dates, weak references, proxies, hidden
//! properties) are simplest to express in script. The prelude in
//! `support.js` is evaluated once per engine and its helper object is kept
//! in the registry; [`Support`] wraps each helper with a typed call.

use rquickjs::function::IntoArgs;
use rquickjs::{Ctx, FromJs, Function as JsFunction, Object as JsObject, Value as JsValue};

/// Source of the helper object, evaluated at engine start.
pub(crate) const PRELUDE: &str = include_str!("support.js");

/// Helper object of the prelude, bound to an active context.
pub(crate) struct Support<'js> {
    helpers: JsObject<'js>,
}

impl<'js> Support<'js> {
    pub(crate) fn new(helpers: JsObject<'js>) -> Self {
        Self { helpers }
    }

    /// Evaluates the prelude and returns its helper object.
    pub(crate) fn install(ctx: &Ctx<'js>) -> rquickjs::Result<JsObject<'js>> {
        ctx.eval(PRELUDE)
    }

    fn invoke<A, R>(&self, name: &str, args: A) -> rquickjs::Result<R>
    where
        A: IntoArgs<'js>,
        R: FromJs<'js>,
    {
        let helper: JsFunction = self.helpers.get(name)?;
        helper.call(args)
    }

    pub(crate) fn is_date(&self, value: &JsValue<'js>) -> rquickjs::Result<bool> {
        self.invoke("isDate", (value.clone(),))
    }

    pub(crate) fn make_date(&self, millis: f64) -> rquickjs::Result<JsValue<'js>> {
        self.invoke("makeDate", (millis,))
    }

    pub(crate) fn time_of(&self, date: &JsValue<'js>) -> rquickjs::Result<f64> {
        self.invoke("timeOf", (date.clone(),))
    }

    pub(crate) fn describe(&self, value: &JsValue<'js>) -> rquickjs::Result<String> {
        self.invoke("describe", (value.clone(),))
    }

    pub(crate) fn stringify(&self, value: &JsValue<'js>) -> rquickjs::Result<String> {
        self.invoke("stringify", (value.clone(),))
    }

    pub(crate) fn error_info(&self, thrown: JsValue<'js>) -> rquickjs::Result<JsObject<'js>> {
        self.invoke("errorInfo", (thrown,))
    }

    pub(crate) fn make_error(&self, name: &str, message: &str) -> rquickjs::Result<JsValue<'js>> {
        self.invoke("makeError", (name, message))
    }

    /// Attaches `anchor` to `target` as a hidden, permanent property.
    /// Returns false when `target` refuses new properties.
    pub(crate) fn tag(&self, target: &JsObject<'js>, anchor: JsFunction<'js>) -> rquickjs::Result<bool> {
        self.invoke("tag", (target.clone(), anchor))
    }

    /// Object id stored in the anchor of `object`, if it has one of its own.
    pub(crate) fn tag_of(&self, object: &JsObject<'js>) -> rquickjs::Result<Option<f64>> {
        self.invoke("tagOf", (object.clone(),))
    }

    pub(crate) fn weak(&self, object: &JsObject<'js>) -> rquickjs::Result<JsObject<'js>> {
        self.invoke("weak", (object.clone(),))
    }

    pub(crate) fn deref(&self, weak: JsObject<'js>) -> rquickjs::Result<Option<JsObject<'js>>> {
        self.invoke("deref", (weak,))
    }

    pub(crate) fn define_accessor(
        &self,
        object: &JsObject<'js>,
        name: &str,
        getter: JsValue<'js>,
        setter: JsValue<'js>,
    ) -> rquickjs::Result<()> {
        self.invoke("defineAccessor", (object.clone(), name, getter, setter))
    }

    pub(crate) fn make_class(&self, name: &str, construct: JsFunction<'js>) -> rquickjs::Result<JsObject<'js>> {
        self.invoke("makeClass", (name, construct))
    }

    pub(crate) fn instantiate(&self, prototype: &JsObject<'js>) -> rquickjs::Result<JsObject<'js>> {
        self.invoke("instantiate", (prototype.clone(),))
    }

    pub(crate) fn make_proxy(&self, target: &JsObject<'js>, hooks: &JsObject<'js>) -> rquickjs::Result<JsObject<'js>> {
        self.invoke("makeProxy", (target.clone(), hooks.clone()))
    }
}
