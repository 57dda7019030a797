//! Arena of bridged objects and classes.
//!
//! Every script-visible entity the bridge knows about has a [`Slot`] keyed by
//! a never-reused [`ObjectId`]. Host handles ([`Object`]) point into the
//! arena by id; parent/child links are ids too, so there are no reference
//! cycles between host and engine.
//!
//! Each slot keeps two engine references:
//!
//! - `strong`: a persistent handle, present while any host handle is alive
//!   (always for the global object);
//! - `weak`: a script `WeakRef` to the object, used to re-acquire it after
//!   the host let go.
//!
//! Collection is observed through an *anchor*: a native function stored in a
//! hidden, permanent property of the object. The engine drops the anchor's
//! closure when it finalizes the object, which queues the id in
//! `collected`. The queue is drained outside of any dispatch, at which point
//! the slot is removed and its destroy listeners run exactly once.

use crate::class::ClassSlot;
use crate::object::{HostFunction, Object, ObjectHandle, ObjectKind, Property};
use crate::support::Support;
use rquickjs::{Ctx, Function as JsFunction, Object as JsObject, Persistent};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Stable identity of a bridged object. Never reused within an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Numeric value of the id
    pub fn get(self) -> u64 {
        self.0
    }

    /// Reads back the number an anchor reports.
    pub(crate) fn from_tag(raw: f64) -> Option<Self> {
        (raw.is_finite() && raw >= 1.0 && raw.fract() == 0.0).then(|| ObjectId(raw as u64))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a class in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ClassId(pub(crate) usize);

type Stored = Persistent<JsObject<'static>>;

pub(crate) struct Slot {
    pub kind: ObjectKind,
    pub name: String,
    pub parent: Option<ObjectId>,
    strong: Option<Stored>,
    weak: Option<Stored>,
    handle: Weak<ObjectHandle>,
    tagged: bool,
    pub children: HashMap<String, ObjectId>,
    pub properties: HashMap<String, Property>,
    pub function: Option<Rc<HostFunction>>,
    pub class: Option<ClassId>,
    listeners: Vec<Box<dyn FnOnce()>>,
}

/// What to record for a new slot.
pub(crate) struct SlotInit {
    pub kind: ObjectKind,
    pub name: String,
    pub parent: Option<ObjectId>,
    pub function: Option<Rc<HostFunction>>,
    pub class: Option<ClassId>,
}

impl SlotInit {
    pub fn new(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            parent: None,
            function: None,
            class: None,
        }
    }

    pub fn parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn function(mut self, function: Rc<HostFunction>) -> Self {
        self.function = Some(function);
        self
    }

    pub fn class(mut self, class: ClassId) -> Self {
        self.class = Some(class);
        self
    }
}

/// Queues the owning slot for collection when the engine finalizes the
/// function holding it.
struct Anchor {
    id: ObjectId,
    registry: Weak<Registry>,
}

impl Anchor {
    fn id(&self) -> f64 {
        self.id.0 as f64
    }
}

impl Drop for Anchor {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.collected.borrow_mut().push(self.id);
        }
    }
}

pub(crate) struct Registry {
    slots: RefCell<HashMap<ObjectId, Slot>>,
    classes: RefCell<Vec<ClassSlot>>,
    collected: RefCell<Vec<ObjectId>>,
    next_id: Cell<u64>,
    support: RefCell<Option<Stored>>,
    global: RefCell<Option<Object>>,
    last_origin: RefCell<Option<String>>,
}

impl Registry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(HashMap::new()),
            classes: RefCell::new(Vec::new()),
            collected: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            support: RefCell::new(None),
            global: RefCell::new(None),
            last_origin: RefCell::new(None),
        })
    }

    pub fn next_id(&self) -> ObjectId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ObjectId(id)
    }

    pub fn set_support(&self, helpers: Stored) {
        *self.support.borrow_mut() = Some(helpers);
    }

    pub fn support<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Support<'js>> {
        let stored = self.support.borrow().clone();
        match stored {
            Some(helpers) => Ok(Support::new(helpers.restore(ctx)?)),
            None => Err(rquickjs::Error::new_from_js("undefined", "support prelude")),
        }
    }

    pub fn set_global(&self, global: Object) {
        *self.global.borrow_mut() = Some(global);
    }

    pub fn global(&self) -> Option<Object> {
        self.global.borrow().clone()
    }

    pub fn set_last_origin(&self, origin: &str) {
        *self.last_origin.borrow_mut() = Some(origin.to_string());
    }

    pub fn last_origin(&self) -> Option<String> {
        self.last_origin.borrow().clone()
    }

    /// Records `exposed` under `id` and returns the first host handle to it.
    ///
    /// `target` receives the anchor; it differs from `exposed` only for
    /// proxied class instances, where the proxy is what scripts see.
    pub fn insert<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        id: ObjectId,
        target: &JsObject<'js>,
        exposed: JsObject<'js>,
        init: SlotInit,
    ) -> rquickjs::Result<Object> {
        let support = self.support(ctx)?;
        let anchor = Anchor {
            id,
            registry: Rc::downgrade(self),
        };
        let anchor = JsFunction::new(ctx.clone(), move || anchor.id())?;
        let tagged = support.tag(target, anchor)?;
        if !tagged {
            log::warn!(
                "Object {} ({}) refused the bridge tag; its identity will not be tracked",
                id,
                init.name
            );
        }
        let weak = support.weak(&exposed)?;

        let handle = Rc::new(ObjectHandle::new(id, init.kind, Rc::downgrade(self)));
        let slot = Slot {
            kind: init.kind,
            name: init.name,
            parent: init.parent,
            strong: Some(Persistent::save(ctx, exposed)),
            weak: Some(Persistent::save(ctx, weak)),
            handle: Rc::downgrade(&handle),
            tagged,
            children: HashMap::new(),
            properties: HashMap::new(),
            function: init.function,
            class: init.class,
            listeners: Vec::new(),
        };

        log::debug!("Registered {:?} {} as {}", slot.kind, slot.name, id);
        let replaced = {
            let mut slots = self.slots.borrow_mut();
            let replaced = match slot.parent.and_then(|parent| slots.get_mut(&parent)) {
                Some(parent) => parent.children.insert(slot.name.clone(), id),
                None => None,
            };
            slots.insert(id, slot);
            replaced
        };
        if let Some(previous) = replaced {
            log::debug!("Child {} replaced by {}", previous, id);
        }
        Ok(Object::from_handle(handle))
    }

    /// Returns a host handle for `id`, re-acquiring the engine value when no
    /// handle is alive. `in_hand` is used when the slot cannot produce the
    /// value itself.
    pub fn handle<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        id: ObjectId,
        in_hand: Option<&JsObject<'js>>,
    ) -> Option<Object> {
        let (kind, live, strong, weak) = {
            let slots = self.slots.borrow();
            let slot = slots.get(&id)?;
            (
                slot.kind,
                slot.handle.upgrade(),
                slot.strong.clone(),
                slot.weak.clone(),
            )
        };
        if let Some(handle) = live {
            return Some(Object::from_handle(handle));
        }

        let value = strong
            .and_then(|stored| stored.restore(ctx).ok())
            .or_else(|| weak.and_then(|stored| self.deref_weak(ctx, stored)))
            .or_else(|| in_hand.cloned())?;

        let handle = Rc::new(ObjectHandle::new(id, kind, Rc::downgrade(self)));
        let stored = Persistent::save(ctx, value);
        let previous = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&id) {
                Some(slot) => {
                    slot.handle = Rc::downgrade(&handle);
                    Ok(slot.strong.replace(stored))
                }
                None => Err(stored),
            }
        };
        match previous {
            Ok(previous) => {
                drop(previous);
                Some(Object::from_handle(handle))
            }
            Err(_) => None,
        }
    }

    fn deref_weak<'js>(&self, ctx: &Ctx<'js>, stored: Stored) -> Option<JsObject<'js>> {
        let weak = stored.restore(ctx).ok()?;
        match self.support(ctx).and_then(|support| support.deref(weak)) {
            Ok(value) => value,
            Err(err) => {
                if matches!(err, rquickjs::Error::Exception) {
                    ctx.catch();
                }
                log::warn!("Failed to dereference weak object: {}", err);
                None
            }
        }
    }

    /// The engine value of a slot whose host handle is alive.
    pub fn engine_object<'js>(&self, ctx: &Ctx<'js>, id: ObjectId) -> Option<JsObject<'js>> {
        let (strong, weak) = {
            let slots = self.slots.borrow();
            let slot = slots.get(&id)?;
            (slot.strong.clone(), slot.weak.clone())
        };
        match strong {
            Some(stored) => stored.restore(ctx).ok(),
            None => weak.and_then(|stored| self.deref_weak(ctx, stored)),
        }
    }

    /// Called when the last host handle of `id` goes away.
    pub fn release(&self, id: ObjectId) {
        let (strong, destroyed) = {
            let mut slots = self.slots.borrow_mut();
            let Some(slot) = slots.get_mut(&id) else {
                return;
            };
            if slot.kind == ObjectKind::Global || slot.handle.strong_count() > 0 {
                return;
            }
            if slot.tagged {
                (slot.strong.take(), None)
            } else {
                (None, Self::unlink(&mut slots, id))
            }
        };
        drop(strong);
        if let Some(slot) = destroyed {
            self.finish(id, slot);
        }
    }

    fn unlink(slots: &mut HashMap<ObjectId, Slot>, id: ObjectId) -> Option<Slot> {
        let slot = slots.remove(&id)?;
        if let Some(parent) = slot.parent.and_then(|parent| slots.get_mut(&parent)) {
            if parent.children.get(&slot.name) == Some(&id) {
                parent.children.remove(&slot.name);
            }
        }
        Some(slot)
    }

    fn finish(&self, id: ObjectId, mut slot: Slot) {
        log::debug!("Destroyed {:?} {} ({})", slot.kind, slot.name, id);
        let listeners = std::mem::take(&mut slot.listeners);
        drop(slot);
        for listener in listeners {
            listener();
        }
    }

    /// Removes the slots whose engine values were finalized and notifies
    /// their listeners.
    pub fn deliver_collected(&self) {
        loop {
            let ids = std::mem::take(&mut *self.collected.borrow_mut());
            if ids.is_empty() {
                break;
            }
            for id in ids {
                let slot = {
                    let mut slots = self.slots.borrow_mut();
                    let collectable = slots.get(&id).is_some_and(|slot| {
                        slot.tagged
                            && slot.kind != ObjectKind::Global
                            && slot.handle.strong_count() == 0
                    });
                    if collectable {
                        Self::unlink(&mut slots, id)
                    } else {
                        None
                    }
                };
                if let Some(slot) = slot {
                    self.finish(id, slot);
                }
            }
        }
    }

    pub fn with_slot<R>(&self, id: ObjectId, f: impl FnOnce(&Slot) -> R) -> Option<R> {
        self.slots.borrow().get(&id).map(f)
    }

    pub fn with_slot_mut<R>(&self, id: ObjectId, f: impl FnOnce(&mut Slot) -> R) -> Option<R> {
        self.slots.borrow_mut().get_mut(&id).map(f)
    }

    pub fn add_listener(&self, id: ObjectId, listener: Box<dyn FnOnce()>) {
        let rejected = {
            let mut slots = self.slots.borrow_mut();
            match slots.get_mut(&id) {
                Some(slot) => {
                    slot.listeners.push(listener);
                    None
                }
                None => Some(listener),
            }
        };
        if rejected.is_some() {
            log::error!("Destroy listener added to unknown object {}", id);
        }
    }

    pub fn child_of(&self, parent: ObjectId, name: &str) -> Option<ObjectId> {
        self.with_slot(parent, |slot| slot.children.get(name).copied())
            .flatten()
    }

    pub fn function_of(&self, id: ObjectId) -> Option<Rc<HostFunction>> {
        self.with_slot(id, |slot| slot.function.clone()).flatten()
    }

    pub fn property_of(&self, id: ObjectId, name: &str) -> Option<Property> {
        self.with_slot(id, |slot| slot.properties.get(name).cloned())
            .flatten()
    }

    pub fn name_of(&self, id: ObjectId) -> Option<String> {
        self.with_slot(id, |slot| slot.name.clone())
    }

    pub fn class_of(&self, id: ObjectId) -> Option<ClassId> {
        self.with_slot(id, |slot| slot.class).flatten()
    }

    pub fn class_count(&self) -> usize {
        self.classes.borrow().len()
    }

    pub fn add_class(&self, class: ClassSlot) -> ClassId {
        let mut classes = self.classes.borrow_mut();
        classes.push(class);
        ClassId(classes.len() - 1)
    }

    pub fn with_class<R>(&self, id: ClassId, f: impl FnOnce(&ClassSlot) -> R) -> Option<R> {
        self.classes.borrow().get(id.0).map(f)
    }

    pub fn with_class_mut<R>(&self, id: ClassId, f: impl FnOnce(&mut ClassSlot) -> R) -> Option<R> {
        self.classes.borrow_mut().get_mut(id.0).map(f)
    }

    /// Number of live slots, the global included.
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Releases every engine reference held by the registry. Listeners are
    /// dropped without running.
    pub fn shutdown(&self) {
        let slots = std::mem::take(&mut *self.slots.borrow_mut());
        let classes = std::mem::take(&mut *self.classes.borrow_mut());
        let global = self.global.borrow_mut().take();
        let support = self.support.borrow_mut().take();
        drop(global);
        drop(slots);
        drop(classes);
        drop(support);
        self.collected.borrow_mut().clear();
    }
}
