//! Engine lifecycle and the host-facing facade.

use crate::class::Class;
use crate::config::{self, EngineConfig};
use crate::error::{EngineError, HostException, ScriptError, ScriptResult};
use crate::object::{Object, ObjectKind};
use crate::registry::{Registry, SlotInit};
use crate::scope::Scope;
use crate::support::Support;
use core_types::Value;
use rquickjs::{Context, Ctx, Persistent, Runtime};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

thread_local! {
    static ENGINE_RUNNING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as owning an engine until dropped.
struct RunningMarker;

impl RunningMarker {
    fn acquire() -> Result<Self, EngineError> {
        ENGINE_RUNNING.with(|running| {
            if running.replace(true) {
                Err(EngineError::AlreadyRunning)
            } else {
                Ok(RunningMarker)
            }
        })
    }
}

impl Drop for RunningMarker {
    fn drop(&mut self) {
        ENGINE_RUNNING.with(|running| running.set(false));
    }
}

/// Clears the active flag when an activation ends, unwinding included.
struct Activation<'a>(&'a Cell<bool>);

impl<'a> Activation<'a> {
    fn acquire(active: &'a Cell<bool>) -> Self {
        assert!(
            !active.replace(true),
            "script engine re-entered while active; use the Scope passed to the handler"
        );
        Activation(active)
    }
}

impl Drop for Activation<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// An embedded script engine: one runtime, one context and the registry of
/// bridged objects.
///
/// Only one engine may exist per thread at a time.
///
/// # Example
/// ```
/// use script_engine::Engine;
/// use core_types::Value;
///
/// let engine = Engine::new().unwrap();
/// let sum = engine.evaluate("1 + 2", "sum.js").unwrap();
/// assert_eq!(sum, Value::from(3));
/// ```
pub struct Engine {
    // Field order is drop order: handles go before the runtime.
    global: Object,
    registry: Rc<Registry>,
    context: Context,
    runtime: Runtime,
    config: EngineConfig,
    executable: Option<PathBuf>,
    active: Cell<bool>,
    _marker: RunningMarker,
}

impl Engine {
    /// Start an engine with the default configuration.
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] when this thread already has an
    /// engine.
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    /// Start an engine with `config`.
    ///
    /// # Arguments
    /// * `config` - Runtime limits and the executable path
    ///
    /// # Errors
    /// [`EngineError::AlreadyRunning`] when this thread already has an
    /// engine, [`EngineError::Runtime`] when the runtime cannot be created
    /// and [`EngineError::Support`] when the support prelude fails.
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        let marker = RunningMarker::acquire()?;

        let runtime = Runtime::new()?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }
        if let Some(threshold) = config.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        let context = Context::full(&runtime)?;

        let registry = Registry::new();
        let global = context.with(|ctx| {
            let installed = Self::install(&ctx, &registry);
            if installed.is_err() {
                registry.shutdown();
            }
            installed
        })?;

        let executable = config.resolve_executable();
        log::info!(
            "Script engine started (executable: {})",
            executable
                .as_deref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        Ok(Self {
            global,
            registry,
            context,
            runtime,
            config,
            executable,
            active: Cell::new(false),
            _marker: marker,
        })
    }

    fn install<'js>(ctx: &Ctx<'js>, registry: &Rc<Registry>) -> Result<Object, EngineError> {
        let helpers = Support::install(ctx).map_err(|err| {
            let detail = if matches!(err, rquickjs::Error::Exception) {
                let thrown = ctx.catch();
                thrown
                    .as_exception()
                    .map(|exception| exception.to_string())
                    .unwrap_or_else(|| format!("{:?}", thrown))
            } else {
                err.to_string()
            };
            EngineError::Support(detail)
        })?;
        registry.set_support(Persistent::save(ctx, helpers));

        let globals = ctx.globals();
        globals.set("global", globals.clone())?;
        let init = SlotInit::new(ObjectKind::Global, "global");
        let global = registry.insert(ctx, registry.next_id(), &globals, globals.clone(), init)?;
        registry.set_global(global.clone());
        Ok(global)
    }

    /// Activates the engine and runs `f` with the active [`Scope`].
    ///
    /// Destroy listeners of objects the engine collected meanwhile run after
    /// `f` returns.
    ///
    /// # Panics
    /// When called while the engine is already active, e.g. from a host
    /// handler. Handlers get the active scope as their first argument.
    pub fn with<R>(&self, f: impl for<'js> FnOnce(&Scope<'js>) -> R) -> R {
        let activation = Activation::acquire(&self.active);
        let result = self.context.with(|ctx| {
            let scope = Scope::new(ctx, self.registry.clone(), self.global.clone());
            f(&scope)
        });
        drop(activation);
        self.registry.deliver_collected();
        result
    }

    /// Compile and run `source`, labelled `origin` in error reports.
    ///
    /// # Errors
    /// [`ScriptError::Compile`] or [`ScriptError::Runtime`] with the
    /// formatted location of the failure.
    pub fn evaluate(&self, source: &str, origin: &str) -> ScriptResult<Value> {
        self.with(|scope| scope.evaluate(source, origin))
    }

    /// Read the script at `path` and evaluate it with the path as origin.
    ///
    /// # Errors
    /// [`ScriptError::Io`] when the file cannot be read, otherwise as
    /// [`evaluate`](Self::evaluate).
    pub fn evaluate_file(&self, path: impl AsRef<Path>) -> ScriptResult<Value> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.evaluate(&source, &path.display().to_string())
    }

    /// Call the function at the dotted `path`. See [`Scope::call`].
    pub fn call(&self, path: &str, args: &[Value]) -> ScriptResult<Value> {
        self.with(|scope| scope.call(path, args))
    }

    /// The global object.
    pub fn global_object(&self) -> Object {
        self.global.clone()
    }

    /// Register a class. See [`Scope::create_class`].
    pub fn create_class(&self, name: &str) -> ScriptResult<Class> {
        self.with(|scope| scope.create_class(name))
    }

    /// Create a detached plain object.
    pub fn create_object(&self) -> ScriptResult<Object> {
        self.with(|scope| scope.create_object())
    }

    /// Builds the exception a handler returns to throw `value`.
    pub fn throw_exception(&self, value: impl Into<Value>) -> HostException {
        HostException::value(value)
    }

    /// Whether `value` carries a callable object of this engine.
    pub fn is_function(&self, value: &Value) -> bool {
        self.with(|scope| scope.is_function(value))
    }

    /// The object of this engine carried by `value`, if any.
    pub fn to_object(&self, value: &Value) -> Option<Object> {
        self.with(|scope| scope.to_object(value))
    }

    /// Wraps `object` into a host value.
    pub fn from_object(&self, object: &Object) -> Value {
        object.clone().into_value()
    }

    /// Runs a full collection and delivers the resulting destroy
    /// notifications.
    ///
    /// # Panics
    /// When called while the engine is active.
    pub fn collect_garbage(&self) {
        let activation = Activation::acquire(&self.active);
        self.runtime.run_gc();
        drop(activation);
        self.registry.deliver_collected();
    }

    /// Configuration the engine was started with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Path of the running executable, if known.
    pub fn executable_path(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Directory holding the running executable, where runtime resources
    /// are looked up.
    pub fn resource_dir(&self) -> Option<&Path> {
        self.executable.as_deref().and_then(config::executable_dir)
    }

    /// Number of objects the registry tracks, the global included.
    pub fn live_objects(&self) -> usize {
        self.registry.len()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let registry = self.registry.clone();
        self.context.with(|_| registry.shutdown());
        log::info!("Script engine stopped");
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("live_objects", &self.registry.len())
            .finish()
    }
}
