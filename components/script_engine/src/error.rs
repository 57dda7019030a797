//! Error types for the script bridge.
//!
//! Failures flow in two directions. [`ScriptError`] is what host code gets
//! back when something inside the engine fails; [`HostException`] is what a
//! host handler returns to raise an exception into the script that called it.

use crate::scope::Scope;
use core_types::{ErrorKind, SourcePosition, StackFrame, Value};
use regex::Regex;
use rquickjs::{Object as JsObject, Value as JsValue};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use thiserror::Error;

/// File name the runtime assigns to every evaluated script.
pub(crate) const ENGINE_FILENAME: &str = "eval_script";

/// Which bridge operation produced an [`ErrorReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorHeader {
    /// The evaluated source failed to parse
    Compile,
    /// The evaluated source threw while running
    Evaluate,
    /// A function call threw
    Call,
    /// Reading a property threw
    Property,
    /// Writing a property threw
    SetProperty,
}

impl ErrorHeader {
    /// The label used in formatted reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorHeader::Compile => "Compile error",
            ErrorHeader::Evaluate => "Evaluate error",
            ErrorHeader::Call => "Call error",
            ErrorHeader::Property => "Property",
            ErrorHeader::SetProperty => "Set property",
        }
    }
}

impl fmt::Display for ErrorHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A script exception captured with its location.
///
/// Formats as `origin:line:column: header: message {start-end}`, where
/// `start` and `end` are byte offsets into the evaluated source (0 when the
/// source is not at hand).
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Origin label of the script the error is attributed to
    pub resource: String,
    /// Operation that failed
    pub header: ErrorHeader,
    /// Human readable message, `Name: message` for error objects
    pub message: String,
    /// Built-in error kind, when the thrown value is a built-in error
    pub kind: Option<ErrorKind>,
    /// Where the error happened
    pub position: SourcePosition,
    /// End offset of the reported range
    pub end: usize,
    /// Parsed script backtrace, innermost frame first
    pub stack: Vec<StackFrame>,
    /// The thrown value, converted to the host model
    pub exception: Value,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}: {} {{{}-{}}}",
            self.resource,
            self.position.line,
            self.position.column,
            self.header,
            self.message,
            self.position.offset,
            self.end
        )
    }
}

/// Errors returned to host code by bridge operations.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Source failed to compile
    #[error("{0}")]
    Compile(ErrorReport),

    /// Script code threw, or a host handler raised an exception
    #[error("{0}")]
    Runtime(ErrorReport),

    /// A dotted path or property did not resolve to what was asked for
    #[error("unresolved: {what}")]
    Unresolved {
        /// What was being looked up
        what: String,
    },

    /// The object cannot be called
    #[error("{name} is not callable")]
    NotCallable {
        /// Name of the object
        name: String,
    },

    /// The object is no longer backed by a live script value
    #[error("object is no longer backed by a script value")]
    Expired,

    /// The engine the object belongs to has been shut down, or is a
    /// different engine than the active scope's
    #[error("object does not belong to the active engine")]
    EngineGone,

    /// Any other runtime failure (allocation, type conversion, ...)
    #[error("engine failure: {0}")]
    Engine(String),

    /// Reading a script file failed
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

impl ScriptError {
    /// The captured report, for compile and runtime errors.
    pub fn report(&self) -> Option<&ErrorReport> {
        match self {
            ScriptError::Compile(report) | ScriptError::Runtime(report) => Some(report),
            _ => None,
        }
    }

    /// The value the script threw, if any.
    pub fn exception(&self) -> Option<&Value> {
        self.report().map(|report| &report.exception)
    }

    pub(crate) fn unresolved(what: impl Into<String>) -> Self {
        ScriptError::Unresolved { what: what.into() }
    }
}

/// Result type for bridge operations
pub type ScriptResult<T> = Result<T, ScriptError>;

/// Errors raised while constructing an [`Engine`](crate::Engine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// An engine is already alive on this thread
    #[error("a script engine is already running on this thread")]
    AlreadyRunning,

    /// The embedded runtime could not be created
    #[error("failed to start the script runtime: {0}")]
    Runtime(#[from] rquickjs::Error),

    /// The support prelude failed to install
    #[error("failed to install the support prelude: {0}")]
    Support(String),
}

/// An exception raised by a host handler into the calling script.
///
/// # Examples
///
/// ```
/// use script_engine::HostException;
/// use core_types::{ErrorKind, Value};
///
/// let raised = HostException::type_error("expected a string");
/// assert_eq!(raised.to_string(), "TypeError: expected a string");
///
/// let thrown = HostException::value(Value::from(42));
/// assert_eq!(thrown.to_string(), "42");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum HostException {
    /// Throw this value as-is
    Value(Value),
    /// Throw a freshly constructed built-in error
    Error {
        /// Constructor to use
        kind: ErrorKind,
        /// Error message
        message: String,
    },
}

impl HostException {
    /// Throws `value` unchanged.
    pub fn value(value: impl Into<Value>) -> Self {
        HostException::Value(value.into())
    }

    /// Throws a plain `Error` with `message`.
    pub fn error(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::Error, message)
    }

    /// Throws a `TypeError` with `message`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::TypeError, message)
    }

    /// Throws a `RangeError` with `message`.
    pub fn range_error(message: impl Into<String>) -> Self {
        Self::of_kind(ErrorKind::RangeError, message)
    }

    /// Throws a built-in error of `kind`.
    pub fn of_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        HostException::Error {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostException::Value(value) => write!(f, "{}", value),
            HostException::Error { kind, message } => write!(f, "{}: {}", kind, message),
        }
    }
}

impl std::error::Error for HostException {}

/// Rethrows the original exception when the error carries one.
impl From<ScriptError> for HostException {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Compile(report) | ScriptError::Runtime(report) => {
                if let Some(kind) = report.kind {
                    let prefix = format!("{}: ", kind);
                    let message = report.message.strip_prefix(&prefix).unwrap_or(&report.message);
                    HostException::of_kind(kind, message)
                } else if report.exception.is_undefined() {
                    HostException::error(report.message)
                } else {
                    HostException::Value(report.exception)
                }
            }
            other => HostException::error(other.to_string()),
        }
    }
}

/// Result type for host handlers
pub type HostResult<T> = Result<T, HostException>;

/// Source being evaluated when an exception was caught.
pub(crate) struct Evaluated<'a> {
    pub origin: &'a str,
    pub source: &'a str,
}

/// Builds a [`ScriptError`] out of the exception pending in `scope`.
pub(crate) fn capture(
    scope: &Scope<'_>,
    err: rquickjs::Error,
    header: ErrorHeader,
    evaluated: Option<&Evaluated<'_>>,
) -> ScriptError {
    if !matches!(err, rquickjs::Error::Exception) {
        return ScriptError::Engine(err.to_string());
    }

    let thrown = scope.ctx().catch();
    let report = build_report(scope, thrown, header, evaluated);

    let compile_failure = header == ErrorHeader::Evaluate
        && report.kind == Some(ErrorKind::SyntaxError)
        && report.stack.iter().all(|frame| frame.function_name.is_none());
    if compile_failure {
        ScriptError::Compile(ErrorReport {
            header: ErrorHeader::Compile,
            ..report
        })
    } else {
        ScriptError::Runtime(report)
    }
}

/// Report for a host handler that raised while called directly from host
/// code, without the engine in between.
pub(crate) fn host_report(resource: &str, exception: HostException) -> ScriptError {
    let (message, kind, thrown) = match exception {
        HostException::Value(value) => (value.to_string(), None, value),
        HostException::Error { kind, message } => {
            (format!("{}: {}", kind, message), Some(kind), Value::Undefined)
        }
    };
    ScriptError::Runtime(ErrorReport {
        resource: resource.to_string(),
        header: ErrorHeader::Call,
        message,
        kind,
        position: SourcePosition::default(),
        end: 0,
        stack: Vec::new(),
        exception: thrown,
    })
}

#[derive(Default)]
struct ExceptionInfo {
    name: Option<String>,
    message: Option<String>,
    line: u32,
    column: u32,
    stack: String,
    text: String,
}

fn exception_info<'js>(scope: &Scope<'js>, thrown: &JsValue<'js>) -> ExceptionInfo {
    let read = || -> rquickjs::Result<ExceptionInfo> {
        let info: JsObject = scope.support()?.error_info(thrown.clone())?;
        Ok(ExceptionInfo {
            name: info.get("name")?,
            message: info.get("message")?,
            line: info.get("line")?,
            column: info.get("column")?,
            stack: info.get("stack")?,
            text: info.get("text")?,
        })
    };
    match read() {
        Ok(info) => info,
        Err(err) => {
            if matches!(err, rquickjs::Error::Exception) {
                scope.ctx().catch();
            }
            log::warn!("Failed to inspect thrown value: {}", err);
            ExceptionInfo {
                text: "<uninspectable exception>".to_string(),
                ..ExceptionInfo::default()
            }
        }
    }
}

fn build_report<'js>(
    scope: &Scope<'js>,
    thrown: JsValue<'js>,
    header: ErrorHeader,
    evaluated: Option<&Evaluated<'_>>,
) -> ErrorReport {
    let info = exception_info(scope, &thrown);
    let label = evaluated
        .map(|e| e.origin.to_string())
        .or_else(|| scope.registry().last_origin());
    let stack = parse_stack(&info.stack, label.as_deref());

    let (mut line, mut column) = (info.line, info.column);
    let mut resource = label.clone();
    if line == 0 {
        if let Some(frame) = stack.iter().find(|frame| frame.line > 0) {
            line = frame.line;
            column = frame.column;
            resource = frame.source_url.clone().or(resource);
        }
    }

    let (position, end) = match evaluated {
        Some(e) if line > 0 => {
            let position = SourcePosition::locate(e.source, line, column);
            let end = position.line_end(e.source);
            (position, end)
        }
        _ => (
            SourcePosition {
                line,
                column,
                offset: 0,
            },
            0,
        ),
    };

    let kind = info.name.as_deref().and_then(|name| name.parse().ok());
    let message = match (&info.name, &info.message) {
        (Some(name), Some(message)) => format!("{}: {}", name, message),
        _ => info.text.clone(),
    };

    ErrorReport {
        resource: resource.unwrap_or_else(|| "<native>".to_string()),
        header,
        message,
        kind,
        position,
        end,
        stack,
        exception: scope.from_engine(thrown),
    }
}

fn frame_patterns() -> Option<&'static (Regex, Regex)> {
    static PATTERNS: OnceLock<Option<(Regex, Regex)>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let compile = || -> Result<(Regex, Regex), regex::Error> {
                Ok((
                    Regex::new(
                        r"^\s*at\s+(?P<func>.*?)\s+\((?P<url>.*?)(?::(?P<line>\d+))?(?::(?P<col>\d+))?\)\s*$",
                    )?,
                    Regex::new(r"^\s*at\s+(?P<url>[^\s()]+?)(?::(?P<line>\d+))?(?::(?P<col>\d+))?\s*$")?,
                ))
            };
            compile()
                .map_err(|e| log::error!("Failed to compile stack frame pattern: {}", e))
                .ok()
        })
        .as_ref()
}

/// Parses an engine backtrace, attributing frames from evaluated scripts to
/// `origin`.
pub(crate) fn parse_stack(stack: &str, origin: Option<&str>) -> Vec<StackFrame> {
    let Some((named, bare)) = frame_patterns() else {
        return Vec::new();
    };

    stack
        .lines()
        .filter_map(|line| {
            let (captures, function_name) = match named.captures(line) {
                Some(c) => {
                    let name = c
                        .name("func")
                        .map(|m| m.as_str().to_string())
                        .filter(|name| !name.is_empty());
                    (c, name)
                }
                None => (bare.captures(line)?, None),
            };
            let url = captures.name("url").map(|m| m.as_str()).unwrap_or("");
            let source_url = match url {
                "" | "native" => None,
                ENGINE_FILENAME => Some(origin.unwrap_or(ENGINE_FILENAME).to_string()),
                other => Some(other.to_string()),
            };
            let number = |group: &str| {
                captures
                    .name(group)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .unwrap_or(0)
            };
            Some(StackFrame {
                function_name,
                source_url,
                line: number("line"),
                column: number("col"),
            })
        })
        .collect()
}
