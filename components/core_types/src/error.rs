//! Script error kinds.
//!
//! Mirrors the built-in error constructors scripts can throw or catch, so the
//! host can both classify exceptions coming out of an engine and raise typed
//! errors into one.

use std::fmt;
use std::str::FromStr;

/// The kind of a script error.
///
/// These correspond to the built-in error constructors.
///
/// # Examples
///
/// ```
/// use core_types::ErrorKind;
///
/// let kind: ErrorKind = "TypeError".parse().unwrap();
/// assert_eq!(kind, ErrorKind::TypeError);
/// assert_eq!(kind.name(), "TypeError");
/// assert_eq!("MyError".parse::<ErrorKind>(), Err(()));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorKind {
    /// Plain `Error`
    #[default]
    Error,
    /// Syntax error in script source
    SyntaxError,
    /// Type error (e.g., calling a non-function)
    TypeError,
    /// Reference to an undefined variable
    ReferenceError,
    /// Value out of allowed range
    RangeError,
    /// Error in eval() function
    EvalError,
    /// Error in URI handling functions
    URIError,
    /// Internal engine error
    InternalError,
}

impl ErrorKind {
    /// The constructor name of this kind.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::EvalError => "EvalError",
            ErrorKind::URIError => "URIError",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Error" => ErrorKind::Error,
            "SyntaxError" => ErrorKind::SyntaxError,
            "TypeError" => ErrorKind::TypeError,
            "ReferenceError" => ErrorKind::ReferenceError,
            "RangeError" => ErrorKind::RangeError,
            "EvalError" => ErrorKind::EvalError,
            "URIError" => ErrorKind::URIError,
            "InternalError" => ErrorKind::InternalError,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
