//! Host value model shared by the script bridge and its embedders.
//!
//! This crate has no engine dependency: it defines the data host code
//! exchanges with scripts, plus the location types used in error reports.
//!
//! # Overview
//!
//! - [`Value`] - Tagged host value (undefined, bool, numbers, string, date,
//!   list, map, custom payload)
//! - [`Custom`] - Opaque reference-counted host payload with an integer tag
//! - [`ErrorKind`] - Built-in script error constructors
//! - [`SourcePosition`] - Source code location
//! - [`StackFrame`] - Call stack frame information
//!
//! # Examples
//!
//! ```
//! use core_types::{Value, ValueType};
//! use std::collections::HashMap;
//!
//! let mut map = HashMap::new();
//! map.insert("answer".to_string(), Value::from(42));
//! let value = Value::from(map);
//!
//! assert_eq!(value.value_type(), ValueType::Map);
//! assert_eq!(value.get("answer").and_then(Value::as_integer), Some(42));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod source;
mod value;

pub use error::ErrorKind;
pub use source::{SourcePosition, StackFrame};
pub use value::{Custom, Value, ValueType};
