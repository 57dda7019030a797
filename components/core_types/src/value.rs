//! Host-side value representation.
//!
//! `Value` is the currency every host handler speaks: script arguments are
//! converted into it, handler results are converted out of it. It mirrors the
//! subset of script data the host cares about and carries opaque host payloads
//! through [`Value::Custom`].

use chrono::{DateTime, TimeZone, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Discriminant of a [`Value`], useful for dispatching without borrowing
/// the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value
    Undefined,
    /// `true` or `false`
    Boolean,
    /// Signed 64-bit integer
    Integer,
    /// IEEE 754 double
    Double,
    /// UTF-8 string
    String,
    /// Seconds since the Unix epoch
    Date,
    /// Ordered list of values
    List,
    /// String-keyed map of values
    Map,
    /// Opaque host payload
    Custom,
}

/// Opaque, reference-counted host payload with a small integer tag.
///
/// The tag lets consumers tell payload families apart before attempting a
/// downcast. Two `Custom` values are equal when they share the same payload
/// allocation.
///
/// # Examples
///
/// ```
/// use core_types::Custom;
///
/// let custom = Custom::new(7, String::from("payload"));
/// assert_eq!(custom.tag(), 7);
/// assert_eq!(custom.downcast::<String>().as_deref().map(String::as_str), Some("payload"));
/// assert!(custom.downcast::<u32>().is_none());
/// ```
#[derive(Clone)]
pub struct Custom {
    tag: u32,
    payload: Rc<dyn Any>,
}

impl Custom {
    /// Wraps `payload` under `tag`.
    pub fn new<T: Any>(tag: u32, payload: T) -> Self {
        Self::from_rc(tag, Rc::new(payload))
    }

    /// Wraps an already shared payload without reallocating it.
    pub fn from_rc<T: Any>(tag: u32, payload: Rc<T>) -> Self {
        Self { tag, payload }
    }

    /// The payload family tag.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Returns the payload if it is a `T`.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.payload.clone().downcast::<T>().ok()
    }

    /// Whether both values share one payload allocation.
    pub fn ptr_eq(&self, other: &Custom) -> bool {
        Rc::ptr_eq(&self.payload, &other.payload)
    }
}

impl fmt::Debug for Custom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Custom")
            .field("tag", &self.tag)
            .field("payload", &Rc::as_ptr(&self.payload))
            .finish()
    }
}

impl PartialEq for Custom {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && self.ptr_eq(other)
    }
}

/// Any value that can cross between host code and a script.
///
/// # Examples
///
/// ```
/// use core_types::{Value, ValueType};
///
/// let list = Value::from(vec![Value::from(1), Value::from("two")]);
/// assert_eq!(list.value_type(), ValueType::List);
/// assert_eq!(list.to_string(), r#"[1,"two"]"#);
///
/// assert_eq!(Value::default(), Value::Undefined);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absence of a value; script `undefined` and `null` both land here
    #[default]
    Undefined,
    /// Boolean
    Boolean(bool),
    /// Integer
    Integer(i64),
    /// Floating point number
    Double(f64),
    /// String
    String(String),
    /// Whole seconds since the Unix epoch
    Date(i64),
    /// Ordered values
    List(Vec<Value>),
    /// Keyed values
    Map(HashMap<String, Value>),
    /// Host payload
    Custom(Custom),
}

impl Value {
    /// Returns the discriminant of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Undefined => ValueType::Undefined,
            Value::Boolean(_) => ValueType::Boolean,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::Date(_) => ValueType::Date,
            Value::List(_) => ValueType::List,
            Value::Map(_) => ValueType::Map,
            Value::Custom(_) => ValueType::Custom,
        }
    }

    /// Returns true for [`Value::Undefined`].
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Borrows the string payload.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload.
    ///
    /// Doubles with no fractional part that fit an `i64` are accepted too,
    /// since scripts do not distinguish the two.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Double(d)
                if d.fract() == 0.0 && *d >= i64::MIN as f64 && *d <= i64::MAX as f64 =>
            {
                Some(*d as i64)
            }
            _ => None,
        }
    }

    /// Returns the numeric payload as a double.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// Returns the date payload in seconds since the epoch.
    pub fn as_date(&self) -> Option<i64> {
        match self {
            Value::Date(secs) => Some(*secs),
            _ => None,
        }
    }

    /// Returns the date payload as a UTC timestamp.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        self.as_date()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }

    /// Borrows the list payload.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrows the map payload.
    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Borrows the custom payload.
    pub fn as_custom(&self) -> Option<&Custom> {
        match self {
            Value::Custom(custom) => Some(custom),
            _ => None,
        }
    }

    /// Looks up `key` in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Converts into a JSON document. Custom payloads become `null`.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Undefined | Value::Custom(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(_) => self
                .to_datetime()
                .map(|dt| serde_json::Value::String(dt.to_rfc3339()))
                .unwrap_or(serde_json::Value::Null),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<Custom> for Value {
    fn from(custom: Custom) -> Self {
        Value::Custom(custom)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(dt: DateTime<Tz>) -> Self {
        Value::Date(dt.timestamp())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Undefined,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Undefined | Value::Custom(_) => serializer.serialize_none(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Double(d) => serializer.serialize_f64(*d),
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(_) => match self.to_datetime() {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            },
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Custom(custom) => write!(f, "[custom {}]", custom.tag()),
            other => write!(f, "{}", other.to_json()),
        }
    }
}
