// ============================================================================
// spark-reactive - Values
// The dynamic value stored in records and sequences
// ============================================================================

use std::fmt;
use std::rc::Rc;

use super::raw::RawObject;
use super::tracked::Tracked;
use crate::core::types::ObjectId;

// =============================================================================
// VALUE
// =============================================================================

/// A dynamically typed value held by a record or sequence.
///
/// Structured values are shared by reference: cloning a `Value::Object` clones
/// the handle, not the data. Stored values are always raw; reading through a
/// deep [`Tracked`] wrapper hands nested objects back as `Value::Tracked`.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    Object(RawObject),
    Tracked(Tracked),
}

impl Value {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The tracked wrapper, if this value was read through a deep wrapper.
    pub fn as_tracked(&self) -> Option<&Tracked> {
        match self {
            Value::Tracked(t) => Some(t),
            _ => None,
        }
    }

    /// The raw object behind an `Object` or `Tracked` value.
    pub fn as_object(&self) -> Option<RawObject> {
        match self {
            Value::Object(raw) => Some(raw.clone()),
            Value::Tracked(t) => Some(t.to_raw()),
            _ => None,
        }
    }

    /// Identity of the underlying raw object, for structured values.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Value::Object(raw) => Some(raw.id()),
            Value::Tracked(t) => Some(t.id()),
            _ => None,
        }
    }

    /// Strip any wrapper: a tracked value becomes its raw object.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Tracked(t) => Value::Object(t.to_raw()),
            other => other.clone(),
        }
    }

    /// Form used for storage. Wrappers are never stored inside raw data.
    pub fn into_stored(self) -> Value {
        match self {
            Value::Tracked(t) => Value::Object(t.to_raw()),
            other => other,
        }
    }

    /// Change detection: NaN equals NaN, `+0` equals `-0`, structured values
    /// compare by identity.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.strict_equals(other),
        }
    }

    /// Strict equality: NaN never equals anything.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Tracked(a), Value::Tracked(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Tracked(_) => "tracked",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same_value_zero(other)
    }
}

impl PartialEq<f64> for Value {
    fn eq(&self, other: &f64) -> bool {
        self.same_value_zero(&Value::Number(*other))
    }
}

impl PartialEq<i32> for Value {
    fn eq(&self, other: &i32) -> bool {
        matches!(self, Value::Number(n) if *n == f64::from(*other))
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<bool> for Value {
    fn eq(&self, other: &bool) -> bool {
        self.as_bool() == Some(*other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(raw) => write!(f, "Object({raw:?})"),
            Value::Tracked(t) => write!(f, "Tracked({t:?})"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => f.write_str(s),
            Value::Object(raw) => write!(f, "[object {}]", raw.id()),
            Value::Tracked(t) => write!(f, "[object {}]", t.id()),
        }
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::String(s)
    }
}

impl From<RawObject> for Value {
    fn from(raw: RawObject) -> Self {
        Value::Object(raw)
    }
}

impl From<Tracked> for Value {
    fn from(t: Tracked) -> Self {
        Value::Tracked(t)
    }
}

impl From<&Tracked> for Value {
    fn from(t: &Tracked) -> Self {
        Value::Tracked(t.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

// =============================================================================
// TESTS
// =============================================================================
