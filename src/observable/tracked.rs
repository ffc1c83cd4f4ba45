// ============================================================================
// spark-reactive - Tracked Objects
// The interception layer: every read subscribes, every write notifies
// ============================================================================
//
// A `Tracked` is a wrapper over a raw object with a fixed mode:
//
// - deep or shallow: deep wrappers hand nested objects back wrapped,
//   shallow ones hand them back raw
// - mutable or read-only: read-only wrappers never subscribe and reject
//   every write and delete
//
// Wrappers are identity-stable: wrapping the same raw object in the same mode
// twice yields the same wrapper while the first one is alive.
// ============================================================================

use std::fmt;
use std::rc::Rc;

use super::raw::RawObject;
use super::value::Value;
use crate::core::constants::MAX_SEQUENCE_LEN;
use crate::core::context::{try_with_context, with_context};
use crate::core::error::{AccessError, Operation};
use crate::core::types::{Change, ObjectId, PropKey, TrackKey};
use crate::reactivity::tracking::{notify, subscribe};

// =============================================================================
// WRAP MODE
// =============================================================================

/// How a wrapper treats nested objects and writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WrapMode {
    /// Nested objects are returned raw instead of wrapped
    pub shallow: bool,
    /// Reads don't subscribe; writes and deletes are rejected
    pub readonly: bool,
}

impl WrapMode {
    pub const REACTIVE: WrapMode = WrapMode { shallow: false, readonly: false };
    pub const SHALLOW_REACTIVE: WrapMode = WrapMode { shallow: true, readonly: false };
    pub const READONLY: WrapMode = WrapMode { shallow: false, readonly: true };
    pub const SHALLOW_READONLY: WrapMode = WrapMode { shallow: true, readonly: true };

    pub fn new() -> Self {
        Self::default()
    }

    pub fn shallow(mut self, shallow: bool) -> Self {
        self.shallow = shallow;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }
}

// =============================================================================
// TRACKED
// =============================================================================

pub struct TrackedInner {
    raw: RawObject,
    mode: WrapMode,
}

impl Drop for TrackedInner {
    fn drop(&mut self) {
        let key = (self.raw.id(), self.mode);
        try_with_context(|ctx| {
            if let Ok(mut wrappers) = ctx.wrappers.try_borrow_mut() {
                if wrappers.get(&key).is_some_and(|w| w.strong_count() == 0) {
                    wrappers.remove(&key);
                }
            }
        });
    }
}

/// A tracked view over a raw record or sequence.
///
/// Cloning is cheap and yields the same wrapper.
#[derive(Clone)]
pub struct Tracked(Rc<TrackedInner>);

/// Wrap `data` in the given mode, reusing the cached wrapper if one is alive.
///
/// Passing a `Tracked` wraps its raw object, so `readonly(&state)` is a
/// read-only view over the same data `state` writes to.
pub fn wrap(data: impl Into<RawObject>, mode: WrapMode) -> Tracked {
    let raw = data.into();
    let key = (raw.id(), mode);

    let cached = with_context(|ctx| ctx.wrappers.borrow().get(&key).and_then(|w| w.upgrade()));
    if let Some(inner) = cached {
        return Tracked(inner);
    }

    let inner = Rc::new(TrackedInner { raw, mode });
    with_context(|ctx| ctx.wrappers.borrow_mut().insert(key, Rc::downgrade(&inner)));
    Tracked(inner)
}

/// Deep, mutable wrapper.
///
/// # Example
///
/// ```
/// use spark_reactive::{reactive, record, run};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "count" => 1 });
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let _c = run({
///     let state = state.clone();
///     let seen = seen.clone();
///     move || seen.borrow_mut().push(state.get("count"))
/// });
///
/// state.set("count", 2);
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// ```
pub fn reactive(data: impl Into<RawObject>) -> Tracked {
    wrap(data, WrapMode::REACTIVE)
}

/// Mutable wrapper whose nested objects are returned raw.
pub fn shallow_reactive(data: impl Into<RawObject>) -> Tracked {
    wrap(data, WrapMode::SHALLOW_REACTIVE)
}

/// Deep read-only wrapper. Nested objects come back read-only too.
pub fn readonly(data: impl Into<RawObject>) -> Tracked {
    wrap(data, WrapMode::READONLY)
}

/// Read-only wrapper whose nested objects are returned raw.
pub fn shallow_readonly(data: impl Into<RawObject>) -> Tracked {
    wrap(data, WrapMode::SHALLOW_READONLY)
}

impl Tracked {
    /// Identity of the raw object; shared by every wrapper over it.
    pub fn id(&self) -> ObjectId {
        self.0.raw.id()
    }

    pub fn mode(&self) -> WrapMode {
        self.0.mode
    }

    pub fn is_readonly(&self) -> bool {
        self.0.mode.readonly
    }

    pub fn is_shallow(&self) -> bool {
        self.0.mode.shallow
    }

    pub fn is_sequence(&self) -> bool {
        self.0.raw.is_sequence()
    }

    /// The raw object behind this wrapper. Accesses through it are untracked.
    pub fn to_raw(&self) -> RawObject {
        self.0.raw.clone()
    }

    pub(crate) fn raw(&self) -> &RawObject {
        &self.0.raw
    }

    pub fn ptr_eq(&self, other: &Tracked) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn track(&self, key: impl Into<TrackKey>) {
        if !self.0.mode.readonly {
            subscribe(self.id(), key);
        }
    }

    /// Deep wrappers hand nested objects back wrapped in the same read mode.
    pub(crate) fn wrap_nested(&self, value: Value) -> Value {
        match value {
            Value::Object(raw) if !self.0.mode.shallow => {
                Value::Tracked(wrap(raw, WrapMode::REACTIVE.readonly(self.0.mode.readonly)))
            }
            other => other,
        }
    }

    pub(crate) fn report<T>(&self, result: Result<T, AccessError>, fallback: T) -> T {
        result.unwrap_or_else(|error| {
            tracing::warn!(target_object = %self.id(), %error, "tracked write rejected");
            fallback
        })
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Read a property. Missing keys read as `Undefined`.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = self.0.raw.normalize(key.into());
        self.track(key.clone());
        let value = self.0.raw.get(&key).unwrap_or_default();
        self.wrap_nested(value)
    }

    /// Whether a property exists. Subscribes to that property.
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        let key = self.0.raw.normalize(key.into());
        self.track(key.clone());
        self.0.raw.contains(&key)
    }

    /// Every key, in order. Records subscribe to the key set; sequences
    /// subscribe to their length.
    pub fn keys(&self) -> Vec<PropKey> {
        self.track_shape();
        self.0.raw.keys()
    }

    /// Number of elements or entries, tracked like [`Tracked::keys`].
    pub fn len(&self) -> usize {
        self.track_shape();
        self.0.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every value, in order, each read through [`Tracked::get`].
    pub fn values(&self) -> Vec<Value> {
        self.keys().into_iter().map(|key| self.get(key)).collect()
    }

    /// Every `(key, value)` pair, in order.
    pub fn entries(&self) -> Vec<(PropKey, Value)> {
        self.keys()
            .into_iter()
            .map(|key| {
                let value = self.get(&key);
                (key, value)
            })
            .collect()
    }

    fn track_shape(&self) {
        if self.0.raw.is_sequence() {
            self.track(PropKey::Length);
        } else {
            self.track(TrackKey::Iterate);
        }
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Write a property.
    ///
    /// Adding a key always notifies; overwriting notifies only if the value
    /// changed (NaN over NaN is not a change). Writing `"length"` on a
    /// sequence resizes it.
    pub fn try_set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> Result<bool, AccessError> {
        let key = self.0.raw.normalize(key.into());
        if self.0.mode.readonly {
            return Err(AccessError::ReadOnly { key, operation: Operation::Set });
        }
        let value = value.into().into_stored();
        if key == PropKey::Length {
            return self.write_len(&value);
        }

        match self.0.raw.insert(key.clone(), value.clone())? {
            None => notify(&self.0.raw, &key, Change::Add),
            Some(old) if !old.same_value_zero(&value) => notify(&self.0.raw, &key, Change::Set),
            Some(_) => {}
        }
        Ok(true)
    }

    /// Write a property, logging a warning instead of failing.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> bool {
        let result = self.try_set(key, value);
        self.report(result, false)
    }

    fn write_len(&self, value: &Value) -> Result<bool, AccessError> {
        match value {
            Value::Number(n)
                if n.is_finite()
                    && *n >= 0.0
                    && *n <= MAX_SEQUENCE_LEN as f64
                    && n.fract() == 0.0 =>
            {
                self.apply_len(*n as usize)
            }
            other => Err(AccessError::InvalidLength(other.to_string())),
        }
    }

    pub(crate) fn apply_len(&self, len: usize) -> Result<bool, AccessError> {
        let old = self.0.raw.set_len(len)?;
        if old != len {
            notify(&self.0.raw, &PropKey::Length, Change::Set);
        }
        Ok(true)
    }

    /// Remove a property. Returns `Ok(false)` if there was nothing to remove.
    ///
    /// Deleting a sequence element leaves an `Undefined` hole; the length of
    /// a sequence cannot be deleted.
    pub fn try_delete(&self, key: impl Into<PropKey>) -> Result<bool, AccessError> {
        let key = self.0.raw.normalize(key.into());
        if self.0.mode.readonly {
            return Err(AccessError::ReadOnly { key, operation: Operation::Delete });
        }
        if key == PropKey::Length {
            return Ok(false);
        }

        match self.0.raw.remove(&key) {
            Some(_) => {
                notify(&self.0.raw, &key, Change::Delete);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a property, logging a warning instead of failing.
    pub fn delete(&self, key: impl Into<PropKey>) -> bool {
        let result = self.try_delete(key);
        self.report(result, false)
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracked")
            .field("raw", &self.0.raw)
            .field("mode", &self.0.mode)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
