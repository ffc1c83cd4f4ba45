// ============================================================================
// spark-reactive - Raw Objects
// Untracked records and sequences, the data behind every wrapper
// ============================================================================
//
// A raw object is a shared, interior-mutable record (ordered name -> value
// map) or sequence (dense vector with a length). Reads and writes here never
// touch the registry; all tracking lives in the wrappers.
//
// When the last handle to a raw object drops, its registry entry and wrapper
// cache entries are expired with it.
// ============================================================================

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::tracked::Tracked;
use super::value::Value;
use crate::core::constants::MAX_SEQUENCE_LEN;
use crate::core::context::with_context;
use crate::core::error::{AccessError, Operation};
use crate::core::types::{ObjectId, PropKey};
use crate::reactivity::tracking::expire_object;

// =============================================================================
// DATA
// =============================================================================

/// The two shapes a raw object can take.
#[derive(Clone)]
pub enum Data {
    Record(IndexMap<Rc<str>, Value>),
    Sequence(Vec<Value>),
}

struct RawInner {
    id: ObjectId,
    data: RefCell<Data>,
}

impl Drop for RawInner {
    fn drop(&mut self) {
        expire_object(self.id);
    }
}

// =============================================================================
// RAW OBJECT
// =============================================================================

/// Shared handle to an untracked record or sequence.
#[derive(Clone)]
pub struct RawObject(Rc<RawInner>);

impl RawObject {
    pub fn from_data(data: Data) -> Self {
        let id = with_context(|ctx| ctx.next_object_id());
        Self(Rc::new(RawInner { id, data: RefCell::new(data) }))
    }

    /// An empty record.
    pub fn record() -> Self {
        Self::from_data(Data::Record(IndexMap::new()))
    }

    /// An empty sequence.
    pub fn sequence() -> Self {
        Self::from_data(Data::Sequence(Vec::new()))
    }

    pub fn from_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into().into_stored()))
            .collect();
        Self::from_data(Data::Record(map))
    }

    pub fn from_values<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let items = values.into_iter().map(|v| v.into().into_stored()).collect();
        Self::from_data(Data::Sequence(items))
    }

    pub fn id(&self) -> ObjectId {
        self.0.id
    }

    pub fn ptr_eq(&self, other: &RawObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(*self.0.data.borrow(), Data::Sequence(_))
    }

    /// Current length if this is a sequence.
    pub fn sequence_len(&self) -> Option<usize> {
        match &*self.0.data.borrow() {
            Data::Sequence(items) => Some(items.len()),
            Data::Record(_) => None,
        }
    }

    /// Number of elements or entries.
    pub fn len(&self) -> usize {
        match &*self.0.data.borrow() {
            Data::Sequence(items) => items.len(),
            Data::Record(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bring a key into the canonical form for this object's shape.
    ///
    /// On a sequence, `"length"` becomes [`PropKey::Length`] and canonical
    /// decimal strings become [`PropKey::Index`]. On a record, every key
    /// becomes a [`PropKey::Name`].
    pub fn normalize(&self, key: PropKey) -> PropKey {
        if self.is_sequence() {
            match key {
                PropKey::Name(name) if &*name == "length" => PropKey::Length,
                PropKey::Name(name) => match parse_index(&name) {
                    Some(i) => PropKey::Index(i),
                    None => PropKey::Name(name),
                },
                other => other,
            }
        } else {
            match key {
                PropKey::Index(i) => PropKey::Name(Rc::from(i.to_string())),
                PropKey::Length => PropKey::from("length"),
                other => other,
            }
        }
    }

    // =========================================================================
    // UNTRACKED ACCESS (keys must be normalized)
    // =========================================================================

    /// Read a slot. `None` when the key does not exist.
    pub fn get(&self, key: &PropKey) -> Option<Value> {
        match (&*self.0.data.borrow(), key) {
            (Data::Sequence(items), PropKey::Index(i)) => items.get(*i).cloned(),
            (Data::Sequence(items), PropKey::Length) => Some(Value::from(items.len())),
            (Data::Record(map), PropKey::Name(name)) => map.get(name).cloned(),
            _ => None,
        }
    }

    pub fn contains(&self, key: &PropKey) -> bool {
        match (&*self.0.data.borrow(), key) {
            (Data::Sequence(items), PropKey::Index(i)) => *i < items.len(),
            (Data::Sequence(_), PropKey::Length) => true,
            (Data::Record(map), PropKey::Name(name)) => map.contains_key(name),
            _ => false,
        }
    }

    /// Write a slot, returning the previous value if the key existed.
    ///
    /// Writing past the end of a sequence fills the gap with `Undefined`.
    /// Indices at or above [`MAX_SEQUENCE_LEN`] are not indices.
    pub fn insert(&self, key: PropKey, value: Value) -> Result<Option<Value>, AccessError> {
        let value = value.into_stored();
        let mut data = self.0.data.borrow_mut();
        match (&mut *data, key) {
            (Data::Sequence(_), PropKey::Index(i)) if i >= MAX_SEQUENCE_LEN => {
                Err(AccessError::NotAnIndex(PropKey::Index(i)))
            }
            (Data::Sequence(items), PropKey::Index(i)) => {
                if i < items.len() {
                    Ok(Some(std::mem::replace(&mut items[i], value)))
                } else {
                    grow(items, i + 1)?;
                    items.resize(i, Value::Undefined);
                    items.push(value);
                    Ok(None)
                }
            }
            (Data::Record(map), PropKey::Name(name)) => Ok(map.insert(name, value)),
            (_, key) => Err(AccessError::NotAnIndex(key)),
        }
    }

    /// Remove a slot, returning the removed value if the key existed.
    ///
    /// A sequence element is replaced by `Undefined`; the length is kept.
    pub fn remove(&self, key: &PropKey) -> Option<Value> {
        match (&mut *self.0.data.borrow_mut(), key) {
            (Data::Sequence(items), PropKey::Index(i)) => items.get_mut(*i).map(std::mem::take),
            (Data::Record(map), PropKey::Name(name)) => map.shift_remove(name),
            _ => None,
        }
    }

    /// Set a sequence's length, returning the previous length.
    ///
    /// Lengths above [`MAX_SEQUENCE_LEN`], or that cannot be allocated, are
    /// rejected and leave the sequence untouched.
    pub fn set_len(&self, len: usize) -> Result<usize, AccessError> {
        match &mut *self.0.data.borrow_mut() {
            Data::Sequence(items) => {
                let old = items.len();
                grow(items, len)?;
                items.resize(len, Value::Undefined);
                Ok(old)
            }
            Data::Record(_) => Err(AccessError::NotASequence(Operation::Set)),
        }
    }

    /// Every key, in order.
    pub fn keys(&self) -> Vec<PropKey> {
        match &*self.0.data.borrow() {
            Data::Sequence(items) => (0..items.len()).map(PropKey::Index).collect(),
            Data::Record(map) => map.keys().cloned().map(PropKey::Name).collect(),
        }
    }

    /// Snapshot of every element or entry value, in order.
    pub fn values(&self) -> Vec<Value> {
        match &*self.0.data.borrow() {
            Data::Sequence(items) => items.clone(),
            Data::Record(map) => map.values().cloned().collect(),
        }
    }

    /// Snapshot of the underlying data.
    pub fn snapshot(&self) -> Data {
        self.0.data.borrow().clone()
    }
}

/// Canonical decimal index: no sign, no leading zeros (except `"0"`).
fn parse_index(name: &str) -> Option<usize> {
    if name.is_empty() || (name.len() > 1 && name.starts_with('0')) {
        return None;
    }
    if !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

impl fmt::Debug for RawObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = if self.is_sequence() { "sequence" } else { "record" };
        write!(f, "{}{}[{}]", shape, self.id(), self.len())
    }
}

impl From<Tracked> for RawObject {
    fn from(tracked: Tracked) -> Self {
        tracked.to_raw()
    }
}

impl From<&Tracked> for RawObject {
    fn from(tracked: &Tracked) -> Self {
        tracked.to_raw()
    }
}

impl From<&RawObject> for RawObject {
    fn from(raw: &RawObject) -> Self {
        raw.clone()
    }
}

/// Reserve room for `len` elements without aborting on a failed allocation.
fn grow(items: &mut Vec<Value>, len: usize) -> Result<(), AccessError> {
    if len > MAX_SEQUENCE_LEN {
        return Err(AccessError::InvalidLength(len.to_string()));
    }
    let additional = len.saturating_sub(items.len());
    items
        .try_reserve(additional)
        .map_err(|_| AccessError::InvalidLength(len.to_string()))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{record, sequence};

    #[test]
    fn key_normalization() {
        let list = sequence![1, 2];
        assert_eq!(list.normalize(PropKey::from("length")), PropKey::Length);
        assert_eq!(list.normalize(PropKey::from("1")), PropKey::Index(1));
        assert_eq!(list.normalize(PropKey::from("01")), PropKey::from("01"));
        assert_eq!(list.normalize(PropKey::from("-1")), PropKey::from("-1"));

        let map = record! { "a" => 1 };
        assert_eq!(map.normalize(PropKey::Index(3)), PropKey::from("3"));
        assert_eq!(map.normalize(PropKey::Length), PropKey::from("length"));
    }

    #[test]
    fn sequence_insert_past_end_fills_holes() {
        let list = sequence![1];
        assert_eq!(list.insert(PropKey::Index(3), Value::from(4)), Ok(None));
        assert_eq!(list.len(), 4);
        assert!(list.get(&PropKey::Index(2)).is_some_and(|v| v.is_undefined()));
        assert_eq!(list.insert(PropKey::Index(0), Value::from(9)), Ok(Some(Value::from(1))));
    }

    #[test]
    fn sequence_rejects_named_keys() {
        let list = sequence![];
        let err = list.insert(PropKey::from("foo"), Value::from(1));
        assert_eq!(err, Err(AccessError::NotAnIndex(PropKey::from("foo"))));
    }

    #[test]
    fn remove_keeps_sequence_length() {
        let list = sequence![1, 2, 3];
        assert_eq!(list.remove(&PropKey::Index(1)), Some(Value::from(2)));
        assert_eq!(list.len(), 3);
        assert_eq!(list.remove(&PropKey::Index(5)), None);

        let map = record! { "a" => 1, "b" => 2 };
        assert_eq!(map.remove(&PropKey::from("a")), Some(Value::from(1)));
        assert_eq!(map.keys(), vec![PropKey::from("b")]);
    }

    #[test]
    fn set_len_truncates_and_extends() {
        let list = sequence![1, 2, 3];
        assert_eq!(list.set_len(1), Ok(3));
        assert_eq!(list.values(), vec![Value::from(1)]);
        assert_eq!(list.set_len(2), Ok(1));
        assert!(list.values()[1].is_undefined());

        let map = record! {};
        assert_eq!(map.set_len(0), Err(AccessError::NotASequence(Operation::Set)));
    }

    #[test]
    fn growth_is_bounded() {
        let list = sequence![1];
        assert!(matches!(list.set_len(MAX_SEQUENCE_LEN + 1), Err(AccessError::InvalidLength(_))));
        assert!(matches!(
            list.insert(PropKey::Index(MAX_SEQUENCE_LEN), Value::from(2)),
            Err(AccessError::NotAnIndex(_))
        ));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn record_keeps_insertion_order() {
        let map = record! { "z" => 1, "a" => 2 };
        map.insert(PropKey::from("m"), Value::from(3)).ok();
        assert_eq!(map.keys(), vec![PropKey::from("z"), PropKey::from("a"), PropKey::from("m")]);
    }
}
