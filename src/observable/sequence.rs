// ============================================================================
// spark-reactive - Sequence Methods
// Length-mutating and search operations on tracked sequences
// ============================================================================
//
// Length-mutating methods read the length they are about to change. If those
// reads subscribed, two computations pushing to the same sequence would wake
// each other forever, so every mutation here runs with tracking paused. The
// writes still notify.
//
// Search methods compare against the wrapped elements first. A caller holding
// a raw element would never find it that way, so a miss is retried against
// the raw elements with the needle unwrapped.
// ============================================================================

use super::tracked::Tracked;
use super::value::Value;
use crate::core::error::{AccessError, Operation};
use crate::core::types::PropKey;
use crate::reactivity::batching::untrack;

impl Tracked {
    // =========================================================================
    // LENGTH-MUTATING
    // =========================================================================

    /// Remove `delete_count` elements at `start` and insert `items` in their
    /// place. Returns the removed elements.
    ///
    /// `start` and `delete_count` are clamped to the current length.
    pub fn try_splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Result<Vec<Value>, AccessError> {
        if !self.is_sequence() {
            return Err(AccessError::NotASequence(Operation::Splice));
        }
        if self.is_readonly() {
            return Err(AccessError::ReadOnly { key: PropKey::Length, operation: Operation::Splice });
        }
        let items: Vec<Value> = items.into_iter().map(|v| v.into().into_stored()).collect();

        untrack(|| -> Result<Vec<Value>, AccessError> {
            let raw = self.raw();
            let len = raw.len();
            let start = start.min(len);
            let delete_count = delete_count.min(len - start);
            let read = |i: usize| raw.get(&PropKey::Index(i)).unwrap_or_default();

            let removed: Vec<Value> = (start..start + delete_count).map(read).collect();
            let mut tail = items;
            tail.extend((start + delete_count..len).map(read));
            let new_len = start + tail.len();

            for (offset, value) in tail.into_iter().enumerate() {
                self.try_set(start + offset, value)?;
            }
            if new_len < len {
                self.apply_len(new_len)?;
            }

            Ok(removed.into_iter().map(|v| self.wrap_nested(v)).collect())
        })
    }

    /// [`Tracked::try_splice`], logging a warning instead of failing.
    pub fn splice<V: Into<Value>>(
        &self,
        start: usize,
        delete_count: usize,
        items: impl IntoIterator<Item = V>,
    ) -> Vec<Value> {
        let result = self.try_splice(start, delete_count, items);
        self.report(result, Vec::new())
    }

    /// Append an element. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> usize {
        let value: Value = value.into();
        let len = self.raw().len();
        self.splice(len, 0, [value]);
        self.raw().len()
    }

    /// Remove and return the last element, or `Undefined` if empty.
    pub fn pop(&self) -> Value {
        let len = self.raw().len();
        if len == 0 {
            return Value::Undefined;
        }
        self.splice(len - 1, 1, std::iter::empty::<Value>()).pop().unwrap_or_default()
    }

    /// Remove and return the first element, or `Undefined` if empty.
    pub fn shift(&self) -> Value {
        self.splice(0, 1, std::iter::empty::<Value>()).into_iter().next().unwrap_or_default()
    }

    /// Prepend an element. Returns the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> usize {
        let value: Value = value.into();
        self.splice(0, 0, [value]);
        self.raw().len()
    }

    /// Resize the sequence, truncating or padding with `Undefined`.
    pub fn set_len(&self, len: usize) -> bool {
        self.set(PropKey::Length, len)
    }

    // =========================================================================
    // SEARCH
    // =========================================================================

    /// Whether the sequence contains `needle` (NaN finds NaN).
    pub fn includes(&self, needle: impl Into<Value>) -> bool {
        let needle = needle.into();
        self.search(&needle, |v, n| v.same_value_zero(n), false).is_some()
    }

    /// First index strictly equal to `needle`.
    pub fn index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let needle = needle.into();
        self.search(&needle, Value::strict_equals, false)
    }

    /// Last index strictly equal to `needle`.
    pub fn last_index_of(&self, needle: impl Into<Value>) -> Option<usize> {
        let needle = needle.into();
        self.search(&needle, Value::strict_equals, true)
    }

    fn search(&self, needle: &Value, eq: impl Fn(&Value, &Value) -> bool, from_end: bool) -> Option<usize> {
        if !self.is_sequence() {
            return None;
        }
        let find = |values: &[Value], needle: &Value| {
            if from_end {
                values.iter().rposition(|v| eq(v, needle))
            } else {
                values.iter().position(|v| eq(v, needle))
            }
        };

        // Tracked pass: subscribes to the length and every element
        let wrapped = self.values();
        find(&wrapped, needle).or_else(|| find(&self.raw().values(), &needle.to_raw()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
