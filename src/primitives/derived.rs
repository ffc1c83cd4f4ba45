// ============================================================================
// spark-reactive - Derived Values
// Cached values recomputed lazily when their dependencies change
// ============================================================================
//
// A derived value is a lazy computation whose scheduler only marks a cache
// dirty. The getter runs on the first read after a change, never on the
// write itself.
//
// Reading a derived value inside another computation subscribes that
// computation to everything the getter read, so the reader re-runs whenever
// the derived value may have changed. Dirty-marking subscribers are always
// notified before the others, so the re-run reads a fresh value.
//
// A derived value belongs to its handles only. Creating one inside a
// computation does not hand it to that computation, so a re-run of the
// creator never stops it.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::core::constants::DERIVED;
use crate::primitives::computation::{Computation, RunOptions};
use crate::reactivity::tracking::track_through;

struct DerivedState<T> {
    dirty: Cell<bool>,
    cache: RefCell<Option<T>>,
}

/// A cached value computed from tracked state.
///
/// Clones share the same cache.
#[must_use = "a derived value stops updating when its last handle is dropped"]
pub struct Derived<T> {
    computation: Computation<T>,
    state: Rc<DerivedState<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self { computation: self.computation.clone(), state: self.state.clone() }
    }
}

impl<T: Clone + 'static> Derived<T> {
    /// Current value, recomputed first if a dependency changed since the
    /// last read.
    pub fn value(&self) -> T {
        // Nothing marks a stopped cache dirty, so never serve it
        if self.computation.is_stopped() {
            return self.computation.run();
        }

        let cached = if self.state.dirty.get() {
            None
        } else {
            self.state.cache.borrow().clone()
        };

        let value = match cached {
            Some(value) => value,
            None => {
                let value = self.computation.run();
                self.state.dirty.set(false);
                *self.state.cache.borrow_mut() = Some(value.clone());
                value
            }
        };

        track_through(self.computation.subscriber());
        value
    }

    /// Whether the next read will recompute.
    pub fn is_dirty(&self) -> bool {
        self.state.dirty.get()
    }

    /// The backing computation.
    pub fn computation(&self) -> &Computation<T> {
        &self.computation
    }
}

impl<T> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("dirty", &self.state.dirty.get())
            .field("computation", &self.computation)
            .finish()
    }
}

/// Create a derived value from `getter`.
///
/// Nothing runs until the first [`Derived::value`] call.
///
/// # Example
///
/// ```
/// use spark_reactive::{derive, reactive, record};
///
/// let state = reactive(record! { "foo" => 1, "bar" => 2 });
/// let sum = derive({
///     let state = state.clone();
///     move || state.get("foo").as_number().unwrap_or(0.0) + state.get("bar").as_number().unwrap_or(0.0)
/// });
///
/// assert_eq!(sum.value(), 3.0);
/// state.set("foo", 2);
/// assert_eq!(sum.value(), 4.0);
/// ```
pub fn derive<T: Clone + 'static>(getter: impl Fn() -> T + 'static) -> Derived<T> {
    let state = Rc::new(DerivedState { dirty: Cell::new(true), cache: RefCell::new(None) });

    let weak_state = Rc::downgrade(&state);
    let options = RunOptions::new().lazy(true).scheduler(move |_| {
        if let Some(state) = weak_state.upgrade() {
            state.dirty.set(true);
        }
    });

    let computation = Computation::create(getter, options, DERIVED);
    Derived { computation, state }
}

// =============================================================================
// TESTS
// =============================================================================
