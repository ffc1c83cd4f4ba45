// ============================================================================
// spark-reactive - Watchers
// Callbacks with old and new values, run when a source changes
// ============================================================================
//
// A watcher is a lazy computation over a getter, with a scheduler that runs
// the watcher's job instead of the getter. The job re-runs the getter for the
// new value, fires the pending invalidation callback, hands (new, old) to the
// user callback and keeps new as the next old.
//
// Sync watchers run the job inside the notification. Post watchers queue it
// once on the deferred queue; further notifications before the checkpoint
// coalesce into that single job.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::core::constants::WATCHER;
use crate::core::types::ObjectId;
use crate::observable::tracked::Tracked;
use crate::observable::value::Value;
use crate::primitives::computation::{Computation, RunOptions};
use crate::reactivity::scheduling::queue_job;

// =============================================================================
// OPTIONS
// =============================================================================

/// When a watcher's callback runs relative to the write that triggered it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushTiming {
    /// Inside the write
    #[default]
    Sync,
    /// At the next checkpoint (end of the outermost batch, or `tick()`)
    Post,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Run the callback once at creation, with no old value
    pub immediate: bool,
    pub flush: FlushTiming,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn flush(mut self, flush: FlushTiming) -> Self {
        self.flush = flush;
        self
    }
}

// =============================================================================
// INVALIDATION
// =============================================================================

type Cleanup = Box<dyn FnOnce()>;

/// Passed to every callback invocation. A function registered here runs
/// right before the next invocation, to cancel work started by this one.
#[derive(Clone, Default)]
pub struct OnInvalidate {
    slot: Rc<RefCell<Option<Cleanup>>>,
}

impl OnInvalidate {
    /// Register the invalidation callback, replacing any earlier one.
    pub fn register(&self, cleanup: impl FnOnce() + 'static) {
        *self.slot.borrow_mut() = Some(Box::new(cleanup));
    }

    fn take(&self) -> Option<Cleanup> {
        self.slot.borrow_mut().take()
    }
}

// =============================================================================
// SOURCES
// =============================================================================

/// What a watcher observes: a getter, or a whole tracked object.
pub struct WatchSource<T> {
    getter: Box<dyn Fn() -> T>,
}

impl<T> WatchSource<T> {
    pub fn getter(getter: impl Fn() -> T + 'static) -> Self {
        Self { getter: Box::new(getter) }
    }
}

impl From<Tracked> for WatchSource<Value> {
    fn from(tracked: Tracked) -> Self {
        WatchSource::getter(move || {
            let value = Value::Tracked(tracked.clone());
            traverse(&value);
            value
        })
    }
}

impl From<&Tracked> for WatchSource<Value> {
    fn from(tracked: &Tracked) -> Self {
        tracked.clone().into()
    }
}

/// Read every reachable property of `value`, subscribing the active
/// computation to all of them. Cycles are visited once.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_into(value, &mut seen);
}

fn traverse_into(value: &Value, seen: &mut HashSet<ObjectId>) {
    let Value::Tracked(tracked) = value else {
        return;
    };
    if !seen.insert(tracked.id()) {
        return;
    }
    for (_, nested) in tracked.entries() {
        traverse_into(&nested, seen);
    }
}

// =============================================================================
// WATCHER
// =============================================================================

type Callback<T> = Box<dyn FnMut(&T, Option<&T>, &OnInvalidate)>;

struct WatchState<T> {
    old: RefCell<Option<T>>,
    callback: RefCell<Callback<T>>,
    invalidate: OnInvalidate,
    /// A post-flush job is waiting on the queue
    queued: Cell<bool>,
}

impl<T: 'static> WatchState<T> {
    fn job(&self, computation: &Computation<T>) {
        if computation.is_stopped() {
            return;
        }
        let Ok(mut callback) = self.callback.try_borrow_mut() else {
            tracing::warn!(watcher = ?computation.id(), "watch callback re-entered; skipping nested invocation");
            return;
        };

        let new = computation.run();
        if let Some(cleanup) = self.invalidate.take() {
            cleanup();
        }
        {
            // Left in place so a panicking callback keeps the last good value
            let old = self.old.borrow();
            (*callback)(&new, old.as_ref(), &self.invalidate);
        }
        *self.old.borrow_mut() = Some(new);
    }
}

/// Handle to a watcher. The watcher stops when this is dropped, unless it was
/// created inside a computation that still owns it.
#[must_use = "a watcher stops when its handle is dropped"]
pub struct Watcher<T> {
    computation: Computation<T>,
    state: Rc<WatchState<T>>,
}

impl<T: 'static> Watcher<T> {
    /// Stop watching. The callback never runs again.
    pub fn stop(&self) {
        self.computation.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.computation.is_stopped()
    }

    /// The value handed to the most recent callback (or captured at setup).
    pub fn last_value(&self) -> Option<T>
    where
        T: Clone,
    {
        self.state.old.borrow().clone()
    }
}

impl<T> fmt::Debug for Watcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher").field("computation", &self.computation).finish()
    }
}

/// Watch `source` and call `callback(new, old, on_invalidate)` when it changes.
///
/// A tracked object source is traversed deeply, so any nested write fires the
/// callback; the old and new values are then the same object.
///
/// # Example
///
/// ```
/// use spark_reactive::{observe, reactive, record, Value, WatchOptions};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "inner" => record! { "x" => 1 } });
/// let calls = Rc::new(Cell::new(0));
///
/// let _watcher = observe(&state, {
///     let calls = calls.clone();
///     move |_: &Value, _, _| calls.set(calls.get() + 1)
/// }, WatchOptions::new());
///
/// if let Some(inner) = state.get("inner").as_tracked() {
///     inner.set("x", 2);
/// }
/// assert_eq!(calls.get(), 1);
/// ```
pub fn observe<T: 'static>(
    source: impl Into<WatchSource<T>>,
    callback: impl FnMut(&T, Option<&T>, &OnInvalidate) + 'static,
    options: WatchOptions,
) -> Watcher<T> {
    let source = source.into();
    let state = Rc::new(WatchState {
        old: RefCell::new(None),
        callback: RefCell::new(Box::new(callback)),
        invalidate: OnInvalidate::default(),
        queued: Cell::new(false),
    });

    let flush = options.flush;
    let job_state = state.clone();
    let scheduler = move |computation: &Computation<T>| match flush {
        FlushTiming::Sync => job_state.job(computation),
        FlushTiming::Post => {
            if job_state.queued.replace(true) {
                return;
            }
            let weak = computation.downgrade();
            let state = job_state.clone();
            queue_job(Box::new(move || {
                state.queued.set(false);
                if let Some(computation) = weak.upgrade() {
                    state.job(&computation);
                }
            }));
        }
    };

    let computation = Computation::create(source.getter, RunOptions::new().lazy(true).scheduler(scheduler), WATCHER);
    computation.attach_to_active();

    if options.immediate {
        state.job(&computation);
    } else {
        let initial = computation.run();
        *state.old.borrow_mut() = Some(initial);
    }

    Watcher { computation, state }
}

/// [`observe`] with a getter source.
///
/// # Example
///
/// ```
/// use spark_reactive::{reactive, record, watch, Value, WatchOptions};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "foo" => 1 });
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let _watcher = watch(
///     { let state = state.clone(); move || state.get("foo") },
///     { let log = log.clone(); move |new: &Value, old: Option<&Value>, _| log.borrow_mut().push((new.clone(), old.cloned())) },
///     WatchOptions::new(),
/// );
///
/// state.set("foo", 2);
/// assert_eq!(*log.borrow(), vec![(Value::from(2), Some(Value::from(1)))]);
/// ```
pub fn watch<T: 'static>(
    getter: impl Fn() -> T + 'static,
    callback: impl FnMut(&T, Option<&T>, &OnInvalidate) + 'static,
    options: WatchOptions,
) -> Watcher<T> {
    observe(WatchSource::getter(getter), callback, options)
}

// =============================================================================
// TESTS
// =============================================================================
