// ============================================================================
// spark-reactive - Computations
// Units of work that re-run when the state they read changes
// ============================================================================
//
// A computation wraps a work function. While the work runs, the computation
// is on top of the active stack, so every tracked read subscribes it. Before
// each run it detaches from everything it subscribed to last time, so the
// dependency set always reflects the most recent run only.
//
// Key features:
// - Optional laziness (no run at creation)
// - Optional scheduler, called instead of re-running on notification
// - Ownership tree: computations created during a run belong to the runner
// - RAII disposal: dropping the last handle detaches the computation
// ============================================================================

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::core::constants::*;
use crate::core::context::with_context;
use crate::core::types::{AnySubscriber, ComputationId};
use crate::reactivity::batching::untrack;
use crate::reactivity::tracking::SubscriberSet;

// =============================================================================
// TYPE ALIASES
// =============================================================================

/// Called instead of re-running when a dependency changes.
pub type Scheduler<T> = Rc<dyn Fn(&Computation<T>)>;

// =============================================================================
// OPTIONS
// =============================================================================

/// Creation options for [`run_with`].
pub struct RunOptions<T> {
    /// Skip the run at creation; the first run happens on demand
    pub lazy: bool,
    /// Receives notifications instead of an immediate re-run
    pub scheduler: Option<Scheduler<T>>,
}

impl<T> Default for RunOptions<T> {
    fn default() -> Self {
        Self { lazy: false, scheduler: None }
    }
}

impl<T> RunOptions<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    pub fn scheduler(mut self, scheduler: impl Fn(&Computation<T>) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }
}

// =============================================================================
// COMPUTATION INNER
// =============================================================================

/// Shared state of a computation.
///
/// Implements [`AnySubscriber`] so the registry can hold it type-erased.
pub struct ComputationInner<T> {
    id: ComputationId,

    /// Kind and lifecycle flags
    flags: Cell<u32>,

    work: Box<dyn Fn() -> T>,

    /// Subscriber sets this computation currently belongs to
    deps: RefCell<Vec<Rc<SubscriberSet>>>,

    /// Computations created during the last run
    children: RefCell<Vec<Rc<dyn AnySubscriber>>>,

    scheduler: Option<Scheduler<T>>,
}

impl<T: 'static> ComputationInner<T> {
    fn set_flag(&self, flag: u32) {
        self.flags.set(self.flags.get() | flag);
    }

    /// Leave every subscriber set, clearing the dependency list.
    fn cleanup(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for set in deps {
            set.remove(self.id);
        }
    }

    /// Stop and drop the computations created by the previous run.
    fn release_children(&self) {
        let children = std::mem::take(&mut *self.children.borrow_mut());
        for child in children {
            child.stop();
        }
    }
}

impl<T> Drop for ComputationInner<T> {
    fn drop(&mut self) {
        for set in self.deps.get_mut().drain(..) {
            set.remove(self.id);
        }
        for child in self.children.get_mut().drain(..) {
            child.stop();
        }
    }
}

// =============================================================================
// AnySubscriber IMPLEMENTATION
// =============================================================================

impl<T: 'static> AnySubscriber for ComputationInner<T> {
    fn id(&self) -> ComputationId {
        self.id
    }

    fn flags(&self) -> u32 {
        self.flags.get()
    }

    fn add_dep(&self, set: Rc<SubscriberSet>) {
        self.deps.borrow_mut().push(set);
    }

    fn dep_count(&self) -> usize {
        self.deps.borrow().len()
    }

    fn for_each_dep(&self, f: &mut dyn FnMut(&Rc<SubscriberSet>)) {
        for set in self.deps.borrow().iter() {
            f(set);
        }
    }

    fn adopt(&self, child: Rc<dyn AnySubscriber>) {
        self.children.borrow_mut().push(child);
    }

    fn stop(&self) {
        if self.flags.get() & STOPPED != 0 {
            return;
        }
        self.set_flag(STOPPED);
        self.cleanup();
        self.release_children();
    }

    fn dispatch(self: Rc<Self>) {
        Computation { inner: self }.dispatch();
    }
}

// =============================================================================
// ACTIVE GUARD
// =============================================================================

/// Keeps a computation on top of the active stack for the duration of a run.
///
/// Tracking is forced on inside the run, so a computation started from an
/// untracked block still records its own reads.
struct ActiveGuard {
    prev_tracking: bool,
}

impl ActiveGuard {
    fn enter(computation: Rc<dyn AnySubscriber>) -> Self {
        with_context(|ctx| {
            if ctx.depth() >= MAX_RUN_DEPTH {
                panic!(
                    "Maximum update depth exceeded. This can happen when computations \
                     keep re-triggering each other. Check for computations that write \
                     to state read by another computation that writes back."
                );
            }
            ctx.push_active(computation);
            Self { prev_tracking: ctx.set_tracking_enabled(true) }
        })
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        let popped = with_context(|ctx| {
            ctx.set_tracking_enabled(self.prev_tracking);
            ctx.pop_active()
        });
        drop(popped);
    }
}

// =============================================================================
// COMPUTATION HANDLE
// =============================================================================

/// Handle to a computation.
///
/// Cloning shares the same computation. It stays subscribed while any handle
/// (or an owning parent) is alive; dropping the last one detaches it.
#[must_use = "a computation is detached when its last handle is dropped"]
pub struct Computation<T> {
    inner: Rc<ComputationInner<T>>,
}

impl<T> Clone for Computation<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: 'static> Computation<T> {
    /// Build a computation without running it or attaching it to a parent.
    pub(crate) fn create(work: impl Fn() -> T + 'static, options: RunOptions<T>, kind: u32) -> Self {
        let mut flags = kind;
        if options.lazy {
            flags |= LAZY;
        }
        if options.scheduler.is_some() {
            flags |= SCHEDULED;
        }

        let id = with_context(|ctx| ctx.next_computation_id());
        let inner = Rc::new(ComputationInner {
            id,
            flags: Cell::new(flags),
            work: Box::new(work),
            deps: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            scheduler: options.scheduler,
        });
        Self { inner }
    }

    /// Hand ownership to the computation currently running, if any.
    pub(crate) fn attach_to_active(&self) {
        if let Some(parent) = with_context(|ctx| ctx.active()) {
            parent.adopt(self.as_subscriber());
        }
    }

    /// Run the work with this computation active and return its result.
    ///
    /// Every run starts from an empty dependency set. A stopped computation
    /// still runs its work, but subscribes to nothing.
    pub fn run(&self) -> T {
        let inner = &self.inner;
        if inner.flags.get() & STOPPED != 0 {
            return untrack(|| (inner.work)());
        }

        inner.cleanup();
        inner.release_children();

        let value = {
            let _guard = ActiveGuard::enter(self.as_subscriber());
            (inner.work)()
        };
        inner.set_flag(HAS_RUN);
        value
    }

    /// React to a dependency change: hand over to the scheduler if there is
    /// one, re-run otherwise.
    pub fn dispatch(&self) {
        match self.inner.scheduler.clone() {
            Some(scheduler) => scheduler(self),
            None => {
                let _ = self.run();
            }
        }
    }

    /// Detach from every subscriber set for good.
    pub fn stop(&self) {
        AnySubscriber::stop(&*self.inner);
    }

    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    pub fn flags(&self) -> u32 {
        self.inner.flags.get()
    }

    pub fn is_stopped(&self) -> bool {
        self.flags() & STOPPED != 0
    }

    /// Whether the work has completed at least one tracked run
    pub fn has_run(&self) -> bool {
        self.flags() & HAS_RUN != 0
    }

    /// Number of subscriber sets this computation belongs to
    pub fn dep_count(&self) -> usize {
        self.inner.dep_count()
    }

    /// Number of computations owned by the last run
    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn ptr_eq(&self, other: &Computation<T>) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> WeakComputation<T> {
        WeakComputation { inner: Rc::downgrade(&self.inner) }
    }

    /// Type-erased view used by the registry.
    pub fn as_subscriber(&self) -> Rc<dyn AnySubscriber> {
        self.inner.clone()
    }

    pub(crate) fn subscriber(&self) -> &dyn AnySubscriber {
        &*self.inner
    }
}

impl<T> fmt::Debug for Computation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("flags", &format_args!("{:#b}", self.inner.flags.get()))
            .field("deps", &self.inner.deps.borrow().len())
            .finish()
    }
}

/// Weak handle that doesn't keep a computation alive.
pub struct WeakComputation<T> {
    inner: Weak<ComputationInner<T>>,
}

impl<T> Clone for WeakComputation<T> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T> WeakComputation<T> {
    pub fn upgrade(&self) -> Option<Computation<T>> {
        self.inner.upgrade().map(|inner| Computation { inner })
    }
}

// =============================================================================
// PUBLIC API
// =============================================================================

/// Run `work` now and again whenever a tracked value it read changes.
///
/// # Example
///
/// ```
/// use spark_reactive::{reactive, record, run};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "ok" => true, "text" => "hello" });
/// let runs = Rc::new(Cell::new(0));
///
/// let _c = run({
///     let state = state.clone();
///     let runs = runs.clone();
///     move || {
///         runs.set(runs.get() + 1);
///         if state.get("ok") == true {
///             let _ = state.get("text");
///         }
///     }
/// });
///
/// state.set("ok", false);
/// assert_eq!(runs.get(), 2);
///
/// // "text" is no longer a dependency
/// state.set("text", "bye");
/// assert_eq!(runs.get(), 2);
/// ```
pub fn run<T: 'static>(work: impl Fn() -> T + 'static) -> Computation<T> {
    run_with(work, RunOptions::new())
}

/// [`run`] with options.
///
/// A lazy computation doesn't run until [`Computation::run`] is called. A
/// scheduler receives the handle on every notification and decides when (or
/// whether) to re-run.
///
/// Computations created while another one is running are owned by it, and
/// are stopped when it re-runs, stops, or is dropped.
pub fn run_with<T: 'static>(work: impl Fn() -> T + 'static, options: RunOptions<T>) -> Computation<T> {
    let lazy = options.lazy;
    let computation = Computation::create(work, options, 0);
    computation.attach_to_active();
    if !lazy {
        let _ = computation.run();
    }
    computation
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::has_active_computation;
    use crate::{reactive, record, untrack};

    #[test]
    fn runs_immediately_and_returns_value() {
        let c = run(|| 40 + 2);
        assert!(c.has_run());
        assert_eq!(c.run(), 42);
    }

    #[test]
    fn lazy_waits_for_explicit_run() {
        let runs = Rc::new(Cell::new(0));
        let runs_clone = runs.clone();
        let c = run_with(move || runs_clone.set(runs_clone.get() + 1), RunOptions::new().lazy(true));

        assert_eq!(runs.get(), 0);
        assert!(!c.has_run());
        assert_eq!(c.flags() & LAZY, LAZY);
        c.run();
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn active_stack_is_restored() {
        assert!(!has_active_computation());
        let c = run(|| {
            assert!(has_active_computation());
            with_context(|ctx| ctx.depth())
        });
        assert_eq!(c.run(), 1);
        assert!(!has_active_computation());
    }

    #[test]
    fn stack_is_restored_after_panic() {
        let c = run_with(|| -> i32 { panic!("boom") }, RunOptions::new().lazy(true));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| c.run()));
        assert!(result.is_err());
        assert!(!has_active_computation());
        assert!(with_context(|ctx| ctx.tracking_enabled.get()));
    }

    #[test]
    fn run_inside_untrack_still_tracks() {
        let state = reactive(record! { "foo" => 1 });
        let state_clone = state.clone();
        let c = untrack(|| run(move || state_clone.get("foo")));
        assert_eq!(c.dep_count(), 1);
    }

    #[test]
    fn branch_switching_drops_stale_dependencies() {
        let state = reactive(record! { "ok" => true, "text" => "hello" });
        let runs = Rc::new(Cell::new(0));

        let state_clone = state.clone();
        let runs_clone = runs.clone();
        let c = run(move || {
            runs_clone.set(runs_clone.get() + 1);
            if state_clone.get("ok") == true {
                let _ = state_clone.get("text");
            }
        });
        assert_eq!(c.dep_count(), 2);

        state.set("ok", false);
        assert_eq!(c.dep_count(), 1);
        state.set("text", "world");
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let state = reactive(record! { "n" => 0 });
        let state_clone = state.clone();
        let c = run(move || {
            let n = state_clone.get("n").as_number().unwrap_or(0.0);
            state_clone.set("n", n + 1.0);
        });

        assert_eq!(state.get("n"), 1);
        state.set("n", 10);
        assert_eq!(state.get("n"), 11);
        drop(c);
    }

    #[test]
    fn stop_detaches() {
        let state = reactive(record! { "foo" => 1 });
        let runs = Rc::new(Cell::new(0));

        let state_clone = state.clone();
        let runs_clone = runs.clone();
        let c = run(move || {
            runs_clone.set(runs_clone.get() + 1);
            let _ = state_clone.get("foo");
        });

        c.stop();
        assert!(c.is_stopped());
        assert_eq!(c.dep_count(), 0);
        state.set("foo", 2);
        assert_eq!(runs.get(), 1);

        // Still runnable, but subscribes to nothing
        c.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(c.dep_count(), 0);
    }

    #[test]
    fn dropping_handle_detaches() {
        let state = reactive(record! { "foo" => 1 });
        let runs = Rc::new(Cell::new(0));

        let state_clone = state.clone();
        let runs_clone = runs.clone();
        let c = run(move || {
            runs_clone.set(runs_clone.get() + 1);
            let _ = state_clone.get("foo");
        });
        drop(c);

        state.set("foo", 2);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn nested_computations_are_owned_by_parent() {
        let state = reactive(record! { "outer" => 1, "inner" => 1 });
        let inner_runs = Rc::new(Cell::new(0));

        let state_clone = state.clone();
        let inner_runs_clone = inner_runs.clone();
        let parent = run(move || {
            let _ = state_clone.get("outer");
            let state = state_clone.clone();
            let inner_runs = inner_runs_clone.clone();
            // Handle dropped here; the parent keeps it alive
            let _ = run(move || {
                inner_runs.set(inner_runs.get() + 1);
                let _ = state.get("inner");
            });
        });
        assert_eq!(parent.child_count(), 1);
        assert_eq!(inner_runs.get(), 1);

        state.set("inner", 2);
        assert_eq!(inner_runs.get(), 2);

        // Re-running the parent replaces the child instead of stacking them
        state.set("outer", 2);
        assert_eq!(inner_runs.get(), 3);
        assert_eq!(parent.child_count(), 1);
        state.set("inner", 3);
        assert_eq!(inner_runs.get(), 4);

        drop(parent);
        state.set("inner", 4);
        assert_eq!(inner_runs.get(), 4);
    }

    #[test]
    fn weak_handle_upgrades_while_alive() {
        let c = run(|| ());
        let weak = c.downgrade();
        assert!(weak.upgrade().is_some_and(|u| u.ptr_eq(&c)));
        drop(c);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    #[should_panic(expected = "Maximum update depth exceeded")]
    fn ping_pong_is_detected() {
        let state = reactive(record! { "a" => 0, "b" => 0 });

        let s = state.clone();
        let _first = run(move || {
            let b = s.get("b").as_number().unwrap_or(0.0);
            s.set("a", b + 1.0);
        });
        let s = state.clone();
        let _second = run(move || {
            let a = s.get("a").as_number().unwrap_or(0.0);
            s.set("b", a + 1.0);
        });
    }
}
