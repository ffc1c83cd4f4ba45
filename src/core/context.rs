// ============================================================================
// spark-reactive - Reactive Context
// Thread-local state: active-computation stack, registry, wrapper cache, jobs
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::types::{AnySubscriber, ComputationId, ObjectId, TrackKey};
use crate::observable::tracked::{TrackedInner, WrapMode};
use crate::reactivity::tracking::SubscriberSet;

/// Per-object table of subscriber sets, keyed by property.
pub type KeyTable = IndexMap<TrackKey, Rc<SubscriberSet>>;

/// A deferred unit of work run at the next checkpoint.
pub type Job = Box<dyn FnOnce()>;

// =============================================================================
// REACTIVE CONTEXT
// =============================================================================

/// Thread-local reactive context holding all global state for reactivity.
///
/// Every field is visible on purpose: computations running nested or
/// re-entrantly all observe the same snapshot of what is active right now.
pub struct ReactiveContext {
    // =========================================================================
    // COMPUTATION TRACKING
    // =========================================================================
    /// Running computations; the top is the active one
    pub active_stack: RefCell<Vec<Rc<dyn AnySubscriber>>>,

    /// Whether reads register subscriptions (cleared by `untrack`)
    pub tracking_enabled: Cell<bool>,

    /// Nested notifications currently dispatching subscribers
    pub cascade_depth: Cell<usize>,

    // =========================================================================
    // REGISTRY
    // =========================================================================
    /// Tracked object -> property -> subscriber set
    pub registry: RefCell<HashMap<ObjectId, KeyTable>>,

    /// Raw object + mode -> wrapper, for identity-stable wrapping
    pub wrappers: RefCell<HashMap<(ObjectId, WrapMode), Weak<TrackedInner>>>,

    // =========================================================================
    // DEFERRED JOBS
    // =========================================================================
    /// Jobs waiting for the next checkpoint, FIFO
    pub job_queue: RefCell<VecDeque<Job>>,

    /// Current batch depth (for nested batches)
    pub batch_depth: Cell<u32>,

    /// Whether the job queue is being drained
    pub is_flushing: Cell<bool>,

    /// Id counter shared by objects and computations
    next_id: Cell<u64>,
}

impl ReactiveContext {
    /// Create a new reactive context with default values
    pub fn new() -> Self {
        Self {
            active_stack: RefCell::new(Vec::new()),
            tracking_enabled: Cell::new(true),
            cascade_depth: Cell::new(0),
            registry: RefCell::new(HashMap::new()),
            wrappers: RefCell::new(HashMap::new()),
            job_queue: RefCell::new(VecDeque::new()),
            batch_depth: Cell::new(0),
            is_flushing: Cell::new(false),
            next_id: Cell::new(1),
        }
    }

    // =========================================================================
    // IDS
    // =========================================================================

    fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Allocate a fresh object identity
    pub fn next_object_id(&self) -> ObjectId {
        ObjectId(self.next_id())
    }

    /// Allocate a fresh computation identity
    pub fn next_computation_id(&self) -> ComputationId {
        ComputationId(self.next_id())
    }

    // =========================================================================
    // COMPUTATION TRACKING
    // =========================================================================

    /// Push a computation, making it the active one
    pub fn push_active(&self, computation: Rc<dyn AnySubscriber>) {
        self.active_stack.borrow_mut().push(computation);
    }

    /// Pop the active computation, restoring the enclosing one
    pub fn pop_active(&self) -> Option<Rc<dyn AnySubscriber>> {
        self.active_stack.borrow_mut().pop()
    }

    /// Get the active computation
    pub fn active(&self) -> Option<Rc<dyn AnySubscriber>> {
        self.active_stack.borrow().last().cloned()
    }

    /// Id of the active computation
    pub fn active_id(&self) -> Option<ComputationId> {
        self.active_stack.borrow().last().map(|c| c.id())
    }

    /// Check if there's an active computation
    pub fn has_active(&self) -> bool {
        !self.active_stack.borrow().is_empty()
    }

    /// Number of nested runs in progress
    pub fn depth(&self) -> usize {
        self.active_stack.borrow().len()
    }

    /// Set the tracking flag, returning the previous value
    pub fn set_tracking_enabled(&self, value: bool) -> bool {
        self.tracking_enabled.replace(value)
    }

    /// Reads register subscriptions only with an active computation and
    /// tracking enabled
    pub fn is_tracking(&self) -> bool {
        self.tracking_enabled.get() && self.has_active()
    }

    // =========================================================================
    // BATCHING
    // =========================================================================

    /// Increment batch depth, returns new depth
    pub fn enter_batch(&self) -> u32 {
        let depth = self.batch_depth.get() + 1;
        self.batch_depth.set(depth);
        depth
    }

    /// Decrement batch depth, returns new depth
    pub fn exit_batch(&self) -> u32 {
        let depth = self.batch_depth.get().saturating_sub(1);
        self.batch_depth.set(depth);
        depth
    }

    /// Check if currently in a batch
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    // =========================================================================
    // DEFERRED JOBS
    // =========================================================================

    /// Append a job to the queue
    pub fn push_job(&self, job: Job) {
        self.job_queue.borrow_mut().push_back(job);
    }

    /// Take the oldest queued job
    pub fn pop_job(&self) -> Option<Job> {
        self.job_queue.borrow_mut().pop_front()
    }

    /// Number of queued jobs
    pub fn pending_jobs(&self) -> usize {
        self.job_queue.borrow().len()
    }

    /// Set flushing mode, returning previous
    pub fn set_flushing(&self, value: bool) -> bool {
        self.is_flushing.replace(value)
    }
}

impl Default for ReactiveContext {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// THREAD-LOCAL ACCESS
// =============================================================================

thread_local! {
    /// The thread-local reactive context
    static CONTEXT: ReactiveContext = ReactiveContext::new();
}

/// Access the thread-local reactive context.
///
/// # Example
///
/// ```
/// use spark_reactive::with_context;
///
/// let depth = with_context(|ctx| ctx.depth());
/// assert_eq!(depth, 0);
/// ```
pub fn with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> R {
    CONTEXT.with(f)
}

/// Like [`with_context`], but returns `None` once the thread-local has been
/// torn down. Used from `Drop` impls.
pub fn try_with_context<R>(f: impl FnOnce(&ReactiveContext) -> R) -> Option<R> {
    CONTEXT.try_with(f).ok()
}

// =============================================================================
// CONVENIENCE FUNCTIONS
// =============================================================================

/// Check if reads would currently register subscriptions
pub fn is_tracking() -> bool {
    with_context(|ctx| ctx.is_tracking())
}

/// Check if a computation is currently running
pub fn has_active_computation() -> bool {
    with_context(|ctx| ctx.has_active())
}

/// Check if currently in a batch
pub fn is_batching() -> bool {
    with_context(|ctx| ctx.is_batching())
}

/// Number of jobs waiting for the next checkpoint
pub fn pending_jobs() -> usize {
    with_context(|ctx| ctx.pending_jobs())
}

// =============================================================================
// TESTS
// =============================================================================
