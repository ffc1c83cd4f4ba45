// ============================================================================
// spark-reactive - Fine-Grained Reactive State for Rust
// ============================================================================
//
// Tracked records and sequences, computations that re-run when what they read
// changes, cached derived values and watchers with old/new values.
//
// Layers, bottom up:
// - core:        ids, keys, errors, the thread-local context
// - reactivity:  subscription registry, deferred queue, batch/untrack
// - observable:  raw data, values, tracked wrappers
// - primitives:  computations, derived values, watchers
// ============================================================================

pub mod core;
mod macros;
pub mod observable;
pub mod primitives;
pub mod reactivity;

// Re-export core items at crate root for ergonomic access
pub use crate::core::constants;
pub use crate::core::context::{
    has_active_computation, is_batching, is_tracking, pending_jobs, with_context, ReactiveContext,
};
pub use crate::core::error::{AccessError, Operation};
pub use crate::core::types::{AnySubscriber, Change, ComputationId, ObjectId, PropKey, TrackKey};

// Re-export the observable layer
pub use observable::{
    reactive, readonly, shallow_reactive, shallow_readonly, wrap, Data, RawObject, Tracked, Value,
    WrapMode,
};

// Re-export primitives
pub use primitives::computation::{run, run_with, Computation, RunOptions, Scheduler, WeakComputation};
pub use primitives::derived::{derive, Derived};
pub use primitives::watch::{
    observe, traverse, watch, FlushTiming, OnInvalidate, WatchOptions, WatchSource, Watcher,
};

// Re-export reactivity functions
pub use reactivity::batching::{batch, is_untracking, tick, untrack};
pub use reactivity::scheduling::{flush_jobs, queue_job};
pub use reactivity::tracking::{is_registered, notify, subscribe, subscriber_count};

// =============================================================================
// TESTS
// =============================================================================
