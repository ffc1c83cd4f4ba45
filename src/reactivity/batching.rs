// ============================================================================
// spark-reactive - Batching
// Synchronous blocks that end in a checkpoint, and untracked reads
// ============================================================================

use crate::core::context::with_context;
use crate::reactivity::scheduling::flush_jobs;

// =============================================================================
// BATCH
// =============================================================================

/// Run `f` as one synchronous block; deferred jobs queued inside run once
/// when the outermost batch completes.
///
/// Writes inside the batch still notify synchronous subscribers immediately.
/// Only post-flush watchers are coalesced.
///
/// # Example
///
/// ```
/// use spark_reactive::{batch, reactive, record, watch, FlushTiming, WatchOptions};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "foo" => 1 });
/// let calls = Rc::new(Cell::new(0));
///
/// let _watcher = watch(
///     { let state = state.clone(); move || state.get("foo") },
///     { let calls = calls.clone(); move |_, _, _| calls.set(calls.get() + 1) },
///     WatchOptions::new().flush(FlushTiming::Post),
/// );
///
/// batch(|| {
///     state.set("foo", 2);
///     state.set("foo", 3);
/// });
///
/// // One callback for the whole batch
/// assert_eq!(calls.get(), 1);
/// ```
pub fn batch<T>(f: impl FnOnce() -> T) -> T {
    with_context(|ctx| ctx.enter_batch());

    // Use a guard pattern to ensure we exit the batch even on panic
    struct BatchGuard;

    impl Drop for BatchGuard {
        fn drop(&mut self) {
            let depth = with_context(|ctx| ctx.exit_batch());

            // When outermost batch completes, run the checkpoint
            if depth == 0 && !std::thread::panicking() {
                flush_jobs();
            }
        }
    }

    let _guard = BatchGuard;
    f()
}

// =============================================================================
// UNTRACK
// =============================================================================

/// Read tracked state without creating dependencies.
///
/// Computations started inside `f` still track their own reads.
///
/// # Example
///
/// ```
/// use spark_reactive::{reactive, record, run, untrack};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = reactive(record! { "a" => 1, "b" => 2 });
/// let runs = Rc::new(Cell::new(0));
///
/// let _c = run({
///     let state = state.clone();
///     let runs = runs.clone();
///     move || {
///         let _ = state.get("a");
///         let _ = untrack(|| state.get("b"));
///         runs.set(runs.get() + 1);
///     }
/// });
///
/// state.set("a", 10); // Re-runs (dependency)
/// assert_eq!(runs.get(), 2);
///
/// state.set("b", 20); // Does NOT re-run (untracked)
/// assert_eq!(runs.get(), 2);
/// ```
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let prev = with_context(|ctx| ctx.set_tracking_enabled(false));

    // Use a guard pattern to ensure we restore even on panic
    struct UntrackGuard {
        prev: bool,
    }

    impl Drop for UntrackGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_tracking_enabled(self.prev));
        }
    }

    let _guard = UntrackGuard { prev };
    f()
}

/// Check if tracking is currently paused by `untrack()`.
pub fn is_untracking() -> bool {
    with_context(|ctx| !ctx.tracking_enabled.get())
}

// =============================================================================
// TICK
// =============================================================================

/// Reach a checkpoint now: run every deferred job.
///
/// Returns the number of jobs run.
pub fn tick() -> usize {
    flush_jobs()
}

// =============================================================================
// TESTS
// =============================================================================
