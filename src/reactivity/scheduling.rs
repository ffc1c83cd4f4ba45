// ============================================================================
// spark-reactive - Deferred Job Scheduling
// The queue behind post-flush watchers
// ============================================================================
//
// There are no microtasks in Rust, so the "run after the current synchronous
// block" checkpoint is explicit: the end of the outermost `batch()`, or a
// call to `tick()` / `flush_jobs()`. Jobs run FIFO on the calling thread.
// ============================================================================

use crate::core::context::{with_context, Job};

/// Maximum jobs drained by one flush before we consider it an infinite loop
pub const MAX_FLUSH_JOBS: usize = 10_000;

/// Queue a job for the next checkpoint.
pub fn queue_job(job: Job) {
    with_context(|ctx| ctx.push_job(job));
}

/// Run every queued job, including jobs queued by the jobs themselves.
///
/// Returns the number of jobs run. A nested call (from inside a job) returns
/// 0 immediately; the outer flush picks up whatever was queued.
///
/// # Panics
///
/// Panics after [`MAX_FLUSH_JOBS`] jobs in one flush, which happens when a
/// post-flush watcher keeps re-triggering itself.
pub fn flush_jobs() -> usize {
    if with_context(|ctx| ctx.set_flushing(true)) {
        return 0;
    }

    // Restore the flag even if a job panics
    struct FlushGuard;

    impl Drop for FlushGuard {
        fn drop(&mut self) {
            with_context(|ctx| ctx.set_flushing(false));
        }
    }

    let _guard = FlushGuard;
    let mut ran = 0usize;

    while let Some(job) = with_context(|ctx| ctx.pop_job()) {
        ran += 1;
        if ran > MAX_FLUSH_JOBS {
            panic!(
                "Maximum update depth exceeded. A deferred watcher keeps scheduling itself; \
                 check for callbacks that write to the state they watch."
            );
        }
        job();
    }

    if ran > 0 {
        tracing::trace!(jobs = ran, "flushed deferred jobs");
    }
    ran
}

// =============================================================================
// TESTS
// =============================================================================
