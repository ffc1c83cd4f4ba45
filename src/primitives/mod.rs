// ============================================================================
// spark-reactive - Primitives Module
// Computations, derived values and watchers
// ============================================================================

pub mod computation;
pub mod derived;
pub mod watch;

// Re-export for convenience
pub use computation::{run, run_with, Computation, RunOptions, Scheduler, WeakComputation};
pub use derived::{derive, Derived};
pub use watch::{observe, traverse, watch, FlushTiming, OnInvalidate, WatchOptions, WatchSource, Watcher};
