// ============================================================================
// spark-reactive - Constants
// Flag constants describing computation kind and lifecycle state
// ============================================================================

// =============================================================================
// COMPUTATION KIND FLAGS
// =============================================================================

/// Computation waits for an explicit first run instead of running at creation
pub const LAZY: u32 = 1 << 0;

/// Computation backs a derived value (its scheduler only marks the cache dirty)
pub const DERIVED: u32 = 1 << 1;

/// Computation backs a watcher
pub const WATCHER: u32 = 1 << 2;

/// Computation was created with a custom scheduler
pub const SCHEDULED: u32 = 1 << 3;

// =============================================================================
// LIFECYCLE FLAGS
// =============================================================================

/// Computation has completed at least one run
pub const HAS_RUN: u32 = 1 << 8;

/// Computation was stopped and no longer subscribes to anything
pub const STOPPED: u32 = 1 << 9;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum nesting of computation runs. Only unbounded recursion gets here;
/// runaway re-triggering is caught by `MAX_CASCADE_DEPTH` first.
pub const MAX_RUN_DEPTH: usize = 1000;

/// Maximum nesting of notifications that re-run subscribers which write
/// again, before we consider it an infinite loop
pub const MAX_CASCADE_DEPTH: usize = 100;

/// Largest sequence length (and one past the largest index)
pub const MAX_SEQUENCE_LEN: usize = u32::MAX as usize;

// =============================================================================
// TESTS
// =============================================================================
