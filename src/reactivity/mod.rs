// ============================================================================
// spark-reactive - Reactivity Module
// Subscription registry, deferred scheduling and batching
// ============================================================================

pub mod batching;
pub mod scheduling;
pub mod tracking;

// Re-export main tracking functions
pub use tracking::{
    is_registered, link_active, notify, subscribe, subscriber_count, track_through, SubscriberSet,
};

// Re-export scheduling functions
pub use scheduling::{flush_jobs, queue_job, MAX_FLUSH_JOBS};

// Re-export batching functions
pub use batching::{batch, is_untracking, tick, untrack};
