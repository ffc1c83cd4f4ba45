// ============================================================================
// spark-reactive - Core Module
// Fundamental types, traits, errors and context for the reactive system
// ============================================================================

pub mod constants;
pub mod context;
pub mod error;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use context::{
    has_active_computation, is_batching, is_tracking, pending_jobs, try_with_context, with_context,
    ReactiveContext,
};
pub use error::{AccessError, Operation};
pub use types::{AnySubscriber, Change, ComputationId, ObjectId, PropKey, TrackKey};
