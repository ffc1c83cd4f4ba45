// ============================================================================
// spark-reactive - Observable Module
// Raw data, dynamic values and the tracked wrappers over them
// ============================================================================

pub mod raw;
mod sequence;
pub mod tracked;
pub mod value;

pub use raw::{Data, RawObject};
pub use tracked::{reactive, readonly, shallow_reactive, shallow_readonly, wrap, Tracked, WrapMode};
pub use value::Value;
