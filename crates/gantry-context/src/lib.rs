//! Context window construction.
//!
//! Projects the conversation log into provider messages, enforcing a
//! token cap by removing a contiguous middle range when needed, and plans
//! the two sliding message-level cache points.

pub mod cache_points;
pub mod filtering;

pub use cache_points::{apply_cache_points, plan_cache_points, CachePointPlan};
pub use filtering::{middle_out_filtering, no_op_filtering, FilteredWindow, DEFAULT_TOKEN_CAP};
