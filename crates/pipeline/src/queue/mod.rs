//! Single-purpose work queue with per-item status and a bounded retry count.
//!
//! ## Components
//!
//! - `QueueItem`: one device reference plus status, attempt count, last error
//! - `RetryPolicy`: attempt cap and backoff between retry passes
//! - `WorkQueue`: hands out items and records outcomes

pub mod types;
pub mod work_queue;

pub use types::{AttemptRecord, BackoffStrategy, ItemStatus, QueueItem, RetryPolicy};
pub use work_queue::{Archive, WorkQueue};
