//! Queue-driven reconciliation pipeline.
//!
//! ## Flow
//!
//! ```text
//! ConfigResolver -> DeviceSource::list_devices -> WorkQueue (one item per device)
//!     -> ItemProcessor (detail fetch, validate, upsert) -> RecordStore
//!     -> RunSummary -> SummaryReporter
//! ```
//!
//! ## Guarantees
//!
//! - one device's failure never aborts the run; only configuration and the
//!   listing call are fatal
//! - every listed device ends in the summary exactly once
//! - retries are bounded by a counter carried on each item

pub mod classify;
pub mod config;
pub mod controller;
pub mod memory;
pub mod ports;
pub mod processor;
pub mod queue;
pub mod summary;

pub use classify::{ClassificationPolicy, Disposition, ErrorClass, ItemError, Verdict};
pub use config::RunConfig;
pub use controller::{RunController, RunError, reconcile};
pub use ports::{
    AdapterFactory, ConfigError, ConfigResolver, DeviceListing, DeviceSource, RecordStore,
    SourceError, StoreError, SummaryReporter, UpsertAck,
};
pub use processor::{ItemOutcome, ItemProcessor};
pub use queue::{BackoffStrategy, ItemStatus, QueueItem, RetryPolicy, WorkQueue};
pub use summary::{CompletedDevice, FailedDevice, RunId, RunSummary};
