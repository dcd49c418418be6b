//! Infrastructure layer: the concrete adapters behind the pipeline's ports.
//!
//! - [`config`]: parameter-store backed configuration resolver
//! - [`credentials`]: credential references (`env:`/`file:`)
//! - [`directory`]: vendor device-management API over HTTP
//! - [`postgres`]: device record table
//! - [`report`]: run summary reporting via tracing
//! - [`wiring`]: builds live adapters from a resolved configuration

pub mod config;
pub mod credentials;
pub mod directory;
pub mod postgres;
pub mod report;
pub mod wiring;

pub use config::ParameterStoreResolver;
pub use credentials::CredentialsRef;
pub use directory::DirectoryDeviceSource;
pub use postgres::{PostgresRecordStore, TableName};
pub use report::TracingReporter;
pub use wiring::LiveAdapters;
