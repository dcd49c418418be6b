//! Tracing and logging setup shared by every fleetsync binary.

pub use crate::tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat, default_level: &str) {
    tracing::init(format, default_level);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
