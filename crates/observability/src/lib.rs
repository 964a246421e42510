//! Tracing and logging (shared setup).

/// Tracing configuration (filters, formatters).
pub mod tracing;

pub use crate::tracing::{LogConfig, LogConfigError, LogFormat, init};
