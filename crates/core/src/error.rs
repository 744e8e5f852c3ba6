//! Error types for the rollback orchestrator
//!
//! Expected operational outcomes (an unreachable health endpoint, a fallback
//! tag that cannot be pulled, a cycle that ends in `Failed`) are modeled as
//! values, not errors. The types here cover genuine faults: a deployment
//! driver that cannot run its command, configuration that cannot be loaded,
//! or an audit artifact that cannot be written.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by a [`DeploymentDriver`](crate::traits::DeploymentDriver)
/// or [`ImageStore`](crate::traits::ImageStore) implementation.
#[derive(Error, Debug)]
pub enum DriverError {
    /// An external command or API call failed
    #[error("command failed: {0}")]
    CommandFailed(String),

    /// The operation did not complete within its bounded timeout
    #[error("operation '{operation}' timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// The driver cannot determine the requested state
    #[error("state unavailable: {0}")]
    StateUnavailable(String),

    /// I/O errors (compose file access, backup writes)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error type for the sentinel core
#[derive(Error, Debug)]
pub enum SentinelError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// A deployment driver fault during a named step
    #[error("driver error during {operation}: {source}")]
    Driver {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    /// Event log or report persistence failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization of an audit artifact failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SentinelError {
    /// Wrap a driver fault with the step it occurred in.
    pub fn driver(operation: &'static str, source: DriverError) -> Self {
        SentinelError::Driver { operation, source }
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Result type alias for driver operations
pub type DriverResult<T> = std::result::Result<T, DriverError>;
