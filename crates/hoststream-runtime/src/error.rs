//! # Design
//!
//! - Centralize runtime errors for notification intake and worker lifecycle.
//! - Keep error messages constant while carrying context fields for debugging.

use std::error::Error;

use hoststream_core::StreamId;
use thiserror::Error;
use tokio::task::JoinError;

/// Result alias for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Runtime-level error type.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The notification queue is full; the host should retry or drop the event.
    #[error("notification queue full")]
    QueueFull {
        /// Stream the rejected notification was addressed to.
        stream_id: StreamId,
        /// Configured queue capacity.
        capacity: usize,
    },
    /// The runtime was shut down or never started.
    #[error("runtime stopped")]
    Stopped,
    /// No Tokio executor was available to host the worker task.
    #[error("no async executor available")]
    NoExecutor,
    /// Configured queue capacity cannot be used.
    #[error("invalid queue capacity")]
    InvalidQueueCapacity {
        /// Offending capacity.
        capacity: usize,
    },
    /// A job passed to `invoke` panicked; the worker contained it and kept running.
    #[error("invoked job panicked")]
    JobPanicked,
    /// The worker task ended abnormally.
    #[error("runtime worker failed")]
    Worker {
        /// Join failure reported by Tokio.
        source: JoinError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: Box<dyn Error + Send + Sync>,
    },
}
