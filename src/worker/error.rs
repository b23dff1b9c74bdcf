//! Errors surfaced by the worker manager.

use thiserror::Error;

use crate::error::ContainerError;

/// Errors raised while discovering or supervising workers. Per spec.md
/// §7, supervisor failures never abort the process on their own — this
/// type exists for diagnostics and for the (rare) case a host wants to
/// treat worker discovery failure as fatal.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Discovering workers via the capability registry failed to resolve
    /// one of them.
    #[error("failed to resolve worker: {0}")]
    Discovery(#[from] ContainerError),

    /// A worker's run loop panicked. Recovered via `JoinHandle`'s own
    /// panic propagation rather than `catch_unwind` across an await point.
    #[error("worker `{name}` panicked: {message}")]
    Panicked { name: String, message: String },

    /// The worker's circuit breaker tripped after repeated failures; it
    /// will not be restarted again.
    #[error("worker `{name}` tripped after {failures} failures in {window:?}")]
    CircuitTripped {
        name: String,
        failures: u32,
        window: std::time::Duration,
    },
}
