//! Errors raised by the lifecycle engine's build/start/stop phases.

use thiserror::Error;

use crate::error::{ContainerError, FactoryError};
use crate::key::ServiceKey;

/// Errors from `build`/`start`.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `build()` itself failed (eager or lifecycle-bearing construction).
    #[error(transparent)]
    Container(#[from] ContainerError),

    /// A start hook returned an error; already-started services were
    /// rolled back in reverse order before this was returned.
    #[error("start hook for {key} failed: {source}")]
    StartFailed {
        key: ServiceKey,
        #[source]
        source: FactoryError,
    },

    /// One or more stop hooks returned an error. Every remaining hook still
    /// ran; this aggregates all of their outcomes.
    #[error("{} stop hook(s) failed", .failures.len())]
    StopFailed { failures: Vec<(ServiceKey, FactoryError)> },
}

/// Convenience alias used throughout the lifecycle module.
pub type LifecycleResult<T> = Result<T, LifecycleError>;
