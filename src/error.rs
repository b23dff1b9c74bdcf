//! Error taxonomy for registration and resolution.

use std::fmt;

use thiserror::Error;

use crate::key::{Chain, ServiceKey};

/// A factory-supplied cause, boxed so factories can return any
/// `std::error::Error` without this crate depending on it.
#[derive(Debug)]
pub struct FactoryError(Box<dyn std::error::Error + Send + Sync>);

impl FactoryError {
    /// Wraps an arbitrary error as the cause of a failed factory invocation.
    pub fn new<E: std::error::Error + Send + Sync + 'static>(cause: E) -> Self {
        Self(Box::new(cause))
    }

    /// Builds a factory error from a plain message, for call sites with no
    /// underlying `std::error::Error` to wrap.
    pub fn msg(message: impl Into<String>) -> Self {
        Self(Box::new(Message(message.into())))
    }
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for FactoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl From<ContainerError> for FactoryError {
    /// Lets a factory body resolve a dependency with `?`: a nested
    /// `ContainerError` (e.g. a transitive `CyclicDependency` or the
    /// dependency's own `FactoryFailed`) becomes this factory's cause.
    fn from(err: ContainerError) -> Self {
        FactoryError::new(err)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for Message {}

/// Errors raised by registration and resolution. Every variant carries the
/// originating key and/or module so diagnostics never require a second
/// lookup.
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No descriptor is registered for this key.
    #[error("service not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: ServiceKey,
    },

    /// A descriptor already exists for this key.
    #[error("duplicate registration for {key} (already registered by module `{existing_module}`)")]
    DuplicateRegistration {
        /// The key that collided.
        key: ServiceKey,
        /// The module that registered it first.
        existing_module: &'static str,
    },

    /// Registration was attempted after `build()` froze the container.
    #[error("container is already built; registration of {key} rejected")]
    AlreadyBuilt {
        /// The key whose registration was rejected.
        key: ServiceKey,
    },

    /// Resolving this key re-entered itself transitively.
    #[error("cyclic dependency detected: {chain}")]
    CyclicDependency {
        /// The full chain, including the repeated key at both ends.
        chain: Chain,
    },

    /// The factory for this key returned an error.
    #[error("factory for {key} failed")]
    FactoryFailed {
        /// The key whose factory failed.
        key: ServiceKey,
        /// The underlying cause.
        #[source]
        source: FactoryError,
    },

    /// Two modules registered under the same name.
    #[error("duplicate module registration: `{0}`")]
    DuplicateModule(&'static str),
}

/// Convenience alias used throughout the crate.
pub type ContainerResult<T> = Result<T, ContainerError>;
