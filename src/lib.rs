//! `gaz`: a small application runtime combining a type-indexed DI
//! container, a lifecycle engine, and a supervised worker pool.
//!
//! ```
//! use gaz::{Container, HookContext, LifecycleEngine};
//! use gaz::lifecycle::ShutdownConfig;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let container = Arc::new(Container::new());
//! container
//!     .register_instance("demo", 7u32)
//!     .register(&container)?;
//!
//! let engine = LifecycleEngine::new(container.clone(), ShutdownConfig::default());
//! engine.start(HookContext::new()).await?;
//! assert_eq!(*container.resolve::<u32>()?, 7);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod capabilities;
pub mod chain;
pub mod container;
pub mod context;
pub mod descriptors;
pub mod error;
pub mod graph;
pub mod key;
pub mod lifecycle;
pub mod module;
pub mod registration;
#[cfg(feature = "telemetry")]
pub mod telemetry;
pub mod worker;

pub use app::{exit_code, Application, ApplicationError};
pub use capabilities::{ConfigProvider, FlagKind, FlagSpec, Worker};
pub use container::Container;
pub use context::HookContext;
pub use descriptors::Kind;
pub use error::{ContainerError, ContainerResult, FactoryError};
pub use key::{Chain, ServiceKey};
pub use lifecycle::{LifecycleEngine, LifecycleError, LifecycleResult, ShutdownConfig};
pub use module::{CliAttachment, DeferredBool, DeferredString, FlagRegistrar, Module};
pub use registration::ServiceBuilder;
pub use worker::{BackoffConfig, CircuitConfig, Jitter, SupervisorEvent, SupervisorState, WorkerError, WorkerManager};
