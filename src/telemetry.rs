//! Tracing bootstrap glue for binaries embedding this crate. Gated behind
//! the `telemetry` feature so the library itself stays subscriber-agnostic
//! by default.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber: an `EnvFilter` read from
/// `RUST_LOG` (defaulting to `info`) plus a compact `fmt` layer.
///
/// Intended for binaries, not libraries embedding `gaz` as a dependency —
/// call this once, at process start, before constructing an
/// [`crate::app::Application`].
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();
}
