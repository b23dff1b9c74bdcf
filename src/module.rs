//! Module composition: named bundles of provider-registration and
//! flag-registration callbacks applied to a [`Container`] in order.

use crate::container::Container;
use crate::error::ContainerResult;

/// The flag set a module's flag-registration callback is handed. A thin,
/// intentionally narrow contract: this crate never depends on a concrete
/// flag-parsing library (Non-goal: CLI façade), so it only describes the
/// shape an external one must provide.
pub trait FlagRegistrar {
    /// Declares a flag, returning a deferred reader the provider body can
    /// call later (after parsing) to fetch the final value.
    fn bool_flag(&mut self, name: &'static str, default: bool, description: &'static str) -> DeferredBool;

    /// Declares a string flag, returning a deferred reader.
    fn string_flag(&mut self, name: &'static str, default: &'static str, description: &'static str) -> DeferredString;
}

/// A read-back handle for a flag's eventual value. Values are read inside
/// provider bodies, after flag parsing may have occurred, per spec.md
/// §4.4's deferred-evaluation rule.
#[derive(Clone, Copy)]
pub struct DeferredBool(pub(crate) &'static str);

impl DeferredBool {
    /// The declared flag's name, for an external reader to look up.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// See [`DeferredBool`].
#[derive(Clone, Copy)]
pub struct DeferredString(pub(crate) &'static str);

impl DeferredString {
    /// The declared flag's name, for an external reader to look up.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

/// The attachment point for an external CLI library (spec.md §6's
/// `with_cobra`): any integration implements this against its own command
/// type and drives `registrar` from parsed arguments.
pub trait CliAttachment {
    /// Attaches this CLI integration's declared flags to `registrar`.
    fn attach(&self, registrar: &mut dyn FlagRegistrar);
}

type ProviderFn = Box<dyn Fn(&Container) -> ContainerResult<()> + Send + Sync>;
type FlagFn = Box<dyn Fn(&mut dyn FlagRegistrar) + Send + Sync>;

/// A named bundle of registrations applied to a container as a unit.
///
/// Construct with [`Module::named`], add callbacks with
/// [`Module::with_provider`] / [`Module::with_flags`], and pass to
/// [`crate::app::Application::use_module`].
pub struct Module {
    name: &'static str,
    providers: Vec<ProviderFn>,
    flag_callbacks: Vec<FlagFn>,
}

impl Module {
    /// Starts an empty module named `name`.
    pub fn named(name: &'static str) -> Self {
        Self {
            name,
            providers: Vec::new(),
            flag_callbacks: Vec::new(),
        }
    }

    /// This module's name, as given to `Application::use_module`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Adds a provider-registration callback, run against the container
    /// when this module is applied. Callbacks never resolve services
    /// directly — only register descriptors — so that resolution, and
    /// therefore graph recording, only ever happens inside factory bodies.
    pub fn with_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Container) -> ContainerResult<()> + Send + Sync + 'static,
    {
        self.providers.push(Box::new(provider));
        self
    }

    /// Adds a flag-registration callback, run once before `build()`.
    pub fn with_flags<F>(mut self, register: F) -> Self
    where
        F: Fn(&mut dyn FlagRegistrar) + Send + Sync + 'static,
    {
        self.flag_callbacks.push(Box::new(register));
        self
    }

    pub(crate) fn apply_providers(&self, container: &Container) -> ContainerResult<()> {
        for provider in &self.providers {
            provider(container)?;
        }
        Ok(())
    }

    pub(crate) fn apply_flags(&self, registrar: &mut dyn FlagRegistrar) {
        for callback in &self.flag_callbacks {
            callback(registrar);
        }
    }
}
