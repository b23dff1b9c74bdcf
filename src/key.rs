//! Service keys: the `(type-identity, optional-name)` pairs that uniquely
//! identify a registration in a [`Container`](crate::Container).

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A process-unique identifier for a service registration.
///
/// Two registrations with the same key are a fatal duplicate (see
/// [`ContainerError::DuplicateRegistration`](crate::error::ContainerError::DuplicateRegistration)).
/// Type identity is supplied by `std::any::TypeId`; the `type_name` is kept
/// alongside purely for diagnostics and is not used in equality or hashing.
#[derive(Debug, Clone, Copy)]
pub struct ServiceKey {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) name: Option<&'static str>,
}

impl ServiceKey {
    /// Builds the key for an unnamed registration of `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: None,
        }
    }

    /// Builds the key for a named registration of `T`.
    pub fn named<T: 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            name: Some(name),
        }
    }

    /// The human-readable type name, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The optional service name distinguishing multiple registrations of
    /// the same type.
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

impl PartialEq for ServiceKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for ServiceKey {}

impl Hash for ServiceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{}[{}]", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}

/// A resolution chain, rendered as `A -> B -> C` for diagnostics.
#[derive(Debug, Clone, Default)]
pub struct Chain(pub Vec<ServiceKey>);

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(|k| k.to_string()).collect();
        write!(f, "{}", rendered.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_type_same_name_are_equal() {
        assert_eq!(ServiceKey::of::<u32>(), ServiceKey::of::<u32>());
        assert_eq!(
            ServiceKey::named::<u32>("a"),
            ServiceKey::named::<u32>("a")
        );
    }

    #[test]
    fn distinct_names_are_distinct_keys() {
        assert_ne!(ServiceKey::named::<u32>("a"), ServiceKey::named::<u32>("b"));
        assert_ne!(ServiceKey::of::<u32>(), ServiceKey::named::<u32>("a"));
    }

    #[test]
    fn distinct_types_are_distinct_keys() {
        assert_ne!(ServiceKey::of::<u32>(), ServiceKey::of::<u64>());
    }

    #[test]
    fn chain_display_joins_with_arrows() {
        let chain = Chain(vec![ServiceKey::of::<u32>(), ServiceKey::of::<u64>()]);
        assert!(chain.to_string().contains("->"));
    }
}
