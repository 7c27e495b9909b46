//! The accessor registry: spec storage and cross-contract lookup.

use std::sync::Arc;

use dashmap::DashMap;

use super::{AccessorSpec, GeneratedAccessor};
use crate::Result;

/// All declared accessor specs, keyed by instance-contract name.
///
/// The key doubles as the recursive-wrapping namespace: a contract member
/// whose return type names another registered contract gets its result
/// wrapped in that contract's bridge.
#[derive(Default)]
pub struct AccessorRegistry {
    specs: DashMap<String, Arc<AccessorSpec>>,
    default_full_reflection: bool,
}

impl AccessorRegistry {
    /// Create an empty registry with direct dispatch as the default.
    #[must_use]
    pub fn new() -> Self {
        AccessorRegistry::default()
    }

    /// Create an empty registry with the given reflection default, normally
    /// taken from [`crate::RegistryConfig::full_reflection`].
    #[must_use]
    pub fn with_full_reflection(default_full_reflection: bool) -> Self {
        AccessorRegistry {
            specs: DashMap::new(),
            default_full_reflection,
        }
    }

    /// The reflection default applied to specs without an override.
    #[must_use]
    pub fn default_full_reflection(&self) -> bool {
        self.default_full_reflection
    }

    /// Register a spec under its instance-contract name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Misuse`] when the name is already taken.
    pub fn register(&self, spec: AccessorSpec) -> Result<Arc<AccessorSpec>> {
        let spec = Arc::new(spec);
        let name = spec.name().to_string();
        match self.specs.entry(name) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(misuse_error!(
                "An accessor spec named '{}' is already registered",
                spec.name()
            )),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(spec.clone());
                Ok(spec)
            }
        }
    }

    /// Look up a spec by contract name.
    #[must_use]
    pub fn spec(&self, name: &str) -> Option<Arc<AccessorSpec>> {
        self.specs.get(name).map(|entry| entry.value().clone())
    }

    /// Generate (or fetch the memoized) bridges for the named contract.
    ///
    /// # Errors
    /// Returns [`crate::Error::Generation`] for an unknown name and
    /// propagates generation failures from the spec.
    pub fn generate(&self, name: &str) -> Result<Arc<GeneratedAccessor>> {
        let Some(spec) = self.spec(name) else {
            return Err(crate::Error::Generation(format!(
                "No accessor spec named '{name}' is registered"
            )));
        };
        spec.generate(self)
    }
}
