//! The host boundary.
//!
//! The engine itself never talks to a virtual machine. The embedding host
//! feeds module images into [`crate::FinderRegistry::transform`] as they load
//! and, when late resolution needs an already-loaded module re-evaluated,
//! the registry calls back through [`HostRuntime`].

use crate::Result;

/// The retransform capability of the embedding host.
///
/// Installed once on the registry; [`crate::FinderRegistry::resolve_now`]
/// uses it to push a freshly resolved module back through the transform
/// path.
pub trait HostRuntime: Send + Sync {
    /// Ask the host to replay the load event for the named module, so the
    /// registry observes it again with transforms requested.
    ///
    /// # Errors
    /// Whatever the host reports; the registry propagates it unchanged.
    fn retransform(&self, module_name: &str) -> Result<()>;
}

/// One module load observed by the host.
///
/// Borrowed views only; the registry never retains an event past the
/// [`crate::FinderRegistry::transform`] call it is handed to.
#[derive(Debug, Clone, Copy)]
pub struct LoadEvent<'a> {
    /// Name of the loader that triggered the load, when the host tracks one.
    pub loader: Option<&'a str>,
    /// Module name as reported by the host.
    pub name: &'a str,
    /// Version counter of a previously loaded image, set on retransforms.
    pub previous_version: Option<u64>,
    /// Protection domain tag, when the host tracks one.
    pub protection: Option<&'a str>,
    /// The raw module image.
    pub bytes: &'a [u8],
}

impl<'a> LoadEvent<'a> {
    /// Build a plain first-load event with only a name and an image.
    #[must_use]
    pub fn new(name: &'a str, bytes: &'a [u8]) -> Self {
        LoadEvent {
            loader: None,
            name,
            previous_version: None,
            protection: None,
            bytes,
        }
    }
}
