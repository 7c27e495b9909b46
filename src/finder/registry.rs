//! The finder registry: the host-facing transform entry point.

use std::sync::{Arc, OnceLock, RwLock};

use crate::module::CodeModule;
use crate::runtime::{HostRuntime, LoadEvent};
use crate::signature::ModuleSignature;
use crate::transform::TransformPipeline;
use crate::Result;

use super::{Finder, FinderHandle, Offer};

/// Registration order and offer plumbing for a set of finders.
///
/// The registry owns the only fail-open boundary in the engine: everything
/// that goes wrong inside [`Self::transform`] is logged and swallowed so a
/// broken signature or transform can never take the host's module loading
/// down with it. Every other surface reports errors normally.
#[derive(Default)]
pub struct FinderRegistry {
    config: super::RegistryConfig,
    finders: RwLock<Vec<FinderHandle>>,
    host: OnceLock<Arc<dyn HostRuntime>>,
}

impl FinderRegistry {
    /// Create a registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        FinderRegistry::default()
    }

    /// Create a registry with the given configuration.
    #[must_use]
    pub fn with_config(config: super::RegistryConfig) -> Self {
        FinderRegistry {
            config,
            finders: RwLock::new(Vec::new()),
            host: OnceLock::new(),
        }
    }

    /// The registry's configuration.
    #[must_use]
    pub fn config(&self) -> &super::RegistryConfig {
        &self.config
    }

    /// Register a signature, binding it to a fresh finder.
    ///
    /// Offer order follows registration order.
    ///
    /// # Errors
    /// Returns [`crate::Error::LockError`] if the finder list is poisoned.
    pub fn register(&self, signature: ModuleSignature) -> Result<FinderHandle> {
        let handle = FinderHandle(Arc::new(Finder::new(signature)));
        let mut finders = self.finders.write().map_err(|_| crate::Error::LockError)?;
        finders.push(handle.clone());
        Ok(handle)
    }

    /// Install the host's retransform capability.
    ///
    /// # Errors
    /// Returns [`crate::Error::Misuse`] on a second installation.
    pub fn install(&self, host: Arc<dyn HostRuntime>) -> Result<()> {
        self.host
            .set(host)
            .map_err(|_| misuse_error!("A host runtime is already installed"))
    }

    /// Offer one module load to every finder and apply the merged rewrite.
    ///
    /// Returns the rewritten image, or `None` when the module is left
    /// untouched: platform modules, unparseable images, no interested finder,
    /// a failed rewrite, or a rewrite that no longer parses under
    /// `verify_rewrites`. This path never errors; failures are logged and
    /// the original bytes stand.
    pub fn transform(&self, event: &LoadEvent<'_>) -> Option<Vec<u8>> {
        if self.config.is_platform_module(event.name) {
            return None;
        }

        // Parse once, share the model across every finder.
        let module = match crate::format::parse_module(event.bytes) {
            Ok(module) => module,
            Err(e) => {
                tracing::warn!(module = event.name, error = %e, "module image did not parse");
                return None;
            }
        };

        let pipeline = self.collect_pipeline(&module)?;
        if pipeline.is_empty() {
            return None;
        }

        let rewritten = match pipeline.apply(event.bytes) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(module = event.name, error = %e, "rewrite failed, module left untouched");
                return None;
            }
        };

        if self.config.verify_rewrites {
            if let Err(e) = crate::format::parse_module(&rewritten) {
                tracing::error!(module = event.name, error = %e, "rewritten image did not verify, module left untouched");
                return None;
            }
        }

        tracing::debug!(
            module = event.name,
            transforms = pipeline.len(),
            retransform = event.previous_version.is_some(),
            "module rewritten"
        );
        Some(rewritten)
    }

    fn collect_pipeline(&self, module: &CodeModule) -> Option<TransformPipeline> {
        let finders = match self.finders.read() {
            Ok(finders) => finders,
            Err(_) => {
                tracing::error!("finder list poisoned, module left untouched");
                return None;
            }
        };

        let mut pipeline = TransformPipeline::new();
        for finder in finders.iter() {
            // One broken finder never blocks the rest.
            match finder.offer(module, true) {
                Ok(Offer::Transform(request)) => pipeline.merge(request.pipeline),
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(finder = finder.name(), module = %module.name, error = %e, "finder offer failed");
                }
            }
        }
        Some(pipeline)
    }

    /// Resolve a finder against an already-loaded module, then ask the host
    /// to retransform it so declared transforms land.
    ///
    /// Returns whether the finder matched. Skips and mismatches are `false`,
    /// not errors.
    ///
    /// # Errors
    /// Propagates lazy-signature failures and host retransform failures.
    pub fn resolve_now(&self, finder: &FinderHandle, module: &CodeModule) -> Result<bool> {
        match finder.offer(module, false)? {
            Offer::NoTransformRequest => {}
            _ => return Ok(false),
        }
        if let Some(host) = self.host.get() {
            host.retransform(&module.name)?;
        }
        Ok(true)
    }

    /// Drop every registered finder.
    ///
    /// Existing handles stay valid and keep their resolutions; they just no
    /// longer see offers.
    pub fn reset(&self) {
        if let Ok(mut finders) = self.finders.write() {
            finders.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Constant, ExecutableMember, Instruction, MemberFlags, ModuleFlags};
    use crate::signature::ModuleSignature;
    use std::sync::Mutex;

    fn module(name: &str, marker: &str) -> CodeModule {
        let member = ExecutableMember::new(
            "a",
            "()S",
            MemberFlags::PUBLIC,
            1,
            0,
            vec![
                Instruction::LoadConst(Constant::str(marker)),
                Instruction::ReturnValue,
            ],
        )
        .unwrap();
        CodeModule::new(name, None, Vec::new(), ModuleFlags::PUBLIC, vec![member], Vec::new())
    }

    fn event_bytes(name: &str, marker: &str) -> Vec<u8> {
        crate::format::write_module(&module(name, marker)).unwrap()
    }

    #[test]
    fn platform_prefixes_are_never_evaluated() {
        let registry = FinderRegistry::with_config(
            super::super::RegistryConfig::from_toml_str("platform_prefixes = [\"java/\"]").unwrap(),
        );
        let handle = registry
            .register(
                ModuleSignature::builder("any")
                    .string_constant("marker")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let bytes = event_bytes("java/lang/String", "marker");
        assert!(registry.transform(&LoadEvent::new("java/lang/String", &bytes)).is_none());
        assert!(handle.resolved().is_none());
    }

    #[test]
    fn unparseable_images_pass_through() {
        let registry = FinderRegistry::new();
        assert!(registry
            .transform(&LoadEvent::new("obf/aa", b"not a module"))
            .is_none());
    }

    #[test]
    fn uninterested_registry_leaves_modules_alone() {
        let registry = FinderRegistry::new();
        let handle = registry
            .register(
                ModuleSignature::builder("watcher")
                    .string_constant("marker")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let bytes = event_bytes("obf/aa", "marker");
        // No transforms declared: resolution happens, no rewrite does.
        assert!(registry.transform(&LoadEvent::new("obf/aa", &bytes)).is_none());
        assert_eq!(handle.resolved().unwrap().module.name, "obf/aa");
    }

    #[test]
    fn second_install_is_misuse() {
        struct NullHost;
        impl HostRuntime for NullHost {
            fn retransform(&self, _: &str) -> Result<()> {
                Ok(())
            }
        }

        let registry = FinderRegistry::new();
        registry.install(Arc::new(NullHost)).unwrap();
        assert!(matches!(
            registry.install(Arc::new(NullHost)),
            Err(crate::Error::Misuse(_))
        ));
    }

    #[test]
    fn resolve_now_reaches_the_host() {
        struct RecordingHost(Mutex<Vec<String>>);
        impl HostRuntime for RecordingHost {
            fn retransform(&self, name: &str) -> Result<()> {
                self.0.lock().map_err(|_| crate::Error::LockError)?.push(name.to_string());
                Ok(())
            }
        }

        let registry = FinderRegistry::new();
        let host = Arc::new(RecordingHost(Mutex::new(Vec::new())));
        registry.install(host.clone()).unwrap();

        let finder = registry
            .register(
                ModuleSignature::builder("watcher")
                    .string_constant("marker")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert!(registry.resolve_now(&finder, &module("obf/aa", "marker")).unwrap());
        assert_eq!(host.0.lock().unwrap().as_slice(), ["obf/aa"]);

        // A mismatch is a plain false and never reaches the host.
        assert!(!registry.resolve_now(&finder, &module("obf/bb", "other")).unwrap());
        assert_eq!(host.0.lock().unwrap().len(), 1);
    }
}
