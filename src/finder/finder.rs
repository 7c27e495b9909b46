//! The finder: one signature bound to at most one resolution.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::module::{CodeModule, DataMember, ExecutableMember};
use crate::signature::{MemberSignature, ModuleSignature};
use crate::transform::{ForMember, TransformPipeline};
use crate::Result;

/// A finder's verdict on one offered module.
#[derive(strum::Display)]
pub enum Offer {
    /// Already resolved elsewhere; the candidate was not evaluated.
    Skip,
    /// Some module or member predicate failed.
    NoMatch,
    /// Matched and resolved, but the signature declares no transforms.
    NotInterested,
    /// Matched in a resolution-only pass; no rewrite was requested of it.
    NoTransformRequest,
    /// Matched, with a rewrite pipeline for the caller to apply.
    Transform(TransformRequest),
}

/// The rewrite a finder requests for its matched module.
pub struct TransformRequest {
    /// Module-level transforms plus the compiled member-scoped ones, in
    /// declaration order.
    pub pipeline: TransformPipeline,
}

/// One member bound by a resolution.
#[derive(Debug, Clone)]
pub enum ResolvedMember {
    /// An executable member, bound by a method signature.
    Exec(ExecutableMember),
    /// A data member, bound by a field signature.
    Data(DataMember),
}

impl ResolvedMember {
    /// The bound member's name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ResolvedMember::Exec(m) => &m.name,
            ResolvedMember::Data(m) => &m.name,
        }
    }

    /// The bound member's descriptor.
    #[must_use]
    pub fn desc(&self) -> &str {
        match self {
            ResolvedMember::Exec(m) => &m.desc,
            ResolvedMember::Data(m) => &m.desc,
        }
    }
}

/// The module a finder bound to, with every declared member resolved under
/// its declaration key.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// The matched module as parsed at resolution time.
    pub module: CodeModule,
    /// Resolved members, keyed by the signature's member keys.
    pub members: HashMap<String, ResolvedMember>,
}

impl Resolution {
    /// Look up a resolved executable member by its declaration key.
    #[must_use]
    pub fn exec(&self, key: &str) -> Option<&ExecutableMember> {
        match self.members.get(key) {
            Some(ResolvedMember::Exec(m)) => Some(m),
            _ => None,
        }
    }

    /// Look up a resolved data member by its declaration key.
    #[must_use]
    pub fn data(&self, key: &str) -> Option<&DataMember> {
        match self.members.get(key) {
            Some(ResolvedMember::Data(m)) => Some(m),
            _ => None,
        }
    }
}

/// One signature bound to at most one resolution for the process lifetime.
///
/// Created through [`crate::FinderRegistry::register`]; callers hold a
/// [`FinderHandle`].
pub struct Finder {
    signature: ModuleSignature,
    resolved: OnceLock<Resolution>,
}

impl Finder {
    pub(crate) fn new(signature: ModuleSignature) -> Self {
        Finder {
            signature,
            resolved: OnceLock::new(),
        }
    }

    /// The signature's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.signature.name()
    }

    /// The resolution, if this finder has matched a module.
    #[must_use]
    pub fn resolved(&self) -> Option<&Resolution> {
        self.resolved.get()
    }

    /// Offer one candidate module.
    ///
    /// Once resolved, candidates with a different identity are skipped
    /// outright on every pass; only the finder's own module is re-evaluated
    /// on transform offers, so retransformation keeps working without the
    /// binding ever migrating.
    ///
    /// # Errors
    /// Lazy-signature rebuild failures propagate as
    /// [`crate::Error::Misuse`]; ordinary mismatch is a verdict, never an
    /// error.
    pub(crate) fn offer(&self, module: &CodeModule, for_transform: bool) -> Result<Offer> {
        if let Some(resolution) = self.resolved.get() {
            if resolution.module.name != module.name {
                return Ok(Offer::Skip);
            }
        }

        let snapshot = self.signature.snapshot()?;
        let built = snapshot.built();
        if !built.matches(module) {
            return Ok(Offer::NoMatch);
        }

        // Every declared member is mandatory.
        let mut members = HashMap::with_capacity(built.members.len());
        for declared in &built.members {
            let resolved = match &declared.sig {
                MemberSignature::Method(sig) => module
                    .exec_members
                    .iter()
                    .find(|m| sig.matches(module, m))
                    .map(|m| ResolvedMember::Exec(m.clone())),
                MemberSignature::Field(sig) => module
                    .data_members
                    .iter()
                    .find(|m| sig.matches(module, m))
                    .map(|m| ResolvedMember::Data(m.clone())),
            };
            let Some(resolved) = resolved else {
                tracing::trace!(
                    finder = self.name(),
                    module = %module.name,
                    member = %declared.key,
                    "mandatory member did not resolve"
                );
                return Ok(Offer::NoMatch);
            };
            members.insert(declared.key.clone(), resolved);
        }

        let resolution = Resolution {
            module: module.clone(),
            members: members.clone(),
        };
        if self.resolved.set(resolution).is_ok() {
            tracing::debug!(finder = self.name(), module = %module.name, "finder resolved");
            // Hooks fire exactly once, on the stored resolution. A failing
            // hook is isolated from the others.
            if let Some(stored) = self.resolved.get() {
                for hook in &built.hooks {
                    if let Err(e) = hook(stored) {
                        tracing::warn!(finder = self.name(), error = %e, "found-hook failed");
                    }
                }
            }
        }

        if !for_transform {
            return Ok(Offer::NoTransformRequest);
        }

        let mut pipeline = TransformPipeline::new();
        for transform in &built.transforms {
            pipeline.push(transform.clone());
        }
        for declared in &built.members {
            if declared.transforms.is_empty() {
                continue;
            }
            // Compile member-scoped transforms against the names the build
            // actually used.
            let member = &members[&declared.key];
            pipeline.push(Arc::new(ForMember::new(
                member.name(),
                member.desc(),
                declared.transforms.clone(),
            )));
        }

        if pipeline.is_empty() {
            Ok(Offer::NotInterested)
        } else {
            Ok(Offer::Transform(TransformRequest { pipeline }))
        }
    }
}

/// Shared handle to a registered [`Finder`].
///
/// Cheap to clone; the same underlying finder backs every clone, so a
/// resolution observed through one handle is visible through all.
#[derive(Clone)]
pub struct FinderHandle(pub(crate) Arc<Finder>);

impl FinderHandle {
    /// The signature's diagnostic name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// The resolution, if the finder has matched a module.
    #[must_use]
    pub fn resolved(&self) -> Option<&Resolution> {
        self.0.resolved()
    }

    /// The resolution, failing if the finder has not matched yet.
    ///
    /// # Errors
    /// Returns [`crate::Error::Unresolved`] naming the finder.
    pub fn assume(&self) -> Result<&Resolution> {
        self.0
            .resolved()
            .ok_or_else(|| crate::Error::Unresolved(self.name().to_string()))
    }

    pub(crate) fn offer(&self, module: &CodeModule, for_transform: bool) -> Result<Offer> {
        self.0.offer(module, for_transform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Constant, Instruction, MemberFlags, ModuleFlags, TypeDesc};
    use crate::signature::MethodSignature;
    use crate::transform::ReplaceBody;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn window_module(name: &str) -> CodeModule {
        let title = ExecutableMember::new(
            "a",
            "()S",
            MemberFlags::PUBLIC,
            1,
            0,
            vec![
                Instruction::LoadConst(Constant::str("Lunar Client (")),
                Instruction::ReturnValue,
            ],
        )
        .unwrap();
        CodeModule::new(name, None, Vec::new(), ModuleFlags::PUBLIC, vec![title], Vec::new())
    }

    fn window_signature() -> ModuleSignature {
        ModuleSignature::builder("window")
            .string_constant("Lunar Client (")
            .method(
                "title",
                MethodSignature::new().arity(0).returns(TypeDesc::Str),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn resolves_once_then_skips_others() {
        let finder = Finder::new(window_signature());

        assert!(matches!(
            finder.offer(&window_module("obf/aa"), false).unwrap(),
            Offer::NoTransformRequest
        ));
        let resolution = finder.resolved().unwrap();
        assert_eq!(resolution.module.name, "obf/aa");
        assert_eq!(resolution.exec("title").unwrap().name, "a");

        // Another matching module is skipped without evaluation, and the
        // original binding is permanent.
        assert!(matches!(
            finder.offer(&window_module("obf/bb"), false).unwrap(),
            Offer::Skip
        ));
        assert_eq!(finder.resolved().unwrap().module.name, "obf/aa");
    }

    #[test]
    fn transform_offers_skip_other_modules_after_resolution() {
        let sig = ModuleSignature::builder("window")
            .string_constant("Lunar Client (")
            .method(
                "title",
                MethodSignature::new().arity(0).returns(TypeDesc::Str),
            )
            .member_transform("title", ReplaceBody::fixed_return(Constant::str("patched")))
            .build()
            .unwrap();
        let finder = Finder::new(sig);

        assert!(matches!(
            finder.offer(&window_module("obf/aa"), true).unwrap(),
            Offer::Transform(_)
        ));

        // A second matching build under another identity is skipped even on
        // the transform pass; its image must never be rewritten.
        assert!(matches!(
            finder.offer(&window_module("obf/bb"), true).unwrap(),
            Offer::Skip
        ));

        // The resolved module itself keeps requesting its transforms.
        assert!(matches!(
            finder.offer(&window_module("obf/aa"), true).unwrap(),
            Offer::Transform(_)
        ));
    }

    #[test]
    fn missing_mandatory_member_blocks_resolution() {
        let sig = ModuleSignature::builder("window")
            .string_constant("Lunar Client (")
            .method("missing", MethodSignature::new().arity(3))
            .build()
            .unwrap();
        let finder = Finder::new(sig);
        assert!(matches!(
            finder.offer(&window_module("obf/aa"), false).unwrap(),
            Offer::NoMatch
        ));
        assert!(finder.resolved().is_none());
    }

    #[test]
    fn hooks_fire_exactly_once() {
        static FIRED: AtomicUsize = AtomicUsize::new(0);
        let sig = ModuleSignature::builder("window")
            .string_constant("Lunar Client (")
            .on_found(|_| {
                FIRED.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build()
            .unwrap();
        let finder = Finder::new(sig);

        finder.offer(&window_module("obf/aa"), true).unwrap();
        finder.offer(&window_module("obf/aa"), true).unwrap();
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn member_transforms_compile_against_resolved_names() {
        let sig = ModuleSignature::builder("window")
            .string_constant("Lunar Client (")
            .method(
                "title",
                MethodSignature::new().arity(0).returns(TypeDesc::Str),
            )
            .member_transform("title", ReplaceBody::fixed_return(Constant::str("patched")))
            .build()
            .unwrap();
        let finder = Finder::new(sig);

        let module = window_module("obf/aa");
        let Offer::Transform(request) = finder.offer(&module, true).unwrap() else {
            panic!("expected a transform request");
        };
        let bytes = crate::format::write_module(&module).unwrap();
        let rewritten =
            crate::format::parse_module(&request.pipeline.apply(&bytes).unwrap()).unwrap();
        assert_eq!(
            rewritten.exec_member("a").unwrap().code[0],
            Instruction::LoadConst(Constant::str("patched"))
        );
    }

    #[test]
    fn transform_offer_without_transforms_is_not_interested() {
        let finder = Finder::new(window_signature());
        assert!(matches!(
            finder.offer(&window_module("obf/aa"), true).unwrap(),
            Offer::NotInterested
        ));
        // It still resolved.
        assert!(finder.resolved().is_some());
    }

    #[test]
    fn assume_reports_unresolved() {
        let handle = FinderHandle(Arc::new(Finder::new(window_signature())));
        assert!(matches!(
            handle.assume(),
            Err(crate::Error::Unresolved(_))
        ));
    }
}
