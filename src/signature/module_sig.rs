//! Module-level signatures: the root of every finder declaration.

use std::sync::Arc;

use crate::finder::Resolution;
use crate::module::{CodeModule, Constant, ModuleFlags};
use crate::transform::{MemberTransform, ModuleTransform};
use crate::Result;

use super::{FieldSignature, MethodSignature, Pred};

type ModuleTest = dyn Fn(&CodeModule) -> bool + Send + Sync;

/// Callback fired exactly once when a finder first resolves.
///
/// A failing hook is logged and isolated; it neither blocks the remaining
/// hooks nor aborts the resolution.
pub type FoundHook = Box<dyn Fn(&Resolution) -> Result<()> + Send + Sync>;

/// One mandatory member declaration, keyed by a caller-chosen name.
pub(crate) enum MemberSignature {
    /// Matches executable members
    Method(MethodSignature),
    /// Matches data members
    Field(FieldSignature),
}

/// A declared member with its attached per-member transforms.
pub(crate) struct DeclaredMember {
    pub key: String,
    pub sig: MemberSignature,
    pub transforms: Vec<Arc<dyn MemberTransform>>,
}

/// The evaluated form of a module signature.
pub(crate) struct BuiltSignature {
    preds: Vec<Pred<ModuleTest>>,
    pub members: Vec<DeclaredMember>,
    pub transforms: Vec<Arc<dyn ModuleTransform>>,
    pub hooks: Vec<FoundHook>,
}

impl BuiltSignature {
    /// Evaluate the module-level predicates only.
    pub fn matches(&self, module: &CodeModule) -> bool {
        super::all_match(&self.preds, |pred| (pred.test)(module))
    }
}

enum Inner {
    Built(BuiltSignature),
    Lazy(Box<dyn Fn() -> Result<ModuleSignature> + Send + Sync>),
}

/// Either a borrowed built signature or one freshly rebuilt by a lazy
/// signature for a single evaluation.
pub(crate) enum Snapshot<'a> {
    Borrowed(&'a BuiltSignature),
    Owned(BuiltSignature),
}

impl Snapshot<'_> {
    pub fn built(&self) -> &BuiltSignature {
        match self {
            Snapshot::Borrowed(built) => built,
            Snapshot::Owned(built) => built,
        }
    }
}

/// A named, immutable set of predicates over one module, with nested
/// mandatory member signatures, declared transforms and found-hooks.
///
/// Built once through [`ModuleSignature::builder`] and reusable across any
/// number of evaluations. The lazy variant ([`ModuleSignature::lazy`])
/// rebuilds itself on every evaluation, which lets its predicates consult
/// finders that resolve later without imposing declaration order.
///
/// # Examples
///
/// ```rust
/// use sigweave::{MethodSignature, ModuleSignature, TypeDesc};
///
/// let sig = ModuleSignature::builder("window")
///     .string_constant("Lunar Client (")
///     .method(
///         "title",
///         MethodSignature::new()
///             .named("getWindowTitle")
///             .arity(0)
///             .returns(TypeDesc::Str),
///     )
///     .build()?;
/// assert_eq!(sig.name(), "window");
/// # Ok::<(), sigweave::Error>(())
/// ```
pub struct ModuleSignature {
    name: String,
    inner: Inner,
}

impl ModuleSignature {
    /// Start building a signature with the given diagnostic name.
    #[must_use]
    pub fn builder(name: &str) -> ModuleSignatureBuilder {
        ModuleSignatureBuilder {
            name: name.to_string(),
            preds: Vec::new(),
            members: Vec::new(),
            transforms: Vec::new(),
            member_transforms: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Create a lazy signature that rebuilds through `build` on every
    /// evaluation.
    ///
    /// The builder must produce an ordinary built signature; returning
    /// another lazy signature is a misuse failure at evaluation time.
    #[must_use]
    pub fn lazy(
        name: &str,
        build: impl Fn() -> Result<ModuleSignature> + Send + Sync + 'static,
    ) -> Self {
        ModuleSignature {
            name: name.to_string(),
            inner: Inner::Lazy(Box::new(build)),
        }
    }

    /// The diagnostic name given at construction.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the module-level predicates against a candidate.
    ///
    /// # Errors
    /// Returns [`crate::Error::Misuse`] if this is a lazy signature whose
    /// builder fails or returns another lazy signature.
    pub fn matches(&self, module: &CodeModule) -> Result<bool> {
        Ok(self.snapshot()?.built().matches(module))
    }

    /// Resolve to an evaluable [`BuiltSignature`], rebuilding lazy variants.
    pub(crate) fn snapshot(&self) -> Result<Snapshot<'_>> {
        match &self.inner {
            Inner::Built(built) => Ok(Snapshot::Borrowed(built)),
            Inner::Lazy(build) => {
                let rebuilt = build()
                    .map_err(|e| misuse_error!("Lazy signature '{}' failed to build: {}", self.name, e))?;
                match rebuilt.inner {
                    Inner::Built(built) => Ok(Snapshot::Owned(built)),
                    Inner::Lazy(_) => Err(misuse_error!(
                        "Lazy signature '{}' rebuilt into another lazy signature",
                        self.name
                    )),
                }
            }
        }
    }
}

/// Fluent predicate-registration surface for [`ModuleSignature`].
///
/// Predicates evaluate in declaration order with short-circuit on the first
/// failure; reordering declarations never changes the boolean outcome, only
/// how far evaluation gets.
pub struct ModuleSignatureBuilder {
    name: String,
    preds: Vec<Pred<ModuleTest>>,
    members: Vec<(String, MemberSignature)>,
    transforms: Vec<Arc<dyn ModuleTransform>>,
    member_transforms: Vec<(String, Arc<dyn MemberTransform>)>,
    hooks: Vec<FoundHook>,
}

impl ModuleSignatureBuilder {
    fn push(
        mut self,
        label: &str,
        test: impl Fn(&CodeModule) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.preds.push(Pred {
            label: label.to_string(),
            test: Box::new(test),
        });
        self
    }

    /// Require the exact module name.
    #[must_use]
    pub fn named(self, name: &str) -> Self {
        let name = name.to_string();
        self.push(&format!("name == {name}"), move |m| m.name == name)
    }

    /// Require the module name to start with `prefix`.
    #[must_use]
    pub fn name_prefix(self, prefix: &str) -> Self {
        let prefix = prefix.to_string();
        self.push(&format!("name starts with {prefix}"), move |m| {
            m.name.starts_with(&prefix)
        })
    }

    /// Require the module name to end with `suffix`.
    #[must_use]
    pub fn name_suffix(self, suffix: &str) -> Self {
        let suffix = suffix.to_string();
        self.push(&format!("name ends with {suffix}"), move |m| {
            m.name.ends_with(&suffix)
        })
    }

    /// Require the superclass module name.
    #[must_use]
    pub fn extends(self, superclass: &str) -> Self {
        let superclass = superclass.to_string();
        self.push(&format!("extends {superclass}"), move |m| {
            m.superclass.as_deref() == Some(superclass.as_str())
        })
    }

    /// Require the module to implement the named interface.
    #[must_use]
    pub fn implements(self, interface: &str) -> Self {
        let interface = interface.to_string();
        self.push(&format!("implements {interface}"), move |m| {
            m.interfaces.iter().any(|i| i == &interface)
        })
    }

    /// Require all given flag bits to be set.
    #[must_use]
    pub fn flags(self, flags: ModuleFlags) -> Self {
        self.push(&format!("flags contain {flags:?}"), move |m| {
            m.flags.contains(flags)
        })
    }

    /// Require the aggregated constant set to contain the given constant.
    #[must_use]
    pub fn constant(self, constant: Constant) -> Self {
        self.push(&format!("contains constant {constant}"), move |m| {
            m.has_constant(&constant)
        })
    }

    /// Require the aggregated constant set to contain the exact string.
    #[must_use]
    pub fn string_constant(self, text: &str) -> Self {
        self.constant(Constant::str(text))
    }

    /// Require some string constant to contain `needle` as a substring.
    #[must_use]
    pub fn string_containing(self, needle: &str) -> Self {
        let needle = needle.to_string();
        self.push(&format!("contains string with {needle:?}"), move |m| {
            m.has_string_containing(&needle)
        })
    }

    /// Register a custom predicate over the aggregated constant set.
    #[must_use]
    pub fn constant_where(
        self,
        label: &str,
        test: impl Fn(&[Constant]) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.push(label, move |m| test(&m.constants))
    }

    /// Register an arbitrary predicate with a diagnostic label.
    #[must_use]
    pub fn require(
        self,
        label: &str,
        test: impl Fn(&CodeModule) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.push(label, test)
    }

    /// Declare a mandatory executable member under a caller-chosen key.
    #[must_use]
    pub fn method(mut self, key: &str, sig: MethodSignature) -> Self {
        self.members
            .push((key.to_string(), MemberSignature::Method(sig)));
        self
    }

    /// Declare a mandatory data member under a caller-chosen key.
    #[must_use]
    pub fn field(mut self, key: &str, sig: FieldSignature) -> Self {
        self.members
            .push((key.to_string(), MemberSignature::Field(sig)));
        self
    }

    /// Attach a module-level transform, applied whenever the resolved module
    /// is rewritten.
    #[must_use]
    pub fn transform(mut self, transform: impl ModuleTransform + 'static) -> Self {
        self.transforms.push(Arc::new(transform));
        self
    }

    /// Attach a transform to the member declared under `key`.
    ///
    /// The transform is compiled at offer time into a module-scoped transform
    /// filtered by the resolved member's name and descriptor.
    #[must_use]
    pub fn member_transform(mut self, key: &str, transform: impl MemberTransform + 'static) -> Self {
        self.member_transforms
            .push((key.to_string(), Arc::new(transform)));
        self
    }

    /// Register a found-hook, fired exactly once at first resolution.
    #[must_use]
    pub fn on_found(
        mut self,
        hook: impl Fn(&Resolution) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    /// Validate the wiring and produce the immutable signature.
    ///
    /// # Errors
    /// Returns [`crate::Error::Misuse`] for duplicate member keys, for a
    /// member transform attached to an undeclared key, and for a member
    /// transform attached to a field key (fields have no instruction stream).
    pub fn build(self) -> Result<ModuleSignature> {
        let mut members: Vec<DeclaredMember> = Vec::with_capacity(self.members.len());
        for (key, sig) in self.members {
            if members.iter().any(|m| m.key == key) {
                return Err(misuse_error!(
                    "Signature '{}' declares member key '{}' twice",
                    self.name,
                    key
                ));
            }
            members.push(DeclaredMember {
                key,
                sig,
                transforms: Vec::new(),
            });
        }

        for (key, transform) in self.member_transforms {
            let Some(member) = members.iter_mut().find(|m| m.key == key) else {
                return Err(misuse_error!(
                    "Signature '{}' attaches a transform to undeclared member key '{}'",
                    self.name,
                    key
                ));
            };
            if matches!(member.sig, MemberSignature::Field(_)) {
                return Err(misuse_error!(
                    "Signature '{}' attaches a transform to field key '{}'",
                    self.name,
                    key
                ));
            }
            member.transforms.push(transform);
        }

        Ok(ModuleSignature {
            name: self.name,
            inner: Inner::Built(BuiltSignature {
                preds: self.preds,
                members,
                transforms: self.transforms,
                hooks: self.hooks,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ExecutableMember, Instruction, MemberFlags};
    use crate::transform::ReplaceBody;

    fn module(name: &str, with_constant: bool) -> CodeModule {
        let mut code = Vec::new();
        if with_constant {
            code.push(Instruction::LoadConst(Constant::str("Lunar Client (")));
        }
        code.push(Instruction::Return);
        let member =
            ExecutableMember::new("tick", "()V", MemberFlags::PUBLIC, 1, 0, code).unwrap();
        CodeModule::new(
            name,
            Some("game/Surface".to_string()),
            vec!["game/Resizable".to_string()],
            ModuleFlags::PUBLIC,
            vec![member],
            Vec::new(),
        )
    }

    #[test]
    fn structural_predicates_conjoin() {
        let sig = ModuleSignature::builder("window")
            .extends("game/Surface")
            .implements("game/Resizable")
            .flags(ModuleFlags::PUBLIC)
            .string_constant("Lunar Client (")
            .build()
            .unwrap();

        assert!(sig.matches(&module("game/Window", true)).unwrap());
        assert!(!sig.matches(&module("game/Window", false)).unwrap());
    }

    #[test]
    fn predicate_order_does_not_change_outcome() {
        let forward = ModuleSignature::builder("a")
            .named("game/Window")
            .string_constant("Lunar Client (")
            .build()
            .unwrap();
        let reversed = ModuleSignature::builder("b")
            .string_constant("Lunar Client (")
            .named("game/Window")
            .build()
            .unwrap();

        for candidate in [module("game/Window", true), module("game/Window", false)] {
            assert_eq!(
                forward.matches(&candidate).unwrap(),
                reversed.matches(&candidate).unwrap()
            );
        }
    }

    #[test]
    fn transform_on_undeclared_key_is_misuse() {
        let result = ModuleSignature::builder("broken")
            .member_transform("ghost", ReplaceBody::new(vec![Instruction::Return]))
            .build();
        assert!(matches!(result, Err(crate::Error::Misuse(_))));
    }

    #[test]
    fn duplicate_member_key_is_misuse() {
        let result = ModuleSignature::builder("broken")
            .method("m", MethodSignature::new())
            .method("m", MethodSignature::new())
            .build();
        assert!(matches!(result, Err(crate::Error::Misuse(_))));
    }

    #[test]
    fn lazy_signatures_rebuild_per_evaluation() {
        let sig = ModuleSignature::lazy("lazy-window", || {
            ModuleSignature::builder("window").named("game/Window").build()
        });
        assert!(sig.matches(&module("game/Window", true)).unwrap());
        assert!(!sig.matches(&module("game/Other", true)).unwrap());
    }

    #[test]
    fn lazy_returning_lazy_is_misuse() {
        let sig = ModuleSignature::lazy("outer", || {
            Ok(ModuleSignature::lazy("inner", || {
                ModuleSignature::builder("never").build()
            }))
        });
        assert!(matches!(
            sig.matches(&module("game/Window", true)),
            Err(crate::Error::Misuse(_))
        ));
    }
}
