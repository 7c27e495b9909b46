//! Executable-member and data-member signatures.

use crate::module::{CodeModule, Constant, DataMember, ExecutableMember, MemberFlags, TypeDesc};

use super::{CallSignature, Pred};

type MethodTest = dyn Fn(&CodeModule, &ExecutableMember) -> bool + Send + Sync;
type FieldTest = dyn Fn(&CodeModule, &DataMember) -> bool + Send + Sync;

/// Declarative predicate set over one [`ExecutableMember`].
///
/// Member predicates receive the owning module alongside the member, which is
/// what makes shape predicates like [`Self::returns_self`] expressible.
///
/// # Examples
///
/// ```rust
/// use sigweave::{MethodSignature, TypeDesc};
///
/// let sig = MethodSignature::new().arity(0).returns(TypeDesc::Str);
/// ```
#[derive(Default)]
pub struct MethodSignature {
    preds: Vec<Pred<MethodTest>>,
}

impl MethodSignature {
    /// Create an empty signature; with no predicates it matches every member.
    #[must_use]
    pub fn new() -> Self {
        MethodSignature::default()
    }

    fn push(
        mut self,
        label: &str,
        test: impl Fn(&CodeModule, &ExecutableMember) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.preds.push(Pred {
            label: label.to_string(),
            test: Box::new(test),
        });
        self
    }

    /// Require the exact member name.
    #[must_use]
    pub fn named(self, name: &str) -> Self {
        let name = name.to_string();
        self.push(&format!("name == {name}"), move |_, m| m.name == name)
    }

    /// Require all given flag bits to be set.
    #[must_use]
    pub fn flags(self, flags: MemberFlags) -> Self {
        self.push(&format!("flags contain {flags:?}"), move |_, m| {
            m.flags.contains(flags)
        })
    }

    /// Require the exact parameter count.
    #[must_use]
    pub fn arity(self, arity: usize) -> Self {
        self.push(&format!("arity == {arity}"), move |_, m| m.arity() == arity)
    }

    /// Require the parameter at `index` to have the given type.
    #[must_use]
    pub fn arg(self, index: usize, ty: TypeDesc) -> Self {
        self.push(&format!("arg {index} is {ty}"), move |_, m| {
            m.signature.params.get(index) == Some(&ty)
        })
    }

    /// Require the return type.
    #[must_use]
    pub fn returns(self, ty: TypeDesc) -> Self {
        self.push(&format!("returns {ty}"), move |_, m| m.signature.ret == ty)
    }

    /// Require the return type to name the owning module itself.
    #[must_use]
    pub fn returns_self(self) -> Self {
        self.push("returns self", |module, m| {
            m.signature.ret.named() == Some(module.name.as_str())
        })
    }

    /// Require the member to reference the given constant.
    #[must_use]
    pub fn constant(self, constant: Constant) -> Self {
        self.push(&format!("references constant {constant}"), move |_, m| {
            m.constants().any(|c| c == &constant)
        })
    }

    /// Require the member to reference the exact string constant.
    #[must_use]
    pub fn string_constant(self, text: &str) -> Self {
        self.constant(Constant::str(text))
    }

    /// Require some referenced string constant to contain `needle`.
    #[must_use]
    pub fn string_containing(self, needle: &str) -> Self {
        let needle = needle.to_string();
        self.push(&format!("references string containing {needle:?}"), move |_, m| {
            m.constants()
                .any(|c| c.as_str().is_some_and(|s| s.contains(&needle)))
        })
    }

    /// Require some call-site of the member to match the given signature.
    #[must_use]
    pub fn calls(self, call: CallSignature) -> Self {
        self.push("has matching call-site", move |_, m| {
            m.call_sites().any(|site| call.matches(&site))
        })
    }

    /// Require some call-site to match the fixed description exactly.
    #[must_use]
    pub fn calls_exact(
        self,
        kind: crate::module::InvokeKind,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Self {
        self.calls(
            CallSignature::new()
                .kind(kind)
                .owner(owner)
                .named(name)
                .desc(desc),
        )
    }

    /// Register an arbitrary predicate with a diagnostic label.
    #[must_use]
    pub fn require(
        self,
        label: &str,
        test: impl Fn(&CodeModule, &ExecutableMember) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.push(label, test)
    }

    /// Evaluate all predicates in declaration order, short-circuiting on the
    /// first failure.
    #[must_use]
    pub fn matches(&self, module: &CodeModule, member: &ExecutableMember) -> bool {
        super::all_match(&self.preds, |pred| (pred.test)(module, member))
    }
}

/// Declarative predicate set over one [`DataMember`].
#[derive(Default)]
pub struct FieldSignature {
    preds: Vec<Pred<FieldTest>>,
}

impl FieldSignature {
    /// Create an empty signature; with no predicates it matches every member.
    #[must_use]
    pub fn new() -> Self {
        FieldSignature::default()
    }

    fn push(
        mut self,
        label: &str,
        test: impl Fn(&CodeModule, &DataMember) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.preds.push(Pred {
            label: label.to_string(),
            test: Box::new(test),
        });
        self
    }

    /// Require the exact member name.
    #[must_use]
    pub fn named(self, name: &str) -> Self {
        let name = name.to_string();
        self.push(&format!("name == {name}"), move |_, m| m.name == name)
    }

    /// Require the declared type.
    #[must_use]
    pub fn typed(self, ty: TypeDesc) -> Self {
        self.push(&format!("typed {ty}"), move |_, m| m.ty == ty)
    }

    /// Require all given flag bits to be set.
    #[must_use]
    pub fn flags(self, flags: MemberFlags) -> Self {
        self.push(&format!("flags contain {flags:?}"), move |_, m| {
            m.flags.contains(flags)
        })
    }

    /// Require the constant initial value.
    #[must_use]
    pub fn constant(self, constant: Constant) -> Self {
        self.push(&format!("constant == {constant}"), move |_, m| {
            m.constant.as_ref() == Some(&constant)
        })
    }

    /// Register an arbitrary predicate with a diagnostic label.
    #[must_use]
    pub fn require(
        self,
        label: &str,
        test: impl Fn(&CodeModule, &DataMember) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.push(label, test)
    }

    /// Evaluate all predicates in declaration order, short-circuiting on the
    /// first failure.
    #[must_use]
    pub fn matches(&self, module: &CodeModule, member: &DataMember) -> bool {
        super::all_match(&self.preds, |pred| (pred.test)(module, member))
    }
}
