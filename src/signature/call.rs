//! Call-site signatures.

use crate::finder::FinderHandle;
use crate::module::{CallSite, InvokeKind};

use super::Pred;

/// Declarative predicate set over one [`CallSite`].
///
/// Used as a cross-reference predicate by
/// [`crate::MethodSignature::calls`] and as the site selector of the
/// call-interception transforms. Matching is the short-circuit AND of all
/// registered predicates in declaration order.
///
/// # Examples
///
/// ```rust
/// use sigweave::{CallSignature, InvokeKind};
///
/// let sig = CallSignature::new()
///     .kind(InvokeKind::Static)
///     .owner("game/Version")
///     .named("current");
/// ```
#[derive(Default)]
pub struct CallSignature {
    preds: Vec<Pred<dyn Fn(&CallSite) -> bool + Send + Sync>>,
}

impl CallSignature {
    /// Create an empty signature; with no predicates it matches every call.
    #[must_use]
    pub fn new() -> Self {
        CallSignature::default()
    }

    fn push(
        mut self,
        label: &str,
        test: impl Fn(&CallSite) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.preds.push(Pred {
            label: label.to_string(),
            test: Box::new(test),
        });
        self
    }

    /// Require the given invocation kind.
    #[must_use]
    pub fn kind(self, kind: InvokeKind) -> Self {
        self.push(&format!("kind == {kind}"), move |site| site.kind == kind)
    }

    /// Require the invoked owner module name.
    #[must_use]
    pub fn owner(self, owner: &str) -> Self {
        let owner = owner.to_string();
        self.push(&format!("owner == {owner}"), move |site| site.owner == owner)
    }

    /// Require the invoked member name.
    #[must_use]
    pub fn named(self, name: &str) -> Self {
        let name = name.to_string();
        self.push(&format!("name == {name}"), move |site| site.name == name)
    }

    /// Require the invoked method descriptor.
    #[must_use]
    pub fn desc(self, desc: &str) -> Self {
        let desc = desc.to_string();
        self.push(&format!("desc == {desc}"), move |site| site.desc == desc)
    }

    /// Require the invoked owner to be the module another finder has resolved.
    ///
    /// Evaluated at match time, so the referenced finder may resolve after
    /// this signature is declared; while it is unresolved the predicate
    /// simply fails.
    #[must_use]
    pub fn owner_resolves(self, handle: &FinderHandle) -> Self {
        let handle = handle.clone();
        self.push(&format!("owner resolves '{}'", handle.name()), move |site| {
            handle
                .resolved()
                .is_some_and(|resolution| resolution.module.name == site.owner)
        })
    }

    /// Register an arbitrary predicate with a diagnostic label.
    #[must_use]
    pub fn require(
        self,
        label: &str,
        test: impl Fn(&CallSite) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.push(label, test)
    }

    /// Evaluate all predicates against one call-site, in declaration order,
    /// short-circuiting on the first failure.
    #[must_use]
    pub fn matches(&self, site: &CallSite) -> bool {
        super::all_match(&self.preds, |pred| (pred.test)(site))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> CallSite {
        CallSite {
            kind: InvokeKind::Static,
            owner: "game/Version".to_string(),
            name: "current".to_string(),
            desc: "()S".to_string(),
            index: 3,
        }
    }

    #[test]
    fn empty_signature_matches_everything() {
        assert!(CallSignature::new().matches(&site()));
    }

    #[test]
    fn predicates_are_conjunctive() {
        let sig = CallSignature::new()
            .kind(InvokeKind::Static)
            .owner("game/Version")
            .named("current")
            .desc("()S");
        assert!(sig.matches(&site()));

        let sig = CallSignature::new().owner("game/Version").named("other");
        assert!(!sig.matches(&site()));
    }

    #[test]
    fn custom_predicates() {
        let sig = CallSignature::new().require("late call", |site| site.index > 1);
        assert!(sig.matches(&site()));
        let sig = CallSignature::new().require("early call", |site| site.index == 0);
        assert!(!sig.matches(&site()));
    }
}
