//! The declarative structural-signature model.
//!
//! Signatures describe *what to look for* without naming symbols: composable
//! predicates over module structure, member shape, referenced constants and
//! call-sites. One builder exists per entity kind:
//!
//! - [`ModuleSignature`] - the root; carries nested member declarations,
//!   transforms and found-hooks, and is what a [`crate::Finder`] binds to
//! - [`MethodSignature`] - predicates over executable members
//! - [`FieldSignature`] - predicates over data members
//! - [`CallSignature`] - predicates over call-sites
//!
//! # Matching Semantics
//!
//! `matches` is the logical AND of all registered predicates, evaluated in
//! declaration order with short-circuit on the first failure. An empty
//! signature matches everything. Ordinary mismatch is a value, never an
//! error; only inconsistent wiring (a transform on an undeclared member key,
//! a lazy signature rebuilding into another lazy signature) fails hard with
//! [`crate::Error::Misuse`].
//!
//! Every declared member signature is mandatory: the owning finder resolves
//! only when the module predicates and *all* member signatures match.
//!
//! # Examples
//!
//! ```rust
//! use sigweave::{MethodSignature, ModuleSignature, TypeDesc};
//!
//! // "The module containing the window title": identified by a string
//! // constant and a zero-argument string-returning member, whatever the
//! // build renamed them to.
//! let signature = ModuleSignature::builder("window")
//!     .string_constant("Lunar Client (")
//!     .method(
//!         "title",
//!         MethodSignature::new().arity(0).returns(TypeDesc::Str),
//!     )
//!     .build()?;
//! # Ok::<(), sigweave::Error>(())
//! ```

mod call;
mod member;
mod module_sig;

pub use call::CallSignature;
pub use member::{FieldSignature, MethodSignature};
pub use module_sig::{FoundHook, ModuleSignature, ModuleSignatureBuilder};

pub(crate) use module_sig::MemberSignature;

/// One labelled predicate. The label only serves trace diagnostics.
pub(crate) struct Pred<F: ?Sized> {
    pub label: String,
    pub test: Box<F>,
}

/// Ordered conjunction with short-circuit; traces the first failing label.
pub(crate) fn all_match<F: ?Sized>(
    preds: &[Pred<F>],
    mut eval: impl FnMut(&Pred<F>) -> bool,
) -> bool {
    for pred in preds {
        if !eval(pred) {
            tracing::trace!(predicate = %pred.label, "signature predicate failed");
            return false;
        }
    }
    true
}
