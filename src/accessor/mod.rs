//! Typed accessor synthesis over resolved modules.
//!
//! A [`Contract`] names the surface a caller wants; an [`AccessorSpec`] pairs
//! two contracts (instance and statics) with the finder that located the
//! underlying module; generation synthesizes one bridge module per contract
//! through [`crate::ModuleBuilder`].
//!
//! # Dispatch Selection
//!
//! Each contract member binds a resolved member through the finder's
//! declaration keys and dispatches directly when the target is public.
//! Non-public targets, or every target when full reflection is in force, go
//! through the handle protocol instead: handles are resolved once in the
//! bridge initializer, stored in synthetic `H`-typed members, and invoked
//! with packed arguments.
//!
//! # Recursive Wrapping
//!
//! A member whose declared return type names another registered contract has
//! its result wrapped in that contract's bridge, null passing through
//! untouched. This is what lets accessor graphs mirror the object graph of
//! the located code.
//!
//! # Key Components
//!
//! - [`Contract`] / [`ContractMember`] - the declared surface
//! - [`AccessorSpec`] - finder plus contracts, memoized generation
//! - [`AccessorRegistry`] - spec storage, wrapping namespace
//! - [`GeneratedAccessor`] - the synthesized bridge pair

mod contract;
mod registry;
mod synth;

pub use contract::{Contract, ContractMember};
pub use registry::AccessorRegistry;
pub use synth::{AccessorSpec, GeneratedAccessor};
