//! Finders and their registry: signature resolution over module loads.
//!
//! A [`Finder`] binds one [`crate::ModuleSignature`] to at most one concrete
//! module for the process lifetime. The [`FinderRegistry`] owns registration
//! order, offers every load to every finder and merges the requested
//! rewrites into one pipeline per module.
//!
//! # Offer Protocol
//!
//! Each offer yields an [`Offer`] verdict. Resolution-only offers
//! short-circuit with [`Offer::Skip`] once a finder is resolved; transform
//! offers keep re-evaluating the finder's own module so the host can replay
//! a load and still get the declared rewrite.
//!
//! # Key Components
//!
//! - [`Finder`] / [`FinderHandle`] - the resolution state and its shared view
//! - [`Resolution`] / [`ResolvedMember`] - what a match binds
//! - [`FinderRegistry`] - host entry point, fail-open transform boundary
//! - [`RegistryConfig`] - platform prefixes, rewrite verification,
//!   reflection forcing

mod config;
#[allow(clippy::module_inception)]
mod finder;
mod registry;

pub use config::RegistryConfig;
pub use finder::{Finder, FinderHandle, Offer, Resolution, ResolvedMember, TransformRequest};
pub use registry::FinderRegistry;
