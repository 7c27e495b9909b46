//! # sigweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used
//! types and traits from the sigweave library. Import this module to get
//! quick access to the essential types for locating and rewriting modules.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all sigweave operations
pub use crate::Error;

/// The result type used throughout sigweave
pub use crate::Result;

/// Registry tunables, deserializable from TOML
pub use crate::RegistryConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The host-facing registry of finders
pub use crate::FinderRegistry;

/// One module load observed by the host
pub use crate::LoadEvent;

/// The host's retransform capability
pub use crate::HostRuntime;

// ================================================================================================
// Object Model
// ================================================================================================

/// A parsed code module with its members
pub use crate::CodeModule;

/// Member kinds and their shared references
pub use crate::{CallSite, DataMember, ExecutableMember, MemberRef};

/// Constants, descriptors and flags
pub use crate::{Constant, MemberFlags, MethodDesc, ModuleFlags, TypeDesc};

/// The instruction set and its operand types
pub use crate::{HandleKind, Instruction, InvokeKind, Label};

// ================================================================================================
// Wire Format
// ================================================================================================

/// Parse and encode module images
pub use crate::{parse_module, write_module};

/// Memory-mapped image loading
pub use crate::read_module_file;

// ================================================================================================
// Signatures and Finders
// ================================================================================================

/// Signature builders for every entity kind
pub use crate::{CallSignature, FieldSignature, MethodSignature, ModuleSignature};

/// Resolution state and its shared handle
pub use crate::{FinderHandle, Offer, Resolution, ResolvedMember};

// ================================================================================================
// Transforms
// ================================================================================================

/// The transform seams and the merged pipeline
pub use crate::{ForMember, MemberTransform, ModuleTransform, TransformPipeline};

/// The primitive composable rewrites
pub use crate::{
    InjectEntry, InjectExit, InterceptCall, ReplaceBody, ReplaceCall, SubstConstants, SubstLiteral,
};

// ================================================================================================
// Accessors and Module Construction
// ================================================================================================

/// Accessor declaration and generation
pub use crate::{AccessorRegistry, AccessorSpec, Contract, GeneratedAccessor};

/// Programmatic module construction
pub use crate::{InstructionAssembler, ModuleBuilder};
