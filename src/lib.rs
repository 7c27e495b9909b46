// Copyright 2025 sigweave contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'format/io.rs' uses mmap to map a module image into memory

//! # sigweave
//!
//! A structural-signature engine for locating and rewriting members of
//! compiled code modules as a host process loads them. Modules are matched
//! by behavioral fingerprint rather than by name, so signatures keep working
//! across renames and obfuscated builds.
//!
//! ## Features
//!
//! - **🔍 Structural matching** - Declarative signatures over module shape,
//!   constants and call-sites; no symbol names required
//! - **📌 Stable resolution** - Each finder binds at most one module for the
//!   process lifetime, with found-hooks fired exactly once
//! - **🔧 Composable rewriting** - Sink-decorator transforms merged into one
//!   pipeline per module, applied fail-open at the load boundary
//! - **🌉 Accessor synthesis** - Typed bridge modules generated against
//!   resolved members, with reflective dispatch for non-public targets
//! - **📦 Compact wire format** - Pooled constants, symbolic branch labels
//!   and memory-mapped image loading
//! - **🛡️ Memory safe** - Built in Rust with comprehensive error handling
//!
//! ## Quick Start
//!
//! Add `sigweave` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sigweave = "0.2"
//! ```
//!
//! ### Locating and Rewriting a Module
//!
//! ```rust
//! use sigweave::prelude::*;
//!
//! # let module = sigweave::ModuleBuilder::new("obf/aa")
//! #     .public()
//! #     .method("a", |m| {
//! #         m.returns(TypeDesc::Str).public().body(|asm| {
//! #             asm.load_str("Lunar Client (")?.ret_value()?;
//! #             Ok(())
//! #         })
//! #     })?
//! #     .build()?;
//! # let image = sigweave::write_module(&module)?;
//! // Describe the module by structure, not by name.
//! let signature = ModuleSignature::builder("window")
//!     .string_constant("Lunar Client (")
//!     .method(
//!         "title",
//!         MethodSignature::new().arity(0).returns(TypeDesc::Str),
//!     )
//!     .member_transform("title", ReplaceBody::fixed_return(Constant::str("Patched")))
//!     .build()?;
//!
//! let registry = FinderRegistry::new();
//! let finder = registry.register(signature)?;
//!
//! // Offer every load; interested finders rewrite the image.
//! let rewritten = registry
//!     .transform(&LoadEvent::new("obf/aa", &image))
//!     .expect("the signature matches, so a rewrite is produced");
//!
//! assert_eq!(finder.assume()?.exec("title").unwrap().name, "a");
//! assert!(sigweave::parse_module(&rewritten)?
//!     .has_constant(&Constant::str("Patched")));
//! # Ok::<(), sigweave::Error>(())
//! ```
//!
//! ### Building Modules Programmatically
//!
//! ```rust
//! use sigweave::{MemberFlags, ModuleBuilder, TypeDesc};
//!
//! let module = ModuleBuilder::new("game/Counter")
//!     .public()
//!     .data_member("count", "I", MemberFlags::PRIVATE)?
//!     .method("get", |m| {
//!         m.returns(TypeDesc::Int32).public().body(|asm| {
//!             asm.load_this()?
//!                 .get_field("game/Counter", "count", "I")?
//!                 .ret_value()?;
//!             Ok(())
//!         })
//!     })?
//!     .build()?;
//! assert_eq!(module.exec_member("get").unwrap().desc, "()I");
//! # Ok::<(), sigweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The engine is layered; each layer only depends on the ones below it:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  accessor: contracts, bridge synthesis       │
//! ├──────────────────────────────────────────────┤
//! │  finder: registry, resolution, offer flow    │
//! ├──────────────────────────────────────────────┤
//! │  signature: module / member / call matching  │
//! ├──────────────────────────────────────────────┤
//! │  transform: sink decorators, pipelines       │
//! ├──────────────────────────────────────────────┤
//! │  build: assembler, module builder            │
//! ├──────────────────────────────────────────────┤
//! │  format: parser, reader, writer, file I/O    │
//! ├──────────────────────────────────────────────┤
//! │  module: the in-memory object model          │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test
//! cargo bench  # signature matching and rewrite throughput
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used
/// types from across the library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use sigweave::prelude::*;
///
/// let registry = FinderRegistry::new();
/// let signature = ModuleSignature::builder("window").build()?;
/// registry.register(signature)?;
/// # Ok::<(), sigweave::Error>(())
/// ```
pub mod prelude;

/// The in-memory object model: modules, members, instructions, descriptors.
pub mod module;

/// The wire format: parsing, image reading and writing, file I/O.
pub mod format;

/// The declarative signature model over modules, members and call-sites.
pub mod signature;

/// Sink-decorator transforms and the rewrite pipeline.
pub mod transform;

/// Finders, their registry and resolution state.
pub mod finder;

/// Typed accessor contracts and bridge synthesis.
pub mod accessor;

/// Programmatic module construction.
pub mod build;

/// The host boundary: load events and the retransform capability.
pub mod runtime;

pub use error::Error;

/// The common result type of every fallible operation in this crate.
pub type Result<T> = std::result::Result<T, Error>;

pub use accessor::{AccessorRegistry, AccessorSpec, Contract, ContractMember, GeneratedAccessor};
pub use build::{InstructionAssembler, MethodBuilder, ModuleBuilder};
pub use finder::{
    Finder, FinderHandle, FinderRegistry, Offer, RegistryConfig, Resolution, ResolvedMember,
    TransformRequest,
};
pub use format::{
    emit_module, parse_module, read_module_file, write_module, ModuleWriter, Parser, WriterOutput,
};
pub use module::{
    CallSite, CodeModule, Constant, DataMember, ExecutableMember, HandleKind, Instruction,
    InvokeKind, Label, MemberFlags, MemberRef, MethodDesc, ModuleFlags, TypeDesc,
};
pub use runtime::{HostRuntime, LoadEvent};
pub use signature::{
    CallSignature, FieldSignature, FoundHook, MethodSignature, ModuleSignature,
    ModuleSignatureBuilder,
};
pub use transform::{
    CollectSink, ForMember, InjectEntry, InjectExit, InterceptCall, MemberDecl, MemberSink,
    MemberTransform, ModuleHeader, ModuleSink, ModuleTransform, ReplaceBody, ReplaceCall,
    SubstConstants, SubstLiteral, TransformPipeline,
};
