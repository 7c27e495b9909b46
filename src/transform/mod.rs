//! Ordered, composable rewrites of emitted instructions.
//!
//! A transform never edits a parsed module; it decorates the emission. The
//! pipeline re-emits the original model through a chain of sinks and the
//! terminal writer encodes whatever comes out the bottom:
//!
//! ```text
//! emit_module -> [first transform] -> [second transform] -> ModuleWriter
//! ```
//!
//! The fold order means the **first-declared** transform observes the
//! original emission; each later transform sees its predecessor's output.
//! Member-scoped transforms compile into one module-level transform that
//! intercepts emission only for the member matched by name and descriptor,
//! passing every other member through untouched.
//!
//! # Key Components
//!
//! - [`ModuleSink`] / [`MemberSink`] - the emission interfaces
//! - [`ModuleTransform`] / [`MemberTransform`] - sink decorators
//! - [`TransformPipeline`] - ordered list, frame-flag folding, application
//! - Primitives: [`ReplaceBody`], [`InjectEntry`], [`InjectExit`],
//!   [`InterceptCall`], [`ReplaceCall`], [`SubstConstants`], [`SubstLiteral`]
//!
//! Every primitive reports whether it restructures control flow through
//! [`ModuleTransform::requires_frames`]; the writer recomputes operand stack
//! ceilings only when some applied transform demands it.
//!
//! # Examples
//!
//! ```rust
//! use sigweave::{Constant, ReplaceBody, TransformPipeline, ForMember};
//! use std::sync::Arc;
//!
//! // Force one member to return a fixed literal, leave the rest alone.
//! let mut pipeline = TransformPipeline::new();
//! pipeline.push(Arc::new(ForMember::new(
//!     "getWindowTitle",
//!     "()S",
//!     vec![Arc::new(ReplaceBody::fixed_return(Constant::str("Patched")))],
//! )));
//! assert!(pipeline.expand_frames());
//! ```

mod primitives;
mod sink;

pub use primitives::{
    InjectEntry, InjectExit, InterceptCall, ReplaceBody, ReplaceCall, SubstConstants, SubstLiteral,
};
pub use sink::{CollectSink, MemberDecl, MemberSink, ModuleHeader, ModuleSink};

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::module::{DataMember, Instruction};
use crate::Result;

/// A pure decorator of a downstream module emission sink.
///
/// Implementations hold only their configuration; all rewrite state lives in
/// the sink they build per application, so one transform value can be applied
/// to any number of modules concurrently.
pub trait ModuleTransform: Send + Sync {
    /// Wrap the downstream sink, returning the sink this transform exposes
    /// upstream.
    fn apply(&self, downstream: Box<dyn ModuleSink>) -> Box<dyn ModuleSink>;

    /// Whether this transform restructures control flow and therefore needs
    /// frame metadata recomputed by the writer.
    fn requires_frames(&self) -> bool {
        false
    }
}

/// A pure decorator of a downstream member emission sink.
pub trait MemberTransform: Send + Sync {
    /// Wrap the downstream sink, returning the sink this transform exposes
    /// upstream.
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink>;

    /// Whether this transform restructures control flow and therefore needs
    /// frame metadata recomputed by the writer.
    fn requires_frames(&self) -> bool {
        false
    }
}

/// An ordered transform list with its folded frame-expansion flag.
///
/// Pipelines merge by concatenation: the registry collects one pipeline per
/// interested finder and appends them in registration order.
#[derive(Default)]
pub struct TransformPipeline {
    transforms: Vec<Arc<dyn ModuleTransform>>,
    expand_frames: bool,
}

impl TransformPipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        TransformPipeline::default()
    }

    /// Append one transform, folding its frame demand into the pipeline flag.
    pub fn push(&mut self, transform: Arc<dyn ModuleTransform>) {
        self.expand_frames |= transform.requires_frames();
        self.transforms.push(transform);
    }

    /// Append all of `other`'s transforms, ORing the frame flags.
    pub fn merge(&mut self, other: TransformPipeline) {
        self.expand_frames |= other.expand_frames;
        self.transforms.extend(other.transforms);
    }

    /// Whether the pipeline holds no transforms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Number of transforms in the pipeline.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    /// Whether any contained transform demands frame recomputation.
    #[must_use]
    pub fn expand_frames(&self) -> bool {
        self.expand_frames
    }

    /// Apply the pipeline to a raw module image, producing the rewritten
    /// image.
    ///
    /// Parses the bytes once, folds the transform chain over the terminal
    /// writer (first-declared outermost) and re-emits the module through it.
    ///
    /// # Errors
    /// Propagates parse errors and any [`crate::Error`] raised during
    /// emission. Callers at the host boundary treat every error here as a
    /// transform failure and fall back to the original bytes.
    pub fn apply(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        let module = crate::format::parse_module(bytes)?;
        let writer = crate::format::ModuleWriter::new(self.expand_frames);
        let output = writer.output();

        let mut sink: Box<dyn ModuleSink> = Box::new(writer);
        for transform in self.transforms.iter().rev() {
            sink = transform.apply(sink);
        }

        crate::format::emit_module(&module, sink.as_mut())?;
        output.take()
    }
}

/// Compiled form of a member-scoped transform set: one module-level transform
/// filtering by member name and descriptor.
///
/// All members other than the matched one pass through unchanged; the matched
/// member's instruction stream is fed through the member chain (first
/// transform sees the original emission) and the collected result is emitted
/// downstream.
pub struct ForMember {
    name: String,
    desc: String,
    transforms: Vec<Arc<dyn MemberTransform>>,
}

impl ForMember {
    /// Scope `transforms` to the member identified by `name` and `desc`.
    #[must_use]
    pub fn new(name: &str, desc: &str, transforms: Vec<Arc<dyn MemberTransform>>) -> Self {
        ForMember {
            name: name.to_string(),
            desc: desc.to_string(),
            transforms,
        }
    }
}

impl ModuleTransform for ForMember {
    fn apply(&self, downstream: Box<dyn ModuleSink>) -> Box<dyn ModuleSink> {
        Box::new(ForMemberSink {
            downstream,
            name: self.name.clone(),
            desc: self.desc.clone(),
            transforms: self.transforms.clone(),
        })
    }

    fn requires_frames(&self) -> bool {
        self.transforms.iter().any(|t| t.requires_frames())
    }
}

struct ForMemberSink {
    downstream: Box<dyn ModuleSink>,
    name: String,
    desc: String,
    transforms: Vec<Arc<dyn MemberTransform>>,
}

impl ModuleSink for ForMemberSink {
    fn begin(&mut self, header: &ModuleHeader) -> Result<()> {
        self.downstream.begin(header)
    }

    fn data_member(&mut self, member: &DataMember) -> Result<()> {
        self.downstream.data_member(member)
    }

    fn exec_member(&mut self, decl: &MemberDecl, code: &[Instruction]) -> Result<()> {
        if decl.name != self.name || decl.desc != self.desc {
            return self.downstream.exec_member(decl, code);
        }

        let collected = Rc::new(RefCell::new(Vec::new()));
        let mut chain: Box<dyn MemberSink> = Box::new(CollectSink::new(collected.clone()));
        for transform in self.transforms.iter().rev() {
            chain = transform.apply(chain);
        }

        chain.begin(decl)?;
        for ins in code {
            chain.instruction(ins)?;
        }
        chain.end()?;

        let rewritten = collected.borrow();
        self.downstream.exec_member(decl, &rewritten)
    }

    fn end(&mut self) -> Result<()> {
        self.downstream.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{
        CodeModule, Constant, ExecutableMember, MemberFlags, ModuleFlags,
    };

    fn sample_module() -> CodeModule {
        let title = ExecutableMember::new(
            "getWindowTitle",
            "()S",
            MemberFlags::PUBLIC,
            1,
            0,
            vec![
                Instruction::LoadConst(Constant::str("original")),
                Instruction::ReturnValue,
            ],
        )
        .unwrap();
        let tick = ExecutableMember::new(
            "tick",
            "()V",
            MemberFlags::PUBLIC,
            0,
            0,
            vec![Instruction::Return],
        )
        .unwrap();
        CodeModule::new(
            "game/Window",
            None,
            Vec::new(),
            ModuleFlags::PUBLIC,
            vec![title, tick],
            Vec::new(),
        )
    }

    #[test]
    fn empty_pipeline_round_trips() {
        let bytes = crate::format::write_module(&sample_module()).unwrap();
        let rewritten = TransformPipeline::new().apply(&bytes).unwrap();
        let module = crate::format::parse_module(&rewritten).unwrap();
        assert_eq!(module.name, "game/Window");
        assert!(module.has_constant(&Constant::str("original")));
    }

    #[test]
    fn for_member_touches_only_its_target() {
        let bytes = crate::format::write_module(&sample_module()).unwrap();

        let mut pipeline = TransformPipeline::new();
        pipeline.push(Arc::new(ForMember::new(
            "getWindowTitle",
            "()S",
            vec![Arc::new(ReplaceBody::fixed_return(Constant::str(
                "patched",
            )))],
        )));
        assert!(pipeline.expand_frames());

        let module = crate::format::parse_module(&pipeline.apply(&bytes).unwrap()).unwrap();
        let title = module.exec_member("getWindowTitle").unwrap();
        assert_eq!(
            title.code,
            vec![
                Instruction::LoadConst(Constant::str("patched")),
                Instruction::ReturnValue,
            ]
        );
        // tick is untouched
        assert_eq!(
            module.exec_member("tick").unwrap().code,
            vec![Instruction::Return]
        );
    }

    #[test]
    fn declaration_order_folds_first_transform_outermost() {
        let bytes = crate::format::write_module(&sample_module()).unwrap();

        // First substitute original -> midway, then midway -> final. If the
        // fold order were reversed the second mapping would see "original"
        // and never fire.
        let mut pipeline = TransformPipeline::new();
        pipeline.push(Arc::new(
            SubstConstants::new().map(Constant::str("original"), Constant::str("midway")),
        ));
        pipeline.push(Arc::new(
            SubstConstants::new().map(Constant::str("midway"), Constant::str("final")),
        ));

        let module = crate::format::parse_module(&pipeline.apply(&bytes).unwrap()).unwrap();
        assert!(module.has_constant(&Constant::str("final")));
        assert!(!module.has_constant(&Constant::str("original")));
        assert!(!module.has_constant(&Constant::str("midway")));
    }
}
