//! The primitive composable rewrites.
//!
//! Each primitive is a small, single-purpose decorator. Structural primitives
//! (body replacement, injection, call interception) request frame
//! recomputation; constant substitutions do not.

use std::collections::HashMap;
use std::sync::Arc;

use crate::module::{CallSite, Constant, DataMember, Instruction, TypeDesc};
use crate::signature::CallSignature;
use crate::Result;

use super::{MemberDecl, MemberSink, MemberTransform, ModuleHeader, ModuleSink, ModuleTransform};

/// Full body replacement: the original instruction stream is discarded and a
/// fixed stream emitted in its place.
///
/// The fixed-value and default-value return shortcuts are constructors on
/// this type since they are nothing more than canned replacement bodies.
pub struct ReplaceBody {
    replacement: Vec<Instruction>,
}

impl ReplaceBody {
    /// Replace the body with the given stream.
    #[must_use]
    pub fn new(replacement: Vec<Instruction>) -> Self {
        ReplaceBody { replacement }
    }

    /// Replace the body with `return <value>`.
    #[must_use]
    pub fn fixed_return(value: Constant) -> Self {
        ReplaceBody::new(vec![
            Instruction::LoadConst(value),
            Instruction::ReturnValue,
        ])
    }

    /// Replace the body with a return of the type's default value: zero for
    /// numeric types, null for references, a bare return for void.
    #[must_use]
    pub fn default_return(ty: &TypeDesc) -> Self {
        let replacement = match ty {
            TypeDesc::Void => vec![Instruction::Return],
            TypeDesc::Bool | TypeDesc::Char | TypeDesc::Int32 | TypeDesc::Int64 => vec![
                Instruction::LoadConst(Constant::Int(0)),
                Instruction::ReturnValue,
            ],
            TypeDesc::Float32 | TypeDesc::Float64 => vec![
                Instruction::LoadConst(Constant::Float(0.0)),
                Instruction::ReturnValue,
            ],
            _ => vec![Instruction::LoadNull, Instruction::ReturnValue],
        };
        ReplaceBody::new(replacement)
    }
}

impl MemberTransform for ReplaceBody {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(ReplaceBodySink {
            downstream,
            replacement: self.replacement.clone(),
        })
    }

    fn requires_frames(&self) -> bool {
        true
    }
}

struct ReplaceBodySink {
    downstream: Box<dyn MemberSink>,
    replacement: Vec<Instruction>,
}

impl MemberSink for ReplaceBodySink {
    fn begin(&mut self, decl: &MemberDecl) -> Result<()> {
        self.downstream.begin(decl)
    }

    fn instruction(&mut self, _ins: &Instruction) -> Result<()> {
        Ok(()) // original body is discarded
    }

    fn end(&mut self) -> Result<()> {
        for ins in &self.replacement {
            self.downstream.instruction(ins)?;
        }
        self.downstream.end()
    }
}

/// Entry injection: a fixed stream emitted before the original body.
pub struct InjectEntry {
    code: Vec<Instruction>,
}

impl InjectEntry {
    /// Inject `code` ahead of the original body.
    #[must_use]
    pub fn new(code: Vec<Instruction>) -> Self {
        InjectEntry { code }
    }
}

impl MemberTransform for InjectEntry {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(InjectEntrySink {
            downstream,
            code: self.code.clone(),
        })
    }

    fn requires_frames(&self) -> bool {
        true
    }
}

struct InjectEntrySink {
    downstream: Box<dyn MemberSink>,
    code: Vec<Instruction>,
}

impl MemberSink for InjectEntrySink {
    fn begin(&mut self, decl: &MemberDecl) -> Result<()> {
        self.downstream.begin(decl)?;
        for ins in &self.code {
            self.downstream.instruction(ins)?;
        }
        Ok(())
    }

    fn instruction(&mut self, ins: &Instruction) -> Result<()> {
        self.downstream.instruction(ins)
    }

    fn end(&mut self) -> Result<()> {
        self.downstream.end()
    }
}

/// Exit injection: a fixed stream emitted before every return and every
/// unhandled-throw point.
///
/// The injected code runs with the member's exit state on the stack (the
/// return value or the raised reference on top); it must leave that state
/// intact.
pub struct InjectExit {
    code: Vec<Instruction>,
}

impl InjectExit {
    /// Inject `code` ahead of every exit instruction.
    #[must_use]
    pub fn new(code: Vec<Instruction>) -> Self {
        InjectExit { code }
    }
}

impl MemberTransform for InjectExit {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(InjectExitSink {
            downstream,
            code: self.code.clone(),
        })
    }

    fn requires_frames(&self) -> bool {
        true
    }
}

struct InjectExitSink {
    downstream: Box<dyn MemberSink>,
    code: Vec<Instruction>,
}

impl MemberSink for InjectExitSink {
    fn begin(&mut self, decl: &MemberDecl) -> Result<()> {
        self.downstream.begin(decl)
    }

    fn instruction(&mut self, ins: &Instruction) -> Result<()> {
        if ins.is_exit() {
            for injected in &self.code {
                self.downstream.instruction(injected)?;
            }
        }
        self.downstream.instruction(ins)
    }

    fn end(&mut self) -> Result<()> {
        self.downstream.end()
    }
}

/// Call-site interception: before/after advice around every call matching a
/// [`CallSignature`], optionally only the first occurrence.
///
/// The before advice runs with the call's arguments already on the stack and
/// must preserve them; the after advice runs with the call's result on top.
pub struct InterceptCall {
    call: Arc<CallSignature>,
    before: Vec<Instruction>,
    after: Vec<Instruction>,
    first_only: bool,
}

impl InterceptCall {
    /// Intercept calls matching `call`.
    #[must_use]
    pub fn new(call: CallSignature) -> Self {
        InterceptCall {
            call: Arc::new(call),
            before: Vec::new(),
            after: Vec::new(),
            first_only: false,
        }
    }

    /// Emit `code` immediately before each intercepted call.
    #[must_use]
    pub fn before(mut self, code: Vec<Instruction>) -> Self {
        self.before = code;
        self
    }

    /// Emit `code` immediately after each intercepted call.
    #[must_use]
    pub fn after(mut self, code: Vec<Instruction>) -> Self {
        self.after = code;
        self
    }

    /// Intercept only the first matching call.
    #[must_use]
    pub fn first_only(mut self) -> Self {
        self.first_only = true;
        self
    }
}

impl MemberTransform for InterceptCall {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(CallSiteSink {
            downstream,
            call: self.call.clone(),
            before: self.before.clone(),
            after: self.after.clone(),
            replacement: None,
            first_only: self.first_only,
            index: 0,
            hit: false,
        })
    }

    fn requires_frames(&self) -> bool {
        true
    }
}

/// Call-site replacement: every call matching a [`CallSignature`] is replaced
/// by a fixed stream, optionally only the first occurrence.
///
/// The replacement observes the call's arguments on the stack and must leave
/// a stack shape compatible with the replaced call's result.
pub struct ReplaceCall {
    call: Arc<CallSignature>,
    replacement: Vec<Instruction>,
    first_only: bool,
}

impl ReplaceCall {
    /// Replace calls matching `call` with `replacement`.
    #[must_use]
    pub fn new(call: CallSignature, replacement: Vec<Instruction>) -> Self {
        ReplaceCall {
            call: Arc::new(call),
            replacement,
            first_only: false,
        }
    }

    /// Replace only the first matching call.
    #[must_use]
    pub fn first_only(mut self) -> Self {
        self.first_only = true;
        self
    }
}

impl MemberTransform for ReplaceCall {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(CallSiteSink {
            downstream,
            call: self.call.clone(),
            before: Vec::new(),
            after: Vec::new(),
            replacement: Some(self.replacement.clone()),
            first_only: self.first_only,
            index: 0,
            hit: false,
        })
    }

    fn requires_frames(&self) -> bool {
        true
    }
}

/// Shared sink of [`InterceptCall`] and [`ReplaceCall`].
struct CallSiteSink {
    downstream: Box<dyn MemberSink>,
    call: Arc<CallSignature>,
    before: Vec<Instruction>,
    after: Vec<Instruction>,
    /// `Some` replaces the call entirely; `None` keeps it, wrapped in advice.
    replacement: Option<Vec<Instruction>>,
    first_only: bool,
    index: usize,
    hit: bool,
}

impl MemberSink for CallSiteSink {
    fn begin(&mut self, decl: &MemberDecl) -> Result<()> {
        self.downstream.begin(decl)
    }

    fn instruction(&mut self, ins: &Instruction) -> Result<()> {
        let index = self.index;
        self.index += 1;

        if let Instruction::Invoke(kind, target) = ins {
            let site = CallSite {
                kind: *kind,
                owner: target.owner.clone(),
                name: target.name.clone(),
                desc: target.desc.clone(),
                index,
            };
            if (!self.first_only || !self.hit) && self.call.matches(&site) {
                self.hit = true;
                if let Some(replacement) = &self.replacement {
                    for replaced in replacement {
                        self.downstream.instruction(replaced)?;
                    }
                } else {
                    for advice in &self.before {
                        self.downstream.instruction(advice)?;
                    }
                    self.downstream.instruction(ins)?;
                    for advice in &self.after {
                        self.downstream.instruction(advice)?;
                    }
                }
                return Ok(());
            }
        }

        self.downstream.instruction(ins)
    }

    fn end(&mut self) -> Result<()> {
        self.downstream.end()
    }
}

/// Uniform constant substitution.
///
/// The mapping applies everywhere a constant appears: inline load operands,
/// the bootstrap constants of dynamically-bound call sites, and data member
/// initial values. It is available both module-scoped (all members plus data
/// members) and member-scoped (one instruction stream).
#[derive(Default, Clone)]
pub struct SubstConstants {
    mapping: HashMap<Constant, Constant>,
}

impl SubstConstants {
    /// Create an empty substitution.
    #[must_use]
    pub fn new() -> Self {
        SubstConstants::default()
    }

    /// Map every occurrence of `from` to `to`.
    #[must_use]
    pub fn map(mut self, from: Constant, to: Constant) -> Self {
        self.mapping.insert(from, to);
        self
    }

    fn lookup(&self, constant: &Constant) -> Constant {
        self.mapping.get(constant).unwrap_or(constant).clone()
    }

    fn rewrite(&self, ins: &Instruction) -> Instruction {
        match ins {
            Instruction::LoadConst(constant) => Instruction::LoadConst(self.lookup(constant)),
            Instruction::InvokeDynamic {
                name,
                desc,
                bootstrap,
            } => Instruction::InvokeDynamic {
                name: name.clone(),
                desc: desc.clone(),
                bootstrap: bootstrap.iter().map(|c| self.lookup(c)).collect(),
            },
            other => other.clone(),
        }
    }

    fn rewrite_data(&self, member: &DataMember) -> DataMember {
        let mut member = member.clone();
        if let Some(constant) = &member.constant {
            member.constant = Some(self.lookup(constant));
        }
        member
    }
}

impl ModuleTransform for SubstConstants {
    fn apply(&self, downstream: Box<dyn ModuleSink>) -> Box<dyn ModuleSink> {
        Box::new(SubstModuleSink {
            downstream,
            subst: self.clone(),
        })
    }
}

impl MemberTransform for SubstConstants {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(SubstMemberSink {
            downstream,
            subst: self.clone(),
        })
    }
}

/// Literal text substitution inside string constants.
///
/// Replaces every occurrence of a substring within every string constant,
/// with the same dual application as [`SubstConstants`]: inline operands,
/// bootstrap constants and data member values.
#[derive(Clone)]
pub struct SubstLiteral {
    find: String,
    replace: String,
}

impl SubstLiteral {
    /// Replace `find` with `replace` inside every string constant.
    #[must_use]
    pub fn new(find: &str, replace: &str) -> Self {
        SubstLiteral {
            find: find.to_string(),
            replace: replace.to_string(),
        }
    }

    fn lookup(&self, constant: &Constant) -> Constant {
        match constant {
            Constant::Str(text) if text.contains(&self.find) => {
                Constant::Str(text.replace(&self.find, &self.replace))
            }
            other => other.clone(),
        }
    }

    fn rewrite(&self, ins: &Instruction) -> Instruction {
        match ins {
            Instruction::LoadConst(constant) => Instruction::LoadConst(self.lookup(constant)),
            Instruction::InvokeDynamic {
                name,
                desc,
                bootstrap,
            } => Instruction::InvokeDynamic {
                name: name.clone(),
                desc: desc.clone(),
                bootstrap: bootstrap.iter().map(|c| self.lookup(c)).collect(),
            },
            other => other.clone(),
        }
    }

    fn rewrite_data(&self, member: &DataMember) -> DataMember {
        let mut member = member.clone();
        if let Some(constant) = &member.constant {
            member.constant = Some(self.lookup(constant));
        }
        member
    }
}

impl ModuleTransform for SubstLiteral {
    fn apply(&self, downstream: Box<dyn ModuleSink>) -> Box<dyn ModuleSink> {
        Box::new(SubstModuleSink {
            downstream,
            subst: self.clone(),
        })
    }
}

impl MemberTransform for SubstLiteral {
    fn apply(&self, downstream: Box<dyn MemberSink>) -> Box<dyn MemberSink> {
        Box::new(SubstMemberSink {
            downstream,
            subst: self.clone(),
        })
    }
}

/// The shared rewrite surface of the two substitution primitives.
trait Substitution {
    fn rewrite(&self, ins: &Instruction) -> Instruction;
    fn rewrite_data(&self, member: &DataMember) -> DataMember;
}

impl Substitution for SubstConstants {
    fn rewrite(&self, ins: &Instruction) -> Instruction {
        SubstConstants::rewrite(self, ins)
    }

    fn rewrite_data(&self, member: &DataMember) -> DataMember {
        SubstConstants::rewrite_data(self, member)
    }
}

impl Substitution for SubstLiteral {
    fn rewrite(&self, ins: &Instruction) -> Instruction {
        SubstLiteral::rewrite(self, ins)
    }

    fn rewrite_data(&self, member: &DataMember) -> DataMember {
        SubstLiteral::rewrite_data(self, member)
    }
}

struct SubstModuleSink<M> {
    downstream: Box<dyn ModuleSink>,
    subst: M,
}

impl<M: Substitution> ModuleSink for SubstModuleSink<M> {
    fn begin(&mut self, header: &ModuleHeader) -> Result<()> {
        self.downstream.begin(header)
    }

    fn data_member(&mut self, member: &DataMember) -> Result<()> {
        self.downstream.data_member(&self.subst.rewrite_data(member))
    }

    fn exec_member(&mut self, decl: &MemberDecl, code: &[Instruction]) -> Result<()> {
        let rewritten: Vec<Instruction> = code.iter().map(|ins| self.subst.rewrite(ins)).collect();
        self.downstream.exec_member(decl, &rewritten)
    }

    fn end(&mut self) -> Result<()> {
        self.downstream.end()
    }
}

struct SubstMemberSink<M> {
    downstream: Box<dyn MemberSink>,
    subst: M,
}

impl<M: Substitution> MemberSink for SubstMemberSink<M> {
    fn begin(&mut self, decl: &MemberDecl) -> Result<()> {
        self.downstream.begin(decl)
    }

    fn instruction(&mut self, ins: &Instruction) -> Result<()> {
        self.downstream.instruction(&self.subst.rewrite(ins))
    }

    fn end(&mut self) -> Result<()> {
        self.downstream.end()
    }
}
