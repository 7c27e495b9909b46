//! Emission sink interfaces.
//!
//! A module image is rewritten by re-emitting its parsed model through a chain
//! of sinks. [`crate::emit_module`] drives the outermost [`ModuleSink`];
//! transforms decorate downstream sinks; the terminal sink is the writer that
//! encodes the final bytes. [`MemberSink`] is the same idea at instruction
//! granularity, used by member-scoped transforms.
//!
//! The emission protocol is fixed: one `begin`, all data members, all
//! executable members, one `end`, in module declaration order.

use crate::module::{DataMember, Instruction, MemberFlags, ModuleFlags};
use crate::Result;

/// Header of the module being emitted.
#[derive(Debug, Clone)]
pub struct ModuleHeader {
    /// Module name
    pub name: String,
    /// Superclass module name, if any
    pub superclass: Option<String>,
    /// Implemented interface module names
    pub interfaces: Vec<String>,
    /// Access flags
    pub flags: ModuleFlags,
}

/// Declaration of one executable member being emitted, without its code.
#[derive(Debug, Clone)]
pub struct MemberDecl {
    /// Member name
    pub name: String,
    /// Method descriptor text
    pub desc: String,
    /// Access flags
    pub flags: MemberFlags,
    /// Recorded operand stack ceiling
    pub max_stack: u16,
    /// Recorded local slot count
    pub max_locals: u16,
}

/// Receives the emission of one module.
pub trait ModuleSink {
    /// Called once before any member, with the module header.
    fn begin(&mut self, header: &ModuleHeader) -> Result<()>;

    /// Called once per data member, in declaration order.
    fn data_member(&mut self, member: &DataMember) -> Result<()>;

    /// Called once per executable member with its full instruction stream.
    fn exec_member(&mut self, decl: &MemberDecl, code: &[Instruction]) -> Result<()>;

    /// Called once after all members.
    fn end(&mut self) -> Result<()>;
}

/// Receives the instruction stream of one executable member.
pub trait MemberSink {
    /// Called once with the member declaration before any instruction.
    fn begin(&mut self, decl: &MemberDecl) -> Result<()>;

    /// Called once per instruction, in stream order.
    fn instruction(&mut self, ins: &Instruction) -> Result<()>;

    /// Called once after the last instruction.
    fn end(&mut self) -> Result<()>;
}

/// Terminal [`MemberSink`] collecting instructions into a shared buffer.
///
/// Member transform chains bottom out here; the owner of the shared buffer
/// reads the rewritten stream back after `end`.
pub struct CollectSink {
    out: std::rc::Rc<std::cell::RefCell<Vec<Instruction>>>,
}

impl CollectSink {
    /// Create a collector writing into `out`.
    #[must_use]
    pub fn new(out: std::rc::Rc<std::cell::RefCell<Vec<Instruction>>>) -> Self {
        CollectSink { out }
    }
}

impl MemberSink for CollectSink {
    fn begin(&mut self, _decl: &MemberDecl) -> Result<()> {
        Ok(())
    }

    fn instruction(&mut self, ins: &Instruction) -> Result<()> {
        self.out.borrow_mut().push(ins.clone());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }
}
