//! Symbolic instruction stream model.
//!
//! Executable members carry their code as a stream of [`Instruction`] values
//! rather than raw bytes. Branch targets are symbolic [`Label`]s: the reader
//! lifts encoded instruction indices into labels when decoding, and the writer
//! resolves them back when encoding. Transforms can therefore insert and remove
//! instructions without invalidating branch targets.
//!
//! [`Instruction::Mark`] is a pseudo-instruction: it defines a label position
//! in the stream and encodes to nothing.

use strum::Display;

use crate::module::Constant;

/// Symbolic branch target inside one member's instruction stream.
///
/// Labels are plain identifiers scoped to a single instruction stream; they
/// carry no position of their own. A label's position is wherever the
/// corresponding [`Instruction::Mark`] sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// How a call-site dispatches to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum InvokeKind {
    /// Dispatch through the receiver's runtime type
    Virtual,
    /// Dispatch to a static member, no receiver
    Static,
    /// Direct dispatch bypassing overrides (constructors, super calls)
    Special,
    /// Dispatch through an interface reference
    Interface,
}

/// What a captured reflective handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum HandleKind {
    /// Invoke an instance executable member
    Method,
    /// Invoke a static executable member
    StaticMethod,
    /// Read an instance data member
    FieldGet,
    /// Write an instance data member
    FieldSet,
    /// Read a static data member
    StaticFieldGet,
    /// Write a static data member
    StaticFieldSet,
}

/// A symbolic member reference: owner module, member name, descriptor text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberRef {
    /// Owning module name
    pub owner: String,
    /// Member name
    pub name: String,
    /// Type or method descriptor text
    pub desc: String,
}

impl MemberRef {
    /// Create a member reference from string parts.
    #[must_use]
    pub fn new(owner: &str, name: &str, desc: &str) -> Self {
        MemberRef {
            owner: owner.to_string(),
            name: name.to_string(),
            desc: desc.to_string(),
        }
    }
}

/// One decoded instruction.
///
/// The opcode set is deliberately small: loads and stores, field and call
/// dispatch, the reflective-handle quartet used by synthesized accessors, and
/// structured control flow via symbolic labels.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// No operation
    Nop,
    /// Push a constant
    LoadConst(Constant),
    /// Push the null reference
    LoadNull,
    /// Push the receiver of an instance member
    LoadThis,
    /// Push argument `n` (zero-based, receiver excluded)
    LoadArg(u16),
    /// Push local slot `n`
    LoadLocal(u16),
    /// Pop into local slot `n`
    StoreLocal(u16),
    /// Duplicate the top of stack
    Dup,
    /// Discard the top of stack
    Pop,
    /// Push an instance field value; pops the receiver
    GetField(MemberRef),
    /// Pop a value and a receiver, store into an instance field
    PutField(MemberRef),
    /// Push a static field value
    GetStatic(MemberRef),
    /// Pop a value, store into a static field
    PutStatic(MemberRef),
    /// Call a member; pops arguments (and receiver unless static), pushes the
    /// result for non-void targets
    Invoke(InvokeKind, MemberRef),
    /// Call through a dynamically-bound site carrying bootstrap constants
    InvokeDynamic {
        /// Site name
        name: String,
        /// Method descriptor of the site
        desc: String,
        /// Bootstrap constants bound to the site
        bootstrap: Vec<Constant>,
    },
    /// Allocate an instance of the named module; pushes the reference
    New(String),
    /// Pop `n` values, push a boxed argument array
    PackArgs(u16),
    /// Push a reflective handle for the referenced member
    ResolveHandle(HandleKind, MemberRef),
    /// Pop argument array, receiver (null for static targets) and handle;
    /// invoke reflectively, push the boxed result (null for void targets)
    InvokeHandle,
    /// Pop a reference, push whether it is an instance of the named module
    IsInstance(String),
    /// Pop a value, push it narrowed to the named type (unboxing primitives)
    CastTo(String),
    /// Unconditional branch
    Jump(Label),
    /// Pop a condition, branch when it is false
    Branch(Label),
    /// Pop a reference, branch when it is null
    BranchNull(Label),
    /// Return with no value
    Return,
    /// Pop and return the top of stack
    ReturnValue,
    /// Pop and raise the top of stack
    Throw,
    /// Pseudo-instruction defining a label position; encodes to nothing
    Mark(Label),
}

impl Instruction {
    /// Whether this instruction ends an execution path (the injection points
    /// of exit-time transforms).
    #[must_use]
    pub fn is_exit(&self) -> bool {
        matches!(
            self,
            Instruction::Return | Instruction::ReturnValue | Instruction::Throw
        )
    }

    /// Whether this is a [`Instruction::Mark`] pseudo-instruction.
    #[must_use]
    pub fn is_mark(&self) -> bool {
        matches!(self, Instruction::Mark(_))
    }
}
