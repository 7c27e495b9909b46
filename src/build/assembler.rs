//! The fluent instruction assembler.

use std::collections::HashSet;

use crate::module::{Constant, HandleKind, Instruction, InvokeKind, Label, MemberRef};
use crate::Result;

/// Fluent builder of one instruction stream.
///
/// Every emitting method returns `Result<&mut Self>` so streams chain with
/// `?`; labels come from [`Self::new_label`] and are placed with
/// [`Self::mark`].
///
/// # Examples
///
/// ```rust
/// use sigweave::{Constant, InstructionAssembler};
///
/// let mut asm = InstructionAssembler::new();
/// let done = asm.new_label();
/// asm.load_arg(0)?
///     .branch_null(done)?
///     .load_arg(0)?
///     .ret_value()?
///     .mark(done)?
///     .load_const(Constant::str("fallback"))?
///     .ret_value()?;
/// assert_eq!(asm.into_code().len(), 7);
/// # Ok::<(), sigweave::Error>(())
/// ```
#[derive(Default)]
pub struct InstructionAssembler {
    code: Vec<Instruction>,
    next_label: u32,
    marked: HashSet<Label>,
}

impl InstructionAssembler {
    /// Create an empty assembler.
    #[must_use]
    pub fn new() -> Self {
        InstructionAssembler::default()
    }

    /// Allocate a fresh, unplaced label.
    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Place `label` at the current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::Emission`] if the label was already placed.
    pub fn mark(&mut self, label: Label) -> Result<&mut Self> {
        if !self.marked.insert(label) {
            return Err(emission_error!("Label {} marked twice", label.0));
        }
        self.code.push(Instruction::Mark(label));
        Ok(self)
    }

    fn emit(&mut self, ins: Instruction) -> Result<&mut Self> {
        self.code.push(ins);
        Ok(self)
    }

    /// Emit a no-op.
    pub fn nop(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::Nop)
    }

    /// Push a constant.
    pub fn load_const(&mut self, constant: Constant) -> Result<&mut Self> {
        self.emit(Instruction::LoadConst(constant))
    }

    /// Push an integer constant.
    pub fn load_int(&mut self, value: i64) -> Result<&mut Self> {
        self.load_const(Constant::Int(value))
    }

    /// Push a floating-point constant.
    pub fn load_float(&mut self, value: f64) -> Result<&mut Self> {
        self.load_const(Constant::Float(value))
    }

    /// Push a string constant.
    pub fn load_str(&mut self, text: &str) -> Result<&mut Self> {
        self.load_const(Constant::str(text))
    }

    /// Push the null reference.
    pub fn load_null(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::LoadNull)
    }

    /// Push the receiver.
    pub fn load_this(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::LoadThis)
    }

    /// Push the argument at `index`.
    pub fn load_arg(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Instruction::LoadArg(index))
    }

    /// Push the local at `index`.
    pub fn load_local(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Instruction::LoadLocal(index))
    }

    /// Pop into the local at `index`.
    pub fn store_local(&mut self, index: u16) -> Result<&mut Self> {
        self.emit(Instruction::StoreLocal(index))
    }

    /// Duplicate the top of stack.
    pub fn dup(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::Dup)
    }

    /// Discard the top of stack.
    pub fn pop(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::Pop)
    }

    /// Read an instance data member.
    pub fn get_field(&mut self, owner: &str, name: &str, desc: &str) -> Result<&mut Self> {
        self.emit(Instruction::GetField(MemberRef::new(owner, name, desc)))
    }

    /// Write an instance data member.
    pub fn put_field(&mut self, owner: &str, name: &str, desc: &str) -> Result<&mut Self> {
        self.emit(Instruction::PutField(MemberRef::new(owner, name, desc)))
    }

    /// Read a static data member.
    pub fn get_static(&mut self, owner: &str, name: &str, desc: &str) -> Result<&mut Self> {
        self.emit(Instruction::GetStatic(MemberRef::new(owner, name, desc)))
    }

    /// Write a static data member.
    pub fn put_static(&mut self, owner: &str, name: &str, desc: &str) -> Result<&mut Self> {
        self.emit(Instruction::PutStatic(MemberRef::new(owner, name, desc)))
    }

    /// Call an executable member.
    pub fn invoke(
        &mut self,
        kind: InvokeKind,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<&mut Self> {
        self.emit(Instruction::Invoke(kind, MemberRef::new(owner, name, desc)))
    }

    /// Emit a dynamically-bound call site.
    pub fn invoke_dynamic(
        &mut self,
        name: &str,
        desc: &str,
        bootstrap: Vec<Constant>,
    ) -> Result<&mut Self> {
        self.emit(Instruction::InvokeDynamic {
            name: name.to_string(),
            desc: desc.to_string(),
            bootstrap,
        })
    }

    /// Allocate an instance of the named module.
    pub fn new_object(&mut self, module: &str) -> Result<&mut Self> {
        self.emit(Instruction::New(module.to_string()))
    }

    /// Pack the top `count` values into an argument array.
    pub fn pack_args(&mut self, count: u16) -> Result<&mut Self> {
        self.emit(Instruction::PackArgs(count))
    }

    /// Push a reflective handle to the named member.
    pub fn resolve_handle(
        &mut self,
        kind: HandleKind,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Result<&mut Self> {
        self.emit(Instruction::ResolveHandle(
            kind,
            MemberRef::new(owner, name, desc),
        ))
    }

    /// Invoke a reflective handle against a receiver and packed arguments.
    pub fn invoke_handle(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::InvokeHandle)
    }

    /// Test whether the top of stack is an instance of the named module.
    pub fn is_instance(&mut self, module: &str) -> Result<&mut Self> {
        self.emit(Instruction::IsInstance(module.to_string()))
    }

    /// Checked-cast the top of stack to the named module.
    pub fn cast_to(&mut self, module: &str) -> Result<&mut Self> {
        self.emit(Instruction::CastTo(module.to_string()))
    }

    /// Jump unconditionally.
    pub fn jump(&mut self, label: Label) -> Result<&mut Self> {
        self.emit(Instruction::Jump(label))
    }

    /// Branch when the popped value is truthy.
    pub fn branch(&mut self, label: Label) -> Result<&mut Self> {
        self.emit(Instruction::Branch(label))
    }

    /// Branch when the popped reference is null.
    pub fn branch_null(&mut self, label: Label) -> Result<&mut Self> {
        self.emit(Instruction::BranchNull(label))
    }

    /// Return without a value.
    pub fn ret(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::Return)
    }

    /// Return the top of stack.
    pub fn ret_value(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::ReturnValue)
    }

    /// Raise the reference on top of stack.
    pub fn throw(&mut self) -> Result<&mut Self> {
        self.emit(Instruction::Throw)
    }

    /// Finish, yielding the assembled stream.
    #[must_use]
    pub fn into_code(self) -> Vec<Instruction> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chains_with_question_mark() -> Result<()> {
        let mut asm = InstructionAssembler::new();
        asm.load_this()?
            .get_field("game/Window", "width", "I")?
            .ret_value()?;
        assert_eq!(
            asm.into_code(),
            vec![
                Instruction::LoadThis,
                Instruction::GetField(MemberRef::new("game/Window", "width", "I")),
                Instruction::ReturnValue,
            ]
        );
        Ok(())
    }

    #[test]
    fn labels_are_distinct_and_single_use() {
        let mut asm = InstructionAssembler::new();
        let a = asm.new_label();
        let b = asm.new_label();
        assert_ne!(a, b);
        asm.mark(a).unwrap();
        assert!(matches!(asm.mark(a), Err(crate::Error::Emission(_))));
    }
}
