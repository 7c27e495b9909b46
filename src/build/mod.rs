//! Programmatic module construction.
//!
//! The builder produces fully-formed [`crate::CodeModule`]s without an input
//! image: declare the header, data members and methods, assemble each body
//! through the fluent [`InstructionAssembler`], and [`ModuleBuilder::build`]
//! validates the result by encoding and reparsing it. Operand stack ceilings
//! are computed from the assembled code unless a method overrides them, and
//! local slot counts are derived from the highest slot the body touches.
//!
//! This is what the accessor synthesizer emits bridges through, and the
//! natural way to fabricate test subjects.
//!
//! # Examples
//!
//! ```rust
//! use sigweave::{MemberFlags, ModuleBuilder, TypeDesc};
//!
//! let module = ModuleBuilder::new("game/Window")
//!     .public()
//!     .data_member("width", "I", MemberFlags::PRIVATE)?
//!     .method("getWidth", |m| {
//!         m.returns(TypeDesc::Int32).public().body(|asm| {
//!             asm.load_this()?
//!                 .get_field("game/Window", "width", "I")?
//!                 .ret_value()?;
//!             Ok(())
//!         })
//!     })?
//!     .build()?;
//! assert_eq!(module.exec_members.len(), 1);
//! # Ok::<(), sigweave::Error>(())
//! ```

mod assembler;

pub use assembler::InstructionAssembler;

use crate::module::{
    CodeModule, Constant, DataMember, Instruction, MemberFlags, MethodDesc, ModuleFlags, TypeDesc,
};
use crate::Result;

/// Builder for one [`CodeModule`].
pub struct ModuleBuilder {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    flags: ModuleFlags,
    data_members: Vec<DataMember>,
    methods: Vec<PendingMethod>,
}

struct PendingMethod {
    name: String,
    params: Vec<TypeDesc>,
    ret: TypeDesc,
    flags: MemberFlags,
    max_stack: Option<u16>,
    code: Vec<Instruction>,
}

impl ModuleBuilder {
    /// Start a module with the given name and empty flags.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ModuleBuilder {
            name: name.to_string(),
            superclass: None,
            interfaces: Vec::new(),
            flags: ModuleFlags::empty(),
            data_members: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Set the superclass module name.
    #[must_use]
    pub fn superclass(mut self, name: &str) -> Self {
        self.superclass = Some(name.to_string());
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn interface(mut self, name: &str) -> Self {
        self.interfaces.push(name.to_string());
        self
    }

    /// Set module flag bits.
    #[must_use]
    pub fn flags(mut self, flags: ModuleFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Mark the module public.
    #[must_use]
    pub fn public(self) -> Self {
        self.flags(ModuleFlags::PUBLIC)
    }

    /// Add a data member without an initial value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn data_member(mut self, name: &str, desc: &str, flags: MemberFlags) -> Result<Self> {
        self.data_members.push(DataMember::new(name, desc, flags, None)?);
        Ok(self)
    }

    /// Add a data member with a constant initial value.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an invalid descriptor.
    pub fn constant_member(
        mut self,
        name: &str,
        desc: &str,
        flags: MemberFlags,
        value: Constant,
    ) -> Result<Self> {
        self.data_members
            .push(DataMember::new(name, desc, flags, Some(value))?);
        Ok(self)
    }

    /// Add an executable member, configured through `configure`.
    ///
    /// # Errors
    /// Propagates whatever the configuration closure reports.
    pub fn method(
        mut self,
        name: &str,
        configure: impl FnOnce(MethodBuilder) -> Result<MethodBuilder>,
    ) -> Result<Self> {
        let method = configure(MethodBuilder::new(name))?;
        self.methods.push(method.finish());
        Ok(self)
    }

    /// Assemble, encode and reparse the module.
    ///
    /// The encode/reparse round trip is deliberate: it canonicalizes label
    /// numbering and applies every structural check the wire format enforces,
    /// so a built module is indistinguishable from a loaded one.
    ///
    /// # Errors
    /// Returns [`crate::Error::Emission`] for inconsistent bodies (operand
    /// underflow, unplaced labels) and [`crate::Error::Malformed`] for
    /// invalid descriptors.
    pub fn build(self) -> Result<CodeModule> {
        let mut exec_members = Vec::with_capacity(self.methods.len());
        for method in self.methods {
            let desc = MethodDesc::new(method.params, method.ret).to_string();
            let max_stack = match method.max_stack {
                Some(ceiling) => ceiling,
                None => crate::format::writer::compute_max_stack(&method.code)?,
            };
            let max_locals = method
                .code
                .iter()
                .filter_map(|ins| match ins {
                    Instruction::LoadLocal(i) | Instruction::StoreLocal(i) => Some(i + 1),
                    _ => None,
                })
                .max()
                .unwrap_or(0);
            exec_members.push(crate::module::ExecutableMember::new(
                &method.name,
                &desc,
                method.flags,
                max_stack,
                max_locals,
                method.code,
            )?);
        }

        let module = CodeModule::new(
            &self.name,
            self.superclass,
            self.interfaces,
            self.flags,
            exec_members,
            self.data_members,
        );
        let bytes = crate::format::write_module(&module)?;
        crate::format::parse_module(&bytes)
    }
}

/// Builder for one executable member inside a [`ModuleBuilder`].
pub struct MethodBuilder {
    inner: PendingMethod,
}

impl MethodBuilder {
    fn new(name: &str) -> Self {
        MethodBuilder {
            inner: PendingMethod {
                name: name.to_string(),
                params: Vec::new(),
                ret: TypeDesc::Void,
                flags: MemberFlags::empty(),
                max_stack: None,
                code: Vec::new(),
            },
        }
    }

    /// Append one parameter type.
    #[must_use]
    pub fn param(mut self, ty: TypeDesc) -> Self {
        self.inner.params.push(ty);
        self
    }

    /// Set the return type; defaults to void.
    #[must_use]
    pub fn returns(mut self, ty: TypeDesc) -> Self {
        self.inner.ret = ty;
        self
    }

    /// Set member flag bits.
    #[must_use]
    pub fn flags(mut self, flags: MemberFlags) -> Self {
        self.inner.flags |= flags;
        self
    }

    /// Mark the member public.
    #[must_use]
    pub fn public(self) -> Self {
        self.flags(MemberFlags::PUBLIC)
    }

    /// Mark the member static.
    #[must_use]
    pub fn static_member(self) -> Self {
        self.flags(MemberFlags::STATIC)
    }

    /// Override the computed operand stack ceiling.
    #[must_use]
    pub fn max_stack(mut self, ceiling: u16) -> Self {
        self.inner.max_stack = Some(ceiling);
        self
    }

    /// Assemble the body.
    ///
    /// # Errors
    /// Propagates whatever the assembly closure reports.
    pub fn body(
        mut self,
        assemble: impl FnOnce(&mut InstructionAssembler) -> Result<()>,
    ) -> Result<Self> {
        let mut asm = InstructionAssembler::new();
        assemble(&mut asm)?;
        self.inner.code = asm.into_code();
        Ok(self)
    }

    fn finish(self) -> PendingMethod {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Label;

    #[test]
    fn builds_a_parseable_module() {
        let module = ModuleBuilder::new("game/Counter")
            .public()
            .superclass("game/Object")
            .data_member("count", "I", MemberFlags::PRIVATE)
            .unwrap()
            .method("get", |m| {
                m.returns(TypeDesc::Int32).public().body(|asm| {
                    asm.load_this()?
                        .get_field("game/Counter", "count", "I")?
                        .ret_value()?;
                    Ok(())
                })
            })
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(module.name, "game/Counter");
        assert_eq!(module.superclass.as_deref(), Some("game/Object"));
        let get = module.exec_member("get").unwrap();
        assert_eq!(get.desc, "()I");
        assert_eq!(get.max_stack, 1);
        assert!(get.flags.is_public());
    }

    #[test]
    fn stack_ceiling_and_locals_are_derived() {
        let module = ModuleBuilder::new("game/Swap")
            .method("swap", |m| {
                m.param(TypeDesc::AnyRef).public().body(|asm| {
                    asm.load_arg(0)?
                        .store_local(2)?
                        .load_local(2)?
                        .dup()?
                        .pop()?
                        .pop()?
                        .ret()?;
                    Ok(())
                })
            })
            .unwrap()
            .build()
            .unwrap();

        let swap = module.exec_member("swap").unwrap();
        assert_eq!(swap.max_stack, 2);
        assert_eq!(swap.max_locals, 3);
    }

    #[test]
    fn branch_targets_survive_the_round_trip() {
        let module = ModuleBuilder::new("game/Guard")
            .method("orDefault", |m| {
                m.param(TypeDesc::Str).returns(TypeDesc::Str).public().body(|asm| {
                    let fallback = asm.new_label();
                    asm.load_arg(0)?
                        .branch_null(fallback)?
                        .load_arg(0)?
                        .ret_value()?
                        .mark(fallback)?
                        .load_str("default")?
                        .ret_value()?;
                    Ok(())
                })
            })
            .unwrap()
            .build()
            .unwrap();

        let code = &module.exec_member("orDefault").unwrap().code;
        let Instruction::BranchNull(target) = &code[1] else {
            panic!("expected a null branch");
        };
        assert!(code.contains(&Instruction::Mark(Label(target.0))));
    }

    #[test]
    fn underflowing_body_fails_the_build() {
        let result = ModuleBuilder::new("game/Broken").method("pop", |m| {
            m.public().body(|asm| {
                asm.pop()?.ret()?;
                Ok(())
            })
        });
        assert!(matches!(
            result.unwrap().build(),
            Err(crate::Error::Emission(_))
        ));
    }
}
