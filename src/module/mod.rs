//! In-memory model of one compiled code module.
//!
//! This module provides the data model the whole engine operates on: a
//! [`CodeModule`] with its ordered [`ExecutableMember`]s and [`DataMember`]s,
//! the [`CallSite`]s derived from invoke instructions, and the aggregated
//! constant set built from all members.
//!
//! # Architecture
//!
//! A `CodeModule` is rebuilt fresh from raw bytes on every load or
//! redefinition event delivered by the host runtime. It is never mutated in
//! place and never shared across events; rewriting happens by re-emitting the
//! parsed model through a transform chain into the writer, not by patching the
//! model. Signatures evaluate against this model, finders bind to it, and the
//! accessor synthesizer reads the resolved module's member lists to plan
//! bridge generation.
//!
//! # Key Components
//!
//! - [`CodeModule`] - one compiled unit with members and aggregated constants
//! - [`ExecutableMember`] - a method-like member with an instruction stream
//! - [`DataMember`] - a field-like member with an optional constant value
//! - [`CallSite`] - one invoke instruction positioned inside a member
//! - [`Constant`] - literal values, hashable for set and map use
//! - [`TypeDesc`] / [`MethodDesc`] - descriptor grammar
//! - [`ModuleFlags`] / [`MemberFlags`] - access flag bit sets
//! - [`Instruction`] - the symbolic opcode set
//!
//! # Examples
//!
//! ```rust
//! use sigweave::{Constant, ModuleBuilder, TypeDesc};
//!
//! let module = ModuleBuilder::new("game/Window")
//!     .method("getWindowTitle", |m| {
//!         m.public().returns(TypeDesc::Str).body(|asm| {
//!             asm.load_str("Lunar Client (")?.ret_value()?;
//!             Ok(())
//!         })
//!     })?
//!     .build()?;
//!
//! assert!(module.has_constant(&Constant::str("Lunar Client (")));
//! assert!(module.exec_member("getWindowTitle").is_some());
//! # Ok::<(), sigweave::Error>(())
//! ```

mod constant;
mod descriptor;
mod flags;
mod instruction;

pub use constant::Constant;
pub use descriptor::{MethodDesc, TypeDesc};
pub use flags::{MemberFlags, ModuleFlags};
pub use instruction::{HandleKind, Instruction, InvokeKind, Label, MemberRef};

use crate::Result;

/// One invoke instruction, positioned inside exactly one executable member.
///
/// Call-sites are derived from the instruction stream on demand; they are a
/// read view for signature matching, not stored state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// How the call dispatches
    pub kind: InvokeKind,
    /// Referenced owner module name
    pub owner: String,
    /// Referenced member name
    pub name: String,
    /// Referenced method descriptor
    pub desc: String,
    /// Index of the invoke instruction inside the owning member's stream
    pub index: usize,
}

/// A method-like member owning an instruction stream.
#[derive(Debug, Clone)]
pub struct ExecutableMember {
    /// Member name
    pub name: String,
    /// Raw method descriptor text
    pub desc: String,
    /// Parsed form of [`Self::desc`]
    pub signature: MethodDesc,
    /// Access flags
    pub flags: MemberFlags,
    /// Recorded operand stack ceiling
    pub max_stack: u16,
    /// Recorded local slot count
    pub max_locals: u16,
    /// The symbolic instruction stream
    pub code: Vec<Instruction>,
}

impl ExecutableMember {
    /// Create a member, parsing and validating its descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `desc` is not a valid method
    /// descriptor.
    pub fn new(
        name: &str,
        desc: &str,
        flags: MemberFlags,
        max_stack: u16,
        max_locals: u16,
        code: Vec<Instruction>,
    ) -> Result<Self> {
        Ok(ExecutableMember {
            name: name.to_string(),
            desc: desc.to_string(),
            signature: MethodDesc::parse(desc)?,
            flags,
            max_stack,
            max_locals,
            code,
        })
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.signature.arity()
    }

    /// Call-sites of this member, one per invoke instruction, in stream order.
    pub fn call_sites(&self) -> impl Iterator<Item = CallSite> + '_ {
        self.code
            .iter()
            .enumerate()
            .filter_map(|(index, ins)| match ins {
                Instruction::Invoke(kind, target) => Some(CallSite {
                    kind: *kind,
                    owner: target.owner.clone(),
                    name: target.name.clone(),
                    desc: target.desc.clone(),
                    index,
                }),
                _ => None,
            })
    }

    /// Constants referenced by this member: inline load operands and the
    /// bootstrap constants of dynamically-bound call sites, in stream order.
    pub fn constants(&self) -> impl Iterator<Item = &Constant> + '_ {
        self.code.iter().flat_map(|ins| -> &[Constant] {
            match ins {
                Instruction::LoadConst(constant) => std::slice::from_ref(constant),
                Instruction::InvokeDynamic { bootstrap, .. } => bootstrap.as_slice(),
                _ => &[],
            }
        })
    }
}

/// A field-like member holding a value.
#[derive(Debug, Clone)]
pub struct DataMember {
    /// Member name
    pub name: String,
    /// Raw type descriptor text
    pub desc: String,
    /// Parsed form of [`Self::desc`]
    pub ty: TypeDesc,
    /// Access flags
    pub flags: MemberFlags,
    /// Constant initial value, if any
    pub constant: Option<Constant>,
}

impl DataMember {
    /// Create a member, parsing and validating its descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `desc` is not a valid type
    /// descriptor.
    pub fn new(
        name: &str,
        desc: &str,
        flags: MemberFlags,
        constant: Option<Constant>,
    ) -> Result<Self> {
        Ok(DataMember {
            name: name.to_string(),
            desc: desc.to_string(),
            ty: TypeDesc::parse(desc)?,
            flags,
            constant,
        })
    }
}

/// One compiled unit: a class-equivalent with members and constants.
///
/// Built fresh from raw bytes per load event (see [`crate::parse_module`]) or
/// assembled through [`crate::ModuleBuilder`]. The aggregated constant set is
/// computed at construction and deduplicated in first-appearance order.
#[derive(Debug, Clone)]
pub struct CodeModule {
    /// Module name (its identity across load events)
    pub name: String,
    /// Superclass module name, if any
    pub superclass: Option<String>,
    /// Implemented interface module names
    pub interfaces: Vec<String>,
    /// Access flags
    pub flags: ModuleFlags,
    /// Executable members in declaration order
    pub exec_members: Vec<ExecutableMember>,
    /// Data members in declaration order
    pub data_members: Vec<DataMember>,
    /// Aggregated constant set: inline load operands, dynamically-bound
    /// bootstrap constants, and data member initial values, deduplicated
    pub constants: Vec<Constant>,
}

impl CodeModule {
    /// Assemble a module from parts, computing the aggregated constant set.
    #[must_use]
    pub fn new(
        name: &str,
        superclass: Option<String>,
        interfaces: Vec<String>,
        flags: ModuleFlags,
        exec_members: Vec<ExecutableMember>,
        data_members: Vec<DataMember>,
    ) -> Self {
        let constants = aggregate_constants(&exec_members, &data_members);
        CodeModule {
            name: name.to_string(),
            superclass,
            interfaces,
            flags,
            exec_members,
            data_members,
            constants,
        }
    }

    /// First executable member with the given name, in declaration order.
    #[must_use]
    pub fn exec_member(&self, name: &str) -> Option<&ExecutableMember> {
        self.exec_members.iter().find(|m| m.name == name)
    }

    /// First data member with the given name, in declaration order.
    #[must_use]
    pub fn data_member(&self, name: &str) -> Option<&DataMember> {
        self.data_members.iter().find(|m| m.name == name)
    }

    /// Whether the aggregated constant set contains `constant`.
    #[must_use]
    pub fn has_constant(&self, constant: &Constant) -> bool {
        self.constants.contains(constant)
    }

    /// Whether any string constant contains `needle` as a substring.
    #[must_use]
    pub fn has_string_containing(&self, needle: &str) -> bool {
        self.constants
            .iter()
            .any(|c| c.as_str().is_some_and(|s| s.contains(needle)))
    }

    /// All call-sites of all executable members, in declaration order.
    pub fn call_sites(&self) -> impl Iterator<Item = CallSite> + '_ {
        self.exec_members.iter().flat_map(ExecutableMember::call_sites)
    }
}

fn aggregate_constants(
    exec_members: &[ExecutableMember],
    data_members: &[DataMember],
) -> Vec<Constant> {
    let mut seen = std::collections::HashSet::new();
    let mut constants = Vec::new();

    for member in exec_members {
        for constant in member.constants() {
            if seen.insert(constant.clone()) {
                constants.push(constant.clone());
            }
        }
    }
    for member in data_members {
        if let Some(constant) = &member.constant {
            if seen.insert(constant.clone()) {
                constants.push(constant.clone());
            }
        }
    }

    constants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_module() -> CodeModule {
        let title = ExecutableMember::new(
            "getWindowTitle",
            "()S",
            MemberFlags::PUBLIC,
            1,
            0,
            vec![
                Instruction::LoadConst(Constant::str("Lunar Client (")),
                Instruction::Invoke(
                    InvokeKind::Static,
                    MemberRef::new("game/Version", "current", "()S"),
                ),
                Instruction::ReturnValue,
            ],
        )
        .unwrap();
        let width = DataMember::new(
            "width",
            "I",
            MemberFlags::PRIVATE,
            Some(Constant::Int(854)),
        )
        .unwrap();
        CodeModule::new(
            "game/Window",
            Some("game/Surface".to_string()),
            vec!["game/Resizable".to_string()],
            ModuleFlags::PUBLIC,
            vec![title],
            vec![width],
        )
    }

    #[test]
    fn aggregates_constants_from_all_sources() {
        let module = window_module();
        assert!(module.has_constant(&Constant::str("Lunar Client (")));
        assert!(module.has_constant(&Constant::Int(854)));
        assert!(!module.has_constant(&Constant::Int(855)));
        assert!(module.has_string_containing("Lunar"));
    }

    #[test]
    fn derives_call_sites_with_positions() {
        let module = window_module();
        let sites: Vec<_> = module.call_sites().collect();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].owner, "game/Version");
        assert_eq!(sites[0].index, 1);
        assert_eq!(sites[0].kind, InvokeKind::Static);
    }

    #[test]
    fn member_lookup_is_declaration_ordered() {
        let module = window_module();
        assert!(module.exec_member("getWindowTitle").is_some());
        assert!(module.exec_member("width").is_none());
        assert!(module.data_member("width").is_some());
    }
}
