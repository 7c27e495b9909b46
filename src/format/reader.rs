//! Decoding of SWM module images into the [`crate::CodeModule`] model.
//!
//! The reader has two jobs. [`parse_module`] rebuilds a fresh model from raw
//! bytes, exactly once per load event. [`emit_module`] drives any
//! [`ModuleSink`] from a parsed model, which is how transform chains observe a
//! module's emission.
//!
//! Branch targets are stored as instruction indices on the wire; the reader
//! lifts them to symbolic [`crate::Label`]s by inserting
//! [`crate::Instruction::Mark`] pseudo-instructions at every target, so
//! transforms can splice code without breaking control flow.

use std::collections::BTreeSet;

use crate::format::op;
use crate::format::parser::Parser;
use crate::module::{
    CodeModule, Constant, DataMember, ExecutableMember, Instruction, Label, MemberFlags,
    MemberRef, ModuleFlags,
};
use crate::transform::{MemberDecl, ModuleHeader, ModuleSink};
use crate::Result;

/// Magic bytes opening every SWM image.
pub const SWM_MAGIC: &[u8; 4] = b"SWM1";

/// The single container version this library reads and writes.
pub const SWM_VERSION: u16 = 1;

/// One entry of a decoded constant pool.
#[derive(Debug, Clone)]
enum PoolEntry {
    Utf8(String),
    Int(i64),
    Float(f64),
    Str(u16),
}

/// Decoded constant pool, indexed from 1. Index 0 means "none".
struct ConstantPool {
    entries: Vec<PoolEntry>,
}

impl ConstantPool {
    fn parse(parser: &mut Parser) -> Result<Self> {
        let count = parser.read_le::<u16>()? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let tag = parser.read_le::<u8>()?;
            entries.push(match tag {
                0x01 => PoolEntry::Utf8(parser.read_utf8()?),
                0x02 => PoolEntry::Int(parser.read_le::<i64>()?),
                0x03 => PoolEntry::Float(parser.read_f64()?),
                0x04 => PoolEntry::Str(parser.read_le::<u16>()?),
                _ => return Err(malformed_error!("Unknown constant pool tag - {:#x}", tag)),
            });
        }
        Ok(ConstantPool { entries })
    }

    fn entry(&self, index: u16) -> Result<&PoolEntry> {
        if index == 0 || index as usize > self.entries.len() {
            return Err(malformed_error!(
                "Constant pool index {} out of range (1..={})",
                index,
                self.entries.len()
            ));
        }
        Ok(&self.entries[index as usize - 1])
    }

    fn utf8(&self, index: u16) -> Result<&str> {
        match self.entry(index)? {
            PoolEntry::Utf8(text) => Ok(text),
            _ => Err(malformed_error!(
                "Constant pool index {} is not a Utf8 entry",
                index
            )),
        }
    }

    fn constant(&self, index: u16) -> Result<Constant> {
        match self.entry(index)? {
            PoolEntry::Int(value) => Ok(Constant::Int(*value)),
            PoolEntry::Float(value) => Ok(Constant::Float(*value)),
            PoolEntry::Str(utf8) => Ok(Constant::Str(self.utf8(*utf8)?.to_string())),
            PoolEntry::Utf8(_) => Err(malformed_error!(
                "Constant pool index {} is a bare Utf8 entry, not a loadable constant",
                index
            )),
        }
    }
}

/// Parse a raw SWM image into a fresh [`CodeModule`].
///
/// Every load or redefinition event goes through here exactly once; the
/// returned model owns all of its data and shares nothing with the input
/// buffer or with models from other events.
///
/// # Errors
/// Returns [`crate::Error::Empty`] for empty input,
/// [`crate::Error::NotSupported`] for foreign magic or versions, and
/// [`crate::Error::Malformed`] / [`crate::Error::OutOfBounds`] for damaged
/// images.
pub fn parse_module(data: &[u8]) -> Result<CodeModule> {
    if data.is_empty() {
        return Err(crate::Error::Empty);
    }

    let mut parser = Parser::new(data);
    if parser.read_bytes(4)? != SWM_MAGIC {
        return Err(crate::Error::NotSupported);
    }
    let version = parser.read_le::<u16>()?;
    if version != SWM_VERSION {
        return Err(crate::Error::NotSupported);
    }

    let flags = ModuleFlags::from_bits_truncate(parser.read_le::<u32>()?);
    let pool = ConstantPool::parse(&mut parser)?;

    let name = pool.utf8(parser.read_le::<u16>()?)?.to_string();
    let superclass = match parser.read_le::<u16>()? {
        0 => None,
        index => Some(pool.utf8(index)?.to_string()),
    };

    let interface_count = parser.read_le::<u16>()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.utf8(parser.read_le::<u16>()?)?.to_string());
    }

    let data_count = parser.read_le::<u16>()?;
    let mut data_members = Vec::with_capacity(data_count as usize);
    for _ in 0..data_count {
        let member_flags = MemberFlags::from_bits_truncate(parser.read_le::<u32>()?);
        let member_name = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        let member_desc = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        let constant = match parser.read_le::<u16>()? {
            0 => None,
            index => Some(pool.constant(index)?),
        };
        data_members.push(DataMember::new(
            &member_name,
            &member_desc,
            member_flags,
            constant,
        )?);
    }

    let exec_count = parser.read_le::<u16>()?;
    let mut exec_members = Vec::with_capacity(exec_count as usize);
    for _ in 0..exec_count {
        let member_flags = MemberFlags::from_bits_truncate(parser.read_le::<u32>()?);
        let member_name = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        let member_desc = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        let max_stack = parser.read_le::<u16>()?;
        let max_locals = parser.read_le::<u16>()?;
        let code_len = parser.read_le::<u32>()? as usize;

        let code_end = parser.pos() + code_len;
        if code_end > parser.len() {
            return Err(crate::Error::OutOfBounds);
        }

        let mut raw_code = Vec::new();
        while parser.pos() < code_end {
            raw_code.push(decode_instruction(&mut parser, &pool)?);
        }
        if parser.pos() != code_end {
            return Err(malformed_error!(
                "Instruction stream of '{}' overruns its declared length",
                member_name
            ));
        }

        exec_members.push(ExecutableMember::new(
            &member_name,
            &member_desc,
            member_flags,
            max_stack,
            max_locals,
            lift_labels(raw_code, &member_name)?,
        )?);
    }

    Ok(CodeModule::new(
        &name,
        superclass,
        interfaces,
        flags,
        exec_members,
        data_members,
    ))
}

/// Decode one instruction. Branch targets stay raw instruction indices,
/// carried in the `Label` payload until [`lift_labels`] rewrites them.
fn decode_instruction(parser: &mut Parser, pool: &ConstantPool) -> Result<Instruction> {
    let read_ref = |parser: &mut Parser| -> Result<MemberRef> {
        let owner = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        let name = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        let desc = pool.utf8(parser.read_le::<u16>()?)?.to_string();
        Ok(MemberRef { owner, name, desc })
    };

    let opcode = parser.read_le::<u8>()?;
    Ok(match opcode {
        op::NOP => Instruction::Nop,
        op::LOAD_CONST => Instruction::LoadConst(pool.constant(parser.read_le::<u16>()?)?),
        op::LOAD_NULL => Instruction::LoadNull,
        op::LOAD_THIS => Instruction::LoadThis,
        op::LOAD_ARG => Instruction::LoadArg(parser.read_le::<u16>()?),
        op::LOAD_LOCAL => Instruction::LoadLocal(parser.read_le::<u16>()?),
        op::STORE_LOCAL => Instruction::StoreLocal(parser.read_le::<u16>()?),
        op::DUP => Instruction::Dup,
        op::POP => Instruction::Pop,
        op::GET_FIELD => Instruction::GetField(read_ref(parser)?),
        op::PUT_FIELD => Instruction::PutField(read_ref(parser)?),
        op::GET_STATIC => Instruction::GetStatic(read_ref(parser)?),
        op::PUT_STATIC => Instruction::PutStatic(read_ref(parser)?),
        op::INVOKE => {
            let kind = op::invoke_kind_from_byte(parser.read_le::<u8>()?)?;
            Instruction::Invoke(kind, read_ref(parser)?)
        }
        op::INVOKE_DYNAMIC => {
            let name = pool.utf8(parser.read_le::<u16>()?)?.to_string();
            let desc = pool.utf8(parser.read_le::<u16>()?)?.to_string();
            let count = parser.read_le::<u16>()?;
            let mut bootstrap = Vec::with_capacity(count as usize);
            for _ in 0..count {
                bootstrap.push(pool.constant(parser.read_le::<u16>()?)?);
            }
            Instruction::InvokeDynamic {
                name,
                desc,
                bootstrap,
            }
        }
        op::NEW => Instruction::New(pool.utf8(parser.read_le::<u16>()?)?.to_string()),
        op::PACK_ARGS => Instruction::PackArgs(parser.read_le::<u16>()?),
        op::RESOLVE_HANDLE => {
            let kind = op::handle_kind_from_byte(parser.read_le::<u8>()?)?;
            Instruction::ResolveHandle(kind, read_ref(parser)?)
        }
        op::INVOKE_HANDLE => Instruction::InvokeHandle,
        op::IS_INSTANCE => Instruction::IsInstance(pool.utf8(parser.read_le::<u16>()?)?.to_string()),
        op::CAST_TO => Instruction::CastTo(pool.utf8(parser.read_le::<u16>()?)?.to_string()),
        op::JUMP => Instruction::Jump(Label(parser.read_le::<u32>()?)),
        op::BRANCH => Instruction::Branch(Label(parser.read_le::<u32>()?)),
        op::BRANCH_NULL => Instruction::BranchNull(Label(parser.read_le::<u32>()?)),
        op::RETURN => Instruction::Return,
        op::RETURN_VALUE => Instruction::ReturnValue,
        op::THROW => Instruction::Throw,
        _ => return Err(malformed_error!("Unknown opcode - {:#x}", opcode)),
    })
}

/// Rewrite raw instruction-index branch targets into symbolic labels, inserting
/// a [`Instruction::Mark`] at every distinct target position.
fn lift_labels(raw_code: Vec<Instruction>, member_name: &str) -> Result<Vec<Instruction>> {
    let mut targets = BTreeSet::new();
    for ins in &raw_code {
        if let Instruction::Jump(Label(t))
        | Instruction::Branch(Label(t))
        | Instruction::BranchNull(Label(t)) = ins
        {
            if *t as usize > raw_code.len() {
                return Err(malformed_error!(
                    "Branch target {} out of range in '{}' ({} instructions)",
                    t,
                    member_name,
                    raw_code.len()
                ));
            }
            targets.insert(*t);
        }
    }

    if targets.is_empty() {
        return Ok(raw_code);
    }

    #[allow(clippy::cast_possible_truncation)]
    let ids: std::collections::HashMap<u32, Label> = targets
        .iter()
        .enumerate()
        .map(|(rank, target)| (*target, Label(rank as u32)))
        .collect();
    let label_of = |raw: u32| ids[&raw];

    #[allow(clippy::cast_possible_truncation)]
    let count = raw_code.len() as u32;
    let mut code = Vec::with_capacity(raw_code.len() + targets.len());
    for (index, ins) in raw_code.into_iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        if let Some(label) = ids.get(&(index as u32)) {
            code.push(Instruction::Mark(*label));
        }
        code.push(match ins {
            Instruction::Jump(Label(t)) => Instruction::Jump(label_of(t)),
            Instruction::Branch(Label(t)) => Instruction::Branch(label_of(t)),
            Instruction::BranchNull(Label(t)) => Instruction::BranchNull(label_of(t)),
            other => other,
        });
    }
    // A target one past the last instruction marks the end of the stream.
    if let Some(label) = ids.get(&count) {
        code.push(Instruction::Mark(*label));
    }

    Ok(code)
}

/// Drive a [`ModuleSink`] from a parsed module.
///
/// Emits the header, every data member and every executable member in
/// declaration order, then `end`. This is the entry point of every transform
/// chain application: the outermost sink observes the original emission.
///
/// # Errors
/// Propagates the first error any sink in the chain returns.
pub fn emit_module(module: &CodeModule, sink: &mut dyn ModuleSink) -> Result<()> {
    sink.begin(&ModuleHeader {
        name: module.name.clone(),
        superclass: module.superclass.clone(),
        interfaces: module.interfaces.clone(),
        flags: module.flags,
    })?;

    for member in &module.data_members {
        sink.data_member(member)?;
    }

    for member in &module.exec_members {
        let decl = MemberDecl {
            name: member.name.clone(),
            desc: member.desc.clone(),
            flags: member.flags,
            max_stack: member.max_stack,
            max_locals: member.max_locals,
        };
        sink.exec_member(&decl, &member.code)?;
    }

    sink.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_foreign_images() {
        assert!(matches!(parse_module(&[]), Err(crate::Error::Empty)));
        assert!(matches!(
            parse_module(b"ELF\x7f____"),
            Err(crate::Error::NotSupported)
        ));

        let mut wrong_version = Vec::new();
        wrong_version.extend_from_slice(SWM_MAGIC);
        wrong_version.extend_from_slice(&2u16.to_le_bytes());
        assert!(matches!(
            parse_module(&wrong_version),
            Err(crate::Error::NotSupported)
        ));
    }

    #[test]
    fn rejects_truncated_images() {
        let mut truncated = Vec::new();
        truncated.extend_from_slice(SWM_MAGIC);
        truncated.extend_from_slice(&SWM_VERSION.to_le_bytes());
        truncated.push(0x00);
        assert!(parse_module(&truncated).is_err());
    }

    #[test]
    fn rejects_bad_pool_tags() {
        let mut image = Vec::new();
        image.extend_from_slice(SWM_MAGIC);
        image.extend_from_slice(&SWM_VERSION.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes()); // module flags
        image.extend_from_slice(&1u16.to_le_bytes()); // pool count
        image.push(0x7F); // unknown tag
        assert!(matches!(
            parse_module(&image),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
