//! Encoding of the module model back into SWM images.
//!
//! [`ModuleWriter`] is the terminal [`ModuleSink`] of every transform chain:
//! it collects the emitted module, then on `end` interns the constant pool
//! (deduplicated), resolves symbolic labels back to instruction indices with
//! validation, optionally recomputes each member's operand stack ceiling, and
//! assembles the final byte image.
//!
//! Recomputation of `max_stack` happens only when the applied pipeline
//! requested frame metadata; otherwise recorded values pass through untouched.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::format::op;
use crate::format::reader::{SWM_MAGIC, SWM_VERSION};
use crate::module::{Constant, DataMember, Instruction, Label, MemberRef, MethodDesc, TypeDesc};
use crate::transform::{MemberDecl, ModuleHeader, ModuleSink};
use crate::Result;

/// Handle to the bytes a [`ModuleWriter`] produces.
///
/// The writer sits at the bottom of a boxed sink chain, so its output is
/// handed back through this shared cell instead of a return value.
#[derive(Clone)]
pub struct WriterOutput {
    bytes: Rc<RefCell<Option<Vec<u8>>>>,
}

impl WriterOutput {
    /// Take the encoded image out of the cell.
    ///
    /// # Errors
    /// Returns [`crate::Error::Emission`] if the writer never reached `end`,
    /// which happens when a transform aborted the emission.
    pub fn take(&self) -> Result<Vec<u8>> {
        self.bytes
            .borrow_mut()
            .take()
            .ok_or_else(|| emission_error!("Writer did not finish - emission was aborted"))
    }
}

/// Interning constant pool builder.
///
/// Entries are deduplicated; indices are 1-based, 0 is reserved for "none".
#[derive(Default)]
struct PoolBuilder {
    entries: Vec<Vec<u8>>,
    utf8_index: HashMap<String, u16>,
    constant_index: HashMap<Constant, u16>,
}

impl PoolBuilder {
    fn push_entry(&mut self, encoded: Vec<u8>) -> Result<u16> {
        if self.entries.len() >= usize::from(u16::MAX) {
            return Err(emission_error!("Constant pool overflow (65535 entries)"));
        }
        self.entries.push(encoded);
        #[allow(clippy::cast_possible_truncation)]
        Ok(self.entries.len() as u16)
    }

    fn utf8(&mut self, text: &str) -> Result<u16> {
        if let Some(index) = self.utf8_index.get(text) {
            return Ok(*index);
        }
        if text.len() > usize::from(u16::MAX) {
            return Err(emission_error!("Utf8 entry exceeds 65535 bytes"));
        }

        let mut encoded = vec![0x01];
        #[allow(clippy::cast_possible_truncation)]
        encoded.extend_from_slice(&(text.len() as u16).to_le_bytes());
        encoded.extend_from_slice(text.as_bytes());

        let index = self.push_entry(encoded)?;
        self.utf8_index.insert(text.to_string(), index);
        Ok(index)
    }

    fn constant(&mut self, constant: &Constant) -> Result<u16> {
        if let Some(index) = self.constant_index.get(constant) {
            return Ok(*index);
        }

        let encoded = match constant {
            Constant::Int(value) => {
                let mut encoded = vec![0x02];
                encoded.extend_from_slice(&value.to_le_bytes());
                encoded
            }
            Constant::Float(value) => {
                let mut encoded = vec![0x03];
                encoded.extend_from_slice(&value.to_bits().to_le_bytes());
                encoded
            }
            Constant::Str(text) => {
                let utf8 = self.utf8(text)?;
                let mut encoded = vec![0x04];
                encoded.extend_from_slice(&utf8.to_le_bytes());
                encoded
            }
        };

        let index = self.push_entry(encoded)?;
        self.constant_index.insert(constant.clone(), index);
        Ok(index)
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        #[allow(clippy::cast_possible_truncation)]
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
        Ok(out)
    }
}

/// Terminal sink encoding the emitted module into SWM bytes.
pub struct ModuleWriter {
    recompute_frames: bool,
    header: Option<ModuleHeader>,
    data_members: Vec<DataMember>,
    exec_members: Vec<(MemberDecl, Vec<Instruction>)>,
    output: WriterOutput,
}

impl ModuleWriter {
    /// Create a writer.
    ///
    /// # Arguments
    /// * `recompute_frames` - When `true`, each member's `max_stack` is
    ///   recomputed by abstract stack simulation instead of trusting the
    ///   recorded value. Set when any applied transform restructured control
    ///   flow.
    #[must_use]
    pub fn new(recompute_frames: bool) -> Self {
        ModuleWriter {
            recompute_frames,
            header: None,
            data_members: Vec::new(),
            exec_members: Vec::new(),
            output: WriterOutput {
                bytes: Rc::new(RefCell::new(None)),
            },
        }
    }

    /// Handle to the bytes produced once `end` has run.
    #[must_use]
    pub fn output(&self) -> WriterOutput {
        self.output.clone()
    }

    fn encode(&mut self) -> Result<Vec<u8>> {
        let Some(header) = self.header.take() else {
            return Err(emission_error!("Emission ended without a module header"));
        };

        let mut pool = PoolBuilder::default();
        let mut body = Vec::new();

        // Member sections intern into the pool while encoding, so they are
        // buffered and appended after the pool section.
        let name_index = pool.utf8(&header.name)?;
        let super_index = match &header.superclass {
            Some(name) => pool.utf8(name)?,
            None => 0,
        };
        let mut interface_indices = Vec::with_capacity(header.interfaces.len());
        for interface in &header.interfaces {
            interface_indices.push(pool.utf8(interface)?);
        }

        body.extend_from_slice(&name_index.to_le_bytes());
        body.extend_from_slice(&super_index.to_le_bytes());
        body.extend_from_slice(&member_count(header.interfaces.len(), "interface")?.to_le_bytes());
        for index in interface_indices {
            body.extend_from_slice(&index.to_le_bytes());
        }

        body.extend_from_slice(&member_count(self.data_members.len(), "data member")?.to_le_bytes());
        for member in &self.data_members {
            body.extend_from_slice(&member.flags.bits().to_le_bytes());
            body.extend_from_slice(&pool.utf8(&member.name)?.to_le_bytes());
            body.extend_from_slice(&pool.utf8(&member.desc)?.to_le_bytes());
            let constant_index = match &member.constant {
                Some(constant) => pool.constant(constant)?,
                None => 0,
            };
            body.extend_from_slice(&constant_index.to_le_bytes());
        }

        body.extend_from_slice(
            &member_count(self.exec_members.len(), "executable member")?.to_le_bytes(),
        );
        for (decl, code) in &self.exec_members {
            let max_stack = if self.recompute_frames {
                compute_max_stack(code)?
            } else {
                decl.max_stack
            };

            let encoded = encode_code(code, &mut pool, &decl.name)?;
            body.extend_from_slice(&decl.flags.bits().to_le_bytes());
            body.extend_from_slice(&pool.utf8(&decl.name)?.to_le_bytes());
            body.extend_from_slice(&pool.utf8(&decl.desc)?.to_le_bytes());
            body.extend_from_slice(&max_stack.to_le_bytes());
            body.extend_from_slice(&decl.max_locals.to_le_bytes());
            #[allow(clippy::cast_possible_truncation)]
            body.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
            body.extend_from_slice(&encoded);
        }

        let mut image = Vec::new();
        image.extend_from_slice(SWM_MAGIC);
        image.extend_from_slice(&SWM_VERSION.to_le_bytes());
        image.extend_from_slice(&header.flags.bits().to_le_bytes());
        image.extend_from_slice(&pool.encode()?);
        image.extend_from_slice(&body);
        Ok(image)
    }
}

fn member_count(len: usize, what: &str) -> Result<u16> {
    u16::try_from(len).map_err(|_| emission_error!("Too many {}s (max 65535)", what))
}

impl ModuleSink for ModuleWriter {
    fn begin(&mut self, header: &ModuleHeader) -> Result<()> {
        if self.header.is_some() {
            return Err(emission_error!("Module header emitted twice"));
        }
        self.header = Some(header.clone());
        Ok(())
    }

    fn data_member(&mut self, member: &DataMember) -> Result<()> {
        self.data_members.push(member.clone());
        Ok(())
    }

    fn exec_member(&mut self, decl: &MemberDecl, code: &[Instruction]) -> Result<()> {
        self.exec_members.push((decl.clone(), code.to_vec()));
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        let image = self.encode()?;
        *self.output.bytes.borrow_mut() = Some(image);
        Ok(())
    }
}

/// Encode one member's instruction stream, interning operands into the pool
/// and resolving labels to instruction indices.
fn encode_code(
    code: &[Instruction],
    pool: &mut PoolBuilder,
    member_name: &str,
) -> Result<Vec<u8>> {
    // First pass: label -> index of the next real instruction.
    let mut labels: HashMap<Label, u32> = HashMap::new();
    let mut index: u32 = 0;
    for ins in code {
        if let Instruction::Mark(label) = ins {
            if labels.insert(*label, index).is_some() {
                return Err(emission_error!(
                    "Label {:?} defined twice in '{}'",
                    label,
                    member_name
                ));
            }
        } else {
            index += 1;
        }
    }

    let resolve = |label: &Label| -> Result<u32> {
        labels.get(label).copied().ok_or_else(|| {
            emission_error!("Branch to undefined label {:?} in '{}'", label, member_name)
        })
    };

    let mut out = Vec::new();
    for ins in code {
        encode_instruction(ins, pool, &resolve, &mut out)?;
    }
    Ok(out)
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_ref(out: &mut Vec<u8>, pool: &mut PoolBuilder, target: &MemberRef) -> Result<()> {
    push_u16(out, pool.utf8(&target.owner)?);
    push_u16(out, pool.utf8(&target.name)?);
    push_u16(out, pool.utf8(&target.desc)?);
    Ok(())
}

fn encode_instruction(
    ins: &Instruction,
    pool: &mut PoolBuilder,
    resolve: &dyn Fn(&Label) -> Result<u32>,
    out: &mut Vec<u8>,
) -> Result<()> {
    match ins {
        Instruction::Mark(_) => {} // label positions encode as indices
        Instruction::Nop => out.push(op::NOP),
        Instruction::LoadConst(constant) => {
            out.push(op::LOAD_CONST);
            push_u16(out, pool.constant(constant)?);
        }
        Instruction::LoadNull => out.push(op::LOAD_NULL),
        Instruction::LoadThis => out.push(op::LOAD_THIS),
        Instruction::LoadArg(index) => {
            out.push(op::LOAD_ARG);
            push_u16(out, *index);
        }
        Instruction::LoadLocal(index) => {
            out.push(op::LOAD_LOCAL);
            push_u16(out, *index);
        }
        Instruction::StoreLocal(index) => {
            out.push(op::STORE_LOCAL);
            push_u16(out, *index);
        }
        Instruction::Dup => out.push(op::DUP),
        Instruction::Pop => out.push(op::POP),
        Instruction::GetField(target) => {
            out.push(op::GET_FIELD);
            push_ref(out, pool, target)?;
        }
        Instruction::PutField(target) => {
            out.push(op::PUT_FIELD);
            push_ref(out, pool, target)?;
        }
        Instruction::GetStatic(target) => {
            out.push(op::GET_STATIC);
            push_ref(out, pool, target)?;
        }
        Instruction::PutStatic(target) => {
            out.push(op::PUT_STATIC);
            push_ref(out, pool, target)?;
        }
        Instruction::Invoke(kind, target) => {
            out.push(op::INVOKE);
            out.push(op::invoke_kind_byte(*kind));
            push_ref(out, pool, target)?;
        }
        Instruction::InvokeDynamic {
            name,
            desc,
            bootstrap,
        } => {
            out.push(op::INVOKE_DYNAMIC);
            push_u16(out, pool.utf8(name)?);
            push_u16(out, pool.utf8(desc)?);
            push_u16(out, member_count(bootstrap.len(), "bootstrap constant")?);
            for constant in bootstrap {
                push_u16(out, pool.constant(constant)?);
            }
        }
        Instruction::New(type_name) => {
            out.push(op::NEW);
            push_u16(out, pool.utf8(type_name)?);
        }
        Instruction::PackArgs(count) => {
            out.push(op::PACK_ARGS);
            push_u16(out, *count);
        }
        Instruction::ResolveHandle(kind, target) => {
            out.push(op::RESOLVE_HANDLE);
            out.push(op::handle_kind_byte(*kind));
            push_ref(out, pool, target)?;
        }
        Instruction::InvokeHandle => out.push(op::INVOKE_HANDLE),
        Instruction::IsInstance(type_name) => {
            out.push(op::IS_INSTANCE);
            push_u16(out, pool.utf8(type_name)?);
        }
        Instruction::CastTo(type_name) => {
            out.push(op::CAST_TO);
            push_u16(out, pool.utf8(type_name)?);
        }
        Instruction::Jump(label) => {
            out.push(op::JUMP);
            out.extend_from_slice(&resolve(label)?.to_le_bytes());
        }
        Instruction::Branch(label) => {
            out.push(op::BRANCH);
            out.extend_from_slice(&resolve(label)?.to_le_bytes());
        }
        Instruction::BranchNull(label) => {
            out.push(op::BRANCH_NULL);
            out.extend_from_slice(&resolve(label)?.to_le_bytes());
        }
        Instruction::Return => out.push(op::RETURN),
        Instruction::ReturnValue => out.push(op::RETURN_VALUE),
        Instruction::Throw => out.push(op::THROW),
    }
    Ok(())
}

/// Recompute the operand stack ceiling of one instruction stream by abstract
/// simulation.
///
/// Walks every reachable path from the entry, tracking stack depth and taking
/// the maximum. Branches follow their labels; exits terminate the path.
///
/// # Errors
/// Returns [`crate::Error::Emission`] on stack underflow, on branches to
/// undefined labels, and on invoke descriptors that fail to parse.
pub(crate) fn compute_max_stack(code: &[Instruction]) -> Result<u16> {
    let mut labels: HashMap<Label, usize> = HashMap::new();
    for (index, ins) in code.iter().enumerate() {
        if let Instruction::Mark(label) = ins {
            labels.insert(*label, index);
        }
    }
    let target = |label: &Label| -> Result<usize> {
        labels
            .get(label)
            .copied()
            .ok_or_else(|| emission_error!("Branch to undefined label {:?}", label))
    };

    let mut depths: Vec<Option<u32>> = vec![None; code.len()];
    let mut max: u32 = 0;
    let mut worklist: Vec<(usize, u32)> = vec![(0, 0)];

    while let Some((index, depth)) = worklist.pop() {
        if index >= code.len() {
            continue;
        }
        if let Some(seen) = depths[index] {
            if seen >= depth {
                continue;
            }
        }
        depths[index] = Some(depth);

        let ins = &code[index];
        let (pops, pushes) = stack_effect(ins)?;
        if depth < pops {
            return Err(emission_error!(
                "Stack underflow at instruction {} ({:?})",
                index,
                ins
            ));
        }
        let next = depth - pops + pushes;
        max = max.max(next).max(depth);

        match ins {
            Instruction::Jump(label) => worklist.push((target(label)?, next)),
            Instruction::Branch(label) | Instruction::BranchNull(label) => {
                worklist.push((target(label)?, next));
                worklist.push((index + 1, next));
            }
            Instruction::Return | Instruction::ReturnValue | Instruction::Throw => {}
            _ => worklist.push((index + 1, next)),
        }
    }

    u16::try_from(max).map_err(|_| emission_error!("Operand stack depth exceeds 65535"))
}

/// Stack effect of one instruction as `(pops, pushes)`.
fn stack_effect(ins: &Instruction) -> Result<(u32, u32)> {
    Ok(match ins {
        Instruction::Nop | Instruction::Mark(_) | Instruction::Jump(_) | Instruction::Return => {
            (0, 0)
        }
        Instruction::LoadConst(_)
        | Instruction::LoadNull
        | Instruction::LoadThis
        | Instruction::LoadArg(_)
        | Instruction::LoadLocal(_)
        | Instruction::New(_)
        | Instruction::ResolveHandle(_, _)
        | Instruction::GetStatic(_) => (0, 1),
        Instruction::StoreLocal(_)
        | Instruction::Pop
        | Instruction::PutStatic(_)
        | Instruction::Branch(_)
        | Instruction::BranchNull(_)
        | Instruction::ReturnValue
        | Instruction::Throw => (1, 0),
        Instruction::Dup => (1, 2),
        Instruction::GetField(_) | Instruction::IsInstance(_) | Instruction::CastTo(_) => (1, 1),
        Instruction::PutField(_) => (2, 0),
        Instruction::PackArgs(count) => (u32::from(*count), 1),
        Instruction::InvokeHandle => (3, 1),
        Instruction::Invoke(kind, target) => {
            let desc = MethodDesc::parse(&target.desc)
                .map_err(|e| emission_error!("Invalid invoke descriptor '{}': {}", target.desc, e))?;
            #[allow(clippy::cast_possible_truncation)]
            let args = desc.arity() as u32;
            let receiver = u32::from(!matches!(kind, crate::module::InvokeKind::Static));
            let ret = u32::from(desc.ret != TypeDesc::Void);
            (args + receiver, ret)
        }
        Instruction::InvokeDynamic { desc, .. } => {
            let desc = MethodDesc::parse(desc)
                .map_err(|e| emission_error!("Invalid dynamic descriptor '{}': {}", desc, e))?;
            #[allow(clippy::cast_possible_truncation)]
            let args = desc.arity() as u32;
            (args, u32::from(desc.ret != TypeDesc::Void))
        }
    })
}

/// Encode a module model into a standalone SWM image with no transforms
/// applied.
///
/// # Errors
/// Propagates writer emission errors (label resolution, pool overflow).
pub fn write_module(module: &crate::module::CodeModule) -> Result<Vec<u8>> {
    let mut writer = ModuleWriter::new(false);
    let output = writer.output();
    crate::format::reader::emit_module(module, &mut writer)?;
    output.take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::InvokeKind;

    #[test]
    fn max_stack_straight_line() {
        let code = vec![
            Instruction::LoadConst(Constant::Int(1)),
            Instruction::LoadConst(Constant::Int(2)),
            Instruction::Pop,
            Instruction::Pop,
            Instruction::Return,
        ];
        assert_eq!(compute_max_stack(&code).unwrap(), 2);
    }

    #[test]
    fn max_stack_through_branches() {
        let done = Label(0);
        let code = vec![
            Instruction::LoadConst(Constant::Int(1)),
            Instruction::Branch(done),
            Instruction::LoadConst(Constant::Int(2)),
            Instruction::LoadConst(Constant::Int(3)),
            Instruction::Pop,
            Instruction::Pop,
            Instruction::Mark(done),
            Instruction::Return,
        ];
        assert_eq!(compute_max_stack(&code).unwrap(), 2);
    }

    #[test]
    fn max_stack_counts_invoke_arity() {
        let code = vec![
            Instruction::LoadConst(Constant::Int(1)),
            Instruction::LoadConst(Constant::Int(2)),
            Instruction::Invoke(
                InvokeKind::Static,
                MemberRef::new("math/Ops", "add", "(II)I"),
            ),
            Instruction::ReturnValue,
        ];
        assert_eq!(compute_max_stack(&code).unwrap(), 2);
    }

    #[test]
    fn underflow_is_an_emission_error() {
        let code = vec![Instruction::Pop, Instruction::Return];
        assert!(matches!(
            compute_max_stack(&code),
            Err(crate::Error::Emission(_))
        ));
    }

    #[test]
    fn undefined_label_is_an_emission_error() {
        let code = vec![Instruction::Jump(Label(9)), Instruction::Return];
        assert!(matches!(
            compute_max_stack(&code),
            Err(crate::Error::Emission(_))
        ));
    }
}
