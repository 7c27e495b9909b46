//! Opcode bytes of the SWM instruction encoding.
//!
//! One byte per opcode, grouped by concern: stack and locals (`0x0_`), field
//! access (`0x1_`), dispatch (`0x2_`), reflective bridge support (`0x3_`),
//! control flow (`0x4_`), exits (`0x5_`). Operand layouts are described on the
//! reader and writer; [`crate::Instruction::Mark`] has no opcode because label
//! positions are encoded as instruction indices.

use crate::module::{HandleKind, InvokeKind};
use crate::Result;

/// No operation
pub const NOP: u8 = 0x00;
/// Push a pooled constant; operand: `u16` pool index
pub const LOAD_CONST: u8 = 0x01;
/// Push the null reference
pub const LOAD_NULL: u8 = 0x02;
/// Push the receiver
pub const LOAD_THIS: u8 = 0x03;
/// Push an argument; operand: `u16` index
pub const LOAD_ARG: u8 = 0x04;
/// Push a local slot; operand: `u16` index
pub const LOAD_LOCAL: u8 = 0x05;
/// Pop into a local slot; operand: `u16` index
pub const STORE_LOCAL: u8 = 0x06;
/// Duplicate the top of stack
pub const DUP: u8 = 0x07;
/// Discard the top of stack
pub const POP: u8 = 0x08;
/// Read an instance field; operands: `u16` owner, name, desc Utf8 indices
pub const GET_FIELD: u8 = 0x10;
/// Write an instance field; operands as [`GET_FIELD`]
pub const PUT_FIELD: u8 = 0x11;
/// Read a static field; operands as [`GET_FIELD`]
pub const GET_STATIC: u8 = 0x12;
/// Write a static field; operands as [`GET_FIELD`]
pub const PUT_STATIC: u8 = 0x13;
/// Call a member; operands: `u8` kind, then owner, name, desc Utf8 indices
pub const INVOKE: u8 = 0x20;
/// Dynamically-bound call; operands: name, desc Utf8 indices, `u16` bootstrap
/// count, `u16` pool indices
pub const INVOKE_DYNAMIC: u8 = 0x21;
/// Allocate an instance; operand: `u16` module name Utf8 index
pub const NEW: u8 = 0x22;
/// Box arguments into an array; operand: `u16` count
pub const PACK_ARGS: u8 = 0x30;
/// Capture a reflective handle; operands: `u8` kind, then owner, name, desc
pub const RESOLVE_HANDLE: u8 = 0x31;
/// Invoke through a captured handle
pub const INVOKE_HANDLE: u8 = 0x32;
/// Type identity test; operand: `u16` module name Utf8 index
pub const IS_INSTANCE: u8 = 0x33;
/// Checked narrowing cast; operand: `u16` type name Utf8 index
pub const CAST_TO: u8 = 0x34;
/// Unconditional branch; operand: `u32` instruction index
pub const JUMP: u8 = 0x40;
/// Branch when the popped condition is false; operand: `u32` instruction index
pub const BRANCH: u8 = 0x41;
/// Branch when the popped reference is null; operand: `u32` instruction index
pub const BRANCH_NULL: u8 = 0x42;
/// Return with no value
pub const RETURN: u8 = 0x50;
/// Pop and return the top of stack
pub const RETURN_VALUE: u8 = 0x51;
/// Pop and raise the top of stack
pub const THROW: u8 = 0x52;

/// Encode an invocation kind as its wire byte.
#[must_use]
pub fn invoke_kind_byte(kind: InvokeKind) -> u8 {
    match kind {
        InvokeKind::Virtual => 0,
        InvokeKind::Static => 1,
        InvokeKind::Special => 2,
        InvokeKind::Interface => 3,
    }
}

/// Decode an invocation kind from its wire byte.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown bytes.
pub fn invoke_kind_from_byte(byte: u8) -> Result<InvokeKind> {
    match byte {
        0 => Ok(InvokeKind::Virtual),
        1 => Ok(InvokeKind::Static),
        2 => Ok(InvokeKind::Special),
        3 => Ok(InvokeKind::Interface),
        _ => Err(malformed_error!("Unknown invocation kind byte - {}", byte)),
    }
}

/// Encode a handle kind as its wire byte.
#[must_use]
pub fn handle_kind_byte(kind: HandleKind) -> u8 {
    match kind {
        HandleKind::Method => 0,
        HandleKind::StaticMethod => 1,
        HandleKind::FieldGet => 2,
        HandleKind::FieldSet => 3,
        HandleKind::StaticFieldGet => 4,
        HandleKind::StaticFieldSet => 5,
    }
}

/// Decode a handle kind from its wire byte.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] for unknown bytes.
pub fn handle_kind_from_byte(byte: u8) -> Result<HandleKind> {
    match byte {
        0 => Ok(HandleKind::Method),
        1 => Ok(HandleKind::StaticMethod),
        2 => Ok(HandleKind::FieldGet),
        3 => Ok(HandleKind::FieldSet),
        4 => Ok(HandleKind::StaticFieldGet),
        5 => Ok(HandleKind::StaticFieldSet),
        _ => Err(malformed_error!("Unknown handle kind byte - {}", byte)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_bytes_round_trip() {
        for kind in [
            InvokeKind::Virtual,
            InvokeKind::Static,
            InvokeKind::Special,
            InvokeKind::Interface,
        ] {
            assert_eq!(invoke_kind_from_byte(invoke_kind_byte(kind)).unwrap(), kind);
        }
        assert!(invoke_kind_from_byte(9).is_err());

        for kind in [
            HandleKind::Method,
            HandleKind::StaticMethod,
            HandleKind::FieldGet,
            HandleKind::FieldSet,
            HandleKind::StaticFieldGet,
            HandleKind::StaticFieldSet,
        ] {
            assert_eq!(handle_kind_from_byte(handle_kind_byte(kind)).unwrap(), kind);
        }
        assert!(handle_kind_from_byte(9).is_err());
    }
}
