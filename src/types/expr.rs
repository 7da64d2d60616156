// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Constant expressions: global initializers and segment offsets.

use core::{fmt, ops};

use num_enum::TryFromPrimitive;

use super::GlobalIdx;

/// The maximum encoded size of a constant expression operand (a 64-bit
/// signed LEB128).
pub const MAX_OPERAND_LEN: usize = 10;

/// The opcode terminating an expression.
pub const END_OPCODE: u8 = 0x0b;

/// The opcodes allowed in a constant expression.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ConstOpcode {
    GlobalGet = 0x23,
    I32Const = 0x41,
    I64Const = 0x42,
    F32Const = 0x43,
    F64Const = 0x44,
}

/// The value produced by a constant expression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConstValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// The value of the referenced (necessarily imported) global.
    GlobalGet(GlobalIdx),
}

impl ConstValue {
    pub fn opcode(self) -> ConstOpcode {
        match self {
            ConstValue::I32(_) => ConstOpcode::I32Const,
            ConstValue::I64(_) => ConstOpcode::I64Const,
            ConstValue::F32(_) => ConstOpcode::F32Const,
            ConstValue::F64(_) => ConstOpcode::F64Const,
            ConstValue::GlobalGet(_) => ConstOpcode::GlobalGet,
        }
    }
}

/// The operand of a constant expression exactly as it was encoded.
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct RawOperand {
    bytes: [u8; MAX_OPERAND_LEN],
    len: u8,
}

impl RawOperand {
    pub(crate) fn new(bytes: [u8; MAX_OPERAND_LEN], len: usize) -> Self {
        debug_assert!(len <= MAX_OPERAND_LEN);
        Self {
            bytes,
            len: len as u8,
        }
    }
}

impl ops::Deref for RawOperand {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl fmt::Debug for RawOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x?}", &**self)
    }
}

/// A constant expression: a single constant-producing instruction. The
/// terminating `end` is consumed during decoding and not stored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstExpression {
    /// The instruction's opcode.
    pub opcode: ConstOpcode,
    /// The instruction's operand, as encoded (e.g., non-minimal LEB128 is
    /// preserved).
    pub operand: RawOperand,
    /// The decoded operand.
    pub value: ConstValue,
}

impl ConstExpression {
    /// The offset given by an `i32.const` expression, if it is one.
    pub fn as_i32(&self) -> Option<i32> {
        match self.value {
            ConstValue::I32(value) => Some(value),
            _ => None,
        }
    }
}
