// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Decoding of constant expressions.

use crate::leb128::{self, Leb128};
use crate::storage::Stream;
use crate::types::{
    ConstExpression, ConstOpcode, ConstValue, END_OPCODE, GlobalIdx, MAX_OPERAND_LEN, RawOperand,
};

use super::{BoundedDecodable, ContextStack, Decoder, Error};

// Records the bytes of an operand as they are read.
struct OperandRecorder {
    bytes: [u8; MAX_OPERAND_LEN],
    len: usize,
}

impl OperandRecorder {
    fn new() -> Self {
        Self {
            bytes: [0; MAX_OPERAND_LEN],
            len: 0,
        }
    }

    // Reads a LEB128-encoded operand. The encoding is at most
    // `leb128::MAX_ENCODED_LEN` bytes, which fits the recording.
    fn read_leb128<T: Leb128, Storage: Stream>(
        &mut self,
        decoder: &mut Decoder<Storage>,
    ) -> Result<T, Error<Storage>> {
        let (value, _) = leb128::read::<T, _, Error<Storage>>(|| {
            let byte = decoder.read_byte_raw()?;
            self.bytes[self.len] = byte;
            self.len += 1;
            Ok(byte)
        })?;
        Ok(value)
    }

    fn read_array<const N: usize, Storage: Stream>(
        &mut self,
        decoder: &mut Decoder<Storage>,
    ) -> Result<[u8; N], Error<Storage>> {
        let mut buf = [0u8; N];
        decoder.read_exact_raw(&mut buf)?;
        self.bytes[..N].copy_from_slice(&buf);
        self.len = N;
        Ok(buf)
    }

    fn finish(self) -> RawOperand {
        RawOperand::new(self.bytes, self.len)
    }
}

impl BoundedDecodable for ConstExpression {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let opcode: ConstOpcode = decoder.read_bounded(context)?;
        let mut operand = OperandRecorder::new();
        let value = match opcode {
            ConstOpcode::I32Const => ConstValue::I32(operand.read_leb128(decoder)?),
            ConstOpcode::I64Const => ConstValue::I64(operand.read_leb128(decoder)?),
            ConstOpcode::F32Const => {
                ConstValue::F32(f32::from_le_bytes(operand.read_array(decoder)?))
            }
            ConstOpcode::F64Const => {
                ConstValue::F64(f64::from_le_bytes(operand.read_array(decoder)?))
            }
            ConstOpcode::GlobalGet => {
                ConstValue::GlobalGet(GlobalIdx::new(operand.read_leb128(decoder)?))
            }
        };

        let end = decoder.read_byte_raw()?;
        if end != END_OPCODE {
            return Err(Error::UnterminatedExpression(end));
        }
        Ok(Self {
            opcode,
            operand: operand.finish(),
            value,
        })
    }
}
