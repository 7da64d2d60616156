// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Decodable trait implementations for WebAssembly types.

use core::ops;

use num_enum::TryFromPrimitive;

use crate::Allocator;
use crate::core_compat::vec::Vec;
use crate::storage::Stream;
use crate::types::*;

use super::{BoundedDecodable, ContextId, ContextStack, Contextual, Decodable, Decoder, Error};

// The leading byte of a function type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
enum FunctionTypeToken {
    Func = 0x60,
}

// Selects whether limits carry a maximum.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
enum LimitsToken {
    Min = 0x00,
    MinMax = 0x01,
}

macro_rules! impl_contextual {
    ($type:ident<A: Allocator>, $id:path) => {
        impl<A: Allocator> Contextual for $type<A> {
            const ID: ContextId = $id;
        }
    };
    (Vec<$type:ty, A>, $id:path) => {
        impl<A: Allocator> Contextual for Vec<$type, A> {
            const ID: ContextId = $id;
        }
    };
    ($type:ty, $id:path) => {
        impl Contextual for $type {
            const ID: ContextId = $id;
        }
    };
}

macro_rules! impl_decodable_for_u8_enum {
    ($type:ty, expected = $expected:expr) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                _: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                let token = decoder.read_byte_raw()?;
                Self::try_from(token).map_err(|_| Error::InvalidToken {
                    token,
                    expected: $expected,
                })
            }
        }
    };
    ($type:ty, $make_err:path) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                _: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                let byte = decoder.read_byte_raw()?;
                Self::try_from(byte).map_err(|_| $make_err(byte))
            }
        }
    };
}

macro_rules! impl_decodable_for_newtype {
    ($type:ident<A>) => {
        impl<A: Allocator> Decodable<A> for $type<A> {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                context: &mut ContextStack,
                alloc: &A,
            ) -> Result<Self, Error<Storage>> {
                Ok(Self::new(
                    <<Self as ops::Deref>::Target as Decodable<A>>::decode(
                        decoder, context, alloc,
                    )?,
                ))
            }
        }
    };
    ($type:ident) => {
        impl BoundedDecodable for $type {
            fn decode<Storage: Stream>(
                decoder: &mut Decoder<Storage>,
                context: &mut ContextStack,
            ) -> Result<Self, Error<Storage>> {
                Ok(Self::new(
                    <<Self as ops::Deref>::Target as BoundedDecodable>::decode(decoder, context)?,
                ))
            }
        }
    };
}

impl_contextual!(i32, ContextId::I32);
impl_contextual!(i64, ContextId::I64);
impl_contextual!(f32, ContextId::F32);
impl_contextual!(f64, ContextId::F64);
impl_contextual!(u32, ContextId::U32);
impl_contextual!(CodeSection<A: Allocator>, ContextId::CodeSec);
impl_contextual!(ConstExpression, ContextId::Expr);
impl_contextual!(ConstOpcode, ContextId::Opcode);
impl_contextual!(DataSection<A: Allocator>, ContextId::DataSec);
impl_contextual!(DataSegment<A: Allocator>, ContextId::Data);
impl_contextual!(ElementSection<A: Allocator>, ContextId::ElemSec);
impl_contextual!(ElementSegment<A: Allocator>, ContextId::Elem);
impl_contextual!(Export<A: Allocator>, ContextId::Export);
impl_contextual!(ExportDescriptor, ContextId::ExportDesc);
impl_contextual!(ExportSection<A: Allocator>, ContextId::ExportSec);
impl_contextual!(ExternKind, ContextId::ExternKind);
impl_contextual!(Function<A: Allocator>, ContextId::Func);
impl_contextual!(FunctionSection<A: Allocator>, ContextId::FuncSec);
impl_contextual!(FunctionType<A: Allocator>, ContextId::FuncType);
impl_contextual!(FunctionTypeToken, ContextId::FuncTypeToken);
impl_contextual!(FuncIdx, ContextId::FuncIdx);
impl_contextual!(Global, ContextId::Global);
impl_contextual!(GlobalIdx, ContextId::GlobalIdx);
impl_contextual!(GlobalSection<A: Allocator>, ContextId::GlobalSec);
impl_contextual!(GlobalType, ContextId::GlobalType);
impl_contextual!(GlobalTypeMutability, ContextId::Mut);
impl_contextual!(Import<A: Allocator>, ContextId::Import);
impl_contextual!(ImportDescriptor, ContextId::ImportDesc);
impl_contextual!(ImportSection<A: Allocator>, ContextId::ImportSec);
impl_contextual!(Limits, ContextId::Limits);
impl_contextual!(LimitsToken, ContextId::LimitsToken);
impl_contextual!(LocalDecl, ContextId::Local);
impl_contextual!(MemIdx, ContextId::MemIdx);
impl_contextual!(MemorySection<A: Allocator>, ContextId::MemorySec);
impl_contextual!(MemType, ContextId::MemType);
impl_contextual!(Name<A: Allocator>, ContextId::Name);
impl_contextual!(RefType, ContextId::RefType);
impl_contextual!(ResultType<A: Allocator>, ContextId::ResultType);
impl_contextual!(SectionId, ContextId::SectionId);
impl_contextual!(StartSection, ContextId::StartSec);
impl_contextual!(TableIdx, ContextId::TableIdx);
impl_contextual!(TableSection<A: Allocator>, ContextId::TableSec);
impl_contextual!(TableType, ContextId::TableType);
impl_contextual!(TypeIdx, ContextId::TypeIdx);
impl_contextual!(TypeSection<A: Allocator>, ContextId::TypeSec);
impl_contextual!(ValType, ContextId::ValType);
impl_contextual!(Vec<FuncIdx, A>, ContextId::VecFuncIdx);
impl_contextual!(Vec<LocalDecl, A>, ContextId::Locals);

impl_decodable_for_u8_enum!(ExternKind, expected = &[0x00, 0x01, 0x02, 0x03]);
impl_decodable_for_u8_enum!(GlobalTypeMutability, expected = &[0x00, 0x01]);
impl_decodable_for_u8_enum!(LimitsToken, expected = &[0x00, 0x01]);
impl_decodable_for_u8_enum!(RefType, expected = &[0x70]);
impl_decodable_for_u8_enum!(ConstOpcode, Error::InvalidExprOpcode);
impl_decodable_for_u8_enum!(FunctionTypeToken, Error::InvalidFunctionTypeTag);
impl_decodable_for_u8_enum!(SectionId, Error::InvalidSectionId);
impl_decodable_for_u8_enum!(ValType, Error::InvalidValType);

impl_decodable_for_newtype!(FuncIdx);
impl_decodable_for_newtype!(GlobalIdx);
impl_decodable_for_newtype!(MemIdx);
impl_decodable_for_newtype!(MemType);
impl_decodable_for_newtype!(StartSection);
impl_decodable_for_newtype!(TableIdx);
impl_decodable_for_newtype!(TypeIdx);
impl_decodable_for_newtype!(CodeSection<A>);
impl_decodable_for_newtype!(DataSection<A>);
impl_decodable_for_newtype!(ElementSection<A>);
impl_decodable_for_newtype!(ExportSection<A>);
impl_decodable_for_newtype!(FunctionSection<A>);
impl_decodable_for_newtype!(GlobalSection<A>);
impl_decodable_for_newtype!(ImportSection<A>);
impl_decodable_for_newtype!(MemorySection<A>);
impl_decodable_for_newtype!(ResultType<A>);
impl_decodable_for_newtype!(TableSection<A>);
impl_decodable_for_newtype!(TypeSection<A>);

impl BoundedDecodable for u32 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_leb128_raw()
    }
}

impl BoundedDecodable for i32 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_leb128_raw()
    }
}

impl BoundedDecodable for i64 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_leb128_raw()
    }
}

impl BoundedDecodable for f32 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let mut buf = [0u8; 4];
        decoder.read_exact_raw(&mut buf)?;
        Ok(f32::from_le_bytes(buf))
    }
}

impl BoundedDecodable for f64 {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        _: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let mut buf = [0u8; 8];
        decoder.read_exact_raw(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }
}

impl<A: Allocator> Decodable<A> for Name<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let len: u32 = decoder.read_bounded(context)?;
        Ok(Self::new(decoder.read_bytes(context, len as usize, alloc)?))
    }
}

impl<A: Allocator> Decodable<A> for FunctionType<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        decoder.read_bounded::<FunctionTypeToken>(context)?;
        Ok(Self {
            parameters: decoder.read(context, alloc)?,
            results: decoder.read(context, alloc)?,
        })
    }
}

impl BoundedDecodable for Limits {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        let token: LimitsToken = decoder.read_bounded(context)?;
        let min = decoder.read_bounded(context)?;
        let max = match token {
            LimitsToken::Min => None,
            LimitsToken::MinMax => Some(decoder.read_bounded(context)?),
        };
        Ok(Self { min, max })
    }
}

impl BoundedDecodable for TableType {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            reftype: decoder.read_bounded(context)?,
            limits: decoder.read_bounded(context)?,
        })
    }
}

impl BoundedDecodable for GlobalType {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            value: decoder.read_bounded(context)?,
            mutability: decoder.read_bounded(context)?,
        })
    }
}

impl BoundedDecodable for ImportDescriptor {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(match decoder.read_bounded(context)? {
            ExternKind::Function => Self::Function(decoder.read_bounded(context)?),
            ExternKind::Table => Self::Table(decoder.read_bounded(context)?),
            ExternKind::Memory => Self::Memory(decoder.read_bounded(context)?),
            ExternKind::Global => Self::Global(decoder.read_bounded(context)?),
        })
    }
}

impl<A: Allocator> Decodable<A> for Import<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            module: decoder.read(context, alloc)?,
            field: decoder.read(context, alloc)?,
            descriptor: decoder.read_bounded(context)?,
        })
    }
}

impl BoundedDecodable for ExportDescriptor {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(match decoder.read_bounded(context)? {
            ExternKind::Function => Self::Function(decoder.read_bounded(context)?),
            ExternKind::Table => Self::Table(decoder.read_bounded(context)?),
            ExternKind::Memory => Self::Memory(decoder.read_bounded(context)?),
            ExternKind::Global => Self::Global(decoder.read_bounded(context)?),
        })
    }
}

impl<A: Allocator> Decodable<A> for Export<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            field: decoder.read(context, alloc)?,
            descriptor: decoder.read_bounded(context)?,
        })
    }
}

impl BoundedDecodable for Global {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            ty: decoder.read_bounded(context)?,
            init: decoder.read_bounded(context)?,
        })
    }
}

// Reads a segment offset, which must be given by `i32.const`.
fn read_offset<Storage: Stream>(
    decoder: &mut Decoder<Storage>,
    context: &mut ContextStack,
) -> Result<ConstExpression, Error<Storage>> {
    let offset: ConstExpression = decoder.read_bounded(context)?;
    if offset.opcode == ConstOpcode::I32Const {
        Ok(offset)
    } else {
        Err(Error::InvalidOffsetExpression(offset.opcode))
    }
}

impl<A: Allocator> Decodable<A> for ElementSegment<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            table: decoder.read_bounded(context)?,
            offset: read_offset(decoder, context)?,
            init: decoder.read(context, alloc)?,
        })
    }
}

impl<A: Allocator> Decodable<A> for DataSegment<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let memory: MemIdx = decoder.read_bounded(context)?;
        if *memory != 0 {
            return Err(Error::InvalidMemoryIndex(*memory));
        }
        let offset = read_offset(decoder, context)?;
        let len: u32 = decoder.read_bounded(context)?;
        Ok(Self {
            memory,
            offset,
            init: decoder.read_bytes(context, len as usize, alloc)?,
        })
    }
}

impl BoundedDecodable for LocalDecl {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>> {
        Ok(Self {
            count: decoder.read_bounded(context)?,
            ty: decoder.read_bounded(context)?,
        })
    }
}

impl<A: Allocator> Decodable<A> for Function<A> {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let size: u32 = decoder.read_bounded(context)?;
        let start = decoder.offset();

        let locals: Vec<LocalDecl, A> = decoder.read(context, alloc)?;
        let num_locals = locals
            .iter()
            .try_fold(0u32, |total, decl| total.checked_add(decl.count))
            .ok_or(Error::TooManyLocals)?;

        // The locals may not already overrun the body.
        let locals_len = decoder.offset() - start;
        let Some(code_len) = (size as usize).checked_sub(locals_len) else {
            return Err(Error::InvalidFunctionLength {
                expected: size,
                actual: locals_len as u32,
            });
        };
        let code = decoder.read_bytes(context, code_len, alloc)?;
        if code.last() != Some(&END_OPCODE) {
            return Err(Error::MissingEndMarker);
        }
        Ok(Self {
            locals,
            num_locals,
            code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_compat::alloc::Global as GlobalAlloc;
    use crate::storage::{Buffer, MemoryEof};

    type TestDecoder = Decoder<Buffer<&'static [u8]>>;

    fn read<T: Decodable<GlobalAlloc> + Contextual>(
        bytes: &'static [u8],
    ) -> (Result<T, Error<Buffer<&'static [u8]>>>, ContextStack) {
        let mut decoder: TestDecoder = Decoder::new(Buffer::new(bytes));
        let mut context = ContextStack::default();
        let result = decoder.read(&mut context, &GlobalAlloc);
        (result, context)
    }

    #[test]
    fn test_valtypes() {
        assert_eq!(read::<ValType>(&[0x7f]).0.unwrap(), ValType::I32);
        assert_eq!(read::<ValType>(&[0x7e]).0.unwrap(), ValType::I64);
        assert_eq!(read::<ValType>(&[0x7d]).0.unwrap(), ValType::F32);
        assert_eq!(read::<ValType>(&[0x7c]).0.unwrap(), ValType::F64);
        assert!(matches!(
            read::<ValType>(&[0x7b]).0,
            Err(Error::InvalidValType(0x7b))
        ));
    }

    #[test]
    fn test_function_type() {
        let functype: FunctionType<GlobalAlloc> =
            read(&[0x60, 0x02, 0x7f, 0x7e, 0x01, 0x7c]).0.unwrap();
        assert_eq!(&functype.parameters[..], &[ValType::I32, ValType::I64]);
        assert_eq!(&functype.results[..], &[ValType::F64]);

        let (result, _) = read::<FunctionType<GlobalAlloc>>(&[0x61, 0x00, 0x00]);
        assert!(matches!(result, Err(Error::InvalidFunctionTypeTag(0x61))));
    }

    #[test]
    fn test_limits() {
        assert_eq!(
            read::<Limits>(&[0x00, 0x01]).0.unwrap(),
            Limits { min: 1, max: None }
        );
        assert_eq!(
            read::<Limits>(&[0x01, 0x01, 0x80, 0x02]).0.unwrap(),
            Limits {
                min: 1,
                max: Some(256)
            }
        );
        assert!(matches!(
            read::<Limits>(&[0x02, 0x01]).0,
            Err(Error::InvalidToken { token: 0x02, .. })
        ));
    }

    #[test]
    fn test_table_type() {
        let table: TableType = read(&[0x70, 0x00, 0x0a]).0.unwrap();
        assert_eq!(table.reftype, RefType::Func);
        assert_eq!(table.min_elements(), 10);
        assert_eq!(table.max_elements(), None);

        assert!(matches!(
            read::<TableType>(&[0x6f, 0x00, 0x0a]).0,
            Err(Error::InvalidToken {
                token: 0x6f,
                expected: &[0x70]
            })
        ));
    }

    #[test]
    fn test_global_type_mutability_encoding() {
        let global: GlobalType = read(&[0x7f, 0x00]).0.unwrap();
        assert_eq!(global.mutability, GlobalTypeMutability::Var);
        assert!(global.is_mutable());

        let global: GlobalType = read(&[0x7e, 0x01]).0.unwrap();
        assert_eq!(global.value, ValType::I64);
        assert!(!global.is_mutable());

        assert!(matches!(
            read::<GlobalType>(&[0x7f, 0x02]).0,
            Err(Error::InvalidToken { token: 0x02, .. })
        ));
    }

    #[test]
    fn test_import() {
        let import: Import<GlobalAlloc> = read(&[
            0x03, b'e', b'n', b'v', // module
            0x03, b'm', b'e', b'm', // field
            0x02, 0x01, 0x01, 0x02, // memory, limits {1, 2}
        ])
        .0
        .unwrap();
        assert_eq!(import.module.as_str(), Ok("env"));
        assert_eq!(import.field.as_str(), Ok("mem"));
        assert_eq!(
            import.descriptor,
            ImportDescriptor::Memory(MemType::new(Limits {
                min: 1,
                max: Some(2)
            }))
        );
        assert_eq!(import.descriptor.kind(), ExternKind::Memory);
    }

    #[test]
    fn test_import_invalid_kind() {
        let (result, context) = read::<Import<GlobalAlloc>>(&[0x00, 0x00, 0x04, 0x00]);
        assert!(matches!(result, Err(Error::InvalidToken { token: 0x04, .. })));
        let path: std::vec::Vec<_> = context.iter().map(|frame| frame.context).collect();
        assert_eq!(path, ["import", "importdesc", "externkind"]);
    }

    #[test]
    fn test_export() {
        let export: Export<GlobalAlloc> = read(&[0x03, b'a', b'd', b'd', 0x00, 0x05]).0.unwrap();
        assert_eq!(export.field.as_str(), Ok("add"));
        assert_eq!(export.descriptor, ExportDescriptor::Function(FuncIdx::new(5)));
        assert_eq!(export.descriptor.index(), 5);
    }

    #[test]
    fn test_name_is_not_utf8_checked() {
        let name: Name<GlobalAlloc> = read(&[0x02, 0xc3, 0x28]).0.unwrap();
        assert_eq!(&**name, &[0xc3, 0x28]);
        assert!(name.as_str().is_err());
    }

    #[test]
    fn test_data_segment() {
        let data: DataSegment<GlobalAlloc> =
            read(&[0x00, 0x41, 0x08, 0x0b, 0x03, 0xaa, 0xbb, 0xcc]).0.unwrap();
        assert_eq!(*data.memory, 0);
        assert_eq!(data.offset.as_i32(), Some(8));
        assert_eq!(&*data.init, &[0xaa, 0xbb, 0xcc]);
    }

    #[test]
    fn test_data_segment_nonzero_memory() {
        let (result, _) = read::<DataSegment<GlobalAlloc>>(&[0x01, 0x41, 0x00, 0x0b, 0x00]);
        assert!(matches!(result, Err(Error::InvalidMemoryIndex(1))));
    }

    #[test]
    fn test_segment_offset_must_be_i32_const() {
        let (result, _) = read::<DataSegment<GlobalAlloc>>(&[0x00, 0x42, 0x00, 0x0b, 0x00]);
        assert!(matches!(
            result,
            Err(Error::InvalidOffsetExpression(ConstOpcode::I64Const))
        ));

        let (result, _) = read::<ElementSegment<GlobalAlloc>>(&[0x00, 0x23, 0x00, 0x0b, 0x00]);
        assert!(matches!(
            result,
            Err(Error::InvalidOffsetExpression(ConstOpcode::GlobalGet))
        ));
    }

    #[test]
    fn test_element_segment() {
        let elem: ElementSegment<GlobalAlloc> =
            read(&[0x00, 0x41, 0x02, 0x0b, 0x03, 0x00, 0x01, 0x00]).0.unwrap();
        assert_eq!(*elem.table, 0);
        assert_eq!(elem.offset.as_i32(), Some(2));
        let init: std::vec::Vec<u32> = elem.init.iter().map(|idx| **idx).collect();
        assert_eq!(init, [0, 1, 0]);
    }

    #[test]
    fn test_function_body() {
        let func: Function<GlobalAlloc> = read(&[
            0x07, // size
            0x02, 0x02, 0x7f, 0x01, 0x7e, // locals: 2 x i32, 1 x i64
            0x01, 0x0b, // nop, end
        ])
        .0
        .unwrap();
        assert_eq!(func.num_locals, 3);
        assert_eq!(
            func.local_types().collect::<std::vec::Vec<_>>(),
            [ValType::I32, ValType::I32, ValType::I64]
        );
        assert_eq!(&*func.code, &[0x01, 0x0b]);
    }

    #[test]
    fn test_function_body_missing_end() {
        let (result, _) = read::<Function<GlobalAlloc>>(&[0x02, 0x00, 0x01]);
        assert!(matches!(result, Err(Error::MissingEndMarker)));

        let (result, _) = read::<Function<GlobalAlloc>>(&[0x01, 0x00]);
        assert!(matches!(result, Err(Error::MissingEndMarker)));
    }

    #[test]
    fn test_function_locals_overrun_body() {
        let (result, _) = read::<Function<GlobalAlloc>>(&[0x01, 0x01, 0x01, 0x7f, 0x0b]);
        assert!(matches!(
            result,
            Err(Error::InvalidFunctionLength {
                expected: 1,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_function_too_many_locals() {
        let (result, _) = read::<Function<GlobalAlloc>>(&[
            0x0e, // size
            0x02, // two declarations of u32::MAX locals
            0xff, 0xff, 0xff, 0xff, 0x0f, 0x7f, //
            0xff, 0xff, 0xff, 0xff, 0x0f, 0x7f, //
            0x0b,
        ]);
        assert!(matches!(result, Err(Error::TooManyLocals)));
    }

    #[test]
    fn test_truncated_element_reports_ordinal() {
        let (result, context) = read::<TypeSection<GlobalAlloc>>(&[
            0x02, // two types
            0x60, 0x00, 0x00, // () -> ()
            0x60, 0x01, // truncated
        ]);
        assert!(matches!(result, Err(Error::Storage(MemoryEof {}))));
        let frames: std::vec::Vec<_> = context.iter().collect();
        assert_eq!(frames[0].context, "typesec");
        assert_eq!(frames[1].context, "functype");
        assert_eq!(frames[1].index, Some(1));
        assert_eq!(frames[1].offset, 4);
    }
}
