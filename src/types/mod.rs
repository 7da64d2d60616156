// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! WebAssembly type definitions.
//!
//! This module contains the typed representation of everything a version 1
//! module can declare: value types, function signatures, imports, exports,
//! segments and the sections that hold them.

mod expr;
pub use expr::*;

use core::{fmt, str};

use num_enum::TryFromPrimitive;

use crate::Allocator;
use crate::core_compat::boxed::Box;
use crate::core_compat::vec::Vec;

// Defines a public newtype without public mutable access to the underlying
// type, along with some convenience trait implementations like Deref and AsRef.
macro_rules! newtype {
    (
        $(#[$meta:meta])*
        pub struct $type:ident<A: Allocator>($underlying:ty);
    ) => {
        $(#[$meta])*
        pub struct $type<A: Allocator>($underlying);

        newtype!(@impl [A: Allocator], $type<A>, $underlying);
    };
    (
        $(#[$meta:meta])*
        pub struct $type:ident($underlying:ty);
    ) => {
        $(#[$meta])*
        pub struct $type($underlying);

        newtype!(@impl [], $type, $underlying);
    };
    (@impl [$($generic_params:tt)*], $qualified_type:ty, $underlying:ty) => {
        impl<$($generic_params)*> $qualified_type {
            pub fn new(value: $underlying) -> Self {
                Self(value)
            }
        }

        impl<$($generic_params)*> ::core::ops::Deref for $qualified_type {
            type Target = $underlying;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl<$($generic_params)*> AsRef<$underlying> for $qualified_type {
            fn as_ref(&self) -> &$underlying {
                &self.0
            }
        }
    };
}

/// The module preamble: `\0asm`.
pub const MAGIC: [u8; 4] = *b"\0asm";

/// WebAssembly module version.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum Version {
    V1 = 1,
}

newtype!(
    /// A name (of a module, section, or field).
    ///
    /// The bytes are kept as they appear on the wire; whether they form valid
    /// UTF-8 is left to the consumer.
    #[derive(Clone)]
    pub struct Name<A: Allocator>(Box<[u8], A>);
);

impl<A: Allocator> PartialEq for Name<A> {
    fn eq(&self, other: &Self) -> bool {
        *self.0 == *other.0
    }
}

impl<A: Allocator> Eq for Name<A> {}

impl<A: Allocator> Name<A> {
    /// The name as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(&self.0)
    }
}

impl<A: Allocator> fmt::Debug for Name<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(name) => write!(f, "{name:?}"),
            Err(_) => write!(f, "{:02x?}", &*self.0),
        }
    }
}

/// The type of a reference to an object in the runtime store.
///
/// Only function references may be stored in a table in this format version.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum RefType {
    /// Function reference type.
    Func = 0x70,
}

/// Value types classify the individual values that WebAssembly code can compute
/// with and the values that a variable accepts.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ValType {
    /// 32-bit integer.
    I32 = 0x7f,
    /// 64-bit integer.
    I64 = 0x7e,
    /// 32-bit floating point number.
    F32 = 0x7d,
    /// 64-bit floating point number.
    F64 = 0x7c,
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValType::I32 => "i32",
            ValType::I64 => "i64",
            ValType::F32 => "f32",
            ValType::F64 => "f64",
        })
    }
}

newtype!(
    /// The sequence of types representing the inputs or results of a function.
    #[derive(Debug, Clone)]
    pub struct ResultType<A: Allocator>(Vec<ValType, A>);
);

/// The signature of a function, mapping parameters to results.
#[derive(Clone, Debug)]
pub struct FunctionType<A: Allocator> {
    pub parameters: ResultType<A>,
    pub results: ResultType<A>,
}

/// The size range of the resizeable storage associated with memory (# of pages)
/// and table types (# of elements).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    /// Minimum size.
    pub min: u32,
    /// Maximum size, with None indicating that there is no upper limit.
    pub max: Option<u32>,
}

newtype!(
    /// A linear memory type with its size limits.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MemType(Limits);
);

impl MemType {
    /// The WebAssembly page size.
    pub const PAGE_SIZE: usize = 0x1_0000; // 64 KiB

    /// The minimum size in bytes of the linear memory region.
    pub const fn min_size_bytes(&self) -> usize {
        (self.0.min as usize) * Self::PAGE_SIZE
    }

    /// The maximum size in bytes of the linear memory region, if any.
    pub fn max_size_bytes(&self) -> Option<usize> {
        self.0.max.map(|max| (max as usize) * Self::PAGE_SIZE)
    }
}

/// WebAssembly table type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TableType {
    /// Type of references stored in table.
    pub reftype: RefType,
    /// Table size limits.
    pub limits: Limits,
}

impl TableType {
    /// The minimum number of elements in the table.
    pub const fn min_elements(&self) -> u32 {
        self.limits.min
    }

    /// The maximum number of elements in the table, if any.
    pub const fn max_elements(&self) -> Option<u32> {
        self.limits.max
    }
}

/// The mutability of a global variable.
///
/// Note the wire encoding: 0 marks a mutable global and 1 an immutable one.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum GlobalTypeMutability {
    /// Mutable.
    Var = 0x00,
    /// Immutable.
    Const = 0x01,
}

/// Represents the type of a global variable.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GlobalType {
    /// The type of the global.
    pub value: ValType,

    /// The mutability of the global.
    pub mutability: GlobalTypeMutability,
}

impl GlobalType {
    pub fn is_mutable(self) -> bool {
        self.mutability == GlobalTypeMutability::Var
    }
}

newtype!(
    /// An index into the type section.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct TypeIdx(u32);
);

newtype!(
    /// An index into the function index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct FuncIdx(u32);
);

newtype!(
    /// An index into the table index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct TableIdx(u32);
);

newtype!(
    /// An index into the memory index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct MemIdx(u32);
);

newtype!(
    /// An index into the global index space.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct GlobalIdx(u32);
);

/// Section identifier within a module.
///
/// Non-custom sections must appear in a module in ascending ID order, which
/// `Ord` reflects.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, TryFromPrimitive)]
#[repr(u8)]
pub enum SectionId {
    /// Custom section with arbitrary data.
    Custom = 0,
    /// Function type declarations.
    Type = 1,
    /// Import declarations.
    Import = 2,
    /// Function type indices for module functions.
    Function = 3,
    /// Table declarations.
    Table = 4,
    /// Memory declarations.
    Memory = 5,
    /// Global declarations.
    Global = 6,
    /// Export declarations.
    Export = 7,
    /// Start function index.
    Start = 8,
    /// Element segments for table initialization.
    Element = 9,
    /// Function bodies.
    Code = 10,
    /// Data segments for memory initialization.
    Data = 11,
}

/// Custom section with arbitrary binary data.
#[derive(Clone, Debug)]
pub struct CustomSection<A: Allocator> {
    /// Section name.
    pub name: Name<A>,
    /// Section content.
    pub bytes: Box<[u8], A>,
}

newtype!(
    /// Section containing function type declarations.
    #[derive(Clone, Debug)]
    pub struct TypeSection<A: Allocator>(Vec<FunctionType<A>, A>);
);

/// The kind of entity an import or export refers to, with its wire tag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u8)]
pub enum ExternKind {
    Function = 0x0,
    Table = 0x1,
    Memory = 0x2,
    Global = 0x3,
}

/// Import descriptor types.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ImportDescriptor {
    /// Import a function with the given type index.
    Function(TypeIdx),
    /// Import a table with the given type.
    Table(TableType),
    /// Import a memory with the given type.
    Memory(MemType),
    /// Import a global with the given type.
    Global(GlobalType),
}

impl ImportDescriptor {
    pub fn kind(&self) -> ExternKind {
        match self {
            ImportDescriptor::Function(_) => ExternKind::Function,
            ImportDescriptor::Table(_) => ExternKind::Table,
            ImportDescriptor::Memory(_) => ExternKind::Memory,
            ImportDescriptor::Global(_) => ExternKind::Global,
        }
    }
}

/// An import declaration.
#[derive(Clone, Debug)]
pub struct Import<A: Allocator> {
    /// Name of the module to import from.
    pub module: Name<A>,
    /// Name of the imported entity.
    pub field: Name<A>,
    /// Type of the imported entity.
    pub descriptor: ImportDescriptor,
}

newtype!(
    /// Section containing import declarations.
    #[derive(Clone, Debug)]
    pub struct ImportSection<A: Allocator>(Vec<Import<A>, A>);
);

newtype!(
    /// Section containing type indices for module-defined functions.
    #[derive(Clone, Debug)]
    pub struct FunctionSection<A: Allocator>(Vec<TypeIdx, A>);
);

newtype!(
    /// Section containing table type declarations.
    #[derive(Clone, Debug)]
    pub struct TableSection<A: Allocator>(Vec<TableType, A>);
);

newtype!(
    /// Section containing linear memory type declarations.
    #[derive(Clone, Debug)]
    pub struct MemorySection<A: Allocator>(Vec<MemType, A>);
);

/// A global declaration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Global {
    /// Global type and mutability.
    pub ty: GlobalType,
    /// Initialization expression.
    pub init: ConstExpression,
}

newtype!(
    /// Section containing global variable declarations.
    #[derive(Clone, Debug)]
    pub struct GlobalSection<A: Allocator>(Vec<Global, A>);
);

/// Describes what kind of entity is being exported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportDescriptor {
    /// Export a function with the given index.
    Function(FuncIdx),
    /// Export a table with the given index.
    Table(TableIdx),
    /// Export a memory with the given index.
    Memory(MemIdx),
    /// Export a global with the given index.
    Global(GlobalIdx),
}

impl ExportDescriptor {
    pub fn kind(self) -> ExternKind {
        match self {
            ExportDescriptor::Function(_) => ExternKind::Function,
            ExportDescriptor::Table(_) => ExternKind::Table,
            ExportDescriptor::Memory(_) => ExternKind::Memory,
            ExportDescriptor::Global(_) => ExternKind::Global,
        }
    }

    /// The exported entity's position in the index space of its kind.
    pub fn index(self) -> u32 {
        match self {
            ExportDescriptor::Function(idx) => *idx,
            ExportDescriptor::Table(idx) => *idx,
            ExportDescriptor::Memory(idx) => *idx,
            ExportDescriptor::Global(idx) => *idx,
        }
    }
}

/// An export declaration.
#[derive(Clone, Debug)]
pub struct Export<A: Allocator> {
    /// Name of the exported entity.
    pub field: Name<A>,
    /// Type and index of the exported entity.
    pub descriptor: ExportDescriptor,
}

newtype!(
    /// Section containing export declarations.
    #[derive(Clone, Debug)]
    pub struct ExportSection<A: Allocator>(Vec<Export<A>, A>);
);

newtype!(
    /// Holds the index of the start function.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct StartSection(FuncIdx);
);

newtype!(
    /// Section containing element segments for table initialization.
    #[derive(Clone, Debug)]
    pub struct ElementSection<A: Allocator>(Vec<ElementSegment<A>, A>);
);

/// An element segment, initializing a range of a table with function
/// references.
#[derive(Clone, Debug)]
pub struct ElementSegment<A: Allocator> {
    /// Index of the table to initialize.
    pub table: TableIdx,
    /// The starting offset within the table; always an `i32.const`.
    pub offset: ConstExpression,
    /// The functions to place in the table, in order.
    pub init: Vec<FuncIdx, A>,
}

/// A run of identically-typed local variables.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LocalDecl {
    /// How many locals this declaration introduces.
    pub count: u32,
    /// Their type.
    pub ty: ValType,
}

/// A function body from the code section.
#[derive(Clone, Debug)]
pub struct Function<A: Allocator> {
    /// Local variable declarations, as they appear in the binary.
    pub locals: Vec<LocalDecl, A>,
    /// The total number of locals across all declarations.
    pub num_locals: u32,
    /// The raw instruction sequence, including the final `end`.
    pub code: Box<[u8], A>,
}

impl<A: Allocator> Function<A> {
    /// The type of each local in order, with declarations expanded.
    pub fn local_types(&self) -> impl Iterator<Item = ValType> + '_ {
        self.locals
            .iter()
            .flat_map(|decl| core::iter::repeat_n(decl.ty, decl.count as usize))
    }
}

newtype!(
    /// Section containing function bodies.
    #[derive(Clone, Debug)]
    pub struct CodeSection<A: Allocator>(Vec<Function<A>, A>);
);

/// A data segment for initializing linear memory.
#[derive(Clone, Debug)]
pub struct DataSegment<A: Allocator> {
    /// Index of the memory to initialize; always 0 in this format version.
    pub memory: MemIdx,
    /// The starting offset within the memory; always an `i32.const`.
    pub offset: ConstExpression,
    /// The initial data bytes for this segment.
    pub init: Box<[u8], A>,
}

newtype!(
    /// Section containing data segments for memory initialization.
    #[derive(Clone, Debug)]
    pub struct DataSection<A: Allocator>(Vec<DataSegment<A>, A>);
);
