// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! WebAssembly binary format decoding.

mod decodable_impls;
mod expr;

use core::fmt;

use log::{debug, trace};

use crate::core_compat::alloc::collections::TryReserveError;
use crate::core_compat::boxed::Box;
use crate::core_compat::vec::Vec;
use crate::leb128::{self, Leb128};
use crate::storage::Stream;
use crate::types::{
    CodeSection, ConstOpcode, CustomSection, DataSection, ElementSection, ExportSection,
    FunctionSection, GlobalSection, ImportSection, MAGIC, MemorySection, Name, SectionId,
    TableSection, TypeSection, Version,
};
use crate::{Allocator, Module};

#[cfg(feature = "std")]
use crate::storage::Buffer;

// The maximum nesting of the module grammar, with some headroom.
const MAX_DEPTH: usize = 8;

// The most elements that will be reserved up front for a vector, whatever its
// declared length. Larger vectors grow as their elements are actually decoded.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

// Byte payloads are read in chunks of at most this size, so that a bogus
// length cannot force a large allocation before the bytes are seen.
const READ_CHUNK_SIZE: usize = 0x1000;

// Represents decoding context.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(u8)]
enum ContextId {
    #[default]
    Invalid,
    CodeSec,
    CustomSec,
    Data,
    DataSec,
    Elem,
    ElemSec,
    Export,
    ExportDesc,
    ExportSec,
    Expr,
    ExternKind,
    F32,
    F64,
    Func,
    FuncIdx,
    FuncSec,
    FuncType,
    FuncTypeToken,
    Global,
    GlobalIdx,
    GlobalSec,
    GlobalType,
    I32,
    I64,
    Import,
    ImportDesc,
    ImportSec,
    Limits,
    LimitsToken,
    Local,
    Locals,
    Magic,
    MemIdx,
    MemType,
    MemorySec,
    Mut,
    Name,
    Opcode,
    ReadingBytes,
    RefType,
    ResultType,
    SectionId,
    StartSec,
    TableIdx,
    TableSec,
    TableType,
    TypeIdx,
    TypeSec,
    U32,
    ValType,
    VecFuncIdx,
    Version,
}

impl From<ContextId> for &'static str {
    fn from(id: ContextId) -> Self {
        match id {
            ContextId::Invalid => "invalid",
            ContextId::CodeSec => "codesec",
            ContextId::CustomSec => "customsec",
            ContextId::Data => "data",
            ContextId::DataSec => "datasec",
            ContextId::Elem => "elem",
            ContextId::ElemSec => "elemsec",
            ContextId::Export => "export",
            ContextId::ExportDesc => "exportdesc",
            ContextId::ExportSec => "exportsec",
            ContextId::Expr => "expr",
            ContextId::ExternKind => "externkind",
            ContextId::F32 => "f32",
            ContextId::F64 => "f64",
            ContextId::Func => "func",
            ContextId::FuncIdx => "funcidx",
            ContextId::FuncSec => "funcsec",
            ContextId::FuncType => "functype",
            ContextId::FuncTypeToken => "functype token",
            ContextId::Global => "global",
            ContextId::GlobalIdx => "globalidx",
            ContextId::GlobalSec => "globalsec",
            ContextId::GlobalType => "globaltype",
            ContextId::I32 => "i32",
            ContextId::I64 => "i64",
            ContextId::Import => "import",
            ContextId::ImportDesc => "importdesc",
            ContextId::ImportSec => "importsec",
            ContextId::Limits => "limits",
            ContextId::LimitsToken => "limits token",
            ContextId::Local => "local",
            ContextId::Locals => "vec(local)",
            ContextId::Magic => "magic",
            ContextId::MemIdx => "memidx",
            ContextId::MemType => "memtype",
            ContextId::MemorySec => "memsec",
            ContextId::Mut => "mut",
            ContextId::Name => "name",
            ContextId::Opcode => "opcode",
            ContextId::ReadingBytes => "reading bytes",
            ContextId::RefType => "reftype",
            ContextId::ResultType => "resulttype",
            ContextId::SectionId => "section ID",
            ContextId::StartSec => "startsec",
            ContextId::TableIdx => "tableidx",
            ContextId::TableSec => "tablesec",
            ContextId::TableType => "tabletype",
            ContextId::TypeIdx => "typeidx",
            ContextId::TypeSec => "typesec",
            ContextId::U32 => "u32",
            ContextId::ValType => "valtype",
            ContextId::VecFuncIdx => "vec(funcidx)",
            ContextId::Version => "version",
        }
    }
}

trait Contextual {
    const ID: ContextId;
}

/// A frame of decoding context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContextFrame {
    /// A description of what was being decoded.
    pub context: &'static str,

    /// Byte offset in the stream where this context was entered.
    pub offset: usize,

    /// The ordinal of the element within its enclosing vector, if this frame
    /// is that of a vector element.
    pub index: Option<u32>,
}

impl fmt::Display for ContextFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.context)?;
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

/// Stack for tracking decoding context during error reporting.
#[derive(Clone, Debug, Default)]
pub(crate) struct ContextStack {
    offsets: [usize; MAX_DEPTH],
    ids: [ContextId; MAX_DEPTH],
    indices: [Option<u32>; MAX_DEPTH],
    depth: u8,

    // The section being decoded, if any.
    section: Option<SectionId>,
}

impl ContextStack {
    // Pushes a new context frame, returning true if successful.
    fn push(&mut self, id: ContextId, offset: usize, index: Option<u32>) -> bool {
        let depth = self.depth as usize;
        if depth >= MAX_DEPTH {
            return false;
        }
        self.offsets[depth] = offset;
        self.ids[depth] = id;
        self.indices[depth] = index;
        self.depth += 1;
        true
    }

    // Pop the top context frame.
    fn pop(&mut self) {
        debug_assert!(self.depth > 0, "{self:#?}");
        self.depth -= 1;
    }

    // Returns an iterator over frames in "pushed" order (outermost to
    // innermost).
    fn iter(&self) -> impl Iterator<Item = ContextFrame> + '_ {
        self.offsets
            .iter()
            .zip(&self.ids)
            .zip(&self.indices)
            .take(self.depth as usize)
            .map(|((&offset, &id), &index)| ContextFrame {
                context: id.into(),
                offset,
                index,
            })
    }
}

/// A decoding error with additional context around what hierarchy of things
/// were being decoded at the time.
pub struct ErrorWithContext<Storage: Stream> {
    /// The underlying decoding error.
    pub error: Error<Storage>,
    pub(crate) context: ContextStack,
}

impl<Storage: Stream> ErrorWithContext<Storage> {
    /// The section being decoded when the error arose, if any.
    pub fn section(&self) -> Option<SectionId> {
        self.context.section
    }

    /// The decoding context at the point of failure, outermost first.
    pub fn frames(&self) -> impl Iterator<Item = ContextFrame> + '_ {
        self.context.iter()
    }

    /// A classification of the underlying error.
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl<Storage: Stream> fmt::Debug for ErrorWithContext<Storage> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.error)?;
        if let Some(section) = self.context.section {
            write!(f, " (in {section:?} section)")?;
        }
        for (i, frame) in self.context.iter().enumerate() {
            write!(f, "\n{:#x}: ", frame.offset)?;
            for _ in 0..i {
                write!(f, "  ")?;
            }
            write!(f, "{frame}")?;
        }
        Ok(())
    }
}

impl<Storage: Stream> fmt::Display for ErrorWithContext<Storage> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(section) = self.context.section {
            write!(f, "{section:?} section: ")?;
        }
        write!(f, "{}", self.error)?;
        let mut frames = self.context.iter().peekable();
        if let Some(first) = frames.peek() {
            write!(f, " at {:#x} (", first.offset)?;
            let mut separator = "";
            for frame in frames {
                write!(f, "{separator}{frame}")?;
                separator = " > ";
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl<Storage: Stream> core::error::Error for ErrorWithContext<Storage> {}

/// A coarse classification of decoding errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Bad or truncated magic number or version.
    Header,
    /// The input ended in the middle of a construct.
    Truncated,
    /// An unrecognized tag or kind byte.
    InvalidTag,
    /// A well-formed encoding that breaks a structural rule of the format.
    Structural,
    /// A failure of the underlying storage other than reaching its end.
    Storage,
    /// Failed memory allocation.
    Alloc,
}

/// Represents errors that can arise during module decoding.
pub enum Error<Storage: Stream> {
    /// Failed memory allocation.
    AllocError,
    /// A given section appears more than once in the module.
    DuplicateSection(SectionId),
    /// Decoder context stack exceeded maximum depth.
    ExcessiveParsingDepth {
        context: &'static str,
        offset: usize,
    },
    /// A constant expression began with an opcode that is not allowed there.
    InvalidExprOpcode(u8),
    /// Function body length doesn't match the declared length.
    InvalidFunctionLength { expected: u32, actual: u32 },
    /// A function type did not begin with the `0x60` tag.
    InvalidFunctionTypeTag(u8),
    /// Invalid WebAssembly magic number, or `None` if the input ended first.
    InvalidMagic(Option<u32>),
    /// A data segment targets a memory other than memory 0.
    InvalidMemoryIndex(u32),
    /// A segment offset is not given by `i32.const`.
    InvalidOffsetExpression(ConstOpcode),
    /// Unknown section ID.
    InvalidSectionId(u8),
    /// Section length doesn't match the declared length.
    InvalidSectionLength {
        id: SectionId,
        expected: u32,
        actual: u32,
    },
    /// Invalid byte token encountered during decoding.
    InvalidToken {
        token: u8,
        expected: &'static [u8],
    },
    /// Invalid value type encoding encountered.
    InvalidValType(u8),
    /// A function body does not end with the `end` opcode.
    MissingEndMarker,
    /// (Non-custom) sections appear in the wrong order.
    OutOfOrderSection { before: SectionId, after: SectionId },
    /// Error from the underlying storage.
    Storage(Storage::Error),
    /// The total number of a function's locals does not fit in a u32.
    TooManyLocals,
    /// Unsupported WebAssembly version, or `None` if the input ended first.
    UnknownVersion(Option<u32>),
    /// A constant expression was followed by something other than `end`.
    UnterminatedExpression(u8),
}

impl<Storage: Stream> Error<Storage> {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::AllocError => ErrorKind::Alloc,
            Error::InvalidMagic(_) | Error::UnknownVersion(_) => ErrorKind::Header,
            Error::Storage(err) if Storage::is_eof(err) => ErrorKind::Truncated,
            Error::Storage(_) => ErrorKind::Storage,
            Error::InvalidExprOpcode(_)
            | Error::InvalidSectionId(_)
            | Error::InvalidToken { .. }
            | Error::InvalidValType(_) => ErrorKind::InvalidTag,
            Error::DuplicateSection(_)
            | Error::ExcessiveParsingDepth { .. }
            | Error::InvalidFunctionLength { .. }
            | Error::InvalidFunctionTypeTag(_)
            | Error::InvalidMemoryIndex(_)
            | Error::InvalidOffsetExpression(_)
            | Error::InvalidSectionLength { .. }
            | Error::MissingEndMarker
            | Error::OutOfOrderSection { .. }
            | Error::TooManyLocals
            | Error::UnterminatedExpression(_) => ErrorKind::Structural,
        }
    }
}

impl<Storage: Stream> fmt::Display for Error<Storage> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocError => write!(f, "allocation failure"),
            Error::DuplicateSection(id) => write!(f, "duplicate of section ({id:?})"),
            Error::ExcessiveParsingDepth { context, offset } => {
                write!(f, "unexpected frame at {offset:#x}: {context}")
            }
            Error::InvalidExprOpcode(op) => write!(
                f,
                "invalid expression opcode ({op:#x}); expected one of [23, 41, 42, 43, 44]"
            ),
            Error::InvalidFunctionLength { expected, actual } => write!(
                f,
                "invalid func length: expected {expected:#x}; got {actual:#x}"
            ),
            Error::InvalidFunctionTypeTag(tag) => {
                write!(f, "invalid function type tag ({tag:#x}); expected 0x60")
            }
            Error::InvalidMagic(Some(magic)) => write!(f, "invalid magic number ({magic:#x})"),
            Error::InvalidMagic(None) => write!(f, "invalid magic number (truncated)"),
            Error::InvalidMemoryIndex(idx) => {
                write!(f, "invalid memory index ({idx}); only memory 0 may be initialized")
            }
            Error::InvalidOffsetExpression(op) => {
                write!(f, "invalid offset expression ({op:?}); expected i32.const")
            }
            Error::InvalidSectionId(id) => {
                write!(f, "invalid section ID ({id:#x}); expected 0x0 through 0xb")
            }
            Error::InvalidSectionLength {
                id,
                expected,
                actual,
            } => write!(
                f,
                "invalid section length for {id:?}: expected {expected:#x}; got {actual:#x}"
            ),
            Error::InvalidToken { token, expected } => {
                write!(f, "invalid byte token ({token:#x}); expected one of {expected:x?}")
            }
            Error::InvalidValType(valtype) => write!(
                f,
                "invalid value type ({valtype:#x}); expected one of [7f, 7e, 7d, 7c]"
            ),
            Error::MissingEndMarker => write!(f, "function body is missing its end marker"),
            Error::OutOfOrderSection { before, after } => {
                write!(f, "out-of-order sections: {before:?} before {after:?}")
            }
            Error::Storage(err) => write!(f, "{err:?}"),
            Error::TooManyLocals => write!(f, "too many locals"),
            Error::UnknownVersion(Some(version)) => write!(f, "invalid version ({version:#x})"),
            Error::UnknownVersion(None) => write!(f, "invalid version (truncated)"),
            Error::UnterminatedExpression(byte) => {
                write!(f, "expression not terminated (found {byte:#x})")
            }
        }
    }
}

impl<Storage: Stream> fmt::Debug for Error<Storage> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<Storage: Stream> core::error::Error for Error<Storage> {}

impl<Storage: Stream> From<TryReserveError> for Error<Storage> {
    fn from(_: TryReserveError) -> Self {
        Error::AllocError
    }
}

/// The error returned when decoding a module from a file path.
#[cfg(feature = "std")]
#[derive(Debug)]
pub enum FileError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file's contents are not a valid module.
    Decode(ErrorWithContext<Buffer<std::vec::Vec<u8>>>),
}

#[cfg(feature = "std")]
impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::Io(err) => write!(f, "failed to read module: {err}"),
            FileError::Decode(err) => write!(f, "failed to decode module: {err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::Io(err) => Some(err),
            FileError::Decode(err) => Some(err),
        }
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for FileError {
    fn from(err: std::io::Error) -> Self {
        FileError::Io(err)
    }
}

#[cfg(feature = "std")]
impl From<ErrorWithContext<Buffer<std::vec::Vec<u8>>>> for FileError {
    fn from(err: ErrorWithContext<Buffer<std::vec::Vec<u8>>>) -> Self {
        FileError::Decode(err)
    }
}

pub(crate) struct Decoder<Storage: Stream> {
    stream: Storage,
}

impl<Storage: Stream> Decoder<Storage> {
    fn new(stream: Storage) -> Self {
        Self { stream }
    }

    // Pushes a context frame before a call, popping it if successful.
    fn with_context<F, R>(
        &mut self,
        context: &mut ContextStack,
        id: ContextId,
        f: F,
    ) -> Result<R, Error<Storage>>
    where
        F: FnOnce(&mut Self, &mut ContextStack) -> Result<R, Error<Storage>>,
    {
        self.with_indexed_context(context, id, None, f)
    }

    // As above, additionally recording the ordinal of a vector element.
    fn with_indexed_context<F, R>(
        &mut self,
        context: &mut ContextStack,
        id: ContextId,
        index: Option<u32>,
        f: F,
    ) -> Result<R, Error<Storage>>
    where
        F: FnOnce(&mut Self, &mut ContextStack) -> Result<R, Error<Storage>>,
    {
        let offset = self.stream.offset();
        if !context.push(id, offset, index) {
            return Err(Error::ExcessiveParsingDepth {
                context: id.into(),
                offset,
            });
        }
        let val = f(self, context)?;
        context.pop();
        Ok(val)
    }

    fn offset(&mut self) -> usize {
        self.stream.offset()
    }

    fn read_byte_raw(&mut self) -> Result<u8, Error<Storage>> {
        self.stream.read_byte().map_err(Error::Storage)
    }

    fn read_leb128_raw<T: Leb128>(&mut self) -> Result<T, Error<Storage>> {
        leb128::read(|| self.read_byte_raw()).map(|(value, _)| value)
    }

    fn read_exact_raw(&mut self, buf: &mut [u8]) -> Result<(), Error<Storage>> {
        self.stream.read_exact(buf).map_err(Error::Storage)
    }

    // Reads one of the fixed 4-byte header fields. Running out of input here
    // is reported as the given header error rather than as a storage error.
    fn read_header_field(&mut self, truncated: Error<Storage>) -> Result<[u8; 4], Error<Storage>> {
        let mut field = [0u8; 4];
        match self.stream.read_exact(&mut field) {
            Ok(()) => Ok(field),
            Err(err) if Storage::is_eof(&err) => Err(truncated),
            Err(err) => Err(Error::Storage(err)),
        }
    }

    fn read_bytes<A: Allocator>(
        &mut self,
        context: &mut ContextStack,
        count: usize,
        alloc: &A,
    ) -> Result<Box<[u8], A>, Error<Storage>> {
        let mut buf = Vec::new_in(alloc.clone());
        buf.try_reserve_exact(count.min(READ_CHUNK_SIZE))?;
        self.with_context(context, ContextId::ReadingBytes, |decoder, _| {
            let mut remaining = count;
            while remaining > 0 {
                let chunk = remaining.min(READ_CHUNK_SIZE);
                let start = buf.len();
                buf.try_reserve(chunk)?;
                buf.resize(start + chunk, 0);
                decoder.read_exact_raw(&mut buf[start..])?;
                remaining -= chunk;
            }
            Ok(())
        })?;
        Ok(buf.into_boxed_slice())
    }

    fn read<A: Allocator, T: Decodable<A> + Contextual>(
        &mut self,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<T, Error<Storage>> {
        self.with_context(context, T::ID, |decoder, context| {
            T::decode(decoder, context, alloc)
        })
    }

    fn read_element<A: Allocator, T: Decodable<A> + Contextual>(
        &mut self,
        context: &mut ContextStack,
        alloc: &A,
        index: u32,
    ) -> Result<T, Error<Storage>> {
        self.with_indexed_context(context, T::ID, Some(index), |decoder, context| {
            T::decode(decoder, context, alloc)
        })
    }

    fn read_bounded<T: BoundedDecodable + Contextual>(
        &mut self,
        context: &mut ContextStack,
    ) -> Result<T, Error<Storage>> {
        self.with_context(context, T::ID, |decoder, context| {
            T::decode(decoder, context)
        })
    }

    fn read_header(&mut self, context: &mut ContextStack) -> Result<Version, Error<Storage>> {
        self.with_context(context, ContextId::Magic, |decoder, _| {
            let magic = decoder.read_header_field(Error::InvalidMagic(None))?;
            if magic == MAGIC {
                Ok(())
            } else {
                Err(Error::InvalidMagic(Some(u32::from_le_bytes(magic))))
            }
        })?;
        self.with_context(context, ContextId::Version, |decoder, _| {
            let field = decoder.read_header_field(Error::UnknownVersion(None))?;
            let version = u32::from_le_bytes(field);
            Version::try_from(version).map_err(|_| Error::UnknownVersion(Some(version)))
        })
    }

    // Reads the body of a custom section of the given declared length.
    fn read_custom_section<A: Allocator>(
        &mut self,
        context: &mut ContextStack,
        len: u32,
        alloc: &A,
    ) -> Result<CustomSection<A>, Error<Storage>> {
        self.with_context(context, ContextId::CustomSec, |decoder, context| {
            let name_start = decoder.offset();
            let name: Name<A> = decoder.read(context, alloc)?;
            let name_len = decoder.offset() - name_start;

            // The payload is whatever the name leaves of the declared length.
            let Some(payload_len) = (len as usize).checked_sub(name_len) else {
                return Err(Error::InvalidSectionLength {
                    id: SectionId::Custom,
                    expected: len,
                    actual: name_len as u32,
                });
            };
            let bytes = decoder.read_bytes(context, payload_len, alloc)?;
            Ok(CustomSection { name, bytes })
        })
    }
}

// Types that can be decoded from a storage stream, possibly with allocation.
trait Decodable<A>: Sized
where
    A: Allocator,
{
    /// Decode this type from the binary stream.
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>>;
}

// Types that can be decoded from a storage stream without allocation.
trait BoundedDecodable: Sized + Copy {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
    ) -> Result<Self, Error<Storage>>;
}

impl<Bounded: BoundedDecodable, A: Allocator> Decodable<A> for Bounded {
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        _: &A,
    ) -> Result<Self, Error<Storage>> {
        <Self as BoundedDecodable>::decode(decoder, context)
    }
}

impl<T, A> Decodable<A> for Vec<T, A>
where
    T: Decodable<A> + Contextual,
    A: Allocator,
{
    fn decode<Storage: Stream>(
        decoder: &mut Decoder<Storage>,
        context: &mut ContextStack,
        alloc: &A,
    ) -> Result<Self, Error<Storage>> {
        let len: u32 = decoder.read_bounded(context)?;
        let mut vec = Vec::new_in(alloc.clone());
        vec.try_reserve_exact((len as usize).min(MAX_PREALLOCATED_ELEMENTS))?;
        for index in 0..len {
            let element = decoder.read_element(context, alloc, index)?;
            vec.try_reserve(1)?;
            vec.push(element);
        }
        Ok(vec)
    }
}

// Decodes a WebAssembly module from a storage stream.
//
// # Arguments
// * `storage` - Data stream containing WASM binary
// * `context` - Context stack for error reporting
// * `alloc` - Allocator for decoded data
pub(crate) fn decode_module<Storage, A>(
    storage: Storage,
    context: &mut ContextStack,
    alloc: &A,
) -> Result<Module<A>, Error<Storage>>
where
    Storage: Stream,
    A: Allocator,
{
    let mut decoder = Decoder::new(storage);
    let version = decoder.read_header(context)?;

    let mut customsec = None;
    let mut typesec = TypeSection::new(Vec::new_in(alloc.clone()));
    let mut importsec = ImportSection::new(Vec::new_in(alloc.clone()));
    let mut funcsec = FunctionSection::new(Vec::new_in(alloc.clone()));
    let mut tablesec = TableSection::new(Vec::new_in(alloc.clone()));
    let mut memsec = MemorySection::new(Vec::new_in(alloc.clone()));
    let mut globalsec = GlobalSection::new(Vec::new_in(alloc.clone()));
    let mut exportsec = ExportSection::new(Vec::new_in(alloc.clone()));
    let mut startsec = None;
    let mut elemsec = ElementSection::new(Vec::new_in(alloc.clone()));
    let mut codesec = CodeSection::new(Vec::new_in(alloc.clone()));
    let mut datasec = DataSection::new(Vec::new_in(alloc.clone()));

    // The last non-custom section ID seen.
    let mut last_id = None;
    loop {
        // There is no in-band signal in the WASM format for the end of a
        // module. The best we can generically do is expect an EOF at a section
        // boundary.
        let id = match decoder.read_bounded::<SectionId>(context) {
            Err(Error::Storage(err)) if Storage::is_eof(&err) => {
                context.pop();
                break;
            }
            id => id?,
        };
        context.section = Some(id);

        // Apart from custom sections, which can appear anywhere in the format,
        // sections must appear at most once and in order.
        if id != SectionId::Custom {
            if let Some(last_id) = last_id {
                if id == last_id {
                    return Err(Error::DuplicateSection(id));
                }
                if id < last_id {
                    return Err(Error::OutOfOrderSection {
                        before: last_id,
                        after: id,
                    });
                }
            }
            last_id = Some(id);
        }

        let len: u32 = decoder.read_bounded(context)?;
        let offset_start = decoder.offset();
        trace!("section {id:?}: {len:#x} bytes at {offset_start:#x}");
        match id {
            SectionId::Custom => {
                customsec = Some(decoder.read_custom_section(context, len, alloc)?);
            }
            SectionId::Type => typesec = decoder.read(context, alloc)?,
            SectionId::Import => importsec = decoder.read(context, alloc)?,
            SectionId::Function => funcsec = decoder.read(context, alloc)?,
            SectionId::Table => tablesec = decoder.read(context, alloc)?,
            SectionId::Memory => memsec = decoder.read(context, alloc)?,
            SectionId::Global => globalsec = decoder.read(context, alloc)?,
            SectionId::Export => exportsec = decoder.read(context, alloc)?,
            SectionId::Start => startsec = Some(decoder.read_bounded(context)?),
            SectionId::Element => elemsec = decoder.read(context, alloc)?,
            SectionId::Code => codesec = decoder.read(context, alloc)?,
            SectionId::Data => datasec = decoder.read(context, alloc)?,
        }
        // Only custom sections are framed by their declared length; elsewhere
        // the body's own encoding decides where the section ends.
        let actual_section_len = decoder.offset() - offset_start;
        if actual_section_len != (len as usize) {
            debug!("section {id:?}: declared {len:#x} bytes; decoded {actual_section_len:#x}");
        }
        context.section = None;
    }

    debug!(
        "decoded module: {} types, {} imports, {} functions, {} exports, {} data segments",
        typesec.len(),
        importsec.len(),
        codesec.len(),
        exportsec.len(),
        datasec.len(),
    );
    Ok(Module {
        magic: MAGIC,
        version,
        customsec,
        typesec,
        importsec,
        funcsec,
        tablesec,
        memsec,
        globalsec,
        exportsec,
        startsec,
        elemsec,
        codesec,
        datasec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_compat::alloc::Global;
    use crate::storage::{Buffer, MemoryEof};

    fn decoder(bytes: &[u8]) -> Decoder<Buffer<&[u8]>> {
        Decoder::new(Buffer::new(bytes))
    }

    #[test]
    fn test_context_stack_records_path() {
        let mut stack = ContextStack::default();
        assert!(stack.push(ContextId::TypeSec, 0xa, None));
        assert!(stack.push(ContextId::FuncType, 0xc, Some(2)));
        let frames: std::vec::Vec<_> = stack.iter().collect();
        assert_eq!(
            frames,
            [
                ContextFrame {
                    context: "typesec",
                    offset: 0xa,
                    index: None
                },
                ContextFrame {
                    context: "functype",
                    offset: 0xc,
                    index: Some(2)
                },
            ]
        );
        stack.pop();
        assert_eq!(stack.iter().count(), 1);
    }

    #[test]
    fn test_context_stack_depth_is_bounded() {
        let mut stack = ContextStack::default();
        for _ in 0..MAX_DEPTH {
            assert!(stack.push(ContextId::U32, 0, None));
        }
        assert!(!stack.push(ContextId::U32, 0, None));
    }

    #[test]
    fn test_failed_context_is_retained() {
        let mut decoder = decoder(&[0x80]);
        let mut context = ContextStack::default();
        let result: Result<u32, _> = decoder.read_bounded(&mut context);
        assert!(matches!(result, Err(Error::Storage(MemoryEof {}))));
        let frames: std::vec::Vec<_> = context.iter().collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].context, "u32");
    }

    #[test]
    fn test_read_bytes_spanning_chunks() {
        let bytes: std::vec::Vec<u8> = (0..(READ_CHUNK_SIZE * 2 + 3)).map(|i| i as u8).collect();
        let mut decoder = decoder(&bytes);
        let mut context = ContextStack::default();
        let read = decoder
            .read_bytes(&mut context, bytes.len(), &Global)
            .unwrap();
        assert_eq!(&*read, &bytes[..]);
        assert_eq!(decoder.offset(), bytes.len());
    }

    #[test]
    fn test_read_bytes_past_end() {
        let mut decoder = decoder(&[1, 2, 3]);
        let mut context = ContextStack::default();
        let result = decoder.read_bytes(&mut context, 4, &Global);
        assert!(matches!(result, Err(Error::Storage(MemoryEof {}))));
        assert_eq!(context.iter().last().unwrap().context, "reading bytes");
    }

    #[test]
    fn test_vec_with_huge_declared_length() {
        // A count of u32::MAX with a single element present.
        let mut decoder = decoder(&[0xff, 0xff, 0xff, 0xff, 0x0f, 0x7f]);
        let mut context = ContextStack::default();
        let result =
            <Vec<crate::types::ValType, Global> as Decodable<Global>>::decode(
                &mut decoder,
                &mut context,
                &Global,
            );
        assert!(matches!(result, Err(Error::Storage(MemoryEof {}))));
        let last = context.iter().last().unwrap();
        assert_eq!(last.context, "valtype");
        assert_eq!(last.index, Some(1));
    }

    #[test]
    fn test_error_kinds() {
        type E = Error<Buffer<&'static [u8]>>;
        assert_eq!(E::InvalidMagic(None).kind(), ErrorKind::Header);
        assert_eq!(E::UnknownVersion(Some(2)).kind(), ErrorKind::Header);
        assert_eq!(E::Storage(MemoryEof {}).kind(), ErrorKind::Truncated);
        assert_eq!(E::InvalidValType(0x40).kind(), ErrorKind::InvalidTag);
        assert_eq!(E::InvalidSectionId(12).kind(), ErrorKind::InvalidTag);
        assert_eq!(E::InvalidMemoryIndex(1).kind(), ErrorKind::Structural);
        assert_eq!(E::MissingEndMarker.kind(), ErrorKind::Structural);
        assert_eq!(E::AllocError.kind(), ErrorKind::Alloc);
    }

    #[test]
    fn test_error_messages() {
        type E = Error<Buffer<&'static [u8]>>;
        assert_eq!(
            E::UnterminatedExpression(0x0c).to_string(),
            "expression not terminated (found 0xc)"
        );
        assert_eq!(
            E::InvalidExprOpcode(0x20).to_string(),
            "invalid expression opcode (0x20); expected one of [23, 41, 42, 43, 44]"
        );
        assert_eq!(
            E::InvalidValType(0x7b).to_string(),
            "invalid value type (0x7b); expected one of [7f, 7e, 7d, 7c]"
        );
        assert_eq!(
            E::InvalidSectionId(0xc).to_string(),
            "invalid section ID (0xc); expected 0x0 through 0xb"
        );
        assert_eq!(
            E::InvalidMagic(Some(0x1234)).to_string(),
            "invalid magic number (0x1234)"
        );
    }
}
