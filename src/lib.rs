// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! A strict decoder for WebAssembly 1.0 binary modules.
//!
//! [`Module::decode`] reads a module from any [`storage::Stream`], allocating
//! everything it decodes through a caller-provided allocator. Malformed input
//! is rejected with a [`decode::ErrorWithContext`] describing what was being
//! decoded, and where, at the time of failure.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![cfg_attr(nightly, feature(allocator_api))]

#[cfg(nightly)]
extern crate alloc;

pub mod core_compat;
pub mod decode;
pub mod index_space;
pub mod leb128;
pub mod storage;
pub mod types;

use core::fmt;

use decode::{ContextStack, ErrorWithContext, decode_module};
use storage::{Buffer, Stream};
use types::{
    CodeSection, CustomSection, DataSection, ElementSection, ExportSection, FunctionSection,
    GlobalSection, ImportSection, MemorySection, StartSection, TableSection, TypeSection,
    Version,
};

/// A convenience trait that captures the required allocation-related trait
/// bounds.
pub trait Allocator: core_compat::alloc::Allocator + fmt::Debug + Clone {}

impl<A> Allocator for A where A: core_compat::alloc::Allocator + fmt::Debug + Clone {}

/// A WebAssembly module.
///
/// Sections absent from the binary are represented as empty.
#[derive(Clone, Debug)]
pub struct Module<A: Allocator> {
    /// Magic number; always [`types::MAGIC`] in a decoded module.
    pub magic: [u8; 4],
    /// Module version.
    pub version: Version,
    /// The last custom section in the module, if any.
    pub customsec: Option<CustomSection<A>>,
    /// Function type declarations.
    pub typesec: TypeSection<A>,
    /// Import declarations.
    pub importsec: ImportSection<A>,
    /// Function type indices.
    pub funcsec: FunctionSection<A>,
    /// Table declarations.
    pub tablesec: TableSection<A>,
    /// Memory declarations.
    pub memsec: MemorySection<A>,
    /// Global variable declarations.
    pub globalsec: GlobalSection<A>,
    /// Export declarations.
    pub exportsec: ExportSection<A>,
    /// Start function index.
    pub startsec: Option<StartSection>,
    /// Element segments.
    pub elemsec: ElementSection<A>,
    /// Function bodies.
    pub codesec: CodeSection<A>,
    /// Data segments.
    pub datasec: DataSection<A>,
}

impl<A: Allocator> Module<A> {
    /// Decodes the module from streaming storage, with a given allocator.
    pub fn decode<Storage: Stream>(
        storage: Storage,
        alloc: A,
    ) -> Result<Self, ErrorWithContext<Storage>> {
        let mut context = ContextStack::default();
        decode_module(storage, &mut context, &alloc)
            .map_err(|error| ErrorWithContext { error, context })
    }

    /// Decodes the module from an in-memory buffer.
    pub fn decode_bytes<Bytes: AsRef<[u8]>>(
        bytes: Bytes,
        alloc: A,
    ) -> Result<Self, ErrorWithContext<Buffer<Bytes>>> {
        Self::decode(Buffer::new(bytes), alloc)
    }

    /// Reads the file at the given path fully into memory and decodes it.
    #[cfg(feature = "std")]
    pub fn decode_file<P: AsRef<std::path::Path>>(
        path: P,
        alloc: A,
    ) -> Result<Self, decode::FileError> {
        let bytes = std::fs::read(path)?;
        Self::decode_bytes(bytes, alloc).map_err(decode::FileError::Decode)
    }
}
