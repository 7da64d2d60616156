// Copyright (c) 2025 Joshua Seaton
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Index-space bookkeeping.
//!
//! Functions, tables, memories and globals are each numbered in a single
//! index space in which imports come first, followed by the module's own
//! declarations in section order. The helpers here derive that numbering from
//! a decoded module.

use crate::types::{
    ExternKind, FuncIdx, FunctionType, GlobalIdx, GlobalType, ImportDescriptor, ImportSection,
    TypeIdx,
};
use crate::{Allocator, Module};

/// The number of imports of each kind.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ImportCounts {
    pub functions: u32,
    pub tables: u32,
    pub memories: u32,
    pub globals: u32,
}

impl ImportCounts {
    /// Tallies the imports of a section.
    pub fn of<A: Allocator>(importsec: &ImportSection<A>) -> Self {
        importsec
            .iter()
            .fold(Self::default(), |counts, import| {
                counts.with(import.descriptor.kind())
            })
    }

    // Returns the counts with one more import of the given kind.
    fn with(mut self, kind: ExternKind) -> Self {
        match kind {
            ExternKind::Function => self.functions += 1,
            ExternKind::Table => self.tables += 1,
            ExternKind::Memory => self.memories += 1,
            ExternKind::Global => self.globals += 1,
        }
        self
    }

    /// The number of imports of the given kind.
    pub fn get(self, kind: ExternKind) -> u32 {
        match kind {
            ExternKind::Function => self.functions,
            ExternKind::Table => self.tables,
            ExternKind::Memory => self.memories,
            ExternKind::Global => self.globals,
        }
    }

    /// Maps the ordinal of a declaration within its own section (e.g., the
    /// `i`th entry of the global section) to its index in the index space of
    /// its kind, or `None` if that overflows.
    pub fn index_of_local(self, kind: ExternKind, ordinal: u32) -> Option<u32> {
        self.get(kind).checked_add(ordinal)
    }

    /// Maps an index-space index to the ordinal of the module's own
    /// declaration, or `None` if the index refers to an import.
    pub fn local_ordinal(self, kind: ExternKind, index: u32) -> Option<u32> {
        index.checked_sub(self.get(kind))
    }
}

impl<A: Allocator> Module<A> {
    /// The number of imports of each kind.
    pub fn import_counts(&self) -> ImportCounts {
        ImportCounts::of(&self.importsec)
    }

    /// The total number of functions, imported and declared.
    pub fn function_count(&self) -> usize {
        self.import_counts().functions as usize + self.funcsec.len()
    }

    /// The total number of globals, imported and declared.
    pub fn global_count(&self) -> usize {
        self.import_counts().globals as usize + self.globalsec.len()
    }

    /// Resolves the type index of a function in the function index space.
    pub fn function_type_index(&self, funcidx: FuncIdx) -> Option<TypeIdx> {
        let idx = *funcidx as usize;
        let mut imported = self.importsec.iter().filter_map(|import| match import.descriptor {
            ImportDescriptor::Function(typeidx) => Some(typeidx),
            _ => None,
        });
        let counts = self.import_counts();
        match counts.local_ordinal(ExternKind::Function, *funcidx) {
            None => imported.nth(idx),
            Some(ordinal) => self.funcsec.get(ordinal as usize).copied(),
        }
    }

    /// Resolves the signature of a function in the function index space.
    pub fn function_type(&self, funcidx: FuncIdx) -> Option<&FunctionType<A>> {
        let typeidx = self.function_type_index(funcidx)?;
        self.typesec.get(*typeidx as usize)
    }

    /// Resolves the type of a global in the global index space.
    pub fn global_type(&self, globalidx: GlobalIdx) -> Option<GlobalType> {
        let idx = *globalidx as usize;
        let mut imported = self.importsec.iter().filter_map(|import| match import.descriptor {
            ImportDescriptor::Global(ty) => Some(ty),
            _ => None,
        });
        match self
            .import_counts()
            .local_ordinal(ExternKind::Global, *globalidx)
        {
            None => imported.nth(idx),
            Some(ordinal) => self.globalsec.get(ordinal as usize).map(|global| global.ty),
        }
    }
}
