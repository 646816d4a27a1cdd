//! Validated module description consumed by instantiation

use std::fmt;
use std::sync::Arc;

use super::instruction::{ConstExpr, Instruction};
use super::types::{ExportType, ExternalKind, FunctionType, GlobalType, ImportType, MemoryType, TableType, TagType, ValType};
use crate::runtime::function::CompiledCode;

/// Body of a module-defined function
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub type_idx: u32,
    /// Declared locals, not including parameters
    pub locals: Vec<ValType>,
    pub body: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    pub ty: GlobalType,
    pub init: ConstExpr,
}

/// Active element segment; items evaluate to references
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub table: u32,
    pub offset: ConstExpr,
    pub items: Vec<ConstExpr>,
}

/// Active data segment
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub memory: u32,
    pub offset: ConstExpr,
    pub bytes: Vec<u8>,
}

/// A parsed and validated module, ready to be instantiated any number of times
///
/// The module is read-only after construction and can be shared between threads.
/// Instances created from it keep the function bodies alive on their own, so
/// dropping the `AstModule` does not affect them.
#[derive(Clone, Default)]
pub struct AstModule {
    pub(crate) types: Vec<FunctionType>,
    pub(crate) imports: Vec<ImportType>,
    pub(crate) functions: Vec<Arc<FunctionBody>>,
    pub(crate) tables: Vec<TableType>,
    pub(crate) memories: Vec<MemoryType>,
    pub(crate) globals: Vec<GlobalDef>,
    pub(crate) tags: Vec<TagType>,
    pub(crate) exports: Vec<ExportType>,
    pub(crate) elements: Vec<ElementSegment>,
    pub(crate) data: Vec<DataSegment>,
    pub(crate) start: Option<u32>,
    pub(crate) compiled: Option<Arc<dyn CompiledCode>>,
}

impl AstModule {
    pub fn imports(&self) -> &[ImportType] {
        &self.imports
    }

    pub fn exports(&self) -> &[ExportType] {
        &self.exports
    }

    pub fn types(&self) -> &[FunctionType] {
        &self.types
    }

    pub fn find_export(&self, name: &str, kind: ExternalKind) -> Option<&ExportType> {
        self.exports.iter().find(|e| e.name == name && e.kind() == kind)
    }

    pub fn imported_count(&self, kind: ExternalKind) -> usize {
        self.imports.iter().filter(|i| i.kind() == kind).count()
    }

    /// Number of entries in the index space of `kind`, imports included
    pub fn index_space_len(&self, kind: ExternalKind) -> usize {
        let defined = match kind {
            ExternalKind::Function => self.functions.len(),
            ExternalKind::Table => self.tables.len(),
            ExternalKind::Memory => self.memories.len(),
            ExternalKind::Global => self.globals.len(),
            ExternalKind::Tag => self.tags.len(),
        };
        self.imported_count(kind) + defined
    }

    /// Whether defined functions dispatch to native entry points
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn start(&self) -> Option<u32> {
        self.start
    }
}

impl fmt::Debug for AstModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AstModule")
            .field("types", &self.types.len())
            .field("imports", &self.imports)
            .field("functions", &self.functions.len())
            .field("tables", &self.tables)
            .field("memories", &self.memories)
            .field("globals", &self.globals.len())
            .field("tags", &self.tags.len())
            .field("exports", &self.exports)
            .field("start", &self.start)
            .field("compiled", &self.compiled.is_some())
            .finish()
    }
}
