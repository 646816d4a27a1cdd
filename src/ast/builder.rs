//! Programmatic construction of [`AstModule`]s
//!
//! Binary decoding lives outside this crate; embedders that produce modules
//! themselves (and the test-suite) assemble them here instead. Imports must be
//! declared before definitions of the same kind, matching the index-space
//! layout of the binary format.

use std::sync::Arc;

use super::instruction::{ConstExpr, Instruction};
use super::module::{AstModule, DataSegment, ElementSegment, FunctionBody, GlobalDef};
use super::types::{
    ExportType, ExternalKind, ExternalType, FunctionType, GlobalType, ImportType, MemoryType, TableType, TagType,
    ValType,
};
use crate::runtime::function::CompiledCode;
use crate::runtime::RuntimeError;

#[derive(Default)]
pub struct ModuleBuilder {
    module: AstModule,
    exports: Vec<(String, ExternalKind, u32)>,
    late_import: Option<String>,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a type to the type section, reusing an identical existing entry
    pub fn add_type(&mut self, ty: FunctionType) -> u32 {
        if let Some(idx) = self.module.types.iter().position(|t| *t == ty) {
            return idx as u32;
        }
        self.module.types.push(ty);
        (self.module.types.len() - 1) as u32
    }

    fn add_import(&mut self, module: &str, name: &str, ty: ExternalType) -> u32 {
        let kind = ty.kind();
        let defined = match kind {
            ExternalKind::Function => self.module.functions.len(),
            ExternalKind::Table => self.module.tables.len(),
            ExternalKind::Memory => self.module.memories.len(),
            ExternalKind::Global => self.module.globals.len(),
            ExternalKind::Tag => self.module.tags.len(),
        };
        if defined > 0 && self.late_import.is_none() {
            self.late_import = Some(format!("{module}.{name}"));
        }
        let idx = self.module.imported_count(kind) as u32;
        self.module.imports.push(ImportType {
            module: module.to_string(),
            name: name.to_string(),
            ty,
        });
        idx
    }

    pub fn import_function(&mut self, module: &str, name: &str, ty: FunctionType) -> u32 {
        self.add_type(ty.clone());
        self.add_import(module, name, ExternalType::Function(ty))
    }

    pub fn import_table(&mut self, module: &str, name: &str, ty: TableType) -> u32 {
        self.add_import(module, name, ExternalType::Table(ty))
    }

    pub fn import_memory(&mut self, module: &str, name: &str, ty: MemoryType) -> u32 {
        self.add_import(module, name, ExternalType::Memory(ty))
    }

    pub fn import_global(&mut self, module: &str, name: &str, ty: GlobalType) -> u32 {
        self.add_import(module, name, ExternalType::Global(ty))
    }

    pub fn import_tag(&mut self, module: &str, name: &str, ty: TagType) -> u32 {
        self.add_import(module, name, ExternalType::Tag(ty))
    }

    /// Define a function and return its index in the function index space
    pub fn function(&mut self, ty: FunctionType, locals: Vec<ValType>, body: Vec<Instruction>) -> u32 {
        let type_idx = self.add_type(ty);
        self.module.functions.push(Arc::new(FunctionBody { type_idx, locals, body }));
        (self.module.index_space_len(ExternalKind::Function) - 1) as u32
    }

    pub fn table(&mut self, ty: TableType) -> u32 {
        self.module.tables.push(ty);
        (self.module.index_space_len(ExternalKind::Table) - 1) as u32
    }

    pub fn memory(&mut self, ty: MemoryType) -> u32 {
        self.module.memories.push(ty);
        (self.module.index_space_len(ExternalKind::Memory) - 1) as u32
    }

    pub fn global(&mut self, ty: GlobalType, init: ConstExpr) -> u32 {
        self.module.globals.push(GlobalDef { ty, init });
        (self.module.index_space_len(ExternalKind::Global) - 1) as u32
    }

    pub fn tag(&mut self, signature: FunctionType) -> u32 {
        self.module.tags.push(TagType::new(signature));
        (self.module.index_space_len(ExternalKind::Tag) - 1) as u32
    }

    pub fn export(&mut self, name: &str, kind: ExternalKind, index: u32) -> &mut Self {
        self.exports.push((name.to_string(), kind, index));
        self
    }

    pub fn export_function(&mut self, name: &str, index: u32) -> &mut Self {
        self.export(name, ExternalKind::Function, index)
    }

    pub fn element(&mut self, table: u32, offset: ConstExpr, items: Vec<ConstExpr>) -> &mut Self {
        self.module.elements.push(ElementSegment { table, offset, items });
        self
    }

    pub fn data(&mut self, memory: u32, offset: ConstExpr, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.module.data.push(DataSegment {
            memory,
            offset,
            bytes: bytes.into(),
        });
        self
    }

    pub fn start(&mut self, func_idx: u32) -> &mut Self {
        self.module.start = Some(func_idx);
        self
    }

    /// Attach native code for the defined functions
    pub fn compiled(&mut self, code: Arc<dyn CompiledCode>) -> &mut Self {
        self.module.compiled = Some(code);
        self
    }

    pub fn build(self) -> Result<AstModule, RuntimeError> {
        let ModuleBuilder {
            mut module,
            exports,
            late_import,
        } = self;
        if let Some(import) = late_import {
            return Err(RuntimeError::Malformed(format!(
                "import {import} declared after a definition of the same kind"
            )));
        }
        let mut resolved = Vec::with_capacity(exports.len());
        for (name, kind, index) in exports {
            if resolved.iter().any(|e: &ExportType| e.name == name) {
                return Err(RuntimeError::Malformed(format!("duplicate export name: {name}")));
            }
            let ty = describe(&module, kind, index)?;
            resolved.push(ExportType { name, ty, index });
        }
        module.exports = resolved;
        if let Some(start) = module.start {
            let ty = describe(&module, ExternalKind::Function, start)?;
            let ft = ty.function_type()?;
            if ft.params_len() != 0 || ft.results_len() != 0 {
                return Err(RuntimeError::Malformed(format!("start function has type {ft}")));
            }
        }
        Ok(module)
    }
}

/// Descriptor of entry `index` in the `kind` index space
fn describe(module: &AstModule, kind: ExternalKind, index: u32) -> Result<ExternalType, RuntimeError> {
    let imported: Vec<&ExternalType> = module
        .imports
        .iter()
        .filter(|i| i.kind() == kind)
        .map(|i| &i.ty)
        .collect();
    let idx = index as usize;
    if let Some(ty) = imported.get(idx) {
        return Ok((*ty).clone());
    }
    let local = idx - imported.len();
    let ty = match kind {
        ExternalKind::Function => module
            .functions
            .get(local)
            .and_then(|f| module.types.get(f.type_idx as usize))
            .cloned()
            .map(ExternalType::Function),
        ExternalKind::Table => module.tables.get(local).copied().map(ExternalType::Table),
        ExternalKind::Memory => module.memories.get(local).copied().map(ExternalType::Memory),
        ExternalKind::Global => module.globals.get(local).map(|g| ExternalType::Global(g.ty)),
        ExternalKind::Tag => module.tags.get(local).cloned().map(ExternalType::Tag),
    };
    ty.ok_or(RuntimeError::WrongInstanceIndex(index))
}
