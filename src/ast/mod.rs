//! Module descriptions: types, instructions and the validated AST module

pub mod builder;
pub mod instruction;
pub mod loader;
pub mod module;
pub mod types;

pub use builder::ModuleBuilder;
pub use instruction::{BlockType, ConstExpr, Instruction, MemArg};
pub use loader::Loader;
pub use module::{AstModule, DataSegment, ElementSegment, FunctionBody, GlobalDef};
pub use types::{
    ExportType, ExternalKind, ExternalType, FunctionType, GlobalType, HeapType, ImportType, Limit, MemoryType,
    Mutability, RefType, TableType, TagType, ValType,
};
