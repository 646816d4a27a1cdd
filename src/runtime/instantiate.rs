//! Module instantiation
//!
//! Instantiation runs in phases and only publishes its result at the very end:
//!
//! 1. resolve every import against the store, in declaration order
//! 2. allocate the module's own functions, tables, memories and tags
//! 3. evaluate global initializers
//! 4. check that every active element and data segment fits, then write them
//! 5. run the start function
//! 6. wrap the result in a [`ModuleInstance`] and, when a name is given, link it
//!
//! A failure in any phase drops everything allocated so far. Nothing becomes
//! reachable from the store and no segment is written into an imported table
//! or memory unless all of them fit.

use std::sync::{Arc, Weak};

use super::executor::Executor;
use super::function::{Function, HostFunction};
use super::global::Global;
use super::memory::Memory;
use super::module::{Entities, ModuleData, ModuleInstance};
use super::store::Store;
use super::table::Table;
use super::tag::Tag;
use super::{RuntimeError, Value};
use crate::ast::instruction::ConstExpr;
use crate::ast::module::AstModule;
use crate::ast::types::{ExternalType, FunctionType, ImportType};

pub(crate) fn instantiate(
    executor: &Executor,
    store: &Store,
    ast: &AstModule,
    name: Option<&str>,
) -> Result<ModuleInstance, RuntimeError> {
    if let Some(name) = name {
        if name.is_empty() {
            return Err(RuntimeError::AnonymousModule);
        }
        if store.name_taken(name) {
            tracing::warn!(module = %name, "module name conflict");
            return Err(RuntimeError::ModuleNameConflict(name.to_string()));
        }
    }

    let mut entities = resolve_imports(store, ast)?;
    let imported_functions = entities.functions.len();

    let function_types = ast
        .functions
        .iter()
        .map(|body| {
            ast.types
                .get(body.type_idx as usize)
                .cloned()
                .ok_or(RuntimeError::WrongInstanceIndex(body.type_idx))
        })
        .collect::<Result<Vec<FunctionType>, _>>()?;
    let compiled = match &ast.compiled {
        Some(code) => Some(
            (0..ast.functions.len() as u32)
                .map(|idx| {
                    code.entry(idx)
                        .ok_or_else(|| RuntimeError::Malformed(format!("no compiled entry for function {idx}")))
                })
                .collect::<Result<Vec<Arc<dyn HostFunction>>, _>>()?,
        ),
        None => None,
    };

    for ty in &ast.tables {
        entities.tables.push(Table::new(*ty)?.into_arc());
    }
    let page_cap = executor.config().max_memory_pages;
    for ty in &ast.memories {
        entities.memories.push(Memory::with_page_cap(*ty, page_cap)?.into_arc());
    }
    for ty in &ast.tags {
        entities.tags.push(Tag::new(ty.clone()).into_arc());
    }
    for export in &ast.exports {
        entities
            .exports
            .map_mut(export.kind())
            .insert(export.name.clone(), export.index);
    }

    let module_name = name.unwrap_or_default().to_string();
    let module = Arc::new_cyclic(|owner: &Weak<ModuleData>| {
        let defined = ast.functions.iter().zip(function_types).enumerate().map(|(idx, (body, ty))| {
            match &compiled {
                Some(entries) => Function::new_compiled(ty, Arc::clone(&entries[idx]), owner.clone()),
                None => Function::new_wasm(ty, Arc::clone(body), owner.clone()),
            }
        });
        entities.functions.extend(defined);
        ModuleData::new(module_name, ast.types.clone(), entities, None, None)
    });
    tracing::debug!(
        module = %module.name(),
        imported_functions,
        defined_functions = ast.functions.len(),
        compiled = ast.is_compiled(),
        "allocated module instance"
    );

    for def in &ast.globals {
        let value = eval_const(&module, &def.init)?;
        let global = Global::new(def.ty, value)?.into_arc();
        module.entities.write().globals.push(global);
    }

    initialize_segments(&module, ast)?;

    if let Some(start) = ast.start {
        let func = module.function(start)?;
        executor.run_start(&func)?;
    }

    let instance = ModuleInstance::from_arc(module);
    if name.is_some() {
        store.link(&instance)?;
    }
    tracing::debug!(module = %instance.name(), "instantiated module");
    Ok(instance)
}

fn link_error(import: &ImportType, reason: String) -> RuntimeError {
    tracing::warn!(module = %import.module, name = %import.name, %reason, "incompatible import");
    RuntimeError::IncompatibleImportType {
        module: import.module.clone(),
        name: import.name.clone(),
        reason,
    }
}

fn unknown_import(import: &ImportType) -> RuntimeError {
    tracing::warn!(module = %import.module, name = %import.name, kind = %import.kind(), "unknown import");
    RuntimeError::UnknownImport {
        module: import.module.clone(),
        name: import.name.clone(),
    }
}

fn resolve_imports(store: &Store, ast: &AstModule) -> Result<Entities, RuntimeError> {
    let mut entities = Entities::default();
    for import in ast.imports() {
        let module = store.find_module(&import.module).ok_or_else(|| unknown_import(import))?;
        match &import.ty {
            ExternalType::Function(want) => {
                let func = module.find_function(&import.name).ok_or_else(|| unknown_import(import))?;
                if func.ty() != want {
                    return Err(link_error(import, format!("expected {want}, found {}", func.ty())));
                }
                entities.functions.push(Arc::clone(func.arc()));
            }
            ExternalType::Table(want) => {
                let table = module.find_table(&import.name).ok_or_else(|| unknown_import(import))?;
                let have = table.ty();
                if have.element != want.element {
                    return Err(link_error(
                        import,
                        format!("expected {} elements, found {}", want.element, have.element),
                    ));
                }
                if !have.limit.satisfies(table.size() as u64, &want.limit) {
                    return Err(link_error(import, format!("table limits {} do not satisfy {}", have.limit, want.limit)));
                }
                entities.tables.push(Arc::clone(table.arc()));
            }
            ExternalType::Memory(want) => {
                let memory = module.find_memory(&import.name).ok_or_else(|| unknown_import(import))?;
                let have = memory.ty();
                if !have.limit.satisfies(memory.page_size(), &want.limit) {
                    return Err(link_error(
                        import,
                        format!("memory limits {} do not satisfy {}", have.limit, want.limit),
                    ));
                }
                entities.memories.push(Arc::clone(memory.arc()));
            }
            ExternalType::Global(want) => {
                let global = module.find_global(&import.name).ok_or_else(|| unknown_import(import))?;
                if global.ty() != want {
                    return Err(link_error(import, format!("expected {want:?}, found {:?}", global.ty())));
                }
                entities.globals.push(Arc::clone(global.arc()));
            }
            ExternalType::Tag(want) => {
                let tag = module.find_tag(&import.name).ok_or_else(|| unknown_import(import))?;
                if tag.function_type() != want.function_type() {
                    return Err(link_error(
                        import,
                        format!("expected tag {}, found {}", want.function_type(), tag.function_type()),
                    ));
                }
                entities.tags.push(Arc::clone(tag.arc()));
            }
        }
    }
    Ok(entities)
}

/// Evaluate a constant expression in the context of a partly built module
pub(crate) fn eval_const(module: &ModuleData, expr: &ConstExpr) -> Result<Value, RuntimeError> {
    Ok(match *expr {
        ConstExpr::I32(v) => Value::I32(v),
        ConstExpr::I64(v) => Value::I64(v),
        ConstExpr::F32(v) => Value::F32(v),
        ConstExpr::F64(v) => Value::F64(v),
        ConstExpr::V128(v) => Value::V128(v),
        ConstExpr::GlobalGet(idx) => module.global(idx)?.get(),
        ConstExpr::RefNull(ty) => Value::null(ty),
        ConstExpr::RefFunc(idx) => Value::func_ref(&*module.function(idx)?),
    })
}

fn eval_offset(module: &ModuleData, expr: &ConstExpr) -> Result<u64, RuntimeError> {
    match eval_const(module, expr)? {
        Value::I32(v) => Ok(v as u32 as u64),
        Value::I64(v) => Ok(v as u64),
        other => Err(RuntimeError::type_mismatch("i32 offset", other.typ())),
    }
}

fn fits(offset: u64, len: usize, size: u64) -> bool {
    offset.checked_add(len as u64).map_or(false, |end| end <= size)
}

fn initialize_segments(module: &ModuleData, ast: &AstModule) -> Result<(), RuntimeError> {
    let mut elements = Vec::with_capacity(ast.elements.len());
    for seg in &ast.elements {
        let table = module.table(seg.table)?;
        let offset = eval_offset(module, &seg.offset)?;
        if !fits(offset, seg.items.len(), table.size() as u64) {
            return Err(RuntimeError::ElementSegmentDoesNotFit);
        }
        let items = seg
            .items
            .iter()
            .map(|item| eval_const(module, item))
            .collect::<Result<Vec<_>, _>>()?;
        elements.push((table, offset as u32, items));
    }

    let mut data = Vec::with_capacity(ast.data.len());
    for seg in &ast.data {
        let memory = module.memory(seg.memory)?;
        let offset = eval_offset(module, &seg.offset)?;
        if !fits(offset, seg.bytes.len(), memory.byte_len() as u64) {
            return Err(RuntimeError::DataSegmentDoesNotFit);
        }
        data.push((memory, offset, &seg.bytes));
    }

    for (table, offset, items) in elements {
        table.init(offset, &items)?;
    }
    for (memory, offset, bytes) in data {
        memory.set_data(bytes, offset).map_err(|_| RuntimeError::DataSegmentDoesNotFit)?;
    }
    Ok(())
}
