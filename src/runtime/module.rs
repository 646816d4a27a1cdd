//! Module instances: named containers of runtime instances
//!
//! A [`ModuleInstance`] owns everything allocated while instantiating it, plus
//! every instance explicitly added to it. Exports are kept in five independent
//! name maps, one per kind, so a function and a memory may share a name.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use super::function::Function;
use super::global::Global;
use super::instance::{
    FunctionInstance, FunctionRef, GlobalInstance, GlobalRef, InstanceRef, MemoryInstance, MemoryRef, TableInstance,
    TableRef, TagInstance, TagRef,
};
use super::memory::Memory;
use super::store::StoreInner;
use super::table::Table;
use super::tag::Tag;
use super::RuntimeError;
use crate::ast::types::{ExternalKind, FunctionType};

type Finalizer = Box<dyn FnOnce(Box<dyn Any + Send + Sync>) + Send + Sync>;

/// Index spaces and export maps of one module
#[derive(Default)]
pub(crate) struct Entities {
    pub(crate) functions: Vec<Arc<Function>>,
    pub(crate) tables: Vec<Arc<Table>>,
    pub(crate) memories: Vec<Arc<Memory>>,
    pub(crate) globals: Vec<Arc<Global>>,
    pub(crate) tags: Vec<Arc<Tag>>,
    pub(crate) exports: Exports,
}

#[derive(Default)]
pub(crate) struct Exports {
    pub(crate) functions: BTreeMap<String, u32>,
    pub(crate) tables: BTreeMap<String, u32>,
    pub(crate) memories: BTreeMap<String, u32>,
    pub(crate) globals: BTreeMap<String, u32>,
    pub(crate) tags: BTreeMap<String, u32>,
}

impl Exports {
    fn map(&self, kind: ExternalKind) -> &BTreeMap<String, u32> {
        match kind {
            ExternalKind::Function => &self.functions,
            ExternalKind::Table => &self.tables,
            ExternalKind::Memory => &self.memories,
            ExternalKind::Global => &self.globals,
            ExternalKind::Tag => &self.tags,
        }
    }

    pub(crate) fn map_mut(&mut self, kind: ExternalKind) -> &mut BTreeMap<String, u32> {
        match kind {
            ExternalKind::Function => &mut self.functions,
            ExternalKind::Table => &mut self.tables,
            ExternalKind::Memory => &mut self.memories,
            ExternalKind::Global => &mut self.globals,
            ExternalKind::Tag => &mut self.tags,
        }
    }
}

/// Shared state of a module instance
///
/// Reached through [`ModuleInstance`] (owning) or [`ModuleRef`] (borrowed),
/// both of which dereference to it.
pub struct ModuleData {
    name: String,
    pub(crate) types: Vec<FunctionType>,
    pub(crate) entities: RwLock<Entities>,
    host_data: Option<Box<dyn Any + Send + Sync>>,
    finalizer: Option<Finalizer>,
    pub(crate) store: Mutex<Option<Weak<StoreInner>>>,
}

impl ModuleData {
    pub(crate) fn new(
        name: String,
        types: Vec<FunctionType>,
        entities: Entities,
        host_data: Option<Box<dyn Any + Send + Sync>>,
        finalizer: Option<Finalizer>,
    ) -> Self {
        ModuleData {
            name,
            types,
            entities: RwLock::new(entities),
            host_data,
            finalizer,
            store: Mutex::new(None),
        }
    }

    /// Module name; empty for anonymous instances
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host data attached at creation, if it has type `T`
    pub fn host_data<T: Any>(&self) -> Option<&T> {
        self.host_data.as_ref().and_then(|data| data.downcast_ref::<T>())
    }

    fn find<T>(&self, kind: ExternalKind, name: &str, space: fn(&Entities) -> &[Arc<T>]) -> Option<InstanceRef<'_, T>> {
        let entities = self.entities.read();
        let idx = *entities.exports.map(kind).get(name)?;
        space(&entities).get(idx as usize).cloned().map(InstanceRef::new)
    }

    pub fn find_function(&self, name: &str) -> Option<FunctionRef<'_>> {
        self.find(ExternalKind::Function, name, |e| e.functions.as_slice())
    }

    pub fn find_table(&self, name: &str) -> Option<TableRef<'_>> {
        self.find(ExternalKind::Table, name, |e| e.tables.as_slice())
    }

    pub fn find_memory(&self, name: &str) -> Option<MemoryRef<'_>> {
        self.find(ExternalKind::Memory, name, |e| e.memories.as_slice())
    }

    pub fn find_global(&self, name: &str) -> Option<GlobalRef<'_>> {
        self.find(ExternalKind::Global, name, |e| e.globals.as_slice())
    }

    pub fn find_tag(&self, name: &str) -> Option<TagRef<'_>> {
        self.find(ExternalKind::Tag, name, |e| e.tags.as_slice())
    }

    /// Exported names of one kind, in sorted order
    pub fn list(&self, kind: ExternalKind) -> Vec<String> {
        self.entities.read().exports.map(kind).keys().cloned().collect()
    }

    pub fn list_len(&self, kind: ExternalKind) -> usize {
        self.entities.read().exports.map(kind).len()
    }

    pub fn list_functions(&self) -> Vec<String> {
        self.list(ExternalKind::Function)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.list(ExternalKind::Table)
    }

    pub fn list_memories(&self) -> Vec<String> {
        self.list(ExternalKind::Memory)
    }

    pub fn list_globals(&self) -> Vec<String> {
        self.list(ExternalKind::Global)
    }

    pub fn list_tags(&self) -> Vec<String> {
        self.list(ExternalKind::Tag)
    }

    // index-space access for the interpreter

    pub(crate) fn function(&self, idx: u32) -> Result<Arc<Function>, RuntimeError> {
        self.entities
            .read()
            .functions
            .get(idx as usize)
            .cloned()
            .ok_or(RuntimeError::WrongInstanceIndex(idx))
    }

    pub(crate) fn table(&self, idx: u32) -> Result<Arc<Table>, RuntimeError> {
        self.entities
            .read()
            .tables
            .get(idx as usize)
            .cloned()
            .ok_or(RuntimeError::WrongInstanceIndex(idx))
    }

    pub(crate) fn memory(&self, idx: u32) -> Result<Arc<Memory>, RuntimeError> {
        self.entities
            .read()
            .memories
            .get(idx as usize)
            .cloned()
            .ok_or(RuntimeError::WrongInstanceIndex(idx))
    }

    pub(crate) fn global(&self, idx: u32) -> Result<Arc<Global>, RuntimeError> {
        self.entities
            .read()
            .globals
            .get(idx as usize)
            .cloned()
            .ok_or(RuntimeError::WrongInstanceIndex(idx))
    }

    pub(crate) fn func_type(&self, idx: u32) -> Result<&FunctionType, RuntimeError> {
        self.types.get(idx as usize).ok_or(RuntimeError::WrongInstanceIndex(idx))
    }
}

impl Drop for ModuleData {
    fn drop(&mut self) {
        if let (Some(finalizer), Some(data)) = (self.finalizer.take(), self.host_data.take()) {
            finalizer(data);
        }
    }
}

impl fmt::Debug for ModuleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entities = self.entities.read();
        f.debug_struct("ModuleData")
            .field("name", &self.name)
            .field("functions", &entities.functions.len())
            .field("tables", &entities.tables.len())
            .field("memories", &entities.memories.len())
            .field("globals", &entities.globals.len())
            .field("tags", &entities.tags.len())
            .finish()
    }
}

/// Owning handle to a module instance
///
/// Dropping it unlinks the module from the store it is registered in; the
/// instances it owns go away once no running call still uses them.
pub struct ModuleInstance {
    inner: Arc<ModuleData>,
}

impl ModuleInstance {
    /// Empty host module; an empty `name` makes it anonymous
    pub fn new(name: &str) -> Self {
        Self::from_data(ModuleData::new(name.to_string(), Vec::new(), Entities::default(), None, None))
    }

    /// Host module carrying `data`; `finalizer` runs with the data when the
    /// module is destroyed
    pub fn with_data<T, F>(name: &str, data: T, finalizer: Option<F>) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce(T) + Send + Sync + 'static,
    {
        let finalizer = finalizer.map(|f| -> Finalizer {
            Box::new(move |data: Box<dyn Any + Send + Sync>| {
                if let Ok(data) = data.downcast::<T>() {
                    f(*data);
                }
            })
        });
        Self::from_data(ModuleData::new(
            name.to_string(),
            Vec::new(),
            Entities::default(),
            Some(Box::new(data)),
            finalizer,
        ))
    }

    pub(crate) fn from_data(data: ModuleData) -> Self {
        ModuleInstance { inner: Arc::new(data) }
    }

    pub(crate) fn from_arc(inner: Arc<ModuleData>) -> Self {
        ModuleInstance { inner }
    }

    pub(crate) fn arc(&self) -> &Arc<ModuleData> {
        &self.inner
    }

    fn add(&mut self, kind: ExternalKind, name: &str, push: impl FnOnce(&mut Entities) -> usize) {
        let mut entities = self.inner.entities.write();
        let idx = push(&mut entities) as u32;
        entities.exports.map_mut(kind).insert(name.to_string(), idx);
    }

    /// Move `func` into this module and export it as `name`
    ///
    /// Re-using a name re-points the export; the earlier instance stays owned
    /// by the module.
    pub fn add_function(&mut self, name: &str, func: FunctionInstance) {
        let func = func.into_arc();
        func.set_owner(Arc::downgrade(&self.inner));
        self.add(ExternalKind::Function, name, |e| {
            e.functions.push(func);
            e.functions.len() - 1
        });
    }

    pub fn add_table(&mut self, name: &str, table: TableInstance) {
        let table = table.into_arc();
        self.add(ExternalKind::Table, name, |e| {
            e.tables.push(table);
            e.tables.len() - 1
        });
    }

    pub fn add_memory(&mut self, name: &str, memory: MemoryInstance) {
        let memory = memory.into_arc();
        self.add(ExternalKind::Memory, name, |e| {
            e.memories.push(memory);
            e.memories.len() - 1
        });
    }

    pub fn add_global(&mut self, name: &str, global: GlobalInstance) {
        let global = global.into_arc();
        self.add(ExternalKind::Global, name, |e| {
            e.globals.push(global);
            e.globals.len() - 1
        });
    }

    pub fn add_tag(&mut self, name: &str, tag: TagInstance) {
        let tag = tag.into_arc();
        self.add(ExternalKind::Tag, name, |e| {
            e.tags.push(tag);
            e.tags.len() - 1
        });
    }

    /// Borrow this module with the lifetime of the handle
    pub fn view(&self) -> ModuleRef<'_> {
        ModuleRef::new(Arc::clone(&self.inner))
    }
}

impl Deref for ModuleInstance {
    type Target = ModuleData;

    fn deref(&self) -> &ModuleData {
        &self.inner
    }
}

impl Drop for ModuleInstance {
    fn drop(&mut self) {
        let store = self.inner.store.lock().take().and_then(|weak| weak.upgrade());
        if let Some(store) = store {
            store.unlink(&self.inner);
        }
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

/// Borrowed view of a module instance owned elsewhere
#[derive(Clone)]
pub struct ModuleRef<'a> {
    inner: Arc<ModuleData>,
    _owner: PhantomData<&'a ModuleData>,
}

impl ModuleRef<'_> {
    pub(crate) fn new(inner: Arc<ModuleData>) -> Self {
        ModuleRef {
            inner,
            _owner: PhantomData,
        }
    }

    pub(crate) fn arc(&self) -> &Arc<ModuleData> {
        &self.inner
    }
}

impl Deref for ModuleRef<'_> {
    type Target = ModuleData;

    fn deref(&self) -> &ModuleData {
        &self.inner
    }
}

impl fmt::Debug for ModuleRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::types::{Limit, MemoryType, Mutability, GlobalType, ValType};
    use crate::runtime::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn nop_function() -> FunctionInstance {
        Function::new_host(FunctionType::new(vec![], vec![]), |_, _, _| Ok(()), 0)
    }

    #[test]
    fn export_names_are_per_kind() {
        let mut module = ModuleInstance::new("env");
        module.add_function("x", nop_function());
        module.add_memory("x", Memory::new(MemoryType::new(Limit::new(1, None))).unwrap());
        assert!(module.find_function("x").is_some());
        assert!(module.find_memory("x").is_some());
        assert!(module.find_table("x").is_none());
        assert_eq!(module.list_len(ExternalKind::Function), 1);
        assert_eq!(module.list_len(ExternalKind::Memory), 1);
    }

    #[test]
    fn listing_is_sorted() {
        let mut module = ModuleInstance::new("env");
        for name in ["zeta", "alpha", "mid"] {
            module.add_function(name, nop_function());
        }
        assert_eq!(module.list_functions(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(module.list_functions(), module.list_functions());
    }

    #[test]
    fn added_instances_are_shared_not_copied() {
        let mut module = ModuleInstance::new("env");
        let global = Global::new(GlobalType::new(ValType::I32, Mutability::Var), Value::I32(1)).unwrap();
        module.add_global("g", global);
        module.find_global("g").unwrap().set(Value::I32(2)).unwrap();
        assert_eq!(module.find_global("g").unwrap().get(), Value::I32(2));
    }

    #[test]
    fn added_function_knows_its_module() {
        let mut module = ModuleInstance::new("env");
        module.add_function("f", nop_function());
        let func = module.find_function("f").unwrap();
        assert_eq!(func.owner().unwrap().name(), "env");
    }

    #[test]
    fn finalizer_runs_once_on_drop() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let module = ModuleInstance::with_data(
            "host",
            41u32,
            Some(move |data: u32| {
                assert_eq!(data, 41);
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert_eq!(module.host_data::<u32>(), Some(&41));
        assert_eq!(module.host_data::<i64>(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        drop(module);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn borrowed_lookups_keep_instance_alive_only_while_borrowed() {
        let mut module = ModuleInstance::new("env");
        module.add_function("f", nop_function());
        let addr = module.find_function("f").unwrap().addr();
        assert!(addr.is_alive());
        drop(module);
        assert!(!addr.is_alive());
    }
}
