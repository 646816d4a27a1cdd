//! Store - the cross-module linking registry
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Store                     │
//! │  "env"  ──weak──▶ ModuleInstance (host)      │
//! │  "math" ──weak──▶ ModuleInstance (wasm)      │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The store never owns what it indexes. Each registered module keeps a
//! back-link to the store and removes its own entry when its owning handle is
//! dropped, so a lookup can never return a module that is gone.
//!
//! A module may be registered in at most one store at a time, and a name may be
//! registered at most once: a second registration under a taken name fails with
//! `ModuleNameConflict` and leaves the existing entry in place.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use super::module::{ModuleData, ModuleInstance, ModuleRef};
use super::RuntimeError;

#[derive(Default)]
pub(crate) struct StoreInner {
    modules: RwLock<BTreeMap<String, Weak<ModuleData>>>,
}

impl StoreInner {
    /// Remove `module`'s entry if it still points at `module`
    pub(crate) fn unlink(&self, module: &Arc<ModuleData>) {
        let mut modules = self.modules.write();
        let ours = modules
            .get(module.name())
            .map_or(false, |entry| std::ptr::eq(entry.as_ptr(), Arc::as_ptr(module)));
        if ours {
            modules.remove(module.name());
            tracing::debug!(module = %module.name(), "unregistered module");
        }
    }
}

#[derive(Default)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a registered module by name
    pub fn find_module(&self, name: &str) -> Option<ModuleRef<'_>> {
        self.inner
            .modules
            .read()
            .get(name)
            .and_then(Weak::upgrade)
            .map(ModuleRef::new)
    }

    /// Snapshot of the registered names, in sorted order
    pub fn list_modules(&self) -> Vec<String> {
        self.inner
            .modules
            .read()
            .iter()
            .filter(|(_, module)| module.strong_count() > 0)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn module_count(&self) -> usize {
        self.list_modules().len()
    }

    pub(crate) fn name_taken(&self, name: &str) -> bool {
        self.find_module(name).is_some()
    }

    /// Weakly link `module` under its own name
    pub(crate) fn link(&self, module: &ModuleInstance) -> Result<(), RuntimeError> {
        let name = module.name();
        if name.is_empty() {
            return Err(RuntimeError::AnonymousModule);
        }
        let mut back_link = module.store.lock();
        if back_link.as_ref().map_or(false, |store| store.strong_count() > 0) {
            return Err(RuntimeError::AlreadyLinked(name.to_string()));
        }
        let mut modules = self.inner.modules.write();
        if modules.get(name).map_or(false, |existing| existing.strong_count() > 0) {
            tracing::warn!(module = %name, "module name conflict");
            return Err(RuntimeError::ModuleNameConflict(name.to_string()));
        }
        modules.insert(name.to_string(), Arc::downgrade(module.arc()));
        *back_link = Some(Arc::downgrade(&self.inner));
        tracing::debug!(module = %name, "registered module");
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("modules", &self.list_modules()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_and_find() {
        let store = Store::new();
        let module = ModuleInstance::new("env");
        store.link(&module).unwrap();
        assert_eq!(store.list_modules(), vec!["env"]);
        assert_eq!(store.find_module("env").unwrap().name(), "env");
        assert!(store.find_module("other").is_none());
    }

    #[test]
    fn dropping_module_unregisters_it() {
        let store = Store::new();
        let module = ModuleInstance::new("env");
        store.link(&module).unwrap();
        drop(module);
        assert!(store.find_module("env").is_none());
        assert!(store.list_modules().is_empty());
    }

    #[test]
    fn name_conflict_keeps_existing_entry() {
        let store = Store::new();
        let first = ModuleInstance::new("env");
        let second = ModuleInstance::new("env");
        store.link(&first).unwrap();
        assert_eq!(store.link(&second), Err(RuntimeError::ModuleNameConflict("env".into())));
        drop(second);
        assert!(store.find_module("env").is_some());
        drop(first);
        assert!(store.find_module("env").is_none());
    }

    #[test]
    fn anonymous_modules_cannot_be_linked() {
        let store = Store::new();
        assert_eq!(store.link(&ModuleInstance::new("")), Err(RuntimeError::AnonymousModule));
        assert_eq!(store.module_count(), 0);
    }

    #[test]
    fn module_lives_in_one_store_at_a_time() {
        let first = Store::new();
        let second = Store::new();
        let module = ModuleInstance::new("env");
        first.link(&module).unwrap();
        assert_eq!(second.link(&module), Err(RuntimeError::AlreadyLinked("env".into())));
        drop(first);
        second.link(&module).unwrap();
        assert!(second.find_module("env").is_some());
    }

    #[test]
    fn store_can_be_dropped_before_its_modules() {
        let store = Store::new();
        let module = ModuleInstance::new("env");
        store.link(&module).unwrap();
        drop(store);
        drop(module);
    }

    #[test]
    fn concurrent_lookup_during_registration() {
        let store = Arc::new(Store::new());
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        if let Some(found) = store.find_module("m3") {
                            assert_eq!(found.name(), "m3");
                        }
                    }
                })
            })
            .collect();
        let modules: Vec<_> = (0..8).map(|i| ModuleInstance::new(&format!("m{i}"))).collect();
        for module in &modules {
            store.link(module).unwrap();
        }
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.module_count(), 8);
    }
}
