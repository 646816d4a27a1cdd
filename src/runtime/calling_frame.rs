//! Context handed to host functions

use std::sync::Arc;

use super::executor::Executor;
use super::instance::MemoryRef;
use super::module::{ModuleData, ModuleRef};

/// The caller's view of the engine during a host call
///
/// A frame only lives for the duration of one host call; everything borrowed
/// from it is scoped to that call.
pub struct CallingFrame<'a> {
    executor: &'a Executor,
    module: Option<Arc<ModuleData>>,
}

impl<'a> CallingFrame<'a> {
    pub(crate) fn new(executor: &'a Executor, module: Option<Arc<ModuleData>>) -> Self {
        CallingFrame { executor, module }
    }

    /// Executor running the current invocation
    pub fn executor(&self) -> &Executor {
        self.executor
    }

    /// Module of the calling wasm code, or the module owning the host function
    /// when it was invoked directly; `None` for a bare host function
    pub fn module_instance(&self) -> Option<ModuleRef<'_>> {
        self.module.as_ref().map(|module| ModuleRef::new(Arc::clone(module)))
    }

    /// Memory `idx` of the calling module
    pub fn memory(&self, idx: u32) -> Option<MemoryRef<'_>> {
        let module = self.module.as_ref()?;
        module.memory(idx).ok().map(MemoryRef::new)
    }
}

impl std::fmt::Debug for CallingFrame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallingFrame")
            .field("module", &self.module.as_ref().map(|m| m.name().to_string()))
            .finish()
    }
}
