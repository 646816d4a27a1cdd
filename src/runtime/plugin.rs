//! Plugin descriptors
//!
//! A plugin is a named bundle of host modules. Each [`ModuleDescriptor`]
//! carries a factory that builds a fresh, ready-to-link [`ModuleInstance`]
//! on demand; nothing is instantiated at registration time.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::RwLock;

use super::module::ModuleInstance;
use super::RuntimeError;

pub type ModuleFactory = fn(&ModuleDescriptor) -> Result<ModuleInstance, RuntimeError>;

#[derive(Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub description: String,
    pub create: ModuleFactory,
}

impl ModuleDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, create: ModuleFactory) -> Self {
        ModuleDescriptor {
            name: name.into(),
            description: description.into(),
            create,
        }
    }

    /// Run the factory
    pub fn create(&self) -> Result<ModuleInstance, RuntimeError> {
        (self.create)(self)
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PluginDescriptor {
    pub name: String,
    pub description: String,
    /// major, minor, patch, build
    pub version: (u32, u32, u32, u32),
    pub modules: Vec<ModuleDescriptor>,
}

impl PluginDescriptor {
    pub fn find_module(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.iter().find(|module| module.name == name)
    }
}

/// Registry of loaded plugins, keyed by plugin name
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<BTreeMap<String, PluginDescriptor>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `plugin`; a second plugin with the same name is rejected
    pub fn register(&self, plugin: PluginDescriptor) -> Result<(), RuntimeError> {
        let mut plugins = self.plugins.write();
        if plugins.contains_key(&plugin.name) {
            tracing::warn!(plugin = %plugin.name, "plugin already registered");
            return Err(RuntimeError::PluginConflict(plugin.name));
        }
        tracing::debug!(plugin = %plugin.name, modules = plugin.modules.len(), "registered plugin");
        plugins.insert(plugin.name.clone(), plugin);
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<PluginDescriptor> {
        self.plugins.read().get(name).cloned()
    }

    pub fn list_plugins(&self) -> Vec<String> {
        self.plugins.read().keys().cloned().collect()
    }

    pub fn list_modules(&self, plugin: &str) -> Vec<String> {
        self.plugins
            .read()
            .get(plugin)
            .map(|p| p.modules.iter().map(|m| m.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Build a fresh instance of `module` from `plugin`
    pub fn create_module(&self, plugin: &str, module: &str) -> Result<ModuleInstance, RuntimeError> {
        let descriptor = self
            .plugins
            .read()
            .get(plugin)
            .and_then(|p| p.find_module(module))
            .cloned()
            .ok_or_else(|| RuntimeError::PluginNotFound(format!("{plugin}/{module}")))?;
        descriptor.create()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry").field("plugins", &self.list_plugins()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_env(desc: &ModuleDescriptor) -> Result<ModuleInstance, RuntimeError> {
        Ok(ModuleInstance::new(&desc.name))
    }

    fn plugin(name: &str) -> PluginDescriptor {
        PluginDescriptor {
            name: name.into(),
            description: "test plugin".into(),
            version: (0, 1, 0, 0),
            modules: vec![ModuleDescriptor::new("env", "host env", create_env)],
        }
    }

    #[test]
    fn register_and_create() {
        let registry = PluginRegistry::new();
        registry.register(plugin("demo")).unwrap();
        assert_eq!(registry.list_plugins(), vec!["demo"]);
        assert_eq!(registry.list_modules("demo"), vec!["env"]);
        let module = registry.create_module("demo", "env").unwrap();
        assert_eq!(module.name(), "env");
        // each call builds a fresh instance
        let again = registry.create_module("demo", "env").unwrap();
        assert!(!std::ptr::eq(&*module, &*again));
    }

    #[test]
    fn duplicate_plugin_is_rejected() {
        let registry = PluginRegistry::new();
        registry.register(plugin("demo")).unwrap();
        assert_eq!(
            registry.register(plugin("demo")),
            Err(RuntimeError::PluginConflict("demo".into()))
        );
        assert_eq!(registry.list_plugins().len(), 1);
    }

    #[test]
    fn missing_module_is_reported() {
        let registry = PluginRegistry::new();
        registry.register(plugin("demo")).unwrap();
        assert!(matches!(
            registry.create_module("demo", "nope"),
            Err(RuntimeError::PluginNotFound(_))
        ));
        assert!(registry.find("other").is_none());
        assert!(registry.list_modules("other").is_empty());
    }
}
