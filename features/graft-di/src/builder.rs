use std::sync::Arc;

use crate::{
    container::DiContainer,
    errors::ConfigError,
    key::Key,
    loader::{Loader, RegistryLoader},
    module::{Module, ModuleDescriptor},
    types::{Injectable, Instance},
};

/// Name of the module holding instances added through [DiBuilder]
pub const INSTANCE_MODULE: &str = "graft_di::Instances";

/// Collects modules and already created instances for a [DiContainer]
pub struct DiBuilder {
    loader: Option<Arc<dyn Loader>>,
    modules: Vec<Arc<dyn Module>>,
    /// Registered already created instances
    instances: Vec<(Key, Instance)>,
}

impl Default for DiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DiBuilder {
    pub fn new() -> Self {
        DiBuilder {
            loader: None,
            modules: Vec::new(),
            instances: Vec::new(),
        }
    }

    /// Loader used to synthesize bindings, an empty [RegistryLoader] by default
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn shared_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn add_module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Arc::new(module));
        self
    }

    /// Binds an existing value, requestable as an entry point
    pub fn add_instance<T: Injectable>(mut self, instance: T) -> Self {
        self.instances
            .push((Key::of::<T>(), Instance::new(instance)));
        self
    }

    pub fn add_named_instance<T: Injectable>(mut self, qualifier: &str, instance: T) -> Self {
        self.instances
            .push((Key::named::<T>(qualifier), Instance::new(instance)));
        self
    }

    pub fn build(self) -> Result<DiContainer, ConfigError> {
        let loader = self
            .loader
            .unwrap_or_else(|| Arc::new(RegistryLoader::new()));
        let mut modules = self.modules;
        if !self.instances.is_empty() {
            modules.push(Arc::new(InstanceModule {
                instances: self.instances,
            }));
        }
        DiContainer::create(loader, &modules)
    }
}

/// Library module binding the instances added to a [DiBuilder]
struct InstanceModule {
    instances: Vec<(Key, Instance)>,
}

impl Module for InstanceModule {
    fn name(&self) -> &'static str {
        INSTANCE_MODULE
    }

    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::new(INSTANCE_MODULE);
        module.library(true).complete(false);
        for (key, instance) in &self.instances {
            module
                .entry_point(key.clone())
                .provides_instance(key.clone(), instance.clone());
        }
        module
    }
}
