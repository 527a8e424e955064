//! Sources of bindings and module descriptions
//!
//! The resolver asks a [Loader] whenever a key has no binding. Constructor bindings are
//! registered up front in a [RegistryLoader], nothing is discovered at runtime.

use std::{any::type_name, collections::HashMap, sync::Arc};

use crate::{
    binding::{Binding, ConstructorBinding, LazyBinding, ProviderOfBinding},
    errors::ConfigError,
    key::Key,
    module::{Module, ModuleDescriptor},
};

pub trait Loader: Send + Sync {
    /// Synthesizes the constructor binding of `type_name`
    ///
    /// With `must_be_injectable`, types without an injectable constructor or injected
    /// properties are rejected.
    fn get_constructor_binding(
        &self,
        key: &Key,
        type_name: &str,
        must_be_injectable: bool,
    ) -> Result<Arc<dyn Binding>, ConfigError>;

    /// Binding for a lazy wrapper key
    fn get_deferred_binding(
        &self,
        key: &Key,
        required_by: &str,
        inner: Key,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        Ok(Arc::new(LazyBinding::new(key.clone(), required_by, inner)))
    }

    /// Binding for a provider wrapper key
    fn get_provider_of_binding(
        &self,
        key: &Key,
        required_by: &str,
        must_be_injectable: bool,
        inner: Key,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        Ok(Arc::new(ProviderOfBinding::new(
            key.clone(),
            required_by,
            must_be_injectable,
            inner,
        )))
    }

    /// Describes a module, using `instance` when the caller already has one
    fn get_module(
        &self,
        name: &str,
        instance: Option<&dyn Module>,
    ) -> Result<ModuleDescriptor, ConfigError> {
        match instance {
            Some(module) => Ok(module.describe()),
            None => Err(ConfigError::UnknownModule(name.to_string())),
        }
    }
}

type ConstructorFactory = Arc<dyn Fn() -> ConstructorBinding + Send + Sync>;
type ModuleFactory = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// Loader backed by explicitly registered constructors and modules
#[derive(Default, Clone)]
pub struct RegistryLoader {
    constructors: HashMap<String, ConstructorFactory>,
    modules: HashMap<String, ModuleFactory>,
}

impl RegistryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the constructor binding of a type
    ///
    /// The factory is called for every synthesis, each container gets fresh bindings.
    pub fn constructor<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> ConstructorBinding + Send + Sync + 'static,
    {
        let type_name = factory().type_name();
        tracing::trace!("Registered constructor of {type_name}");
        self.constructors
            .insert(type_name.to_string(), Arc::new(factory));
        self
    }

    /// Registers a module, so other modules can include it by name
    pub fn module<M, F>(mut self, factory: F) -> Self
    where
        M: Module + 'static,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.modules.insert(
            type_name::<M>().to_string(),
            Arc::new(move || Box::new(factory()) as Box<dyn Module>),
        );
        self
    }
}

impl Loader for RegistryLoader {
    fn get_constructor_binding(
        &self,
        key: &Key,
        type_name: &str,
        must_be_injectable: bool,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        let factory = self
            .constructors
            .get(type_name)
            .ok_or_else(|| ConfigError::UnknownType(type_name.to_string()))?;
        let binding = factory();
        if must_be_injectable && !binding.has_injections() {
            return Err(ConfigError::NotInjectable(type_name.to_string()));
        }
        tracing::trace!("Synthesized constructor binding for {key}");
        Ok(Arc::new(binding))
    }

    fn get_module(
        &self,
        name: &str,
        instance: Option<&dyn Module>,
    ) -> Result<ModuleDescriptor, ConfigError> {
        if let Some(module) = instance {
            return Ok(module.describe());
        }
        let factory = self
            .modules
            .get(name)
            .ok_or_else(|| ConfigError::UnknownModule(name.to_string()))?;
        Ok(factory().describe())
    }
}

/// Loader used by build-time validation
///
/// Constructor synthesis always fails, so complete modules have to bind every dependency
/// themselves. Lazy and provider wrappers are still synthesized around bound keys.
pub struct ValidationLoader {
    modules: Arc<dyn Loader>,
}

impl ValidationLoader {
    pub fn new(modules: Arc<dyn Loader>) -> Self {
        ValidationLoader { modules }
    }
}

impl Loader for ValidationLoader {
    fn get_constructor_binding(
        &self,
        _key: &Key,
        type_name: &str,
        _must_be_injectable: bool,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        Err(ConfigError::UnknownType(type_name.to_string()))
    }

    fn get_module(
        &self,
        name: &str,
        instance: Option<&dyn Module>,
    ) -> Result<ModuleDescriptor, ConfigError> {
        self.modules.get_module(name, instance)
    }
}

/// Tries several loaders in order, the first success wins
///
/// If every loader fails, the error of the last one is returned.
#[derive(Default, Clone)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn Loader>>,
}

impl LoaderChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, loader: impl Loader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn with_shared(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loaders.push(loader);
        self
    }

    fn first_success<T>(
        &self,
        fallback: impl FnOnce() -> ConfigError,
        mut attempt: impl FnMut(&dyn Loader) -> Result<T, ConfigError>,
    ) -> Result<T, ConfigError> {
        let mut last_error = None;
        for loader in &self.loaders {
            match attempt(loader.as_ref()) {
                Ok(found) => return Ok(found),
                Err(error) => last_error = Some(error),
            }
        }
        Err(last_error.unwrap_or_else(fallback))
    }
}

impl Loader for LoaderChain {
    fn get_constructor_binding(
        &self,
        key: &Key,
        type_name: &str,
        must_be_injectable: bool,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        self.first_success(
            || ConfigError::UnknownType(type_name.to_string()),
            |loader| loader.get_constructor_binding(key, type_name, must_be_injectable),
        )
    }

    fn get_deferred_binding(
        &self,
        key: &Key,
        required_by: &str,
        inner: Key,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        self.first_success(
            || ConfigError::UnknownType(key.to_string()),
            |loader| loader.get_deferred_binding(key, required_by, inner.clone()),
        )
    }

    fn get_provider_of_binding(
        &self,
        key: &Key,
        required_by: &str,
        must_be_injectable: bool,
        inner: Key,
    ) -> Result<Arc<dyn Binding>, ConfigError> {
        self.first_success(
            || ConfigError::UnknownType(key.to_string()),
            |loader| {
                loader.get_provider_of_binding(key, required_by, must_be_injectable, inner.clone())
            },
        )
    }

    fn get_module(
        &self,
        name: &str,
        instance: Option<&dyn Module>,
    ) -> Result<ModuleDescriptor, ConfigError> {
        self.first_success(
            || ConfigError::UnknownModule(name.to_string()),
            |loader| loader.get_module(name, instance),
        )
    }
}
