use std::{any::type_name, collections::BTreeMap, sync::Arc};

use graft_di::{Inject, Instance, Key, Module, ModuleDescriptor};

use crate::{config::Config, errors::ConfigRegistryError};

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type. As a [Module] it binds every config
/// as an entry point under the key of [Config].
#[derive(Clone, Default)]
pub struct ConfigProvider {
    configs: BTreeMap<Key, Instance>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn initialize() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    ///
    /// Returns `Ok(None)` if no config of the type is registered.
    pub fn get_config<T: Send + Sync + 'static>(
        &self,
    ) -> Result<Option<Arc<T>>, ConfigRegistryError> {
        self.lookup(&Config::<T>::key())
    }

    /// Retrieve a config registered under a qualifier
    pub fn get_named_config<T: Send + Sync + 'static>(
        &self,
        qualifier: &str,
    ) -> Result<Option<Arc<T>>, ConfigRegistryError> {
        self.lookup(&Config::<T>::named_key(qualifier))
    }

    fn lookup<T: Send + Sync + 'static>(
        &self,
        key: &Key,
    ) -> Result<Option<Arc<T>>, ConfigRegistryError> {
        self.configs
            .get(key)
            .map(|instance| {
                instance
                    .downcast::<T>()
                    .map_err(|_| ConfigRegistryError::TypeMismatch(type_name::<T>()))
            })
            .transpose()
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`ConfigRegistryError`] runtime error
    pub fn add_config<T: Send + Sync + 'static>(
        &mut self,
        config: T,
    ) -> Result<&mut Self, ConfigRegistryError> {
        self.insert(Config::<T>::key(), config)
    }

    /// Add a config under a qualifier, injected as a named `Config<T>`
    pub fn add_named_config<T: Send + Sync + 'static>(
        &mut self,
        qualifier: &str,
        config: T,
    ) -> Result<&mut Self, ConfigRegistryError> {
        self.insert(Config::<T>::named_key(qualifier), config)
    }

    fn insert<T: Send + Sync + 'static>(
        &mut self,
        key: Key,
        config: T,
    ) -> Result<&mut Self, ConfigRegistryError> {
        if self.configs.contains_key(&key) {
            return Err(ConfigRegistryError::AlreadyRegistered(type_name::<T>()));
        }

        tracing::debug!("Registered config {key}");
        self.configs.insert(key, Instance::new(config));
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Send + Sync + 'static>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, ConfigRegistryError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl Module for ConfigProvider {
    fn describe(&self) -> ModuleDescriptor {
        let mut module = ModuleDescriptor::of::<Self>();
        module.library(true).complete(false);
        for (key, config) in &self.configs {
            module
                .entry_point(key.clone())
                .provides_instance(key.clone(), config.clone());
        }
        module
    }
}
