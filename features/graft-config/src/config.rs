use std::{any::type_name, ops::Deref, sync::Arc};

use graft_di::{Inject, InjectError, Instance, TypeRef};

/// Raw generic name of config keys
pub const CONFIG_TYPE: &str = "graft_config::Config";

/// A wrapper type to allow for config injections
///
/// Configs registered on a [ConfigProvider](crate::provider::ConfigProvider) are bound under the
/// key of `Config<T>` and can be used as constructor or provider method parameters.
///
/// # Example
/// ```rust
/// use graft_config::{Config, ConfigProvider};
/// use graft_di::{DiBuilder, Module, ModuleDescriptor};
///
/// #[derive(Clone)]
/// pub struct ServerConfig {
///     port: u16,
/// }
///
/// struct ServerModule;
/// impl Module for ServerModule {
///     fn describe(&self) -> ModuleDescriptor {
///         let mut module = ModuleDescriptor::of::<Self>();
///         module.entry::<std::sync::Arc<u16>>();
///         module
///             .provides::<u16>("port")
///             .param::<Config<ServerConfig>>()
///             .to(|args| Ok(args.next::<Config<ServerConfig>>()?.port));
///         module
///     }
/// }
///
/// let mut configs = ConfigProvider::initialize();
/// configs.add_config(ServerConfig { port: 8080 }).unwrap();
///
/// let container = DiBuilder::new()
///     .add_module(configs)
///     .add_module(ServerModule)
///     .build()
///     .unwrap();
/// assert_eq!(*container.require::<u16>().unwrap(), 8080);
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}

impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Inject for Config<T> {
    fn type_ref() -> TypeRef {
        TypeRef::generic(CONFIG_TYPE, vec![TypeRef::of::<T>()])
    }

    fn from_instance(instance: Instance) -> Result<Self, InjectError> {
        let inner = instance
            .downcast::<T>()
            .map_err(|actual_type| InjectError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })?;
        Ok(Config { inner })
    }
}
