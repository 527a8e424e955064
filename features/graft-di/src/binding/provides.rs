use std::{any::type_name, marker::PhantomData, sync::Arc};

use crate::{
    binding::{Binding, BindingInfo, Dependency, Links},
    errors::InjectError,
    inject::{Args, Inject},
    key::{Key, TypeRef},
    module::ModuleDescriptor,
    resolver::Resolver,
    types::{DynError, Injectable, Instance},
};

type ProvideFn = Box<dyn Fn(&mut Args) -> Result<Instance, DynError> + Send + Sync>;

/// How a provider method contributes to the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provision {
    /// The only binding for its key
    Unique,
    /// One element of the set bound under its key
    SetElement,
}

/// Binding produced by a module's provider method
pub struct ProviderMethodBinding {
    info: BindingInfo,
    provision: Provision,
    parameters: Vec<Dependency>,
    links: Links,
    provide: ProvideFn,
}

impl ProviderMethodBinding {
    /// Binding that always hands out clones of the same instance
    pub fn instance(module: &str, key: Key, instance: Instance) -> Self {
        let method = format!("{module}::<instance {}>", instance.type_name);
        ProviderMethodBinding {
            info: BindingInfo::new(Some(key), None, false, method),
            provision: Provision::Unique,
            parameters: Vec::new(),
            links: Links::default(),
            provide: Box::new(move |_| Ok(instance.clone())),
        }
    }

    pub fn provision(&self) -> Provision {
        self.provision
    }

    /// Qualified method name, `Module::method`
    pub fn method(&self) -> &str {
        self.info.required_by()
    }
}

impl Binding for ProviderMethodBinding {
    fn info(&self) -> &BindingInfo {
        &self.info
    }

    fn resolve(&self, resolver: &mut Resolver) {
        self.links
            .request_all(resolver, &self.parameters, self.info.required_by());
    }

    fn get(&self) -> Result<Instance, InjectError> {
        let mut args = Args::new(self.links.values(&self.info)?);
        (self.provide)(&mut args).map_err(|e| InjectError::from_construction(self.method(), e))
    }

    fn dependencies(&self, into: &mut Vec<Arc<dyn Binding>>) {
        into.extend(self.links.bindings());
    }
}

/// Declares one provider method of a module, finished by [ProvidesBuilder::to]
pub struct ProvidesBuilder<'m, T> {
    module: &'m mut ModuleDescriptor,
    method: String,
    qualifier: Option<String>,
    parameters: Vec<Dependency>,
    singleton: bool,
    provision: Provision,
    _marker: PhantomData<fn() -> T>,
}

impl<'m, T: Injectable> ProvidesBuilder<'m, T> {
    pub(crate) fn new(module: &'m mut ModuleDescriptor, method: &str) -> Self {
        ProvidesBuilder {
            module,
            method: method.to_string(),
            qualifier: None,
            parameters: Vec::new(),
            singleton: false,
            provision: Provision::Unique,
            _marker: PhantomData,
        }
    }

    pub fn param<I: Inject>(mut self) -> Self {
        self.parameters.push(Dependency::new(I::key()));
        self
    }

    pub fn named_param<I: Inject>(mut self, qualifier: &str) -> Self {
        self.parameters.push(Dependency::new(I::named_key(qualifier)));
        self
    }

    pub fn param_key(mut self, key: Key) -> Self {
        self.parameters.push(Dependency::new(key));
        self
    }

    pub fn named(mut self, qualifier: &str) -> Self {
        self.qualifier = Some(qualifier.to_string());
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Contributes the value to the set of `T` instead of binding `T` itself
    pub fn into_set(mut self) -> Self {
        self.provision = Provision::SetElement;
        self
    }

    /// Registers the provider method on the module
    pub fn to<F>(self, provide: F)
    where
        F: Fn(&mut Args) -> Result<T, DynError> + Send + Sync + 'static,
    {
        let ty = match self.provision {
            Provision::Unique => TypeRef::of::<T>(),
            Provision::SetElement => TypeRef::set(TypeRef::of::<T>()),
        };
        let key = Key::encode(&ty, self.qualifier.as_deref());
        let method = format!("{}::{}", self.module.name(), self.method);
        tracing::trace!("Declaring provider method {method} for {key}");

        self.module.push_provision(ProviderMethodBinding {
            info: BindingInfo::new(Some(key), None, self.singleton, method),
            provision: self.provision,
            parameters: self.parameters,
            links: Links::default(),
            provide: Box::new(move |args: &mut Args| {
                provide(args).map(|value| Instance {
                    type_name: type_name::<T>(),
                    instance: Arc::new(value),
                })
            }),
        });
    }
}
