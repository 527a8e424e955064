use std::{
    any::{type_name, Any},
    marker::PhantomData,
    sync::Arc,
};

use crate::{
    binding::{Binding, BindingInfo, Dependency, Links},
    errors::InjectError,
    inject::{Args, Inject},
    key::Key,
    resolver::Resolver,
    types::{DynError, Injectable, Instance},
};

type Construct =
    Box<dyn Fn(&mut Args) -> Result<Box<dyn Any + Send + Sync>, DynError> + Send + Sync>;
type SetProperty = Box<dyn Fn(&mut dyn Any, Instance) -> Result<(), InjectError> + Send + Sync>;
type Project = Box<dyn for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any> + Send + Sync>;

struct Property {
    dependency: Dependency,
    set: SetProperty,
}

/// Embedded value whose members are injected by its own members binding
struct BaseMembers {
    dependency: Dependency,
    project: Project,
}

/// Builds a value through a designated constructor, then injects its properties
///
/// A binding without a constructor only serves its members key.
pub struct ConstructorBinding {
    info: BindingInfo,
    type_name: &'static str,
    constructor: Option<Construct>,
    injectable_constructor: bool,
    parameters: Vec<Dependency>,
    properties: Vec<Property>,
    base: Option<BaseMembers>,
    parameter_links: Links,
    property_links: Links,
    base_link: Links,
}

impl ConstructorBinding {
    pub fn builder<T: Injectable>() -> ConstructorBuilder<T> {
        ConstructorBuilder {
            parameters: Vec::new(),
            properties: Vec::new(),
            base: None,
            singleton: false,
            _marker: PhantomData,
        }
    }

    /// True if the type declares an injectable constructor or injected properties
    pub fn has_injections(&self) -> bool {
        self.injectable_constructor || !self.properties.is_empty()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl Binding for ConstructorBinding {
    fn info(&self) -> &BindingInfo {
        &self.info
    }

    fn resolve(&self, resolver: &mut Resolver) {
        let required_by = self.info.to_string();
        self.parameter_links
            .request_all(resolver, &self.parameters, &required_by);
        self.property_links.request_all(
            resolver,
            self.properties.iter().map(|property| &property.dependency),
            &required_by,
        );
        self.base_link.request_all(
            resolver,
            self.base.iter().map(|base| &base.dependency),
            &required_by,
        );
    }

    fn get(&self) -> Result<Instance, InjectError> {
        let Some(constructor) = &self.constructor else {
            return Err(InjectError::Unsupported {
                key: self.info.to_string(),
                operation: "construction of a members-only binding",
            });
        };

        let mut args = Args::new(self.parameter_links.values(&self.info)?);
        let mut value =
            constructor(&mut args).map_err(|e| InjectError::from_construction(&self.info, e))?;
        self.inject_properties(&mut *value)?;

        tracing::trace!("Constructed instance of {}", self.type_name);
        Ok(Instance::from_boxed(value, self.type_name))
    }

    fn inject_properties(&self, target: &mut dyn Any) -> Result<(), InjectError> {
        let bindings = self.property_links.upgrade(&self.info)?;
        for (property, binding) in self.properties.iter().zip(bindings) {
            (property.set)(&mut *target, binding.get()?)?;
        }

        if let Some(base) = &self.base {
            let base_binding = self
                .base_link
                .upgrade(&self.info)?
                .into_iter()
                .next()
                .ok_or_else(|| InjectError::Detached(self.info.to_string()))?;
            let embedded = (base.project)(target).ok_or(InjectError::DowncastFailed {
                required_type: self.type_name,
                actual_type: "<members target>",
            })?;
            base_binding.inject_properties(embedded)?;
        }

        Ok(())
    }

    fn dependencies(&self, into: &mut Vec<Arc<dyn Binding>>) {
        into.extend(self.parameter_links.bindings());
        into.extend(self.property_links.bindings());
        into.extend(self.base_link.bindings());
    }
}

/// Typed builder for [ConstructorBinding]
pub struct ConstructorBuilder<T> {
    parameters: Vec<Dependency>,
    properties: Vec<Property>,
    base: Option<BaseMembers>,
    singleton: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> ConstructorBuilder<T> {
    /// Adds a constructor parameter, handed to the constructor in declaration order
    pub fn param<I: Inject>(self) -> Self {
        self.param_key(I::key())
    }

    pub fn named_param<I: Inject>(self, qualifier: &str) -> Self {
        self.param_key(I::named_key(qualifier))
    }

    pub fn param_key(mut self, key: Key) -> Self {
        self.parameters.push(Dependency::new(key));
        self
    }

    /// Adds a property injected after construction and by members injection
    pub fn property<I, F>(self, setter: F) -> Self
    where
        I: Inject,
        F: Fn(&mut T, I) + Send + Sync + 'static,
    {
        self.property_key(I::key(), setter)
    }

    pub fn named_property<I, F>(self, qualifier: &str, setter: F) -> Self
    where
        I: Inject,
        F: Fn(&mut T, I) + Send + Sync + 'static,
    {
        self.property_key(I::named_key(qualifier), setter)
    }

    fn property_key<I, F>(mut self, key: Key, setter: F) -> Self
    where
        I: Inject,
        F: Fn(&mut T, I) + Send + Sync + 'static,
    {
        let set: SetProperty = Box::new(move |target: &mut dyn Any, value: Instance| {
            let target = target
                .downcast_mut::<T>()
                .ok_or(InjectError::DowncastFailed {
                    required_type: type_name::<T>(),
                    actual_type: "<members target>",
                })?;
            setter(target, I::from_instance(value)?);
            Ok(())
        });
        self.properties.push(Property {
            dependency: Dependency::new(key),
            set,
        });
        self
    }

    /// Embedded value whose members are injected through `B`'s members binding
    pub fn base<B, F>(mut self, project: F) -> Self
    where
        B: Injectable,
        F: Fn(&mut T) -> &mut B + Send + Sync + 'static,
    {
        let project: Project = Box::new(erase_projection(move |target: &mut dyn Any| {
            target
                .downcast_mut::<T>()
                .map(|value| project(value) as &mut dyn Any)
        }));
        self.base = Some(BaseMembers {
            dependency: Dependency {
                key: Key::members::<B>(),
                must_be_injectable: false,
                library: true,
            },
            project,
        });
        self
    }

    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Designates the injectable constructor
    pub fn construct<F>(self, constructor: F) -> ConstructorBinding
    where
        F: Fn(&mut Args) -> Result<T, DynError> + Send + Sync + 'static,
    {
        self.finish(Some(erase_constructor(constructor)), true)
    }

    /// A constructor usable for construction, which does not by itself make the type injectable
    pub fn implicit_construct<F>(self, constructor: F) -> ConstructorBinding
    where
        F: Fn(&mut Args) -> Result<T, DynError> + Send + Sync + 'static,
    {
        self.finish(Some(erase_constructor(constructor)), false)
    }

    /// A binding only able to inject members into existing values
    pub fn members_only(self) -> ConstructorBinding {
        self.finish(None, false)
    }

    fn finish(self, constructor: Option<Construct>, injectable_constructor: bool) -> ConstructorBinding {
        let provider_key = constructor.as_ref().map(|_| Key::of::<T>());
        ConstructorBinding {
            info: BindingInfo::new(
                provider_key,
                Some(Key::members::<T>()),
                self.singleton,
                type_name::<T>(),
            ),
            type_name: type_name::<T>(),
            constructor,
            injectable_constructor,
            parameters: self.parameters,
            properties: self.properties,
            base: self.base,
            parameter_links: Links::default(),
            property_links: Links::default(),
            base_link: Links::default(),
        }
    }
}

fn erase_constructor<T, F>(constructor: F) -> Construct
where
    T: Injectable,
    F: Fn(&mut Args) -> Result<T, DynError> + Send + Sync + 'static,
{
    Box::new(move |args: &mut Args| {
        constructor(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
    })
}

/// Pins the higher-ranked signature so the returned borrow is tied to the argument
fn erase_projection<F>(project: F) -> F
where
    F: for<'a> Fn(&'a mut dyn Any) -> Option<&'a mut dyn Any>,
{
    project
}
