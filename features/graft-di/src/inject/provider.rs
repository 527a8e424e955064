use std::{marker::PhantomData, sync::Arc};

use crate::{
    binding::Binding,
    errors::InjectError,
    inject::Inject,
    key::TypeRef,
    types::{Injectable, Instance},
};

/// Untyped provider, asks its binding for a value on every call
pub struct ProviderHandle {
    delegate: Arc<dyn Binding>,
}

impl ProviderHandle {
    pub(crate) fn new(delegate: Arc<dyn Binding>) -> Self {
        ProviderHandle { delegate }
    }

    pub fn get(&self) -> Result<Instance, InjectError> {
        self.delegate.get()
    }
}

/// Provider of `T`
///
/// Every call to [Provider::get] yields a fresh value unless `T` is bound as a singleton.
///
/// The handle does not keep the graph alive. Once the [DiContainer](crate::DiContainer) and
/// every value depending on the same bindings are dropped, [Provider::get] fails with
/// [InjectError::Detached].
pub struct Provider<T: Injectable> {
    handle: Arc<ProviderHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Provider<T> {
    pub fn get(&self) -> Result<Arc<T>, InjectError> {
        Arc::<T>::from_instance(self.handle.get()?)
    }
}

impl<T: Injectable> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Provider {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Injectable> std::fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Provider")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T: Injectable> Inject for Provider<T> {
    fn type_ref() -> TypeRef {
        TypeRef::provider(TypeRef::of::<T>())
    }

    fn from_instance(instance: Instance) -> Result<Self, InjectError> {
        Ok(Provider {
            handle: Arc::<ProviderHandle>::from_instance(instance)?,
            _marker: PhantomData,
        })
    }
}
