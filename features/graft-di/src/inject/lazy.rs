use std::{
    fmt::Debug,
    marker::PhantomData,
    sync::{Arc, Mutex, OnceLock},
};

use crate::{
    binding::Binding,
    errors::InjectError,
    inject::Inject,
    key::TypeRef,
    types::{Injectable, Instance},
};

/// Untyped lazy value, constructed by its binding on first access
pub struct LazyHandle {
    delegate: Arc<dyn Binding>,
    value: OnceLock<Instance>,
    lock: Mutex<()>,
}

impl LazyHandle {
    pub(crate) fn new(delegate: Arc<dyn Binding>) -> Self {
        LazyHandle {
            delegate,
            value: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }

    /// Constructs the value on first access, a failed attempt is retried on the next call
    pub fn get(&self) -> Result<Instance, InjectError> {
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        // Lock so only one caller constructs, then double check the value
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = self.value.get() {
            return Ok(value.clone());
        }

        let value = self.delegate.get()?;
        Ok(self.value.get_or_init(|| value).clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.value.get().is_some()
    }
}

/// Lazily constructed dependency
///
/// Nothing is constructed until [Lazy::get] is called. Every clone shares the value.
///
/// Keep the [DiContainer](crate::DiContainer) alive until the first [Lazy::get]. The handle
/// only holds weak links to the dependencies of `T`, the first access fails with
/// [InjectError::Detached] if they were dropped.
pub struct Lazy<T: Injectable> {
    handle: Arc<LazyHandle>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Injectable> Lazy<T> {
    /// Accesses the lazy dependency, constructing it on first access
    pub fn get(&self) -> Result<Arc<T>, InjectError> {
        Arc::<T>::from_instance(self.handle.get()?)
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_initialized()
    }
}

impl<T: Injectable> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy {
            handle: self.handle.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Injectable + Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.handle.value.get().map(|value| value.downcast::<T>()) {
            Some(Ok(value)) => f.debug_tuple("Lazy").field(&value).finish(),
            _ => f.debug_tuple("Lazy").field(&"<uninitialized>").finish(),
        }
    }
}

impl<T: Injectable> Inject for Lazy<T> {
    fn type_ref() -> TypeRef {
        TypeRef::lazy(TypeRef::of::<T>())
    }

    fn from_instance(instance: Instance) -> Result<Self, InjectError> {
        let handle = Arc::<LazyHandle>::from_instance(instance)?;
        Ok(Lazy {
            handle,
            _marker: PhantomData,
        })
    }
}
