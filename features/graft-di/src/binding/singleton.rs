use std::{
    any::Any,
    sync::{Arc, Mutex, OnceLock},
};

use crate::{
    binding::{Binding, BindingInfo},
    errors::InjectError,
    resolver::Resolver,
    types::Instance,
};

/// Memoizes the first successfully produced value of the wrapped binding
///
/// Keys, flags and dependencies are those of the wrapped binding. A failed construction is
/// not cached, the next request tries again.
pub struct SingletonBinding {
    binding: Arc<dyn Binding>,
    instance: OnceLock<Instance>,
    lock: Mutex<()>,
}

impl SingletonBinding {
    pub fn new(binding: Arc<dyn Binding>) -> Self {
        assert!(
            !binding.is_scoped(),
            "'{}' is already singleton scoped",
            binding.info()
        );
        SingletonBinding {
            binding,
            instance: OnceLock::new(),
            lock: Mutex::new(()),
        }
    }
}

impl Binding for SingletonBinding {
    fn info(&self) -> &BindingInfo {
        self.binding.info()
    }

    fn resolve(&self, resolver: &mut Resolver) {
        self.binding.resolve(resolver)
    }

    fn get(&self) -> Result<Instance, InjectError> {
        if let Some(instance) = self.instance.get() {
            return Ok(instance.clone());
        }

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(instance) = self.instance.get() {
            return Ok(instance.clone());
        }

        let instance = self.binding.get()?;
        tracing::debug!("Created singleton {}", self.binding.info());
        Ok(self.instance.get_or_init(|| instance).clone())
    }

    fn inject_properties(&self, target: &mut dyn Any) -> Result<(), InjectError> {
        self.binding.inject_properties(target)
    }

    fn dependencies(&self, into: &mut Vec<Arc<dyn Binding>>) {
        self.binding.dependencies(into)
    }

    fn is_scoped(&self) -> bool {
        true
    }
}
