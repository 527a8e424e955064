use std::any::Any;

use crate::{
    binding::{Binding, BindingInfo},
    errors::{ConfigError, InjectError},
    key::Key,
    types::Instance,
};

/// Sentinel installed for a key whose binding could not be synthesized
pub struct UnresolvedBinding {
    info: BindingInfo,
    key: Key,
    reason: ConfigError,
}

impl UnresolvedBinding {
    pub fn new(key: Key, required_by: &str, reason: ConfigError) -> Self {
        UnresolvedBinding {
            info: BindingInfo::new(Some(key.clone()), None, false, required_by),
            key,
            reason,
        }
    }

    pub fn reason(&self) -> &ConfigError {
        &self.reason
    }

    fn error(&self) -> InjectError {
        InjectError::Unresolved {
            key: self.key.clone(),
            reason: self.reason.clone(),
        }
    }
}

impl Binding for UnresolvedBinding {
    fn info(&self) -> &BindingInfo {
        &self.info
    }

    fn get(&self) -> Result<Instance, InjectError> {
        Err(self.error())
    }

    fn inject_properties(&self, _target: &mut dyn Any) -> Result<(), InjectError> {
        Err(self.error())
    }
}
