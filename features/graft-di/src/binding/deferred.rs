use crate::{
    binding::{Binding, BindingInfo},
    errors::InjectError,
    key::Key,
    types::Instance,
};

/// Queue placeholder for a key that had no binding when it was requested
///
/// The resolver replaces it with a synthesized binding or an [UnresolvedBinding](super::UnresolvedBinding).
pub struct DeferredBinding {
    info: BindingInfo,
    deferred_key: Key,
    must_be_injectable: bool,
}

impl DeferredBinding {
    pub fn new(deferred_key: Key, required_by: &str, must_be_injectable: bool) -> Self {
        DeferredBinding {
            info: BindingInfo::new(None, None, false, required_by),
            deferred_key,
            must_be_injectable,
        }
    }

    pub fn deferred_key(&self) -> &Key {
        &self.deferred_key
    }

    pub fn must_be_injectable(&self) -> bool {
        self.must_be_injectable
    }
}

impl Binding for DeferredBinding {
    fn info(&self) -> &BindingInfo {
        &self.info
    }

    fn get(&self) -> Result<Instance, InjectError> {
        Err(InjectError::Unsupported {
            key: self.deferred_key.to_string(),
            operation: "get on a deferred placeholder",
        })
    }

    fn as_deferred(&self) -> Option<&DeferredBinding> {
        Some(self)
    }
}
