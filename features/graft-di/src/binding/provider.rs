use crate::{
    binding::{Binding, BindingInfo, Dependency, Links},
    errors::InjectError,
    inject::ProviderHandle,
    key::Key,
    resolver::Resolver,
    types::Instance,
};

/// Hands out a [ProviderHandle] that asks the inner binding for a value on every call
///
/// Like [LazyBinding](super::LazyBinding) it reports no dependencies.
pub struct ProviderOfBinding {
    info: BindingInfo,
    inner: Dependency,
    link: Links,
}

impl ProviderOfBinding {
    pub fn new(key: Key, required_by: &str, must_be_injectable: bool, inner: Key) -> Self {
        ProviderOfBinding {
            info: BindingInfo::new(Some(key), None, false, required_by),
            inner: Dependency {
                key: inner,
                must_be_injectable,
                library: false,
            },
            link: Links::default(),
        }
    }
}

impl Binding for ProviderOfBinding {
    fn info(&self) -> &BindingInfo {
        &self.info
    }

    fn resolve(&self, resolver: &mut Resolver) {
        self.link
            .request_all(resolver, [&self.inner], self.info.required_by());
    }

    fn get(&self) -> Result<Instance, InjectError> {
        let delegate = self
            .link
            .upgrade(&self.info)?
            .into_iter()
            .next()
            .ok_or_else(|| InjectError::Detached(self.info.to_string()))?;
        Ok(Instance::new(ProviderHandle::new(delegate)))
    }
}
