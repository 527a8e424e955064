use crate::{
    binding::{Binding, BindingInfo, Dependency, Links},
    errors::InjectError,
    inject::LazyHandle,
    key::Key,
    resolver::Resolver,
    types::Instance,
};

/// Hands out a [LazyHandle] that constructs the inner value on first use
///
/// Reports no dependencies, so a lazy edge never closes a dependency cycle.
pub struct LazyBinding {
    info: BindingInfo,
    inner: Dependency,
    link: Links,
}

impl LazyBinding {
    pub fn new(key: Key, required_by: &str, inner: Key) -> Self {
        LazyBinding {
            info: BindingInfo::new(Some(key), None, false, required_by),
            inner: Dependency::new(inner),
            link: Links::default(),
        }
    }
}

impl Binding for LazyBinding {
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
        Ok(Instance::new(LazyHandle::new(delegate)))
    }
}
