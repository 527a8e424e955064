use std::sync::Arc;

use crate::{
    binding::{Binding, BindingInfo},
    errors::InjectError,
    inject::SetValues,
    key::Key,
    resolver::{self, Resolver},
    types::Instance,
};

/// Aggregates the contributions of every module to one set key
///
/// Contributors are owned by the set, they are not installed in the resolver table.
pub struct SetBinding {
    info: BindingInfo,
    contributors: Vec<Arc<dyn Binding>>,
}

impl SetBinding {
    pub fn new(key: Key, required_by: &str) -> Self {
        SetBinding {
            info: BindingInfo::new(Some(key), None, false, required_by),
            contributors: Vec::new(),
        }
    }

    /// Copy of a parent container's set, extended by the child's contributions
    pub fn extending(parent: &SetBinding) -> Self {
        let info = BindingInfo::new(
            parent.info.provider_key().cloned(),
            None,
            false,
            parent.info.required_by(),
        );
        info.set_library(parent.info.is_library());
        SetBinding {
            info,
            contributors: parent.contributors.clone(),
        }
    }

    /// Adds a contributor
    ///
    /// The set is a library binding only while all of its contributors are.
    pub fn add(&mut self, contributor: Arc<dyn Binding>) {
        let library = contributor.info().is_library();
        if self.contributors.is_empty() {
            self.info.set_library(library);
        } else {
            self.info.set_library(self.info.is_library() && library);
        }
        self.contributors.push(resolver::scope(contributor));
    }

    pub fn contributors(&self) -> &[Arc<dyn Binding>] {
        &self.contributors
    }
}

impl Binding for SetBinding {
    fn info(&self) -> &BindingInfo {
        &self.info
    }

    fn resolve(&self, resolver: &mut Resolver) {
        for contributor in &self.contributors {
            if !contributor.info().is_resolved() {
                contributor.resolve(resolver);
            }
        }
        if resolver.is_attach_successful() {
            for contributor in &self.contributors {
                contributor.info().set_resolved();
            }
        }
    }

    fn get(&self) -> Result<Instance, InjectError> {
        let values = self
            .contributors
            .iter()
            .map(|contributor| contributor.get())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Instance::new(SetValues::new(values)))
    }

    fn dependencies(&self, into: &mut Vec<Arc<dyn Binding>>) {
        into.extend(self.contributors.iter().cloned());
    }
}
