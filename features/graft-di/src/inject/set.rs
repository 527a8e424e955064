use std::{ops::Deref, sync::Arc};

use crate::{
    errors::InjectError,
    inject::Inject,
    key::TypeRef,
    types::{Injectable, Instance},
};

/// Untyped elements of a set binding, in contribution order
pub struct SetValues(Vec<Instance>);

impl SetValues {
    pub(crate) fn new(values: Vec<Instance>) -> Self {
        SetValues(values)
    }

    pub fn values(&self) -> &[Instance] {
        &self.0
    }
}

/// Every value contributed to the set of `T`
#[derive(Debug)]
pub struct Set<T: Injectable>(Vec<Arc<T>>);

impl<T: Injectable> Set<T> {
    pub fn into_vec(self) -> Vec<Arc<T>> {
        self.0
    }
}

impl<T: Injectable> Deref for Set<T> {
    type Target = [Arc<T>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: Injectable> Clone for Set<T> {
    fn clone(&self) -> Self {
        Set(self.0.clone())
    }
}

impl<T: Injectable> Inject for Set<T> {
    fn type_ref() -> TypeRef {
        TypeRef::set(TypeRef::of::<T>())
    }

    fn from_instance(instance: Instance) -> Result<Self, InjectError> {
        let values = Arc::<SetValues>::from_instance(instance)?;
        values
            .values()
            .iter()
            .cloned()
            .map(Arc::<T>::from_instance)
            .collect::<Result<Vec<_>, _>>()
            .map(Set)
    }
}
