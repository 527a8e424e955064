//! Typed access to values produced by bindings

use std::any::type_name;

use crate::{
    errors::InjectError,
    key::{Key, TypeRef},
    types::Instance,
};

pub mod arc;
pub mod lazy;
pub mod provider;
pub mod set;

pub use lazy::{Lazy, LazyHandle};
pub use provider::{Provider, ProviderHandle};
pub use set::{Set, SetValues};

/// A type that can be requested from the graph
///
/// The key is derived from [Inject::type_ref], which has to be a closed type.
pub trait Inject: Sized {
    fn type_ref() -> TypeRef;

    /// Converts the value produced by the binding for [Inject::key]
    fn from_instance(instance: Instance) -> Result<Self, InjectError>;

    fn key() -> Key {
        Key::encode(&Self::type_ref(), None)
    }

    fn named_key(qualifier: &str) -> Key {
        Key::encode(&Self::type_ref(), Some(qualifier))
    }
}

/// Resolved arguments of a constructor or provider method, in declaration order
pub struct Args {
    values: std::vec::IntoIter<Instance>,
}

impl Args {
    pub(crate) fn new(values: Vec<Instance>) -> Self {
        Args {
            values: values.into_iter(),
        }
    }

    /// Takes the next argument
    pub fn next<I: Inject>(&mut self) -> Result<I, InjectError> {
        let instance = self
            .values
            .next()
            .ok_or(InjectError::MissingArgument(type_name::<I>()))?;
        I::from_instance(instance)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}
